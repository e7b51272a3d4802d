//! Candle data and the bounded rolling window that holds it.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::str::FromStr;

use crate::error::StrategyError;

/// One OHLCV bar as pushed by the exchange.
///
/// Prices and volumes are kept as `Decimal` so that the exchange's string
/// representation survives untouched; indicator code reads `close_f64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candle {
    /// Bar start, unix milliseconds
    pub start_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    /// Volume in the base coin
    pub base_volume: Decimal,
    /// Volume in the quote coin
    pub quote_volume: Decimal,
    /// Volume in USDT
    pub usdt_volume: Decimal,
}

impl Candle {
    /// Create a candle with zero volumes.
    pub fn new(start_time: i64, open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Self {
        Self {
            start_time,
            open,
            high,
            low,
            close,
            base_volume: Decimal::ZERO,
            quote_volume: Decimal::ZERO,
            usdt_volume: Decimal::ZERO,
        }
    }

    /// Set the three volume fields.
    pub fn with_volumes(mut self, base: Decimal, quote: Decimal, usdt: Decimal) -> Self {
        self.base_volume = base;
        self.quote_volume = quote;
        self.usdt_volume = usdt;
        self
    }

    /// Parse one positional row `[startTime, open, high, low, close, baseVol, quoteVol, usdtVol]`.
    ///
    /// `startTime` may be a string or an integer. Volume columns missing from
    /// a short row default to zero; the five price columns are required.
    pub fn from_row(row: &Value) -> Result<Self, StrategyError> {
        let fields = row
            .as_array()
            .ok_or_else(|| StrategyError::MalformedCandle(format!("expected array, got {row}")))?;
        if fields.len() < 5 {
            return Err(StrategyError::MalformedCandle(format!(
                "expected at least 5 columns, got {}",
                fields.len()
            )));
        }

        let start_time = parse_timestamp(&fields[0])?;
        let candle = Candle::new(
            start_time,
            parse_decimal(&fields[1], "open")?,
            parse_decimal(&fields[2], "high")?,
            parse_decimal(&fields[3], "low")?,
            parse_decimal(&fields[4], "close")?,
        );

        let volume = |idx: usize, name: &str| match fields.get(idx) {
            Some(v) => parse_decimal(v, name),
            None => Ok(Decimal::ZERO),
        };
        Ok(candle.with_volumes(
            volume(5, "baseVolume")?,
            volume(6, "quoteVolume")?,
            volume(7, "usdtVolume")?,
        ))
    }

    /// Close price as `f64` for indicator math.
    #[inline]
    pub fn close_f64(&self) -> f64 {
        self.close.to_f64().unwrap_or(0.0)
    }

    /// Get the start time as a DateTime.
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.start_time)
    }
}

fn parse_timestamp(value: &Value) -> Result<i64, StrategyError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| StrategyError::MalformedCandle(format!("startTime out of range: {n}"))),
        Value::String(s) => s
            .parse::<i64>()
            .map_err(|e| StrategyError::MalformedCandle(format!("startTime '{s}': {e}"))),
        other => Err(StrategyError::MalformedCandle(format!("startTime: unexpected {other}"))),
    }
}

fn parse_decimal(value: &Value, field: &str) -> Result<Decimal, StrategyError> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => {
            return Err(StrategyError::MalformedCandle(format!(
                "{field}: unexpected {other}"
            )))
        }
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|e| StrategyError::MalformedCandle(format!("{field} '{text}': {e}")))
}

/// How the window treats candles that do not advance the tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowPolicy {
    /// Append every candle exactly as received.
    AcceptAll,
    /// A candle with the tail's startTime replaces the tail, an older one is rejected.
    #[default]
    Monotonic,
}

/// What `CandleWindow::append` did with a candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Pushed to the tail; `evicted` candles were dropped from the head.
    Appended { evicted: usize },
    /// Replaced the in-progress tail candle.
    ReplacedTail,
    /// Older than the tail and dropped.
    Rejected,
}

impl AppendOutcome {
    /// True when only the tail advanced and nothing else in the window moved.
    #[inline]
    pub fn is_plain_append(&self) -> bool {
        matches!(self, AppendOutcome::Appended { evicted: 0 })
    }
}

/// Bounded FIFO of candles for one instrument.
#[derive(Debug, Clone)]
pub struct CandleWindow {
    candles: VecDeque<Candle>,
    capacity: usize,
    policy: WindowPolicy,
}

impl CandleWindow {
    /// Create an empty window holding at most `capacity` candles (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            candles: VecDeque::with_capacity(capacity),
            capacity,
            policy: WindowPolicy::default(),
        }
    }

    /// Set the validation policy.
    pub fn with_policy(mut self, policy: WindowPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Add a candle at the tail, evicting from the head until the window fits.
    pub fn append(&mut self, candle: Candle) -> AppendOutcome {
        if self.policy == WindowPolicy::Monotonic {
            if let Some(tail) = self.candles.back_mut() {
                if candle.start_time == tail.start_time {
                    *tail = candle;
                    return AppendOutcome::ReplacedTail;
                }
                if candle.start_time < tail.start_time {
                    return AppendOutcome::Rejected;
                }
            }
        }

        self.candles.push_back(candle);
        let mut evicted = 0;
        while self.candles.len() > self.capacity {
            self.candles.pop_front();
            evicted += 1;
        }
        AppendOutcome::Appended { evicted }
    }

    /// Ordered copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<Candle> {
        self.candles.iter().copied().collect()
    }

    /// Close prices, oldest first.
    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(Candle::close_f64).collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.candles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> WindowPolicy {
        self.policy
    }

    /// Get the newest candle.
    pub fn last(&self) -> Option<&Candle> {
        self.candles.back()
    }

    /// Get a candle by index (0 = oldest).
    pub fn get(&self, index: usize) -> Option<&Candle> {
        self.candles.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candle> {
        self.candles.iter()
    }

    pub fn clear(&mut self) {
        self.candles.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn candle(start_time: i64, close: Decimal) -> Candle {
        Candle::new(start_time, close, close, close, close)
    }

    #[test]
    fn test_from_row_parses_bitget_columns() {
        let row = json!([
            "1695835800000",
            "26210.5",
            "26210.5",
            "26194.5",
            "26194.5",
            "26.26",
            "687897.63",
            "687897.63"
        ]);
        let c = Candle::from_row(&row).unwrap();

        assert_eq!(c.start_time, 1_695_835_800_000);
        assert_eq!(c.open, dec!(26210.5));
        assert_eq!(c.low, dec!(26194.5));
        assert_eq!(c.close, dec!(26194.5));
        assert_eq!(c.base_volume, dec!(26.26));
        assert_eq!(c.usdt_volume, dec!(687897.63));
        assert!((c.close_f64() - 26194.5).abs() < 1e-10);
    }

    #[test]
    fn test_from_row_accepts_integer_timestamp_and_short_rows() {
        let c = Candle::from_row(&json!([1000, "1", "2", "0.5", "1.5"])).unwrap();
        assert_eq!(c.start_time, 1000);
        assert_eq!(c.base_volume, Decimal::ZERO);
    }

    #[test]
    fn test_from_row_rejects_malformed() {
        assert!(Candle::from_row(&json!({"close": "1"})).is_err());
        assert!(Candle::from_row(&json!(["1000", "1", "2"])).is_err());
        assert!(Candle::from_row(&json!(["abc", "1", "2", "0.5", "1.5"])).is_err());
        assert!(Candle::from_row(&json!(["1000", "x", "2", "0.5", "1.5"])).is_err());
    }

    #[test]
    fn test_window_length_and_order() {
        let mut window = CandleWindow::new(3);
        for t in 1..=5 {
            window.append(candle(t, Decimal::from(t)));
        }

        assert_eq!(window.len(), 3);
        let times: Vec<i64> = window.snapshot().iter().map(|c| c.start_time).collect();
        assert_eq!(times, vec![3, 4, 5]);
    }

    proptest! {
        #[test]
        fn prop_window_keeps_latest_candles(
            n in 0usize..200,
            capacity in 1usize..50,
            first in 0i64..1_000_000,
            step in 1i64..900_000,
        ) {
            let mut window = CandleWindow::new(capacity).with_policy(WindowPolicy::AcceptAll);
            let times: Vec<i64> = (0..n as i64).map(|i| first + i * step).collect();
            for &t in &times {
                window.append(candle(t, Decimal::from(t)));
            }

            let kept = n.min(capacity);
            prop_assert_eq!(window.len(), kept);
            let held: Vec<i64> = window.iter().map(|c| c.start_time).collect();
            prop_assert_eq!(&held[..], &times[n - kept..]);
        }
    }

    #[test]
    fn test_window_reports_evictions() {
        let mut window = CandleWindow::new(2);
        assert_eq!(window.append(candle(1, dec!(1))), AppendOutcome::Appended { evicted: 0 });
        assert_eq!(window.append(candle(2, dec!(2))), AppendOutcome::Appended { evicted: 0 });
        assert_eq!(window.append(candle(3, dec!(3))), AppendOutcome::Appended { evicted: 1 });
    }

    #[test]
    fn test_monotonic_replaces_tail_and_rejects_stale() {
        let mut window = CandleWindow::new(10);
        window.append(candle(1, dec!(1)));
        window.append(candle(2, dec!(2)));

        assert_eq!(window.append(candle(2, dec!(2.5))), AppendOutcome::ReplacedTail);
        assert_eq!(window.len(), 2);
        assert_eq!(window.last().unwrap().close, dec!(2.5));

        assert_eq!(window.append(candle(1, dec!(9))), AppendOutcome::Rejected);
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn test_accept_all_keeps_duplicates() {
        let mut window = CandleWindow::new(10).with_policy(WindowPolicy::AcceptAll);
        window.append(candle(2, dec!(1)));
        window.append(candle(2, dec!(2)));
        window.append(candle(1, dec!(3)));

        assert_eq!(window.len(), 3);
        assert_eq!(window.closes(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_snapshot_does_not_mutate() {
        let mut window = CandleWindow::new(4);
        window.append(candle(1, dec!(1)));
        let first = window.snapshot();
        let second = window.snapshot();
        assert_eq!(first, second);
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut window = CandleWindow::new(0);
        window.append(candle(1, dec!(1)));
        window.append(candle(2, dec!(2)));
        assert_eq!(window.capacity(), 1);
        assert_eq!(window.len(), 1);
    }
}
