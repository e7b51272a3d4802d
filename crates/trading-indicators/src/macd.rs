//! MACD (Moving Average Convergence Divergence).
//!
//! `DIF = EMA(fast) - EMA(slow)`, `DEA = EMA(DIF, signal)`,
//! `MACD = (DIF - DEA) * 2`. All EMAs are seeded with their first sample, so
//! every input sample yields one point.

use serde::{Deserialize, Serialize};
use trading_core::error::IndicatorError;
use trading_core::traits::{Indicator, StreamingIndicator};

use crate::moving_average::{Ema, StreamingEma};

/// One MACD sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdPoint {
    /// Fast EMA minus slow EMA
    pub dif: f64,
    /// Signal line: EMA of DIF
    pub dea: f64,
    /// Histogram: `(DIF - DEA) * 2`
    pub macd: f64,
}

impl MacdPoint {
    #[inline]
    pub fn new(dif: f64, dea: f64) -> Self {
        Self {
            dif,
            dea,
            macd: (dif - dea) * 2.0,
        }
    }
}

/// EMA spans for MACD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacdParams {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl Default for MacdParams {
    fn default() -> Self {
        Self {
            fast: 12,
            slow: 26,
            signal: 9,
        }
    }
}

impl MacdParams {
    pub fn validate(&self) -> Result<(), IndicatorError> {
        if self.fast == 0 || self.slow == 0 || self.signal == 0 {
            return Err(IndicatorError::InvalidParameter(
                "MACD periods must be greater than 0".to_string(),
            ));
        }
        if self.fast >= self.slow {
            return Err(IndicatorError::InvalidParameter(format!(
                "fast period ({}) must be less than slow period ({})",
                self.fast, self.slow
            )));
        }
        Ok(())
    }
}

/// Batch MACD over a price slice.
#[derive(Debug, Clone)]
pub struct Macd {
    params: MacdParams,
    fast: Ema,
    slow: Ema,
    signal: Ema,
}

impl Macd {
    pub fn new(params: MacdParams) -> Result<Self, IndicatorError> {
        params.validate()?;
        Ok(Self {
            params,
            fast: Ema::new(params.fast),
            slow: Ema::new(params.slow),
            signal: Ema::new(params.signal),
        })
    }

    pub fn params(&self) -> MacdParams {
        self.params
    }
}

impl Indicator for Macd {
    type Output = MacdPoint;

    fn calculate(&self, data: &[f64]) -> Vec<MacdPoint> {
        let fast = self.fast.calculate(data);
        let slow = self.slow.calculate(data);
        let dif: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        let dea = self.signal.calculate(&dif);

        dif.iter()
            .zip(&dea)
            .map(|(&dif, &dea)| MacdPoint::new(dif, dea))
            .collect()
    }

    /// A crossover needs two consecutive points.
    fn min_samples(&self) -> usize {
        2
    }

    fn name(&self) -> &str {
        "MACD"
    }
}

/// MACD updated one close at a time.
///
/// Keeps the last two points so a crossover can be classified in O(1).
#[derive(Debug, Clone)]
pub struct StreamingMacd {
    params: MacdParams,
    fast: StreamingEma,
    slow: StreamingEma,
    signal: StreamingEma,
    prev: Option<MacdPoint>,
    last: Option<MacdPoint>,
    samples: usize,
}

impl StreamingMacd {
    pub fn new(params: MacdParams) -> Result<Self, IndicatorError> {
        params.validate()?;
        Ok(Self {
            params,
            fast: StreamingEma::new(params.fast),
            slow: StreamingEma::new(params.slow),
            signal: StreamingEma::new(params.signal),
            prev: None,
            last: None,
            samples: 0,
        })
    }

    /// Fold in one close and return the new point.
    pub fn push(&mut self, close: f64) -> MacdPoint {
        let dif = self.fast.push(close) - self.slow.push(close);
        let dea = self.signal.push(dif);
        let point = MacdPoint::new(dif, dea);
        self.prev = self.last.replace(point);
        self.samples += 1;
        point
    }

    /// Discard state and replay `closes` from the start.
    pub fn rebuild(&mut self, closes: &[f64]) {
        self.reset();
        for &close in closes {
            self.push(close);
        }
    }

    /// The previous and latest points, once at least two samples were seen.
    pub fn last_two(&self) -> Option<(MacdPoint, MacdPoint)> {
        self.prev.zip(self.last)
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn params(&self) -> MacdParams {
        self.params
    }
}

impl StreamingIndicator for StreamingMacd {
    type Output = MacdPoint;

    fn update(&mut self, value: f64) -> Option<MacdPoint> {
        Some(self.push(value))
    }

    fn current(&self) -> Option<MacdPoint> {
        self.last
    }

    fn reset(&mut self) {
        self.fast.reset();
        self.slow.reset();
        self.signal.reset();
        self.prev = None;
        self.last = None;
        self.samples = 0;
    }

    fn is_ready(&self) -> bool {
        self.last.is_some()
    }

    fn name(&self) -> &str {
        "MACD"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_macd_reference_values() {
        let macd = Macd::new(MacdParams::default()).unwrap();
        let points = macd.calculate(&[100.0, 99.0, 98.0, 97.0, 96.0, 120.0]);

        assert_eq!(points.len(), 6);
        assert_eq!(points[0], MacdPoint::new(0.0, 0.0));
        assert!((points[4].dif - -0.631548).abs() < 1e-5);
        assert!((points[4].dea - -0.228246).abs() < 1e-5);
        assert!((points[5].dif - 1.115928).abs() < 1e-5);
        assert!((points[5].dea - 0.040589).abs() < 1e-5);
        assert!((points[5].macd - 2.150678).abs() < 1e-5);
    }

    #[test]
    fn test_params_validation() {
        assert!(MacdParams::default().validate().is_ok());
        assert!(MacdParams { fast: 0, slow: 26, signal: 9 }.validate().is_err());
        assert!(MacdParams { fast: 26, slow: 12, signal: 9 }.validate().is_err());
        assert!(Macd::new(MacdParams { fast: 5, slow: 5, signal: 3 }).is_err());
    }

    #[test]
    fn test_last_two_needs_two_samples() {
        let mut macd = StreamingMacd::new(MacdParams::default()).unwrap();
        assert!(macd.last_two().is_none());

        macd.push(100.0);
        assert!(macd.last_two().is_none());
        assert!(macd.is_ready());

        macd.push(101.0);
        let (prev, last) = macd.last_two().unwrap();
        assert_eq!(prev, MacdPoint::new(0.0, 0.0));
        assert!(last.dif > 0.0);
    }

    #[test]
    fn test_rebuild_replays_from_scratch() {
        let closes = [10.0, 11.0, 12.5, 12.0, 13.0];
        let mut incremental = StreamingMacd::new(MacdParams::default()).unwrap();
        for c in [99.0, 98.0, 97.0] {
            incremental.push(c);
        }
        incremental.rebuild(&closes);

        let mut fresh = StreamingMacd::new(MacdParams::default()).unwrap();
        for &c in &closes {
            fresh.push(c);
        }

        assert_eq!(incremental.samples(), 5);
        assert_eq!(incremental.last_two(), fresh.last_two());
    }

    proptest! {
        #[test]
        fn prop_streaming_matches_batch(
            closes in prop::collection::vec(1.0f64..100_000.0, 1..300),
            fast in 1usize..20,
            gap in 1usize..20,
            signal in 1usize..15,
        ) {
            let params = MacdParams { fast, slow: fast + gap, signal };
            let batch = Macd::new(params).unwrap().calculate(&closes);

            let mut streaming = StreamingMacd::new(params).unwrap();
            let streamed: Vec<MacdPoint> = closes.iter().map(|&c| streaming.push(c)).collect();

            prop_assert_eq!(batch, streamed);
        }
    }
}
