//! MACD crossover signal engine.
//!
//! Emits `Long` when DIF crosses above DEA between the previous and the
//! latest candle, `Short` when it crosses below, `Hold` otherwise.

use serde::{Deserialize, Serialize};
use trading_core::traits::{Indicator, StreamingIndicator};
use trading_core::{
    error::StrategyError,
    traits::{Strategy, StrategyConfig, StrategyState},
    types::{AppendOutcome, CandleWindow, Signal},
};
use trading_indicators::{Macd, MacdParams, MacdPoint, StreamingMacd};

/// Configuration for the MACD crossover strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacdCrossConfig {
    /// Fast EMA period
    pub fast_period: usize,
    /// Slow EMA period
    pub slow_period: usize,
    /// Signal (DEA) EMA period
    pub signal_period: usize,
}

impl Default for MacdCrossConfig {
    fn default() -> Self {
        Self {
            fast_period: 12,
            slow_period: 26,
            signal_period: 9,
        }
    }
}

impl MacdCrossConfig {
    pub fn params(&self) -> MacdParams {
        MacdParams {
            fast: self.fast_period,
            slow: self.slow_period,
            signal: self.signal_period,
        }
    }
}

impl StrategyConfig for MacdCrossConfig {
    fn validate(&self) -> Result<(), StrategyError> {
        self.params()
            .validate()
            .map_err(|e| StrategyError::InvalidConfig(e.to_string()))
    }
}

/// Classify the step from `prev` to `last`.
pub fn classify_crossover(prev: &MacdPoint, last: &MacdPoint) -> Signal {
    if prev.dif < prev.dea && last.dif > last.dea {
        Signal::Long
    } else if prev.dif > prev.dea && last.dif < last.dea {
        Signal::Short
    } else {
        Signal::Hold
    }
}

/// MACD crossover strategy.
///
/// Plain tail appends are folded in incrementally. Any eviction or tail
/// replacement changes the samples the EMAs were seeded from, so the engine
/// replays the whole window instead.
pub struct MacdCrossStrategy {
    config: MacdCrossConfig,
    batch: Macd,
    streaming: StreamingMacd,
    candles_processed: usize,
    signals_generated: usize,
    rebuilds: usize,
}

impl MacdCrossStrategy {
    /// Create a new MACD crossover strategy.
    pub fn new(config: MacdCrossConfig) -> Result<Self, StrategyError> {
        config.validate()?;
        let params = config.params();
        let invalid = |e: trading_core::error::IndicatorError| StrategyError::InvalidConfig(e.to_string());
        Ok(Self {
            batch: Macd::new(params).map_err(invalid)?,
            streaming: StreamingMacd::new(params).map_err(invalid)?,
            config,
            candles_processed: 0,
            signals_generated: 0,
            rebuilds: 0,
        })
    }

    /// Previous and latest MACD points, once two candles were seen.
    pub fn last_points(&self) -> Option<(MacdPoint, MacdPoint)> {
        self.streaming.last_two()
    }

    /// Number of full-window replays so far.
    pub fn rebuilds(&self) -> usize {
        self.rebuilds
    }
}

impl Strategy for MacdCrossStrategy {
    fn name(&self) -> &str {
        "MACD Crossover"
    }

    fn description(&self) -> &str {
        "Trades DIF/DEA crossovers of the MACD indicator"
    }

    fn on_candle(&mut self, window: &CandleWindow, outcome: AppendOutcome) {
        match outcome {
            AppendOutcome::Rejected => return,
            o if o.is_plain_append() => {
                if let Some(candle) = window.last() {
                    self.streaming.push(candle.close_f64());
                }
            }
            _ => {
                self.streaming.rebuild(&window.closes());
                self.rebuilds += 1;
            }
        }

        self.candles_processed += 1;
        if self.signal().is_actionable() {
            self.signals_generated += 1;
        }
    }

    fn signal(&self) -> Signal {
        self.streaming
            .last_two()
            .map_or(Signal::Hold, |(prev, last)| classify_crossover(&prev, &last))
    }

    fn evaluate(&self, window: &CandleWindow) -> Signal {
        let closes = window.closes();
        if self.batch.validate_data(&closes).is_err() {
            return Signal::Hold;
        }
        match self.batch.calculate(&closes).as_slice() {
            [.., prev, last] => classify_crossover(prev, last),
            _ => Signal::Hold,
        }
    }

    fn reset(&mut self) {
        self.streaming.reset();
        self.candles_processed = 0;
        self.signals_generated = 0;
        self.rebuilds = 0;
    }

    fn state(&self) -> StrategyState {
        let last = self.streaming.current();
        StrategyState {
            name: self.name().to_string(),
            is_warmed_up: self.streaming.samples() >= self.warmup_period(),
            candles_processed: self.candles_processed,
            signals_generated: self.signals_generated,
            indicators: [
                ("dif".to_string(), last.map_or(0.0, |p| p.dif)),
                ("dea".to_string(), last.map_or(0.0, |p| p.dea)),
                ("macd".to_string(), last.map_or(0.0, |p| p.macd)),
            ]
            .into_iter()
            .collect(),
            custom: serde_json::json!({
                "fast_period": self.config.fast_period,
                "slow_period": self.config.slow_period,
                "signal_period": self.config.signal_period,
                "rebuilds": self.rebuilds,
            }),
        }
    }

    fn warmup_period(&self) -> usize {
        2
    }
}
