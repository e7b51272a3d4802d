//! Strategy trait definitions.

use crate::error::StrategyError;
use crate::types::{AppendOutcome, CandleWindow, Signal};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration trait for strategies.
pub trait StrategyConfig: Send + Sync + Clone + 'static {
    /// Validate the configuration.
    fn validate(&self) -> Result<(), StrategyError>;
}

/// State of a strategy for monitoring and serialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyState {
    /// Strategy name
    pub name: String,
    /// Whether the strategy has seen enough candles to classify
    pub is_warmed_up: bool,
    /// Number of candles processed
    pub candles_processed: usize,
    /// Number of non-hold signals produced
    pub signals_generated: usize,
    /// Current indicator values
    pub indicators: HashMap<String, f64>,
    /// Custom strategy-specific state
    pub custom: serde_json::Value,
}

/// Core strategy trait.
///
/// A strategy tracks a `CandleWindow` as it changes and classifies its
/// latest state into a `Signal`.
pub trait Strategy: Send + Sync {
    /// Get the unique name of this strategy.
    fn name(&self) -> &str;

    /// Observe one change to the window.
    ///
    /// Called after every `CandleWindow::append`, with the outcome it
    /// returned, so the strategy can update incrementally or rebuild.
    fn on_candle(&mut self, window: &CandleWindow, outcome: AppendOutcome);

    /// Signal for the window as last observed.
    fn signal(&self) -> Signal;

    /// Classify `window` from scratch, without touching internal state.
    fn evaluate(&self, window: &CandleWindow) -> Signal;

    /// Reset the strategy state.
    fn reset(&mut self);

    /// Get the current strategy state for monitoring.
    fn state(&self) -> StrategyState;

    /// Get the warmup period (number of candles needed before classifying).
    fn warmup_period(&self) -> usize;

    /// Check if the strategy is warmed up (has enough data).
    fn is_warmed_up(&self, candles_available: usize) -> bool {
        candles_available >= self.warmup_period()
    }

    /// Get a description of the strategy.
    fn description(&self) -> &str {
        ""
    }
}
