//! Indicator trait definitions.

use crate::error::IndicatorError;

/// Batch indicator over a price series.
pub trait Indicator: Send + Sync {
    /// The output type of the indicator.
    type Output;

    /// Calculate one output per input sample.
    fn calculate(&self, data: &[f64]) -> Vec<Self::Output>;

    /// Get the minimum data points required.
    fn min_samples(&self) -> usize;

    /// Get the name of the indicator.
    fn name(&self) -> &str;

    /// Validate that there's enough data.
    fn validate_data(&self, data: &[f64]) -> Result<(), IndicatorError> {
        if data.len() < self.min_samples() {
            return Err(IndicatorError::InsufficientData {
                required: self.min_samples(),
                available: data.len(),
            });
        }
        Ok(())
    }
}

/// Streaming indicator that maintains internal state.
///
/// Unlike batch indicators, streaming indicators can be updated
/// incrementally with new data points.
pub trait StreamingIndicator: Send + Sync {
    /// The output type of the indicator.
    type Output;

    /// Update the indicator with a new value.
    ///
    /// # Returns
    /// The current indicator value, or None if not yet ready
    fn update(&mut self, value: f64) -> Option<Self::Output>;

    /// Get the current value without adding new data.
    fn current(&self) -> Option<Self::Output>;

    /// Reset the indicator state.
    fn reset(&mut self);

    /// Check if the indicator has enough data to produce values.
    fn is_ready(&self) -> bool;

    /// Get the name of the indicator.
    fn name(&self) -> &str;
}
