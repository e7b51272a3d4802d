//! Exponential moving average.

use trading_core::traits::{Indicator, StreamingIndicator};

/// Exponential Moving Average (EMA).
///
/// Seeded with the first sample: `EMA[0] = x[0]`, then
/// `EMA[i] = x[i] * α + EMA[i-1] * (1 - α)` with `α = 2 / (period + 1)`.
/// Produces one value per input sample.
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    multiplier: f64,
}

impl Ema {
    /// Create a new EMA with the specified period.
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "Period must be greater than 0");
        let multiplier = 2.0 / (period as f64 + 1.0);
        Self { period, multiplier }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }
}

impl Indicator for Ema {
    type Output = f64;

    fn calculate(&self, data: &[f64]) -> Vec<f64> {
        let mut result = Vec::with_capacity(data.len());
        let Some((&first, rest)) = data.split_first() else {
            return result;
        };

        let one_minus_mult = 1.0 - self.multiplier;
        let mut ema = first;
        result.push(ema);
        for &price in rest {
            ema = price * self.multiplier + ema * one_minus_mult;
            result.push(ema);
        }

        result
    }

    fn min_samples(&self) -> usize {
        1
    }

    fn name(&self) -> &str {
        "EMA"
    }
}

/// Streaming EMA that maintains state for incremental updates.
#[derive(Debug, Clone)]
pub struct StreamingEma {
    multiplier: f64,
    one_minus_mult: f64,
    current: Option<f64>,
}

impl StreamingEma {
    /// Create a new streaming EMA.
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "Period must be greater than 0");
        let multiplier = 2.0 / (period as f64 + 1.0);
        Self {
            multiplier,
            one_minus_mult: 1.0 - multiplier,
            current: None,
        }
    }

    /// Fold in one sample and return the new average.
    #[inline]
    pub fn push(&mut self, value: f64) -> f64 {
        let next = match self.current {
            None => value,
            Some(prev) => value * self.multiplier + prev * self.one_minus_mult,
        };
        self.current = Some(next);
        next
    }
}

impl StreamingIndicator for StreamingEma {
    type Output = f64;

    fn update(&mut self, value: f64) -> Option<f64> {
        Some(self.push(value))
    }

    fn current(&self) -> Option<f64> {
        self.current
    }

    fn reset(&mut self) {
        self.current = None;
    }

    fn is_ready(&self) -> bool {
        self.current.is_some()
    }

    fn name(&self) -> &str {
        "EMA"
    }
}
