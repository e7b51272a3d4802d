//! Core traits for the trend trader.

mod exchange;
mod indicator;
mod strategy;

pub use exchange::Exchange;
pub use indicator::{Indicator, StreamingIndicator};
pub use strategy::{Strategy, StrategyConfig, StrategyState};
