//! Trading strategy implementations.
//!
//! This crate provides:
//! - The MACD crossover signal engine
//! - The position state machine that turns signals into orders
//! - `TrendTrader`, which connects both to the event bus

mod macd_cross;
mod position_machine;
mod trader;

pub use macd_cross::{classify_crossover, MacdCrossConfig, MacdCrossStrategy};
pub use position_machine::{
    transition, Action, ConfirmationPolicy, OrderSettings, Outcome, PositionStateMachine,
    SkipReason,
};
pub use trader::TrendTrader;
