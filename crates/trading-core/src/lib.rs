//! Core types and traits for the trend trader.
//!
//! This crate provides the foundational building blocks including:
//! - Market data types (Candle, CandleWindow)
//! - Order, position and signal types
//! - The `Exchange` capability trait consumed by the position state machine
//! - The `EventBus` that decouples the stream transport from its consumers

pub mod error;
pub mod event_bus;
pub mod traits;
pub mod types;

pub use error::{TradingError, TradingResult};
pub use event_bus::{events, DispatchSummary, EventBus, EventPayload, Handler, HandlerResult};
pub use traits::*;
pub use types::*;
