//! Core data types for the trend trader.

mod candle;
mod order;
mod position;
mod signal;
mod timeframe;

pub use candle::{AppendOutcome, Candle, CandleWindow, WindowPolicy};
pub use order::{
    CloseResponse, MarginMode, OrderRequest, OrderResponse, OrderType, Side, TimeInForce, TradeSide,
};
pub use position::{HoldSide, Instrument, OpenPosition, PositionState};
pub use signal::Signal;
pub use timeframe::Timeframe;
