//! Trend indicators used by the signal engine.
//!
//! This crate provides:
//! - Exponential moving average, seeded with the first sample
//! - MACD (DIF, DEA, histogram) built on top of it
//!
//! Each indicator has a batch form over a price slice and a streaming form
//! that is updated one sample at a time. Both forms produce identical values
//! for identical input.

pub mod macd;
pub mod moving_average;

pub use macd::{Macd, MacdParams, MacdPoint, StreamingMacd};
pub use moving_average::{Ema, StreamingEma};
