//! Exchange integrations.
//!
//! - `BitgetClient`: signed REST client for the Bitget v2 mix API
//! - `PaperExchange`: simulated exchange for dry runs and tests

mod bitget;
mod paper;

pub use bitget::{prehash, sign, BitgetClient, BitgetConfig, DEFAULT_BASE_URL};
pub use paper::PaperExchange;
