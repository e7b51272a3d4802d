//! Error types for the trend trader.

use rust_decimal::Decimal;
use thiserror::Error;

/// Top-level trading system error.
#[derive(Error, Debug)]
pub enum TradingError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Strategy error: {0}")]
    Strategy(#[from] StrategyError),

    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("Event bus error: {0}")]
    Bus(#[from] BusError),

    #[error("Indicator error: {0}")]
    Indicator(#[from] IndicatorError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Strategy-specific errors.
#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Malformed candle: {0}")]
    MalformedCandle(String),

    #[error("Strategy error: {0}")]
    Internal(String),
}

/// Errors raised by an exchange implementation.
#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("API error {code}: {msg}")]
    Api { code: String, msg: String },

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: Decimal, available: Decimal },

    #[error("Order rejected: {0}")]
    OrderRejected(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Decode error: {0}")]
    Decode(String),
}

/// Streaming connection errors.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Connect failed: {0}")]
    Connect(String),

    #[error("Proxy tunnel failed: {0}")]
    Proxy(String),

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Stream client is already running")]
    AlreadyRunning,
}

/// Event bus errors.
#[derive(Error, Debug)]
pub enum BusError {
    #[error("No matching handler registered for event '{event}'")]
    NotFound { event: String },

    #[error("Handler failed: {0}")]
    HandlerFailed(String),
}

/// Indicator calculation errors.
#[derive(Error, Debug)]
pub enum IndicatorError {
    #[error("Insufficient data: need {required} points, have {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl From<StrategyError> for BusError {
    fn from(err: StrategyError) -> Self {
        BusError::HandlerFailed(err.to_string())
    }
}

/// Result type alias for trading operations.
pub type TradingResult<T> = Result<T, TradingError>;
