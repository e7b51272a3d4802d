//! Order types and structures.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{HoldSide, Instrument};

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Get the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Side that opens a position on `hold_side` in one-way hedge mode.
    pub fn opening(hold_side: HoldSide) -> Self {
        match hold_side {
            HoldSide::Long => Side::Buy,
            HoldSide::Short => Side::Sell,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    /// Execute immediately at best available price
    #[default]
    Market,
    /// Execute at specified price or better
    Limit,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Market => write!(f, "market"),
            OrderType::Limit => write!(f, "limit"),
        }
    }
}

/// Time in force for orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimeInForce {
    /// Good til canceled
    #[default]
    Gtc,
    /// Immediate or cancel
    Ioc,
    /// Fill or kill
    Fok,
    /// Maker only
    PostOnly,
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeInForce::Gtc => write!(f, "gtc"),
            TimeInForce::Ioc => write!(f, "ioc"),
            TimeInForce::Fok => write!(f, "fok"),
            TimeInForce::PostOnly => write!(f, "post_only"),
        }
    }
}

/// Margin mode of a futures position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MarginMode {
    #[default]
    Crossed,
    Isolated,
}

impl fmt::Display for MarginMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarginMode::Crossed => write!(f, "crossed"),
            MarginMode::Isolated => write!(f, "isolated"),
        }
    }
}

/// Whether an order opens or reduces a hedge-mode position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Open,
    Close,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Open => write!(f, "open"),
            TradeSide::Close => write!(f, "close"),
        }
    }
}

/// Order request for submitting new orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Symbol to trade
    pub symbol: String,
    /// Product line, e.g. `USDT-FUTURES`
    pub product_type: String,
    pub margin_mode: MarginMode,
    /// Margin coin, e.g. `USDT`
    pub margin_coin: String,
    /// Reference price; ignored by the exchange for market orders
    pub price: Option<Decimal>,
    /// Quantity in base coin
    pub size: Decimal,
    pub side: Side,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    pub reduce_only: Option<bool>,
    /// Client-provided order ID
    pub client_order_id: Option<String>,
    pub trade_side: Option<TradeSide>,
}

impl OrderRequest {
    /// Market order that opens a position on `instrument`.
    pub fn market_open(
        instrument: &Instrument,
        side: Side,
        size: Decimal,
        price: Decimal,
        margin_mode: MarginMode,
    ) -> Self {
        Self {
            symbol: instrument.symbol.clone(),
            product_type: instrument.product_type.clone(),
            margin_mode,
            margin_coin: instrument.margin_coin.clone(),
            price: Some(price),
            size,
            side,
            order_type: OrderType::Market,
            time_in_force: TimeInForce::Gtc,
            reduce_only: None,
            client_order_id: None,
            trade_side: Some(TradeSide::Open),
        }
    }

    pub fn with_time_in_force(mut self, tif: TimeInForce) -> Self {
        self.time_in_force = tif;
        self
    }

    pub fn with_client_order_id(mut self, id: impl Into<String>) -> Self {
        self.client_order_id = Some(id.into());
        self
    }
}

/// Exchange acknowledgement of a placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderResponse {
    pub order_id: String,
    pub client_order_id: Option<String>,
}

/// Result of a flatten-position request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseResponse {
    /// Order ids of the closing orders that were accepted
    pub closed: Vec<String>,
    /// Error messages for the closing orders that were not
    pub failed: Vec<String>,
}

impl CloseResponse {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}
