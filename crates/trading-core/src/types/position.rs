//! Position and instrument types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The (symbol, product type, margin coin) triple a strategy instance trades.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    pub product_type: String,
    pub margin_coin: String,
}

impl Instrument {
    pub fn new(
        symbol: impl Into<String>,
        product_type: impl Into<String>,
        margin_coin: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            product_type: product_type.into(),
            margin_coin: margin_coin.into(),
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.symbol, self.product_type, self.margin_coin)
    }
}

/// Direction of a held position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HoldSide {
    Long,
    Short,
}

impl fmt::Display for HoldSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HoldSide::Long => write!(f, "long"),
            HoldSide::Short => write!(f, "short"),
        }
    }
}

impl FromStr for HoldSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "long" => Ok(HoldSide::Long),
            "short" => Ok(HoldSide::Short),
            _ => Err(format!("Invalid hold side: {}", s)),
        }
    }
}

/// A position currently open on the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub symbol: String,
    pub hold_side: HoldSide,
    /// Total size in base coin
    pub total: Decimal,
    /// Size that can still be closed
    pub available: Decimal,
    pub open_price_avg: Decimal,
    pub leverage: Decimal,
    pub unrealized_pnl: Decimal,
}

impl OpenPosition {
    pub fn new(symbol: impl Into<String>, hold_side: HoldSide, total: Decimal, open_price_avg: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            hold_side,
            total,
            available: total,
            open_price_avg,
            leverage: Decimal::ONE,
            unrealized_pnl: Decimal::ZERO,
        }
    }

    pub fn with_leverage(mut self, leverage: Decimal) -> Self {
        self.leverage = leverage;
        self
    }

    /// Mark-to-market PnL at `price`.
    pub fn pnl_at(&self, price: Decimal) -> Decimal {
        let diff = price - self.open_price_avg;
        match self.hold_side {
            HoldSide::Long => diff * self.total,
            HoldSide::Short => -diff * self.total,
        }
    }
}

/// Position state held by one strategy instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionState {
    /// Flat, waiting for an entry signal
    #[default]
    ToOrder,
    OrderedLong,
    OrderedShort,
}

impl PositionState {
    /// Derive the state from the exchange's view of the current position.
    pub fn from_position(position: Option<&OpenPosition>) -> Self {
        match position.map(|p| p.hold_side) {
            None => PositionState::ToOrder,
            Some(HoldSide::Long) => PositionState::OrderedLong,
            Some(HoldSide::Short) => PositionState::OrderedShort,
        }
    }

    /// The side currently held, if any.
    pub fn held_side(&self) -> Option<HoldSide> {
        match self {
            PositionState::ToOrder => None,
            PositionState::OrderedLong => Some(HoldSide::Long),
            PositionState::OrderedShort => Some(HoldSide::Short),
        }
    }
}

impl fmt::Display for PositionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionState::ToOrder => write!(f, "toOrder"),
            PositionState::OrderedLong => write!(f, "ordered_long"),
            PositionState::OrderedShort => write!(f, "ordered_short"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_state_from_position() {
        assert_eq!(PositionState::from_position(None), PositionState::ToOrder);

        let long = OpenPosition::new("BTCUSDT", HoldSide::Long, dec!(0.1), dec!(26000));
        assert_eq!(PositionState::from_position(Some(&long)), PositionState::OrderedLong);

        let short = OpenPosition::new("BTCUSDT", HoldSide::Short, dec!(0.1), dec!(26000));
        assert_eq!(PositionState::from_position(Some(&short)), PositionState::OrderedShort);
    }

    #[test]
    fn test_held_side() {
        assert_eq!(PositionState::ToOrder.held_side(), None);
        assert_eq!(PositionState::OrderedLong.held_side(), Some(HoldSide::Long));
        assert_eq!(PositionState::OrderedShort.held_side(), Some(HoldSide::Short));
    }

    #[test]
    fn test_pnl_at() {
        let long = OpenPosition::new("BTCUSDT", HoldSide::Long, dec!(2), dec!(100));
        assert_eq!(long.pnl_at(dec!(110)), dec!(20));

        let short = OpenPosition::new("BTCUSDT", HoldSide::Short, dec!(2), dec!(100));
        assert_eq!(short.pnl_at(dec!(110)), dec!(-20));
    }

    #[test]
    fn test_hold_side_parse() {
        assert_eq!("long".parse::<HoldSide>().unwrap(), HoldSide::Long);
        assert_eq!("SHORT".parse::<HoldSide>().unwrap(), HoldSide::Short);
        assert!("net".parse::<HoldSide>().is_err());
    }
}
