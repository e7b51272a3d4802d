//! Candle intervals supported by the Bitget candle channels.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Candle interval.
///
/// Rendered the way the exchange spells it (`1m`, `15m`, `1H`, `1D`, ...);
/// minutes are lower-case `m` and months upper-case `M`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "String", into = "String")]
pub enum Timeframe {
    Minute1,
    Minute3,
    Minute5,
    #[default]
    Minute15,
    Minute30,
    Hour1,
    Hour4,
    Hour6,
    Hour12,
    Day1,
    Week1,
    Month1,
}

impl Timeframe {
    /// Get the duration of the timeframe in seconds.
    pub fn as_secs(&self) -> u64 {
        match self {
            Timeframe::Minute1 => 60,
            Timeframe::Minute3 => 180,
            Timeframe::Minute5 => 300,
            Timeframe::Minute15 => 900,
            Timeframe::Minute30 => 1800,
            Timeframe::Hour1 => 3600,
            Timeframe::Hour4 => 14400,
            Timeframe::Hour6 => 21600,
            Timeframe::Hour12 => 43200,
            Timeframe::Day1 => 86400,
            Timeframe::Week1 => 604800,
            Timeframe::Month1 => 2592000, // Approximate (30 days)
        }
    }

    /// Get the duration of the timeframe in milliseconds.
    pub fn as_millis(&self) -> u64 {
        self.as_secs() * 1000
    }

    /// Websocket channel carrying candles of this interval, e.g. `candle15m`.
    pub fn channel(&self) -> String {
        format!("candle{}", self)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Timeframe::Minute1 => "1m",
            Timeframe::Minute3 => "3m",
            Timeframe::Minute5 => "5m",
            Timeframe::Minute15 => "15m",
            Timeframe::Minute30 => "30m",
            Timeframe::Hour1 => "1H",
            Timeframe::Hour4 => "4H",
            Timeframe::Hour6 => "6H",
            Timeframe::Hour12 => "12H",
            Timeframe::Day1 => "1D",
            Timeframe::Week1 => "1W",
            Timeframe::Month1 => "1M",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // `1M` is a month, `1m` a minute; everything else is case-insensitive.
        match s {
            "1M" => return Ok(Timeframe::Month1),
            "1m" => return Ok(Timeframe::Minute1),
            _ => {}
        }
        match s.to_lowercase().as_str() {
            "1min" => Ok(Timeframe::Minute1),
            "3m" | "3min" => Ok(Timeframe::Minute3),
            "5m" | "5min" => Ok(Timeframe::Minute5),
            "15m" | "15min" => Ok(Timeframe::Minute15),
            "30m" | "30min" => Ok(Timeframe::Minute30),
            "1h" => Ok(Timeframe::Hour1),
            "4h" => Ok(Timeframe::Hour4),
            "6h" => Ok(Timeframe::Hour6),
            "12h" => Ok(Timeframe::Hour12),
            "1d" | "day" | "daily" => Ok(Timeframe::Day1),
            "1w" | "week" | "weekly" => Ok(Timeframe::Week1),
            "month" | "monthly" => Ok(Timeframe::Month1),
            _ => Err(format!("Invalid timeframe: {}", s)),
        }
    }
}

impl TryFrom<String> for Timeframe {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timeframe> for String {
    fn from(tf: Timeframe) -> Self {
        tf.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_duration() {
        assert_eq!(Timeframe::Minute1.as_secs(), 60);
        assert_eq!(Timeframe::Hour1.as_secs(), 3600);
        assert_eq!(Timeframe::Day1.as_millis(), 86_400_000);
    }

    #[test]
    fn test_timeframe_parse() {
        assert_eq!(Timeframe::from_str("1m").unwrap(), Timeframe::Minute1);
        assert_eq!(Timeframe::from_str("1M").unwrap(), Timeframe::Month1);
        assert_eq!(Timeframe::from_str("1h").unwrap(), Timeframe::Hour1);
        assert_eq!(Timeframe::from_str("4H").unwrap(), Timeframe::Hour4);
        assert_eq!(Timeframe::from_str("daily").unwrap(), Timeframe::Day1);
        assert!(Timeframe::from_str("7m").is_err());
    }

    #[test]
    fn test_channel_name() {
        assert_eq!(Timeframe::Minute15.channel(), "candle15m");
        assert_eq!(Timeframe::Hour1.channel(), "candle1H");
        assert_eq!(Timeframe::Day1.channel(), "candle1D");
    }

    #[test]
    fn test_serde_uses_exchange_spelling() {
        let json = serde_json::to_string(&Timeframe::Hour4).unwrap();
        assert_eq!(json, "\"4H\"");
        let tf: Timeframe = serde_json::from_str("\"1h\"").unwrap();
        assert_eq!(tf, Timeframe::Hour1);
    }
}
