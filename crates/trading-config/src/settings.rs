//! Configuration structures.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use trading_core::error::TradingError;
use trading_core::traits::StrategyConfig;
use trading_core::types::{Instrument, Timeframe, WindowPolicy};
use trading_data::{ProxyConfig, StreamConfig, DEFAULT_PUBLIC_URL};
use trading_strategies::{MacdCrossConfig, OrderSettings};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub exchange: ExchangeSettings,
    #[serde(default)]
    pub stream: StreamSettings,
    #[serde(default)]
    pub strategy: StrategySettings,
    #[serde(default)]
    pub order: OrderSettings,
}

impl AppConfig {
    /// Reject values the trader cannot run with.
    pub fn validate(&self) -> Result<(), TradingError> {
        self.logging.validate()?;
        self.stream.validate()?;
        self.strategy.validate()?;
        self.order.validate()?;
        if self.stream.inst_type != self.strategy.product_type {
            return Err(TradingError::Config(format!(
                "stream.inst_type ({}) and strategy.product_type ({}) differ",
                self.stream.inst_type, self.strategy.product_type
            )));
        }
        Ok(())
    }

    /// The traded instrument.
    pub fn instrument(&self) -> Instrument {
        self.strategy.instrument(&self.stream.symbol)
    }
}

/// General app settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub name: String,
    pub environment: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "trend-trader".to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
    /// Directory for daily rolling log files
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }

    fn validate(&self) -> Result<(), TradingError> {
        match self.format.to_ascii_lowercase().as_str() {
            "pretty" | "json" => Ok(()),
            other => Err(TradingError::Config(format!(
                "logging.format must be 'pretty' or 'json', got '{other}'"
            ))),
        }
    }
}

/// Bitget REST settings. Credentials come from the named environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeSettings {
    pub base_url: String,
    /// Send `paptrading: 1` so orders go to demo trading
    pub demo: bool,
    pub api_key_env: String,
    pub api_secret_env: String,
    pub passphrase_env: String,
    pub request_timeout_secs: u64,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.bitget.com".to_string(),
            demo: true,
            api_key_env: "BITGET_API_KEY".to_string(),
            api_secret_env: "BITGET_API_SECRET".to_string(),
            passphrase_env: "BITGET_PASSPHRASE".to_string(),
            request_timeout_secs: 10,
        }
    }
}

impl ExchangeSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Websocket subscription settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    pub url: String,
    pub inst_type: String,
    pub symbol: String,
    pub interval: Timeframe,
    pub max_reconnects: u32,
    pub reconnect_base_delay_ms: u64,
    pub ping_interval_secs: u64,
    pub ping_timeout_secs: u64,
    /// HTTP proxy for the websocket connection
    pub proxy: Option<ProxyConfig>,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_PUBLIC_URL.to_string(),
            inst_type: "USDT-FUTURES".to_string(),
            symbol: "BTCUSDT".to_string(),
            interval: Timeframe::Minute15,
            max_reconnects: 3,
            reconnect_base_delay_ms: 3000,
            ping_interval_secs: 30,
            ping_timeout_secs: 10,
            proxy: None,
        }
    }
}

impl StreamSettings {
    pub fn to_stream_config(&self) -> StreamConfig {
        StreamConfig {
            url: self.url.clone(),
            inst_type: self.inst_type.clone(),
            inst_id: self.symbol.clone(),
            interval: self.interval,
            max_reconnects: self.max_reconnects,
            reconnect_base_delay: Duration::from_millis(self.reconnect_base_delay_ms),
            ping_interval: Duration::from_secs(self.ping_interval_secs),
            ping_timeout: Duration::from_secs(self.ping_timeout_secs),
            proxy: self.proxy.clone(),
        }
    }

    fn validate(&self) -> Result<(), TradingError> {
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(TradingError::Config(format!(
                "stream.url must be a ws:// or wss:// url, got '{}'",
                self.url
            )));
        }
        if self.symbol.trim().is_empty() {
            return Err(TradingError::Config("stream.symbol must not be empty".into()));
        }
        if self.ping_interval_secs == 0 || self.ping_timeout_secs == 0 {
            return Err(TradingError::Config(
                "stream ping interval and timeout must be greater than 0".into(),
            ));
        }
        if let Some(proxy) = &self.proxy {
            if proxy.host.trim().is_empty() || proxy.port == 0 {
                return Err(TradingError::Config(format!(
                    "stream.proxy needs a host and a non-zero port, got '{proxy}'"
                )));
            }
        }
        Ok(())
    }
}

/// Signal engine and instrument settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategySettings {
    pub product_type: String,
    pub margin_coin: String,
    pub window_size: usize,
    pub window_policy: WindowPolicy,
    pub fast_period: usize,
    pub slow_period: usize,
    pub signal_period: usize,
}

impl Default for StrategySettings {
    fn default() -> Self {
        let macd = MacdCrossConfig::default();
        Self {
            product_type: "USDT-FUTURES".to_string(),
            margin_coin: "USDT".to_string(),
            window_size: 100,
            window_policy: WindowPolicy::default(),
            fast_period: macd.fast_period,
            slow_period: macd.slow_period,
            signal_period: macd.signal_period,
        }
    }
}

impl StrategySettings {
    pub fn instrument(&self, symbol: &str) -> Instrument {
        Instrument::new(symbol, &self.product_type, &self.margin_coin)
    }

    pub fn macd_config(&self) -> MacdCrossConfig {
        MacdCrossConfig {
            fast_period: self.fast_period,
            slow_period: self.slow_period,
            signal_period: self.signal_period,
        }
    }

    fn validate(&self) -> Result<(), TradingError> {
        if self.window_size < 2 {
            return Err(TradingError::Config(format!(
                "strategy.window_size must be at least 2, got {}",
                self.window_size
            )));
        }
        if self.product_type.trim().is_empty() || self.margin_coin.trim().is_empty() {
            return Err(TradingError::Config(
                "strategy.product_type and strategy.margin_coin must be set".into(),
            ));
        }
        self.macd_config().validate()?;
        Ok(())
    }
}
