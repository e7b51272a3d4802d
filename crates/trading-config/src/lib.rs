//! Configuration management.
//!
//! Values come from a TOML file, then from `TRADING__<SECTION>__<KEY>`
//! environment variables.

mod settings;

pub use settings::{
    AppConfig, AppSettings, ExchangeSettings, LoggingConfig, StrategySettings, StreamSettings,
};

use config::{Config, ConfigError, Environment, File};
use std::path::Path;

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "TRADING";

/// Load configuration from file and environment.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    load_with_prefix(path, ENV_PREFIX)
}

fn load_with_prefix(path: &Path, prefix: &str) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from(path).required(true))
        .add_source(
            Environment::with_prefix(prefix)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;
    use std::time::Duration;
    use trading_core::types::{Timeframe, WindowPolicy};
    use trading_data::ProxyConfig;
    use trading_strategies::ConfirmationPolicy;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();

        assert_eq!(config.stream.symbol, "BTCUSDT");
        assert_eq!(config.stream.interval, Timeframe::Minute15);
        assert_eq!(config.strategy.window_size, 100);
        assert_eq!(config.strategy.window_policy, WindowPolicy::Monotonic);
        assert_eq!(config.order.min_balance, dec!(10));
        assert_eq!(config.order.leverage, dec!(20));
        assert_eq!(config.order.confirmation, ConfirmationPolicy::Optimistic);

        let stream = config.stream.to_stream_config();
        assert_eq!(stream.max_reconnects, 3);
        assert_eq!(stream.reconnect_base_delay, Duration::from_secs(3));
        assert_eq!(stream.subscribe_request().args[0].channel, "candle15m");
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let file = write_config(
            r#"
            [stream]
            symbol = "ETHUSDT"
            interval = "1H"

            [strategy]
            window_size = 50
            window_policy = "accept_all"

            [order]
            balance_fraction = 0.5
            confirmation = "reconcile"
            "#,
        );

        let config = load_with_prefix(file.path(), "TRADING_UNUSED_PREFIX").unwrap();
        config.validate().unwrap();

        assert_eq!(config.stream.symbol, "ETHUSDT");
        assert_eq!(config.stream.interval, Timeframe::Hour1);
        assert_eq!(config.stream.max_reconnects, 3);
        assert_eq!(config.strategy.window_size, 50);
        assert_eq!(config.strategy.window_policy, WindowPolicy::AcceptAll);
        assert_eq!(config.order.balance_fraction, dec!(0.5));
        assert_eq!(config.order.leverage, dec!(20));
        assert_eq!(config.order.confirmation, ConfirmationPolicy::Reconcile);
        assert_eq!(config.instrument().symbol, "ETHUSDT");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_logging_and_app_sections_load() {
        let file = write_config(
            r#"
            [app]
            environment = "production"

            [logging]
            level = "debug"
            "#,
        );

        let config = load_with_prefix(file.path(), "TRADING_UNUSED_PREFIX").unwrap();
        config.validate().unwrap();

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "pretty");
        assert_eq!(config.logging.file, None);
        assert_eq!(config.app.name, "trend-trader");
        assert_eq!(config.app.environment, "production");
    }

    #[test]
    fn test_stream_proxy_section() {
        let file = write_config(
            r#"
            [stream.proxy]
            host = "127.0.0.1"
            port = 10809
            "#,
        );

        let config = load_with_prefix(file.path(), "TRADING_UNUSED_PREFIX").unwrap();
        config.validate().unwrap();

        let expected = ProxyConfig::new("127.0.0.1", 10809);
        assert_eq!(config.stream.proxy, Some(expected.clone()));
        assert_eq!(config.stream.to_stream_config().proxy, Some(expected));
        assert_eq!(AppConfig::default().stream.to_stream_config().proxy, None);

        let mut config = AppConfig::default();
        config.stream.proxy = Some(ProxyConfig::new("", 10809));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides_file() {
        let file = write_config(
            r#"
            [stream]
            symbol = "ETHUSDT"
            "#,
        );
        std::env::set_var("TRADING_TEST__STREAM__SYMBOL", "SOLUSDT");
        std::env::set_var("TRADING_TEST__STREAM__MAX_RECONNECTS", "7");

        let config = load_with_prefix(file.path(), "TRADING_TEST").unwrap();

        std::env::remove_var("TRADING_TEST__STREAM__SYMBOL");
        std::env::remove_var("TRADING_TEST__STREAM__MAX_RECONNECTS");

        assert_eq!(config.stream.symbol, "SOLUSDT");
        assert_eq!(config.stream.max_reconnects, 7);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(load_config(Path::new("/nonexistent/trend-trader.toml")).is_err());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.strategy.slow_period = 5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.strategy.window_size = 1;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.stream.url = "https://ws.bitget.com".into();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.order.balance_fraction = dec!(1.5);
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.logging.format = "xml".into();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.strategy.product_type = "COIN-FUTURES".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_effective_config_renders_as_toml() {
        let rendered = toml::to_string_pretty(&AppConfig::default()).unwrap();
        assert!(rendered.contains("[stream]"));
        assert!(rendered.contains("interval = \"15m\""));

        let parsed: AppConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.stream.symbol, "BTCUSDT");
        assert_eq!(parsed.order.min_balance, dec!(10));
    }
}
