//! Validate configuration command.

use anyhow::{Context, Result};
use std::path::Path;
use trading_config::AppConfig;

pub fn run(config_path: &Path, config: &AppConfig) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());

    if let Err(e) = config.validate() {
        println!("Configuration error: {e}");
        return Err(e.into());
    }

    let rendered = toml::to_string_pretty(config).context("failed to render configuration")?;
    println!("Configuration is valid!");
    println!();
    println!("{rendered}");
    Ok(())
}
