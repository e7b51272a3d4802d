//! Logging setup.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// File name prefix of the daily rolling log.
pub const LOG_FILE_PREFIX: &str = "trend-trader.log";

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `level`. With `log_dir` set, JSON lines
/// are also written to a daily rolling file there; keep the returned guard
/// alive until shutdown so buffered lines get flushed.
pub fn setup_logging(
    level: &str,
    json: bool,
    log_dir: Option<&Path>,
) -> Result<Option<WorkerGuard>, TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    let (json_layer, pretty_layer) = if json {
        (Some(fmt::layer().json()), None)
    } else {
        (None, Some(fmt::layer().pretty()))
    };

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(pretty_layer)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_logging() {
        let dir = tempfile::tempdir().unwrap();
        let guard = setup_logging("info", false, Some(dir.path())).unwrap();
        assert!(guard.is_some());

        tracing::info!(symbol = "BTCUSDT", "file logging test");
        drop(guard);

        let files: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(LOG_FILE_PREFIX))
            .collect();
        assert_eq!(files.len(), 1);

        let contents = std::fs::read_to_string(files[0].path()).unwrap();
        assert!(contents.contains("file logging test"));

        // a second subscriber cannot be installed
        assert!(setup_logging("info", true, None).is_err());
    }
}
