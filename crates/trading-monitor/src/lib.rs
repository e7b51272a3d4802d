//! Logging and connection monitoring.

mod connection;
mod logging;

pub use connection::{attach_connection_monitor, ConnectionMonitor, ConnectionStats};
pub use logging::{setup_logging, LOG_FILE_PREFIX};
