//! Stream connection lifecycle logging.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};
use trading_core::event_bus::{events, EventBus, EventPayload, Handler};

/// Counts of observed `system.ws_*` events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionStats {
    pub connects: u64,
    pub closes: u64,
    pub errors: u64,
    pub failures: u64,
}

/// Subscriber that logs connection events and keeps counters.
#[derive(Debug, Default)]
pub struct ConnectionMonitor {
    connects: AtomicU64,
    closes: AtomicU64,
    errors: AtomicU64,
    failures: AtomicU64,
}

impl ConnectionMonitor {
    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            connects: self.connects.load(Ordering::Relaxed),
            closes: self.closes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

fn field<'a>(payload: &'a EventPayload, key: &str) -> &'a str {
    payload.get(key).and_then(|v| v.as_str()).unwrap_or("")
}

/// Subscribe a [`ConnectionMonitor`] to the connection events on `bus`.
pub fn attach_connection_monitor(bus: &EventBus) -> Arc<ConnectionMonitor> {
    let monitor = Arc::new(ConnectionMonitor::default());

    let m = Arc::clone(&monitor);
    bus.subscribe(
        events::WS_CONNECTED,
        Handler::immediate(move |payload| {
            m.connects.fetch_add(1, Ordering::Relaxed);
            info!(
                url = field(payload, "url"),
                inst_id = field(payload, "instId"),
                channel = field(payload, "channel"),
                "Websocket connected"
            );
            Ok(())
        }),
    );

    let m = Arc::clone(&monitor);
    bus.subscribe(
        events::WS_CLOSED,
        Handler::immediate(move |payload| {
            m.closes.fetch_add(1, Ordering::Relaxed);
            info!(reason = field(payload, "reason"), "Websocket closed");
            Ok(())
        }),
    );

    let m = Arc::clone(&monitor);
    bus.subscribe(
        events::WS_ERROR,
        Handler::immediate(move |payload| {
            m.errors.fetch_add(1, Ordering::Relaxed);
            warn!(%payload, "Websocket error");
            Ok(())
        }),
    );

    let m = Arc::clone(&monitor);
    bus.subscribe(
        events::WS_FAILED,
        Handler::immediate(move |payload| {
            m.failures.fetch_add(1, Ordering::Relaxed);
            error!(%payload, "Websocket gave up reconnecting");
            Ok(())
        }),
    );

    monitor
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_counts_lifecycle_events() {
        let bus = EventBus::new();
        let monitor = attach_connection_monitor(&bus);

        bus.publish(events::WS_CONNECTED, json!({"url": "ws://localhost"})).await;
        bus.publish(events::WS_CLOSED, json!({"reason": "closed by server"})).await;
        bus.publish(events::WS_CONNECTED, json!({})).await;
        bus.publish(events::WS_ERROR, json!({"error": "boom"})).await;
        bus.publish(events::WS_FAILED, json!({"attempts": 3})).await;
        bus.publish(events::CANDLE_UPDATE, json!([])).await;

        assert_eq!(
            monitor.stats(),
            ConnectionStats {
                connects: 2,
                closes: 1,
                errors: 1,
                failures: 1,
            }
        );
        assert_eq!(bus.handler_count(events::CANDLE_UPDATE), 0);
    }
}
