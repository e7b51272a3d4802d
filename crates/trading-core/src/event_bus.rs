//! Name-keyed publish/subscribe registry.
//!
//! Handlers for one event run in registration order. A suspending handler is
//! awaited to completion before the next handler starts. A handler that
//! returns an error or panics is logged and skipped; dispatch continues.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::RwLock;
use tracing::{debug, error, trace};

use crate::error::BusError;

/// Event names published by the stream client.
pub mod events {
    /// A `data` frame arrived; payload is the frame's `data` array.
    pub const CANDLE_UPDATE: &str = "candle_update";
    pub const WS_CONNECTED: &str = "system.ws_connected";
    pub const WS_CLOSED: &str = "system.ws_closed";
    pub const WS_ERROR: &str = "system.ws_error";
    /// Reconnect budget exhausted; the client will not retry.
    pub const WS_FAILED: &str = "system.ws_failed";
}

pub type EventPayload = serde_json::Value;
pub type HandlerResult = Result<(), BusError>;

type ImmediateFn = dyn Fn(&EventPayload) -> HandlerResult + Send + Sync;
type SuspendingFn = dyn Fn(EventPayload) -> BoxFuture<'static, HandlerResult> + Send + Sync;

/// A registered callback.
///
/// Cloning a handler keeps its identity, so the clone can later be passed to
/// `EventBus::unsubscribe`.
#[derive(Clone)]
pub enum Handler {
    /// Runs to completion inside `publish`.
    Immediate(Arc<ImmediateFn>),
    /// Returns a future that `publish` awaits before moving on.
    Suspending(Arc<SuspendingFn>),
}

impl Handler {
    pub fn immediate<F>(f: F) -> Self
    where
        F: Fn(&EventPayload) -> HandlerResult + Send + Sync + 'static,
    {
        Handler::Immediate(Arc::new(f))
    }

    pub fn suspending<F, Fut>(f: F) -> Self
    where
        F: Fn(EventPayload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Handler::Suspending(Arc::new(move |payload| f(payload).boxed()))
    }

    /// Identity comparison: true only for clones of the same handler.
    pub fn same_as(&self, other: &Handler) -> bool {
        match (self, other) {
            (Handler::Immediate(a), Handler::Immediate(b)) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
            }
            (Handler::Suspending(a), Handler::Suspending(b)) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
            }
            _ => false,
        }
    }

    async fn invoke(&self, payload: &EventPayload) -> HandlerResult {
        match self {
            Handler::Immediate(f) => match catch_unwind(AssertUnwindSafe(|| f(payload))) {
                Ok(result) => result,
                Err(panic) => Err(BusError::HandlerFailed(panic_message(panic))),
            },
            Handler::Suspending(f) => {
                let fut = match catch_unwind(AssertUnwindSafe(|| f(payload.clone()))) {
                    Ok(fut) => fut,
                    Err(panic) => return Err(BusError::HandlerFailed(panic_message(panic))),
                };
                match AssertUnwindSafe(fut).catch_unwind().await {
                    Ok(result) => result,
                    Err(panic) => Err(BusError::HandlerFailed(panic_message(panic))),
                }
            }
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Immediate(h) => write!(f, "Handler::Immediate({:p})", Arc::as_ptr(h) as *const ()),
            Handler::Suspending(h) => write!(f, "Handler::Suspending({:p})", Arc::as_ptr(h) as *const ()),
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

/// Counts from one `publish` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub invoked: usize,
    pub failed: usize,
}

/// Publish/subscribe registry shared by reference (`Arc<EventBus>`).
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<HashMap<String, Vec<Handler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `handler` to the list for `event`. The same handler may be registered twice.
    pub fn subscribe(&self, event: &str, handler: Handler) {
        let mut handlers = self.handlers.write();
        let list = handlers.entry(event.to_string()).or_default();
        list.push(handler);
        debug!(event, handlers = list.len(), "Handler subscribed");
    }

    /// Remove the first registration of `handler` for `event`.
    pub fn unsubscribe(&self, event: &str, handler: &Handler) -> Result<(), BusError> {
        let mut handlers = self.handlers.write();
        let not_found = || BusError::NotFound {
            event: event.to_string(),
        };
        let list = handlers.get_mut(event).ok_or_else(not_found)?;
        let idx = list
            .iter()
            .position(|h| h.same_as(handler))
            .ok_or_else(not_found)?;
        list.remove(idx);
        if list.is_empty() {
            handlers.remove(event);
        }
        debug!(event, "Handler unsubscribed");
        Ok(())
    }

    pub fn handler_count(&self, event: &str) -> usize {
        self.handlers.read().get(event).map_or(0, Vec::len)
    }

    /// Invoke every handler currently registered for `event`, in order.
    ///
    /// The handler list is captured when the call starts; handlers added or
    /// removed during dispatch take effect on the next publish.
    pub async fn publish(&self, event: &str, payload: EventPayload) -> DispatchSummary {
        let handlers: Vec<Handler> = {
            let registry = self.handlers.read();
            registry.get(event).cloned().unwrap_or_default()
        };
        if handlers.is_empty() {
            trace!(event, "No subscribers");
            return DispatchSummary::default();
        }

        let mut summary = DispatchSummary::default();
        for (idx, handler) in handlers.iter().enumerate() {
            summary.invoked += 1;
            if let Err(e) = handler.invoke(&payload).await {
                summary.failed += 1;
                error!(event, handler = idx, error = %e, "Event handler failed");
            }
        }
        summary
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.read();
        let mut map = f.debug_map();
        for (event, list) in handlers.iter() {
            map.entry(event, &list.len());
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> Handler {
        let log = log.clone();
        Handler::immediate(move |_| {
            log.lock().push(tag.to_string());
            Ok(())
        })
    }

    #[tokio::test]
    async fn test_dispatch_in_registration_order() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        bus.subscribe("tick", recorder(&log, "a"));
        let log_b = log.clone();
        bus.subscribe(
            "tick",
            Handler::suspending(move |_| {
                let log = log_b.clone();
                async move {
                    tokio::task::yield_now().await;
                    log.lock().push("b".to_string());
                    Ok(())
                }
            }),
        );
        bus.subscribe("tick", recorder(&log, "c"));

        let summary = bus.publish("tick", json!({})).await;

        assert_eq!(summary, DispatchSummary { invoked: 3, failed: 0 });
        assert_eq!(*log.lock(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_stop_dispatch() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        bus.subscribe(
            "tick",
            Handler::immediate(|_| Err(BusError::HandlerFailed("boom".into()))),
        );
        bus.subscribe("tick", recorder(&log, "second"));

        let summary = bus.publish("tick", json!(1)).await;

        assert_eq!(summary.failed, 1);
        assert_eq!(*log.lock(), vec!["second"]);
    }

    #[tokio::test]
    async fn test_panicking_handlers_are_isolated() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        bus.subscribe("tick", Handler::immediate(|_| panic!("immediate")));
        bus.subscribe(
            "tick",
            Handler::suspending(|_| async {
                if true {
                    panic!("suspending");
                }
                Ok(())
            }),
        );
        bus.subscribe("tick", recorder(&log, "survivor"));

        let summary = bus.publish("tick", json!(null)).await;

        assert_eq!(summary, DispatchSummary { invoked: 3, failed: 2 });
        assert_eq!(*log.lock(), vec!["survivor"]);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_noop() {
        let bus = EventBus::new();
        let summary = bus.publish("nobody", json!({"x": 1})).await;
        assert_eq!(summary, DispatchSummary::default());
    }

    #[tokio::test]
    async fn test_payload_reaches_handlers() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        bus.subscribe(
            events::CANDLE_UPDATE,
            Handler::suspending(move |payload| {
                let sink = sink.clone();
                async move {
                    *sink.lock() = Some(payload);
                    Ok(())
                }
            }),
        );

        bus.publish(events::CANDLE_UPDATE, json!([["1", "2"]])).await;
        assert_eq!(*seen.lock(), Some(json!([["1", "2"]])));
    }

    #[tokio::test]
    async fn test_unsubscribe_removes_first_registration_only() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let handler = recorder(&log, "dup");

        bus.subscribe("tick", handler.clone());
        bus.subscribe("tick", handler.clone());
        assert_eq!(bus.handler_count("tick"), 2);

        bus.unsubscribe("tick", &handler).unwrap();
        assert_eq!(bus.handler_count("tick"), 1);

        bus.publish("tick", json!(null)).await;
        assert_eq!(log.lock().len(), 1);
    }

    #[test]
    fn test_unsubscribe_unknown_handler_fails() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let registered = recorder(&log, "a");
        let stranger = recorder(&log, "a");

        assert!(matches!(
            bus.unsubscribe("tick", &registered),
            Err(BusError::NotFound { .. })
        ));

        bus.subscribe("tick", registered);
        assert!(matches!(
            bus.unsubscribe("tick", &stranger),
            Err(BusError::NotFound { .. })
        ));
        assert_eq!(bus.handler_count("tick"), 1);
    }
}
