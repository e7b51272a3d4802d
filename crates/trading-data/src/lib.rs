//! Market data streaming.
//!
//! `StreamClient` keeps one websocket subscription alive and republishes
//! inbound frames on an [`EventBus`](trading_core::EventBus).

mod frame;
mod proxy;
mod stream;

pub use frame::{parse_frame, InboundFrame, SubscribeRequest, SubscriptionArg};
pub use proxy::ProxyConfig;
pub use stream::{ConnectionState, StreamClient, StreamConfig, StreamHandle, DEFAULT_PUBLIC_URL};
