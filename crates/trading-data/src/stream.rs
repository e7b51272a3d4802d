//! Persistent websocket subscription with bounded reconnection.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, sleep_until, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{client_async_tls, connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, trace, warn};

use trading_core::error::StreamError;
use trading_core::event_bus::{events, EventBus};
use trading_core::types::Timeframe;

use crate::frame::{parse_frame, InboundFrame, SubscribeRequest, SubscriptionArg};
use crate::proxy::ProxyConfig;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const DEFAULT_PUBLIC_URL: &str = "wss://ws.bitget.com/v2/ws/public";

/// Stream client settings.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub url: String,
    pub inst_type: String,
    pub inst_id: String,
    pub interval: Timeframe,
    /// Reconnects allowed after an abnormal close before giving up
    pub max_reconnects: u32,
    /// Delay before reconnect `n` is `reconnect_base_delay * n`
    pub reconnect_base_delay: Duration,
    pub ping_interval: Duration,
    /// No pong within this window after a ping closes the connection
    pub ping_timeout: Duration,
    /// Tunnel the connection through this HTTP proxy
    pub proxy: Option<ProxyConfig>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_PUBLIC_URL.to_string(),
            inst_type: "USDT-FUTURES".to_string(),
            inst_id: "BTCUSDT".to_string(),
            interval: Timeframe::Minute15,
            max_reconnects: 3,
            reconnect_base_delay: Duration::from_secs(3),
            ping_interval: Duration::from_secs(30),
            ping_timeout: Duration::from_secs(10),
            proxy: None,
        }
    }
}

impl StreamConfig {
    pub fn subscribe_request(&self) -> SubscribeRequest {
        SubscribeRequest::subscribe(vec![SubscriptionArg {
            inst_type: self.inst_type.clone(),
            channel: self.interval.channel(),
            inst_id: self.inst_id.clone(),
        }])
    }
}

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
    Reconnecting,
    /// Reconnect budget exhausted
    Failed,
}

enum SessionEnd {
    Stopped,
    Abnormal(String),
}

struct Inner {
    config: StreamConfig,
    bus: Arc<EventBus>,
    state: Mutex<ConnectionState>,
    attempts: AtomicU32,
    running: AtomicBool,
    stop: watch::Sender<bool>,
}

/// Websocket client publishing inbound frames on the event bus.
///
/// Publishes `candle_update` with the `data` field of every data frame and
/// the `system.ws_*` lifecycle events. Handlers run on the receive task.
#[derive(Clone)]
pub struct StreamClient {
    inner: Arc<Inner>,
}

/// Receive task of a connected [`StreamClient`].
pub struct StreamHandle {
    task: JoinHandle<()>,
}

impl StreamHandle {
    /// Wait for the receive task to finish.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            error!(error = %e, "Stream task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl StreamClient {
    pub fn new(config: StreamConfig, bus: Arc<EventBus>) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                config,
                bus,
                state: Mutex::new(ConnectionState::Disconnected),
                attempts: AtomicU32::new(0),
                running: AtomicBool::new(false),
                stop,
            }),
        }
    }

    /// Spawn the receive task.
    ///
    /// Fails with `AlreadyRunning` while a previous task is alive.
    pub fn connect(&self) -> Result<StreamHandle, StreamError> {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return Err(StreamError::AlreadyRunning);
        }

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            inner.run().await;
            inner.running.store(false, Ordering::SeqCst);
        });
        Ok(StreamHandle { task })
    }

    /// Stop the client. Interrupts a pending reconnect delay. Idempotent.
    pub fn close(&self) {
        let already = self.inner.stop.send_replace(true);
        if !already {
            info!(url = %self.inner.config.url, "Stream close requested");
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.lock()
    }

    /// Consecutive reconnects since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &StreamConfig {
        &self.inner.config
    }
}

fn is_stopped(stop: &watch::Receiver<bool>) -> bool {
    *stop.borrow()
}

async fn stopped(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|stopped| *stopped).await;
}

impl Inner {
    fn set_state(&self, state: ConnectionState) {
        *self.state.lock() = state;
    }

    async fn emit(&self, event: &str, payload: Value) {
        self.bus.publish(event, payload).await;
    }

    async fn report_error(&self, err: &StreamError) {
        warn!(error = %err, "Stream error");
        self.emit(events::WS_ERROR, json!({ "error": err.to_string() }))
            .await;
    }

    async fn run(&self) {
        let mut stop = self.stop.subscribe();

        loop {
            if is_stopped(&stop) {
                break;
            }
            self.set_state(ConnectionState::Connecting);

            let reason = match self.session(&mut stop).await {
                SessionEnd::Stopped => break,
                SessionEnd::Abnormal(reason) => reason,
            };
            self.emit(events::WS_CLOSED, json!({ "reason": reason })).await;

            if is_stopped(&stop) {
                break;
            }

            let attempts = self.attempts.load(Ordering::SeqCst);
            if attempts >= self.config.max_reconnects {
                self.set_state(ConnectionState::Failed);
                error!(
                    attempts,
                    max_reconnects = self.config.max_reconnects,
                    %reason,
                    "Reconnect budget exhausted"
                );
                self.emit(
                    events::WS_FAILED,
                    json!({ "attempts": attempts, "reason": reason }),
                )
                .await;
                return;
            }

            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let delay = self.config.reconnect_base_delay * attempt;
            self.set_state(ConnectionState::Reconnecting);
            warn!(
                attempt,
                max_reconnects = self.config.max_reconnects,
                delay_ms = delay.as_millis() as u64,
                %reason,
                "Reconnecting"
            );

            tokio::select! {
                _ = stopped(&mut stop) => break,
                _ = sleep(delay) => {}
            }
        }

        self.set_state(ConnectionState::Disconnected);
        info!(url = %self.config.url, "Stream client stopped");
    }

    async fn open(&self) -> Result<WsStream, StreamError> {
        let url = self.config.url.as_str();
        let connected = match &self.config.proxy {
            Some(proxy) => {
                let tunnel = proxy.tunnel(url).await?;
                client_async_tls(url, tunnel).await
            }
            None => connect_async(url).await,
        };
        connected
            .map(|(ws, _)| ws)
            .map_err(|e| StreamError::Connect(e.to_string()))
    }

    async fn session(&self, stop: &mut watch::Receiver<bool>) -> SessionEnd {
        let url = self.config.url.as_str();
        match &self.config.proxy {
            Some(proxy) => info!(url, %proxy, "Connecting to stream through proxy"),
            None => info!(url, "Connecting to stream"),
        }

        let connected = tokio::select! {
            _ = stopped(stop) => return SessionEnd::Stopped,
            result = self.open() => result,
        };
        let ws = match connected {
            Ok(ws) => ws,
            Err(err) => {
                self.report_error(&err).await;
                return SessionEnd::Abnormal(err.to_string());
            }
        };
        let (mut write, mut read) = ws.split();

        let subscribe = match self.config.subscribe_request().to_text() {
            Ok(text) => text,
            Err(e) => {
                self.report_error(&e).await;
                return SessionEnd::Abnormal(e.to_string());
            }
        };
        if let Err(e) = write.send(Message::Text(subscribe)).await {
            let err = StreamError::Send(e.to_string());
            self.report_error(&err).await;
            return SessionEnd::Abnormal(err.to_string());
        }

        self.attempts.store(0, Ordering::SeqCst);
        self.set_state(ConnectionState::Connected);
        info!(
            url,
            inst_id = %self.config.inst_id,
            channel = %self.config.interval.channel(),
            "Stream connected"
        );
        self.emit(
            events::WS_CONNECTED,
            json!({
                "url": url,
                "instId": self.config.inst_id,
                "channel": self.config.interval.channel(),
            }),
        )
        .await;

        let mut ping = interval_at(
            Instant::now() + self.config.ping_interval,
            self.config.ping_interval,
        );
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut pong_deadline: Option<Instant> = None;

        loop {
            let deadline = pong_deadline;
            tokio::select! {
                _ = stopped(stop) => {
                    self.set_state(ConnectionState::Closing);
                    let _ = write.send(Message::Close(None)).await;
                    self.emit(events::WS_CLOSED, json!({ "reason": "closed by client" })).await;
                    return SessionEnd::Stopped;
                }
                _ = ping.tick() => {
                    trace!("Sending ping");
                    let sent = match write.send(Message::Ping(Vec::new())).await {
                        Ok(()) => write.send(Message::Text("ping".to_string())).await,
                        Err(e) => Err(e),
                    };
                    if let Err(e) = sent {
                        let err = StreamError::Send(e.to_string());
                        self.report_error(&err).await;
                        return SessionEnd::Abnormal(err.to_string());
                    }
                    if pong_deadline.is_none() {
                        pong_deadline = Some(Instant::now() + self.config.ping_timeout);
                    }
                }
                _ = async move {
                    match deadline {
                        Some(at) => sleep_until(at).await,
                        None => std::future::pending::<()>().await,
                    }
                } => {
                    warn!(timeout_ms = self.config.ping_timeout.as_millis() as u64, "No pong received");
                    return SessionEnd::Abnormal("heartbeat timeout".to_string());
                }
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => match parse_frame(&text) {
                        Ok(InboundFrame::Pong) => pong_deadline = None,
                        Ok(InboundFrame::Data(data)) => {
                            self.emit(events::CANDLE_UPDATE, data).await;
                        }
                        Ok(InboundFrame::Event(event)) => {
                            if event.get("event").and_then(Value::as_str) == Some("error") {
                                warn!(%event, "Stream reported an error");
                                self.emit(events::WS_ERROR, event).await;
                            } else {
                                debug!(%event, "Stream event");
                            }
                        }
                        Err(e) => warn!(error = %e, "Dropping malformed frame"),
                    },
                    Some(Ok(Message::Pong(_))) => pong_deadline = None,
                    Some(Ok(Message::Close(frame))) => {
                        info!(?frame, "Stream closed by server");
                        return SessionEnd::Abnormal("closed by server".to_string());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        let err = StreamError::Protocol(e.to_string());
                        self.report_error(&err).await;
                        return SessionEnd::Abnormal(err.to_string());
                    }
                    None => return SessionEnd::Abnormal("stream ended".to_string()),
                },
            }
        }
    }
}
