/*
[INPUT]:  WebSocket URL, reconnect policy, and topic subscriptions
[OUTPUT]: Live data frames routed to subscriber callbacks
[POS]:    WebSocket layer - connection lifecycle and stream supervision
[UPDATE]: When changing reconnect policy or session handling
*/

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::http::error::{HyperliquidError, Result};
use crate::ws::message::{ControlFrame, InboundFrame, PING_FRAME, SubscriptionParams, parse_inbound};
use crate::ws::registry::{DataCallback, SubscriptionId, SubscriptionRegistry};

const WS_URL: &str = "wss://api.hyperliquid.xyz/ws";
const OUTBOUND_BUFFER: usize = 100;

/// How long `disconnect()` waits for the session to flush the close frame.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, WsMessage>;

/// WebSocket connection configuration
#[derive(Debug, Clone)]
pub struct WsConfig {
    pub url: String,
    pub connect_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub reconnect_base_delay: Duration,
    pub reconnect_max_delay: Duration,
    pub max_reconnect_attempts: u32,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            url: WS_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(30),
            reconnect_base_delay: Duration::from_millis(1000),
            reconnect_max_delay: Duration::from_millis(30_000),
            max_reconnect_attempts: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// How a session's read/write loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// Clean close; no reconnection.
    Normal,
    /// Transport failure or abnormal close; reconnection applies.
    Abnormal,
}

type ConnectionHandler = Box<dyn Fn(bool) + Send + Sync>;
type ErrorHandler = Box<dyn Fn(&HyperliquidError) + Send + Sync>;
type ReconnectHandler = Box<dyn Fn(u32) + Send + Sync>;

#[derive(Default)]
struct EventHandlers {
    connection_change: Option<ConnectionHandler>,
    error: Option<ErrorHandler>,
    reconnect_attempt: Option<ReconnectHandler>,
}

struct Shared {
    config: WsConfig,
    registry: Mutex<SubscriptionRegistry>,
    state: StdMutex<ConnectionState>,
    outbound: Mutex<Option<mpsc::Sender<WsMessage>>>,
    handlers: StdMutex<EventHandlers>,
    manual_close: AtomicBool,
    reconnect_attempts: AtomicU32,
    session: Mutex<Option<JoinHandle<()>>>,
}

/// WebSocket client for the Hyperliquid data stream. Owns one connection,
/// the subscription registry, heartbeats, and automatic reconnection with
/// exponential backoff.
pub struct HyperliquidWebSocket {
    shared: Arc<Shared>,
}

impl HyperliquidWebSocket {
    pub fn new() -> Self {
        Self::with_config(WsConfig::default())
    }

    pub fn with_config(config: WsConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                registry: Mutex::new(SubscriptionRegistry::new()),
                state: StdMutex::new(ConnectionState::Disconnected),
                outbound: Mutex::new(None),
                handlers: StdMutex::new(EventHandlers::default()),
                manual_close: AtomicBool::new(false),
                reconnect_attempts: AtomicU32::new(0),
                session: Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *lock_poisoned(&self.shared.state)
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Called with `true` on connect and `false` on disconnect.
    pub fn on_connection_change(&self, handler: impl Fn(bool) + Send + Sync + 'static) {
        lock_poisoned(&self.shared.handlers).connection_change = Some(Box::new(handler));
    }

    /// Called for stream-level failures (bad frames, failed reconnect dials,
    /// exhausted reconnect budget).
    pub fn on_error(&self, handler: impl Fn(&HyperliquidError) + Send + Sync + 'static) {
        lock_poisoned(&self.shared.handlers).error = Some(Box::new(handler));
    }

    /// Called with the attempt number before each reconnection delay.
    pub fn on_reconnect(&self, handler: impl Fn(u32) + Send + Sync + 'static) {
        lock_poisoned(&self.shared.handlers).reconnect_attempt = Some(Box::new(handler));
    }

    /// Open the connection and start the session task. A no-op when already
    /// connected or connecting. On return the state is `Connected` and every
    /// stored subscription has been queued for replay.
    pub async fn connect(&self) -> Result<()> {
        {
            let mut state = lock_poisoned(&self.shared.state);
            match *state {
                ConnectionState::Connected | ConnectionState::Connecting => {
                    debug!("connect ignored; already connected or connecting");
                    return Ok(());
                }
                ConnectionState::Disconnected => *state = ConnectionState::Connecting,
            }
        }

        self.shared.manual_close.store(false, Ordering::SeqCst);
        self.shared.reconnect_attempts.store(0, Ordering::SeqCst);

        let stream = match dial(&self.shared.config).await {
            Ok(stream) => stream,
            Err(err) => {
                set_state(&self.shared, ConnectionState::Disconnected);
                return Err(err);
            }
        };

        if self.shared.manual_close.load(Ordering::SeqCst) {
            set_state(&self.shared, ConnectionState::Disconnected);
            return Ok(());
        }

        set_state(&self.shared, ConnectionState::Connected);
        info!(url = %self.shared.config.url, "websocket connected");
        notify_connection(&self.shared, true);

        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            supervise(shared, stream).await;
        });
        *self.shared.session.lock().await = Some(handle);

        Ok(())
    }

    /// Close the connection, cancel any pending reconnection, and drop all
    /// subscriptions. Resuming requires `connect()` plus re-subscribing.
    pub async fn disconnect(&self) {
        self.shared.manual_close.store(true, Ordering::SeqCst);

        let prior = {
            let mut state = lock_poisoned(&self.shared.state);
            std::mem::replace(&mut *state, ConnectionState::Disconnected)
        };

        let sender = self.shared.outbound.lock().await.take();
        let handle = self.shared.session.lock().await.take();

        match (sender, handle) {
            // Live session: hand it the close frame and let it write the
            // frame and exit on its own.
            (Some(sender), Some(mut handle)) => {
                let close = WsMessage::Close(Some(CloseFrame {
                    code: CloseCode::Normal,
                    reason: "client disconnect".into(),
                }));
                if sender.send(close).await.is_ok() {
                    if tokio::time::timeout(CLOSE_GRACE, &mut handle).await.is_err() {
                        warn!("session did not stop within close grace period");
                        handle.abort();
                    }
                } else {
                    handle.abort();
                }
            }
            // No live socket; only a pending backoff timer to cancel.
            (None, Some(handle)) => handle.abort(),
            _ => {}
        }

        self.shared.registry.lock().await.clear();

        if prior == ConnectionState::Connected {
            info!("websocket disconnected");
            notify_connection(&self.shared, false);
        }
    }

    /// Register a callback for a topic. Always hands back an id: while
    /// disconnected (or when the session dies under the send) the
    /// subscription is stored and replayed on the next connect.
    pub async fn subscribe(
        &self,
        params: SubscriptionParams,
        callback: DataCallback,
    ) -> Result<SubscriptionId> {
        let id = self
            .shared
            .registry
            .lock()
            .await
            .insert(params.clone(), callback);

        if let Some(sender) = self.shared.outbound.lock().await.clone() {
            if let Err(err) = send_control(&sender, &ControlFrame::subscribe(params)).await {
                warn!(error = %err, "subscribe frame not sent; stored for replay");
            }
        }

        Ok(id)
    }

    /// Drop one subscription. Unknown ids are ignored.
    pub async fn unsubscribe(&self, id: &SubscriptionId) -> Result<()> {
        let removed = self.shared.registry.lock().await.remove(id);

        let Some(removed) = removed else {
            return Ok(());
        };

        if let Some(sender) = self.shared.outbound.lock().await.clone() {
            if let Err(err) = send_control(&sender, &ControlFrame::unsubscribe(removed.params)).await
            {
                warn!(error = %err, "unsubscribe frame not sent; entry already removed");
            }
        }

        Ok(())
    }

    pub async fn subscription_count(&self) -> usize {
        self.shared.registry.lock().await.len()
    }
}

impl Default for HyperliquidWebSocket {
    fn default() -> Self {
        Self::new()
    }
}

/// Recover the inner value from a poisoned mutex; handlers and state stay
/// usable even if a callback panicked while holding the lock.
fn lock_poisoned<T>(mutex: &StdMutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn set_state(shared: &Shared, state: ConnectionState) {
    *lock_poisoned(&shared.state) = state;
}

fn notify_connection(shared: &Shared, connected: bool) {
    if let Some(handler) = &lock_poisoned(&shared.handlers).connection_change {
        handler(connected);
    }
}

fn notify_error(shared: &Shared, err: &HyperliquidError) {
    if let Some(handler) = &lock_poisoned(&shared.handlers).error {
        handler(err);
    }
}

fn notify_reconnect(shared: &Shared, attempt: u32) {
    if let Some(handler) = &lock_poisoned(&shared.handlers).reconnect_attempt {
        handler(attempt);
    }
}

/// Open the WebSocket with a bounded handshake.
async fn dial(config: &WsConfig) -> Result<WsStream> {
    match tokio::time::timeout(config.connect_timeout, connect_async(config.url.as_str())).await {
        Ok(Ok((stream, _response))) => Ok(stream),
        Ok(Err(err)) => Err(err.into()),
        Err(_) => Err(HyperliquidError::ConnectTimeout {
            duration: config.connect_timeout,
        }),
    }
}

/// Delay before reconnect attempt `attempt` (1-based): doubles from the base
/// and saturates at the cap.
fn backoff_delay(config: &WsConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    let delay_ms = (config.reconnect_base_delay.as_millis() as u64)
        .saturating_mul(1u64 << exponent)
        .min(config.reconnect_max_delay.as_millis() as u64);
    Duration::from_millis(delay_ms)
}

/// Run sessions until a clean end: each dropped session is followed by the
/// backoff reconnect loop, which either yields a fresh stream or gives up.
async fn supervise(shared: Arc<Shared>, stream: WsStream) {
    let mut stream = stream;
    loop {
        let end = run_session(&shared, stream).await;

        *shared.outbound.lock().await = None;
        let prior = {
            let mut state = lock_poisoned(&shared.state);
            std::mem::replace(&mut *state, ConnectionState::Disconnected)
        };
        if prior == ConnectionState::Connected {
            notify_connection(&shared, false);
        }

        if shared.manual_close.load(Ordering::SeqCst) || end == SessionEnd::Normal {
            debug!("session ended cleanly; not reconnecting");
            return;
        }

        match reconnect(&shared).await {
            Some(next) => stream = next,
            None => return,
        }
    }
}

/// Re-dial with exponential backoff until a connection sticks or the attempt
/// budget is spent.
async fn reconnect(shared: &Shared) -> Option<WsStream> {
    loop {
        let attempt = shared.reconnect_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt > shared.config.max_reconnect_attempts {
            let err = HyperliquidError::ReconnectExhausted {
                attempts: shared.config.max_reconnect_attempts,
            };
            warn!(error = %err, "giving up on reconnection");
            notify_error(shared, &err);
            set_state(shared, ConnectionState::Disconnected);
            return None;
        }

        let delay = backoff_delay(&shared.config, attempt);
        info!(
            attempt,
            max_attempts = shared.config.max_reconnect_attempts,
            delay_ms = delay.as_millis() as u64,
            "scheduling reconnect"
        );
        notify_reconnect(shared, attempt);
        tokio::time::sleep(delay).await;

        if shared.manual_close.load(Ordering::SeqCst) {
            return None;
        }

        set_state(shared, ConnectionState::Connecting);
        match dial(&shared.config).await {
            Ok(stream) => {
                shared.reconnect_attempts.store(0, Ordering::SeqCst);
                set_state(shared, ConnectionState::Connected);
                info!(attempt, "websocket reconnected");
                notify_connection(shared, true);
                return Some(stream);
            }
            Err(err) => {
                warn!(attempt, error = %err, "reconnect attempt failed");
                notify_error(shared, &err);
                set_state(shared, ConnectionState::Disconnected);
            }
        }
    }
}

/// Drive one connection: replay stored subscriptions, then pump outbound
/// messages, inbound frames, and heartbeats until the stream drops.
async fn run_session(shared: &Arc<Shared>, stream: WsStream) -> SessionEnd {
    let (mut write, mut read) = stream.split();

    let (outbound_tx, mut outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
    *shared.outbound.lock().await = Some(outbound_tx);

    if let Err(end) = replay_subscriptions(shared, &mut write).await {
        return end;
    }

    let mut heartbeat = tokio::time::interval(shared.config.heartbeat_interval);
    heartbeat.tick().await; // first tick completes immediately

    loop {
        tokio::select! {
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(message) => {
                        let closing = matches!(message, WsMessage::Close(_));
                        if write.send(message).await.is_err() {
                            return SessionEnd::Abnormal;
                        }
                        if closing {
                            return SessionEnd::Normal;
                        }
                    }
                    None => return SessionEnd::Normal,
                }
            }
            incoming = read.next() => {
                match incoming {
                    Some(Ok(WsMessage::Text(text))) => {
                        handle_frame(shared, text.as_str()).await;
                    }
                    Some(Ok(WsMessage::Ping(payload))) => {
                        if write.send(WsMessage::Pong(payload)).await.is_err() {
                            return SessionEnd::Abnormal;
                        }
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        let normal = frame
                            .as_ref()
                            .is_none_or(|frame| frame.code == CloseCode::Normal);
                        debug!(?frame, "close frame received");
                        return if normal { SessionEnd::Normal } else { SessionEnd::Abnormal };
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(error = %err, "websocket read failed");
                        return SessionEnd::Abnormal;
                    }
                    None => return SessionEnd::Abnormal,
                }
            }
            _ = heartbeat.tick() => {
                // A dead socket surfaces through the read arm; the failed
                // write itself is only logged.
                if write.send(WsMessage::Text(PING_FRAME.into())).await.is_err() {
                    warn!("heartbeat send failed");
                }
            }
        }
    }
}

/// Re-issue a subscribe frame for every stored subscription. Runs before the
/// session loop so replay cannot interleave with fresh subscribe calls.
async fn replay_subscriptions(
    shared: &Arc<Shared>,
    write: &mut WsSink,
) -> std::result::Result<(), SessionEnd> {
    let params = shared.registry.lock().await.params();
    if params.is_empty() {
        return Ok(());
    }

    info!(count = params.len(), "replaying subscriptions");
    for params in params {
        let frame = ControlFrame::subscribe(params);
        let text = match serde_json::to_string(&frame) {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "failed to encode subscribe frame");
                continue;
            }
        };
        if write.send(WsMessage::Text(text.into())).await.is_err() {
            return Err(SessionEnd::Abnormal);
        }
    }
    Ok(())
}

async fn handle_frame(shared: &Arc<Shared>, text: &str) {
    match parse_inbound(text) {
        Ok(InboundFrame::Data(frame)) => {
            shared.registry.lock().await.route(&frame);
        }
        Ok(InboundFrame::Ack(ack)) => {
            debug!(ack = %ack, "subscription acknowledged");
        }
        Ok(InboundFrame::Pong) => {
            debug!("pong received");
        }
        Ok(InboundFrame::Unknown(value)) => {
            debug!(frame = %value, "frame for unknown channel dropped");
        }
        Err(err) => {
            // Malformed frames are dropped in place; the stream carries on.
            warn!(error = %err, "inbound frame dropped");
        }
    }
}

async fn send_control(sender: &mpsc::Sender<WsMessage>, frame: &ControlFrame) -> Result<()> {
    let text = serde_json::to_string(frame)?;
    sender
        .send(WsMessage::Text(text.into()))
        .await
        .map_err(|_| HyperliquidError::Transport("websocket send channel closed".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::Arc;

    #[rstest]
    #[case(1, 1000)]
    #[case(2, 2000)]
    #[case(3, 4000)]
    #[case(4, 8000)]
    #[case(5, 16000)]
    #[case(6, 30000)]
    #[case(12, 30000)]
    fn backoff_doubles_until_cap(#[case] attempt: u32, #[case] expected_ms: u64) {
        let config = WsConfig::default();
        assert_eq!(
            backoff_delay(&config, attempt),
            Duration::from_millis(expected_ms)
        );
    }

    #[test]
    fn backoff_survives_extreme_attempt_numbers() {
        let config = WsConfig::default();
        assert_eq!(backoff_delay(&config, u32::MAX), Duration::from_millis(30_000));
    }

    #[test]
    fn default_config_matches_policy() {
        let config = WsConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.reconnect_base_delay, Duration::from_millis(1000));
        assert_eq!(config.reconnect_max_delay, Duration::from_millis(30_000));
        assert_eq!(config.max_reconnect_attempts, 5);
    }

    #[tokio::test]
    async fn starts_disconnected() {
        let ws = HyperliquidWebSocket::new();
        assert_eq!(ws.state(), ConnectionState::Disconnected);
        assert!(!ws.is_connected());
    }

    #[tokio::test]
    async fn subscribe_while_disconnected_is_stored() {
        let ws = HyperliquidWebSocket::new();
        let id = ws
            .subscribe(SubscriptionParams::all_mids(), Arc::new(|_| Ok(())))
            .await
            .expect("subscribe");
        assert_eq!(ws.subscription_count().await, 1);

        ws.unsubscribe(&id).await.expect("unsubscribe");
        assert_eq!(ws.subscription_count().await, 0);
    }

    #[tokio::test]
    async fn unsubscribe_unknown_id_is_noop() {
        let ws = HyperliquidWebSocket::new();
        let id = ws
            .subscribe(SubscriptionParams::all_mids(), Arc::new(|_| Ok(())))
            .await
            .expect("subscribe");
        ws.unsubscribe(&id).await.expect("first unsubscribe");
        ws.unsubscribe(&id).await.expect("second unsubscribe");
        assert_eq!(ws.subscription_count().await, 0);
    }

    #[tokio::test]
    async fn disconnect_without_connect_is_noop() {
        let ws = HyperliquidWebSocket::new();
        ws.disconnect().await;
        assert_eq!(ws.state(), ConnectionState::Disconnected);
    }
}
