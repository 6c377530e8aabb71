//! Socket connection manager.
//!
//! Owns the single real-time connection to the portal backend. One driver
//! task per [`ConnectionManager`] connects, runs the session, and reconnects
//! according to the [`ReconnectPolicy`]. The driver never holds more than one
//! socket at a time, and [`ConnectionManager::connect`] is a no-op while a
//! driver is alive.
//!
//! ## Lifecycle
//!
//! - On connect: requests the unread count, re-joins rooms, flushes buffered
//!   client events.
//! - Server closes the socket: reconnect after the initial backoff delay.
//! - Transport drops (network loss): mark the network offline and wait until
//!   the host reports it online again or a TCP probe of the socket host
//!   succeeds, then reconnect.
//! - Connect failures: capped exponential backoff, unbounded unless
//!   `max_attempts` is set. An auth rejection stops the driver.
//!
//! All failures land in [`ConnectionState::last_error`]; nothing here panics
//! or propagates into the host.

use std::collections::{BTreeSet, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use alertdesk_core::{ConnectionState, ReconnectPolicy};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{Notify, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, header::AUTHORIZATION};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::{Host, Url};

use crate::error::{ClientError, Result};
use crate::protocol::{ClientEvent, ServerEvent};

/// Client events kept while disconnected.
pub const DEFAULT_OUTBOUND_BUFFER: usize = 64;

/// How long `disconnect` waits for the driver before aborting it.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Settings for the connection manager.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    pub url: Url,
    /// Bearer token. Without one the manager never connects.
    pub token: Option<String>,
    pub policy: ReconnectPolicy,
    /// Rooms joined after every connect
    pub rooms: Vec<String>,
    pub probe_interval: Duration,
    pub outbound_buffer: usize,
}

impl SocketConfig {
    pub fn new(url: Url, token: Option<String>) -> Self {
        Self {
            url,
            token,
            policy: ReconnectPolicy::default(),
            rooms: Vec::new(),
            probe_interval: Duration::from_secs(1),
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// `disconnect()` was called
    ClientRequested,
    /// The server sent a close frame or ended the stream
    ServerClosed,
    /// The host reported the network offline
    NetworkLost,
    /// The transport failed mid-session
    TransportError(String),
}

/// Events delivered to the consumer of the manager.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    Connected,
    Disconnected { reason: DisconnectReason },
    Server(ServerEvent),
}

/// Read-receipt commands the notification center needs from the socket.
///
/// Injected explicitly instead of being reached through shared globals.
pub trait ReadSync: Send + Sync {
    fn mark_as_read(&self, notification_id: &str);
    fn mark_multiple_as_read(&self, notification_ids: &[String]);
}

struct Driver {
    task: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

struct Inner {
    config: SocketConfig,
    state: watch::Sender<ConnectionState>,
    network: watch::Sender<bool>,
    events: mpsc::UnboundedSender<SocketEvent>,
    outbound: Mutex<VecDeque<ClientEvent>>,
    outbound_ready: Notify,
    rooms: Mutex<BTreeSet<String>>,
    driver: Mutex<Option<Driver>>,
}

/// Handle to the real-time connection. Cheap to clone.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ConnectionManager {
    /// Create a manager and the receiver for its events.
    pub fn new(config: SocketConfig) -> (Self, mpsc::UnboundedReceiver<SocketEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let rooms = config.rooms.iter().cloned().collect();
        let inner = Inner {
            config,
            state: watch::Sender::new(ConnectionState::default()),
            network: watch::Sender::new(true),
            events,
            outbound: Mutex::new(VecDeque::new()),
            outbound_ready: Notify::new(),
            rooms: Mutex::new(rooms),
            driver: Mutex::new(None),
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            rx,
        )
    }

    /// Start the connection driver.
    ///
    /// Skipped silently without a token. Idempotent while a driver runs.
    pub fn connect(&self) {
        let Some(token) = self.inner.config.token.clone() else {
            debug!("no auth token, skipping real-time connection");
            return;
        };

        let mut slot = lock(&self.inner.driver);
        if slot.as_ref().is_some_and(|d| !d.task.is_finished()) {
            debug!("connection driver already running");
            return;
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move { drive(inner, token, shutdown_rx).await });
        *slot = Some(Driver { task, shutdown });
        info!(url = %self.inner.config.url, "real-time connection starting");
    }

    /// Close the connection and stop reconnecting.
    pub async fn disconnect(&self) {
        let driver = lock(&self.inner.driver).take();
        let Some(driver) = driver else {
            return;
        };

        let _ = driver.shutdown.send(true);
        let mut task = driver.task;
        if tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await.is_err() {
            warn!("connection driver did not stop in time, aborting");
            task.abort();
        }
        self.inner.state.send_modify(|s| {
            s.connected = false;
            s.reconnecting = false;
        });
        info!("real-time connection closed");
    }

    /// Whether a driver task is alive (connected or reconnecting).
    pub fn is_running(&self) -> bool {
        lock(&self.inner.driver)
            .as_ref()
            .is_some_and(|d| !d.task.is_finished())
    }

    /// Snapshot of the connection state.
    pub fn state(&self) -> ConnectionState {
        self.inner.state.borrow().clone()
    }

    /// Watch connection state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Report network reachability from the host.
    ///
    /// Going offline ends the current session; coming back online wakes a
    /// driver waiting to reconnect.
    pub fn set_network_online(&self, online: bool) {
        let changed = self.inner.network.send_if_modified(|current| {
            let changed = *current != online;
            *current = online;
            changed
        });
        if changed {
            info!(online, "network status changed");
        }
    }

    pub fn request_unread_count(&self) {
        self.emit(ClientEvent::GetUnreadCount);
    }

    pub fn mark_as_read(&self, notification_id: &str) {
        self.emit(ClientEvent::MarkNotificationRead {
            notification_id: notification_id.to_string(),
        });
    }

    pub fn mark_multiple_as_read(&self, notification_ids: &[String]) {
        if notification_ids.is_empty() {
            return;
        }
        self.emit(ClientEvent::MarkMultipleAsRead {
            notification_ids: notification_ids.to_vec(),
        });
    }

    /// Join a room now (if connected) and after every reconnect.
    pub fn join_room(&self, room: &str) {
        let inserted = lock(&self.inner.rooms).insert(room.to_string());
        if inserted && self.state().connected {
            self.emit(ClientEvent::JoinRoom {
                room: room.to_string(),
            });
        }
    }

    /// Leave a room and stop re-joining it.
    pub fn leave_room(&self, room: &str) {
        let removed = lock(&self.inner.rooms).remove(room);
        if removed && self.state().connected {
            self.emit(ClientEvent::LeaveRoom {
                room: room.to_string(),
            });
        }
    }

    /// Rooms currently joined (or to be joined on connect).
    pub fn rooms(&self) -> Vec<String> {
        lock(&self.inner.rooms).iter().cloned().collect()
    }

    /// Queue a client event. Sent immediately when connected, otherwise
    /// buffered until the next connect.
    fn emit(&self, event: ClientEvent) {
        {
            let mut outbound = lock(&self.inner.outbound);
            if outbound.len() >= self.inner.config.outbound_buffer.max(1) {
                if let Some(dropped) = outbound.pop_front() {
                    warn!(event = dropped.name(), "outbound buffer full, dropping oldest event");
                }
            }
            debug!(event = event.name(), "client event queued");
            outbound.push_back(event);
        }
        self.inner.outbound_ready.notify_one();
    }
}

impl ReadSync for ConnectionManager {
    fn mark_as_read(&self, notification_id: &str) {
        ConnectionManager::mark_as_read(self, notification_id);
    }

    fn mark_multiple_as_read(&self, notification_ids: &[String]) {
        ConnectionManager::mark_multiple_as_read(self, notification_ids);
    }
}

impl Inner {
    fn publish(&self, event: SocketEvent) {
        // The consumer may have gone away; nothing to do then.
        let _ = self.events.send(event);
    }

    fn set_connected(&self) {
        self.state.send_modify(|s| {
            s.connected = true;
            s.reconnecting = false;
            s.last_error = None;
        });
    }

    fn set_disconnected(&self, reconnecting: bool, error: Option<String>) {
        self.state.send_modify(|s| {
            s.connected = false;
            s.reconnecting = reconnecting;
            if error.is_some() {
                s.last_error = error;
            }
        });
    }
}

/// Driver loop: connect, run the session, decide how to reconnect.
async fn drive(inner: Arc<Inner>, token: String, mut shutdown: watch::Receiver<bool>) {
    let policy = inner.config.policy.clone();
    let mut failures: u32 = 0;

    loop {
        if *shutdown.borrow() {
            break;
        }

        if !*inner.network.borrow() {
            inner.set_disconnected(true, None);
            if !wait_for_network(&inner, &mut shutdown).await {
                break;
            }
        }

        let attempt = tokio::select! {
            result = open_socket(&inner.config.url, &token) => result,
            _ = shutdown.changed() => break,
        };

        match attempt {
            Ok(stream) => {
                failures = 0;
                inner.set_connected();
                info!(url = %inner.config.url, "real-time connection established");
                inner.publish(SocketEvent::Connected);

                let reason = run_session(&inner, stream, &mut shutdown).await;
                info!(?reason, "real-time session ended");

                match &reason {
                    DisconnectReason::ClientRequested => {
                        inner.set_disconnected(false, None);
                        inner.publish(SocketEvent::Disconnected { reason });
                        break;
                    }
                    DisconnectReason::NetworkLost => {
                        inner.set_disconnected(true, None);
                    }
                    DisconnectReason::TransportError(message) => {
                        inner.set_disconnected(true, Some(format!("Connection lost: {message}")));
                        // Treat as network loss: wait for reachability before reconnecting.
                        inner.network.send_replace(false);
                    }
                    DisconnectReason::ServerClosed => {
                        inner.set_disconnected(true, None);
                    }
                }
                let server_closed = reason == DisconnectReason::ServerClosed;
                inner.publish(SocketEvent::Disconnected { reason });

                if server_closed {
                    let delay = policy.delay_for_attempt(0);
                    debug!(delay_ms = delay.as_millis() as u64, "reconnecting after server close");
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown.changed() => break,
                    }
                }
            }
            Err(err) => {
                failures = failures.saturating_add(1);
                let message = err.friendly_message();
                warn!(error = %err, failures, "real-time connection failed");

                if err.is_auth_error() {
                    inner.set_disconnected(false, Some(message));
                    break;
                }
                if !policy.should_retry(failures) {
                    warn!(failures, "reconnect attempts exhausted");
                    inner.set_disconnected(false, Some(message));
                    break;
                }

                inner.set_disconnected(true, Some(message));
                let delay = policy.delay_for_attempt(failures - 1);
                debug!(delay_ms = delay.as_millis() as u64, failures, "scheduling reconnect");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown.changed() => break,
                }
            }
        }
    }

    inner.state.send_modify(|s| {
        s.connected = false;
        s.reconnecting = false;
    });
    debug!("connection driver stopped");
}

async fn open_socket(url: &Url, token: &str) -> Result<WsStream> {
    let mut request = url.as_str().into_client_request()?;
    let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|e| ClientError::ConfigError(format!("invalid token: {e}")))?;
    request.headers_mut().insert(AUTHORIZATION, bearer);

    let (stream, _response) = tokio_tungstenite::connect_async(request).await?;
    Ok(stream)
}

/// Wait until the network is reported online or a probe succeeds.
///
/// Returns false if shutdown was requested first.
async fn wait_for_network(inner: &Inner, shutdown: &mut watch::Receiver<bool>) -> bool {
    let mut network = inner.network.subscribe();
    let interval = inner.config.probe_interval.max(Duration::from_millis(10));
    info!("network offline, waiting before reconnecting");

    loop {
        tokio::select! {
            online = async { network.wait_for(|online| *online).await.is_ok() } => return online,
            _ = tokio::time::sleep(interval) => {
                if host_reachable(&inner.config.url, interval).await {
                    info!("network probe succeeded");
                    inner.network.send_replace(true);
                    return true;
                }
            }
            _ = shutdown.changed() => return false,
        }
    }
}

/// TCP reachability check for the socket host.
async fn host_reachable(url: &Url, timeout: Duration) -> bool {
    let Some(port) = url.port_or_known_default() else {
        return false;
    };
    // `host_str` keeps the brackets of IPv6 literals, which never resolve.
    let target = match url.host() {
        Some(Host::Domain(domain)) => format!("{domain}:{port}"),
        Some(Host::Ipv4(ip)) => SocketAddr::from((ip, port)).to_string(),
        Some(Host::Ipv6(ip)) => SocketAddr::from((ip, port)).to_string(),
        None => return false,
    };
    matches!(
        tokio::time::timeout(timeout, TcpStream::connect(target)).await,
        Ok(Ok(_))
    )
}

async fn run_session(
    inner: &Inner,
    stream: WsStream,
    shutdown: &mut watch::Receiver<bool>,
) -> DisconnectReason {
    let (mut write, mut read) = stream.split();
    let mut network = inner.network.subscribe();

    let mut greeting = vec![ClientEvent::GetUnreadCount];
    greeting.extend(
        lock(&inner.rooms)
            .iter()
            .map(|room| ClientEvent::JoinRoom { room: room.clone() }),
    );
    for event in greeting {
        if let Err(e) = write.send(Message::text(event.to_frame())).await {
            return DisconnectReason::TransportError(e.to_string());
        }
    }

    loop {
        // Drained at the top so events queued while offline go out first.
        let pending: Vec<ClientEvent> = lock(&inner.outbound).drain(..).collect();
        for (sent, event) in pending.iter().enumerate() {
            if let Err(e) = write.send(Message::text(event.to_frame())).await {
                let mut outbound = lock(&inner.outbound);
                for unsent in pending[sent..].iter().rev() {
                    outbound.push_front(unsent.clone());
                }
                return DisconnectReason::TransportError(e.to_string());
            }
            debug!(event = event.name(), "client event sent");
        }

        tokio::select! {
            _ = shutdown.changed() => {
                let _ = write.send(Message::Close(None)).await;
                let _ = write.close().await;
                return DisconnectReason::ClientRequested;
            }
            _ = inner.outbound_ready.notified() => {}
            changed = network.changed() => {
                if changed.is_ok() && !*network.borrow() {
                    let _ = write.close().await;
                    return DisconnectReason::NetworkLost;
                }
            }
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => handle_frame(inner, text.as_str()),
                Some(Ok(Message::Close(_))) | None => return DisconnectReason::ServerClosed,
                Some(Ok(_)) => {}
                Some(Err(e)) => return DisconnectReason::TransportError(e.to_string()),
            },
        }
    }
}

fn handle_frame(inner: &Inner, frame: &str) {
    match ServerEvent::parse(frame) {
        Ok(ServerEvent::Unknown { event }) => {
            debug!(%event, "ignoring unknown server event");
        }
        Ok(event) => {
            if let ServerEvent::Error { message } = &event {
                warn!(%message, "server reported an error");
                inner.state.send_modify(|s| s.last_error = Some(message.clone()));
            }
            debug!(event = event.name(), "server event received");
            inner.publish(SocketEvent::Server(event));
        }
        Err(e) => warn!(error = %e, "dropping malformed frame"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(token: Option<&str>) -> (ConnectionManager, mpsc::UnboundedReceiver<SocketEvent>) {
        let url = Url::parse("ws://127.0.0.1:9/ws").unwrap();
        ConnectionManager::new(SocketConfig::new(url, token.map(str::to_string)))
    }

    #[tokio::test]
    async fn test_connect_without_token_is_skipped() {
        let (manager, _rx) = manager(None);
        manager.connect();
        assert!(!manager.is_running());
        assert_eq!(manager.state(), ConnectionState::default());
    }

    #[tokio::test]
    async fn test_outbound_buffer_is_bounded() {
        let url = Url::parse("ws://127.0.0.1:9/ws").unwrap();
        let mut config = SocketConfig::new(url, None);
        config.outbound_buffer = 2;
        let (manager, _rx) = ConnectionManager::new(config);

        manager.mark_as_read("a");
        manager.mark_as_read("b");
        manager.mark_as_read("c");

        let queued: Vec<_> = lock(&manager.inner.outbound).iter().cloned().collect();
        assert_eq!(
            queued,
            vec![
                ClientEvent::MarkNotificationRead {
                    notification_id: "b".into()
                },
                ClientEvent::MarkNotificationRead {
                    notification_id: "c".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_bulk_mark_is_noop() {
        let (manager, _rx) = manager(None);
        manager.mark_multiple_as_read(&[]);
        assert!(lock(&manager.inner.outbound).is_empty());
    }

    #[tokio::test]
    async fn test_rooms_tracked_while_offline() {
        let (manager, _rx) = manager(None);
        manager.join_room("superadmin");
        manager.join_room("finance");
        manager.leave_room("finance");
        assert_eq!(manager.rooms(), vec!["superadmin".to_string()]);
        // Not connected: nothing is emitted, the join happens on connect.
        assert!(lock(&manager.inner.outbound).is_empty());
    }

    #[tokio::test]
    async fn test_network_flag_round_trip() {
        let (manager, _rx) = manager(None);
        manager.set_network_online(false);
        assert!(!*manager.inner.network.borrow());
        manager.set_network_online(true);
        assert!(*manager.inner.network.borrow());
    }

    #[tokio::test]
    async fn test_ipv6_literal_host_reachable() {
        // Hosts without IPv6 loopback cannot run this.
        let Ok(listener) = tokio::net::TcpListener::bind("[::1]:0").await else {
            return;
        };
        let port = listener.local_addr().unwrap().port();
        let url = Url::parse(&format!("ws://[::1]:{port}/ws")).unwrap();
        assert!(host_reachable(&url, Duration::from_millis(500)).await);
    }

    #[tokio::test]
    async fn test_ipv4_and_unreachable_hosts() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let url = Url::parse(&format!("ws://127.0.0.1:{port}/ws")).unwrap();
        assert!(host_reachable(&url, Duration::from_millis(500)).await);

        drop(listener);
        assert!(!host_reachable(&url, Duration::from_millis(500)).await);
    }

    #[tokio::test]
    async fn test_network_wait_recovers_on_ipv6_host() {
        let Ok(listener) = tokio::net::TcpListener::bind("[::1]:0").await else {
            return;
        };
        let port = listener.local_addr().unwrap().port();
        let url = Url::parse(&format!("ws://[::1]:{port}/ws")).unwrap();
        let mut config = SocketConfig::new(url, Some("token".into()));
        config.probe_interval = Duration::from_millis(20);
        let (manager, _rx) = ConnectionManager::new(config);
        manager.set_network_online(false);

        let (_shutdown_tx, mut shutdown) = watch::channel(false);
        let online = tokio::time::timeout(
            Duration::from_secs(5),
            wait_for_network(&manager.inner, &mut shutdown),
        )
        .await
        .unwrap();
        assert!(online);
        assert!(*manager.inner.network.borrow());
    }

    #[test]
    fn test_network_wait_future_is_send() {
        fn assert_send<T: Send>(_: &T) {}
        let url = Url::parse("ws://127.0.0.1:9/ws").unwrap();
        let (manager, _rx) = ConnectionManager::new(SocketConfig::new(url, None));
        let (_shutdown_tx, mut shutdown) = watch::channel(false);
        let wait = wait_for_network(&manager.inner, &mut shutdown);
        assert_send(&wait);
    }
}
