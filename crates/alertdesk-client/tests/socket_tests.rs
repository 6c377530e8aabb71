//! Connection manager tests against a local WebSocket server.
//!
//! The server records every frame the client sends and lets a test push
//! frames, close the socket politely, or drop the TCP stream outright.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alertdesk_client::{
    ConnectionManager, DisconnectReason, ServerEvent, SocketConfig, SocketEvent,
};
use alertdesk_core::ReconnectPolicy;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use url::Url;

const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
enum ServerCommand {
    Send(String),
    Close,
    Drop,
}

struct TestServer {
    addr: SocketAddr,
    frames: mpsc::UnboundedReceiver<Value>,
    commands: broadcast::Sender<ServerCommand>,
    accepted: Arc<AtomicUsize>,
    max_live: Arc<AtomicUsize>,
    auth_headers: Arc<Mutex<Vec<String>>>,
}

impl TestServer {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (frame_tx, frames) = mpsc::unbounded_channel();
        let (commands, _) = broadcast::channel(16);
        let accepted = Arc::new(AtomicUsize::new(0));
        let live = Arc::new(AtomicUsize::new(0));
        let max_live = Arc::new(AtomicUsize::new(0));
        let auth_headers = Arc::new(Mutex::new(Vec::new()));

        let server = Self {
            addr,
            frames,
            commands: commands.clone(),
            accepted: Arc::clone(&accepted),
            max_live: Arc::clone(&max_live),
            auth_headers: Arc::clone(&auth_headers),
        };

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let headers = Arc::clone(&auth_headers);
                let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                    if let Some(value) = req.headers().get("authorization") {
                        headers
                            .lock()
                            .unwrap()
                            .push(value.to_str().unwrap_or_default().to_string());
                    }
                    Ok(resp)
                };
                let Ok(ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
                    continue;
                };

                accepted.fetch_add(1, Ordering::SeqCst);
                let now_live = live.fetch_add(1, Ordering::SeqCst) + 1;
                max_live.fetch_max(now_live, Ordering::SeqCst);

                let frame_tx = frame_tx.clone();
                let mut commands = commands.subscribe();
                let live = Arc::clone(&live);
                tokio::spawn(async move {
                    let (mut write, mut read) = ws.split();
                    loop {
                        tokio::select! {
                            msg = read.next() => match msg {
                                Some(Ok(Message::Text(text))) => {
                                    if let Ok(v) = serde_json::from_str::<Value>(text.as_str()) {
                                        let _ = frame_tx.send(v);
                                    }
                                }
                                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                                Some(Ok(_)) => {}
                            },
                            cmd = commands.recv() => match cmd {
                                Ok(ServerCommand::Send(frame)) => {
                                    let _ = write.send(Message::text(frame)).await;
                                }
                                Ok(ServerCommand::Close) => {
                                    let _ = write.send(Message::Close(None)).await;
                                    break;
                                }
                                Ok(ServerCommand::Drop) | Err(_) => break,
                            },
                        }
                    }
                    live.fetch_sub(1, Ordering::SeqCst);
                });
            }
        });

        server
    }

    fn url(&self) -> Url {
        Url::parse(&format!("ws://{}/ws", self.addr)).unwrap()
    }

    fn config(&self, token: Option<&str>) -> SocketConfig {
        let mut config = SocketConfig::new(self.url(), token.map(str::to_string));
        config.policy = ReconnectPolicy::fixed(Duration::from_millis(50), Duration::from_millis(200));
        config.probe_interval = Duration::from_millis(50);
        config
    }

    fn send(&self, frame: &str) {
        let _ = self.commands.send(ServerCommand::Send(frame.to_string()));
    }

    async fn next_frame(&mut self) -> Value {
        tokio::time::timeout(WAIT, self.frames.recv())
            .await
            .expect("timed out waiting for client frame")
            .expect("server stopped")
    }

    /// Wait for the next frame with the given event name, skipping others.
    async fn expect_event(&mut self, name: &str) -> Value {
        loop {
            let frame = self.next_frame().await;
            if frame["event"] == name {
                return frame;
            }
        }
    }
}

async fn next_event(events: &mut mpsc::UnboundedReceiver<SocketEvent>) -> SocketEvent {
    tokio::time::timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for socket event")
        .expect("event channel closed")
}

async fn expect_connected(events: &mut mpsc::UnboundedReceiver<SocketEvent>) {
    loop {
        if next_event(events).await == SocketEvent::Connected {
            return;
        }
    }
}

#[tokio::test]
async fn test_connect_requests_unread_count_with_bearer_token() {
    let mut server = TestServer::start().await;
    let (manager, mut events) = ConnectionManager::new(server.config(Some("abc123")));

    manager.connect();
    expect_connected(&mut events).await;

    let frame = server.expect_event("getUnreadCount").await;
    assert!(frame["data"].is_null());
    assert!(manager.state().connected);
    assert_eq!(
        *server.auth_headers.lock().unwrap(),
        vec!["Bearer abc123".to_string()]
    );

    manager.disconnect().await;
    assert!(!manager.state().connected);
    assert!(!manager.state().reconnecting);
}

#[tokio::test]
async fn test_connect_is_idempotent() {
    let mut server = TestServer::start().await;
    let (manager, mut events) = ConnectionManager::new(server.config(Some("t")));

    manager.connect();
    manager.connect();
    manager.clone().connect();
    expect_connected(&mut events).await;
    server.expect_event("getUnreadCount").await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.accepted.load(Ordering::SeqCst), 1);
    manager.disconnect().await;
}

#[tokio::test]
async fn test_no_token_never_connects() {
    let server = TestServer::start().await;
    let (manager, _events) = ConnectionManager::new(server.config(None));

    manager.connect();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(!manager.is_running());
    assert_eq!(server.accepted.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_server_events_are_forwarded() {
    let mut server = TestServer::start().await;
    let (manager, mut events) = ConnectionManager::new(server.config(Some("t")));
    manager.connect();
    expect_connected(&mut events).await;
    server.expect_event("getUnreadCount").await;

    server.send(r#"{"event":"unreadCount","data":{"count":3}}"#);
    server.send(r#"{"event":"somethingNew","data":{}}"#);
    server.send("garbage");
    server.send(r#"{"event":"notificationMarkedRead","data":{"notificationId":"n1","unreadCount":2}}"#);

    assert_eq!(
        next_event(&mut events).await,
        SocketEvent::Server(ServerEvent::UnreadCount { count: 3 })
    );
    // Unknown and malformed frames are skipped.
    assert_eq!(
        next_event(&mut events).await,
        SocketEvent::Server(ServerEvent::NotificationMarkedRead {
            notification_id: "n1".into(),
            unread_count: Some(2),
        })
    );
    manager.disconnect().await;
}

#[tokio::test]
async fn test_mark_as_read_frames() {
    let mut server = TestServer::start().await;
    let (manager, mut events) = ConnectionManager::new(server.config(Some("t")));
    manager.connect();
    expect_connected(&mut events).await;
    server.expect_event("getUnreadCount").await;

    manager.mark_as_read("n1");
    let frame = server.expect_event("markNotificationRead").await;
    assert_eq!(frame["data"]["notificationId"], "n1");

    manager.mark_multiple_as_read(&["a".to_string(), "b".to_string()]);
    let frame = server.expect_event("markMultipleAsRead").await;
    assert_eq!(frame["data"]["notificationIds"], serde_json::json!(["a", "b"]));

    manager.disconnect().await;
}

#[tokio::test]
async fn test_events_buffered_while_disconnected_are_flushed() {
    let mut server = TestServer::start().await;
    let (manager, mut events) = ConnectionManager::new(server.config(Some("t")));

    manager.mark_as_read("early");
    manager.connect();
    expect_connected(&mut events).await;

    server.expect_event("getUnreadCount").await;
    let frame = server.expect_event("markNotificationRead").await;
    assert_eq!(frame["data"]["notificationId"], "early");
    manager.disconnect().await;
}

#[tokio::test]
async fn test_server_close_reconnects_and_rejoins_rooms() {
    let mut server = TestServer::start().await;
    let mut config = server.config(Some("t"));
    config.rooms = vec!["superadmin".to_string()];
    let (manager, mut events) = ConnectionManager::new(config);

    manager.connect();
    expect_connected(&mut events).await;
    server.expect_event("getUnreadCount").await;
    let join = server.expect_event("joinRoom").await;
    assert_eq!(join["data"]["room"], "superadmin");

    manager.join_room("finance");
    let join = server.expect_event("joinRoom").await;
    assert_eq!(join["data"]["room"], "finance");

    let _ = server.commands.send(ServerCommand::Close);
    assert_eq!(
        next_event(&mut events).await,
        SocketEvent::Disconnected {
            reason: DisconnectReason::ServerClosed
        }
    );

    expect_connected(&mut events).await;
    server.expect_event("getUnreadCount").await;
    let mut rooms = vec![
        server.expect_event("joinRoom").await["data"]["room"].clone(),
        server.expect_event("joinRoom").await["data"]["room"].clone(),
    ];
    rooms.sort_by_key(|v| v.to_string());
    assert_eq!(rooms, vec![Value::from("finance"), Value::from("superadmin")]);

    assert_eq!(server.accepted.load(Ordering::SeqCst), 2);
    assert_eq!(server.max_live.load(Ordering::SeqCst), 1);
    manager.disconnect().await;
}

#[tokio::test]
async fn test_transport_drop_recovers_via_probe() {
    let mut server = TestServer::start().await;
    let (manager, mut events) = ConnectionManager::new(server.config(Some("t")));

    manager.connect();
    expect_connected(&mut events).await;
    server.expect_event("getUnreadCount").await;

    let _ = server.commands.send(ServerCommand::Drop);
    match next_event(&mut events).await {
        SocketEvent::Disconnected {
            reason: DisconnectReason::TransportError(_) | DisconnectReason::ServerClosed,
        } => {}
        other => panic!("unexpected event {other:?}"),
    }

    expect_connected(&mut events).await;
    server.expect_event("getUnreadCount").await;
    assert!(manager.state().connected);
    assert_eq!(server.max_live.load(Ordering::SeqCst), 1);
    manager.disconnect().await;
}

#[tokio::test]
async fn test_network_offline_then_online_reconnects_once() {
    let mut server = TestServer::start().await;
    let mut config = server.config(Some("t"));
    // Keep the probe out of the way so only the host signal brings us back.
    config.probe_interval = Duration::from_secs(60);
    let (manager, mut events) = ConnectionManager::new(config);

    manager.connect();
    expect_connected(&mut events).await;
    server.expect_event("getUnreadCount").await;

    manager.set_network_online(false);
    assert_eq!(
        next_event(&mut events).await,
        SocketEvent::Disconnected {
            reason: DisconnectReason::NetworkLost
        }
    );
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!manager.state().connected);
    assert!(manager.state().reconnecting);

    manager.set_network_online(true);
    expect_connected(&mut events).await;
    server.expect_event("getUnreadCount").await;

    assert_eq!(server.accepted.load(Ordering::SeqCst), 2);
    assert_eq!(server.max_live.load(Ordering::SeqCst), 1);
    manager.disconnect().await;
}

#[tokio::test]
async fn test_unreachable_server_reports_error_and_gives_up() {
    // Reserve a port, then free it so nothing listens there.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = Url::parse(&format!("ws://{addr}/ws")).unwrap();
    let mut config = SocketConfig::new(url, Some("t".into()));
    config.policy = ReconnectPolicy {
        max_attempts: Some(2),
        ..ReconnectPolicy::fixed(Duration::from_millis(10), Duration::from_millis(20))
    };
    let (manager, _events) = ConnectionManager::new(config);
    let mut state = manager.subscribe_state();

    manager.connect();
    let settled = tokio::time::timeout(
        WAIT,
        state.wait_for(|s| !s.connected && !s.reconnecting && s.last_error.is_some()),
    )
    .await
    .expect("manager never gave up")
    .unwrap()
    .clone();

    assert!(settled.last_error.unwrap().contains("Connection failed"));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!manager.is_running());
}
