//! # alertdesk-client
//!
//! Transport layer for the portal notification API.
//!
//! This crate provides:
//! - [`ConnectionManager`] - Single real-time WebSocket connection with reconnect
//! - [`NotificationApi`] - REST client for fetching and bulk-marking notifications
//! - [`protocol`] - JSON event envelope spoken over the socket
//! - [`ClientError`] - Error classification for REST and socket failures
//!
//! ## Example
//!
//! ```no_run
//! use alertdesk_client::{ConnectionManager, SocketConfig, SocketEvent};
//! use url::Url;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let url = Url::parse("ws://localhost:5000/ws")?;
//!     let (manager, mut events) = ConnectionManager::new(SocketConfig::new(url, Some("token".into())));
//!     manager.connect();
//!
//!     while let Some(event) = events.recv().await {
//!         if let SocketEvent::Server(event) = event {
//!             println!("{}", event.name());
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod protocol;
pub mod rest;
pub mod socket;

pub use error::{ClientError, Result};
pub use protocol::{ClientEvent, ConnectedInfo, ServerEvent};
pub use rest::{NotificationApi, NotificationPage, NotificationSource};
pub use socket::{
    ConnectionManager, DEFAULT_OUTBOUND_BUFFER, DisconnectReason, ReadSync, SocketConfig,
    SocketEvent,
};
