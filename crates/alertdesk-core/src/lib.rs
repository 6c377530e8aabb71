//! # alertdesk-core
//!
//! Core types, errors, and utilities for the alertdesk notification client.
//!
//! This crate provides:
//! - [`AlertdeskError`] - Error type for configuration, I/O and parsing failures
//! - [`logging`] - Tracing setup and log management utilities
//! - [`types`] - Notification data model shared across alertdesk crates
//! - [`backoff`] - Reconnect delay policy for the real-time connection
//!
//! ## Example
//!
//! ```no_run
//! use alertdesk_core::{logging, Notification, Priority};
//!
//! fn main() -> alertdesk_core::Result<()> {
//!     let _guard = logging::init_logging(None, false, true)?;
//!
//!     let raw = r#"{"id":"n1","type":"order","title":"Order stuck","message":"",
//!                   "severity":"warning","priority":"P1","isRead":false,
//!                   "createdAt":"2024-05-01T10:00:00Z"}"#;
//!     let notification: Notification = serde_json::from_str(raw)
//!         .map_err(|e| alertdesk_core::AlertdeskError::json_parse("notification", e))?;
//!     assert_eq!(notification.priority, Some(Priority::P1));
//!     Ok(())
//! }
//! ```

pub mod backoff;
pub mod error;
pub mod logging;
pub mod types;

// Re-export main types for convenience
pub use backoff::ReconnectPolicy;
pub use error::{AlertdeskError, Result};
pub use logging::{LogGuard, init_logging};
pub use types::{
    ConnectionState, Notification, NotificationData, Priority, PriorityClass, Severity,
};
