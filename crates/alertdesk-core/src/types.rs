//! Notification data model shared across alertdesk crates.
//!
//! The field names on the wire are camelCase, matching the portal backend's
//! REST and WebSocket payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Visual severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    /// Get the icon for this severity level.
    pub fn icon(&self) -> &'static str {
        match self {
            Severity::Info => "ℹ",
            Severity::Success => "✔",
            Severity::Warning => "⚠",
            Severity::Error => "✖",
        }
    }
}

/// Alert priority tier. P0 is the most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    P0,
    P1,
    P2,
    P3,
}

/// How a priority tier is presented to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriorityClass {
    /// Blocking modal until acknowledged (P0)
    Critical,
    /// Long-lived toast with Acknowledge/Dismiss actions (P1)
    High,
    /// Badge and list only
    Normal,
}

impl Priority {
    /// Map this tier onto its presentation class.
    pub fn class(&self) -> PriorityClass {
        match self {
            Priority::P0 => PriorityClass::Critical,
            Priority::P1 => PriorityClass::High,
            Priority::P2 | Priority::P3 => PriorityClass::Normal,
        }
    }

    /// Short label, e.g. `"P0"`.
    pub fn label(&self) -> &'static str {
        match self {
            Priority::P0 => "P0",
            Priority::P1 => "P1",
            Priority::P2 => "P2",
            Priority::P3 => "P3",
        }
    }
}

/// Free-form payload attached to a notification.
///
/// `link` and `orderId` are the keys the dashboard understands; everything
/// else is preserved in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A single notification as known to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub data: NotificationData,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Notification type used for locally synthesised permission updates.
pub const PERMISSION_UPDATE_KIND: &str = "permission_update";

impl Notification {
    /// Create an unread notification with default severity and no priority.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: String::new(),
            title: title.into(),
            message: String::new(),
            icon: None,
            severity: Severity::Info,
            priority: None,
            data: NotificationData::default(),
            is_read: false,
            created_at: Utc::now(),
        }
    }

    /// Synthesise a notification for a permission change pushed by the server.
    pub fn permission_update(message: impl Into<String>) -> Self {
        Self {
            kind: PERMISSION_UPDATE_KIND.to_string(),
            message: message.into(),
            icon: Some("shield".to_string()),
            ..Self::new(uuid::Uuid::new_v4().to_string(), "Permissions updated")
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.data.link = Some(link.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn read(mut self) -> Self {
        self.is_read = true;
        self
    }

    /// Presentation class; notifications without a priority are normal.
    pub fn priority_class(&self) -> PriorityClass {
        self.priority
            .map(|p| p.class())
            .unwrap_or(PriorityClass::Normal)
    }

    /// Deep link embedded in the payload, if any.
    pub fn link(&self) -> Option<&str> {
        self.data.link.as_deref()
    }
}

/// Real-time connection status, owned by the socket connection manager.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionState {
    pub connected: bool,
    pub reconnecting: bool,
    pub last_error: Option<String>,
}

impl ConnectionState {
    /// One-word status for headers and logs.
    pub fn label(&self) -> &'static str {
        if self.connected {
            "live"
        } else if self.reconnecting {
            "reconnecting"
        } else {
            "offline"
        }
    }
}
