//! WebSocket wire protocol.
//!
//! Every text frame carries a JSON envelope:
//!
//! ```json
//! {"event": "markNotificationRead", "data": {"notificationId": "n1"}}
//! ```
//!
//! Event names and payload keys are camelCase. Unknown server events decode
//! to [`ServerEvent::Unknown`] so newer backends never break older clients.

use alertdesk_core::Notification;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{ClientError, Result};

/// Events sent from the client to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    GetUnreadCount,
    MarkNotificationRead { notification_id: String },
    MarkMultipleAsRead { notification_ids: Vec<String> },
    JoinRoom { room: String },
    LeaveRoom { room: String },
}

impl ClientEvent {
    /// Wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::GetUnreadCount => "getUnreadCount",
            ClientEvent::MarkNotificationRead { .. } => "markNotificationRead",
            ClientEvent::MarkMultipleAsRead { .. } => "markMultipleAsRead",
            ClientEvent::JoinRoom { .. } => "joinRoom",
            ClientEvent::LeaveRoom { .. } => "leaveRoom",
        }
    }

    /// Encode as a text frame payload.
    pub fn to_frame(&self) -> String {
        let data = match self {
            ClientEvent::GetUnreadCount => Value::Null,
            ClientEvent::MarkNotificationRead { notification_id } => {
                json!({ "notificationId": notification_id })
            }
            ClientEvent::MarkMultipleAsRead { notification_ids } => {
                json!({ "notificationIds": notification_ids })
            }
            ClientEvent::JoinRoom { room } | ClientEvent::LeaveRoom { room } => {
                json!({ "room": room })
            }
        };
        json!({ "event": self.name(), "data": data }).to_string()
    }
}

/// Payload of the `connected` greeting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectedInfo {
    pub user_id: Option<String>,
    pub message: Option<String>,
}

/// Events pushed by the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Connected(ConnectedInfo),
    Notification(Box<Notification>),
    UnreadCount {
        count: u64,
    },
    NotificationMarkedRead {
        notification_id: String,
        unread_count: Option<u64>,
    },
    NotificationsMarkedRead {
        notification_ids: Vec<String>,
        unread_count: Option<u64>,
    },
    PermissionsUpdated {
        message: Option<String>,
        permissions: Value,
    },
    Error {
        message: String,
    },
    Unknown {
        event: String,
    },
}

#[derive(Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnreadCountPayload {
    count: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarkedReadPayload {
    notification_id: String,
    #[serde(default)]
    unread_count: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarkedManyPayload {
    notification_ids: Vec<String>,
    #[serde(default)]
    unread_count: Option<u64>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct PermissionsPayload {
    message: Option<String>,
    permissions: Value,
}

impl ServerEvent {
    /// Decode a text frame.
    pub fn parse(frame: &str) -> Result<Self> {
        let envelope: Envelope = serde_json::from_str(frame)
            .map_err(|e| ClientError::Protocol(format!("malformed frame: {e}")))?;
        let data = envelope.data;

        let event = match envelope.event.as_str() {
            "connected" => {
                let info = if data.is_null() {
                    ConnectedInfo::default()
                } else {
                    decode("connected", data)?
                };
                ServerEvent::Connected(info)
            }
            "notification" => ServerEvent::Notification(Box::new(decode("notification", data)?)),
            "unreadCount" => {
                // Older servers send the bare number.
                let count = match data.as_u64() {
                    Some(count) => count,
                    None => decode::<UnreadCountPayload>("unreadCount", data)?.count,
                };
                ServerEvent::UnreadCount { count }
            }
            "notificationMarkedRead" => {
                let p: MarkedReadPayload = decode("notificationMarkedRead", data)?;
                ServerEvent::NotificationMarkedRead {
                    notification_id: p.notification_id,
                    unread_count: p.unread_count,
                }
            }
            "notificationsMarkedRead" => {
                let p: MarkedManyPayload = decode("notificationsMarkedRead", data)?;
                ServerEvent::NotificationsMarkedRead {
                    notification_ids: p.notification_ids,
                    unread_count: p.unread_count,
                }
            }
            "permissionsUpdated" => {
                let p: PermissionsPayload = if data.is_null() {
                    PermissionsPayload::default()
                } else {
                    decode("permissionsUpdated", data)?
                };
                ServerEvent::PermissionsUpdated {
                    message: p.message,
                    permissions: p.permissions,
                }
            }
            "error" => {
                let message = match &data {
                    Value::String(s) => s.clone(),
                    other => other
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown server error")
                        .to_string(),
                };
                ServerEvent::Error { message }
            }
            other => ServerEvent::Unknown {
                event: other.to_string(),
            },
        };
        Ok(event)
    }

    /// Wire name of this event.
    pub fn name(&self) -> &str {
        match self {
            ServerEvent::Connected(_) => "connected",
            ServerEvent::Notification(_) => "notification",
            ServerEvent::UnreadCount { .. } => "unreadCount",
            ServerEvent::NotificationMarkedRead { .. } => "notificationMarkedRead",
            ServerEvent::NotificationsMarkedRead { .. } => "notificationsMarkedRead",
            ServerEvent::PermissionsUpdated { .. } => "permissionsUpdated",
            ServerEvent::Error { .. } => "error",
            ServerEvent::Unknown { event } => event,
        }
    }
}

fn decode<T: for<'de> Deserialize<'de>>(event: &str, data: Value) -> Result<T> {
    serde_json::from_value(data)
        .map_err(|e| ClientError::Protocol(format!("invalid {event} payload: {e}")))
}
