//! Error types for the notification client.

use thiserror::Error;

/// Client errors (REST and WebSocket).
#[derive(Debug, Error)]
pub enum ClientError {
    /// API request failed (transient, retryable)
    #[error("API request failed (transient): {0}")]
    ApiTransientError(String),

    /// API request failed (permanent)
    #[error("API request failed: {0}")]
    ApiError(String),

    /// Token missing, expired or rejected
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    /// Network timeout
    #[error("Network timeout after {0}s: {1}")]
    Timeout(u64, String),

    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Frame could not be decoded
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::Io(e) => ClientError::ConnectionFailed(e.to_string()),
            WsError::Http(response) => {
                let status = response.status().as_u16();
                ClientError::from_http_status(status, "websocket upgrade rejected")
            }
            other => ClientError::WebSocket(other.to_string()),
        }
    }
}

impl ClientError {
    /// Check if this error is retryable (transient network/API issues).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::ApiTransientError(_)
                | ClientError::Timeout(_, _)
                | ClientError::ConnectionFailed(_)
                | ClientError::WebSocket(_)
        )
    }

    /// Check if this error is a network-related error.
    pub fn is_network_error(&self) -> bool {
        match self {
            ClientError::ApiTransientError(_)
            | ClientError::Timeout(_, _)
            | ClientError::ConnectionFailed(_)
            | ClientError::WebSocket(_) => true,
            ClientError::HttpError(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }

    /// Check if the server rejected our credentials.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, ClientError::Unauthorized(_))
    }

    /// Get a user-friendly error message.
    pub fn friendly_message(&self) -> String {
        match self {
            ClientError::ApiTransientError(msg) => {
                format!("Temporary API issue: {}. Please try again.", msg)
            }
            ClientError::Timeout(secs, _) => {
                format!("Request timed out after {}s. Check your connection.", secs)
            }
            ClientError::ConnectionFailed(msg) => {
                format!("Connection failed: {}. Check your network.", msg)
            }
            ClientError::Unauthorized(_) => "Session expired. Sign in again.".to_string(),
            ClientError::WebSocket(msg) => format!("Real-time connection lost: {}", msg),
            ClientError::ApiError(msg) => msg.clone(),
            ClientError::HttpError(e) if e.is_timeout() => {
                "Request timed out. Check your connection.".to_string()
            }
            ClientError::HttpError(e) if e.is_connect() => {
                "Could not reach the server. Check your network.".to_string()
            }
            _ => format!("Error: {}", self),
        }
    }

    /// Classify an HTTP status code into appropriate error type.
    pub fn from_http_status(status: u16, body: &str) -> Self {
        match status {
            401 | 403 => ClientError::Unauthorized(format!("HTTP {}: {}", status, body)),
            408 => ClientError::Timeout(30, "Request timeout".to_string()),
            429 | 500 | 502 | 503 | 504 => {
                ClientError::ApiTransientError(format!("Server error ({}): {}", status, body))
            }
            _ => ClientError::ApiError(format!("HTTP {}: {}", status, body)),
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(ClientError::from_http_status(401, "").is_auth_error());
        assert!(ClientError::from_http_status(403, "").is_auth_error());
        assert!(ClientError::from_http_status(503, "").is_retryable());
        assert!(ClientError::from_http_status(429, "").is_retryable());
        assert!(!ClientError::from_http_status(400, "bad").is_retryable());
        assert!(matches!(
            ClientError::from_http_status(408, ""),
            ClientError::Timeout(_, _)
        ));
    }

    #[test]
    fn test_network_classification() {
        assert!(ClientError::ConnectionFailed("refused".into()).is_network_error());
        assert!(ClientError::WebSocket("reset".into()).is_network_error());
        assert!(!ClientError::Protocol("bad frame".into()).is_network_error());
        assert!(!ClientError::ConfigError("bad token".into()).is_retryable());
    }

    #[test]
    fn test_friendly_messages() {
        let msg = ClientError::Timeout(30, "slow".into()).friendly_message();
        assert!(msg.contains("30s"));
        let msg = ClientError::Unauthorized("HTTP 401".into()).friendly_message();
        assert!(msg.contains("Sign in"));
    }
}
