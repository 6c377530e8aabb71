//! Error types for alertdesk operations.
//!
//! This module defines [`AlertdeskError`], the error enum for the parts of
//! alertdesk that may legitimately fail at startup: configuration, file I/O
//! and parsing. Runtime failures on the notification path (socket drops,
//! fetch errors, audio) are reported through state instead and never reach
//! this type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`AlertdeskError`].
pub type Result<T> = std::result::Result<T, AlertdeskError>;

/// Error type for alertdesk startup and configuration operations.
#[derive(Debug, Error)]
pub enum AlertdeskError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration file not found
    #[error("Configuration not found at {path}")]
    ConfigNotFound {
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Configuration file is invalid YAML
    #[error("Invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    /// Configuration validation failed
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String },

    /// Missing required configuration field
    #[error("Missing required config field: {field}")]
    ConfigMissingField { field: String },

    // =========================================================================
    // I/O Errors
    // =========================================================================
    /// Generic I/O error with context
    #[error("I/O error {operation}: {path}")]
    Io {
        operation: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory creation failed
    #[error("Failed to create directory: {path}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // =========================================================================
    // Parsing Errors
    // =========================================================================
    /// JSON parsing error
    #[error("JSON parse error in {context}: {message}")]
    JsonParse {
        context: String,
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// Session blob did not contain a usable token
    #[error("Invalid session file {path}: {message}")]
    SessionParse { path: PathBuf, message: String },

    // =========================================================================
    // Terminal Errors
    // =========================================================================
    /// Terminal initialization failed
    #[error("Terminal initialization failed: {message}")]
    TerminalInit { message: String },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal error (bug in alertdesk)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AlertdeskError {
    // =========================================================================
    // Constructor helpers for common error patterns
    // =========================================================================

    /// Create a ConfigNotFound error
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ConfigNotFound {
            path: path.into(),
            source: None,
        }
    }

    /// Create a ConfigValidation error
    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: path.into(),
            source,
        }
    }

    /// Create a JSON parse error
    pub fn json_parse(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::JsonParse {
            context: context.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create a TerminalInit error from a failed terminal setup step
    pub fn terminal_init(source: std::io::Error) -> Self {
        Self::TerminalInit {
            message: source.to_string(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    // =========================================================================
    // User guidance
    // =========================================================================

    /// Returns actionable guidance for the user
    pub fn guidance(&self) -> Option<&'static str> {
        match self {
            Self::ConfigNotFound { .. } => {
                Some("Create ~/.alertdesk/config.yaml or pass --config <path>")
            }
            Self::ConfigInvalid { .. } => Some("Check YAML syntax in the configuration file"),
            Self::ConfigMissingField { .. } => Some("Add the missing field to the configuration"),
            Self::SessionParse { .. } => {
                Some("Sign in again to refresh the session file, or pass --token")
            }
            Self::TerminalInit { .. } => Some("Try running in a different terminal"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_not_found_error() {
        let err = AlertdeskError::config_not_found("/home/user/.alertdesk/config.yaml");
        assert!(err.to_string().contains("Configuration not found"));
        assert!(err.guidance().is_some());
    }

    #[test]
    fn test_validation_error_message() {
        let err = AlertdeskError::config_validation("toast.max_visible must be at least 1");
        assert!(err.to_string().contains("max_visible"));
        assert_eq!(err.guidance(), None);
    }

    #[test]
    fn test_terminal_init_guidance() {
        let err = AlertdeskError::terminal_init(std::io::Error::other("not a tty"));
        assert!(err.to_string().contains("not a tty"));
        assert_eq!(err.guidance(), Some("Try running in a different terminal"));
    }

    #[test]
    fn test_session_guidance() {
        let err = AlertdeskError::SessionParse {
            path: "/tmp/session.json".into(),
            message: "no token".into(),
        };
        assert_eq!(
            err.guidance(),
            Some("Sign in again to refresh the session file, or pass --token")
        );
    }
}
