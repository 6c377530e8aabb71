//! Logging infrastructure for alertdesk.
//!
//! Structured logging using the `tracing` ecosystem. The dashboard owns the
//! terminal while it runs, so console output is optional and the JSON-lines
//! log file is the primary sink.
//!
//! ## Features
//!
//! - JSON lines format for machine parsing
//! - File output to `~/.alertdesk/logs/alertdesk.log` (daily rolling)
//! - Optional console output on stderr
//! - `--verbose` flag support for debug logging
//!
//! ## Example
//!
//! ```no_run
//! use alertdesk_core::logging;
//!
//! let _guard = logging::init_logging(None, false, true).expect("logging init");
//!
//! tracing::info!("alertdesk started");
//! tracing::debug!(notification_id = "n1", "notification received");
//! ```

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::error::{AlertdeskError, Result};

/// Crates whose events pass the default filter.
const LOG_TARGETS: &[&str] = &[
    "alertdesk",
    "alertdesk_core",
    "alertdesk_config",
    "alertdesk_client",
    "alertdesk_center",
    "alertdesk_tui",
];

/// Guard that must be held to ensure log flushing on shutdown.
///
/// When this guard is dropped, it flushes any pending log entries.
/// Keep this guard alive for the lifetime of the application.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize the alertdesk logging system.
///
/// This sets up:
/// - File logging to `~/.alertdesk/logs/alertdesk.log` (JSON lines format)
/// - Console logging to stderr (human-readable format) when `console` is set
///
/// # Arguments
///
/// * `log_dir` - Optional custom log directory. Defaults to `~/.alertdesk/logs/`
/// * `verbose` - If true, sets log level to DEBUG. Otherwise uses INFO.
/// * `console` - Also log to stderr. Leave off while the dashboard is drawn.
///
/// # Returns
///
/// A [`LogGuard`] that must be held for the application lifetime.
pub fn init_logging(log_dir: Option<PathBuf>, verbose: bool, console: bool) -> Result<LogGuard> {
    let log_dir = match log_dir {
        Some(dir) => dir,
        None => default_log_dir()?,
    };

    std::fs::create_dir_all(&log_dir).map_err(|e| AlertdeskError::DirectoryCreation {
        path: log_dir.clone(),
        source: e,
    })?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "alertdesk.log");
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(default_level)));

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .json()
        .with_span_events(FmtSpan::CLOSE)
        .with_current_span(true)
        .with_span_list(true);

    let console_layer = console.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(true)
            .with_file(verbose)
            .with_line_number(verbose)
            .compact()
            .boxed()
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    tracing::debug!(log_dir = %log_dir.display(), verbose, console, "logging initialized");

    Ok(LogGuard {
        _file_guard: Some(file_guard),
    })
}

/// Build the default `EnvFilter` directive string for the given level.
pub fn default_filter(level: &str) -> String {
    LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Initialize minimal console-only logging for testing.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

/// Get the alertdesk home directory.
///
/// Returns `~/.alertdesk/`
pub fn alertdesk_home() -> Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| AlertdeskError::internal("HOME environment variable not set"))?;

    Ok(PathBuf::from(home).join(".alertdesk"))
}

/// Get the default log directory path.
///
/// Returns `~/.alertdesk/logs/`
pub fn default_log_dir() -> Result<PathBuf> {
    Ok(alertdesk_home()?.join("logs"))
}

/// Convenience macro for logging notification lifecycle events.
///
/// # Example
///
/// ```ignore
/// log_notification_event!("n1", "modal_shown");
/// log_notification_event!("n1", "acknowledged", priority = "P0");
/// ```
#[macro_export]
macro_rules! log_notification_event {
    ($notification_id:expr, $event:expr) => {
        tracing::info!(
            target: "alertdesk::notification",
            notification_id = $notification_id,
            event = $event,
            "notification event"
        )
    };
    ($notification_id:expr, $event:expr, $($field:tt)*) => {
        tracing::info!(
            target: "alertdesk::notification",
            notification_id = $notification_id,
            event = $event,
            $($field)*,
            "notification event"
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_default_log_dir() {
        // SAFETY: serialised with every other test that touches HOME
        unsafe { std::env::set_var("HOME", "/tmp/test-home") };
        let dir = default_log_dir().unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/test-home/.alertdesk/logs"));
    }

    #[test]
    fn test_default_filter_covers_all_crates() {
        let filter = default_filter("debug");
        assert!(filter.contains("alertdesk_client=debug"));
        assert!(filter.contains("alertdesk_center=debug"));
        assert_eq!(filter.split(',').count(), LOG_TARGETS.len());
    }

    #[test]
    fn test_init_test_logging() {
        init_test_logging();
        log_notification_event!("n1", "test");
    }
}
