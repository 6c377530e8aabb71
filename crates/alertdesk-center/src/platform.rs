//! OS-level side effects for incoming notifications.

use std::io::Write;

use alertdesk_core::{Notification, PriorityClass};
use tracing::debug;

/// Desktop notification and vibration hooks.
///
/// Both are best effort: failures are swallowed by the implementation.
pub trait PlatformHooks {
    /// Whether the user allowed OS-level notifications.
    fn notifications_permitted(&self) -> bool;

    fn show_system_notification(&mut self, notification: &Notification);

    /// Vibrate on devices that support it.
    fn vibrate(&mut self, notification: &Notification);
}

/// Terminal host: rings the bell for critical alerts, logs everything else.
#[derive(Debug, Default)]
pub struct TerminalPlatform {
    bell: bool,
}

impl TerminalPlatform {
    pub fn new(bell: bool) -> Self {
        Self { bell }
    }
}

impl PlatformHooks for TerminalPlatform {
    fn notifications_permitted(&self) -> bool {
        true
    }

    fn show_system_notification(&mut self, notification: &Notification) {
        debug!(id = %notification.id, title = %notification.title, "system notification");
    }

    fn vibrate(&mut self, notification: &Notification) {
        if self.bell && notification.priority_class() == PriorityClass::Critical {
            let mut stdout = std::io::stdout();
            let _ = stdout.write_all(b"\x07").and_then(|()| stdout.flush());
        }
    }
}

/// Hooks that do nothing. Used by tests and headless hosts.
#[derive(Debug, Default)]
pub struct NoopPlatform;

impl PlatformHooks for NoopPlatform {
    fn notifications_permitted(&self) -> bool {
        false
    }

    fn show_system_notification(&mut self, _notification: &Notification) {}

    fn vibrate(&mut self, _notification: &Notification) {}
}
