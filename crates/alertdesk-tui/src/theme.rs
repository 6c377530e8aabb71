//! Colour palette for the dashboard.

use alertdesk_core::{Priority, Severity};
use ratatui::style::Color;

/// Color palette for a theme.
#[derive(Debug, Clone)]
pub struct ThemeColors {
    /// Primary headers and focused borders
    pub header: Color,
    /// Hotkey hints
    pub hotkey: Color,
    pub text: Color,
    /// Secondary text (timestamps, read entries)
    pub text_dim: Color,
    pub border_dim: Color,
    pub selection: Color,
    pub status_live: Color,
    pub status_reconnecting: Color,
    pub status_offline: Color,
    pub critical: Color,
    pub high: Color,
    pub info: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
}

#[derive(Debug, Clone)]
pub struct Theme {
    pub colors: ThemeColors,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            colors: ThemeColors {
                header: Color::Cyan,
                hotkey: Color::Yellow,
                text: Color::White,
                text_dim: Color::Gray,
                border_dim: Color::DarkGray,
                selection: Color::Blue,
                status_live: Color::Green,
                status_reconnecting: Color::Yellow,
                status_offline: Color::Red,
                critical: Color::LightRed,
                high: Color::LightYellow,
                info: Color::LightBlue,
                success: Color::Green,
                warning: Color::Yellow,
                error: Color::Red,
            },
        }
    }
}

impl Theme {
    pub fn severity(&self, severity: Severity) -> Color {
        match severity {
            Severity::Info => self.colors.info,
            Severity::Success => self.colors.success,
            Severity::Warning => self.colors.warning,
            Severity::Error => self.colors.error,
        }
    }

    pub fn priority(&self, priority: Option<Priority>) -> Color {
        match priority {
            Some(Priority::P0) => self.colors.critical,
            Some(Priority::P1) => self.colors.high,
            Some(Priority::P2 | Priority::P3) | None => self.colors.text_dim,
        }
    }
}
