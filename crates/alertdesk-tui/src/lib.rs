//! Terminal UI for alertdesk.
//!
//! This crate provides the Ratatui-based notification dashboard.
//!
//! ## Features
//!
//! - Live connection status and unread badge
//! - Newest-first notification list
//! - Blocking modal for P0 alerts, toasts for P1 alerts
//! - Priority-keyed sound cues (with the `audio` feature)
//!
//! ## Hotkeys
//!
//! - `↑`/`k`, `↓`/`j` - Move selection
//! - `Enter` - Open (marks read)
//! - `a` - Acknowledge
//! - `d` or `Esc` - Dismiss
//! - `o` - Open newest toast (marks read)
//! - `x` - Close newest toast
//! - `A` - Mark all as read
//! - `r` - Refresh
//! - `s` - Toggle sound
//! - `?` - Help
//! - `q` - Quit

pub mod app;
pub mod event;
pub mod theme;

pub use app::{App, AppResult};
pub use event::{AppEvent, InputHandler};
pub use theme::{Theme, ThemeColors};
