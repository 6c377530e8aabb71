//! # alertdesk-center
//!
//! Client-side notification core for alertdesk.
//!
//! This crate provides:
//! - [`NotificationStore`] - Newest-first notification list and unread counter
//! - [`PriorityHandler`] - Per-notification alert state machine (modal / toast / list)
//! - [`ToastQueue`] - Bounded, self-expiring toast stack
//! - [`SoundManager`] - Priority-keyed audio cues behind an [`AudioBackend`]
//! - [`PlatformHooks`] - OS notification and vibration side effects
//! - [`NotificationCenter`] - Wires the above to the socket and REST client
//!
//! ## Priority routing
//!
//! | Priority | Presentation |
//! |---|---|
//! | P0 | Blocking modal until acknowledged or dismissed, one at a time |
//! | P1 | Toast with Acknowledge / Dismiss, shown once |
//! | P2, P3, none | List and badge only |
//!
//! ## Features
//!
//! - `audio` - play cues through `rodio`. Without it sound is unavailable and
//!   every play request is a silent no-op.

pub mod center;
pub mod platform;
pub mod priority;
pub mod sound;
pub mod store;
pub mod toast;

pub use center::{CenterEvent, FetchOutcome, NotificationCenter, PendingFetch, PendingMarkAll};
pub use platform::{NoopPlatform, PlatformHooks, TerminalPlatform};
pub use priority::{AlertAction, AlertState, Evaluation, Presentation, PriorityHandler};
#[cfg(feature = "audio")]
pub use sound::RodioAudio;
pub use sound::{AudioBackend, AudioError, CueKey, NullAudio, PlayOutcome, SoundManager};
pub use store::{FetchTicket, NotificationStore};
pub use toast::{Toast, ToastKind, ToastPhase, ToastQueue};
