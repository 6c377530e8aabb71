//! Priority routing for incoming notifications.
//!
//! Every notification moves through a small state machine:
//!
//! ```text
//! Unseen ─ShowModal─▶ ModalShown ─Acknowledge─▶ Acknowledged
//!    │                    └───────Dismiss─────▶ Dismissed
//!    ├──ShowToast─▶ ToastShown ─Acknowledge─▶ Acknowledged
//!    │                  └───────Dismiss─────▶ Dismissed
//!    └─ShowInList─▶ SeenInList
//! ```
//!
//! `Acknowledge` also applies to `Unseen` and `SeenInList` when the server
//! reports the notification read through another path. Terminal states never
//! change again, which gives at-most-once presentation per session.
//!
//! Critical (P0) alerts open a blocking modal, one at a time, most recent
//! first. High (P1) alerts become toasts with Acknowledge/Dismiss actions.
//! Everything else only shows up in the list.

use std::collections::{HashMap, HashSet};

use alertdesk_core::{Notification, PriorityClass, log_notification_event};

/// Per-notification presentation state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AlertState {
    #[default]
    Unseen,
    ModalShown,
    ToastShown,
    /// Read and synced with the server
    Acknowledged,
    /// Closed without marking read; suppressed for this session only
    Dismissed,
    SeenInList,
}

/// Inputs to the per-notification state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertAction {
    ShowModal,
    ShowToast,
    ShowInList,
    Acknowledge,
    Dismiss,
}

impl AlertState {
    /// Transition table. `None` means the action is not valid in this state.
    pub fn apply(self, action: AlertAction) -> Option<AlertState> {
        use AlertAction as A;
        use AlertState as S;

        match (self, action) {
            (S::Unseen, A::ShowModal) => Some(S::ModalShown),
            (S::Unseen, A::ShowToast) => Some(S::ToastShown),
            (S::Unseen, A::ShowInList) => Some(S::SeenInList),
            (S::ModalShown | S::ToastShown, A::Acknowledge) => Some(S::Acknowledged),
            (S::ModalShown | S::ToastShown, A::Dismiss) => Some(S::Dismissed),
            (S::Unseen | S::SeenInList, A::Acknowledge) => Some(S::Acknowledged),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AlertState::Acknowledged | AlertState::Dismissed)
    }

    pub fn label(self) -> &'static str {
        match self {
            AlertState::Unseen => "unseen",
            AlertState::ModalShown => "modal",
            AlertState::ToastShown => "toast",
            AlertState::Acknowledged => "acknowledged",
            AlertState::Dismissed => "dismissed",
            AlertState::SeenInList => "listed",
        }
    }
}

/// How a notification is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presentation {
    Modal,
    Toast,
    Silent,
}

impl Presentation {
    pub fn for_notification(notification: &Notification) -> Self {
        match notification.priority_class() {
            PriorityClass::Critical => Presentation::Modal,
            PriorityClass::High => Presentation::Toast,
            PriorityClass::Normal => Presentation::Silent,
        }
    }
}

/// Result of one evaluation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    /// Modal opened by this pass
    pub modal: Option<Notification>,
    /// High-priority notifications to toast, most recent first
    pub toasts: Vec<Notification>,
}

impl Evaluation {
    pub fn is_empty(&self) -> bool {
        self.modal.is_none() && self.toasts.is_empty()
    }
}

/// Tracks alert state for the session and decides what to present.
#[derive(Debug, Default)]
pub struct PriorityHandler {
    states: HashMap<String, AlertState>,
    modal: Option<Notification>,
}

impl PriorityHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state_of(&self, id: &str) -> AlertState {
        self.states.get(id).copied().unwrap_or_default()
    }

    /// The blocking modal currently shown, if any.
    pub fn active_modal(&self) -> Option<&Notification> {
        self.modal.as_ref()
    }

    /// Inspect the notification list and decide what to present.
    ///
    /// Safe to call after every change; already-handled notifications are
    /// skipped.
    pub fn evaluate(&mut self, notifications: &[Notification]) -> Evaluation {
        let mut evaluation = Evaluation::default();

        for notification in notifications {
            if self.state_of(&notification.id) != AlertState::Unseen {
                continue;
            }
            if notification.is_read {
                self.transition(&notification.id, AlertAction::Acknowledge);
                continue;
            }
            match Presentation::for_notification(notification) {
                Presentation::Toast => {
                    if self.transition(&notification.id, AlertAction::ShowToast) {
                        evaluation.toasts.push(notification.clone());
                    }
                }
                Presentation::Silent => {
                    self.transition(&notification.id, AlertAction::ShowInList);
                }
                // Handled below, one at a time.
                Presentation::Modal => {}
            }
        }
        evaluation
            .toasts
            .sort_by(|a, b| b.created_at.cmp(&a.created_at));

        if self.modal.is_none() {
            let next = notifications
                .iter()
                .filter(|n| Presentation::for_notification(n) == Presentation::Modal)
                .filter(|n| !n.is_read && self.state_of(&n.id) == AlertState::Unseen)
                .reduce(|best, n| if n.created_at > best.created_at { n } else { best });

            if let Some(next) = next.cloned()
                && self.transition(&next.id, AlertAction::ShowModal)
            {
                self.modal = Some(next.clone());
                evaluation.modal = Some(next);
            }
        }

        evaluation
    }

    /// User acknowledged a modal or toast. Returns whether the state changed;
    /// the caller is responsible for the server-side read.
    pub fn acknowledge(&mut self, id: &str) -> bool {
        let changed = matches!(
            self.state_of(id),
            AlertState::ModalShown | AlertState::ToastShown
        ) && self.transition(id, AlertAction::Acknowledge);
        if changed {
            self.close_modal_if(id);
        }
        changed
    }

    /// User dismissed a modal or toast without reading it.
    pub fn dismiss(&mut self, id: &str) -> bool {
        let changed = self.transition(id, AlertAction::Dismiss);
        if changed {
            self.close_modal_if(id);
        }
        changed
    }

    /// The notification was marked read (locally or by a server echo).
    pub fn on_marked_read(&mut self, id: &str) {
        self.transition(id, AlertAction::Acknowledge);
        self.close_modal_if(id);
    }

    /// Drop settled state for notifications no longer in `notifications`.
    ///
    /// Dismissed alerts stay suppressed for the session, and anything still
    /// on screen keeps its state.
    pub fn forget_evicted(&mut self, notifications: &[Notification]) {
        let known: HashSet<&str> = notifications.iter().map(|n| n.id.as_str()).collect();
        self.states.retain(|id, state| {
            known.contains(id.as_str())
                || !matches!(state, AlertState::Acknowledged | AlertState::SeenInList)
        });
    }

    /// Number of notifications with recorded state.
    pub fn tracked(&self) -> usize {
        self.states.len()
    }

    fn close_modal_if(&mut self, id: &str) {
        if self.modal.as_ref().is_some_and(|m| m.id == id) {
            self.modal = None;
        }
    }

    fn transition(&mut self, id: &str, action: AlertAction) -> bool {
        let current = self.state_of(id);
        match current.apply(action) {
            Some(next) => {
                self.states.insert(id.to_string(), next);
                log_notification_event!(id, next.label(), from = current.label());
                true
            }
            None => false,
        }
    }
}
