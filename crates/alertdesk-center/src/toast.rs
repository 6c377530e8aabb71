//! Bounded toast queue with an enter/visible/leave lifecycle.
//!
//! New toasts go to the head. When the queue is full the oldest entry is
//! evicted immediately. A toast with a duration stays `Visible` for that long
//! once it has finished entering; without one it stays until dismissed.
//!
//! Time is passed in explicitly so the host decides the clock.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use alertdesk_core::Notification;
use tracing::debug;

/// Default enter/leave animation length.
pub const ANIMATION: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastPhase {
    Entering,
    Visible,
    Leaving,
}

/// What the toast offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    /// High-priority alert with Acknowledge/Dismiss actions
    Alert,
    /// Informational slide-in card
    Slide,
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub notification: Notification,
    pub kind: ToastKind,
    phase: ToastPhase,
    phase_started: Instant,
    duration: Option<Duration>,
}

impl Toast {
    pub fn id(&self) -> &str {
        &self.notification.id
    }

    pub fn phase(&self) -> ToastPhase {
        self.phase
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn is_persistent(&self) -> bool {
        self.duration.is_none()
    }

    fn leave(&mut self, now: Instant) -> bool {
        if self.phase == ToastPhase::Leaving {
            return false;
        }
        self.phase = ToastPhase::Leaving;
        self.phase_started = now;
        true
    }
}

#[derive(Debug)]
pub struct ToastQueue {
    entries: VecDeque<Toast>,
    max_visible: usize,
    animation: Duration,
}

impl ToastQueue {
    pub fn new(max_visible: usize) -> Self {
        Self::with_animation(max_visible, ANIMATION)
    }

    pub fn with_animation(max_visible: usize, animation: Duration) -> Self {
        Self {
            entries: VecDeque::new(),
            max_visible: max_visible.max(1),
            animation,
        }
    }

    pub fn max_visible(&self) -> usize {
        self.max_visible
    }

    /// Add a toast at the head.
    ///
    /// Returns false if a toast for the same notification is already queued.
    pub fn push(
        &mut self,
        notification: Notification,
        kind: ToastKind,
        duration: Option<Duration>,
        now: Instant,
    ) -> bool {
        if self.contains(&notification.id) {
            debug!(id = %notification.id, "toast already visible");
            return false;
        }

        self.entries.push_front(Toast {
            notification,
            kind,
            phase: ToastPhase::Entering,
            phase_started: now,
            duration,
        });
        while self.entries.len() > self.max_visible {
            if let Some(evicted) = self.entries.pop_back() {
                debug!(id = %evicted.notification.id, "toast evicted");
            }
        }
        true
    }

    /// Close control: start leaving. Returns whether a toast was affected.
    pub fn dismiss(&mut self, id: &str, now: Instant) -> bool {
        self.entries
            .iter_mut()
            .find(|t| t.id() == id)
            .is_some_and(|t| t.leave(now))
    }

    /// Body click: start leaving and hand back the notification so the
    /// caller can follow its link and mark it read.
    pub fn click(&mut self, id: &str, now: Instant) -> Option<Notification> {
        let toast = self.entries.iter_mut().find(|t| t.id() == id)?;
        toast.leave(now);
        Some(toast.notification.clone())
    }

    /// Advance phases. Returns ids of toasts removed by this tick.
    pub fn tick(&mut self, now: Instant) -> Vec<String> {
        let animation = self.animation;
        for toast in self.entries.iter_mut() {
            if toast.phase == ToastPhase::Entering
                && now.saturating_duration_since(toast.phase_started) >= animation
            {
                toast.phase = ToastPhase::Visible;
                toast.phase_started += animation;
            }
            if toast.phase == ToastPhase::Visible
                && let Some(duration) = toast.duration
                && now.saturating_duration_since(toast.phase_started) >= duration
            {
                toast.phase = ToastPhase::Leaving;
                toast.phase_started += duration;
            }
        }

        let mut removed = Vec::new();
        self.entries.retain(|toast| {
            let gone = toast.phase == ToastPhase::Leaving
                && now.saturating_duration_since(toast.phase_started) >= animation;
            if gone {
                removed.push(toast.notification.id.clone());
            }
            !gone
        });
        removed
    }

    /// Queued toasts, newest first.
    pub fn visible(&self) -> impl Iterator<Item = &Toast> {
        self.entries.iter()
    }

    /// Newest toast that is not already leaving.
    pub fn top(&self) -> Option<&Toast> {
        self.entries.iter().find(|t| t.phase != ToastPhase::Leaving)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|t| t.id() == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    fn toast(id: &str) -> Notification {
        Notification::new(id, format!("toast {id}"))
    }

    fn ids(queue: &ToastQueue) -> Vec<String> {
        queue.visible().map(|t| t.id().to_string()).collect()
    }

    #[test]
    fn test_bounded_evicts_oldest() {
        let now = Instant::now();
        let mut queue = ToastQueue::new(3);
        for id in ["a", "b", "c", "d"] {
            assert!(queue.push(toast(id), ToastKind::Alert, None, now));
            assert!(queue.len() <= 3);
        }
        assert_eq!(ids(&queue), vec!["d", "c", "b"]);
    }

    #[test]
    fn test_duplicate_rejected() {
        let now = Instant::now();
        let mut queue = ToastQueue::new(3);
        assert!(queue.push(toast("a"), ToastKind::Alert, None, now));
        assert!(!queue.push(toast("a"), ToastKind::Slide, Some(ms(10)), now));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_lifecycle_with_duration() {
        let start = Instant::now();
        let mut queue = ToastQueue::new(3);
        queue.push(toast("a"), ToastKind::Slide, Some(ms(5000)), start);
        assert_eq!(queue.top().unwrap().phase(), ToastPhase::Entering);

        assert!(queue.tick(start + ms(300)).is_empty());
        assert_eq!(queue.top().unwrap().phase(), ToastPhase::Visible);

        // Duration counts from the end of the entering phase.
        queue.tick(start + ms(5200));
        assert_eq!(queue.top().unwrap().phase(), ToastPhase::Visible);
        queue.tick(start + ms(5300));
        assert_eq!(queue.visible().next().unwrap().phase(), ToastPhase::Leaving);

        assert_eq!(queue.tick(start + ms(5600)), vec!["a".to_string()]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_late_tick_removes_in_one_pass() {
        let start = Instant::now();
        let mut queue = ToastQueue::new(3);
        queue.push(toast("a"), ToastKind::Slide, Some(ms(100)), start);
        assert_eq!(queue.tick(start + ms(10_000)), vec!["a".to_string()]);
    }

    #[test]
    fn test_persistent_until_dismissed() {
        let start = Instant::now();
        let mut queue = ToastQueue::new(3);
        queue.push(toast("a"), ToastKind::Alert, None, start);
        queue.tick(start + Duration::from_secs(3600));
        assert_eq!(queue.len(), 1);
        assert!(queue.top().unwrap().is_persistent());

        let later = start + Duration::from_secs(3601);
        assert!(queue.dismiss("a", later));
        assert!(!queue.dismiss("a", later));
        assert!(queue.top().is_none());
        assert_eq!(queue.tick(later + ms(300)), vec!["a".to_string()]);
    }

    #[test]
    fn test_click_returns_notification() {
        let now = Instant::now();
        let mut queue = ToastQueue::new(3);
        queue.push(toast("a").with_link("/orders/42"), ToastKind::Slide, None, now);

        let clicked = queue.click("a", now).unwrap();
        assert_eq!(clicked.link(), Some("/orders/42"));
        assert!(queue.click("missing", now).is_none());
    }
}
