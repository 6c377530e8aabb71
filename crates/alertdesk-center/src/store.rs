//! In-memory notification store.
//!
//! Holds the newest-first list of notifications known to the client and the
//! unread counter mirrored from the server. Read flags are flipped
//! optimistically and later reconciled with the server's echo events.
//!
//! Fetches are tagged with a monotonic [`FetchTicket`]; a response is applied
//! only if it is newer than the last applied one, so a slow request can never
//! overwrite fresher data.

use alertdesk_client::NotificationPage;
use alertdesk_core::Notification;
use tracing::debug;

/// Default number of notifications retained client-side.
pub const DEFAULT_FETCH_LIMIT: usize = 50;

/// Sequence token handed out by [`NotificationStore::begin_fetch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FetchTicket(u64);

#[derive(Debug, Clone)]
pub struct NotificationStore {
    notifications: Vec<Notification>,
    unread_count: u64,
    limit: usize,
    issued: u64,
    applied: u64,
    last_error: Option<String>,
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new(DEFAULT_FETCH_LIMIT)
    }
}

impl NotificationStore {
    pub fn new(limit: usize) -> Self {
        Self {
            notifications: Vec::new(),
            unread_count: 0,
            limit: limit.max(1),
            issued: 0,
            applied: 0,
            last_error: None,
        }
    }

    /// Newest first.
    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn get(&self, id: &str) -> Option<&Notification> {
        self.notifications.iter().find(|n| n.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.notifications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Unread count as last reported by the server, adjusted by local
    /// optimistic reads.
    pub fn unread_count(&self) -> u64 {
        self.unread_count
    }

    /// Unread entries among the notifications held locally.
    pub fn local_unread_count(&self) -> u64 {
        self.notifications.iter().filter(|n| !n.is_read).count() as u64
    }

    /// Whether a fetch has been issued and not yet applied.
    pub fn is_loading(&self) -> bool {
        self.issued > self.applied
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Start a fetch. The ticket must be handed back to [`apply_fetch`] or
    /// [`fail_fetch`].
    ///
    /// [`apply_fetch`]: Self::apply_fetch
    /// [`fail_fetch`]: Self::fail_fetch
    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.issued += 1;
        FetchTicket(self.issued)
    }

    /// Replace the list with a fetched page.
    ///
    /// Returns false (and changes nothing) if a newer fetch was already
    /// applied.
    pub fn apply_fetch(&mut self, ticket: FetchTicket, page: NotificationPage) -> bool {
        if ticket.0 <= self.applied {
            debug!(ticket = ticket.0, applied = self.applied, "discarding stale fetch");
            return false;
        }
        self.applied = ticket.0;

        let mut notifications = page.notifications;
        // Stable sort keeps the server's order for equal timestamps.
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        notifications.truncate(self.limit);

        self.notifications = notifications;
        self.unread_count = page.unread_count;
        self.last_error = None;
        debug!(
            count = self.notifications.len(),
            unread = self.unread_count,
            "notifications refreshed"
        );
        true
    }

    /// Record a failed fetch. The existing list stays as it was.
    pub fn fail_fetch(&mut self, ticket: FetchTicket, message: impl Into<String>) -> bool {
        if ticket.0 <= self.applied {
            return false;
        }
        self.applied = ticket.0;
        self.last_error = Some(message.into());
        true
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    /// Prepend a live notification.
    ///
    /// A notification whose id is already known is ignored so replays after a
    /// reconnect never double count. Returns whether it was inserted.
    pub fn push(&mut self, notification: Notification) -> bool {
        if self.contains(&notification.id) {
            debug!(id = %notification.id, "duplicate notification ignored");
            return false;
        }
        if !notification.is_read {
            self.unread_count += 1;
        }
        self.notifications.insert(0, notification);
        self.notifications.truncate(self.limit);
        true
    }

    /// Optimistically flip read flags.
    ///
    /// Returns the ids that were unread before the call; the counter drops by
    /// exactly that many, so repeating the call is a no-op.
    pub fn mark_read_local(&mut self, ids: &[String]) -> Vec<String> {
        let flipped = self.flip_read(ids);
        self.unread_count = self.unread_count.saturating_sub(flipped.len() as u64);
        flipped
    }

    /// Apply a server echo for read notifications.
    ///
    /// When the echo carries the authoritative unread count it replaces the
    /// local one; otherwise only entries still unread locally adjust it.
    pub fn reconcile_marked_read(&mut self, ids: &[String], unread_count: Option<u64>) -> Vec<String> {
        let flipped = self.flip_read(ids);
        match unread_count {
            Some(count) => self.unread_count = count,
            None => {
                self.unread_count = self.unread_count.saturating_sub(flipped.len() as u64);
            }
        }
        flipped
    }

    /// Mark every entry read and zero the counter.
    pub fn mark_all_read_local(&mut self) -> Vec<String> {
        let ids: Vec<String> = self.notifications.iter().map(|n| n.id.clone()).collect();
        let flipped = self.flip_read(&ids);
        self.unread_count = 0;
        flipped
    }

    pub fn set_unread_count(&mut self, count: u64) {
        self.unread_count = count;
    }

    fn flip_read(&mut self, ids: &[String]) -> Vec<String> {
        let mut flipped = Vec::new();
        for notification in self.notifications.iter_mut() {
            if !notification.is_read && ids.contains(&notification.id) {
                notification.is_read = true;
                flipped.push(notification.id.clone());
            }
        }
        flipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn at(id: &str, minute: i64) -> Notification {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        Notification::new(id, format!("title {id}")).with_created_at(base + Duration::minutes(minute))
    }

    fn page(notifications: Vec<Notification>, unread: u64) -> NotificationPage {
        NotificationPage {
            notifications,
            unread_count: unread,
            total: None,
        }
    }

    fn ids(store: &NotificationStore) -> Vec<&str> {
        store.notifications().iter().map(|n| n.id.as_str()).collect()
    }

    #[test]
    fn test_fetch_orders_newest_first() {
        let mut store = NotificationStore::new(10);
        let ticket = store.begin_fetch();
        assert!(store.is_loading());
        assert!(store.apply_fetch(ticket, page(vec![at("a", 1), at("c", 3), at("b", 2)], 3)));
        assert!(!store.is_loading());
        assert_eq!(ids(&store), vec!["c", "b", "a"]);
        assert_eq!(store.unread_count(), 3);
        assert_eq!(store.local_unread_count(), 3);
    }

    #[test]
    fn test_stale_fetch_is_discarded() {
        let mut store = NotificationStore::new(10);
        let old = store.begin_fetch();
        let new = store.begin_fetch();

        assert!(store.apply_fetch(new, page(vec![at("fresh", 5)], 1)));
        assert!(!store.apply_fetch(old, page(vec![at("stale", 1)], 9)));
        assert_eq!(ids(&store), vec!["fresh"]);
        assert_eq!(store.unread_count(), 1);
    }

    #[test]
    fn test_failed_fetch_keeps_list() {
        let mut store = NotificationStore::new(10);
        let t = store.begin_fetch();
        store.apply_fetch(t, page(vec![at("a", 1)], 1));

        let t = store.begin_fetch();
        assert!(store.fail_fetch(t, "Connection failed"));
        assert_eq!(ids(&store), vec!["a"]);
        assert_eq!(store.last_error(), Some("Connection failed"));
        assert!(!store.is_loading());
    }

    #[test]
    fn test_fetch_respects_limit() {
        let mut store = NotificationStore::new(2);
        let t = store.begin_fetch();
        store.apply_fetch(t, page(vec![at("a", 1), at("b", 2), at("c", 3)], 3));
        assert_eq!(ids(&store), vec!["c", "b"]);
    }

    #[test]
    fn test_push_prepends_and_counts() {
        let mut store = NotificationStore::new(10);
        assert!(store.push(at("a", 1)));
        assert!(store.push(at("b", 2).read()));
        assert_eq!(ids(&store), vec!["b", "a"]);
        assert_eq!(store.unread_count(), 1);
    }

    #[test]
    fn test_push_duplicate_ignored() {
        let mut store = NotificationStore::new(10);
        assert!(store.push(at("a", 1)));
        assert!(!store.push(at("a", 1)));
        assert_eq!(store.len(), 1);
        assert_eq!(store.unread_count(), 1);
    }

    #[test]
    fn test_push_evicts_beyond_limit() {
        let mut store = NotificationStore::new(2);
        store.push(at("a", 1));
        store.push(at("b", 2));
        store.push(at("c", 3));
        assert_eq!(ids(&store), vec!["c", "b"]);
    }

    #[test]
    fn test_mark_read_is_idempotent() {
        let mut store = NotificationStore::new(10);
        store.push(at("a", 1));
        store.push(at("b", 2));

        let ids = vec!["a".to_string()];
        assert_eq!(store.mark_read_local(&ids), vec!["a".to_string()]);
        assert_eq!(store.unread_count(), 1);
        assert!(store.mark_read_local(&ids).is_empty());
        assert_eq!(store.unread_count(), 1);
        assert_eq!(store.local_unread_count(), 1);
    }

    #[test]
    fn test_mark_read_never_underflows() {
        let mut store = NotificationStore::new(10);
        store.push(at("a", 1));
        store.set_unread_count(0);
        store.mark_read_local(&["a".to_string()]);
        assert_eq!(store.unread_count(), 0);
    }

    #[test]
    fn test_reconcile_uses_server_count() {
        let mut store = NotificationStore::new(10);
        store.push(at("a", 1));
        store.push(at("b", 2));
        store.mark_read_local(&["a".to_string()]);

        // Echo of our own mark plus the server's view of the total.
        let flipped = store.reconcile_marked_read(&["a".to_string()], Some(7));
        assert!(flipped.is_empty());
        assert_eq!(store.unread_count(), 7);
    }

    #[test]
    fn test_reconcile_without_count_adjusts_locally() {
        let mut store = NotificationStore::new(10);
        store.push(at("a", 1));
        store.push(at("b", 2));

        // Read from another session: nothing was decremented yet.
        let flipped = store.reconcile_marked_read(&["b".to_string(), "zzz".to_string()], None);
        assert_eq!(flipped, vec!["b".to_string()]);
        assert_eq!(store.unread_count(), 1);

        // Replayed echo changes nothing.
        store.reconcile_marked_read(&["b".to_string()], None);
        assert_eq!(store.unread_count(), 1);
    }

    #[test]
    fn test_mark_all_read() {
        let mut store = NotificationStore::new(10);
        store.push(at("a", 1));
        store.push(at("b", 2));
        store.set_unread_count(12);

        let flipped = store.mark_all_read_local();
        assert_eq!(flipped.len(), 2);
        assert_eq!(store.unread_count(), 0);
        assert_eq!(store.local_unread_count(), 0);
    }
}
