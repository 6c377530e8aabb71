//! Notification center.
//!
//! Bridges socket events and REST results into the store, routes new
//! notifications through the priority handler, drives toasts and sound, and
//! pushes read receipts back over the socket. The host owns the center and
//! feeds it socket events; everything else is pulled through accessors or
//! the [`CenterEvent`] broadcast.
//!
//! Long-running REST calls are split in two halves ([`NotificationCenter::start_fetch`]
//! and [`NotificationCenter::complete_fetch`]) so the host can run them off its
//! event loop. The `async` conveniences do both in one go.

use std::sync::Arc;
use std::time::Instant;

use alertdesk_client::{
    ClientError, NotificationPage, NotificationSource, ReadSync, ServerEvent, SocketEvent,
};
use alertdesk_config::{AlertdeskConfig, ToastConfig};
use alertdesk_core::{Notification, PriorityClass, log_notification_event};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::platform::PlatformHooks;
use crate::priority::PriorityHandler;
use crate::sound::SoundManager;
use crate::store::{FetchTicket, NotificationStore};
use crate::toast::{ToastKind, ToastQueue};

const EVENT_CAPACITY: usize = 64;

/// Changes the host may want to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum CenterEvent {
    ModalOpened(Notification),
    ModalClosed { id: String },
    ToastShown { id: String },
    /// The server changed the user's permissions; hosts refresh what they show.
    PermissionsChanged {
        message: Option<String>,
        permissions: Value,
    },
    ConnectionChanged { connected: bool },
    Error(String),
}

/// A fetch that has been issued but not run yet.
pub struct PendingFetch {
    ticket: FetchTicket,
    limit: usize,
    source: Arc<dyn NotificationSource>,
}

/// Result of a [`PendingFetch`].
#[derive(Debug)]
pub struct FetchOutcome {
    pub ticket: FetchTicket,
    pub result: Result<NotificationPage, ClientError>,
}

impl PendingFetch {
    pub fn ticket(&self) -> FetchTicket {
        self.ticket
    }

    pub async fn run(self) -> FetchOutcome {
        FetchOutcome {
            ticket: self.ticket,
            result: self.source.fetch(self.limit).await,
        }
    }
}

/// A mark-all-read request that has not run yet.
pub struct PendingMarkAll {
    source: Arc<dyn NotificationSource>,
}

impl PendingMarkAll {
    pub async fn run(self) -> Result<(), ClientError> {
        self.source.mark_all_read().await
    }
}

pub struct NotificationCenter {
    store: NotificationStore,
    priority: PriorityHandler,
    toasts: ToastQueue,
    sound: SoundManager,
    platform: Box<dyn PlatformHooks>,
    source: Arc<dyn NotificationSource>,
    socket: Arc<dyn ReadSync>,
    toast_config: ToastConfig,
    events: broadcast::Sender<CenterEvent>,
    connected: bool,
}

impl NotificationCenter {
    pub fn new(
        config: &AlertdeskConfig,
        source: Arc<dyn NotificationSource>,
        socket: Arc<dyn ReadSync>,
        sound: SoundManager,
        platform: Box<dyn PlatformHooks>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store: NotificationStore::new(config.store.fetch_limit),
            priority: PriorityHandler::new(),
            toasts: ToastQueue::new(config.toast.max_visible),
            sound,
            platform,
            source,
            socket,
            toast_config: config.toast.clone(),
            events,
            connected: false,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CenterEvent> {
        self.events.subscribe()
    }

    pub fn store(&self) -> &NotificationStore {
        &self.store
    }

    pub fn toasts(&self) -> &ToastQueue {
        &self.toasts
    }

    pub fn priority(&self) -> &PriorityHandler {
        &self.priority
    }

    pub fn active_modal(&self) -> Option<&Notification> {
        self.priority.active_modal()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn unread_count(&self) -> u64 {
        self.store.unread_count()
    }

    // ========== REST ==========

    /// Issue a fetch. Run it with [`PendingFetch::run`] and hand the outcome
    /// to [`complete_fetch`](Self::complete_fetch).
    pub fn start_fetch(&mut self) -> PendingFetch {
        PendingFetch {
            ticket: self.store.begin_fetch(),
            limit: self.store.limit(),
            source: Arc::clone(&self.source),
        }
    }

    /// Apply a fetch result. Stale results are dropped; failures keep the
    /// current list and are recorded as the store error.
    pub fn complete_fetch(&mut self, outcome: FetchOutcome) -> bool {
        let modal_before = self.modal_id();
        match outcome.result {
            Ok(page) => {
                if !self.store.apply_fetch(outcome.ticket, page) {
                    return false;
                }
                // The server may report alerts read that we are still showing.
                let read: Vec<String> = self
                    .store
                    .notifications()
                    .iter()
                    .filter(|n| n.is_read)
                    .map(|n| n.id.clone())
                    .collect();
                let now = Instant::now();
                self.retire_read(&read, now);
                self.settle(modal_before, now);
                true
            }
            Err(e) => {
                warn!(error = %e, "failed to fetch notifications");
                let message = e.friendly_message();
                if self.store.fail_fetch(outcome.ticket, message.clone()) {
                    self.emit(CenterEvent::Error(message));
                }
                false
            }
        }
    }

    /// Fetch and apply the latest notifications.
    pub async fn fetch_notifications(&mut self) -> bool {
        let outcome = self.start_fetch().run().await;
        self.complete_fetch(outcome)
    }

    pub fn start_mark_all(&self) -> PendingMarkAll {
        PendingMarkAll {
            source: Arc::clone(&self.source),
        }
    }

    /// Apply the result of a mark-all-read request. Local state only
    /// changes once the server accepted it.
    pub fn complete_mark_all(&mut self, result: Result<(), ClientError>) -> bool {
        match result {
            Ok(()) => {
                let modal_before = self.modal_id();
                let flipped = self.store.mark_all_read_local();
                let now = Instant::now();
                self.retire_read(&flipped, now);
                info!(count = flipped.len(), "all notifications marked read");
                self.settle(modal_before, now);
                true
            }
            Err(e) => {
                warn!(error = %e, "failed to mark all notifications read");
                let message = e.friendly_message();
                self.store.set_error(message.clone());
                self.emit(CenterEvent::Error(message));
                false
            }
        }
    }

    pub async fn mark_all_as_read(&mut self) -> bool {
        let result = self.start_mark_all().run().await;
        self.complete_mark_all(result)
    }

    // ========== Read receipts ==========

    /// Optimistically mark notifications read and tell the server.
    ///
    /// Ids already read locally are not sent again. Unknown ids are sent so
    /// the server stays authoritative.
    pub fn mark_as_read(&mut self, ids: &[String]) {
        let modal_before = self.modal_id();
        self.mark_read_and_sync(ids);
        self.settle(modal_before, Instant::now());
    }

    fn mark_read_and_sync(&mut self, ids: &[String]) {
        let to_send: Vec<String> = ids
            .iter()
            .filter(|id| self.store.get(id).is_none_or(|n| !n.is_read))
            .cloned()
            .collect();

        let flipped = self.store.mark_read_local(ids);
        self.retire_read(ids, Instant::now());
        debug!(requested = ids.len(), flipped = flipped.len(), "marked read locally");

        match to_send.as_slice() {
            [] => {}
            [id] => self.socket.mark_as_read(id),
            many => self.socket.mark_multiple_as_read(many),
        }
    }

    // ========== Socket ==========

    pub fn handle_socket_event(&mut self, event: SocketEvent) {
        match event {
            SocketEvent::Connected => self.set_connected(true),
            SocketEvent::Disconnected { reason } => {
                debug!(?reason, "socket disconnected");
                self.set_connected(false);
            }
            SocketEvent::Server(event) => self.handle_server_event(event),
        }
    }

    fn handle_server_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Connected(info) => {
                debug!(user_id = ?info.user_id, "server greeting");
            }
            ServerEvent::Notification(notification) => self.on_notification(*notification),
            ServerEvent::UnreadCount { count } => self.store.set_unread_count(count),
            ServerEvent::NotificationMarkedRead {
                notification_id,
                unread_count,
            } => self.on_marked_read_echo(vec![notification_id], unread_count),
            ServerEvent::NotificationsMarkedRead {
                notification_ids,
                unread_count,
            } => self.on_marked_read_echo(notification_ids, unread_count),
            ServerEvent::PermissionsUpdated {
                message,
                permissions,
            } => {
                info!("permissions updated by server");
                let text = message
                    .clone()
                    .unwrap_or_else(|| "Your permissions have been updated.".to_string());
                self.on_notification(Notification::permission_update(text));
                self.emit(CenterEvent::PermissionsChanged {
                    message,
                    permissions,
                });
            }
            ServerEvent::Error { message } => {
                self.store.set_error(message.clone());
                self.emit(CenterEvent::Error(message));
            }
            ServerEvent::Unknown { .. } => {}
        }
    }

    fn on_notification(&mut self, notification: Notification) {
        let modal_before = self.modal_id();
        log_notification_event!(
            notification.id.as_str(),
            "received",
            priority = notification.priority.map(|p| p.label()).unwrap_or("none")
        );
        if !self.store.push(notification.clone()) {
            return;
        }

        self.sound.play_notification_sound(notification.priority);
        if self.platform.notifications_permitted() {
            self.platform.show_system_notification(&notification);
        }
        self.platform.vibrate(&notification);

        let now = Instant::now();
        if self.toast_config.show_normal
            && !notification.is_read
            && notification.priority_class() == PriorityClass::Normal
        {
            let id = notification.id.clone();
            if self
                .toasts
                .push(notification, ToastKind::Slide, self.toast_config.duration(), now)
            {
                self.emit(CenterEvent::ToastShown { id });
            }
        }
        self.settle(modal_before, now);
    }

    fn on_marked_read_echo(&mut self, ids: Vec<String>, unread_count: Option<u64>) {
        let modal_before = self.modal_id();
        self.store.reconcile_marked_read(&ids, unread_count);
        let now = Instant::now();
        self.retire_read(&ids, now);
        self.settle(modal_before, now);
    }

    fn set_connected(&mut self, connected: bool) {
        if self.connected != connected {
            self.connected = connected;
            self.emit(CenterEvent::ConnectionChanged { connected });
        }
    }

    // ========== User actions ==========

    /// Acknowledge a modal or alert toast: marks it read on the server.
    pub fn acknowledge(&mut self, id: &str) -> bool {
        let modal_before = self.modal_id();
        if !self.priority.acknowledge(id) {
            return false;
        }
        let now = Instant::now();
        self.toasts.dismiss(id, now);
        self.mark_read_and_sync(&[id.to_string()]);
        self.settle(modal_before, now);
        true
    }

    /// Close a modal or alert toast without marking it read.
    pub fn dismiss(&mut self, id: &str) -> bool {
        let modal_before = self.modal_id();
        let now = Instant::now();
        let changed = self.priority.dismiss(id);
        let closed = self.toasts.dismiss(id, now);
        if changed {
            self.settle(modal_before, now);
        }
        changed || closed
    }

    /// Toast body click: marks the notification read and returns it so the
    /// host can follow its link.
    pub fn click_toast(&mut self, id: &str) -> Option<Notification> {
        let modal_before = self.modal_id();
        let now = Instant::now();
        let notification = self.toasts.click(id, now)?;
        self.priority.acknowledge(id);
        self.mark_read_and_sync(&[id.to_string()]);
        self.settle(modal_before, now);
        Some(notification)
    }

    /// Toast close control: visual only.
    pub fn close_toast(&mut self, id: &str) -> bool {
        self.toasts.dismiss(id, Instant::now())
    }

    /// Advance toast animations and expiry.
    pub fn tick(&mut self, now: Instant) {
        for id in self.toasts.tick(now) {
            debug!(%id, "toast removed");
        }
    }

    pub fn set_sound_enabled(&mut self, enabled: bool) {
        self.sound.set_enabled(enabled);
    }

    pub fn sound_enabled(&self) -> bool {
        self.sound.is_enabled()
    }

    // ========== Internals ==========

    fn modal_id(&self) -> Option<String> {
        self.priority.active_modal().map(|m| m.id.clone())
    }

    /// Close any modal or toast still presenting a notification that is now read.
    fn retire_read(&mut self, ids: &[String], now: Instant) {
        for id in ids {
            self.priority.on_marked_read(id);
            if self.toasts.dismiss(id, now) {
                debug!(%id, "toast closed, notification read elsewhere");
            }
        }
    }

    fn emit(&self, event: CenterEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Re-run priority routing after a change and publish modal/toast
    /// transitions.
    fn settle(&mut self, modal_before: Option<String>, now: Instant) {
        if let Some(previous) = modal_before
            && self.modal_id().as_deref() != Some(previous.as_str())
        {
            info!(id = %previous, "critical alert closed");
            self.emit(CenterEvent::ModalClosed { id: previous });
        }

        let evaluation = self.priority.evaluate(self.store.notifications());
        self.priority.forget_evicted(self.store.notifications());
        if let Some(modal) = evaluation.modal {
            info!(id = %modal.id, title = %modal.title, "critical alert opened");
            self.emit(CenterEvent::ModalOpened(modal));
        }

        // Oldest first so the most recent ends up at the head.
        for notification in evaluation.toasts.into_iter().rev() {
            let id = notification.id.clone();
            if self.toasts.push(
                notification,
                ToastKind::Alert,
                self.toast_config.high_priority_duration(),
                now,
            ) {
                self.emit(CenterEvent::ToastShown { id });
            }
        }
    }
}
