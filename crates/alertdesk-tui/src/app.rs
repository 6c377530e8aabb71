//! Main application state and logic for the alertdesk dashboard.
//!
//! The `App` owns the notification center and the socket connection, feeds
//! socket events and finished REST calls into the center, and renders the
//! list, toasts and the critical-alert modal.

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use alertdesk_center::{
    CenterEvent, FetchOutcome, NotificationCenter, SoundManager, TerminalPlatform, Toast,
    ToastKind, ToastPhase,
};
use alertdesk_client::{ClientError, ConnectionManager, NotificationApi, SocketConfig, SocketEvent};
use alertdesk_config::AlertdeskConfig;
use alertdesk_core::{AlertdeskError, Notification};
use crossterm::event::{self, Event, KeyEvent};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
};
use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::event::{AppEvent, InputHandler};
use crate::theme::Theme;

/// Result type for app operations.
pub type AppResult<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Target frame rate (30 FPS is plenty for toast animation).
const TARGET_FPS: u64 = 30;
const FRAME_DURATION: Duration = Duration::from_millis(1000 / TARGET_FPS);

const TOAST_WIDTH: u16 = 46;
const TOAST_HEIGHT: u16 = 5;

/// Finished background REST call.
#[derive(Debug)]
enum TaskResult {
    Fetch(FetchOutcome),
    MarkAll(Result<(), ClientError>),
}

/// Main application state.
pub struct App {
    center: NotificationCenter,
    socket: ConnectionManager,
    socket_events: mpsc::UnboundedReceiver<SocketEvent>,
    center_events: broadcast::Receiver<CenterEvent>,
    input_handler: InputHandler,
    theme: Theme,
    should_quit: bool,
    show_help: bool,
    /// Selected row in the notification list
    selected: usize,
    status_message: Option<String>,
    task_tx: mpsc::UnboundedSender<TaskResult>,
    task_rx: mpsc::UnboundedReceiver<TaskResult>,
    /// Dirty flag - whether UI needs redraw
    dirty: bool,
}

impl App {
    pub fn new(
        center: NotificationCenter,
        socket: ConnectionManager,
        socket_events: mpsc::UnboundedReceiver<SocketEvent>,
    ) -> Self {
        let center_events = center.subscribe();
        let (task_tx, task_rx) = mpsc::unbounded_channel();
        Self {
            center,
            socket,
            socket_events,
            center_events,
            input_handler: InputHandler::new(),
            theme: Theme::default(),
            should_quit: false,
            show_help: false,
            selected: 0,
            status_message: None,
            task_tx,
            task_rx,
            dirty: true,
        }
    }

    /// Wire the socket, REST client, sound and platform hooks from configuration.
    ///
    /// Without a token the socket never connects and REST calls fail with an
    /// authentication error, which the dashboard shows in its footer.
    pub fn from_config(config: &AlertdeskConfig, token: Option<String>) -> AppResult<Self> {
        let mut socket_config = SocketConfig::new(config.socket_endpoint()?, token.clone());
        socket_config.policy = config.reconnect.to_policy();
        socket_config.rooms = config.rooms.clone();
        socket_config.probe_interval = Duration::from_millis(config.network_probe_interval_ms);
        let (socket, socket_events) = ConnectionManager::new(socket_config);

        let api = NotificationApi::new(
            config.api_base_url.as_str(),
            token.unwrap_or_default(),
            config.store.request_timeout_secs,
        )?;

        let mut sound = SoundManager::with_default_backend(config.sound.clone());
        sound.preload();

        let center = NotificationCenter::new(
            config,
            Arc::new(api),
            Arc::new(socket.clone()),
            sound,
            Box::new(TerminalPlatform::new(true)),
        );
        Ok(Self::new(center, socket, socket_events))
    }

    pub fn center(&self) -> &NotificationCenter {
        &self.center
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn show_help(&self) -> bool {
        self.show_help
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
        self.mark_dirty();
    }

    // ========== Input ==========

    pub fn handle_key_event(&mut self, key: KeyEvent) {
        // Any key closes help
        if self.show_help {
            self.show_help = false;
            self.mark_dirty();
            return;
        }
        let event = self.input_handler.handle_key(key);
        self.handle_app_event(event);
    }

    pub fn handle_app_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Quit | AppEvent::ForceQuit => {
                self.should_quit = true;
            }
            AppEvent::ShowHelp => {
                self.show_help = true;
            }
            AppEvent::NavigateUp => {
                self.selected = self.selected.saturating_sub(1);
            }
            AppEvent::NavigateDown => {
                let len = self.center.store().len();
                if self.selected + 1 < len {
                    self.selected += 1;
                }
            }
            AppEvent::Open => self.open_selected(),
            AppEvent::Acknowledge => self.acknowledge(),
            AppEvent::Dismiss => self.dismiss(),
            AppEvent::CloseToast => {
                if let Some(id) = self.center.toasts().top().map(|t| t.id().to_string()) {
                    self.center.close_toast(&id);
                }
            }
            AppEvent::OpenToast => self.open_toast(),
            AppEvent::MarkAllRead => {
                self.spawn_mark_all();
                self.set_status("Marking all as read...");
            }
            AppEvent::Refresh => {
                self.spawn_fetch();
                self.set_status("Refreshing...");
            }
            AppEvent::ToggleSound => {
                let enabled = !self.center.sound_enabled();
                self.center.set_sound_enabled(enabled);
                self.set_status(if enabled { "Sound on" } else { "Sound off" });
            }
            AppEvent::None => return,
        }
        self.after_change();
    }

    fn selected_notification(&self) -> Option<&Notification> {
        self.center.store().notifications().get(self.selected)
    }

    fn open_selected(&mut self) {
        let Some(notification) = self.selected_notification() else {
            return;
        };
        let id = notification.id.clone();
        let link = notification.link().map(str::to_string);
        if !notification.is_read {
            self.center.mark_as_read(&[id]);
        }
        if let Some(link) = link {
            self.set_status(format!("Open: {link}"));
        }
    }

    /// Toast body click on the newest toast.
    fn open_toast(&mut self) {
        let Some(id) = self.center.toasts().top().map(|t| t.id().to_string()) else {
            return;
        };
        if let Some(notification) = self.center.click_toast(&id) {
            let target = notification.link().unwrap_or(notification.title.as_str());
            self.set_status(format!("Open: {target}"));
        }
    }

    /// Modal first, then the newest alert toast, then the selected row.
    fn acknowledge(&mut self) {
        if let Some(id) = self.center.active_modal().map(|m| m.id.clone()) {
            self.center.acknowledge(&id);
            return;
        }
        let alert = self
            .center
            .toasts()
            .visible()
            .find(|t| t.kind == ToastKind::Alert && t.phase() != ToastPhase::Leaving)
            .map(|t| t.id().to_string());
        if let Some(id) = alert {
            self.center.acknowledge(&id);
            return;
        }
        if let Some(notification) = self.selected_notification()
            && !notification.is_read
        {
            let id = notification.id.clone();
            if !self.center.acknowledge(&id) {
                self.center.mark_as_read(&[id]);
            }
        }
    }

    fn dismiss(&mut self) {
        if let Some(id) = self.center.active_modal().map(|m| m.id.clone()) {
            self.center.dismiss(&id);
            return;
        }
        if let Some(id) = self.center.toasts().top().map(|t| t.id().to_string()) {
            self.center.dismiss(&id);
        }
    }

    fn after_change(&mut self) {
        let len = self.center.store().len();
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
        self.input_handler
            .set_modal_open(self.center.active_modal().is_some());
        self.mark_dirty();
    }

    // ========== Background work ==========

    fn spawn_fetch(&mut self) {
        let pending = self.center.start_fetch();
        let tx = self.task_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(TaskResult::Fetch(pending.run().await));
        });
    }

    fn spawn_mark_all(&mut self) {
        let pending = self.center.start_mark_all();
        let tx = self.task_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(TaskResult::MarkAll(pending.run().await));
        });
    }

    fn handle_task_result(&mut self, result: TaskResult) {
        match result {
            TaskResult::Fetch(outcome) => {
                if self.center.complete_fetch(outcome) {
                    debug!(count = self.center.store().len(), "notifications refreshed");
                    self.status_message = None;
                }
            }
            TaskResult::MarkAll(result) => {
                if self.center.complete_mark_all(result) {
                    self.status_message = Some("All notifications marked read".to_string());
                }
            }
        }
        self.drain_center_events();
        self.after_change();
    }

    /// Feed a socket event into the center. A fresh connection refetches the
    /// list so anything missed while offline shows up.
    pub fn handle_socket_event(&mut self, event: SocketEvent) {
        let reconnected = matches!(event, SocketEvent::Connected);
        self.center.handle_socket_event(event);
        if reconnected {
            self.spawn_fetch();
        }
        self.drain_center_events();
        self.after_change();
    }

    fn drain_center_events(&mut self) {
        loop {
            match self.center_events.try_recv() {
                Ok(event) => self.on_center_event(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "dashboard fell behind center events");
                }
                Err(_) => break,
            }
        }
    }

    fn on_center_event(&mut self, event: CenterEvent) {
        match event {
            CenterEvent::ModalOpened(notification) => {
                info!(id = %notification.id, "showing critical alert");
            }
            CenterEvent::ConnectionChanged { connected } => {
                self.set_status(if connected { "Connected" } else { "Disconnected" });
            }
            CenterEvent::PermissionsChanged { message, .. } => {
                self.set_status(message.unwrap_or_else(|| "Permissions updated".to_string()));
            }
            CenterEvent::Error(message) => self.set_status(message),
            CenterEvent::ModalClosed { .. } | CenterEvent::ToastShown { .. } => {}
        }
    }

    // ========== Main loop ==========

    /// Run the dashboard until the user quits.
    pub async fn run(&mut self) -> AppResult<()> {
        // Setup terminal
        crossterm::terminal::enable_raw_mode().map_err(AlertdeskError::terminal_init)?;
        let mut stdout = io::stdout();
        crossterm::execute!(stdout, crossterm::terminal::EnterAlternateScreen)
            .map_err(AlertdeskError::terminal_init)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).map_err(AlertdeskError::terminal_init)?;

        self.socket.connect();
        self.spawn_fetch();

        let result = self.run_loop(&mut terminal).await;

        self.socket.disconnect().await;

        // Restore terminal
        crossterm::terminal::disable_raw_mode()?;
        crossterm::execute!(
            terminal.backend_mut(),
            crossterm::terminal::LeaveAlternateScreen
        )?;
        terminal.show_cursor()?;

        result
    }

    async fn run_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> AppResult<()> {
        let mut ticker = tokio::time::interval(FRAME_DURATION);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while !self.should_quit {
            if self.take_dirty() {
                terminal.draw(|frame| self.draw(frame))?;
            }

            tokio::select! {
                Some(event) = self.socket_events.recv() => self.handle_socket_event(event),
                Some(result) = self.task_rx.recv() => self.handle_task_result(result),
                _ = ticker.tick() => {
                    self.center.tick(Instant::now());
                    if !self.center.toasts().is_empty() {
                        self.mark_dirty();
                    }
                    while event::poll(Duration::ZERO)? {
                        match event::read()? {
                            Event::Key(key) => self.handle_key_event(key),
                            Event::Resize(_, _) => self.mark_dirty(),
                            _ => {}
                        }
                    }
                }
            }
        }
        Ok(())
    }

    // ========== Drawing ==========

    /// Draw the UI.
    pub fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();

        // Main layout: header, content, footer
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(5),    // Content
                Constraint::Length(2), // Footer
            ])
            .split(area);

        self.draw_header(frame, chunks[0]);
        self.draw_list(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);
        self.draw_toasts(frame, chunks[1]);

        if let Some(modal) = self.center.active_modal() {
            self.draw_modal(frame, area, modal);
        }

        if self.show_help {
            self.draw_help_overlay(frame, area);
        }
    }

    fn draw_header(&self, frame: &mut Frame, area: Rect) {
        let colors = &self.theme.colors;
        let title = " Alertdesk ";

        let state = self.socket.state();
        let status_color = if state.connected {
            colors.status_live
        } else if state.reconnecting {
            colors.status_reconnecting
        } else {
            colors.status_offline
        };
        let status = format!("● {}", state.label());
        let unread = format!("{} unread", self.center.unread_count());
        let sound = if self.center.sound_enabled() {
            "♪ on"
        } else {
            "♪ off"
        };

        let right_len = status.chars().count() + 2 + unread.chars().count() + 2 + sound.chars().count();
        let spacing = (area.width as usize).saturating_sub(title.len() + right_len + 2);

        let unread_style = if self.center.unread_count() > 0 {
            Style::default().fg(colors.hotkey).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(colors.text_dim)
        };

        let header = Paragraph::new(Line::from(vec![
            Span::styled(title, Style::default().fg(colors.header).add_modifier(Modifier::BOLD)),
            Span::raw(" ".repeat(spacing)),
            Span::styled(status, Style::default().fg(status_color)),
            Span::raw("  "),
            Span::styled(unread, unread_style),
            Span::raw("  "),
            Span::styled(sound, Style::default().fg(colors.text_dim)),
        ]))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(colors.border_dim)),
        );

        frame.render_widget(header, area);
    }

    fn draw_list(&self, frame: &mut Frame, area: Rect) {
        let colors = &self.theme.colors;
        let store = self.center.store();
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(colors.border_dim))
            .title(Span::styled(
                format!(" Notifications ({}) ", store.len()),
                Style::default().fg(colors.header),
            ));

        if store.is_empty() {
            let text = if store.is_loading() {
                "Loading..."
            } else {
                "No notifications"
            };
            let placeholder = Paragraph::new(text)
                .style(Style::default().fg(colors.text_dim))
                .alignment(Alignment::Center)
                .block(block);
            frame.render_widget(placeholder, area);
            return;
        }

        let items: Vec<ListItem> = store
            .notifications()
            .iter()
            .map(|n| self.list_item(n))
            .collect();

        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().bg(colors.selection).add_modifier(Modifier::BOLD));
        let mut state = ListState::default().with_selected(Some(self.selected));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn list_item(&self, n: &Notification) -> ListItem<'static> {
        let colors = &self.theme.colors;
        let marker = if n.is_read { "  " } else { "● " };
        let priority = n.priority.map(|p| p.label()).unwrap_or("--");
        let text_style = if n.is_read {
            Style::default().fg(colors.text_dim)
        } else {
            Style::default().fg(colors.text).add_modifier(Modifier::BOLD)
        };
        let when = n
            .created_at
            .with_timezone(&chrono::Local)
            .format("%b %d %H:%M")
            .to_string();

        let mut spans = vec![
            Span::styled(marker, Style::default().fg(colors.hotkey)),
            Span::styled(
                format!("{priority:<3}"),
                Style::default().fg(self.theme.priority(n.priority)),
            ),
            Span::styled(
                format!("{} ", n.severity.icon()),
                Style::default().fg(self.theme.severity(n.severity)),
            ),
            Span::styled(n.title.clone(), text_style),
        ];
        if !n.message.is_empty() {
            spans.push(Span::styled(
                format!("  {}", n.message),
                Style::default().fg(colors.text_dim),
            ));
        }
        spans.push(Span::styled(format!("  {when}"), Style::default().fg(colors.border_dim)));
        ListItem::new(Line::from(spans))
    }

    /// Draw the footer with hotkey hints and the latest status.
    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let colors = &self.theme.colors;
        let hotkey_style = Style::default().fg(colors.hotkey);
        let hints = vec![
            Span::styled("[↵]", hotkey_style),
            Span::raw("Open "),
            Span::styled("[a]", hotkey_style),
            Span::raw("Ack "),
            Span::styled("[d]", hotkey_style),
            Span::raw("Dismiss "),
            Span::styled("[o]", hotkey_style),
            Span::raw("Toast "),
            Span::styled("[A]", hotkey_style),
            Span::raw("Read all "),
            Span::styled("[r]", hotkey_style),
            Span::raw("Refresh "),
            Span::styled("[s]", hotkey_style),
            Span::raw("Sound "),
            Span::styled("[?]", hotkey_style),
            Span::raw("Help "),
            Span::styled("[q]", hotkey_style),
            Span::raw("Quit"),
        ];

        let status = self
            .status_message
            .as_deref()
            .or_else(|| self.center.store().last_error())
            .unwrap_or("");

        let footer = Paragraph::new(Line::from(hints))
            .style(Style::default().fg(colors.text_dim))
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .title(Span::styled(
                        format!(" {status} "),
                        Style::default().fg(colors.border_dim),
                    ))
                    .title_alignment(Alignment::Right),
            );

        frame.render_widget(footer, area);
    }

    /// Toasts stack down from the top-right corner of the content area.
    fn draw_toasts(&self, frame: &mut Frame, area: Rect) {
        let width = TOAST_WIDTH.min(area.width.saturating_sub(2));
        if width < 12 {
            return;
        }
        let x = area.x + area.width - width - 1;
        let mut y = area.y + 1;

        for toast in self.center.toasts().visible() {
            if y + TOAST_HEIGHT > area.y + area.height {
                break;
            }
            let rect = Rect::new(x, y, width, TOAST_HEIGHT);
            self.draw_toast(frame, rect, toast);
            y += TOAST_HEIGHT;
        }
    }

    fn draw_toast(&self, frame: &mut Frame, area: Rect, toast: &Toast) {
        let colors = &self.theme.colors;
        let n = &toast.notification;
        let accent = match toast.kind {
            ToastKind::Alert => self.theme.priority(n.priority),
            ToastKind::Slide => self.theme.severity(n.severity),
        };
        let mut border = Style::default().fg(accent);
        let mut body = Style::default().fg(colors.text);
        if toast.phase() != ToastPhase::Visible {
            border = border.add_modifier(Modifier::DIM);
            body = body.add_modifier(Modifier::DIM);
        }

        let actions = match toast.kind {
            ToastKind::Alert => "[a]ck [d]ismiss [x]close",
            ToastKind::Slide => "[x]close",
        };
        let lines = vec![
            Line::from(Span::styled(n.title.clone(), body.add_modifier(Modifier::BOLD))),
            Line::from(Span::styled(n.message.clone(), body)),
            Line::from(Span::styled(actions, Style::default().fg(colors.hotkey))),
        ];

        let title = match n.priority {
            Some(p) => format!(" {} {} ", n.severity.icon(), p.label()),
            None => format!(" {} ", n.severity.icon()),
        };

        frame.render_widget(Clear, area);
        let widget = Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(border)
                    .title(Span::styled(title, border))
                    .style(Style::default().bg(Color::Black)),
            )
            .wrap(Wrap { trim: true });
        frame.render_widget(widget, area);
    }

    /// Blocking critical alert.
    fn draw_modal(&self, frame: &mut Frame, area: Rect, modal: &Notification) {
        let colors = &self.theme.colors;
        let overlay_area = centered_rect(64, 12, area);
        frame.render_widget(Clear, overlay_area);

        let mut lines = vec![
            Line::from(Span::styled(
                modal.title.clone(),
                Style::default().fg(colors.text).add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(Span::styled(modal.message.clone(), Style::default().fg(colors.text))),
        ];
        if let Some(link) = modal.link() {
            lines.push(Line::from(Span::styled(
                format!("→ {link}"),
                Style::default().fg(colors.info),
            )));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled("[a]", Style::default().fg(colors.hotkey)),
            Span::raw(" Acknowledge   "),
            Span::styled("[d]", Style::default().fg(colors.hotkey)),
            Span::raw(" Dismiss"),
        ]));

        let widget = Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(colors.critical).add_modifier(Modifier::BOLD))
                    .title(Span::styled(
                        " CRITICAL ALERT ",
                        Style::default().fg(colors.critical).add_modifier(Modifier::BOLD),
                    ))
                    .title_alignment(Alignment::Center)
                    .style(Style::default().bg(Color::Black)),
            )
            .wrap(Wrap { trim: false });
        frame.render_widget(widget, overlay_area);
    }

    /// Draw the help overlay.
    fn draw_help_overlay(&self, frame: &mut Frame, area: Rect) {
        let colors = &self.theme.colors;
        let overlay_area = centered_rect(52, 22, area);
        frame.render_widget(Clear, overlay_area);

        let help_text = "\
Alertdesk Hotkey Reference

Notifications:
  ↑ k      Move up
  ↓ j      Move down
  Enter    Open (marks read)
  a        Acknowledge alert / mark read
  d  Esc   Dismiss alert
  o        Open newest toast (marks read)
  x        Close newest toast
  A        Mark all as read

General:
  r        Refresh
  s        Toggle sound
  ?        Show this help
  q        Quit
  Ctrl+C   Force quit

Press any key to close this help.";

        let help = Paragraph::new(help_text)
            .style(Style::default().fg(colors.text))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(colors.header))
                    .title(Span::styled(
                        " Help ",
                        Style::default().fg(colors.header).add_modifier(Modifier::BOLD),
                    ))
                    .style(Style::default().bg(Color::Black)),
            )
            .wrap(Wrap { trim: false });

        frame.render_widget(help, overlay_area);
    }
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(2));
    let x = area.x + (area.width - width) / 2;
    let y = area.y + (area.height - height) / 2;
    Rect::new(x, y, width, height)
}
