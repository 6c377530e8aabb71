//! Keyboard input mapping for the dashboard.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Application-level events that can trigger state changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    Quit,
    /// Force quit (Ctrl+C)
    ForceQuit,
    ShowHelp,
    NavigateUp,
    NavigateDown,
    /// Open the selected notification (marks it read)
    Open,
    /// Acknowledge the modal, or the newest alert toast
    Acknowledge,
    /// Dismiss the modal, or the newest toast, without marking read
    Dismiss,
    /// Close the newest toast (visual only)
    CloseToast,
    /// Follow the newest toast's link and mark it read
    OpenToast,
    MarkAllRead,
    Refresh,
    ToggleSound,
    None,
}

/// Input handler for converting key events to app events.
#[derive(Debug, Default)]
pub struct InputHandler {
    /// A blocking alert is on screen
    modal_open: bool,
}

impl InputHandler {
    pub fn new() -> Self {
        Self { modal_open: false }
    }

    /// While a modal is open only its own actions and quit are accepted.
    pub fn set_modal_open(&mut self, open: bool) {
        self.modal_open = open;
    }

    pub fn is_modal_open(&self) -> bool {
        self.modal_open
    }

    /// Handle a key event and return the corresponding app event.
    pub fn handle_key(&mut self, key: KeyEvent) -> AppEvent {
        // Ctrl+C always force quits
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return AppEvent::ForceQuit;
        }

        if self.modal_open {
            return match key.code {
                KeyCode::Char('a') => AppEvent::Acknowledge,
                KeyCode::Char('d') | KeyCode::Esc => AppEvent::Dismiss,
                KeyCode::Char('q') => AppEvent::Quit,
                _ => AppEvent::None,
            };
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => AppEvent::Quit,
            KeyCode::Char('?') => AppEvent::ShowHelp,

            KeyCode::Up | KeyCode::Char('k') => AppEvent::NavigateUp,
            KeyCode::Down | KeyCode::Char('j') => AppEvent::NavigateDown,
            KeyCode::Enter => AppEvent::Open,

            KeyCode::Char('a') => AppEvent::Acknowledge,
            KeyCode::Char('d') | KeyCode::Esc => AppEvent::Dismiss,
            KeyCode::Char('x') => AppEvent::CloseToast,
            KeyCode::Char('o') => AppEvent::OpenToast,
            KeyCode::Char('A') => AppEvent::MarkAllRead,

            KeyCode::Char('r') | KeyCode::Char('R') => AppEvent::Refresh,
            KeyCode::Char('s') => AppEvent::ToggleSound,

            _ => AppEvent::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_event(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_navigation_keys() {
        let mut handler = InputHandler::new();
        assert_eq!(handler.handle_key(key_event(KeyCode::Up)), AppEvent::NavigateUp);
        assert_eq!(handler.handle_key(key_event(KeyCode::Char('k'))), AppEvent::NavigateUp);
        assert_eq!(handler.handle_key(key_event(KeyCode::Down)), AppEvent::NavigateDown);
        assert_eq!(handler.handle_key(key_event(KeyCode::Char('j'))), AppEvent::NavigateDown);
        assert_eq!(handler.handle_key(key_event(KeyCode::Enter)), AppEvent::Open);
    }

    #[test]
    fn test_action_keys() {
        let mut handler = InputHandler::new();
        assert_eq!(handler.handle_key(key_event(KeyCode::Char('a'))), AppEvent::Acknowledge);
        assert_eq!(handler.handle_key(key_event(KeyCode::Char('A'))), AppEvent::MarkAllRead);
        assert_eq!(handler.handle_key(key_event(KeyCode::Char('d'))), AppEvent::Dismiss);
        assert_eq!(handler.handle_key(key_event(KeyCode::Esc)), AppEvent::Dismiss);
        assert_eq!(handler.handle_key(key_event(KeyCode::Char('x'))), AppEvent::CloseToast);
        assert_eq!(handler.handle_key(key_event(KeyCode::Char('o'))), AppEvent::OpenToast);
        assert_eq!(handler.handle_key(key_event(KeyCode::Char('s'))), AppEvent::ToggleSound);
        assert_eq!(handler.handle_key(key_event(KeyCode::Char('r'))), AppEvent::Refresh);
        assert_eq!(handler.handle_key(key_event(KeyCode::Char('?'))), AppEvent::ShowHelp);
        assert_eq!(handler.handle_key(key_event(KeyCode::Char('z'))), AppEvent::None);
    }

    #[test]
    fn test_modal_restricts_keys() {
        let mut handler = InputHandler::new();
        handler.set_modal_open(true);
        assert!(handler.is_modal_open());

        assert_eq!(handler.handle_key(key_event(KeyCode::Char('a'))), AppEvent::Acknowledge);
        assert_eq!(handler.handle_key(key_event(KeyCode::Esc)), AppEvent::Dismiss);
        assert_eq!(handler.handle_key(key_event(KeyCode::Char('q'))), AppEvent::Quit);
        assert_eq!(handler.handle_key(key_event(KeyCode::Down)), AppEvent::None);
        assert_eq!(handler.handle_key(key_event(KeyCode::Char('A'))), AppEvent::None);
        assert_eq!(handler.handle_key(key_event(KeyCode::Char('r'))), AppEvent::None);
        assert_eq!(handler.handle_key(key_event(KeyCode::Char('o'))), AppEvent::None);
    }

    #[test]
    fn test_ctrl_c_always_quits() {
        let mut handler = InputHandler::new();
        handler.set_modal_open(true);
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(handler.handle_key(ctrl_c), AppEvent::ForceQuit);
    }
}
