use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::app::App;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    None,
    Quit,
    /// Start a manual refresh, superseding one in flight
    Refresh,
}

pub(crate) fn handle_key_event(key: KeyEvent, app: &mut App) -> Action {
    use KeyCode::{BackTab, Char, Down, F, Tab, Up};

    if key.kind == KeyEventKind::Release {
        return Action::None;
    }

    // Global quit shortcuts
    if key.code == Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Action::Quit;
    }

    match key.code {
        Char('q') | KeyCode::Esc => Action::Quit,
        Char('r') | F(5) => Action::Refresh,
        Tab | BackTab => {
            app.toggle_screen();
            Action::None
        }
        Up | Char('k') => {
            app.select_previous();
            Action::None
        }
        Down | Char('j') => {
            app.select_next();
            Action::None
        }
        _ => Action::None,
    }
}
