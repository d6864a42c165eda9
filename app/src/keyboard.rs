use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::state::{AppState, Effect, InputMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    FindManifests,
    DownloadAll,
    CancelDownloads,
    SwitchFocus,
    MoveUp,
    MoveDown,
    Remove,
    SubmitFolder,
    CancelPrompt,
    Char(char),
    Backspace,
}

/// Map a key press to an action for the current input mode.
pub fn map_key(key: KeyEvent, mode: InputMode) -> Option<Action> {
    if key.kind != KeyEventKind::Press {
        return None;
    }

    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') | KeyCode::Char('q') => Some(Action::Quit),
            KeyCode::Char('d') if mode != InputMode::FolderPrompt => Some(Action::DownloadAll),
            KeyCode::Char('x') => Some(Action::CancelDownloads),
            _ => None,
        };
    }

    match (mode, key.code) {
        (_, KeyCode::F(5)) if mode != InputMode::FolderPrompt => Some(Action::DownloadAll),

        (InputMode::FolderPrompt, KeyCode::Enter) => Some(Action::SubmitFolder),
        (InputMode::FolderPrompt, KeyCode::Esc) => Some(Action::CancelPrompt),

        (InputMode::Url, KeyCode::Enter) => Some(Action::FindManifests),
        (InputMode::Url | InputMode::List, KeyCode::Tab | KeyCode::BackTab) => Some(Action::SwitchFocus),

        (InputMode::List, KeyCode::Up | KeyCode::Char('k')) => Some(Action::MoveUp),
        (InputMode::List, KeyCode::Down | KeyCode::Char('j')) => Some(Action::MoveDown),
        (InputMode::List, KeyCode::Delete | KeyCode::Char('d')) => Some(Action::Remove),

        (InputMode::Url | InputMode::FolderPrompt, KeyCode::Char(c)) => Some(Action::Char(c)),
        (InputMode::Url | InputMode::FolderPrompt, KeyCode::Backspace) => Some(Action::Backspace),
        _ => None,
    }
}

/// Run an action against the state.
pub fn handle_action(state: &mut AppState, action: Action) -> Vec<Effect> {
    match action {
        Action::Quit => state.quit(),
        Action::FindManifests => state.start_extraction(),
        Action::DownloadAll => state.download_all(),
        Action::CancelDownloads => state.cancel_downloads(),
        Action::SwitchFocus => {
            state.toggle_focus();
            Vec::new()
        }
        Action::MoveUp => {
            state.select_previous();
            Vec::new()
        }
        Action::MoveDown => {
            state.select_next();
            Vec::new()
        }
        Action::Remove => state.remove_selected(),
        Action::SubmitFolder => state.submit_folder(),
        Action::CancelPrompt => {
            state.cancel_folder_prompt();
            Vec::new()
        }
        Action::Char(c) => {
            active_input(state).push(c);
            Vec::new()
        }
        Action::Backspace => {
            active_input(state).pop();
            Vec::new()
        }
    }
}

fn active_input(state: &mut AppState) -> &mut String {
    match state.mode {
        InputMode::FolderPrompt => &mut state.folder_input,
        _ => &mut state.url_input,
    }
}
