use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, ListState, Paragraph},
    Frame,
};

use crate::state::{elide, AppState, InputMode, ProgressView};

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

pub fn render(frame: &mut Frame, state: &AppState) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Fill(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_input(frame, state, layout[0]);
    render_links(frame, state, layout[1]);
    render_controls(frame, state, layout[2]);
    render_status(frame, state, layout[3]);
    render_progress(frame, state, layout[4]);
}

fn focused_block(title: &str, focused: bool) -> Block<'_> {
    let style = if focused {
        Style::new().fg(Color::Cyan)
    } else {
        Style::new().fg(Color::DarkGray)
    };
    Block::default().borders(Borders::ALL).border_style(style).title(title)
}

fn render_input(frame: &mut Frame, state: &AppState, rect: Rect) {
    let (title, text, focused) = match state.mode {
        InputMode::FolderPrompt => (" Save videos to folder ", state.folder_input.as_str(), true),
        mode => (" s.to episode URL ", state.url_input.as_str(), mode == InputMode::Url),
    };
    let input = Paragraph::new(text).block(focused_block(title, focused));
    frame.render_widget(input, rect);

    if focused {
        let x = rect.x + 1 + text.chars().count() as u16;
        frame.set_cursor_position((x.min(rect.right().saturating_sub(2)), rect.y + 1));
    }
}

fn render_links(frame: &mut Frame, state: &AppState, rect: Rect) {
    let title = format!(" m3u8 links ({}) ", state.links.len());
    let items: Vec<ListItem> = state
        .links
        .iter()
        .enumerate()
        .map(|(i, link)| ListItem::new(format!("{:>3}. {}", i + 1, link)))
        .collect();

    let list = List::new(items)
        .block(focused_block(&title, state.mode == InputMode::List))
        .highlight_style(Style::new().add_modifier(Modifier::REVERSED))
        .highlight_symbol("> ");

    let mut list_state = ListState::default().with_selected(state.selected);
    frame.render_stateful_widget(list, rect, &mut list_state);
}

fn key_hint<'a>(key: &'a str, label: &'a str, enabled: bool) -> Vec<Span<'a>> {
    let style = if enabled {
        Style::new()
    } else {
        Style::new().fg(Color::DarkGray)
    };
    vec![
        Span::styled(format!("[{key}]"), style.bold()),
        Span::styled(format!(" {label}  "), style),
    ]
}

fn render_controls(frame: &mut Frame, state: &AppState, rect: Rect) {
    let mut spans = Vec::new();
    match state.mode {
        InputMode::FolderPrompt => {
            spans.extend(key_hint("Enter", "Save here", true));
            spans.extend(key_hint("Esc", "Cancel", true));
        }
        _ => {
            spans.extend(key_hint("Enter", "Find m3u8", state.mode == InputMode::Url && !state.extracting));
            spans.extend(key_hint("Ctrl+D", "Download all", state.download_enabled && !state.downloading));
            spans.extend(key_hint("Del", "Remove", state.mode == InputMode::List && !state.links.is_empty()));
            if state.downloading {
                spans.extend(key_hint("Ctrl+X", "Cancel", true));
            }
            spans.extend(key_hint("Tab", "Focus", true));
            spans.extend(key_hint("Ctrl+Q", "Quit", true));
        }
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), rect);
}

fn render_status(frame: &mut Frame, state: &AppState, rect: Rect) {
    let text = elide(&state.status, rect.width as usize);
    frame.render_widget(Paragraph::new(text), rect);
}

fn render_progress(frame: &mut Frame, state: &AppState, rect: Rect) {
    match state.progress {
        ProgressView::Hidden => {}
        ProgressView::Busy => {
            let spinner = SPINNER[state.ticks() % SPINNER.len()];
            let busy = Paragraph::new(format!("{spinner} working...")).fg(Color::Yellow);
            frame.render_widget(busy, rect);
        }
        ProgressView::Percent(percent) => {
            let gauge = Gauge::default()
                .gauge_style(Style::new().fg(Color::Green))
                .percent(u16::from(percent.min(100)));
            frame.render_widget(gauge, rect);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};

    fn draw(state: &AppState) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 12)).unwrap();
        terminal.draw(|frame| render(frame, state)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_renders_links_and_status() {
        let mut state = AppState::new(None);
        state.show_results(None, vec!["https://cdn/a.m3u8".into()]);
        let screen = draw(&state);

        assert!(screen.contains("m3u8 links (1)"));
        assert!(screen.contains("https://cdn/a.m3u8"));
        assert!(screen.contains("Added 1 m3u8 link(s) to the list."));
    }

    #[test]
    fn test_folder_prompt_title() {
        let mut state = AppState::new(None);
        state.mode = InputMode::FolderPrompt;
        state.folder_input = "/tmp/videos".into();
        let screen = draw(&state);

        assert!(screen.contains("Save videos to folder"));
        assert!(screen.contains("/tmp/videos"));
        assert!(screen.contains("[Esc] Cancel"));
    }

    #[test]
    fn test_progress_gauge() {
        let mut state = AppState::new(Some("/v".into()));
        state.show_results(None, vec!["https://cdn/a.m3u8".into()]);
        state.download_all();
        state.apply(sto_shared::events::AppEvent::DownloadProgress(42), std::time::Instant::now());
        assert!(draw(&state).contains("42%"));
    }
}
