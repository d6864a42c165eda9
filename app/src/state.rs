/// UI state and the transitions driven by key presses and worker events.
///
/// Nothing here does I/O. Each transition returns the [`Effect`]s the controller has to carry
/// out, which keeps the whole flow testable without a terminal, a browser or yt-dlp.
use std::path::PathBuf;
use std::time::{Duration, Instant};

use ratatui::text::Span;
use sto_shared::events::AppEvent;

use crate::link_detector::{detect_link, DetectedLink};

/// How long the bar stays at 100% after an extraction ends.
pub const PROGRESS_HIDE_DELAY: Duration = Duration::from_millis(800);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressView {
    Hidden,
    Busy,
    Percent(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Url,
    List,
    FolderPrompt,
}

/// Work the controller performs on behalf of the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Extract(DetectedLink),
    PersistLinks { source_url: Option<String>, links: Vec<String> },
    DeleteLink(String),
    StartDownloads { urls: Vec<String>, folder: PathBuf },
    CancelDownloads,
    Quit,
}

#[derive(Debug)]
pub struct AppState {
    pub url_input: String,
    pub folder_input: String,
    pub links: Vec<String>,
    pub selected: Option<usize>,
    pub status: String,
    pub progress: ProgressView,
    pub mode: InputMode,
    pub download_folder: Option<PathBuf>,
    pub download_enabled: bool,
    pub extracting: bool,
    pub downloading: bool,
    pub exit: bool,
    hide_progress_at: Option<Instant>,
    ticks: usize,
}

impl AppState {
    pub fn new(download_folder: Option<PathBuf>) -> Self {
        Self {
            url_input: String::new(),
            folder_input: String::new(),
            links: Vec::new(),
            selected: None,
            status: "Ready.".to_string(),
            progress: ProgressView::Hidden,
            mode: InputMode::Url,
            download_folder,
            download_enabled: false,
            extracting: false,
            downloading: false,
            exit: false,
            hide_progress_at: None,
            ticks: 0,
        }
    }

    pub fn set_status(&mut self, text: impl Into<String>) {
        self.status = text.into();
    }

    /// Frame counter for the busy spinner.
    pub fn ticks(&self) -> usize {
        self.ticks
    }

    /// Links persisted by an earlier run.
    pub fn restore_links(&mut self, links: Vec<String>) {
        for link in links {
            if !self.links.contains(&link) {
                self.links.push(link);
            }
        }
        if !self.links.is_empty() {
            self.download_enabled = true;
            self.selected = Some(0);
            self.status = format!("📂 Restored {} link(s) from the last session.", self.links.len());
        }
    }

    pub fn start_extraction(&mut self) -> Vec<Effect> {
        if self.url_input.trim().is_empty() {
            self.set_status("❌ Please enter a valid URL.");
            return Vec::new();
        }
        if self.extracting {
            self.set_status("⚠️ Please wait until the current process finishes.");
            return Vec::new();
        }
        let link = detect_link(&self.url_input);
        if link.needs_browser() {
            self.download_enabled = false;
            self.extracting = true;
            self.progress = ProgressView::Busy;
            self.hide_progress_at = None;
            self.set_status("🔄 Starting extraction process...");
            return vec![Effect::Extract(link)];
        }
        match link.url() {
            Some(url) => self.show_results(None, vec![url.to_string()]),
            None => {
                self.set_status("❌ Please enter a valid URL.");
                Vec::new()
            }
        }
    }

    /// Append links not yet listed.
    pub fn show_results(&mut self, source_url: Option<String>, links: Vec<String>) -> Vec<Effect> {
        let mut added = Vec::new();
        for link in links {
            if !self.links.contains(&link) && !added.contains(&link) {
                added.push(link);
            }
        }
        if added.is_empty() {
            self.set_status("⚠️ No new m3u8 links added (may already exist).");
            return Vec::new();
        }

        self.links.extend(added.iter().cloned());
        if self.selected.is_none() {
            self.selected = Some(0);
        }
        self.download_enabled = true;
        self.set_status(format!("✅ Added {} m3u8 link(s) to the list.", added.len()));
        vec![Effect::PersistLinks { source_url, links: added }]
    }

    pub fn download_all(&mut self) -> Vec<Effect> {
        if !self.download_enabled {
            return Vec::new();
        }
        if self.downloading {
            self.set_status("⚠️ Please wait until the current download finishes.");
            return Vec::new();
        }
        if self.links.is_empty() {
            self.set_status("❌ No links in the list to download.");
            return Vec::new();
        }
        match self.download_folder.clone() {
            Some(folder) => self.start_downloads(folder),
            None => {
                self.mode = InputMode::FolderPrompt;
                self.folder_input.clear();
                self.set_status("📁 Enter a folder to save the videos (Esc cancels).");
                Vec::new()
            }
        }
    }

    pub fn submit_folder(&mut self) -> Vec<Effect> {
        let folder = self.folder_input.trim().to_string();
        self.mode = InputMode::List;
        if folder.is_empty() {
            self.set_status("❌ No folder chosen. Download cancelled.");
            return Vec::new();
        }
        let folder = PathBuf::from(folder);
        self.download_folder = Some(folder.clone());
        self.start_downloads(folder)
    }

    pub fn cancel_folder_prompt(&mut self) {
        self.mode = InputMode::List;
        self.folder_input.clear();
        self.set_status("❌ No folder chosen. Download cancelled.");
    }

    fn start_downloads(&mut self, folder: PathBuf) -> Vec<Effect> {
        self.downloading = true;
        self.hide_progress_at = None;
        self.progress = ProgressView::Percent(0);
        vec![Effect::StartDownloads {
            urls: self.links.clone(),
            folder,
        }]
    }

    pub fn cancel_downloads(&mut self) -> Vec<Effect> {
        if !self.downloading {
            return Vec::new();
        }
        self.set_status("⏹ Cancelling downloads...");
        vec![Effect::CancelDownloads]
    }

    pub fn remove_selected(&mut self) -> Vec<Effect> {
        let Some(index) = self.selected.filter(|i| *i < self.links.len()) else {
            return Vec::new();
        };
        let url = self.links.remove(index);
        self.selected = if self.links.is_empty() {
            None
        } else {
            Some(index.min(self.links.len() - 1))
        };
        if self.links.is_empty() {
            self.download_enabled = false;
        }
        self.set_status(format!("🗑 Removed {url}"));
        vec![Effect::DeleteLink(url)]
    }

    pub fn select_next(&mut self) {
        if self.links.is_empty() {
            return;
        }
        self.selected = Some(match self.selected {
            Some(i) if i + 1 < self.links.len() => i + 1,
            Some(i) => i,
            None => 0,
        });
    }

    pub fn select_previous(&mut self) {
        if self.links.is_empty() {
            return;
        }
        self.selected = Some(self.selected.map_or(0, |i| i.saturating_sub(1)));
    }

    pub fn toggle_focus(&mut self) {
        self.mode = match self.mode {
            InputMode::Url => InputMode::List,
            InputMode::List => InputMode::Url,
            InputMode::FolderPrompt => InputMode::FolderPrompt,
        };
    }

    pub fn quit(&mut self) -> Vec<Effect> {
        self.exit = true;
        vec![Effect::Quit]
    }

    /// Apply a worker event.
    pub fn apply(&mut self, event: AppEvent, now: Instant) -> Vec<Effect> {
        match event {
            AppEvent::Status(text) => self.set_status(text),
            AppEvent::ExtractionBusy(true) => {
                self.extracting = true;
                if !self.downloading {
                    self.progress = ProgressView::Busy;
                    self.hide_progress_at = None;
                }
            }
            AppEvent::ExtractionBusy(false) => {
                self.extracting = false;
                if !self.downloading {
                    self.progress = ProgressView::Percent(100);
                    self.hide_progress_at = Some(now + PROGRESS_HIDE_DELAY);
                }
            }
            AppEvent::LinksFound { source_url, links } => {
                return self.show_results(Some(source_url), links);
            }
            AppEvent::DownloadStarted { index, total } => {
                self.hide_progress_at = None;
                self.progress = ProgressView::Percent(0);
                self.set_status(format!("⬇️ Starting download {index} of {total}"));
            }
            AppEvent::DownloadProgress(percent) => {
                if self.downloading {
                    self.progress = ProgressView::Percent(percent.min(100));
                }
            }
            AppEvent::DownloadFinished { .. } => {}
            AppEvent::AllDownloadsDone => {
                self.downloading = false;
                self.progress = ProgressView::Hidden;
                self.set_status("✅ All downloads completed.");
            }
            AppEvent::DownloadsAborted { reason } => {
                self.downloading = false;
                self.progress = ProgressView::Hidden;
                self.set_status(reason);
            }
        }
        Vec::new()
    }

    /// Advance timers. Called once per frame.
    pub fn tick(&mut self, now: Instant) {
        self.ticks = self.ticks.wrapping_add(1);
        if let Some(at) = self.hide_progress_at {
            if now >= at {
                self.hide_progress_at = None;
                self.progress = ProgressView::Hidden;
            }
        }
    }
}

fn display_width(text: &str) -> usize {
    Span::raw(text).width()
}

/// Shorten `text` to `width` terminal cells, ending with `…` when cut.
pub fn elide(text: &str, width: usize) -> String {
    if display_width(text) <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let budget = width - 1;
    let end = text
        .char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .take_while(|end| display_width(&text[..*end]) <= budget)
        .last()
        .unwrap_or(0);
    let mut out = text[..end].to_string();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPISODE: &str = "https://s.to/serie/stream/dark/staffel-1/episode-1";

    fn with_links(links: &[&str]) -> AppState {
        let mut state = AppState::new(Some(PathBuf::from("/videos")));
        state.show_results(None, links.iter().map(|s| s.to_string()).collect());
        state
    }

    #[test]
    fn test_empty_url() {
        let mut state = AppState::new(None);
        state.url_input = "   ".into();
        assert!(state.start_extraction().is_empty());
        assert_eq!(state.status, "❌ Please enter a valid URL.");
        assert!(!state.extracting);
    }

    #[test]
    fn test_start_extraction() {
        let mut state = with_links(&["https://a/1.m3u8"]);
        state.url_input = format!(" {EPISODE} ");
        let effects = state.start_extraction();

        assert!(matches!(&effects[..], [Effect::Extract(DetectedLink::Episode { .. })]));
        assert_eq!(state.status, "🔄 Starting extraction process...");
        assert_eq!(state.progress, ProgressView::Busy);
        assert!(!state.download_enabled);
        assert!(state.extracting);

        // second press while busy
        assert!(state.start_extraction().is_empty());
        assert_eq!(state.status, "⚠️ Please wait until the current process finishes.");
    }

    #[test]
    fn test_direct_manifest_skips_browser() {
        let mut state = AppState::new(None);
        state.url_input = "https://cdn/x/master.m3u8".into();
        let effects = state.start_extraction();

        assert_eq!(
            effects,
            vec![Effect::PersistLinks {
                source_url: None,
                links: vec!["https://cdn/x/master.m3u8".into()],
            }]
        );
        assert!(!state.extracting);
        assert_eq!(state.links, vec!["https://cdn/x/master.m3u8".to_string()]);
        assert_eq!(state.status, "✅ Added 1 m3u8 link(s) to the list.");
    }

    #[test]
    fn test_show_results_dedupes() {
        let mut state = with_links(&["https://a/1.m3u8"]);
        let effects = state.show_results(
            Some(EPISODE.into()),
            vec!["https://a/1.m3u8".into(), "https://a/2.m3u8".into(), "https://a/2.m3u8".into()],
        );
        assert_eq!(state.links.len(), 2);
        assert_eq!(state.status, "✅ Added 1 m3u8 link(s) to the list.");
        assert_eq!(
            effects,
            vec![Effect::PersistLinks {
                source_url: Some(EPISODE.into()),
                links: vec!["https://a/2.m3u8".into()],
            }]
        );

        assert!(state.show_results(None, vec!["https://a/2.m3u8".into()]).is_empty());
        assert_eq!(state.status, "⚠️ No new m3u8 links added (may already exist).");
    }

    #[test]
    fn test_no_links_found_keeps_download_disabled() {
        let mut state = AppState::new(None);
        state.url_input = EPISODE.into();
        state.start_extraction();
        let now = Instant::now();
        state.apply(AppEvent::Status("❌ No m3u8 links found.".into()), now);
        state.apply(AppEvent::LinksFound { source_url: EPISODE.into(), links: vec![] }, now);
        state.apply(AppEvent::ExtractionBusy(false), now);

        assert!(!state.download_enabled);
        assert!(state.download_all().is_empty());
        assert_eq!(state.status, "⚠️ No new m3u8 links added (may already exist).");
    }

    #[test]
    fn test_extraction_without_new_links_leaves_download_disabled() {
        let mut state = with_links(&["https://a/1.m3u8"]);
        state.url_input = EPISODE.into();
        state.start_extraction();
        assert!(!state.download_enabled);

        let effects = state.apply(
            AppEvent::LinksFound { source_url: EPISODE.into(), links: vec!["https://a/1.m3u8".into()] },
            Instant::now(),
        );
        assert!(effects.is_empty());
        assert!(!state.download_enabled);
        assert!(state.download_all().is_empty());
        assert_eq!(state.links.len(), 1);
    }

    #[test]
    fn test_progress_hides_after_extraction() {
        let mut state = AppState::new(None);
        let now = Instant::now();
        state.apply(AppEvent::ExtractionBusy(true), now);
        assert_eq!(state.progress, ProgressView::Busy);

        state.apply(AppEvent::ExtractionBusy(false), now);
        assert_eq!(state.progress, ProgressView::Percent(100));
        assert!(!state.extracting);

        state.tick(now + Duration::from_millis(799));
        assert_eq!(state.progress, ProgressView::Percent(100));
        state.tick(now + PROGRESS_HIDE_DELAY);
        assert_eq!(state.progress, ProgressView::Hidden);
    }

    #[test]
    fn test_download_all_guards() {
        let mut state = AppState::new(Some(PathBuf::from("/videos")));
        state.download_enabled = true;
        assert!(state.download_all().is_empty());
        assert_eq!(state.status, "❌ No links in the list to download.");

        let mut state = with_links(&["https://a/1.m3u8"]);
        assert_eq!(state.download_all().len(), 1);
        assert!(state.download_all().is_empty());
        assert_eq!(state.status, "⚠️ Please wait until the current download finishes.");
    }

    #[test]
    fn test_download_all_with_folder() {
        let mut state = with_links(&["https://a/1.m3u8", "https://a/2.m3u8"]);
        let effects = state.download_all();
        assert_eq!(
            effects,
            vec![Effect::StartDownloads {
                urls: vec!["https://a/1.m3u8".into(), "https://a/2.m3u8".into()],
                folder: PathBuf::from("/videos"),
            }]
        );
        assert!(state.downloading);
        assert_eq!(state.progress, ProgressView::Percent(0));
    }

    #[test]
    fn test_folder_prompt() {
        let mut state = AppState::new(None);
        state.show_results(None, vec!["https://a/1.m3u8".into()]);

        assert!(state.download_all().is_empty());
        assert_eq!(state.mode, InputMode::FolderPrompt);

        state.folder_input = "   ".into();
        assert!(state.submit_folder().is_empty());
        assert_eq!(state.status, "❌ No folder chosen. Download cancelled.");
        assert!(!state.downloading);

        state.download_all();
        state.cancel_folder_prompt();
        assert_eq!(state.mode, InputMode::List);
        assert_eq!(state.status, "❌ No folder chosen. Download cancelled.");

        state.download_all();
        state.folder_input = "/tmp/out".into();
        let effects = state.submit_folder();
        assert!(matches!(&effects[..], [Effect::StartDownloads { folder, .. }] if folder == &PathBuf::from("/tmp/out")));
        assert_eq!(state.download_folder, Some(PathBuf::from("/tmp/out")));
    }

    #[test]
    fn test_download_events() {
        let mut state = with_links(&["https://a/1.m3u8", "https://a/2.m3u8"]);
        state.download_all();
        let now = Instant::now();

        state.apply(AppEvent::DownloadStarted { index: 1, total: 2 }, now);
        assert_eq!(state.status, "⬇️ Starting download 1 of 2");
        state.apply(AppEvent::DownloadProgress(42), now);
        assert_eq!(state.progress, ProgressView::Percent(42));
        state.apply(AppEvent::DownloadFinished { index: 1, ok: false }, now);
        state.apply(AppEvent::DownloadStarted { index: 2, total: 2 }, now);
        assert_eq!(state.progress, ProgressView::Percent(0));

        state.apply(AppEvent::AllDownloadsDone, now);
        assert_eq!(state.status, "✅ All downloads completed.");
        assert_eq!(state.progress, ProgressView::Hidden);
        assert!(!state.downloading);
    }

    #[test]
    fn test_extraction_end_does_not_hide_download_bar() {
        let mut state = with_links(&["https://a/1.m3u8"]);
        state.download_all();
        let now = Instant::now();
        state.apply(AppEvent::DownloadProgress(30), now);
        state.apply(AppEvent::ExtractionBusy(false), now);
        state.tick(now + Duration::from_secs(2));
        assert_eq!(state.progress, ProgressView::Percent(30));
    }

    #[test]
    fn test_cancel_downloads() {
        let mut state = with_links(&["https://a/1.m3u8"]);
        assert!(state.cancel_downloads().is_empty());
        state.download_all();
        assert_eq!(state.cancel_downloads(), vec![Effect::CancelDownloads]);

        state.apply(AppEvent::DownloadsAborted { reason: "⏹ Downloads cancelled.".into() }, Instant::now());
        assert!(!state.downloading);
        assert_eq!(state.status, "⏹ Downloads cancelled.");
    }

    #[test]
    fn test_remove_selected() {
        let mut state = with_links(&["https://a/1.m3u8", "https://a/2.m3u8"]);
        state.select_next();
        assert_eq!(state.remove_selected(), vec![Effect::DeleteLink("https://a/2.m3u8".into())]);
        assert_eq!(state.selected, Some(0));
        assert!(state.download_enabled);

        state.remove_selected();
        assert!(state.links.is_empty());
        assert_eq!(state.selected, None);
        assert!(!state.download_enabled);
        assert!(state.remove_selected().is_empty());
    }

    #[test]
    fn test_selection_bounds() {
        let mut state = with_links(&["a.m3u8", "b.m3u8"]);
        state.select_previous();
        assert_eq!(state.selected, Some(0));
        state.select_next();
        state.select_next();
        assert_eq!(state.selected, Some(1));
    }

    #[test]
    fn test_restore_links() {
        let mut state = AppState::new(None);
        state.restore_links(vec![]);
        assert!(!state.download_enabled);
        state.restore_links(vec!["https://a/1.m3u8".into(), "https://a/1.m3u8".into()]);
        assert_eq!(state.links.len(), 1);
        assert!(state.download_enabled);
    }

    #[test]
    fn test_focus_and_quit() {
        let mut state = AppState::new(None);
        state.toggle_focus();
        assert_eq!(state.mode, InputMode::List);
        state.toggle_focus();
        assert_eq!(state.mode, InputMode::Url);
        assert_eq!(state.quit(), vec![Effect::Quit]);
        assert!(state.exit);
    }

    #[test]
    fn test_elide() {
        assert_eq!(elide("short", 10), "short");
        assert_eq!(elide("exactly10!", 10), "exactly10!");
        assert_eq!(elide("this is too long", 8), "this is…");
        assert_eq!(elide("abc", 0), "");
    }

    #[test]
    fn test_elide_counts_wide_emoji() {
        let status = "✅ Added 3 m3u8 link(s) to the list.";
        let cut = elide(status, 6);
        assert_eq!(cut, "✅ Ad…");
        assert_eq!(display_width(&cut), 6);
        assert_eq!(elide("✅ ok", 5), "✅ ok");
    }
}
