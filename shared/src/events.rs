/// Events sent from background workers (sniffer, downloader, queue runner) to the UI loop.
///
/// Workers never touch UI state directly; they push events on an unbounded channel and the
/// UI applies them between frames.
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// Replace the status line.
    Status(String),
    /// Extraction started (`true`) or finished (`false`).
    ExtractionBusy(bool),
    /// Manifest links found for a page (possibly none).
    LinksFound { source_url: String, links: Vec<String> },
    /// Job `index` of `total` (1-based) started.
    DownloadStarted { index: usize, total: usize },
    /// Percent of the running download.
    DownloadProgress(u8),
    /// Job `index` ended, successfully or not.
    DownloadFinished { index: usize, ok: bool },
    /// The queue is exhausted.
    AllDownloadsDone,
    /// The batch stopped early (cancelled or yt-dlp unavailable).
    DownloadsAborted { reason: String },
}

pub type EventSender = mpsc::UnboundedSender<AppEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<AppEvent>;

pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Send helpers. A closed channel means the UI is gone, so failures are ignored.
pub trait EventSenderExt {
    fn status(&self, text: impl Into<String>);
    fn emit(&self, event: AppEvent);
}

impl EventSenderExt for EventSender {
    fn status(&self, text: impl Into<String>) {
        self.emit(AppEvent::Status(text.into()));
    }

    fn emit(&self, event: AppEvent) {
        if self.send(event).is_err() {
            tracing::debug!("UI event channel closed");
        }
    }
}
