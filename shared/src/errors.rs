/// Unified error types for sto-grab.
use thiserror::Error;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum StoError {
    #[error("Sniffer error: {0}")]
    Sniff(#[from] SniffError),

    #[error("Download error: {0}")]
    Download(#[from] DownloadError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while driving the browser.
#[derive(Debug, Error)]
pub enum SniffError {
    #[error("Failed to launch browser: {0}")]
    BrowserLaunch(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("No iframe with a src attribute on the page")]
    IframeNotFound,

    #[error("Invalid iframe URL: {0}")]
    InvalidUrl(String),

    #[error("Timed out after {0}ms waiting for {1}")]
    Timeout(u64, &'static str),

    #[error("Browser protocol error: {0}")]
    Protocol(String),
}

/// Errors raised by the yt-dlp driver.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("{0} not found")]
    ToolNotFound(String),

    #[error("Failed to spawn yt-dlp: {0}")]
    SpawnFailed(String),

    #[error("{0}")]
    Failed(String),

    #[error("Download cancelled")]
    Cancelled,
}

impl DownloadError {
    /// Build the failure for a finished yt-dlp process.
    ///
    /// yt-dlp prints the reason on stderr as `ERROR: ...`; prefer that over the bare exit code.
    pub fn from_exit(code: Option<i32>, last_error: Option<String>) -> Self {
        match last_error {
            Some(msg) if !msg.is_empty() => DownloadError::Failed(msg),
            _ => DownloadError::Failed(format!("yt-dlp exited with code {}", code.unwrap_or(-1))),
        }
    }

    /// Whether the user asked for this.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DownloadError::Cancelled)
    }
}

/// Result type alias for sto-grab operations.
pub type StoResult<T> = Result<T, StoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_prefers_error_line() {
        let err = DownloadError::from_exit(Some(1), Some("ERROR: HTTP Error 403: Forbidden".into()));
        assert_eq!(err.to_string(), "ERROR: HTTP Error 403: Forbidden");
    }

    #[test]
    fn test_exit_without_message() {
        let err = DownloadError::from_exit(Some(2), None);
        assert!(matches!(&err, DownloadError::Failed(msg) if msg == "yt-dlp exited with code 2"));

        let err = DownloadError::from_exit(None, Some(String::new()));
        assert_eq!(err.to_string(), "yt-dlp exited with code -1");
    }

    #[test]
    fn test_wrapping() {
        let err: StoError = SniffError::IframeNotFound.into();
        assert!(err.to_string().starts_with("Sniffer error:"));
        assert!(DownloadError::Cancelled.is_cancelled());
    }
}
