/// yt-dlp subprocess driver.
///
/// Spawns one `yt-dlp` per download, parses progress from stdout and forwards stderr to
/// tracing logs. The last `ERROR:` line on stderr becomes the failure message.
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use sto_shared::config::DownloadSettings;
use sto_shared::errors::DownloadError;
use sto_shared::events::{AppEvent, EventSender, EventSenderExt};

use crate::locate::{augmented_path, discover_ffmpeg_dirs, find_ytdlp};
use crate::progress::{parse_error_line, parse_progress_line, progress_template, ProgressSignal};

#[derive(Debug, Clone)]
pub struct YtDlp {
    bin: PathBuf,
    format: String,
    /// PATH override so yt-dlp can find ffmpeg.
    path_env: Option<OsString>,
}

impl YtDlp {
    pub fn new(bin: PathBuf, format: impl Into<String>) -> Self {
        Self {
            bin,
            format: format.into(),
            path_env: None,
        }
    }

    /// Locate yt-dlp and ffmpeg according to `settings`.
    pub fn locate(settings: &DownloadSettings) -> Result<Self, DownloadError> {
        let bin = find_ytdlp(settings.ytdlp_bin.as_deref())?;
        info!("Using yt-dlp at {:?}", bin);
        let mut ytdlp = Self::new(bin, settings.format.clone());
        ytdlp.path_env = augmented_path(std::env::var_os("PATH"), &discover_ffmpeg_dirs());
        Ok(ytdlp)
    }

    /// Command-line arguments for downloading `url` into `output`.
    pub fn build_args(&self, url: &str, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "-f",
            self.format.as_str(),
            "--no-warnings",
            "--no-playlist",
            "--newline",
            "--progress",
            "--progress-template",
            progress_template().as_str(),
            "-o",
        ]
        .iter()
        .map(OsString::from)
        .collect();
        args.push(output.as_os_str().to_owned());
        args.push(OsString::from(url));
        args
    }

    /// Download `url` into `output`, reporting status and percent on `events`.
    pub async fn download(
        &self,
        url: &str,
        output: &Path,
        events: &EventSender,
        cancel: &CancellationToken,
    ) -> Result<(), DownloadError> {
        events.status(format!("⬇️ Starting download: {url}"));

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::Failed(format!("Cannot create {}: {}", parent.display(), e)))?;
        }

        let mut command = Command::new(&self.bin);
        command
            .args(self.build_args(url, output))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(path) = &self.path_env {
            command.env("PATH", path);
        }

        let mut child = command
            .spawn()
            .map_err(|e| DownloadError::SpawnFailed(format!("{:?}: {}", self.bin, e)))?;
        info!("yt-dlp spawned (pid: {:?}) for {}", child.id(), url);

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DownloadError::SpawnFailed("No stdout handle".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| DownloadError::SpawnFailed("No stderr handle".into()))?;

        // Stderr reader task - forward to tracing, remember the last error
        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            let mut last_error = None;
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(target: "ytdlp", "{}", line);
                if let Some(msg) = parse_error_line(&line) {
                    last_error = Some(msg);
                }
            }
            last_error
        });

        let mut lines = BufReader::new(stdout).lines();
        let mut finished = false;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    stderr_task.abort();
                    return Err(kill(&mut child).await);
                }
                line = lines.next_line() => match line {
                    Ok(Some(line)) => finished |= handle_stdout_line(&line, events),
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Failed to read yt-dlp stdout: {}", e);
                        break;
                    }
                },
            }
        }

        let status = tokio::select! {
            _ = cancel.cancelled() => None,
            status = child.wait() => Some(status),
        };
        let Some(status) = status else {
            stderr_task.abort();
            return Err(kill(&mut child).await);
        };
        let status = status.map_err(|e| DownloadError::Failed(e.to_string()))?;
        let last_error = stderr_task.await.unwrap_or_default();

        if status.success() {
            if !finished {
                report_finished(events);
            }
            info!("yt-dlp finished {:?}", output);
            Ok(())
        } else {
            warn!("yt-dlp exited with {} for {}", status, url);
            Err(DownloadError::from_exit(status.code(), last_error))
        }
    }
}

/// Returns true if the line reported a finished download.
fn handle_stdout_line(line: &str, events: &EventSender) -> bool {
    match parse_progress_line(line).and_then(|record| record.signal()) {
        Some(ProgressSignal::Percent(pct)) => {
            events.emit(AppEvent::DownloadProgress(pct));
            false
        }
        Some(ProgressSignal::Finished) => {
            report_finished(events);
            true
        }
        None => {
            if !line.trim().is_empty() {
                debug!(target: "ytdlp", "{}", line);
            }
            false
        }
    }
}

fn report_finished(events: &EventSender) {
    events.emit(AppEvent::DownloadProgress(100));
    events.status("✅ Download finished!");
}

async fn kill(child: &mut Child) -> DownloadError {
    info!("Cancelling yt-dlp (pid: {:?})", child.id());
    if let Err(e) = child.kill().await {
        warn!("Failed to kill yt-dlp: {}", e);
    }
    DownloadError::Cancelled
}
