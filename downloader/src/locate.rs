/// Finding yt-dlp and the ffmpeg it needs for HLS remuxing.
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use sto_shared::errors::DownloadError;

fn ytdlp_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "yt-dlp.exe"
    } else {
        "yt-dlp"
    }
}

fn ffmpeg_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "ffmpeg.exe"
    } else {
        "ffmpeg"
    }
}

/// Resolve the yt-dlp executable. An explicit path must exist; otherwise search `PATH`.
pub fn find_ytdlp(explicit: Option<&Path>) -> Result<PathBuf, DownloadError> {
    if let Some(path) = explicit {
        return if path.exists() {
            Ok(path.to_path_buf())
        } else {
            Err(DownloadError::ToolNotFound(format!("yt-dlp at {}", path.display())))
        };
    }
    which::which(ytdlp_name())
        .map_err(|_| DownloadError::ToolNotFound("yt-dlp on PATH".to_string()))
}

/// Directories holding ffmpeg that are not already on `PATH`.
/// Checks FFMPEG_PATH env var first, then common install locations.
pub fn discover_ffmpeg_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(ffmpeg_path) = std::env::var("FFMPEG_PATH") {
        dirs.push(PathBuf::from(ffmpeg_path));
    }

    // Already reachable, nothing to add
    if which::which(ffmpeg_name()).is_ok() {
        return dirs;
    }

    if cfg!(target_os = "windows") {
        if let Ok(local_app) = std::env::var("LOCALAPPDATA") {
            // winget installs ffmpeg here
            let winget_dir = PathBuf::from(&local_app)
                .join("Microsoft")
                .join("WinGet")
                .join("Packages");
            dirs.extend(winget_ffmpeg_dirs(&winget_dir));
        }
        dirs.extend(
            [r"C:\ffmpeg\bin", r"C:\Program Files\ffmpeg\bin"]
                .iter()
                .map(PathBuf::from)
                .filter(|p| p.join(ffmpeg_name()).exists()),
        );
    } else {
        dirs.extend(
            [
                "/usr/local/bin",
                "/snap/bin",
                "/opt/homebrew/bin",
                "/home/linuxbrew/.linuxbrew/bin",
            ]
            .iter()
            .map(PathBuf::from)
            .filter(|p| p.join(ffmpeg_name()).exists()),
        );
    }

    dirs
}

fn winget_ffmpeg_dirs(packages: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(packages) else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter(|e| e.file_name().to_string_lossy().starts_with("Gyan.FFmpeg"))
        .filter_map(|e| std::fs::read_dir(e.path()).ok())
        .flat_map(|subs| subs.flatten())
        .map(|sub| sub.path().join("bin"))
        .filter(|bin| bin.join(ffmpeg_name()).exists())
        .collect()
}

/// `current` with `extra` appended, or `None` when there is nothing to add.
pub fn augmented_path(current: Option<OsString>, extra: &[PathBuf]) -> Option<OsString> {
    if extra.is_empty() {
        return None;
    }
    let mut paths: Vec<PathBuf> = current
        .as_deref()
        .map(|p| std::env::split_paths(p).collect())
        .unwrap_or_default();
    for dir in extra {
        if !paths.contains(dir) {
            paths.push(dir.clone());
        }
    }
    match std::env::join_paths(paths) {
        Ok(joined) => {
            info!("Adding to yt-dlp PATH: {:?}", extra);
            Some(joined)
        }
        Err(e) => {
            debug!("Cannot build PATH for yt-dlp: {}", e);
            None
        }
    }
}
