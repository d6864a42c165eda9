/// Locating a Chrome/Chromium executable.
use std::path::{Path, PathBuf};

use tracing::debug;

/// Well-known install locations, checked in order.
const CHROME_CANDIDATES: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
];

/// Executable names searched on `PATH` when no candidate exists.
const CHROME_BINARIES: &[&str] = &["google-chrome", "chrome", "chromium-browser", "chromium"];

/// Find a Chrome executable on this machine.
///
/// `None` lets chromiumoxide fall back to its own detection.
pub fn find_chrome_path() -> Option<PathBuf> {
    find_chrome_in(
        CHROME_CANDIDATES.iter().map(PathBuf::from),
        CHROME_BINARIES,
        |name| which::which(name).ok(),
    )
}

/// Use `explicit` if it exists, otherwise fall back to [`find_chrome_path`].
pub fn resolve_chrome(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) if path.exists() => Some(path.to_path_buf()),
        Some(path) => {
            debug!("Configured browser {:?} does not exist, searching instead", path);
            find_chrome_path()
        }
        None => find_chrome_path(),
    }
}

fn find_chrome_in<I, F>(candidates: I, binaries: &[&str], lookup: F) -> Option<PathBuf>
where
    I: IntoIterator<Item = PathBuf>,
    F: Fn(&str) -> Option<PathBuf>,
{
    if let Some(path) = candidates.into_iter().find(|p| p.exists()) {
        debug!("Using browser at {:?}", path);
        return Some(path);
    }
    let found = binaries.iter().find_map(|name| lookup(name));
    match &found {
        Some(path) => debug!("Using browser from PATH: {:?}", path),
        None => debug!("No browser executable found, leaving it to chromiumoxide"),
    }
    found
}
