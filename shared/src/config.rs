/// Runtime configuration read from the environment.
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::{StoError, StoResult};

/// Browser timing and launch settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserSettings {
    /// Explicit browser executable; skips lookup when set.
    pub chrome_path: Option<PathBuf>,
    pub headless: bool,
    pub nav_timeout: Duration,
    pub iframe_timeout: Duration,
    pub sniff_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: false,
            nav_timeout: Duration::from_millis(60_000),
            iframe_timeout: Duration::from_millis(15_000),
            sniff_timeout: Duration::from_millis(120_000),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// yt-dlp settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSettings {
    pub ytdlp_bin: Option<PathBuf>,
    pub format: String,
    /// Save folder chosen up front; `None` means ask on first download.
    pub download_dir: Option<PathBuf>,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            ytdlp_bin: None,
            format: "best".to_string(),
            download_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub browser: BrowserSettings,
    pub download: DownloadSettings,
    pub database_path: PathBuf,
    pub log_file: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            browser: BrowserSettings::default(),
            download: DownloadSettings::default(),
            database_path: PathBuf::from("./sto-grab.db"),
            log_file: PathBuf::from("./sto-grab.log"),
        }
    }
}

impl AppConfig {
    /// Read `STO_*` variables from the process environment.
    pub fn from_env() -> StoResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> StoResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = AppConfig::default();

        let browser = BrowserSettings {
            chrome_path: get("STO_CHROME_PATH").map(PathBuf::from),
            headless: parse_bool("STO_HEADLESS", get("STO_HEADLESS"), defaults.browser.headless)?,
            nav_timeout: parse_millis("STO_NAV_TIMEOUT_MS", get("STO_NAV_TIMEOUT_MS"), defaults.browser.nav_timeout)?,
            iframe_timeout: parse_millis("STO_IFRAME_TIMEOUT_MS", get("STO_IFRAME_TIMEOUT_MS"), defaults.browser.iframe_timeout)?,
            sniff_timeout: parse_millis("STO_SNIFF_TIMEOUT_MS", get("STO_SNIFF_TIMEOUT_MS"), defaults.browser.sniff_timeout)?,
            poll_interval: parse_millis("STO_POLL_INTERVAL_MS", get("STO_POLL_INTERVAL_MS"), defaults.browser.poll_interval)?,
        };

        if browser.poll_interval.is_zero() {
            return Err(StoError::Config("STO_POLL_INTERVAL_MS must be greater than 0".into()));
        }
        if browser.poll_interval > browser.sniff_timeout {
            return Err(StoError::Config(
                "STO_POLL_INTERVAL_MS must not exceed STO_SNIFF_TIMEOUT_MS".into(),
            ));
        }

        let download = DownloadSettings {
            ytdlp_bin: get("STO_YTDLP_BIN").map(PathBuf::from),
            format: get("STO_FORMAT").unwrap_or(defaults.download.format),
            download_dir: get("STO_DOWNLOAD_DIR").map(PathBuf::from),
        };

        Ok(Self {
            browser,
            download,
            database_path: get("STO_DATABASE_PATH").map(PathBuf::from).unwrap_or(defaults.database_path),
            log_file: get("STO_LOG_FILE").map(PathBuf::from).unwrap_or(defaults.log_file),
        })
    }

    /// SQLite URL for the configured database file.
    pub fn database_url(&self) -> String {
        let path = self.database_path.display().to_string();
        // Strip Windows UNC prefix (\\?\) which breaks SQLite URL parsing
        let path = path.strip_prefix(r"\\?\").unwrap_or(&path);
        format!("sqlite://{}?mode=rwc", path)
    }
}

fn parse_millis(key: &str, value: Option<String>, default: Duration) -> StoResult<Duration> {
    match value {
        None => Ok(default),
        Some(raw) => u64::from_str(&raw)
            .map(Duration::from_millis)
            .map_err(|e| StoError::Config(format!("{key}={raw:?}: {e}"))),
    }
}

fn parse_bool(key: &str, value: Option<String>, default: bool) -> StoResult<bool> {
    match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(StoError::Config(format!("{key}={other:?} is not a boolean"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> StoResult<AppConfig> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(!config.browser.headless);
        assert_eq!(config.browser.sniff_timeout, Duration::from_millis(120_000));
        assert_eq!(config.browser.poll_interval, Duration::from_millis(500));
        assert_eq!(config.download.format, "best");
        assert!(config.download.download_dir.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("STO_HEADLESS", "yes"),
            ("STO_SNIFF_TIMEOUT_MS", "3000"),
            ("STO_POLL_INTERVAL_MS", "100"),
            ("STO_DOWNLOAD_DIR", "/tmp/videos"),
            ("STO_FORMAT", "bestvideo+bestaudio"),
            ("STO_CHROME_PATH", "  "),
        ])
        .unwrap();
        assert!(config.browser.headless);
        assert_eq!(config.browser.sniff_timeout, Duration::from_millis(3000));
        assert_eq!(config.download.download_dir, Some(PathBuf::from("/tmp/videos")));
        assert_eq!(config.download.format, "bestvideo+bestaudio");
        // Blank values fall back to defaults
        assert!(config.browser.chrome_path.is_none());
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(config_from(&[("STO_NAV_TIMEOUT_MS", "soon")]), Err(StoError::Config(_))));
        assert!(matches!(config_from(&[("STO_HEADLESS", "maybe")]), Err(StoError::Config(_))));
        assert!(matches!(config_from(&[("STO_POLL_INTERVAL_MS", "0")]), Err(StoError::Config(_))));
        assert!(matches!(
            config_from(&[("STO_POLL_INTERVAL_MS", "5000"), ("STO_SNIFF_TIMEOUT_MS", "1000")]),
            Err(StoError::Config(_))
        ));
    }

    #[test]
    fn test_database_url() {
        let config = config_from(&[("STO_DATABASE_PATH", "/var/lib/sto/sto.db")]).unwrap();
        assert_eq!(config.database_url(), "sqlite:///var/lib/sto/sto.db?mode=rwc");
    }
}
