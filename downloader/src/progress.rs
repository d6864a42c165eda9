/// Parsing yt-dlp's machine-readable progress output.
///
/// yt-dlp is started with `--progress-template "download:sto-progress %(progress)j"`, so every
/// progress hook call prints one line: the marker followed by the hook's dict as JSON.
use serde::Deserialize;

pub const PROGRESS_MARKER: &str = "sto-progress ";

/// Progress template passed to yt-dlp.
pub fn progress_template() -> String {
    format!("download:{}%(progress)j", PROGRESS_MARKER)
}

/// The subset of yt-dlp's progress dict we use. Byte counts can be floats or null.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ProgressRecord {
    pub status: String,
    #[serde(default)]
    pub downloaded_bytes: Option<f64>,
    #[serde(default)]
    pub total_bytes: Option<f64>,
    #[serde(default)]
    pub total_bytes_estimate: Option<f64>,
}

/// What a progress record means for the progress bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressSignal {
    Percent(u8),
    Finished,
}

/// Shown while the total size is unknown.
const UNKNOWN_TOTAL_PERCENT: u8 = 50;

impl ProgressRecord {
    pub fn signal(&self) -> Option<ProgressSignal> {
        match self.status.as_str() {
            "downloading" => {
                let total = self
                    .total_bytes
                    .or(self.total_bytes_estimate)
                    .filter(|t| *t > 0.0);
                let percent = match total {
                    Some(total) => {
                        let downloaded = self.downloaded_bytes.unwrap_or(0.0).max(0.0);
                        (downloaded * 100.0 / total).floor().min(100.0) as u8
                    }
                    None => UNKNOWN_TOTAL_PERCENT,
                };
                Some(ProgressSignal::Percent(percent))
            }
            "finished" => Some(ProgressSignal::Finished),
            _ => None,
        }
    }
}

/// Parse a stdout line. Non-progress lines yield `None`.
pub fn parse_progress_line(line: &str) -> Option<ProgressRecord> {
    let json = line.trim().strip_prefix(PROGRESS_MARKER)?;
    match serde_json::from_str(json) {
        Ok(record) => Some(record),
        Err(e) => {
            let head: String = json.chars().take(200).collect();
            tracing::debug!("Unparsable progress line ({}): {}", e, head);
            None
        }
    }
}

/// Extract the message of a yt-dlp `ERROR:` line.
pub fn parse_error_line(line: &str) -> Option<String> {
    line.trim()
        .strip_prefix("ERROR:")
        .map(|msg| msg.trim().to_string())
        .filter(|msg| !msg.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(line: &str) -> Option<ProgressSignal> {
        parse_progress_line(line).and_then(|r| r.signal())
    }

    #[test]
    fn test_template() {
        assert_eq!(progress_template(), "download:sto-progress %(progress)j");
    }

    #[test]
    fn test_percent_from_total() {
        let line = r#"sto-progress {"status":"downloading","downloaded_bytes":512,"total_bytes":1024,"speed":1000.5}"#;
        assert_eq!(signal(line), Some(ProgressSignal::Percent(50)));

        let line = r#"sto-progress {"status":"downloading","downloaded_bytes":1023,"total_bytes":1024}"#;
        assert_eq!(signal(line), Some(ProgressSignal::Percent(99)));
    }

    #[test]
    fn test_percent_from_estimate() {
        let line = r#"sto-progress {"status":"downloading","downloaded_bytes":250,"total_bytes":null,"total_bytes_estimate":1000.0}"#;
        assert_eq!(signal(line), Some(ProgressSignal::Percent(25)));
    }

    #[test]
    fn test_unknown_total() {
        let line = r#"sto-progress {"status":"downloading","downloaded_bytes":250}"#;
        assert_eq!(signal(line), Some(ProgressSignal::Percent(50)));

        let line = r#"sto-progress {"status":"downloading","downloaded_bytes":250,"total_bytes":0}"#;
        assert_eq!(signal(line), Some(ProgressSignal::Percent(50)));
    }

    #[test]
    fn test_overshoot_is_clamped() {
        let line = r#"sto-progress {"status":"downloading","downloaded_bytes":3000,"total_bytes_estimate":1000}"#;
        assert_eq!(signal(line), Some(ProgressSignal::Percent(100)));
    }

    #[test]
    fn test_finished_and_other_status() {
        assert_eq!(
            signal(r#"sto-progress {"status":"finished","downloaded_bytes":1024}"#),
            Some(ProgressSignal::Finished)
        );
        assert_eq!(signal(r#"sto-progress {"status":"error"}"#), None);
    }

    #[test]
    fn test_non_progress_lines() {
        assert!(parse_progress_line("[hlsnative] Downloading m3u8 manifest").is_none());
        assert!(parse_progress_line("sto-progress {not json").is_none());
        assert!(parse_progress_line("").is_none());
    }

    #[test]
    fn test_bad_json_with_multibyte_text() {
        // 'é' spans bytes 199..201 of the JSON part
        let line = format!("sto-progress {}é trailing", "x".repeat(199));
        assert!(parse_progress_line(&line).is_none());
    }

    #[test]
    fn test_error_line() {
        assert_eq!(
            parse_error_line("ERROR: [generic] Unable to download webpage: HTTP Error 403"),
            Some("[generic] Unable to download webpage: HTTP Error 403".to_string())
        );
        assert_eq!(parse_error_line("WARNING: something"), None);
        assert_eq!(parse_error_line("ERROR:"), None);
    }
}
