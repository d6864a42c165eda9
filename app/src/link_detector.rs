/// Classification of what the user typed into the URL field.
///
/// Decides whether the browser has to run at all: a manifest URL goes straight into the
/// download list, anything else that looks like a web page is sniffed.
use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectedLink {
    /// Direct HLS manifest.
    Manifest { url: String },
    /// s.to / serienstream.to series page, optionally down to one episode.
    Episode {
        url: String,
        series: String,
        season: Option<u32>,
        episode: Option<u32>,
    },
    /// Any other web page.
    Other { url: String },
    /// Not a URL.
    Invalid,
}

impl DetectedLink {
    pub fn url(&self) -> Option<&str> {
        match self {
            DetectedLink::Manifest { url }
            | DetectedLink::Episode { url, .. }
            | DetectedLink::Other { url } => Some(url),
            DetectedLink::Invalid => None,
        }
    }

    /// Whether a browser is needed to find the manifest.
    pub fn needs_browser(&self) -> bool {
        matches!(self, DetectedLink::Episode { .. } | DetectedLink::Other { .. })
    }

    /// Short label for logs.
    pub fn describe(&self) -> String {
        match self {
            DetectedLink::Manifest { .. } => "direct manifest".to_string(),
            DetectedLink::Episode {
                series,
                season: Some(s),
                episode: Some(e),
                ..
            } => format!("{series} S{s:02}E{e:02}"),
            DetectedLink::Episode {
                series,
                season: Some(s),
                ..
            } => format!("{series} season {s}"),
            DetectedLink::Episode { series, .. } => series.clone(),
            DetectedLink::Other { .. } => "web page".to_string(),
            DetectedLink::Invalid => "invalid".to_string(),
        }
    }
}

static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^https?://[^\s/]+\S*$").unwrap());

static EPISODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^https?://(?:www\.)?(?:s\.to|serienstream\.to)/serie/stream/([^/\s?#]+)(?:/staffel-(\d+)(?:/episode-(\d+))?)?/?(?:[?#]\S*)?$",
    )
    .unwrap()
});

pub fn detect_link(input: &str) -> DetectedLink {
    let url = input.trim();
    if !URL_RE.is_match(url) {
        return DetectedLink::Invalid;
    }
    if url.contains(".m3u8") {
        return DetectedLink::Manifest { url: url.to_string() };
    }
    if let Some(caps) = EPISODE_RE.captures(url) {
        return DetectedLink::Episode {
            url: url.to_string(),
            series: caps[1].to_string(),
            season: caps.get(2).and_then(|m| m.as_str().parse().ok()),
            episode: caps.get(3).and_then(|m| m.as_str().parse().ok()),
        };
    }
    DetectedLink::Other { url: url.to_string() }
}
