//! Browser-driven discovery of HLS manifests behind an episode page's player iframe.
//!
//! Extraction runs in two phases, each in its own short-lived browser:
//! 1. open the episode page and read the first iframe's `src`;
//! 2. open that iframe URL and record the first `.m3u8` request it makes.
pub mod browser;
pub mod chrome;
pub mod iframe;
pub mod manifest;

use std::future::Future;

use tracing::{info, warn};

use sto_shared::config::BrowserSettings;
use sto_shared::errors::SniffError;
use sto_shared::events::{AppEvent, EventSender, EventSenderExt};

pub use iframe::extract_iframe_url;
pub use manifest::{find_manifest_links, is_manifest_url};

/// Runs the full extraction sequence and reports progress as UI events.
#[derive(Debug, Clone)]
pub struct Sniffer {
    settings: BrowserSettings,
}

impl Sniffer {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }

    /// Find manifest links for an episode page.
    ///
    /// Failures end up as status text; the result is then simply empty.
    pub async fn extract(&self, url: &str, events: &EventSender) -> Vec<String> {
        let settings = &self.settings;
        run_extraction(
            url,
            events,
            |page_url| async move { extract_iframe_url(settings, &page_url).await },
            |iframe_url| async move { find_manifest_links(settings, &iframe_url).await },
        )
        .await
    }
}

/// The extraction sequence over the two browser phases.
async fn run_extraction<I, IF, M, MF>(url: &str, events: &EventSender, iframe_phase: I, manifest_phase: M) -> Vec<String>
where
    I: FnOnce(String) -> IF,
    IF: Future<Output = Result<String, SniffError>>,
    M: FnOnce(String) -> MF,
    MF: Future<Output = Result<Vec<String>, SniffError>>,
{
    events.emit(AppEvent::ExtractionBusy(true));
    events.status("🔍 Starting extraction process...");

    let iframe_url = match iframe_phase(url.to_string()).await {
        Ok(iframe_url) => iframe_url,
        Err(e) => {
            warn!("iframe extraction failed for {}: {}", url, e);
            events.status(format!("❌ Error extracting iframe: {e}"));
            events.status("❌ Could not extract iframe URL.");
            finish(url, Vec::new(), events);
            return Vec::new();
        }
    };
    info!("Found iframe URL: {}", iframe_url);
    events.status(format!("🔗 Found iframe URL: {iframe_url}"));

    let links = match manifest_phase(iframe_url.clone()).await {
        Ok(links) => links,
        Err(e) => {
            warn!("Manifest sniffing failed for {}: {}", iframe_url, e);
            events.status(format!("❌ Error searching for m3u8 links: {e}"));
            Vec::new()
        }
    };
    events.status(links_status(links.len()));

    finish(url, links.clone(), events);
    links
}

fn finish(url: &str, links: Vec<String>, events: &EventSender) {
    events.emit(AppEvent::LinksFound {
        source_url: url.to_string(),
        links,
    });
    events.emit(AppEvent::ExtractionBusy(false));
}

fn links_status(count: usize) -> String {
    if count > 0 {
        format!("✅ Found {count} m3u8 link(s).")
    } else {
        "❌ No m3u8 links found.".to_string()
    }
}
