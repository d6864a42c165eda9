/// Sniffing the HLS manifest request a player page makes.
///
/// The page is opened with a request listener attached; the first request whose URL
/// contains `.m3u8` is kept and the page load is stopped. A poll loop waits for that
/// request up to the configured timeout.
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::network::{EnableParams, EventRequestWillBeSent};
use futures::StreamExt;
use tracing::{debug, info, warn};

use sto_shared::config::BrowserSettings;
use sto_shared::errors::SniffError;

use crate::browser::BrowserSession;

pub fn is_manifest_url(url: &str) -> bool {
    url.contains(".m3u8")
}

#[derive(Debug, Default)]
struct CollectorState {
    links: Vec<String>,
    found: bool,
}

/// Keeps the first manifest URL seen. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct ManifestCollector {
    state: Arc<Mutex<CollectorState>>,
}

impl ManifestCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a request URL. Returns true only for the first manifest URL.
    pub fn offer(&self, url: &str) -> bool {
        if !is_manifest_url(url) {
            return false;
        }
        let Ok(mut state) = self.state.lock() else {
            return false;
        };
        if state.found {
            return false;
        }
        state.found = true;
        state.links.push(url.to_string());
        true
    }

    pub fn is_found(&self) -> bool {
        self.state.lock().map(|s| s.found).unwrap_or(false)
    }

    pub fn links(&self) -> Vec<String> {
        self.state.lock().map(|s| s.links.clone()).unwrap_or_default()
    }
}

/// Poll `collector` every `interval` until it has a link or `max_wait` has been waited.
pub async fn wait_for_manifest(collector: &ManifestCollector, max_wait: Duration, interval: Duration) -> bool {
    let mut waited = Duration::ZERO;
    while waited < max_wait && !collector.is_found() {
        tokio::time::sleep(interval).await;
        waited += interval;
    }
    collector.is_found()
}

/// Open `iframe_url` in a fresh browser and return the manifest URL it requests, if any.
pub async fn find_manifest_links(settings: &BrowserSettings, iframe_url: &str) -> Result<Vec<String>, SniffError> {
    let session = BrowserSession::launch(settings).await?;
    let result = sniff(&session, settings, iframe_url).await;
    session.close().await;
    result
}

async fn sniff(
    session: &BrowserSession,
    settings: &BrowserSettings,
    iframe_url: &str,
) -> Result<Vec<String>, SniffError> {
    let page = session.new_page("about:blank").await?;
    page.execute(EnableParams::default())
        .await
        .map_err(|e| SniffError::Protocol(e.to_string()))?;

    // Subscribe before navigating so the very first requests are seen
    let mut requests = page
        .event_listener::<EventRequestWillBeSent>()
        .await
        .map_err(|e| SniffError::Protocol(e.to_string()))?;

    let collector = ManifestCollector::new();

    let listener = {
        let collector = collector.clone();
        let page = page.clone();
        tokio::spawn(async move {
            while let Some(event) = requests.next().await {
                let url = &event.request.url;
                if collector.offer(url) {
                    info!("Manifest request: {}", url);
                    if let Err(e) = page.evaluate("window.stop()").await {
                        debug!("window.stop() failed: {}", e);
                    }
                }
            }
        })
    };

    // Player pages rarely finish loading; navigate in the background
    let navigation = {
        let page = page.clone();
        let url = iframe_url.to_string();
        tokio::spawn(async move {
            if let Err(e) = page.goto(url).await {
                debug!("Navigation to player page ended: {}", e);
            }
        })
    };

    let found = wait_for_manifest(&collector, settings.sniff_timeout, settings.poll_interval).await;
    navigation.abort();
    listener.abort();

    if !found {
        warn!("No manifest request within {:?} for {}", settings.sniff_timeout, iframe_url);
    }
    Ok(collector.links())
}
