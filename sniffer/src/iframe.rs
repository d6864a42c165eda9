/// Extracting the player iframe URL from an episode page.
use std::time::Duration;

use chromiumoxide::element::Element;
use chromiumoxide::Page;
use tokio::time::Instant;
use tracing::{debug, info};
use url::Url;

use sto_shared::config::BrowserSettings;
use sto_shared::errors::SniffError;

use crate::browser::BrowserSession;

const ELEMENT_POLL: Duration = Duration::from_millis(250);

/// Open `page_url` in a fresh browser and return the absolute `src` of its first iframe.
pub async fn extract_iframe_url(settings: &BrowserSettings, page_url: &str) -> Result<String, SniffError> {
    let session = BrowserSession::launch(settings).await?;
    let result = locate_iframe(&session, settings, page_url).await;
    session.close().await;
    result
}

async fn locate_iframe(
    session: &BrowserSession,
    settings: &BrowserSettings,
    page_url: &str,
) -> Result<String, SniffError> {
    let page = session.new_page("about:blank").await?;

    info!("Navigating to {}", page_url);
    tokio::time::timeout(settings.nav_timeout, page.goto(page_url))
        .await
        .map_err(|_| SniffError::Timeout(millis(settings.nav_timeout), "page navigation"))?
        .map_err(|e| SniffError::Navigation(e.to_string()))?;

    let iframe = wait_for_element(&page, "iframe", settings.iframe_timeout).await?;
    let src = iframe
        .attribute("src")
        .await
        .map_err(|e| SniffError::Protocol(e.to_string()))?
        .filter(|s| !s.trim().is_empty())
        .ok_or(SniffError::IframeNotFound)?;

    // Relative sources resolve against where the page ended up, not where it started
    let base = page
        .url()
        .await
        .map_err(|e| SniffError::Protocol(e.to_string()))?
        .unwrap_or_else(|| page_url.to_string());

    let resolved = resolve_iframe_src(&base, &src)?;
    debug!("iframe src {:?} resolved to {}", src, resolved);
    Ok(resolved)
}

/// Poll until `selector` matches an element or `timeout` runs out.
async fn wait_for_element(page: &Page, selector: &str, timeout: Duration) -> Result<Element, SniffError> {
    let start = Instant::now();
    loop {
        match page.find_element(selector).await {
            Ok(element) => return Ok(element),
            Err(e) if start.elapsed() >= timeout => {
                debug!("Giving up on {:?}: {}", selector, e);
                return Err(SniffError::Timeout(millis(timeout), "iframe element"));
            }
            Err(_) => tokio::time::sleep(ELEMENT_POLL).await,
        }
    }
}

/// Join an iframe `src` onto the page URL the way a browser would.
pub fn resolve_iframe_src(base: &str, src: &str) -> Result<String, SniffError> {
    let base = Url::parse(base).map_err(|e| SniffError::InvalidUrl(format!("{base}: {e}")))?;
    base.join(src.trim())
        .map(String::from)
        .map_err(|e| SniffError::InvalidUrl(format!("{src}: {e}")))
}

fn millis(d: Duration) -> u64 {
    d.as_millis().try_into().unwrap_or(u64::MAX)
}
