/// A short-lived chromiumoxide browser with its CDP handler task.
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use sto_shared::config::BrowserSettings;
use sto_shared::errors::SniffError;

use crate::chrome::resolve_chrome;

pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    /// Launch a fresh browser process.
    pub async fn launch(settings: &BrowserSettings) -> Result<Self, SniffError> {
        let mut builder = BrowserConfig::builder().request_timeout(settings.nav_timeout);
        if !settings.headless {
            builder = builder.with_head();
        }
        if let Some(path) = resolve_chrome(settings.chrome_path.as_deref()) {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(SniffError::BrowserLaunch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| SniffError::BrowserLaunch(e.to_string()))?;

        // The handler must be polled for any CDP traffic to flow
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("chromiumoxide handler event error: {}", e);
                }
            }
            debug!("Browser handler ended");
        });

        info!("Browser launched (headless: {})", settings.headless);
        Ok(Self { browser, handler })
    }

    pub async fn new_page(&self, url: &str) -> Result<Page, SniffError> {
        self.browser
            .new_page(url)
            .await
            .map_err(|e| SniffError::Navigation(e.to_string()))
    }

    /// Close the browser and stop the handler. Never fails; problems are logged.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Failed to close browser: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            warn!("Failed to wait for browser exit: {}", e);
        }
        self.handler.abort();
        debug!("Browser closed");
    }
}
