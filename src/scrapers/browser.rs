//! Browser-based fetcher for anti-bot protected listing sites.
//!
//! Uses chromiumoxide (CDP) to render pages with JavaScript enabled, for
//! sites whose light-client responses are interstitials or empty shells.

#![allow(dead_code)]

#[cfg(feature = "browser")]
use std::path::PathBuf;
#[cfg(feature = "browser")]
use std::time::Duration;

#[cfg(feature = "browser")]
use anyhow::{Context, Result};
#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig};
#[cfg(feature = "browser")]
use futures::StreamExt;
#[cfg(feature = "browser")]
use tracing::{debug, info};

#[cfg(feature = "browser")]
use super::BrowserSettings;

/// Headless browser fetcher. One short-lived browser per fetch keeps the
/// escalation path stateless; escalations are rare enough that launch cost
/// does not matter.
#[cfg(feature = "browser")]
pub struct BrowserFetcher {
    config: BrowserSettings,
}

#[cfg(feature = "browser")]
impl BrowserFetcher {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
    ];

    pub fn new(config: BrowserSettings) -> Self {
        Self { config }
    }

    /// Locate a Chrome executable: explicit config first, then well-known
    /// install paths. `None` lets chromiumoxide run its own detection.
    fn find_chrome(&self) -> Option<PathBuf> {
        if let Some(ref path) = self.config.executable {
            return Some(PathBuf::from(path));
        }
        Self::CHROME_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
    }

    /// Render a URL in a headless browser and return the final HTML.
    pub async fn fetch_html(&self, url: &str) -> Result<String> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(1920, 1080)
            .request_timeout(Duration::from_secs(self.config.timeout_secs));
        if !self.config.headless {
            builder = builder.with_head();
        }
        if let Some(chrome) = self.find_chrome() {
            debug!("Using Chrome at: {}", chrome.display());
            builder = builder.chrome_executable(chrome);
        }
        let browser_config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("browser configuration failed: {e}"))?;

        info!(url, headless = self.config.headless, "launching browser");
        let (mut browser, mut handler) = Browser::launch(browser_config)
            .await
            .context("failed to launch browser")?;

        // Drive CDP messages in the background for the lifetime of the fetch.
        let handler_task = tokio::spawn(async move { while handler.next().await.is_some() {} });

        let result = self.render(&browser, url).await;

        let _ = browser.close().await;
        handler_task.abort();

        result
    }

    async fn render(&self, browser: &Browser, url: &str) -> Result<String> {
        let page = browser
            .new_page(url)
            .await
            .context("failed to open page")?;
        page.wait_for_navigation()
            .await
            .context("navigation did not complete")?;

        // Give client-side rendering a moment to settle.
        tokio::time::sleep(Duration::from_secs(self.config.settle_secs)).await;

        if let Some(ref selector) = self.config.wait_for_selector {
            self.wait_for_selector(&page, selector).await;
        }

        let html = page.content().await.context("failed to read page content")?;
        Ok(html)
    }

    /// Poll for a selector until it appears or the page timeout elapses.
    /// Absence is not fatal; the rendered content is used either way.
    async fn wait_for_selector(&self, page: &chromiumoxide::Page, selector: &str) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(self.config.timeout_secs);
        loop {
            if page.find_element(selector).await.is_ok() {
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                debug!(selector, "selector never appeared, using page as-is");
                return;
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }
}
