//! Page fetching for listing sites with anti-bot defenses.
//!
//! The light HTTP path is tried first; responses that look blocked (bad
//! status, suspiciously short body) or fail at the transport level escalate
//! to a headless browser that executes page scripts. Escalation is the only
//! retry this layer performs.

pub mod browser;
mod http_client;

#[cfg(feature = "browser")]
pub use browser::BrowserFetcher;
pub use http_client::HttpClient;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::utils::html::{strip_noise, visible_text};

/// Which client produced a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchVia {
    LightClient,
    HeadlessBrowser,
}

/// A fetched listing page, already stripped of script/style noise.
/// Transient; never persisted beyond the pipeline run.
#[derive(Debug, Clone)]
pub struct RawPage {
    pub url: String,
    /// Noise-stripped HTML.
    pub html: String,
    /// Visible text of the page, bounded in size.
    pub text: String,
    pub fetched_via: FetchVia,
    pub fetched_at: DateTime<Utc>,
}

impl RawPage {
    /// Default cap on extracted text, to bound completion prompt size.
    pub const DEFAULT_MAX_TEXT_CHARS: usize = 50_000;

    pub fn new(url: String, raw_html: &str, fetched_via: FetchVia) -> Self {
        Self::with_text_limit(url, raw_html, fetched_via, Self::DEFAULT_MAX_TEXT_CHARS)
    }

    pub fn with_text_limit(
        url: String,
        raw_html: &str,
        fetched_via: FetchVia,
        max_text_chars: usize,
    ) -> Self {
        let html = strip_noise(raw_html);
        let mut text = visible_text(&html);
        if text.chars().count() > max_text_chars {
            text = text.chars().take(max_text_chars).collect();
        }
        Self {
            url,
            html,
            text,
            fetched_via,
            fetched_at: Utc::now(),
        }
    }
}

/// Fetch configuration, constructed once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Per-request timeout for the light client, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Delay between light-client requests, in milliseconds.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    /// Bodies shorter than this are treated as blocked responses.
    #[serde(default = "default_min_content_length")]
    pub min_content_length: usize,
    /// Cap on extracted visible text.
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,
    #[serde(default)]
    pub browser: BrowserSettings,
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_request_delay_ms() -> u64 {
    500
}
fn default_min_content_length() -> usize {
    1000
}
fn default_max_text_chars() -> usize {
    RawPage::DEFAULT_MAX_TEXT_CHARS
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            request_delay_ms: default_request_delay_ms(),
            min_content_length: default_min_content_length(),
            max_text_chars: default_max_text_chars(),
            browser: BrowserSettings::default(),
        }
    }
}

/// Headless browser settings for the escalation path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSettings {
    /// Run in headless mode. Set to false for debugging.
    #[serde(default = "default_headless")]
    pub headless: bool,
    /// Page load timeout in seconds.
    #[serde(default = "default_browser_timeout")]
    pub timeout_secs: u64,
    /// Seconds to wait after load for dynamic content to settle.
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,
    /// Wait for this CSS selector before reading the page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_for_selector: Option<String>,
    /// Explicit Chrome/Chromium executable path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<String>,
}

fn default_headless() -> bool {
    true
}
fn default_browser_timeout() -> u64 {
    60
}
fn default_settle_secs() -> u64 {
    3
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            timeout_secs: default_browser_timeout(),
            settle_secs: default_settle_secs(),
            wait_for_selector: None,
            executable: None,
        }
    }
}

/// Both fetch paths failed for a URL. The URL is skipped and recorded as
/// failed; the batch continues.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("both fetch paths failed for {url}: {reason}")]
    Exhausted { url: String, reason: String },
    #[error("light fetch failed for {url} ({reason}) and browser support is not compiled in")]
    BrowserUnavailable { url: String, reason: String },
}

/// Fetches listing pages, escalating from the light client to the browser.
pub struct Fetcher {
    http: HttpClient,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Self {
        let http = HttpClient::new(
            std::time::Duration::from_secs(config.timeout_secs),
            std::time::Duration::from_millis(config.request_delay_ms),
        );
        Self { http, config }
    }

    /// Fetch a URL, returning the cleaned page or a terminal error.
    pub async fn fetch(&self, url: &str) -> Result<RawPage, FetchError> {
        let reason = match self.http.get(url).await {
            Ok((status, body)) => {
                match escalation_reason(status, body.len(), self.config.min_content_length) {
                    None => {
                        info!(url, via = "light", bytes = body.len(), "fetched");
                        return Ok(RawPage::with_text_limit(
                            url.to_string(),
                            &body,
                            FetchVia::LightClient,
                            self.config.max_text_chars,
                        ));
                    }
                    Some(reason) => reason,
                }
            }
            Err(e) => format!("transport error: {e}"),
        };

        warn!(url, %reason, "light fetch unusable, escalating to browser");
        self.fetch_with_browser(url, reason).await
    }

    #[cfg(feature = "browser")]
    async fn fetch_with_browser(&self, url: &str, light_reason: String) -> Result<RawPage, FetchError> {
        let browser = BrowserFetcher::new(self.config.browser.clone());
        match browser.fetch_html(url).await {
            Ok(html) if html.len() >= self.config.min_content_length => {
                info!(url, via = "browser", bytes = html.len(), "fetched");
                Ok(RawPage::with_text_limit(
                    url.to_string(),
                    &html,
                    FetchVia::HeadlessBrowser,
                    self.config.max_text_chars,
                ))
            }
            Ok(html) => Err(FetchError::Exhausted {
                url: url.to_string(),
                reason: format!(
                    "light: {light_reason}; browser: rendered body too short ({} bytes)",
                    html.len()
                ),
            }),
            Err(e) => Err(FetchError::Exhausted {
                url: url.to_string(),
                reason: format!("light: {light_reason}; browser: {e}"),
            }),
        }
    }

    #[cfg(not(feature = "browser"))]
    async fn fetch_with_browser(&self, url: &str, light_reason: String) -> Result<RawPage, FetchError> {
        Err(FetchError::BrowserUnavailable {
            url: url.to_string(),
            reason: light_reason,
        })
    }
}

/// Decide whether a light-client response needs browser escalation.
/// Returns the reason, or `None` when the response is usable.
pub fn escalation_reason(
    status: StatusCode,
    body_len: usize,
    min_content_length: usize,
) -> Option<String> {
    if !status.is_success() {
        return Some(format!("HTTP {status}"));
    }
    if body_len < min_content_length {
        return Some(format!(
            "body too short ({body_len} bytes < {min_content_length})"
        ));
    }
    None
}
