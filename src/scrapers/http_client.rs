//! Light HTTP client with browser-like request headers.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL};
use reqwest::{Client, StatusCode};

/// User agent presented by the light client.
pub const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Thin wrapper over reqwest with listing-site-friendly defaults.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    request_delay: Duration,
}

impl HttpClient {
    /// Create a new HTTP client.
    pub fn new(timeout: Duration, request_delay: Duration) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("es-AR,es;q=0.9,en;q=0.8"),
        );
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=0"));

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .cookie_store(true)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            request_delay,
        }
    }

    /// GET a URL and return its status and body text.
    ///
    /// The configured base delay is applied after every request so batch runs
    /// stay polite regardless of caller pacing.
    pub async fn get(&self, url: &str) -> Result<(StatusCode, String), reqwest::Error> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        tokio::time::sleep(self.request_delay).await;

        Ok((status, body))
    }
}
