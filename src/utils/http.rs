// src/utils/http.rs

//! HTTP fetch client with bounded retries.

use std::time::Duration;

use crate::error::Result;
use crate::models::FetchConfig;

/// HTTP client shared by every importer in a run.
///
/// Every request carries the configured identification User-Agent. A fetch
/// is retried with identical parameters up to the configured bound, with no
/// backoff between attempts; exhausting the bound is a per-URL event
/// reported as `None`, never an error. Callers record the URL in their own
/// failure list and move on.
#[derive(Debug, Clone)]
pub struct FetchClient {
    client: reqwest::Client,
    retries: u32,
    request_delay: Duration,
}

impl FetchClient {
    /// Build a client from the fetch configuration.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            retries: config.retries.max(1),
            request_delay: Duration::from_millis(config.request_delay_ms),
        })
    }

    /// Fetch a URL and return the response body.
    ///
    /// Returns `None` after the retry bound is exhausted; the last error is
    /// logged so operators can trace flaky pages.
    pub async fn get_text(&self, url: &str) -> Option<String> {
        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }

        let mut last_error = String::new();

        for _ in 0..self.retries {
            match self.client.get(url).send().await {
                Ok(response) => match response.error_for_status() {
                    Ok(response) => match response.text().await {
                        Ok(body) => return Some(body),
                        Err(e) => last_error = e.to_string(),
                    },
                    Err(e) => last_error = e.to_string(),
                },
                Err(e) => last_error = e.to_string(),
            }
        }

        log::warn!(
            "Unable to get {url}, giving up after {} attempts: {last_error}",
            self.retries
        );
        None
    }
}
