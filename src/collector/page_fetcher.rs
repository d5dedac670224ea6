use super::retry::{calculate_backoff, should_retry, RetryConfig};
use crate::config::ResolvedConfig;
use crate::constants;
use crate::errors::{AppError, AppResult};
use reqwest::header::{self, HeaderMap, HeaderValue};
use std::time::Duration;
use tracing::{debug, warn};

/// Body and content type of a fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub body: String,
    pub content_type: String,
}

/// HTTP client shared by the feed fetcher and the portal clients.
///
/// Sends browser-like headers, applies the configured timeout and retries
/// transient failures with exponential backoff.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: reqwest::Client,
    retry: RetryConfig,
}

impl PageFetcher {
    /// Builds a fetcher from the pipeline configuration.
    pub fn new(config: &ResolvedConfig) -> AppResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_static(constants::USER_AGENT),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static(constants::ACCEPT));
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static(constants::ACCEPT_LANGUAGE),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self::with_client(client, RetryConfig::from(config)))
    }

    pub fn with_client(client: reqwest::Client, retry: RetryConfig) -> Self {
        Self { client, retry }
    }

    /// Fetches `url`, retrying network errors and 5xx responses.
    ///
    /// `max_retries` counts every request, the first one included, and at
    /// least one request is always sent.
    pub async fn fetch(&self, url: &str) -> AppResult<Page> {
        let attempts = self.retry.attempts();
        let mut last_error: Option<AppError> = None;

        for attempt in 1..=attempts {
            match self.fetch_once(url).await {
                Ok(page) => return Ok(page),
                Err(e) => {
                    if attempt < attempts && should_retry(&e) {
                        let delay_ms = calculate_backoff(attempt - 1, &self.retry);
                        warn!(
                            url = url,
                            attempt = attempt,
                            attempts = attempts,
                            delay_ms = delay_ms,
                            error = %e,
                            "Retrying request after error"
                        );
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                        last_error = Some(e);
                        continue;
                    }
                    if attempt > 1 {
                        return Err(AppError::NetworkError(format!(
                            "Request to {url} failed after {attempt} attempts: {e}"
                        )));
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            AppError::NetworkError(format!("Request to {url} failed after {attempts} attempts"))
        }))
    }

    /// Fetches `url` and returns only the body.
    pub async fn fetch_text(&self, url: &str) -> AppResult<String> {
        Ok(self.fetch(url).await?.body)
    }

    async fn fetch_once(&self, url: &str) -> AppResult<Page> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::NetworkError(format!("Failed to fetch {url}: {e}")))?;

        let status = response.status();
        let response = response.error_for_status().map_err(|e| {
            let status_code = status.as_u16();
            AppError::NetworkError(format!("HTTP {status_code}: Failed to fetch {url}: {e}"))
        })?;

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::NetworkError(format!("Failed to read body of {url}: {e}")))?;

        debug!(url = url, status = status.as_u16(), bytes = body.len(), "Fetched page");
        Ok(Page { body, content_type })
    }
}
