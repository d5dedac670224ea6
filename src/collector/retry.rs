use crate::config::ResolvedConfig;
use crate::errors::AppError;

/// Extracts the HTTP status code from an error message of the form `"HTTP 503: ..."`.
fn extract_status_code(msg: &str) -> Option<u16> {
    let prefix = "HTTP ";
    let start = msg.find(prefix)? + prefix.len();
    let end = msg[start..].find(':').unwrap_or(msg[start..].len());
    msg[start..start + end].trim().parse().ok()
}

/// Determines if an error should trigger another attempt.
///
/// Network errors, timeouts and 5xx responses are retried. 4xx responses and
/// local errors are not.
pub(crate) fn should_retry(error: &AppError) -> bool {
    match error {
        AppError::NetworkError(msg) => match extract_status_code(msg) {
            Some(status_code) => status_code >= 500,
            None => true,
        },
        AppError::ParseError(_)
        | AppError::UrlError(_)
        | AppError::RegexError(_)
        | AppError::SelectorError(_)
        | AppError::DateError(_)
        | AppError::InvalidInput(_)
        | AppError::IoError(_)
        | AppError::ExportError(_) => false,
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 10000,
        }
    }
}

impl From<&ResolvedConfig> for RetryConfig {
    fn from(config: &ResolvedConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay_ms: config.retry_initial_delay_ms,
            max_delay_ms: config.retry_max_delay_ms,
        }
    }
}

impl RetryConfig {
    /// Total number of requests per URL.
    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }
}

/// Calculates exponential backoff delay in milliseconds.
///
/// Formula: `min(initial_delay * 2^attempt, max_delay)`
pub(crate) fn calculate_backoff(attempt: u32, config: &RetryConfig) -> u64 {
    let factor = 2_u64.checked_pow(attempt).unwrap_or(u64::MAX);
    config
        .initial_delay_ms
        .saturating_mul(factor)
        .min(config.max_delay_ms)
}
