use crate::error::{PaymentError, Result};
use reqwest::Url;
use std::time::Duration;

pub const DEFAULT_BANK_URL: &str = "http://localhost:8080/";
pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(3);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection and resilience settings for the settlement authority.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementConfig {
    /// Base address; authorization requests go to `{base_url}payments`.
    pub base_url: Url,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Constant pause between attempts.
    pub retry_delay: Duration,
    /// Client-side timeout for a single attempt.
    pub request_timeout: Duration,
}

impl SettlementConfig {
    /// Builds a validated configuration. A malformed base URL or a zero request
    /// timeout is a startup error.
    pub fn new(
        base_url: &str,
        max_retries: u32,
        retry_delay: Duration,
        request_timeout: Duration,
    ) -> Result<Self> {
        let mut base_url = Url::parse(base_url).map_err(|e| {
            PaymentError::ConfigError(format!("invalid settlement base URL '{}': {}", base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(PaymentError::ConfigError(format!(
                "settlement base URL '{}' cannot carry a path",
                base_url
            )));
        }
        // Url::join drops the last path segment unless the base ends with a slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        if request_timeout.is_zero() {
            return Err(PaymentError::ConfigError(
                "settlement request timeout must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            base_url,
            max_retries,
            retry_delay,
            request_timeout,
        })
    }

    pub fn payments_endpoint(&self) -> Result<Url> {
        self.base_url.join("payments").map_err(|e| {
            PaymentError::ConfigError(format!("invalid settlement endpoint: {}", e))
        })
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        Self::new(
            base_url,
            DEFAULT_MAX_RETRIES,
            DEFAULT_RETRY_DELAY,
            DEFAULT_REQUEST_TIMEOUT,
        )
    }
}
