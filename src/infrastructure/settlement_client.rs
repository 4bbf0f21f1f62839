use crate::config::SettlementConfig;
use crate::domain::ports::SettlementGateway;
use crate::domain::settlement::{
    SettlementError, SettlementOutcome, SettlementRequest, SettlementResponse,
};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use backoff::backoff::Backoff;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response, StatusCode, Url};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Fixed-delay backoff that gives up after `max_retries` retries.
#[derive(Debug, Clone)]
pub struct ConstantRetries {
    delay: Duration,
    max_retries: u32,
    retried: u32,
}

impl ConstantRetries {
    pub fn new(delay: Duration, max_retries: u32) -> Self {
        Self {
            delay,
            max_retries,
            retried: 0,
        }
    }
}

impl Backoff for ConstantRetries {
    fn reset(&mut self) {
        self.retried = 0;
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        if self.retried >= self.max_retries {
            return None;
        }
        self.retried += 1;
        Some(self.delay)
    }
}

#[derive(Debug, Error)]
enum AttemptError {
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("settlement authority answered 504 Gateway Timeout")]
    GatewayTimeout,
    #[error("settlement authority answered {0}")]
    Status(StatusCode),
}

/// Settlement authority client over HTTP.
///
/// Each authorization is a `POST {base_url}payments` with a snake_case JSON body.
/// Transport failures, client-side timeouts and `504` answers are retried with a
/// constant delay; once the retries are spent the call falls back to a synthesized
/// gateway timeout. Every failure ends as an unauthorized outcome.
pub struct HttpSettlementClient {
    http: Client,
    endpoint: Url,
    max_retries: u32,
    retry_delay: Duration,
}

impl HttpSettlementClient {
    pub fn new(config: &SettlementConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                PaymentError::ConfigError(format!("failed to build settlement client: {}", e))
            })?;

        Ok(Self {
            http,
            endpoint: config.payments_endpoint()?,
            max_retries: config.max_retries,
            retry_delay: config.retry_delay,
        })
    }

    async fn execute(&self, body: Vec<u8>) -> SettlementOutcome {
        let response = match self.send_with_retry(body).await {
            Ok(response) => response,
            Err(AttemptError::Status(status)) => {
                error!(%status, "Settlement authority refused the payment request");
                return SettlementOutcome::unauthorized();
            }
            Err(cause) => {
                error!(
                    error = %cause,
                    attempts = self.max_retries + 1,
                    "Settlement authority unavailable, falling back to gateway timeout"
                );
                return Self::fallback();
            }
        };

        match response.bytes().await {
            Ok(body) => Self::parse_body(&body),
            Err(e) => {
                error!(error = %e, "Failed to read settlement response body");
                SettlementOutcome::unauthorized()
            }
        }
    }

    async fn send_with_retry(&self, body: Vec<u8>) -> std::result::Result<Response, AttemptError> {
        let policy = ConstantRetries::new(self.retry_delay, self.max_retries);
        let mut retry = 0u32;
        let on_retry = |err: AttemptError, delay: Duration| {
            retry += 1;
            warn!(
                attempt = retry,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Settlement call failed, retrying"
            );
        };

        let body = &body;
        backoff::future::retry_notify(policy, move || self.attempt(body.clone()), on_retry).await
    }

    async fn attempt(
        &self,
        body: Vec<u8>,
    ) -> std::result::Result<Response, backoff::Error<AttemptError>> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| backoff::Error::transient(AttemptError::Transport(e)))?;

        let status = response.status();
        if status == StatusCode::GATEWAY_TIMEOUT {
            return Err(backoff::Error::transient(AttemptError::GatewayTimeout));
        }
        if !status.is_success() {
            return Err(backoff::Error::permanent(AttemptError::Status(status)));
        }
        debug!(%status, "Settlement authority answered");
        Ok(response)
    }

    /// The synthesized gateway timeout is never a success, so it declines.
    fn fallback() -> SettlementOutcome {
        SettlementOutcome::unauthorized()
    }

    fn parse_body(body: &[u8]) -> SettlementOutcome {
        if body.iter().all(u8::is_ascii_whitespace) {
            warn!("Settlement authority returned an empty body");
            return SettlementOutcome::unauthorized();
        }
        match serde_json::from_slice::<Option<SettlementResponse>>(body) {
            Ok(Some(response)) => response.into(),
            Ok(None) => {
                warn!("Settlement authority returned a null body");
                SettlementOutcome::unauthorized()
            }
            Err(e) => {
                error!(error = %e, "Failed to parse settlement response");
                SettlementOutcome::unauthorized()
            }
        }
    }
}

#[async_trait]
impl SettlementGateway for HttpSettlementClient {
    async fn authorize(
        &self,
        request: &SettlementRequest,
        cancel: &CancellationToken,
    ) -> std::result::Result<SettlementOutcome, SettlementError> {
        let body = serde_json::to_vec(request)?;

        if cancel.is_cancelled() {
            warn!("Settlement call cancelled before it was sent");
            return Ok(SettlementOutcome::unauthorized());
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("Settlement call cancelled while in flight");
                Ok(SettlementOutcome::unauthorized())
            }
            outcome = self.execute(body) => Ok(outcome),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_retries_stops_after_limit() {
        let mut policy = ConstantRetries::new(Duration::from_secs(3), 2);
        assert_eq!(policy.next_backoff(), Some(Duration::from_secs(3)));
        assert_eq!(policy.next_backoff(), Some(Duration::from_secs(3)));
        assert_eq!(policy.next_backoff(), None);

        policy.reset();
        assert_eq!(policy.next_backoff(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_zero_retries_never_backs_off() {
        let mut policy = ConstantRetries::new(Duration::from_millis(10), 0);
        assert_eq!(policy.next_backoff(), None);
    }

    #[test]
    fn test_parse_body_edge_cases() {
        assert_eq!(
            HttpSettlementClient::parse_body(b""),
            SettlementOutcome::unauthorized()
        );
        assert_eq!(
            HttpSettlementClient::parse_body(b"null"),
            SettlementOutcome::unauthorized()
        );
        assert_eq!(
            HttpSettlementClient::parse_body(b"<html>"),
            SettlementOutcome::unauthorized()
        );

        let outcome =
            HttpSettlementClient::parse_body(br#"{"authorized":true,"authorization_code":"abc"}"#);
        assert!(outcome.authorized);
        assert_eq!(outcome.authorization_code.as_deref(), Some("abc"));
    }
}
