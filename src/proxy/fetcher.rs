use crate::config::HttpClientConfig;
use crate::error::{AppError, ProxyError};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

const MAX_ERROR_BODY_CHARS: usize = 512;

/// Retry policy for outbound requests.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles each attempt.
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
            retryable_statuses: vec![429, 500, 502, 503, 504],
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Delay before retry number `attempt` (zero-based), capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let delay_ms = base_ms.saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX));
        let max_ms = self.max_delay.as_millis() as u64;
        Duration::from_millis(delay_ms.min(max_ms))
    }
}

/// Shared reqwest client with exponential-backoff retries, used by every
/// upstream integration.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    retry: RetryConfig,
}

impl HttpFetcher {
    pub fn new(config: &HttpClientConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| AppError::InternalError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            retry: RetryConfig::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, AppError> {
        let response = self
            .send_with_retry("GET", url, || self.client.get(url).query(query))
            .await?;
        Self::parse(response, url).await
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, AppError> {
        let response = self
            .send_with_retry("POST", url, || self.client.post(url).json(body))
            .await?;
        Self::parse(response, url).await
    }

    async fn send_with_retry<F>(&self, method: &str, url: &str, build: F) -> Result<Response, AppError>
    where
        F: Fn() -> RequestBuilder,
    {
        debug!("{} {}", method, url);
        let mut last_error: Option<ProxyError> = None;

        for attempt in 0..=self.retry.max_retries {
            if attempt > 0 {
                let delay = self.retry.delay_for(attempt - 1);
                warn!(
                    "Retrying {} {} (attempt {}/{}) after {:.1}s",
                    method,
                    url,
                    attempt + 1,
                    self.retry.max_retries + 1,
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
            }

            match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    let error = Self::status_error(response).await;
                    if self.retry.retryable_statuses.contains(&status.as_u16())
                        && attempt < self.retry.max_retries
                    {
                        warn!("Retryable status {} from {}", status.as_u16(), url);
                        last_error = Some(error);
                        continue;
                    }
                    return Err(error.into());
                }
                Err(e) => {
                    let retryable = e.is_timeout() || e.is_connect();
                    let error = ProxyError::RequestFailed(e.to_string());
                    if retryable && attempt < self.retry.max_retries {
                        warn!("Retryable error on {}: {}", url, error);
                        last_error = Some(error);
                        continue;
                    }
                    return Err(error.into());
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| ProxyError::RequestFailed("max retries exceeded".into()))
            .into())
    }

    async fn status_error(response: Response) -> ProxyError {
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return ProxyError::RateLimited;
        }
        let mut message = response.text().await.unwrap_or_default();
        if let Some((cut, _)) = message.char_indices().nth(MAX_ERROR_BODY_CHARS) {
            message.truncate(cut);
        }
        ProxyError::ResponseError {
            status: status.as_u16(),
            message,
        }
    }

    async fn parse<T: DeserializeOwned>(response: Response, url: &str) -> Result<T, AppError> {
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            warn!("Unparseable response from {}: {}", url, e);
            ProxyError::InvalidFormat(e.to_string()).into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_until_capped() {
        let retry = RetryConfig::default();
        assert_eq!(retry.delay_for(0), Duration::from_secs(1));
        assert_eq!(retry.delay_for(1), Duration::from_secs(2));
        assert_eq!(retry.delay_for(2), Duration::from_secs(4));
        assert_eq!(retry.delay_for(3), Duration::from_secs(8));
        assert_eq!(retry.delay_for(10), Duration::from_secs(8));
        assert_eq!(retry.delay_for(200), Duration::from_secs(8));
    }

    #[test]
    fn builder_helpers() {
        let retry = RetryConfig::default()
            .with_max_retries(1)
            .with_base_delay(Duration::from_millis(5));
        assert_eq!(retry.max_retries, 1);
        assert_eq!(retry.delay_for(1), Duration::from_millis(10));
    }
}
