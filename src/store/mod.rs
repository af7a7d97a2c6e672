//! HTTP client for the hosted row store.
//!
//! The store exposes a PostgREST-style row interface: one endpoint per
//! logical table, equality/range filters as query parameters, and
//! offset-based pagination with a single-page row ceiling the client cannot
//! control. Fetchers in [`tables`] paginate defensively past that ceiling.
//!
//! Transport policy: bounded retry with exponential backoff and jitter on
//! 429/408/5xx and transport-level timeouts, honoring Retry-After when the
//! store sends one.

pub mod tables;

use std::time::Duration;

use serde::de::DeserializeOwned;
use url::Url;

use crate::config::Config;

// ============================================================================
// Error type
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Store error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Invalid store URL: {0}")]
    InvalidBaseUrl(String),
    #[error("Row decode failed for {table}: {source}")]
    Decode {
        table: String,
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Network-ish failures are worth a manual retry; configuration and
    /// decode failures are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Api { status, .. } => {
                *status == 429 || *status == 408 || (500..600).contains(status)
            }
            Self::InvalidBaseUrl(_) | Self::Decode { .. } => false,
        }
    }
}

// ============================================================================
// Retry policy
// ============================================================================

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 250,
            max_backoff_ms: 2_000,
        }
    }
}

fn status_is_retryable(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status == reqwest::StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

fn retry_delay(
    attempt: u32,
    policy: &RetryPolicy,
    retry_after: Option<&reqwest::header::HeaderValue>,
) -> Duration {
    if let Some(value) = retry_after.and_then(|v| v.to_str().ok()) {
        if let Ok(secs) = value.parse::<u64>() {
            return Duration::from_secs(secs.min(30));
        }
    }

    let exponent = 2u64.saturating_pow(attempt.saturating_sub(1));
    let base = policy
        .initial_backoff_ms
        .saturating_mul(exponent)
        .min(policy.max_backoff_ms);
    let jitter = (std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0))
        % 150;
    Duration::from_millis(base.saturating_add(jitter))
}

async fn send_with_retry(
    request: reqwest::RequestBuilder,
    policy: &RetryPolicy,
) -> Result<reqwest::Response, StoreError> {
    let attempts = policy.max_attempts.max(1);
    for attempt in 1..=attempts {
        let Some(cloned) = request.try_clone() else {
            return request.send().await.map_err(StoreError::Http);
        };

        match cloned.send().await {
            Ok(response) => {
                let status = response.status();
                if status_is_retryable(status) && attempt < attempts {
                    let delay = retry_delay(
                        attempt,
                        policy,
                        response.headers().get(reqwest::header::RETRY_AFTER),
                    );
                    log::warn!(
                        "store retry {}/{} after status {} (sleep {:?})",
                        attempt,
                        attempts,
                        status,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return Ok(response);
            }
            Err(err) => {
                let retryable_transport = err.is_timeout() || err.is_connect();
                if retryable_transport && attempt < attempts {
                    let delay = retry_delay(attempt, policy, None);
                    log::warn!(
                        "store retry {}/{} after transport error: {} (sleep {:?})",
                        attempt,
                        attempts,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return Err(StoreError::Http(err));
            }
        }
    }

    Err(StoreError::Api {
        status: 0,
        message: "request exhausted retries".to_string(),
    })
}

// ============================================================================
// Client
// ============================================================================

/// Read-only client for the row store. Cheap to clone; the underlying
/// reqwest client is shared.
#[derive(Debug, Clone)]
pub struct StoreClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
    page_size: usize,
    retry: RetryPolicy,
}

impl StoreClient {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        page_size: usize,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let base_url =
            Url::parse(base_url).map_err(|e| StoreError::InvalidBaseUrl(format!("{}: {}", base_url, e)))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(StoreError::Http)?;
        Ok(Self {
            http,
            base_url,
            api_key: api_key.into(),
            page_size: page_size.max(1),
            retry: RetryPolicy::default(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, StoreError> {
        Self::new(
            &config.store_url,
            config.store_api_key.clone(),
            config.page_size,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    fn table_url(&self, table: &str) -> Result<Url, StoreError> {
        self.base_url
            .join(&format!("rest/v1/{}", table))
            .map_err(|e| StoreError::InvalidBaseUrl(e.to_string()))
    }

    /// Fetch every row of `table` matching `filters`, paginating until a
    /// page comes back shorter than the page size.
    ///
    /// A missing table (404) is an empty result, not an error — optional
    /// sources like forecast overrides may simply not be wired yet.
    pub async fn fetch_all_rows<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(String, String)],
    ) -> Result<Vec<T>, StoreError> {
        let url = self.table_url(table)?;
        let mut rows: Vec<T> = Vec::new();
        let mut offset = 0usize;

        loop {
            let mut request = self
                .http
                .get(url.clone())
                .header("apikey", &self.api_key)
                .bearer_auth(&self.api_key)
                .query(&[("select", "*")])
                .query(&[("offset", offset.to_string()), ("limit", self.page_size.to_string())]);
            for (name, value) in filters {
                request = request.query(&[(name.as_str(), value.as_str())]);
            }

            let resp = send_with_retry(request, &self.retry).await?;
            let status = resp.status();

            if status == reqwest::StatusCode::NOT_FOUND {
                log::debug!("table {} not available, treating as empty", table);
                return Ok(Vec::new());
            }
            if !status.is_success() {
                let message = resp.text().await.unwrap_or_default();
                return Err(StoreError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let body = resp.text().await.map_err(StoreError::Http)?;
            let page: Vec<T> = serde_json::from_str(&body).map_err(|source| StoreError::Decode {
                table: table.to_string(),
                source,
            })?;

            let page_len = page.len();
            rows.extend(page);
            if page_len < self.page_size {
                break;
            }
            offset += self.page_size;
        }

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        for status in [429u16, 408, 500, 502, 503] {
            assert!(
                StoreError::Api {
                    status,
                    message: String::new()
                }
                .is_retryable(),
                "{} should be retryable",
                status
            );
        }
        for status in [400u16, 401, 403, 404, 422] {
            assert!(
                !StoreError::Api {
                    status,
                    message: String::new()
                }
                .is_retryable(),
                "{} should not be retryable",
                status
            );
        }
    }

    #[test]
    fn retry_delay_honors_retry_after_with_cap() {
        let policy = RetryPolicy::default();
        let header = reqwest::header::HeaderValue::from_static("3");
        assert_eq!(retry_delay(1, &policy, Some(&header)), Duration::from_secs(3));

        let huge = reqwest::header::HeaderValue::from_static("86400");
        assert_eq!(retry_delay(1, &policy, Some(&huge)), Duration::from_secs(30));
    }

    #[test]
    fn retry_delay_backs_off_exponentially_up_to_the_cap() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff_ms: 100,
            max_backoff_ms: 1_000,
        };
        let d1 = retry_delay(1, &policy, None);
        let d2 = retry_delay(2, &policy, None);
        let d4 = retry_delay(4, &policy, None);
        assert!(d1 >= Duration::from_millis(100) && d1 < Duration::from_millis(300));
        assert!(d2 >= Duration::from_millis(200) && d2 < Duration::from_millis(400));
        // Capped at max_backoff_ms (+ jitter).
        assert!(d4 >= Duration::from_millis(800) && d4 < Duration::from_millis(1_200));
    }

    #[test]
    fn invalid_base_url_is_rejected_up_front() {
        let err = StoreClient::new("not a url", "k", 100, Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, StoreError::InvalidBaseUrl(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn table_url_joins_under_rest_prefix() {
        let client =
            StoreClient::new("https://rows.example.com/", "k", 100, Duration::from_secs(5)).unwrap();
        let url = client.table_url("replies").unwrap();
        assert_eq!(url.as_str(), "https://rows.example.com/rest/v1/replies");
    }
}
