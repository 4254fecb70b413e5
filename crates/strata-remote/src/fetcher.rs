//! HTTP fetcher with bounded retries.
//!
//! One shared [`reqwest::Client`] (connection pooling) wrapped with the
//! retry policy the apply engine relies on: transient failures back off
//! exponentially and give up after [`FETCH_ATTEMPTS`] tries.

use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::RemoteError;

/// Per-request timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Attempts per object before a transient failure becomes fatal.
pub const FETCH_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff (doubles per attempt).
pub const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);

/// Thin retrying wrapper over a shared HTTP client.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    /// Build a fetcher with the default timeout.
    pub fn new() -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }

    /// Fetch a URL once. 404 maps to [`RemoteError::NotFound`], any other
    /// non-success status to [`RemoteError::Status`].
    pub async fn get_once(&self, url: &str) -> Result<Bytes, RemoteError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(RemoteError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.bytes().await?)
    }

    /// Fetch a URL, retrying transient failures with exponential backoff.
    pub async fn get_with_retry(&self, url: &str) -> Result<Bytes, RemoteError> {
        let mut delay = RETRY_BASE_DELAY;

        for attempt in 1..=FETCH_ATTEMPTS {
            match self.get_once(url).await {
                Ok(bytes) => {
                    debug!(url, attempt, size = bytes.len(), "fetched");
                    return Ok(bytes);
                }
                Err(e) if e.is_transient() && attempt < FETCH_ATTEMPTS => {
                    warn!(url, attempt, %e, "transient fetch failure, retrying");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => return Err(e),
            }
        }
        unreachable!("retry loop always returns")
    }

    /// The underlying client, shared with the object-store signer.
    pub(crate) fn client(&self) -> &reqwest::Client {
        &self.client
    }
}
