//! S3-compatible object-store client for uploading patch data.
//!
//! Path-style addressing (`{endpoint}/{bucket}/{key}`), SigV4-signed
//! requests, and a `purge_cache` hook for the CDN fronting the bucket.
//! All objects except `changelog.json` are content-addressed and
//! immutable, so purging the changelog is the only cache invalidation a
//! release ever needs.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::Deserialize;
use tracing::{debug, info};

use crate::credentials::Credentials;
use crate::error::RemoteError;
use crate::fetcher::Fetcher;
use crate::sign;

// -----------------------------------------------------------------------
// ListObjectsV2 response body
// -----------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename = "ListBucketResult")]
struct ListBucketResult {
    #[serde(rename = "Contents", default)]
    contents: Vec<Contents>,
    #[serde(rename = "NextContinuationToken")]
    next_continuation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Contents {
    #[serde(rename = "Key")]
    key: String,
}

/// Client for one bucket on an S3-compatible store.
pub struct ObjectStore {
    creds: Credentials,
    fetcher: Fetcher,
    host: String,
}

impl ObjectStore {
    /// Build a client from credentials.
    pub fn new(creds: Credentials) -> Result<Self, RemoteError> {
        let host = creds
            .endpoint
            .strip_prefix("https://")
            .or_else(|| creds.endpoint.strip_prefix("http://"))
            .ok_or_else(|| RemoteError::BadLocation(creds.endpoint.clone()))?
            .to_string();

        Ok(Self {
            creds,
            fetcher: Fetcher::new()?,
            host,
        })
    }

    fn url(&self, key: &str, query: &str) -> String {
        let base = format!("{}/{}/{key}", self.creds.endpoint, self.creds.bucket);
        if query.is_empty() {
            base
        } else {
            format!("{base}?{query}")
        }
    }

    fn path(&self, key: &str) -> String {
        format!("/{}/{key}", self.creds.bucket)
    }

    /// Send one signed request and return the response.
    async fn send(
        &self,
        method: reqwest::Method,
        key: &str,
        query: &str,
        body: Bytes,
    ) -> Result<reqwest::Response, RemoteError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let signature = sign::sign(
            method.as_str(),
            &self.host,
            &self.path(key),
            query,
            &body,
            now,
            &self.creds.access_key_id,
            &self.creds.secret_access_key,
            &self.creds.region,
        );

        let url = self.url(key, query);
        let response = self
            .fetcher
            .client()
            .request(method, &url)
            .header("authorization", &signature.authorization)
            .header("x-amz-date", &signature.amz_date)
            .header("x-amz-content-sha256", &signature.content_sha256)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound { url });
        }
        if !status.is_success() {
            return Err(RemoteError::Status {
                url,
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    /// Upload one object.
    pub async fn put(&self, key: &str, body: Bytes) -> Result<(), RemoteError> {
        debug!(key, size = body.len(), "object store put");
        self.send(reqwest::Method::PUT, key, "", body).await?;
        Ok(())
    }

    /// Download one object.
    pub async fn get(&self, key: &str) -> Result<Bytes, RemoteError> {
        let response = self.send(reqwest::Method::GET, key, "", Bytes::new()).await?;
        Ok(response.bytes().await?)
    }

    /// Delete one object.
    pub async fn delete(&self, key: &str) -> Result<(), RemoteError> {
        match self.send(reqwest::Method::DELETE, key, "", Bytes::new()).await {
            Ok(_) | Err(RemoteError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// List object keys under a prefix (ListObjectsV2, following
    /// continuation tokens).
    pub async fn list(&self, prefix: &str) -> Result<Vec<String>, RemoteError> {
        let mut keys = Vec::new();
        let mut token: Option<String> = None;

        loop {
            // Canonical query string: keys sorted lexicographically.
            let query = match &token {
                Some(t) => format!(
                    "continuation-token={}&list-type=2&prefix={}",
                    url_encode(t),
                    url_encode(prefix)
                ),
                None => format!("list-type=2&prefix={}", url_encode(prefix)),
            };

            let response = self
                .send(reqwest::Method::GET, "", &query, Bytes::new())
                .await?;
            let xml = response.text().await?;
            let result: ListBucketResult = quick_xml::de::from_str(&xml)?;

            keys.extend(result.contents.into_iter().map(|c| c.key));

            match result.next_continuation_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        debug!(prefix, count = keys.len(), "listed objects");
        Ok(keys)
    }

    /// Purge the CDN cache entry for `path`.
    ///
    /// No-op when no purge endpoint is configured — a bucket served
    /// directly has no cache to invalidate.
    pub async fn purge_cache(&self, path: &str) -> Result<(), RemoteError> {
        let Some(purge_url) = &self.creds.cdn_purge_url else {
            debug!(path, "no CDN purge endpoint configured, skipping");
            return Ok(());
        };

        let response = self
            .fetcher
            .client()
            .post(purge_url)
            .json(&serde_json::json!({ "files": [format!("/{path}")] }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status {
                url: purge_url.clone(),
                status: status.as_u16(),
            });
        }
        info!(path, "purged CDN cache");
        Ok(())
    }
}

/// Percent-encode a query value per RFC 3986 (unreserved chars pass).
fn url_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
