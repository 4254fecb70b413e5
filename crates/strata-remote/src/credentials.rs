//! Environment-driven object-store credentials.
//!
//! Credentials are injected into the [`ObjectStore`](crate::ObjectStore)
//! as an explicit value — nothing in this crate reads the environment
//! except [`Credentials::from_env`], which the CLI calls once. Missing
//! credentials disable `upload` but never block local operations.

use std::collections::HashMap;

use crate::error::RemoteError;

/// Access key id for the object store.
pub const ENV_ACCESS_KEY_ID: &str = "STRATA_ACCESS_KEY_ID";
/// Secret access key for the object store.
pub const ENV_SECRET_ACCESS_KEY: &str = "STRATA_SECRET_ACCESS_KEY";
/// S3-compatible endpoint, e.g. `https://s3.eu-west-1.example.com`.
pub const ENV_ENDPOINT: &str = "STRATA_S3_ENDPOINT";
/// Signing region. Optional; defaults to `us-east-1`.
pub const ENV_REGION: &str = "STRATA_S3_REGION";
/// Target bucket.
pub const ENV_BUCKET: &str = "STRATA_S3_BUCKET";
/// CDN purge endpoint for the changelog. Optional.
pub const ENV_CDN_PURGE_URL: &str = "STRATA_CDN_PURGE_URL";

/// Everything needed to sign and route object-store requests.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Access key id (SigV4 `Credential` scope).
    pub access_key_id: String,
    /// Secret access key (SigV4 signing key input).
    pub secret_access_key: String,
    /// Endpoint base URL without a trailing slash.
    pub endpoint: String,
    /// Signing region.
    pub region: String,
    /// Bucket name, addressed path-style (`{endpoint}/{bucket}/{key}`).
    pub bucket: String,
    /// Optional CDN purge endpoint.
    pub cdn_purge_url: Option<String>,
}

impl Credentials {
    /// Read credentials from the process environment.
    pub fn from_env() -> Result<Self, RemoteError> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_map(&vars)
    }

    /// Build credentials from a name → value map (separated out so tests
    /// never mutate the process environment).
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, RemoteError> {
        let required = |name: &'static str| -> Result<String, RemoteError> {
            vars.get(name)
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or(RemoteError::MissingCredential(name))
        };

        Ok(Self {
            access_key_id: required(ENV_ACCESS_KEY_ID)?,
            secret_access_key: required(ENV_SECRET_ACCESS_KEY)?,
            endpoint: required(ENV_ENDPOINT)?.trim_end_matches('/').to_string(),
            region: vars
                .get(ENV_REGION)
                .filter(|v| !v.is_empty())
                .cloned()
                .unwrap_or_else(|| "us-east-1".to_string()),
            bucket: required(ENV_BUCKET)?,
            cdn_purge_url: vars.get(ENV_CDN_PURGE_URL).filter(|v| !v.is_empty()).cloned(),
        })
    }
}
