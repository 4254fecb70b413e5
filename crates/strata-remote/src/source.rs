//! Patch-data sources: a local staging directory or a remote base URL.
//!
//! Both expose the same layout (`changelog.json`, `dictionary`,
//! `blocks/<hh>/<id>`, `bundles/<id>`), so the apply engine addresses
//! objects by id and never cares where they come from. A previous
//! changelog passed to `create` goes through the same abstraction.

use std::path::PathBuf;

use bytes::Bytes;
use strata_types::{
    BlockId, BundleId, Changelog, BLOCKS_DIR, BUNDLES_DIR, CHANGELOG_FILE_NAME,
    DICTIONARY_FILE_NAME,
};
use tracing::debug;

use crate::error::RemoteError;
use crate::fetcher::Fetcher;

/// Where patch data lives.
#[derive(Clone)]
pub enum PatchSource {
    /// A directory on the local filesystem.
    Local(PathBuf),
    /// An HTTP(S) base URL (CDN or object-store endpoint).
    Remote {
        /// Base URL without a trailing slash.
        base: String,
        /// Shared HTTP client.
        fetcher: Fetcher,
    },
}

impl PatchSource {
    /// Interpret a location string: URLs become [`PatchSource::Remote`],
    /// anything else is a local directory path.
    pub fn new(location: &str) -> Result<Self, RemoteError> {
        if location.is_empty() {
            return Err(RemoteError::BadLocation(location.to_string()));
        }
        if location.starts_with("http://") || location.starts_with("https://") {
            Ok(PatchSource::Remote {
                base: location.trim_end_matches('/').to_string(),
                fetcher: Fetcher::new()?,
            })
        } else {
            Ok(PatchSource::Local(PathBuf::from(location)))
        }
    }

    /// Human-readable location for logs and errors.
    pub fn location(&self) -> String {
        match self {
            PatchSource::Local(dir) => dir.display().to_string(),
            PatchSource::Remote { base, .. } => base.clone(),
        }
    }

    /// True when this source is served over HTTP.
    pub fn is_remote(&self) -> bool {
        matches!(self, PatchSource::Remote { .. })
    }

    /// For a local source, the patch-data directory itself.
    pub fn local_dir(&self) -> Option<&std::path::Path> {
        match self {
            PatchSource::Local(dir) => Some(dir),
            PatchSource::Remote { .. } => None,
        }
    }

    /// For a local source, the directory holding loose blocks.
    pub fn local_blocks_dir(&self) -> Option<PathBuf> {
        match self {
            PatchSource::Local(dir) => Some(dir.join(BLOCKS_DIR)),
            PatchSource::Remote { .. } => None,
        }
    }

    /// Load and parse the changelog. Returns `Ok(None)` when the source
    /// has no changelog yet (first build, or an empty bucket).
    pub async fn load_changelog(&self) -> Result<Option<Changelog>, RemoteError> {
        let raw = match self.read(CHANGELOG_FILE_NAME, true).await {
            Ok(bytes) => bytes,
            Err(RemoteError::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        let changelog: Changelog = serde_json::from_slice(&raw)?;
        debug!(
            source = %self.location(),
            version = changelog.version,
            files = changelog.files.len(),
            "loaded changelog"
        );
        Ok(Some(changelog))
    }

    /// Load the serialized dictionary object.
    pub async fn load_dictionary(&self) -> Result<Bytes, RemoteError> {
        self.read(DICTIONARY_FILE_NAME, true).await
    }

    /// Fetch one bundle object. Single attempt — the apply engine owns the
    /// retry loop because a hash mismatch also re-fetches the bundle.
    pub async fn fetch_bundle(&self, id: &BundleId) -> Result<Bytes, RemoteError> {
        self.read(&format!("{BUNDLES_DIR}/{id}"), false).await
    }

    /// Fetch one loose block object (stored form). Single attempt.
    pub async fn fetch_block(&self, id: &BlockId) -> Result<Bytes, RemoteError> {
        self.read(&format!("{BLOCKS_DIR}/{}/{id}", id.shard_prefix()), false)
            .await
    }

    /// Read one object relative to the source root.
    ///
    /// `retry` enables the fetcher's backoff loop; used for the one-shot
    /// metadata objects that have no outer retry.
    async fn read(&self, rel: &str, retry: bool) -> Result<Bytes, RemoteError> {
        match self {
            PatchSource::Local(dir) => {
                let path = dir.join(rel);
                match tokio::fs::read(&path).await {
                    Ok(data) => Ok(Bytes::from(data)),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        Err(RemoteError::NotFound {
                            url: path.display().to_string(),
                        })
                    }
                    Err(e) => Err(RemoteError::Io(e)),
                }
            }
            PatchSource::Remote { base, fetcher } => {
                let url = format!("{base}/{rel}");
                if retry {
                    fetcher.get_with_retry(&url).await
                } else {
                    fetcher.get_once(&url).await
                }
            }
        }
    }
}
