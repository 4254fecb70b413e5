//! Remote collaborators for Strata: patch-data sources, the retrying HTTP
//! fetcher, and the S3-compatible object-store client used by `upload`.
//!
//! Everything network-shaped lives here so the engine crate stays free of
//! HTTP details — it consumes a [`PatchSource`] and never sees a URL.

mod credentials;
mod error;
mod fetcher;
mod object_store;
mod sign;
mod source;

pub use credentials::{
    Credentials, ENV_ACCESS_KEY_ID, ENV_BUCKET, ENV_CDN_PURGE_URL, ENV_ENDPOINT, ENV_REGION,
    ENV_SECRET_ACCESS_KEY,
};
pub use error::RemoteError;
pub use fetcher::{Fetcher, DEFAULT_HTTP_TIMEOUT, FETCH_ATTEMPTS, RETRY_BASE_DELAY};
pub use object_store::ObjectStore;
pub use source::PatchSource;
