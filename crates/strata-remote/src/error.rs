//! Error types for remote operations.

/// Errors from patch-data sources and the object store.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// The request failed at the transport level (connect, TLS, timeout).
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("{url} returned status {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// The requested object does not exist.
    #[error("object not found: {url}")]
    NotFound {
        /// Requested URL or path.
        url: String,
    },

    /// An I/O error from a local patch-data directory.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The changelog document could not be parsed.
    #[error("malformed changelog: {0}")]
    Json(#[from] serde_json::Error),

    /// An object-store XML response could not be parsed.
    #[error("malformed object-store response: {0}")]
    Xml(#[from] quick_xml::DeError),

    /// A required environment variable is not set.
    #[error("missing credential: {0} is not set")]
    MissingCredential(&'static str),

    /// The patch-data location string is unusable.
    #[error("invalid patch-data location: {0}")]
    BadLocation(String),
}

impl RemoteError {
    /// Whether retrying the same request can plausibly succeed.
    ///
    /// Server errors, connect failures, and timeouts are transient;
    /// 4xx responses and local errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            RemoteError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
