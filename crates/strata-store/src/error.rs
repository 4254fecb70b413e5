//! Error types for block storage operations.

/// Errors that can occur while reading or writing the block store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An I/O error occurred (disk full, permission denied, rename failed).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
