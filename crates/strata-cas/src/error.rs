//! Error types for chunking and compression.

/// Errors that can occur during chunking or dictionary compression.
#[derive(Debug, thiserror::Error)]
pub enum CasError {
    /// An I/O error occurred while reading input.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The configured average block size is below the FastCDC minimum.
    #[error("block size {0} is too small (minimum 1024)")]
    BlockSizeTooSmall(u32),

    /// Compressing a block failed.
    #[error("compression failed: {0}")]
    Compress(#[source] std::io::Error),

    /// Decompressing a block failed.
    ///
    /// Also raised when a frame was produced with a different dictionary:
    /// zstd embeds the dictionary id in the frame header and refuses to
    /// decode against a mismatched dictionary.
    #[error("decompression failed: {0}")]
    Decompress(#[source] std::io::Error),
}
