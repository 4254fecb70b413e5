//! Error types for the patch engine.

use std::path::PathBuf;

use strata_types::{BlockId, BundleId, ChangelogError};

/// Errors that can occur while creating, applying, or validating a patch.
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    /// A required path does not exist or is not a directory.
    #[error("path not found: {0}")]
    MissingPath(PathBuf),

    /// The source tree produced no files.
    #[error("no files found under {0}")]
    EmptyTree(PathBuf),

    /// An I/O error occurred.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Chunking or (de)compression failed.
    #[error(transparent)]
    Cas(#[from] strata_cas::CasError),

    /// The local block store failed.
    #[error(transparent)]
    Store(#[from] strata_store::StoreError),

    /// A remote fetch failed after exhausting retries.
    #[error(transparent)]
    Remote(#[from] strata_remote::RemoteError),

    /// The changelog violates its structural invariants.
    #[error("changelog schema violation: {0}")]
    Schema(#[from] ChangelogError),

    /// The changelog could not be serialized.
    #[error("changelog serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// A decoded block does not hash to its id.
    #[error("block {block} hash mismatch (from {origin})")]
    BlockHashMismatch {
        /// The expected block id.
        block: BlockId,
        /// Where the bad bytes came from (bundle id, path, "block store").
        origin: String,
    },

    /// A bundle slot points outside the fetched bundle bytes.
    #[error("bundle {bundle} slice for block {block} is out of range")]
    BundleSlice {
        /// The bundle whose slot table is wrong.
        bundle: BundleId,
        /// The block the slot belongs to.
        block: BlockId,
    },

    /// The fetched dictionary does not hash to the changelog's id.
    #[error("dictionary hash mismatch: changelog expects {expected}")]
    DictionaryMismatch {
        /// The dictionary id the changelog references.
        expected: strata_types::DictionaryId,
    },

    /// Invalid options, rejected before any work begins.
    #[error("invalid configuration: {0}")]
    Config(String),
}
