//! The Strata patch engine.
//!
//! `create` side: walk a source tree ([`scan_tree`]), pack blocks into
//! bundles ([`pack_bundles`]), and emit a complete patch-data directory
//! ([`create_patch`]). `apply` side: reconstruct an installation from a
//! changelog ([`apply_patch`]), reusing local bytes and fetching only what
//! is missing. [`diff`] reports what changed between two changelogs and
//! [`validate_install`] checks an installation without mutating it.

mod apply;
mod builder;
mod create;
mod diff;
mod error;
mod packer;
mod progress;
mod validate;

pub use apply::{apply_patch, clean_temp_files, ApplyOptions, ApplyReport, FETCH_CONCURRENCY};
pub use builder::{scan_tree, TreeScan};
pub use create::{create_patch, CreateOptions, CreateOutcome};
pub use diff::{diff, Diff};
pub use error::PatchError;
pub use packer::{pack_bundles, PackedBundle, Packing, BUNDLE_SIZE_CAP};
pub use progress::{NullProgress, ProgressSink};
pub use validate::{validate_install, ValidationReport};

/// Worker-pool width for CPU-bound fan-out (chunking, hashing).
pub(crate) fn cpu_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
