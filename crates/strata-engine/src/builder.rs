//! Source-tree scanning: the first half of the changelog builder.
//!
//! Walks the tree in sorted order, chunks every regular file on a
//! blocking-pool worker per file, and collects the results into
//! deterministic maps. Bundle assignment happens afterwards in the
//! packer; together they produce the complete changelog.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use strata_cas::Chunker;
use strata_types::BlockId;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::PatchError;
use crate::progress::ProgressSink;

/// Everything learned from chunking one source tree.
#[derive(Debug)]
pub struct TreeScan {
    /// Relative path (forward slashes) → ordered block ids.
    pub files: BTreeMap<String, Vec<BlockId>>,
    /// Unique uncompressed block payloads.
    pub blocks: BTreeMap<BlockId, Bytes>,
    /// Sum of all file sizes.
    pub total_uncompressed_bytes: u64,
}

/// Chunk every regular file under `root`.
///
/// Symlinks, devices, and sockets are skipped with a warning. Directories
/// are implicit in file paths. The walk order is sorted, and results land
/// in ordered maps, so the scan is deterministic regardless of how the
/// worker pool interleaves.
pub async fn scan_tree(
    root: &Path,
    chunker: Chunker,
    progress: &dyn ProgressSink,
) -> Result<TreeScan, PatchError> {
    if !root.is_dir() {
        return Err(PatchError::MissingPath(root.to_path_buf()));
    }

    let entries = collect_files(root)?;
    progress.begin("chunk", entries.len() as u64);

    let semaphore = Arc::new(Semaphore::new(crate::cpu_workers()));
    let mut tasks = JoinSet::new();

    for (rel, abs) in entries {
        let semaphore = semaphore.clone();
        tasks.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("scan semaphore closed");
            let blocks =
                tokio::task::spawn_blocking(move || chunker.chunk_file(&abs))
                    .await
                    .map_err(|e| PatchError::Io(std::io::Error::other(e)))??;
            Ok::<_, PatchError>((rel, blocks))
        });
    }

    let mut files = BTreeMap::new();
    let mut blocks = BTreeMap::new();
    let mut total_uncompressed_bytes = 0u64;

    while let Some(joined) = tasks.join_next().await {
        let (rel, file_blocks) = joined.map_err(|e| PatchError::Io(std::io::Error::other(e)))??;

        let mut ids = Vec::with_capacity(file_blocks.len());
        for block in file_blocks {
            total_uncompressed_bytes += block.len();
            ids.push(block.id);
            blocks.entry(block.id).or_insert(block.data);
        }
        files.insert(rel, ids);
        progress.advance(1);
    }

    debug!(
        files = files.len(),
        blocks = blocks.len(),
        bytes = total_uncompressed_bytes,
        "scanned source tree"
    );

    Ok(TreeScan {
        files,
        blocks,
        total_uncompressed_bytes,
    })
}

/// Collect `(relative, absolute)` paths of every regular file, sorted.
pub(crate) fn collect_files(
    root: &Path,
) -> Result<Vec<(String, std::path::PathBuf)>, PatchError> {
    let mut out = Vec::new();

    for entry in walkdir::WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            let message = e.to_string();
            PatchError::Io(
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other(message)),
            )
        })?;
        let file_type = entry.file_type();

        if file_type.is_dir() {
            continue;
        }
        if !file_type.is_file() {
            warn!(path = %entry.path().display(), "skipping non-regular file");
            continue;
        }

        let rel = relative_path(root, entry.path());
        out.push((rel, entry.path().to_path_buf()));
    }
    Ok(out)
}

/// Relative path with separators normalized to forward slashes.
pub(crate) fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
