//! File-based block store with a sharded directory layout.
//!
//! Stores one file per block at `{base_dir}/{hex[0..2]}/{hex}` — the
//! two-character prefix keeps any single directory from accumulating
//! millions of entries. The layout is mirrored verbatim under `blocks/`
//! on the object store.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use strata_types::BlockId;
use tracing::debug;

use crate::error::StoreError;

/// Content-addressed block repository rooted at one directory.
///
/// Writes are atomic: data goes to a temp file in the same directory,
/// is fsynced, then renamed into place, so a crash never leaves a
/// half-written block under its final name. `put` is idempotent — the
/// id is the hash of the content, so an existing file already holds the
/// right bytes.
#[derive(Clone)]
pub struct BlockStore {
    base_dir: PathBuf,
}

impl BlockStore {
    /// Open a block store rooted at the given directory, creating it if
    /// it does not exist.
    pub fn open(base_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let base_dir = base_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    /// Root directory of the store.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Full path for a block id: `{base}/{hh}/{hex}`.
    pub fn block_path(&self, id: &BlockId) -> PathBuf {
        let hex = id.to_string();
        self.base_dir.join(id.shard_prefix()).join(hex)
    }

    /// Whether a block is present.
    pub async fn has(&self, id: &BlockId) -> Result<bool, StoreError> {
        match tokio::fs::metadata(self.block_path(id)).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    /// Store a block in its stored form.
    ///
    /// No-op when the block already exists.
    pub async fn put(&self, id: &BlockId, data: &[u8]) -> Result<(), StoreError> {
        use tokio::io::AsyncWriteExt;

        let path = self.block_path(id);
        if tokio::fs::metadata(&path).await.is_ok() {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp_path = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp_path, &path).await?;

        debug!(%id, size = data.len(), "stored block");
        Ok(())
    }

    /// Read a block's stored bytes. Returns `None` if not present.
    pub async fn get(&self, id: &BlockId) -> Result<Option<Bytes>, StoreError> {
        match tokio::fs::read(self.block_path(id)).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    /// Remove a block. Removing a missing block is not an error.
    pub async fn delete(&self, id: &BlockId) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.block_path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    /// Enumerate every stored block id (upload planning, GC).
    ///
    /// Files that do not parse as a 64-char hex id (e.g. leftover `.tmp`
    /// files from an interrupted run) are skipped.
    pub async fn list(&self) -> Result<Vec<BlockId>, StoreError> {
        let mut ids = Vec::new();

        let mut shards = tokio::fs::read_dir(&self.base_dir).await?;
        while let Some(shard) = shards.next_entry().await? {
            if !shard.file_type().await?.is_dir() {
                continue;
            }
            let mut files = tokio::fs::read_dir(shard.path()).await?;
            while let Some(entry) = files.next_entry().await? {
                if !entry.file_type().await?.is_file() {
                    continue;
                }
                if let Some(name) = entry.file_name().to_str() {
                    if let Ok(id) = name.parse::<BlockId>() {
                        ids.push(id);
                    }
                }
            }
        }
        Ok(ids)
    }
}
