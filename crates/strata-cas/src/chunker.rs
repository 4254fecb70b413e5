//! Content-defined chunking using FastCDC.
//!
//! Chunk boundaries are determined by content fingerprints rather than
//! fixed offsets, so an insertion or deletion anywhere in a file only
//! perturbs the blocks near the edit point — unchanged regions keep the
//! same `BlockId` and are reused across versions.
//!
//! **The block-size parameters must stay stable across versions of the
//! same installation**, otherwise every block boundary moves and nothing
//! deduplicates.

use std::path::Path;

use bytes::Bytes;
use strata_types::BlockId;

use crate::error::CasError;

/// Default average block size (64 KB).
pub const DEFAULT_BLOCK_SIZE: u32 = 65_536;

/// Smallest accepted average block size (FastCDC constraint: the derived
/// minimum `avg / 4` must stay ≥ 256).
pub const MIN_AVG_SIZE: u32 = 1024;

/// A single block produced by the chunker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Content-addressed identifier: `sha256(data)`.
    pub id: BlockId,
    /// Byte offset within the original file.
    pub offset: u64,
    /// The uncompressed block payload.
    pub data: Bytes,
}

impl Block {
    /// Uncompressed length of the block in bytes.
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    /// True for a zero-length block (never produced by the chunker).
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Content-defined chunker using the FastCDC (v2020) algorithm.
///
/// Parameters are derived from the configured average with a fixed
/// 1:4:16 spread: `min = avg / 4`, `max = avg * 4`.
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    min_size: u32,
    avg_size: u32,
    max_size: u32,
}

impl Chunker {
    /// Create a chunker with the given average block size.
    ///
    /// Returns [`CasError::BlockSizeTooSmall`] below [`MIN_AVG_SIZE`].
    pub fn new(avg_size: u32) -> Result<Self, CasError> {
        if avg_size < MIN_AVG_SIZE {
            return Err(CasError::BlockSizeTooSmall(avg_size));
        }
        Ok(Self {
            min_size: avg_size / 4,
            avg_size,
            max_size: avg_size * 4,
        })
    }

    /// The configured average block size (recorded in the changelog).
    pub fn avg_size(&self) -> u32 {
        self.avg_size
    }

    /// Largest block this chunker can emit.
    pub fn max_size(&self) -> u32 {
        self.max_size
    }

    /// Split data into content-defined blocks.
    ///
    /// Single forward pass; every byte sequence is valid input.
    /// Returns an empty vec for empty input.
    pub fn chunk(&self, data: &[u8]) -> Vec<Block> {
        if data.is_empty() {
            return Vec::new();
        }

        let chunker =
            fastcdc::v2020::FastCDC::new(data, self.min_size, self.avg_size, self.max_size);
        let mut blocks = Vec::new();

        for entry in chunker {
            let payload = &data[entry.offset..entry.offset + entry.length];
            blocks.push(Block {
                id: BlockId::from_data(payload),
                offset: entry.offset as u64,
                data: Bytes::copy_from_slice(payload),
            });
        }

        blocks
    }

    /// Chunk a file on disk.
    ///
    /// Reads the whole file into memory; the block-size spread keeps
    /// individual blocks small, and callers fan this out over a blocking
    /// pool one file at a time.
    pub fn chunk_file(&self, path: &Path) -> Result<Vec<Block>, CasError> {
        let data = std::fs::read(path)?;
        Ok(self.chunk(&data))
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            min_size: DEFAULT_BLOCK_SIZE / 4,
            avg_size: DEFAULT_BLOCK_SIZE,
            max_size: DEFAULT_BLOCK_SIZE * 4,
        }
    }
}
