//! On-disk, content-addressed block storage.
//!
//! A [`BlockStore`] holds blocks in their *stored form* — raw payloads for
//! uncompressed patch data, single zstd frames otherwise. The store never
//! interprets the bytes; hashing and decompression belong to the callers
//! that know which form a given snapshot uses.

mod error;
mod file_store;

pub use error::StoreError;
pub use file_store::BlockStore;
