//! Content addressing for Strata: chunking and dictionary compression.
//!
//! This crate provides:
//! - [`Chunker`] — content-defined chunking using FastCDC, producing
//!   SHA-256-addressed [`Block`]s.
//! - [`train_dictionary`] / [`Codec`] — zstd dictionary training and the
//!   per-block compress/decompress pair keyed by [`DictionaryId`].
//!
//! [`DictionaryId`]: strata_types::DictionaryId

mod chunker;
mod dictionary;
mod error;

pub use chunker::{Block, Chunker, DEFAULT_BLOCK_SIZE, MIN_AVG_SIZE};
pub use dictionary::{
    train_dictionary, Codec, DEFAULT_COMPRESSION_LEVEL, DICTIONARY_MAX_SIZE, SAMPLE_MAX_BLOCKS,
    SAMPLE_MAX_BYTES,
};
pub use error::CasError;
