//! Zstandard dictionary training and the block codec.
//!
//! Blocks are small relative to a zstd window, so plain per-block
//! compression gains little. A dictionary trained on a sample of the
//! build's own blocks gives the compressor shared context and makes
//! per-block frames worthwhile. One dictionary serves a whole changelog:
//! a snapshot is either fully compressed with it or fully uncompressed.

use rand::seq::index::sample;
use strata_types::DictionaryId;
use tracing::{debug, warn};

use crate::error::CasError;

/// Target size for a trained dictionary (110 KB).
pub const DICTIONARY_MAX_SIZE: usize = 110 * 1024;

/// At most this many blocks are fed to the trainer.
pub const SAMPLE_MAX_BLOCKS: usize = 10_000;

/// At most this many bytes of sampled content are fed to the trainer.
pub const SAMPLE_MAX_BYTES: u64 = 100 * 1024 * 1024;

/// Default zstd compression level.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 5;

/// Train a dictionary from a uniform random sample of block payloads.
///
/// Returns `None` when training fails (typically too few or too uniform
/// samples); the caller then falls back to an uncompressed changelog.
pub fn train_dictionary<S: AsRef<[u8]>>(blocks: &[S]) -> Option<Vec<u8>> {
    if blocks.is_empty() {
        return None;
    }

    let amount = blocks.len().min(SAMPLE_MAX_BLOCKS);
    let mut rng = rand::rng();
    let mut picked: Vec<&[u8]> = sample(&mut rng, blocks.len(), amount)
        .into_iter()
        .map(|i| blocks[i].as_ref())
        .collect();

    // Enforce the byte cap after the uniform draw so every block had the
    // same chance of inclusion.
    let mut budget = SAMPLE_MAX_BYTES;
    picked.retain(|s| {
        let len = s.len() as u64;
        if len <= budget {
            budget -= len;
            true
        } else {
            false
        }
    });

    match zstd::dict::from_samples(&picked, DICTIONARY_MAX_SIZE) {
        Ok(dict) if !dict.is_empty() => {
            debug!(
                samples = picked.len(),
                dict_size = dict.len(),
                "trained compression dictionary"
            );
            Some(dict)
        }
        Ok(_) => None,
        Err(e) => {
            warn!(%e, samples = picked.len(), "dictionary training failed");
            None
        }
    }
}

/// Compresses and decompresses blocks against one trained dictionary.
///
/// The dictionary is digested into prepared encoder/decoder forms once at
/// construction; the raw bytes are kept so the `dictionary` object can be
/// written out. [`Codec::id`] is the SHA-256 of those bytes and must
/// match the changelog's `dictionary_id`.
pub struct Codec {
    encoder_dict: zstd::dict::EncoderDictionary<'static>,
    decoder_dict: zstd::dict::DecoderDictionary<'static>,
    dictionary: Vec<u8>,
    id: DictionaryId,
    level: i32,
}

impl Codec {
    /// Build a codec from dictionary bytes and a compression level.
    pub fn new(dictionary: Vec<u8>, level: i32) -> Self {
        let id = DictionaryId::from_data(&dictionary);
        Self {
            encoder_dict: zstd::dict::EncoderDictionary::copy(&dictionary, level),
            decoder_dict: zstd::dict::DecoderDictionary::copy(&dictionary),
            dictionary,
            id,
            level,
        }
    }

    /// Identity of the dictionary this codec was built from.
    pub fn id(&self) -> DictionaryId {
        self.id
    }

    /// The configured compression level.
    pub fn level(&self) -> i32 {
        self.level
    }

    /// The serialized dictionary (written as the `dictionary` object).
    pub fn dictionary(&self) -> &[u8] {
        &self.dictionary
    }

    /// Compress one block payload into a single zstd frame.
    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CasError> {
        use std::io::Write;

        let mut encoder = zstd::Encoder::with_prepared_dictionary(Vec::new(), &self.encoder_dict)
            .map_err(CasError::Compress)?;
        encoder.write_all(data).map_err(CasError::Compress)?;
        encoder.finish().map_err(CasError::Compress)
    }

    /// Decompress one stored block frame.
    ///
    /// `capacity` bounds the decompressed size (callers pass the chunker's
    /// maximum block size). A frame produced with a different dictionary
    /// fails here: zstd records the dictionary id in the frame header.
    pub fn decompress(&self, data: &[u8], capacity: usize) -> Result<Vec<u8>, CasError> {
        use std::io::Read;

        let decoder = zstd::Decoder::with_prepared_dictionary(data, &self.decoder_dict)
            .map_err(CasError::Decompress)?;
        let mut out = Vec::new();
        decoder
            .take(capacity as u64 + 1)
            .read_to_end(&mut out)
            .map_err(CasError::Decompress)?;
        if out.len() > capacity {
            return Err(CasError::Decompress(std::io::Error::other(
                "decompressed block exceeds the maximum block size",
            )));
        }
        Ok(out)
    }
}

impl std::fmt::Debug for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Codec")
            .field("id", &self.id)
            .field("level", &self.level)
            .field("dict_size", &self.dictionary.len())
            .finish()
    }
}
