//! The changelog: the manifest describing one directory snapshot.
//!
//! A [`Changelog`] records every file in the tree as an ordered list of
//! block ids, how those blocks are grouped into bundles on the wire, and
//! the compression settings used when the patch data was produced. It is
//! stored as UTF-8 JSON (`changelog.json`) both in the local patch-data
//! directory and on the object store.
//!
//! Unknown JSON fields are ignored on read and never emitted, so older
//! builds can read changelogs written by newer ones.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{BlockId, BundleId, DictionaryId};

/// Filename of the changelog inside a patch-data directory.
pub const CHANGELOG_FILE_NAME: &str = "changelog.json";

/// Filename of the trained dictionary (absent when uncompressed).
pub const DICTIONARY_FILE_NAME: &str = "dictionary";

/// Directory holding loose blocks, sharded by the first two hex chars.
pub const BLOCKS_DIR: &str = "blocks";

/// Directory holding bundle objects.
pub const BUNDLES_DIR: &str = "bundles";

/// Filename of the version stamp written beside the changelog.
pub const VERSION_FILE_NAME: &str = "version";

/// Position of one block inside a bundle.
///
/// Offsets and lengths refer to the *stored form* of the block — already
/// compressed when the changelog is compressed — because that is what a
/// range read against the bundle object returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleSlot {
    /// The block stored at this slot.
    pub block: BlockId,
    /// Byte offset of the block within the bundle object.
    pub offset: u64,
    /// Stored length of the block in bytes.
    pub length: u64,
}

/// Top-level manifest for one directory snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changelog {
    /// Monotonically increasing snapshot number (1 for the first build).
    pub version: u64,
    /// Unix timestamp (seconds) when the snapshot was created.
    pub created_at: u64,
    /// Average block size the chunker was configured with.
    pub block_size: u32,
    /// Whether block payloads are zstd-compressed with the dictionary.
    pub compressed: bool,
    /// Dictionary identity; present iff `compressed`.
    pub dictionary_id: Option<DictionaryId>,
    /// Relative path (forward slashes) → ordered block list.
    ///
    /// Concatenating the referenced blocks reproduces the file
    /// byte-for-byte. Empty files have an empty list.
    pub files: BTreeMap<String, Vec<BlockId>>,
    /// Bundle id → member slots, in bundle order.
    pub bundles: BTreeMap<BundleId, Vec<BundleSlot>>,
    /// Block id → the bundle it is served from.
    pub block_index: BTreeMap<BlockId, BundleId>,
    /// Sum of all file sizes in the snapshot.
    pub total_uncompressed_bytes: u64,
}

/// Schema violations detected by [`Changelog::validate`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChangelogError {
    /// A file references a block with no entry in `block_index`.
    #[error("file {path:?} references block {block} missing from block_index")]
    UnindexedBlock {
        /// File whose block list is broken.
        path: String,
        /// The unindexed block.
        block: BlockId,
    },

    /// `block_index` maps a block to a bundle that does not exist.
    #[error("block {block} is indexed under unknown bundle {bundle}")]
    UnknownBundle {
        /// The indexed block.
        block: BlockId,
        /// The missing bundle id.
        bundle: BundleId,
    },

    /// A bundle contains no block referenced by any file.
    #[error("bundle {0} is not referenced by block_index")]
    OrphanBundle(BundleId),

    /// Slots inside a bundle leave a gap, overlap, or have zero length.
    #[error("bundle {bundle} has a malformed slot layout at offset {offset}")]
    MalformedSlots {
        /// The broken bundle.
        bundle: BundleId,
        /// Offset where the layout first breaks.
        offset: u64,
    },

    /// `compressed` and `dictionary_id` disagree.
    #[error("compressed flag and dictionary_id are inconsistent")]
    CompressionMismatch,

    /// A file path escapes the tree root or is not normalized.
    #[error("file path {0:?} is not a clean relative path")]
    BadPath(String),
}

impl Changelog {
    /// Set of every block referenced by at least one file.
    pub fn referenced_blocks(&self) -> BTreeSet<BlockId> {
        self.files.values().flatten().copied().collect()
    }

    /// Look up the slot of `block` inside `bundle`, if recorded.
    pub fn slot_of(&self, bundle: &BundleId, block: &BlockId) -> Option<BundleSlot> {
        self.bundles
            .get(bundle)?
            .iter()
            .find(|slot| slot.block == *block)
            .copied()
    }

    /// Check the structural invariants the rest of the engine relies on.
    ///
    /// Called after every parse: a changelog that fails here is treated as
    /// malformed input, not as a bug further down the pipeline.
    pub fn validate(&self) -> Result<(), ChangelogError> {
        if self.compressed != self.dictionary_id.is_some() {
            return Err(ChangelogError::CompressionMismatch);
        }

        for path in self.files.keys() {
            if !is_clean_relative_path(path) {
                return Err(ChangelogError::BadPath(path.clone()));
            }
        }

        // Every file block must be indexed, and every indexed bundle must exist.
        for (path, blocks) in &self.files {
            for block in blocks {
                match self.block_index.get(block) {
                    None => {
                        return Err(ChangelogError::UnindexedBlock {
                            path: path.clone(),
                            block: *block,
                        });
                    }
                    Some(bundle) if !self.bundles.contains_key(bundle) => {
                        return Err(ChangelogError::UnknownBundle {
                            block: *block,
                            bundle: *bundle,
                        });
                    }
                    Some(_) => {}
                }
            }
        }

        // Every bundle must serve at least one indexed block.
        let used: BTreeSet<&BundleId> = self.block_index.values().collect();
        for bundle in self.bundles.keys() {
            if !used.contains(bundle) {
                return Err(ChangelogError::OrphanBundle(*bundle));
            }
        }

        // Slots must tile the bundle: contiguous from zero, no gaps or overlaps.
        for (bundle, slots) in &self.bundles {
            let mut expected = 0u64;
            for slot in slots {
                if slot.offset != expected || slot.length == 0 {
                    return Err(ChangelogError::MalformedSlots {
                        bundle: *bundle,
                        offset: slot.offset,
                    });
                }
                expected += slot.length;
            }
        }

        Ok(())
    }
}

/// True when `path` is a normalized relative path: forward slashes only,
/// no empty / `.` / `..` components, no leading slash.
fn is_clean_relative_path(path: &str) -> bool {
    !path.is_empty()
        && !path.starts_with('/')
        && !path.contains('\\')
        && path
            .split('/')
            .all(|part| !part.is_empty() && part != "." && part != "..")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(n: u8) -> BlockId {
        BlockId::from_data(&[n])
    }

    fn sample() -> Changelog {
        let b0 = block(0);
        let b1 = block(1);
        let bundle = BundleId::from_data(b"bundle");

        Changelog {
            version: 3,
            created_at: 1_700_000_000,
            block_size: 65_536,
            compressed: false,
            dictionary_id: None,
            files: BTreeMap::from([
                ("a.txt".to_string(), vec![b0]),
                ("dir/b.bin".to_string(), vec![b0, b1]),
                ("empty".to_string(), vec![]),
            ]),
            bundles: BTreeMap::from([(
                bundle,
                vec![
                    BundleSlot {
                        block: b0,
                        offset: 0,
                        length: 100,
                    },
                    BundleSlot {
                        block: b1,
                        offset: 100,
                        length: 50,
                    },
                ],
            )]),
            block_index: BTreeMap::from([(b0, bundle), (b1, bundle)]),
            total_uncompressed_bytes: 250,
        }
    }

    #[test]
    fn test_valid_changelog_passes() {
        sample().validate().unwrap();
    }

    #[test]
    fn test_json_roundtrip() {
        let log = sample();
        let json = serde_json::to_vec(&log).unwrap();
        let decoded: Changelog = serde_json::from_slice(&json).unwrap();
        assert_eq!(log, decoded);
    }

    #[test]
    fn test_unknown_json_fields_ignored() {
        let mut value = serde_json::to_value(sample()).unwrap();
        value
            .as_object_mut()
            .unwrap()
            .insert("future_field".to_string(), serde_json::json!({"x": 1}));
        let decoded: Changelog = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, sample());
    }

    #[test]
    fn test_unindexed_block_rejected() {
        let mut log = sample();
        log.block_index.remove(&block(1));
        assert!(matches!(
            log.validate(),
            Err(ChangelogError::UnindexedBlock { .. })
        ));
    }

    #[test]
    fn test_unknown_bundle_rejected() {
        let mut log = sample();
        let ghost = BundleId::from_data(b"ghost");
        log.block_index.insert(block(0), ghost);
        assert!(matches!(
            log.validate(),
            Err(ChangelogError::UnknownBundle { .. })
        ));
    }

    #[test]
    fn test_orphan_bundle_rejected() {
        let mut log = sample();
        log.bundles
            .insert(BundleId::from_data(b"empty bundle"), vec![]);
        assert!(matches!(
            log.validate(),
            Err(ChangelogError::OrphanBundle(_))
        ));
    }

    #[test]
    fn test_gap_in_slots_rejected() {
        let mut log = sample();
        let bundle = *log.bundles.keys().next().unwrap();
        log.bundles.get_mut(&bundle).unwrap()[1].offset = 101;
        assert!(matches!(
            log.validate(),
            Err(ChangelogError::MalformedSlots { .. })
        ));
    }

    #[test]
    fn test_zero_length_slot_rejected() {
        let mut log = sample();
        let bundle = *log.bundles.keys().next().unwrap();
        log.bundles.get_mut(&bundle).unwrap()[0].length = 0;
        assert!(matches!(
            log.validate(),
            Err(ChangelogError::MalformedSlots { .. })
        ));
    }

    #[test]
    fn test_compression_mismatch_rejected() {
        let mut log = sample();
        log.compressed = true; // no dictionary_id
        assert_eq!(log.validate(), Err(ChangelogError::CompressionMismatch));

        let mut log = sample();
        log.dictionary_id = Some(DictionaryId::from_data(b"dict"));
        assert_eq!(log.validate(), Err(ChangelogError::CompressionMismatch));
    }

    #[test]
    fn test_bad_paths_rejected() {
        for bad in ["/abs", "a//b", "../up", "dir/..", "win\\sep", ""] {
            let mut log = sample();
            log.files.insert(bad.to_string(), vec![]);
            assert!(
                matches!(log.validate(), Err(ChangelogError::BadPath(_))),
                "path {bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_referenced_blocks() {
        let log = sample();
        let refs = log.referenced_blocks();
        assert_eq!(refs.len(), 2);
        assert!(refs.contains(&block(0)));
        assert!(refs.contains(&block(1)));
    }

    #[test]
    fn test_slot_of() {
        let log = sample();
        let bundle = *log.bundles.keys().next().unwrap();
        let slot = log.slot_of(&bundle, &block(1)).unwrap();
        assert_eq!(slot.offset, 100);
        assert_eq!(slot.length, 50);
        assert!(log.slot_of(&bundle, &block(9)).is_none());
    }

    #[test]
    fn test_ids_serialize_as_hex_keys() {
        // Map keys must be hex strings for the JSON wire format.
        let log = sample();
        let value = serde_json::to_value(&log).unwrap();
        let bundles = value.get("bundles").unwrap().as_object().unwrap();
        for key in bundles.keys() {
            assert_eq!(key.len(), 64);
            assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }
}
