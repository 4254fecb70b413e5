//! `create`: build a complete patch-data directory from a source tree.
//!
//! Pipeline: scan (chunk) → resolve dictionary → compress stored forms →
//! pack bundles → assemble changelog → write objects. The output
//! directory ends up mirroring exactly what the object store should
//! serve: `changelog.json`, `version`, optional `dictionary`,
//! `blocks/<hh>/<id>`, `bundles/<id>`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use sha2::{Digest, Sha256};
use strata_cas::{train_dictionary, Chunker, Codec, DEFAULT_COMPRESSION_LEVEL};
use strata_remote::PatchSource;
use strata_store::BlockStore;
use strata_types::{
    BlockId, Changelog, DictionaryId, BLOCKS_DIR, BUNDLES_DIR, CHANGELOG_FILE_NAME,
    DICTIONARY_FILE_NAME, VERSION_FILE_NAME,
};
use tracing::{debug, info, warn};

use crate::builder::scan_tree;
use crate::diff::{diff, Diff};
use crate::error::PatchError;
use crate::packer::pack_bundles;
use crate::progress::ProgressSink;

/// Options for [`create_patch`].
pub struct CreateOptions {
    /// Average block size handed to the chunker.
    pub block_size: u32,
    /// Compress stored forms with a trained dictionary.
    pub compress: bool,
    /// Zstd compression level.
    pub compression_level: i32,
    /// External dictionary file: loaded when present, written after
    /// training otherwise.
    pub dict_path: Option<PathBuf>,
    /// Force dictionary retraining even when a previous one exists.
    pub regen_dict: bool,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            block_size: strata_cas::DEFAULT_BLOCK_SIZE,
            compress: false,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            dict_path: None,
            regen_dict: false,
        }
    }
}

/// Result of a `create` run.
#[derive(Debug)]
pub struct CreateOutcome {
    /// The changelog written to the output directory.
    pub changelog: Changelog,
    /// What changed relative to the previous changelog.
    pub diff: Diff,
}

/// Build patch data for `source_dir` into `output_dir`.
///
/// `previous` locates the prior snapshot (local directory or URL); pass
/// `None` for a first build. Bundle assignments and the dictionary are
/// carried over from it whenever the compression context allows.
pub async fn create_patch(
    source_dir: &Path,
    output_dir: &Path,
    previous: Option<&PatchSource>,
    opts: &CreateOptions,
    progress: &dyn ProgressSink,
) -> Result<CreateOutcome, PatchError> {
    let chunker = Chunker::new(opts.block_size)?;

    // --- Scan the source tree ---
    let scan = scan_tree(source_dir, chunker, progress).await?;
    if scan.files.is_empty() {
        return Err(PatchError::EmptyTree(source_dir.to_path_buf()));
    }

    // --- Previous changelog (absence and corruption both mean "none") ---
    let prev = match previous {
        Some(source) => match source.load_changelog().await {
            Ok(Some(changelog)) => match changelog.validate() {
                Ok(()) => Some(changelog),
                Err(e) => {
                    warn!(%e, "previous changelog is invalid, treating as absent");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(%e, "failed to load previous changelog, treating as absent");
                None
            }
        },
        None => None,
    };

    // --- Dictionary / codec ---
    let codec = if opts.compress {
        let codec = resolve_codec(&scan.blocks, prev.as_ref(), previous, opts).await?;
        // Keep the external dictionary file in sync with what this build
        // actually used.
        if let (Some(codec), Some(path)) = (codec.as_deref(), &opts.dict_path) {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            write_atomic(path, codec.dictionary()).await?;
        }
        codec
    } else {
        None
    };
    let compressed = codec.is_some();
    let dictionary_id = codec.as_ref().map(|c| c.id());

    // --- Stored forms ---
    progress.begin("encode", scan.blocks.len() as u64);
    let stored = encode_blocks(&scan.blocks, codec.as_deref()).await?;
    progress.advance(stored.len() as u64);

    // --- Bundles ---
    // Previous assignments only survive an unchanged compression context:
    // old slot tables describe old stored forms.
    let reuse_previous = prev
        .as_ref()
        .is_some_and(|p| p.compressed == compressed && p.dictionary_id == dictionary_id);
    let packing = pack_bundles(
        &scan.files,
        &stored,
        &scan.blocks,
        if reuse_previous { prev.as_ref() } else { None },
    );

    // --- Changelog ---
    let changelog = Changelog {
        version: prev.as_ref().map(|p| p.version + 1).unwrap_or(1),
        created_at: now_secs(),
        block_size: opts.block_size,
        compressed,
        dictionary_id,
        files: scan.files,
        bundles: packing.bundles,
        block_index: packing.block_index,
        total_uncompressed_bytes: scan.total_uncompressed_bytes,
    };
    changelog.validate()?;

    let outcome_diff = diff(prev.as_ref(), &changelog);

    // --- Write the patch-data directory ---
    progress.begin(
        "write",
        (stored.len() + packing.new_bundles.len()) as u64,
    );
    write_patch_data(
        output_dir,
        &changelog,
        &stored,
        &packing.new_bundles,
        codec.as_deref(),
        previous,
        progress,
    )
    .await?;

    info!(
        version = changelog.version,
        files = changelog.files.len(),
        blocks = changelog.block_index.len(),
        bundles = changelog.bundles.len(),
        new_blocks = outcome_diff.new_blocks.len(),
        new_bundles = outcome_diff.new_bundles.len(),
        compressed,
        "patch data created"
    );

    Ok(CreateOutcome {
        changelog,
        diff: outcome_diff,
    })
}

/// Decide where the dictionary comes from: an explicit file, the previous
/// snapshot, or fresh training. Training failure downgrades the build to
/// uncompressed.
async fn resolve_codec(
    blocks: &BTreeMap<BlockId, Bytes>,
    prev: Option<&Changelog>,
    previous_source: Option<&PatchSource>,
    opts: &CreateOptions,
) -> Result<Option<Arc<Codec>>, PatchError> {
    // 1. Explicit dictionary file.
    if !opts.regen_dict {
        if let Some(path) = &opts.dict_path {
            if path.exists() {
                let bytes = tokio::fs::read(path).await?;
                debug!(path = %path.display(), size = bytes.len(), "loaded dictionary file");
                return Ok(Some(Arc::new(Codec::new(bytes, opts.compression_level))));
            }
        }

        // 2. Reuse the previous snapshot's dictionary.
        if let (Some(prev), Some(source)) = (prev, previous_source) {
            if let Some(expected) = prev.dictionary_id {
                match source.load_dictionary().await {
                    Ok(bytes) => {
                        if DictionaryId::from_data(&bytes) == expected {
                            debug!(%expected, "reusing previous dictionary");
                            return Ok(Some(Arc::new(Codec::new(
                                bytes.to_vec(),
                                opts.compression_level,
                            ))));
                        }
                        warn!(%expected, "previous dictionary does not match its id, retraining");
                    }
                    Err(e) => {
                        warn!(%e, "failed to load previous dictionary, retraining");
                    }
                }
            }
        }
    }

    // 3. Train from this build's own blocks.
    let samples: Vec<Bytes> = blocks.values().cloned().collect();
    let level = opts.compression_level;
    let trained = tokio::task::spawn_blocking(move || train_dictionary(&samples))
        .await
        .map_err(|e| PatchError::Io(std::io::Error::other(e)))?;

    match trained {
        Some(bytes) => Ok(Some(Arc::new(Codec::new(bytes, level)))),
        None => {
            warn!("dictionary training failed, writing uncompressed patch data");
            Ok(None)
        }
    }
}

/// Produce each block's stored form (compressed when a codec is present).
async fn encode_blocks(
    blocks: &BTreeMap<BlockId, Bytes>,
    codec: Option<&Codec>,
) -> Result<BTreeMap<BlockId, Bytes>, PatchError> {
    let Some(codec) = codec else {
        return Ok(blocks.clone());
    };

    // One blocking task compresses the whole set; blocks are small and
    // zstd with a prepared dictionary is fast enough that per-block task
    // overhead would dominate.
    let blocks = blocks.clone();
    let dictionary = codec.dictionary().to_vec();
    let level = codec.level();

    tokio::task::spawn_blocking(move || {
        let codec = Codec::new(dictionary, level);
        let mut out = BTreeMap::new();
        for (id, payload) in blocks {
            out.insert(id, Bytes::from(codec.compress(&payload)?));
        }
        Ok(out)
    })
    .await
    .map_err(|e| PatchError::Io(std::io::Error::other(e)))?
}

/// Write blocks, new bundles, dictionary, changelog, and version stamp.
async fn write_patch_data(
    output_dir: &Path,
    changelog: &Changelog,
    stored: &BTreeMap<BlockId, Bytes>,
    new_bundles: &[crate::packer::PackedBundle],
    codec: Option<&Codec>,
    previous: Option<&PatchSource>,
    progress: &dyn ProgressSink,
) -> Result<(), PatchError> {
    tokio::fs::create_dir_all(output_dir).await?;

    // Blocks.
    let store = BlockStore::open(output_dir.join(BLOCKS_DIR))?;
    for (id, form) in stored {
        store.put(id, form).await?;
        progress.advance(1);
    }

    // New bundles.
    let bundles_dir = output_dir.join(BUNDLES_DIR);
    tokio::fs::create_dir_all(&bundles_dir).await?;
    for bundle in new_bundles {
        write_atomic(&bundles_dir.join(bundle.id.to_string()), &bundle.data).await?;
        progress.advance(1);
    }

    // Carried bundles: copy the objects over when the previous snapshot
    // is a sibling local directory, so the output stays self-contained.
    // With a remote previous, the objects already live on the CDN and the
    // loose blocks written above cover local applies.
    if let Some(prev_dir) = previous.and_then(|s| s.local_dir()) {
        if prev_dir != output_dir {
            for id in changelog.bundles.keys() {
                let target = bundles_dir.join(id.to_string());
                if target.exists() {
                    continue;
                }
                let origin = prev_dir.join(BUNDLES_DIR).join(id.to_string());
                if origin.exists() {
                    tokio::fs::copy(&origin, &target).await?;
                }
            }
        }
    }

    // Dictionary.
    let dict_file = output_dir.join(DICTIONARY_FILE_NAME);
    match codec {
        Some(codec) => write_atomic(&dict_file, codec.dictionary()).await?,
        None => {
            // An uncompressed snapshot must not ship a stale dictionary.
            if dict_file.exists() {
                tokio::fs::remove_file(&dict_file).await?;
            }
        }
    }

    // Stale objects from older builds staged into the same directory.
    prune_stale_objects(&store, &bundles_dir, changelog).await?;

    // Changelog + version stamp, written last so a crash mid-write never
    // publishes a changelog whose objects are incomplete.
    let json = serde_json::to_vec_pretty(changelog)?;
    write_atomic(&output_dir.join(CHANGELOG_FILE_NAME), &json).await?;

    let version_hash = format!("{:x}", Sha256::digest(&json));
    write_atomic(&output_dir.join(VERSION_FILE_NAME), version_hash.as_bytes()).await?;

    Ok(())
}

/// Remove staged blocks and bundles the new changelog no longer uses.
async fn prune_stale_objects(
    store: &BlockStore,
    bundles_dir: &Path,
    changelog: &Changelog,
) -> Result<(), PatchError> {
    for id in store.list().await? {
        if !changelog.block_index.contains_key(&id) {
            store.delete(&id).await?;
        }
    }

    let mut entries = tokio::fs::read_dir(bundles_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let keep = name
            .to_str()
            .and_then(|s| s.parse().ok())
            .is_some_and(|id| changelog.bundles.contains_key(&id));
        if !keep {
            debug!(name = %name.to_string_lossy(), "removing stale bundle object");
            tokio::fs::remove_file(entry.path()).await?;
        }
    }
    Ok(())
}

/// Atomic file write: temp + fsync + rename, like the block store.
async fn write_atomic(path: &Path, data: &[u8]) -> Result<(), PatchError> {
    use tokio::io::AsyncWriteExt;

    let tmp = path.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
