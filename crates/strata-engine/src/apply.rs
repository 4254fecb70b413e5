//! `apply`: reconstruct an installation from a changelog.
//!
//! Five strictly ordered phases:
//!
//! 1. **Scan** the installation — chunk every existing file, mark files
//!    that already match their manifest entry clean, and index every
//!    locally available block by `(path, offset, length)`.
//! 2. **Plan** each remaining file: every constituent block is either
//!    reused from local bytes or fetched.
//! 3. **Acquire** missing blocks concurrently — whole bundles when most
//!    of a bundle is needed, loose blocks otherwise — decompressing and
//!    verifying every block hash before it is ever written.
//! 4. **Materialise**: write every target to a temp file beside its final
//!    path, fsync, then rename all of them. Local reuse only ever reads
//!    pre-rename content, so a file can safely borrow bytes from another
//!    file that this same run is replacing.
//! 5. **Prune** files not in the changelog, then empty directories.
//!
//! Rerunning after an interruption is safe: the scan rediscovers
//! everything already materialised and the run degenerates to a no-op.

use std::collections::{BTreeSet, HashMap};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use strata_cas::{Chunker, Codec, DEFAULT_COMPRESSION_LEVEL};
use strata_remote::{PatchSource, FETCH_ATTEMPTS, RETRY_BASE_DELAY};
use strata_store::BlockStore;
use strata_types::{BlockId, BundleId, BundleSlot, Changelog, DictionaryId};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::builder::{collect_files, relative_path};
use crate::error::PatchError;
use crate::progress::ProgressSink;

/// Default number of in-flight fetches.
pub const FETCH_CONCURRENCY: usize = 16;

/// Suffix of in-progress temp files; anything carrying it is disposable.
const TEMP_SUFFIX: &str = ".strata-tmp";

/// Options for [`apply_patch`].
pub struct ApplyOptions {
    /// Maximum concurrent fetches.
    pub concurrency: usize,
    /// Treat stored forms as raw bytes even if the changelog says
    /// compressed (mirrors that strip compression server-side).
    pub assume_uncompressed: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            concurrency: FETCH_CONCURRENCY,
            assume_uncompressed: false,
        }
    }
}

/// What one apply run did.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Files rewritten this run.
    pub files_written: usize,
    /// Files that already matched the changelog.
    pub files_clean: usize,
    /// Bundle objects fetched.
    pub bundles_fetched: usize,
    /// Loose block objects fetched (including local cache reads).
    pub blocks_fetched: usize,
    /// Total stored-form bytes fetched.
    pub bytes_fetched: u64,
    /// Orphan files removed.
    pub files_pruned: usize,
}

/// A reusable byte range inside an existing local file.
#[derive(Debug, Clone)]
struct LocalRange {
    path: PathBuf,
    offset: u64,
    length: u64,
}

/// Where one planned block's bytes come from.
#[derive(Clone)]
enum Origin {
    /// Read (and re-verify) from an existing local file.
    Local(LocalRange),
    /// Taken from the acquisition map filled in phase 3.
    Fetched,
}

/// Write plan for one target file.
struct FilePlan {
    rel: String,
    blocks: Vec<(BlockId, Origin)>,
}

/// One unit of acquisition work.
enum FetchJob {
    /// Fetch a bundle object and slice the needed blocks out of it.
    Bundle {
        id: BundleId,
        slots: Vec<BundleSlot>,
        needed: Vec<BlockId>,
    },
    /// Fetch one loose block object.
    Loose { id: BlockId },
    /// Read one block from the local patch-data block store.
    Cache { id: BlockId },
}

/// Reconstruct `install_dir` to match `changelog`.
pub async fn apply_patch(
    changelog: &Changelog,
    install_dir: &Path,
    source: &PatchSource,
    opts: &ApplyOptions,
    progress: &dyn ProgressSink,
) -> Result<ApplyReport, PatchError> {
    changelog.validate()?;
    tokio::fs::create_dir_all(install_dir).await?;
    clean_temp_files(install_dir)?;

    let compressed = changelog.compressed && !opts.assume_uncompressed;
    let codec = if compressed {
        Some(Arc::new(load_codec(changelog, source).await?))
    } else {
        None
    };

    let chunker = Chunker::new(changelog.block_size)?;
    let max_block = changelog.block_size as usize * 4;

    // Files sitting where the changelog needs a directory go first, so the
    // scan never records them as reusable block sources.
    clear_path_collisions(changelog, install_dir)?;

    // --- Phase 1: scan ---
    let scan = scan_install(changelog, install_dir, chunker, progress).await?;

    // --- Phase 2: plan ---
    let plans = plan_files(changelog, &scan);
    let jobs = plan_fetches(changelog, &plans, source).await?;
    debug!(
        clean = scan.clean.len(),
        to_write = plans.len(),
        fetch_jobs = jobs.len(),
        "apply plan ready"
    );

    // --- Phase 3: acquire (verification happens inside) ---
    let (acquired, mut report) = acquire_blocks(
        jobs,
        source.clone(),
        codec.clone(),
        max_block,
        opts.concurrency,
        progress,
    )
    .await?;

    // --- Phase 4: materialise ---
    report.files_written = materialise(&plans, install_dir, Arc::new(acquired), progress).await?;
    report.files_clean = scan.clean.len();

    // --- Phase 5: prune (strictly after every file is in place) ---
    report.files_pruned = prune_tree(changelog, install_dir)?;

    info!(
        written = report.files_written,
        clean = report.files_clean,
        pruned = report.files_pruned,
        fetched_bytes = report.bytes_fetched,
        "apply complete"
    );
    Ok(report)
}

/// Remove leftover temp files from an interrupted run.
///
/// Also exposed to the CLI so a cancelled apply can clean up after its
/// in-flight writers.
pub fn clean_temp_files(install_dir: &Path) -> Result<(), PatchError> {
    if !install_dir.exists() {
        return Ok(());
    }
    for entry in walkdir::WalkDir::new(install_dir).follow_links(false) {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };
        if entry.file_type().is_file()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|n| n.ends_with(TEMP_SUFFIX))
        {
            debug!(path = %entry.path().display(), "removing stale temp file");
            let _ = std::fs::remove_file(entry.path());
        }
    }
    Ok(())
}

/// Load and verify the dictionary referenced by the changelog.
async fn load_codec(changelog: &Changelog, source: &PatchSource) -> Result<Codec, PatchError> {
    let expected = changelog
        .dictionary_id
        .expect("validated changelog: compressed implies dictionary_id");
    let bytes = source.load_dictionary().await?;
    if DictionaryId::from_data(&bytes) != expected {
        return Err(PatchError::DictionaryMismatch { expected });
    }
    Ok(Codec::new(bytes.to_vec(), DEFAULT_COMPRESSION_LEVEL))
}

// ---------------------------------------------------------------------------
// Phase 1: scan
// ---------------------------------------------------------------------------

struct InstallScan {
    /// Files whose ordered block list already matches the changelog.
    clean: BTreeSet<String>,
    /// Every block available somewhere in the installation.
    local: HashMap<BlockId, LocalRange>,
}

async fn scan_install(
    changelog: &Changelog,
    install_dir: &Path,
    chunker: Chunker,
    progress: &dyn ProgressSink,
) -> Result<InstallScan, PatchError> {
    let entries = collect_files(install_dir)?;
    progress.begin("scan", entries.len() as u64);

    let semaphore = Arc::new(Semaphore::new(crate::cpu_workers()));
    let mut tasks = JoinSet::new();

    for (rel, abs) in entries {
        let semaphore = semaphore.clone();
        tasks.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("scan semaphore closed");
            let path = abs.clone();
            let blocks = tokio::task::spawn_blocking(move || chunker.chunk_file(&path))
                .await
                .map_err(|e| PatchError::Io(std::io::Error::other(e)))?;
            Ok::<_, PatchError>((rel, abs, blocks))
        });
    }

    let mut clean = BTreeSet::new();
    let mut local: HashMap<BlockId, LocalRange> = HashMap::new();

    while let Some(joined) = tasks.join_next().await {
        let (rel, abs, blocks) = joined.map_err(|e| PatchError::Io(std::io::Error::other(e)))??;
        let blocks = match blocks {
            Ok(blocks) => blocks,
            // The file vanished between the walk and the read; treat as absent.
            Err(strata_cas::CasError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let ids: Vec<BlockId> = blocks.iter().map(|b| b.id).collect();
        if changelog.files.get(&rel) == Some(&ids) {
            clean.insert(rel);
        }
        for block in blocks {
            local.entry(block.id).or_insert(LocalRange {
                path: abs.clone(),
                offset: block.offset,
                length: block.len(),
            });
        }
        progress.advance(1);
    }

    Ok(InstallScan { clean, local })
}

// ---------------------------------------------------------------------------
// Phase 2: plan
// ---------------------------------------------------------------------------

fn plan_files(changelog: &Changelog, scan: &InstallScan) -> Vec<FilePlan> {
    changelog
        .files
        .iter()
        .filter(|(rel, _)| !scan.clean.contains(*rel))
        .map(|(rel, ids)| FilePlan {
            rel: rel.clone(),
            blocks: ids
                .iter()
                .map(|id| {
                    let origin = match scan.local.get(id) {
                        Some(range) => Origin::Local(range.clone()),
                        None => Origin::Fetched,
                    };
                    (*id, origin)
                })
                .collect(),
        })
        .collect()
}

/// Turn the set of blocks that must be fetched into concrete jobs.
///
/// Preference order per block: local patch-data block store, then its
/// bundle. A bundle where fewer than half the member blocks are needed is
/// not worth the transfer — its blocks are fetched loose instead.
async fn plan_fetches(
    changelog: &Changelog,
    plans: &[FilePlan],
    source: &PatchSource,
) -> Result<Vec<FetchJob>, PatchError> {
    let mut needed = BTreeSet::new();
    for plan in plans {
        for (id, origin) in &plan.blocks {
            if matches!(origin, Origin::Fetched) {
                needed.insert(*id);
            }
        }
    }

    let mut jobs = Vec::new();

    // Local staging directory: every referenced block exists loose.
    let cache = match source.local_blocks_dir().filter(|d| d.is_dir()) {
        Some(dir) => Some(BlockStore::open(dir)?),
        None => None,
    };

    let mut remote: HashMap<BundleId, Vec<BlockId>> = HashMap::new();
    for id in needed {
        if let Some(store) = &cache {
            if store.has(&id).await? {
                jobs.push(FetchJob::Cache { id });
                continue;
            }
        }
        match changelog.block_index.get(&id) {
            Some(bundle) => remote.entry(*bundle).or_default().push(id),
            // validate() guarantees the index is complete; a miss here
            // means the caller skipped it.
            None => {
                return Err(PatchError::Schema(
                    strata_types::ChangelogError::UnindexedBlock {
                        path: String::new(),
                        block: id,
                    },
                ))
            }
        }
    }

    for (bundle, blocks) in remote {
        let slots = changelog.bundles[&bundle].clone();
        if blocks.len() * 2 >= slots.len() {
            jobs.push(FetchJob::Bundle {
                id: bundle,
                slots,
                needed: blocks,
            });
        } else {
            jobs.extend(blocks.into_iter().map(|id| FetchJob::Loose { id }));
        }
    }

    Ok(jobs)
}

// ---------------------------------------------------------------------------
// Phase 3: acquire
// ---------------------------------------------------------------------------

async fn acquire_blocks(
    jobs: Vec<FetchJob>,
    source: PatchSource,
    codec: Option<Arc<Codec>>,
    max_block: usize,
    concurrency: usize,
    progress: &dyn ProgressSink,
) -> Result<(HashMap<BlockId, Bytes>, ApplyReport), PatchError> {
    progress.begin("fetch", jobs.len() as u64);

    let cache = match source.local_blocks_dir() {
        Some(dir) if dir.is_dir() => Some(BlockStore::open(dir)?),
        _ => None,
    };

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for job in jobs {
        let semaphore = semaphore.clone();
        let source = source.clone();
        let cache = cache.clone();
        let codec = codec.clone();
        tasks.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("fetch semaphore closed");
            run_fetch_job(job, &source, cache.as_ref(), codec, max_block).await
        });
    }

    let mut acquired = HashMap::new();
    let mut report = ApplyReport::default();

    while let Some(joined) = tasks.join_next().await {
        let outcome = joined.map_err(|e| PatchError::Io(std::io::Error::other(e)))?;
        let done = match outcome {
            Ok(done) => done,
            Err(e) => {
                // First fatal error cancels the siblings.
                tasks.abort_all();
                return Err(e);
            }
        };

        report.bytes_fetched += done.bytes_fetched;
        if done.was_bundle {
            report.bundles_fetched += 1;
        } else {
            report.blocks_fetched += 1;
        }
        for (id, payload) in done.blocks {
            acquired.insert(id, payload);
        }
        progress.advance(1);
    }

    Ok((acquired, report))
}

struct JobDone {
    blocks: Vec<(BlockId, Bytes)>,
    bytes_fetched: u64,
    was_bundle: bool,
}

/// Run one fetch job to completion, retrying transient failures and —
/// on network sources — integrity failures, with exponential backoff.
///
/// Fetching suspends on the I/O loop; decoding and hashing run on the
/// blocking pool so in-flight requests keep moving.
async fn run_fetch_job(
    job: FetchJob,
    source: &PatchSource,
    cache: Option<&BlockStore>,
    codec: Option<Arc<Codec>>,
    max_block: usize,
) -> Result<JobDone, PatchError> {
    let retry_integrity = source.is_remote();
    let mut delay = RETRY_BASE_DELAY;

    for attempt in 1..=FETCH_ATTEMPTS {
        let result = match &job {
            FetchJob::Cache { id } => match read_cache_stored(*id, cache).await {
                Ok(stored) => {
                    decode_on_pool(*id, stored, codec.clone(), max_block, "block store").await
                }
                Err(e) => Err(e),
            },
            FetchJob::Loose { id } => match source.fetch_block(id).await {
                Ok(stored) => {
                    decode_on_pool(*id, stored, codec.clone(), max_block, "block object").await
                }
                Err(e) => Err(e.into()),
            },
            FetchJob::Bundle { id, slots, needed } => match source.fetch_bundle(id).await {
                Ok(data) => {
                    let (id, slots, needed) = (*id, slots.clone(), needed.clone());
                    let codec = codec.clone();
                    tokio::task::spawn_blocking(move || {
                        slice_bundle(id, data, &slots, &needed, codec.as_deref(), max_block)
                    })
                    .await
                    .map_err(|e| PatchError::Io(std::io::Error::other(e)))?
                }
                Err(e) => Err(e.into()),
            },
        };

        match result {
            Ok(done) => return Ok(done),
            Err(e) if attempt < FETCH_ATTEMPTS && should_retry(&e, retry_integrity) => {
                warn!(attempt, %e, "fetch failed, backing off");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(e) => return Err(e),
        }
    }
    unreachable!("fetch retry loop always returns")
}

/// Decode and verify one stored block on the blocking pool.
async fn decode_on_pool(
    id: BlockId,
    stored: Bytes,
    codec: Option<Arc<Codec>>,
    max_block: usize,
    origin: &'static str,
) -> Result<JobDone, PatchError> {
    tokio::task::spawn_blocking(move || {
        decode_job_block(id, stored, codec.as_deref(), max_block, origin)
    })
    .await
    .map_err(|e| PatchError::Io(std::io::Error::other(e)))?
}

fn should_retry(error: &PatchError, retry_integrity: bool) -> bool {
    match error {
        PatchError::Remote(e) => e.is_transient(),
        // A bad block from the network may be a corrupted transfer; the
        // same bytes from local disk will not improve on retry.
        PatchError::BlockHashMismatch { .. } | PatchError::BundleSlice { .. } => retry_integrity,
        _ => false,
    }
}

async fn read_cache_stored(
    id: BlockId,
    cache: Option<&BlockStore>,
) -> Result<Bytes, PatchError> {
    let store = cache.ok_or_else(|| {
        PatchError::Io(std::io::Error::other("cache job without a local block store"))
    })?;
    store.get(&id).await?.ok_or_else(|| {
        PatchError::Remote(strata_remote::RemoteError::NotFound {
            url: store.block_path(&id).display().to_string(),
        })
    })
}

fn decode_job_block(
    id: BlockId,
    stored: Bytes,
    codec: Option<&Codec>,
    max_block: usize,
    origin: &str,
) -> Result<JobDone, PatchError> {
    let fetched = stored.len() as u64;
    let payload = decode_block(&stored, &id, codec, max_block, origin)?;
    Ok(JobDone {
        blocks: vec![(id, payload)],
        bytes_fetched: fetched,
        was_bundle: false,
    })
}

/// Slice the needed blocks out of a fetched bundle, decode, and verify.
fn slice_bundle(
    bundle: BundleId,
    data: Bytes,
    slots: &[BundleSlot],
    needed: &[BlockId],
    codec: Option<&Codec>,
    max_block: usize,
) -> Result<JobDone, PatchError> {
    let needed: BTreeSet<&BlockId> = needed.iter().collect();
    let mut blocks = Vec::with_capacity(needed.len());

    for slot in slots {
        if !needed.contains(&slot.block) {
            continue;
        }
        let start = slot.offset as usize;
        let end = start + slot.length as usize;
        if end > data.len() {
            return Err(PatchError::BundleSlice {
                bundle,
                block: slot.block,
            });
        }
        let payload = decode_block(
            &data[start..end],
            &slot.block,
            codec,
            max_block,
            &format!("bundle {bundle}"),
        )?;
        blocks.push((slot.block, payload));
    }

    Ok(JobDone {
        blocks,
        bytes_fetched: data.len() as u64,
        was_bundle: true,
    })
}

/// Decompress (when compressed) and verify one stored block.
fn decode_block(
    stored: &[u8],
    id: &BlockId,
    codec: Option<&Codec>,
    max_block: usize,
    origin: &str,
) -> Result<Bytes, PatchError> {
    let payload = match codec {
        Some(codec) => Bytes::from(codec.decompress(stored, max_block)?),
        None => Bytes::copy_from_slice(stored),
    };
    if BlockId::from_data(&payload) != *id {
        return Err(PatchError::BlockHashMismatch {
            block: *id,
            origin: origin.to_string(),
        });
    }
    Ok(payload)
}

// ---------------------------------------------------------------------------
// Phase 4: materialise
// ---------------------------------------------------------------------------

async fn materialise(
    plans: &[FilePlan],
    install_dir: &Path,
    acquired: Arc<HashMap<BlockId, Bytes>>,
    progress: &dyn ProgressSink,
) -> Result<usize, PatchError> {
    progress.begin("write", plans.len() as u64);
    prepare_target_dirs(plans, install_dir)?;

    let semaphore = Arc::new(Semaphore::new(crate::cpu_workers()));
    let mut tasks = JoinSet::new();

    for plan in plans {
        let semaphore = semaphore.clone();
        let acquired = acquired.clone();
        let rel = plan.rel.clone();
        let blocks = plan.blocks.clone();
        let install_dir = install_dir.to_path_buf();

        tasks.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("write semaphore closed");
            tokio::task::spawn_blocking(move || {
                write_temp_file(&rel, &blocks, &install_dir, &acquired)
            })
            .await
            .map_err(|e| PatchError::Io(std::io::Error::other(e)))?
        });
    }

    // All temp files must exist (and be fsynced) before any rename, so
    // local reuse in sibling plans never reads a half-updated tree.
    let mut renames = Vec::with_capacity(plans.len());
    while let Some(joined) = tasks.join_next().await {
        match joined.map_err(|e| PatchError::Io(std::io::Error::other(e)))? {
            Ok(pair) => {
                renames.push(pair);
                progress.advance(1);
            }
            Err(e) => {
                tasks.abort_all();
                while tasks.join_next().await.is_some() {}
                clean_temp_files(install_dir)?;
                return Err(e);
            }
        }
    }

    let written = renames.len();
    for (tmp, target) in renames {
        if let Err(e) = std::fs::rename(&tmp, &target) {
            clean_temp_files(install_dir)?;
            return Err(PatchError::Io(e));
        }
    }
    Ok(written)
}

/// Remove files occupying paths the changelog needs as directories.
fn clear_path_collisions(changelog: &Changelog, install_dir: &Path) -> Result<(), PatchError> {
    for rel in changelog.files.keys() {
        let mut acc = install_dir.to_path_buf();
        let parts: Vec<&str> = rel.split('/').collect();
        for part in &parts[..parts.len().saturating_sub(1)] {
            acc.push(part);
            match std::fs::symlink_metadata(&acc) {
                Ok(meta) if !meta.is_dir() => {
                    warn!(path = %acc.display(), "removing file shadowing a target directory");
                    std::fs::remove_file(&acc)?;
                }
                _ => {}
            }
        }
    }
    Ok(())
}

/// Create every parent directory the plans will write into.
fn prepare_target_dirs(plans: &[FilePlan], install_dir: &Path) -> Result<(), PatchError> {
    for plan in plans {
        if let Some(parent) = target_path(install_dir, &plan.rel).parent() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Write one target to its temp path, verifying locally sourced blocks.
fn write_temp_file(
    rel: &str,
    blocks: &[(BlockId, Origin)],
    install_dir: &Path,
    acquired: &HashMap<BlockId, Bytes>,
) -> Result<(PathBuf, PathBuf), PatchError> {
    let target = target_path(install_dir, rel);
    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| rel.replace('/', "_"));
    let tmp = target.with_file_name(format!(".{file_name}{TEMP_SUFFIX}"));

    let mut out = std::fs::File::create(&tmp)?;
    let result = (|| {
        for (id, origin) in blocks {
            match origin {
                Origin::Fetched => {
                    let payload = acquired.get(id).ok_or_else(|| {
                        PatchError::Io(std::io::Error::other(format!(
                            "block {id} missing from acquisition set"
                        )))
                    })?;
                    out.write_all(payload)?;
                }
                Origin::Local(range) => {
                    let mut file = std::fs::File::open(&range.path)?;
                    file.seek(SeekFrom::Start(range.offset))?;
                    let mut buf = vec![0u8; range.length as usize];
                    file.read_exact(&mut buf)?;
                    // The file may have changed since the scan.
                    if BlockId::from_data(&buf) != *id {
                        return Err(PatchError::BlockHashMismatch {
                            block: *id,
                            origin: range.path.display().to_string(),
                        });
                    }
                    out.write_all(&buf)?;
                }
            }
        }
        out.sync_all()?;
        Ok(())
    })();

    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    Ok((tmp, target))
}

fn target_path(install_dir: &Path, rel: &str) -> PathBuf {
    let mut path = install_dir.to_path_buf();
    for part in rel.split('/') {
        path.push(part);
    }
    path
}

// ---------------------------------------------------------------------------
// Phase 5: prune
// ---------------------------------------------------------------------------

/// Delete files outside the changelog, then directories left empty.
fn prune_tree(changelog: &Changelog, install_dir: &Path) -> Result<usize, PatchError> {
    let mut removed = 0;

    // contents_first yields children before parents, so directory removal
    // cascades upward in one pass.
    for entry in walkdir::WalkDir::new(install_dir)
        .follow_links(false)
        .contents_first(true)
    {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue, // already removed below it
        };
        if entry.path() == install_dir {
            continue;
        }
        if entry.file_type().is_dir() {
            // Only succeeds when empty.
            let _ = std::fs::remove_dir(entry.path());
            continue;
        }
        let rel = relative_path(install_dir, entry.path());
        if !changelog.files.contains_key(&rel) {
            debug!(path = rel, "pruning orphan file");
            std::fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    Ok(removed)
}
