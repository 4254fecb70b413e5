//! `strata` — content-addressed binary patching for software distribution.
//!
//! # Usage
//!
//! ```text
//! strata create ./build --compress              # produce ./patch-data
//! strata create ./build --patch-data https://cdn.example.com/app
//! strata upload ./patch-data                    # push new objects, purge changelog
//! strata apply ./install --patch-data https://cdn.example.com/app
//! strata validate ./install --patch-data ./patch-data
//! ```

mod progress;
mod telemetry;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use strata_engine::{
    apply_patch, clean_temp_files, create_patch, validate_install, ApplyOptions, CreateOptions,
};
use strata_remote::{Credentials, ObjectStore, PatchSource, RemoteError};
use strata_types::{
    Changelog, BLOCKS_DIR, BUNDLES_DIR, CHANGELOG_FILE_NAME, DICTIONARY_FILE_NAME,
    VERSION_FILE_NAME,
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use progress::ConsoleProgress;

// -----------------------------------------------------------------------
// CLI definition
// -----------------------------------------------------------------------

#[derive(Parser)]
#[command(
    name = "strata",
    version,
    about = "Content-addressed binary patching for software distribution"
)]
struct Cli {
    /// Log level filter (e.g. "info", "debug"). RUST_LOG overrides.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Produce a patch-data directory from a source tree.
    Create {
        /// The directory to process.
        directory: PathBuf,

        /// Average block size in bytes.
        #[arg(long, default_value_t = strata_cas::DEFAULT_BLOCK_SIZE)]
        block_size: u32,

        /// Compress blocks with a trained dictionary.
        #[arg(short, long)]
        compress: bool,

        /// Zstd compression level.
        #[arg(long, default_value_t = strata_cas::DEFAULT_COMPRESSION_LEVEL)]
        compression_level: i32,

        /// External dictionary file (loaded if present, written otherwise).
        #[arg(long)]
        dict_path: Option<PathBuf>,

        /// Train a fresh dictionary even when one could be reused.
        #[arg(long)]
        regen_dict: bool,

        /// Output directory for the patch data.
        #[arg(short, long, default_value = "./patch-data")]
        output: PathBuf,

        /// Path or URL of the previous patch data (defaults to --output).
        #[arg(long)]
        patch_data: Option<String>,
    },

    /// Upload a patch-data directory to the object store.
    Upload {
        /// The patch-data directory produced by `create`.
        patch_data_dir: PathBuf,

        /// Upload every object, even those already present remotely.
        #[arg(long)]
        all: bool,
    },

    /// Reconstruct an installation from patch data.
    Apply {
        /// The installation directory.
        install_dir: PathBuf,

        /// Path or URL of the patch data.
        #[arg(long)]
        patch_data: String,

        /// Treat stored blocks as uncompressed regardless of the changelog.
        #[arg(long)]
        no_compression: bool,
    },

    /// Check an installation against its changelog. Exit 0 on match.
    Validate {
        /// The installation directory.
        install_dir: PathBuf,

        /// Path or URL of the patch data.
        #[arg(long)]
        patch_data: String,
    },
}

// -----------------------------------------------------------------------
// Entrypoint
// -----------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init(&cli.log_level);

    match cli.command {
        Commands::Create {
            directory,
            block_size,
            compress,
            compression_level,
            dict_path,
            regen_dict,
            output,
            patch_data,
        } => {
            let opts = CreateOptions {
                block_size,
                compress,
                compression_level,
                dict_path,
                regen_dict,
            };
            cmd_create(&directory, &output, patch_data.as_deref(), &opts).await
        }
        Commands::Upload {
            patch_data_dir,
            all,
        } => cmd_upload(&patch_data_dir, all).await,
        Commands::Apply {
            install_dir,
            patch_data,
            no_compression,
        } => cmd_apply(&install_dir, &patch_data, no_compression).await,
        Commands::Validate {
            install_dir,
            patch_data,
        } => cmd_validate(&install_dir, &patch_data).await,
    }
}

// -----------------------------------------------------------------------
// strata create
// -----------------------------------------------------------------------

async fn cmd_create(
    directory: &PathBuf,
    output: &PathBuf,
    patch_data: Option<&str>,
    opts: &CreateOptions,
) -> Result<()> {
    // The previous snapshot defaults to the output directory itself, so
    // repeated builds into the same staging dir diff naturally.
    let previous_location = patch_data
        .map(str::to_string)
        .unwrap_or_else(|| output.display().to_string());
    let previous = match PatchSource::new(&previous_location) {
        Ok(source) => Some(source),
        Err(RemoteError::BadLocation(_)) => None,
        Err(e) => return Err(e).context("invalid --patch-data location"),
    };

    let progress = ConsoleProgress::new();
    let outcome = create_patch(directory, output, previous.as_ref(), opts, &progress)
        .await
        .context("create failed")?;
    progress.finish();

    println!(
        "version {} — {} files, {} blocks in {} bundles",
        outcome.changelog.version,
        outcome.changelog.files.len(),
        outcome.changelog.block_index.len(),
        outcome.changelog.bundles.len(),
    );
    println!(
        "new since previous: {} blocks, {} bundles (obsolete: {} blocks, {} bundles)",
        outcome.diff.new_blocks.len(),
        outcome.diff.new_bundles.len(),
        outcome.diff.obsolete_blocks.len(),
        outcome.diff.obsolete_bundles.len(),
    );
    Ok(())
}

// -----------------------------------------------------------------------
// strata upload
// -----------------------------------------------------------------------

async fn cmd_upload(patch_data_dir: &PathBuf, all: bool) -> Result<()> {
    let creds = match Credentials::from_env() {
        Ok(creds) => creds,
        Err(RemoteError::MissingCredential(name)) => {
            bail!("upload disabled: {name} is not set");
        }
        Err(e) => return Err(e.into()),
    };
    let store = Arc::new(ObjectStore::new(creds)?);

    let changelog = read_local_changelog(patch_data_dir)
        .await
        .context("patch-data directory has no readable changelog")?;

    // Content-addressed objects: skip what the bucket already has unless
    // --all forces a full resync.
    let existing: std::collections::HashSet<String> = if all {
        Default::default()
    } else {
        let mut keys = store.list(BLOCKS_DIR).await?;
        keys.extend(store.list(BUNDLES_DIR).await?);
        keys.into_iter().collect()
    };

    let mut keys: Vec<String> = Vec::new();
    for id in changelog.block_index.keys() {
        keys.push(format!("{BLOCKS_DIR}/{}/{id}", id.shard_prefix()));
    }
    for id in changelog.bundles.keys() {
        keys.push(format!("{BUNDLES_DIR}/{id}"));
    }
    keys.retain(|k| !existing.contains(k));

    let total = keys.len();
    info!(objects = total, all, "uploading patch data");

    // Immutable objects go out with bounded concurrency; the changelog
    // goes last so a concurrent applier never sees it reference objects
    // that are not there yet.
    let semaphore = Arc::new(Semaphore::new(strata_engine::FETCH_CONCURRENCY));
    let mut tasks = JoinSet::new();
    for key in keys {
        let store = store.clone();
        let semaphore = semaphore.clone();
        let path = patch_data_dir.join(&key);
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("upload semaphore");
            let body = tokio::fs::read(&path)
                .await
                .with_context(|| format!("missing local object {}", path.display()))?;
            store.put(&key, Bytes::from(body)).await?;
            Ok::<_, anyhow::Error>(key)
        });
    }

    let progress = ConsoleProgress::new();
    progress.begin_phase("upload", total as u64);
    while let Some(joined) = tasks.join_next().await {
        let key = joined.context("upload task failed")??;
        tracing::debug!(key, "uploaded");
        progress.advance_by(1);
    }
    progress.finish();

    for name in [DICTIONARY_FILE_NAME, VERSION_FILE_NAME] {
        let path = patch_data_dir.join(name);
        if path.exists() {
            store
                .put(name, Bytes::from(tokio::fs::read(&path).await?))
                .await?;
        }
    }
    let changelog_bytes = tokio::fs::read(patch_data_dir.join(CHANGELOG_FILE_NAME)).await?;
    store
        .put(CHANGELOG_FILE_NAME, Bytes::from(changelog_bytes))
        .await?;

    // Everything else is content-addressed and immutable; the changelog
    // is the only object a CDN can serve stale.
    store.purge_cache(CHANGELOG_FILE_NAME).await?;

    println!("uploaded {total} objects + changelog (version {})", changelog.version);
    Ok(())
}

// -----------------------------------------------------------------------
// strata apply
// -----------------------------------------------------------------------

async fn cmd_apply(install_dir: &PathBuf, patch_data: &str, no_compression: bool) -> Result<()> {
    let source = PatchSource::new(patch_data).context("invalid --patch-data location")?;
    let changelog = source
        .load_changelog()
        .await
        .context("failed to load changelog")?
        .with_context(|| format!("no changelog found at {}", source.location()))?;

    let opts = ApplyOptions {
        assume_uncompressed: no_compression,
        ..ApplyOptions::default()
    };
    let progress = ConsoleProgress::new();

    let report = tokio::select! {
        result = apply_patch(&changelog, install_dir, &source, &opts, &progress) => {
            result.context("apply failed")?
        }
        _ = shutdown_signal() => {
            // In-flight work is dropped with the future; only temp files
            // can be left behind, and they are safe to delete.
            clean_temp_files(install_dir).ok();
            bail!("apply interrupted, partial temp files cleaned up");
        }
    };
    progress.finish();

    println!(
        "version {}: {} written, {} already clean, {} pruned ({} bytes fetched)",
        changelog.version,
        report.files_written,
        report.files_clean,
        report.files_pruned,
        report.bytes_fetched,
    );
    Ok(())
}

/// Wait for SIGINT (Ctrl-C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => warn!("received SIGINT, cancelling"),
        () = terminate => warn!("received SIGTERM, cancelling"),
    }
}

// -----------------------------------------------------------------------
// strata validate
// -----------------------------------------------------------------------

async fn cmd_validate(install_dir: &PathBuf, patch_data: &str) -> Result<()> {
    let source = PatchSource::new(patch_data).context("invalid --patch-data location")?;
    let changelog = source
        .load_changelog()
        .await
        .context("failed to load changelog")?
        .with_context(|| format!("no changelog found at {}", source.location()))?;

    let progress = ConsoleProgress::new();
    let report = validate_install(&changelog, install_dir, &progress)
        .await
        .context("validate failed")?;
    progress.finish();

    if report.is_valid() {
        println!("ok: installation matches changelog version {}", changelog.version);
        return Ok(());
    }

    for path in &report.missing {
        println!("missing: {path}");
    }
    for path in &report.mismatched {
        println!("mismatched: {path}");
    }
    for path in &report.extra {
        println!("extra: {path}");
    }
    std::process::exit(1);
}

// -----------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------

async fn read_local_changelog(dir: &std::path::Path) -> Result<Changelog> {
    let bytes = tokio::fs::read(dir.join(CHANGELOG_FILE_NAME)).await?;
    let changelog: Changelog = serde_json::from_slice(&bytes)?;
    changelog.validate()?;
    Ok(changelog)
}
