//! Installation validation: does the tree match the changelog?
//!
//! Rechunks every manifest file and compares ordered block ids, then
//! checks for files the changelog does not know about. Read-only.

use std::path::Path;
use std::sync::Arc;

use strata_cas::Chunker;
use strata_types::Changelog;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

use crate::builder::collect_files;
use crate::error::PatchError;
use crate::progress::ProgressSink;

/// Outcome of validating an installation.
#[derive(Debug, Default)]
pub struct ValidationReport {
    /// Manifest files absent from the installation.
    pub missing: Vec<String>,
    /// Files present but with a different block list.
    pub mismatched: Vec<String>,
    /// Files in the installation the changelog does not list.
    pub extra: Vec<String>,
}

impl ValidationReport {
    /// True when the installation matches the changelog exactly.
    pub fn is_valid(&self) -> bool {
        self.missing.is_empty() && self.mismatched.is_empty() && self.extra.is_empty()
    }
}

/// Check `install_dir` against `changelog` without mutating anything.
pub async fn validate_install(
    changelog: &Changelog,
    install_dir: &Path,
    progress: &dyn ProgressSink,
) -> Result<ValidationReport, PatchError> {
    changelog.validate()?;
    if !install_dir.is_dir() {
        // An empty changelog can never match, and a missing directory
        // means every file is missing.
        return Ok(ValidationReport {
            missing: changelog.files.keys().cloned().collect(),
            ..ValidationReport::default()
        });
    }

    let entries = collect_files(install_dir)?;
    progress.begin("validate", entries.len() as u64);

    let mut report = ValidationReport::default();
    let present: std::collections::BTreeSet<String> =
        entries.iter().map(|(rel, _)| rel.clone()).collect();

    for rel in changelog.files.keys() {
        if !present.contains(rel) {
            report.missing.push(rel.clone());
        }
    }

    let chunker = Chunker::new(changelog.block_size)?;
    let semaphore = Arc::new(Semaphore::new(crate::cpu_workers()));
    let mut tasks = JoinSet::new();

    for (rel, abs) in entries {
        let semaphore = semaphore.clone();
        let expected = changelog.files.get(&rel).cloned();
        tasks.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("validate semaphore closed");
            let Some(expected) = expected else {
                return Ok::<_, PatchError>((rel, false));
            };
            let blocks = tokio::task::spawn_blocking(move || chunker.chunk_file(&abs))
                .await
                .map_err(|e| PatchError::Io(std::io::Error::other(e)))??;
            let matches = blocks.iter().map(|b| b.id).eq(expected.iter().copied());
            Ok((rel, matches))
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let (rel, matches) = joined.map_err(|e| PatchError::Io(std::io::Error::other(e)))??;
        if changelog.files.contains_key(&rel) {
            if !matches {
                report.mismatched.push(rel);
            }
        } else {
            report.extra.push(rel);
        }
        progress.advance(1);
    }

    report.missing.sort();
    report.mismatched.sort();
    report.extra.sort();

    debug!(
        missing = report.missing.len(),
        mismatched = report.mismatched.len(),
        extra = report.extra.len(),
        "validation finished"
    );
    Ok(report)
}
