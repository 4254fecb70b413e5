//! Shared test harness for Strata integration tests.
//!
//! Provides tree fixtures, create/apply wrappers, and [`StubCdn`] — an
//! HTTP server over a patch-data directory with failure injection for
//! exercising the apply engine's retry path.

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use strata_engine::{
    apply_patch, create_patch, ApplyOptions, ApplyReport, CreateOptions, CreateOutcome,
    NullProgress,
};
use strata_remote::PatchSource;
use strata_types::Changelog;

/// Write a tree of files under `root`.
pub fn build_tree(root: &Path, files: &[(&str, Vec<u8>)]) {
    for (rel, data) in files {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, data).unwrap();
    }
}

/// Read back every file under `root`, keyed by normalized relative path.
pub fn snapshot(root: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut out = BTreeMap::new();
    for entry in walkdir::WalkDir::new(root).follow_links(false) {
        let entry = entry.unwrap();
        if entry.file_type().is_file() {
            let rel = entry
                .path()
                .strip_prefix(root)
                .unwrap()
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            out.insert(rel, std::fs::read(entry.path()).unwrap());
        }
    }
    out
}

/// Deterministic pseudo-random payload (Knuth LCG).
pub fn seeded_data(seed: u64, len: usize) -> Vec<u8> {
    let mut x = seed;
    (0..len)
        .map(|_| {
            x = x.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            (x >> 32) as u8
        })
        .collect()
}

/// Run `create` with no previous snapshot.
pub async fn create(tree: &Path, output: &Path, opts: &CreateOptions) -> CreateOutcome {
    create_patch(tree, output, None, opts, &NullProgress)
        .await
        .expect("create failed")
}

/// Run `create` diffing against an existing snapshot location.
pub async fn create_against(
    tree: &Path,
    output: &Path,
    previous: &str,
    opts: &CreateOptions,
) -> CreateOutcome {
    let source = PatchSource::new(previous).unwrap();
    create_patch(tree, output, Some(&source), opts, &NullProgress)
        .await
        .expect("create failed")
}

/// Apply `changelog` into `install` from the given location.
pub async fn apply(changelog: &Changelog, install: &Path, patch_data: &str) -> ApplyReport {
    try_apply(changelog, install, patch_data)
        .await
        .expect("apply failed")
}

/// Apply, returning the engine error on failure.
pub async fn try_apply(
    changelog: &Changelog,
    install: &Path,
    patch_data: &str,
) -> Result<ApplyReport, strata_engine::PatchError> {
    let source = PatchSource::new(patch_data).unwrap();
    apply_patch(
        changelog,
        install,
        &source,
        &ApplyOptions::default(),
        &NullProgress,
    )
    .await
}

// =========================================================================
// Stub CDN
// =========================================================================

/// How the stub server misbehaves.
#[derive(Clone, Copy, Default)]
pub struct FailurePolicy {
    /// Answer 500 to the first N requests for each distinct path.
    pub fail_first: u32,
    /// Answer 500 to every request.
    pub always_fail: bool,
}

struct CdnState {
    dir: PathBuf,
    policy: FailurePolicy,
    hits: Mutex<HashMap<String, u32>>,
}

/// An HTTP server exposing a patch-data directory.
pub struct StubCdn {
    addr: SocketAddr,
    state: Arc<CdnState>,
}

impl StubCdn {
    /// Serve `dir` on an ephemeral port.
    pub async fn serve(dir: &Path, policy: FailurePolicy) -> StubCdn {
        let state = Arc::new(CdnState {
            dir: dir.to_path_buf(),
            policy,
            hits: Mutex::new(HashMap::new()),
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let router = axum::Router::new()
            .fallback(serve_object)
            .with_state(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });

        StubCdn { addr, state }
    }

    /// Base URL to hand to [`PatchSource`].
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Total requests answered (including injected failures).
    pub fn request_count(&self) -> u32 {
        self.state.hits.lock().unwrap().values().sum()
    }
}

async fn serve_object(State(state): State<Arc<CdnState>>, request: Request) -> Response {
    let rel = request.uri().path().trim_start_matches('/').to_string();

    let hit = {
        let mut hits = state.hits.lock().unwrap();
        let counter = hits.entry(rel.clone()).or_insert(0);
        *counter += 1;
        *counter
    };

    if state.policy.always_fail || hit <= state.policy.fail_first {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    match std::fs::read(state.dir.join(&rel)) {
        Ok(bytes) => Response::new(Body::from(bytes)),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}
