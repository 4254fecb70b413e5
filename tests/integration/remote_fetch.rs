//! Integration: applying over HTTP, including retry behaviour.

use strata_engine::{CreateOptions, PatchError};
use strata_integration_tests::{
    apply, build_tree, create, seeded_data, snapshot, try_apply, FailurePolicy, StubCdn,
};

/// Plain remote apply into an empty directory.
#[tokio::test]
async fn remote_apply_reconstructs_tree() {
    let tree = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    let install = tempfile::tempdir().unwrap();

    build_tree(
        tree.path(),
        &[
            ("bin/app", seeded_data(5, 300_000)),
            ("share/readme.txt", b"remote apply".to_vec()),
        ],
    );
    let outcome = create(tree.path(), data.path(), &CreateOptions::default()).await;

    let cdn = StubCdn::serve(data.path(), FailurePolicy::default()).await;
    apply(&outcome.changelog, install.path(), &cdn.url()).await;

    assert_eq!(snapshot(install.path()), snapshot(tree.path()));
}

/// One 500 per object: the retry loop absorbs it and apply succeeds.
#[tokio::test]
async fn single_500_per_object_is_retried() {
    let tree = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    let install = tempfile::tempdir().unwrap();

    build_tree(tree.path(), &[("payload.bin", seeded_data(6, 200_000))]);
    let outcome = create(tree.path(), data.path(), &CreateOptions::default()).await;

    let cdn = StubCdn::serve(data.path(), FailurePolicy { fail_first: 1, ..Default::default() })
        .await;
    apply(&outcome.changelog, install.path(), &cdn.url()).await;

    assert_eq!(snapshot(install.path()), snapshot(tree.path()));
    assert!(cdn.request_count() > 1, "retries must have happened");
}

/// Persistent 500s exhaust the retries; apply fails with a network error
/// and leaves no partial files behind.
#[tokio::test]
async fn persistent_500_fails_without_partial_files() {
    let tree = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    let install = tempfile::tempdir().unwrap();

    build_tree(tree.path(), &[("payload.bin", seeded_data(8, 150_000))]);
    let outcome = create(tree.path(), data.path(), &CreateOptions::default()).await;

    let cdn = StubCdn::serve(data.path(), FailurePolicy { always_fail: true, ..Default::default() })
        .await;
    let err = try_apply(&outcome.changelog, install.path(), &cdn.url())
        .await
        .unwrap_err();

    assert!(
        matches!(err, PatchError::Remote(_)),
        "expected a network error, got {err:?}"
    );
    assert!(
        snapshot(install.path()).is_empty(),
        "failed apply must leave no partial files"
    );
}

/// Remote apply with compression: the dictionary travels over HTTP too.
#[tokio::test]
async fn compressed_remote_apply() {
    let tree = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    let install = tempfile::tempdir().unwrap();

    let spec: Vec<(String, Vec<u8>)> = (0..300)
        .map(|i| {
            (
                format!("rows/row-{i:04}.csv"),
                format!("{i},widget-{i},in-stock,{}\n", i * 3 % 97).into_bytes(),
            )
        })
        .collect();
    let spec_refs: Vec<(&str, Vec<u8>)> = spec
        .iter()
        .map(|(name, data)| (name.as_str(), data.clone()))
        .collect();
    build_tree(tree.path(), &spec_refs);

    let opts = CreateOptions {
        compress: true,
        ..CreateOptions::default()
    };
    let outcome = create(tree.path(), data.path(), &opts).await;
    assert!(outcome.changelog.compressed);

    let cdn = StubCdn::serve(data.path(), FailurePolicy::default()).await;
    apply(&outcome.changelog, install.path(), &cdn.url()).await;

    assert_eq!(snapshot(install.path()), snapshot(tree.path()));
}

/// An interrupted (failed) apply resumes cleanly: the rerun against a
/// healthy server completes from whatever state was left.
#[tokio::test]
async fn apply_is_resumable_after_failure() {
    let tree = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    let install = tempfile::tempdir().unwrap();

    build_tree(
        tree.path(),
        &[
            ("a.bin", seeded_data(21, 120_000)),
            ("b.bin", seeded_data(22, 120_000)),
        ],
    );
    let outcome = create(tree.path(), data.path(), &CreateOptions::default()).await;

    let broken = StubCdn::serve(data.path(), FailurePolicy { always_fail: true, ..Default::default() })
        .await;
    try_apply(&outcome.changelog, install.path(), &broken.url())
        .await
        .unwrap_err();

    let healthy = StubCdn::serve(data.path(), FailurePolicy::default()).await;
    apply(&outcome.changelog, install.path(), &healthy.url()).await;
    assert_eq!(snapshot(install.path()), snapshot(tree.path()));
}
