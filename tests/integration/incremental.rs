//! Integration: incremental builds — diff minimality, bundle stability,
//! idempotent apply.

use strata_engine::CreateOptions;
use strata_integration_tests::{
    apply, build_tree, create, create_against, seeded_data, snapshot,
};

/// Editing a few bytes mid-file produces at most two new blocks.
#[tokio::test]
async fn middle_edit_is_incrementally_minimal() {
    let tree = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();

    let mut payload = seeded_data(42, 400_000);
    build_tree(tree.path(), &[("b.bin", payload.clone())]);
    let v1 = create(tree.path(), data.path(), &CreateOptions::default()).await;

    payload[100_000] = payload[100_000].wrapping_add(1);
    build_tree(tree.path(), &[("b.bin", payload)]);
    let v2 = create_against(
        tree.path(),
        data.path(),
        data.path().to_str().unwrap(),
        &CreateOptions::default(),
    )
    .await;

    assert!(
        v2.diff.new_blocks.len() <= 2,
        "one-byte edit produced {} new blocks",
        v2.diff.new_blocks.len()
    );
    assert_eq!(v2.changelog.version, v1.changelog.version + 1);
}

/// Blocks that did not change keep their bundle id across versions.
#[tokio::test]
async fn unchanged_blocks_keep_their_bundles() {
    let tree = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();

    build_tree(
        tree.path(),
        &[
            ("stable.bin", seeded_data(7, 120_000)),
            ("volatile.txt", b"v1".to_vec()),
        ],
    );
    let v1 = create(tree.path(), data.path(), &CreateOptions::default()).await;

    build_tree(tree.path(), &[("volatile.txt", b"v2 changed".to_vec())]);
    let v2 = create_against(
        tree.path(),
        data.path(),
        data.path().to_str().unwrap(),
        &CreateOptions::default(),
    )
    .await;

    for block in &v1.changelog.files["stable.bin"] {
        assert_eq!(
            v1.changelog.block_index[block], v2.changelog.block_index[block],
            "stable block moved bundles between versions"
        );
    }
}

/// A second apply of the same changelog performs zero writes and fetches.
#[tokio::test]
async fn reapply_is_idempotent() {
    let tree = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    let install = tempfile::tempdir().unwrap();

    build_tree(
        tree.path(),
        &[
            ("one", seeded_data(1, 90_000)),
            ("two", seeded_data(2, 90_000)),
        ],
    );
    let outcome = create(tree.path(), data.path(), &CreateOptions::default()).await;
    let location = data.path().to_str().unwrap();

    let first = apply(&outcome.changelog, install.path(), location).await;
    assert_eq!(first.files_written, 2);

    let second = apply(&outcome.changelog, install.path(), location).await;
    assert_eq!(second.files_written, 0);
    assert_eq!(second.files_clean, 2);
    assert_eq!(second.bytes_fetched, 0);
    assert_eq!(second.files_pruned, 0);
}

/// Upgrading an older installation only rewrites the changed file.
#[tokio::test]
async fn upgrade_rewrites_only_changed_files() {
    let tree = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    let install = tempfile::tempdir().unwrap();

    build_tree(
        tree.path(),
        &[
            ("lib/core.so", seeded_data(11, 250_000)),
            ("etc/config", b"threads = 4\n".to_vec()),
        ],
    );
    let v1 = create(tree.path(), data.path(), &CreateOptions::default()).await;
    apply(&v1.changelog, install.path(), data.path().to_str().unwrap()).await;

    build_tree(tree.path(), &[("etc/config", b"threads = 8\n".to_vec())]);
    let v2 = create_against(
        tree.path(),
        data.path(),
        data.path().to_str().unwrap(),
        &CreateOptions::default(),
    )
    .await;

    let report = apply(&v2.changelog, install.path(), data.path().to_str().unwrap()).await;
    assert_eq!(report.files_written, 1, "only etc/config changed");
    assert_eq!(report.files_clean, 1);
    assert_eq!(snapshot(install.path()), snapshot(tree.path()));
}

/// Deleting a file in the source removes it from the installation.
#[tokio::test]
async fn deleted_files_are_pruned_on_upgrade() {
    let tree = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    let install = tempfile::tempdir().unwrap();

    build_tree(
        tree.path(),
        &[
            ("keep.bin", seeded_data(3, 60_000)),
            ("remove-me.bin", seeded_data(4, 60_000)),
        ],
    );
    let v1 = create(tree.path(), data.path(), &CreateOptions::default()).await;
    apply(&v1.changelog, install.path(), data.path().to_str().unwrap()).await;

    std::fs::remove_file(tree.path().join("remove-me.bin")).unwrap();
    let v2 = create_against(
        tree.path(),
        data.path(),
        data.path().to_str().unwrap(),
        &CreateOptions::default(),
    )
    .await;

    let report = apply(&v2.changelog, install.path(), data.path().to_str().unwrap()).await;
    assert_eq!(report.files_pruned, 1);
    assert_eq!(snapshot(install.path()), snapshot(tree.path()));
    assert!(!v2.diff.obsolete_blocks.is_empty(), "differ reports obsolete blocks");
}
