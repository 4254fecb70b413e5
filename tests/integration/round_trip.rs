//! Integration: create → apply round trips.

use strata_engine::CreateOptions;
use strata_integration_tests::{apply, build_tree, create, seeded_data, snapshot};

/// A small text file and a 200 KB zero run with 64 KB average blocks.
/// Zeros carry no content boundaries, so FastCDC may collapse the run
/// into fewer, larger blocks — only the text file's single block is a
/// firm expectation.
#[tokio::test]
async fn small_tree_round_trips_byte_for_byte() {
    let tree = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    let install = tempfile::tempdir().unwrap();

    build_tree(
        tree.path(),
        &[
            ("a.txt", b"hello".to_vec()),
            ("b.bin", vec![0u8; 200 * 1024]),
        ],
    );

    let outcome = create(tree.path(), data.path(), &CreateOptions::default()).await;

    assert_eq!(outcome.changelog.files["a.txt"].len(), 1);
    let b_blocks = outcome.changelog.files["b.bin"].len();
    assert!(
        (1..=4).contains(&b_blocks),
        "200 KB of zeros should land in 1..=4 blocks, got {b_blocks}"
    );
    assert_eq!(
        outcome.changelog.total_uncompressed_bytes,
        5 + 200 * 1024
    );

    apply(
        &outcome.changelog,
        install.path(),
        data.path().to_str().unwrap(),
    )
    .await;
    assert_eq!(snapshot(install.path()), snapshot(tree.path()));
}

/// Two files with identical content share one block id referenced twice.
#[tokio::test]
async fn identical_files_share_one_block() {
    let tree = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    let install = tempfile::tempdir().unwrap();

    let payload = seeded_data(17, 30_000);
    build_tree(
        tree.path(),
        &[("x", payload.clone()), ("y", payload)],
    );

    let outcome = create(tree.path(), data.path(), &CreateOptions::default()).await;
    assert_eq!(outcome.changelog.files["x"], outcome.changelog.files["y"]);
    assert_eq!(
        outcome.changelog.block_index.len(),
        outcome.changelog.files["x"].len(),
        "shared content must not duplicate blocks"
    );

    apply(
        &outcome.changelog,
        install.path(),
        data.path().to_str().unwrap(),
    )
    .await;
    assert_eq!(snapshot(install.path()), snapshot(tree.path()));
}

/// Compressed snapshot over compressible text reconstructs exactly,
/// including a high-entropy binary that defeats the dictionary.
#[tokio::test]
async fn compressed_snapshot_round_trips() {
    let tree = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    let install = tempfile::tempdir().unwrap();

    let mut files: Vec<(String, Vec<u8>)> = (0..400)
        .map(|i| {
            (
                format!("text/chapter-{i:03}.txt"),
                format!(
                    "It was the best of builds, it was the worst of builds. \
                     Release {i} shipped on time and nothing broke, chapter {i}."
                )
                .into_bytes(),
            )
        })
        .collect();
    files.push(("noise.bin".to_string(), seeded_data(99, 150_000)));

    let spec: Vec<(&str, Vec<u8>)> = files
        .iter()
        .map(|(name, data)| (name.as_str(), data.clone()))
        .collect();
    build_tree(tree.path(), &spec);

    let opts = CreateOptions {
        compress: true,
        ..CreateOptions::default()
    };
    let outcome = create(tree.path(), data.path(), &opts).await;
    assert!(outcome.changelog.compressed);
    assert!(outcome.changelog.dictionary_id.is_some());

    apply(
        &outcome.changelog,
        install.path(),
        data.path().to_str().unwrap(),
    )
    .await;
    assert_eq!(snapshot(install.path()), snapshot(tree.path()));
}

/// After apply, the install dir holds exactly the changelog's files.
#[tokio::test]
async fn orphans_are_removed() {
    let tree = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    let install = tempfile::tempdir().unwrap();

    build_tree(tree.path(), &[("app/main", seeded_data(1, 40_000))]);
    build_tree(
        install.path(),
        &[
            ("app/main", b"stale".to_vec()),
            ("app/old-plugin.so", b"gone".to_vec()),
            ("cache/junk/tmpfile", b"gone".to_vec()),
        ],
    );

    let outcome = create(tree.path(), data.path(), &CreateOptions::default()).await;
    apply(
        &outcome.changelog,
        install.path(),
        data.path().to_str().unwrap(),
    )
    .await;

    let files: Vec<String> = snapshot(install.path()).into_keys().collect();
    assert_eq!(files, vec!["app/main"]);
    assert!(!install.path().join("cache").exists());
}

/// Empty files and deeply nested paths survive the round trip.
#[tokio::test]
async fn empty_files_and_nesting() {
    let tree = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    let install = tempfile::tempdir().unwrap();

    build_tree(
        tree.path(),
        &[
            ("empty", Vec::new()),
            ("a/b/c/d/e/deep.txt", b"deep".to_vec()),
        ],
    );

    let outcome = create(tree.path(), data.path(), &CreateOptions::default()).await;
    assert!(outcome.changelog.files["empty"].is_empty());

    apply(
        &outcome.changelog,
        install.path(),
        data.path().to_str().unwrap(),
    )
    .await;
    assert_eq!(snapshot(install.path()), snapshot(tree.path()));
}
