//! Integration: validator soundness.

use strata_engine::{validate_install, CreateOptions, NullProgress};
use strata_integration_tests::{apply, build_tree, create, seeded_data};

/// `validate(apply(create(T)))` holds for a fresh installation.
#[tokio::test]
async fn freshly_applied_install_validates() {
    let tree = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    let install = tempfile::tempdir().unwrap();

    build_tree(
        tree.path(),
        &[
            ("bin/tool", seeded_data(31, 180_000)),
            ("doc/notes.md", b"# notes\n".to_vec()),
        ],
    );
    let outcome = create(tree.path(), data.path(), &CreateOptions::default()).await;
    apply(&outcome.changelog, install.path(), data.path().to_str().unwrap()).await;

    let report = validate_install(&outcome.changelog, install.path(), &NullProgress)
        .await
        .unwrap();
    assert!(report.is_valid(), "{report:?}");
}

/// Truncating one file flips validation to false and mutates nothing.
#[tokio::test]
async fn truncated_file_fails_validation() {
    let tree = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    let install = tempfile::tempdir().unwrap();

    build_tree(tree.path(), &[("big.bin", seeded_data(32, 150_000))]);
    let outcome = create(tree.path(), data.path(), &CreateOptions::default()).await;
    apply(&outcome.changelog, install.path(), data.path().to_str().unwrap()).await;

    let target = install.path().join("big.bin");
    let original = std::fs::read(&target).unwrap();
    std::fs::write(&target, &original[..1000]).unwrap();

    let report = validate_install(&outcome.changelog, install.path(), &NullProgress)
        .await
        .unwrap();
    assert!(!report.is_valid());
    assert_eq!(report.mismatched, vec!["big.bin"]);
    assert_eq!(
        std::fs::read(&target).unwrap(),
        &original[..1000],
        "validation must not repair or touch files"
    );
}

/// Every single-byte corruption anywhere is caught.
#[tokio::test]
async fn any_single_byte_flip_is_caught() {
    let tree = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    let install = tempfile::tempdir().unwrap();

    build_tree(tree.path(), &[("blob", seeded_data(33, 64_000))]);
    let outcome = create(tree.path(), data.path(), &CreateOptions::default()).await;
    apply(&outcome.changelog, install.path(), data.path().to_str().unwrap()).await;

    let target = install.path().join("blob");
    let pristine = std::fs::read(&target).unwrap();

    // Probe a spread of positions rather than all 64k.
    for pos in [0usize, 1, 31_999, 32_000, 63_998, 63_999] {
        let mut corrupted = pristine.clone();
        corrupted[pos] ^= 0x01;
        std::fs::write(&target, &corrupted).unwrap();

        let report = validate_install(&outcome.changelog, install.path(), &NullProgress)
            .await
            .unwrap();
        assert!(!report.is_valid(), "flip at {pos} not caught");
    }

    std::fs::write(&target, &pristine).unwrap();
    let report = validate_install(&outcome.changelog, install.path(), &NullProgress)
        .await
        .unwrap();
    assert!(report.is_valid());
}

/// Extra files fail validation even when every manifest file matches.
#[tokio::test]
async fn extra_files_fail_validation() {
    let tree = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    let install = tempfile::tempdir().unwrap();

    build_tree(tree.path(), &[("app", seeded_data(34, 40_000))]);
    let outcome = create(tree.path(), data.path(), &CreateOptions::default()).await;
    apply(&outcome.changelog, install.path(), data.path().to_str().unwrap()).await;

    std::fs::write(install.path().join("debug.log"), b"left behind").unwrap();

    let report = validate_install(&outcome.changelog, install.path(), &NullProgress)
        .await
        .unwrap();
    assert!(!report.is_valid());
    assert_eq!(report.extra, vec!["debug.log"]);
}
