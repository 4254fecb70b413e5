//! Changelog diffing: what a new snapshot actually adds.
//!
//! Drives upload planning (only `new_*` objects need to go out) and
//! reporting. Obsolete objects are reported, never deleted — garbage
//! collection is a separate, explicit operation.

use std::collections::BTreeSet;

use strata_types::{BlockId, BundleId, Changelog};

/// Differences between two changelogs.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Diff {
    /// Blocks referenced by the new changelog but not the previous one.
    pub new_blocks: BTreeSet<BlockId>,
    /// Bundles in the new changelog but not the previous one.
    pub new_bundles: BTreeSet<BundleId>,
    /// Blocks the previous changelog referenced that the new one does not.
    pub obsolete_blocks: BTreeSet<BlockId>,
    /// Bundles the previous changelog had that the new one does not.
    pub obsolete_bundles: BTreeSet<BundleId>,
}

/// Compare `next` against an optional previous changelog.
///
/// With no previous changelog, everything in `next` is new.
pub fn diff(previous: Option<&Changelog>, next: &Changelog) -> Diff {
    let next_blocks: BTreeSet<BlockId> = next.block_index.keys().copied().collect();
    let next_bundles: BTreeSet<BundleId> = next.bundles.keys().copied().collect();

    let (prev_blocks, prev_bundles) = match previous {
        Some(prev) => (
            prev.block_index.keys().copied().collect::<BTreeSet<_>>(),
            prev.bundles.keys().copied().collect::<BTreeSet<_>>(),
        ),
        None => (BTreeSet::new(), BTreeSet::new()),
    };

    Diff {
        new_blocks: next_blocks.difference(&prev_blocks).copied().collect(),
        new_bundles: next_bundles.difference(&prev_bundles).copied().collect(),
        obsolete_blocks: prev_blocks.difference(&next_blocks).copied().collect(),
        obsolete_bundles: prev_bundles.difference(&next_bundles).copied().collect(),
    }
}
