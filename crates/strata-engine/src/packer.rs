//! Bundle packing: grouping blocks into transfer-sized objects.
//!
//! Bundles amortize per-request overhead on the CDN. Two rules shape the
//! packing:
//!
//! 1. **Stability.** A block that already lives in a bundle of the
//!    previous changelog keeps that assignment — the old bundle object is
//!    immutable and cached, and apply fetches the block from it. Only
//!    genuinely new blocks are packed into new bundles.
//! 2. **Locality.** New blocks are packed walking files in sorted order,
//!    a file's blocks contiguous and in file order, so fetching one
//!    bundle tends to materialize whole files. A bundle is flushed at
//!    [`BUNDLE_SIZE_CAP`]; a file is split across bundles only when the
//!    file alone exceeds the cap.

use std::collections::{BTreeMap, BTreeSet};

use bytes::Bytes;
use sha2::{Digest, Sha256};
use strata_types::{BlockId, BundleId, BundleSlot, Changelog};
use tracing::debug;

/// Stored-size cap for a single bundle (16 MB).
pub const BUNDLE_SIZE_CAP: u64 = 16 * 1024 * 1024;

/// A freshly packed bundle, ready to be written.
pub struct PackedBundle {
    /// Bundle identity: sha256 of the concatenated uncompressed payloads.
    pub id: BundleId,
    /// Member slots with stored-form offsets.
    pub slots: Vec<BundleSlot>,
    /// The bundle object: concatenated stored forms.
    pub data: Bytes,
}

/// Result of a packing run.
pub struct Packing {
    /// All bundle memberships for the changelog (carried + new).
    pub bundles: BTreeMap<BundleId, Vec<BundleSlot>>,
    /// Referenced block → serving bundle.
    pub block_index: BTreeMap<BlockId, BundleId>,
    /// Bundles that must be written to the patch-data directory.
    pub new_bundles: Vec<PackedBundle>,
    /// Bundle ids inherited from the previous changelog (objects already
    /// exist remotely and are never rewritten).
    pub carried: BTreeSet<BundleId>,
}

/// Assign every referenced block to exactly one bundle.
///
/// `stored` holds each block's stored form (compressed when the snapshot
/// is compressed), `payloads` the uncompressed bytes used for bundle
/// identity. `previous` carries forward old assignments; the caller must
/// pass `None` when the compression context changed, because old slot
/// tables describe old stored forms.
pub fn pack_bundles(
    files: &BTreeMap<String, Vec<BlockId>>,
    stored: &BTreeMap<BlockId, Bytes>,
    payloads: &BTreeMap<BlockId, Bytes>,
    previous: Option<&Changelog>,
) -> Packing {
    let referenced: BTreeSet<BlockId> = files.values().flatten().copied().collect();

    let mut bundles = BTreeMap::new();
    let mut block_index = BTreeMap::new();
    let mut carried = BTreeSet::new();

    // Carry forward every previous bundle that still serves at least one
    // referenced block. The slot table is copied verbatim: it describes
    // the existing immutable object, unreferenced neighbours included.
    if let Some(prev) = previous {
        for (bundle_id, slots) in &prev.bundles {
            let still_used: Vec<BlockId> = slots
                .iter()
                .map(|s| s.block)
                .filter(|b| referenced.contains(b))
                .collect();
            if still_used.is_empty() {
                continue;
            }
            bundles.insert(*bundle_id, slots.clone());
            carried.insert(*bundle_id);
            for block in still_used {
                block_index.entry(block).or_insert(*bundle_id);
            }
        }
    }

    // Pack the remaining blocks, file by file in sorted order.
    let mut new_bundles = Vec::new();
    let mut pending: Vec<BlockId> = Vec::new();
    let mut pending_set: BTreeSet<BlockId> = BTreeSet::new();
    let mut pending_size = 0u64;

    let stored_len = |block: &BlockId| -> u64 {
        stored
            .get(block)
            .expect("stored form recorded for every scanned block")
            .len() as u64
    };

    let mut flush =
        |pending: &mut Vec<BlockId>, pending_set: &mut BTreeSet<BlockId>, size: &mut u64| {
            if pending.is_empty() {
                return None;
            }
            let packed = seal_bundle(pending, stored, payloads);
            pending.clear();
            pending_set.clear();
            *size = 0;
            Some(packed)
        };

    for (path, blocks) in files {
        let fresh: Vec<BlockId> = blocks
            .iter()
            .filter(|b| !block_index.contains_key(*b) && !pending_set.contains(*b))
            .copied()
            .collect();
        if fresh.is_empty() {
            continue;
        }

        // Start a new bundle when this file would overflow the current one,
        // so a file is only split when it alone exceeds the cap.
        let file_size: u64 = fresh.iter().map(&stored_len).sum();
        if pending_size > 0 && pending_size + file_size > BUNDLE_SIZE_CAP {
            if let Some(packed) = flush(&mut pending, &mut pending_set, &mut pending_size) {
                record(&mut bundles, &mut block_index, &mut new_bundles, packed);
            }
        }

        let mut seen_in_file = BTreeSet::new();
        for block in fresh {
            if !seen_in_file.insert(block) {
                continue; // repeated inside one file, already pending
            }
            let len = stored_len(&block);
            if pending_size > 0 && pending_size + len > BUNDLE_SIZE_CAP {
                if let Some(packed) = flush(&mut pending, &mut pending_set, &mut pending_size) {
                    record(&mut bundles, &mut block_index, &mut new_bundles, packed);
                }
            }
            pending.push(block);
            pending_set.insert(block);
            pending_size += len;
        }

        debug!(path, pending = pending.len(), "packed file blocks");
    }

    if let Some(packed) = flush(&mut pending, &mut pending_set, &mut pending_size) {
        record(&mut bundles, &mut block_index, &mut new_bundles, packed);
    }

    Packing {
        bundles,
        block_index,
        new_bundles,
        carried,
    }
}

/// Finalize a bundle: compute its identity, slot table, and object bytes.
fn seal_bundle(
    members: &[BlockId],
    stored: &BTreeMap<BlockId, Bytes>,
    payloads: &BTreeMap<BlockId, Bytes>,
) -> PackedBundle {
    let mut hasher = Sha256::new();
    let mut slots = Vec::with_capacity(members.len());
    let mut data = Vec::new();
    let mut offset = 0u64;

    for block in members {
        let payload = payloads
            .get(block)
            .expect("payload recorded for every scanned block");
        let form = stored
            .get(block)
            .expect("stored form recorded for every scanned block");

        hasher.update(payload);
        slots.push(BundleSlot {
            block: *block,
            offset,
            length: form.len() as u64,
        });
        data.extend_from_slice(form);
        offset += form.len() as u64;
    }

    PackedBundle {
        id: BundleId::from(<[u8; 32]>::from(hasher.finalize())),
        slots,
        data: Bytes::from(data),
    }
}

fn record(
    bundles: &mut BTreeMap<BundleId, Vec<BundleSlot>>,
    block_index: &mut BTreeMap<BlockId, BundleId>,
    new_bundles: &mut Vec<PackedBundle>,
    packed: PackedBundle,
) {
    for slot in &packed.slots {
        block_index.insert(slot.block, packed.id);
    }
    bundles.insert(packed.id, packed.slots.clone());
    new_bundles.push(packed);
}
