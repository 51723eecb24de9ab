//! Per-part uniform spanning trees.

use crate::assignment::FlipDelta;
use crate::errors::Result;
use crate::graph::EdgeId;
use crate::ids::PartId;
use crate::partition::Partition;
use crate::tree::uniform_spanning_tree;
use crate::updaters::{Updater, UpdaterValue};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::collections::BTreeMap;

/// One uniform spanning tree per part, as sorted edge-id lists.
///
/// Updaters must be pure functions of the partition, so the Wilson draw is
/// seeded from a stable hash of the part's member set: equal assignments
/// always yield equal trees, across runs and across diff/recompute paths.
///
/// Rarely wanted on the hot path; register it only when an analysis needs
/// it, and it stays lazy until read.
#[derive(Clone, Copy, Debug, Default)]
pub struct SpanningTrees;

fn member_seed(part: PartId, members: &std::collections::BTreeSet<u32>) -> u64 {
    // FNV-1a over the part label and sorted member ids.
    let mut h: u64 = 0xcbf29ce484222325;
    let mut mix = |v: u64| {
        h ^= v;
        h = h.wrapping_mul(0x100000001b3);
    };
    mix(part.raw() as u64);
    for &v in members {
        mix(v as u64 + 1);
    }
    h
}

fn tree_for_part(partition: &Partition, part: PartId) -> Result<Vec<EdgeId>> {
    let members = partition.members(part).expect("parts are non-empty");
    let mut rng = SmallRng::seed_from_u64(member_seed(part, members));
    let tree = uniform_spanning_tree(partition.graph(), members, &mut rng)?;
    let mut edges: Vec<EdgeId> = tree.edges().into_iter().map(|(_, _, e)| e).collect();
    edges.sort_unstable();
    Ok(edges)
}

impl Updater for SpanningTrees {
    fn name(&self) -> &str {
        "spanning_trees"
    }

    fn recompute(&self, partition: &Partition) -> Result<UpdaterValue> {
        let mut trees = BTreeMap::new();
        for part in partition.parts() {
            trees.insert(part, tree_for_part(partition, part)?);
        }
        Ok(UpdaterValue::TreesByPart(trees))
    }

    fn supports_diff(&self) -> bool {
        true
    }

    fn update_from_parent(
        &self,
        parent_value: &UpdaterValue,
        partition: &Partition,
        delta: &FlipDelta,
    ) -> Result<UpdaterValue> {
        let Some(parent) = parent_value.trees_by_part() else {
            return self.recompute(partition);
        };
        // Untouched parts keep their trees; touched parts redraw.
        let mut trees = parent.clone();
        trees.retain(|part, _| partition.members(*part).is_some());
        for part in delta.touched_parts() {
            if partition.members(part).is_some() {
                trees.insert(part, tree_for_part(partition, part)?);
            }
        }
        Ok(UpdaterValue::TreesByPart(trees))
    }
}
