//! The cut-edge set: edges whose endpoints sit in different parts.

use crate::assignment::FlipDelta;
use crate::errors::Result;
use crate::partition::Partition;
use crate::updaters::{CUT_EDGES, Updater, UpdaterValue};
use std::collections::BTreeSet;

/// `{ (u, v) ∈ E : part_of(u) ≠ part_of(v) }`, stored as sorted edge ids.
///
/// The diff path re-evaluates only the edges incident to flipped nodes:
/// an edge leaves the set when its endpoints now agree, and joins when they
/// newly disagree.
#[derive(Clone, Copy, Debug, Default)]
pub struct CutEdges;

impl Updater for CutEdges {
    fn name(&self) -> &str {
        CUT_EDGES
    }

    fn recompute(&self, partition: &Partition) -> Result<UpdaterValue> {
        Ok(UpdaterValue::EdgeSet(partition.cut_edges_from_scratch()))
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
        let Some(parent) = parent_value.edge_set() else {
            return self.recompute(partition);
        };
        let graph = partition.graph();
        let mut cut: BTreeSet<_> = parent.clone();
        for (v, _, _) in delta.iter() {
            for &(nbr, e) in graph.adj(v as usize) {
                if partition.part_of(v) == partition.part_of(nbr) {
                    cut.remove(&e);
                } else {
                    cut.insert(e);
                }
            }
        }
        Ok(UpdaterValue::EdgeSet(cut))
    }
}
