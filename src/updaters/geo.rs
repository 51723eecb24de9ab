//! Geographic updaters over the reserved columns.
//!
//! These require the columns a geographic source provides: `boundary_node`
//! and `boundary_perim` on nodes, `shared_perim` on edges. `area` is an
//! ordinary [`Tally`](crate::updaters::Tally) and is registered alongside
//! these by [`UpdaterRegistry::register_geographic`](crate::updaters::UpdaterRegistry::register_geographic).

use crate::assignment::FlipDelta;
use crate::errors::Result;
use crate::ids::PartId;
use crate::partition::Partition;
use crate::updaters::{Updater, UpdaterValue};
use std::collections::{BTreeMap, BTreeSet};

/// Nodes on the exterior boundary of the whole map (the `boundary_node`
/// flag). Constant across flips.
#[derive(Clone, Copy, Debug, Default)]
pub struct BoundaryNodes;

impl Updater for BoundaryNodes {
    fn name(&self) -> &str {
        "boundary_nodes"
    }

    fn recompute(&self, partition: &Partition) -> Result<UpdaterValue> {
        let graph = partition.graph();
        let mut nodes = BTreeSet::new();
        for v in 0..graph.num_nodes() {
            if graph.is_boundary_node(v)? {
                nodes.insert(v as u32);
            }
        }
        Ok(UpdaterValue::NodeSet(nodes))
    }

    fn supports_diff(&self) -> bool {
        true
    }

    fn update_from_parent(
        &self,
        parent_value: &UpdaterValue,
        partition: &Partition,
        _delta: &FlipDelta,
    ) -> Result<UpdaterValue> {
        // Flips never change which nodes sit on the map boundary.
        match parent_value.node_set() {
            Some(_) => Ok(parent_value.clone()),
            None => self.recompute(partition),
        }
    }
}

/// Per-part sum of `boundary_perim` over members on the map boundary.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExteriorBoundaries;

fn exterior_contribution(partition: &Partition, v: u32) -> Result<f64> {
    let graph = partition.graph();
    if graph.is_boundary_node(v as usize)? {
        graph.node_attrs().f64("boundary_perim", v as usize)
    } else {
        Ok(0.0)
    }
}

impl Updater for ExteriorBoundaries {
    fn name(&self) -> &str {
        "exterior_boundaries"
    }

    fn recompute(&self, partition: &Partition) -> Result<UpdaterValue> {
        let mut sums: BTreeMap<PartId, f64> = BTreeMap::new();
        for part in partition.parts() {
            let members = partition.members(part).expect("parts are non-empty");
            let mut total = 0.0;
            for &v in members {
                total += exterior_contribution(partition, v)?;
            }
            sums.insert(part, total);
        }
        Ok(UpdaterValue::FloatByPart(sums))
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
        let Some(parent) = parent_value.float_by_part() else {
            return self.recompute(partition);
        };
        let mut sums = parent.clone();
        for (v, old, new) in delta.iter() {
            let w = exterior_contribution(partition, v)?;
            *sums.entry(old).or_insert(0.0) -= w;
            *sums.entry(new).or_insert(0.0) += w;
        }
        sums.retain(|part, _| partition.members(*part).is_some());
        Ok(UpdaterValue::FloatByPart(sums))
    }
}

/// Per-part sum of `shared_perim` over that part's cut edges.
#[derive(Clone, Copy, Debug, Default)]
pub struct InteriorBoundaries;

fn interior_sum_for_part(partition: &Partition, part: PartId) -> Result<f64> {
    let graph = partition.graph();
    let members = partition.members(part).expect("parts are non-empty");
    let mut total = 0.0;
    for &v in members {
        for &(nbr, e) in graph.adj(v as usize) {
            if partition.part_of(nbr) != part {
                total += graph.edge_attrs().f64("shared_perim", e as usize)?;
            }
        }
    }
    Ok(total)
}

impl Updater for InteriorBoundaries {
    fn name(&self) -> &str {
        "interior_boundaries"
    }

    fn recompute(&self, partition: &Partition) -> Result<UpdaterValue> {
        let mut sums = BTreeMap::new();
        for part in partition.parts() {
            sums.insert(part, interior_sum_for_part(partition, part)?);
        }
        Ok(UpdaterValue::FloatByPart(sums))
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
        let Some(parent) = parent_value.float_by_part() else {
            return self.recompute(partition);
        };
        // Only the parts a flip touches can change their interior length;
        // rescan just those.
        let mut sums = parent.clone();
        sums.retain(|part, _| partition.members(*part).is_some());
        for part in delta.touched_parts() {
            if partition.members(part).is_some() {
                sums.insert(part, interior_sum_for_part(partition, part)?);
            }
        }
        Ok(UpdaterValue::FloatByPart(sums))
    }
}

/// Per-part perimeter: exterior plus interior boundary length.
#[derive(Clone, Copy, Debug, Default)]
pub struct Perimeter;

impl Updater for Perimeter {
    fn name(&self) -> &str {
        "perimeter"
    }

    fn recompute(&self, partition: &Partition) -> Result<UpdaterValue> {
        let exterior = partition.float_tally("exterior_boundaries")?;
        let interior = partition.float_tally("interior_boundaries")?;
        let mut sums = BTreeMap::new();
        for (part, ext) in exterior {
            sums.insert(part, ext + interior.get(&part).copied().unwrap_or(0.0));
        }
        Ok(UpdaterValue::FloatByPart(sums))
    }

    // Reads two already-diffed updaters, so recomputing is itself O(parts).
    fn supports_diff(&self) -> bool {
        true
    }

    fn update_from_parent(
        &self,
        _parent_value: &UpdaterValue,
        partition: &Partition,
        _delta: &FlipDelta,
    ) -> Result<UpdaterValue> {
        self.recompute(partition)
    }
}
