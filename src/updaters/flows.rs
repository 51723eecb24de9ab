//! Node movement between a partition and its parent.

use crate::assignment::FlipDelta;
use crate::errors::Result;
use crate::ids::PartId;
use crate::partition::Partition;
use crate::updaters::{Updater, UpdaterValue};
use serde::Serialize;
use std::collections::BTreeMap;

/// Node traffic for one part across the last flip.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FlowCounts {
    /// Nodes flipped into the part.
    pub inflow: u32,
    /// Nodes flipped out of the part.
    pub outflow: u32,
}

impl FlowCounts {
    /// Net node-count change.
    pub fn net(&self) -> i64 {
        self.inflow as i64 - self.outflow as i64
    }
}

/// Per-part in/out node counts relative to the parent state.
///
/// A pure function of the last-flip delta: the initial partition (and any
/// state reached by an empty flip) flows nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct Flows;

fn from_delta(delta: &FlipDelta) -> BTreeMap<PartId, FlowCounts> {
    let mut flows: BTreeMap<PartId, FlowCounts> = BTreeMap::new();
    for (_, old, new) in delta.iter() {
        flows.entry(old).or_default().outflow += 1;
        flows.entry(new).or_default().inflow += 1;
    }
    flows
}

impl Updater for Flows {
    fn name(&self) -> &str {
        "flows"
    }

    fn recompute(&self, partition: &Partition) -> Result<UpdaterValue> {
        Ok(UpdaterValue::Flows(from_delta(partition.last_flip())))
    }

    fn supports_diff(&self) -> bool {
        true
    }

    fn update_from_parent(
        &self,
        _parent_value: &UpdaterValue,
        partition: &Partition,
        delta: &FlipDelta,
    ) -> Result<UpdaterValue> {
        let _ = partition;
        Ok(UpdaterValue::Flows(from_delta(delta)))
    }
}
