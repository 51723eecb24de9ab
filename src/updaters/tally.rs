//! Per-part sums of a numeric node column.

use crate::assignment::FlipDelta;
use crate::errors::{ChainError, Result};
use crate::graph::Column;
use crate::ids::PartId;
use crate::partition::Partition;
use crate::updaters::{Updater, UpdaterValue};
use std::collections::BTreeMap;

/// Sum of `node_attr(v, attr)` over the members of each part.
///
/// Integer columns tally as `IntByPart`, float columns as `FloatByPart`.
/// The diff path moves each flipped node's contribution from its old part
/// to its new one:
/// `new[p] = old[p] + Σ{attr(v) : v flipped in} − Σ{attr(v) : v flipped out}`.
#[derive(Clone, Debug)]
pub struct Tally {
    attr: String,
    alias: String,
}

impl Tally {
    pub fn new(attr: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            attr: attr.into(),
            alias: alias.into(),
        }
    }

    pub fn attr(&self) -> &str {
        &self.attr
    }
}

impl Updater for Tally {
    fn name(&self) -> &str {
        &self.alias
    }

    fn recompute(&self, partition: &Partition) -> Result<UpdaterValue> {
        let graph = partition.graph();
        match graph.node_attrs().column(&self.attr)? {
            Column::Int(values) => {
                let mut sums: BTreeMap<PartId, i64> = BTreeMap::new();
                for part in partition.parts() {
                    let members = partition.members(part).expect("parts are non-empty");
                    let total = members.iter().map(|&v| values[v as usize]).sum();
                    sums.insert(part, total);
                }
                Ok(UpdaterValue::IntByPart(sums))
            }
            Column::Float(values) => {
                let mut sums: BTreeMap<PartId, f64> = BTreeMap::new();
                for part in partition.parts() {
                    let members = partition.members(part).expect("parts are non-empty");
                    let total = members.iter().map(|&v| values[v as usize]).sum();
                    sums.insert(part, total);
                }
                Ok(UpdaterValue::FloatByPart(sums))
            }
            other => Err(ChainError::AttributeType {
                attr: self.attr.clone(),
                expected: "int or float",
                found: match other {
                    Column::Str(_) => "str",
                    _ => "bool",
                },
            }),
        }
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
        let graph = partition.graph();
        match (graph.node_attrs().column(&self.attr)?, parent_value) {
            (Column::Int(values), UpdaterValue::IntByPart(parent)) => {
                let mut sums = parent.clone();
                for (v, old, new) in delta.iter() {
                    let w = values[v as usize];
                    *sums.entry(old).or_insert(0) -= w;
                    *sums.entry(new).or_insert(0) += w;
                }
                // A part emptied by this flip would already have been
                // rejected; drop labels that no longer exist.
                sums.retain(|part, _| partition.members(*part).is_some());
                Ok(UpdaterValue::IntByPart(sums))
            }
            (Column::Float(values), UpdaterValue::FloatByPart(parent)) => {
                let mut sums = parent.clone();
                for (v, old, new) in delta.iter() {
                    let w = values[v as usize];
                    *sums.entry(old).or_insert(0.0) -= w;
                    *sums.entry(new).or_insert(0.0) += w;
                }
                sums.retain(|part, _| partition.members(*part).is_some());
                Ok(UpdaterValue::FloatByPart(sums))
            }
            _ => self.recompute(partition),
        }
    }
}
