//! County-split tracking: which parts each county value intersects.

use crate::assignment::FlipDelta;
use crate::errors::Result;
use crate::ids::PartId;
use crate::partition::Partition;
use crate::updaters::{Updater, UpdaterValue};
use std::collections::BTreeMap;

/// For every distinct value of a string column, the per-part node counts of
/// that county. A county is *split* when it intersects more than one part.
///
/// Counts (rather than bare part sets) make the diff path O(|flip|): each
/// moved node decrements its county's count in the old part and increments
/// it in the new one, dropping entries that reach zero.
#[derive(Clone, Debug)]
pub struct CountySplits {
    attr: String,
    alias: String,
}

impl CountySplits {
    pub fn new(attr: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            attr: attr.into(),
            alias: alias.into(),
        }
    }

    /// Number of split counties in a computed value.
    pub fn split_count(value: &BTreeMap<String, BTreeMap<PartId, u32>>) -> usize {
        value.values().filter(|parts| parts.len() > 1).count()
    }
}

impl Updater for CountySplits {
    fn name(&self) -> &str {
        &self.alias
    }

    fn recompute(&self, partition: &Partition) -> Result<UpdaterValue> {
        let attrs = partition.graph().node_attrs();
        let mut counties: BTreeMap<String, BTreeMap<PartId, u32>> = BTreeMap::new();
        for v in 0..partition.graph().num_nodes() {
            let county = attrs.str(&self.attr, v)?;
            let part = partition.part_of(v as u32);
            *counties
                .entry(county.to_string())
                .or_default()
                .entry(part)
                .or_insert(0) += 1;
        }
        Ok(UpdaterValue::CountySplits(counties))
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
        let Some(parent) = parent_value.county_splits() else {
            return self.recompute(partition);
        };
        let attrs = partition.graph().node_attrs();
        let mut counties = parent.clone();
        for (v, old, new) in delta.iter() {
            let county = attrs.str(&self.attr, v as usize)?;
            let parts = counties.entry(county.to_string()).or_default();
            if let Some(count) = parts.get_mut(&old) {
                *count -= 1;
                if *count == 0 {
                    parts.remove(&old);
                }
            }
            *parts.entry(new).or_insert(0) += 1;
        }
        Ok(UpdaterValue::CountySplits(counties))
    }
}
