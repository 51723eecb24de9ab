//! Updaters: named pure functions of a partition, cached per state.
//!
//! This module defines:
//! - [`Updater`]: the trait for partition aggregates. Implementors provide
//!   `recompute`; diff-capable updaters additionally set
//!   [`Updater::supports_diff`] and override
//!   [`Updater::update_from_parent`], which receives the parent's cached
//!   value and the flip delta and must produce the same value `recompute`
//!   would (the test suite asserts this coherence for every shipped
//!   updater).
//! - [`UpdaterValue`]: the closed set of value shapes an updater can
//!   produce. Partitions cache `Arc<UpdaterValue>`s in a fixed-size slot
//!   vector indexed by updater id.
//! - [`UpdaterRegistry`]: the frozen name → updater table shared by every
//!   partition of one chain.
//!
//! Shipped updaters:
//! - [`Tally`] -- per-part sum of a numeric node column.
//! - [`CutEdges`] -- the set of edges whose endpoints sit in different parts.
//! - geographic set ([`BoundaryNodes`]) and score
//!   ([`ExteriorBoundaries`], [`InteriorBoundaries`], [`Perimeter`])
//!   updaters.
//! - [`Election`] -- per-part vote totals, percentages, winners, seats.
//! - [`CountySplits`] -- which parts each county value intersects.
//! - [`Flows`] -- per-part node movement relative to the parent state.
//! - [`SpanningTrees`] -- a per-part uniform spanning tree.

mod county;
mod cut_edges;
mod election;
mod flows;
mod geo;
mod spanning;
mod tally;

pub use county::CountySplits;
pub use cut_edges::CutEdges;
pub use election::{Election, ElectionResults};
pub use flows::{FlowCounts, Flows};
pub use geo::{BoundaryNodes, ExteriorBoundaries, InteriorBoundaries, Perimeter};
pub use spanning::SpanningTrees;
pub use tally::Tally;

use crate::assignment::FlipDelta;
use crate::errors::{ChainError, Result};
use crate::graph::EdgeId;
use crate::ids::PartId;
use crate::partition::Partition;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Canonical name of the cut-edges updater.
pub const CUT_EDGES: &str = "cut_edges";

/// A named pure function of a partition.
///
/// `recompute` must depend only on the partition's graph and assignment (and
/// other updater values) so that two partitions with equal assignments agree
/// on every updater.
pub trait Updater: Send + Sync {
    /// Unique name within the registry; also the cache key hosts use.
    fn name(&self) -> &str;

    /// Compute the value from scratch.
    fn recompute(&self, partition: &Partition) -> Result<UpdaterValue>;

    /// True if [`Self::update_from_parent`] implements an O(|flip|) path.
    fn supports_diff(&self) -> bool {
        false
    }

    /// Derive the value from the parent's cached value and the flip delta.
    ///
    /// The default falls back to a full recompute; only called when
    /// [`Self::supports_diff`] returns true.
    fn update_from_parent(
        &self,
        parent_value: &UpdaterValue,
        partition: &Partition,
        delta: &FlipDelta,
    ) -> Result<UpdaterValue> {
        let _ = (parent_value, delta);
        self.recompute(partition)
    }
}

/// The closed set of value shapes updaters produce.
#[derive(Clone, Debug, PartialEq)]
pub enum UpdaterValue {
    IntByPart(BTreeMap<PartId, i64>),
    FloatByPart(BTreeMap<PartId, f64>),
    EdgeSet(BTreeSet<EdgeId>),
    NodeSet(BTreeSet<u32>),
    Election(ElectionResults),
    /// county value → part → node count (zero counts are dropped).
    CountySplits(BTreeMap<String, BTreeMap<PartId, u32>>),
    Flows(BTreeMap<PartId, FlowCounts>),
    TreesByPart(BTreeMap<PartId, Vec<EdgeId>>),
}

impl UpdaterValue {
    pub fn int_by_part(&self) -> Option<&BTreeMap<PartId, i64>> {
        match self {
            UpdaterValue::IntByPart(m) => Some(m),
            _ => None,
        }
    }

    pub fn float_by_part(&self) -> Option<&BTreeMap<PartId, f64>> {
        match self {
            UpdaterValue::FloatByPart(m) => Some(m),
            _ => None,
        }
    }

    pub fn edge_set(&self) -> Option<&BTreeSet<EdgeId>> {
        match self {
            UpdaterValue::EdgeSet(s) => Some(s),
            _ => None,
        }
    }

    pub fn node_set(&self) -> Option<&BTreeSet<u32>> {
        match self {
            UpdaterValue::NodeSet(s) => Some(s),
            _ => None,
        }
    }

    pub fn election(&self) -> Option<&ElectionResults> {
        match self {
            UpdaterValue::Election(e) => Some(e),
            _ => None,
        }
    }

    pub fn county_splits(&self) -> Option<&BTreeMap<String, BTreeMap<PartId, u32>>> {
        match self {
            UpdaterValue::CountySplits(m) => Some(m),
            _ => None,
        }
    }

    pub fn flows(&self) -> Option<&BTreeMap<PartId, FlowCounts>> {
        match self {
            UpdaterValue::Flows(m) => Some(m),
            _ => None,
        }
    }

    pub fn trees_by_part(&self) -> Option<&BTreeMap<PartId, Vec<EdgeId>>> {
        match self {
            UpdaterValue::TreesByPart(m) => Some(m),
            _ => None,
        }
    }
}

/// Frozen name → updater table, identical across all partitions of a chain.
///
/// Registration happens before the initial partition is built; afterwards
/// the table never changes, so the string-keyed map stays off the hot path
/// (partitions resolve names to slot indices once).
#[derive(Default)]
pub struct UpdaterRegistry {
    updaters: Vec<Arc<dyn Updater>>,
    by_name: HashMap<String, usize>,
}

impl UpdaterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an updater. Fails with `UpdaterFailure` on a duplicate name.
    pub fn register(&mut self, updater: Arc<dyn Updater>) -> Result<()> {
        let name = updater.name().to_string();
        if self.by_name.contains_key(&name) {
            return Err(ChainError::UpdaterFailure {
                name,
                cause: "duplicate updater name".to_string(),
            });
        }
        self.by_name.insert(name, self.updaters.len());
        self.updaters.push(updater);
        Ok(())
    }

    /// Registry holding just `cut_edges` plus a population tally -- the
    /// minimum most chains need.
    pub fn standard(pop_col: &str, pop_alias: &str) -> Result<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(CutEdges))?;
        registry.register(Arc::new(Tally::new(pop_col, pop_alias)))?;
        Ok(registry)
    }

    /// Add the geographic updaters (and `cut_edges` if absent).
    pub fn register_geographic(&mut self) -> Result<()> {
        if self.id_of(CUT_EDGES).is_none() {
            self.register(Arc::new(CutEdges))?;
        }
        self.register(Arc::new(Tally::new("area", "area")))?;
        self.register(Arc::new(BoundaryNodes))?;
        self.register(Arc::new(ExteriorBoundaries))?;
        self.register(Arc::new(InteriorBoundaries))?;
        self.register(Arc::new(Perimeter))?;
        Ok(())
    }

    pub fn id_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub(crate) fn get(&self, id: usize) -> &Arc<dyn Updater> {
        &self.updaters[id]
    }

    pub fn len(&self) -> usize {
        self.updaters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updaters.is_empty()
    }

    /// Registered names in slot order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.updaters.iter().map(|u| u.name())
    }
}
