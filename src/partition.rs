//! The partition: an assignment plus cached updater values.
//!
//! A [`Partition`] is a cheaply-cloneable handle to one immutable chain
//! state; clones share the same underlying data. [`Partition::flip`] builds
//! a child that shares the graph and updater registry, records the resolved
//! flip delta, and starts with an empty cache. The first read of an updater
//! materializes it: diff-capable updaters derive their value from the
//! parent's cached value and the delta in O(|flip| · Δ); everything else
//! falls back to a full recompute.
//!
//! Parent links form a DAG of ages (never cyclic). A chain that only needs
//! the current state calls [`Partition::detach_parent`] after each accepted
//! step: the child warms every cache slot its parent had filled, then drops
//! the link so ancestor partitions can be reclaimed.

use crate::assignment::{Assignment, Flip, FlipDelta};
use crate::errors::{ChainError, Result};
use crate::graph::{EdgeId, Graph};
use crate::ids::PartId;
use crate::updaters::{UpdaterRegistry, UpdaterValue};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

/// One state of the chain: a districting plan over a shared frozen graph.
///
/// Cloning is an `Arc` bump; the assignment, cache, and parent link live in
/// the shared inner state.
#[derive(Clone)]
pub struct Partition {
    inner: Arc<Inner>,
}

struct Inner {
    graph: Arc<Graph>,
    assignment: Assignment,
    registry: Arc<UpdaterRegistry>,
    cache: Mutex<Vec<Option<Arc<UpdaterValue>>>>,
    parent: Mutex<Option<Partition>>,
    delta: FlipDelta,
}

impl Partition {
    /// Build the initial partition of a chain.
    ///
    /// Fails with `InvalidInitialState` if the assignment does not cover the
    /// graph's node set exactly.
    pub fn new(
        graph: Arc<Graph>,
        assignment: Assignment,
        registry: UpdaterRegistry,
    ) -> Result<Self> {
        if assignment.len() != graph.num_nodes() {
            return Err(ChainError::InvalidInitialState(format!(
                "assignment covers {} nodes, graph has {}",
                assignment.len(),
                graph.num_nodes()
            )));
        }
        Ok(Self {
            inner: Arc::new(Inner {
                graph,
                assignment,
                registry: Arc::new(registry),
                cache: Mutex::new(Vec::new()),
                parent: Mutex::new(None),
                delta: FlipDelta::default(),
            }),
        })
    }

    /// Build an initial partition pre-registered with the geographic
    /// updaters (`area`, `perimeter`, `exterior_boundaries`,
    /// `interior_boundaries`, `boundary_nodes`) plus `cut_edges`, on top of
    /// whatever `registry` already holds.
    ///
    /// The graph must carry the reserved `boundary_node`, `boundary_perim`,
    /// `area`, and `shared_perim` columns; missing columns fail here rather
    /// than on first access.
    pub fn new_geographic(
        graph: Arc<Graph>,
        assignment: Assignment,
        mut registry: UpdaterRegistry,
    ) -> Result<Self> {
        for col in ["boundary_node", "boundary_perim", "area"] {
            if !graph.node_attrs().has(col) {
                return Err(ChainError::MissingAttribute(col.to_string()));
            }
        }
        if !graph.edge_attrs().has("shared_perim") {
            return Err(ChainError::MissingAttribute("shared_perim".to_string()));
        }
        registry.register_geographic()?;
        Self::new(graph, assignment, registry)
    }

    /// Apply a flip, producing the child partition.
    ///
    /// The child shares the graph and registry; only the member sets the
    /// flip touches are copied. Fails with `DegenerateFlip` if the flip
    /// would empty a part.
    pub fn flip(&self, flip: &Flip) -> Result<Partition> {
        let (assignment, delta) = self.inner.assignment.clone_with_flip(flip)?;
        Ok(Self {
            inner: Arc::new(Inner {
                graph: Arc::clone(&self.inner.graph),
                assignment,
                registry: Arc::clone(&self.inner.registry),
                cache: Mutex::new(Vec::new()),
                parent: Mutex::new(Some(self.clone())),
                delta,
            }),
        })
    }

    /// True when both handles refer to the same underlying state.
    pub fn ptr_eq(a: &Partition, b: &Partition) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    pub fn graph(&self) -> &Arc<Graph> {
        &self.inner.graph
    }

    pub fn assignment(&self) -> &Assignment {
        &self.inner.assignment
    }

    pub fn registry(&self) -> &Arc<UpdaterRegistry> {
        &self.inner.registry
    }

    /// The flip delta that produced this partition (empty for the initial
    /// state).
    pub fn last_flip(&self) -> &FlipDelta {
        &self.inner.delta
    }

    pub fn parent(&self) -> Option<Partition> {
        self.inner.parent.lock().unwrap().clone()
    }

    pub fn part_of(&self, v: u32) -> PartId {
        self.inner.assignment.part_of(v)
    }

    pub fn members(&self, p: PartId) -> Option<&BTreeSet<u32>> {
        self.inner.assignment.members(p)
    }

    pub fn parts(&self) -> impl Iterator<Item = PartId> + '_ {
        self.inner.assignment.parts()
    }

    pub fn num_parts(&self) -> usize {
        self.inner.assignment.num_parts()
    }

    /// The cached (or freshly materialized) value of a registered updater.
    pub fn updater_value(&self, name: &str) -> Result<Arc<UpdaterValue>> {
        let id = self
            .inner
            .registry
            .id_of(name)
            .ok_or_else(|| ChainError::UpdaterFailure {
                name: name.to_string(),
                cause: "not registered".to_string(),
            })?;
        self.value_by_id(id)
    }

    pub(crate) fn value_by_id(&self, id: usize) -> Result<Arc<UpdaterValue>> {
        {
            let cache = self.inner.cache.lock().unwrap();
            if let Some(Some(value)) = cache.get(id) {
                return Ok(Arc::clone(value));
            }
        }

        // Compute outside the lock: updaters may read other updaters on
        // this same partition.
        let updater = Arc::clone(self.inner.registry.get(id));
        let parent = self.parent();
        let computed = match parent {
            Some(ref parent) if updater.supports_diff() => {
                let parent_value = parent.value_by_id(id)?;
                updater.update_from_parent(&parent_value, self, &self.inner.delta)
            }
            _ => updater.recompute(self),
        };
        let value = computed.map_err(|e| match e {
            err @ ChainError::UpdaterFailure { .. } => err,
            other => ChainError::UpdaterFailure {
                name: updater.name().to_string(),
                cause: other.to_string(),
            },
        })?;

        let mut cache = self.inner.cache.lock().unwrap();
        if cache.len() < self.inner.registry.len() {
            cache.resize(self.inner.registry.len(), None);
        }
        let slot = &mut cache[id];
        if slot.is_none() {
            *slot = Some(Arc::new(value));
        }
        Ok(Arc::clone(slot.as_ref().unwrap()))
    }

    /// Slots this partition has already materialized.
    fn cached_ids(&self) -> Vec<usize> {
        let cache = self.inner.cache.lock().unwrap();
        cache
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| slot.is_some().then_some(id))
            .collect()
    }

    /// Warm this partition's cache with everything the parent had cached,
    /// then drop the parent link so the ancestor chain can be reclaimed.
    ///
    /// Updaters never read anywhere stay lazy; they will recompute from
    /// scratch if asked later.
    pub fn detach_parent(&self) -> Result<()> {
        let parent = self.parent();
        if let Some(parent) = parent {
            for id in parent.cached_ids() {
                self.value_by_id(id)?;
            }
        }
        *self.inner.parent.lock().unwrap() = None;
        Ok(())
    }

    /// Materialize every registered updater.
    pub fn materialize_all(&self) -> Result<()> {
        for id in 0..self.inner.registry.len() {
            self.value_by_id(id)?;
        }
        Ok(())
    }

    // Typed convenience accessors for the standard updaters.

    /// The cut-edge set, as an updater value.
    ///
    /// Served from the `cut_edges` updater cache when registered; computed
    /// from scratch (and not cached) otherwise, so proposals work on
    /// registries without it.
    pub fn cut_edges(&self) -> Result<Arc<UpdaterValue>> {
        match self.inner.registry.id_of(crate::updaters::CUT_EDGES) {
            Some(id) => self.value_by_id(id),
            None => Ok(Arc::new(UpdaterValue::EdgeSet(self.cut_edges_from_scratch()))),
        }
    }

    /// An integer tally by part (e.g. `population`).
    pub fn int_tally(&self, alias: &str) -> Result<BTreeMap<PartId, i64>> {
        let value = self.updater_value(alias)?;
        value
            .int_by_part()
            .cloned()
            .ok_or_else(|| ChainError::UpdaterFailure {
                name: alias.to_string(),
                cause: "not an integer tally".to_string(),
            })
    }

    /// A float tally by part (e.g. `area`).
    pub fn float_tally(&self, alias: &str) -> Result<BTreeMap<PartId, f64>> {
        let value = self.updater_value(alias)?;
        value
            .float_by_part()
            .cloned()
            .ok_or_else(|| ChainError::UpdaterFailure {
                name: alias.to_string(),
                cause: "not a float tally".to_string(),
            })
    }

    /// The parts-adjacency edges of this plan: every unordered pair of
    /// parts joined by at least one cut edge, ascending.
    pub fn adjacent_part_pairs(&self) -> Result<Vec<(PartId, PartId)>> {
        let value = self.cut_edges()?;
        let cut = value.edge_set().ok_or_else(|| ChainError::UpdaterFailure {
            name: crate::updaters::CUT_EDGES.to_string(),
            cause: "not an edge set".to_string(),
        })?;
        let mut pairs: BTreeSet<(PartId, PartId)> = BTreeSet::new();
        for &e in cut {
            let (u, v) = self.inner.graph.edge_endpoints(e);
            let (p, q) = (self.part_of(u), self.part_of(v));
            if p != q {
                pairs.insert((p.min(q), p.max(q)));
            }
        }
        Ok(pairs.into_iter().collect())
    }

    /// Recompute the cut-edge set from the assignment alone (used by tests
    /// and the no-updater fallback paths).
    pub fn cut_edges_from_scratch(&self) -> BTreeSet<EdgeId> {
        let mut cut = BTreeSet::new();
        for e in 0..self.inner.graph.num_edges() as EdgeId {
            let (u, v) = self.inner.graph.edge_endpoints(e);
            if self.part_of(u) != self.part_of(v) {
                cut.insert(e);
            }
        }
        cut
    }
}

impl std::fmt::Debug for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Partition")
            .field("parts", &self.num_parts())
            .field("nodes", &self.inner.assignment.len())
            .field("last_flip", &self.inner.delta.len())
            .finish()
    }
}
