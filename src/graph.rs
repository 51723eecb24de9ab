//! Frozen adjacency graph with typed node/edge attribute tables.
//!
//! This module defines:
//! - [`Graph`]: an immutable, undirected, simple graph over contiguous
//!   internal node ids `0..n`, with precomputed sorted neighbor lists,
//!   per-node degrees, and an external id table for serialization.
//! - [`AttrTable`] / [`Column`] / [`AttrValue`]: columnar attribute storage
//!   with a frozen `(name, type)` schema and typed accessors.
//! - [`SubgraphView`]: a lightweight node-subset view with induced-edge
//!   iteration; it never copies attributes.
//!
//! # Notes
//! * The graph is frozen after construction: topology and attributes do not
//!   mutate, so a single `Arc<Graph>` is shared by every partition of every
//!   chain without synchronization.
//! * Neighbor lists are sorted by node id and edges carry stable
//!   [`EdgeId`]s, which keeps all downstream iteration deterministic.
//! * Connected components are reported smallest-contained-node first, so two
//!   runs over the same graph always agree on component order.

use crate::errors::{ChainError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;

/// Stable index of an edge in the graph's canonical edge list.
pub type EdgeId = u32;

/// External identifier of a node, preserved for serialization.
///
/// Internal code always works with contiguous `u32` ids; the external key is
/// only consulted when reading or writing the JSON interchange format.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeKey {
    Int(i64),
    Str(String),
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKey::Int(v) => write!(f, "{v}"),
            NodeKey::Str(s) => write!(f, "{s}"),
        }
    }
}

/// Type tag of an attribute column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttrType {
    Int,
    Float,
    Str,
    Bool,
}

/// One typed attribute column, indexed by node (or edge) id.
#[derive(Clone, Debug, PartialEq)]
pub enum Column {
    Int(Vec<i64>),
    Float(Vec<f64>),
    Str(Vec<String>),
    Bool(Vec<bool>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Int(v) => v.len(),
            Column::Float(v) => v.len(),
            Column::Str(v) => v.len(),
            Column::Bool(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn attr_type(&self) -> AttrType {
        match self {
            Column::Int(_) => AttrType::Int,
            Column::Float(_) => AttrType::Float,
            Column::Str(_) => AttrType::Str,
            Column::Bool(_) => AttrType::Bool,
        }
    }

    fn get(&self, idx: usize) -> AttrValue {
        match self {
            Column::Int(v) => AttrValue::Int(v[idx]),
            Column::Float(v) => AttrValue::Float(v[idx]),
            Column::Str(v) => AttrValue::Str(v[idx].clone()),
            Column::Bool(v) => AttrValue::Bool(v[idx]),
        }
    }
}

/// A single typed attribute value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl AttrValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            AttrValue::Int(_) => "int",
            AttrValue::Float(_) => "float",
            AttrValue::Str(_) => "str",
            AttrValue::Bool(_) => "bool",
        }
    }
}

/// Columnar attribute storage with a frozen schema.
///
/// Columns are registered once at graph construction; the name → column
/// index map is built once and never mutated afterwards, so string-keyed
/// lookup stays deterministic (and off the hot path -- hot code resolves a
/// column index once and then reads by integer id).
#[derive(Clone, Debug, Default)]
pub struct AttrTable {
    len: usize,
    names: Vec<String>,
    columns: Vec<Column>,
    index: HashMap<String, usize>,
}

impl AttrTable {
    /// An empty table for `len` rows.
    pub fn new(len: usize) -> Self {
        Self {
            len,
            names: Vec::new(),
            columns: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a column. Fails with `InvalidGraph` on length mismatch or a
    /// duplicate name.
    pub fn insert(&mut self, name: impl Into<String>, column: Column) -> Result<()> {
        let name = name.into();
        if column.len() != self.len {
            return Err(ChainError::InvalidGraph(format!(
                "attribute '{}' has {} rows, expected {}",
                name,
                column.len(),
                self.len
            )));
        }
        if self.index.contains_key(&name) {
            return Err(ChainError::InvalidGraph(format!(
                "duplicate attribute column '{name}'"
            )));
        }
        self.index.insert(name.clone(), self.columns.len());
        self.names.push(name);
        self.columns.push(column);
        Ok(())
    }

    /// Column names in registration order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn has(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Raw column access (for whole-column scans such as tallies).
    pub fn column(&self, name: &str) -> Result<&Column> {
        let idx = self
            .index
            .get(name)
            .ok_or_else(|| ChainError::MissingAttribute(name.to_string()))?;
        Ok(&self.columns[*idx])
    }

    /// Untyped lookup of row `idx` in column `name`.
    pub fn get(&self, name: &str, idx: usize) -> Result<AttrValue> {
        Ok(self.column(name)?.get(idx))
    }

    /// Integer lookup; fails with `AttributeType` on a non-integer column.
    pub fn i64(&self, name: &str, idx: usize) -> Result<i64> {
        match self.column(name)? {
            Column::Int(v) => Ok(v[idx]),
            other => Err(ChainError::AttributeType {
                attr: name.to_string(),
                expected: "int",
                found: type_name(other),
            }),
        }
    }

    /// Numeric lookup: accepts integer or float columns, returns `f64`.
    pub fn f64(&self, name: &str, idx: usize) -> Result<f64> {
        match self.column(name)? {
            Column::Float(v) => Ok(v[idx]),
            Column::Int(v) => Ok(v[idx] as f64),
            other => Err(ChainError::AttributeType {
                attr: name.to_string(),
                expected: "float",
                found: type_name(other),
            }),
        }
    }

    /// String lookup.
    pub fn str(&self, name: &str, idx: usize) -> Result<&str> {
        match self.column(name)? {
            Column::Str(v) => Ok(&v[idx]),
            other => Err(ChainError::AttributeType {
                attr: name.to_string(),
                expected: "str",
                found: type_name(other),
            }),
        }
    }

    /// Boolean lookup.
    pub fn bool(&self, name: &str, idx: usize) -> Result<bool> {
        match self.column(name)? {
            Column::Bool(v) => Ok(v[idx]),
            other => Err(ChainError::AttributeType {
                attr: name.to_string(),
                expected: "bool",
                found: type_name(other),
            }),
        }
    }
}

fn type_name(c: &Column) -> &'static str {
    match c.attr_type() {
        AttrType::Int => "int",
        AttrType::Float => "float",
        AttrType::Str => "str",
        AttrType::Bool => "bool",
    }
}

/// An immutable, undirected, simple graph with attribute tables.
///
/// Build one with [`Graph::from_adjacency`] or via the JSON reader in
/// [`crate::io`]. Construction validates topology; every accessor afterwards
/// is total on valid ids and fails with `UnknownNode` on out-of-range ids.
#[derive(Clone, Debug)]
pub struct Graph {
    /// Per-node sorted `(neighbor, edge id)` pairs.
    adj: Vec<Vec<(u32, EdgeId)>>,
    /// Canonical edge list; endpoints stored `(min, max)`.
    edges: Vec<(u32, u32)>,
    degree: Vec<u32>,
    external_ids: Vec<NodeKey>,
    node_attrs: AttrTable,
    edge_attrs: AttrTable,
    /// Per-node flag from the reserved `boundary_node` column, if present.
    boundary: Vec<bool>,
    /// Free-form metadata carried through JSON round-trips.
    pub(crate) meta: serde_json::Map<String, serde_json::Value>,
}

impl Graph {
    /// Build a frozen graph from an external id table and an edge list.
    ///
    /// `edges` are `(u, v)` pairs of *internal* ids (positions in
    /// `node_ids`). Fails with `InvalidGraph` if an edge names an unknown
    /// node, repeats an existing edge, or is a self-loop.
    pub fn from_adjacency(
        node_ids: Vec<NodeKey>,
        edges: Vec<(usize, usize)>,
        node_attrs: AttrTable,
        edge_attrs: AttrTable,
    ) -> Result<Self> {
        let n = node_ids.len();
        if node_attrs.len != n {
            return Err(ChainError::InvalidGraph(format!(
                "node attribute table sized for {} nodes, graph has {n}",
                node_attrs.len
            )));
        }
        if edge_attrs.len != edges.len() {
            return Err(ChainError::InvalidGraph(format!(
                "edge attribute table sized for {} edges, graph has {}",
                edge_attrs.len,
                edges.len()
            )));
        }

        let mut canonical: Vec<(u32, u32)> = Vec::with_capacity(edges.len());
        let mut seen: BTreeSet<(u32, u32)> = BTreeSet::new();
        for &(u, v) in &edges {
            if u >= n {
                return Err(ChainError::InvalidGraph(format!(
                    "edge ({u}, {v}) refers to unknown node {u}"
                )));
            }
            if v >= n {
                return Err(ChainError::InvalidGraph(format!(
                    "edge ({u}, {v}) refers to unknown node {v}"
                )));
            }
            if u == v {
                return Err(ChainError::InvalidGraph(format!("self-loop at node {u}")));
            }
            let e = (u.min(v) as u32, u.max(v) as u32);
            if !seen.insert(e) {
                return Err(ChainError::InvalidGraph(format!(
                    "duplicate edge ({}, {})",
                    e.0, e.1
                )));
            }
            canonical.push(e);
        }

        let mut adj: Vec<Vec<(u32, EdgeId)>> = vec![Vec::new(); n];
        for (id, &(u, v)) in canonical.iter().enumerate() {
            adj[u as usize].push((v, id as EdgeId));
            adj[v as usize].push((u, id as EdgeId));
        }
        for list in &mut adj {
            list.sort_unstable();
        }
        let degree = adj.iter().map(|l| l.len() as u32).collect();

        let boundary = match node_attrs.column("boundary_node") {
            Ok(Column::Bool(flags)) => flags.clone(),
            _ => vec![false; n],
        };

        Ok(Self {
            adj,
            edges: canonical,
            degree,
            external_ids: node_ids,
            node_attrs,
            edge_attrs,
            boundary,
            meta: serde_json::Map::new(),
        })
    }

    pub fn num_nodes(&self) -> usize {
        self.adj.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    fn check_node(&self, v: usize) -> Result<()> {
        if v < self.num_nodes() {
            Ok(())
        } else {
            Err(ChainError::UnknownNode(v))
        }
    }

    /// Sorted neighbor ids of `v`.
    pub fn neighbors(&self, v: usize) -> Result<impl Iterator<Item = u32> + '_> {
        self.check_node(v)?;
        Ok(self.adj[v].iter().map(|&(nbr, _)| nbr))
    }

    /// Sorted `(neighbor, edge id)` pairs of `v`. Panics on out-of-range ids;
    /// internal hot-path callers have already validated them.
    pub(crate) fn adj(&self, v: usize) -> &[(u32, EdgeId)] {
        &self.adj[v]
    }

    pub fn degree(&self, v: usize) -> Result<u32> {
        self.check_node(v)?;
        Ok(self.degree[v])
    }

    /// True if any node has degree zero.
    pub fn has_islands(&self) -> bool {
        self.degree.iter().any(|&d| d == 0)
    }

    /// Endpoints `(min, max)` of edge `e`.
    pub fn edge_endpoints(&self, e: EdgeId) -> (u32, u32) {
        self.edges[e as usize]
    }

    /// The edge id joining `u` and `v`, if the edge exists.
    pub fn edge_between(&self, u: usize, v: usize) -> Result<Option<EdgeId>> {
        self.check_node(u)?;
        self.check_node(v)?;
        Ok(self.adj[u]
            .binary_search_by_key(&(v as u32), |&(nbr, _)| nbr)
            .ok()
            .map(|pos| self.adj[u][pos].1))
    }

    /// External serialization key for internal node `v`.
    pub fn external_id(&self, v: usize) -> Result<&NodeKey> {
        self.check_node(v)?;
        Ok(&self.external_ids[v])
    }

    pub fn external_ids(&self) -> &[NodeKey] {
        &self.external_ids
    }

    /// Typed node attribute lookup.
    pub fn node_attr(&self, v: usize, name: &str) -> Result<AttrValue> {
        self.check_node(v)?;
        self.node_attrs.get(name, v)
    }

    /// Typed edge attribute lookup by endpoints.
    pub fn edge_attr(&self, u: usize, v: usize, name: &str) -> Result<AttrValue> {
        let e = self
            .edge_between(u, v)?
            .ok_or_else(|| ChainError::InvalidGraph(format!("no edge between {u} and {v}")))?;
        self.edge_attrs.get(name, e as usize)
    }

    pub fn node_attrs(&self) -> &AttrTable {
        &self.node_attrs
    }

    pub fn edge_attrs(&self) -> &AttrTable {
        &self.edge_attrs
    }

    /// Per-node flag from the reserved `boundary_node` column (false when the
    /// graph was not built from a geographic source).
    pub fn is_boundary_node(&self, v: usize) -> Result<bool> {
        self.check_node(v)?;
        Ok(self.boundary[v])
    }

    /// Lightweight view over a node subset; attributes are not copied.
    pub fn subgraph<'a>(&'a self, nodes: &'a BTreeSet<u32>) -> SubgraphView<'a> {
        SubgraphView { graph: self, nodes }
    }

    /// Connected components of a view, as sorted node sets, ordered by their
    /// smallest contained node id.
    pub fn connected_components(&self, view: &SubgraphView<'_>) -> Vec<BTreeSet<u32>> {
        let mut components = Vec::new();
        let mut visited: BTreeSet<u32> = BTreeSet::new();
        for &start in view.nodes {
            if visited.contains(&start) {
                continue;
            }
            let mut component = BTreeSet::new();
            let mut queue = VecDeque::from([start]);
            visited.insert(start);
            while let Some(u) = queue.pop_front() {
                component.insert(u);
                for &(nbr, _) in self.adj(u as usize) {
                    if view.contains(nbr) && visited.insert(nbr) {
                        queue.push_back(nbr);
                    }
                }
            }
            components.push(component);
        }
        components
    }

    /// True when the view is non-empty and induces a single component.
    pub fn is_connected(&self, view: &SubgraphView<'_>) -> bool {
        let Some(&start) = view.nodes.iter().next() else {
            return false;
        };
        let mut visited: BTreeSet<u32> = BTreeSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(u) = queue.pop_front() {
            for &(nbr, _) in self.adj(u as usize) {
                if view.contains(nbr) && visited.insert(nbr) {
                    queue.push_back(nbr);
                }
            }
        }
        visited.len() == view.nodes.len()
    }
}

/// A node-subset view of a [`Graph`].
///
/// Holds only borrows; constructing one is free. Induced edges are iterated
/// on demand and never materialized.
#[derive(Clone, Copy)]
pub struct SubgraphView<'a> {
    graph: &'a Graph,
    nodes: &'a BTreeSet<u32>,
}

impl<'a> SubgraphView<'a> {
    pub fn graph(&self) -> &'a Graph {
        self.graph
    }

    pub fn nodes(&self) -> &'a BTreeSet<u32> {
        self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, v: u32) -> bool {
        self.nodes.contains(&v)
    }

    /// Neighbors of `v` that are inside the view.
    ///
    /// Views are `Copy`, so these iterator methods take `self` by value and
    /// borrow only the underlying graph and node set.
    pub fn neighbors_in(self, v: u32) -> impl Iterator<Item = u32> + 'a {
        let nodes = self.nodes;
        self.graph
            .adj(v as usize)
            .iter()
            .map(|&(nbr, _)| nbr)
            .filter(move |nbr| nodes.contains(nbr))
    }

    /// Induced edges as `(u, v, edge id)` with `u < v`, each reported once,
    /// in ascending `u` then `v` order.
    pub fn induced_edges(self) -> impl Iterator<Item = (u32, u32, EdgeId)> + 'a {
        let graph = self.graph;
        let nodes = self.nodes;
        nodes.iter().flat_map(move |&u| {
            graph
                .adj(u as usize)
                .iter()
                .filter(move |&&(v, _)| v > u && nodes.contains(&v))
                .map(move |&(v, e)| (u, v, e))
        })
    }
}
