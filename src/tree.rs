//! Random spanning trees and balanced tree bipartition.
//!
//! This is the ReCom core. Given the merged subgraph of two adjacent
//! districts, [`bipartition_tree`] repeatedly:
//!
//! 1. draws a spanning tree -- by default a random-weight Kruskal tree whose
//!    edge weights are uniform draws plus *region surcharges* for edges that
//!    cross designated region attributes; Wilson's algorithm
//!    ([`SpanningTreeMethod::Uniform`]) is available as an opt-in for hosts
//!    that need truly uniform trees,
//! 2. roots the tree at a random node and accumulates subtree populations in
//!    one traversal,
//! 3. collects every edge whose removal splits the tree into two sides
//!    matching the requested integer population bands, and
//! 4. picks the cut: candidates are classed by the set of regions they
//!    cross, classes ordered by subset size, then summed surcharge, then
//!    region names; the winning class is sampled uniformly.
//!
//! Redraw budgets and failure surfaces follow the chain's error taxonomy:
//! a disconnected subgraph is reported immediately (`InvalidGraph`), an
//! exhausted redraw budget as `BipartitionFailure`.

use crate::errors::{ChainError, Result};
use crate::graph::{AttrValue, EdgeId, Graph};
use crate::ids::PartId;
use crate::utils::{BalanceBand, ideal_population};
use ordered_float::OrderedFloat;
use rand::Rng;
use rand::rngs::SmallRng;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

/// Retries for [`recursive_seed_part`] before `SeedFailure`.
pub const DEFAULT_SEED_RETRIES: usize = 12;

/// Spanning-tree redraws per [`bipartition_tree`] call.
pub const DEFAULT_MAX_ATTEMPTS: usize = 10_000;

/// Extra edge weight per crossed region attribute, keyed by column name.
///
/// Surcharges bias the Kruskal draw toward trees whose edges stay inside
/// regions, which in turn biases ReCom toward keeping regions whole. Keys
/// are ordered, so iteration (and therefore tie-breaking) is deterministic.
pub type RegionSurcharge = BTreeMap<String, f64>;

/// How spanning trees are drawn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SpanningTreeMethod {
    /// Random-weight Kruskal; uniform enough for sampling, and the only
    /// method that honors region surcharges.
    #[default]
    RandomWeight,
    /// Wilson's loop-erased random walks: exactly uniform, surcharges
    /// ignored.
    Uniform,
}

/// A spanning tree over a node subset, stored as an adjacency map.
#[derive(Clone, Debug)]
pub struct SpanningTree {
    adj: BTreeMap<u32, Vec<(u32, EdgeId)>>,
}

impl SpanningTree {
    fn with_nodes(nodes: &BTreeSet<u32>) -> Self {
        Self {
            adj: nodes.iter().map(|&v| (v, Vec::new())).collect(),
        }
    }

    fn add_edge(&mut self, u: u32, v: u32, e: EdgeId) {
        self.adj.get_mut(&u).expect("tree node").push((v, e));
        self.adj.get_mut(&v).expect("tree node").push((u, e));
    }

    pub fn num_nodes(&self) -> usize {
        self.adj.len()
    }

    /// Tree edges as `(u, v, edge id)` with `u < v`.
    pub fn edges(&self) -> Vec<(u32, u32, EdgeId)> {
        let mut out = Vec::with_capacity(self.adj.len().saturating_sub(1));
        for (&u, nbrs) in &self.adj {
            for &(v, e) in nbrs {
                if u < v {
                    out.push((u, v, e));
                }
            }
        }
        out
    }
}

/// Union-find over positions `0..n`, used by the Kruskal draw.
struct DisjointSets {
    parent: Vec<u32>,
    rank: Vec<u8>,
}

impl DisjointSets {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n as u32).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, x: u32) -> u32 {
        let mut root = x;
        while self.parent[root as usize] != root {
            root = self.parent[root as usize];
        }
        let mut cur = x;
        while self.parent[cur as usize] != root {
            let next = self.parent[cur as usize];
            self.parent[cur as usize] = root;
            cur = next;
        }
        root
    }

    fn union(&mut self, a: u32, b: u32) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        match self.rank[ra as usize].cmp(&self.rank[rb as usize]) {
            std::cmp::Ordering::Less => self.parent[ra as usize] = rb,
            std::cmp::Ordering::Greater => self.parent[rb as usize] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb as usize] = ra;
                self.rank[ra as usize] += 1;
            }
        }
        true
    }
}

/// Region attribute values that differ across an edge.
fn crossed_regions(
    graph: &Graph,
    surcharge: &RegionSurcharge,
    u: u32,
    v: u32,
) -> Result<Vec<String>> {
    let mut crossed = Vec::new();
    for region in surcharge.keys() {
        let a: AttrValue = graph.node_attr(u as usize, region)?;
        let b: AttrValue = graph.node_attr(v as usize, region)?;
        if a != b {
            crossed.push(region.clone());
        }
    }
    Ok(crossed)
}

/// Draw a minimum-weight spanning tree with random base weights plus region
/// surcharges (Kruskal). Fails with `InvalidGraph` if the subset is
/// disconnected.
pub fn random_spanning_tree(
    graph: &Graph,
    nodes: &BTreeSet<u32>,
    surcharge: &RegionSurcharge,
    rng: &mut SmallRng,
) -> Result<SpanningTree> {
    let view = graph.subgraph(nodes);
    let mut weighted: Vec<(OrderedFloat<f64>, u32, u32, EdgeId)> = Vec::new();
    for (u, v, e) in view.induced_edges() {
        let mut w: f64 = rng.random();
        if !surcharge.is_empty() {
            for region in crossed_regions(graph, surcharge, u, v)? {
                w += surcharge[&region];
            }
        }
        weighted.push((OrderedFloat(w), u, v, e));
    }
    weighted.sort_unstable_by_key(|&(w, ..)| w);

    // Union-find runs over dense positions within the subset.
    let index: BTreeMap<u32, u32> = nodes
        .iter()
        .enumerate()
        .map(|(i, &v)| (v, i as u32))
        .collect();
    let mut sets = DisjointSets::new(nodes.len());
    let mut tree = SpanningTree::with_nodes(nodes);
    let mut joined = 0usize;
    for (_, u, v, e) in weighted {
        if sets.union(index[&u], index[&v]) {
            tree.add_edge(u, v, e);
            joined += 1;
            if joined + 1 == nodes.len() {
                return Ok(tree);
            }
        }
    }
    if nodes.len() <= 1 {
        return Ok(tree);
    }
    Err(ChainError::InvalidGraph(
        "subgraph is disconnected; no spanning tree exists".to_string(),
    ))
}

/// Draw an exactly-uniform spanning tree by Wilson's algorithm (loop-erased
/// random walks). Fails with `InvalidGraph` if the subset is disconnected.
pub fn uniform_spanning_tree(
    graph: &Graph,
    nodes: &BTreeSet<u32>,
    rng: &mut SmallRng,
) -> Result<SpanningTree> {
    let mut tree = SpanningTree::with_nodes(nodes);
    let ordered: Vec<u32> = nodes.iter().copied().collect();
    if ordered.is_empty() {
        return Ok(tree);
    }

    let root = ordered[rng.random_range(0..ordered.len())];
    let mut in_tree: BTreeSet<u32> = BTreeSet::from([root]);

    for &start in &ordered {
        if in_tree.contains(&start) {
            continue;
        }
        // Walk until the tree is hit, remembering only the latest exit from
        // each node; that erases loops implicitly.
        let mut next: BTreeMap<u32, (u32, EdgeId)> = BTreeMap::new();
        let mut u = start;
        let mut steps = 0usize;
        let step_budget = nodes.len().saturating_mul(nodes.len()).saturating_mul(64);
        while !in_tree.contains(&u) {
            let nbrs: Vec<(u32, EdgeId)> = graph
                .adj(u as usize)
                .iter()
                .filter(|(nbr, _)| nodes.contains(nbr))
                .copied()
                .collect();
            if nbrs.is_empty() {
                return Err(ChainError::InvalidGraph(
                    "subgraph is disconnected; no spanning tree exists".to_string(),
                ));
            }
            let (nbr, e) = nbrs[rng.random_range(0..nbrs.len())];
            next.insert(u, (nbr, e));
            u = nbr;
            steps += 1;
            if steps > step_budget {
                return Err(ChainError::InvalidGraph(
                    "subgraph is disconnected; no spanning tree exists".to_string(),
                ));
            }
        }
        // Commit the loop-erased path.
        let mut u = start;
        while !in_tree.contains(&u) {
            let (nbr, e) = next[&u];
            tree.add_edge(u, nbr, e);
            in_tree.insert(u);
            u = nbr;
        }
    }
    Ok(tree)
}

/// Everything [`bipartition_tree`] needs besides the node set and RNG.
#[derive(Clone, Debug)]
pub struct BipartitionParams {
    /// Integer node column holding populations.
    pub pop_col: String,
    /// Band the returned side must satisfy.
    pub band_a: BalanceBand,
    /// Band the complement must satisfy.
    pub band_b: BalanceBand,
    pub surcharge: RegionSurcharge,
    pub method: SpanningTreeMethod,
    /// Spanning-tree redraw budget.
    pub max_attempts: usize,
    /// Rootings tried per drawn tree.
    pub node_repeats: usize,
}

impl BipartitionParams {
    /// Symmetric split: both sides within `epsilon` of `target`.
    pub fn balanced(pop_col: impl Into<String>, target: f64, epsilon: f64) -> Self {
        let band = BalanceBand::around(target, epsilon);
        Self {
            pop_col: pop_col.into(),
            band_a: band,
            band_b: band,
            surcharge: RegionSurcharge::new(),
            method: SpanningTreeMethod::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            node_repeats: 1,
        }
    }
}

/// The result of a successful balanced cut.
#[derive(Clone, Debug)]
pub struct BipartitionOutcome {
    /// The side satisfying `band_a`; the complement satisfies `band_b`.
    pub side: BTreeSet<u32>,
    /// Spanning trees drawn before a balanced cut was found (≥ 1).
    pub attempts: usize,
}

struct RootedTree {
    /// Visit order with the root first; children always follow parents.
    order: Vec<u32>,
    parent: BTreeMap<u32, (u32, EdgeId)>,
}

fn root_tree(tree: &SpanningTree, root: u32) -> RootedTree {
    let mut order = Vec::with_capacity(tree.num_nodes());
    let mut parent = BTreeMap::new();
    let mut stack = vec![root];
    let mut seen: BTreeSet<u32> = BTreeSet::from([root]);
    while let Some(u) = stack.pop() {
        order.push(u);
        for &(v, e) in &tree.adj[&u] {
            if seen.insert(v) {
                parent.insert(v, (u, e));
                stack.push(v);
            }
        }
    }
    RootedTree { order, parent }
}

/// Split a connected node set into two population-balanced sides by cutting
/// one spanning-tree edge.
///
/// Returns the side matching `params.band_a`. Emits
/// `BipartitionFailure { attempts }` when the redraw budget is spent without
/// finding a balanced cut, and `InvalidGraph` immediately if the set is
/// disconnected (redrawing cannot fix that).
pub fn bipartition_tree(
    graph: &Graph,
    nodes: &BTreeSet<u32>,
    params: &BipartitionParams,
    rng: &mut SmallRng,
) -> Result<BipartitionOutcome> {
    let pops = match graph.node_attrs().column(&params.pop_col)? {
        crate::graph::Column::Int(v) => v,
        other => {
            return Err(ChainError::AttributeType {
                attr: params.pop_col.clone(),
                expected: "int",
                found: match other {
                    crate::graph::Column::Float(_) => "float",
                    crate::graph::Column::Str(_) => "str",
                    _ => "bool",
                },
            });
        }
    };
    let total: i64 = nodes.iter().map(|&v| pops[v as usize]).sum();
    let ordered: Vec<u32> = nodes.iter().copied().collect();
    if ordered.len() < 2 {
        return Err(ChainError::BipartitionFailure { attempts: 0 });
    }

    for attempt in 1..=params.max_attempts.max(1) {
        let tree = match params.method {
            SpanningTreeMethod::RandomWeight => {
                random_spanning_tree(graph, nodes, &params.surcharge, rng)?
            }
            SpanningTreeMethod::Uniform => uniform_spanning_tree(graph, nodes, rng)?,
        };

        for _ in 0..params.node_repeats.max(1) {
            let root = ordered[rng.random_range(0..ordered.len())];
            let rooted = root_tree(&tree, root);

            // Subtree populations in one pass: children precede parents in
            // the reversed visit order.
            let mut subtree: BTreeMap<u32, i64> =
                nodes.iter().map(|&v| (v, pops[v as usize])).collect();
            for &u in rooted.order.iter().rev() {
                if let Some(&(p, _)) = rooted.parent.get(&u) {
                    let s = subtree[&u];
                    *subtree.get_mut(&p).expect("parent in tree") += s;
                }
            }

            // Balanced cuts: cutting (u, parent(u)) leaves subtree(u) on one
            // side. `true` marks the subtree as the band_a side.
            let mut candidates: Vec<(u32, bool)> = Vec::new();
            for &u in &rooted.order {
                if u == root {
                    continue;
                }
                let s = subtree[&u];
                let fits_a = params.band_a.contains(s) && params.band_b.contains(total - s);
                let fits_b = params.band_b.contains(s) && params.band_a.contains(total - s);
                if fits_a {
                    candidates.push((u, true));
                } else if fits_b {
                    candidates.push((u, false));
                }
            }
            if candidates.is_empty() {
                continue;
            }

            let (chosen, subtree_is_a) =
                choose_cut(graph, &params.surcharge, &rooted, &candidates, rng)?;

            // Collect the chosen subtree by walking the visit order once.
            let mut side: BTreeSet<u32> = BTreeSet::from([chosen]);
            for &u in &rooted.order {
                if let Some(&(p, _)) = rooted.parent.get(&u) {
                    if side.contains(&p) {
                        side.insert(u);
                    }
                }
            }
            if !subtree_is_a {
                side = nodes.difference(&side).copied().collect();
            }
            return Ok(BipartitionOutcome {
                side,
                attempts: attempt,
            });
        }
    }
    Err(ChainError::BipartitionFailure {
        attempts: params.max_attempts,
    })
}

/// Pick the cut edge among balanced candidates.
///
/// Candidate classes are ordered by the set of regions the edge crosses:
/// larger subsets first, then higher summed surcharge, then region-name
/// order. The winning class is sampled uniformly. With no surcharges every
/// candidate lands in the same (empty) class, i.e. plain uniform choice.
fn choose_cut(
    graph: &Graph,
    surcharge: &RegionSurcharge,
    rooted: &RootedTree,
    candidates: &[(u32, bool)],
    rng: &mut SmallRng,
) -> Result<(u32, bool)> {
    if surcharge.is_empty() {
        return Ok(candidates[rng.random_range(0..candidates.len())]);
    }

    let mut keyed: Vec<((usize, OrderedFloat<f64>, Reverse<Vec<String>>), (u32, bool))> =
        Vec::with_capacity(candidates.len());
    for &(u, orient) in candidates {
        let (p, _) = rooted.parent[&u];
        let crossed = crossed_regions(graph, surcharge, u, p)?;
        let sum: f64 = crossed.iter().map(|r| surcharge[r]).sum();
        keyed.push(((crossed.len(), OrderedFloat(sum), Reverse(crossed)), (u, orient)));
    }
    let best = keyed.iter().map(|(k, _)| k).max().cloned().expect("non-empty");
    let winners: Vec<(u32, bool)> = keyed
        .into_iter()
        .filter_map(|(k, c)| (k == best).then_some(c))
        .collect();
    Ok(winners[rng.random_range(0..winners.len())])
}

/// Produce a balanced `n_parts`-way labeling by repeatedly carving one
/// district off the remaining pool.
///
/// Each round splits the pool into one district-sized side (band around the
/// ideal population) and the remainder (band around `(k-1) ·` ideal). A
/// round that fails restarts the whole seeding; after `retries` restarts the
/// call fails with `SeedFailure`. A disconnected graph fails immediately.
pub fn recursive_seed_part(
    graph: &Graph,
    n_parts: usize,
    pop_col: &str,
    epsilon: f64,
    rng: &mut SmallRng,
    retries: usize,
) -> Result<Vec<PartId>> {
    if n_parts == 0 {
        return Err(ChainError::InvalidInitialState(
            "cannot seed zero parts".to_string(),
        ));
    }
    let n = graph.num_nodes();
    let all: BTreeSet<u32> = (0..n as u32).collect();
    if n_parts == 1 {
        return Ok(vec![PartId::new(0); n]);
    }
    if !graph.is_connected(&graph.subgraph(&all)) {
        return Err(ChainError::InvalidGraph(
            "cannot seed a disconnected graph".to_string(),
        ));
    }

    let total: i64 = match graph.node_attrs().column(pop_col)? {
        crate::graph::Column::Int(v) => v.iter().sum(),
        _ => {
            return Err(ChainError::AttributeType {
                attr: pop_col.to_string(),
                expected: "int",
                found: "non-int",
            });
        }
    };
    let ideal = ideal_population(total, n_parts);

    'retry: for _ in 0..retries.max(1) {
        let mut part_of = vec![PartId::new(0); n];
        let mut pool = all.clone();
        for carved in 0..n_parts - 1 {
            let remaining_parts = (n_parts - carved) as f64;
            let params = BipartitionParams {
                pop_col: pop_col.to_string(),
                band_a: BalanceBand::around(ideal, epsilon),
                band_b: BalanceBand::around(ideal * (remaining_parts - 1.0), epsilon),
                surcharge: RegionSurcharge::new(),
                method: SpanningTreeMethod::RandomWeight,
                max_attempts: 64,
                node_repeats: 1,
            };
            match bipartition_tree(graph, &pool, &params, rng) {
                Ok(outcome) => {
                    for &v in &outcome.side {
                        part_of[v as usize] = PartId::new(carved as u32);
                    }
                    pool = pool.difference(&outcome.side).copied().collect();
                }
                Err(ChainError::BipartitionFailure { .. }) => continue 'retry,
                Err(other) => return Err(other),
            }
        }
        for &v in &pool {
            part_of[v as usize] = PartId::new((n_parts - 1) as u32);
        }
        return Ok(part_of);
    }
    Err(ChainError::SeedFailure { retries })
}
