//! Bidirectional node ↔ district mapping with O(|flip|) updates.
//!
//! An [`Assignment`] keeps both directions of the mapping in sync: a dense
//! `part_of` vector for per-node lookup, and sorted member sets per part for
//! deterministic iteration. Member sets sit behind `Arc`s so
//! [`Assignment::clone_with_flip`] is copy-on-write: only the parts a flip
//! touches are deep-copied into the child.
//!
//! Invariants (checked in debug assertions and by the testing module):
//! - every node belongs to exactly one part,
//! - every part is non-empty -- a flip that would empty a part fails with
//!   `DegenerateFlip` instead of committing.

use crate::errors::{ChainError, Result};
use crate::graph::{Column, Graph};
use crate::ids::PartId;
use rand::rngs::SmallRng;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// A partial reassignment: node id → destination part.
pub type Flip = BTreeMap<u32, PartId>;

/// The resolved effect of a flip: node id → (old part, new part).
///
/// No-op entries (node already in the destination part) are dropped during
/// resolution, so an empty delta means the flip changed nothing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlipDelta {
    moves: BTreeMap<u32, (PartId, PartId)>,
}

impl FlipDelta {
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn get(&self, node: u32) -> Option<(PartId, PartId)> {
        self.moves.get(&node).copied()
    }

    /// `(node, old part, new part)` in ascending node order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, PartId, PartId)> + '_ {
        self.moves.iter().map(|(&v, &(old, new))| (v, old, new))
    }

    /// Parts that gained or lost at least one node.
    pub fn touched_parts(&self) -> BTreeSet<PartId> {
        self.moves
            .values()
            .flat_map(|&(old, new)| [old, new])
            .collect()
    }

    /// The flip that undoes this delta.
    pub fn inverse(&self) -> Flip {
        self.moves.iter().map(|(&v, &(old, _))| (v, old)).collect()
    }

    /// The flip that reproduces this delta.
    pub fn as_flip(&self) -> Flip {
        self.moves.iter().map(|(&v, &(_, new))| (v, new)).collect()
    }
}

/// Bidirectional map from nodes to districts.
#[derive(Clone, Debug)]
pub struct Assignment {
    part_of: Vec<PartId>,
    members: BTreeMap<PartId, Arc<BTreeSet<u32>>>,
}

impl Assignment {
    /// Build from an explicit node → part map covering `0..m.len()`.
    pub fn of_mapping(m: &BTreeMap<u32, PartId>) -> Result<Self> {
        let n = m.len();
        let mut part_of = Vec::with_capacity(n);
        for v in 0..n as u32 {
            let part = m.get(&v).copied().ok_or_else(|| {
                ChainError::InvalidInitialState(format!("node {v} has no part assignment"))
            })?;
            part_of.push(part);
        }
        Ok(Self::from_part_of(part_of))
    }

    /// Build from a dense per-node part vector.
    pub fn from_part_of(part_of: Vec<PartId>) -> Self {
        let mut members: BTreeMap<PartId, BTreeSet<u32>> = BTreeMap::new();
        for (v, &part) in part_of.iter().enumerate() {
            members.entry(part).or_default().insert(v as u32);
        }
        Self {
            part_of,
            members: members
                .into_iter()
                .map(|(p, set)| (p, Arc::new(set)))
                .collect(),
        }
    }

    /// Build from a node attribute column holding the part labels.
    ///
    /// Integer columns are used directly; string columns are mapped to part
    /// ids in sorted label order (so the labeling is deterministic).
    pub fn from_node_attr(graph: &Graph, attr: &str) -> Result<Self> {
        match graph.node_attrs().column(attr)? {
            Column::Int(labels) => {
                let mut part_of = Vec::with_capacity(labels.len());
                for &label in labels {
                    let raw = u32::try_from(label).map_err(|_| {
                        ChainError::InvalidInitialState(format!(
                            "part label {label} in '{attr}' is out of range"
                        ))
                    })?;
                    part_of.push(PartId::new(raw));
                }
                Ok(Self::from_part_of(part_of))
            }
            Column::Str(labels) => {
                let distinct: BTreeSet<&String> = labels.iter().collect();
                let index: BTreeMap<&String, PartId> = distinct
                    .into_iter()
                    .enumerate()
                    .map(|(i, s)| (s, PartId::new(i as u32)))
                    .collect();
                Ok(Self::from_part_of(
                    labels.iter().map(|s| index[s]).collect(),
                ))
            }
            other => Err(ChainError::AttributeType {
                attr: attr.to_string(),
                expected: "int or str",
                found: match other {
                    Column::Float(_) => "float",
                    _ => "bool",
                },
            }),
        }
    }

    /// Produce a balanced `n_parts`-way assignment by recursive tree
    /// bipartitioning. Fails with `SeedFailure` once the retry budget is
    /// spent.
    pub fn from_random(
        graph: &Graph,
        n_parts: usize,
        pop_col: &str,
        epsilon: f64,
        rng: &mut SmallRng,
    ) -> Result<Self> {
        let part_of = crate::tree::recursive_seed_part(
            graph,
            n_parts,
            pop_col,
            epsilon,
            rng,
            crate::tree::DEFAULT_SEED_RETRIES,
        )?;
        Ok(Self::from_part_of(part_of))
    }

    pub fn len(&self) -> usize {
        self.part_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.part_of.is_empty()
    }

    pub fn num_parts(&self) -> usize {
        self.members.len()
    }

    pub fn part_of(&self, v: u32) -> PartId {
        self.part_of[v as usize]
    }

    /// Sorted member set of `p`; `None` for a label with no members.
    pub fn members(&self, p: PartId) -> Option<&BTreeSet<u32>> {
        self.members.get(&p).map(Arc::as_ref)
    }

    /// Part ids in ascending order.
    pub fn parts(&self) -> impl Iterator<Item = PartId> + '_ {
        self.members.keys().copied()
    }

    /// Resolve a flip against the current state, dropping no-op entries.
    pub fn resolve(&self, flip: &Flip) -> FlipDelta {
        let moves = flip
            .iter()
            .filter_map(|(&v, &new)| {
                let old = self.part_of[v as usize];
                (old != new).then_some((v, (old, new)))
            })
            .collect();
        FlipDelta { moves }
    }

    /// Apply a flip in place, updating both directions of the mapping.
    ///
    /// Fails with `DegenerateFlip` (leaving the assignment untouched) if any
    /// part would end up empty.
    pub fn apply_flip_inplace(&mut self, flip: &Flip) -> Result<FlipDelta> {
        let delta = self.resolve(flip);
        self.check_not_emptying(&delta)?;
        for (v, old, new) in delta.iter() {
            self.part_of[v as usize] = new;
            Arc::make_mut(self.members.get_mut(&old).expect("source part exists")).remove(&v);
            Arc::make_mut(self.members.entry(new).or_default()).insert(v);
        }
        debug_assert!(self.members.values().all(|m| !m.is_empty()));
        Ok(delta)
    }

    /// Copy-on-write clone with the flip applied.
    pub fn clone_with_flip(&self, flip: &Flip) -> Result<(Self, FlipDelta)> {
        let mut child = self.clone();
        let delta = child.apply_flip_inplace(flip)?;
        Ok((child, delta))
    }

    fn check_not_emptying(&self, delta: &FlipDelta) -> Result<()> {
        let mut losses: BTreeMap<PartId, usize> = BTreeMap::new();
        for (_, old, _) in delta.iter() {
            *losses.entry(old).or_insert(0) += 1;
        }
        let mut gains: BTreeMap<PartId, usize> = BTreeMap::new();
        for (_, _, new) in delta.iter() {
            *gains.entry(new).or_insert(0) += 1;
        }
        for (&part, &lost) in &losses {
            let size = self.members.get(&part).map_or(0, |m| m.len());
            let gained = gains.get(&part).copied().unwrap_or(0);
            if size + gained == lost {
                return Err(ChainError::DegenerateFlip { attempts: 0 });
            }
        }
        Ok(())
    }
}
