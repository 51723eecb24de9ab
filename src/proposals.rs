//! Proposals: candidate next states for the chain.
//!
//! A [`Proposal`] builds a candidate partition as a child of the current
//! one. Two are shipped:
//!
//! - [`RandomFlip`]: reassign one endpoint of a uniformly-chosen cut edge to
//!   the other side's district. Flips that would empty a district are
//!   redrawn under a bounded budget.
//! - [`Recom`]: merge two adjacent districts, draw a spanning tree over the
//!   merged subgraph, and cut it into a population-balanced pair
//!   (see [`crate::tree`]). Optionally region-aware via surcharges, and
//!   optionally allowed to reselect a different district pair when a merge
//!   refuses to split.
//!
//! Structural failures (`NoBoundary`, `DegenerateFlip`,
//! `BipartitionFailure`, `ReselectionExhausted`) surface only after the
//! relevant retry budget is spent; soft retries are reported through the
//! attached [`ChainObserver`](crate::events::ChainObserver) when the
//! `events` feature is on.

use crate::assignment::Flip;
use crate::errors::{ChainError, Result};
use crate::ids::PartId;
use crate::partition::Partition;
use crate::tree::{
    BipartitionParams, DEFAULT_MAX_ATTEMPTS, RegionSurcharge, SpanningTreeMethod, bipartition_tree,
};
use rand::Rng;
use rand::rngs::SmallRng;
use std::collections::BTreeSet;

#[cfg(feature = "events")]
use crate::events::{ChainEvent, ChainObserver};
#[cfg(feature = "events")]
use std::sync::Arc;

/// Produces candidate partitions from the current one.
pub trait Proposal: Send + Sync {
    fn name(&self) -> &str;

    /// Draw one candidate. Implementations retry their own structural
    /// failures and only return an error once their budget is exhausted.
    fn propose(&self, current: &Partition, rng: &mut SmallRng) -> Result<Partition>;
}

/// Single-boundary-flip proposal.
///
/// Picks a cut edge uniformly (each with probability `1/|cut_edges|`), then
/// a side uniformly, and flips that endpoint into the opposite district.
#[derive(Clone, Debug)]
pub struct RandomFlip {
    /// Redraws allowed when a drawn flip would empty a district.
    pub max_redraws: usize,
}

impl Default for RandomFlip {
    fn default() -> Self {
        Self { max_redraws: 64 }
    }
}

impl RandomFlip {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Proposal for RandomFlip {
    fn name(&self) -> &str {
        "random_flip"
    }

    fn propose(&self, current: &Partition, rng: &mut SmallRng) -> Result<Partition> {
        let cut_value = current.cut_edges()?;
        let cut: Vec<_> = cut_value
            .edge_set()
            .ok_or_else(|| ChainError::UpdaterFailure {
                name: crate::updaters::CUT_EDGES.to_string(),
                cause: "not an edge set".to_string(),
            })?
            .iter()
            .copied()
            .collect();
        if cut.is_empty() {
            return Err(ChainError::NoBoundary);
        }

        for _ in 0..self.max_redraws.max(1) {
            let e = cut[rng.random_range(0..cut.len())];
            let (u, v) = current.graph().edge_endpoints(e);
            let (node, dest) = if rng.random_bool(0.5) {
                (u, current.part_of(v))
            } else {
                (v, current.part_of(u))
            };
            // Refuse to empty the losing district; redraw instead.
            let losing = current.part_of(node);
            if current.members(losing).map_or(0, |m| m.len()) <= 1 {
                continue;
            }
            let flip = Flip::from([(node, dest)]);
            return current.flip(&flip);
        }
        Err(ChainError::DegenerateFlip {
            attempts: self.max_redraws,
        })
    }
}

/// Recombination proposal.
#[derive(Clone)]
pub struct Recom {
    pub pop_col: String,
    /// Target population per district.
    pub pop_target: f64,
    pub epsilon: f64,
    /// Rootings tried per drawn spanning tree.
    pub node_repeats: usize,
    pub surcharge: RegionSurcharge,
    pub method: SpanningTreeMethod,
    /// Spanning-tree redraw budget per district pair.
    pub max_attempts: usize,
    /// Try another adjacent pair when one refuses to split.
    pub allow_pair_reselection: bool,
    #[cfg(feature = "events")]
    observer: Option<Arc<dyn ChainObserver>>,
}

impl Recom {
    pub fn new(pop_col: impl Into<String>, pop_target: f64, epsilon: f64) -> Self {
        Self {
            pop_col: pop_col.into(),
            pop_target,
            epsilon,
            node_repeats: 1,
            surcharge: RegionSurcharge::new(),
            method: SpanningTreeMethod::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            allow_pair_reselection: false,
            #[cfg(feature = "events")]
            observer: None,
        }
    }

    pub fn with_node_repeats(mut self, node_repeats: usize) -> Self {
        self.node_repeats = node_repeats;
        self
    }

    /// Bias spanning trees toward keeping the given regions whole.
    pub fn with_region_surcharge(mut self, surcharge: RegionSurcharge) -> Self {
        self.surcharge = surcharge;
        self
    }

    pub fn with_method(mut self, method: SpanningTreeMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_pair_reselection(mut self, allow: bool) -> Self {
        self.allow_pair_reselection = allow;
        self
    }

    #[cfg(feature = "events")]
    pub fn with_observer(mut self, observer: Arc<dyn ChainObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    #[cfg(feature = "events")]
    fn emit(&self, event: ChainEvent) {
        if let Some(observer) = &self.observer {
            observer.notify(&event);
        }
    }

    /// Label the two sides so the fewest nodes change district.
    fn build_flip(
        &self,
        current: &Partition,
        p: PartId,
        q: PartId,
        side: &BTreeSet<u32>,
        merged: &BTreeSet<u32>,
    ) -> Flip {
        let members_p = current.members(p).expect("parts are non-empty");
        let side_in_p = side.intersection(members_p).count();
        let side_in_q = side.len() - side_in_p;
        let comp_in_p = members_p.len() - side_in_p;
        let comp_in_q = merged.len() - side.len() - comp_in_p;
        // side → p keeps side_in_p + comp_in_q nodes in place; side → q
        // keeps the rest.
        let side_label = if side_in_p + comp_in_q >= side_in_q + comp_in_p {
            p
        } else {
            q
        };
        let comp_label = if side_label == p { q } else { p };

        let mut flip = Flip::new();
        for &v in merged {
            let new = if side.contains(&v) { side_label } else { comp_label };
            if current.part_of(v) != new {
                flip.insert(v, new);
            }
        }
        flip
    }
}

impl Proposal for Recom {
    fn name(&self) -> &str {
        "recom"
    }

    fn propose(&self, current: &Partition, rng: &mut SmallRng) -> Result<Partition> {
        let mut pairs = current.adjacent_part_pairs()?;
        if pairs.is_empty() {
            return Err(ChainError::BipartitionFailure { attempts: 0 });
        }

        let params = BipartitionParams {
            pop_col: self.pop_col.clone(),
            band_a: crate::utils::BalanceBand::around(self.pop_target, self.epsilon),
            band_b: crate::utils::BalanceBand::around(self.pop_target, self.epsilon),
            surcharge: self.surcharge.clone(),
            method: self.method,
            max_attempts: self.max_attempts,
            node_repeats: self.node_repeats,
        };

        loop {
            let idx = rng.random_range(0..pairs.len());
            let (p, q) = pairs.swap_remove(idx);
            let merged: BTreeSet<u32> = current
                .members(p)
                .expect("parts are non-empty")
                .union(current.members(q).expect("parts are non-empty"))
                .copied()
                .collect();

            match bipartition_tree(current.graph(), &merged, &params, rng) {
                Ok(outcome) => {
                    #[cfg(feature = "events")]
                    if outcome.attempts > 1 {
                        self.emit(ChainEvent::BipartitionWarning {
                            attempts: outcome.attempts,
                        });
                    }
                    let flip = self.build_flip(current, p, q, &outcome.side, &merged);
                    return current.flip(&flip);
                }
                Err(err @ ChainError::BipartitionFailure { .. }) => {
                    if !self.allow_pair_reselection {
                        return Err(err);
                    }
                    #[cfg(feature = "events")]
                    self.emit(ChainEvent::PairReselected {
                        first: p,
                        second: q,
                    });
                    if pairs.is_empty() {
                        return Err(ChainError::ReselectionExhausted);
                    }
                }
                Err(other) => return Err(other),
            }
        }
    }
}
