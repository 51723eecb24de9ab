//! # Ironchain
//!
//! A **Markov chain sampler for districting ensembles** in Rust. Ironchain
//! runs chains over partitions of an adjacency graph: starting from an
//! initial division of a region into districts, it generates long sequences
//! of neighboring plans, filtered through contiguity, population-balance,
//! and compactness constraints, so downstream analysis can compare a plan
//! against the ensemble it came from.
//!
//! ## Key Features
//!
//! - **Frozen graphs** - immutable adjacency + typed columnar attributes,
//!   safely shared across chains
//! - **Incremental partitions** - O(|flip|) updates with parent-linked
//!   caches for user-defined aggregates ("updaters")
//! - **Two proposal families** - single boundary flips and ReCom spanning-
//!   tree recombination, optionally region-aware
//! - **Composable constraints** - contiguity (global and single-flip
//!   specialized), population bounds, compactness bounds, county-split
//!   bounds
//! - **Deterministic by construction** - explicit per-chain RNG seeds,
//!   ordered containers on the hot path, bit-for-bit replay
//! - **Optimizers** - short bursts, simulated annealing, and tilted runs
//!   over any partition score
//!
//! ## Quick Start
//!
//! ```
//! use ironchain::*;
//! use std::sync::Arc;
//!
//! # fn main() -> errors::Result<()> {
//! // A 4×4 grid split into left and right halves.
//! let graph = testing::grid_graph(4, 4);
//! let assignment = testing::vertical_stripes(4, 4, 2);
//! let registry = UpdaterRegistry::standard("population", "population")?;
//! let initial = Partition::new(Arc::new(graph), assignment, registry)?;
//!
//! // One hundred single-flip steps under single-flip contiguity.
//! let chain = MarkovChain::new(
//!     Arc::new(RandomFlip::new()),
//!     Validator::all_of(vec![Arc::new(SingleFlipContiguous)]),
//!     Arc::new(AlwaysAccept),
//!     initial,
//!     100,
//!     2024,
//! )?;
//!
//! for state in chain {
//!     let partition = state?;
//!     let _pops = partition.int_tally("population")?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### `Graph`
//!
//! A [`Graph`] is frozen at construction: topology and attributes never
//! mutate, so one `Arc<Graph>` serves every partition of every chain with
//! no synchronization. Build one from an adjacency list
//! ([`Graph::from_adjacency`]) or from the JSON interchange format
//! ([`io::load_json`]).
//!
//! ### `Partition`
//!
//! A [`Partition`] owns an [`Assignment`] (the node ↔ district mapping) and
//! a cache of updater values. Partitions are immutable;
//! [`Partition::flip`] builds a child sharing the graph and deriving
//! cached aggregates from the parent where updaters support diffs.
//!
//! ### Updaters
//!
//! An [`Updater`] is a named pure function of a partition, cached per
//! state. [`Tally`], [`CutEdges`], the geographic family, [`Election`],
//! [`CountySplits`], [`Flows`], and [`SpanningTrees`] ship in the box;
//! custom aggregates implement the trait and register alongside them.
//!
//! ### Proposals, constraints, acceptance
//!
//! Each chain step draws a candidate from a [`Proposal`] ([`RandomFlip`]
//! or [`Recom`]), validates it against a [`Validator`] (constraint-invalid
//! draws are retried and do not consume steps), then consults an
//! [`AcceptFn`] ([`AlwaysAccept`] or [`MetropolisHastings`]) to decide
//! whether the chain advances or re-emits the current state.
//!
//! ### Optimization
//!
//! [`SingleMetricOptimizer`] wraps chains with best-state tracking:
//! short bursts, simulated annealing over a [`BetaSchedule`], and tilted
//! runs. [`Gingleator`] presets the score around opportunity districts.
//!
//! ## Determinism & Replay
//!
//! Chain behavior is fully determined by the seed passed at construction;
//! there is no global RNG. With the `replay` feature (default), a run's
//! flips can be recorded and re-expanded bit-for-bit against the same graph
//! and initial partition -- see [`replay::ChainRecording`].
//!
//! ## Feature Flags
//!
//! - `replay` - Record accepted flips and re-expand runs (enabled by
//!   default)
//! - `parallel` - Run independent chains across a rayon pool (enabled by
//!   default)
//! - `events` - Chain event observers and counters (enabled by default)

pub mod accept;
pub mod assignment;
pub mod chain;
pub mod constraints;
pub mod errors;
pub mod graph;
pub mod ids;
pub mod io;
pub mod optimize;
pub mod partition;
pub mod proposals;
pub mod testing;
pub mod tree;
pub mod updaters;
pub mod utils;

#[cfg(feature = "events")]
pub mod events;

#[cfg(feature = "parallel")]
pub mod ensemble;

#[cfg(feature = "replay")]
pub mod replay;

// General re-exports
pub use accept::{AcceptFn, AlwaysAccept, BetaSchedule, MetropolisHastings, TiltedAcceptance};
pub use assignment::{Assignment, Flip, FlipDelta};
pub use chain::{CancelToken, ChainState, MarkovChain};
pub use constraints::{
    Constraint, ConstraintOutcome, Contiguous, CountySplitBound, LowerBound, NoMoreDiscontiguous,
    ScoreFn, SingleFlipContiguous, UpperBound, Validator, WithinPercentOfIdealPopulation,
    WithinPercentRangeOfBounds,
};
pub use errors::{ChainError, Result};
pub use graph::{AttrTable, AttrType, AttrValue, Column, EdgeId, Graph, NodeKey, SubgraphView};
pub use ids::PartId;
pub use optimize::{Gingleator, GingleatorScore, OptimizerOutcome, SingleMetricOptimizer};
pub use partition::Partition;
pub use proposals::{Proposal, RandomFlip, Recom};
pub use tree::{
    BipartitionOutcome, BipartitionParams, RegionSurcharge, SpanningTreeMethod, bipartition_tree,
    random_spanning_tree, recursive_seed_part, uniform_spanning_tree,
};
pub use updaters::{
    CountySplits, CutEdges, Election, ElectionResults, FlowCounts, Flows, SpanningTrees, Tally,
    Updater, UpdaterRegistry, UpdaterValue,
};
pub use utils::BalanceBand;

// Gated re-exports
#[cfg(feature = "events")]
pub use events::{ChainEvent, ChainObserver, EventLog};

#[cfg(feature = "parallel")]
pub use ensemble::run_ensemble;

#[cfg(feature = "replay")]
pub use replay::ChainRecording;
