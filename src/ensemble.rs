//! Independent chains in parallel.
//!
//! The core engine is single-threaded by design; parallelism comes from
//! running *independent* chains, one per seed, each owning its RNG and
//! partition tree. The frozen graph is the only shared state and needs no
//! synchronization.
//!
//! # Example
//!
//! ```no_run
//! use ironchain::ensemble::run_ensemble;
//! # fn demo(build: impl Fn(u64) -> ironchain::errors::Result<ironchain::chain::MarkovChain> + Sync)
//! #     -> ironchain::errors::Result<()> {
//! let cut_counts = run_ensemble(&[1, 2, 3, 4], &build, |chain| {
//!     let mut last = None;
//!     for state in chain {
//!         last = Some(state?);
//!     }
//!     Ok(last.map(|p| p.cut_edges_from_scratch().len()))
//! })?;
//! # Ok(())
//! # }
//! ```

use crate::chain::MarkovChain;
use crate::errors::Result;
use rayon::prelude::*;

/// A reasonable ensemble width for this machine.
pub fn default_ensemble_size() -> usize {
    num_cpus::get().max(2)
}

/// Build and drain one chain per seed on the rayon pool.
///
/// `build` constructs a fresh engine for a seed; `summarize` consumes the
/// chain and reduces it to whatever the host wants to keep (final plan,
/// score trace, counts). Results come back in seed order. The first error
/// from any chain fails the whole call.
pub fn run_ensemble<T, B, C>(seeds: &[u64], build: B, summarize: C) -> Result<Vec<T>>
where
    T: Send,
    B: Fn(u64) -> Result<MarkovChain> + Sync,
    C: Fn(MarkovChain) -> Result<T> + Sync,
{
    seeds
        .par_iter()
        .map(|&seed| summarize(build(seed)?))
        .collect()
}
