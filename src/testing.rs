//! Testing utilities for chain engines.
//!
//! This module provides the pieces the crate's own test suite is built
//! from, exported so hosts can test their chains the same way:
//!
//! - **Builders**: grid, path, and cycle graphs with population columns
//!   ([`grid_graph`], [`path_graph`], [`cycle_graph`], [`geo_grid_graph`]).
//! - **Fixtures**: canonical partitions for the standard scenarios
//!   ([`grid_4x4_halves`], [`path_8_halves`], [`cycle_6_halves`]).
//! - **Assertions**: the structural invariants every reachable partition
//!   satisfies ([`assert_assignment_consistent`],
//!   [`assert_cut_edges_consistent`], [`assert_tally_consistent`],
//!   [`assert_parts_connected`], [`assert_population_balanced`],
//!   [`assert_partitions_equal`]).
//!
//! # Quick start
//!
//! ```
//! use ironchain::testing::*;
//!
//! let partition = grid_4x4_halves();
//! assert_assignment_consistent(&partition);
//! assert_parts_connected(&partition);
//! ```

mod assertions;
pub mod builders;
pub mod fixtures;

pub use assertions::{
    assert_assignment_consistent, assert_cut_edges_consistent, assert_partitions_equal,
    assert_parts_connected, assert_population_balanced, assert_tally_consistent,
};
pub use builders::{
    cycle_graph, geo_grid_graph, grid_graph, grid_graph_with_columns, grid_graph_with_pops,
    path_graph,
};
pub use fixtures::{
    cycle_6_halves, grid_4x4_halves, path_8_halves, prefix_split, standard_partition,
    standard_registry, vertical_stripes,
};

use rand::SeedableRng;
use rand::rngs::SmallRng;

/// A seeded RNG for tests; never seed from entropy in a test.
pub fn test_rng(seed: u64) -> SmallRng {
    SmallRng::seed_from_u64(seed)
}
