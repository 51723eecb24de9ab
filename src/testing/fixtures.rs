//! Canonical partitions and registries for the scenario tests.

use crate::assignment::Assignment;
use crate::errors::Result;
use crate::graph::Graph;
use crate::ids::PartId;
use crate::partition::Partition;
use crate::updaters::UpdaterRegistry;
use std::sync::Arc;

/// The usual registry: `cut_edges` plus `Tally(population → "population")`.
pub fn standard_registry() -> UpdaterRegistry {
    UpdaterRegistry::standard("population", "population").expect("distinct names")
}

/// Assignment splitting a `width × height` grid into `n` vertical stripes
/// of equal width (columns `c` land in stripe `c / (width / n)`).
pub fn vertical_stripes(width: usize, height: usize, n: usize) -> Assignment {
    assert!(n > 0 && width % n == 0, "stripes must divide the width");
    let stripe_width = width / n;
    let part_of = (0..width * height)
        .map(|v| PartId::new((v % width / stripe_width) as u32))
        .collect();
    Assignment::from_part_of(part_of)
}

/// First `k` nodes in part 0, the rest in part 1.
pub fn prefix_split(n: usize, k: usize) -> Assignment {
    let part_of = (0..n)
        .map(|v| PartId::new(if v < k { 0 } else { 1 }))
        .collect();
    Assignment::from_part_of(part_of)
}

/// A partition over the standard registry.
pub fn standard_partition(graph: Graph, assignment: Assignment) -> Result<Partition> {
    Partition::new(Arc::new(graph), assignment, standard_registry())
}

/// The S1 scenario: a 4×4 grid with the left two columns in part 0.
pub fn grid_4x4_halves() -> Partition {
    let graph = super::builders::grid_graph(4, 4);
    standard_partition(graph, vertical_stripes(4, 4, 2)).expect("valid fixture")
}

/// An 8-node unit-population path split into two halves (the S3 scenario).
pub fn path_8_halves() -> Partition {
    let graph = super::builders::path_graph(&[1; 8]);
    standard_partition(graph, prefix_split(8, 4)).expect("valid fixture")
}

/// A 6-cycle split into arcs `{0,1,2}` and `{3,4,5}` (the S4 scenario).
pub fn cycle_6_halves() -> Partition {
    let graph = super::builders::cycle_graph(6);
    standard_partition(graph, prefix_split(6, 3)).expect("valid fixture")
}
