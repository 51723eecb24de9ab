use ironchain::assignment::Flip;
use ironchain::testing::*;
use ironchain::{ChainError, PartId, Partition, UpdaterRegistry};
use std::sync::Arc;

#[test]
fn initial_partition_satisfies_invariants() {
    let p = grid_4x4_halves();
    assert_assignment_consistent(&p);
    assert_cut_edges_consistent(&p);
    assert_tally_consistent(&p, "population", "population");
    assert_parts_connected(&p);
}

#[test]
fn assignment_must_cover_the_graph() {
    let graph = Arc::new(grid_graph(4, 4));
    let short = prefix_split(8, 4); // 8 nodes for a 16-node graph
    let err = Partition::new(graph, short, standard_registry()).unwrap_err();
    assert!(matches!(err, ChainError::InvalidInitialState(_)));
}

#[test]
fn flip_builds_a_child_with_delta() -> anyhow::Result<()> {
    let p = grid_4x4_halves();
    // Node 1 sits in part 0 next to the column boundary.
    let child = p.flip(&Flip::from([(1, PartId::new(1))]))?;

    assert_eq!(child.part_of(1), PartId::new(1));
    assert_eq!(p.part_of(1), PartId::new(0));
    assert_eq!(child.last_flip().len(), 1);
    assert_eq!(
        child.last_flip().get(1),
        Some((PartId::new(0), PartId::new(1)))
    );
    assert!(child.parent().is_some());
    assert!(Arc::ptr_eq(child.graph(), p.graph()));

    assert_assignment_consistent(&child);
    assert_cut_edges_consistent(&child);
    Ok(())
}

#[test]
fn degenerate_flip_is_refused() {
    let graph = grid_graph(2, 1);
    let p = standard_partition(graph, prefix_split(2, 1)).unwrap();
    let err = p.flip(&Flip::from([(0, PartId::new(1))])).unwrap_err();
    assert!(matches!(err, ChainError::DegenerateFlip { .. }));
}

#[test]
fn unregistered_updater_is_an_updater_failure() {
    let p = grid_4x4_halves();
    let err = p.updater_value("nope").unwrap_err();
    assert!(matches!(err, ChainError::UpdaterFailure { .. }));
}

#[test]
fn detach_parent_keeps_cached_values() -> anyhow::Result<()> {
    let p = grid_4x4_halves();
    // Warm the parent's cache.
    let parent_pops = p.int_tally("population")?;

    let child = p.flip(&Flip::from([(1, PartId::new(1))]))?;
    child.detach_parent()?;
    assert!(child.parent().is_none());

    let pops = child.int_tally("population")?;
    assert_eq!(pops[&PartId::new(0)], parent_pops[&PartId::new(0)] - 1);
    assert_eq!(pops[&PartId::new(1)], parent_pops[&PartId::new(1)] + 1);
    assert_tally_consistent(&child, "population", "population");
    Ok(())
}

#[test]
fn grandchildren_diff_through_the_chain() -> anyhow::Result<()> {
    let p = grid_4x4_halves();
    p.int_tally("population")?;
    let child = p.flip(&Flip::from([(1, PartId::new(1))]))?;
    let grandchild = child.flip(&Flip::from([(5, PartId::new(1))]))?;

    let pops = grandchild.int_tally("population")?;
    assert_eq!(pops[&PartId::new(0)], 6);
    assert_eq!(pops[&PartId::new(1)], 10);
    assert_tally_consistent(&grandchild, "population", "population");
    Ok(())
}

#[test]
fn geographic_partition_requires_reserved_columns() {
    let graph = Arc::new(grid_graph(3, 3)); // no geo columns
    let err = Partition::new_geographic(
        graph,
        vertical_stripes(3, 3, 3),
        UpdaterRegistry::new(),
    )
    .unwrap_err();
    assert!(matches!(err, ChainError::MissingAttribute(_)));
}

#[test]
fn geographic_partition_registers_geo_updaters() -> anyhow::Result<()> {
    let graph = Arc::new(geo_grid_graph(4, 4));
    let p = Partition::new_geographic(graph, vertical_stripes(4, 4, 2), UpdaterRegistry::new())?;
    for name in [
        "cut_edges",
        "area",
        "boundary_nodes",
        "exterior_boundaries",
        "interior_boundaries",
        "perimeter",
    ] {
        assert!(
            p.registry().id_of(name).is_some(),
            "updater '{name}' missing"
        );
    }
    Ok(())
}

#[test]
fn adjacent_part_pairs_come_from_cut_edges() -> anyhow::Result<()> {
    let graph = grid_graph(6, 1);
    // Three parts in a row: 0-1 adjacent, 1-2 adjacent, 0-2 not.
    let assignment = vertical_stripes(6, 1, 3);
    let p = standard_partition(graph, assignment)?;
    let pairs = p.adjacent_part_pairs()?;
    assert_eq!(
        pairs,
        vec![
            (PartId::new(0), PartId::new(1)),
            (PartId::new(1), PartId::new(2))
        ]
    );
    Ok(())
}
