use ironchain::assignment::Flip;
use ironchain::graph::Column;
use ironchain::testing::*;
use ironchain::updaters::{
    CountySplits, CutEdges, Election, Flows, SpanningTrees, Tally, Updater,
};
use ironchain::{PartId, Partition, UpdaterRegistry};
use std::sync::Arc;

/// Diff-coherence law: for every diff-capable updater,
/// `update_from_parent(parent_value, child, delta)` equals a fresh
/// `recompute(child)`.
fn assert_diff_coherent(updater: &dyn Updater, parent: &Partition, child: &Partition) {
    assert!(updater.supports_diff());
    let parent_value = updater.recompute(parent).expect("parent recomputes");
    let diffed = updater
        .update_from_parent(&parent_value, child, child.last_flip())
        .expect("diff path computes");
    let fresh = updater.recompute(child).expect("child recomputes");
    assert_eq!(diffed, fresh, "diff path diverges for '{}'", updater.name());
}

#[test]
fn tally_diff_matches_recompute_on_a_path() -> anyhow::Result<()> {
    // S2: path a—b—c with populations 10, 20, 30; {a, b} | {c}; flip b.
    let graph = path_graph(&[10, 20, 30]);
    let parent = standard_partition(graph, prefix_split(3, 2))?;
    let child = parent.flip(&Flip::from([(1, PartId::new(1))]))?;

    let pops = child.int_tally("population")?;
    assert_eq!(pops[&PartId::new(0)], 10);
    assert_eq!(pops[&PartId::new(1)], 50);

    assert_diff_coherent(&Tally::new("population", "population"), &parent, &child);
    Ok(())
}

#[test]
fn cut_edges_diff_matches_recompute() -> anyhow::Result<()> {
    let parent = grid_4x4_halves();
    let child = parent.flip(&Flip::from([(1, PartId::new(1))]))?;
    assert_diff_coherent(&CutEdges, &parent, &child);
    assert_cut_edges_consistent(&child);
    Ok(())
}

#[test]
fn cut_edges_matches_the_grid_geometry() -> anyhow::Result<()> {
    // Left/right halves of a 4×4 grid cut exactly one edge per row.
    let p = grid_4x4_halves();
    let value = p.cut_edges()?;
    assert_eq!(value.edge_set().unwrap().len(), 4);
    Ok(())
}

#[test]
fn election_totals_percents_and_seats() -> anyhow::Result<()> {
    let graph = grid_graph_with_columns(
        2,
        2,
        vec![1; 4],
        vec![
            ("votes_a", Column::Int(vec![60, 60, 10, 10])),
            ("votes_b", Column::Int(vec![40, 40, 90, 90])),
        ],
    );
    let mut registry = standard_registry();
    registry.register(Arc::new(Election::new(
        "mayor",
        [("A", "votes_a"), ("B", "votes_b")],
    )))?;
    let p = Partition::new(
        Arc::new(graph),
        vertical_stripes(2, 2, 2),
        registry,
    )?;

    let value = p.updater_value("mayor")?;
    let results = value.election().unwrap();
    assert_eq!(results.parties, vec!["A".to_string(), "B".to_string()]);
    // Left column: nodes 0, 2 → A 70, B 130. Right column: same.
    assert_eq!(results.totals[&PartId::new(0)], vec![70, 130]);
    assert_eq!(results.percent(PartId::new(0), 0), 0.35);
    assert_eq!(results.winner(PartId::new(0)), Some(1));
    assert_eq!(results.seats(1), 2);
    assert_eq!(results.seats(0), 0);
    Ok(())
}

#[test]
fn election_diff_matches_recompute() -> anyhow::Result<()> {
    let graph = grid_graph_with_columns(
        4,
        4,
        vec![1; 16],
        vec![
            ("votes_a", Column::Int((0..16).collect())),
            ("votes_b", Column::Int((0..16).rev().collect())),
        ],
    );
    let election = Election::new("council", [("A", "votes_a"), ("B", "votes_b")]);
    let parent = standard_partition(graph, vertical_stripes(4, 4, 2))?;
    let child = parent.flip(&Flip::from([(1, PartId::new(1)), (5, PartId::new(1))]))?;
    assert_diff_coherent(&election, &parent, &child);
    Ok(())
}

#[test]
fn county_splits_counts_and_diffs() -> anyhow::Result<()> {
    let counties: Vec<String> = ["x", "x", "y", "y", "x", "x", "y", "y"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let graph = grid_graph_with_columns(4, 2, vec![1; 8], vec![("county", Column::Str(counties))]);
    let splits = CountySplits::new("county", "county_splits");

    let mut registry = standard_registry();
    registry.register(Arc::new(splits.clone()))?;
    let parent = Partition::new(
        Arc::new(graph),
        vertical_stripes(4, 2, 2),
        registry,
    )?;

    // Stripes split at column 2, exactly on the county border: no splits.
    let value = parent.updater_value("county_splits")?;
    let map = value.county_splits().unwrap();
    assert_eq!(CountySplits::split_count(map), 0);

    // Flipping one "y" cell into part 0 splits county y.
    let child = parent.flip(&Flip::from([(2, PartId::new(0))]))?;
    let value = child.updater_value("county_splits")?;
    assert_eq!(CountySplits::split_count(value.county_splits().unwrap()), 1);

    assert_diff_coherent(&splits, &parent, &child);
    Ok(())
}

#[test]
fn flows_report_node_traffic() -> anyhow::Result<()> {
    let mut registry = standard_registry();
    registry.register(Arc::new(Flows))?;
    let graph = grid_graph(4, 4);
    let parent = Partition::new(
        Arc::new(graph),
        vertical_stripes(4, 4, 2),
        registry,
    )?;

    // The initial state flows nothing.
    let value = parent.updater_value("flows")?;
    assert!(value.flows().unwrap().is_empty());

    let child = parent.flip(&Flip::from([(1, PartId::new(1))]))?;
    let value = child.updater_value("flows")?;
    let flows = value.flows().unwrap();
    assert_eq!(flows[&PartId::new(0)].outflow, 1);
    assert_eq!(flows[&PartId::new(0)].net(), -1);
    assert_eq!(flows[&PartId::new(1)].inflow, 1);
    Ok(())
}

#[test]
fn geographic_updaters_on_a_grid() -> anyhow::Result<()> {
    let graph = Arc::new(geo_grid_graph(4, 4));
    let p = Partition::new_geographic(
        graph,
        vertical_stripes(4, 4, 2),
        UpdaterRegistry::new(),
    )?;

    let area = p.float_tally("area")?;
    assert_eq!(area[&PartId::new(0)], 8.0);

    // 12 of the 16 cells are border cells, 6 per half.
    let value = p.updater_value("boundary_nodes")?;
    assert_eq!(value.node_set().unwrap().len(), 12);

    let exterior = p.float_tally("exterior_boundaries")?;
    assert_eq!(exterior[&PartId::new(0)], 6.0);

    // Each half touches the 4 cut edges with unit shared perimeter.
    let interior = p.float_tally("interior_boundaries")?;
    assert_eq!(interior[&PartId::new(0)], 4.0);
    assert_eq!(interior[&PartId::new(1)], 4.0);

    let perimeter = p.float_tally("perimeter")?;
    assert_eq!(perimeter[&PartId::new(0)], 10.0);
    Ok(())
}

#[test]
fn geographic_diffs_match_recompute() -> anyhow::Result<()> {
    use ironchain::updaters::{ExteriorBoundaries, InteriorBoundaries};
    let graph = Arc::new(geo_grid_graph(4, 4));
    let parent = Partition::new_geographic(
        graph,
        vertical_stripes(4, 4, 2),
        UpdaterRegistry::new(),
    )?;
    let child = parent.flip(&Flip::from([(1, PartId::new(1))]))?;
    assert_diff_coherent(&ExteriorBoundaries, &parent, &child);
    assert_diff_coherent(&InteriorBoundaries, &parent, &child);
    Ok(())
}

#[test]
fn spanning_trees_are_deterministic_per_assignment() -> anyhow::Result<()> {
    let mut registry = standard_registry();
    registry.register(Arc::new(SpanningTrees))?;
    let graph = Arc::new(grid_graph(4, 4));
    let p = Partition::new(
        Arc::clone(&graph),
        vertical_stripes(4, 4, 2),
        registry,
    )?;

    let value = p.updater_value("spanning_trees")?;
    let trees = value.trees_by_part().unwrap();
    // A spanning tree of an 8-node part has 7 edges.
    assert_eq!(trees[&PartId::new(0)].len(), 7);

    // Same assignment in a fresh partition draws the same trees.
    let mut registry = standard_registry();
    registry.register(Arc::new(SpanningTrees))?;
    let q = Partition::new(graph, vertical_stripes(4, 4, 2), registry)?;
    let value_q = q.updater_value("spanning_trees")?;
    assert_eq!(trees, value_q.trees_by_part().unwrap());

    let child = p.flip(&Flip::from([(1, PartId::new(1))]))?;
    assert_diff_coherent(&SpanningTrees, &p, &child);
    Ok(())
}
