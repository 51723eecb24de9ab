use ironchain::graph::Column;
use ironchain::testing::*;
use ironchain::tree::{
    BipartitionParams, RegionSurcharge, SpanningTreeMethod, bipartition_tree, random_spanning_tree,
    recursive_seed_part, uniform_spanning_tree,
};
use ironchain::{BalanceBand, ChainError};
use std::collections::BTreeSet;

fn all_nodes(n: usize) -> BTreeSet<u32> {
    (0..n as u32).collect()
}

#[test]
fn kruskal_tree_spans_the_subset() -> anyhow::Result<()> {
    let g = grid_graph(5, 5);
    let nodes = all_nodes(25);
    let mut rng = test_rng(11);
    let tree = random_spanning_tree(&g, &nodes, &RegionSurcharge::new(), &mut rng)?;
    assert_eq!(tree.num_nodes(), 25);
    assert_eq!(tree.edges().len(), 24);
    Ok(())
}

#[test]
fn wilson_tree_spans_the_subset() -> anyhow::Result<()> {
    let g = grid_graph(4, 4);
    let nodes = all_nodes(16);
    let mut rng = test_rng(3);
    let tree = uniform_spanning_tree(&g, &nodes, &mut rng)?;
    assert_eq!(tree.edges().len(), 15);
    Ok(())
}

#[test]
fn disconnected_subsets_have_no_tree() {
    let g = grid_graph(4, 1); // path 0-1-2-3
    let nodes: BTreeSet<u32> = [0, 3].into_iter().collect();
    let mut rng = test_rng(5);
    let err = random_spanning_tree(&g, &nodes, &RegionSurcharge::new(), &mut rng).unwrap_err();
    assert!(matches!(err, ChainError::InvalidGraph(_)));
    let err = uniform_spanning_tree(&g, &nodes, &mut rng).unwrap_err();
    assert!(matches!(err, ChainError::InvalidGraph(_)));
}

#[test]
fn path_of_eight_splits_in_half() -> anyhow::Result<()> {
    // S3: unit populations, target 4, ε = 0.25 admits only a 4|4 split.
    let g = path_graph(&[1; 8]);
    let params = BipartitionParams::balanced("population", 4.0, 0.25);
    let mut rng = test_rng(2024);
    let outcome = bipartition_tree(&g, &all_nodes(8), &params, &mut rng)?;

    assert_eq!(outcome.side.len(), 4);
    // A path only splits into contiguous halves.
    let side: Vec<u32> = outcome.side.iter().copied().collect();
    assert!(side == [0, 1, 2, 3] || side == [4, 5, 6, 7]);
    Ok(())
}

#[test]
fn bipartition_is_deterministic_for_a_seed() -> anyhow::Result<()> {
    let g = grid_graph(6, 6);
    let params = BipartitionParams::balanced("population", 18.0, 0.1);
    let a = bipartition_tree(&g, &all_nodes(36), &params, &mut test_rng(99))?;
    let b = bipartition_tree(&g, &all_nodes(36), &params, &mut test_rng(99))?;
    assert_eq!(a.side, b.side);
    Ok(())
}

#[test]
fn impossible_bands_exhaust_attempts() {
    let g = path_graph(&[1; 4]);
    let params = BipartitionParams {
        pop_col: "population".to_string(),
        // No subtree of a 4-node unit path weighs 100.
        band_a: BalanceBand::new(100, 100),
        band_b: BalanceBand::new(100, 100),
        surcharge: RegionSurcharge::new(),
        method: SpanningTreeMethod::RandomWeight,
        max_attempts: 8,
        node_repeats: 1,
    };
    let mut rng = test_rng(0);
    let err = bipartition_tree(&g, &all_nodes(4), &params, &mut rng).unwrap_err();
    assert!(matches!(
        err,
        ChainError::BipartitionFailure { attempts: 8 }
    ));
}

#[test]
fn asymmetric_bands_carve_one_district() -> anyhow::Result<()> {
    // 6-node unit path: district of 2, remainder of 4.
    let g = path_graph(&[1; 6]);
    let params = BipartitionParams {
        pop_col: "population".to_string(),
        band_a: BalanceBand::new(2, 2),
        band_b: BalanceBand::new(4, 4),
        surcharge: RegionSurcharge::new(),
        method: SpanningTreeMethod::RandomWeight,
        max_attempts: 100,
        node_repeats: 1,
    };
    let mut rng = test_rng(17);
    let outcome = bipartition_tree(&g, &all_nodes(6), &params, &mut rng)?;
    assert_eq!(outcome.side.len(), 2);
    Ok(())
}

#[test]
fn region_surcharge_prefers_region_crossing_cuts() -> anyhow::Result<()> {
    // A 6-node path in two regions: r|r|r|s|s|s with uniform populations.
    // Every cut in the middle third is balanced under a loose band, but only
    // the 2–3 edge crosses the region; the surcharge class must win.
    let regions: Vec<String> = ["r", "r", "r", "s", "s", "s"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let g = grid_graph_with_columns(6, 1, vec![1; 6], vec![("region", Column::Str(regions))]);
    let mut surcharge = RegionSurcharge::new();
    surcharge.insert("region".to_string(), 0.5);

    let params = BipartitionParams {
        pop_col: "population".to_string(),
        band_a: BalanceBand::new(2, 4),
        band_b: BalanceBand::new(2, 4),
        surcharge,
        method: SpanningTreeMethod::RandomWeight,
        max_attempts: 100,
        node_repeats: 1,
    };

    // Regardless of seed, the chosen cut is the region border.
    for seed in 0..20 {
        let outcome = bipartition_tree(&g, &all_nodes(6), &params, &mut test_rng(seed))?;
        let side: Vec<u32> = outcome.side.iter().copied().collect();
        assert!(
            side == [0, 1, 2] || side == [3, 4, 5],
            "seed {seed} cut inside a region: {side:?}"
        );
    }
    Ok(())
}

#[test]
fn recursive_seed_balances_populations() -> anyhow::Result<()> {
    let g = grid_graph(6, 6);
    let mut rng = test_rng(42);
    let part_of = recursive_seed_part(&g, 3, "population", 0.1, &mut rng, 12)?;

    let mut sizes = std::collections::BTreeMap::new();
    for part in &part_of {
        *sizes.entry(part.raw()).or_insert(0i64) += 1;
    }
    assert_eq!(sizes.len(), 3);
    let band = BalanceBand::around(12.0, 0.1);
    for (&part, &size) in &sizes {
        assert!(band.contains(size), "part {part} has size {size}");
    }
    Ok(())
}

#[test]
fn seeded_parts_are_contiguous() -> anyhow::Result<()> {
    let g = grid_graph(6, 6);
    let mut rng = test_rng(8);
    let part_of = recursive_seed_part(&g, 4, "population", 0.2, &mut rng, 12)?;

    for part in 0..4u32 {
        let members: BTreeSet<u32> = part_of
            .iter()
            .enumerate()
            .filter_map(|(v, p)| (p.raw() == part).then_some(v as u32))
            .collect();
        assert!(!members.is_empty());
        assert!(
            g.is_connected(&g.subgraph(&members)),
            "seeded part {part} is disconnected"
        );
    }
    Ok(())
}
