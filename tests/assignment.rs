use ironchain::assignment::{Assignment, Flip};
use ironchain::graph::Column;
use ironchain::testing::*;
use ironchain::{ChainError, PartId};
use std::collections::BTreeMap;

#[test]
fn of_mapping_requires_full_coverage() {
    let mut m: BTreeMap<u32, PartId> = BTreeMap::new();
    m.insert(0, PartId::new(0));
    m.insert(2, PartId::new(1)); // node 1 missing
    let err = Assignment::of_mapping(&m).unwrap_err();
    assert!(matches!(err, ChainError::InvalidInitialState(_)));
}

#[test]
fn both_directions_stay_in_sync() -> anyhow::Result<()> {
    let mut a = prefix_split(6, 3);
    assert_eq!(a.num_parts(), 2);
    assert_eq!(a.part_of(2), PartId::new(0));

    let delta = a.apply_flip_inplace(&Flip::from([(2, PartId::new(1))]))?;
    assert_eq!(delta.len(), 1);
    assert_eq!(a.part_of(2), PartId::new(1));
    assert!(a.members(PartId::new(1)).unwrap().contains(&2));
    assert!(!a.members(PartId::new(0)).unwrap().contains(&2));
    Ok(())
}

#[test]
fn duplicate_to_same_part_is_noop() -> anyhow::Result<()> {
    let mut a = prefix_split(4, 2);
    let delta = a.apply_flip_inplace(&Flip::from([(0, PartId::new(0))]))?;
    assert!(delta.is_empty());
    Ok(())
}

#[test]
fn emptying_a_part_is_degenerate() {
    let mut a = prefix_split(3, 1); // part 0 = {0}
    let err = a
        .apply_flip_inplace(&Flip::from([(0, PartId::new(1))]))
        .unwrap_err();
    assert!(matches!(err, ChainError::DegenerateFlip { .. }));
    // The failed flip left the assignment untouched.
    assert_eq!(a.part_of(0), PartId::new(0));
}

#[test]
fn swap_between_parts_is_not_degenerate() -> anyhow::Result<()> {
    // Both singletons swap labels in one flip; neither part empties.
    let mut a = prefix_split(2, 1);
    let flip = Flip::from([(0, PartId::new(1)), (1, PartId::new(0))]);
    a.apply_flip_inplace(&flip)?;
    assert_eq!(a.part_of(0), PartId::new(1));
    assert_eq!(a.part_of(1), PartId::new(0));
    Ok(())
}

#[test]
fn flip_then_inverse_restores_assignment() -> anyhow::Result<()> {
    let original = vertical_stripes(4, 4, 2);
    let flip = Flip::from([(1, PartId::new(1)), (5, PartId::new(1))]);
    let (flipped, delta) = original.clone_with_flip(&flip)?;
    let (restored, _) = flipped.clone_with_flip(&delta.inverse())?;
    for v in 0..16 {
        assert_eq!(restored.part_of(v), original.part_of(v));
    }
    Ok(())
}

#[test]
fn disjoint_flips_commute() -> anyhow::Result<()> {
    let base = vertical_stripes(4, 4, 2);
    let f1 = Flip::from([(1, PartId::new(1))]);
    let f2 = Flip::from([(13, PartId::new(1))]);

    let (ab, _) = base.clone_with_flip(&f1)?;
    let (ab, _) = ab.clone_with_flip(&f2)?;
    let (ba, _) = base.clone_with_flip(&f2)?;
    let (ba, _) = ba.clone_with_flip(&f1)?;
    for v in 0..16 {
        assert_eq!(ab.part_of(v), ba.part_of(v));
    }
    Ok(())
}

#[test]
fn clone_with_flip_leaves_parent_untouched() -> anyhow::Result<()> {
    let base = prefix_split(4, 2);
    let (child, _) = base.clone_with_flip(&Flip::from([(0, PartId::new(1))]))?;
    assert_eq!(base.part_of(0), PartId::new(0));
    assert_eq!(child.part_of(0), PartId::new(1));
    Ok(())
}

#[test]
fn from_node_attr_reads_integer_labels() -> anyhow::Result<()> {
    let g = grid_graph_with_columns(
        2,
        2,
        vec![1; 4],
        vec![("district", Column::Int(vec![7, 7, 9, 9]))],
    );
    let a = Assignment::from_node_attr(&g, "district")?;
    assert_eq!(a.part_of(0), PartId::new(7));
    assert_eq!(a.part_of(3), PartId::new(9));
    // Part ids are preserved, not renumbered.
    let parts: Vec<PartId> = a.parts().collect();
    assert_eq!(parts, vec![PartId::new(7), PartId::new(9)]);
    Ok(())
}

#[test]
fn from_node_attr_maps_string_labels_deterministically() -> anyhow::Result<()> {
    let labels = vec!["west", "west", "east", "east"];
    let g = grid_graph_with_columns(
        2,
        2,
        vec![1; 4],
        vec![(
            "district",
            Column::Str(labels.into_iter().map(String::from).collect()),
        )],
    );
    let a = Assignment::from_node_attr(&g, "district")?;
    // Sorted label order: "east" → 0, "west" → 1.
    assert_eq!(a.part_of(0), PartId::new(1));
    assert_eq!(a.part_of(2), PartId::new(0));
    Ok(())
}

#[test]
fn from_random_balances_a_grid() -> anyhow::Result<()> {
    let g = grid_graph(6, 6);
    let mut rng = test_rng(7);
    let a = Assignment::from_random(&g, 4, "population", 0.2, &mut rng)?;
    assert_eq!(a.num_parts(), 4);
    // 36 unit-population cells into 4 parts within 20% of ideal (9).
    for part in a.parts() {
        let size = a.members(part).unwrap().len() as i64;
        assert!((8..=10).contains(&size), "part {part} has size {size}");
    }
    Ok(())
}

#[test]
fn from_random_fails_on_disconnected_graphs() {
    use ironchain::graph::{AttrTable, Graph, NodeKey};
    let mut attrs = AttrTable::new(4);
    attrs
        .insert("population", Column::Int(vec![1; 4]))
        .unwrap();
    // Two disjoint edges.
    let g = Graph::from_adjacency(
        (0..4).map(NodeKey::Int).collect(),
        vec![(0, 1), (2, 3)],
        attrs,
        AttrTable::new(2),
    )
    .unwrap();
    let mut rng = test_rng(1);
    let err = Assignment::from_random(&g, 2, "population", 0.1, &mut rng).unwrap_err();
    assert!(matches!(err, ChainError::InvalidGraph(_)));
}
