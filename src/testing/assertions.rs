//! Invariant assertions over partitions.
//!
//! These check the structural laws every reachable partition must satisfy:
//! assignment consistency, cut-edge cache coherence, tally coherence,
//! contiguity, and population balance. Each panics with a detailed message
//! on violation.

use crate::partition::Partition;
use crate::utils::BalanceBand;

/// Assert both directions of the assignment agree and no part is empty.
pub fn assert_assignment_consistent(partition: &Partition) {
    let assignment = partition.assignment();
    for v in 0..assignment.len() as u32 {
        let part = assignment.part_of(v);
        let members = assignment
            .members(part)
            .unwrap_or_else(|| panic!("node {v} assigned to part {part} with no member set"));
        assert!(
            members.contains(&v),
            "node {v} missing from members of its part {part}"
        );
    }
    for part in assignment.parts() {
        let members = assignment.members(part).expect("listed parts have members");
        assert!(!members.is_empty(), "part {part} is empty");
        for &v in members {
            assert_eq!(
                assignment.part_of(v),
                part,
                "node {v} in members of {part} but assigned elsewhere"
            );
        }
    }
}

/// Assert the cached `cut_edges` value equals a from-scratch recomputation.
pub fn assert_cut_edges_consistent(partition: &Partition) {
    let cached = partition.cut_edges().expect("cut_edges computes");
    let cached = cached.edge_set().expect("cut_edges is an edge set");
    let fresh = partition.cut_edges_from_scratch();
    assert_eq!(
        cached, &fresh,
        "cached cut_edges disagrees with recomputation"
    );
}

/// Assert a tally equals the per-part column sums computed directly.
pub fn assert_tally_consistent(partition: &Partition, alias: &str, attr: &str) {
    let tally = partition.int_tally(alias).expect("tally computes");
    for part in partition.parts() {
        let members = partition.members(part).expect("parts are non-empty");
        let direct: i64 = members
            .iter()
            .map(|&v| {
                partition
                    .graph()
                    .node_attrs()
                    .i64(attr, v as usize)
                    .expect("attribute exists")
            })
            .sum();
        assert_eq!(
            tally.get(&part),
            Some(&direct),
            "tally '{alias}' wrong for part {part}"
        );
    }
}

/// Assert every part induces a connected subgraph.
pub fn assert_parts_connected(partition: &Partition) {
    let graph = partition.graph();
    for part in partition.parts() {
        let members = partition.members(part).expect("parts are non-empty");
        assert!(
            graph.is_connected(&graph.subgraph(members)),
            "part {part} is disconnected"
        );
    }
}

/// Assert every part's population lies inside `band`.
pub fn assert_population_balanced(partition: &Partition, alias: &str, band: BalanceBand) {
    let tally = partition.int_tally(alias).expect("tally computes");
    for (part, pop) in tally {
        assert!(
            band.contains(pop),
            "part {part} population {pop} outside {band}"
        );
    }
}

/// Assert two partitions agree on every node and every registered updater.
pub fn assert_partitions_equal(a: &Partition, b: &Partition) {
    assert_eq!(
        a.assignment().len(),
        b.assignment().len(),
        "partitions cover different node counts"
    );
    for v in 0..a.assignment().len() as u32 {
        assert_eq!(
            a.part_of(v),
            b.part_of(v),
            "partitions disagree on node {v}"
        );
    }
    let names: Vec<String> = a.registry().names().map(str::to_string).collect();
    for name in names {
        let va = a.updater_value(&name).expect("updater computes");
        let vb = b.updater_value(&name).expect("updater computes");
        assert_eq!(*va, *vb, "partitions disagree on updater '{name}'");
    }
}
