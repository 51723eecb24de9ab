use ironchain::testing::*;
use ironchain::{
    BetaSchedule, Gingleator, GingleatorScore, Partition, RandomFlip, SingleFlipContiguous,
    SingleMetricOptimizer, Validator,
};
use ironchain::constraints::ScoreFn;
use std::sync::Arc;

fn cut_edge_score() -> ScoreFn {
    Arc::new(|p: &Partition| {
        let value = p.cut_edges()?;
        Ok(value.edge_set().map_or(0, |s| s.len()) as f64)
    })
}

fn flip_optimizer(initial: Partition, maximize: bool) -> SingleMetricOptimizer {
    SingleMetricOptimizer::new(
        Arc::new(RandomFlip::new()),
        Validator::all_of(vec![Arc::new(SingleFlipContiguous)]),
        initial,
        cut_edge_score(),
        maximize,
    )
    .expect("score computes on the initial state")
}

#[test]
fn short_bursts_never_degrade_the_best_score() -> anyhow::Result<()> {
    // S5 shape: minimize cut edges over bursts; the recorded best-score
    // sequence must be non-increasing.
    let graph = grid_graph(5, 4);
    let initial = standard_partition(graph, prefix_split(20, 8))?;

    let mut optimizer = flip_optimizer(initial.clone(), false);
    let outcome = optimizer.short_bursts(200, 5, 2024)?;

    assert_eq!(outcome.trace.len(), 5);
    for pair in outcome.trace.windows(2) {
        assert!(
            pair[1] <= pair[0],
            "best score increased across bursts: {:?}",
            outcome.trace
        );
    }
    assert!(outcome.best_score <= cut_edge_score()(&initial)?);
    Ok(())
}

#[test]
fn optimizer_tracks_the_best_partition() -> anyhow::Result<()> {
    let initial = grid_4x4_halves();
    let mut optimizer = flip_optimizer(initial.clone(), false);
    let outcome = optimizer.short_bursts(50, 3, 7)?;
    let best_cut = cut_edge_score()(&outcome.best_partition)?;
    assert_eq!(best_cut, outcome.best_score);
    assert_eq!(optimizer.best_score(), outcome.best_score);
    Ok(())
}

#[test]
fn simulated_annealing_runs_a_schedule() -> anyhow::Result<()> {
    let initial = grid_4x4_halves();
    let mut optimizer = flip_optimizer(initial, false);
    let outcome = optimizer.simulated_annealing(
        120,
        BetaSchedule::JumpCycle {
            cold_steps: 30,
            hot_steps: 30,
        },
        1.0,
        11,
    )?;
    assert_eq!(outcome.trace.len(), 120);
    // The trace is best-so-far, hence monotone.
    for pair in outcome.trace.windows(2) {
        assert!(pair[1] <= pair[0]);
    }
    Ok(())
}

#[test]
fn tilted_runs_accept_worsenings_with_probability_p() -> anyhow::Result<()> {
    let initial = grid_4x4_halves();
    let mut optimizer = flip_optimizer(initial, false);
    let outcome = optimizer.tilted_run(100, 0.25, 13)?;
    assert_eq!(outcome.trace.len(), 100);
    assert!(outcome.best_score <= 4.0);
    Ok(())
}

#[test]
fn beta_schedules_evaluate() {
    let constant = BetaSchedule::Constant(0.5);
    assert_eq!(constant.beta(0), 0.5);
    assert_eq!(constant.beta(1000), 0.5);

    let cycle = BetaSchedule::JumpCycle {
        cold_steps: 2,
        hot_steps: 3,
    };
    let trace: Vec<f64> = (0..7).map(|t| cycle.beta(t)).collect();
    assert_eq!(trace, vec![1.0, 1.0, 0.0, 0.0, 0.0, 1.0, 1.0]);

    let ramp = BetaSchedule::Linear {
        start: 0.0,
        end: 2.0,
        duration: 4,
    };
    assert_eq!(ramp.beta(0), 0.0);
    assert_eq!(ramp.beta(2), 1.0);
    assert_eq!(ramp.beta(9), 2.0);
}

// Gingleator score variants on a fixed 3-part plan with minority shares
// 0.30, 0.55, 0.62 against threshold 0.5.

fn shares_partition() -> Partition {
    use ironchain::graph::Column;
    use ironchain::{Tally, UpdaterRegistry};
    // 6-node path in three 2-node parts; populations 100 each.
    let minority = vec![20, 40, 60, 50, 62, 62];
    let graph = grid_graph_with_columns(
        6,
        1,
        vec![100; 6],
        vec![("minority", Column::Int(minority))],
    );
    let mut registry = UpdaterRegistry::standard("population", "population").unwrap();
    registry
        .register(Arc::new(Tally::new("minority", "minority")))
        .unwrap();
    Partition::new(Arc::new(graph), vertical_stripes(6, 1, 3), registry).unwrap()
}

#[test]
fn gingleator_score_variants() -> anyhow::Result<()> {
    let p = shares_partition();
    let score = |variant| {
        Gingleator::score_fn("minority", "population", 0.5, variant)(&p).expect("computes")
    };

    // Shares: 0.30, 0.55, 0.62 → k = 2, next = 0.30, max = 0.62,
    // mean over = 0.585.
    assert_eq!(score(GingleatorScore::NumOpportunityDists), 2.0);
    assert!((score(GingleatorScore::RewardPartialDist) - 2.30).abs() < 1e-9);
    // next = 0.30 < 0.4: no closeness bonus.
    assert_eq!(score(GingleatorScore::RewardNextHighestClose), 2.0);
    let expected_max = 2.0 - 1.0 + (1.0 - 0.62) / 0.5;
    assert!((score(GingleatorScore::PenalizeMaximumOver) - expected_max).abs() < 1e-9);
    let expected_avg = 2.0 - 1.0 + (1.0 - 0.585) / 0.5;
    assert!((score(GingleatorScore::PenalizeAvgOver) - expected_avg).abs() < 1e-9);
    Ok(())
}

#[test]
fn gingleator_scores_zero_without_opportunity_districts() -> anyhow::Result<()> {
    use ironchain::graph::Column;
    use ironchain::{Tally, UpdaterRegistry};
    let graph = grid_graph_with_columns(
        4,
        1,
        vec![10; 4],
        vec![("minority", Column::Int(vec![0; 4]))],
    );
    let mut registry = UpdaterRegistry::standard("population", "population")?;
    registry.register(Arc::new(Tally::new("minority", "minority")))?;
    let p = Partition::new(
        Arc::new(graph),
        vertical_stripes(4, 1, 2),
        registry,
    )?;

    for variant in [
        GingleatorScore::PenalizeMaximumOver,
        GingleatorScore::PenalizeAvgOver,
    ] {
        let score = Gingleator::score_fn("minority", "population", 0.5, variant)(&p)?;
        assert_eq!(score, 0.0);
    }
    Ok(())
}

#[test]
fn gingleator_builds_a_maximizing_optimizer() -> anyhow::Result<()> {
    let p = shares_partition();
    let mut optimizer = Gingleator::optimizer(
        Arc::new(RandomFlip::new()),
        Validator::all_of(vec![Arc::new(SingleFlipContiguous)]),
        p.clone(),
        "minority",
        "population",
        0.5,
        GingleatorScore::NumOpportunityDists,
    )?;
    let outcome = optimizer.short_bursts(30, 3, 5)?;
    // Maximizing: the trace never decreases.
    for pair in outcome.trace.windows(2) {
        assert!(pair[1] >= pair[0]);
    }
    assert!(outcome.best_score >= 2.0);
    Ok(())
}
