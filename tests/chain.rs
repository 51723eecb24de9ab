use ironchain::testing::*;
use ironchain::{
    AlwaysAccept, CancelToken, ChainError, ChainState, Constraint, ConstraintOutcome, MarkovChain,
    Partition, RandomFlip, SingleFlipContiguous, Validator,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn flip_chain(initial: Partition, steps: usize, seed: u64) -> MarkovChain {
    MarkovChain::new(
        Arc::new(RandomFlip::new()),
        Validator::all_of(vec![Arc::new(SingleFlipContiguous)]),
        Arc::new(AlwaysAccept),
        initial,
        steps,
        seed,
    )
    .expect("valid initial state")
}

#[test]
fn emits_exactly_total_steps_states() -> anyhow::Result<()> {
    let mut chain = flip_chain(grid_4x4_halves(), 25, 1);
    let mut count = 0;
    for state in chain.by_ref() {
        state?;
        count += 1;
    }
    assert_eq!(count, 25);
    assert_eq!(chain.state(), ChainState::Done);
    assert_eq!(chain.steps_taken(), 25);
    Ok(())
}

#[test]
fn step_zero_is_the_initial_state() -> anyhow::Result<()> {
    let initial = grid_4x4_halves();
    let mut chain = flip_chain(initial.clone(), 5, 1);
    let first = chain.next().unwrap()?;
    assert!(Partition::ptr_eq(&first, &initial));
    Ok(())
}

#[test]
fn every_emitted_state_is_valid() -> anyhow::Result<()> {
    let chain = flip_chain(grid_4x4_halves(), 50, 1234);
    for state in chain {
        let p = state?;
        assert_assignment_consistent(&p);
        assert_parts_connected(&p);
        assert_cut_edges_consistent(&p);
    }
    Ok(())
}

#[test]
fn identical_seeds_emit_identical_sequences() -> anyhow::Result<()> {
    let a: Vec<_> = flip_chain(grid_4x4_halves(), 40, 99).collect::<Result<_, _>>()?;
    let b: Vec<_> = flip_chain(grid_4x4_halves(), 40, 99).collect::<Result<_, _>>()?;
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(&b) {
        assert_partitions_equal(x, y);
    }
    Ok(())
}

#[test]
fn different_seeds_diverge() -> anyhow::Result<()> {
    let a: Vec<_> = flip_chain(grid_4x4_halves(), 40, 1).collect::<Result<_, _>>()?;
    let b: Vec<_> = flip_chain(grid_4x4_halves(), 40, 2).collect::<Result<_, _>>()?;
    let same = a
        .iter()
        .zip(&b)
        .all(|(x, y)| (0..16).all(|v| x.part_of(v) == y.part_of(v)));
    assert!(!same, "40 steps under different seeds never diverged");
    Ok(())
}

#[test]
fn invalid_initial_state_is_rejected() {
    let graph = grid_graph(4, 1);
    // Parts {0, 2} and {1, 3}: both disconnected.
    let assignment = ironchain::Assignment::from_part_of(
        [0u32, 1, 0, 1].map(ironchain::PartId::new).to_vec(),
    );
    let initial = standard_partition(graph, assignment).unwrap();
    let err = MarkovChain::new(
        Arc::new(RandomFlip::new()),
        Validator::all_of(vec![Arc::new(ironchain::Contiguous)]),
        Arc::new(AlwaysAccept),
        initial,
        10,
        0,
    )
    .unwrap_err();
    assert!(matches!(err, ChainError::InvalidInitialState(_)));
}

#[test]
fn one_part_chain_idles_on_the_initial_state() -> anyhow::Result<()> {
    // A single-part plan has no boundary; the chain repeats itself.
    let graph = grid_graph(2, 2);
    let initial = standard_partition(graph, prefix_split(4, 4))?;
    let chain = flip_chain(initial.clone(), 10, 5);
    let states: Vec<_> = chain.collect::<Result<_, _>>()?;
    assert_eq!(states.len(), 10);
    for state in &states {
        assert!(Partition::ptr_eq(state, &initial));
    }
    Ok(())
}

/// Admits only the initial state (empty last flip); every candidate fails.
struct NoCandidateValid;

impl Constraint for NoCandidateValid {
    fn name(&self) -> &str {
        "no_candidate_valid"
    }

    fn check(&self, candidate: &Partition) -> ConstraintOutcome {
        if candidate.last_flip().is_empty() {
            ConstraintOutcome::Pass
        } else {
            ConstraintOutcome::Fail("no candidate passes".to_string())
        }
    }
}

#[test]
fn rejection_budget_exhausts_with_a_typed_error() {
    let initial = grid_4x4_halves();
    let mut chain = MarkovChain::new(
        Arc::new(RandomFlip::new()),
        Validator::all_of(vec![Arc::new(NoCandidateValid)]),
        Arc::new(AlwaysAccept),
        initial,
        10,
        1,
    )
    .unwrap()
    .with_max_rejections(50);

    let first = chain.next().unwrap();
    assert!(first.is_ok());
    let second = chain.next().unwrap();
    assert!(matches!(
        second,
        Err(ChainError::RejectionExhausted {
            attempts: 50,
            ..
        })
    ));
    assert_eq!(chain.state(), ChainState::Failed);
    assert!(chain.next().is_none(), "failed chains are exhausted");
}

#[test]
fn constraint_rejections_do_not_consume_steps() -> anyhow::Result<()> {
    // A validator that rejects any candidate moving node 0 or node 1:
    // plenty of draws get rejected, yet the chain still emits every step.
    struct FreezeCorner;
    impl Constraint for FreezeCorner {
        fn name(&self) -> &str {
            "freeze_corner"
        }
        fn check(&self, candidate: &Partition) -> ConstraintOutcome {
            let delta = candidate.last_flip();
            if delta.get(0).is_some() || delta.get(1).is_some() {
                ConstraintOutcome::Fail("corner is frozen".to_string())
            } else {
                ConstraintOutcome::Pass
            }
        }
    }

    let chain = MarkovChain::new(
        Arc::new(RandomFlip::new()),
        Validator::all_of(vec![Arc::new(FreezeCorner), Arc::new(SingleFlipContiguous)]),
        Arc::new(AlwaysAccept),
        grid_4x4_halves(),
        30,
        77,
    )?;
    let states: Vec<_> = chain.collect::<Result<_, _>>()?;
    assert_eq!(states.len(), 30);
    for state in &states {
        assert_eq!(state.part_of(0), ironchain::PartId::new(0));
        assert_eq!(state.part_of(1), ironchain::PartId::new(0));
    }
    Ok(())
}

#[test]
fn acceptance_rejections_do_consume_steps() -> anyhow::Result<()> {
    use ironchain::AcceptFn;
    use rand::rngs::SmallRng;

    /// Refuses everything: the chain must re-emit the initial state.
    struct RefuseAll;
    impl AcceptFn for RefuseAll {
        fn name(&self) -> &str {
            "refuse_all"
        }
        fn accept(
            &self,
            _step: usize,
            _current: &Partition,
            _candidate: &Partition,
            _rng: &mut SmallRng,
        ) -> ironchain::Result<bool> {
            Ok(false)
        }
    }

    let initial = grid_4x4_halves();
    let chain = MarkovChain::new(
        Arc::new(RandomFlip::new()),
        Validator::all_of(vec![Arc::new(SingleFlipContiguous)]),
        Arc::new(RefuseAll),
        initial.clone(),
        12,
        3,
    )?;
    let states: Vec<_> = chain.collect::<Result<_, _>>()?;
    assert_eq!(states.len(), 12);
    for state in states {
        assert!(Partition::ptr_eq(&state, &initial));
    }
    Ok(())
}

#[test]
fn cancellation_stops_between_steps() -> anyhow::Result<()> {
    let token = CancelToken::new();
    let mut chain = flip_chain(grid_4x4_halves(), 1000, 4).with_cancel_token(token.clone());

    chain.next().unwrap()?;
    chain.next().unwrap()?;
    token.cancel();
    assert!(chain.next().is_none());
    assert_eq!(chain.state(), ChainState::Done);
    Ok(())
}

#[test]
fn progress_hook_sees_every_step() -> anyhow::Result<()> {
    let counter = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&counter);
    let chain = flip_chain(grid_4x4_halves(), 15, 6)
        .on_step(move |_| {
            seen.fetch_add(1, Ordering::Relaxed);
        });
    chain.collect::<Result<Vec<_>, _>>()?;
    assert_eq!(counter.load(Ordering::Relaxed), 15);
    Ok(())
}

#[cfg(feature = "events")]
#[test]
fn chain_counts_events() -> anyhow::Result<()> {
    use ironchain::events::EventLog;
    let log = EventLog::new();
    let chain = flip_chain(grid_4x4_halves(), 20, 8).with_observer(Arc::new(log.clone()));
    chain.collect::<Result<Vec<_>, _>>()?;
    // 19 transitions after the initial state, all accepted.
    assert_eq!(log.count("step_accepted"), 19);
    Ok(())
}
