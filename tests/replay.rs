#![cfg(feature = "replay")]

use ironchain::replay::{ChainRecording, graph_digest};
use ironchain::testing::*;
use ironchain::{
    AlwaysAccept, ChainError, MarkovChain, RandomFlip, SingleFlipContiguous, Validator,
};
use std::sync::Arc;

fn flip_chain(initial: ironchain::Partition, steps: usize, seed: u64) -> MarkovChain {
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
fn replay_reproduces_every_state() -> anyhow::Result<()> {
    // S6: record a run, re-expand it, compare step by step on every
    // updater.
    let initial = grid_4x4_halves();
    let chain = flip_chain(initial.clone(), 30, 2024);
    let (recording, states) = ChainRecording::record(chain)?;
    assert_eq!(states.len(), 30);
    assert_eq!(recording.len(), 29);

    let replayed: Vec<_> = recording
        .replay(initial.clone())?
        .collect::<Result<_, _>>()?;
    assert_eq!(replayed.len(), states.len());
    for (original, reconstructed) in states.iter().zip(&replayed) {
        assert_partitions_equal(original, reconstructed);
    }
    Ok(())
}

#[test]
fn replay_preserves_refused_steps() -> anyhow::Result<()> {
    use ironchain::{AcceptFn, Partition};
    use rand::rngs::SmallRng;

    /// Refuse every other candidate so the recording holds empty steps.
    struct RefuseOdd;
    impl AcceptFn for RefuseOdd {
        fn name(&self) -> &str {
            "refuse_odd"
        }
        fn accept(
            &self,
            step: usize,
            _current: &Partition,
            _candidate: &Partition,
            _rng: &mut SmallRng,
        ) -> ironchain::Result<bool> {
            Ok(step % 2 == 0)
        }
    }

    let initial = grid_4x4_halves();
    let chain = MarkovChain::new(
        Arc::new(RandomFlip::new()),
        Validator::all_of(vec![Arc::new(SingleFlipContiguous)]),
        Arc::new(RefuseOdd),
        initial.clone(),
        20,
        5,
    )?;
    let (recording, states) = ChainRecording::record(chain)?;
    let replayed: Vec<_> = recording
        .replay(initial)?
        .collect::<Result<_, _>>()?;
    for (original, reconstructed) in states.iter().zip(&replayed) {
        assert_partitions_equal(original, reconstructed);
    }
    Ok(())
}

#[test]
fn recordings_round_trip_through_disk() -> anyhow::Result<()> {
    let initial = grid_4x4_halves();
    let chain = flip_chain(initial.clone(), 10, 77);
    let (recording, _) = ChainRecording::record(chain)?;
    let recording = recording.with_seed(77);

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("run.chain");
    recording.save(&path)?;
    let loaded = ChainRecording::load(&path)?;

    assert_eq!(loaded.seed(), Some(77));
    assert_eq!(loaded.len(), recording.len());
    let a: Vec<_> = recording
        .replay(initial.clone())?
        .collect::<Result<_, _>>()?;
    let b: Vec<_> = loaded.replay(initial)?.collect::<Result<_, _>>()?;
    for (x, y) in a.iter().zip(&b) {
        assert_partitions_equal(x, y);
    }
    Ok(())
}

#[test]
fn replaying_against_the_wrong_graph_fails() -> anyhow::Result<()> {
    let initial = grid_4x4_halves();
    let chain = flip_chain(initial.clone(), 5, 1);
    let (recording, _) = ChainRecording::record(chain)?;

    let other = standard_partition(grid_graph(5, 5), vertical_stripes(5, 5, 1))?;
    let err = recording.replay(other).unwrap_err();
    assert!(matches!(err, ChainError::ReplayMismatch(_)));
    Ok(())
}

#[test]
fn graph_digests_are_stable_and_distinct() {
    let a = grid_graph(4, 4);
    let b = grid_graph(4, 4);
    let c = grid_graph(5, 4);
    assert_eq!(graph_digest(&a), graph_digest(&b));
    assert_ne!(graph_digest(&a), graph_digest(&c));
}
