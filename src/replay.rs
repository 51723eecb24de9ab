//! Record accepted flips and re-expand a chain bit-for-bit.
//!
//! A [`ChainRecording`] stores the per-step flip of one chain run together
//! with the seed and a SHA-256 digest of the graph's canonical JSON.
//! Re-expanding the recording against the same graph and initial partition
//! reproduces every emitted partition exactly -- same assignments, same
//! updater values -- without re-running proposals or constraints.
//!
//! On disk the recording is a postcard buffer behind a one-byte version tag;
//! loading a file whose version or graph digest does not match fails with
//! `ReplayMismatch` rather than silently diverging.
//!
//! # Example
//!
//! ```no_run
//! use ironchain::replay::ChainRecording;
//! # fn demo(chain: ironchain::chain::MarkovChain,
//! #         initial: ironchain::partition::Partition)
//! #         -> ironchain::errors::Result<()> {
//! let (recording, _states) = ChainRecording::record(chain)?;
//! recording.save("run.chain")?;
//!
//! let loaded = ChainRecording::load("run.chain")?;
//! for state in loaded.replay(initial)? {
//!     let _partition = state?;
//! }
//! # Ok(())
//! # }
//! ```

use crate::assignment::Flip;
use crate::chain::MarkovChain;
use crate::errors::{ChainError, Result};
use crate::graph::Graph;
use crate::ids::PartId;
use crate::partition::Partition;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

const FORMAT_VERSION: u8 = 1;

/// SHA-256 of the graph's canonical JSON rendering.
pub fn graph_digest(graph: &Graph) -> [u8; 32] {
    let json = crate::io::to_json_value(graph).to_string();
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    hasher.finalize().into()
}

/// One recorded chain run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainRecording {
    version: u8,
    graph_digest: [u8; 32],
    seed: Option<u64>,
    /// Per emitted step after the initial state: the applied flip as
    /// `(node, new part)` pairs. Empty means the step re-emitted the
    /// current state.
    steps: Vec<Vec<(u32, u32)>>,
}

impl ChainRecording {
    /// Drive `chain` to completion, recording each emitted step's flip.
    ///
    /// Returns the recording and the emitted states (including the initial
    /// one), so a caller can both analyze and persist a single run.
    pub fn record(chain: MarkovChain) -> Result<(Self, Vec<Partition>)> {
        let mut states: Vec<Partition> = Vec::new();
        let mut steps: Vec<Vec<(u32, u32)>> = Vec::new();
        let mut digest: Option<[u8; 32]> = None;

        for state in chain {
            let partition = state?;
            if digest.is_none() {
                digest = Some(graph_digest(partition.graph()));
            }
            if let Some(previous) = states.last() {
                if Partition::ptr_eq(previous, &partition) {
                    // Valid-but-refused step: the state repeats.
                    steps.push(Vec::new());
                } else {
                    steps.push(
                        partition
                            .last_flip()
                            .iter()
                            .map(|(v, _, new)| (v, new.raw()))
                            .collect(),
                    );
                }
            }
            states.push(partition);
        }

        let digest = digest.ok_or_else(|| {
            ChainError::Replay("chain emitted no states; nothing to record".to_string())
        })?;
        Ok((
            Self {
                version: FORMAT_VERSION,
                graph_digest: digest,
                seed: None,
                steps,
            },
            states,
        ))
    }

    /// Tag the recording with the seed that produced it (informational).
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Recorded steps, excluding the initial state.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Re-expand against the initial partition of the recorded run.
    ///
    /// Fails with `ReplayMismatch` if the partition's graph digest differs
    /// from the recorded one.
    pub fn replay(&self, initial: Partition) -> Result<Replay<'_>> {
        let digest = graph_digest(initial.graph());
        if digest != self.graph_digest {
            return Err(ChainError::ReplayMismatch(
                "graph does not match the recorded run".to_string(),
            ));
        }
        Ok(Replay {
            steps: &self.steps,
            next: 0,
            current: Some(initial),
        })
    }

    /// Serialize to a postcard buffer behind the version tag.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        postcard::to_allocvec(self).map_err(|e| ChainError::Replay(format!("encode: {e}")))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let recording: Self = postcard::from_bytes(bytes)
            .map_err(|e| ChainError::Replay(format!("decode: {e}")))?;
        if recording.version != FORMAT_VERSION {
            return Err(ChainError::ReplayMismatch(format!(
                "recording version {} unsupported (expected {FORMAT_VERSION})",
                recording.version
            )));
        }
        Ok(recording)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path.as_ref(), self.to_bytes()?)
            .map_err(|e| ChainError::Io(format!("{}: {e}", path.as_ref().display())))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = fs::read(path.as_ref())
            .map_err(|e| ChainError::Io(format!("{}: {e}", path.as_ref().display())))?;
        Self::from_bytes(&bytes)
    }
}

/// Iterator over a re-expanded run: the initial state first, then one state
/// per recorded step.
pub struct Replay<'a> {
    steps: &'a [Vec<(u32, u32)>],
    next: usize,
    current: Option<Partition>,
}

impl std::fmt::Debug for Replay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Replay")
            .field("total_steps", &self.steps.len())
            .field("next", &self.next)
            .field("has_current", &self.current.is_some())
            .finish()
    }
}

impl Iterator for Replay<'_> {
    type Item = Result<Partition>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current.as_ref()?;
        if self.next == 0 {
            self.next = 1;
            return Some(Ok(current.clone()));
        }
        let step_idx = self.next - 1;
        if step_idx >= self.steps.len() {
            self.current = None;
            return None;
        }
        self.next += 1;

        let recorded = &self.steps[step_idx];
        if recorded.is_empty() {
            return Some(Ok(current.clone()));
        }
        let flip: Flip = recorded
            .iter()
            .map(|&(v, part)| (v, PartId::new(part)))
            .collect();
        match current.flip(&flip) {
            Ok(next_state) => {
                self.current = Some(next_state.clone());
                Some(Ok(next_state))
            }
            Err(e) => {
                self.current = None;
                Some(Err(e))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.current {
            None => (0, Some(0)),
            Some(_) => {
                let remaining = (self.steps.len() + 1).saturating_sub(self.next);
                (remaining, Some(remaining))
            }
        }
    }
}
