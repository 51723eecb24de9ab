//! The chain driver: a lazy sequence of accepted partitions.
//!
//! [`MarkovChain`] wires a proposal, a constraint stack, and an acceptance
//! function over an initial partition and iterates:
//!
//! 1. ask the proposal for a candidate (a child of the current state),
//! 2. validate it -- a constraint failure (or an updater failure inside
//!    one) does *not* count toward `total_steps`; the draw is retried under
//!    a bounded budget (`RejectionExhausted` when it runs out),
//! 3. run acceptance -- a refusal *does* count: the current state is
//!    re-emitted and the step counter advances.
//!
//! The iterator emits exactly `total_steps` states including the initial
//! one. A cooperative [`CancelToken`] is checked between steps; fatal errors
//! are yielded once and end the stream. State transitions are monotone:
//! `Ready → Running → (Done | Failed)`.

use crate::accept::AcceptFn;
use crate::constraints::{ConstraintOutcome, Validator};
use crate::errors::{ChainError, Result};
use crate::partition::Partition;
use crate::proposals::Proposal;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(feature = "events")]
use crate::events::{ChainEvent, ChainObserver};

/// Per-step budget of constraint-invalid draws.
pub const DEFAULT_MAX_REJECTIONS: usize = 1_000_000;

/// Lifecycle of a chain. Transitions are monotone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainState {
    Ready,
    Running,
    Done,
    Failed,
}

/// Cooperative cancellation flag, checked between steps.
///
/// Cheaply cloneable; all clones share the flag, so a host can keep one end
/// and hand the other to the chain.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// A Markov chain over partitions.
///
/// Implements `Iterator` with `Item = Result<Partition, ChainError>`;
/// after yielding an `Err` the stream is exhausted and
/// [`MarkovChain::state`] reports `Failed`.
pub struct MarkovChain {
    proposal: Arc<dyn Proposal>,
    constraints: Validator,
    accept: Arc<dyn AcceptFn>,
    current: Partition,
    rng: SmallRng,
    total_steps: usize,
    emitted: usize,
    max_rejections: usize,
    state: ChainState,
    cancel: CancelToken,
    /// Detach parent links after each accepted step so ancestors free up.
    trim_parents: bool,
    error: Option<ChainError>,
    on_step: Option<Box<dyn FnMut(usize) + Send>>,
    #[cfg(feature = "events")]
    observers: Vec<Arc<dyn ChainObserver>>,
}

impl std::fmt::Debug for MarkovChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkovChain")
            .field("total_steps", &self.total_steps)
            .field("emitted", &self.emitted)
            .field("max_rejections", &self.max_rejections)
            .field("state", &self.state)
            .field("trim_parents", &self.trim_parents)
            .finish()
    }
}

impl MarkovChain {
    /// Build a chain. The initial state must satisfy the constraint stack;
    /// otherwise this fails with `InvalidInitialState`.
    ///
    /// All randomness flows from `seed`: identical
    /// `(graph, initial, proposal, constraints, accept, seed, total_steps)`
    /// runs emit identical sequences.
    pub fn new(
        proposal: Arc<dyn Proposal>,
        constraints: Validator,
        accept: Arc<dyn AcceptFn>,
        initial: Partition,
        total_steps: usize,
        seed: u64,
    ) -> Result<Self> {
        if let ConstraintOutcome::Fail(reason) = constraints.check(&initial) {
            return Err(ChainError::InvalidInitialState(reason));
        }
        Ok(Self {
            proposal,
            constraints,
            accept,
            current: initial,
            rng: SmallRng::seed_from_u64(seed),
            total_steps,
            emitted: 0,
            max_rejections: DEFAULT_MAX_REJECTIONS,
            state: ChainState::Ready,
            cancel: CancelToken::new(),
            trim_parents: true,
            error: None,
            on_step: None,
            #[cfg(feature = "events")]
            observers: Vec::new(),
        })
    }

    pub fn with_max_rejections(mut self, max_rejections: usize) -> Self {
        self.max_rejections = max_rejections.max(1);
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Keep full parent chains alive (diff caches for every ancestor).
    /// Costs memory proportional to the run length; off by default.
    pub fn keep_ancestors(mut self) -> Self {
        self.trim_parents = false;
        self
    }

    /// Progress hook, called with each emitted step index (external CLIs
    /// attach bars here).
    pub fn on_step(mut self, hook: impl FnMut(usize) + Send + 'static) -> Self {
        self.on_step = Some(Box::new(hook));
        self
    }

    #[cfg(feature = "events")]
    pub fn with_observer(mut self, observer: Arc<dyn ChainObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    #[cfg(feature = "events")]
    fn emit(&self, event: ChainEvent) {
        for observer in &self.observers {
            observer.notify(&event);
        }
    }

    pub fn state(&self) -> ChainState {
        self.state
    }

    /// The fatal error, once the chain has failed.
    pub fn error(&self) -> Option<&ChainError> {
        self.error.as_ref()
    }

    pub fn current(&self) -> &Partition {
        &self.current
    }

    /// States emitted so far (including the initial state).
    pub fn steps_taken(&self) -> usize {
        self.emitted
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    fn fail(&mut self, error: ChainError) -> Option<Result<Partition>> {
        self.state = ChainState::Failed;
        self.error = Some(error.clone());
        Some(Err(error))
    }

    fn notify_step(&mut self) {
        let step = self.emitted - 1;
        if let Some(hook) = &mut self.on_step {
            hook(step);
        }
    }

    /// Draw candidates until one is valid, accepted or not.
    fn advance(&mut self) -> Option<Result<Partition>> {
        let step = self.emitted;
        for _attempt in 0..self.max_rejections {
            let candidate = match self.proposal.propose(&self.current, &mut self.rng) {
                Ok(candidate) => candidate,
                // A plan with no boundary has itself as its only neighbor:
                // the chain idles on the current state instead of dying.
                Err(ChainError::NoBoundary) => {
                    self.emitted += 1;
                    #[cfg(feature = "events")]
                    self.emit(ChainEvent::CandidateRejected { step });
                    self.notify_step();
                    return Some(Ok(self.current.clone()));
                }
                Err(error) => return self.fail(error),
            };

            match self.constraints.check(&candidate) {
                ConstraintOutcome::Fail(_reason) => {
                    // Invalid draws do not consume a step.
                    #[cfg(feature = "events")]
                    self.emit(ChainEvent::CandidateInvalid { reason: _reason });
                    continue;
                }
                ConstraintOutcome::Indeterminate => unreachable!("validator resolves"),
                ConstraintOutcome::Pass => {}
            }

            let accepted =
                match self
                    .accept
                    .accept(step, &self.current, &candidate, &mut self.rng)
                {
                    Ok(accepted) => accepted,
                    Err(error) => {
                        // Score failures mark the candidate invalid, not the
                        // chain.
                        #[cfg(feature = "events")]
                        self.emit(ChainEvent::CandidateInvalid {
                            reason: error.to_string(),
                        });
                        let _ = error;
                        continue;
                    }
                };

            if accepted {
                if self.trim_parents {
                    if let Err(error) = candidate.detach_parent() {
                        return self.fail(error);
                    }
                }
                self.current = candidate;
                self.emitted += 1;
                #[cfg(feature = "events")]
                self.emit(ChainEvent::StepAccepted { step });
                self.notify_step();
                return Some(Ok(self.current.clone()));
            }

            // Valid but refused: the current state repeats and the step
            // counter advances.
            self.emitted += 1;
            #[cfg(feature = "events")]
            self.emit(ChainEvent::CandidateRejected { step });
            self.notify_step();
            return Some(Ok(self.current.clone()));
        }
        self.fail(ChainError::RejectionExhausted {
            step,
            attempts: self.max_rejections,
        })
    }
}

impl Iterator for MarkovChain {
    type Item = Result<Partition>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.state {
            ChainState::Done | ChainState::Failed => return None,
            ChainState::Ready => {
                self.state = ChainState::Running;
                if self.total_steps == 0 {
                    self.state = ChainState::Done;
                    return None;
                }
                self.emitted = 1;
                self.notify_step();
                return Some(Ok(self.current.clone()));
            }
            ChainState::Running => {}
        }

        if self.cancel.is_cancelled() || self.emitted >= self.total_steps {
            self.state = ChainState::Done;
            return None;
        }
        self.advance()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.state {
            ChainState::Done | ChainState::Failed => (0, Some(0)),
            _ => {
                let remaining = self.total_steps - self.emitted;
                // A fatal error can cut the stream short.
                (0, Some(remaining))
            }
        }
    }
}
