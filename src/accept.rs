//! Acceptance functions.
//!
//! After a candidate passes the constraint stack, acceptance decides whether
//! the chain advances to it or re-emits the current state. Outcomes are
//! returned, never thrown: a score function that fails internally surfaces
//! as an `Err`, which the chain treats as "candidate invalid".

use crate::constraints::ScoreFn;
use crate::errors::Result;
use crate::partition::Partition;
use rand::Rng;
use rand::rngs::SmallRng;
use std::sync::Arc;

/// Decides whether the chain advances to a valid candidate.
pub trait AcceptFn: Send + Sync {
    fn name(&self) -> &str;

    /// `step` is the index the candidate would be emitted at; schedules use
    /// it, stateless acceptors ignore it.
    fn accept(
        &self,
        step: usize,
        current: &Partition,
        candidate: &Partition,
        rng: &mut SmallRng,
    ) -> Result<bool>;
}

/// Accept every valid candidate.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysAccept;

impl AcceptFn for AlwaysAccept {
    fn name(&self) -> &str {
        "always_accept"
    }

    fn accept(
        &self,
        _step: usize,
        _current: &Partition,
        _candidate: &Partition,
        _rng: &mut SmallRng,
    ) -> Result<bool> {
        Ok(true)
    }
}

/// Inverse-temperature schedule for [`MetropolisHastings`].
#[derive(Clone)]
pub enum BetaSchedule {
    Constant(f64),
    /// Alternate `cold_steps` at β = 1 with `hot_steps` at β = 0, starting
    /// cold. Produces the warming/cooling trace used to escape local optima.
    JumpCycle { cold_steps: usize, hot_steps: usize },
    /// Linear ramp from `start` to `end` over `duration` steps, constant at
    /// `end` afterwards.
    Linear { start: f64, end: f64, duration: usize },
    Custom(Arc<dyn Fn(usize) -> f64 + Send + Sync>),
}

impl BetaSchedule {
    pub fn beta(&self, step: usize) -> f64 {
        match self {
            BetaSchedule::Constant(beta) => *beta,
            BetaSchedule::JumpCycle {
                cold_steps,
                hot_steps,
            } => {
                let period = (cold_steps + hot_steps).max(1);
                if step % period < *cold_steps { 1.0 } else { 0.0 }
            }
            BetaSchedule::Linear {
                start,
                end,
                duration,
            } => {
                if *duration == 0 || step >= *duration {
                    *end
                } else {
                    start + (end - start) * (step as f64 / *duration as f64)
                }
            }
            BetaSchedule::Custom(f) => f(step),
        }
    }
}

impl std::fmt::Debug for BetaSchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BetaSchedule::Constant(beta) => write!(f, "Constant({beta})"),
            BetaSchedule::JumpCycle {
                cold_steps,
                hot_steps,
            } => write!(f, "JumpCycle({cold_steps}, {hot_steps})"),
            BetaSchedule::Linear {
                start,
                end,
                duration,
            } => write!(f, "Linear({start} → {end} over {duration})"),
            BetaSchedule::Custom(_) => write!(f, "Custom"),
        }
    }
}

/// Metropolis–Hastings acceptance over a score to *minimize*.
///
/// Accepts with probability `min(1, exp(-β(step) · magnitude · Δscore))`
/// where `Δscore = score(candidate) - score(current)`: improvements always
/// pass, worsenings pass with exponentially small probability as β grows.
#[derive(Clone)]
pub struct MetropolisHastings {
    score: ScoreFn,
    beta: BetaSchedule,
    magnitude: f64,
}

impl MetropolisHastings {
    pub fn new(score: ScoreFn, beta: BetaSchedule) -> Self {
        Self {
            score,
            beta,
            magnitude: 1.0,
        }
    }

    /// Scale every β by a constant factor (annealing strength).
    pub fn with_magnitude(mut self, magnitude: f64) -> Self {
        self.magnitude = magnitude;
        self
    }
}

impl AcceptFn for MetropolisHastings {
    fn name(&self) -> &str {
        "metropolis_hastings"
    }

    fn accept(
        &self,
        step: usize,
        current: &Partition,
        candidate: &Partition,
        rng: &mut SmallRng,
    ) -> Result<bool> {
        let delta = (self.score)(candidate)? - (self.score)(current)?;
        if delta <= 0.0 {
            return Ok(true);
        }
        let beta = self.beta.beta(step) * self.magnitude;
        let threshold = (-beta * delta).exp();
        Ok(rng.random::<f64>() < threshold)
    }
}

/// Tilted acceptance: take improvements always, worsenings with fixed
/// probability `p`.
#[derive(Clone)]
pub struct TiltedAcceptance {
    score: ScoreFn,
    p: f64,
    maximize: bool,
}

impl TiltedAcceptance {
    pub fn new(score: ScoreFn, p: f64, maximize: bool) -> Self {
        Self { score, p, maximize }
    }
}

impl AcceptFn for TiltedAcceptance {
    fn name(&self) -> &str {
        "tilted"
    }

    fn accept(
        &self,
        _step: usize,
        current: &Partition,
        candidate: &Partition,
        rng: &mut SmallRng,
    ) -> Result<bool> {
        let cur = (self.score)(current)?;
        let cand = (self.score)(candidate)?;
        let improved = if self.maximize { cand >= cur } else { cand <= cur };
        Ok(improved || rng.random::<f64>() < self.p)
    }
}
