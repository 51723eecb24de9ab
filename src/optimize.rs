//! Optimization wrappers over the chain: short bursts, simulated annealing,
//! and tilted runs against a single partition score.

use crate::accept::{AlwaysAccept, BetaSchedule, MetropolisHastings, TiltedAcceptance};
use crate::chain::MarkovChain;
use crate::constraints::{ScoreFn, Validator};
use crate::errors::Result;
use crate::ids::PartId;
use crate::partition::Partition;
use crate::proposals::Proposal;
use ordered_float::OrderedFloat;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Result of one optimizer run.
#[derive(Clone)]
pub struct OptimizerOutcome {
    pub best_partition: Partition,
    pub best_score: f64,
    /// Best-so-far after each burst (short bursts) or each step (annealing,
    /// tilted runs).
    pub trace: Vec<f64>,
}

/// Tracks the best partition seen across chain runs against one score.
///
/// The score is always *observed*; steering happens through the acceptance
/// function each method installs. Bursts reseed from the best state found so
/// far, so `best_score` is monotone across a run (non-decreasing when
/// maximizing, non-increasing otherwise).
pub struct SingleMetricOptimizer {
    proposal: Arc<dyn Proposal>,
    constraints: Validator,
    score: ScoreFn,
    maximize: bool,
    best_partition: Partition,
    best_score: f64,
}

impl SingleMetricOptimizer {
    pub fn new(
        proposal: Arc<dyn Proposal>,
        constraints: Validator,
        initial: Partition,
        score: ScoreFn,
        maximize: bool,
    ) -> Result<Self> {
        let best_score = score(&initial)?;
        Ok(Self {
            proposal,
            constraints,
            score,
            maximize,
            best_partition: initial,
            best_score,
        })
    }

    pub fn best_score(&self) -> f64 {
        self.best_score
    }

    pub fn best_partition(&self) -> &Partition {
        &self.best_partition
    }

    /// True if `candidate` is at least as good as `incumbent`.
    ///
    /// Ties count: accepting equal-score states lets bursts drift across
    /// plateaus instead of pinning to the first optimum found.
    fn no_worse(&self, candidate: f64, incumbent: f64) -> bool {
        if self.maximize {
            candidate >= incumbent
        } else {
            candidate <= incumbent
        }
    }

    fn observe(&mut self, partition: &Partition) -> Result<()> {
        let score = (self.score)(partition)?;
        if self.no_worse(score, self.best_score) {
            self.best_score = score;
            self.best_partition = partition.clone();
        }
        Ok(())
    }

    fn run_chain(
        &mut self,
        accept: Arc<dyn crate::accept::AcceptFn>,
        start: Partition,
        steps: usize,
        seed: u64,
        trace: &mut Vec<f64>,
        trace_every_step: bool,
    ) -> Result<()> {
        let chain = MarkovChain::new(
            Arc::clone(&self.proposal),
            self.constraints.clone(),
            accept,
            start,
            steps,
            seed,
        )?;
        for state in chain {
            let partition = state?;
            self.observe(&partition)?;
            if trace_every_step {
                trace.push(self.best_score);
            }
        }
        Ok(())
    }

    /// Run `n_bursts` chains of `burst_length` steps, reseeding each burst
    /// from the best partition found so far.
    pub fn short_bursts(
        &mut self,
        burst_length: usize,
        n_bursts: usize,
        seed: u64,
    ) -> Result<OptimizerOutcome> {
        let mut trace = Vec::with_capacity(n_bursts);
        for burst in 0..n_bursts {
            let start = self.best_partition.clone();
            self.run_chain(
                Arc::new(AlwaysAccept),
                start,
                burst_length,
                seed.wrapping_add(burst as u64),
                &mut trace,
                false,
            )?;
            trace.push(self.best_score);
        }
        Ok(OptimizerOutcome {
            best_partition: self.best_partition.clone(),
            best_score: self.best_score,
            trace,
        })
    }

    /// One chain under Metropolis–Hastings with a β schedule.
    ///
    /// The installed acceptance minimizes; when maximizing, the score is
    /// negated on the way in.
    pub fn simulated_annealing(
        &mut self,
        n_steps: usize,
        beta_schedule: BetaSchedule,
        beta_magnitude: f64,
        seed: u64,
    ) -> Result<OptimizerOutcome> {
        let score = Arc::clone(&self.score);
        let directed: ScoreFn = if self.maximize {
            Arc::new(move |p: &Partition| score(p).map(|v| -v))
        } else {
            score
        };
        let accept = MetropolisHastings::new(directed, beta_schedule).with_magnitude(beta_magnitude);
        let start = self.best_partition.clone();
        let mut trace = Vec::with_capacity(n_steps);
        self.run_chain(Arc::new(accept), start, n_steps, seed, &mut trace, true)?;
        Ok(OptimizerOutcome {
            best_partition: self.best_partition.clone(),
            best_score: self.best_score,
            trace,
        })
    }

    /// One chain accepting improvements always and worsenings with
    /// probability `p`.
    pub fn tilted_run(&mut self, n_steps: usize, p: f64, seed: u64) -> Result<OptimizerOutcome> {
        let accept = TiltedAcceptance::new(Arc::clone(&self.score), p, self.maximize);
        let start = self.best_partition.clone();
        let mut trace = Vec::with_capacity(n_steps);
        self.run_chain(Arc::new(accept), start, n_steps, seed, &mut trace, true)?;
        Ok(OptimizerOutcome {
            best_partition: self.best_partition.clone(),
            best_score: self.best_score,
            trace,
        })
    }
}

/// Score variants for [`Gingleator`].
///
/// All operate on per-part minority shares `s(p) = minority(p) / total(p)`
/// against a threshold `t`, with `k` the count of parts at or above `t` and
/// `next` the highest share strictly below `t` (0 when none).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GingleatorScore {
    /// `k`.
    NumOpportunityDists,
    /// `k + next`: partial credit for the nearest miss.
    RewardPartialDist,
    /// `k`, plus `(next - (t - 0.1)) · 10` once the nearest miss is within
    /// 0.1 of the threshold.
    RewardNextHighestClose,
    /// `0` when `k = 0`, else `k - 1 + (1 - max share over t) / (1 - t)`:
    /// discourages packing far past the threshold.
    PenalizeMaximumOver,
    /// Like `PenalizeMaximumOver` with the mean of the over-threshold
    /// shares.
    PenalizeAvgOver,
}

/// Opportunity-district optimizer presets.
///
/// Builds score functions (and optimizers) that count districts whose
/// minority share clears a threshold, with variants that shape the reward
/// around the threshold.
pub struct Gingleator;

impl Gingleator {
    /// Per-part minority shares, ascending by part id.
    fn shares(partition: &Partition, minority_alias: &str, pop_alias: &str) -> Result<Vec<f64>> {
        let minority: BTreeMap<PartId, i64> = partition.int_tally(minority_alias)?;
        let total: BTreeMap<PartId, i64> = partition.int_tally(pop_alias)?;
        Ok(total
            .iter()
            .map(|(part, &pop)| {
                let m = minority.get(part).copied().unwrap_or(0);
                if pop == 0 { 0.0 } else { m as f64 / pop as f64 }
            })
            .collect())
    }

    fn evaluate(shares: &[f64], threshold: f64, variant: GingleatorScore) -> f64 {
        let k = shares.iter().filter(|&&s| s >= threshold).count() as f64;
        let next = shares
            .iter()
            .filter(|&&s| s < threshold)
            .copied()
            .max_by_key(|&s| OrderedFloat(s))
            .unwrap_or(0.0);
        match variant {
            GingleatorScore::NumOpportunityDists => k,
            GingleatorScore::RewardPartialDist => k + next,
            GingleatorScore::RewardNextHighestClose => {
                if next < threshold - 0.1 {
                    k
                } else {
                    k + (next - (threshold - 0.1)) * 10.0
                }
            }
            GingleatorScore::PenalizeMaximumOver => {
                if k == 0.0 {
                    0.0
                } else {
                    let max_over = shares
                        .iter()
                        .filter(|&&s| s >= threshold)
                        .copied()
                        .max_by_key(|&s| OrderedFloat(s))
                        .expect("k > 0");
                    k - 1.0 + (1.0 - max_over) / (1.0 - threshold)
                }
            }
            GingleatorScore::PenalizeAvgOver => {
                if k == 0.0 {
                    0.0
                } else {
                    let over: Vec<f64> =
                        shares.iter().filter(|&&s| s >= threshold).copied().collect();
                    let avg = over.iter().sum::<f64>() / over.len() as f64;
                    k - 1.0 + (1.0 - avg) / (1.0 - threshold)
                }
            }
        }
    }

    /// A score function over registered minority/total population tallies.
    pub fn score_fn(
        minority_alias: impl Into<String>,
        pop_alias: impl Into<String>,
        threshold: f64,
        variant: GingleatorScore,
    ) -> ScoreFn {
        let minority_alias = minority_alias.into();
        let pop_alias = pop_alias.into();
        Arc::new(move |partition: &Partition| {
            let shares = Self::shares(partition, &minority_alias, &pop_alias)?;
            Ok(Self::evaluate(&shares, threshold, variant))
        })
    }

    /// A maximizing [`SingleMetricOptimizer`] over the chosen variant.
    pub fn optimizer(
        proposal: Arc<dyn Proposal>,
        constraints: Validator,
        initial: Partition,
        minority_alias: impl Into<String>,
        pop_alias: impl Into<String>,
        threshold: f64,
        variant: GingleatorScore,
    ) -> Result<SingleMetricOptimizer> {
        SingleMetricOptimizer::new(
            proposal,
            constraints,
            initial,
            Self::score_fn(minority_alias, pop_alias, threshold, variant),
            true,
        )
    }
}
