//! Constraints and their conjunction.
//!
//! A [`Constraint`] judges a candidate partition and answers
//! [`ConstraintOutcome::Pass`], [`ConstraintOutcome::Fail`] with a reason,
//! or [`ConstraintOutcome::Indeterminate`] when its fast path does not apply
//! (the single-flip contiguity check on a multi-node flip, for example).
//! A [`Validator`] is the left-to-right conjunction: it short-circuits on
//! the first failure and resolves `Indeterminate` through the constraint's
//! [`Constraint::full_check`]. List cheap constraints first -- contiguity
//! failures are common and local, population sums are not.
//!
//! Constraints never return errors: anything that goes wrong internally
//! (a missing updater, a failed tally) is reported as a `Fail`, which the
//! chain treats as "candidate invalid" and retries.

use crate::errors::Result;
use crate::ids::PartId;
use crate::partition::Partition;
use crate::utils::{BalanceBand, ideal_population};
use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

/// Verdict of one constraint on one candidate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConstraintOutcome {
    Pass,
    Fail(String),
    /// The specialized check does not apply; fall back to the full check.
    Indeterminate,
}

/// A predicate over candidate partitions.
pub trait Constraint: Send + Sync {
    fn name(&self) -> &str;

    fn check(&self, candidate: &Partition) -> ConstraintOutcome;

    /// Authoritative check used when [`Self::check`] is `Indeterminate`.
    ///
    /// An `Indeterminate` from here counts as failure.
    fn full_check(&self, candidate: &Partition) -> ConstraintOutcome {
        self.check(candidate)
    }
}

/// Left-to-right conjunction of constraints.
#[derive(Clone, Default)]
pub struct Validator {
    constraints: Vec<Arc<dyn Constraint>>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all_of(constraints: Vec<Arc<dyn Constraint>>) -> Self {
        Self { constraints }
    }

    pub fn push(&mut self, constraint: Arc<dyn Constraint>) {
        self.constraints.push(constraint);
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Evaluate all constraints, short-circuiting on the first failure.
    pub fn check(&self, candidate: &Partition) -> ConstraintOutcome {
        for constraint in &self.constraints {
            let outcome = match constraint.check(candidate) {
                ConstraintOutcome::Indeterminate => match constraint.full_check(candidate) {
                    ConstraintOutcome::Indeterminate => ConstraintOutcome::Fail(format!(
                        "{}: full check was indeterminate",
                        constraint.name()
                    )),
                    resolved => resolved,
                },
                direct => direct,
            };
            match outcome {
                ConstraintOutcome::Pass => continue,
                ConstraintOutcome::Fail(reason) => {
                    return ConstraintOutcome::Fail(format!("{}: {reason}", constraint.name()));
                }
                ConstraintOutcome::Indeterminate => unreachable!("resolved above"),
            }
        }
        ConstraintOutcome::Pass
    }
}

fn fail_on_error<T>(result: Result<T>) -> std::result::Result<T, ConstraintOutcome> {
    result.map_err(|e| ConstraintOutcome::Fail(e.to_string()))
}

/// Number of parts whose induced subgraph is disconnected.
fn discontiguous_parts(partition: &Partition) -> usize {
    let graph = partition.graph();
    partition
        .parts()
        .filter(|&part| {
            let members = partition.members(part).expect("parts are non-empty");
            !graph.is_connected(&graph.subgraph(members))
        })
        .count()
}

/// Every part induces a connected subgraph.
///
/// On a graph with islands this is only satisfiable when each degree-zero
/// node is a singleton part: an island inside a larger part is unreachable
/// from the rest, so the BFS fails it automatically.
#[derive(Clone, Copy, Debug, Default)]
pub struct Contiguous;

impl Constraint for Contiguous {
    fn name(&self) -> &str {
        "contiguous"
    }

    fn check(&self, candidate: &Partition) -> ConstraintOutcome {
        let graph = candidate.graph();
        for part in candidate.parts() {
            let members = candidate.members(part).expect("parts are non-empty");
            if !graph.is_connected(&graph.subgraph(members)) {
                return ConstraintOutcome::Fail(format!("part {part} is disconnected"));
            }
        }
        ConstraintOutcome::Pass
    }
}

/// Contiguity specialized to a single-node flip.
///
/// For a flip of `v` from `p_old` to `p_new`:
/// - `p_new` stays connected iff `v` touches it, which the flip proposal
///   already guarantees (checked anyway -- candidates can come from
///   anywhere);
/// - `p_old` minus `v` stays connected iff all of `v`'s former same-part
///   neighbors sit in one component of the shrunken part, verified by a
///   local BFS.
///
/// Anything other than a one-node flip is `Indeterminate`, which the
/// validator resolves through the global [`Contiguous`] check.
#[derive(Clone, Copy, Debug, Default)]
pub struct SingleFlipContiguous;

impl Constraint for SingleFlipContiguous {
    fn name(&self) -> &str {
        "single_flip_contiguous"
    }

    fn check(&self, candidate: &Partition) -> ConstraintOutcome {
        let delta = candidate.last_flip();
        if delta.len() != 1 {
            return ConstraintOutcome::Indeterminate;
        }
        let (v, p_old, p_new) = delta.iter().next().expect("one move");
        let graph = candidate.graph();

        // The destination gained v; it stays connected iff v borders it.
        let touches_new = graph
            .adj(v as usize)
            .iter()
            .any(|&(nbr, _)| nbr != v && candidate.part_of(nbr) == p_new);
        if !touches_new {
            return ConstraintOutcome::Fail(format!(
                "node {v} has no neighbor in destination part {p_new}"
            ));
        }

        // The source lost v. Its remaining members are candidate's members.
        let Some(remaining) = candidate.members(p_old) else {
            return ConstraintOutcome::Fail(format!("part {p_old} was emptied"));
        };
        let old_neighbors: Vec<u32> = graph
            .adj(v as usize)
            .iter()
            .map(|&(nbr, _)| nbr)
            .filter(|nbr| remaining.contains(nbr))
            .collect();
        if old_neighbors.len() <= 1 {
            return ConstraintOutcome::Pass;
        }

        // BFS inside p_old \ {v} from one former neighbor until the rest
        // are found.
        let targets: BTreeSet<u32> = old_neighbors.iter().copied().collect();
        let start = old_neighbors[0];
        let mut visited: BTreeSet<u32> = BTreeSet::from([start]);
        let mut found = 1usize;
        let mut queue = VecDeque::from([start]);
        while let Some(u) = queue.pop_front() {
            if found == targets.len() {
                return ConstraintOutcome::Pass;
            }
            for &(nbr, _) in graph.adj(u as usize) {
                if nbr != v && remaining.contains(&nbr) && visited.insert(nbr) {
                    if targets.contains(&nbr) {
                        found += 1;
                    }
                    queue.push_back(nbr);
                }
            }
        }
        if found == targets.len() {
            ConstraintOutcome::Pass
        } else {
            ConstraintOutcome::Fail(format!("removing node {v} disconnects part {p_old}"))
        }
    }

    fn full_check(&self, candidate: &Partition) -> ConstraintOutcome {
        Contiguous.check(candidate)
    }
}

/// Every part's population within `epsilon` of the ideal.
#[derive(Clone, Debug)]
pub struct WithinPercentOfIdealPopulation {
    alias: String,
    band: BalanceBand,
}

impl WithinPercentOfIdealPopulation {
    /// Configure from the starting partition: the ideal is its total
    /// population over its number of parts.
    pub fn new(initial: &Partition, epsilon: f64, pop_alias: &str) -> Result<Self> {
        let tally = initial.int_tally(pop_alias)?;
        let total: i64 = tally.values().sum();
        let ideal = ideal_population(total, initial.num_parts());
        Ok(Self {
            alias: pop_alias.to_string(),
            band: BalanceBand::around(ideal, epsilon),
        })
    }

    pub fn band(&self) -> BalanceBand {
        self.band
    }
}

impl Constraint for WithinPercentOfIdealPopulation {
    fn name(&self) -> &str {
        "within_percent_of_ideal_population"
    }

    fn check(&self, candidate: &Partition) -> ConstraintOutcome {
        let tally = match fail_on_error(candidate.int_tally(&self.alias)) {
            Ok(tally) => tally,
            Err(fail) => return fail,
        };
        for (part, pop) in tally {
            if !self.band.contains(pop) {
                return ConstraintOutcome::Fail(format!(
                    "part {part} population {pop} outside {}",
                    self.band
                ));
            }
        }
        ConstraintOutcome::Pass
    }
}

/// Scalar reduction of a partition, used by the bound constraints.
pub type ScoreFn = Arc<dyn Fn(&Partition) -> Result<f64> + Send + Sync>;

/// `fn(candidate) <= bound`.
#[derive(Clone)]
pub struct UpperBound {
    label: String,
    f: ScoreFn,
    bound: f64,
}

impl UpperBound {
    pub fn new(label: impl Into<String>, f: ScoreFn, bound: f64) -> Self {
        Self {
            label: label.into(),
            f,
            bound,
        }
    }

    /// Bound initialized from the starting partition's own value.
    pub fn self_configuring(label: impl Into<String>, f: ScoreFn, initial: &Partition) -> Result<Self> {
        let bound = f(initial)?;
        Ok(Self::new(label, f, bound))
    }
}

impl Constraint for UpperBound {
    fn name(&self) -> &str {
        &self.label
    }

    fn check(&self, candidate: &Partition) -> ConstraintOutcome {
        match fail_on_error((self.f)(candidate)) {
            Ok(value) if value <= self.bound => ConstraintOutcome::Pass,
            Ok(value) => {
                ConstraintOutcome::Fail(format!("value {value} exceeds bound {}", self.bound))
            }
            Err(fail) => fail,
        }
    }
}

/// `fn(candidate) >= bound`.
#[derive(Clone)]
pub struct LowerBound {
    label: String,
    f: ScoreFn,
    bound: f64,
}

impl LowerBound {
    pub fn new(label: impl Into<String>, f: ScoreFn, bound: f64) -> Self {
        Self {
            label: label.into(),
            f,
            bound,
        }
    }

    /// Bound initialized from the starting partition's own value.
    pub fn self_configuring(label: impl Into<String>, f: ScoreFn, initial: &Partition) -> Result<Self> {
        let bound = f(initial)?;
        Ok(Self::new(label, f, bound))
    }
}

impl Constraint for LowerBound {
    fn name(&self) -> &str {
        &self.label
    }

    fn check(&self, candidate: &Partition) -> ConstraintOutcome {
        match fail_on_error((self.f)(candidate)) {
            Ok(value) if value >= self.bound => ConstraintOutcome::Pass,
            Ok(value) => {
                ConstraintOutcome::Fail(format!("value {value} below bound {}", self.bound))
            }
            Err(fail) => fail,
        }
    }
}

/// Symmetric percentage band around the starting partition's value.
#[derive(Clone)]
pub struct WithinPercentRangeOfBounds {
    label: String,
    f: ScoreFn,
    lo: f64,
    hi: f64,
}

impl WithinPercentRangeOfBounds {
    /// `percent` is a fraction: 0.05 admits values within ±5% of the
    /// initial value.
    pub fn new(
        label: impl Into<String>,
        f: ScoreFn,
        initial: &Partition,
        percent: f64,
    ) -> Result<Self> {
        let value = f(initial)?;
        let spread = value.abs() * percent;
        Ok(Self {
            label: label.into(),
            f,
            lo: value - spread,
            hi: value + spread,
        })
    }
}

impl Constraint for WithinPercentRangeOfBounds {
    fn name(&self) -> &str {
        &self.label
    }

    fn check(&self, candidate: &Partition) -> ConstraintOutcome {
        match fail_on_error((self.f)(candidate)) {
            Ok(value) if self.lo <= value && value <= self.hi => ConstraintOutcome::Pass,
            Ok(value) => ConstraintOutcome::Fail(format!(
                "value {value} outside [{}, {}]",
                self.lo, self.hi
            )),
            Err(fail) => fail,
        }
    }
}

/// Never more disconnected parts than the starting partition had.
///
/// Useful when the seed plan is itself imperfect: the chain may keep its
/// defects but must not add new ones.
#[derive(Clone, Copy, Debug)]
pub struct NoMoreDiscontiguous {
    allowed: usize,
}

impl NoMoreDiscontiguous {
    pub fn new(initial: &Partition) -> Self {
        Self {
            allowed: discontiguous_parts(initial),
        }
    }
}

impl Constraint for NoMoreDiscontiguous {
    fn name(&self) -> &str {
        "no_more_discontiguous"
    }

    fn check(&self, candidate: &Partition) -> ConstraintOutcome {
        let broken = discontiguous_parts(candidate);
        if broken <= self.allowed {
            ConstraintOutcome::Pass
        } else {
            ConstraintOutcome::Fail(format!(
                "{broken} disconnected parts, started with {}",
                self.allowed
            ))
        }
    }
}

/// Cap on split counties, configured from the starting partition.
///
/// Reads a registered [`CountySplits`](crate::updaters::CountySplits)
/// updater by alias.
#[derive(Clone, Debug)]
pub struct CountySplitBound {
    alias: String,
    max_splits: usize,
}

impl CountySplitBound {
    /// Allow at most as many split counties as the initial plan has.
    pub fn no_worse_than(initial: &Partition, alias: &str) -> Result<Self> {
        let splits = Self::splits_of(initial, alias)?;
        Ok(Self {
            alias: alias.to_string(),
            max_splits: splits,
        })
    }

    pub fn at_most(alias: &str, max_splits: usize) -> Self {
        Self {
            alias: alias.to_string(),
            max_splits,
        }
    }

    fn splits_of(partition: &Partition, alias: &str) -> Result<usize> {
        let value = partition.updater_value(alias)?;
        Ok(value
            .county_splits()
            .map(crate::updaters::CountySplits::split_count)
            .unwrap_or(0))
    }
}

impl Constraint for CountySplitBound {
    fn name(&self) -> &str {
        "county_split_bound"
    }

    fn check(&self, candidate: &Partition) -> ConstraintOutcome {
        match fail_on_error(Self::splits_of(candidate, &self.alias)) {
            Ok(splits) if splits <= self.max_splits => ConstraintOutcome::Pass,
            Ok(splits) => ConstraintOutcome::Fail(format!(
                "{splits} split counties, at most {} allowed",
                self.max_splits
            )),
            Err(fail) => fail,
        }
    }
}

/// `(part id, population)` pairs convenience for hosts writing score
/// functions over tallies.
pub fn tally_values(partition: &Partition, alias: &str) -> Result<Vec<(PartId, i64)>> {
    Ok(partition.int_tally(alias)?.into_iter().collect())
}
