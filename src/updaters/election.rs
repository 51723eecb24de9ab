//! Election views: per-part vote totals, shares, winners, and seat counts.

use crate::assignment::FlipDelta;
use crate::errors::{ChainError, Result};
use crate::ids::PartId;
use crate::partition::Partition;
use crate::updaters::{Updater, UpdaterValue};
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-part results of one named election.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ElectionResults {
    pub election: String,
    /// Party names, in the order totals are stored.
    pub parties: Vec<String>,
    /// part → per-party vote totals (indexed like `parties`).
    pub totals: BTreeMap<PartId, Vec<i64>>,
}

impl ElectionResults {
    /// Vote share of `party` in `part`, or 0 for an empty part.
    pub fn percent(&self, part: PartId, party: usize) -> f64 {
        let Some(votes) = self.totals.get(&part) else {
            return 0.0;
        };
        let total: i64 = votes.iter().sum();
        if total == 0 {
            0.0
        } else {
            votes[party] as f64 / total as f64
        }
    }

    /// Index of the winning party in `part` (lowest index wins ties).
    pub fn winner(&self, part: PartId) -> Option<usize> {
        let votes = self.totals.get(&part)?;
        votes
            .iter()
            .enumerate()
            .max_by_key(|&(i, &v)| (v, std::cmp::Reverse(i)))
            .map(|(i, _)| i)
    }

    /// Number of parts won by `party`.
    pub fn seats(&self, party: usize) -> usize {
        self.totals
            .keys()
            .filter(|&&part| self.winner(part) == Some(party))
            .count()
    }

    /// Statewide vote share of `party`.
    pub fn overall_percent(&self, party: usize) -> f64 {
        let mut mine = 0i64;
        let mut all = 0i64;
        for votes in self.totals.values() {
            mine += votes[party];
            all += votes.iter().sum::<i64>();
        }
        if all == 0 { 0.0 } else { mine as f64 / all as f64 }
    }
}

/// An election updater over two or more party vote columns.
///
/// The diff path adjusts each party's totals like a [`Tally`](crate::updaters::Tally):
/// flipped nodes move their votes from the old part to the new one.
#[derive(Clone, Debug)]
pub struct Election {
    name: String,
    /// `(party name, vote column)` pairs.
    parties: Vec<(String, String)>,
}

impl Election {
    /// The first recompute fails if fewer than two parties are supplied;
    /// an election needs an opponent.
    pub fn new<N, C>(
        name: impl Into<String>,
        parties: impl IntoIterator<Item = (N, C)>,
    ) -> Self
    where
        N: Into<String>,
        C: Into<String>,
    {
        Self {
            name: name.into(),
            parties: parties
                .into_iter()
                .map(|(p, c)| (p.into(), c.into()))
                .collect(),
        }
    }

    fn columns<'g>(&self, partition: &'g Partition) -> Result<Vec<&'g [i64]>> {
        if self.parties.len() < 2 {
            return Err(ChainError::UpdaterFailure {
                name: self.name.clone(),
                cause: "an election needs at least two parties".to_string(),
            });
        }
        let attrs = partition.graph().node_attrs();
        self.parties
            .iter()
            .map(|(_, col)| match attrs.column(col)? {
                crate::graph::Column::Int(v) => Ok(v.as_slice()),
                _ => Err(ChainError::AttributeType {
                    attr: col.clone(),
                    expected: "int",
                    found: "non-int",
                }),
            })
            .collect()
    }
}

impl Updater for Election {
    fn name(&self) -> &str {
        &self.name
    }

    fn recompute(&self, partition: &Partition) -> Result<UpdaterValue> {
        let columns = self.columns(partition)?;
        let mut totals: BTreeMap<PartId, Vec<i64>> = BTreeMap::new();
        for part in partition.parts() {
            let members = partition.members(part).expect("parts are non-empty");
            let mut votes = vec![0i64; columns.len()];
            for &v in members {
                for (i, col) in columns.iter().enumerate() {
                    votes[i] += col[v as usize];
                }
            }
            totals.insert(part, votes);
        }
        Ok(UpdaterValue::Election(ElectionResults {
            election: self.name.clone(),
            parties: self.parties.iter().map(|(p, _)| p.clone()).collect(),
            totals,
        }))
    }

    fn supports_diff(&self) -> bool {
        true
    }

    fn update_from_parent(
        &self,
        parent_value: &UpdaterValue,
        partition: &Partition,
        delta: &FlipDelta,
    ) -> Result<UpdaterValue> {
        let Some(parent) = parent_value.election() else {
            return self.recompute(partition);
        };
        let columns = self.columns(partition)?;
        let zero = vec![0i64; columns.len()];
        let mut totals = parent.totals.clone();
        for (v, old, new) in delta.iter() {
            for (i, col) in columns.iter().enumerate() {
                let votes = col[v as usize];
                totals.entry(old).or_insert_with(|| zero.clone())[i] -= votes;
                totals.entry(new).or_insert_with(|| zero.clone())[i] += votes;
            }
        }
        totals.retain(|part, _| partition.members(*part).is_some());
        Ok(UpdaterValue::Election(ElectionResults {
            election: parent.election.clone(),
            parties: parent.parties.clone(),
            totals,
        }))
    }
}
