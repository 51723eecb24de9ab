//! Chain observability: typed events and counting collectors.
//!
//! Proposals and the chain driver report soft conditions -- bipartition
//! retries, pair reselections, rejected candidates -- through the
//! [`ChainObserver`] trait instead of a logging framework or soft
//! exceptions. Hosts that want numbers attach an [`EventLog`]; hosts that
//! want logs implement the trait over their logger of choice.
//!
//! # Example
//!
//! ```no_run
//! use ironchain::events::EventLog;
//!
//! let log = EventLog::new();
//! // ... attach to a chain / proposal, run ...
//! println!("{}", log.to_json().unwrap());
//! ```

use crate::ids::PartId;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Soft conditions surfaced while a chain runs. None of these are errors.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum ChainEvent {
    /// A bipartition call needed more than one spanning tree.
    BipartitionWarning { attempts: usize },
    /// ReCom abandoned a district pair and drew another.
    PairReselected { first: PartId, second: PartId },
    /// A candidate failed a constraint (or an updater) and was retried.
    CandidateInvalid { reason: String },
    /// A valid candidate was refused by the acceptance function; the chain
    /// re-emitted the current state.
    CandidateRejected { step: usize },
    /// The chain advanced to a new state.
    StepAccepted { step: usize },
}

impl ChainEvent {
    /// Stable counter key for this event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ChainEvent::BipartitionWarning { .. } => "bipartition_warning",
            ChainEvent::PairReselected { .. } => "pair_reselected",
            ChainEvent::CandidateInvalid { .. } => "candidate_invalid",
            ChainEvent::CandidateRejected { .. } => "candidate_rejected",
            ChainEvent::StepAccepted { .. } => "step_accepted",
        }
    }
}

/// Receives chain events as they happen.
pub trait ChainObserver: Send + Sync {
    fn notify(&self, event: &ChainEvent);
}

/// Thread-safe counting observer.
///
/// Cheaply cloneable; clones share the same counters, so one log can be
/// handed to a proposal and its chain at once.
#[derive(Clone, Default)]
pub struct EventLog {
    inner: Arc<Mutex<EventLogInner>>,
}

#[derive(Default)]
struct EventLogInner {
    counts: BTreeMap<&'static str, u64>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count of one event kind (see [`ChainEvent::kind`]).
    pub fn count(&self, kind: &str) -> u64 {
        self.inner
            .lock()
            .unwrap()
            .counts
            .get(kind)
            .copied()
            .unwrap_or(0)
    }

    /// Total events observed.
    pub fn total(&self) -> u64 {
        self.inner.lock().unwrap().counts.values().sum()
    }

    /// Counters as JSON, kinds in sorted order.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let inner = self.inner.lock().unwrap();
        serde_json::to_string_pretty(&inner.counts)
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap().counts.clear();
    }
}

impl ChainObserver for EventLog {
    fn notify(&self, event: &ChainEvent) {
        *self
            .inner
            .lock()
            .unwrap()
            .counts
            .entry(event.kind())
            .or_insert(0) += 1;
    }
}
