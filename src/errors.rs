//! Error taxonomy for the chain engine.
//!
//! Every fallible operation in the crate returns [`ChainError`]. The variants
//! fall into four classes:
//!
//! - **Input errors** (`InvalidGraph`, `UnknownNode`, `MissingAttribute`,
//!   `AttributeType`, `InvalidInitialState`) -- surfaced to the caller and
//!   fatal for the operation that raised them.
//! - **Structural proposal failures** (`BipartitionFailure`, `DegenerateFlip`,
//!   `NoBoundary`, `SeedFailure`) -- recovered locally by bounded retry and
//!   only surfaced once the retry budget is exhausted.
//! - **Runtime exhaustion** (`RejectionExhausted`, `ReselectionExhausted`) --
//!   fatal for the chain that raised them.
//! - **Updater failures** (`UpdaterFailure`) -- converted by the chain driver
//!   into "candidate invalid" rather than chain failure.
//!
//! Constraint and acceptance outcomes never travel through this type; they
//! are ordinary enum values (see [`crate::constraints::ConstraintOutcome`]).

use std::fmt;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ChainError>;

/// All failure conditions the engine can report.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainError {
    /// Graph construction failed: an edge names an unknown node, an edge is
    /// duplicated, or the input declares itself directed/multigraph.
    InvalidGraph(String),
    /// A node id outside `0..graph.num_nodes()` was passed to an accessor.
    UnknownNode(usize),
    /// A node or edge attribute lookup named a column that does not exist.
    MissingAttribute(String),
    /// An attribute column exists but holds a different type than requested.
    AttributeType {
        attr: String,
        expected: &'static str,
        found: &'static str,
    },
    /// The chain's initial state does not satisfy its own constraint stack.
    InvalidInitialState(String),
    /// No balanced spanning-tree cut was found within the attempt budget.
    BipartitionFailure { attempts: usize },
    /// A flip would have emptied a part, and the redraw budget ran out.
    DegenerateFlip { attempts: usize },
    /// The partition has no cut edges, so no boundary flip exists.
    NoBoundary,
    /// Recursive tree seeding failed to produce a balanced initial
    /// assignment within the retry budget.
    SeedFailure { retries: usize },
    /// Too many constraint-invalid candidates in a row at one chain step.
    RejectionExhausted { step: usize, attempts: usize },
    /// ReCom pair reselection exhausted every adjacent district pair.
    ReselectionExhausted,
    /// An updater raised an error while (re)computing its value.
    UpdaterFailure { name: String, cause: String },
    /// A filesystem or JSON decoding failure while loading or storing a graph.
    Io(String),
    /// A replay file does not match the graph it is being expanded against.
    #[cfg(feature = "replay")]
    ReplayMismatch(String),
    /// An encoding failure while reading or writing a replay file.
    #[cfg(feature = "replay")]
    Replay(String),
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainError::InvalidGraph(msg) => write!(f, "invalid graph: {msg}"),
            ChainError::UnknownNode(v) => write!(f, "unknown node id {v}"),
            ChainError::MissingAttribute(name) => {
                write!(f, "missing attribute column '{name}'")
            }
            ChainError::AttributeType {
                attr,
                expected,
                found,
            } => write!(
                f,
                "attribute '{attr}' has type {found}, expected {expected}"
            ),
            ChainError::InvalidInitialState(msg) => {
                write!(f, "initial state rejected by constraints: {msg}")
            }
            ChainError::BipartitionFailure { attempts } => write!(
                f,
                "no balanced spanning-tree cut found after {attempts} attempts"
            ),
            ChainError::DegenerateFlip { attempts } => write!(
                f,
                "every drawn flip would empty a part ({attempts} redraws)"
            ),
            ChainError::NoBoundary => {
                write!(f, "partition has no cut edges to flip across")
            }
            ChainError::SeedFailure { retries } => write!(
                f,
                "random seeding failed to balance after {retries} retries"
            ),
            ChainError::RejectionExhausted { step, attempts } => write!(
                f,
                "step {step}: {attempts} consecutive invalid proposals"
            ),
            ChainError::ReselectionExhausted => {
                write!(f, "no adjacent district pair admits a balanced split")
            }
            ChainError::UpdaterFailure { name, cause } => {
                write!(f, "updater '{name}' failed: {cause}")
            }
            ChainError::Io(msg) => write!(f, "i/o error: {msg}"),
            #[cfg(feature = "replay")]
            ChainError::ReplayMismatch(msg) => {
                write!(f, "replay mismatch: {msg}")
            }
            #[cfg(feature = "replay")]
            ChainError::Replay(msg) => write!(f, "replay error: {msg}"),
        }
    }
}

impl std::error::Error for ChainError {}

impl ChainError {
    /// True for the input-error class (fatal, caller-facing).
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ChainError::InvalidGraph(_)
                | ChainError::UnknownNode(_)
                | ChainError::MissingAttribute(_)
                | ChainError::AttributeType { .. }
                | ChainError::InvalidInitialState(_)
        )
    }

    /// True for structural failures that proposals retry internally.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ChainError::BipartitionFailure { .. }
                | ChainError::DegenerateFlip { .. }
                | ChainError::NoBoundary
                | ChainError::SeedFailure { .. }
        )
    }
}
