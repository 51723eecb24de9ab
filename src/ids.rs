//! Lightweight district label used throughout the engine.
//!
//! Each node in a [`Partition`](crate::partition::Partition) is assigned a
//! `PartId`. Part ids are opaque: they are not required to be contiguous and
//! they survive flips unchanged, so a host can use whatever labeling its
//! input data carries.
//!
//! They're small, `Copy`, and ordered, so they can be used efficiently as
//! keys in the ordered maps the hot path relies on.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque numeric label for one district ("part") of a partition.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PartId(u32);

impl PartId {
    /// Wrap a raw label.
    pub const fn new(v: u32) -> Self {
        Self(v)
    }

    /// Return the underlying numeric value.
    ///
    /// Useful mainly for serialization or display.
    pub const fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for PartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for PartId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}
