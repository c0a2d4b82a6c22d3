//! Subscriber types for the reactive system.
//!
//! A subscriber is any computation that can be credited with reads and
//! re-run when one of those reads is invalidated by a write.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Unique identifier for a computation.
///
/// Issued once when the computation is created and stable for its whole
/// lifetime. Used as the key for dependency edges in place of the
/// computation itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComputationId(u64);

impl ComputationId {
    /// Generate a new unique computation ID.
    ///
    /// Uses an atomic counter so IDs never collide across contexts.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ComputationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ComputationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "computed#{}", self.0)
    }
}

/// A computation the context can re-run when a dependency changes.
///
/// Implemented by every `Computed<R>` regardless of its return type so the
/// context can keep a type-erased table of live computations.
pub(crate) trait Trackable {
    /// The ID this computation was created with.
    fn computation_id(&self) -> ComputationId;

    /// Re-run the computation, discarding its result.
    fn rerun(&self);

    /// Mark the computation as disposed.
    fn mark_disposed(&self);
}
