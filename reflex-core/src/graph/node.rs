//! Graph Nodes
//!
//! Identifiers for the source side of the dependency graph: observed objects
//! and the properties read from them.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for an observed object in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Generate a new unique object ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj#{}", self.0)
    }
}

/// A single dependency target: one property of one observed object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyRef {
    pub object: ObjectId,
    pub property: String,
}

impl PropertyRef {
    pub fn new(object: ObjectId, property: impl Into<String>) -> Self {
        Self {
            object,
            property: property.into(),
        }
    }
}

impl fmt::Display for PropertyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.object, self.property)
    }
}
