//! Dependency Registry
//!
//! The registry keeps both directions of every dependency edge:
//!
//! - **Forward**: (object, property) -> computations that read it, in the
//!   order they first read it. Walked when the property is written.
//! - **Inverse**: computation -> (object, property) pairs read during its most
//!   recent run. Replaced wholesale every time the computation runs.
//!
//! The inverse record is the authority. A forward edge whose computation no
//! longer lists the pair in its read-set is stale and gets pruned the next
//! time the forward set is walked. Nothing is swept eagerly.

use std::collections::{HashMap, HashSet};

use indexmap::IndexSet;

use super::node::{ObjectId, PropertyRef};
use crate::reactive::ComputationId;

type PropertyDependents = HashMap<String, IndexSet<ComputationId>>;
type ReadSet = HashMap<ObjectId, HashSet<String>>;

/// Bidirectional bookkeeping of (object, property) <-> computation edges.
#[derive(Debug, Default)]
pub struct DependencyRegistry {
    dependents: HashMap<ObjectId, PropertyDependents>,
    read_sets: HashMap<ComputationId, ReadSet>,
}

impl DependencyRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking an object with an empty per-property dependent map.
    pub fn register_object(&mut self, object: ObjectId) {
        self.dependents.entry(object).or_default();
    }

    /// Drop every edge touching `object`.
    ///
    /// Called when the last handle to an observed object goes away.
    pub fn forget_object(&mut self, object: ObjectId) {
        self.dependents.remove(&object);
        for read_set in self.read_sets.values_mut() {
            read_set.remove(&object);
        }
    }

    /// Whether `object` is known to the registry.
    pub fn is_registered(&self, object: ObjectId) -> bool {
        self.dependents.contains_key(&object)
    }

    /// Replace the read-set of `computation` with a fresh, empty one.
    pub fn reset_read_set(&mut self, computation: ComputationId) {
        self.read_sets.insert(computation, ReadSet::new());
    }

    /// Discard the read-set of `computation` entirely.
    pub fn discard_read_set(&mut self, computation: ComputationId) {
        self.read_sets.remove(&computation);
    }

    /// Record that `computation` read `property` of `object`.
    ///
    /// Updates both directions of the edge.
    pub fn record(&mut self, object: ObjectId, property: &str, computation: ComputationId) {
        let forward = self
            .dependents
            .entry(object)
            .or_default()
            .entry(property.to_owned())
            .or_default();
        let added = forward.insert(computation);

        self.read_sets
            .entry(computation)
            .or_default()
            .entry(object)
            .or_default()
            .insert(property.to_owned());

        if added {
            tracing::trace!(%object, property, %computation, "dependency recorded");
        }
    }

    /// Snapshot of the computations depending on `object.property`, in
    /// first-read order.
    pub fn dependents_of(&self, object: ObjectId, property: &str) -> Vec<ComputationId> {
        self.dependents
            .get(&object)
            .and_then(|props| props.get(property))
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Whether the current read-set of `computation` contains `object.property`.
    pub fn has_read(&self, computation: ComputationId, object: ObjectId, property: &str) -> bool {
        self.read_sets
            .get(&computation)
            .and_then(|read_set| read_set.get(&object))
            .is_some_and(|props| props.contains(property))
    }

    /// Remove a single forward edge. Returns true if the edge existed.
    pub fn prune(&mut self, object: ObjectId, property: &str, computation: ComputationId) -> bool {
        self.dependents
            .get_mut(&object)
            .and_then(|props| props.get_mut(property))
            .is_some_and(|set| set.shift_remove(&computation))
    }

    /// Number of forward edges on `object.property`, stale ones included.
    pub fn dependent_count(&self, object: ObjectId, property: &str) -> usize {
        self.dependents
            .get(&object)
            .and_then(|props| props.get(property))
            .map_or(0, IndexSet::len)
    }

    /// Number of (object, property) pairs in the read-set of `computation`.
    pub fn read_set_len(&self, computation: ComputationId) -> usize {
        self.read_sets
            .get(&computation)
            .map_or(0, |read_set| read_set.values().map(HashSet::len).sum())
    }

    /// Whether `computation` currently owns a read-set.
    pub fn has_read_set(&self, computation: ComputationId) -> bool {
        self.read_sets.contains_key(&computation)
    }

    /// The (object, property) pairs read by `computation` during its last run.
    pub fn read_set(&self, computation: ComputationId) -> Vec<PropertyRef> {
        let Some(read_set) = self.read_sets.get(&computation) else {
            return Vec::new();
        };
        let mut refs: Vec<PropertyRef> = read_set
            .iter()
            .flat_map(|(object, props)| props.iter().map(|p| PropertyRef::new(*object, p.as_str())))
            .collect();
        refs.sort_by(|a, b| (a.object, &a.property).cmp(&(b.object, &b.property)));
        refs
    }
}
