//! Reactive Primitives
//!
//! This module implements the observation engine: observed objects,
//! computations, and the context that connects them.
//!
//! # Concepts
//!
//! ## Observed Objects
//!
//! An observed object wraps a record or sequence. Reading one of its
//! properties while a computation runs makes that computation a dependent of
//! the property. Writing a different value re-runs every dependent before the
//! write returns.
//!
//! ## Computations
//!
//! A computation is a function run under tracking. Each run replaces the set
//! of properties it depends on, so dependencies that a later run no longer
//! reads stop triggering it.
//!
//! ## Context
//!
//! A [`ReactiveContext`] owns the dependency registry, the stack of running
//! computations and the live computations themselves. Contexts are created
//! explicitly and share nothing.
//!
//! # Implementation Notes
//!
//! Everything is single-threaded and synchronous. Propagation is depth-first:
//! a dependent that writes another observed property triggers its own
//! dependents before control returns to the outer write. Cycles between
//! computations are not detected; the only guard is that a computation is
//! never re-run by its own write while it is running.

mod computed;
mod context;
mod observed;
mod options;
mod store;
mod subscriber;
mod value;

pub use computed::{Computed, ComputeScope};
pub use context::{ContextHandle, ReactiveContext};
pub use observed::{ObservedObject, OBSERVED_SENTINEL};
pub use options::{ComputedOptions, ObserveOptions};
pub use store::{RecordStore, SequenceStore, Shape, Store, LENGTH, MAX_LENGTH};
pub use subscriber::ComputationId;
pub use value::Value;
