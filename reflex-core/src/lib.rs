//! Reflex Core
//!
//! This crate provides the observation engine behind Reflex: plain data
//! wrapped so that reads made inside a tracked computation are recorded, and
//! later writes to the same properties re-run exactly the computations that
//! read them.
//!
//! It implements:
//!
//! - Observed objects over records and sequences, optionally deep
//! - Computations with automatic dependency tracking and disposal
//! - Lazy pruning of dependencies a computation stopped reading
//! - Attribution of deferred reads back to their computation
//!
//! # Architecture
//!
//! - `reactive`: observed objects, computations and the reactive context
//! - `graph`: the dependency registry linking properties to computations
//! - `error`: the crate error type
//!
//! # Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use reflex_core::reactive::ReactiveContext;
//! use serde_json::json;
//!
//! let cx = ReactiveContext::new();
//! let state = cx.observe(json!({"count": 0})).unwrap();
//!
//! let seen = Rc::new(Cell::new(-1));
//! let (s, out) = (state.clone(), seen.clone());
//! let render = cx.computed(move |_| {
//!     out.set(s.get("count").and_then(|v| v.as_i64()).unwrap_or(0));
//! });
//!
//! state.set("count", 5).unwrap();
//! assert_eq!(seen.get(), 5);
//! assert_eq!(render.run_count(), 2);
//! ```

pub mod error;
pub mod graph;
pub mod reactive;

pub use error::{ReactiveError, Result};
pub use reactive::{Computed, ComputeScope, ObservedObject, ReactiveContext, Value};
