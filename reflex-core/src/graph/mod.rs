//! Dependency Graph
//!
//! This module implements the bookkeeping that connects observed object
//! properties to the computations that read them.
//!
//! # Overview
//!
//! The graph is bipartite:
//!
//! - Source nodes are (observed object, property) pairs
//! - Sink nodes are computations
//! - An edge from a pair to a computation means the computation read that
//!   property during its most recent run
//!
//! Both directions are stored. The forward direction answers "who must re-run
//! when this property is written", the inverse direction answers "what did
//! this computation read last time". Because a computation's reads can change
//! between runs (conditional branches), the inverse record is replaced on every
//! run and forward edges are validated against it lazily.

mod node;
mod registry;

pub use node::{ObjectId, PropertyRef};
pub use registry::DependencyRegistry;
