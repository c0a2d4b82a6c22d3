//! Computed Implementation
//!
//! A computation wraps a function whose observed-object reads are recorded
//! while it runs. Writing to any of those properties later re-runs it.
//!
//! # How Computations Work
//!
//! 1. On creation the computation is registered with its context and, unless
//!    created lazily, runs once to establish its dependencies.
//!
//! 2. Each run replaces the read-set of its attribution identity with an
//!    empty one and pushes that identity on the tracking stack.
//!
//! 3. The function receives a [`ComputeScope`]. Cloning the scope into a
//!    deferred continuation and calling [`ComputeScope::compute_async`] there
//!    credits the continuation's reads to the same identity.
//!
//! # Disposal
//!
//! Disposal is permanent. The context releases the computation and its
//! read-set; forward edges that still mention it are pruned the next time
//! the property they hang off is written. Calling [`Computed::run`] on a
//! disposed computation still runs the function, but records nothing.

use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};

use super::context::{ContextHandle, ContextInner};
use super::subscriber::{ComputationId, Trackable};

/// Capability handed to every run of a computation.
///
/// Cheap to clone and `'static`, so it can be moved into timers, tasks or any
/// other deferred continuation.
#[derive(Clone, Debug)]
pub struct ComputeScope {
    identity: ComputationId,
    context: Weak<ContextInner>,
}

impl ComputeScope {
    /// The identity credited with reads made through this scope.
    pub fn identity(&self) -> ComputationId {
        self.identity
    }

    /// Run `f` as a fresh run of this scope's identity.
    ///
    /// Outside of this call, reads made after the originating run has
    /// returned are not tracked.
    pub fn compute_async<T>(&self, f: impl FnOnce() -> T) -> T {
        match self.context.upgrade() {
            Some(context) => context.track(self.identity, f),
            None => f(),
        }
    }

    /// Handle to the owning context, for creating objects or computations
    /// from inside a run.
    pub fn context(&self) -> ContextHandle {
        ContextHandle::from_weak(self.context.clone())
    }
}

struct ComputedInner<R> {
    id: ComputationId,
    attribution: Option<ComputationId>,
    body: Box<dyn Fn(&ComputeScope) -> R>,
    context: Weak<ContextInner>,
    disposed: Cell<bool>,
    run_count: Cell<usize>,
}

impl<R> ComputedInner<R> {
    fn identity(&self) -> ComputationId {
        self.attribution.unwrap_or(self.id)
    }

    fn run(&self) -> R {
        self.run_count.set(self.run_count.get() + 1);
        let scope = ComputeScope {
            identity: self.identity(),
            context: self.context.clone(),
        };
        match self.context.upgrade() {
            Some(context) => context.track(scope.identity, || (self.body)(&scope)),
            None => (self.body)(&scope),
        }
    }
}

impl<R> Trackable for ComputedInner<R> {
    fn computation_id(&self) -> ComputationId {
        self.id
    }

    fn rerun(&self) {
        self.run();
    }

    fn mark_disposed(&self) {
        self.disposed.set(true);
    }
}

/// A tracked computation returning `R`.
///
/// Cloning yields another handle to the same computation.
pub struct Computed<R: 'static> {
    inner: Rc<ComputedInner<R>>,
}

impl<R: 'static> Computed<R> {
    pub(crate) fn create<F>(context: Weak<ContextInner>, attribution: Option<ComputationId>, f: F) -> Self
    where
        F: Fn(&ComputeScope) -> R + 'static,
    {
        Self {
            inner: Rc::new(ComputedInner {
                id: ComputationId::new(),
                attribution,
                body: Box::new(f),
                context,
                disposed: Cell::new(false),
                run_count: Cell::new(0),
            }),
        }
    }

    pub(crate) fn as_trackable(&self) -> Rc<dyn Trackable> {
        self.inner.clone()
    }

    /// The ID issued when this computation was created.
    pub fn id(&self) -> ComputationId {
        self.inner.id
    }

    /// The identity credited with this computation's reads.
    pub fn identity(&self) -> ComputationId {
        self.inner.identity()
    }

    /// Run the computation now and return its result.
    pub fn run(&self) -> R {
        self.inner.run()
    }

    /// Stop the computation from ever being re-run by writes.
    pub fn dispose(&self) {
        self.inner.disposed.set(true);
        if let Some(context) = self.inner.context.upgrade() {
            context.dispose(self.inner.id);
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Number of times the function has run, automatic and manual.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }
}

impl<R: 'static> Clone for Computed<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<R: 'static> fmt::Debug for Computed<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.id)
            .field("attribution", &self.inner.attribution)
            .field("run_count", &self.run_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
