//! Reactive Context
//!
//! The reactive context owns everything the engine needs at runtime:
//!
//! - the dependency registry (forward edges and read-sets)
//! - the stack of running computations
//! - the table of live computations, used to re-run dependents
//!
//! # Ownership
//!
//! `ReactiveContext` is the only strong owner of the shared state. Observed
//! objects, computation handles and scopes hold weak references, so dropping
//! the context tears the whole graph down. Live computations are owned by the
//! context until disposed, which lets callers register a computation and
//! forget the handle.
//!
//! # Tracking stack
//!
//! Running a computation pushes its attribution identity and pops it when the
//! run ends, including on unwind. Only the innermost identity is credited with
//! a read; enclosing computations see nothing of what nested ones read.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use super::computed::{Computed, ComputeScope};
use super::observed::ObservedObject;
use super::options::{ComputedOptions, ObserveOptions};
use super::subscriber::{ComputationId, Trackable};
use super::value::Value;
use crate::error::{ReactiveError, Result};
use crate::graph::{DependencyRegistry, ObjectId, PropertyRef};

type TrackingStack = SmallVec<[ComputationId; 8]>;

/// Shared state behind a [`ReactiveContext`].
pub(crate) struct ContextInner {
    registry: RefCell<DependencyRegistry>,
    stack: RefCell<TrackingStack>,
    computations: RefCell<HashMap<ComputationId, Rc<dyn Trackable>>>,
}

/// Guard that pops the tracking stack when dropped.
struct TrackingGuard<'a> {
    stack: &'a RefCell<TrackingStack>,
    identity: ComputationId,
}

impl<'a> TrackingGuard<'a> {
    fn enter(stack: &'a RefCell<TrackingStack>, identity: ComputationId) -> Self {
        stack.borrow_mut().push(identity);
        Self { stack, identity }
    }
}

impl Drop for TrackingGuard<'_> {
    fn drop(&mut self) {
        let popped = self.stack.borrow_mut().pop();
        debug_assert_eq!(
            popped,
            Some(self.identity),
            "tracking stack mismatch: expected {:?}, got {:?}",
            self.identity,
            popped
        );
    }
}

/// Guard that restores a stack suspended by `untracked`.
struct SuspendGuard<'a> {
    stack: &'a RefCell<TrackingStack>,
    saved: TrackingStack,
}

impl Drop for SuspendGuard<'_> {
    fn drop(&mut self) {
        *self.stack.borrow_mut() = std::mem::take(&mut self.saved);
    }
}

impl ContextInner {
    fn new() -> Self {
        Self {
            registry: RefCell::new(DependencyRegistry::new()),
            stack: RefCell::new(TrackingStack::new()),
            computations: RefCell::new(HashMap::new()),
        }
    }

    /// The innermost running identity.
    pub(crate) fn current(&self) -> Option<ComputationId> {
        self.stack.borrow().last().copied()
    }

    fn is_live(&self, identity: ComputationId) -> bool {
        self.computations.borrow().contains_key(&identity)
    }

    /// Run `f` with `identity` credited for every read it performs.
    ///
    /// The identity's read-set is replaced with an empty one first.
    pub(crate) fn track<T>(&self, identity: ComputationId, f: impl FnOnce() -> T) -> T {
        if self.is_live(identity) {
            self.registry.borrow_mut().reset_read_set(identity);
        }
        let _guard = TrackingGuard::enter(&self.stack, identity);
        f()
    }

    pub(crate) fn untracked<T>(&self, f: impl FnOnce() -> T) -> T {
        let saved = std::mem::take(&mut *self.stack.borrow_mut());
        let _guard = SuspendGuard {
            stack: &self.stack,
            saved,
        };
        f()
    }

    pub(crate) fn register_object(&self, object: ObjectId) {
        self.registry.borrow_mut().register_object(object);
    }

    pub(crate) fn forget_object(&self, object: ObjectId) {
        match self.registry.try_borrow_mut() {
            Ok(mut registry) => {
                registry.forget_object(object);
                tracing::trace!(%object, "observed object forgotten");
            }
            Err(_) => tracing::trace!(%object, "registry busy, leaving edges to stale out"),
        }
    }

    /// Record a read of `object.property` for the innermost live identity.
    pub(crate) fn record_read(&self, object: ObjectId, property: &str) {
        let Some(active) = self.current() else {
            return;
        };
        if !self.is_live(active) {
            return;
        }
        self.registry.borrow_mut().record(object, property, active);
    }

    /// Re-run every valid dependent of `object.property`.
    ///
    /// Disposed and stale dependents are pruned from the forward set as they
    /// are encountered. The innermost running computation is never re-run by
    /// its own write.
    pub(crate) fn notify(&self, object: ObjectId, property: &str) {
        let dependents = self.registry.borrow().dependents_of(object, property);
        if dependents.is_empty() {
            return;
        }
        tracing::trace!(%object, property, count = dependents.len(), "propagating write");

        for dependent in dependents {
            let runner = self.computations.borrow().get(&dependent).cloned();
            let Some(runner) = runner else {
                self.registry.borrow_mut().prune(object, property, dependent);
                tracing::debug!(%object, property, %dependent, "pruned disposed computation");
                continue;
            };

            let valid = self.registry.borrow().has_read(dependent, object, property);
            if !valid {
                self.registry.borrow_mut().prune(object, property, dependent);
                tracing::trace!(%object, property, %dependent, "pruned stale edge");
                continue;
            }

            if self.current() == Some(dependent) {
                continue;
            }

            runner.rerun();
        }
    }

    pub(crate) fn register_computation(&self, runner: Rc<dyn Trackable>) {
        let id = runner.computation_id();
        self.computations.borrow_mut().insert(id, runner);
    }

    pub(crate) fn dispose(&self, id: ComputationId) {
        let removed = self.computations.borrow_mut().remove(&id);
        self.registry.borrow_mut().discard_read_set(id);
        if let Some(runner) = &removed {
            runner.mark_disposed();
            tracing::debug!(computation = %id, "computation disposed");
        }
        // Dropping the runner may drop observed objects, which touch the registry.
        drop(removed);
    }

    pub(crate) fn observe_with(self: &Rc<Self>, raw: Value, options: ObserveOptions) -> Result<ObservedObject> {
        ObservedObject::wrap(&Rc::downgrade(self), raw, &Rc::new(options))
    }

    pub(crate) fn computed_with<R, F>(self: &Rc<Self>, options: ComputedOptions, f: F) -> Computed<R>
    where
        R: 'static,
        F: Fn(&ComputeScope) -> R + 'static,
    {
        let computed = Computed::create(Rc::downgrade(self), options.attribution, f);
        self.register_computation(computed.as_trackable());
        if options.auto_run {
            computed.run();
        }
        computed
    }
}

/// An explicitly constructed reactive context.
///
/// Every observed object and computation belongs to exactly one context.
/// Contexts are independent of each other: reads in one never create edges
/// in another.
///
/// # Example
///
/// ```rust
/// use reflex_core::reactive::ReactiveContext;
/// use serde_json::json;
///
/// let cx = ReactiveContext::new();
/// let state = cx.observe(json!({"count": 0})).unwrap();
///
/// let s = state.clone();
/// let doubled = cx.computed(move |_| s.get("count").and_then(|v| v.as_i64()).unwrap_or(0) * 2);
/// assert_eq!(doubled.run_count(), 1);
///
/// state.set("count", 5).unwrap();
/// assert_eq!(doubled.run_count(), 2);
/// assert_eq!(doubled.run(), 10);
/// ```
pub struct ReactiveContext {
    inner: Rc<ContextInner>,
}

impl ReactiveContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ContextInner::new()),
        }
    }

    /// A weak handle that can be moved into computations.
    pub fn handle(&self) -> ContextHandle {
        ContextHandle {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Wrap `raw` with default options (every property watched, deep).
    pub fn observe(&self, raw: impl Into<Value>) -> Result<ObservedObject> {
        self.observe_with(raw, ObserveOptions::default())
    }

    /// Wrap `raw` so reads are tracked and writes propagate.
    ///
    /// Observing an already observed object returns it unchanged.
    pub fn observe_with(&self, raw: impl Into<Value>, options: ObserveOptions) -> Result<ObservedObject> {
        self.inner.observe_with(raw.into(), options)
    }

    /// Create a computation and run it once.
    pub fn computed<R, F>(&self, f: F) -> Computed<R>
    where
        R: 'static,
        F: Fn(&ComputeScope) -> R + 'static,
    {
        self.inner.computed_with(ComputedOptions::default(), f)
    }

    /// Create a computation without running it.
    pub fn computed_lazy<R, F>(&self, f: F) -> Computed<R>
    where
        R: 'static,
        F: Fn(&ComputeScope) -> R + 'static,
    {
        self.inner.computed_with(ComputedOptions::new().lazy(), f)
    }

    pub fn computed_with<R, F>(&self, options: ComputedOptions, f: F) -> Computed<R>
    where
        R: 'static,
        F: Fn(&ComputeScope) -> R + 'static,
    {
        self.inner.computed_with(options, f)
    }

    /// Permanently stop `computed` from being re-run by writes.
    pub fn dispose<R: 'static>(&self, computed: &Computed<R>) {
        computed.dispose();
    }

    /// Run `f` with tracking suspended. Reads inside create no edges.
    pub fn untracked<T>(&self, f: impl FnOnce() -> T) -> T {
        self.inner.untracked(f)
    }

    /// Whether a computation is currently running.
    pub fn is_tracking(&self) -> bool {
        self.inner.current().is_some()
    }

    /// The identity credited with reads right now.
    pub fn current_computation(&self) -> Option<ComputationId> {
        self.inner.current()
    }

    /// Number of forward edges on `object.property`, stale ones included.
    pub fn dependent_count(&self, object: &ObservedObject, property: &str) -> usize {
        self.inner.registry.borrow().dependent_count(object.id(), property)
    }

    /// Number of (object, property) pairs `id` read during its last run.
    pub fn read_set_len(&self, id: ComputationId) -> usize {
        self.inner.registry.borrow().read_set_len(id)
    }

    /// Whether `id` currently owns a read-set.
    pub fn has_read_set(&self, id: ComputationId) -> bool {
        self.inner.registry.borrow().has_read_set(id)
    }

    /// The (object, property) pairs `id` read during its last run.
    pub fn read_set(&self, id: ComputationId) -> Vec<PropertyRef> {
        self.inner.registry.borrow().read_set(id)
    }

    /// Number of live (non-disposed) computations.
    pub fn computation_count(&self) -> usize {
        self.inner.computations.borrow().len()
    }
}

impl Default for ReactiveContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReactiveContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveContext")
            .field("computations", &self.computation_count())
            .field("depth", &self.inner.stack.borrow().len())
            .finish()
    }
}

/// Weak handle to a [`ReactiveContext`].
///
/// Every operation fails with [`ReactiveError::ContextDropped`] once the
/// owning context is gone.
#[derive(Clone)]
pub struct ContextHandle {
    inner: Weak<ContextInner>,
}

impl ContextHandle {
    pub(crate) fn from_weak(inner: Weak<ContextInner>) -> Self {
        Self { inner }
    }

    fn upgrade(&self) -> Result<Rc<ContextInner>> {
        self.inner.upgrade().ok_or(ReactiveError::ContextDropped)
    }

    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    pub fn observe(&self, raw: impl Into<Value>) -> Result<ObservedObject> {
        self.observe_with(raw, ObserveOptions::default())
    }

    pub fn observe_with(&self, raw: impl Into<Value>, options: ObserveOptions) -> Result<ObservedObject> {
        self.upgrade()?.observe_with(raw.into(), options)
    }

    pub fn computed_with<R, F>(&self, options: ComputedOptions, f: F) -> Result<Computed<R>>
    where
        R: 'static,
        F: Fn(&ComputeScope) -> R + 'static,
    {
        Ok(self.upgrade()?.computed_with(options, f))
    }

    pub fn current_computation(&self) -> Result<Option<ComputationId>> {
        Ok(self.upgrade()?.current())
    }
}

impl fmt::Debug for ContextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextHandle")
            .field("alive", &self.is_alive())
            .finish()
    }
}
