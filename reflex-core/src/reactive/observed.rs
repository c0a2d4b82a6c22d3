//! Observed Object Implementation
//!
//! An observed object wraps a record or sequence so that property access can
//! be tracked. It is the source side of every dependency edge.
//!
//! # How Observed Objects Work
//!
//! 1. Reading a watched property while a computation is running records an
//!    edge from (object, property) to the running identity.
//!
//! 2. Writing a property that actually changes stores the value and re-runs
//!    every still-valid dependent of that property before returning.
//!
//! 3. With deep observation, nested records and sequences are wrapped when the
//!    object is created and whenever one is assigned later.
//!
//! # Change Detection
//!
//! Writing a scalar equal to the stored one does nothing. Writing a sequence's
//! `length` always propagates, since a structural change can leave the count
//! unchanged.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::Value as Json;

use super::context::ContextInner;
use super::options::ObserveOptions;
use super::store::{RecordStore, SequenceStore, Shape, Store, LENGTH};
use super::value::{is_json_aggregate, Value};
use crate::error::{ReactiveError, Result};
use crate::graph::ObjectId;

/// Reserved property that reads as `true` on every observed object.
pub const OBSERVED_SENTINEL: &str = "__observed";

struct ObservedInner {
    id: ObjectId,
    options: Rc<ObserveOptions>,
    store: RefCell<Box<dyn Store>>,
    context: Weak<ContextInner>,
}

impl Drop for ObservedInner {
    fn drop(&mut self) {
        if let Some(context) = self.context.upgrade() {
            context.forget_object(self.id);
        }
    }
}

/// A record or sequence whose property reads and writes are tracked.
///
/// Cloning yields another handle to the same object.
#[derive(Clone)]
pub struct ObservedObject {
    inner: Rc<ObservedInner>,
}

impl ObservedObject {
    /// Wrap `raw`, recursively when `options.deep` is set.
    pub(crate) fn wrap(
        context: &Weak<ContextInner>,
        raw: Value,
        options: &Rc<ObserveOptions>,
    ) -> Result<Self> {
        let json = match raw {
            Value::Observed(obj) => return Ok(obj),
            Value::Plain(json) => json,
        };

        let store: Box<dyn Store> = match json {
            Json::Object(map) => {
                let entries = map
                    .into_iter()
                    .map(|(key, value)| Self::child(context, value, options).map(|value| (key, value)))
                    .collect::<Result<IndexMap<_, _>>>()?;
                Box::new(RecordStore::new(entries))
            }
            Json::Array(items) => {
                let items = items
                    .into_iter()
                    .map(|value| Self::child(context, value, options))
                    .collect::<Result<Vec<_>>>()?;
                Box::new(SequenceStore::new(items))
            }
            other => return Err(ReactiveError::NotAnAggregate(other.to_string())),
        };

        let id = ObjectId::new();
        if let Some(cx) = context.upgrade() {
            cx.register_object(id);
        }
        tracing::trace!(object = %id, shape = ?store.shape(), deep = options.deep, "object observed");

        Ok(Self {
            inner: Rc::new(ObservedInner {
                id,
                options: Rc::clone(options),
                store: RefCell::new(store),
                context: context.clone(),
            }),
        })
    }

    fn child(context: &Weak<ContextInner>, json: Json, options: &Rc<ObserveOptions>) -> Result<Value> {
        if options.deep && is_json_aggregate(&json) {
            Ok(Value::Observed(Self::wrap(context, Value::Plain(json), options)?))
        } else {
            Ok(Value::Plain(json))
        }
    }

    pub fn id(&self) -> ObjectId {
        self.inner.id
    }

    pub fn shape(&self) -> Shape {
        self.inner.store.borrow().shape()
    }

    pub fn options(&self) -> &ObserveOptions {
        &self.inner.options
    }

    /// Always true; the counterpart of the `__observed` sentinel.
    pub fn is_observed(&self) -> bool {
        true
    }

    /// Whether both handles refer to the same object.
    pub fn ptr_eq(&self, other: &ObservedObject) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn is_watched(&self, prop: &str) -> bool {
        self.inner.options.is_watched(prop)
    }

    /// Read `prop`, recording a dependency if a computation is running.
    pub fn get(&self, prop: &str) -> Option<Value> {
        if prop == OBSERVED_SENTINEL {
            return Some(Value::from(true));
        }
        if self.is_watched(prop) {
            if let Some(context) = self.inner.context.upgrade() {
                context.record_read(self.inner.id, prop);
            }
        }
        self.inner.store.borrow().get(prop)
    }

    /// Read `prop` without recording anything.
    pub fn get_untracked(&self, prop: &str) -> Option<Value> {
        if prop == OBSERVED_SENTINEL {
            return Some(Value::from(true));
        }
        self.inner.store.borrow().get(prop)
    }

    /// Tracked read of a nested observed object.
    pub fn get_object(&self, prop: &str) -> Option<ObservedObject> {
        self.get(prop).and_then(Value::into_observed)
    }

    /// Write `prop` and re-run its dependents if the value changed.
    pub fn set(&self, prop: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let (current, is_length) = {
            let store = self.inner.store.borrow();
            (store.get(prop), store.is_length(prop))
        };
        if !is_length && !value.differs_from(current.as_ref()) {
            return Ok(());
        }

        let value = match value {
            Value::Plain(json) if self.inner.options.deep && is_json_aggregate(&json) => {
                Value::Observed(Self::wrap(&self.inner.context, Value::Plain(json), &self.inner.options)?)
            }
            other => other,
        };

        let replaced = {
            let mut store = self.inner.store.borrow_mut();
            let detached = match &current {
                Some(old) if old.is_aggregate() => store.detach(prop),
                _ => None,
            };
            (detached, store.set(prop, value)?)
        };
        // Old values may own the last handle to a nested object; release them
        // before propagating so their registry entries are gone.
        drop(replaced);
        drop(current);

        self.propagate(prop);
        Ok(())
    }

    /// Remove `prop`. Propagates when a value was present.
    pub fn remove(&self, prop: &str) -> Result<Option<Value>> {
        let previous = self.inner.store.borrow_mut().remove(prop)?;
        if previous.is_some() {
            self.propagate(prop);
        }
        Ok(previous)
    }

    /// Append to a sequence: writes the new index, then `length`.
    pub fn push(&self, value: impl Into<Value>) -> Result<()> {
        if self.shape() != Shape::Sequence {
            return Err(ReactiveError::NotASequence);
        }
        let len = self.len();
        self.set(&len.to_string(), value)?;
        self.set(LENGTH, len + 1)
    }

    fn propagate(&self, prop: &str) {
        if !self.is_watched(prop) {
            return;
        }
        if let Some(context) = self.inner.context.upgrade() {
            context.notify(self.inner.id, prop);
        }
    }

    /// Enumerable property names. Not tracked.
    pub fn keys(&self) -> Vec<String> {
        self.inner.store.borrow().keys()
    }

    /// Number of enumerable properties. Not tracked.
    pub fn len(&self) -> usize {
        self.inner.store.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.store.borrow().is_empty()
    }

    pub fn contains_key(&self, prop: &str) -> bool {
        self.inner.store.borrow().get(prop).is_some()
    }

    /// Deep snapshot as plain JSON. Not tracked.
    pub fn to_json(&self) -> Json {
        self.inner.store.borrow().to_json()
    }
}

impl fmt::Debug for ObservedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservedObject")
            .field("id", &self.inner.id)
            .field("shape", &self.shape())
            .field("value", &self.to_json())
            .finish()
    }
}

impl Serialize for ObservedObject {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
