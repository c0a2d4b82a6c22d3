//! Backing stores for observed objects.
//!
//! An observed object does not intercept anything by itself. It routes every
//! property access through a [`Store`], one implementation per data shape,
//! and layers dependency tracking on top.

use indexmap::IndexMap;
use serde_json::{Map, Value as Json};

use super::value::Value;
use crate::error::{ReactiveError, Result};

/// Reserved property holding a sequence's length.
pub const LENGTH: &str = "length";

/// Largest length a sequence may take. Indices run up to `MAX_LENGTH - 1`.
pub const MAX_LENGTH: usize = u32::MAX as usize;

/// The shape of the data behind an observed object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Named properties in insertion order.
    Record,
    /// Index-addressed items plus a `length` property.
    Sequence,
}

/// Typed property access over a concrete data shape.
pub trait Store {
    fn shape(&self) -> Shape;

    /// Current value of `prop`, if present.
    fn get(&self, prop: &str) -> Option<Value>;

    /// Store `value` under `prop`, returning the previous value.
    fn set(&mut self, prop: &str, value: Value) -> Result<Option<Value>>;

    /// Remove `prop`, returning the previous value.
    fn remove(&mut self, prop: &str) -> Result<Option<Value>>;

    /// Release an aggregate about to be overwritten.
    ///
    /// Records delete the key, so the replacement is enumerated last.
    /// Sequences keep the slot in place.
    fn detach(&mut self, prop: &str) -> Option<Value>;

    /// Enumerable property names in enumeration order.
    fn keys(&self) -> Vec<String>;

    /// Number of enumerable properties.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether writes to `prop` always propagate.
    fn is_length(&self, prop: &str) -> bool;

    /// Deep snapshot as plain JSON.
    fn to_json(&self) -> Json;
}

/// Record-shaped store.
#[derive(Debug, Default)]
pub struct RecordStore {
    entries: IndexMap<String, Value>,
}

impl RecordStore {
    pub fn new(entries: IndexMap<String, Value>) -> Self {
        Self { entries }
    }
}

impl Store for RecordStore {
    fn shape(&self) -> Shape {
        Shape::Record
    }

    fn get(&self, prop: &str) -> Option<Value> {
        self.entries.get(prop).cloned()
    }

    fn set(&mut self, prop: &str, value: Value) -> Result<Option<Value>> {
        Ok(self.entries.insert(prop.to_owned(), value))
    }

    fn remove(&mut self, prop: &str) -> Result<Option<Value>> {
        Ok(self.entries.shift_remove(prop))
    }

    fn detach(&mut self, prop: &str) -> Option<Value> {
        self.entries.shift_remove(prop)
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn is_length(&self, _prop: &str) -> bool {
        false
    }

    fn to_json(&self) -> Json {
        let map: Map<String, Json> = self
            .entries
            .iter()
            .map(|(key, value)| (key.clone(), value.to_json()))
            .collect();
        Json::Object(map)
    }
}

/// Sequence-shaped store.
#[derive(Debug, Default)]
pub struct SequenceStore {
    items: Vec<Value>,
}

impl SequenceStore {
    pub fn new(items: Vec<Value>) -> Self {
        Self { items }
    }

    /// Parse a canonical index: decimal digits, no leading zeros, below
    /// [`MAX_LENGTH`].
    fn parse_index(prop: &str) -> Option<usize> {
        let canonical = !prop.is_empty()
            && prop.bytes().all(|b| b.is_ascii_digit())
            && (prop == "0" || !prop.starts_with('0'));
        if !canonical {
            return None;
        }
        prop.parse::<usize>().ok().filter(|&index| index < MAX_LENGTH)
    }

    fn index(prop: &str) -> Result<usize> {
        Self::parse_index(prop).ok_or_else(|| ReactiveError::InvalidIndex(prop.to_owned()))
    }

    fn new_length(value: &Value) -> Result<usize> {
        value
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .filter(|&len| len <= MAX_LENGTH)
            .ok_or_else(|| ReactiveError::InvalidLength(format!("{value:?}")))
    }

    fn grow_to(&mut self, len: usize) -> Result<()> {
        let additional = len.saturating_sub(self.items.len());
        self.items
            .try_reserve(additional)
            .map_err(|err| ReactiveError::InvalidLength(format!("{len}: {err}")))?;
        self.items.resize(len, Value::null());
        Ok(())
    }
}

impl Store for SequenceStore {
    fn shape(&self) -> Shape {
        Shape::Sequence
    }

    fn get(&self, prop: &str) -> Option<Value> {
        if prop == LENGTH {
            return Some(Value::from(self.items.len()));
        }
        let index = Self::parse_index(prop)?;
        self.items.get(index).cloned()
    }

    fn set(&mut self, prop: &str, value: Value) -> Result<Option<Value>> {
        if prop == LENGTH {
            let len = Self::new_length(&value)?;
            let previous = self.items.len();
            if len > previous {
                self.grow_to(len)?;
            } else {
                self.items.truncate(len);
            }
            return Ok(Some(Value::from(previous)));
        }

        let index = Self::index(prop)?;
        if index >= self.items.len() {
            self.grow_to(index)?;
            self.items.push(value);
            return Ok(None);
        }
        Ok(Some(std::mem::replace(&mut self.items[index], value)))
    }

    fn remove(&mut self, prop: &str) -> Result<Option<Value>> {
        if prop == LENGTH {
            return Err(ReactiveError::InvalidIndex(prop.to_owned()));
        }
        let index = Self::index(prop)?;
        Ok(self
            .items
            .get_mut(index)
            .map(|slot| std::mem::replace(slot, Value::null())))
    }

    fn detach(&mut self, _prop: &str) -> Option<Value> {
        None
    }

    fn keys(&self) -> Vec<String> {
        (0..self.items.len()).map(|i| i.to_string()).collect()
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn is_length(&self, prop: &str) -> bool {
        prop == LENGTH
    }

    fn to_json(&self) -> Json {
        Json::Array(self.items.iter().map(Value::to_json).collect())
    }
}
