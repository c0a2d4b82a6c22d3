//! Property values stored inside observed objects.

use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::Value as Json;

use super::observed::ObservedObject;

/// A value held by a property of an observed object.
///
/// Scalars and unwrapped aggregates are kept as plain JSON. Nested aggregates
/// that were wrapped (deep observation) are held as `Observed`.
#[derive(Clone)]
pub enum Value {
    Plain(Json),
    Observed(ObservedObject),
}

impl Value {
    /// The `null` value.
    pub fn null() -> Self {
        Value::Plain(Json::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Plain(Json::Null))
    }

    /// Whether this is a record or sequence, wrapped or not.
    pub fn is_aggregate(&self) -> bool {
        match self {
            Value::Plain(json) => is_json_aggregate(json),
            Value::Observed(_) => true,
        }
    }

    pub fn as_observed(&self) -> Option<&ObservedObject> {
        match self {
            Value::Observed(obj) => Some(obj),
            Value::Plain(_) => None,
        }
    }

    pub fn into_observed(self) -> Option<ObservedObject> {
        match self {
            Value::Observed(obj) => Some(obj),
            Value::Plain(_) => None,
        }
    }

    pub fn as_json(&self) -> Option<&Json> {
        match self {
            Value::Plain(json) => Some(json),
            Value::Observed(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_json().and_then(Json::as_i64)
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.as_json().and_then(Json::as_u64)
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_json().and_then(Json::as_f64)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_json().and_then(Json::as_bool)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_json().and_then(Json::as_str)
    }

    /// Deep snapshot as plain JSON. Never records dependencies.
    pub fn to_json(&self) -> Json {
        match self {
            Value::Plain(json) => json.clone(),
            Value::Observed(obj) => obj.to_json(),
        }
    }

    /// Whether assigning `self` over `current` counts as a change.
    ///
    /// Scalars compare by value and observed objects by identity. Plain
    /// aggregates carry no identity, so assigning one always counts.
    pub(crate) fn differs_from(&self, current: Option<&Value>) -> bool {
        let Some(current) = current else {
            return true;
        };
        match (current, self) {
            (Value::Observed(old), Value::Observed(new)) => !old.ptr_eq(new),
            (Value::Plain(_), Value::Plain(new)) if is_json_aggregate(new) => true,
            (Value::Plain(Json::Number(old)), Value::Plain(Json::Number(new))) => !same_number(old, new),
            (Value::Plain(old), Value::Plain(new)) => old != new,
            _ => true,
        }
    }
}

/// Numeric equality across integer and float representations, so `1` and
/// `1.0` are the same number.
fn same_number(a: &serde_json::Number, b: &serde_json::Number) -> bool {
    if a == b {
        return true;
    }
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

pub(crate) fn is_json_aggregate(json: &Json) -> bool {
    matches!(json, Json::Object(_) | Json::Array(_))
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Plain(a), Value::Plain(b)) => a == b,
            (Value::Observed(a), Value::Observed(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Plain(json) => write!(f, "{json}"),
            Value::Observed(obj) => fmt::Debug::fmt(obj, f),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Plain(json) => json.serialize(serializer),
            Value::Observed(obj) => obj.serialize(serializer),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::null()
    }
}

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        Value::Plain(json)
    }
}

impl From<ObservedObject> for Value {
    fn from(obj: ObservedObject) -> Self {
        Value::Observed(obj)
    }
}

impl From<&ObservedObject> for Value {
    fn from(obj: &ObservedObject) -> Self {
        Value::Observed(obj.clone())
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::Plain(Json::from(v))
                }
            }
        )*
    };
}

impl_from_scalar!(bool, i32, i64, u32, u64, usize, f64, String, &str);
