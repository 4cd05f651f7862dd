//! Shared, identity-comparable handle to a node of a facts graph.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::fact::{Fact, FactList, FactMap, Record};

/// Handle to a value in a facts graph, or null.
///
/// Cloning is cheap and preserves identity: two clones of the same handle
/// are [`ptr_eq`](Facts::ptr_eq). Rule cycle detection and the result cache
/// compare facts by identity, never by value.
#[derive(Clone, Default)]
pub struct Facts(Option<Arc<dyn Fact>>);

impl Facts {
    /// The null fact.
    #[must_use]
    pub fn null() -> Self {
        Self(None)
    }

    /// Wrap a value in a new handle with its own identity.
    pub fn new<T: Fact>(value: T) -> Self {
        Self(Some(Arc::new(value)))
    }

    /// Wrap an existing shared value, keeping its identity.
    #[must_use]
    pub fn from_arc(value: Arc<dyn Fact>) -> Self {
        Self(Some(value))
    }

    /// Build a map fact from `(key, value)` pairs.
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Facts)>,
    {
        Self::new(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v))
                .collect::<FactMap>(),
        )
    }

    /// Build a list fact.
    pub fn list(items: impl IntoIterator<Item = Facts>) -> Self {
        Self::new(items.into_iter().collect::<FactList>())
    }

    /// Returns `true` for the null fact.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    /// Borrow the underlying value.
    #[must_use]
    pub fn get(&self) -> Option<&dyn Fact> {
        self.0.as_deref()
    }

    /// Downcast to a concrete type.
    #[must_use]
    pub fn downcast_ref<T: Fact>(&self) -> Option<&T> {
        let any: &dyn Any = self.get()?;
        any.downcast_ref::<T>()
    }

    /// Returns `true` if the value is a `T`. Null is never a `T`.
    #[must_use]
    pub fn is<T: Fact>(&self) -> bool {
        self.type_id() == Some(TypeId::of::<T>())
    }

    /// Type id of the concrete value, `None` for null.
    #[must_use]
    pub fn type_id(&self) -> Option<TypeId> {
        let any: &dyn Any = self.get()?;
        Some(Any::type_id(any))
    }

    /// Concrete type name, `"null"` for null.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.get().map_or("null", Fact::type_name)
    }

    /// Property view, if the value is a record.
    #[must_use]
    pub fn as_record(&self) -> Option<&dyn Record> {
        self.get()?.as_record()
    }

    /// Identity comparison. Null is identical to null.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Address-based identity token; `0` for null.
    ///
    /// Only meaningful while a clone of this handle is kept alive.
    #[must_use]
    pub fn identity(&self) -> usize {
        self.0
            .as_ref()
            .map_or(0, |value| Arc::as_ptr(value).cast::<()>().addr())
    }

    /// Build a facts graph from JSON.
    ///
    /// Objects become [`FactMap`]s (key order preserved), arrays
    /// [`FactList`]s, integers `i64` (or `u64` above `i64::MAX`), other
    /// numbers `f64`, and JSON `null` the null fact.
    #[must_use]
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => Self::null(),
            Value::Bool(b) => Self::new(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::new(i)
                } else if let Some(u) = n.as_u64() {
                    Self::new(u)
                } else {
                    Self::new(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => Self::new(s),
            Value::Array(items) => Self::list(items.into_iter().map(Self::from_json)),
            Value::Object(map) => Self::new(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from_json(v)))
                    .collect::<FactMap>(),
            ),
        }
    }

    /// Best-effort JSON rendering, used for reports and events.
    ///
    /// Types the graph does not know are rendered as their `Debug` string.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let Some(fact) = self.get() else {
            return Value::Null;
        };
        if let Some(s) = self.downcast_ref::<String>() {
            return Value::String(s.clone());
        }
        if let Some(b) = self.downcast_ref::<bool>() {
            return Value::Bool(*b);
        }
        if let Some(i) = self.downcast_ref::<i64>() {
            return Value::from(*i);
        }
        if let Some(i) = self.downcast_ref::<i32>() {
            return Value::from(*i);
        }
        if let Some(u) = self.downcast_ref::<u64>() {
            return Value::from(*u);
        }
        if let Some(f) = self.downcast_ref::<f64>() {
            return Value::from(*f);
        }
        if let Some(list) = self.downcast_ref::<FactList>() {
            return Value::Array(list.iter().map(Self::to_json).collect());
        }
        if let Some(map) = self.downcast_ref::<FactMap>() {
            return Value::Object(map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect());
        }
        if let Some(record) = fact.as_record() {
            return Value::Object(
                record
                    .properties()
                    .into_iter()
                    .map(|(k, v)| (k, v.to_json()))
                    .collect(),
            );
        }
        Value::String(format!("{fact:?}"))
    }
}

impl<T: Fact> From<T> for Facts {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for Facts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            None => f.write_str("null"),
            Some(value) => fmt::Debug::fmt(&**value, f),
        }
    }
}
