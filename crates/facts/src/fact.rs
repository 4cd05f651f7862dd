//! The `Fact` and `Record` traits.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;

use indexmap::IndexMap;

use crate::facts::Facts;
use crate::resolved::Resolved;

/// Ordered string-keyed map of facts. Enumerates in insertion order.
pub type FactMap = IndexMap<String, Facts>;

/// Indexable collection of facts.
pub type FactList = Vec<Facts>;

/// A value that can live in a facts graph.
///
/// Implement this for domain types that rules validate. Types that expose
/// named properties (the equivalent of getters on a plain data object)
/// override [`Fact::as_record`] so the path resolver can walk into them.
///
/// ```
/// use verity_facts::{Fact, Facts, Record, Resolved};
///
/// #[derive(Debug)]
/// struct Person {
///     name: Facts,
/// }
///
/// impl Record for Person {
///     fn property_names(&self) -> Vec<String> {
///         vec!["name".into()]
///     }
///
///     fn property(&self, name: &str) -> Resolved<Facts> {
///         match name {
///             "name" => Resolved::Present(self.name.clone()),
///             _ => Resolved::Absent,
///         }
///     }
/// }
///
/// impl Fact for Person {
///     fn as_record(&self) -> Option<&dyn Record> {
///         Some(self)
///     }
/// }
///
/// let person = Facts::new(Person { name: Facts::new("Ada".to_string()) });
/// assert!(person.is::<Person>());
/// ```
pub trait Fact: Any + Send + Sync + Debug {
    /// Property view of this fact, if it has named properties.
    fn as_record(&self) -> Option<&dyn Record> {
        None
    }

    /// Human-readable name of the concrete type.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Named-property access on a fact.
pub trait Record {
    /// Names of the readable properties, in a stable order.
    fn property_names(&self) -> Vec<String>;

    /// Read one property. `Absent` when the record has no such property.
    fn property(&self, name: &str) -> Resolved<Facts>;

    /// All `(name, value)` pairs in [`Record::property_names`] order.
    fn properties(&self) -> Vec<(String, Facts)> {
        self.property_names()
            .into_iter()
            .filter_map(|name| match self.property(&name) {
                Resolved::Present(value) => Some((name, value)),
                Resolved::Absent => None,
            })
            .collect()
    }
}

macro_rules! impl_fact {
    ($($ty:ty),* $(,)?) => {
        $(impl Fact for $ty {})*
    };
}

impl_fact!(
    String,
    bool,
    i32,
    i64,
    u64,
    f64,
    FactList,
    FactMap,
    BTreeMap<String, Facts>,
    HashMap<String, Facts>,
);
