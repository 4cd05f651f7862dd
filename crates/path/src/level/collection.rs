//! Maps and lists.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use verity_facts::{FactList, FactMap, Facts, Resolved};

use super::LevelResolver;

/// What a map lookup reports for a key the map does not contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingKeyPolicy {
    /// The key is absent; the lookup falls through to the next layer.
    #[default]
    Absent,
    /// The key is present with a null value.
    PresentNull,
}

/// Resolves string-keyed maps by key and lists by integer index.
///
/// Handles [`FactMap`], `BTreeMap<String, Facts>`, `HashMap<String, Facts>`
/// and [`FactList`]. List components must parse as an in-range `usize`;
/// anything else is absent regardless of the missing-key policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectionResolver {
    missing_key: MissingKeyPolicy,
}

impl CollectionResolver {
    /// Resolver with the given missing-key policy.
    #[must_use]
    pub fn new(missing_key: MissingKeyPolicy) -> Self {
        Self { missing_key }
    }

    /// The configured missing-key policy.
    #[must_use]
    pub fn missing_key(&self) -> MissingKeyPolicy {
        self.missing_key
    }

    fn lookup(&self, found: Option<&Facts>) -> Resolved<Facts> {
        match (found, self.missing_key) {
            (Some(value), _) => Resolved::Present(value.clone()),
            (None, MissingKeyPolicy::Absent) => Resolved::Absent,
            (None, MissingKeyPolicy::PresentNull) => Resolved::Present(Facts::null()),
        }
    }
}

fn entries<'a>(iter: impl Iterator<Item = (&'a String, &'a Facts)>) -> Vec<(String, Facts)> {
    iter.map(|(k, v)| (k.clone(), v.clone())).collect()
}

impl LevelResolver for CollectionResolver {
    fn resolve_level(&self, facts: &Facts, name: &str) -> Resolved<Facts> {
        if let Some(map) = facts.downcast_ref::<FactMap>() {
            return self.lookup(map.get(name));
        }
        if let Some(map) = facts.downcast_ref::<BTreeMap<String, Facts>>() {
            return self.lookup(map.get(name));
        }
        if let Some(map) = facts.downcast_ref::<HashMap<String, Facts>>() {
            return self.lookup(map.get(name));
        }
        if let Some(list) = facts.downcast_ref::<FactList>() {
            return Resolved::from_option(
                name.parse::<usize>()
                    .ok()
                    .and_then(|index| list.get(index))
                    .cloned(),
            );
        }
        Resolved::Absent
    }

    fn enumerate_level(&self, facts: &Facts) -> Option<Vec<(String, Facts)>> {
        if let Some(map) = facts.downcast_ref::<FactMap>() {
            return Some(entries(map.iter()));
        }
        if let Some(map) = facts.downcast_ref::<BTreeMap<String, Facts>>() {
            return Some(entries(map.iter()));
        }
        if let Some(map) = facts.downcast_ref::<HashMap<String, Facts>>() {
            return Some(entries(map.iter()));
        }
        if let Some(list) = facts.downcast_ref::<FactList>() {
            return Some(
                list.iter()
                    .enumerate()
                    .map(|(i, v)| (i.to_string(), v.clone()))
                    .collect(),
            );
        }
        None
    }
}
