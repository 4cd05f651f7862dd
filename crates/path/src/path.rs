//! The `Path` value type.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::component::Component;
use crate::error::PathError;
use crate::matching;
use crate::syntax::PathSyntax;

/// An immutable structural address into a facts graph.
///
/// A path is *concrete* when every component is [`Component::Named`] and a
/// *pattern* otherwise. Cloning shares the component buffer.
///
/// `Display`, `FromStr` and serde use the default [`PathSyntax`]; use
/// [`PathSyntax::parse`] / [`PathSyntax::format`] for other token sets.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Path {
    components: Arc<[Component]>,
    pattern: bool,
}

impl Path {
    /// The empty path, which addresses the reference object itself.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Build a path from components.
    pub fn new(components: impl IntoIterator<Item = Component>) -> Self {
        let components: Arc<[Component]> = components.into_iter().collect();
        let pattern = components.iter().any(Component::is_wildcard);
        Self {
            components,
            pattern,
        }
    }

    /// Build a concrete path from names.
    pub fn named<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        Self::new(names.into_iter().map(Component::named))
    }

    /// The components in order.
    #[must_use]
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Number of components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns `true` for the empty path.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Returns `true` if any component is a wildcard.
    #[must_use]
    pub fn is_pattern(&self) -> bool {
        self.pattern
    }

    /// Returns `true` if every component is named.
    #[must_use]
    pub fn is_concrete(&self) -> bool {
        !self.pattern
    }

    /// Last component, if any.
    #[must_use]
    pub fn last(&self) -> Option<&Component> {
        self.components.last()
    }

    /// The path without its last component. `None` for the empty path.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let (_, init) = self.components.split_last()?;
        Some(Self::new(init.iter().cloned()))
    }

    /// `self` followed by `other`.
    #[must_use]
    pub fn concat(&self, other: &Self) -> Self {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }
        Self::new(self.components.iter().chain(other.components.iter()).cloned())
    }

    /// `self` with one more component.
    #[must_use]
    pub fn child(&self, component: impl Into<Component>) -> Self {
        Self::new(
            self.components
                .iter()
                .cloned()
                .chain(std::iter::once(component.into())),
        )
    }

    /// Returns `true` if this concrete path is addressed by `pattern`.
    ///
    /// A pattern subject never matches.
    #[must_use]
    pub fn matches(&self, pattern: &Self) -> bool {
        self.is_concrete() && matching::matches(&self.components, &pattern.components)
    }

    /// Fail with [`PathError::NotConcrete`] if this is a pattern.
    pub fn ensure_concrete(&self) -> Result<&Self, PathError> {
        if self.pattern {
            Err(PathError::NotConcrete(self.to_string()))
        } else {
            Ok(self)
        }
    }
}

impl Default for Path {
    fn default() -> Self {
        Self::empty()
    }
}

impl FromIterator<Component> for Path {
    fn from_iter<I: IntoIterator<Item = Component>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&PathSyntax::default().format(self))
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({:?})", self.to_string())
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PathSyntax::default().parse(s)
    }
}

impl Serialize for Path {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Path {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
