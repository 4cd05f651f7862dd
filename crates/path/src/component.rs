//! Path components.

use std::sync::Arc;

/// One segment of a structural address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Component {
    /// A literal key, property name, or list index.
    Named(Arc<str>),
    /// Matches exactly one level with any name.
    AnyOneLevel,
    /// Matches zero or more levels.
    ManyLevels,
}

impl Component {
    /// A literal component.
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        Self::Named(name.into())
    }

    /// The literal name, `None` for wildcards.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Named(name) => Some(name),
            Self::AnyOneLevel | Self::ManyLevels => None,
        }
    }

    /// Returns `true` for [`Component::Named`].
    #[must_use]
    pub fn is_named(&self) -> bool {
        matches!(self, Self::Named(_))
    }

    /// Returns `true` for either wildcard.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        !self.is_named()
    }
}

impl From<&str> for Component {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl From<String> for Component {
    fn from(name: String) -> Self {
        Self::named(name)
    }
}

impl From<usize> for Component {
    fn from(index: usize) -> Self {
        Self::named(index.to_string())
    }
}
