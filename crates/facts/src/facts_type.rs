//! Declared facts type of a rule.

use std::any::TypeId;
use std::fmt;

use crate::fact::Fact;
use crate::facts::Facts;

/// The runtime type a rule expects its facts to have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FactsType {
    id: Option<TypeId>,
    name: &'static str,
}

impl FactsType {
    /// Accepts facts of every type.
    #[must_use]
    pub const fn any() -> Self {
        Self {
            id: None,
            name: "any",
        }
    }

    /// Accepts facts whose concrete type is `T`.
    #[must_use]
    pub fn of<T: Fact>() -> Self {
        Self {
            id: Some(TypeId::of::<T>()),
            name: std::any::type_name::<T>(),
        }
    }

    /// Type name used in skip reasons.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns `true` if this is [`FactsType::any`].
    #[must_use]
    pub fn is_any(&self) -> bool {
        self.id.is_none()
    }

    /// Type gate: null facts always pass.
    #[must_use]
    pub fn accepts(&self, facts: &Facts) -> bool {
        match (self.id, facts.type_id()) {
            (None, _) | (_, None) => true,
            (Some(expected), Some(actual)) => expected == actual,
        }
    }
}

impl Default for FactsType {
    fn default() -> Self {
        Self::any()
    }
}

impl fmt::Display for FactsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_accepts_everything() {
        let any = FactsType::any();
        assert!(any.is_any());
        assert!(any.accepts(&Facts::new(1_i64)));
        assert!(any.accepts(&Facts::null()));
    }

    #[test]
    fn typed_accepts_matching_and_null() {
        let ty = FactsType::of::<String>();
        assert!(ty.accepts(&Facts::new("x".to_string())));
        assert!(ty.accepts(&Facts::null()));
        assert!(!ty.accepts(&Facts::new(1_i64)));
        assert!(ty.name().ends_with("String"));
    }
}
