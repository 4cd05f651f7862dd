//! Rule storage.

use std::fmt;

use indexmap::IndexMap;

use crate::error::EngineError;
use crate::rule::{Rule, RuleId, RuleRef};

/// Source of rules by id.
pub trait RuleRepository: Send + Sync + fmt::Debug {
    /// The rule registered under `id`.
    fn get_rule(&self, id: &RuleId) -> Result<RuleRef, EngineError>;

    /// All ids, in the repository's natural order.
    fn rule_ids(&self) -> Vec<RuleId>;

    /// All rules, in the order of [`rule_ids`](RuleRepository::rule_ids).
    fn rules(&self) -> Vec<RuleRef> {
        self.rule_ids()
            .iter()
            .filter_map(|id| self.get_rule(id).ok())
            .collect()
    }
}

/// Rules held in memory, in registration order.
#[derive(Default)]
pub struct MemoryRuleRepository {
    rules: IndexMap<RuleId, RuleRef>,
}

impl MemoryRuleRepository {
    /// Empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a shared rule. Ids must be unique.
    pub fn register(&mut self, rule: RuleRef) -> Result<(), EngineError> {
        let id = rule.id().clone();
        if self.rules.contains_key(&id) {
            return Err(EngineError::DuplicateRule(id));
        }
        self.rules.insert(id, rule);
        Ok(())
    }

    /// Register an owned rule.
    pub fn add(&mut self, rule: impl Rule + 'static) -> Result<(), EngineError> {
        self.register(std::sync::Arc::new(rule))
    }

    /// Chaining form of [`register`](Self::register).
    pub fn with_rule(mut self, rule: RuleRef) -> Result<Self, EngineError> {
        self.register(rule)?;
        Ok(self)
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &RuleId) -> bool {
        self.rules.contains_key(id)
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` if no rule is registered.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl fmt::Debug for MemoryRuleRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryRuleRepository")
            .field("rules", &self.rules.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl RuleRepository for MemoryRuleRepository {
    fn get_rule(&self, id: &RuleId) -> Result<RuleRef, EngineError> {
        self.rules
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::RuleNotFound(id.clone()))
    }

    fn rule_ids(&self) -> Vec<RuleId> {
        self.rules.keys().cloned().collect()
    }

    fn rules(&self) -> Vec<RuleRef> {
        self.rules.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::RuleResult;
    use crate::rule::SimpleRule;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn rule(id: &str) -> RuleRef {
        SimpleRule::new(id, |_, _| Ok(RuleResult::ok().into())).into_ref()
    }

    #[test]
    fn keeps_registration_order() {
        let repo = MemoryRuleRepository::new()
            .with_rule(rule("c"))
            .and_then(|r| r.with_rule(rule("a")))
            .and_then(|r| r.with_rule(rule("b")))
            .unwrap();
        let ids: Vec<String> = repo.rule_ids().iter().map(ToString::to_string).collect();
        assert_eq!(ids, ["c", "a", "b"]);
        assert_eq!(repo.rules().len(), 3);
    }

    #[test]
    fn rejects_duplicates() {
        let mut repo = MemoryRuleRepository::new();
        repo.register(rule("a")).unwrap();
        let err = repo.register(rule("a")).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateRule(id) if id.as_str() == "a"));
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn get_rule_returns_the_registered_instance() {
        let a = rule("a");
        let mut repo = MemoryRuleRepository::new();
        repo.register(Arc::clone(&a)).unwrap();
        assert!(Arc::ptr_eq(&repo.get_rule(&RuleId::new("a")).unwrap(), &a));
        assert!(matches!(
            repo.get_rule(&RuleId::new("missing")),
            Err(EngineError::RuleNotFound(_))
        ));
    }
}
