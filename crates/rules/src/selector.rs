//! Choosing which rules to run.

use std::fmt;

use verity_facts::Facts;

use crate::context::ValidationContext;
use crate::error::EngineError;
use crate::repository::RuleRepository;
use crate::rule::{RuleId, RuleRef};

/// Picks an ordered list of rules for some facts.
pub trait RuleSelector: Send + Sync + fmt::Debug {
    /// Rules to run against `facts`. Results are reported in this order.
    fn select_rules(
        &self,
        repository: &dyn RuleRepository,
        ctx: &ValidationContext,
        facts: &Facts,
    ) -> Result<Vec<RuleRef>, EngineError>;
}

/// Every rule in the repository.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllRules;

impl RuleSelector for AllRules {
    fn select_rules(
        &self,
        repository: &dyn RuleRepository,
        _ctx: &ValidationContext,
        _facts: &Facts,
    ) -> Result<Vec<RuleRef>, EngineError> {
        Ok(repository.rules())
    }
}

/// The listed rules, in the listed order. Unknown ids are an error.
#[derive(Debug, Clone, Default)]
pub struct RulesById(pub Vec<RuleId>);

impl RulesById {
    /// Select `ids`.
    pub fn new<I>(ids: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<RuleId>,
    {
        Self(ids.into_iter().map(Into::into).collect())
    }
}

impl RuleSelector for RulesById {
    fn select_rules(
        &self,
        repository: &dyn RuleRepository,
        _ctx: &ValidationContext,
        _facts: &Facts,
    ) -> Result<Vec<RuleRef>, EngineError> {
        self.0.iter().map(|id| repository.get_rule(id)).collect()
    }
}

/// Rules whose declared facts type accepts the facts.
#[derive(Debug, Clone, Copy, Default)]
pub struct RulesForFacts;

impl RuleSelector for RulesForFacts {
    fn select_rules(
        &self,
        repository: &dyn RuleRepository,
        _ctx: &ValidationContext,
        facts: &Facts,
    ) -> Result<Vec<RuleRef>, EngineError> {
        Ok(repository
            .rules()
            .into_iter()
            .filter(|rule| rule.facts_type().accepts(facts))
            .collect())
    }
}
