#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Verity Rules
//!
//! Rule execution over facts graphs.
//!
//! - [`Rule`]: a validation over facts, gated by a declared [`FactsType`]
//!   and [`Condition`] preconditions
//! - [`ValidationContext`]: per-run state; a persistent rule stack for cycle
//!   detection and a persistent path stack for the current location
//! - [`RuleExecutor`]: [`SimpleRuleExecutor`] on the caller's thread,
//!   [`ConcurrentRuleExecutor`] on a tokio worker pool with a per-run
//!   [`ResultCache`]
//! - [`RuleResult`]: `OK` / `SKIPPED` / `FAILED` with a [`Reason`]; results
//!   merge by severity
//! - [`Reporter`] / [`EventPublisher`]: where results and lifecycle events go
//! - [`Validator`]: owns a repository, an executor and a configuration
//!
//! [`FactsType`]: verity_facts::FactsType

pub mod condition;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod executor;
pub mod extensions;
pub mod reporter;
pub mod repository;
pub mod result;
pub mod rule;
pub mod selector;
pub mod stack;
pub mod validator;

pub use condition::{Condition, FnCondition, condition};
pub use config::{EngineConfig, ExecutionMode, SkippedPolicy};
pub use context::{PathFrame, PathScope, RuleFrame, RuleScope, ValidationContext};
pub use dispatch::{DispatchingRule, ForwardingRule, reduce};
pub use error::{ContextError, EngineError};
pub use event::{BroadcastPublisher, EventPublisher, NoopPublisher, PublishedEvent, RuleEvent};
pub use executor::{
    CacheStats, ConcurrentRuleExecutor, ResultCache, RuleExecutor, Selected, SimpleRuleExecutor,
};
pub use extensions::{Extensions, SharedExtensions, SharedExtensionsBuilder};
pub use reporter::{
    CompositeReporter, MemoryReporter, NoopReporter, ReportEntry, ReportSummary, Reporter,
    TracingReporter,
};
pub use repository::{MemoryRuleRepository, RuleRepository};
pub use result::{Reason, ResultCode, RuleResult};
pub use rule::{Outcome, Rule, RuleId, RuleMetadata, RuleRef, SimpleRule};
pub use selector::{AllRules, RuleSelector, RulesById, RulesForFacts};
pub use stack::PersistentStack;
pub use validator::{ValidationReport, Validator, ValidatorBuilder, Verdict};
