//! Per-run validation state.
//!
//! A [`ValidationContext`] carries two persistent stacks: the rule stack,
//! used for cycle detection and the current/parent/root facts views, and
//! the path stack, which tracks the location being validated. Both are
//! structurally shared, so [`ValidationContext::copy`] is cheap and the copy
//! can run on another thread while the original keeps going.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use verity_facts::Facts;
use verity_path::{Path, PathResolver};

use crate::error::{ContextError, EngineError};
use crate::event::EventPublisher;
use crate::executor::{RuleExecutor, TaskId};
use crate::extensions::{Extensions, SharedExtensions};
use crate::reporter::Reporter;
use crate::repository::RuleRepository;
use crate::result::RuleResult;
use crate::rule::{RuleId, RuleRef, rule_identity};
use crate::stack::PersistentStack;

/// A rule running on some facts.
#[derive(Debug, Clone)]
pub struct RuleFrame {
    /// The running rule.
    pub rule: RuleRef,
    /// The facts it was given.
    pub facts: Facts,
}

impl RuleFrame {
    fn is(&self, rule: &RuleRef, facts: &Facts) -> bool {
        rule_identity(&self.rule) == rule_identity(rule) && self.facts.ptr_eq(facts)
    }
}

/// A location entered while validating.
#[derive(Debug, Clone)]
pub struct PathFrame {
    /// Object the path was resolved against.
    pub parent: Facts,
    /// Absolute path from the validated root.
    pub path: Path,
}

/// State threaded through one validation run.
#[derive(Debug)]
pub struct ValidationContext {
    rules: PersistentStack<RuleFrame>,
    paths: PersistentStack<PathFrame>,
    task: Option<TaskId>,
    shared: Arc<SharedExtensions>,
    local: Extensions,
}

impl ValidationContext {
    /// Fresh context over `shared`.
    pub fn new(shared: Arc<SharedExtensions>) -> Self {
        Self {
            rules: PersistentStack::new(),
            paths: PersistentStack::new(),
            task: None,
            shared,
            local: Extensions::new(),
        }
    }

    /// Fresh context over default collaborators.
    #[must_use]
    pub fn detached() -> Self {
        Self::new(SharedExtensions::builder().build())
    }

    /// Same stacks and shared registry, new empty local registry.
    #[must_use]
    pub fn copy(&self) -> Self {
        Self {
            rules: self.rules.clone(),
            paths: self.paths.clone(),
            task: self.task,
            shared: Arc::clone(&self.shared),
            local: Extensions::new(),
        }
    }

    // ── Rule stack ──────────────────────────────────────────────────────────

    /// Push `(rule, facts)`. Refuses, returning `false`, if that pair is
    /// already on the stack.
    pub fn enter_rule(&mut self, rule: &RuleRef, facts: &Facts) -> bool {
        if self.is_running(rule, facts) {
            return false;
        }
        self.rules = self.rules.push(RuleFrame {
            rule: Arc::clone(rule),
            facts: facts.clone(),
        });
        true
    }

    /// Push `(rule, facts)` for the life of the returned guard, which puts
    /// the rule stack back as it found it when dropped. `None` if the pair is
    /// already on the stack.
    pub fn scope_rule(&mut self, rule: &RuleRef, facts: &Facts) -> Option<RuleScope<'_>> {
        let saved = self.rules.clone();
        if !self.enter_rule(rule, facts) {
            return None;
        }
        Some(RuleScope { ctx: self, saved })
    }

    /// Pop the innermost rule.
    pub fn leave_rule(&mut self) -> Result<RuleFrame, ContextError> {
        let frame = self.rules.peek().cloned().ok_or(ContextError::EmptyRuleStack)?;
        self.rules = self.rules.pop().ok_or(ContextError::EmptyRuleStack)?;
        Ok(frame)
    }

    /// Whether `rule` is already running on these exact `facts`.
    pub fn is_running(&self, rule: &RuleRef, facts: &Facts) -> bool {
        self.rules.iter().any(|frame| frame.is(rule, facts))
    }

    /// Number of rules on the stack.
    pub fn rule_depth(&self) -> usize {
        self.rules.len()
    }

    /// Innermost running rule.
    pub fn current_rule(&self) -> Option<&RuleRef> {
        self.rules.peek().map(|frame| &frame.rule)
    }

    /// Facts of the innermost running rule.
    pub fn current_facts(&self) -> Option<&Facts> {
        self.rules.peek().map(|frame| &frame.facts)
    }

    /// Facts of the rule that invoked the current one.
    pub fn parent_facts(&self) -> Option<&Facts> {
        self.rules.iter().nth(1).map(|frame| &frame.facts)
    }

    /// Facts of the outermost rule. Defined iff a rule is running.
    pub fn root_facts(&self) -> Option<&Facts> {
        self.rules.bottom().map(|frame| &frame.facts)
    }

    /// Running rules, innermost first.
    pub fn rule_frames(&self) -> impl Iterator<Item = &RuleFrame> {
        self.rules.iter()
    }

    /// Cached computation this context is running inside, if any.
    pub(crate) const fn task(&self) -> Option<TaskId> {
        self.task
    }

    pub(crate) const fn set_task(&mut self, task: TaskId) {
        self.task = Some(task);
    }

    // ── Path stack ──────────────────────────────────────────────────────────

    /// Absolute path of the current location; empty at the root.
    pub fn current_path(&self) -> Path {
        self.paths
            .peek()
            .map(|frame| frame.path.clone())
            .unwrap_or_default()
    }

    /// Object the current location was resolved against.
    pub fn current_parent(&self) -> Option<&Facts> {
        self.paths.peek().map(|frame| &frame.parent)
    }

    /// Every entered location, outermost first.
    pub fn path_trail(&self) -> Vec<Path> {
        let mut trail: Vec<Path> = self.paths.iter().map(|frame| frame.path.clone()).collect();
        trail.reverse();
        trail
    }

    /// Enter `relative` below the current location. The returned guard
    /// dereferences to this context and restores the previous location when
    /// dropped, on every exit path.
    pub fn enter_path(&mut self, parent: &Facts, relative: &Path) -> PathScope<'_> {
        let saved = self.paths.clone();
        let path = self.current_path().concat(relative);
        self.paths = self.paths.push(PathFrame {
            parent: parent.clone(),
            path,
        });
        PathScope { ctx: self, saved }
    }

    // ── Registries ──────────────────────────────────────────────────────────

    /// Registry shared with every copy of this context.
    pub fn shared(&self) -> &Arc<SharedExtensions> {
        &self.shared
    }

    /// Registry private to this copy.
    pub fn local(&self) -> &Extensions {
        &self.local
    }

    /// Result sink.
    pub fn reporter(&self) -> &dyn Reporter {
        self.shared.reporter().as_ref()
    }

    /// Path resolver.
    pub fn resolver(&self) -> &PathResolver {
        self.shared.resolver()
    }

    /// Rule executor.
    pub fn executor(&self) -> &Arc<dyn RuleExecutor> {
        self.shared.executor()
    }

    /// Rule repository.
    pub fn repository(&self) -> &Arc<dyn RuleRepository> {
        self.shared.repository()
    }

    /// Event publisher.
    pub fn publisher(&self) -> &dyn EventPublisher {
        self.shared.publisher().as_ref()
    }

    // ── Sub-rule dispatch ───────────────────────────────────────────────────

    /// Run `rule` on `facts` through the shared executor.
    pub fn validate_rule(&mut self, rule: &RuleRef, facts: &Facts) -> RuleResult {
        let executor = Arc::clone(self.executor());
        executor.validate(self, rule, facts)
    }

    /// Look `id` up in the repository and run it on `facts`.
    pub fn validate_rule_id(
        &mut self,
        id: &RuleId,
        facts: &Facts,
    ) -> Result<RuleResult, EngineError> {
        let rule = self.repository().get_rule(id)?;
        Ok(self.validate_rule(&rule, facts))
    }
}

/// Location guard returned by [`ValidationContext::enter_path`].
#[derive(Debug)]
pub struct PathScope<'a> {
    ctx: &'a mut ValidationContext,
    saved: PersistentStack<PathFrame>,
}

impl Deref for PathScope<'_> {
    type Target = ValidationContext;

    fn deref(&self) -> &Self::Target {
        self.ctx
    }
}

impl DerefMut for PathScope<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ctx
    }
}

impl Drop for PathScope<'_> {
    fn drop(&mut self) {
        self.ctx.paths = std::mem::take(&mut self.saved);
    }
}

/// Rule guard returned by [`ValidationContext::scope_rule`].
#[derive(Debug)]
pub struct RuleScope<'a> {
    ctx: &'a mut ValidationContext,
    saved: PersistentStack<RuleFrame>,
}

impl Deref for RuleScope<'_> {
    type Target = ValidationContext;

    fn deref(&self) -> &Self::Target {
        self.ctx
    }
}

impl DerefMut for RuleScope<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ctx
    }
}

impl Drop for RuleScope<'_> {
    fn drop(&mut self) {
        self.ctx.rules = std::mem::take(&mut self.saved);
    }
}
