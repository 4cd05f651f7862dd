//! Result sinks.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use verity_facts::Facts;
use verity_path::Path;

use crate::context::ValidationContext;
use crate::result::{ResultCode, RuleResult};
use crate::rule::{RuleId, RuleRef};

/// Receives one entry per executed rule, whatever its outcome.
///
/// Shared by every branch of a run, so `add` may be called concurrently.
pub trait Reporter: Send + Sync + fmt::Debug {
    /// Record that `rule` produced `result` for `facts` at `path`.
    fn add(
        &self,
        ctx: &ValidationContext,
        facts: &Facts,
        path: &Path,
        rule: &RuleRef,
        result: &RuleResult,
    );
}

/// One reported rule execution.
#[derive(Debug, Clone)]
pub struct ReportEntry {
    /// Rule that ran.
    pub rule_id: RuleId,
    /// Location of the facts, relative to the validated root.
    pub path: Path,
    /// The facts the rule saw.
    pub facts: Facts,
    /// What the rule produced.
    pub result: RuleResult,
}

/// Counts per result code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    /// Entries with [`ResultCode::Ok`].
    pub ok: usize,
    /// Entries with [`ResultCode::Skipped`].
    pub skipped: usize,
    /// Entries with [`ResultCode::Failed`].
    pub failed: usize,
}

impl ReportSummary {
    /// Summarize a list of results.
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a RuleResult>) -> Self {
        let mut summary = Self::default();
        for result in results {
            summary.record(result.code);
        }
        summary
    }

    /// Count one more result.
    pub fn record(&mut self, code: ResultCode) {
        match code {
            ResultCode::Ok => self.ok += 1,
            ResultCode::Skipped => self.skipped += 1,
            ResultCode::Failed => self.failed += 1,
        }
    }

    /// Total number of results.
    pub fn total(&self) -> usize {
        self.ok + self.skipped + self.failed
    }

    /// Most severe code seen, if any.
    pub fn worst(&self) -> Option<ResultCode> {
        if self.failed > 0 {
            Some(ResultCode::Failed)
        } else if self.skipped > 0 {
            Some(ResultCode::Skipped)
        } else if self.ok > 0 {
            Some(ResultCode::Ok)
        } else {
            None
        }
    }

    /// Returns `true` if nothing failed.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Collects entries in memory.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    entries: Mutex<Vec<ReportEntry>>,
}

impl MemoryReporter {
    /// Empty reporter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the entries so far, in arrival order.
    pub fn entries(&self) -> Vec<ReportEntry> {
        self.entries.lock().clone()
    }

    /// Remove and return all entries.
    pub fn take(&self) -> Vec<ReportEntry> {
        std::mem::take(&mut *self.entries.lock())
    }

    /// Counts per code.
    pub fn summary(&self) -> ReportSummary {
        ReportSummary::from_results(self.entries.lock().iter().map(|entry| &entry.result))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing has been reported.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Reporter for MemoryReporter {
    fn add(
        &self,
        _ctx: &ValidationContext,
        facts: &Facts,
        path: &Path,
        rule: &RuleRef,
        result: &RuleResult,
    ) {
        self.entries.lock().push(ReportEntry {
            rule_id: rule.id().clone(),
            path: path.clone(),
            facts: facts.clone(),
            result: result.clone(),
        });
    }
}

/// Logs every entry through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn add(
        &self,
        ctx: &ValidationContext,
        _facts: &Facts,
        path: &Path,
        rule: &RuleRef,
        result: &RuleResult,
    ) {
        let path = ctx.resolver().format(path);
        match result.code {
            ResultCode::Ok => tracing::debug!(rule = %rule.id(), %path, "rule passed"),
            ResultCode::Skipped => {
                tracing::debug!(rule = %rule.id(), %path, %result, "rule skipped");
            }
            ResultCode::Failed => tracing::warn!(rule = %rule.id(), %path, %result, "rule failed"),
        }
    }
}

/// Forwards every entry to each inner reporter, in order.
#[derive(Debug, Default)]
pub struct CompositeReporter {
    reporters: Vec<Arc<dyn Reporter>>,
}

impl CompositeReporter {
    /// No inner reporters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a reporter.
    #[must_use]
    pub fn with(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporters.push(reporter);
        self
    }
}

impl Reporter for CompositeReporter {
    fn add(
        &self,
        ctx: &ValidationContext,
        facts: &Facts,
        path: &Path,
        rule: &RuleRef,
        result: &RuleResult,
    ) {
        for reporter in &self.reporters {
            reporter.add(ctx, facts, path, rule, result);
        }
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

impl Reporter for NoopReporter {
    fn add(&self, _: &ValidationContext, _: &Facts, _: &Path, _: &RuleRef, _: &RuleResult) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::Reason;
    use crate::rule::SimpleRule;
    use pretty_assertions::assert_eq;

    fn rule(id: &str) -> RuleRef {
        SimpleRule::new(id, |_, _| Ok(RuleResult::ok().into())).into_ref()
    }

    #[test]
    fn memory_reporter_collects_and_summarizes() {
        let ctx = ValidationContext::detached();
        let reporter = MemoryReporter::new();
        let path: Path = "a/b".parse().unwrap();

        reporter.add(&ctx, &Facts::null(), &path, &rule("one"), &RuleResult::ok());
        reporter.add(
            &ctx,
            &Facts::null(),
            &path,
            &rule("two"),
            &RuleResult::failed(Reason::Message("bad".into())),
        );

        let entries = reporter.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].rule_id.as_str(), "two");
        assert_eq!(entries[1].path, path);
        assert_eq!(
            reporter.summary(),
            ReportSummary {
                ok: 1,
                skipped: 0,
                failed: 1,
            }
        );
        assert_eq!(reporter.take().len(), 2);
        assert!(reporter.is_empty());
    }

    #[test]
    fn composite_fans_out() {
        let ctx = ValidationContext::detached();
        let first = Arc::new(MemoryReporter::new());
        let second = Arc::new(MemoryReporter::new());
        let composite = CompositeReporter::new()
            .with(first.clone())
            .with(second.clone())
            .with(Arc::new(TracingReporter));

        composite.add(&ctx, &Facts::null(), &Path::empty(), &rule("r"), &RuleResult::ok());
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn summary_worst_code() {
        let mut summary = ReportSummary::default();
        assert_eq!(summary.worst(), None);
        summary.record(ResultCode::Ok);
        summary.record(ResultCode::Skipped);
        assert_eq!(summary.worst(), Some(ResultCode::Skipped));
        assert!(summary.is_success());
        summary.record(ResultCode::Failed);
        assert_eq!(summary.worst(), Some(ResultCode::Failed));
        assert_eq!(summary.total(), 3);
    }
}
