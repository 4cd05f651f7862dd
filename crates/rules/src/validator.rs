//! Top-level entry point.

use std::fmt;
use std::sync::Arc;

use tokio::runtime::{Handle, Runtime};
use verity_facts::Facts;
use verity_path::{Path, PathResolver};

use crate::config::{EngineConfig, ExecutionMode};
use crate::context::ValidationContext;
use crate::error::EngineError;
use crate::event::{EventPublisher, NoopPublisher};
use crate::executor::{
    CacheStats, ConcurrentRuleExecutor, ResultCache, RuleExecutor, Selected, SimpleRuleExecutor,
};
use crate::extensions::SharedExtensions;
use crate::reporter::{CompositeReporter, MemoryReporter, ReportEntry, ReportSummary, Reporter};
use crate::repository::RuleRepository;
use crate::result::{ResultCode, RuleResult};
use crate::rule::RuleId;
use crate::selector::RuleSelector;

/// One selected rule's outcome at one location.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    /// Rule that ran.
    pub rule_id: RuleId,
    /// Location it ran at; empty for the root.
    pub path: Path,
    /// Its result.
    pub result: RuleResult,
}

/// Everything one validation run produced.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    /// Results of the top-level selected rules, in request order.
    pub results: Vec<Verdict>,
    /// Every rule execution, sub-rules included, in arrival order.
    pub entries: Vec<ReportEntry>,
    /// Counts over `entries`.
    pub summary: ReportSummary,
    /// Memoization counters, in concurrent mode with caching on.
    pub cache: Option<CacheStats>,
}

impl ValidationReport {
    /// Most severe code among the top-level results; `None` if nothing ran.
    pub fn worst(&self) -> Option<ResultCode> {
        self.results.iter().map(|verdict| verdict.result.code).max()
    }

    /// Returns `true` if no top-level rule failed.
    pub fn is_success(&self) -> bool {
        self.worst() != Some(ResultCode::Failed)
    }
}

/// Owns a rule repository and an execution setup, and runs validations.
///
/// ```
/// use serde_json::json;
/// use verity_facts::Facts;
/// use verity_rules::{AllRules, MemoryRuleRepository, RuleResult, SimpleRule, Validator};
///
/// let mut repository = MemoryRuleRepository::new();
/// repository
///     .add(SimpleRule::new("has-name", |_ctx, facts| {
///         let named = facts.to_json().get("name").is_some();
///         Ok(if named { RuleResult::ok() } else { RuleResult::fail_with("no name") }.into())
///     }))
///     .unwrap();
///
/// let validator = Validator::builder(repository).build().unwrap();
/// let report = validator
///     .validate(&Facts::from_json(json!({"name": "Ada"})), &AllRules)
///     .unwrap();
/// assert!(report.is_success());
/// assert_eq!(report.summary.ok, 1);
/// ```
pub struct Validator {
    repository: Arc<dyn RuleRepository>,
    config: EngineConfig,
    resolver: Arc<PathResolver>,
    executor: Arc<dyn RuleExecutor>,
    reporter: Option<Arc<dyn Reporter>>,
    publisher: Arc<dyn EventPublisher>,
    // Kept alive for the executor's handle; dropped last.
    _runtime: Option<Runtime>,
}

impl Validator {
    /// Start configuring a validator over `repository`.
    pub fn builder(repository: impl RuleRepository + 'static) -> ValidatorBuilder {
        ValidatorBuilder::new(Arc::new(repository))
    }

    /// The active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The path resolver built from the configuration.
    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Run the rules `selector` picks against `facts`.
    pub fn validate(
        &self,
        facts: &Facts,
        selector: &dyn RuleSelector,
    ) -> Result<ValidationReport, EngineError> {
        let span = tracing::info_span!("validation", mode = ?self.config.mode);
        let _entered = span.enter();

        let (mut ctx, memory) = self.context();
        let selected = match self.config.mode {
            ExecutionMode::Sequential => {
                self.executor.validate_selected(&mut ctx, selector, facts)?
            }
            ExecutionMode::Concurrent => {
                let pending = self.executor.validate_selected_async(&ctx, selector, facts)?;
                futures::executor::block_on(pending)
            }
        };
        let results = verdicts(&Path::empty(), selected);
        Ok(self.report(&ctx, &memory, results))
    }

    /// Run the rules `selector` picks against the value at `path` within
    /// `facts`, or against every match when `path` is a pattern.
    pub fn validate_at(
        &self,
        facts: &Facts,
        path: &str,
        selector: &dyn RuleSelector,
    ) -> Result<ValidationReport, EngineError> {
        let span = tracing::info_span!("validation", mode = ?self.config.mode, %path);
        let _entered = span.enter();

        let target = self.resolver.parse(path)?;
        let paths = if target.is_pattern() {
            self.resolver.resolve_pattern(facts, &target)
        } else {
            vec![target]
        };

        let (mut ctx, memory) = self.context();
        let mut results = Vec::new();
        match self.config.mode {
            ExecutionMode::Sequential => {
                for path in &paths {
                    let selected = self
                        .executor
                        .validate_selected_for_path(&mut ctx, selector, facts, path)?;
                    results.extend(verdicts(path, selected));
                }
            }
            ExecutionMode::Concurrent => {
                let pending = self
                    .executor
                    .validate_selected_for_paths_async(&ctx, selector, facts, &paths)?;
                for (path, selected) in futures::executor::block_on(pending) {
                    results.extend(verdicts(&path, selected));
                }
            }
        }
        Ok(self.report(&ctx, &memory, results))
    }

    fn context(&self) -> (ValidationContext, Arc<MemoryReporter>) {
        let memory = Arc::new(MemoryReporter::new());
        let reporter: Arc<dyn Reporter> = match &self.reporter {
            Some(external) => Arc::new(
                CompositeReporter::new()
                    .with(Arc::clone(&memory) as Arc<dyn Reporter>)
                    .with(Arc::clone(external)),
            ),
            None => Arc::clone(&memory) as Arc<dyn Reporter>,
        };
        let shared = SharedExtensions::builder()
            .reporter(reporter)
            .resolver(Arc::clone(&self.resolver))
            .executor(Arc::clone(&self.executor))
            .repository(Arc::clone(&self.repository))
            .publisher(Arc::clone(&self.publisher))
            .build();
        (ValidationContext::new(shared), memory)
    }

    fn report(
        &self,
        ctx: &ValidationContext,
        memory: &MemoryReporter,
        results: Vec<Verdict>,
    ) -> ValidationReport {
        let entries = memory.take();
        let summary = ReportSummary::from_results(entries.iter().map(|entry| &entry.result));
        let cache = ctx.shared().extras().get::<ResultCache>().map(|cache| cache.stats());
        tracing::info!(
            rules = results.len(),
            ok = summary.ok,
            skipped = summary.skipped,
            failed = summary.failed,
            "validation finished"
        );
        ValidationReport {
            results,
            entries,
            summary,
            cache,
        }
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("repository", &self.repository)
            .field("config", &self.config)
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

fn verdicts(path: &Path, selected: Selected) -> Vec<Verdict> {
    selected
        .into_iter()
        .map(|(rule_id, result)| Verdict {
            rule_id,
            path: path.clone(),
            result,
        })
        .collect()
}

/// Builder for [`Validator`].
pub struct ValidatorBuilder {
    repository: Arc<dyn RuleRepository>,
    config: EngineConfig,
    reporter: Option<Arc<dyn Reporter>>,
    publisher: Option<Arc<dyn EventPublisher>>,
    handle: Option<Handle>,
}

impl ValidatorBuilder {
    /// Builder over a shared repository.
    pub fn new(repository: Arc<dyn RuleRepository>) -> Self {
        Self {
            repository,
            config: EngineConfig::default(),
            reporter: None,
            publisher: None,
            handle: None,
        }
    }

    /// Replace the configuration.
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Also send every entry to `reporter`.
    #[must_use]
    pub fn reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Publish rule events to `publisher`.
    #[must_use]
    pub fn publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Schedule concurrent work on an existing runtime instead of starting one.
    #[must_use]
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Validate the configuration and assemble the validator.
    ///
    /// In concurrent mode without a [`runtime`](Self::runtime), a dedicated
    /// multi-threaded runtime is started and owned by the validator. Such a
    /// validator must be dropped outside async code.
    pub fn build(self) -> Result<Validator, EngineError> {
        let config = self.config;
        config.validate()?;

        let resolver = PathResolver::builder()
            .syntax(config.path.clone())
            .missing_key(config.missing_key)
            .build()?;

        let (executor, runtime): (Arc<dyn RuleExecutor>, Option<Runtime>) = match config.mode {
            ExecutionMode::Sequential => (
                Arc::new(SimpleRuleExecutor::new().with_skipped_policy(config.skipped)),
                None,
            ),
            ExecutionMode::Concurrent => {
                let (handle, runtime) = match self.handle {
                    Some(handle) => (handle, None),
                    None => {
                        let runtime = start_runtime(&config)?;
                        (runtime.handle().clone(), Some(runtime))
                    }
                };
                let executor = ConcurrentRuleExecutor::new(handle)
                    .with_caching(config.caching)
                    .with_skipped_policy(config.skipped);
                (Arc::new(executor), runtime)
            }
        };

        tracing::debug!(mode = ?config.mode, caching = config.caching, "validator built");
        Ok(Validator {
            repository: self.repository,
            config,
            resolver: Arc::new(resolver),
            executor,
            reporter: self.reporter,
            publisher: self.publisher.unwrap_or_else(|| Arc::new(NoopPublisher)),
            _runtime: runtime,
        })
    }
}

fn start_runtime(config: &EngineConfig) -> Result<Runtime, EngineError> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder
        .thread_name("verity-worker")
        .max_blocking_threads(config.max_blocking_threads);
    if let Some(threads) = config.worker_threads {
        builder.worker_threads(threads);
    }
    builder
        .build()
        .map_err(|e| EngineError::Runtime(e.to_string()))
}

impl fmt::Debug for ValidatorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
