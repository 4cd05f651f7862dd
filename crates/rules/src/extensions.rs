//! Extension registries carried by a validation context.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use verity_path::PathResolver;

use crate::event::{EventPublisher, NoopPublisher};
use crate::executor::{RuleExecutor, SimpleRuleExecutor};
use crate::reporter::{NoopReporter, Reporter};
use crate::repository::{MemoryRuleRepository, RuleRepository};

type Erased = Arc<dyn Any + Send + Sync>;

/// Type-keyed map of shared values.
///
/// At most one value per type. Safe for concurrent use; insertion through
/// [`get_or_insert_with`](Extensions::get_or_insert_with) is atomic.
#[derive(Default)]
pub struct Extensions {
    map: DashMap<TypeId, Erased>,
}

impl Extensions {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value`, returning the previous value of the same type.
    pub fn insert<T: Any + Send + Sync>(&self, value: T) -> Option<Arc<T>> {
        self.map
            .insert(TypeId::of::<T>(), Arc::new(value))
            .and_then(|previous| previous.downcast::<T>().ok())
    }

    /// The value of type `T`, if any.
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let erased = Arc::clone(self.map.get(&TypeId::of::<T>())?.value());
        erased.downcast::<T>().ok()
    }

    /// The value of type `T`, created with `init` if missing.
    ///
    /// Racing callers all observe the same instance; `init` runs at most once.
    pub fn get_or_insert_with<T: Any + Send + Sync>(&self, init: impl FnOnce() -> T) -> Arc<T> {
        let erased = Arc::clone(
            self.map
                .entry(TypeId::of::<T>())
                .or_insert_with(|| -> Erased { Arc::new(init()) })
                .value(),
        );
        match erased.downcast::<T>() {
            Ok(value) => value,
            Err(_) => unreachable!("extension stored under a foreign TypeId"),
        }
    }

    /// Whether a value of type `T` is stored.
    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.map.contains_key(&TypeId::of::<T>())
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensions").field("len", &self.len()).finish()
    }
}

/// Collaborators shared by every copy of a validation context in one run.
pub struct SharedExtensions {
    reporter: Arc<dyn Reporter>,
    resolver: Arc<PathResolver>,
    executor: Arc<dyn RuleExecutor>,
    repository: Arc<dyn RuleRepository>,
    publisher: Arc<dyn EventPublisher>,
    extras: Extensions,
}

impl SharedExtensions {
    /// Start from the defaults: no-op reporter and publisher, default path
    /// resolver, [`SimpleRuleExecutor`] and an empty repository.
    #[must_use]
    pub fn builder() -> SharedExtensionsBuilder {
        SharedExtensionsBuilder::default()
    }

    /// Result sink.
    pub fn reporter(&self) -> &Arc<dyn Reporter> {
        &self.reporter
    }

    /// Path resolver.
    pub fn resolver(&self) -> &Arc<PathResolver> {
        &self.resolver
    }

    /// Rule executor.
    pub fn executor(&self) -> &Arc<dyn RuleExecutor> {
        &self.executor
    }

    /// Rule repository.
    pub fn repository(&self) -> &Arc<dyn RuleRepository> {
        &self.repository
    }

    /// Event publisher.
    pub fn publisher(&self) -> &Arc<dyn EventPublisher> {
        &self.publisher
    }

    /// Run-scoped values keyed by type, such as the result cache.
    pub fn extras(&self) -> &Extensions {
        &self.extras
    }
}

impl fmt::Debug for SharedExtensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedExtensions")
            .field("reporter", &self.reporter)
            .field("executor", &self.executor)
            .field("repository", &self.repository)
            .field("publisher", &self.publisher)
            .field("extras", &self.extras)
            .finish_non_exhaustive()
    }
}

/// Builder for [`SharedExtensions`].
#[derive(Default)]
pub struct SharedExtensionsBuilder {
    reporter: Option<Arc<dyn Reporter>>,
    resolver: Option<Arc<PathResolver>>,
    executor: Option<Arc<dyn RuleExecutor>>,
    repository: Option<Arc<dyn RuleRepository>>,
    publisher: Option<Arc<dyn EventPublisher>>,
}

impl SharedExtensionsBuilder {
    /// Set the reporter.
    #[must_use]
    pub fn reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Set the path resolver.
    #[must_use]
    pub fn resolver(mut self, resolver: Arc<PathResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Set the executor.
    #[must_use]
    pub fn executor(mut self, executor: Arc<dyn RuleExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Set the repository.
    #[must_use]
    pub fn repository(mut self, repository: Arc<dyn RuleRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Set the event publisher.
    #[must_use]
    pub fn publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Assemble, filling unset slots with defaults.
    pub fn build(self) -> Arc<SharedExtensions> {
        Arc::new(SharedExtensions {
            reporter: self.reporter.unwrap_or_else(|| Arc::new(NoopReporter)),
            resolver: self.resolver.unwrap_or_default(),
            executor: self
                .executor
                .unwrap_or_else(|| Arc::new(SimpleRuleExecutor::new())),
            repository: self
                .repository
                .unwrap_or_else(|| Arc::new(MemoryRuleRepository::new())),
            publisher: self.publisher.unwrap_or_else(|| Arc::new(NoopPublisher)),
            extras: Extensions::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[derive(Debug, PartialEq)]
    struct Marker(u32);

    #[test]
    fn insert_get_and_replace() {
        let ext = Extensions::new();
        assert!(ext.get::<Marker>().is_none());
        assert!(ext.insert(Marker(1)).is_none());
        assert_eq!(*ext.get::<Marker>().unwrap(), Marker(1));
        assert_eq!(*ext.insert(Marker(2)).unwrap(), Marker(1));
        assert!(ext.contains::<Marker>());
        assert_eq!(ext.len(), 1);
    }

    #[test]
    fn get_or_insert_with_initializes_once_under_contention() {
        let ext = Arc::new(Extensions::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ext = Arc::clone(&ext);
                let calls = Arc::clone(&calls);
                thread::spawn(move || {
                    ext.get_or_insert_with(|| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Marker(7)
                    })
                })
            })
            .collect();

        let values: Vec<Arc<Marker>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(values.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn builder_fills_defaults() {
        let shared = SharedExtensions::builder().build();
        assert!(shared.repository().rule_ids().is_empty());
        assert!(shared.extras().is_empty());
    }
}
