//! Per-run memo of rule computations.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use serde::Serialize;
use verity_facts::Facts;
use verity_path::Path;

use crate::result::RuleResult;
use crate::rule::{RuleRef, rule_identity};

/// An in-flight or finished rule computation. Clones share one result.
pub(crate) type Pending = Shared<BoxFuture<'static, RuleResult>>;

/// Identifies one cached computation while it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct TaskId(u64);

struct Computation {
    task: TaskId,
    pending: Pending,
}

/// Facts identity plus the path they were reached by. Holding the facts
/// keeps the identity from being reused while the entry exists.
struct Location {
    facts: Facts,
    path: Path,
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.facts.ptr_eq(&other.facts) && self.path == other.path
    }
}

impl Eq for Location {}

impl Hash for Location {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.facts.identity().hash(state);
        self.path.hash(state);
    }
}

/// Rule keyed by instance, not by id.
struct RuleKey(RuleRef);

impl PartialEq for RuleKey {
    fn eq(&self, other: &Self) -> bool {
        rule_identity(&self.0) == rule_identity(&other.0)
    }
}

impl Eq for RuleKey {}

impl Hash for RuleKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        rule_identity(&self.0).hash(state);
    }
}

/// Counters for a [`ResultCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Distinct `(facts, path)` locations.
    pub locations: usize,
    /// Distinct `(location, rule)` computations.
    pub entries: usize,
    /// Lookups answered by an existing computation.
    pub hits: u64,
    /// Lookups that scheduled a new computation.
    pub misses: u64,
}

/// Location → rule → computation.
///
/// Lookups insert atomically, so racing callers for the same key schedule
/// exactly one computation and all await it. Entries live as long as the
/// cache; there is no eviction.
///
/// A computation that asks for another in-flight one is recorded as waiting
/// on it. A request whose wait would close a loop of computations waiting on
/// each other is refused instead of joined.
#[derive(Default)]
pub struct ResultCache {
    entries: DashMap<Location, DashMap<RuleKey, Computation>>,
    waits: Mutex<HashMap<TaskId, Vec<TaskId>>>,
    next_task: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResultCache {
    /// Empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The computation for `rule` at `(facts, path)`, scheduling it with
    /// `schedule` if this is the first request.
    ///
    /// `waiter` is the computation making the request. `None` if joining the
    /// in-flight computation would leave the two waiting on each other.
    pub(crate) fn get_or_schedule(
        &self,
        facts: &Facts,
        path: Path,
        rule: &RuleRef,
        waiter: Option<TaskId>,
        schedule: impl FnOnce(TaskId) -> BoxFuture<'static, RuleResult>,
    ) -> Option<Pending> {
        let location = Location {
            facts: facts.clone(),
            path,
        };
        let rules = self.entries.entry(location).or_insert_with(DashMap::new);
        match rules.entry(RuleKey(Arc::clone(rule))) {
            Entry::Occupied(entry) => {
                let computation = entry.get();
                if let Some(waiter) = waiter {
                    let running = computation.pending.peek().is_none();
                    if running && !self.wait_for(waiter, computation.task) {
                        tracing::debug!(rule = %rule.id(), "result cache hit would deadlock");
                        return None;
                    }
                }
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(rule = %rule.id(), "result cache hit");
                Some(computation.pending.clone())
            }
            Entry::Vacant(entry) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(rule = %rule.id(), "result cache miss; scheduling");
                let task = TaskId(self.next_task.fetch_add(1, Ordering::Relaxed));
                let pending = schedule(task).shared();
                entry.insert(Computation {
                    task,
                    pending: pending.clone(),
                });
                Some(pending)
            }
        }
    }

    /// Record `waiter` as waiting on `task`, unless `task` already waits on
    /// `waiter`, directly or through others.
    fn wait_for(&self, waiter: TaskId, task: TaskId) -> bool {
        let mut waits = self.waits.lock();
        let mut seen = HashSet::new();
        let mut next = vec![task];
        while let Some(current) = next.pop() {
            if current == waiter {
                return false;
            }
            if seen.insert(current) {
                next.extend(waits.get(&current).into_iter().flatten().copied());
            }
        }
        waits.entry(waiter).or_default().push(task);
        true
    }

    /// Guard that clears `task`'s waits when the computation ends.
    pub(crate) fn guard(self: &Arc<Self>, task: TaskId) -> TaskGuard {
        TaskGuard {
            cache: Arc::clone(self),
            task,
        }
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            locations: self.entries.len(),
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Number of cached computations.
    pub fn len(&self) -> usize {
        self.entries.iter().map(|rules| rules.len()).sum()
    }

    /// Returns `true` if nothing has been cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Held by a running computation; a finished one waits on nothing.
pub(crate) struct TaskGuard {
    cache: Arc<ResultCache>,
    task: TaskId,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.cache.waits.lock().remove(&self.task);
    }
}

impl fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCache").field("stats", &self.stats()).finish()
    }
}
