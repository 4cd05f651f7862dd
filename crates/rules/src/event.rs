//! Rule lifecycle notifications.

use std::fmt;
use std::time::Duration;

use tokio::sync::broadcast;
use verity_facts::Facts;
use verity_path::Path;

use crate::result::RuleResult;
use crate::rule::RuleId;

/// Emitted around every rule execution.
#[derive(Debug, Clone)]
pub enum RuleEvent {
    /// The rule passed cycle detection and is about to be gated and run.
    Started {
        /// Rule about to run.
        rule_id: RuleId,
        /// Path stack at entry, outermost first.
        paths: Vec<Path>,
        /// Facts the rule will see.
        facts: Facts,
    },
    /// The rule produced a result, including cycle rejections.
    Finished {
        /// Rule that ran.
        rule_id: RuleId,
        /// Current path at exit.
        path: Path,
        /// The result.
        result: RuleResult,
        /// Time since the executor picked the rule up.
        elapsed: Duration,
    },
}

impl RuleEvent {
    /// Rule the event is about.
    pub fn rule_id(&self) -> &RuleId {
        match self {
            Self::Started { rule_id, .. } | Self::Finished { rule_id, .. } => rule_id,
        }
    }
}

/// Fire-and-forget sink for [`RuleEvent`]s.
pub trait EventPublisher: Send + Sync + fmt::Debug {
    /// Deliver `event`. Must not block the engine.
    fn publish(&self, source: &str, event: &RuleEvent);
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

impl EventPublisher for NoopPublisher {
    fn publish(&self, _source: &str, _event: &RuleEvent) {}
}

/// A [`RuleEvent`] tagged with the executor that produced it.
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    /// Executor kind, e.g. `"simple"` or `"concurrent"`.
    pub source: String,
    /// The event.
    pub event: RuleEvent,
}

/// Broadcasts events to any number of subscribers.
///
/// When the channel is full the oldest events are dropped; lagging or
/// absent subscribers never hold the engine up.
#[derive(Debug)]
pub struct BroadcastPublisher {
    sender: broadcast::Sender<PublishedEvent>,
}

impl BroadcastPublisher {
    /// Publisher with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Receive events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl EventPublisher for BroadcastPublisher {
    fn publish(&self, source: &str, event: &RuleEvent) {
        // No receivers is not an error.
        let _ = self.sender.send(PublishedEvent {
            source: source.to_owned(),
            event: event.clone(),
        });
    }
}
