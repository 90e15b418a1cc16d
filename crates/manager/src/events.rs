//! Outbound lifecycle notifications
//!
//! Fire-and-forget: publishing never blocks and never waits for a reader.
//! Each subscriber gets its own unbounded queue, so nothing is dropped for a
//! subscriber that is still alive.

use concord_core::{CaseOutcome, ConflictCase};
use concord_resolver::ConflictResolution;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// A conflict case with the resolver's result type
pub type Case = ConflictCase<ConflictResolution>;

/// Notification published by the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    ConflictDetected {
        case: Box<Case>,
    },
    ConflictResolved {
        case: Box<Case>,
        resolution: ConflictResolution,
    },
    OutcomeRecorded {
        case: Box<Case>,
        outcome: CaseOutcome,
    },
}

impl EngineEvent {
    pub fn case(&self) -> &Case {
        match self {
            Self::ConflictDetected { case }
            | Self::ConflictResolved { case, .. }
            | Self::OutcomeRecorded { case, .. } => case,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConflictDetected { .. } => "conflict_detected",
            Self::ConflictResolved { .. } => "conflict_resolved",
            Self::OutcomeRecorded { .. } => "outcome_recorded",
        }
    }
}

/// Fan-out of events to every live subscriber
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: DashMap<u64, UnboundedSender<EngineEvent>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber
    pub fn subscribe(&self) -> UnboundedReceiver<EngineEvent> {
        let (tx, rx) = unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.insert(id, tx);
        rx
    }

    /// Deliver an event to every subscriber, pruning ones whose receiver is gone
    pub fn publish(&self, event: EngineEvent) {
        self.subscribers
            .retain(|_, tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
