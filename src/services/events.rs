//! Refinement events published to observers.
//!
//! The controller never reaches into a UI; presentation layers subscribe to
//! this stream and render whatever they need from it.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::domain::models::{LoopPhase, ScoreTier};

/// Something observable that happened in a refinement session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RefinementEvent {
    IntentLocked {
        content_id: String,
    },
    AnalysisCommitted {
        content_id: String,
        score: u32,
        tier: ScoreTier,
        iteration: u32,
        delta: Option<i64>,
        phase: LoopPhase,
    },
    FixApplied {
        content_id: String,
        insight_id: String,
        section: String,
    },
    FixSkipped {
        content_id: String,
        insight_id: String,
        reason: String,
    },
    ScoreEstimated {
        content_id: String,
        score: u32,
        ready_for_production: bool,
    },
    SessionReset {
        content_id: String,
        baseline_kept: bool,
    },
    OperationRejected {
        content_id: String,
        kind: String,
        message: String,
    },
}

/// Configuration for the event channel.
#[derive(Debug, Clone)]
pub struct EventChannelConfig {
    /// Capacity of the broadcast channel.
    pub channel_capacity: usize,
}

impl Default for EventChannelConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
        }
    }
}

/// Broadcast channel for [`RefinementEvent`]s.
#[derive(Debug, Clone)]
pub struct EventChannel {
    sender: broadcast::Sender<RefinementEvent>,
}

impl EventChannel {
    pub fn new(config: EventChannelConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity.max(1));
        Self { sender }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: RefinementEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<RefinementEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventChannel {
    fn default() -> Self {
        Self::new(EventChannelConfig::default())
    }
}
