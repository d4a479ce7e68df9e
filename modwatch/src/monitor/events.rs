//! Events emitted around update checks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events published by the monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckEvent {
    /// A sweep finished. Emitted once per sweep.
    CheckCompleted {
        timestamp: DateTime<Utc>,
        interval_minutes: u32,
        /// Unique per sweep so listeners can drop duplicates.
        event_id: String,
    },
    /// The configured update interval changed.
    IntervalChanged { interval_minutes: u32 },
}

impl CheckEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::CheckCompleted { .. } => "update_check_completed",
            Self::IntervalChanged { .. } => "update_interval_changed",
        }
    }
}

/// Broadcaster for check events.
pub struct CheckEventBroadcaster {
    sender: broadcast::Sender<CheckEvent>,
}

impl CheckEventBroadcaster {
    /// Create a new broadcaster with default capacity (64).
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CheckEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. Returns the number of receivers it reached.
    pub fn publish(&self, event: CheckEvent) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(event)) => {
                tracing::debug!(event_type = event.event_type(), "No listeners for check event");
                0
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for CheckEventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for CheckEventBroadcaster {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}
