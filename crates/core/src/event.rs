//! Loop events, published as an audit trail for each run.
//!
//! Events are published as the loop makes progress. Subscribers (audit
//! logs, metrics exporters) react without coupling to the controller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::tool::ToolClass;

/// All loop events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LoopEvent {
    /// A model turn was received
    TurnCompleted {
        run_id: String,
        turn: u32,
        invocations: usize,
        tokens_used: u32,
        timestamp: DateTime<Utc>,
    },

    /// An exploration tool was executed
    ToolDispatched {
        run_id: String,
        tool_name: String,
        class: ToolClass,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A recommendation was accepted and handed to the store
    RecommendationLogged {
        run_id: String,
        tool_name: String,
        decision_id: Option<String>,
        count: usize,
        timestamp: DateTime<Utc>,
    },

    /// A recommendation was refused because the cap was reached
    RecommendationSkipped {
        run_id: String,
        tool_name: String,
        timestamp: DateTime<Utc>,
    },

    /// The loop reached a terminal state
    LoopFinished {
        run_id: String,
        stop_reason: String,
        turns: u32,
        recommendations: usize,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for loop events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<LoopEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: LoopEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<LoopEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
