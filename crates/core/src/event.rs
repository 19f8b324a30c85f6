//! Domain event system — decoupled observation of the engine.
//!
//! Events are published when something interesting happens in the pipeline.
//! Subscribers (the CLI, tests) react without coupling to the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A message settled, was persisted, and joined the history
    MessageSettled {
        channel_id: String,
        message_id: String,
        sender_id: String,
        content_preview: String,
        loopback: bool,
        timestamp: DateTime<Utc>,
    },

    /// The trigger controller rolled for a settled message
    TriggerEvaluated {
        probability: f64,
        roll: f64,
        triggered: bool,
        timestamp: DateTime<Utc>,
    },

    /// A generation attempt was admitted and started
    GenerationStarted {
        attempt: u64,
        context_len: usize,
        timestamp: DateTime<Utc>,
    },

    /// A generation attempt finished
    GenerationCompleted {
        attempt: u64,
        success: bool,
        groups_delivered: usize,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed
    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Every endpoint failed to deliver a group
    DeliveryFailed {
        channel_id: String,
        attempted: usize,
        timestamp: DateTime<Utc>,
    },

    /// An error occurred
    ErrorOccurred {
        context: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::TriggerEvaluated {
            probability: 1.0,
            roll: 0.42,
            triggered: true,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::TriggerEvaluated { triggered, probability, .. } => {
                assert!(triggered);
                assert_eq!(*probability, 1.0);
            }
            _ => panic!("Expected TriggerEvaluated event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(DomainEvent::DeliveryFailed {
            channel_id: "c1".into(),
            attempted: 2,
            timestamp: Utc::now(),
        });
    }
}
