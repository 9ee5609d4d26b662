use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Broadcast publisher for lifecycle events read by notification and UI collaborators
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
}

/// Event that has been published
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedEvent {
    pub name: String,
    pub workflow_id: Uuid,
    pub context: Value,
    pub published_at: DateTime<Utc>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event with the given name and context.
    ///
    /// Returns the number of subscribers that received it. Zero subscribers is not
    /// an error; the event is dropped.
    pub fn publish(
        &self,
        event_name: impl Into<String>,
        workflow_id: Uuid,
        context: Value,
        published_at: DateTime<Utc>,
    ) -> usize {
        let event = PublishedEvent {
            name: event_name.into(),
            workflow_id,
            context,
            published_at,
        };

        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let publisher = EventPublisher::new(8);
        assert_eq!(publisher.subscriber_count(), 0);
        let delivered =
            publisher.publish("workflow.started", Uuid::new_v4(), json!({}), Utc::now());
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_subscribers_receive_events_in_order() {
        let publisher = EventPublisher::new(8);
        let mut rx = publisher.subscribe();
        let workflow_id = Uuid::new_v4();

        let delivered =
            publisher.publish("step.approved", workflow_id, json!({"step_order": 1}), Utc::now());
        assert_eq!(delivered, 1);
        publisher.publish("step.activated", workflow_id, json!({"step_order": 2}), Utc::now());

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.name, "step.approved");
        assert_eq!(second.name, "step.activated");
        assert_eq!(second.context["step_order"], 2);
    }
}
