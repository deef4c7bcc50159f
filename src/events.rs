//! Broadcast publisher for batch progress events.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Event names emitted by the coordinator.
pub mod names {
    pub const BATCH_STARTED: &str = "batch.started";
    pub const BATCH_COMPLETED: &str = "batch.completed";
    pub const BATCH_STOPPED: &str = "batch.stopped";
    pub const BATCH_FAILED: &str = "batch.failed";
    pub const EID_STARTED: &str = "eid.started";
    pub const EID_COMPLETED: &str = "eid.completed";
    pub const EID_FAILED: &str = "eid.failed";
}

/// One progress event as observed by subscribers.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub name: String,
    pub batch_id: Uuid,
    pub eid: Option<String>,
    pub context: Value,
    pub published_at: DateTime<Utc>,
}

/// Fan-out publisher for progress events.
///
/// Backed by a broadcast channel; publishing with no subscribers is not an
/// error, the event is simply dropped.
#[derive(Debug, Clone)]
pub struct ProgressPublisher {
    sender: broadcast::Sender<ProgressEvent>,
}

impl ProgressPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(
        &self,
        name: impl Into<String>,
        batch_id: Uuid,
        eid: Option<&str>,
        context: Value,
    ) {
        let event = ProgressEvent {
            name: name.into(),
            batch_id,
            eid: eid.map(str::to_string),
            context,
            published_at: Utc::now(),
        };
        // send() only fails with no subscribers, which is fine here.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ProgressPublisher {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_subscriber_receives_published_event() {
        let publisher = ProgressPublisher::default();
        let mut rx = publisher.subscribe();
        let batch_id = Uuid::new_v4();

        publisher.publish(
            names::EID_COMPLETED,
            batch_id,
            Some("eid-1"),
            json!({"processed": 1}),
        );

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name, names::EID_COMPLETED);
        assert_eq!(event.batch_id, batch_id);
        assert_eq!(event.eid.as_deref(), Some("eid-1"));
        assert_eq!(event.context["processed"], 1);
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let publisher = ProgressPublisher::new(8);
        assert_eq!(publisher.subscriber_count(), 0);
        publisher.publish(names::BATCH_STARTED, Uuid::new_v4(), None, json!({}));
    }
}
