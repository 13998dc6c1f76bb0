use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events emitted by request mutations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    RequestCreated(Uuid),
    RequestUpdated(Uuid),
    RequestApproved(Uuid),
    RequestRejected(Uuid),
    RequestStatusChanged {
        request_id: Uuid,
        old_status: String,
        new_status: String,
    },
    RequestSent(Uuid),
    RequestDelivered(Uuid),
    RequestDeleted(Uuid),
}

impl Event {
    /// Maps a domain event onto the change-feed notice the cache layer
    /// consumes. Every mutation lands here one way or another; the exact
    /// flavor only matters for logging since invalidation is wholesale.
    pub fn change_event(&self) -> ChangeEvent {
        match self {
            Event::RequestCreated(id) => ChangeEvent::Inserted(*id),
            Event::RequestDeleted(id) => ChangeEvent::Deleted(*id),
            Event::RequestUpdated(id)
            | Event::RequestApproved(id)
            | Event::RequestRejected(id)
            | Event::RequestSent(id)
            | Event::RequestDelivered(id) => ChangeEvent::Updated(*id),
            Event::RequestStatusChanged { request_id, .. } => ChangeEvent::Updated(*request_id),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Change notice for the material_requests table, delivered to subscribers
/// at-least-once / best-effort. Subscribers that fall behind see a lag error
/// instead of the dropped notices and should treat it as an invalidation;
/// the polling fallback covers anything missed entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    Inserted(Uuid),
    Updated(Uuid),
    Deleted(Uuid),
}

impl ChangeEvent {
    pub fn record_id(&self) -> Uuid {
        match self {
            ChangeEvent::Inserted(id) | ChangeEvent::Updated(id) | ChangeEvent::Deleted(id) => *id,
        }
    }
}

/// Broadcast fan-out of change notices to any number of subscribers.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    /// Publishes a change notice. A send with no live subscribers is not an
    /// error; delivery is best-effort by contract.
    pub fn publish(&self, change: ChangeEvent) {
        let _ = self.tx.send(change);
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Processes incoming domain events: logs them and republishes each onto the
/// change feed that drives cache invalidation.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, feed: ChangeFeed) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::RequestStatusChanged {
                request_id,
                old_status,
                new_status,
            } => {
                info!(
                    request_id = %request_id,
                    from = %old_status,
                    to = %new_status,
                    "request status changed"
                );
            }
            other => {
                info!(event = ?other, "request event");
            }
        }

        feed.publish(event.change_event());
    }

    warn!("Event processing loop has ended");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_map_to_change_notices() {
        let id = Uuid::new_v4();
        assert_eq!(
            Event::RequestCreated(id).change_event(),
            ChangeEvent::Inserted(id)
        );
        assert_eq!(
            Event::RequestDeleted(id).change_event(),
            ChangeEvent::Deleted(id)
        );
        assert_eq!(
            Event::RequestApproved(id).change_event(),
            ChangeEvent::Updated(id)
        );
        assert_eq!(
            Event::RequestStatusChanged {
                request_id: id,
                old_status: "pending".into(),
                new_status: "approved".into(),
            }
            .change_event(),
            ChangeEvent::Updated(id)
        );
    }

    #[tokio::test]
    async fn processing_loop_republishes_onto_feed() {
        let (tx, rx) = mpsc::channel(8);
        let feed = ChangeFeed::new(8);
        let mut sub = feed.subscribe();
        let task = tokio::spawn(process_events(rx, feed));

        let id = Uuid::new_v4();
        let sender = EventSender::new(tx);
        sender.send(Event::RequestCreated(id)).await.unwrap();

        let change = sub.recv().await.unwrap();
        assert_eq!(change, ChangeEvent::Inserted(id));

        drop(sender);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_not_an_error() {
        let feed = ChangeFeed::new(4);
        feed.publish(ChangeEvent::Updated(Uuid::new_v4()));
    }
}
