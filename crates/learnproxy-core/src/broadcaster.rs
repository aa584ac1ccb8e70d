//! Live Broadcaster: fan-out of consolidated transaction events to
//! subscribed observers over the admin WebSocket surface.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// A slow subscriber is disconnected once its queue would exceed this many
/// buffered messages.
pub const SUBSCRIBER_QUEUE_CAPACITY: usize = 32;

/// One consolidated transaction, broadcast after its Behavior Store update
/// has committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionEvent {
    pub endpoint_key: String,
    pub method: String,
    pub status: u16,
    pub latency_ms: u64,
    pub mocked: bool,
    pub chaos: bool,
    pub health_score: f64,
}

/// Fan-out channel for [`TransactionEvent`]s. Cloning shares the same
/// underlying channel, so the Consolidator and every admin WebSocket
/// connection hold a handle to the same broadcaster.
#[derive(Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<TransactionEvent>,
}

impl Broadcaster {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(SUBSCRIBER_QUEUE_CAPACITY);
        Self { tx }
    }

    /// Subscribe a new observer; each subscriber gets its own bounded
    /// receive queue backed by the channel's ring buffer.
    pub fn subscribe(&self) -> broadcast::Receiver<TransactionEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Best-effort: if there are no subscribers this is a
    /// no-op, and a subscriber that has fallen behind by more than
    /// [`SUBSCRIBER_QUEUE_CAPACITY`] messages will observe a `Lagged` error
    /// on its next receive and should treat that as a disconnect.
    pub fn publish(&self, event: TransactionEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> TransactionEvent {
        TransactionEvent {
            endpoint_key: "/users/{id}".to_string(),
            method: "GET".to_string(),
            status: 200,
            latency_ms: 10,
            mocked: false,
            chaos: false,
            health_score: 100.0,
        }
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let broadcaster = Broadcaster::new();
        let mut rx = broadcaster.subscribe();
        broadcaster.publish(event());
        let received = rx.recv().await.unwrap();
        assert_eq!(received.endpoint_key, "/users/{id}");
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_error() {
        let broadcaster = Broadcaster::new();
        broadcaster.publish(event());
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn slow_subscriber_observes_lagged_instead_of_blocking_publisher() {
        let broadcaster = Broadcaster::new();
        let mut rx = broadcaster.subscribe();
        for _ in 0..(SUBSCRIBER_QUEUE_CAPACITY + 10) {
            broadcaster.publish(event());
        }
        match rx.recv().await {
            Err(broadcast::error::RecvError::Lagged(_)) => {}
            other => panic!("expected Lagged, got {other:?}"),
        }
    }
}
