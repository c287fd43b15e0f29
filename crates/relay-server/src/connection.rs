//! Live subscriber connection state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use relay_core::Event;
use tokio::sync::mpsc;

/// One connected subscriber.
///
/// Owned by the registry for its whole life; the socket itself lives in the
/// per-connection task, which drains `tx`'s receiving end onto the wire.
pub struct ClientConnection {
    /// Unique connection ID (registry key).
    pub id: String,
    /// Outbound queue to the connection's writer task.
    tx: mpsc::Sender<Arc<String>>,
    /// When this connection was established.
    pub connected_at: Instant,
}

impl ClientConnection {
    /// Create a new connection around an outbound queue.
    pub fn new(id: String, tx: mpsc::Sender<Arc<String>>) -> Self {
        Self {
            id,
            tx,
            connected_at: Instant::now(),
        }
    }

    /// Enqueue a pre-serialized frame for this subscriber.
    ///
    /// Returns `false` if the queue is full or the writer task is gone.
    pub fn send(&self, frame: Arc<String>) -> bool {
        self.tx.try_send(frame).is_ok()
    }

    /// Serialize an event and enqueue it.
    pub fn send_event(&self, event: &Event) -> bool {
        match serde_json::to_string(event) {
            Ok(json) => self.send(Arc::new(json)),
            Err(_) => false,
        }
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
