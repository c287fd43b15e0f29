//! Event fan-out to connected subscribers.

use std::sync::Arc;

use relay_core::Event;
use tracing::{debug, warn};

use crate::registry::ConnectionRegistry;

/// Delivers each event to every registered subscriber.
///
/// The payload is serialized once and the same allocation is shared across
/// all recipients. A connection whose send fails is swept out of the
/// registry after the fan-out pass; delivery to the remaining members is
/// never interrupted, and nothing here is reported to the caller.
pub struct BroadcastEngine {
    registry: Arc<ConnectionRegistry>,
}

impl BroadcastEngine {
    /// Create an engine over the given registry.
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Fan an event out to all current subscribers.
    pub fn broadcast(&self, event: &Event) {
        if self.registry.is_empty() {
            debug!("no subscribers connected, skipping broadcast");
            return;
        }

        let frame = match serde_json::to_string(event) {
            Ok(json) => Arc::new(json),
            Err(e) => {
                warn!(event_type = event.event_type(), error = %e, "failed to serialize event");
                return;
            }
        };

        let snapshot = self.registry.snapshot();
        let mut failed = Vec::new();
        for connection in &snapshot {
            if !connection.send(Arc::clone(&frame)) {
                warn!(conn_id = %connection.id, "failed to deliver event, dropping connection");
                failed.push(connection.id.clone());
            }
        }

        for id in &failed {
            self.registry.remove(id);
        }

        debug!(
            event_type = event.event_type(),
            recipients = snapshot.len() - failed.len(),
            "broadcast event"
        );
    }
}
