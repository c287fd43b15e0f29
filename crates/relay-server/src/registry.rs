//! The set of live subscriber connections.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::connection::ClientConnection;

/// Mutable set of live connections, shared between the ingress handlers and
/// the per-connection tasks.
///
/// One coarse lock guards every operation; nothing blocks while holding it,
/// so contention stays negligible. Iteration happens over point-in-time
/// [`snapshot`](Self::snapshot)s, never over the live map.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<String, Arc<ClientConnection>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a connection, keyed by its ID.
    pub fn add(&self, connection: Arc<ClientConnection>) {
        self.connections
            .lock()
            .insert(connection.id.clone(), connection);
    }

    /// Remove a connection by ID. Removing an absent ID is a no-op.
    pub fn remove(&self, connection_id: &str) {
        self.connections.lock().remove(connection_id);
    }

    /// A point-in-time copy of the current members, in no particular order.
    pub fn snapshot(&self) -> Vec<Arc<ClientConnection>> {
        self.connections.lock().values().cloned().collect()
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    /// Whether no subscriber is connected.
    pub fn is_empty(&self) -> bool {
        self.connections.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn make_connection(id: &str) -> Arc<ClientConnection> {
        let (tx, _rx) = mpsc::channel(8);
        Arc::new(ClientConnection::new(id.into(), tx))
    }

    #[test]
    fn add_and_snapshot() {
        let registry = ConnectionRegistry::new();
        registry.add(make_connection("a"));
        registry.add(make_connection("b"));
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        let mut ids: Vec<_> = snapshot.iter().map(|c| c.id.clone()).collect();
        ids.sort();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn remove_is_idempotent() {
        let registry = ConnectionRegistry::new();
        registry.add(make_connection("a"));
        registry.remove("a");
        registry.remove("a");
        registry.remove("never_added");
        assert!(registry.is_empty());
    }

    #[test]
    fn add_same_id_replaces() {
        let registry = ConnectionRegistry::new();
        registry.add(make_connection("a"));
        registry.add(make_connection("a"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn snapshot_is_detached_from_later_mutation() {
        let registry = ConnectionRegistry::new();
        registry.add(make_connection("a"));
        let snapshot = registry.snapshot();
        registry.remove("a");
        assert_eq!(snapshot.len(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn concurrent_add_remove_stays_consistent() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut handles = Vec::new();
        for t in 0..4 {
            let registry = Arc::clone(&registry);
            handles.push(std::thread::spawn(move || {
                for i in 0..50 {
                    let id = format!("conn_{t}_{i}");
                    let (tx, _rx) = mpsc::channel(1);
                    registry.add(Arc::new(ClientConnection::new(id.clone(), tx)));
                    let _ = registry.snapshot();
                    registry.remove(&id);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(registry.is_empty());
    }
}
