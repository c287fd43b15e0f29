//! Health check payload.

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Response body for `GET /health`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the process is serving.
    pub status: String,
    /// Seconds since the broker started.
    pub uptime_secs: u64,
    /// Number of live subscriber connections.
    pub connections: usize,
}

/// Build a health snapshot.
pub fn health_check(start_time: Instant, connections: usize) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
    }
}
