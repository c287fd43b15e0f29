//! Broker configuration.
//!
//! Loaded in layers: compiled defaults, then an optional JSON file, then
//! `RELAY_SERVER_*` environment variables (highest priority).

use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized};
use serde::{Deserialize, Serialize};

/// Configuration for the relay broker.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `3002`).
    pub port: u16,
    /// Per-connection outbound queue capacity.
    pub outbound_queue: usize,
    /// How long to wait for tasks during graceful shutdown, in seconds.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3002,
            outbound_queue: 256,
            shutdown_timeout_secs: 10,
        }
    }
}

impl ServerConfig {
    /// Load configuration, optionally merging a JSON file over the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Json::file(path));
        }
        figment.merge(Env::prefixed("RELAY_SERVER_")).extract()
    }
}
