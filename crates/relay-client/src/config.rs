//! Subscriber configuration.
//!
//! Loaded in layers: compiled defaults, then an optional JSON file, then
//! `RELAY_CLIENT_*` environment variables (highest priority).

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized};
use serde::{Deserialize, Serialize};

/// Configuration for the relay subscriber.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// WebSocket URL of the broker.
    pub server_url: String,
    /// Directory the journal files are written into.
    pub output_dir: PathBuf,
    /// Seconds between keep-alive `PING` frames.
    pub ping_interval_secs: u64,
    /// Minimum seconds between opportunistic journal flushes.
    pub flush_interval_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://localhost:3002/ws".into(),
            output_dir: PathBuf::from("streaming_data"),
            ping_interval_secs: 30,
            flush_interval_secs: 3,
        }
    }
}

impl ClientConfig {
    /// Load configuration, optionally merging a JSON file over the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Json::file(path));
        }
        figment.merge(Env::prefixed("RELAY_CLIENT_")).extract()
    }

    /// Keep-alive period as a `Duration`.
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    /// Flush gate as a `Duration`.
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }
}
