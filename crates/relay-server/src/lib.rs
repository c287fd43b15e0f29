//! # relay-server
//!
//! The broker half of the relay: producers post JSON events over HTTP and
//! every connected WebSocket subscriber receives them.
//!
//! - HTTP ingress: `POST /stream` deserializes one JSON object and hands it
//!   to the broadcast engine
//! - WebSocket gateway: `GET /ws` upgrade, welcome frame, `PING`/`PONG`
//! - Fan-out: serialize once, deliver to a registry snapshot, drop failed
//!   connections
//! - Graceful shutdown via `tokio::signal` + `CancellationToken`

#![deny(unsafe_code)]

pub mod broadcast;
pub mod config;
pub mod connection;
pub mod health;
pub mod registry;
pub mod server;
pub mod shutdown;
pub mod ws;
