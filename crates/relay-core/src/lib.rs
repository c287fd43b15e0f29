//! # relay-core
//!
//! Wire event model shared by the relay broker and subscriber.
//!
//! Events are complete JSON text frames. The known control kinds (`WELCOME`,
//! `PING`, `PONG`, `STREAMING_STARTED`) drive protocol behavior; everything
//! else is an opaque application payload passed through unmodified.

#![deny(unsafe_code)]

pub mod error;
pub mod event;

pub use error::EventError;
pub use event::{Event, Payload, parse_timestamp};
