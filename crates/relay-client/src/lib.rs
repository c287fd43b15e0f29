//! # relay-client
//!
//! The subscriber half of the relay: maintains one duplex connection to the
//! broker, keeps it alive with periodic `PING` frames, and journals every
//! event it sees into per-service JSON files.

#![deny(unsafe_code)]

pub mod config;
pub mod journal;
pub mod session;
