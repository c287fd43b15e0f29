//! Event parse errors.

use thiserror::Error;

/// Failure to turn a wire frame into an [`crate::Event`].
#[derive(Debug, Error)]
pub enum EventError {
    /// The frame was not valid JSON.
    #[error("invalid JSON frame: {0}")]
    Json(#[from] serde_json::Error),

    /// The frame parsed, but the top-level value was not an object.
    #[error("event frame must be a JSON object, got {found}")]
    NotAnObject {
        /// JSON type name of the rejected value.
        found: &'static str,
    },
}
