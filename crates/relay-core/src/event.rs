//! The wire event: a tagged view over an arbitrarily-shaped JSON object.
//!
//! Every variant keeps the full ordered payload map, so an event can be
//! re-serialized (for fan-out or journaling) exactly as it was received.

use chrono::{DateTime, FixedOffset};
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use serde_json::{Map, Value, json};

use crate::error::EventError;

/// An event payload: the JSON object exactly as received, field order kept.
pub type Payload = Map<String, Value>;

/// Type string reported for events that carry no `type` field.
pub const UNKNOWN_TYPE: &str = "UNKNOWN";

/// A single relay event.
///
/// The control kinds are the ones the broker and subscriber act on; anything
/// else lands in [`Event::Opaque`] and is passed through unmodified.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// `{"type":"WELCOME", ...}` — broker greeting, sent once per connection.
    Welcome(Payload),
    /// `{"type":"PING"}` — subscriber keep-alive.
    Ping(Payload),
    /// `{"type":"PONG"}` — broker keep-alive reply.
    Pong(Payload),
    /// `{"type":"STREAMING_STARTED", ...}` — switches the journal's current stream.
    StreamingStarted(Payload),
    /// Any other application event.
    Opaque(Payload),
}

impl Event {
    /// Parse a complete JSON text frame.
    pub fn parse(text: &str) -> Result<Self, EventError> {
        Self::from_value(serde_json::from_str(text)?)
    }

    /// Classify an already-parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self, EventError> {
        match value {
            Value::Object(payload) => Ok(Self::from_payload(payload)),
            other => Err(EventError::NotAnObject {
                found: json_type_name(&other),
            }),
        }
    }

    fn from_payload(payload: Payload) -> Self {
        let kind = payload
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN_TYPE)
            .to_owned();
        match kind.as_str() {
            "WELCOME" => Self::Welcome(payload),
            "PING" => Self::Ping(payload),
            "PONG" => Self::Pong(payload),
            "STREAMING_STARTED" => Self::StreamingStarted(payload),
            _ => Self::Opaque(payload),
        }
    }

    /// Build a `WELCOME` frame.
    pub fn welcome(message: &str) -> Self {
        Self::from_payload(object(json!({ "type": "WELCOME", "message": message })))
    }

    /// Build a `PING` frame.
    pub fn ping() -> Self {
        Self::from_payload(object(json!({ "type": "PING" })))
    }

    /// Build a `PONG` frame.
    pub fn pong() -> Self {
        Self::from_payload(object(json!({ "type": "PONG" })))
    }

    /// The underlying payload map.
    pub fn payload(&self) -> &Payload {
        match self {
            Self::Welcome(p)
            | Self::Ping(p)
            | Self::Pong(p)
            | Self::StreamingStarted(p)
            | Self::Opaque(p) => p,
        }
    }

    /// Consume the event, yielding the payload map.
    pub fn into_payload(self) -> Payload {
        match self {
            Self::Welcome(p)
            | Self::Ping(p)
            | Self::Pong(p)
            | Self::StreamingStarted(p)
            | Self::Opaque(p) => p,
        }
    }

    /// The `type` discriminator, or [`UNKNOWN_TYPE`] when absent.
    pub fn event_type(&self) -> &str {
        self.payload()
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN_TYPE)
    }

    /// The `service` tag, when present and a string.
    pub fn service(&self) -> Option<&str> {
        self.payload().get("service").and_then(Value::as_str)
    }

    /// The embedded `timestamp`, parsed as an ISO-8601 instant.
    ///
    /// Returns `None` when the field is missing, not a string, or does not
    /// parse.
    pub fn timestamp(&self) -> Option<DateTime<FixedOffset>> {
        self.payload()
            .get("timestamp")
            .and_then(Value::as_str)
            .and_then(parse_timestamp)
    }

    /// The payload as a `serde_json::Value`.
    pub fn to_value(&self) -> Value {
        Value::Object(self.payload().clone())
    }
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.payload().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let payload = Payload::deserialize(deserializer)?;
        Ok(Self::from_payload(payload))
    }
}

/// Parse an ISO-8601 timestamp, accepting a trailing literal `Z`.
///
/// A trailing `Z` is rewritten to `+00:00` before parsing so offsets are
/// always explicit.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let normalized = raw.strip_suffix('Z').map(|head| format!("{head}+00:00"));
    DateTime::parse_from_rfc3339(normalized.as_deref().unwrap_or(raw)).ok()
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn object(value: Value) -> Payload {
    match value {
        Value::Object(payload) => payload,
        // json! with an object literal always yields an object
        _ => Payload::new(),
    }
}
