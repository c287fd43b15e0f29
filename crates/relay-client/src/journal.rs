//! Journaling engine: buffers events into per-service streams and flushes
//! each stream to disk as a whole-file JSON array.
//!
//! A `STREAMING_STARTED` control event names a service, wipes that service's
//! buffer, and makes it the "current" stream; subsequent untagged events
//! append to the current stream. Flushing is opportunistic: it piggybacks on
//! ingest instead of running on a wall-clock timer.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use relay_core::Event;
use thiserror::Error;
use tracing::{info, warn};

/// Fallback stream name when no service can be determined.
pub const DEFAULT_SERVICE: &str = "unknown";

/// Default minimum time between opportunistic flushes.
pub const FLUSH_INTERVAL: Duration = Duration::from_secs(3);

/// Journal failures.
#[derive(Debug, Error)]
pub enum JournalError {
    /// Could not create the output directory or write a stream file.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Could not serialize a stream buffer.
    #[error("failed to serialize journal stream: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One named stream of buffered events.
#[derive(Debug, Default)]
struct StreamBuffer {
    events: Vec<Event>,
}

/// Per-subscriber journaling engine.
///
/// Only ever driven from the session's receive loop, so it needs no internal
/// locking.
pub struct Journal {
    output_dir: PathBuf,
    streams: HashMap<String, StreamBuffer>,
    current: Option<String>,
    flush_interval: Duration,
    last_flush: Instant,
}

impl Journal {
    /// Create a journal writing into `output_dir` (created if missing).
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self, JournalError> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir)?;
        Ok(Self {
            output_dir,
            streams: HashMap::new(),
            current: None,
            flush_interval: FLUSH_INTERVAL,
            last_flush: Instant::now(),
        })
    }

    /// Override the flush gate.
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// The stream untagged events currently append to, if any.
    pub fn current_service(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Number of buffered events for a service.
    pub fn buffered(&self, service: &str) -> usize {
        self.streams.get(service).map_or(0, |s| s.events.len())
    }

    /// Route one event into its stream.
    ///
    /// `PONG` frames are keep-alive noise and are never journaled. A
    /// `STREAMING_STARTED` event replaces its service's buffer with itself
    /// and becomes the current stream. Everything else appends to the
    /// current stream, or — when none is set — to the stream named by the
    /// event's own `service` field (sentinel fallback), without changing
    /// which stream is current.
    pub fn ingest(&mut self, event: Event) {
        match &event {
            Event::Pong(_) => {}
            Event::StreamingStarted(_) => {
                let service = event.service().unwrap_or(DEFAULT_SERVICE).to_owned();
                info!(service, "stream started, resetting journal buffer");
                let buffer = self.streams.entry(service.clone()).or_default();
                buffer.events.clear();
                buffer.events.push(event);
                self.current = Some(service);
            }
            _ => {
                let service = match &self.current {
                    Some(current) => current.clone(),
                    None => event.service().unwrap_or(DEFAULT_SERVICE).to_owned(),
                };
                self.streams.entry(service).or_default().events.push(event);
            }
        }
    }

    /// Flush if the gate interval has elapsed since the last attempt.
    ///
    /// Called from the receive loop after each ingest; the clock resets on
    /// every attempt whether or not any stream wrote cleanly.
    pub fn maybe_flush(&mut self) {
        if self.last_flush.elapsed() >= self.flush_interval {
            self.flush_all();
            self.last_flush = Instant::now();
        }
    }

    /// Write every non-empty stream to `<output_dir>/<service>.json`.
    ///
    /// Each file is rewritten whole, with the buffer stable-sorted by
    /// embedded timestamp (events without a parseable timestamp keep their
    /// ingest order at the end). A failure on one stream is logged and does
    /// not stop the others.
    pub fn flush_all(&mut self) {
        for (service, buffer) in &mut self.streams {
            if buffer.events.is_empty() {
                continue;
            }
            sort_by_timestamp(&mut buffer.events);
            let path = self.output_dir.join(format!("{service}.json"));
            match write_stream(&path, &buffer.events) {
                Ok(()) => {
                    info!(service, records = buffer.events.len(), path = %path.display(), "journal flushed");
                }
                Err(e) => {
                    warn!(service, error = %e, path = %path.display(), "failed to write journal file");
                }
            }
        }
    }
}

/// Stable sort by embedded timestamp; unparseable or missing timestamps
/// compare equal and land after every valid one.
fn sort_by_timestamp(events: &mut [Event]) {
    events.sort_by(|a, b| match (a.timestamp(), b.timestamp()) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

fn write_stream(path: &Path, events: &[Event]) -> Result<(), JournalError> {
    let json = serde_json::to_vec_pretty(events)?;
    std::fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn event(raw: &str) -> Event {
        Event::parse(raw).unwrap()
    }

    fn journal(dir: &Path) -> Journal {
        // Zero gate so tests can flush deterministically.
        Journal::new(dir)
            .unwrap()
            .with_flush_interval(Duration::ZERO)
    }

    fn read_stream(dir: &Path, service: &str) -> Vec<Value> {
        let raw = std::fs::read_to_string(dir.join(format!("{service}.json"))).unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    #[test]
    fn flush_with_no_streams_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut journal = journal(dir.path());
        journal.flush_all();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn events_sorted_by_timestamp_on_flush() {
        let dir = tempfile::tempdir().unwrap();
        let mut journal = journal(dir.path());
        journal.ingest(event(r#"{"type":"STREAMING_STARTED","service":"s"}"#));
        journal.ingest(event(r#"{"type":"DATA","n":3,"timestamp":"2025-01-01T00:00:03Z"}"#));
        journal.ingest(event(r#"{"type":"DATA","n":1,"timestamp":"2025-01-01T00:00:01Z"}"#));
        journal.ingest(event(r#"{"type":"DATA","n":2,"timestamp":"2025-01-01T00:00:02Z"}"#));
        journal.flush_all();

        let records = read_stream(dir.path(), "s");
        let ns: Vec<_> = records
            .iter()
            .filter_map(|r| r.get("n").and_then(Value::as_i64))
            .collect();
        assert_eq!(ns, [1, 2, 3]);
    }

    #[test]
    fn missing_timestamps_sort_last_preserving_ingest_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut journal = journal(dir.path());
        journal.ingest(event(r#"{"type":"STREAMING_STARTED","service":"s","timestamp":"2025-01-01T00:00:00Z"}"#));
        journal.ingest(event(r#"{"type":"DATA","n":"no_ts_1"}"#));
        journal.ingest(event(r#"{"type":"DATA","n":"bad_ts","timestamp":"not a time"}"#));
        journal.ingest(event(r#"{"type":"DATA","n":"timed","timestamp":"2025-01-01T00:00:05Z"}"#));
        journal.ingest(event(r#"{"type":"DATA","n":"no_ts_2"}"#));
        journal.flush_all();

        let records = read_stream(dir.path(), "s");
        let ns: Vec<_> = records
            .iter()
            .skip(2) // STREAMING_STARTED, then "timed"
            .filter_map(|r| r.get("n").and_then(Value::as_str))
            .collect();
        assert_eq!(records[1]["n"], "timed");
        assert_eq!(ns, ["no_ts_1", "bad_ts", "no_ts_2"]);
    }

    #[test]
    fn streaming_started_truncates_prior_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let mut journal = journal(dir.path());
        journal.ingest(event(r#"{"type":"STREAMING_STARTED","service":"alpha"}"#));
        journal.ingest(event(r#"{"type":"DATA","n":"old"}"#));
        journal.ingest(event(r#"{"type":"STREAMING_STARTED","service":"alpha","segment":2}"#));
        journal.ingest(event(r#"{"type":"DATA","n":"new"}"#));
        journal.flush_all();

        let records = read_stream(dir.path(), "alpha");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["segment"], 2);
        assert_eq!(records[1]["n"], "new");
    }

    #[test]
    fn untagged_event_before_any_stream_uses_own_service() {
        let dir = tempfile::tempdir().unwrap();
        let mut journal = journal(dir.path());
        journal.ingest(event(r#"{"type":"DATA","service":"solo","n":1}"#));
        assert_eq!(journal.current_service(), None);
        journal.flush_all();

        let records = read_stream(dir.path(), "solo");
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn untagged_event_without_service_uses_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let mut journal = journal(dir.path());
        journal.ingest(event(r#"{"type":"DATA","n":1}"#));
        journal.flush_all();

        let records = read_stream(dir.path(), DEFAULT_SERVICE);
        assert_eq!(records.len(), 1);
        // Self-routed events never set the current stream
        assert_eq!(journal.current_service(), None);
    }

    #[test]
    fn streaming_started_without_service_uses_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let mut journal = journal(dir.path());
        journal.ingest(event(r#"{"type":"STREAMING_STARTED"}"#));
        assert_eq!(journal.current_service(), Some(DEFAULT_SERVICE));
    }

    #[test]
    fn events_follow_the_current_stream() {
        let dir = tempfile::tempdir().unwrap();
        let mut journal = journal(dir.path());
        journal.ingest(event(r#"{"type":"STREAMING_STARTED","service":"a"}"#));
        // Tagged with another service, but the current stream wins
        journal.ingest(event(r#"{"type":"DATA","service":"b","n":1}"#));
        assert_eq!(journal.buffered("a"), 2);
        assert_eq!(journal.buffered("b"), 0);
    }

    #[test]
    fn pong_is_never_journaled() {
        let dir = tempfile::tempdir().unwrap();
        let mut journal = journal(dir.path());
        journal.ingest(event(r#"{"type":"PONG"}"#));
        journal.ingest(event(r#"{"type":"STREAMING_STARTED","service":"s"}"#));
        journal.ingest(event(r#"{"type":"PONG"}"#));
        journal.ingest(event(r#"{"type":"DATA","n":1}"#));
        journal.ingest(event(r#"{"type":"PONG"}"#));
        journal.flush_all();

        let records = read_stream(dir.path(), "s");
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r["type"] != "PONG"));
    }

    #[test]
    fn end_to_end_two_event_stream() {
        let dir = tempfile::tempdir().unwrap();
        let mut journal = journal(dir.path());
        journal.ingest(event(
            r#"{"type":"STREAMING_STARTED","service":"beta","timestamp":"2025-01-01T00:00:00Z"}"#,
        ));
        journal.ingest(event(r#"{"type":"DATA","timestamp":"2025-01-01T00:00:01Z"}"#));
        journal.flush_all();

        let records = read_stream(dir.path(), "beta");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["type"], "STREAMING_STARTED");
        assert_eq!(records[1]["type"], "DATA");
    }

    #[test]
    fn files_are_rewritten_whole_not_appended() {
        let dir = tempfile::tempdir().unwrap();
        let mut journal = journal(dir.path());
        journal.ingest(event(r#"{"type":"STREAMING_STARTED","service":"s"}"#));
        journal.ingest(event(r#"{"type":"DATA","n":1}"#));
        journal.flush_all();
        assert_eq!(read_stream(dir.path(), "s").len(), 2);

        journal.ingest(event(r#"{"type":"DATA","n":2}"#));
        journal.flush_all();
        // 3 events total, not 2 + 3 concatenated
        assert_eq!(read_stream(dir.path(), "s").len(), 3);
    }

    #[test]
    fn maybe_flush_respects_the_gate() {
        let dir = tempfile::tempdir().unwrap();
        let mut journal = Journal::new(dir.path())
            .unwrap()
            .with_flush_interval(Duration::from_secs(3600));
        journal.ingest(event(r#"{"type":"STREAMING_STARTED","service":"s"}"#));
        journal.maybe_flush();
        // Gate not elapsed: nothing on disk yet
        assert!(!dir.path().join("s.json").exists());

        let mut journal = journal.with_flush_interval(Duration::ZERO);
        journal.maybe_flush();
        assert!(dir.path().join("s.json").exists());
    }

    #[test]
    fn write_failure_on_one_stream_does_not_block_others() {
        let dir = tempfile::tempdir().unwrap();
        let mut journal = journal(dir.path());
        // A service whose file path is occupied by a directory cannot be written
        std::fs::create_dir(dir.path().join("blocked.json")).unwrap();
        journal.ingest(event(r#"{"type":"DATA","service":"blocked","n":1}"#));
        journal.ingest(event(r#"{"type":"DATA","service":"fine","n":1}"#));
        journal.flush_all();

        assert_eq!(read_stream(dir.path(), "fine").len(), 1);
    }

    #[test]
    fn output_directory_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/streaming_data");
        let _journal = Journal::new(&nested).unwrap();
        assert!(nested.is_dir());
    }
}
