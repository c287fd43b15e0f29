//! Subscriber session — one duplex WebSocket connection to the broker.
//!
//! A session connects, then runs three cooperating pieces: a writer task
//! that owns the sink (so keep-alive and any future outbound traffic never
//! interleave mid-frame), a keep-alive task that queues a `PING` every
//! interval, and the receive loop that feeds the journal. The journal gets
//! one final forced flush when the session ends, however it ends.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use relay_core::Event;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::journal::{Journal, JournalError};

/// Outbound queue depth between the keep-alive task and the writer.
const OUTBOUND_QUEUE: usize = 64;

/// Where the session is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Dial in progress.
    Connecting,
    /// Handshake done, receive loop running.
    Connected,
    /// Shutdown observed, draining.
    Closing,
    /// Terminal. The journal has been flushed.
    Closed,
}

/// Session failures.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The WebSocket connect or handshake failed.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The journal could not be set up.
    #[error(transparent)]
    Journal(#[from] JournalError),
}

/// A single subscriber connection and its journal.
pub struct SubscriberSession {
    config: ClientConfig,
    journal: Journal,
    state: SessionState,
    cancel: CancellationToken,
}

impl SubscriberSession {
    /// Build a session; creates the journal output directory eagerly so a
    /// bad path fails before we dial.
    pub fn new(config: ClientConfig, cancel: CancellationToken) -> Result<Self, SessionError> {
        let journal =
            Journal::new(&config.output_dir)?.with_flush_interval(config.flush_interval());
        Ok(Self {
            config,
            journal,
            state: SessionState::Connecting,
            cancel,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Connect and run until the server closes, the stream errors, or the
    /// cancellation token fires. Always leaves the journal flushed.
    pub async fn run(&mut self) -> Result<(), SessionError> {
        info!(url = %self.config.server_url, "connecting to broker");
        let (ws, _) = connect_async(self.config.server_url.as_str()).await?;
        self.state = SessionState::Connected;
        info!("connected");

        let (mut ws_tx, mut ws_rx) = ws.split();

        // Single writer owns the sink; everything outbound goes through it.
        let (out_tx, mut out_rx) = mpsc::channel::<Message>(OUTBOUND_QUEUE);
        let writer: JoinHandle<()> = tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                if ws_tx.send(msg).await.is_err() {
                    break;
                }
            }
        });

        let keep_alive = spawn_keep_alive(out_tx.clone(), self.config.ping_interval());

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    self.state = SessionState::Closing;
                    info!("shutdown requested, closing session");
                    let _ = out_tx.send(Message::Close(None)).await;
                    break;
                }
                msg = ws_rx.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            ingest_text(&mut self.journal, text.as_str());
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            self.state = SessionState::Closing;
                            info!("server closed the connection");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            self.state = SessionState::Closing;
                            warn!(error = %e, "websocket stream error");
                            break;
                        }
                    }
                }
            }
        }

        keep_alive.abort();
        drop(out_tx);
        let _ = writer.await;

        self.journal.flush_all();
        self.state = SessionState::Closed;
        info!("session closed, journal flushed");
        Ok(())
    }
}

/// Queue a keep-alive `PING` right away and then every `interval`.
///
/// If a ping cannot be queued the task ends; the session itself keeps
/// running and learns about a dead connection from its own read side.
fn spawn_keep_alive(out_tx: mpsc::Sender<Message>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let ping = match serde_json::to_string(&Event::ping()) {
                Ok(json) => json,
                Err(e) => {
                    warn!(error = %e, "failed to serialize ping");
                    break;
                }
            };
            if out_tx.send(Message::Text(ping.into())).await.is_err() {
                debug!("outbound queue closed, stopping keep-alive");
                break;
            }
        }
    })
}

/// Parse one inbound text frame and hand it to the journal. Malformed
/// frames are logged and dropped; they never end the session.
fn ingest_text(journal: &mut Journal, text: &str) {
    match Event::parse(text) {
        Ok(event) => {
            match &event {
                Event::Welcome(payload) => {
                    let message = payload
                        .get("message")
                        .and_then(serde_json::Value::as_str)
                        .unwrap_or_default();
                    info!(message, "welcome from broker");
                }
                Event::Pong(_) => debug!("pong received"),
                _ => debug!(event_type = event.event_type(), "event received"),
            }
            journal.ingest(event);
            journal.maybe_flush();
        }
        Err(e) => {
            warn!(error = %e, "discarding malformed frame");
        }
    }
}
