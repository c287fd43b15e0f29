//! WebSocket gateway — handles a single subscriber from upgrade through
//! disconnect.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use relay_core::Event;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::connection::ClientConnection;
use crate::server::AppState;

/// Text of the one-time greeting frame.
pub const WELCOME_MESSAGE: &str = "Connected to bridge server";

/// `GET /ws` — upgrade and run the subscriber connection.
///
/// The session future is tracked by the shutdown coordinator so graceful
/// shutdown can wait for it to drain.
pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let shutdown = Arc::clone(&state.shutdown);
    ws.on_upgrade(move |socket| shutdown.track(run_subscriber(socket, state)))
}

/// Drive one subscriber connection.
///
/// 1. Register with the connection registry
/// 2. Send the `WELCOME` frame; a failure here discards the client outright
/// 3. Pump the outbound queue onto the socket from a writer task
/// 4. Answer inbound `PING` frames with `PONG`, ignore invalid JSON
/// 5. Deregister on close, read error, or writer failure
async fn run_subscriber(socket: WebSocket, state: AppState) {
    let conn_id = format!("conn_{}", Uuid::now_v7());
    let (mut ws_tx, mut ws_rx) = socket.split();

    info!(conn_id, "subscriber connected");

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(state.config.outbound_queue);
    let connection = Arc::new(ClientConnection::new(conn_id.clone(), send_tx));
    state.registry.add(Arc::clone(&connection));

    // The welcome frame is always the first thing on the wire; if it cannot
    // be delivered the connection is discarded on the spot.
    let welcome = match serde_json::to_string(&Event::welcome(WELCOME_MESSAGE)) {
        Ok(json) => json,
        Err(e) => {
            warn!(conn_id, error = %e, "failed to serialize welcome frame");
            state.registry.remove(&conn_id);
            return;
        }
    };
    if ws_tx.send(Message::Text(welcome.into())).await.is_err() {
        warn!(conn_id, "failed to send welcome frame, discarding connection");
        state.registry.remove(&conn_id);
        return;
    }

    // Writer task owns the sink: broadcast frames and PONG replies all go
    // through the same queue, so writes never interleave.
    let writer = tokio::spawn(async move {
        while let Some(frame) = send_rx.recv().await {
            if ws_tx
                .send(Message::Text(frame.as_str().into()))
                .await
                .is_err()
            {
                break;
            }
        }
    });

    let cancel = state.shutdown.token();
    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                let Some(Ok(msg)) = msg else {
                    info!(conn_id, "subscriber read ended");
                    break;
                };
                match msg {
                    Message::Text(text) => handle_frame(text.as_str(), &connection, &conn_id),
                    Message::Close(_) => {
                        info!(conn_id, "subscriber sent close frame");
                        break;
                    }
                    Message::Binary(data) => {
                        debug!(conn_id, len = data.len(), "ignoring binary frame");
                    }
                    Message::Ping(_) | Message::Pong(_) => {}
                }
            }
            () = cancel.cancelled() => {
                info!(conn_id, "server shutting down, closing subscriber");
                break;
            }
        }
    }

    info!(conn_id, age_secs = connection.age().as_secs(), "subscriber disconnected");
    writer.abort();
    state.registry.remove(&conn_id);
}

/// Handle one inbound text frame from a subscriber.
fn handle_frame(text: &str, connection: &ClientConnection, conn_id: &str) {
    match Event::parse(text) {
        Ok(Event::Ping(_)) => {
            debug!(conn_id, "received PING");
            if !connection.send_event(&Event::pong()) {
                warn!(conn_id, "failed to enqueue PONG reply");
            }
        }
        Ok(event) => {
            debug!(conn_id, event_type = event.event_type(), "received message from subscriber");
        }
        Err(e) => {
            warn!(conn_id, error = %e, "invalid JSON message from subscriber");
        }
    }
}
