//! WebSocket bridge for out-of-process pages.
//!
//! Text frames carry the JSON message protocol in both directions.

use crate::state::WorkerState;
use crate::worker::submit_raw;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use cairn_core::{RawEnvelope, WorkerMessage};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

pub async fn ws_handler(
    State(state): State<WorkerState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: WorkerState, socket: WebSocket) {
    let (mut ws_sink, mut ws_stream) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<WorkerMessage>();
    let page = state.bus.register(tx.clone());
    tracing::info!(page, "Page connected over WebSocket");

    let write_task = async move {
        while let Some(message) = rx.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(page, error = %e, "Dropping unencodable message");
                    continue;
                }
            };
            if ws_sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    };

    let read_state = state.clone();
    let read_task = async move {
        while let Some(Ok(msg)) = ws_stream.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<RawEnvelope>(text.as_str()) {
                    Ok(raw) => submit_raw(&read_state, raw, &tx),
                    Err(e) => tracing::warn!(page, error = %e, "Ignoring undecodable message"),
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    };

    tokio::select! {
        _ = write_task => {},
        _ = read_task => {},
    }

    state.bus.unregister(page);
    tracing::info!(page, "Page disconnected");
}
