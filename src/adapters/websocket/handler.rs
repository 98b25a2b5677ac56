//! WebSocket upgrade handler for chat connections.
//!
//! Handles the HTTP → WebSocket upgrade and manages the connection lifecycle:
//! 1. Open a session and send `connected` plus the welcome `reply`
//! 2. Run each client message as one turn, in arrival order
//! 3. Discard the session on close or transport error

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    Json,
};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;

use crate::application::TurnCoordinator;
use crate::domain::foundation::{ConnectionId, ErrorCode};

use super::messages::{ClientMessage, ServerMessage};

/// Outbound messages buffered per connection.
const OUTBOUND_BUFFER: usize = 32;

/// State required for WebSocket handling.
#[derive(Clone)]
pub struct WebSocketState {
    pub coordinator: Arc<TurnCoordinator>,
}

impl WebSocketState {
    pub fn new(coordinator: Arc<TurnCoordinator>) -> Self {
        Self { coordinator }
    }
}

/// Handle WebSocket upgrade requests.
///
/// Route: `GET /ws`
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<WebSocketState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Liveness probe.
///
/// Route: `GET /health`
pub async fn health(State(state): State<WebSocketState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "activeSessions": state.coordinator.active_sessions().await,
    }))
}

/// Handle an established WebSocket connection.
///
/// Turns are processed one at a time by the receive task, so a
/// connection never has two turns in flight for its session.
async fn handle_socket(socket: WebSocket, state: WebSocketState) {
    let (mut sender, mut receiver) = socket.split();

    let greeting = state.coordinator.connect().await;
    let connection_id = greeting.connection_id;

    for msg in [
        ServerMessage::connected(&greeting),
        ServerMessage::welcome(&greeting),
    ] {
        if let Err(e) = send_message(&mut sender, &msg).await {
            tracing::debug!(
                connection_id = %connection_id,
                "Failed to send greeting: {}",
                e
            );
            state.coordinator.disconnect(connection_id).await;
            return;
        }
    }

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<ServerMessage>(OUTBOUND_BUFFER);

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            if let Err(e) = send_message(&mut sender, &msg).await {
                tracing::debug!(
                    connection_id = %connection_id,
                    "Send error, closing connection: {}",
                    e
                );
                break;
            }
        }
    });

    let coordinator = state.coordinator.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            let response = match result {
                Ok(Message::Text(text)) => respond(&coordinator, connection_id, &text).await,
                Ok(Message::Binary(_)) => {
                    tracing::warn!(
                        connection_id = %connection_id,
                        "Received unsupported binary message"
                    );
                    ServerMessage::error(ErrorCode::InvalidMessage, "Binary frames are not supported")
                }
                // Protocol-level ping/pong is answered by axum
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
                Ok(Message::Close(_)) => {
                    tracing::debug!(connection_id = %connection_id, "Client sent close frame");
                    break;
                }
                Err(e) => {
                    tracing::debug!(connection_id = %connection_id, "Receive error: {}", e);
                    break;
                }
            };

            if outbound_tx.send(response).await.is_err() {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => {
            // Let queued replies flush; the channel closes with the receive task.
            let _ = (&mut send_task).await;
        }
    }

    state.coordinator.disconnect(connection_id).await;
}

/// Turns one client text frame into the server's answer.
pub(crate) async fn respond(
    coordinator: &TurnCoordinator,
    connection_id: ConnectionId,
    text: &str,
) -> ServerMessage {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(connection_id = %connection_id, "Unparseable client message: {}", e);
            return ServerMessage::error(
                ErrorCode::InvalidMessage,
                format!("Unrecognised message: {}", e),
            );
        }
    };

    match message {
        ClientMessage::Ping => ServerMessage::pong(),
        ClientMessage::Message { text } => {
            match coordinator.handle_message(connection_id, &text).await {
                Ok(reply) => ServerMessage::turn(reply),
                Err(err) => {
                    tracing::warn!(
                        connection_id = %connection_id,
                        code = %err.code(),
                        error = %err,
                        "Turn rejected"
                    );
                    ServerMessage::error(err.code(), err.to_string())
                }
            }
        }
    }
}

/// Send a JSON message over the WebSocket.
async fn send_message(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(msg).map_err(axum::Error::new)?;
    sender.send(Message::Text(json)).await
}

/// Create axum router for the chat endpoint and health probe.
///
/// # Example
///
/// ```ignore
/// let app = websocket_router().with_state(WebSocketState::new(coordinator));
/// ```
pub fn websocket_router() -> axum::Router<WebSocketState> {
    use axum::routing::get;

    axum::Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
}
