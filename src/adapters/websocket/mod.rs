//! WebSocket transport for chat connections.
//!
//! # Components
//!
//! - [`messages`] - WebSocket message protocol types
//! - [`handler`] - Axum WebSocket upgrade handler and router

pub mod handler;
pub mod messages;

pub use handler::{health, websocket_router, ws_handler, WebSocketState};
pub use messages::{
    ClientMessage, ConnectedMessage, ErrorMessage, PongMessage, ReplyMessage, ServerMessage,
};
