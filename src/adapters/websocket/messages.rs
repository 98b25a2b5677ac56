//! WebSocket message types for the chat protocol.
//!
//! Defines the protocol between server and connected clients:
//! - Server → Client: Connection status, assistant replies, errors, pongs
//! - Client → Server: User messages, pings

use serde::{Deserialize, Serialize};

use crate::application::{Greeting, TurnReply};
use crate::domain::foundation::{ErrorCode, Timestamp};

// ============================================
// Server → Client Messages
// ============================================

/// All message types that can be sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection established and session opened.
    Connected(ConnectedMessage),

    /// Assistant turn, including the welcome.
    Reply(ReplyMessage),

    /// Error occurred.
    Error(ErrorMessage),

    /// Heartbeat response.
    Pong(PongMessage),
}

/// Sent once when the client connects.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedMessage {
    pub connection_id: String,
    pub session_id: String,
    pub timestamp: String,
}

/// An assistant reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyMessage {
    pub text: String,
    pub node_id: String,
    pub timestamp: String,
}

/// Error message sent to client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorMessage {
    pub code: String,
    pub message: String,
    pub timestamp: String,
}

/// Heartbeat response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PongMessage {
    pub timestamp: String,
}

impl ServerMessage {
    pub fn connected(greeting: &Greeting) -> Self {
        ServerMessage::Connected(ConnectedMessage {
            connection_id: greeting.connection_id.to_string(),
            session_id: greeting.session_id.to_string(),
            timestamp: Timestamp::now().to_rfc3339(),
        })
    }

    pub fn welcome(greeting: &Greeting) -> Self {
        Self::reply(greeting.reply_text.clone(), greeting.node_id.clone())
    }

    pub fn turn(reply: TurnReply) -> Self {
        Self::reply(reply.reply_text, reply.node_id)
    }

    fn reply(text: String, node_id: String) -> Self {
        ServerMessage::Reply(ReplyMessage {
            text,
            node_id,
            timestamp: Timestamp::now().to_rfc3339(),
        })
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error(ErrorMessage {
            code: code.to_string(),
            message: message.into(),
            timestamp: Timestamp::now().to_rfc3339(),
        })
    }

    pub fn pong() -> Self {
        ServerMessage::Pong(PongMessage {
            timestamp: Timestamp::now().to_rfc3339(),
        })
    }
}

// ============================================
// Client → Server Messages
// ============================================

/// All message types that can be received from client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// A user utterance.
    Message { text: String },

    /// Heartbeat request.
    Ping,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_message_serializes_with_type_tag() {
        let msg = ServerMessage::Connected(ConnectedMessage {
            connection_id: "conn-456".to_string(),
            session_id: "session-123".to_string(),
            timestamp: "2025-01-10T00:00:00Z".to_string(),
        });

        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"connected""#));
        assert!(json.contains(r#""sessionId":"session-123""#));
        assert!(json.contains(r#""connectionId":"conn-456""#));
    }

    #[test]
    fn reply_serializes_node_id_in_camel_case() {
        let msg = ServerMessage::reply("Hi there".to_string(), "welcome".to_string());

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "reply");
        assert_eq!(json["text"], "Hi there");
        assert_eq!(json["nodeId"], "welcome");
    }

    #[test]
    fn client_message_deserializes_user_message() {
        let json = r#"{"type": "message", "text": "I'm Alex"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Message {
                text: "I'm Alex".to_string()
            }
        );
    }

    #[test]
    fn client_message_deserializes_ping() {
        let json = r#"{"type": "ping"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, ClientMessage::Ping));
    }

    #[test]
    fn client_message_rejects_unknown_type() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type": "subscribe"}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type": "message"}"#).is_err());
    }

    #[test]
    fn error_message_uses_error_code_spelling() {
        let msg = ServerMessage::error(ErrorCode::InvalidState, "Unknown node");

        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"error""#));
        assert!(json.contains(r#""code":"INVALID_STATE""#));
    }
}
