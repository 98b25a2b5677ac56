//! Per-conversation session state.
//!
//! A session is a value: the transition engine receives one and returns a
//! new one, never mutating its input.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{SessionId, Timestamp};

use super::context::Context;
use super::node::NodeId;

/// Who produced a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    /// Label used when rendering history as text.
    pub fn label(&self) -> &'static str {
        match self {
            TurnRole::User => "User",
            TurnRole::Assistant => "AI",
        }
    }
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One role-tagged entry in the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: TurnRole,
    pub text: String,
    pub recorded_at: Timestamp,
}

impl HistoryEntry {
    pub fn new(role: TurnRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            recorded_at: Timestamp::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(TurnRole::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(TurnRole::Assistant, text)
    }
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.role, self.text)
    }
}

/// The full state of one ongoing conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub current_node_id: NodeId,
    pub context: Context,
    pub conversation_history: Vec<HistoryEntry>,
    pub created_at: Timestamp,
}

impl Session {
    /// Starts a session at `start` with empty context and history.
    pub fn start(start: NodeId) -> Self {
        Self {
            session_id: SessionId::new(),
            current_node_id: start,
            context: Context::new(),
            conversation_history: Vec::new(),
            created_at: Timestamp::now(),
        }
    }

    /// Returns a copy with the given node, context and history; every other
    /// field is carried over.
    pub fn advanced(
        &self,
        current_node_id: NodeId,
        context: Context,
        conversation_history: Vec<HistoryEntry>,
    ) -> Self {
        Self {
            current_node_id,
            context,
            conversation_history,
            ..self.clone()
        }
    }

    /// History rendered as `"Role: text"` lines.
    pub fn transcript(&self) -> Vec<String> {
        self.conversation_history
            .iter()
            .map(|entry| entry.to_string())
            .collect()
    }

    /// Number of user turns taken so far.
    pub fn user_turns(&self) -> usize {
        self.conversation_history
            .iter()
            .filter(|e| e.role == TurnRole::User)
            .count()
    }
}
