//! TurnCoordinator - Connection-scoped session ownership.
//!
//! Holds one [`Session`] per live connection, issues the welcome turn on
//! connect, runs each inbound message through the [`TransitionEngine`] and
//! hands persistence side effects to a [`SideEffectSink`] once the reply
//! is known. Persistence problems are logged and never reach the caller.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::domain::conversation::{
    Context, EngineError, Node, Session, TransitionEngine, TurnRole, WellKnownKey,
};
use crate::domain::foundation::{ConnectionId, ErrorCode, SessionId, ValidationError};
use crate::ports::{CustomerProfile, SideEffect, SideEffectSink};

/// Longest accepted inbound message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4000;

/// Welcome turn issued on connect.
#[derive(Debug, Clone, PartialEq)]
pub struct Greeting {
    pub connection_id: ConnectionId,
    pub session_id: SessionId,
    pub node_id: String,
    pub reply_text: String,
}

/// Result of one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReply {
    pub session_id: SessionId,
    pub node_id: String,
    pub reply_text: String,
    pub confidence: f64,
    /// True when the oracle failed and the fallback path produced the turn.
    pub degraded: bool,
}

/// Errors surfaced to the transport.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoordinatorError {
    #[error("No session for connection {0}")]
    SessionNotFound(ConnectionId),

    #[error("Invalid message: {0}")]
    InvalidMessage(#[from] ValidationError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl CoordinatorError {
    pub fn code(&self) -> ErrorCode {
        match self {
            CoordinatorError::SessionNotFound(_) => ErrorCode::SessionNotFound,
            CoordinatorError::InvalidMessage(_) => ErrorCode::InvalidMessage,
            CoordinatorError::Engine(EngineError::InvalidState { .. }) => ErrorCode::InvalidState,
        }
    }
}

/// Owns the connection to session mapping.
pub struct TurnCoordinator {
    engine: Arc<TransitionEngine>,
    sessions: RwLock<HashMap<ConnectionId, Session>>,
    side_effects: Arc<dyn SideEffectSink>,
}

impl TurnCoordinator {
    pub fn new(engine: Arc<TransitionEngine>, side_effects: Arc<dyn SideEffectSink>) -> Self {
        Self {
            engine,
            sessions: RwLock::new(HashMap::new()),
            side_effects,
        }
    }

    pub fn engine(&self) -> &TransitionEngine {
        &self.engine
    }

    /// Opens a session for a new connection and renders the welcome turn.
    ///
    /// The engine is not consulted and the welcome is not added to the
    /// session history.
    pub async fn connect(&self) -> Greeting {
        self.connect_as(ConnectionId::new()).await
    }

    /// Same as [`connect`](Self::connect) for a caller-chosen connection id.
    /// An existing session under that id is replaced.
    pub async fn connect_as(&self, connection_id: ConnectionId) -> Greeting {
        let session = self.engine.create_session();
        let reply_text = self.engine.welcome_text();
        let greeting = Greeting {
            connection_id,
            session_id: session.session_id,
            node_id: session.current_node_id.to_string(),
            reply_text,
        };

        self.sessions.write().await.insert(connection_id, session);

        tracing::info!(
            connection_id = %connection_id,
            session_id = %greeting.session_id,
            "Conversation opened"
        );

        self.submit(SideEffect::RecordTurn {
            session_id: greeting.session_id,
            role: TurnRole::Assistant,
            text: greeting.reply_text.clone(),
        });

        greeting
    }

    /// Runs one inbound message through the engine.
    ///
    /// # Errors
    ///
    /// - `SessionNotFound` if the connection has no session
    /// - `InvalidMessage` if the text is blank or too long
    /// - `Engine` if the session points at a node the graph lacks
    pub async fn handle_message(
        &self,
        connection_id: ConnectionId,
        text: &str,
    ) -> Result<TurnReply, CoordinatorError> {
        let utterance = validate_message(text)?;

        let session = self
            .sessions
            .read()
            .await
            .get(&connection_id)
            .cloned()
            .ok_or(CoordinatorError::SessionNotFound(connection_id))?;

        let outcome = self.engine.handle_turn(&session, utterance).await?;
        let next = outcome.session;

        {
            let mut sessions = self.sessions.write().await;
            match sessions.get_mut(&connection_id) {
                Some(slot) => *slot = next.clone(),
                None => {
                    tracing::info!(
                        connection_id = %connection_id,
                        session_id = %next.session_id,
                        "Connection closed during turn; session discarded"
                    );
                }
            }
        }

        self.submit(SideEffect::RecordTurn {
            session_id: next.session_id,
            role: TurnRole::User,
            text: utterance.to_string(),
        });
        self.submit(SideEffect::RecordTurn {
            session_id: next.session_id,
            role: TurnRole::Assistant,
            text: outcome.reply_text.clone(),
        });

        let landed = self.engine.graph().get(&next.current_node_id);
        if let Some(profile) =
            landed.and_then(|node| customer_update(&session.context, &next.context, node))
        {
            self.submit(SideEffect::UpsertCustomer {
                session_id: next.session_id,
                profile,
            });
        }

        Ok(TurnReply {
            session_id: next.session_id,
            node_id: next.current_node_id.to_string(),
            reply_text: outcome.reply_text,
            confidence: outcome.confidence,
            degraded: outcome.oracle_degraded.is_some(),
        })
    }

    /// Drops the connection's session.
    pub async fn disconnect(&self, connection_id: ConnectionId) -> Option<Session> {
        let removed = self.sessions.write().await.remove(&connection_id);
        if let Some(session) = &removed {
            tracing::info!(
                connection_id = %connection_id,
                session_id = %session.session_id,
                turns = session.user_turns(),
                "Conversation closed"
            );
        }
        removed
    }

    pub async fn session(&self, connection_id: ConnectionId) -> Option<Session> {
        self.sessions.read().await.get(&connection_id).cloned()
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }

    fn submit(&self, effect: SideEffect) {
        let session_id = effect.session_id();
        let kind = effect.kind();
        if let Err(err) = self.side_effects.submit(effect) {
            tracing::warn!(
                session_id = %session_id,
                effect = kind,
                error = %err,
                "Persistence side effect dropped"
            );
        }
    }
}

fn validate_message(text: &str) -> Result<&str, ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::empty_field("text"));
    }
    if trimmed.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ValidationError::invalid_format(
            "text",
            format!("longer than {} characters", MAX_MESSAGE_CHARS),
        ));
    }
    Ok(trimmed)
}

/// Profile to upsert after a turn, if any.
///
/// Required fields are name, email and whichever well-known fields the
/// landed node requires. An upsert is due when they are complete now and
/// were not before, or when the captured profile changed.
fn customer_update(before: &Context, after: &Context, landed: &Node) -> Option<CustomerProfile> {
    let mut required = vec![WellKnownKey::Name, WellKnownKey::Email];
    for key in landed.required_fields() {
        if let Some(known) = WellKnownKey::parse(key) {
            if !required.contains(&known) {
                required.push(known);
            }
        }
    }

    if !required.iter().all(|key| after.has_known(*key)) {
        return None;
    }

    let profile = CustomerProfile::from_context(after)?;
    let was_complete = required.iter().all(|key| before.has_known(*key));
    let changed = CustomerProfile::from_context(before).as_ref() != Some(&profile);

    (!was_complete || changed).then_some(profile)
}
