//! Persistence Ports - Recording turns, customers and lead events.
//!
//! Persistence is best-effort from the conversation's point of view: a
//! turn never waits on, or fails because of, a storage call. The
//! coordinator and handlers hand [`SideEffect`]s to a [`SideEffectSink`],
//! and a background worker applies them through a [`ConversationRecorder`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::domain::conversation::{Context, TurnRole, WellKnownKey};
use crate::domain::foundation::{SessionId, Timestamp};

/// Errors raised by persistence collaborators.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PersistenceError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("side-effect queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("side-effect queue closed")]
    QueueClosed,
}

impl PersistenceError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

/// Customer fields captured during a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerProfile {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_choice: Option<String>,
}

impl CustomerProfile {
    /// Builds a profile when context holds at least a name and an email.
    pub fn from_context(context: &Context) -> Option<Self> {
        let name = context.get_known(WellKnownKey::Name)?;
        let email = context.get_known(WellKnownKey::Email)?;
        if name.is_blank() || email.is_blank() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            email: email.to_string(),
            product_choice: context
                .get_known(WellKnownKey::ProductChoice)
                .filter(|v| !v.is_blank())
                .map(|v| v.to_string()),
        })
    }
}

/// A named lead event such as `demo_requested`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadEvent {
    pub session_id: SessionId,
    pub name: String,
    pub data: JsonValue,
    pub metadata: JsonValue,
    pub occurred_at: Timestamp,
}

impl LeadEvent {
    pub fn new(session_id: SessionId, name: impl Into<String>, data: JsonValue) -> Self {
        Self {
            session_id,
            name: name.into(),
            data,
            metadata: JsonValue::Object(Default::default()),
            occurred_at: Timestamp::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: JsonValue) -> Self {
        self.metadata = metadata;
        self
    }
}

/// One unit of deferred persistence work.
#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    RecordTurn {
        session_id: SessionId,
        role: TurnRole,
        text: String,
    },
    UpsertCustomer {
        session_id: SessionId,
        profile: CustomerProfile,
    },
    RecordEvent(LeadEvent),
}

impl SideEffect {
    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SideEffect::RecordTurn { .. } => "record_turn",
            SideEffect::UpsertCustomer { .. } => "upsert_customer",
            SideEffect::RecordEvent(_) => "record_event",
        }
    }

    pub fn session_id(&self) -> SessionId {
        match self {
            SideEffect::RecordTurn { session_id, .. }
            | SideEffect::UpsertCustomer { session_id, .. } => *session_id,
            SideEffect::RecordEvent(event) => event.session_id,
        }
    }
}

/// Port for durable conversation records.
#[async_trait]
pub trait ConversationRecorder: Send + Sync {
    /// Appends one history entry.
    async fn record_turn(
        &self,
        session_id: SessionId,
        role: TurnRole,
        text: &str,
    ) -> Result<(), PersistenceError>;

    /// Inserts or updates the customer captured by a session.
    async fn upsert_customer(
        &self,
        session_id: SessionId,
        profile: &CustomerProfile,
    ) -> Result<(), PersistenceError>;

    /// Records a named lead event.
    async fn record_event(&self, event: &LeadEvent) -> Result<(), PersistenceError>;

    /// Applies a deferred side effect.
    async fn apply(&self, effect: &SideEffect) -> Result<(), PersistenceError> {
        match effect {
            SideEffect::RecordTurn {
                session_id,
                role,
                text,
            } => self.record_turn(*session_id, *role, text).await,
            SideEffect::UpsertCustomer {
                session_id,
                profile,
            } => self.upsert_customer(*session_id, profile).await,
            SideEffect::RecordEvent(event) => self.record_event(event).await,
        }
    }
}

/// Non-blocking submission of side effects.
///
/// `submit` must return promptly; it reports rejection but never waits
/// for the effect to be applied.
pub trait SideEffectSink: Send + Sync {
    fn submit(&self, effect: SideEffect) -> Result<(), PersistenceError>;
}
