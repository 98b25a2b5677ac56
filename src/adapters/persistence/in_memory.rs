//! In-Memory Conversation Store Adapter
//!
//! Keeps turns, customers and lead events in memory.
//! Useful for testing and development.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::conversation::TurnRole;
use crate::domain::foundation::{SessionId, Timestamp};
use crate::ports::{ConversationRecorder, CustomerProfile, LeadEvent, PersistenceError};

/// A stored history line.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTurn {
    pub session_id: SessionId,
    pub role: TurnRole,
    pub text: String,
    pub recorded_at: Timestamp,
}

/// In-memory conversation records.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConversationStore {
    turns: Arc<RwLock<Vec<StoredTurn>>>,
    customers: Arc<RwLock<HashMap<SessionId, CustomerProfile>>>,
    events: Arc<RwLock<Vec<LeadEvent>>>,
    upserts: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with `Unavailable` (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn turns(&self) -> Vec<StoredTurn> {
        self.turns.read().await.clone()
    }

    pub async fn turns_for(&self, session_id: SessionId) -> Vec<StoredTurn> {
        self.turns
            .read()
            .await
            .iter()
            .filter(|t| t.session_id == session_id)
            .cloned()
            .collect()
    }

    pub async fn customer(&self, session_id: SessionId) -> Option<CustomerProfile> {
        self.customers.read().await.get(&session_id).cloned()
    }

    pub async fn customer_count(&self) -> usize {
        self.customers.read().await.len()
    }

    /// Number of successful upsert calls, including updates.
    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    pub async fn events(&self) -> Vec<LeadEvent> {
        self.events.read().await.clone()
    }

    pub async fn events_named(&self, name: &str) -> Vec<LeadEvent> {
        self.events
            .read()
            .await
            .iter()
            .filter(|e| e.name == name)
            .cloned()
            .collect()
    }

    fn check_available(&self) -> Result<(), PersistenceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PersistenceError::unavailable("in-memory store set to fail"));
        }
        Ok(())
    }
}

#[async_trait]
impl ConversationRecorder for InMemoryConversationStore {
    async fn record_turn(
        &self,
        session_id: SessionId,
        role: TurnRole,
        text: &str,
    ) -> Result<(), PersistenceError> {
        self.check_available()?;
        self.turns.write().await.push(StoredTurn {
            session_id,
            role,
            text: text.to_string(),
            recorded_at: Timestamp::now(),
        });
        Ok(())
    }

    async fn upsert_customer(
        &self,
        session_id: SessionId,
        profile: &CustomerProfile,
    ) -> Result<(), PersistenceError> {
        self.check_available()?;
        self.customers
            .write()
            .await
            .insert(session_id, profile.clone());
        self.upserts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn record_event(&self, event: &LeadEvent) -> Result<(), PersistenceError> {
        self.check_available()?;
        self.events.write().await.push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::SideEffect;
    use serde_json::json;

    fn profile(product: Option<&str>) -> CustomerProfile {
        CustomerProfile {
            name: "Alex".to_string(),
            email: "alex@example.com".to_string(),
            product_choice: product.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn records_turns_per_session() {
        let store = InMemoryConversationStore::new();
        let a = SessionId::new();
        let b = SessionId::new();

        store.record_turn(a, TurnRole::User, "hi").await.unwrap();
        store.record_turn(b, TurnRole::User, "hello").await.unwrap();
        store.record_turn(a, TurnRole::Assistant, "welcome").await.unwrap();

        let turns = store.turns_for(a).await;
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].role, TurnRole::Assistant);
        assert_eq!(store.turns().await.len(), 3);
    }

    #[tokio::test]
    async fn upsert_overwrites_customer() {
        let store = InMemoryConversationStore::new();
        let session = SessionId::new();

        store.upsert_customer(session, &profile(None)).await.unwrap();
        store.upsert_customer(session, &profile(Some("Pro"))).await.unwrap();

        assert_eq!(store.customer_count().await, 1);
        assert_eq!(store.upsert_count(), 2);
        assert_eq!(
            store.customer(session).await.unwrap().product_choice.as_deref(),
            Some("Pro")
        );
    }

    #[tokio::test]
    async fn apply_dispatches_side_effects() {
        let store = InMemoryConversationStore::new();
        let session = SessionId::new();

        store
            .apply(&SideEffect::RecordEvent(LeadEvent::new(
                session,
                "demo_requested",
                json!({"product": "Pro"}),
            )))
            .await
            .unwrap();

        assert_eq!(store.events_named("demo_requested").await.len(), 1);
        assert!(store.events_named("other").await.is_empty());
    }

    #[tokio::test]
    async fn failing_store_rejects_writes() {
        let store = InMemoryConversationStore::new();
        store.set_failing(true);

        let result = store.record_turn(SessionId::new(), TurnRole::User, "hi").await;

        assert!(matches!(result, Err(PersistenceError::Unavailable(_))));
        assert!(store.turns().await.is_empty());
    }
}
