//! Persistence adapters.
//!
//! - `InMemoryConversationStore` - `ConversationRecorder` kept in memory
//! - `SideEffectQueue` - Bounded background delivery of side effects

mod in_memory;
mod side_effect_queue;

pub use in_memory::{InMemoryConversationStore, StoredTurn};
pub use side_effect_queue::{DrainStats, SideEffectQueue, SideEffectWorker, DEFAULT_QUEUE_CAPACITY};
