//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! - `ReasoningOracle` - Next-node selection and field extraction
//! - `AIProvider` - Raw LLM chat completion
//! - `ConversationRecorder` - Durable turn, customer and event records
//! - `SideEffectSink` - Non-blocking hand-off of persistence work

mod ai_provider;
mod oracle;
mod persistence;

pub use ai_provider::{
    AIError, AIProvider, CompletionRequest, CompletionResponse, FinishReason, Message,
    MessageRole, ProviderInfo, RequestMetadata, TokenUsage,
};
pub use oracle::{CandidateNode, OracleRequest, ReasoningOracle};
pub use persistence::{
    ConversationRecorder, CustomerProfile, LeadEvent, PersistenceError, SideEffect,
    SideEffectSink,
};
