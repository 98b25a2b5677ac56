//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `ai` - LLM completion providers (OpenAI, Anthropic, mock)
//! - `oracle` - Reasoning oracles built on a provider, plus a scripted double
//! - `persistence` - Conversation records and the side-effect queue
//! - `websocket` - Chat transport

pub mod ai;
pub mod oracle;
pub mod persistence;
pub mod websocket;
