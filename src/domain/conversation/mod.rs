//! Conversation module - Graph-driven dialogue orchestration.
//!
//! A conversation is a walk over an immutable [`NodeGraph`]. Each turn the
//! [`TransitionEngine`] asks a reasoning oracle where to go next, merges
//! the fields it extracted into the session [`Context`], runs the landed
//! node's handler if one is bound, and returns the updated [`Session`].
//!
//! # Module Structure
//!
//! - `node` - Node definitions and reply policy
//! - `graph` - Validated node registry and its builder
//! - `context` - Accumulated lead fields
//! - `session` - Per-visitor session state and history
//! - `analysis` - Oracle proposals and fallback extraction
//! - `template` - `{{key}}` prompt rendering
//! - `handler` - Node handler trait and isolated dispatch
//! - `engine` - Turn processing
//! - `catalogue` - The default sales-qualification flow

mod analysis;
pub mod catalogue;
mod context;
mod engine;
mod errors;
mod graph;
mod handler;
mod node;
mod session;
mod template;

pub use analysis::{extract_fallback_fields, InputAnalysis, MAX_FALLBACK_NAME_LENGTH};
pub use context::{Context, ContextValue, WellKnownKey};
pub use engine::{EngineSettings, TransitionEngine, TurnOutcome, DEFAULT_APOLOGY};
pub use errors::{EngineError, GraphError, HandlerError, OracleError};
pub use graph::{NodeGraph, NodeGraphBuilder, START_NODE_ID};
pub use handler::{HandlerBinding, HandlerInput, HandlerReply, NodeHandler};
pub use node::{Node, NodeId, ReplyPolicy};
pub use session::{HistoryEntry, Session, TurnRole};
pub use template::PromptTemplate;
