//! Reasoning Oracle Port - Interface for the next-node/field-extraction service.
//!
//! The oracle maps (utterance, history, context, candidate next nodes) to an
//! [`InputAnalysis`]. How it is prompted, what model backs it, and whether
//! it retrieves anything is invisible to the engine.
//!
//! # Failure Modes
//!
//! Implementations may fail with network errors, time out, or produce
//! malformed output. The transition engine treats every failure as a
//! degraded turn rather than an aborted one.

use async_trait::async_trait;

use crate::domain::conversation::{Context, HistoryEntry, InputAnalysis, NodeId, OracleError};
use crate::domain::foundation::SessionId;

/// A successor the oracle may choose, with its human-readable label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateNode {
    pub id: NodeId,
    pub description: String,
}

impl CandidateNode {
    pub fn new(id: NodeId, description: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
        }
    }
}

/// Input to one oracle call.
#[derive(Debug, Clone)]
pub struct OracleRequest {
    /// Session the turn belongs to (tracing only).
    pub session_id: SessionId,
    /// The user's utterance for this turn.
    pub utterance: String,
    /// Prior history, oldest first. Does not include this turn.
    pub history: Vec<HistoryEntry>,
    /// Accumulated context before this turn.
    pub context: Context,
    /// Node the conversation is currently at.
    pub current_node: NodeId,
    /// Permitted successors of the current node, in declaration order.
    pub candidates: Vec<CandidateNode>,
}

impl OracleRequest {
    /// Candidate ids in declaration order.
    pub fn candidate_ids(&self) -> Vec<&NodeId> {
        self.candidates.iter().map(|c| &c.id).collect()
    }
}

/// Port for the external reasoning oracle.
#[async_trait]
pub trait ReasoningOracle: Send + Sync {
    /// Proposes the next node and extracts structured fields for one turn.
    async fn analyze(&self, request: OracleRequest) -> Result<InputAnalysis, OracleError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time check that trait is object-safe
    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn ReasoningOracle) {}

    #[test]
    fn candidate_ids_preserve_order() {
        let request = OracleRequest {
            session_id: SessionId::new(),
            utterance: "hi".to_string(),
            history: Vec::new(),
            context: Context::new(),
            current_node: NodeId::from("welcome"),
            candidates: vec![
                CandidateNode::new(NodeId::from("collect_name"), "Ask for name"),
                CandidateNode::new(NodeId::from("product_question"), "Answer a question"),
            ],
        };

        assert_eq!(
            request.candidate_ids(),
            vec![&NodeId::from("collect_name"), &NodeId::from("product_question")]
        );
    }
}
