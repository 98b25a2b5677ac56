//! Error types for the conversation engine.

use thiserror::Error;

use super::node::NodeId;

/// Errors that escape a turn.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    /// The session points at a node the graph does not contain.
    #[error("Invalid state: session references unknown node '{node_id}'")]
    InvalidState { node_id: NodeId },
}

impl EngineError {
    pub fn invalid_state(node_id: NodeId) -> Self {
        Self::InvalidState { node_id }
    }
}

/// Configuration defects detected while assembling a node graph.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GraphError {
    #[error("Duplicate node id '{0}'")]
    DuplicateNode(NodeId),

    #[error("Invalid node id '{0}': must be non-empty and contain no whitespace")]
    InvalidNodeId(NodeId),

    #[error("Start node '{0}' is not defined")]
    MissingStartNode(NodeId),

    #[error("Node '{from}' lists unknown successor '{to}'")]
    DanglingSuccessor { from: NodeId, to: NodeId },

    #[error("Handler bound to unknown node '{0}'")]
    UnknownHandlerNode(NodeId),
}

/// Failures of the reasoning oracle. Always recovered inside the engine.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OracleError {
    #[error("Oracle unavailable: {0}")]
    Unavailable(String),

    #[error("Oracle timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Oracle returned malformed output: {0}")]
    Malformed(String),

    #[error("Oracle output missing field: {0}")]
    MissingField(String),

    #[error("Oracle chose unknown node '{0}'")]
    UnknownNode(NodeId),
}

impl OracleError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }
}

/// Failures of a node's side-effect handler. Always recovered inside the engine.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum HandlerError {
    #[error("Handler failed: {0}")]
    Failed(String),

    #[error("Handler timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}
