//! Scripted oracle for tests and offline demos.
//!
//! Replays a queue of canned analyses or errors in order. Once the queue
//! is exhausted it walks to the first candidate without extracting
//! anything, so a conversation never stalls on an empty script.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::sleep;

use crate::domain::conversation::{Context, InputAnalysis, OracleError};
use crate::ports::{OracleRequest, ReasoningOracle};

/// Queue-driven [`ReasoningOracle`] with delay injection and call tracking.
#[derive(Debug, Clone, Default)]
pub struct ScriptedOracle {
    script: Arc<Mutex<VecDeque<Result<InputAnalysis, OracleError>>>>,
    delay: Duration,
    calls: Arc<Mutex<Vec<OracleRequest>>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an analysis.
    pub fn with_analysis(self, analysis: InputAnalysis) -> Self {
        lock(&self.script).push_back(Ok(analysis));
        self
    }

    /// Queues a failure.
    pub fn with_error(self, error: OracleError) -> Self {
        lock(&self.script).push_back(Err(error));
        self
    }

    /// Delays every answer, for exercising the engine's timeout.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queues an analysis on a shared handle.
    pub fn push(&self, analysis: InputAnalysis) {
        lock(&self.script).push_back(Ok(analysis));
    }

    pub fn calls(&self) -> Vec<OracleRequest> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    pub fn remaining(&self) -> usize {
        lock(&self.script).len()
    }
}

#[async_trait]
impl ReasoningOracle for ScriptedOracle {
    async fn analyze(&self, request: OracleRequest) -> Result<InputAnalysis, OracleError> {
        let next = request
            .candidates
            .first()
            .map(|c| c.id.clone())
            .unwrap_or_else(|| request.current_node.clone());
        lock(&self.calls).push(request);

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        let scripted = lock(&self.script).pop_front();
        scripted.unwrap_or_else(|| Ok(InputAnalysis::new(next, Context::new(), 1.0, "")))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::conversation::NodeId;
    use crate::domain::foundation::SessionId;
    use crate::ports::CandidateNode;

    fn request() -> OracleRequest {
        OracleRequest {
            session_id: SessionId::new(),
            utterance: "hi".to_string(),
            history: Vec::new(),
            context: Context::new(),
            current_node: NodeId::from("welcome"),
            candidates: vec![CandidateNode::new(NodeId::from("collect_name"), "Name")],
        }
    }

    #[tokio::test]
    async fn replays_script_in_order() {
        let oracle = ScriptedOracle::new()
            .with_error(OracleError::unavailable("down"))
            .with_analysis(InputAnalysis::new("farewell", Context::new(), 0.8, "Bye"));

        assert!(oracle.analyze(request()).await.is_err());
        assert_eq!(oracle.analyze(request()).await.unwrap().next_node_id, "farewell");
        assert_eq!(oracle.remaining(), 0);
        assert_eq!(oracle.call_count(), 2);
    }

    #[tokio::test]
    async fn exhausted_script_walks_to_first_candidate() {
        let oracle = ScriptedOracle::new();

        let analysis = oracle.analyze(request()).await.unwrap();

        assert_eq!(analysis.next_node_id, "collect_name");
        assert!(analysis.user_inputs.is_empty());
    }

    #[tokio::test]
    async fn clones_share_script() {
        let oracle = ScriptedOracle::new();
        let handle = oracle.clone();
        handle.push(InputAnalysis::new("farewell", Context::new(), 0.8, "Bye"));

        assert_eq!(oracle.analyze(request()).await.unwrap().next_node_id, "farewell");
        assert_eq!(handle.call_count(), 1);
    }
}
