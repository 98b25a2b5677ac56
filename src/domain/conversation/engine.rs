//! Transition engine.
//!
//! Runs one conversational turn: asks the oracle for a proposed
//! transition, validates it against the graph, merges the extracted
//! fields into context, dispatches the landed node's handler and selects
//! the reply. The engine holds no sessions; it receives one and returns a
//! new one, so distinct sessions can be processed concurrently.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::ports::{CandidateNode, OracleRequest, ReasoningOracle};

use super::analysis::InputAnalysis;
use super::context::Context;
use super::errors::{EngineError, HandlerError, OracleError};
use super::graph::NodeGraph;
use super::handler::HandlerInput;
use super::node::{Node, NodeId};
use super::session::{HistoryEntry, Session};

/// Reply used on every degraded path.
pub const DEFAULT_APOLOGY: &str =
    "I'm sorry, I didn't quite catch that. Could you rephrase?";

/// Tunables for the transition engine.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Upper bound on one oracle call.
    pub oracle_timeout: Duration,
    /// Upper bound on one handler invocation.
    pub handler_timeout: Duration,
    /// Generic apology substituted on degraded paths.
    pub apology_text: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            oracle_timeout: Duration::from_secs(15),
            handler_timeout: Duration::from_secs(10),
            apology_text: DEFAULT_APOLOGY.to_string(),
        }
    }
}

impl EngineSettings {
    pub fn with_oracle_timeout(mut self, timeout: Duration) -> Self {
        self.oracle_timeout = timeout;
        self
    }

    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = timeout;
        self
    }

    pub fn with_apology_text(mut self, text: impl Into<String>) -> Self {
        self.apology_text = text.into();
        self
    }
}

/// Result of one turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Text to deliver to the user.
    pub reply_text: String,
    /// The session after this turn.
    pub session: Session,
    /// Oracle confidence for the applied analysis.
    pub confidence: f64,
    /// Why the oracle's proposal was not used, if it was not.
    pub oracle_degraded: Option<OracleError>,
    /// Why the landed node's handler did not contribute, if it failed.
    pub handler_failure: Option<HandlerError>,
    /// True when the oracle chose an existing node outside the declared successors.
    pub off_candidate: bool,
}

impl TurnOutcome {
    /// True when the turn applied the oracle's own proposal.
    pub fn used_oracle(&self) -> bool {
        self.oracle_degraded.is_none()
    }
}

/// Oracle proposal after validation against the graph.
struct ResolvedAnalysis {
    analysis: InputAnalysis,
    degraded: Option<OracleError>,
    off_candidate: bool,
}

/// Orchestrates conversational turns over an immutable node graph.
pub struct TransitionEngine {
    graph: Arc<NodeGraph>,
    oracle: Arc<dyn ReasoningOracle>,
    settings: EngineSettings,
    anomalies: AtomicU64,
}

impl TransitionEngine {
    pub fn new(
        graph: Arc<NodeGraph>,
        oracle: Arc<dyn ReasoningOracle>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            graph,
            oracle,
            settings,
            anomalies: AtomicU64::new(0),
        }
    }

    pub fn graph(&self) -> &NodeGraph {
        &self.graph
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Number of turns where the oracle branched outside the declared successors.
    pub fn anomaly_count(&self) -> u64 {
        self.anomalies.load(Ordering::Relaxed)
    }

    /// Creates a session at the start node.
    pub fn create_session(&self) -> Session {
        Session::start(self.graph.start_id().clone())
    }

    /// Renders a node's entry prompt against an empty context.
    pub fn render_welcome(&self, node: &Node) -> String {
        node.render_prompt(&Context::new())
    }

    /// Welcome text for the start node.
    pub fn welcome_text(&self) -> String {
        self.render_welcome(self.graph.start())
    }

    /// Runs one turn.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if the session's current node is not in the
    /// graph. Oracle and handler failures are recovered and reported on the
    /// returned [`TurnOutcome`].
    pub async fn handle_turn(
        &self,
        session: &Session,
        utterance: &str,
    ) -> Result<TurnOutcome, EngineError> {
        let current = self
            .graph
            .get(&session.current_node_id)
            .ok_or_else(|| EngineError::invalid_state(session.current_node_id.clone()))?;

        let ResolvedAnalysis {
            analysis,
            degraded,
            off_candidate,
        } = self.consult_oracle(session, current, utterance).await;

        let landed = self
            .graph
            .get(&analysis.next_node_id)
            .ok_or_else(|| EngineError::invalid_state(analysis.next_node_id.clone()))?;

        let context = session.context.merged_with(&analysis.user_inputs);

        let mut history = session.conversation_history.clone();
        history.push(HistoryEntry::user(utterance));

        let mut next = session.advanced(landed.id().clone(), context, history);

        let mut handler_failure = None;
        let reply_text = match landed.handler() {
            // Handlers only act on oracle-confirmed turns; a degraded turn answers with the apology.
            Some(binding) if degraded.is_some() => {
                tracing::debug!(
                    session_id = %session.session_id,
                    node_id = %landed.id(),
                    handler = binding.name(),
                    "Skipping node handler on degraded turn"
                );
                analysis.suggested_response.clone()
            }
            Some(binding) => {
                let input = HandlerInput {
                    utterance,
                    history: &next.conversation_history,
                    context: &next.context,
                    session: &next,
                };
                let handler_text = match binding.dispatch(input, self.settings.handler_timeout).await
                {
                    Ok(reply) => reply.reply_text,
                    Err(err) => {
                        tracing::error!(
                            session_id = %session.session_id,
                            node_id = %landed.id(),
                            handler = binding.name(),
                            error = %err,
                            "Node handler failed; substituting apology"
                        );
                        handler_failure = Some(err);
                        self.settings.apology_text.clone()
                    }
                };
                binding
                    .policy()
                    .select(&analysis.suggested_response, &handler_text)
            }
            None if analysis.suggested_response.trim().is_empty() => {
                landed.render_prompt(&next.context)
            }
            None => analysis.suggested_response.clone(),
        };

        next.conversation_history
            .push(HistoryEntry::assistant(reply_text.clone()));

        tracing::debug!(
            session_id = %session.session_id,
            from = %current.id(),
            to = %landed.id(),
            confidence = analysis.confidence,
            degraded = degraded.is_some(),
            "Turn complete"
        );

        Ok(TurnOutcome {
            reply_text,
            session: next,
            confidence: analysis.confidence,
            oracle_degraded: degraded,
            handler_failure,
            off_candidate,
        })
    }

    async fn consult_oracle(
        &self,
        session: &Session,
        current: &Node,
        utterance: &str,
    ) -> ResolvedAnalysis {
        let request = OracleRequest {
            session_id: session.session_id,
            utterance: utterance.to_string(),
            history: session.conversation_history.clone(),
            context: session.context.clone(),
            current_node: current.id().clone(),
            candidates: self.candidates_of(current),
        };

        let timeout = self.settings.oracle_timeout;
        let proposed = match tokio::time::timeout(timeout, self.oracle.analyze(request)).await {
            Ok(result) => result,
            Err(_) => Err(OracleError::Timeout {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        };

        let checked = proposed.and_then(|analysis| {
            analysis.validate()?;
            if !self.graph.contains(&analysis.next_node_id) {
                return Err(OracleError::UnknownNode(analysis.next_node_id));
            }
            Ok(analysis)
        });

        match checked {
            Ok(analysis) => {
                let off_candidate = !current.permits(&analysis.next_node_id);
                if off_candidate {
                    self.anomalies.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        session_id = %session.session_id,
                        node_id = %current.id(),
                        next_node_id = %analysis.next_node_id,
                        "Oracle branched outside declared successors"
                    );
                }
                ResolvedAnalysis {
                    analysis,
                    degraded: None,
                    off_candidate,
                }
            }
            Err(err) => {
                let target = self.fallback_target(current);
                tracing::warn!(
                    session_id = %session.session_id,
                    node_id = %current.id(),
                    fallback_node_id = %target,
                    error = %err,
                    "Oracle unavailable; using fallback extraction"
                );
                let mut analysis =
                    InputAnalysis::fallback(utterance, target, &self.settings.apology_text);
                // Guessed fields never overwrite values the session already holds.
                analysis.user_inputs = analysis
                    .user_inputs
                    .iter()
                    .filter(|(key, _)| !session.context.has(key))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect();
                ResolvedAnalysis {
                    analysis,
                    degraded: Some(err),
                    off_candidate: false,
                }
            }
        }
    }

    fn candidates_of(&self, node: &Node) -> Vec<CandidateNode> {
        node.next_node_ids()
            .iter()
            .map(|id| {
                let description = self
                    .graph
                    .get(id)
                    .map(|n| n.description().to_string())
                    .unwrap_or_default();
                CandidateNode::new(id.clone(), description)
            })
            .collect()
    }

    // First declared successor; a node without successors holds position.
    fn fallback_target(&self, current: &Node) -> NodeId {
        current
            .fallback_successor()
            .cloned()
            .unwrap_or_else(|| current.id().clone())
    }
}
