//! Dialogue nodes.
//!
//! A node is one conversational state: it carries the prompt shown on
//! entry, the context keys it needs before it is satisfied, the successor
//! ids the oracle may pick from, and at most one side-effect handler.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::context::{Context, WellKnownKey};
use super::handler::HandlerBinding;
use super::template::PromptTemplate;

/// Identifier of a node in the dialogue graph.
///
/// Any string is accepted here; the graph builder rejects empty or
/// whitespace-bearing ids when the graph is assembled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Creates a node id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl PartialEq<str> for NodeId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for NodeId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// How a landed node's handler output combines with the oracle reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyPolicy {
    /// The handler's text replaces the oracle's suggested reply.
    ReplaceReply,
    /// The oracle's suggested reply wins; the handler's text is used only
    /// when the oracle supplied none.
    #[default]
    SupplementReply,
}

impl ReplyPolicy {
    /// Selects the reply text for a turn.
    pub fn select(self, oracle_reply: &str, handler_reply: &str) -> String {
        match self {
            ReplyPolicy::ReplaceReply => handler_reply.to_string(),
            ReplyPolicy::SupplementReply => {
                if oracle_reply.trim().is_empty() {
                    handler_reply.to_string()
                } else {
                    oracle_reply.to_string()
                }
            }
        }
    }
}

/// A vertex in the dialogue graph.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    description: String,
    prompt_template: PromptTemplate,
    required_fields: BTreeSet<String>,
    next_node_ids: Vec<NodeId>,
    handler: Option<HandlerBinding>,
}

impl Node {
    /// Creates a node with no successors, requirements, or handler.
    pub fn new(
        id: impl Into<NodeId>,
        description: impl Into<String>,
        prompt_template: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            prompt_template: PromptTemplate::new(prompt_template),
            required_fields: BTreeSet::new(),
            next_node_ids: Vec::new(),
            handler: None,
        }
    }

    /// Adds a context key that must be present before the node is satisfied.
    pub fn requires(mut self, key: impl Into<String>) -> Self {
        self.required_fields.insert(key.into());
        self
    }

    /// Adds a well-known context key requirement.
    pub fn requires_key(self, key: WellKnownKey) -> Self {
        self.requires(key.as_str())
    }

    /// Appends a permitted successor. Order is preserved; the first
    /// successor is the fallback target when the oracle cannot be used.
    pub fn leads_to(mut self, next: impl Into<NodeId>) -> Self {
        let next = next.into();
        if !self.next_node_ids.contains(&next) {
            self.next_node_ids.push(next);
        }
        self
    }

    /// Binds a side-effect handler, replacing any previous binding.
    pub fn with_handler(mut self, binding: HandlerBinding) -> Self {
        self.handler = Some(binding);
        self
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn prompt_template(&self) -> &PromptTemplate {
        &self.prompt_template
    }

    pub fn required_fields(&self) -> &BTreeSet<String> {
        &self.required_fields
    }

    pub fn next_node_ids(&self) -> &[NodeId] {
        &self.next_node_ids
    }

    pub fn handler(&self) -> Option<&HandlerBinding> {
        self.handler.as_ref()
    }

    /// The successor used when the oracle's proposal cannot be applied.
    pub fn fallback_successor(&self) -> Option<&NodeId> {
        self.next_node_ids.first()
    }

    /// Returns true if `id` is one of this node's declared successors.
    pub fn permits(&self, id: &NodeId) -> bool {
        self.next_node_ids.contains(id)
    }

    /// Required fields absent from `context`, in sorted order.
    pub fn missing_fields(&self, context: &Context) -> Vec<String> {
        self.required_fields
            .iter()
            .filter(|key| !context.has(key))
            .cloned()
            .collect()
    }

    /// Returns true if every required field is present in `context`.
    pub fn is_satisfied(&self, context: &Context) -> bool {
        self.missing_fields(context).is_empty()
    }

    /// Renders the entry prompt against the given context.
    pub fn render_prompt(&self, context: &Context) -> String {
        self.prompt_template.render(context)
    }
}
