//! Node graph.
//!
//! An immutable registry of dialogue nodes, assembled once through
//! [`NodeGraphBuilder`] and shared read-only by all concurrent turns.
//! Cycles are allowed; dangling successor ids are rejected at build time.

use std::collections::{HashMap, HashSet, VecDeque};

use super::errors::GraphError;
use super::handler::HandlerBinding;
use super::node::{Node, NodeId};

/// Default id of the node every session starts at.
pub const START_NODE_ID: &str = "welcome";

/// Immutable dialogue graph with O(1) lookup by id.
#[derive(Debug, Clone)]
pub struct NodeGraph {
    nodes: HashMap<NodeId, Node>,
    start: NodeId,
}

impl NodeGraph {
    /// Starts assembling a graph whose start node is `welcome`.
    pub fn builder() -> NodeGraphBuilder {
        NodeGraphBuilder::new(START_NODE_ID)
    }

    /// Looks up a node. Absence is a normal outcome at this layer.
    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn start_id(&self) -> &NodeId {
        &self.start
    }

    /// The start node. Present by construction.
    pub fn start(&self) -> &Node {
        &self.nodes[&self.start]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node ids in sorted order.
    pub fn node_ids(&self) -> Vec<&NodeId> {
        let mut ids: Vec<&NodeId> = self.nodes.keys().collect();
        ids.sort();
        ids
    }

    /// Ids reachable from the start node, including the start node.
    pub fn reachable_from_start(&self) -> HashSet<NodeId> {
        reachable(&self.nodes, &self.start)
    }
}

/// Assembles and validates a [`NodeGraph`].
#[derive(Debug)]
pub struct NodeGraphBuilder {
    start: NodeId,
    nodes: Vec<Node>,
    bindings: Vec<(NodeId, HandlerBinding)>,
}

impl NodeGraphBuilder {
    pub fn new(start: impl Into<NodeId>) -> Self {
        Self {
            start: start.into(),
            nodes: Vec::new(),
            bindings: Vec::new(),
        }
    }

    /// Adds a node definition.
    pub fn node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    /// Binds a handler to a node defined on this builder.
    pub fn bind_handler(mut self, node_id: impl Into<NodeId>, binding: HandlerBinding) -> Self {
        self.bindings.push((node_id.into(), binding));
        self
    }

    /// Validates the definitions and freezes them into a graph.
    ///
    /// # Errors
    ///
    /// - `InvalidNodeId` for empty or whitespace-bearing ids
    /// - `DuplicateNode` when an id is defined twice
    /// - `MissingStartNode` when the start id is not defined
    /// - `DanglingSuccessor` when a successor id is not defined
    /// - `UnknownHandlerNode` when a handler targets an undefined node
    pub fn build(self) -> Result<NodeGraph, GraphError> {
        let mut nodes: HashMap<NodeId, Node> = HashMap::with_capacity(self.nodes.len());

        for node in self.nodes {
            let id = node.id().clone();
            if id.as_str().is_empty() || id.as_str().chars().any(char::is_whitespace) {
                return Err(GraphError::InvalidNodeId(id));
            }
            if nodes.contains_key(&id) {
                return Err(GraphError::DuplicateNode(id));
            }
            nodes.insert(id, node);
        }

        if !nodes.contains_key(&self.start) {
            return Err(GraphError::MissingStartNode(self.start));
        }

        for (node_id, binding) in self.bindings {
            let node = nodes
                .remove(&node_id)
                .ok_or_else(|| GraphError::UnknownHandlerNode(node_id.clone()))?;
            nodes.insert(node_id, node.with_handler(binding));
        }

        for node in nodes.values() {
            if let Some(missing) = node.next_node_ids().iter().find(|n| !nodes.contains_key(*n)) {
                return Err(GraphError::DanglingSuccessor {
                    from: node.id().clone(),
                    to: missing.clone(),
                });
            }
        }

        let reachable = reachable(&nodes, &self.start);
        let mut unreachable: Vec<&NodeId> =
            nodes.keys().filter(|id| !reachable.contains(*id)).collect();
        unreachable.sort();
        for id in unreachable {
            tracing::warn!(node_id = %id, start = %self.start, "Node is unreachable from start");
        }

        tracing::debug!(nodes = nodes.len(), start = %self.start, "Node graph built");

        Ok(NodeGraph {
            nodes,
            start: self.start,
        })
    }
}

fn reachable(nodes: &HashMap<NodeId, Node>, start: &NodeId) -> HashSet<NodeId> {
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([start.clone()]);

    while let Some(id) = queue.pop_front() {
        if !seen.insert(id.clone()) {
            continue;
        }
        if let Some(node) = nodes.get(&id) {
            for next in node.next_node_ids() {
                if !seen.contains(next) {
                    queue.push_back(next.clone());
                }
            }
        }
    }

    seen
}
