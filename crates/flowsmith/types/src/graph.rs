//! Arena view over a node list.
//!
//! Nodes are stored by identifier and routes stay plain identifiers, so
//! cycles, self references and forward references need no special
//! handling. Resolution happens at lookup time.

use crate::error::ModelError;
use crate::node::{Node, NodeId};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

#[derive(Debug, Clone, Default)]
pub struct FlowGraph {
    nodes: BTreeMap<NodeId, Node>,
    order: Vec<NodeId>,
}

impl FlowGraph {
    /// Build the arena. Identifiers must be unique.
    pub fn from_nodes(nodes: Vec<Node>) -> Result<Self, ModelError> {
        let mut graph = Self::default();
        for node in nodes {
            let id = node.id;
            if graph.nodes.insert(id, node).is_some() {
                return Err(ModelError::DuplicateNodeId(id));
            }
            graph.order.push(id);
        }
        Ok(graph)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Resolved successors of `id`. Dangling targets are skipped.
    pub fn successors(&self, id: NodeId) -> Vec<&Node> {
        self.get(id)
            .map(|node| node.targets())
            .unwrap_or_default()
            .into_iter()
            .filter_map(|target| self.get(target))
            .collect()
    }

    /// `(source, target)` pairs whose target is not in the arena.
    pub fn dangling_references(&self) -> Vec<(NodeId, NodeId)> {
        let mut dangling = Vec::new();
        for node in self.nodes() {
            for target in node.targets() {
                if !self.contains(target) {
                    dangling.push((node.id, target));
                }
            }
        }
        dangling
    }

    /// Identifiers reachable from `start`, breadth first, `start` included.
    pub fn reachable_from(&self, start: NodeId) -> BTreeSet<NodeId> {
        let mut seen = BTreeSet::new();
        if !self.contains(start) {
            return seen;
        }
        let mut queue = VecDeque::from([start]);
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            for next in self.successors(id) {
                if !seen.contains(&next.id) {
                    queue.push_back(next.id);
                }
            }
        }
        seen
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    /// Consume the arena, returning nodes in insertion order.
    pub fn into_nodes(mut self) -> Vec<Node> {
        self.order
            .iter()
            .filter_map(|id| self.nodes.remove(id))
            .collect()
    }
}
