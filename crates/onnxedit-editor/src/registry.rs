//! Node registry - client-visible ids bound to live graph nodes
//!
//! Ids are small integers the GUI hands back in every edit. They are bound
//! to `NodeKey`s, which the graph never reuses, so a binding survives edits
//! that rename, rewire, or reorder nodes. Structural operations that delete
//! nodes must be followed by `retain_live`.

use onnxedit_core::{Error, NodeDescriptor, NodeId, Result};
use onnxedit_graph::{Graph, Node, NodeKey};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeRegistry {
    by_id: BTreeMap<NodeId, NodeKey>,
    by_key: HashMap<NodeKey, NodeId>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number the graph's nodes 0..N-1 in graph order.
    pub fn build(graph: &Graph) -> Self {
        let mut registry = Self::new();
        for (idx, node) in graph.nodes().iter().enumerate() {
            registry.insert(NodeId(idx as u64), node.key());
        }
        registry
    }

    /// Rebuild the bindings from the client's cached view of the graph.
    ///
    /// Graph nodes are walked in order and matched greedily against the next
    /// unmatched entry of `expected` by op type and exact input/output lists.
    /// Non-matching graph nodes are left unbound. Every entry must find a
    /// node, otherwise the client has drifted and `CountMismatch` is returned.
    pub fn reconcile(graph: &Graph, expected: &[NodeDescriptor]) -> Result<Self> {
        let mut registry = Self::new();
        let mut pending = expected.iter().peekable();
        for node in graph.nodes() {
            let Some(next) = pending.peek() else { break };
            if matches_descriptor(node, next) {
                registry.insert(next.id, node.key());
                pending.next();
            }
        }

        // Duplicate ids collapse into one binding and count once.
        let matched = registry.len();
        if matched != expected.len() {
            return Err(Error::CountMismatch {
                matched,
                expected: expected.len(),
            });
        }
        debug!(matched, unbound = graph.node_count() - matched, "reconciled node ids");
        Ok(registry)
    }

    pub fn resolve(&self, id: NodeId) -> Result<NodeKey> {
        self.by_id.get(&id).copied().ok_or(Error::NodeNotFound(id))
    }

    /// Bind `id` to `key`, returning the node it was previously bound to.
    pub fn insert(&mut self, id: NodeId, key: NodeKey) -> Option<NodeKey> {
        if let Some(old_id) = self.by_key.insert(key, id) {
            if old_id != id {
                self.by_id.remove(&old_id);
            }
        }
        let previous = self.by_id.insert(id, key);
        if let Some(prev) = previous.filter(|prev| *prev != key) {
            self.by_key.remove(&prev);
        }
        previous
    }

    pub fn remove(&mut self, id: NodeId) -> Result<NodeKey> {
        let key = self.by_id.remove(&id).ok_or(Error::NodeNotFound(id))?;
        self.by_key.remove(&key);
        Ok(key)
    }

    pub fn id_of(&self, key: NodeKey) -> Option<NodeId> {
        self.by_key.get(&key).copied()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Drop bindings whose node is gone from the graph. Returns the ids that
    /// were released.
    pub fn retain_live(&mut self, graph: &Graph) -> Vec<NodeId> {
        let stale: Vec<NodeId> = self
            .by_id
            .iter()
            .filter(|(_, key)| !graph.contains(**key))
            .map(|(id, _)| *id)
            .collect();
        for id in &stale {
            if let Some(key) = self.by_id.remove(id) {
                self.by_key.remove(&key);
            }
        }
        stale
    }

    /// Bound nodes as reconciliation entries, in id order.
    pub fn describe(&self, graph: &Graph) -> Vec<NodeDescriptor> {
        self.by_id
            .iter()
            .filter_map(|(id, key)| {
                graph.node(*key).map(|node| NodeDescriptor {
                    id: *id,
                    op_type: node.op_type.clone(),
                    inputs: node.inputs.clone(),
                    outputs: node.outputs.clone(),
                })
            })
            .collect()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.by_id.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

fn matches_descriptor(node: &Node, expected: &NodeDescriptor) -> bool {
    node.op_type == expected.op_type
        && node.inputs == expected.inputs
        && node.outputs == expected.outputs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_node_graph() -> (Graph, NodeKey, NodeKey) {
        let mut graph = Graph::new("g");
        let a = graph.add_node_with_io("a", "Relu", &["x"], &["y"]);
        let b = graph.add_node_with_io("b", "Relu", &["y"], &["z"]);
        (graph, a, b)
    }

    #[test]
    fn insert_keeps_both_directions_consistent() {
        let (_, a, b) = two_node_graph();
        let mut reg = NodeRegistry::new();
        assert_eq!(reg.insert(NodeId(7), a), None);
        assert_eq!(reg.insert(NodeId(7), b), Some(a));
        assert_eq!(reg.id_of(a), None);
        assert_eq!(reg.id_of(b), Some(NodeId(7)));

        // Rebinding a key to a new id releases the old id.
        reg.insert(NodeId(8), b);
        assert!(!reg.contains(NodeId(7)));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn duplicate_ids_in_reconcile_count_once() {
        let (graph, _, _) = two_node_graph();
        let expected = vec![
            NodeDescriptor {
                id: NodeId(1),
                op_type: "Relu".into(),
                inputs: vec!["x".into()],
                outputs: vec!["y".into()],
            },
            NodeDescriptor {
                id: NodeId(1),
                op_type: "Relu".into(),
                inputs: vec!["y".into()],
                outputs: vec!["z".into()],
            },
        ];
        let err = NodeRegistry::reconcile(&graph, &expected).unwrap_err();
        assert!(matches!(err, Error::CountMismatch { matched: 1, expected: 2 }));
    }
}
