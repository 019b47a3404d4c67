//! Dead-node and dead-tensor elimination

use crate::graph::Graph;
use onnxedit_core::Result;
use serde::Serialize;
use std::collections::HashSet;
use tracing::info;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub removed_nodes: usize,
    pub removed_tensors: usize,
}

impl Graph {
    /// Remove every node that does not contribute to a graph output, then
    /// drop tensors nothing refers to any more.
    ///
    /// Validation happens before anything is removed, so a failed cleanup
    /// leaves the graph as it was.
    pub fn cleanup(&mut self) -> Result<CleanupReport> {
        let live = {
            let producers = self.producers()?;
            let mut live = vec![false; self.nodes.len()];
            let mut seen: HashSet<String> = HashSet::new();
            let mut pending: Vec<String> = self.outputs.clone();

            while let Some(name) = pending.pop() {
                if !seen.insert(name.clone()) {
                    continue;
                }
                let Some(&idx) = producers.get(name.as_str()) else {
                    continue;
                };
                if live[idx] {
                    continue;
                }
                live[idx] = true;
                let node = &self.nodes[idx];
                pending.extend(node.inputs.iter().filter(|n| !n.is_empty()).cloned());
                pending.extend(node.implicit_inputs());
            }
            live
        };

        let before = self.nodes.len();
        let mut flags = live.into_iter();
        self.nodes.retain(|_| flags.next().unwrap_or(false));
        let removed_nodes = before - self.nodes.len();
        let removed_tensors = self.prune_tensors();

        info!(removed_nodes, removed_tensors, "cleaned up graph '{}'", self.name);
        Ok(CleanupReport {
            removed_nodes,
            removed_tensors,
        })
    }

    /// Drop table entries no node or graph input/output refers to.
    pub fn prune_tensors(&mut self) -> usize {
        let referenced = self.referenced_tensors();
        let before = self.tensors.len();
        self.tensors.retain(|name, _| referenced.contains(name));
        before - self.tensors.len()
    }
}
