//! Editing sessions - one live graph and its registry per session key

use crate::dispatch;
use crate::registry::NodeRegistry;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use onnxedit_core::{AttrValue, EditOutcome, EditRequest, Error, NodeDescriptor, NodeId, Result, SessionKey};
use onnxedit_graph::{CleanupReport, FoldReport, Graph};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// One graph node as the inspector shows it. `id` is `None` for nodes no id
/// is bound to; attributes without a JSON form (tensors, subgraphs) are null.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NodeDetail {
    pub id: Option<NodeId>,
    pub name: String,
    pub op_type: String,
    pub description: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub attributes: BTreeMap<String, Option<AttrValue>>,
}

/// The graph being edited plus the ids the client uses to address it.
#[derive(Debug)]
pub struct EditSession {
    graph: Graph,
    registry: NodeRegistry,
    opened_at: DateTime<Utc>,
}

impl EditSession {
    pub fn new(graph: Graph) -> Self {
        let registry = NodeRegistry::build(&graph);
        Self {
            graph,
            registry,
            opened_at: Utc::now(),
        }
    }

    pub fn open(bytes: &[u8]) -> Result<Self> {
        Ok(Self::new(Graph::from_bytes(bytes)?))
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    pub fn apply(&mut self, request: EditRequest) -> Result<EditOutcome> {
        dispatch::apply(&mut self.graph, &mut self.registry, request)
    }

    /// Parse and apply a raw JSON edit.
    pub fn apply_json(&mut self, value: Value) -> Result<EditOutcome> {
        self.apply(EditRequest::from_value(value)?)
    }

    /// Replace the registry with one reconciled against the client's view.
    /// On mismatch the current registry is kept.
    pub fn assign_node_ids(&mut self, expected: &[NodeDescriptor]) -> Result<usize> {
        self.registry = NodeRegistry::reconcile(&self.graph, expected)?;
        Ok(self.registry.len())
    }

    pub fn cleanup(&mut self) -> Result<CleanupReport> {
        let report = self.graph.cleanup()?;
        self.release_dead_ids();
        Ok(report)
    }

    pub fn fold_constants(&mut self) -> Result<FoldReport> {
        let report = self.graph.fold_constants()?;
        self.release_dead_ids();
        Ok(report)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.graph.to_bytes()
    }

    pub fn describe(&self) -> Vec<NodeDescriptor> {
        self.registry.describe(&self.graph)
    }

    /// Every node in graph order, bound or not.
    pub fn inspect(&self) -> Vec<NodeDetail> {
        self.graph
            .nodes()
            .iter()
            .map(|node| NodeDetail {
                id: self.registry.id_of(node.key()),
                name: node.name.clone(),
                op_type: node.op_type.clone(),
                description: node.doc_string.clone(),
                inputs: node.inputs.clone(),
                outputs: node.outputs.clone(),
                attributes: node
                    .attrs
                    .iter()
                    .map(|(name, attr)| (name.to_string(), attr.to_value()))
                    .collect(),
            })
            .collect()
    }

    fn release_dead_ids(&mut self) {
        let released = self.registry.retain_live(&self.graph);
        if !released.is_empty() {
            info!(count = released.len(), "released ids of removed nodes: {:?}", released);
        }
    }
}

/// A session slot. Empty until a model is opened into it.
pub type SessionHandle = Arc<Mutex<Option<EditSession>>>;

#[derive(Clone, Debug, Serialize)]
pub struct SessionSummary {
    pub key: SessionKey,
    pub node_count: Option<usize>,
    pub opened_at: Option<DateTime<Utc>>,
}

/// All sessions of a server. Edits to one session are serialized by its
/// mutex; different sessions proceed independently.
pub struct SessionStore {
    sessions: DashMap<SessionKey, SessionHandle>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Mint a fresh, empty session.
    pub fn create(&self) -> SessionKey {
        let key = SessionKey::generate();
        self.sessions.insert(key.clone(), SessionHandle::default());
        info!("Session {} created", key);
        key
    }

    pub fn get_or_create(&self, key: &SessionKey) -> SessionHandle {
        self.sessions.entry(key.clone()).or_default().clone()
    }

    pub fn get(&self, key: &SessionKey) -> Option<SessionHandle> {
        self.sessions.get(key).map(|s| s.clone())
    }

    pub fn remove(&self, key: &SessionKey) -> Option<SessionHandle> {
        self.sessions.remove(key).map(|(_, s)| s)
    }

    pub fn list(&self) -> Vec<SessionKey> {
        let mut keys: Vec<SessionKey> = self.sessions.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Parse `bytes` and make the result the session's graph, replacing
    /// whatever was open. Returns the node count.
    pub async fn open(&self, key: &SessionKey, bytes: &[u8]) -> Result<usize> {
        let session = EditSession::open(bytes)?;
        let nodes = session.graph().node_count();
        let handle = self.get_or_create(key);
        *handle.lock().await = Some(session);
        info!(session = %key, nodes, "model opened");
        Ok(nodes)
    }

    /// Run `f` against the session's open model, holding its lock.
    pub async fn with_session<T>(
        &self,
        key: &SessionKey,
        f: impl FnOnce(&mut EditSession) -> Result<T>,
    ) -> Result<T> {
        let handle = self.get(key).ok_or(Error::NoModel)?;
        let mut slot = handle.lock().await;
        let session = slot.as_mut().ok_or(Error::NoModel)?;
        f(session)
    }

    pub async fn summaries(&self) -> Vec<SessionSummary> {
        let mut out = Vec::new();
        for key in self.list() {
            let Some(handle) = self.get(&key) else { continue };
            let slot = handle.lock().await;
            out.push(SessionSummary {
                key,
                node_count: slot.as_ref().map(|s| s.graph().node_count()),
                opened_at: slot.as_ref().map(|s| s.opened_at()),
            });
        }
        out
    }
}
