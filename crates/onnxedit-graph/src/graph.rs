//! In-memory graph model: nodes, the tensor table, and top-level metadata
//!
//! Nodes live in a plain `Vec` in graph order. Each node carries a `NodeKey`
//! handed out by the graph on insertion and never reused, so callers can hold
//! on to a node across edits that reorder or remove other nodes.

use crate::attribute::Attribute;
use crate::onnx::{self, GraphProto, ModelProto, StringStringEntryProto, TensorProto, ValueInfoProto};
use crate::ordered::OrderedMap;
use onnxedit_core::IoSlot;
use std::collections::{HashMap, HashSet};

/// Opset assumed when a model declares none for the default domain.
pub const DEFAULT_OPSET: i64 = 11;

/// IR version written for graphs created from scratch.
pub const DEFAULT_IR_VERSION: i64 = 8;

/// Graph-internal node handle. Stable for the lifetime of the node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(u64);

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    key: NodeKey,
    pub name: String,
    pub op_type: String,
    pub domain: String,
    pub overload: String,
    pub doc_string: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub attrs: OrderedMap<Attribute>,
    pub metadata_props: Vec<StringStringEntryProto>,
}

impl Node {
    pub fn key(&self) -> NodeKey {
        self.key
    }

    pub fn io(&self, slot: IoSlot) -> &[String] {
        match slot {
            IoSlot::Input => &self.inputs,
            IoSlot::Output => &self.outputs,
        }
    }

    pub fn io_mut(&mut self, slot: IoSlot) -> &mut Vec<String> {
        match slot {
            IoSlot::Input => &mut self.inputs,
            IoSlot::Output => &mut self.outputs,
        }
    }

    pub(crate) fn from_proto(key: NodeKey, proto: onnx::NodeProto) -> Self {
        Self {
            key,
            name: proto.name,
            op_type: proto.op_type,
            domain: proto.domain,
            overload: proto.overload,
            doc_string: proto.doc_string,
            inputs: proto.input,
            outputs: proto.output,
            attrs: proto
                .attribute
                .into_iter()
                .map(|a| (a.name.clone(), Attribute::from_proto(a)))
                .collect(),
            metadata_props: proto.metadata_props,
        }
    }

    pub(crate) fn to_proto(&self) -> onnx::NodeProto {
        onnx::NodeProto {
            input: self.inputs.clone(),
            output: self.outputs.clone(),
            name: self.name.clone(),
            op_type: self.op_type.clone(),
            domain: self.domain.clone(),
            overload: self.overload.clone(),
            attribute: self
                .attrs
                .iter()
                .map(|(name, attr)| attr.to_proto(name))
                .collect(),
            doc_string: self.doc_string.clone(),
            metadata_props: self.metadata_props.clone(),
        }
    }

    /// Names this node reads from the enclosing scope through subgraph
    /// attributes (If/Loop/Scan bodies).
    pub fn implicit_inputs(&self) -> Vec<String> {
        let mut names = Vec::new();
        for attr in self.attrs.values() {
            for graph in attr.subgraphs() {
                outer_scope_names(graph, &mut names);
            }
        }
        names
    }
}

/// Entry in the tensor table. A tensor is constant when it carries data
/// (an initializer); `info` holds its declared type and shape, if any.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Tensor {
    pub name: String,
    pub constant: Option<TensorProto>,
    pub info: Option<ValueInfoProto>,
}

impl Tensor {
    pub fn variable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constant: None,
            info: None,
        }
    }

    pub fn is_constant(&self) -> bool {
        self.constant.is_some()
    }
}

#[derive(Clone, Debug)]
pub struct Graph {
    pub name: String,
    /// Graph doc string, shown to users as the model description.
    pub doc_string: String,
    pub opset: i64,
    pub producer_name: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub(crate) nodes: Vec<Node>,
    pub(crate) tensors: OrderedMap<Tensor>,
    next_key: u64,
    /// Model-level fields carried through export unchanged (graph removed).
    pub(crate) model: ModelProto,
    /// Graph-level fields with no in-memory counterpart (sparse initializers,
    /// quantization annotations, metadata).
    pub(crate) graph_rest: GraphProto,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("")
    }
}

impl Graph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc_string: String::new(),
            opset: DEFAULT_OPSET,
            producer_name: String::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            nodes: Vec::new(),
            tensors: OrderedMap::new(),
            next_key: 0,
            model: ModelProto {
                ir_version: DEFAULT_IR_VERSION,
                ..Default::default()
            },
            graph_rest: GraphProto::default(),
        }
    }

    // -----------------------------------------------------------------------
    // Nodes
    // -----------------------------------------------------------------------

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn position(&self, key: NodeKey) -> Option<usize> {
        self.nodes.iter().position(|n| n.key == key)
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.position(key).is_some()
    }

    pub fn node(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.iter().find(|n| n.key == key)
    }

    pub fn node_mut(&mut self, key: NodeKey) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.key == key)
    }

    /// Append a node with empty input and output lists.
    pub fn add_node(&mut self, name: impl Into<String>, op_type: impl Into<String>) -> NodeKey {
        let key = self.next_key();
        self.nodes.push(Node {
            key,
            name: name.into(),
            op_type: op_type.into(),
            domain: String::new(),
            overload: String::new(),
            doc_string: String::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            attrs: OrderedMap::new(),
            metadata_props: Vec::new(),
        });
        key
    }

    /// Append a node wired to the given tensors, creating table entries for
    /// names not seen before.
    pub fn add_node_with_io(
        &mut self,
        name: impl Into<String>,
        op_type: impl Into<String>,
        inputs: &[&str],
        outputs: &[&str],
    ) -> NodeKey {
        let key = self.add_node(name, op_type);
        for name in inputs.iter().chain(outputs) {
            self.ensure_tensor(name);
        }
        if let Some(node) = self.node_mut(key) {
            node.inputs = inputs.iter().map(|s| s.to_string()).collect();
            node.outputs = outputs.iter().map(|s| s.to_string()).collect();
        }
        key
    }

    pub fn remove_node(&mut self, key: NodeKey) -> Option<Node> {
        let idx = self.position(key)?;
        Some(self.nodes.remove(idx))
    }

    pub(crate) fn push_proto_node(&mut self, proto: onnx::NodeProto) -> NodeKey {
        let key = self.next_key();
        for name in proto.input.iter().chain(&proto.output) {
            self.ensure_tensor(name);
        }
        self.nodes.push(Node::from_proto(key, proto));
        key
    }

    fn next_key(&mut self) -> NodeKey {
        let key = NodeKey(self.next_key);
        self.next_key += 1;
        key
    }

    // -----------------------------------------------------------------------
    // Tensor table
    // -----------------------------------------------------------------------

    pub fn tensor(&self, name: &str) -> Option<&Tensor> {
        self.tensors.get(name)
    }

    pub fn tensors(&self) -> impl Iterator<Item = &Tensor> {
        self.tensors.values()
    }

    pub fn tensor_count(&self) -> usize {
        self.tensors.len()
    }

    /// Make sure a table entry exists for `name`. The empty name marks an
    /// omitted optional input and never gets an entry.
    pub fn ensure_tensor(&mut self, name: &str) {
        if name.is_empty() || self.tensors.contains_key(name) {
            return;
        }
        self.tensors.insert(name, Tensor::variable(name));
    }

    pub(crate) fn tensor_entry(&mut self, name: &str) -> &mut Tensor {
        self.tensors.get_or_insert_with(name, || Tensor::variable(name))
    }

    /// Store constant data for `name`, turning it into an initializer.
    pub fn set_constant(&mut self, name: &str, mut data: TensorProto) {
        data.name = name.to_string();
        self.tensor_entry(name).constant = Some(data);
    }

    /// Tensor name → index of the node producing it. Fails when two nodes
    /// claim the same output.
    pub(crate) fn producers(&self) -> onnxedit_core::Result<HashMap<&str, usize>> {
        let mut producers = HashMap::new();
        for (idx, node) in self.nodes.iter().enumerate() {
            for out in node.outputs.iter().filter(|o| !o.is_empty()) {
                if let Some(prev) = producers.insert(out.as_str(), idx) {
                    return Err(onnxedit_core::Error::structural(format!(
                        "tensor '{}' is produced by both '{}' and '{}'",
                        out, self.nodes[prev].name, node.name
                    )));
                }
            }
        }
        Ok(producers)
    }

    /// Every tensor name something in the graph still refers to.
    pub(crate) fn referenced_tensors(&self) -> HashSet<String> {
        let mut names: HashSet<String> = self
            .inputs
            .iter()
            .chain(&self.outputs)
            .cloned()
            .collect();
        for node in &self.nodes {
            names.extend(node.inputs.iter().chain(&node.outputs).cloned());
            names.extend(node.implicit_inputs());
        }
        names
    }
}

/// Collect the names a subgraph consumes without defining them itself.
fn outer_scope_names(graph: &GraphProto, out: &mut Vec<String>) {
    let mut local: HashSet<&str> = graph
        .input
        .iter()
        .map(|v| v.name.as_str())
        .chain(graph.initializer.iter().map(|t| t.name.as_str()))
        .collect();
    for node in &graph.node {
        local.extend(node.output.iter().map(String::as_str));
    }
    for node in &graph.node {
        for name in &node.input {
            if !name.is_empty() && !local.contains(name.as_str()) {
                out.push(name.clone());
            }
        }
        for attr in &node.attribute {
            let mut nested = Vec::new();
            for sub in attr.g.iter().chain(&attr.graphs) {
                outer_scope_names(sub, &mut nested);
            }
            out.extend(nested.into_iter().filter(|n| !local.contains(n.as_str())));
        }
    }
    for value in &graph.output {
        if !local.contains(value.name.as_str()) {
            out.push(value.name.clone());
        }
    }
}
