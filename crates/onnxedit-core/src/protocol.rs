//! Edit protocol - the JSON vocabulary spoken by the browser GUI
//!
//! Wire format:
//!
//! Edit request (POST /model/edit), tagged by `action`:
//!   { "action": "change_attr_value", "node_id": 3, "attr_name": "alpha", "new_value": 0.2 }
//!   { "action": "add_node_input_output", "node_id": 3, "io_name": "x", "input_or_output": "input" }
//!
//! Reconciliation sequence (POST /model/assign_node_ids), one array per node:
//!   [ [0, "Relu", ["x"], ["y"]], [1, "Add", ["y", "b"], ["z"]] ]

use crate::error::{Error, Result};
use crate::types::NodeId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Shared field types
// ---------------------------------------------------------------------------

/// Selects which of the two parallel lists (inputs or outputs) an action targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IoSlot {
    Input,
    Output,
}

impl IoSlot {
    pub fn is_input(self) -> bool {
        matches!(self, Self::Input)
    }
}

impl std::fmt::Display for IoSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
        }
    }
}

/// Loosely typed attribute value as the GUI sends it.
///
/// Numbers keep the integer/float distinction of their JSON spelling, so `3`
/// becomes an INT attribute and `3.0` a FLOAT one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Number(serde_json::Number),
    String(String),
    NumberList(Vec<serde_json::Number>),
    StringList(Vec<String>),
}

impl AttrValue {
    pub fn int(v: i64) -> Self {
        Self::Number(v.into())
    }

    /// Non-finite floats have no JSON spelling and come back as `None`.
    pub fn float(v: f64) -> Option<Self> {
        serde_json::Number::from_f64(v).map(Self::Number)
    }

    pub fn string(v: impl Into<String>) -> Self {
        Self::String(v.into())
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        Self::int(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        Self::string(v)
    }
}

impl From<Vec<i64>> for AttrValue {
    fn from(v: Vec<i64>) -> Self {
        Self::NumberList(v.into_iter().map(Into::into).collect())
    }
}

impl From<Vec<String>> for AttrValue {
    fn from(v: Vec<String>) -> Self {
        Self::StringList(v)
    }
}

/// Target type for `change_attr_type`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttrKind {
    Int,
    Float,
    String,
    Ints,
    Floats,
    Strings,
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// One entry of a reconciliation sequence: the client's view of a node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "(NodeId, String, Vec<String>, Vec<String>)",
    into = "(NodeId, String, Vec<String>, Vec<String>)"
)]
pub struct NodeDescriptor {
    pub id: NodeId,
    pub op_type: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

impl From<(NodeId, String, Vec<String>, Vec<String>)> for NodeDescriptor {
    fn from((id, op_type, inputs, outputs): (NodeId, String, Vec<String>, Vec<String>)) -> Self {
        Self {
            id,
            op_type,
            inputs,
            outputs,
        }
    }
}

impl From<NodeDescriptor> for (NodeId, String, Vec<String>, Vec<String>) {
    fn from(d: NodeDescriptor) -> Self {
        (d.id, d.op_type, d.inputs, d.outputs)
    }
}

// ---------------------------------------------------------------------------
// Edit requests
// ---------------------------------------------------------------------------

/// A single structured edit. Each variant carries exactly the fields its
/// handler needs; missing or mistyped fields are rejected at deserialization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum EditRequest {
    // Attributes.
    AddAttr {
        node_id: NodeId,
        attr_name: String,
        attr_value: AttrValue,
        /// Accepted for compatibility with the GUI client; has no effect.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attr_type: Option<Value>,
    },
    RemoveAttr {
        node_id: NodeId,
        attr_name: String,
    },
    ChangeAttrName {
        node_id: NodeId,
        attr_name: String,
        new_name: String,
    },
    ChangeAttrValue {
        node_id: NodeId,
        attr_name: String,
        new_value: AttrValue,
    },
    ChangeAttrType {
        node_id: NodeId,
        attr_name: String,
        new_type: AttrKind,
    },

    // Node properties.
    AddNode {
        node_id: NodeId,
        node_name: String,
        node_op: String,
    },
    RemoveNode {
        node_id: NodeId,
    },
    ChangeNodeName {
        node_id: NodeId,
        new_name: String,
    },
    ChangeNodeOp {
        node_id: NodeId,
        new_op: String,
    },
    ChangeNodeDescription {
        node_id: NodeId,
        new_description: String,
    },

    // Node inputs & outputs.
    AddNodeInputOutput {
        node_id: NodeId,
        io_name: String,
        input_or_output: IoSlot,
    },
    RemoveNodeInputOutput {
        node_id: NodeId,
        io_name: String,
        input_or_output: IoSlot,
    },
    ChangeNodeInputOutput {
        node_id: NodeId,
        old_name: String,
        new_name: String,
        input_or_output: IoSlot,
    },

    // Model properties.
    ChangeModelOpset {
        opset: Value,
    },
    ChangeModelProducer {
        producer: String,
    },
    ChangeModelDescription {
        description: String,
    },

    // Model inputs & outputs.
    AddModelInputOutput {
        io_name: String,
        input_or_output: IoSlot,
    },
    RemoveModelInputOutput {
        io_name: String,
        input_or_output: IoSlot,
    },
}

impl EditRequest {
    /// Every action tag the dispatcher understands.
    pub const ACTIONS: &'static [&'static str] = &[
        "add_attr",
        "remove_attr",
        "change_attr_name",
        "change_attr_value",
        "change_attr_type",
        "add_node",
        "remove_node",
        "change_node_name",
        "change_node_op",
        "change_node_description",
        "add_node_input_output",
        "remove_node_input_output",
        "change_node_input_output",
        "change_model_opset",
        "change_model_producer",
        "change_model_description",
        "add_model_input_output",
        "remove_model_input_output",
    ];

    /// Parse a raw JSON edit, telling an unknown action tag apart from a
    /// known action with bad fields.
    pub fn from_value(value: Value) -> Result<Self> {
        let action = value
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidRequest("missing string field 'action'".into()))?
            .to_string();
        if !Self::ACTIONS.contains(&action.as_str()) {
            return Err(Error::UnknownAction(action));
        }
        serde_json::from_value(value).map_err(|e| Error::InvalidRequest(format!("{action}: {e}")))
    }

    pub fn action(&self) -> &'static str {
        match self {
            Self::AddAttr { .. } => "add_attr",
            Self::RemoveAttr { .. } => "remove_attr",
            Self::ChangeAttrName { .. } => "change_attr_name",
            Self::ChangeAttrValue { .. } => "change_attr_value",
            Self::ChangeAttrType { .. } => "change_attr_type",
            Self::AddNode { .. } => "add_node",
            Self::RemoveNode { .. } => "remove_node",
            Self::ChangeNodeName { .. } => "change_node_name",
            Self::ChangeNodeOp { .. } => "change_node_op",
            Self::ChangeNodeDescription { .. } => "change_node_description",
            Self::AddNodeInputOutput { .. } => "add_node_input_output",
            Self::RemoveNodeInputOutput { .. } => "remove_node_input_output",
            Self::ChangeNodeInputOutput { .. } => "change_node_input_output",
            Self::ChangeModelOpset { .. } => "change_model_opset",
            Self::ChangeModelProducer { .. } => "change_model_producer",
            Self::ChangeModelDescription { .. } => "change_model_description",
            Self::AddModelInputOutput { .. } => "add_model_input_output",
            Self::RemoveModelInputOutput { .. } => "remove_model_input_output",
        }
    }

    /// The node this edit addresses, if it is a node-level edit.
    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            Self::AddAttr { node_id, .. }
            | Self::RemoveAttr { node_id, .. }
            | Self::ChangeAttrName { node_id, .. }
            | Self::ChangeAttrValue { node_id, .. }
            | Self::ChangeAttrType { node_id, .. }
            | Self::AddNode { node_id, .. }
            | Self::RemoveNode { node_id }
            | Self::ChangeNodeName { node_id, .. }
            | Self::ChangeNodeOp { node_id, .. }
            | Self::ChangeNodeDescription { node_id, .. }
            | Self::AddNodeInputOutput { node_id, .. }
            | Self::RemoveNodeInputOutput { node_id, .. }
            | Self::ChangeNodeInputOutput { node_id, .. } => Some(*node_id),
            Self::ChangeModelOpset { .. }
            | Self::ChangeModelProducer { .. }
            | Self::ChangeModelDescription { .. }
            | Self::AddModelInputOutput { .. }
            | Self::RemoveModelInputOutput { .. } => None,
        }
    }
}

/// Result of applying one edit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EditOutcome {
    Applied,
    /// The edit was accepted but left the graph untouched.
    Skipped { reason: String },
}

impl EditOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}
