//! Edit dispatch - applies one `EditRequest` to a graph
//!
//! Every handler resolves and validates its references before it touches the
//! graph, so a failed edit leaves graph and registry exactly as they were.

use crate::registry::NodeRegistry;
use onnxedit_core::{EditOutcome, EditRequest, Error, IoSlot, NodeId, Result};
use onnxedit_graph::{Attribute, Graph, Node, NodeKey};
use serde_json::Value;
use tracing::{debug, warn};

pub fn apply(graph: &mut Graph, registry: &mut NodeRegistry, request: EditRequest) -> Result<EditOutcome> {
    let action = request.action();
    let node = request.node_id();
    let outcome = match request {
        // -------------------------------------------------------------------
        // Attributes
        // -------------------------------------------------------------------
        EditRequest::AddAttr {
            node_id,
            attr_name,
            attr_value,
            attr_type,
        } => {
            if let Some(ty) = attr_type {
                debug!(node = %node_id, attr = %attr_name, "ignoring attr_type {}", ty);
            }
            let node = node_mut(graph, registry, node_id)?;
            node.attrs.insert(attr_name, Attribute::from(attr_value));
            EditOutcome::Applied
        }

        EditRequest::RemoveAttr { node_id, attr_name } => {
            let node = node_mut(graph, registry, node_id)?;
            node.attrs
                .remove(&attr_name)
                .ok_or_else(|| Error::attribute_not_found(node_id, &attr_name))?;
            EditOutcome::Applied
        }

        EditRequest::ChangeAttrName {
            node_id,
            attr_name,
            new_name,
        } => {
            let node = node_mut(graph, registry, node_id)?;
            let idx = node
                .attrs
                .position(&attr_name)
                .ok_or_else(|| Error::attribute_not_found(node_id, &attr_name))?;
            if attr_name != new_name {
                if let Some(value) = node.attrs.remove(&attr_name) {
                    node.attrs.insert_at(idx, new_name, value);
                }
            }
            EditOutcome::Applied
        }

        EditRequest::ChangeAttrValue {
            node_id,
            attr_name,
            new_value,
        } => {
            let node = node_mut(graph, registry, node_id)?;
            node.attrs.insert(attr_name, Attribute::from(new_value));
            EditOutcome::Applied
        }

        EditRequest::ChangeAttrType {
            node_id,
            attr_name,
            new_type,
        } => {
            let node = node_mut(graph, registry, node_id)?;
            let attr = node
                .attrs
                .get_mut(&attr_name)
                .ok_or_else(|| Error::attribute_not_found(node_id, &attr_name))?;
            *attr = attr.convert(new_type)?;
            EditOutcome::Applied
        }

        // -------------------------------------------------------------------
        // Node properties
        // -------------------------------------------------------------------
        EditRequest::AddNode {
            node_id,
            node_name,
            node_op,
        } => {
            let key = graph.add_node(node_name, node_op);
            if let Some(previous) = registry.insert(node_id, key) {
                warn!(node = %node_id, "id was bound to {:?}; rebinding it to the new node", previous);
            }
            EditOutcome::Applied
        }

        EditRequest::RemoveNode { node_id } => {
            let key = live_key(graph, registry, node_id)?;
            registry.remove(node_id)?;
            graph.remove_node(key);
            EditOutcome::Applied
        }

        EditRequest::ChangeNodeName { node_id, new_name } => {
            node_mut(graph, registry, node_id)?.name = new_name;
            EditOutcome::Applied
        }

        EditRequest::ChangeNodeOp { node_id, new_op } => {
            node_mut(graph, registry, node_id)?.op_type = new_op;
            EditOutcome::Applied
        }

        EditRequest::ChangeNodeDescription {
            node_id,
            new_description,
        } => {
            node_mut(graph, registry, node_id)?.doc_string = new_description;
            EditOutcome::Applied
        }

        // -------------------------------------------------------------------
        // Node inputs & outputs
        // -------------------------------------------------------------------
        EditRequest::AddNodeInputOutput {
            node_id,
            io_name,
            input_or_output,
        } => {
            let key = live_key(graph, registry, node_id)?;
            graph.ensure_tensor(&io_name);
            node_by_key(graph, key, node_id)?
                .io_mut(input_or_output)
                .push(io_name);
            EditOutcome::Applied
        }

        EditRequest::RemoveNodeInputOutput {
            node_id,
            io_name,
            input_or_output,
        } => {
            let node = node_mut(graph, registry, node_id)?;
            let idx = find_io(node, input_or_output, &io_name)
                .ok_or_else(|| Error::io_not_found(node_id, input_or_output, &io_name))?;
            node.io_mut(input_or_output).remove(idx);
            EditOutcome::Applied
        }

        EditRequest::ChangeNodeInputOutput {
            node_id,
            old_name,
            new_name,
            input_or_output,
        } => {
            let key = live_key(graph, registry, node_id)?;
            let idx = graph
                .node(key)
                .and_then(|node| find_io(node, input_or_output, &old_name))
                .ok_or_else(|| Error::io_not_found(node_id, input_or_output, &old_name))?;
            graph.ensure_tensor(&new_name);
            node_by_key(graph, key, node_id)?.io_mut(input_or_output)[idx] = new_name;
            EditOutcome::Applied
        }

        // -------------------------------------------------------------------
        // Model properties
        // -------------------------------------------------------------------
        EditRequest::ChangeModelOpset { opset } => match coerce_opset(&opset) {
            Ok(version) => {
                graph.opset = version;
                EditOutcome::Applied
            }
            Err(e) => {
                warn!("change_model_opset ignored: {}", e);
                EditOutcome::skipped(e.to_string())
            }
        },

        EditRequest::ChangeModelProducer { producer } => {
            graph.producer_name = producer;
            EditOutcome::Applied
        }

        EditRequest::ChangeModelDescription { description } => {
            graph.doc_string = description;
            EditOutcome::Applied
        }

        // -------------------------------------------------------------------
        // Model inputs & outputs
        // -------------------------------------------------------------------
        EditRequest::AddModelInputOutput {
            io_name,
            input_or_output,
        } => {
            graph.ensure_tensor(&io_name);
            model_io_mut(graph, input_or_output).push(io_name);
            EditOutcome::Applied
        }

        EditRequest::RemoveModelInputOutput {
            io_name,
            input_or_output,
        } => {
            let list = model_io_mut(graph, input_or_output);
            let idx = list
                .iter()
                .position(|n| *n == io_name)
                .ok_or_else(|| Error::model_io_not_found(input_or_output, &io_name))?;
            list.remove(idx);
            EditOutcome::Applied
        }
    };

    debug!(action, ?node, ?outcome, "edit applied");
    Ok(outcome)
}

/// Coerce a loosely typed opset value to an integer.
///
/// Integers pass through, finite floats truncate, strings are parsed after
/// trimming, booleans count as 0/1. Anything else is a coercion error.
pub fn coerce_opset(value: &Value) -> Result<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .ok_or_else(|| Error::coercion(format!("opset {n} is out of range"))),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| Error::coercion(format!("opset '{s}' is not an integer"))),
        Value::Bool(b) => Ok(i64::from(*b)),
        other => Err(Error::coercion(format!("opset {other} is not an integer"))),
    }
}

/// Resolve `id` and make sure its node still exists.
fn live_key(graph: &Graph, registry: &NodeRegistry, id: NodeId) -> Result<NodeKey> {
    let key = registry.resolve(id)?;
    if graph.contains(key) {
        Ok(key)
    } else {
        Err(Error::NodeNotFound(id))
    }
}

fn node_mut<'g>(graph: &'g mut Graph, registry: &NodeRegistry, id: NodeId) -> Result<&'g mut Node> {
    let key = registry.resolve(id)?;
    node_by_key(graph, key, id)
}

fn node_by_key(graph: &mut Graph, key: NodeKey, id: NodeId) -> Result<&mut Node> {
    graph.node_mut(key).ok_or(Error::NodeNotFound(id))
}

fn find_io(node: &Node, slot: IoSlot, name: &str) -> Option<usize> {
    node.io(slot).iter().position(|n| n == name)
}

fn model_io_mut(graph: &mut Graph, slot: IoSlot) -> &mut Vec<String> {
    match slot {
        IoSlot::Input => &mut graph.inputs,
        IoSlot::Output => &mut graph.outputs,
    }
}
