//! Tests for onnxedit-editor: NodeRegistry, edit dispatch, EditSession, SessionStore

use onnxedit_core::{
    AttrKind, AttrValue, EditOutcome, EditRequest, Error, IoSlot, NodeDescriptor, NodeId,
    SessionKey,
};
use onnxedit_editor::*;
use onnxedit_graph::onnx::{GraphProto, ModelProto, NodeProto, ValueInfoProto};
use onnxedit_graph::{Attribute, Graph};
use prost::Message;
use serde_json::json;

/// A(Relu: x -> y), B(Add: y, b -> z), C(Relu: z -> out)
fn chain() -> Graph {
    let mut graph = Graph::new("chain");
    graph.add_node_with_io("A", "Relu", &["x"], &["y"]);
    let b = graph.add_node_with_io("B", "Add", &["y", "b"], &["z"]);
    graph
        .node_mut(b)
        .unwrap()
        .attrs
        .insert("alpha", Attribute::Float(0.5));
    graph.add_node_with_io("C", "Relu", &["z"], &["out"]);
    graph.inputs = vec!["x".into(), "b".into()];
    graph.outputs = vec!["out".into()];
    graph
}

fn descriptor(id: u64, op: &str, inputs: &[&str], outputs: &[&str]) -> NodeDescriptor {
    NodeDescriptor {
        id: NodeId(id),
        op_type: op.into(),
        inputs: inputs.iter().map(|s| s.to_string()).collect(),
        outputs: outputs.iter().map(|s| s.to_string()).collect(),
    }
}

fn chain_bytes() -> Vec<u8> {
    let node = |name: &str, op: &str, i: &[&str], o: &[&str]| NodeProto {
        name: name.into(),
        op_type: op.into(),
        input: i.iter().map(|s| s.to_string()).collect(),
        output: o.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    };
    let info = |name: &str| ValueInfoProto {
        name: name.into(),
        ..Default::default()
    };
    ModelProto {
        ir_version: 8,
        graph: Some(GraphProto {
            name: "chain".into(),
            node: vec![
                node("A", "Relu", &["x"], &["y"]),
                node("B", "Add", &["y", "b"], &["z"]),
                node("C", "Relu", &["z"], &["out"]),
            ],
            input: vec![info("x"), info("b")],
            output: vec![info("out")],
            ..Default::default()
        }),
        ..Default::default()
    }
    .encode_to_vec()
}

fn edit(graph: &mut Graph, registry: &mut NodeRegistry, value: serde_json::Value) -> onnxedit_core::Result<EditOutcome> {
    apply(graph, registry, EditRequest::from_value(value)?)
}

fn node_of<'g>(graph: &'g Graph, registry: &NodeRegistry, id: u64) -> &'g onnxedit_graph::Node {
    graph.node(registry.resolve(NodeId(id)).unwrap()).unwrap()
}

// ===========================================================================
// NodeRegistry: build
// ===========================================================================

#[test]
fn build_assigns_dense_ids_in_graph_order() {
    let graph = chain();
    let reg = NodeRegistry::build(&graph);
    assert_eq!(reg.len(), 3);
    let ids: Vec<NodeId> = reg.ids().collect();
    assert_eq!(ids, vec![NodeId(0), NodeId(1), NodeId(2)]);
    for (idx, node) in graph.nodes().iter().enumerate() {
        assert_eq!(reg.resolve(NodeId(idx as u64)).unwrap(), node.key());
    }
}

#[test]
fn build_on_empty_graph_is_empty() {
    let reg = NodeRegistry::build(&Graph::new("empty"));
    assert!(reg.is_empty());
}

#[test]
fn resolve_unknown_id_is_not_found() {
    let reg = NodeRegistry::build(&chain());
    let err = reg.resolve(NodeId(42)).unwrap_err();
    assert!(matches!(err, Error::NodeNotFound(NodeId(42))));
    assert!(err.is_not_found());
}

#[test]
fn remove_unknown_id_is_not_found() {
    let mut reg = NodeRegistry::build(&chain());
    assert!(reg.remove(NodeId(9)).is_err());
    assert!(reg.remove(NodeId(1)).is_ok());
    assert!(reg.resolve(NodeId(1)).is_err());
    assert_eq!(reg.len(), 2);
}

#[test]
fn ids_survive_reordering_edits() {
    let mut graph = chain();
    let mut reg = NodeRegistry::build(&graph);
    let c_key = reg.resolve(NodeId(2)).unwrap();
    edit(&mut graph, &mut reg, json!({"action": "remove_node", "node_id": 0})).unwrap();
    assert_eq!(reg.resolve(NodeId(2)).unwrap(), c_key);
    assert_eq!(node_of(&graph, &reg, 2).name, "C");
}

// ===========================================================================
// NodeRegistry: reconcile
// ===========================================================================

#[test]
fn reconcile_binds_exact_description() {
    let graph = chain();
    let expected = vec![
        descriptor(10, "Relu", &["x"], &["y"]),
        descriptor(20, "Add", &["y", "b"], &["z"]),
        descriptor(30, "Relu", &["z"], &["out"]),
    ];
    let reg = NodeRegistry::reconcile(&graph, &expected).unwrap();
    assert_eq!(reg.len(), 3);
    assert_eq!(node_of(&graph, &reg, 20).name, "B");
    assert_eq!(reg.describe(&graph), expected);
}

#[test]
fn reconcile_skips_nodes_the_client_does_not_know() {
    let graph = chain();
    let expected = vec![descriptor(5, "Relu", &["z"], &["out"])];
    let reg = NodeRegistry::reconcile(&graph, &expected).unwrap();
    assert_eq!(reg.len(), 1);
    assert_eq!(node_of(&graph, &reg, 5).name, "C");
}

#[test]
fn reconcile_fails_when_one_entry_drifts() {
    let graph = chain();
    for altered in [
        descriptor(1, "Mul", &["y", "b"], &["z"]),
        descriptor(1, "Add", &["b", "y"], &["z"]),
        descriptor(1, "Add", &["y", "b"], &["w"]),
    ] {
        let expected = vec![
            descriptor(0, "Relu", &["x"], &["y"]),
            altered,
            descriptor(2, "Relu", &["z"], &["out"]),
        ];
        let err = NodeRegistry::reconcile(&graph, &expected).unwrap_err();
        assert!(matches!(err, Error::CountMismatch { expected: 3, .. }));
    }
}

#[test]
fn reconcile_is_order_sensitive() {
    let graph = chain();
    let expected = vec![
        descriptor(2, "Relu", &["z"], &["out"]),
        descriptor(0, "Relu", &["x"], &["y"]),
    ];
    let err = NodeRegistry::reconcile(&graph, &expected).unwrap_err();
    assert!(matches!(err, Error::CountMismatch { matched: 1, expected: 2 }));
}

// ===========================================================================
// Dispatch: attributes
// ===========================================================================

#[test]
fn add_attr_sets_and_overwrites() {
    let mut graph = chain();
    let mut reg = NodeRegistry::build(&graph);
    edit(&mut graph, &mut reg, json!({"action": "add_attr", "node_id": 0, "attr_name": "k", "attr_value": [1, 2], "attr_type": "ints"})).unwrap();
    assert_eq!(node_of(&graph, &reg, 0).attrs.get("k"), Some(&Attribute::Ints(vec![1, 2])));

    edit(&mut graph, &mut reg, json!({"action": "add_attr", "node_id": 0, "attr_name": "k", "attr_value": "same"})).unwrap();
    assert_eq!(node_of(&graph, &reg, 0).attrs.get("k"), Some(&Attribute::String("same".into())));
}

#[test]
fn remove_attr_requires_existing_attribute() {
    let mut graph = chain();
    let mut reg = NodeRegistry::build(&graph);
    let err = edit(&mut graph, &mut reg, json!({"action": "remove_attr", "node_id": 0, "attr_name": "alpha"})).unwrap_err();
    assert!(matches!(err, Error::AttributeNotFound { .. }));

    edit(&mut graph, &mut reg, json!({"action": "remove_attr", "node_id": 1, "attr_name": "alpha"})).unwrap();
    assert!(node_of(&graph, &reg, 1).attrs.is_empty());
}

#[test]
fn change_attr_name_on_missing_attribute_leaves_node_unchanged() {
    let mut graph = chain();
    let mut reg = NodeRegistry::build(&graph);
    let before = node_of(&graph, &reg, 0).clone();
    let err = edit(
        &mut graph,
        &mut reg,
        json!({"action": "change_attr_name", "node_id": 0, "attr_name": "old", "new_name": "new"}),
    )
    .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(node_of(&graph, &reg, 0), &before);
}

#[test]
fn change_attr_name_keeps_value_and_position() {
    let mut graph = chain();
    let mut reg = NodeRegistry::build(&graph);
    let key = reg.resolve(NodeId(1)).unwrap();
    graph.node_mut(key).unwrap().attrs.insert("beta", Attribute::Int(2));

    edit(&mut graph, &mut reg, json!({"action": "change_attr_name", "node_id": 1, "attr_name": "alpha", "new_name": "gamma"})).unwrap();
    let names: Vec<&str> = node_of(&graph, &reg, 1).attrs.keys().collect();
    assert_eq!(names, vec!["gamma", "beta"]);
    assert_eq!(node_of(&graph, &reg, 1).attrs.get("gamma"), Some(&Attribute::Float(0.5)));
}

#[test]
fn change_attr_value_is_idempotent_and_creates() {
    let mut graph = chain();
    let mut reg = NodeRegistry::build(&graph);
    let request = json!({"action": "change_attr_value", "node_id": 2, "attr_name": "mode", "new_value": "constant"});
    edit(&mut graph, &mut reg, request.clone()).unwrap();
    let once = graph.to_bytes();
    edit(&mut graph, &mut reg, request).unwrap();
    assert_eq!(graph.to_bytes(), once);
    assert_eq!(node_of(&graph, &reg, 2).attrs.get("mode"), Some(&Attribute::String("constant".into())));
}

#[test]
fn change_attr_type_converts_or_leaves_value() {
    let mut graph = chain();
    let mut reg = NodeRegistry::build(&graph);
    apply(&mut graph, &mut reg, EditRequest::ChangeAttrType {
        node_id: NodeId(1),
        attr_name: "alpha".into(),
        new_type: AttrKind::Floats,
    })
    .unwrap();
    assert_eq!(node_of(&graph, &reg, 1).attrs.get("alpha"), Some(&Attribute::Floats(vec![0.5])));

    apply(&mut graph, &mut reg, EditRequest::ChangeAttrValue {
        node_id: NodeId(1),
        attr_name: "alpha".into(),
        new_value: AttrValue::string("wide"),
    })
    .unwrap();
    let err = apply(&mut graph, &mut reg, EditRequest::ChangeAttrType {
        node_id: NodeId(1),
        attr_name: "alpha".into(),
        new_type: AttrKind::Int,
    })
    .unwrap_err();
    assert!(matches!(err, Error::Coercion(_)));
    assert_eq!(node_of(&graph, &reg, 1).attrs.get("alpha"), Some(&Attribute::String("wide".into())));
}

// ===========================================================================
// Dispatch: nodes
// ===========================================================================

#[test]
fn add_node_appends_and_binds() {
    let mut graph = chain();
    let mut reg = NodeRegistry::build(&graph);
    edit(&mut graph, &mut reg, json!({"action": "add_node", "node_id": 3, "node_name": "D", "node_op": "Sigmoid"})).unwrap();
    assert_eq!(graph.node_count(), 4);
    let d = node_of(&graph, &reg, 3);
    assert_eq!(d.op_type, "Sigmoid");
    assert!(d.inputs.is_empty() && d.outputs.is_empty());
    assert_eq!(graph.nodes().last().unwrap().name, "D");
}

#[test]
fn add_node_with_bound_id_rebinds() {
    let mut graph = chain();
    let mut reg = NodeRegistry::build(&graph);
    edit(&mut graph, &mut reg, json!({"action": "add_node", "node_id": 0, "node_name": "fresh", "node_op": "Relu"})).unwrap();
    assert_eq!(graph.node_count(), 4);
    assert_eq!(node_of(&graph, &reg, 0).name, "fresh");
    assert_eq!(reg.len(), 3);
}

#[test]
fn remove_unknown_node_leaves_graph_unchanged() {
    let mut graph = chain();
    let mut reg = NodeRegistry::build(&graph);
    edit(&mut graph, &mut reg, json!({"action": "add_node", "node_id": 3, "node_name": "D", "node_op": "Relu"})).unwrap();
    let err = edit(&mut graph, &mut reg, json!({"action": "remove_node", "node_id": 5})).unwrap_err();
    assert!(matches!(err, Error::NodeNotFound(NodeId(5))));
    assert_eq!(graph.node_count(), 4);
    assert_eq!(reg.len(), 4);
}

#[test]
fn remove_node_updates_graph_and_registry() {
    let mut graph = chain();
    let mut reg = NodeRegistry::build(&graph);
    edit(&mut graph, &mut reg, json!({"action": "remove_node", "node_id": 1})).unwrap();
    assert_eq!(graph.node_count(), 2);
    assert!(!reg.contains(NodeId(1)));
    let err = edit(&mut graph, &mut reg, json!({"action": "change_node_name", "node_id": 1, "new_name": "x"})).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn node_property_edits() {
    let mut graph = chain();
    let mut reg = NodeRegistry::build(&graph);
    edit(&mut graph, &mut reg, json!({"action": "change_node_name", "node_id": 0, "new_name": "C"})).unwrap();
    edit(&mut graph, &mut reg, json!({"action": "change_node_op", "node_id": 0, "new_op": "Tanh"})).unwrap();
    edit(&mut graph, &mut reg, json!({"action": "change_node_description", "node_id": 0, "new_description": "first"})).unwrap();
    let a = node_of(&graph, &reg, 0);
    assert_eq!(a.name, "C");
    assert_eq!(a.op_type, "Tanh");
    assert_eq!(a.doc_string, "first");
    assert_eq!(a.inputs, vec!["x"]);
}

// ===========================================================================
// Dispatch: node inputs & outputs
// ===========================================================================

#[test]
fn add_then_remove_node_io_restores_list() {
    let mut graph = chain();
    let mut reg = NodeRegistry::build(&graph);
    for slot in ["input", "output"] {
        let before = node_of(&graph, &reg, 1).clone();
        edit(&mut graph, &mut reg, json!({"action": "add_node_input_output", "node_id": 1, "io_name": "y", "input_or_output": slot})).unwrap();
        edit(&mut graph, &mut reg, json!({"action": "remove_node_input_output", "node_id": 1, "io_name": "y", "input_or_output": slot})).unwrap();
        let after = node_of(&graph, &reg, 1);
        assert_eq!(after.inputs, before.inputs);
        assert_eq!(after.outputs, before.outputs);
    }
}

#[test]
fn add_node_io_creates_tensor() {
    let mut graph = chain();
    let mut reg = NodeRegistry::build(&graph);
    assert!(graph.tensor("extra").is_none());
    edit(&mut graph, &mut reg, json!({"action": "add_node_input_output", "node_id": 2, "io_name": "extra", "input_or_output": "output"})).unwrap();
    assert!(graph.tensor("extra").is_some());
    assert_eq!(node_of(&graph, &reg, 2).outputs, vec!["out", "extra"]);
}

#[test]
fn remove_node_io_requires_name_in_list() {
    let mut graph = chain();
    let mut reg = NodeRegistry::build(&graph);
    let err = edit(&mut graph, &mut reg, json!({"action": "remove_node_input_output", "node_id": 0, "io_name": "y", "input_or_output": "input"})).unwrap_err();
    assert!(matches!(err, Error::IoNotFound { slot: IoSlot::Input, .. }));
    assert_eq!(node_of(&graph, &reg, 0).inputs, vec!["x"]);
}

#[test]
fn change_node_io_replaces_first_match() {
    let mut graph = chain();
    let mut reg = NodeRegistry::build(&graph);
    edit(&mut graph, &mut reg, json!({"action": "add_node_input_output", "node_id": 1, "io_name": "y", "input_or_output": "input"})).unwrap();
    edit(&mut graph, &mut reg, json!({"action": "change_node_input_output", "node_id": 1, "old_name": "y", "new_name": "q", "input_or_output": "input"})).unwrap();
    assert_eq!(node_of(&graph, &reg, 1).inputs, vec!["q", "b", "y"]);
    assert!(graph.tensor("q").is_some());

    let err = edit(&mut graph, &mut reg, json!({"action": "change_node_input_output", "node_id": 1, "old_name": "nope", "new_name": "fresh", "input_or_output": "output"})).unwrap_err();
    assert!(matches!(err, Error::IoNotFound { .. }));
    assert!(graph.tensor("fresh").is_none());
}

// ===========================================================================
// Dispatch: model properties and model inputs & outputs
// ===========================================================================

#[test]
fn change_model_opset_coerces() {
    let mut graph = chain();
    let mut reg = NodeRegistry::build(&graph);
    edit(&mut graph, &mut reg, json!({"action": "change_model_opset", "opset": "13"})).unwrap();
    assert_eq!(graph.opset, 13);
    edit(&mut graph, &mut reg, json!({"action": "change_model_opset", "opset": 15})).unwrap();
    assert_eq!(graph.opset, 15);
}

#[test]
fn non_numeric_opset_is_a_no_op() {
    let mut graph = chain();
    let mut reg = NodeRegistry::build(&graph);
    let before = graph.opset;
    let outcome = edit(&mut graph, &mut reg, json!({"action": "change_model_opset", "opset": "not_a_number"})).unwrap();
    assert!(matches!(outcome, EditOutcome::Skipped { .. }));
    assert_eq!(graph.opset, before);
}

#[test]
fn model_metadata_edits() {
    let mut graph = chain();
    let mut reg = NodeRegistry::build(&graph);
    edit(&mut graph, &mut reg, json!({"action": "change_model_description", "description": "edited"})).unwrap();
    edit(&mut graph, &mut reg, json!({"action": "change_model_producer", "producer": "onnxedit"})).unwrap();
    assert_eq!(graph.doc_string, "edited");
    assert_eq!(graph.producer_name, "onnxedit");
}

#[test]
fn model_io_add_and_remove() {
    let mut graph = chain();
    let mut reg = NodeRegistry::build(&graph);
    edit(&mut graph, &mut reg, json!({"action": "add_model_input_output", "io_name": "z", "input_or_output": "output"})).unwrap();
    assert_eq!(graph.outputs, vec!["out", "z"]);
    edit(&mut graph, &mut reg, json!({"action": "remove_model_input_output", "io_name": "x", "input_or_output": "input"})).unwrap();
    assert_eq!(graph.inputs, vec!["b"]);

    let err = edit(&mut graph, &mut reg, json!({"action": "remove_model_input_output", "io_name": "x", "input_or_output": "input"})).unwrap_err();
    assert!(matches!(err, Error::ModelIoNotFound { slot: IoSlot::Input, .. }));
    assert_eq!(graph.inputs, vec!["b"]);
}

// ===========================================================================
// Dispatch: request validation
// ===========================================================================

#[test]
fn unknown_action_is_rejected() {
    let mut graph = chain();
    let mut reg = NodeRegistry::build(&graph);
    let err = edit(&mut graph, &mut reg, json!({"action": "explode", "node_id": 0})).unwrap_err();
    assert!(matches!(err, Error::UnknownAction(a) if a == "explode"));
}

#[test]
fn missing_fields_are_invalid_requests() {
    let mut graph = chain();
    let mut reg = NodeRegistry::build(&graph);
    let err = edit(&mut graph, &mut reg, json!({"action": "change_node_name", "node_id": 0})).unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)));
    assert_eq!(node_of(&graph, &reg, 0).name, "A");
}

// ===========================================================================
// EditSession
// ===========================================================================

#[test]
fn session_opens_and_edits() {
    let mut session = EditSession::open(&chain_bytes()).unwrap();
    assert_eq!(session.registry().len(), 3);
    session
        .apply_json(json!({"action": "change_node_name", "node_id": 2, "new_name": "last"}))
        .unwrap();

    let reopened = EditSession::open(&session.to_bytes()).unwrap();
    assert_eq!(reopened.graph().nodes()[2].name, "last");
}

#[test]
fn session_rejects_malformed_model() {
    assert!(matches!(EditSession::open(b"not a model"), Err(Error::Parse(_))));
}

#[test]
fn session_assign_node_ids_keeps_registry_on_mismatch() {
    let mut session = EditSession::open(&chain_bytes()).unwrap();
    let bad = vec![descriptor(9, "Conv", &[], &[])];
    assert!(session.assign_node_ids(&bad).is_err());
    assert_eq!(session.registry().len(), 3);
    assert!(session.registry().contains(NodeId(0)));

    let good = vec![descriptor(7, "Add", &["y", "b"], &["z"])];
    assert_eq!(session.assign_node_ids(&good).unwrap(), 1);
    assert_eq!(session.describe(), good);
}

#[test]
fn session_cleanup_releases_ids_of_removed_nodes() {
    let mut session = EditSession::open(&chain_bytes()).unwrap();
    session
        .apply_json(json!({"action": "add_node", "node_id": 3, "node_name": "dead", "node_op": "Relu"}))
        .unwrap();
    session
        .apply_json(json!({"action": "add_node_input_output", "node_id": 3, "io_name": "unused", "input_or_output": "output"}))
        .unwrap();

    let report = session.cleanup().unwrap();
    assert_eq!(report.removed_nodes, 1);
    assert!(!session.registry().contains(NodeId(3)));
    let err = session
        .apply_json(json!({"action": "remove_node", "node_id": 3}))
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(session.registry().len(), 3);
}

#[test]
fn session_inspect_lists_every_node_with_attributes() {
    let mut session = EditSession::open(&chain_bytes()).unwrap();
    session
        .assign_node_ids(&[descriptor(7, "Add", &["y", "b"], &["z"])])
        .unwrap();
    session
        .apply_json(json!({"action": "add_attr", "node_id": 7, "attr_name": "alpha", "attr_value": 0.5}))
        .unwrap();

    let details = session.inspect();
    let ids: Vec<Option<NodeId>> = details.iter().map(|d| d.id).collect();
    assert_eq!(ids, vec![None, Some(NodeId(7)), None]);
    assert_eq!(details[1].name, "B");
    assert_eq!(details[1].inputs, vec!["y", "b"]);
    assert_eq!(serde_json::to_value(&details[1].attributes).unwrap(), json!({"alpha": 0.5}));
    assert!(details[0].attributes.is_empty());
}

// ===========================================================================
// SessionStore
// ===========================================================================

#[tokio::test]
async fn store_requires_open_model() {
    let store = SessionStore::new();
    let key = SessionKey::new("default");
    let err = store.with_session(&key, |s| Ok(s.graph().node_count())).await.unwrap_err();
    assert!(matches!(err, Error::NoModel));

    let minted = store.create();
    let err = store.with_session(&minted, |s| Ok(s.graph().node_count())).await.unwrap_err();
    assert!(matches!(err, Error::NoModel));
}

#[tokio::test]
async fn store_isolates_sessions() {
    let store = SessionStore::new();
    let a = SessionKey::new("a");
    let b = SessionKey::new("b");
    assert_eq!(store.open(&a, &chain_bytes()).await.unwrap(), 3);
    assert_eq!(store.open(&b, &chain_bytes()).await.unwrap(), 3);

    store
        .with_session(&a, |s| s.apply_json(json!({"action": "remove_node", "node_id": 0})))
        .await
        .unwrap();
    let a_nodes = store.with_session(&a, |s| Ok(s.graph().node_count())).await.unwrap();
    let b_nodes = store.with_session(&b, |s| Ok(s.graph().node_count())).await.unwrap();
    assert_eq!((a_nodes, b_nodes), (2, 3));

    let summaries = store.summaries().await;
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].key, a);
    assert_eq!(summaries[0].node_count, Some(2));
}

#[tokio::test]
async fn store_open_replaces_session() {
    let store = SessionStore::new();
    let key = SessionKey::new("s");
    store.open(&key, &chain_bytes()).await.unwrap();
    store
        .with_session(&key, |s| s.apply_json(json!({"action": "remove_node", "node_id": 0})))
        .await
        .unwrap();
    store.open(&key, &chain_bytes()).await.unwrap();
    let ids = store
        .with_session(&key, |s| Ok(s.registry().ids().collect::<Vec<_>>()))
        .await
        .unwrap();
    assert_eq!(ids, vec![NodeId(0), NodeId(1), NodeId(2)]);
}

#[tokio::test]
async fn store_failed_open_keeps_previous_model() {
    let store = SessionStore::new();
    let key = SessionKey::new("s");
    store.open(&key, &chain_bytes()).await.unwrap();
    assert!(store.open(&key, b"garbage").await.is_err());
    let nodes = store.with_session(&key, |s| Ok(s.graph().node_count())).await.unwrap();
    assert_eq!(nodes, 3);
}

#[tokio::test]
async fn store_remove_drops_session_and_model() {
    let store = SessionStore::new();
    let key = SessionKey::new("s");
    store.open(&key, &chain_bytes()).await.unwrap();
    assert!(store.remove(&key).is_some());
    assert!(store.is_empty());
    assert!(store.remove(&key).is_none());
    let err = store.with_session(&key, |s| Ok(s.graph().node_count())).await.unwrap_err();
    assert!(matches!(err, Error::NoModel));
}
