//! Import and export between serialized ONNX models and `Graph`

use crate::graph::{Graph, DEFAULT_OPSET};
use crate::onnx::{
    type_proto, tensor_shape_proto, ModelProto, OperatorSetIdProto, TensorShapeProto, TypeProto,
    ValueInfoProto,
};
use onnxedit_core::{Error, Result};
use prost::Message;
use std::path::Path;
use tracing::debug;

fn is_default_domain(domain: &str) -> bool {
    domain.is_empty() || domain == "ai.onnx"
}

impl Graph {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let model = ModelProto::decode(bytes)
            .map_err(|e| Error::parse(format!("invalid ONNX model: {e}")))?;
        Self::from_model(model)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_bytes(&bytes)
    }

    pub fn from_model(mut model: ModelProto) -> Result<Self> {
        let mut proto = model
            .graph
            .take()
            .ok_or_else(|| Error::parse("model has no graph"))?;

        let mut graph = Graph::new(std::mem::take(&mut proto.name));
        graph.doc_string = std::mem::take(&mut proto.doc_string);
        graph.producer_name = std::mem::take(&mut model.producer_name);
        graph.opset = model
            .opset_import
            .iter()
            .find(|o| is_default_domain(&o.domain))
            .map(|o| o.version)
            .unwrap_or(DEFAULT_OPSET);

        for init in std::mem::take(&mut proto.initializer) {
            let name = init.name.clone();
            graph.tensor_entry(&name).constant = Some(init);
        }
        for info in std::mem::take(&mut proto.value_info) {
            let name = info.name.clone();
            graph.tensor_entry(&name).info = Some(info);
        }
        for info in std::mem::take(&mut proto.input) {
            graph.inputs.push(info.name.clone());
            let name = info.name.clone();
            graph.tensor_entry(&name).info = Some(info);
        }
        for info in std::mem::take(&mut proto.output) {
            graph.outputs.push(info.name.clone());
            let name = info.name.clone();
            graph.tensor_entry(&name).info = Some(info);
        }
        for node in std::mem::take(&mut proto.node) {
            graph.push_proto_node(node);
        }

        debug!(
            nodes = graph.node_count(),
            tensors = graph.tensor_count(),
            opset = graph.opset,
            "imported graph '{}'",
            graph.name
        );
        graph.graph_rest = proto;
        graph.model = model;
        Ok(graph)
    }

    pub fn to_model(&self) -> ModelProto {
        let mut model = self.model.clone();
        model.producer_name = self.producer_name.clone();
        match model
            .opset_import
            .iter_mut()
            .find(|o| is_default_domain(&o.domain))
        {
            Some(entry) => entry.version = self.opset,
            None => model.opset_import.push(OperatorSetIdProto {
                domain: String::new(),
                version: self.opset,
            }),
        }

        let mut proto = self.graph_rest.clone();
        proto.name = self.name.clone();
        proto.doc_string = self.doc_string.clone();
        proto.node = self.nodes.iter().map(|n| n.to_proto()).collect();
        proto.initializer = self
            .tensors
            .values()
            .filter_map(|t| t.constant.clone())
            .collect();
        proto.input = self.inputs.iter().map(|n| self.value_info_for(n)).collect();
        proto.output = self.outputs.iter().map(|n| self.value_info_for(n)).collect();
        proto.value_info = self
            .tensors
            .values()
            .filter(|t| !self.inputs.contains(&t.name) && !self.outputs.contains(&t.name))
            .filter_map(|t| t.info.clone())
            .collect();

        model.graph = Some(proto);
        model
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_model().encode_to_vec()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_bytes())?;
        Ok(())
    }

    /// Declared info for a top-level input/output. Constants without a
    /// declaration get one derived from their data; anything else is emitted
    /// with its name only.
    fn value_info_for(&self, name: &str) -> ValueInfoProto {
        let tensor = self.tensors.get(name);
        if let Some(info) = tensor.and_then(|t| t.info.clone()) {
            return info;
        }
        let r#type = tensor.and_then(|t| t.constant.as_ref()).map(|c| TypeProto {
            denotation: String::new(),
            value: Some(type_proto::Value::TensorType(type_proto::Tensor {
                elem_type: c.data_type,
                shape: Some(TensorShapeProto {
                    dim: c
                        .dims
                        .iter()
                        .map(|d| tensor_shape_proto::Dimension {
                            denotation: String::new(),
                            value: Some(tensor_shape_proto::dimension::Value::DimValue(*d)),
                        })
                        .collect(),
                }),
            })),
        });
        ValueInfoProto {
            name: name.to_string(),
            r#type,
            ..Default::default()
        }
    }
}
