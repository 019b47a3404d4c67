//! Constant folding
//!
//! Nodes whose inputs are all known constants are evaluated ahead of time and
//! replaced by initializers. Only a small set of shape-agnostic operators is
//! understood; anything else is left in the graph.

use crate::attribute::Attribute;
use crate::graph::{Graph, Node};
use crate::onnx::tensor_proto::{DataLocation, DataType};
use crate::onnx::TensorProto;
use onnxedit_core::{Error, Result};
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{info, warn};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FoldReport {
    pub folded_nodes: usize,
    /// Names of foldable nodes whose evaluation failed.
    pub skipped_nodes: Vec<String>,
}

const FOLDABLE_OPS: &[&str] = &[
    "Constant", "Identity", "Neg", "Cast", "Reshape", "Add", "Sub", "Mul", "Div",
];

impl Graph {
    pub fn fold_constants(&mut self) -> Result<FoldReport> {
        let order = self.topological_order()?;
        let graph_inputs: HashSet<&str> = self.inputs.iter().map(String::as_str).collect();
        let graph_outputs: HashSet<&str> = self.outputs.iter().map(String::as_str).collect();

        // Graph inputs may be overridden at run time even if they carry data.
        let mut constants: HashMap<String, TensorProto> = self
            .tensors
            .values()
            .filter(|t| !graph_inputs.contains(t.name.as_str()))
            .filter_map(|t| t.constant.clone().map(|c| (t.name.clone(), c)))
            .collect();

        let mut folded = Vec::new();
        let mut skipped_nodes = Vec::new();
        for idx in order {
            let node = &self.nodes[idx];
            if !FOLDABLE_OPS.contains(&node.op_type.as_str())
                || !(node.domain.is_empty() || node.domain == "ai.onnx")
                || node.outputs.len() != 1
                || node.outputs.iter().any(|o| graph_outputs.contains(o.as_str()))
            {
                continue;
            }
            let result = {
                let inputs: Option<Vec<&TensorProto>> =
                    node.inputs.iter().map(|n| constants.get(n)).collect();
                let Some(inputs) = inputs else { continue };
                evaluate(node, &inputs)
            };
            match result {
                Ok(mut value) => {
                    value.name = node.outputs[0].clone();
                    constants.insert(node.outputs[0].clone(), value);
                    folded.push(node.key());
                }
                Err(e) => {
                    warn!(node = %node.name, op = %node.op_type, "skipping constant folding: {}", e);
                    skipped_nodes.push(node.name.clone());
                }
            }
        }

        for key in &folded {
            if let Some(node) = self.remove_node(*key) {
                for out in &node.outputs {
                    if let Some(value) = constants.remove(out) {
                        self.set_constant(out, value);
                    }
                }
            }
        }

        info!(folded = folded.len(), skipped = skipped_nodes.len(), "folded constants in graph '{}'", self.name);
        Ok(FoldReport {
            folded_nodes: folded.len(),
            skipped_nodes,
        })
    }

    /// Node indices ordered so producers come before consumers.
    pub fn topological_order(&self) -> Result<Vec<usize>> {
        let producers = self.producers()?;
        let n = self.nodes.len();
        let mut indegree = vec![0usize; n];
        let mut consumers: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (idx, node) in self.nodes.iter().enumerate() {
            let deps: HashSet<usize> = node
                .inputs
                .iter()
                .cloned()
                .chain(node.implicit_inputs())
                .filter_map(|name| producers.get(name.as_str()).copied())
                .collect();
            indegree[idx] = deps.len();
            for dep in deps {
                consumers[dep].push(idx);
            }
        }

        let mut ready: VecDeque<usize> = (0..n).filter(|i| indegree[*i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(idx) = ready.pop_front() {
            order.push(idx);
            for &next in &consumers[idx] {
                indegree[next] -= 1;
                if indegree[next] == 0 {
                    ready.push_back(next);
                }
            }
        }
        if order.len() != n {
            let stuck = (0..n)
                .find(|i| indegree[*i] > 0)
                .map(|i| self.nodes[i].name.clone())
                .unwrap_or_default();
            return Err(Error::structural(format!(
                "graph contains a cycle through node '{stuck}'"
            )));
        }
        Ok(order)
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

type EvalResult<T> = std::result::Result<T, String>;

fn evaluate(node: &Node, inputs: &[&TensorProto]) -> EvalResult<TensorProto> {
    match node.op_type.as_str() {
        "Constant" => constant_value(node),
        "Identity" => {
            let [x] = inputs else {
                return Err(arity(1, inputs.len()));
            };
            Ok((*x).clone())
        }
        "Reshape" => {
            let [data, shape] = inputs else {
                return Err(arity(2, inputs.len()));
            };
            let allow_zero = node.attrs.get("allowzero").and_then(|a| a.as_int()) == Some(1);
            reshape(data, shape, allow_zero)
        }
        "Neg" => {
            let [x] = inputs else {
                return Err(arity(1, inputs.len()));
            };
            Ok(HostTensor::from_proto(x)?.neg().to_proto())
        }
        "Cast" => {
            let [x] = inputs else {
                return Err(arity(1, inputs.len()));
            };
            let to = node
                .attrs
                .get("to")
                .and_then(|a| a.as_int())
                .ok_or("Cast without integer 'to' attribute")?;
            let to = DataType::try_from(to as i32).map_err(|_| format!("unknown data type {to}"))?;
            Ok(HostTensor::from_proto(x)?.cast(to)?.to_proto())
        }
        "Add" | "Sub" | "Mul" | "Div" => {
            let [a, b] = inputs else {
                return Err(arity(2, inputs.len()));
            };
            let a = HostTensor::from_proto(a)?;
            let b = HostTensor::from_proto(b)?;
            Ok(a.binary(&b, BinaryOp::parse(&node.op_type))?.to_proto())
        }
        other => Err(format!("unsupported operator {other}")),
    }
}

fn arity(expected: usize, found: usize) -> String {
    format!("expected {expected} constant inputs, found {found}")
}

fn constant_value(node: &Node) -> EvalResult<TensorProto> {
    if let Some(t) = node.attrs.get("value").and_then(|a| a.as_tensor()) {
        return Ok(t.clone());
    }
    let host = match node.attrs.first() {
        Some(("value_int", Attribute::Int(v))) => HostTensor::scalar(Data::I64(vec![*v])),
        Some(("value_float", Attribute::Float(v))) => HostTensor::scalar(Data::F32(vec![*v])),
        Some(("value_ints", Attribute::Ints(v))) => HostTensor::vector(Data::I64(v.clone())),
        Some(("value_floats", Attribute::Floats(v))) => HostTensor::vector(Data::F32(v.clone())),
        _ => return Err("Constant without a supported value attribute".into()),
    };
    Ok(host.to_proto())
}

fn reshape(data: &TensorProto, shape: &TensorProto, allow_zero: bool) -> EvalResult<TensorProto> {
    let shape = match HostTensor::from_proto(shape)?.data {
        Data::I64(v) => v,
        _ => return Err("Reshape shape must be int64".into()),
    };
    let count = element_count(&data.dims)?;
    let mut dims = Vec::with_capacity(shape.len());
    let mut infer = None;
    for (i, d) in shape.iter().enumerate() {
        match *d {
            0 if !allow_zero => dims.push(
                *data
                    .dims
                    .get(i)
                    .ok_or("Reshape copies a dimension the input lacks")?,
            ),
            -1 if infer.is_none() => {
                infer = Some(i);
                dims.push(1);
            }
            d if d >= 0 => dims.push(d),
            d => return Err(format!("invalid Reshape dimension {d}")),
        }
    }
    if let Some(i) = infer {
        let known = element_count(&dims)?;
        if known == 0 || count % known != 0 {
            return Err("cannot infer Reshape dimension".into());
        }
        dims[i] = (count / known) as i64;
    }
    if element_count(&dims)? != count {
        return Err(format!("cannot reshape {:?} to {:?}", data.dims, dims));
    }
    let mut out = data.clone();
    out.dims = dims;
    Ok(out)
}

fn element_count(dims: &[i64]) -> EvalResult<usize> {
    dims.iter().try_fold(1usize, |acc, d| {
        let d = usize::try_from(*d).map_err(|_| format!("negative dimension {d}"))?;
        acc.checked_mul(d)
            .ok_or_else(|| format!("shape {dims:?} has too many elements"))
    })
}

// ---------------------------------------------------------------------------
// Host tensors
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
enum Data {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I32(Vec<i32>),
    I64(Vec<i64>),
}

#[derive(Clone, Debug, PartialEq)]
struct HostTensor {
    dims: Vec<usize>,
    data: Data,
}

#[derive(Clone, Copy)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    fn parse(op: &str) -> Self {
        match op {
            "Sub" => Self::Sub,
            "Mul" => Self::Mul,
            "Div" => Self::Div,
            _ => Self::Add,
        }
    }

    fn float<T>(self, a: T, b: T) -> EvalResult<T>
    where
        T: std::ops::Add<Output = T>
            + std::ops::Sub<Output = T>
            + std::ops::Mul<Output = T>
            + std::ops::Div<Output = T>,
    {
        Ok(match self {
            Self::Add => a + b,
            Self::Sub => a - b,
            Self::Mul => a * b,
            Self::Div => a / b,
        })
    }

    fn i64(self, a: i64, b: i64) -> EvalResult<i64> {
        match self {
            Self::Add => Ok(a.wrapping_add(b)),
            Self::Sub => Ok(a.wrapping_sub(b)),
            Self::Mul => Ok(a.wrapping_mul(b)),
            Self::Div => a.checked_div(b).ok_or_else(|| "integer division by zero".to_string()),
        }
    }

    fn i32(self, a: i32, b: i32) -> EvalResult<i32> {
        match self {
            Self::Add => Ok(a.wrapping_add(b)),
            Self::Sub => Ok(a.wrapping_sub(b)),
            Self::Mul => Ok(a.wrapping_mul(b)),
            Self::Div => a.checked_div(b).ok_or_else(|| "integer division by zero".to_string()),
        }
    }
}

impl HostTensor {
    fn scalar(data: Data) -> Self {
        Self {
            dims: Vec::new(),
            data,
        }
    }

    fn vector(data: Data) -> Self {
        let len = match &data {
            Data::F32(v) => v.len(),
            Data::F64(v) => v.len(),
            Data::I32(v) => v.len(),
            Data::I64(v) => v.len(),
        };
        Self {
            dims: vec![len],
            data,
        }
    }

    fn from_proto(proto: &TensorProto) -> EvalResult<Self> {
        if proto.data_location == DataLocation::External as i32 {
            return Err(format!("tensor '{}' stores its data externally", proto.name));
        }
        let count = element_count(&proto.dims)?;
        let raw = &proto.raw_data;
        let data = match DataType::try_from(proto.data_type) {
            Ok(DataType::Float) if !raw.is_empty() => Data::F32(
                raw.chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
            Ok(DataType::Float) => Data::F32(proto.float_data.clone()),
            Ok(DataType::Double) if !raw.is_empty() => Data::F64(
                raw.chunks_exact(8)
                    .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                    .collect(),
            ),
            Ok(DataType::Double) => Data::F64(proto.double_data.clone()),
            Ok(DataType::Int32) if !raw.is_empty() => Data::I32(
                raw.chunks_exact(4)
                    .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
            Ok(DataType::Int32) => Data::I32(proto.int32_data.clone()),
            Ok(DataType::Int64) if !raw.is_empty() => Data::I64(
                raw.chunks_exact(8)
                    .map(|c| i64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                    .collect(),
            ),
            Ok(DataType::Int64) => Data::I64(proto.int64_data.clone()),
            _ => return Err(format!("unsupported data type {}", proto.data_type)),
        };
        let tensor = Self {
            dims: proto.dims.iter().map(|d| *d as usize).collect(),
            data,
        };
        if tensor.len() != count {
            return Err(format!(
                "tensor '{}' holds {} elements but its shape needs {}",
                proto.name,
                tensor.len(),
                count
            ));
        }
        Ok(tensor)
    }

    fn to_proto(&self) -> TensorProto {
        let (data_type, raw_data) = match &self.data {
            Data::F32(v) => (DataType::Float, v.iter().flat_map(|x| x.to_le_bytes()).collect()),
            Data::F64(v) => (DataType::Double, v.iter().flat_map(|x| x.to_le_bytes()).collect()),
            Data::I32(v) => (DataType::Int32, v.iter().flat_map(|x| x.to_le_bytes()).collect()),
            Data::I64(v) => (DataType::Int64, v.iter().flat_map(|x| x.to_le_bytes()).collect()),
        };
        TensorProto {
            dims: self.dims.iter().map(|d| *d as i64).collect(),
            data_type: data_type as i32,
            raw_data,
            ..Default::default()
        }
    }

    fn len(&self) -> usize {
        match &self.data {
            Data::F32(v) => v.len(),
            Data::F64(v) => v.len(),
            Data::I32(v) => v.len(),
            Data::I64(v) => v.len(),
        }
    }

    fn neg(self) -> Self {
        let data = match self.data {
            Data::F32(v) => Data::F32(v.into_iter().map(|x| -x).collect()),
            Data::F64(v) => Data::F64(v.into_iter().map(|x| -x).collect()),
            Data::I32(v) => Data::I32(v.into_iter().map(i32::wrapping_neg).collect()),
            Data::I64(v) => Data::I64(v.into_iter().map(i64::wrapping_neg).collect()),
        };
        Self { data, ..self }
    }

    fn cast(self, to: DataType) -> EvalResult<Self> {
        macro_rules! convert {
            ($v:expr) => {
                match to {
                    DataType::Float => Data::F32($v.into_iter().map(|x| x as f32).collect()),
                    DataType::Double => Data::F64($v.into_iter().map(|x| x as f64).collect()),
                    DataType::Int32 => Data::I32($v.into_iter().map(|x| x as i32).collect()),
                    DataType::Int64 => Data::I64($v.into_iter().map(|x| x as i64).collect()),
                    other => return Err(format!("unsupported Cast target {other:?}")),
                }
            };
        }
        let data = match self.data {
            Data::F32(v) => convert!(v),
            Data::F64(v) => convert!(v),
            Data::I32(v) => convert!(v),
            Data::I64(v) => convert!(v),
        };
        Ok(Self { data, ..self })
    }

    fn binary(&self, other: &Self, op: BinaryOp) -> EvalResult<Self> {
        let dims = broadcast_shape(&self.dims, &other.dims)?;
        let data = match (&self.data, &other.data) {
            (Data::F32(a), Data::F32(b)) => {
                Data::F32(broadcast_zip(a, &self.dims, b, &other.dims, &dims, |x, y| op.float(x, y))?)
            }
            (Data::F64(a), Data::F64(b)) => {
                Data::F64(broadcast_zip(a, &self.dims, b, &other.dims, &dims, |x, y| op.float(x, y))?)
            }
            (Data::I32(a), Data::I32(b)) => {
                Data::I32(broadcast_zip(a, &self.dims, b, &other.dims, &dims, |x, y| op.i32(x, y))?)
            }
            (Data::I64(a), Data::I64(b)) => {
                Data::I64(broadcast_zip(a, &self.dims, b, &other.dims, &dims, |x, y| op.i64(x, y))?)
            }
            _ => return Err("operands have different data types".into()),
        };
        Ok(Self { dims, data })
    }
}

/// Numpy-style broadcast of two shapes.
fn broadcast_shape(a: &[usize], b: &[usize]) -> EvalResult<Vec<usize>> {
    let rank = a.len().max(b.len());
    let mut out = vec![0; rank];
    for i in 0..rank {
        let da = if i < rank - a.len() { 1 } else { a[i - (rank - a.len())] };
        let db = if i < rank - b.len() { 1 } else { b[i - (rank - b.len())] };
        out[i] = match (da, db) {
            (x, y) if x == y => x,
            (1, y) => y,
            (x, 1) => x,
            (x, y) => return Err(format!("cannot broadcast {a:?} with {b:?} ({x} vs {y})")),
        };
    }
    Ok(out)
}

/// Row-major strides of `dims` aligned to `out`, zero along broadcast axes.
fn broadcast_strides(dims: &[usize], out: &[usize]) -> Vec<usize> {
    let pad = out.len() - dims.len();
    let mut strides = vec![0; out.len()];
    let mut stride = 1;
    for i in (0..dims.len()).rev() {
        strides[pad + i] = if dims[i] == 1 && out[pad + i] != 1 { 0 } else { stride };
        stride *= dims[i];
    }
    strides
}

fn broadcast_zip<T: Copy>(
    a: &[T],
    a_dims: &[usize],
    b: &[T],
    b_dims: &[usize],
    out_dims: &[usize],
    f: impl Fn(T, T) -> EvalResult<T>,
) -> EvalResult<Vec<T>> {
    let a_strides = broadcast_strides(a_dims, out_dims);
    let b_strides = broadcast_strides(b_dims, out_dims);
    let total = out_dims
        .iter()
        .try_fold(1usize, |acc, d| acc.checked_mul(*d))
        .ok_or_else(|| format!("shape {out_dims:?} has too many elements"))?;
    let mut index = vec![0usize; out_dims.len()];
    let mut out = Vec::with_capacity(total);
    for _ in 0..total {
        let ai: usize = index.iter().zip(&a_strides).map(|(i, s)| i * s).sum();
        let bi: usize = index.iter().zip(&b_strides).map(|(i, s)| i * s).sum();
        out.push(f(a[ai], b[bi])?);
        for d in (0..out_dims.len()).rev() {
            index[d] += 1;
            if index[d] < out_dims[d] {
                break;
            }
            index[d] = 0;
        }
    }
    Ok(out)
}
