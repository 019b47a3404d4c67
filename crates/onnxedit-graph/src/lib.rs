//! onnxedit graph - the ONNX model as an editable in-memory graph
//!
//! Import decodes a serialized `ModelProto` into a [`Graph`]; export writes it
//! back. Fields the editor never touches are carried through unchanged.

pub mod attribute;
pub mod cleanup;
pub mod codec;
pub mod fold;
pub mod graph;
pub mod onnx;
pub mod ordered;

pub use attribute::Attribute;
pub use cleanup::CleanupReport;
pub use fold::FoldReport;
pub use graph::{Graph, Node, NodeKey, Tensor, DEFAULT_IR_VERSION, DEFAULT_OPSET};
pub use ordered::OrderedMap;
