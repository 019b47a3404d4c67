//! onnxedit Editor - node registry, edit dispatch, and editing sessions

pub mod dispatch;
pub mod registry;
pub mod session;

pub use dispatch::{apply, coerce_opset};
pub use registry::NodeRegistry;
pub use session::{EditSession, NodeDetail, SessionHandle, SessionStore, SessionSummary};
