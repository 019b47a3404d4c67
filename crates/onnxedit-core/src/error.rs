//! Error types for onnxedit

use crate::protocol::IoSlot;
use crate::types::{NodeId, SessionKey};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("attribute not found: node {node} has no attribute '{name}'")]
    AttributeNotFound { node: NodeId, name: String },

    #[error("{slot} not found: node {node} has no {slot} named '{name}'")]
    IoNotFound {
        node: NodeId,
        slot: IoSlot,
        name: String,
    },

    #[error("model {slot} not found: '{name}'")]
    ModelIoNotFound { slot: IoSlot, name: String },

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("node id mismatch: only found {matched} matching nodes out of the required {expected}")]
    CountMismatch { matched: usize, expected: usize },

    #[error("coercion error: {0}")]
    Coercion(String),

    #[error("structural error: {0}")]
    Structural(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("session not found: {0}")]
    SessionNotFound(SessionKey),

    #[error("no model is open")]
    NoModel,

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn attribute_not_found(node: NodeId, name: impl Into<String>) -> Self {
        Self::AttributeNotFound {
            node,
            name: name.into(),
        }
    }

    pub fn io_not_found(node: NodeId, slot: IoSlot, name: impl Into<String>) -> Self {
        Self::IoNotFound {
            node,
            slot,
            name: name.into(),
        }
    }

    pub fn model_io_not_found(slot: IoSlot, name: impl Into<String>) -> Self {
        Self::ModelIoNotFound {
            slot,
            name: name.into(),
        }
    }

    pub fn structural(message: impl Into<String>) -> Self {
        Self::Structural(message.into())
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    pub fn coercion(message: impl Into<String>) -> Self {
        Self::Coercion(message.into())
    }

    /// True for failures caused by a reference to something that does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NodeNotFound(_)
                | Self::AttributeNotFound { .. }
                | Self::IoNotFound { .. }
                | Self::SessionNotFound(_)
        )
    }

    /// Short machine-readable tag, sent to clients alongside the message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NodeNotFound(_) => "node_not_found",
            Self::AttributeNotFound { .. } => "attribute_not_found",
            Self::IoNotFound { .. } => "io_not_found",
            Self::ModelIoNotFound { .. } => "model_io_not_found",
            Self::UnknownAction(_) => "unknown_action",
            Self::InvalidRequest(_) => "invalid_request",
            Self::CountMismatch { .. } => "count_mismatch",
            Self::Coercion(_) => "coercion",
            Self::Structural(_) => "structural",
            Self::Parse(_) => "parse",
            Self::SessionNotFound(_) => "session_not_found",
            Self::NoModel => "no_model",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Internal(_) => "internal",
        }
    }
}
