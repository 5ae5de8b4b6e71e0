//! Error types for the diagram model.

use crate::id::{EdgeId, NodeId};
use thiserror::Error;

/// Failures raised while mutating or loading a [`Diagram`](crate::Diagram).
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("unknown edge {0}")]
    UnknownEdge(EdgeId),

    #[error("node name must not be empty")]
    EmptyName,

    #[error("invalid color `{0}`")]
    InvalidColor(String),

    #[error("invalid editor config: {0}")]
    InvalidConfig(String),

    #[error("malformed {what}: {message}")]
    Decode { what: &'static str, message: String },
}

impl ModelError {
    pub fn decode(what: &'static str, err: serde_json::Error) -> Self {
        ModelError::Decode {
            what,
            message: err.to_string(),
        }
    }
}
