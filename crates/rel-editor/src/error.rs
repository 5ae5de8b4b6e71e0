//! Error types for editor actions and the persistence boundary.

use rel_core::{EdgeId, ModelError, NodeId, TaskId};
use thiserror::Error;

/// A user action rejected before anything is mutated or sent.
#[derive(Debug, Error, PartialEq)]
pub enum EditorError {
    #[error("node name must not be empty")]
    EmptyName,

    #[error("task title must not be empty")]
    EmptyTaskTitle,

    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("unknown edge {0}")]
    UnknownEdge(EdgeId),

    #[error("unknown task {0}")]
    UnknownTask(TaskId),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// A failed REST call. Always recoverable: the optimistic local state is
/// kept and the operation is retried with the next save.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ApiError {
    #[error("server responded {status}: {message}")]
    Status { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("{what} response has no id")]
    MissingId { what: &'static str },
}
