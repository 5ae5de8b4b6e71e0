pub mod config;
pub mod error;
pub mod id;
pub mod layout;
pub mod model;
pub mod viewport;

pub use config::{EditorConfig, HitConfig, InfoBoxConfig, LayoutConfig, ZoomConfig};
pub use error::ModelError;
pub use id::{EdgeId, GraphId, NodeId, TaskId};
pub use layout::{apply_positions, beautify};
pub use model::*;
pub use viewport::{CanvasSize, Viewport};

/// Decode a node list as returned by `GET /api/nodes?graphId=`.
pub fn nodes_from_json(json: &str) -> Result<Vec<Node>, ModelError> {
    serde_json::from_str(json).map_err(|e| ModelError::decode("node list", e))
}

/// Decode an edge list as returned by `GET /api/edges?graphId=`.
pub fn edges_from_json(json: &str) -> Result<Vec<Edge>, ModelError> {
    serde_json::from_str(json).map_err(|e| ModelError::decode("edge list", e))
}

/// Decode a graph record as returned by `GET /api/graphs/:id`.
pub fn graph_from_json(json: &str) -> Result<GraphRecord, ModelError> {
    serde_json::from_str(json).map_err(|e| ModelError::decode("graph record", e))
}
