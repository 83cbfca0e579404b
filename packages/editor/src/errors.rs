//! Error types for the editor

use folio_model::{Key, NodeError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    #[error("Unknown operation type: \"{0}\"")]
    UnknownOperation(String),

    #[error("Unexpected number of successive normalizations on node {key} ({calls} repairs)")]
    NormalizationLimit { key: Key, calls: usize },

    #[error("Range is unset")]
    UnsetRange,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = TransformError> = std::result::Result<T, E>;
