//! Error types for tree primitives

use thiserror::Error;

use crate::{Key, Path};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("Node not found: {0}")]
    KeyNotFound(Key),

    #[error("No node at path {0:?}")]
    PathNotFound(Path),

    #[error("Node {0} cannot have children")]
    NotAContainer(Key),

    #[error("Node {0} is not a text node")]
    NotText(Key),

    #[error("Child index {index} out of range in node {key}")]
    IndexOutOfRange { key: Key, index: usize },

    #[error("Range {offset}..{end} out of bounds in node {key} of length {length}")]
    OffsetOutOfRange {
        key: Key,
        offset: usize,
        end: usize,
        length: usize,
    },

    #[error("Cannot join {second} into {first}: nodes are of different kinds")]
    JoinMismatch { first: Key, second: Key },

    #[error("The root node cannot be removed, moved or split")]
    RootNode,
}
