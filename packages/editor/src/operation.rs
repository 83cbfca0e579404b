//! # Operations
//!
//! The primitive, path-addressed edits every transform is built from.
//!
//! Operations are plain serializable records. A log of operations recorded by
//! one transform can be replayed against the same starting state to rebuild
//! the same document, which is what makes them suitable for syncing.
//!
//! ## Wire format
//!
//! ```json
//! { "type": "insert_text", "path": [0, 0], "offset": 3, "text": "abc" }
//! { "type": "move_node", "path": [1, 0], "newPath": [0], "newIndex": 2 }
//! ```

use folio_model::{Mark, MarkProperties, Marks, Node, NodeProperties, Path, SelectionProperties};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{Result, TransformError};

/// Primitive edit addressed by path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    InsertText {
        path: Path,
        offset: usize,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        marks: Option<Marks>,
    },

    RemoveText {
        path: Path,
        offset: usize,
        length: usize,
    },

    AddMark {
        path: Path,
        offset: usize,
        length: usize,
        mark: Mark,
    },

    RemoveMark {
        path: Path,
        offset: usize,
        length: usize,
        mark: Mark,
    },

    SetMark {
        path: Path,
        offset: usize,
        length: usize,
        mark: Mark,
        properties: MarkProperties,
    },

    /// Insert `node` as child `index` of the container at `path`
    InsertNode {
        path: Path,
        index: usize,
        node: Node,
    },

    RemoveNode {
        path: Path,
    },

    /// Move the node at `path` to child `new_index` of the container at
    /// `new_path`. Both paths refer to the document before the move.
    MoveNode {
        path: Path,
        #[serde(rename = "newPath")]
        new_path: Path,
        #[serde(rename = "newIndex")]
        new_index: usize,
    },

    SetNode {
        path: Path,
        properties: NodeProperties,
    },

    /// Append the node at `path` to the node at `with_path`
    JoinNode {
        path: Path,
        #[serde(rename = "withPath")]
        with_path: Path,
    },

    SplitNode {
        path: Path,
        offset: usize,
    },

    SetSelection {
        properties: SelectionProperties,
    },
}

const OPERATION_TYPES: &[&str] = &[
    "insert_text",
    "remove_text",
    "add_mark",
    "remove_mark",
    "set_mark",
    "insert_node",
    "remove_node",
    "move_node",
    "set_node",
    "join_node",
    "split_node",
    "set_selection",
];

impl Operation {
    /// Wire name of this operation
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::InsertText { .. } => "insert_text",
            Operation::RemoveText { .. } => "remove_text",
            Operation::AddMark { .. } => "add_mark",
            Operation::RemoveMark { .. } => "remove_mark",
            Operation::SetMark { .. } => "set_mark",
            Operation::InsertNode { .. } => "insert_node",
            Operation::RemoveNode { .. } => "remove_node",
            Operation::MoveNode { .. } => "move_node",
            Operation::SetNode { .. } => "set_node",
            Operation::JoinNode { .. } => "join_node",
            Operation::SplitNode { .. } => "split_node",
            Operation::SetSelection { .. } => "set_selection",
        }
    }

    /// Path of the node the operation targets; `None` for selection changes.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Operation::InsertText { path, .. }
            | Operation::RemoveText { path, .. }
            | Operation::AddMark { path, .. }
            | Operation::RemoveMark { path, .. }
            | Operation::SetMark { path, .. }
            | Operation::InsertNode { path, .. }
            | Operation::RemoveNode { path }
            | Operation::MoveNode { path, .. }
            | Operation::SetNode { path, .. }
            | Operation::JoinNode { path, .. }
            | Operation::SplitNode { path, .. } => Some(path),
            Operation::SetSelection { .. } => None,
        }
    }

    /// Decodes an operation, rejecting unknown `type` tags with
    /// [`TransformError::UnknownOperation`].
    pub fn from_value(value: Value) -> Result<Self> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if !OPERATION_TYPES.contains(&kind) {
            return Err(TransformError::UnknownOperation(kind.to_string()));
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Decodes a JSON array of operations
pub fn operations_from_json(json: &str) -> Result<Vec<Operation>> {
    let values: Vec<Value> = serde_json::from_str(json)?;
    values.into_iter().map(Operation::from_value).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operation_serialization() {
        let operation = Operation::MoveNode {
            path: vec![1, 0],
            new_path: vec![0],
            new_index: 2,
        };

        let value = serde_json::to_value(&operation).unwrap();
        assert_eq!(
            value,
            json!({ "type": "move_node", "path": [1, 0], "newPath": [0], "newIndex": 2 })
        );

        let deserialized = Operation::from_value(value).unwrap();
        assert_eq!(operation, deserialized);
    }

    #[test]
    fn test_insert_text_marks_are_optional() {
        let operation =
            Operation::from_json(r#"{"type":"insert_text","path":[0,0],"offset":1,"text":"x"}"#)
                .unwrap();
        assert!(matches!(operation, Operation::InsertText { marks: None, .. }));
        assert!(!operation.to_json().unwrap().contains("marks"));
    }

    #[test]
    fn test_unknown_operation_is_rejected() {
        let err = Operation::from_value(json!({ "type": "explode", "path": [] })).unwrap_err();
        assert!(matches!(err, TransformError::UnknownOperation(kind) if kind == "explode"));

        let err = Operation::from_value(json!({ "path": [] })).unwrap_err();
        assert!(matches!(err, TransformError::UnknownOperation(_)));
    }

    #[test]
    fn test_malformed_operation_is_a_serialization_error() {
        let err = Operation::from_value(json!({ "type": "remove_text", "path": [0] })).unwrap_err();
        assert!(matches!(err, TransformError::Serialization(_)));
    }

    #[test]
    fn test_operation_log_decoding() {
        let operations = operations_from_json(
            r#"[
                {"type":"split_node","path":[0],"offset":2},
                {"type":"set_selection","properties":{"anchorPath":[0,0],"anchorOffset":1}}
            ]"#,
        )
        .unwrap();
        assert_eq!(operations.len(), 2);
        assert_eq!(operations[0].kind(), "split_node");
        assert!(operations[1].path().is_none());
    }
}
