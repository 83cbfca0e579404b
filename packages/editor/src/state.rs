//! # Editor State
//!
//! An immutable snapshot: one document tree plus one selection.
//!
//! ```text
//! State ──transform()──▶ Transform ──ops──▶ Transform ──commit()──▶ State
//! ```
//!
//! States are cheap to clone. The document sits behind an `Arc` and shares
//! untouched subtrees with every earlier snapshot it was derived from.

use std::sync::Arc;

use folio_model::{Node, Selection};
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::{Operation, Transform};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub document: Arc<Node>,
    #[serde(default)]
    pub selection: Selection,
}

impl State {
    /// State with an unset selection
    pub fn new(document: Node) -> Self {
        Self {
            document: Arc::new(document),
            selection: Selection::default(),
        }
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Begin a transform on this state with the core schema
    pub fn transform(&self) -> Transform {
        Transform::new(self.clone())
    }

    /// Apply a single operation, without recording or normalizing it
    pub fn apply(&self, operation: &Operation) -> Result<State> {
        operation.apply(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_json() {
        let document = Node::document([Node::block("p", [Node::leaf("hi").with_key("t")])]);
        let state = State::new(document).with_selection(Selection::collapsed("t".into(), 1));

        let json = state.to_json().unwrap();
        let restored = State::from_json(&json).unwrap();
        assert_eq!(restored, state);
    }

    #[test]
    fn test_selection_defaults_to_unset() {
        let state = State::from_json(r#"{"document":{"kind":"document","key":"d"}}"#).unwrap();
        assert!(state.selection.is_unset());
        assert!(state.document.nodes().is_empty());
    }
}
