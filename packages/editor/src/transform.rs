//! # Transform
//!
//! Accumulates operations against a starting [`State`].
//!
//! A transform keeps three things:
//! - the current state, advanced by every applied operation
//! - the state it started from, used to skip unchanged subtrees during
//!   normalization
//! - the ordered operation log
//!
//! Every builder method returns `Result<&mut Self>`, so edits chain with `?`:
//!
//! ```rust,ignore
//! let mut transform = state.transform();
//! transform
//!     .insert_text_at_range(&range, "abc", None, Options::default())?
//!     .add_mark_at_range(&range, Mark::new("bold"), Options::default())?;
//! let change = transform.commit()?;
//! ```

use std::sync::Arc;

use folio_model::{Key, Node, Selection, SelectionProperties};

use crate::errors::Result;
use crate::{Operation, Schema, State};

/// Per-call options shared by by-key and range transforms
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Options {
    /// `None` lets each transform pick its default, which is to normalize
    /// unless stated otherwise.
    pub normalize: Option<bool>,
}

impl Options {
    pub fn skip_normalize() -> Self {
        Self {
            normalize: Some(false),
        }
    }

    pub fn with_normalize(normalize: bool) -> Self {
        Self {
            normalize: Some(normalize),
        }
    }

    pub fn should_normalize(&self) -> bool {
        self.normalize.unwrap_or(true)
    }
}

/// Result of committing a transform
#[derive(Debug, Clone)]
pub struct Change {
    pub state: State,
    pub operations: Vec<Operation>,
}

#[derive(Debug, Clone)]
pub struct Transform {
    pub(crate) state: State,
    prev_state: State,
    operations: Vec<Operation>,
    pub(crate) schema: Arc<Schema>,
}

impl Transform {
    /// Transform over `state` using the core schema
    pub fn new(state: State) -> Self {
        Self::with_schema(state, Arc::new(Schema::core()))
    }

    pub fn with_schema(state: State, schema: Arc<Schema>) -> Self {
        Self {
            prev_state: state.clone(),
            state,
            operations: Vec::new(),
            schema,
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn prev_state(&self) -> &State {
        &self.prev_state
    }

    pub fn document(&self) -> &Arc<Node> {
        &self.state.document
    }

    pub fn selection(&self) -> &Selection {
        &self.state.selection
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Apply and record one operation
    pub fn apply_operation(&mut self, operation: Operation) -> Result<&mut Self> {
        self.state = operation.apply(&self.state)?;
        self.operations.push(operation);
        Ok(self)
    }

    /// Apply and record operations in order, stopping at the first failure
    pub fn apply_operations(
        &mut self,
        operations: impl IntoIterator<Item = Operation>,
    ) -> Result<&mut Self> {
        for operation in operations {
            self.apply_operation(operation)?;
        }
        Ok(self)
    }

    pub fn set_selection(&mut self, properties: SelectionProperties) -> Result<&mut Self> {
        self.apply_operation(Operation::SetSelection { properties })
    }

    /// Replace the whole selection
    pub fn select(&mut self, selection: &Selection) -> Result<&mut Self> {
        self.set_selection(selection.into())
    }

    /// Finish the transform. A set selection is normalized against the final
    /// document first.
    pub fn commit(mut self) -> Result<Change> {
        if self.state.selection.is_set() {
            self.normalize_selection()?;
        }
        Ok(Change {
            state: self.state,
            operations: self.operations,
        })
    }

    /// Current node with `key`, the document itself included
    pub(crate) fn lookup(&self, key: &Key) -> Option<Arc<Node>> {
        lookup(&self.state.document, key)
    }
}

pub(crate) fn lookup(root: &Arc<Node>, key: &Key) -> Option<Arc<Node>> {
    if root.key() == key {
        Some(root.clone())
    } else {
        root.get_descendant(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> State {
        State::new(Node::document([
            Node::block("p", [Node::leaf("one").with_key("a")]),
            Node::block("p", [Node::leaf("two").with_key("b")]),
        ]))
    }

    #[test]
    fn test_operations_are_recorded_in_order() {
        let mut transform = state().transform();
        transform
            .apply_operation(Operation::RemoveText {
                path: vec![0, 0],
                offset: 0,
                length: 1,
            })
            .unwrap()
            .apply_operation(Operation::InsertText {
                path: vec![1, 0],
                offset: 3,
                text: "!".into(),
                marks: None,
            })
            .unwrap();

        let kinds: Vec<&str> = transform.operations().iter().map(Operation::kind).collect();
        assert_eq!(kinds, vec!["remove_text", "insert_text"]);
        assert_eq!(transform.prev_state().document.text(), "onetwo");
        assert_eq!(transform.document().text(), "netwo!");
    }

    #[test]
    fn test_failed_operation_is_not_recorded() {
        let mut transform = state().transform();
        assert!(transform
            .apply_operation(Operation::RemoveNode { path: vec![7] })
            .is_err());
        assert!(transform.operations().is_empty());
    }

    #[test]
    fn test_commit_normalizes_selection() {
        let state = state().with_selection(Selection::new("b".into(), 9, "a".into(), 1));
        let change = state.transform().commit().unwrap();
        let selection = change.state.selection;
        assert!(selection.is_backward);
        assert_eq!(selection.anchor_offset, 3);
    }

    #[test]
    fn test_commit_keeps_unset_selection() {
        let change = state().transform().commit().unwrap();
        assert!(change.state.selection.is_unset());
        assert!(change.operations.is_empty());
    }

    #[test]
    fn test_options_default_to_normalizing() {
        assert!(Options::default().should_normalize());
        assert!(!Options::skip_normalize().should_normalize());
        assert!(Options::with_normalize(true).should_normalize());
    }
}
