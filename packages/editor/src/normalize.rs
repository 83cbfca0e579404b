//! # Normalization
//!
//! Repairs a document against a [`Schema`] after edits.
//!
//! ## Strategy
//!
//! 1. Skip any node that is pointer-identical to its counterpart in the
//!    transform's starting document: nothing below it changed.
//! 2. Normalize children first, then the node itself.
//! 3. Validate, repair, re-fetch the node, validate again. A node that keeps
//!    failing after [`MAX_NORMALIZE_CALLS`] repairs aborts the transform.
//!
//! Repairs run through by-key transforms with normalization disabled, so they
//! land in the operation log and replay deterministically.

use std::sync::Arc;

use folio_model::{Key, Node, NodeError, Selection};
use tracing::{debug, warn};

use crate::errors::{Result, TransformError};
use crate::transform::lookup;
use crate::{Schema, Transform};

/// Repairs allowed on a single node before giving up
pub const MAX_NORMALIZE_CALLS: usize = 50;

impl Transform {
    /// Normalize the document against the transform's schema, then the
    /// selection.
    pub fn normalize(&mut self) -> Result<&mut Self> {
        self.normalize_document()?;
        self.normalize_selection()
    }

    pub fn normalize_document(&mut self) -> Result<&mut Self> {
        let schema = self.schema.clone();
        let prev_document = self.prev_state().document.clone();
        self.normalize_with(&schema, Some(&prev_document))
    }

    /// Normalize the whole document. Without a previous document every node
    /// is checked.
    pub fn normalize_with(
        &mut self,
        schema: &Schema,
        prev_document: Option<&Arc<Node>>,
    ) -> Result<&mut Self> {
        if !schema.is_normalization() {
            return Ok(self);
        }
        let document = self.document().clone();
        self.normalize_node_with(schema, &document, prev_document)
    }

    /// Normalize the node with `key` and its descendants
    pub fn normalize_node_by_key(&mut self, key: &Key) -> Result<&mut Self> {
        let schema = self.schema.clone();
        let node = self
            .lookup(key)
            .ok_or_else(|| NodeError::KeyNotFound(key.clone()))?;
        let prev_node = lookup(&self.prev_state().document, key);
        self.normalize_node_with(&schema, &node, prev_node.as_ref())
    }

    /// Normalize the node with `key` and each of its ancestors, without
    /// descending into children
    pub fn normalize_parents_by_key(&mut self, key: &Key) -> Result<&mut Self> {
        let schema = self.schema.clone();
        let node = self
            .lookup(key)
            .ok_or_else(|| NodeError::KeyNotFound(key.clone()))?;
        self.normalize_parents_with(&schema, &node)
    }

    pub fn normalize_node_with(
        &mut self,
        schema: &Schema,
        node: &Arc<Node>,
        prev_node: Option<&Arc<Node>>,
    ) -> Result<&mut Self> {
        if prev_node.is_some_and(|prev_node| Arc::ptr_eq(node, prev_node)) {
            return Ok(self);
        }

        let count = self.operations().len();
        self.normalize_children_with(schema, node, prev_node)?;

        let node = if self.operations().len() != count {
            self.lookup(node.key())
        } else {
            Some(node.clone())
        };
        if let Some(node) = node {
            self.normalize_self_with(schema, &node)?;
        }
        Ok(self)
    }

    pub fn normalize_parents_with(&mut self, schema: &Schema, node: &Arc<Node>) -> Result<&mut Self> {
        let mut node = node.clone();
        loop {
            self.normalize_self_with(schema, &node)?;
            if node.is_document() {
                break;
            }
            let Some(current) = self.lookup(node.key()) else {
                break;
            };
            let document = self.document().clone();
            let Some(parent) = document
                .get_parent(current.key())
                .and_then(|parent| lookup(&document, parent.key()))
            else {
                break;
            };
            node = parent;
        }
        Ok(self)
    }

    /// Make the selection valid for the current document. An invalid
    /// selection is reset to the start of the document.
    pub fn normalize_selection(&mut self) -> Result<&mut Self> {
        let document = self.document().clone();
        let mut selection = self.state.selection.normalize(&document);

        if selection.is_unset() {
            if self.state.selection.is_set() {
                warn!(
                    "Selection {:?} is invalid and was reset to the start of the document",
                    self.state.selection
                );
            }
            if let Some(first) = document.get_first_text() {
                selection = Selection::collapsed(first.key.clone(), 0);
            }
        }

        self.state.selection = selection;
        Ok(self)
    }

    fn normalize_children_with(
        &mut self,
        schema: &Schema,
        node: &Arc<Node>,
        prev_node: Option<&Arc<Node>>,
    ) -> Result<()> {
        let mut count = self.operations().len();
        for child in node.nodes() {
            // earlier repairs may have replaced or removed this child
            let child = if self.operations().len() != count {
                count = self.operations().len();
                match self.lookup(child.key()) {
                    Some(child) => child,
                    None => continue,
                }
            } else {
                child.clone()
            };
            let prev_child = prev_node.and_then(|prev| prev.get_child(child.key()));
            self.normalize_node_with(schema, &child, prev_child)?;
        }
        Ok(())
    }

    fn normalize_self_with(&mut self, schema: &Schema, node: &Arc<Node>) -> Result<()> {
        let mut node = node.clone();
        let mut calls = 0;

        while let Some(failure) = schema.validate(&node) {
            if calls == MAX_NORMALIZE_CALLS {
                return Err(TransformError::NormalizationLimit {
                    key: node.key().clone(),
                    calls,
                });
            }
            debug!(
                "Normalizing {} with rule {}, value {:?}",
                node.key(),
                failure.rule.name(),
                failure.value
            );
            failure.rule.normalize(self, &node, &failure.value)?;
            calls += 1;

            match self.lookup(node.key()) {
                Some(current) => node = current,
                None => break,
            }
        }
        Ok(())
    }
}
