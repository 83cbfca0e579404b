//! # By-key Transforms
//!
//! Edits addressed by node key. Each one resolves the key to a path against
//! the current document, emits a single primitive operation (or a short
//! sequence), and then normalizes the smallest subtree the edit could have
//! invalidated, unless the caller passed `normalize: false`.

use folio_model::{
    Key, Mark, MarkProperties, Marks, Node, NodeError, NodeProperties, Path, Selection,
};

use crate::errors::Result;
use crate::transform::Options;
use crate::{Operation, Transform};

impl Transform {
    fn path_of(&self, key: &Key) -> Result<Path> {
        Ok(self.document().assert_path_of(key)?)
    }

    fn parent_key_of(&self, key: &Key) -> Result<Key> {
        self.document()
            .get_parent(key)
            .map(|parent| parent.key().clone())
            .ok_or_else(|| NodeError::KeyNotFound(key.clone()).into())
    }

    /// Normalize `parent` if it was found, the whole document otherwise
    fn normalize_parent(&mut self, parent: Option<Key>) -> Result<()> {
        match parent {
            Some(parent) => self.normalize_node_by_key(&parent)?,
            None => self.normalize_document()?,
        };
        Ok(())
    }

    pub fn add_mark_by_key(
        &mut self,
        key: &Key,
        offset: usize,
        length: usize,
        mark: Mark,
        options: Options,
    ) -> Result<&mut Self> {
        let path = self.path_of(key)?;
        let parent = self.parent_key_of(key)?;
        self.apply_operation(Operation::AddMark {
            path,
            offset,
            length,
            mark,
        })?;
        if options.should_normalize() {
            self.normalize_node_by_key(&parent)?;
        }
        Ok(self)
    }

    pub fn remove_mark_by_key(
        &mut self,
        key: &Key,
        offset: usize,
        length: usize,
        mark: Mark,
        options: Options,
    ) -> Result<&mut Self> {
        let path = self.path_of(key)?;
        let parent = self.parent_key_of(key)?;
        self.apply_operation(Operation::RemoveMark {
            path,
            offset,
            length,
            mark,
        })?;
        if options.should_normalize() {
            self.normalize_node_by_key(&parent)?;
        }
        Ok(self)
    }

    pub fn set_mark_by_key(
        &mut self,
        key: &Key,
        offset: usize,
        length: usize,
        mark: Mark,
        properties: MarkProperties,
        options: Options,
    ) -> Result<&mut Self> {
        let path = self.path_of(key)?;
        let parent = self.parent_key_of(key)?;
        self.apply_operation(Operation::SetMark {
            path,
            offset,
            length,
            mark,
            properties,
        })?;
        if options.should_normalize() {
            self.normalize_node_by_key(&parent)?;
        }
        Ok(self)
    }

    /// Insert `text` into the text node `key`. Without `marks` the inserted
    /// characters take the marks of the character before `offset`.
    pub fn insert_text_by_key(
        &mut self,
        key: &Key,
        offset: usize,
        text: &str,
        marks: Option<Marks>,
        options: Options,
    ) -> Result<&mut Self> {
        let path = self.path_of(key)?;
        let parent = self.parent_key_of(key)?;
        self.apply_operation(Operation::InsertText {
            path,
            offset,
            text: text.to_string(),
            marks,
        })?;
        if options.should_normalize() {
            self.normalize_node_by_key(&parent)?;
        }
        Ok(self)
    }

    /// Remove `length` characters from the text node `key`. Normalization
    /// walks from the parent up, since emptying a text can invalidate any
    /// ancestor.
    pub fn remove_text_by_key(
        &mut self,
        key: &Key,
        offset: usize,
        length: usize,
        options: Options,
    ) -> Result<&mut Self> {
        let path = self.path_of(key)?;
        let parent = self.parent_key_of(key)?;
        self.apply_operation(Operation::RemoveText {
            path,
            offset,
            length,
        })?;
        if options.should_normalize() {
            self.normalize_parents_by_key(&parent)?;
        }
        Ok(self)
    }

    pub fn insert_node_by_key(
        &mut self,
        key: &Key,
        index: usize,
        node: Node,
        options: Options,
    ) -> Result<&mut Self> {
        let path = self.path_of(key)?;
        self.apply_operation(Operation::InsertNode { path, index, node })?;
        if options.should_normalize() {
            self.normalize_node_by_key(key)?;
        }
        Ok(self)
    }

    pub fn remove_node_by_key(&mut self, key: &Key, options: Options) -> Result<&mut Self> {
        let path = self.path_of(key)?;
        let parent = self.parent_key_of(key).ok();
        self.apply_operation(Operation::RemoveNode { path })?;
        if options.should_normalize() {
            self.normalize_parent(parent)?;
        }
        Ok(self)
    }

    /// Move `key` to child `new_index` of `new_key`
    pub fn move_node_by_key(
        &mut self,
        key: &Key,
        new_key: &Key,
        new_index: usize,
        options: Options,
    ) -> Result<&mut Self> {
        let document = self.document().clone();
        let path = self.path_of(key)?;
        let new_path = self.path_of(new_key)?;
        let parent = if document.key() == new_key {
            Some(new_key.clone())
        } else {
            document
                .get_common_ancestor(key, new_key)
                .map(|ancestor| ancestor.key().clone())
        };

        self.apply_operation(Operation::MoveNode {
            path,
            new_path,
            new_index,
        })?;
        if options.should_normalize() {
            self.normalize_parent(parent)?;
        }
        Ok(self)
    }

    /// Apply `properties` to the node `key`
    pub fn set_node_by_key(
        &mut self,
        key: &Key,
        properties: impl Into<NodeProperties>,
        options: Options,
    ) -> Result<&mut Self> {
        let path = self.path_of(key)?;
        let parent = self.parent_key_of(key).ok();
        self.apply_operation(Operation::SetNode {
            path,
            properties: properties.into(),
        })?;
        if options.should_normalize() {
            self.normalize_parent(parent)?;
        }
        Ok(self)
    }

    /// Append the content of `key` to `with_key`, removing `key`
    pub fn join_node_by_key(
        &mut self,
        key: &Key,
        with_key: &Key,
        options: Options,
    ) -> Result<&mut Self> {
        let document = self.document().clone();
        let path = self.path_of(key)?;
        let with_path = self.path_of(with_key)?;
        let parent = document
            .get_common_ancestor(key, with_key)
            .map(|ancestor| ancestor.key().clone());

        self.apply_operation(Operation::JoinNode { path, with_path })?;
        if options.should_normalize() {
            self.normalize_parent(parent)?;
        }
        Ok(self)
    }

    /// Split the node `key` into two siblings at text `offset`
    pub fn split_node_by_key(
        &mut self,
        key: &Key,
        offset: usize,
        options: Options,
    ) -> Result<&mut Self> {
        let path = self.path_of(key)?;
        let parent = self.parent_key_of(key).ok();
        self.apply_operation(Operation::SplitNode { path, offset })?;
        if options.should_normalize() {
            self.normalize_parent(parent)?;
        }
        Ok(self)
    }

    /// Remove the closest inline ancestor of `key` matching `properties`,
    /// lifting its children into its parent.
    pub fn unwrap_inline_by_key(
        &mut self,
        key: &Key,
        properties: impl Into<NodeProperties>,
        options: Options,
    ) -> Result<&mut Self> {
        let document = self.document().clone();
        let node = document.assert_descendant(key)?;
        let range = match (node.get_first_text(), node.get_last_text()) {
            (Some(first), Some(last)) => Selection::default().move_to_range_of(first, last),
            _ => return Ok(self),
        };
        self.unwrap_inline_at_range(&range, properties, options)
    }

    /// Remove the closest block ancestor of `key` matching `properties`,
    /// lifting the affected children into its parent.
    pub fn unwrap_block_by_key(
        &mut self,
        key: &Key,
        properties: impl Into<NodeProperties>,
        options: Options,
    ) -> Result<&mut Self> {
        let document = self.document().clone();
        let node = document.assert_descendant(key)?;
        let range = match (node.get_first_text(), node.get_last_text()) {
            (Some(first), Some(last)) => Selection::default().move_to_range_of(first, last),
            _ => return Ok(self),
        };
        self.unwrap_block_at_range(&range, properties, options)
    }

    /// Wrap the node `key` in `block`. Any children `block` carries are
    /// discarded.
    pub fn wrap_block_by_key(&mut self, key: &Key, block: Node, options: Options) -> Result<&mut Self> {
        let document = self.document().clone();
        let parent = document
            .get_parent(key)
            .ok_or_else(|| NodeError::KeyNotFound(key.clone()))?;
        let index = parent
            .index_of(key)
            .ok_or_else(|| NodeError::KeyNotFound(key.clone()))?;

        let block = block.with_nodes(Vec::new());
        let block_key = block.key().clone();
        self.insert_node_by_key(parent.key(), index, block, Options::skip_normalize())?;
        self.move_node_by_key(key, &block_key, 0, options)
    }
}
