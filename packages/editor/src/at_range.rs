//! # Range Transforms
//!
//! Editing commands expressed over a [`Selection`] used as a range. Each
//! command decomposes into by-key transforms, which in turn emit primitive
//! operations.
//!
//! Multi-step commands pass `normalize: false` to their intermediate steps
//! and normalize once at the end, so the document is never repaired while
//! it is half edited.

use std::sync::Arc;

use folio_model::{Key, Mark, Marks, Node, NodeError, NodeProperties, Selection, Text};

use crate::errors::{Result, TransformError};
use crate::transform::Options;
use crate::Transform;

/// Start and end points of a set range
struct Edges {
    start_key: Key,
    start_offset: usize,
    end_key: Key,
    end_offset: usize,
}

fn edges(range: &Selection) -> Result<Edges> {
    match (range.start_key(), range.end_key()) {
        (Some(start_key), Some(end_key)) => Ok(Edges {
            start_key: start_key.clone(),
            start_offset: range.start_offset(),
            end_key: end_key.clone(),
            end_offset: range.end_offset(),
        }),
        _ => Err(TransformError::UnsetRange),
    }
}

fn missing(key: &Key) -> TransformError {
    NodeError::KeyNotFound(key.clone()).into()
}

fn index_in(parent: &Node, key: &Key) -> Result<usize> {
    parent.index_of(key).ok_or_else(|| missing(key))
}

/// Offset of text `key` at `offset`, measured from the start of `child`
fn offset_within(child: &Node, key: &Key, offset: usize) -> Result<usize> {
    if child.key() == key {
        Ok(offset)
    } else {
        Ok(child.get_offset(key)? + offset)
    }
}

/// Key of the void block or void inline holding `key`, if any
fn void_ancestor(document: &Node, key: &Key) -> Option<Key> {
    document
        .get_closest_block(key)
        .filter(|block| block.is_void())
        .or_else(|| {
            document
                .get_closest_inline(key)
                .filter(|inline| inline.is_void())
        })
        .map(|node| node.key().clone())
}

/// Whether the texts `one` and `two` share their closest block
fn same_block(document: &Node, one: &Key, two: &Key) -> bool {
    match (document.get_closest_block(one), document.get_closest_block(two)) {
        (Some(first), Some(second)) => first.key() == second.key(),
        _ => false,
    }
}

/// Whether `node` is `key` or contains it
fn covers(node: &Node, key: &Key) -> bool {
    node.key() == key || node.has_descendant(key)
}

/// Highest ancestor of `key` reachable through parents with a single child,
/// stopping below the document. `key` itself when its parent has siblings.
fn lonely_root(document: &Node, key: &Key) -> Key {
    let mut lonely = key.clone();
    while let Some(parent) = document.get_parent(&lonely) {
        if parent.is_document() || parent.nodes().len() != 1 {
            break;
        }
        lonely = parent.key().clone();
    }
    lonely
}

fn keys(nodes: &[Arc<Node>]) -> Vec<Key> {
    nodes.iter().map(|node| node.key().clone()).collect()
}

impl Transform {
    /// `range` resolved against the current document, so its start edge
    /// comes first in document order. A range that does not resolve is
    /// returned as given and fails later with the missing key.
    fn ordered(&self, range: &Selection) -> Selection {
        let resolved = range.normalize(self.document());
        if resolved.is_set() {
            resolved
        } else {
            range.clone()
        }
    }

    /// Normalize each of `keys` that still exists
    fn normalize_keys(&mut self, keys: &[Key]) -> Result<()> {
        for key in keys {
            if self.lookup(key).is_some() {
                self.normalize_node_by_key(key)?;
            }
        }
        Ok(())
    }

    /// Run `update` on every text span in range, then normalize the parents
    /// that were touched.
    fn map_text_spans(
        &mut self,
        range: &Selection,
        options: Options,
        mut update: impl FnMut(&mut Transform, &Text, usize, usize) -> Result<()>,
    ) -> Result<&mut Self> {
        if range.is_collapsed() {
            return Ok(self);
        }
        let document = self.document().clone();
        let mut parents: Vec<Key> = Vec::new();
        for text in document.get_texts_at_range(range) {
            let (offset, length) = range.span_of(text);
            update(self, text, offset, length)?;
            if let Some(parent) = document.get_parent(&text.key) {
                if !parents.contains(parent.key()) {
                    parents.push(parent.key().clone());
                }
            }
        }
        if options.should_normalize() {
            self.normalize_keys(&parents)?;
        }
        Ok(self)
    }

    pub fn add_mark_at_range(
        &mut self,
        range: &Selection,
        mark: Mark,
        options: Options,
    ) -> Result<&mut Self> {
        let range = &self.ordered(range);
        self.map_text_spans(range, options, |transform, text, offset, length| {
            transform.add_mark_by_key(&text.key, offset, length, mark.clone(), Options::skip_normalize())?;
            Ok(())
        })
    }

    pub fn remove_mark_at_range(
        &mut self,
        range: &Selection,
        mark: Mark,
        options: Options,
    ) -> Result<&mut Self> {
        let range = &self.ordered(range);
        self.map_text_spans(range, options, |transform, text, offset, length| {
            transform.remove_mark_by_key(
                &text.key,
                offset,
                length,
                mark.clone(),
                Options::skip_normalize(),
            )?;
            Ok(())
        })
    }

    /// Remove `mark` when every character in range carries it, add it
    /// otherwise.
    pub fn toggle_mark_at_range(
        &mut self,
        range: &Selection,
        mark: Mark,
        options: Options,
    ) -> Result<&mut Self> {
        let range = &self.ordered(range);
        if range.is_collapsed() {
            return Ok(self);
        }
        let present = self.document().get_common_marks_at_range(range).contains(&mark);
        if present {
            self.remove_mark_at_range(range, mark, options)
        } else {
            self.add_mark_at_range(range, mark, options)
        }
    }

    /// Delete the content of `range`, merging the blocks at its edges.
    pub fn delete_at_range(&mut self, range: &Selection, options: Options) -> Result<&mut Self> {
        let range = &self.ordered(range);
        if range.is_collapsed() {
            return Ok(self);
        }
        let Edges {
            start_key,
            start_offset,
            end_key,
            end_offset,
        } = edges(range)?;

        if start_key == end_key {
            return self.remove_text_by_key(
                &start_key,
                start_offset,
                end_offset.saturating_sub(start_offset),
                options,
            );
        }

        // split the highest children of the shared ancestor at both edges
        let document = self.document().clone();
        let ancestor = document
            .get_common_ancestor(&start_key, &end_key)
            .ok_or_else(|| missing(&start_key))?;
        let start_child = ancestor
            .get_highest_child(&start_key)
            .ok_or_else(|| missing(&start_key))?;
        let end_child = ancestor
            .get_highest_child(&end_key)
            .ok_or_else(|| missing(&end_key))?;
        let start_split = offset_within(start_child, &start_key, start_offset)?;
        let end_split = offset_within(end_child, &end_key, end_offset)?;
        let ancestor_key = ancestor.key().clone();
        let start_child_key = start_child.key().clone();
        let end_child_key = end_child.key().clone();

        self.split_node_by_key(&start_child_key, start_split, Options::skip_normalize())?;
        self.split_node_by_key(&end_child_key, end_split, Options::skip_normalize())?;

        // everything strictly between the two left halves goes
        let document = self.document().clone();
        let start_block = document
            .get_closest_block(&start_key)
            .map(|block| block.key().clone());
        let end_block = document
            .get_next_text(&end_key)
            .and_then(|text| document.get_closest_block(&text.key))
            .map(|block| block.key().clone());
        let ancestor = document
            .get_descendant(&ancestor_key)
            .map(Arc::as_ref)
            .unwrap_or(&*document);
        let start_index = index_in(ancestor, &start_child_key)?;
        let end_index = index_in(ancestor, &end_child_key)?;
        let middles = keys(&ancestor.nodes()[start_index + 1..=end_index]);
        for key in &middles {
            self.remove_node_by_key(key, Options::skip_normalize())?;
        }

        // merge the end block into the start block
        if let (Some(start_block), Some(end_block)) = (start_block, end_block) {
            if start_block != end_block {
                let children = keys(document.assert_descendant(&end_block)?.nodes());
                let lonely = lonely_root(&document, &end_block);
                let base = self.document().assert_descendant(&start_block)?.nodes().len();
                for (i, child) in children.iter().enumerate() {
                    self.move_node_by_key(child, &start_block, base + i, Options::skip_normalize())?;
                }
                self.remove_node_by_key(&lonely, Options::skip_normalize())?;
            }
        }

        if options.should_normalize() {
            self.normalize_keys(&[ancestor_key])?;
            self.normalize_document()?;
        }
        Ok(self)
    }

    /// Delete `n` characters before a collapsed range, or the range itself
    /// when expanded. Voids are removed whole.
    pub fn delete_backward_at_range(
        &mut self,
        range: &Selection,
        n: usize,
        options: Options,
    ) -> Result<&mut Self> {
        let range = &self.ordered(range);
        if range.is_expanded() {
            return self.delete_at_range(range, options);
        }
        let Edges {
            start_key,
            start_offset,
            ..
        } = edges(range)?;
        let document = self.document().clone();

        if let Some(void) = void_ancestor(&document, &start_key) {
            return self.remove_node_by_key(&void, options);
        }
        if range.is_at_start_of(&document) {
            return Ok(self);
        }

        let text = document.assert_descendant(&start_key)?;
        if range.is_at_start_of(text) {
            let previous = document
                .get_previous_text(&start_key)
                .ok_or_else(|| missing(&start_key))?;
            if let Some(void) = void_ancestor(&document, &previous.key) {
                return self.remove_node_by_key(&void, options);
            }
            // inside one block, step n characters into the previous text
            let range = if same_block(&document, &previous.key, &start_key) {
                let length = previous.len();
                Selection::new(
                    previous.key.clone(),
                    length.saturating_sub(n),
                    previous.key.clone(),
                    length,
                )
            } else {
                Selection::new(previous.key.clone(), previous.len(), start_key, 0)
            };
            return self.delete_at_range(&range, options);
        }

        let range = Selection {
            anchor_key: Some(start_key.clone()),
            anchor_offset: start_offset,
            focus_key: Some(start_key),
            focus_offset: start_offset.saturating_sub(n),
            is_backward: true,
        };
        self.delete_at_range(&range, options)
    }

    /// Delete `n` characters after a collapsed range, or the range itself
    /// when expanded. Voids are removed whole.
    pub fn delete_forward_at_range(
        &mut self,
        range: &Selection,
        n: usize,
        options: Options,
    ) -> Result<&mut Self> {
        let range = &self.ordered(range);
        if range.is_expanded() {
            return self.delete_at_range(range, options);
        }
        let Edges {
            start_key,
            start_offset,
            ..
        } = edges(range)?;
        let document = self.document().clone();

        if let Some(void) = void_ancestor(&document, &start_key) {
            return self.remove_node_by_key(&void, options);
        }
        if range.is_at_end_of(&document) {
            return Ok(self);
        }

        let text = document.assert_descendant(&start_key)?;
        if range.is_at_end_of(text) {
            let next = document
                .get_next_text(&start_key)
                .ok_or_else(|| missing(&start_key))?;
            if let Some(void) = void_ancestor(&document, &next.key) {
                return self.remove_node_by_key(&void, options);
            }
            let range = if same_block(&document, &next.key, &start_key) {
                Selection::new(next.key.clone(), 0, next.key.clone(), n.min(next.len()))
            } else {
                Selection::new(start_key, start_offset, next.key.clone(), 0)
            };
            return self.delete_at_range(&range, options);
        }

        let length = text.len();
        let range = Selection::new(
            start_key.clone(),
            start_offset,
            start_key,
            (start_offset + n).min(length),
        );
        self.delete_at_range(&range, options)
    }

    /// Insert `block` at the range, splitting the block under it if needed.
    pub fn insert_block_at_range(
        &mut self,
        range: &Selection,
        block: Node,
        options: Options,
    ) -> Result<&mut Self> {
        let range = &self.ordered(range);
        let mut range = range.clone();
        if range.is_expanded() {
            self.delete_at_range(&range, Options::default())?;
            range = range.collapse_to_start();
        }
        let Edges {
            start_key,
            start_offset,
            ..
        } = edges(&range)?;

        let document = self.document().clone();
        document.assert_descendant(&start_key)?;
        let start_block = document
            .get_closest_block(&start_key)
            .ok_or_else(|| missing(&start_key))?;
        let parent = document
            .get_parent(start_block.key())
            .ok_or_else(|| missing(start_block.key()))?;
        let index = index_in(parent, start_block.key())?;
        let parent_key = parent.key().clone();
        let start_block_key = start_block.key().clone();

        if start_block.is_void() {
            self.insert_node_by_key(&parent_key, index + 1, block, Options::skip_normalize())?;
        } else if start_block.is_empty() {
            self.remove_node_by_key(&start_block_key, Options::default())?;
            self.insert_node_by_key(&parent_key, index, block, Options::skip_normalize())?;
        } else if range.is_at_start_of(start_block) {
            self.insert_node_by_key(&parent_key, index, block, Options::skip_normalize())?;
        } else if range.is_at_end_of(start_block) {
            self.insert_node_by_key(&parent_key, index + 1, block, Options::skip_normalize())?;
        } else {
            let offset = start_block.get_offset(&start_key)? + start_offset;
            self.split_node_by_key(&start_block_key, offset, options)?;
            self.insert_node_by_key(&parent_key, index + 1, block, Options::skip_normalize())?;
        }

        if options.should_normalize() {
            self.normalize_node_by_key(&parent_key)?;
        }
        Ok(self)
    }

    /// Insert the blocks of `fragment` at the range.
    ///
    /// The first fragment block's content is merged into the block at the
    /// range. Any further fragment blocks follow it as siblings, and the
    /// content after the insertion point moves to the end of the last one.
    pub fn insert_fragment_at_range(
        &mut self,
        range: &Selection,
        fragment: Node,
        options: Options,
    ) -> Result<&mut Self> {
        let range = &self.ordered(range);
        let mut range = range.clone();
        if range.is_expanded() {
            self.delete_at_range(&range, Options::skip_normalize())?;
            range = range.collapse_to_start();
        }
        if fragment.is_empty() {
            return Ok(self);
        }

        let fragment = fragment.map_descendants(&mut |node| node.with_key(Key::generate()));
        let Edges {
            start_key,
            start_offset,
            ..
        } = edges(&range)?;

        let document = self.document().clone();
        let start_block = document
            .get_closest_block(&start_key)
            .ok_or_else(|| missing(&start_key))?;
        let start_child = start_block
            .get_highest_child(&start_key)
            .ok_or_else(|| missing(&start_key))?;
        let parent = document
            .get_parent(start_block.key())
            .ok_or_else(|| missing(start_block.key()))?;
        let index = index_in(parent, start_block.key())?;
        let offset = offset_within(start_child, &start_key, start_offset)?;
        let parent_key = parent.key().clone();
        let start_block_key = start_block.key().clone();
        let start_child_key = start_child.key().clone();

        let blocks = fragment.get_blocks();
        let (Some(&first_block), Some(&last_block)) = (blocks.first(), blocks.last()) else {
            return Ok(self);
        };
        let first_block = first_block.clone();
        let last_block_key = last_block.key().clone();
        let is_multi_block = first_block.key() != &last_block_key;

        if is_multi_block {
            let lonely = lonely_root(&fragment, first_block.key());
            let rest = fragment.remove_descendant(&lonely)?;
            for (i, node) in rest.nodes().iter().enumerate() {
                self.insert_node_by_key(
                    &parent_key,
                    index + i + 1,
                    node.as_ref().clone(),
                    Options::skip_normalize(),
                )?;
            }
        }

        if offset != 0 {
            self.split_node_by_key(&start_child_key, offset, Options::skip_normalize())?;
        }

        let document = self.document().clone();
        let start_block = document.assert_descendant(&start_block_key)?;
        let start_child = start_block
            .get_highest_child(&start_key)
            .ok_or_else(|| missing(&start_key))?;
        let start_child_index = index_in(start_block, start_child.key())?;
        // content at and after the caret, or after it when the child was split
        let following_from = if offset == 0 {
            start_child_index
        } else {
            start_child_index + 1
        };

        if is_multi_block {
            let following = keys(&start_block.nodes()[following_from..]);
            let base = document.assert_descendant(&last_block_key)?.nodes().len();
            for (i, key) in following.iter().enumerate() {
                self.move_node_by_key(key, &last_block_key, base + i, Options::skip_normalize())?;
            }
        }

        if start_block.is_empty() {
            self.remove_node_by_key(&start_block_key, Options::skip_normalize())?;
            self.insert_node_by_key(&parent_key, index, first_block, Options::skip_normalize())?;
        } else {
            for (i, inline) in first_block.nodes().iter().enumerate() {
                self.insert_node_by_key(
                    &start_block_key,
                    following_from + i,
                    inline.as_ref().clone(),
                    Options::skip_normalize(),
                )?;
            }
        }

        if options.should_normalize() {
            self.normalize_node_by_key(&parent_key)?;
        }
        Ok(self)
    }

    /// Insert `inline` at the range, splitting the text under it.
    pub fn insert_inline_at_range(
        &mut self,
        range: &Selection,
        inline: Node,
        options: Options,
    ) -> Result<&mut Self> {
        let range = &self.ordered(range);
        let mut range = range.clone();
        if range.is_expanded() {
            self.delete_at_range(&range, Options::skip_normalize())?;
            range = range.collapse_to_start();
        }
        let Edges {
            start_key,
            start_offset,
            ..
        } = edges(&range)?;

        let document = self.document().clone();
        let parent = document
            .get_parent(&start_key)
            .ok_or_else(|| missing(&start_key))?;
        if parent.is_void() {
            return Ok(self);
        }
        let index = index_in(parent, &start_key)?;
        let parent_key = parent.key().clone();

        self.split_node_by_key(&start_key, start_offset, Options::skip_normalize())?;
        self.insert_node_by_key(&parent_key, index + 1, inline, Options::skip_normalize())?;

        if options.should_normalize() {
            self.normalize_node_by_key(&parent_key)?;
        }
        Ok(self)
    }

    /// Insert `text` at the start of the range, replacing its content when
    /// expanded. Normalizes by default only when something was deleted.
    pub fn insert_text_at_range(
        &mut self,
        range: &Selection,
        text: &str,
        marks: Option<Marks>,
        options: Options,
    ) -> Result<&mut Self> {
        let range = &self.ordered(range);
        let Edges {
            start_key,
            start_offset,
            ..
        } = edges(range)?;
        let document = self.document().clone();
        if document
            .get_parent(&start_key)
            .is_some_and(|parent| parent.is_void())
        {
            return Ok(self);
        }

        if range.is_expanded() {
            self.delete_at_range(range, Options::skip_normalize())?;
        }
        let normalize = options.normalize.unwrap_or(range.is_expanded());
        self.insert_text_by_key(
            &start_key,
            start_offset,
            text,
            marks,
            Options::with_normalize(normalize),
        )
    }

    /// Set `properties` on every leaf block in range
    pub fn set_block_at_range(
        &mut self,
        range: &Selection,
        properties: impl Into<NodeProperties>,
        options: Options,
    ) -> Result<&mut Self> {
        let range = &self.ordered(range);
        let properties = properties.into();
        let document = self.document().clone();
        let blocks: Vec<Key> = document
            .get_blocks_at_range(range)
            .iter()
            .map(|block| block.key().clone())
            .collect();
        for key in &blocks {
            if self.lookup(key).is_some() {
                self.set_node_by_key(key, properties.clone(), options)?;
            }
        }
        Ok(self)
    }

    /// Set `properties` on every inline in range
    pub fn set_inline_at_range(
        &mut self,
        range: &Selection,
        properties: impl Into<NodeProperties>,
        options: Options,
    ) -> Result<&mut Self> {
        let range = &self.ordered(range);
        let properties = properties.into();
        let document = self.document().clone();
        let inlines: Vec<Key> = document
            .get_inlines_at_range(range)
            .iter()
            .map(|inline| inline.key().clone())
            .collect();
        for key in &inlines {
            if self.lookup(key).is_some() {
                self.set_node_by_key(key, properties.clone(), options)?;
            }
        }
        Ok(self)
    }

    /// Split the block at the range, `height` block levels up from the text.
    pub fn split_block_at_range(
        &mut self,
        range: &Selection,
        height: usize,
        options: Options,
    ) -> Result<&mut Self> {
        let range = &self.ordered(range);
        self.split_up_at_range(range, height, Node::is_block, options)
    }

    /// Split the inline at the range, `height` inline levels up from the
    /// text. `usize::MAX` splits every inline ancestor.
    pub fn split_inline_at_range(
        &mut self,
        range: &Selection,
        height: usize,
        options: Options,
    ) -> Result<&mut Self> {
        let range = &self.ordered(range);
        self.split_up_at_range(range, height, Node::is_inline, options)
    }

    fn split_up_at_range(
        &mut self,
        range: &Selection,
        height: usize,
        is_level: fn(&Node) -> bool,
        options: Options,
    ) -> Result<&mut Self> {
        let mut range = range.clone();
        if range.is_expanded() {
            self.delete_at_range(&range, options)?;
            range = range.collapse_to_start();
        }
        let Edges {
            start_key,
            start_offset,
            ..
        } = edges(&range)?;

        let document = self.document().clone();
        let mut node_key = start_key;
        let mut offset = start_offset;
        let mut level = 0;
        while level < height {
            let Some(parent) = document.get_closest(&node_key, is_level) else {
                break;
            };
            offset += parent.get_offset(&node_key)?;
            node_key = parent.key().clone();
            level += 1;
        }

        self.split_node_by_key(&node_key, offset, options)
    }

    /// Wrap the leaf blocks in range with `block`. Children on `block` are
    /// discarded.
    pub fn wrap_block_at_range(
        &mut self,
        range: &Selection,
        block: Node,
        options: Options,
    ) -> Result<&mut Self> {
        let range = &self.ordered(range);
        let block = block.with_nodes(Vec::new());
        let document = self.document().clone();
        let blocks = document.get_blocks_at_range(range);
        let (Some(first), Some(last)) = (blocks.first(), blocks.last()) else {
            return Ok(self);
        };

        let (parent, siblings, index) = if blocks.len() == 1 {
            let parent = document
                .get_parent(first.key())
                .ok_or_else(|| missing(first.key()))?;
            let index = index_in(parent, first.key())?;
            (parent, vec![first.key().clone()], index)
        } else {
            let parent = document
                .get_closest(first.key(), |ancestor| {
                    document
                        .get_closest(last.key(), |other| other.key() == ancestor.key())
                        .is_some()
                })
                .unwrap_or(&*document);
            let start = parent
                .nodes()
                .iter()
                .position(|child| covers(child, first.key()))
                .ok_or_else(|| missing(first.key()))?;
            let end = parent
                .nodes()
                .iter()
                .position(|child| covers(child, last.key()))
                .ok_or_else(|| missing(last.key()))?;
            (parent, keys(&parent.nodes()[start..=end]), start)
        };

        let parent_key = parent.key().clone();
        let block_key = block.key().clone();
        self.insert_node_by_key(&parent_key, index, block, Options::skip_normalize())?;
        for (i, key) in siblings.iter().enumerate() {
            self.move_node_by_key(key, &block_key, i, Options::skip_normalize())?;
        }

        if options.should_normalize() {
            self.normalize_node_by_key(&parent_key)?;
        }
        Ok(self)
    }

    /// Wrap the content in range with copies of `inline`, one per block.
    /// Children on `inline` are discarded.
    pub fn wrap_inline_at_range(
        &mut self,
        range: &Selection,
        inline: Node,
        options: Options,
    ) -> Result<&mut Self> {
        let range = &self.ordered(range);
        if range.is_collapsed() {
            return Ok(self);
        }
        let inline = inline.with_nodes(Vec::new());
        let Edges {
            start_key,
            start_offset,
            end_key,
            end_offset,
        } = edges(range)?;

        let document = self.document().clone();
        let blocks: Vec<Key> = document
            .get_blocks_at_range(range)
            .iter()
            .map(|block| block.key().clone())
            .collect();
        let start_block = document
            .get_closest_block(&start_key)
            .ok_or_else(|| missing(&start_key))?;
        let end_block = document
            .get_closest_block(&end_key)
            .ok_or_else(|| missing(&end_key))?;
        let start_child = start_block
            .get_highest_child(&start_key)
            .ok_or_else(|| missing(&start_key))?;
        let end_child = end_block
            .get_highest_child(&end_key)
            .ok_or_else(|| missing(&end_key))?;
        let start_index = index_in(start_block, start_child.key())?;
        let end_index = index_in(end_block, end_child.key())?;
        let start_off = offset_within(start_child, &start_key, start_offset)?;
        let end_off = offset_within(end_child, &end_key, end_offset)?;
        let start_block_key = start_block.key().clone();
        let end_block_key = end_block.key().clone();
        let start_child_key = start_child.key().clone();
        let end_child_key = end_child.key().clone();

        if start_block_key == end_block_key {
            if end_off != end_child.len() {
                self.split_node_by_key(&end_child_key, end_off, Options::skip_normalize())?;
            }
            if start_off != 0 {
                self.split_node_by_key(&start_child_key, start_off, Options::skip_normalize())?;
            }

            let document = self.document().clone();
            let start_block = document.assert_descendant(&start_block_key)?;
            let start_inner = if start_off == 0 {
                start_child_key.clone()
            } else {
                document
                    .get_next_sibling(&start_child_key)
                    .map(|node| node.key().clone())
                    .ok_or_else(|| missing(&start_child_key))?
            };
            let end_inner = if start_key == end_key {
                start_inner.clone()
            } else {
                start_block
                    .get_highest_child(&end_key)
                    .map(|node| node.key().clone())
                    .ok_or_else(|| missing(&end_key))?
            };
            let from = index_in(start_block, &start_inner)?;
            let to = index_in(start_block, &end_inner)?;
            if from > to {
                return Ok(self);
            }
            let wrapped = keys(&start_block.nodes()[from..=to]);

            let wrapper = inline.regenerate_key();
            let wrapper_key = wrapper.key().clone();
            self.insert_node_by_key(&start_block_key, from, wrapper, Options::skip_normalize())?;
            for (i, key) in wrapped.iter().enumerate() {
                self.move_node_by_key(key, &wrapper_key, i, Options::skip_normalize())?;
            }

            if options.should_normalize() {
                self.normalize_node_by_key(&start_block_key)?;
            }
            return Ok(self);
        }

        self.split_node_by_key(&start_child_key, start_off, Options::skip_normalize())?;
        self.split_node_by_key(&end_child_key, end_off, Options::skip_normalize())?;

        let document = self.document().clone();
        let start_block = document.assert_descendant(&start_block_key)?;
        let end_block = document.assert_descendant(&end_block_key)?;
        let start_inlines = keys(&start_block.nodes()[start_index + 1..]);
        let end_inlines = keys(&end_block.nodes()[..=end_index]);

        let start_wrapper = inline.regenerate_key();
        let start_wrapper_key = start_wrapper.key().clone();
        self.insert_node_by_key(
            &start_block_key,
            start_index + 1,
            start_wrapper,
            Options::skip_normalize(),
        )?;
        for (i, key) in start_inlines.iter().enumerate() {
            self.move_node_by_key(key, &start_wrapper_key, i, Options::skip_normalize())?;
        }

        let end_wrapper = inline.regenerate_key();
        let end_wrapper_key = end_wrapper.key().clone();
        self.insert_node_by_key(&end_block_key, 0, end_wrapper, Options::skip_normalize())?;
        for (i, key) in end_inlines.iter().enumerate() {
            self.move_node_by_key(key, &end_wrapper_key, i, Options::skip_normalize())?;
        }

        let middles = blocks
            .iter()
            .filter(|key| **key != start_block_key && **key != end_block_key);
        for block_key in middles {
            let document = self.document().clone();
            let Some(block) = document.get_descendant(block_key) else {
                continue;
            };
            let children = keys(block.nodes());
            let wrapper = inline.regenerate_key();
            let wrapper_key = wrapper.key().clone();
            self.insert_node_by_key(block_key, 0, wrapper, Options::skip_normalize())?;
            for (i, key) in children.iter().enumerate() {
                self.move_node_by_key(key, &wrapper_key, i, Options::skip_normalize())?;
            }
            if options.should_normalize() {
                self.normalize_node_by_key(block_key)?;
            }
        }

        if options.should_normalize() {
            self.normalize_node_by_key(&start_block_key)?;
            self.normalize_node_by_key(&end_block_key)?;
        }
        Ok(self)
    }

    /// Insert `prefix` before and `suffix` after the range
    pub fn wrap_text_at_range(
        &mut self,
        range: &Selection,
        prefix: &str,
        suffix: &str,
        options: Options,
    ) -> Result<&mut Self> {
        let range = &self.ordered(range);
        let Edges {
            start_key, end_key, ..
        } = edges(range)?;
        let start = range.clone().collapse_to_start();
        let mut end = range.clone().collapse_to_end();
        if start_key == end_key {
            end = end.move_forward(prefix.chars().count());
        }

        self.insert_text_at_range(&start, prefix, Some(Marks::new()), options)?;
        self.insert_text_at_range(&end, suffix, Some(Marks::new()), options)
    }

    /// Lift the children of blocks matching `properties` that wrap the range.
    ///
    /// Only the wrapper's children that hold the range move out. When they
    /// sit in the middle of the wrapper, the wrapper is split around them.
    pub fn unwrap_block_at_range(
        &mut self,
        range: &Selection,
        properties: impl Into<NodeProperties>,
        options: Options,
    ) -> Result<&mut Self> {
        let range = &self.ordered(range);
        let properties = properties.into();
        let document = self.document().clone();
        let blocks: Vec<Key> = document
            .get_blocks_at_range(range)
            .iter()
            .map(|block| block.key().clone())
            .collect();
        let mut wrappers: Vec<Key> = Vec::new();
        for key in &blocks {
            let wrapper = document.get_closest(key, |ancestor| {
                ancestor.is_block() && properties.matches(ancestor)
            });
            if let Some(wrapper) = wrapper {
                if !wrappers.contains(wrapper.key()) {
                    wrappers.push(wrapper.key().clone());
                }
            }
        }

        for wrapper_key in &wrappers {
            let document = self.document().clone();
            let Some(wrapper) = document.get_descendant(wrapper_key) else {
                continue;
            };
            let parent = document
                .get_parent(wrapper_key)
                .ok_or_else(|| missing(wrapper_key))?;
            let index = index_in(parent, wrapper_key)?;
            let parent_key = parent.key().clone();

            let children = keys(wrapper.nodes());
            let holds_range = |key: &Key| {
                document
                    .get_descendant(key)
                    .is_some_and(|child| blocks.iter().any(|block| covers(child, block)))
            };
            let (Some(from), Some(to)) = (
                children.iter().position(|key| holds_range(key)),
                children.iter().rposition(|key| holds_range(key)),
            ) else {
                continue;
            };
            let last = children.len() - 1;

            if from == 0 && to == last {
                for (i, key) in children.iter().enumerate() {
                    self.move_node_by_key(key, &parent_key, index + i, Options::skip_normalize())?;
                }
                self.remove_node_by_key(wrapper_key, Options::skip_normalize())?;
            } else if to == last {
                for (i, key) in children[from..].iter().enumerate() {
                    self.move_node_by_key(
                        key,
                        &parent_key,
                        index + 1 + i,
                        Options::skip_normalize(),
                    )?;
                }
            } else if from == 0 {
                for (i, key) in children[..=to].iter().enumerate() {
                    self.move_node_by_key(key, &parent_key, index + i, Options::skip_normalize())?;
                }
            } else {
                // keep the trailing children in a copy of the wrapper
                let tail = wrapper.with_nodes(Vec::new()).with_key(Key::generate());
                let tail_key = tail.key().clone();
                self.insert_node_by_key(&parent_key, index + 1, tail, Options::skip_normalize())?;
                for (i, key) in children[to + 1..].iter().enumerate() {
                    self.move_node_by_key(key, &tail_key, i, Options::skip_normalize())?;
                }
                for (i, key) in children[from..=to].iter().enumerate() {
                    self.move_node_by_key(
                        key,
                        &parent_key,
                        index + 1 + i,
                        Options::skip_normalize(),
                    )?;
                }
            }
        }

        if options.should_normalize() {
            self.normalize_document()?;
        }
        Ok(self)
    }

    /// Remove inlines matching `properties` that hold text in range, lifting
    /// their children into their parents.
    pub fn unwrap_inline_at_range(
        &mut self,
        range: &Selection,
        properties: impl Into<NodeProperties>,
        options: Options,
    ) -> Result<&mut Self> {
        let range = &self.ordered(range);
        let properties = properties.into();
        let document = self.document().clone();
        let mut inlines: Vec<Key> = Vec::new();
        for text in document.get_texts_at_range(range) {
            let inline = document.get_closest(&text.key, |ancestor| {
                ancestor.is_inline() && properties.matches(ancestor)
            });
            if let Some(inline) = inline {
                if !inlines.contains(inline.key()) {
                    inlines.push(inline.key().clone());
                }
            }
        }

        for inline_key in &inlines {
            let document = self.document().clone();
            let Some(inline) = document.get_descendant(inline_key) else {
                continue;
            };
            let parent = document
                .get_parent(inline_key)
                .ok_or_else(|| missing(inline_key))?;
            let index = index_in(parent, inline_key)?;
            let parent_key = parent.key().clone();

            for (i, key) in keys(inline.nodes()).iter().enumerate() {
                self.move_node_by_key(key, &parent_key, index + i, Options::skip_normalize())?;
            }
            self.remove_node_by_key(inline_key, Options::skip_normalize())?;
        }

        if options.should_normalize() {
            self.normalize_document()?;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::State;

    fn paragraphs() -> State {
        State::new(
            Node::document([
                Node::block("paragraph", [Node::leaf("Hello").with_key("a")]).with_key("p1"),
                Node::block("paragraph", [Node::leaf("World").with_key("b")]).with_key("p2"),
            ])
            .with_key("doc"),
        )
    }

    fn block_texts(transform: &Transform) -> Vec<String> {
        transform
            .document()
            .nodes()
            .iter()
            .map(|node| node.text())
            .collect()
    }

    fn caret(key: &str, offset: usize) -> Selection {
        Selection::collapsed(key.into(), offset)
    }

    fn span(anchor: &str, anchor_offset: usize, focus: &str, focus_offset: usize) -> Selection {
        Selection::new(anchor.into(), anchor_offset, focus.into(), focus_offset)
    }

    #[test]
    fn test_unset_range_is_an_error() {
        let mut transform = paragraphs().transform();
        let err = transform
            .insert_text_at_range(&Selection::default(), "x", None, Options::default())
            .unwrap_err();
        assert!(matches!(err, TransformError::UnsetRange));
    }

    #[test]
    fn test_collapsed_delete_is_a_no_op() {
        let mut transform = paragraphs().transform();
        transform
            .delete_at_range(&caret("a", 2), Options::default())
            .unwrap();
        assert!(transform.operations().is_empty());
    }

    #[test]
    fn test_delete_within_one_text() {
        let mut transform = paragraphs().transform();
        transform
            .delete_at_range(&span("a", 1, "a", 4), Options::default())
            .unwrap();
        assert_eq!(block_texts(&transform), vec!["Ho", "World"]);
    }

    #[test]
    fn test_range_given_end_first_is_ordered() {
        let mut transform = paragraphs().transform();
        transform
            .delete_at_range(&span("b", 2, "a", 3), Options::default())
            .unwrap();
        assert_eq!(block_texts(&transform), vec!["Helrld"]);
    }

    fn linked() -> State {
        State::new(Node::document([Node::block(
            "paragraph",
            [
                Node::leaf("ab").with_key("x"),
                Node::inline("link", [Node::leaf("cd").with_key("l")]),
                Node::leaf("ef").with_key("y"),
            ],
        )]))
    }

    #[test]
    fn test_delete_backward_steps_into_inline() {
        let mut transform = linked().transform();
        transform
            .delete_backward_at_range(&caret("y", 0), 1, Options::default())
            .unwrap();
        assert_eq!(block_texts(&transform), vec!["abcef"]);
    }

    #[test]
    fn test_delete_forward_steps_into_inline() {
        let mut transform = linked().transform();
        transform
            .delete_forward_at_range(&caret("x", 2), 1, Options::default())
            .unwrap();
        assert_eq!(block_texts(&transform), vec!["abdef"]);
    }

    #[test]
    fn test_add_mark_across_texts() {
        let bold = Mark::new("bold");
        let mut transform = paragraphs().transform();
        transform
            .add_mark_at_range(&span("a", 1, "b", 2), bold.clone(), Options::default())
            .unwrap();

        let document = transform.document();
        let flags = |key: &str| -> Vec<bool> {
            document
                .get_descendant(&key.into())
                .and_then(|node| node.as_text())
                .map(|text| {
                    text.characters
                        .iter()
                        .map(|c| c.marks.contains(&bold))
                        .collect()
                })
                .unwrap_or_default()
        };
        assert_eq!(flags("a"), vec![false, true, true, true, true]);
        assert_eq!(flags("b"), vec![true, true, false, false, false]);
    }

    #[test]
    fn test_toggle_mark_adds_when_partially_present() {
        let bold = Mark::new("bold");
        let mut transform = paragraphs().transform();
        transform
            .add_mark_at_range(&span("a", 0, "a", 2), bold.clone(), Options::default())
            .unwrap()
            .toggle_mark_at_range(&span("a", 0, "a", 5), bold.clone(), Options::default())
            .unwrap();
        let text = transform.document().get_first_text().unwrap().clone();
        assert!(text.characters.iter().all(|c| c.marks.contains(&bold)));

        transform
            .toggle_mark_at_range(&span("a", 0, "a", 5), bold.clone(), Options::default())
            .unwrap();
        assert!(transform.document().get_first_text().unwrap().marks().is_empty());
    }

    #[test]
    fn test_delete_backward_inside_text() {
        let mut transform = paragraphs().transform();
        transform
            .delete_backward_at_range(&caret("a", 3), 1, Options::default())
            .unwrap();
        assert_eq!(block_texts(&transform), vec!["Helo", "World"]);
    }

    #[test]
    fn test_delete_backward_merges_blocks() {
        let state = paragraphs().with_selection(caret("b", 0));
        let mut transform = state.transform();
        transform
            .delete_backward_at_range(&caret("b", 0), 1, Options::default())
            .unwrap();
        assert_eq!(block_texts(&transform), vec!["HelloWorld"]);

        let change = transform.commit().unwrap();
        assert_eq!(change.state.selection, caret("a", 5));
    }

    #[test]
    fn test_delete_backward_at_document_start() {
        let mut transform = paragraphs().transform();
        transform
            .delete_backward_at_range(&caret("a", 0), 1, Options::default())
            .unwrap();
        assert!(transform.operations().is_empty());
    }

    #[test]
    fn test_delete_backward_removes_previous_void() {
        let state = State::new(Node::document([
            Node::block("paragraph", [Node::leaf("foo").with_key("a")]),
            Node::block("image", [Node::leaf("").with_key("v")])
                .with_void(true)
                .with_key("img"),
            Node::block("paragraph", [Node::leaf("bar").with_key("c")]),
        ]));
        let mut transform = state.transform();
        transform
            .delete_backward_at_range(&caret("c", 0), 1, Options::default())
            .unwrap();
        assert_eq!(block_texts(&transform), vec!["foo", "bar"]);
        assert!(!transform.document().has_descendant(&"img".into()));
    }

    #[test]
    fn test_delete_forward_inside_text() {
        let mut transform = paragraphs().transform();
        transform
            .delete_forward_at_range(&caret("a", 1), 2, Options::default())
            .unwrap();
        assert_eq!(block_texts(&transform), vec!["Hlo", "World"]);
    }

    #[test]
    fn test_delete_forward_at_document_end() {
        let mut transform = paragraphs().transform();
        transform
            .delete_forward_at_range(&caret("b", 5), 1, Options::default())
            .unwrap();
        assert!(transform.operations().is_empty());
    }

    #[test]
    fn test_insert_block_splits_in_the_middle() {
        let mut transform = paragraphs().transform();
        let heading = Node::block("heading", [Node::leaf("X")]);
        transform
            .insert_block_at_range(&caret("a", 2), heading, Options::default())
            .unwrap();
        assert_eq!(block_texts(&transform), vec!["He", "X", "llo", "World"]);
        assert_eq!(transform.document().nodes()[1].node_type(), Some("heading"));
    }

    #[test]
    fn test_insert_block_at_edges() {
        let mut transform = paragraphs().transform();
        transform
            .insert_block_at_range(&caret("a", 5), Node::block("hr", [Node::leaf("")]), Options::default())
            .unwrap()
            .insert_block_at_range(&caret("a", 0), Node::block("title", [Node::leaf("T")]), Options::default())
            .unwrap();
        let types: Vec<&str> = transform
            .document()
            .nodes()
            .iter()
            .filter_map(|node| node.node_type())
            .collect();
        assert_eq!(types, vec!["title", "paragraph", "hr", "paragraph"]);
    }

    #[test]
    fn test_insert_block_replaces_empty_block() {
        let state = State::new(Node::document([
            Node::block("paragraph", [Node::leaf("").with_key("e")]).with_key("empty"),
        ]));
        let mut transform = state.transform();
        transform
            .insert_block_at_range(&caret("e", 0), Node::block("quote", [Node::leaf("q")]), Options::default())
            .unwrap();
        let document = transform.document();
        assert_eq!(document.nodes().len(), 1);
        assert_eq!(document.nodes()[0].node_type(), Some("quote"));
    }

    #[test]
    fn test_insert_inline_splits_text() {
        let mut transform = paragraphs().transform();
        let image = Node::inline("image", [Node::leaf("")]).with_void(true);
        transform
            .insert_inline_at_range(&caret("a", 2), image, Options::default())
            .unwrap();
        let block = &transform.document().nodes()[0];
        assert_eq!(block.nodes().len(), 3);
        assert!(block.nodes()[1].is_inline());
        assert_eq!(block.text(), "Hello");
    }

    #[test]
    fn test_insert_text_replaces_expanded_range() {
        let mut transform = paragraphs().transform();
        transform
            .insert_text_at_range(&span("a", 1, "a", 4), "ipp", None, Options::default())
            .unwrap();
        assert_eq!(block_texts(&transform), vec!["Hippo", "World"]);
    }

    #[test]
    fn test_insert_text_into_void_is_ignored() {
        let state = State::new(Node::document([Node::block("image", [Node::leaf("").with_key("v")])
            .with_void(true)]));
        let mut transform = state.transform();
        transform
            .insert_text_at_range(&caret("v", 0), "x", None, Options::default())
            .unwrap();
        assert!(transform.operations().is_empty());
    }

    #[test]
    fn test_set_block_on_every_block_in_range() {
        let mut transform = paragraphs().transform();
        transform
            .set_block_at_range(&span("a", 2, "b", 1), "heading", Options::default())
            .unwrap();
        assert!(transform
            .document()
            .nodes()
            .iter()
            .all(|node| node.node_type() == Some("heading")));
    }

    #[test]
    fn test_split_block_by_height() {
        let state = State::new(Node::document([Node::block(
            "list",
            [Node::block("item", [Node::leaf("abcd").with_key("t")])],
        )
        .with_key("list")]));

        let mut transform = state.transform();
        transform
            .split_block_at_range(&caret("t", 2), 1, Options::default())
            .unwrap();
        let list = &transform.document().nodes()[0];
        assert_eq!(list.nodes().len(), 2);
        assert_eq!(list.nodes()[1].text(), "cd");

        let mut transform = state.transform();
        transform
            .split_block_at_range(&caret("t", 2), 2, Options::default())
            .unwrap();
        assert_eq!(block_texts(&transform), vec!["ab", "cd"]);
        assert_eq!(transform.document().nodes()[1].node_type(), Some("list"));
    }

    #[test]
    fn test_split_inline_up_to_block() {
        let state = State::new(Node::document([Node::block(
            "paragraph",
            [
                Node::leaf("ab"),
                Node::inline("link", [Node::leaf("cd").with_key("l")]),
            ],
        )]));
        let mut transform = state.transform();
        transform
            .split_inline_at_range(&caret("l", 1), usize::MAX, Options::default())
            .unwrap();
        let block = &transform.document().nodes()[0];
        assert_eq!(block.nodes().len(), 3);
        assert_eq!(block.nodes()[1].text(), "c");
        assert_eq!(block.nodes()[2].text(), "d");
        assert!(block.nodes()[2].is_inline());
    }

    #[test]
    fn test_wrap_blocks_in_range() {
        let mut transform = paragraphs().transform();
        transform
            .wrap_block_at_range(&span("a", 1, "b", 1), Node::block("quote", []), Options::default())
            .unwrap();
        let document = transform.document();
        assert_eq!(document.nodes().len(), 1);
        let quote = &document.nodes()[0];
        assert_eq!(quote.node_type(), Some("quote"));
        let keys: Vec<&str> = quote.nodes().iter().map(|n| n.key().as_str()).collect();
        assert_eq!(keys, vec!["p1", "p2"]);
    }

    #[test]
    fn test_wrap_inline_within_one_text() {
        let state = State::new(Node::document([Node::block(
            "paragraph",
            [Node::leaf("abcdef").with_key("t")],
        )]));
        let mut transform = state.transform();
        transform
            .wrap_inline_at_range(&span("t", 1, "t", 4), Node::inline("link", []), Options::default())
            .unwrap();
        let block = &transform.document().nodes()[0];
        let parts: Vec<(bool, String)> = block
            .nodes()
            .iter()
            .map(|node| (node.is_inline(), node.text()))
            .collect();
        assert_eq!(
            parts,
            vec![
                (false, "a".to_string()),
                (true, "bcd".to_string()),
                (false, "ef".to_string())
            ]
        );
    }

    #[test]
    fn test_wrap_inline_across_blocks() {
        let mut transform = paragraphs().transform();
        transform
            .wrap_inline_at_range(&span("a", 2, "b", 3), Node::inline("link", []), Options::default())
            .unwrap();
        let document = transform.document();
        let first = &document.nodes()[0];
        let second = &document.nodes()[1];
        assert_eq!(first.text(), "Hello");
        assert!(first.nodes()[1].is_inline());
        assert_eq!(first.nodes()[1].text(), "llo");
        assert!(second.nodes()[0].is_inline());
        assert_eq!(second.nodes()[0].text(), "Wor");
        assert_ne!(first.nodes()[1].key(), second.nodes()[0].key());
    }

    #[test]
    fn test_wrap_text_with_markers() {
        let mut transform = paragraphs().transform();
        transform
            .wrap_text_at_range(&span("a", 1, "a", 3), "**", "**", Options::default())
            .unwrap();
        assert_eq!(block_texts(&transform), vec!["H**el**lo", "World"]);
    }

    fn quoted() -> State {
        State::new(Node::document([Node::block(
            "quote",
            [
                Node::block("paragraph", [Node::leaf("one").with_key("t1")]).with_key("p1"),
                Node::block("paragraph", [Node::leaf("two").with_key("t2")]).with_key("p2"),
                Node::block("paragraph", [Node::leaf("three").with_key("t3")]).with_key("p3"),
            ],
        )
        .with_key("q")]))
    }

    #[test]
    fn test_unwrap_block_from_the_middle() {
        let mut transform = quoted().transform();
        transform
            .unwrap_block_at_range(&caret("t2", 1), "quote", Options::default())
            .unwrap();
        let document = transform.document();
        let shape: Vec<(Option<&str>, String)> = document
            .nodes()
            .iter()
            .map(|node| (node.node_type(), node.text()))
            .collect();
        assert_eq!(
            shape,
            vec![
                (Some("quote"), "one".to_string()),
                (Some("paragraph"), "two".to_string()),
                (Some("quote"), "three".to_string()),
            ]
        );
        assert_eq!(document.nodes()[0].key().as_str(), "q");
    }

    #[test]
    fn test_unwrap_block_at_the_edges() {
        let mut transform = quoted().transform();
        transform
            .unwrap_block_at_range(&caret("t1", 0), "quote", Options::default())
            .unwrap();
        let keys: Vec<&str> = transform
            .document()
            .nodes()
            .iter()
            .map(|node| node.key().as_str())
            .collect();
        assert_eq!(keys, vec!["p1", "q"]);

        let mut transform = quoted().transform();
        transform
            .unwrap_block_at_range(&span("t1", 0, "t3", 2), "quote", Options::default())
            .unwrap();
        let keys: Vec<&str> = transform
            .document()
            .nodes()
            .iter()
            .map(|node| node.key().as_str())
            .collect();
        assert_eq!(keys, vec!["p1", "p2", "p3"]);
    }

    #[test]
    fn test_unwrap_block_ignores_other_types() {
        let mut transform = quoted().transform();
        transform
            .unwrap_block_at_range(&caret("t2", 1), "list", Options::default())
            .unwrap();
        assert!(transform.operations().is_empty());
    }

    #[test]
    fn test_unwrap_inline_joins_texts() {
        let state = State::new(Node::document([Node::block(
            "paragraph",
            [
                Node::leaf("ab"),
                Node::inline("link", [Node::leaf("cd").with_key("l")]),
                Node::leaf("ef"),
            ],
        )]));
        let mut transform = state.transform();
        transform
            .unwrap_inline_at_range(&span("l", 0, "l", 2), "link", Options::default())
            .unwrap();
        let block = &transform.document().nodes()[0];
        assert_eq!(block.nodes().len(), 1);
        assert_eq!(block.text(), "abcdef");
    }
}
