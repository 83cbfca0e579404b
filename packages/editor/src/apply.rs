//! # Operation Executor
//!
//! Applies one [`Operation`] to a [`State`], producing the next state.
//!
//! Each handler rewrites the document through the model's path-copying
//! primitives and then carries the selection across the edit, so that a
//! selection pointing into edited text keeps pointing at the same content.

use std::sync::Arc;

use folio_model::{
    Key, Mark, MarkProperties, Marks, Node, NodeError, NodeProperties, Path, Selection,
    SelectionProperties, Text,
};
use tracing::{debug, warn};

use crate::errors::Result;
use crate::{Operation, State};

impl Operation {
    /// Apply this operation to `state`. Invalid paths and offsets fail
    /// without producing a partial result.
    pub fn apply(&self, state: &State) -> Result<State> {
        debug!("Applying {} at {:?}", self.kind(), self.path());

        match self {
            Operation::InsertText {
                path,
                offset,
                text,
                marks,
            } => Self::apply_insert_text(state, path, *offset, text, marks.as_ref()),

            Operation::RemoveText {
                path,
                offset,
                length,
            } => Self::apply_remove_text(state, path, *offset, *length),

            Operation::AddMark {
                path,
                offset,
                length,
                mark,
            } => Self::apply_mark(state, path, |text| text.add_mark(*offset, *length, mark)),

            Operation::RemoveMark {
                path,
                offset,
                length,
                mark,
            } => Self::apply_mark(state, path, |text| text.remove_mark(*offset, *length, mark)),

            Operation::SetMark {
                path,
                offset,
                length,
                mark,
                properties,
            } => Self::apply_set_mark(state, path, *offset, *length, mark, properties),

            Operation::InsertNode { path, index, node } => {
                Self::apply_insert_node(state, path, *index, node)
            }

            Operation::RemoveNode { path } => Self::apply_remove_node(state, path),

            Operation::MoveNode {
                path,
                new_path,
                new_index,
            } => Self::apply_move_node(state, path, new_path, *new_index),

            Operation::SetNode { path, properties } => {
                Self::apply_set_node(state, path, properties)
            }

            Operation::JoinNode { path, with_path } => {
                Self::apply_join_node(state, path, with_path)
            }

            Operation::SplitNode { path, offset } => Self::apply_split_node(state, path, *offset),

            Operation::SetSelection { properties } => {
                Self::apply_set_selection(state, properties)
            }
        }
    }

    fn apply_insert_text(
        state: &State,
        path: &[usize],
        offset: usize,
        text: &str,
        marks: Option<&Marks>,
    ) -> Result<State> {
        let node = text_at(&state.document, path)?.insert_text(offset, text, marks)?;
        let key = node.key.clone();
        let document = state.document.update_at_path(path, Node::Text(node))?;

        let length = text.chars().count();
        let mut selection = state.selection.clone();
        if selection.anchor_key.as_ref() == Some(&key) && selection.anchor_offset >= offset {
            selection.anchor_offset += length;
        }
        if selection.focus_key.as_ref() == Some(&key) && selection.focus_offset >= offset {
            selection.focus_offset += length;
        }

        Ok(next(document, selection))
    }

    fn apply_remove_text(
        state: &State,
        path: &[usize],
        offset: usize,
        length: usize,
    ) -> Result<State> {
        let node = text_at(&state.document, path)?.remove_text(offset, length)?;
        let key = node.key.clone();
        let document = state.document.update_at_path(path, Node::Text(node))?;

        let shift = |point: usize| {
            if point >= offset + length {
                point - length
            } else if point > offset {
                offset
            } else {
                point
            }
        };
        let mut selection = state.selection.clone();
        if selection.anchor_key.as_ref() == Some(&key) {
            selection.anchor_offset = shift(selection.anchor_offset);
        }
        if selection.focus_key.as_ref() == Some(&key) {
            selection.focus_offset = shift(selection.focus_offset);
        }

        Ok(next(document, selection))
    }

    fn apply_mark(
        state: &State,
        path: &[usize],
        update: impl FnOnce(&Text) -> std::result::Result<Text, NodeError>,
    ) -> Result<State> {
        let node = update(text_at(&state.document, path)?)?;
        let document = state.document.update_at_path(path, Node::Text(node))?;
        Ok(next(document, state.selection.clone()))
    }

    fn apply_set_mark(
        state: &State,
        path: &[usize],
        offset: usize,
        length: usize,
        mark: &Mark,
        properties: &MarkProperties,
    ) -> Result<State> {
        Self::apply_mark(state, path, |text| {
            text.update_mark(offset, length, mark, properties)
        })
    }

    fn apply_insert_node(
        state: &State,
        path: &[usize],
        index: usize,
        node: &Node,
    ) -> Result<State> {
        let parent = state
            .document
            .assert_path(path)?
            .insert_node(index, Arc::new(node.clone()))?;
        let document = state.document.update_at_path(path, parent)?;
        Ok(next(document, state.selection.clone()))
    }

    fn apply_remove_node(state: &State, path: &[usize]) -> Result<State> {
        let (&index, parent_path) = path.split_last().ok_or(NodeError::RootNode)?;
        let removed = state.document.assert_path(path)?;
        let parent = state.document.assert_path(parent_path)?.remove_node(index)?;
        let document = state.document.update_at_path(parent_path, parent)?;

        let selection = selection_after_removal(&state.selection, &state.document, removed);
        Ok(next(document, selection))
    }

    fn apply_move_node(
        state: &State,
        path: &[usize],
        new_path: &[usize],
        new_index: usize,
    ) -> Result<State> {
        let (&index, parent_path) = path.split_last().ok_or(NodeError::RootNode)?;
        let parent = state.document.assert_path(parent_path)?;
        let moved = parent
            .nodes()
            .get(index)
            .cloned()
            .ok_or_else(|| NodeError::PathNotFound(path.to_vec()))?;
        // the target is resolved before the removal shifts any paths
        let target_key = state.document.assert_path(new_path)?.key().clone();

        let document = state
            .document
            .update_at_path(parent_path, parent.remove_node(index)?)?;
        let target_path = document.assert_path_of(&target_key)?;
        let target = document
            .assert_path(&target_path)?
            .insert_node(new_index, moved)?;
        let document = document.update_at_path(&target_path, target)?;

        Ok(next(document, state.selection.clone()))
    }

    fn apply_set_node(
        state: &State,
        path: &[usize],
        properties: &NodeProperties,
    ) -> Result<State> {
        let node = state.document.assert_path(path)?;
        if properties
            .nodes
            .as_ref()
            .is_some_and(|nodes| nodes.as_slice() != node.nodes())
        {
            warn!(
                "Ignoring `nodes` property in set_node on {}, use node operations to change children",
                node.key()
            );
        }
        if properties.key.as_ref().is_some_and(|key| key != node.key()) {
            warn!(
                "Ignoring `key` property in set_node on {}, keys cannot be changed",
                node.key()
            );
        }

        let document = state.document.update_at_path(path, node.merge(properties))?;
        Ok(next(document, state.selection.clone()))
    }

    fn apply_join_node(state: &State, path: &[usize], with_path: &[usize]) -> Result<State> {
        let first = state.document.assert_path(with_path)?;
        let second = state.document.assert_path(path)?;
        let document = state.document.join_node(first.key(), second.key())?;

        let mut selection = state.selection.clone();
        if second.is_text() {
            let (first_key, second_key, length) = (first.key(), second.key(), first.len());
            if selection.anchor_key.as_ref() == Some(second_key) {
                selection.anchor_key = Some(first_key.clone());
                selection.anchor_offset += length;
            }
            if selection.focus_key.as_ref() == Some(second_key) {
                selection.focus_key = Some(first_key.clone());
                selection.focus_offset += length;
            }
        }

        Ok(next(document, selection))
    }

    fn apply_split_node(state: &State, path: &[usize], offset: usize) -> Result<State> {
        let node = state.document.assert_path(path)?;
        let document = state.document.split_node(path, offset)?;

        // the text the split point falls in, and the split offset inside it
        let (split_key, text_offset) = match node {
            Node::Text(text) => (text.key.clone(), offset),
            _ => {
                let text = node
                    .get_text_at_offset(offset)
                    .ok_or_else(|| NodeError::KeyNotFound(node.key().clone()))?;
                (text.key.clone(), offset - node.get_offset(&text.key)?)
            }
        };
        let remainder = document
            .get_next_sibling(node.key())
            .and_then(|second| second.get_first_text())
            .map(|text| text.key.clone())
            .ok_or_else(|| NodeError::KeyNotFound(node.key().clone()))?;

        let mut selection = state.selection.clone();
        if selection.anchor_key.as_ref() == Some(&split_key) && selection.anchor_offset >= text_offset
        {
            selection.anchor_key = Some(remainder.clone());
            selection.anchor_offset -= text_offset;
        }
        if selection.focus_key.as_ref() == Some(&split_key) && selection.focus_offset >= text_offset {
            selection.focus_key = Some(remainder);
            selection.focus_offset -= text_offset;
        }

        Ok(next(document, selection))
    }

    fn apply_set_selection(state: &State, properties: &SelectionProperties) -> Result<State> {
        let mut properties = properties.clone();
        if let Some(path) = properties.anchor_path.take() {
            properties.anchor_key = Some(state.document.assert_path(&path)?.key().clone());
        }
        if let Some(path) = properties.focus_path.take() {
            properties.focus_key = Some(state.document.assert_path(&path)?.key().clone());
        }

        let selection = state.selection.merge(&properties).normalize(&state.document);
        Ok(State {
            document: state.document.clone(),
            selection,
        })
    }
}

fn next(document: Node, selection: Selection) -> State {
    State {
        document: Arc::new(document),
        selection,
    }
}

fn text_at<'a>(document: &'a Node, path: &[usize]) -> Result<&'a Text> {
    let node = document.assert_path(path)?;
    Ok(node
        .as_text()
        .ok_or_else(|| NodeError::NotText(node.key().clone()))?)
}

/// Moves selection points out of a removed subtree: the start to the end of
/// the nearest surviving text before it (or the start of the one after), the
/// end to the start of the nearest surviving text after it. This holds for
/// subtrees without texts too. Unsets the selection when no text survives.
fn selection_after_removal(selection: &Selection, document: &Node, removed: &Node) -> Selection {
    let (Some(start_key), Some(end_key)) = (selection.start_key(), selection.end_key()) else {
        return selection.clone();
    };
    let is_removed = |key: &Key| removed.key() == key || removed.has_descendant(key);
    let start_removed = is_removed(start_key);
    let end_removed = is_removed(end_key);
    if !start_removed && !end_removed {
        return selection.clone();
    }

    // surviving texts on either side of the removed node, in document order
    let Some(removed_path) = document.get_path(removed.key()) else {
        return selection.clone().unset();
    };
    let surviving: Vec<(Path, &Text)> = document
        .get_texts()
        .into_iter()
        .filter(|text| !is_removed(&text.key))
        .filter_map(|text| Some((document.get_path(&text.key)?, text)))
        .collect();
    let preceding = surviving
        .iter()
        .rev()
        .find(|(path, _)| *path < removed_path)
        .map(|(_, text)| *text);
    let following = surviving
        .iter()
        .find(|(path, _)| *path > removed_path)
        .map(|(_, text)| *text);

    let mut next = selection.clone();
    if start_removed {
        next = match (preceding, following) {
            (Some(text), _) => next.move_start_to(text.key.clone(), text.len()),
            (None, Some(text)) => next.move_start_to(text.key.clone(), 0),
            (None, None) => return next.unset(),
        };
    }
    if end_removed {
        next = match following {
            Some(text) if start_key != end_key => next.move_end_to(text.key.clone(), 0),
            _ => next.collapse_to_start(),
        };
    }
    next
}
