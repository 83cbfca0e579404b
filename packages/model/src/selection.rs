//! # Selection
//!
//! A selection (or range) is an anchor point and a focus point, each a text
//! key plus a character offset. `is_backward` records whether the focus
//! comes before the anchor in document order; `start`/`end` accessors hide
//! the direction from callers.
//!
//! A selection is either unset (no keys) or refers to text nodes that exist
//! in the document it is used with. [`Selection::normalize`] restores that
//! invariant after edits.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{Key, Node, Path, Text};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub anchor_key: Option<Key>,
    #[serde(default)]
    pub anchor_offset: usize,
    pub focus_key: Option<Key>,
    #[serde(default)]
    pub focus_offset: usize,
    #[serde(default)]
    pub is_backward: bool,
}

/// Partial selection carried by a `set_selection` operation. Paths, when
/// present, are resolved to keys against the document at apply time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_key: Option<Key>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_path: Option<Path>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_offset: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_key: Option<Key>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_path: Option<Path>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_offset: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_backward: Option<bool>,
}

impl From<&Selection> for SelectionProperties {
    fn from(selection: &Selection) -> Self {
        Self {
            anchor_key: selection.anchor_key.clone(),
            anchor_path: None,
            anchor_offset: Some(selection.anchor_offset),
            focus_key: selection.focus_key.clone(),
            focus_path: None,
            focus_offset: Some(selection.focus_offset),
            is_backward: Some(selection.is_backward),
        }
    }
}

impl Selection {
    /// Forward selection from anchor to focus. Call [`Selection::normalize`]
    /// to derive the real direction.
    pub fn new(anchor_key: Key, anchor_offset: usize, focus_key: Key, focus_offset: usize) -> Self {
        Self {
            anchor_key: Some(anchor_key),
            anchor_offset,
            focus_key: Some(focus_key),
            focus_offset,
            is_backward: false,
        }
    }

    pub fn collapsed(key: Key, offset: usize) -> Self {
        Self::new(key.clone(), offset, key, offset)
    }

    pub fn is_unset(&self) -> bool {
        self.anchor_key.is_none() || self.focus_key.is_none()
    }

    pub fn is_set(&self) -> bool {
        !self.is_unset()
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor_key == self.focus_key && self.anchor_offset == self.focus_offset
    }

    pub fn is_expanded(&self) -> bool {
        !self.is_collapsed()
    }

    pub fn start_key(&self) -> Option<&Key> {
        if self.is_backward {
            self.focus_key.as_ref()
        } else {
            self.anchor_key.as_ref()
        }
    }

    pub fn start_offset(&self) -> usize {
        if self.is_backward {
            self.focus_offset
        } else {
            self.anchor_offset
        }
    }

    pub fn end_key(&self) -> Option<&Key> {
        if self.is_backward {
            self.anchor_key.as_ref()
        } else {
            self.focus_key.as_ref()
        }
    }

    pub fn end_offset(&self) -> usize {
        if self.is_backward {
            self.anchor_offset
        } else {
            self.focus_offset
        }
    }

    /// Overlays `properties`. Paths are ignored; resolve them to keys first.
    pub fn merge(&self, properties: &SelectionProperties) -> Selection {
        Selection {
            anchor_key: properties
                .anchor_key
                .clone()
                .or_else(|| self.anchor_key.clone()),
            anchor_offset: properties.anchor_offset.unwrap_or(self.anchor_offset),
            focus_key: properties
                .focus_key
                .clone()
                .or_else(|| self.focus_key.clone()),
            focus_offset: properties.focus_offset.unwrap_or(self.focus_offset),
            is_backward: properties.is_backward.unwrap_or(self.is_backward),
        }
    }

    pub fn move_start_to(mut self, key: Key, offset: usize) -> Self {
        if self.is_backward {
            self.focus_key = Some(key);
            self.focus_offset = offset;
        } else {
            self.anchor_key = Some(key);
            self.anchor_offset = offset;
        }
        self
    }

    pub fn move_end_to(mut self, key: Key, offset: usize) -> Self {
        if self.is_backward {
            self.anchor_key = Some(key);
            self.anchor_offset = offset;
        } else {
            self.focus_key = Some(key);
            self.focus_offset = offset;
        }
        self
    }

    pub fn move_start_offset(self, delta: isize) -> Self {
        let offset = self.start_offset().saturating_add_signed(delta);
        match self.start_key().cloned() {
            Some(key) => self.move_start_to(key, offset),
            None => self,
        }
    }

    pub fn move_end_offset(self, delta: isize) -> Self {
        let offset = self.end_offset().saturating_add_signed(delta);
        match self.end_key().cloned() {
            Some(key) => self.move_end_to(key, offset),
            None => self,
        }
    }

    /// Shifts both points forward by `n` characters within their texts.
    pub fn move_forward(mut self, n: usize) -> Self {
        self.anchor_offset += n;
        self.focus_offset += n;
        self
    }

    pub fn move_backward(mut self, n: usize) -> Self {
        self.anchor_offset = self.anchor_offset.saturating_sub(n);
        self.focus_offset = self.focus_offset.saturating_sub(n);
        self
    }

    pub fn collapse_to_start(self) -> Self {
        let offset = self.start_offset();
        match self.start_key().cloned() {
            Some(key) => Self::collapsed(key, offset),
            None => self.unset(),
        }
    }

    pub fn collapse_to_end(self) -> Self {
        let offset = self.end_offset();
        match self.end_key().cloned() {
            Some(key) => Self::collapsed(key, offset),
            None => self.unset(),
        }
    }

    pub fn unset(self) -> Self {
        Self::default()
    }

    /// Spans from the start of `first` to the end of `last`.
    pub fn move_to_range_of(self, first: &Text, last: &Text) -> Self {
        Self::new(first.key.clone(), 0, last.key.clone(), last.len())
    }

    /// Collapsed at offset 0 of `node`'s first text.
    pub fn is_at_start_of(&self, node: &Node) -> bool {
        if self.is_expanded() || self.start_offset() != 0 {
            return false;
        }
        node.get_first_text()
            .is_some_and(|first| self.start_key() == Some(&first.key))
    }

    /// Collapsed at the end of `node`'s last text.
    pub fn is_at_end_of(&self, node: &Node) -> bool {
        if self.is_expanded() {
            return false;
        }
        node.get_last_text().is_some_and(|last| {
            self.end_key() == Some(&last.key) && self.end_offset() == last.len()
        })
    }

    /// Offset range this selection covers inside `text`, which must lie
    /// within it.
    pub fn span_of(&self, text: &Text) -> (usize, usize) {
        let is_start = self.start_key() == Some(&text.key);
        let is_end = self.end_key() == Some(&text.key);
        let start = if is_start {
            self.start_offset().min(text.len())
        } else {
            0
        };
        let end = if is_end {
            self.end_offset().min(text.len())
        } else {
            text.len()
        };
        (start, end.saturating_sub(start))
    }

    /// Resolves both points to existing text nodes and recomputes the
    /// direction. Points on container nodes move to the text at their offset.
    /// Returns an unset selection when either point cannot be resolved.
    pub fn normalize(&self, root: &Node) -> Selection {
        let (Some(anchor_key), Some(focus_key)) = (&self.anchor_key, &self.focus_key) else {
            return Selection::default();
        };
        let anchor = resolve_point(root, anchor_key, self.anchor_offset);
        let focus = resolve_point(root, focus_key, self.focus_offset);
        let (Some((anchor_key, anchor_offset)), Some((focus_key, focus_offset))) = (anchor, focus)
        else {
            return Selection::default();
        };

        let is_backward = if anchor_key == focus_key {
            anchor_offset > focus_offset
        } else {
            let texts = root.get_texts();
            let anchor_index = texts.iter().position(|text| text.key == anchor_key);
            let focus_index = texts.iter().position(|text| text.key == focus_key);
            anchor_index > focus_index
        };

        Selection {
            anchor_key: Some(anchor_key),
            anchor_offset,
            focus_key: Some(focus_key),
            focus_offset,
            is_backward,
        }
    }
}

fn resolve_point(root: &Node, key: &Key, offset: usize) -> Option<(Key, usize)> {
    let node = root.get_descendant(key)?;
    if let Some(text) = node.as_text() {
        return Some((text.key.clone(), offset.min(text.len())));
    }
    warn!(
        "Selection point on non-text node {}, moving it to the text at offset {}",
        key, offset
    );
    let text = node.get_text_at_offset(offset)?;
    let text_offset = offset.saturating_sub(node.get_offset(&text.key).ok()?);
    Some((text.key.clone(), text_offset.min(text.len())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Node {
        Node::document([
            Node::block("p", [Node::leaf("hello").with_key("a")]).with_key("p1"),
            Node::block("p", [Node::leaf("world").with_key("b")]).with_key("p2"),
        ])
    }

    #[test]
    fn test_direction_is_derived() {
        let selection = Selection::new("b".into(), 1, "a".into(), 2).normalize(&doc());
        assert!(selection.is_backward);
        assert_eq!(selection.start_key().unwrap().as_str(), "a");
        assert_eq!(selection.start_offset(), 2);
        assert_eq!(selection.end_key().unwrap().as_str(), "b");

        let same = Selection::new("a".into(), 4, "a".into(), 1).normalize(&doc());
        assert!(same.is_backward);
    }

    #[test]
    fn test_missing_key_unsets() {
        let selection = Selection::collapsed("gone".into(), 0).normalize(&doc());
        assert!(selection.is_unset());
    }

    #[test]
    fn test_block_point_moves_into_text() {
        let selection = Selection::collapsed("p2".into(), 3).normalize(&doc());
        assert_eq!(selection.anchor_key.as_ref().unwrap().as_str(), "b");
        assert_eq!(selection.anchor_offset, 3);
        assert!(selection.is_collapsed());
    }

    #[test]
    fn test_start_and_end_of_node() {
        let doc = doc();
        let block = doc.nodes()[0].as_ref();
        assert!(Selection::collapsed("a".into(), 0).is_at_start_of(block));
        assert!(Selection::collapsed("a".into(), 5).is_at_end_of(block));
        assert!(!Selection::new("a".into(), 0, "a".into(), 5).is_at_start_of(block));
        assert!(!Selection::collapsed("b".into(), 0).is_at_start_of(block));
    }

    #[test]
    fn test_moves_respect_direction() {
        let selection = Selection {
            is_backward: true,
            ..Selection::new("b".into(), 3, "a".into(), 1)
        };
        let moved = selection.clone().move_start_offset(2);
        assert_eq!(moved.focus_offset, 3);
        let collapsed = selection.collapse_to_start();
        assert_eq!(collapsed.anchor_key.as_ref().unwrap().as_str(), "a");
        assert!(collapsed.is_collapsed());
        assert!(!collapsed.is_backward);
    }

    #[test]
    fn test_span_of_text() {
        let doc = doc();
        let texts = doc.get_texts();
        let range = Selection::new("a".into(), 2, "b".into(), 3);
        assert_eq!(range.span_of(texts[0]), (2, 3));
        assert_eq!(range.span_of(texts[1]), (0, 3));
    }

    #[test]
    fn test_merge_properties() {
        let selection = Selection::collapsed("a".into(), 1);
        let merged = selection.merge(&SelectionProperties {
            focus_key: Some("b".into()),
            focus_offset: Some(2),
            ..SelectionProperties::default()
        });
        assert_eq!(merged.anchor_offset, 1);
        assert_eq!(merged.focus_key.unwrap().as_str(), "b");
    }
}
