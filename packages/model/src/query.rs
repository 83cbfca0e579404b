//! Read-only tree queries.

use std::sync::Arc;

use crate::{Character, Key, Marks, Node, NodeError, Selection, Text};

impl Node {
    /// Depth-first search for the descendant with `key`.
    pub fn get_descendant(&self, key: &Key) -> Option<&Arc<Node>> {
        for child in self.nodes() {
            if child.key() == key {
                return Some(child);
            }
            if let Some(found) = child.get_descendant(key) {
                return Some(found);
            }
        }
        None
    }

    pub fn assert_descendant(&self, key: &Key) -> Result<&Arc<Node>, NodeError> {
        self.get_descendant(key)
            .ok_or_else(|| NodeError::KeyNotFound(key.clone()))
    }

    pub fn has_descendant(&self, key: &Key) -> bool {
        self.get_descendant(key).is_some()
    }

    pub fn get_child(&self, key: &Key) -> Option<&Arc<Node>> {
        self.nodes().iter().find(|child| child.key() == key)
    }

    pub fn has_child(&self, key: &Key) -> bool {
        self.get_child(key).is_some()
    }

    pub fn index_of(&self, key: &Key) -> Option<usize> {
        self.nodes().iter().position(|child| child.key() == key)
    }

    pub fn get_parent(&self, key: &Key) -> Option<&Node> {
        if self.has_child(key) {
            return Some(self);
        }
        self.nodes().iter().find_map(|child| child.get_parent(key))
    }

    /// Child of this node that is, or contains, `key`.
    pub fn get_highest_child(&self, key: &Key) -> Option<&Arc<Node>> {
        self.nodes()
            .iter()
            .find(|child| child.key() == key || child.has_descendant(key))
    }

    /// Ancestors of `key`, root first, excluding the node itself.
    pub fn get_ancestors(&self, key: &Key) -> Option<Vec<&Node>> {
        if self.key() == key {
            return Some(Vec::new());
        }
        let path = self.get_path(key)?;
        let mut node = self;
        let mut ancestors = vec![self];
        for &index in &path[..path.len() - 1] {
            node = node.nodes()[index].as_ref();
            ancestors.push(node);
        }
        Some(ancestors)
    }

    /// Nearest ancestor of `key` matching `predicate`. The root counts.
    pub fn get_closest(&self, key: &Key, predicate: impl Fn(&Node) -> bool) -> Option<&Node> {
        self.get_ancestors(key)?
            .into_iter()
            .rev()
            .find(|ancestor| predicate(ancestor))
    }

    pub fn get_closest_block(&self, key: &Key) -> Option<&Node> {
        self.get_closest(key, Node::is_block)
    }

    pub fn get_closest_inline(&self, key: &Key) -> Option<&Node> {
        self.get_closest(key, Node::is_inline)
    }

    /// Furthest ancestor of `key` matching `predicate`, searching from the
    /// root down.
    pub fn get_furthest(&self, key: &Key, predicate: impl Fn(&Node) -> bool) -> Option<&Node> {
        self.get_ancestors(key)?
            .into_iter()
            .find(|ancestor| predicate(ancestor))
    }

    /// Deepest node that has both `one` and `two` strictly below it.
    ///
    /// When one key is an ancestor of the other, the result is that
    /// ancestor's parent.
    pub fn get_common_ancestor(&self, one: &Key, two: &Key) -> Option<&Node> {
        if self.key() == one || self.key() == two {
            return Some(self);
        }
        let one = self.get_path(one)?;
        let two = self.get_path(two)?;
        let limit = one.len().min(two.len()) - 1;
        let shared = one
            .iter()
            .zip(&two)
            .take(limit)
            .take_while(|(a, b)| a == b)
            .count();
        self.get_at_path(&one[..shared])
    }

    pub fn get_next_sibling(&self, key: &Key) -> Option<&Arc<Node>> {
        let parent = self.get_parent(key)?;
        let index = parent.index_of(key)?;
        parent.nodes().get(index + 1)
    }

    pub fn get_previous_sibling(&self, key: &Key) -> Option<&Arc<Node>> {
        let parent = self.get_parent(key)?;
        let index = parent.index_of(key)?;
        parent.nodes().get(index.checked_sub(1)?)
    }

    /// Every text leaf in document order. A text node yields itself.
    pub fn get_texts(&self) -> Vec<&Text> {
        let mut texts = Vec::new();
        self.collect_texts(&mut texts);
        texts
    }

    fn collect_texts<'a>(&'a self, texts: &mut Vec<&'a Text>) {
        match self {
            Node::Text(text) => texts.push(text),
            _ => {
                for child in self.nodes() {
                    child.collect_texts(texts);
                }
            }
        }
    }

    pub fn get_first_text(&self) -> Option<&Text> {
        match self {
            Node::Text(text) => Some(text),
            _ => self.nodes().iter().find_map(|child| child.get_first_text()),
        }
    }

    pub fn get_last_text(&self) -> Option<&Text> {
        match self {
            Node::Text(text) => Some(text),
            _ => self
                .nodes()
                .iter()
                .rev()
                .find_map(|child| child.get_last_text()),
        }
    }

    pub fn get_next_text(&self, key: &Key) -> Option<&Text> {
        let texts = self.get_texts();
        let index = texts.iter().position(|text| &text.key == key)?;
        texts.get(index + 1).copied()
    }

    pub fn get_previous_text(&self, key: &Key) -> Option<&Text> {
        let texts = self.get_texts();
        let index = texts.iter().position(|text| &text.key == key)?;
        texts.get(index.checked_sub(1)?).copied()
    }

    /// The text leaf containing character `offset` of this node.
    ///
    /// Offset 0 resolves to the first text and the full length to the last;
    /// otherwise the first text whose end lies past `offset` wins.
    pub fn get_text_at_offset(&self, offset: usize) -> Option<&Text> {
        let texts = self.get_texts();
        if offset == 0 {
            return texts.first().copied();
        }
        if offset == self.len() {
            return texts.last().copied();
        }
        let mut length = 0;
        texts.into_iter().find(|text| {
            length += text.len();
            length > offset
        })
    }

    /// Number of characters before the descendant `key` within this node.
    pub fn get_offset(&self, key: &Key) -> Result<usize, NodeError> {
        let child = self
            .get_highest_child(key)
            .ok_or_else(|| NodeError::KeyNotFound(key.clone()))?;
        let before: usize = self
            .nodes()
            .iter()
            .take_while(|node| !Arc::ptr_eq(node, child))
            .map(|node| node.len())
            .sum();
        if child.key() == key {
            Ok(before)
        } else {
            Ok(before + child.get_offset(key)?)
        }
    }

    /// A block whose children are not blocks
    pub fn is_leaf_block(&self) -> bool {
        self.is_block() && !self.nodes().first().is_some_and(|child| child.is_block())
    }

    /// Leaf blocks in document order
    pub fn get_blocks(&self) -> Vec<&Node> {
        let mut blocks = Vec::new();
        self.collect_blocks(&mut blocks);
        blocks
    }

    fn collect_blocks<'a>(&'a self, blocks: &mut Vec<&'a Node>) {
        for child in self.nodes() {
            if !child.is_block() {
                continue;
            }
            if child.is_leaf_block() {
                blocks.push(child);
            } else {
                child.collect_blocks(blocks);
            }
        }
    }

    /// Texts between the range's start and end keys, inclusive.
    pub fn get_texts_at_range(&self, range: &Selection) -> Vec<&Text> {
        let (Some(start_key), Some(end_key)) = (range.start_key(), range.end_key()) else {
            return Vec::new();
        };
        let texts = self.get_texts();
        let start = texts.iter().position(|text| &text.key == start_key);
        let end = texts.iter().position(|text| &text.key == end_key);
        match (start, end) {
            (Some(start), Some(end)) => texts[start.min(end)..=start.max(end)].to_vec(),
            _ => Vec::new(),
        }
    }

    /// Closest blocks of the texts in range, deduplicated, in order.
    pub fn get_blocks_at_range(&self, range: &Selection) -> Vec<&Node> {
        let mut blocks: Vec<&Node> = Vec::new();
        for text in self.get_texts_at_range(range) {
            if let Some(block) = self.get_closest_block(&text.key) {
                if !blocks.iter().any(|existing| existing.key() == block.key()) {
                    blocks.push(block);
                }
            }
        }
        blocks
    }

    pub fn get_inlines_at_range(&self, range: &Selection) -> Vec<&Node> {
        let mut inlines: Vec<&Node> = Vec::new();
        for text in self.get_texts_at_range(range) {
            if let Some(inline) = self.get_closest_inline(&text.key) {
                if !inlines.iter().any(|existing| existing.key() == inline.key()) {
                    inlines.push(inline);
                }
            }
        }
        inlines
    }

    pub fn get_characters_at_range(&self, range: &Selection) -> Vec<&Character> {
        let mut characters = Vec::new();
        for text in self.get_texts_at_range(range) {
            let (offset, length) = range.span_of(text);
            characters.extend(text.characters[offset..offset + length].iter());
        }
        characters
    }

    /// Union of the marks in range. A collapsed range reports the marks of
    /// the character before it.
    pub fn get_marks_at_range(&self, range: &Selection) -> Marks {
        if range.is_collapsed() {
            return match range.start_key().and_then(|key| self.get_descendant(key)) {
                Some(node) => node
                    .as_text()
                    .map(|text| text.marks_at_index(range.start_offset()))
                    .unwrap_or_default(),
                None => Marks::new(),
            };
        }
        let mut marks = Marks::new();
        for character in self.get_characters_at_range(range) {
            marks.extend(&character.marks);
        }
        marks
    }

    /// Marks carried by every character in range.
    pub fn get_common_marks_at_range(&self, range: &Selection) -> Marks {
        if range.is_collapsed() {
            return self.get_marks_at_range(range);
        }
        let mut characters = self.get_characters_at_range(range).into_iter();
        let Some(first) = characters.next() else {
            return Marks::new();
        };
        characters.fold(first.marks.clone(), |common, character| {
            common.intersect(&character.marks)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Mark;

    fn sample() -> Node {
        Node::document([
            Node::block(
                "list",
                [
                    Node::block("item", [Node::leaf("ab").with_key("t1")]).with_key("b1"),
                    Node::block(
                        "item",
                        [
                            Node::leaf("cd").with_key("t2"),
                            Node::inline("link", [Node::leaf("ef").with_key("t3")])
                                .with_key("i1"),
                            Node::leaf("").with_key("t4"),
                        ],
                    )
                    .with_key("b2"),
                ],
            )
            .with_key("list"),
            Node::block("paragraph", [Node::leaf("gh").with_key("t5")]).with_key("b3"),
        ])
        .with_key("doc")
    }

    #[test]
    fn test_ancestors_and_closest() {
        let doc = sample();
        let keys: Vec<&str> = doc
            .get_ancestors(&"t3".into())
            .unwrap()
            .iter()
            .map(|node| node.key().as_str())
            .collect();
        assert_eq!(keys, vec!["doc", "list", "b2", "i1"]);
        assert_eq!(doc.get_closest_block(&"t3".into()).unwrap().key().as_str(), "b2");
        assert_eq!(doc.get_closest_inline(&"t3".into()).unwrap().key().as_str(), "i1");
        assert_eq!(
            doc.get_furthest(&"t3".into(), Node::is_block).unwrap().key().as_str(),
            "list"
        );
    }

    #[test]
    fn test_common_ancestor() {
        let doc = sample();
        let common = |a: &str, b: &str| {
            doc.get_common_ancestor(&a.into(), &b.into())
                .unwrap()
                .key()
                .as_str()
                .to_string()
        };
        assert_eq!(common("t1", "t3"), "list");
        assert_eq!(common("t2", "t3"), "b2");
        assert_eq!(common("t1", "t5"), "doc");
        // an ancestor of the other key yields its own parent
        assert_eq!(common("b2", "t3"), "list");
    }

    #[test]
    fn test_text_at_offset() {
        let doc = sample();
        let key = |offset| doc.get_text_at_offset(offset).unwrap().key.as_str().to_string();
        assert_eq!(key(0), "t1");
        assert_eq!(key(1), "t1");
        assert_eq!(key(2), "t2");
        assert_eq!(key(5), "t3");
        assert_eq!(key(8), "t5");
        assert!(doc.get_text_at_offset(9).is_none());
    }

    #[test]
    fn test_offsets() {
        let doc = sample();
        assert_eq!(doc.get_offset(&"t3".into()).unwrap(), 4);
        assert_eq!(doc.get_offset(&"b3".into()).unwrap(), 6);
        assert!(doc.get_offset(&"missing".into()).is_err());
    }

    #[test]
    fn test_siblings_and_texts() {
        let doc = sample();
        assert_eq!(doc.get_next_sibling(&"t2".into()).unwrap().key().as_str(), "i1");
        assert!(doc.get_previous_sibling(&"t2".into()).is_none());
        assert_eq!(doc.get_next_text(&"t4".into()).unwrap().key.as_str(), "t5");
        assert_eq!(doc.get_previous_text(&"t2".into()).unwrap().key.as_str(), "t1");
        assert_eq!(doc.get_first_text().unwrap().key.as_str(), "t1");
        assert_eq!(doc.get_last_text().unwrap().key.as_str(), "t5");
    }

    #[test]
    fn test_leaf_blocks() {
        let doc = sample();
        let keys: Vec<&str> = doc.get_blocks().iter().map(|b| b.key().as_str()).collect();
        assert_eq!(keys, vec!["b1", "b2", "b3"]);
    }

    #[test]
    fn test_range_queries() {
        let doc = sample();
        let range = Selection::new("t1".into(), 1, "t3".into(), 1);
        let texts: Vec<&str> = doc
            .get_texts_at_range(&range)
            .iter()
            .map(|t| t.key.as_str())
            .collect();
        assert_eq!(texts, vec!["t1", "t2", "t3"]);
        let blocks: Vec<&str> = doc
            .get_blocks_at_range(&range)
            .iter()
            .map(|b| b.key().as_str())
            .collect();
        assert_eq!(blocks, vec!["b1", "b2"]);
        assert_eq!(doc.get_inlines_at_range(&range).len(), 1);
        let characters: String = doc
            .get_characters_at_range(&range)
            .iter()
            .map(|c| c.text)
            .collect();
        assert_eq!(characters, "bcde");
    }

    #[test]
    fn test_marks_at_range() {
        let bold = Mark::new("bold");
        let italic = Mark::new("italic");
        let text = Text::new("abcd")
            .add_mark(0, 4, &bold)
            .unwrap()
            .add_mark(0, 2, &italic)
            .unwrap();
        let key = text.key.clone();
        let doc = Node::document([Node::block("p", [Node::Text(text)])]);

        let range = Selection::new(key.clone(), 0, key.clone(), 4);
        let all = doc.get_marks_at_range(&range);
        assert!(all.contains(&bold) && all.contains(&italic));
        let common = doc.get_common_marks_at_range(&range);
        assert!(common.contains(&bold) && !common.contains(&italic));

        let caret = Selection::collapsed(key, 3);
        assert_eq!(doc.get_marks_at_range(&caret), Marks::from(vec![bold]));
    }
}
