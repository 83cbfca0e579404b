//! # Document Nodes
//!
//! A document is a tree of [`Node`] values. Containers (document, block,
//! inline) hold their children as `Arc<Node>`, so every update below copies
//! only the chain from the edited node up to the root and shares all other
//! subtrees with the previous tree.
//!
//! ## Addressing
//!
//! Nodes are addressed two ways:
//!
//! - by [`Key`], stable for the node's whole life
//! - by [`Path`], the child indexes from the root, valid for one tree only
//!
//! Every method here returns a new tree and leaves `self` untouched.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{is_superset, Data, Key, Marks, NodeError, Text};

type Result<T> = std::result::Result<T, NodeError>;

/// Child indexes leading from the root to a node. The root's path is empty.
pub type Path = Vec<usize>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Document,
    Block,
    Inline,
    Text,
}

/// Payload shared by document, block and inline nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub key: Key,
    #[serde(rename = "type", default)]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Data::is_empty")]
    pub data: Data,
    #[serde(default)]
    pub is_void: bool,
    #[serde(default)]
    pub nodes: Vec<Arc<Node>>,
}

impl Element {
    fn new(node_type: impl Into<String>, nodes: impl IntoIterator<Item = Node>) -> Self {
        Self {
            key: Key::generate(),
            node_type: node_type.into(),
            data: Data::new(),
            is_void: false,
            nodes: nodes.into_iter().map(Arc::new).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Node {
    Document(Element),
    Block(Element),
    Inline(Element),
    Text(Text),
}

/// Partial node used by `set_node` and to match wrappers when unwrapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeProperties {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Data>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_void: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<Key>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Vec<Arc<Node>>>,
}

impl NodeProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(node_type: impl Into<String>) -> Self {
        Self {
            node_type: Some(node_type.into()),
            ..Self::default()
        }
    }

    pub fn data(mut self, data: Data) -> Self {
        self.data = Some(data);
        self
    }

    pub fn void(mut self, is_void: bool) -> Self {
        self.is_void = Some(is_void);
        self
    }

    /// A node matches when its type equals the given type and its data is a
    /// superset of the given data. Unset fields match anything.
    pub fn matches(&self, node: &Node) -> bool {
        let Some(element) = node.as_element() else {
            return false;
        };
        self.node_type
            .as_ref()
            .map_or(true, |node_type| &element.node_type == node_type)
            && self
                .data
                .as_ref()
                .map_or(true, |data| is_superset(&element.data, data))
            && self.is_void.map_or(true, |is_void| element.is_void == is_void)
    }
}

impl From<&str> for NodeProperties {
    fn from(node_type: &str) -> Self {
        Self::with_type(node_type)
    }
}

impl Node {
    pub fn document(nodes: impl IntoIterator<Item = Node>) -> Self {
        Node::Document(Element::new("", nodes))
    }

    pub fn block(node_type: impl Into<String>, nodes: impl IntoIterator<Item = Node>) -> Self {
        Node::Block(Element::new(node_type, nodes))
    }

    pub fn inline(node_type: impl Into<String>, nodes: impl IntoIterator<Item = Node>) -> Self {
        Node::Inline(Element::new(node_type, nodes))
    }

    /// A fresh text leaf with no marks
    pub fn leaf(content: &str) -> Self {
        Node::Text(Text::new(content))
    }

    pub fn marked_text(content: &str, marks: &Marks) -> Self {
        Node::Text(Text::with_marks(content, marks))
    }

    pub fn with_key(mut self, key: impl Into<Key>) -> Self {
        *self.key_mut() = key.into();
        self
    }

    pub fn with_void(mut self, is_void: bool) -> Self {
        if let Some(element) = self.element_mut() {
            element.is_void = is_void;
        }
        self
    }

    pub fn with_data(mut self, data: Data) -> Self {
        if let Some(element) = self.element_mut() {
            element.data = data;
        }
        self
    }

    pub fn key(&self) -> &Key {
        match self {
            Node::Document(element) | Node::Block(element) | Node::Inline(element) => &element.key,
            Node::Text(text) => &text.key,
        }
    }

    fn key_mut(&mut self) -> &mut Key {
        match self {
            Node::Document(element) | Node::Block(element) | Node::Inline(element) => {
                &mut element.key
            }
            Node::Text(text) => &mut text.key,
        }
    }

    pub fn kind(&self) -> Kind {
        match self {
            Node::Document(_) => Kind::Document,
            Node::Block(_) => Kind::Block,
            Node::Inline(_) => Kind::Inline,
            Node::Text(_) => Kind::Text,
        }
    }

    pub fn is_document(&self) -> bool {
        matches!(self, Node::Document(_))
    }

    pub fn is_block(&self) -> bool {
        matches!(self, Node::Block(_))
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, Node::Inline(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Node::Text(_))
    }

    pub fn is_void(&self) -> bool {
        self.as_element().is_some_and(|element| element.is_void)
    }

    pub fn node_type(&self) -> Option<&str> {
        self.as_element().map(|element| element.node_type.as_str())
    }

    pub fn data(&self) -> Option<&Data> {
        self.as_element().map(|element| &element.data)
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Document(element) | Node::Block(element) | Node::Inline(element) => Some(element),
            Node::Text(_) => None,
        }
    }

    fn element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Document(element) | Node::Block(element) | Node::Inline(element) => Some(element),
            Node::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&Text> {
        match self {
            Node::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Children of a container; empty for text
    pub fn nodes(&self) -> &[Arc<Node>] {
        self.as_element()
            .map(|element| element.nodes.as_slice())
            .unwrap_or(&[])
    }

    /// Concatenated text content
    pub fn text(&self) -> String {
        match self {
            Node::Text(text) => text.text(),
            _ => self.nodes().iter().map(|child| child.text()).collect(),
        }
    }

    /// Length of the text content in characters
    pub fn len(&self) -> usize {
        match self {
            Node::Text(text) => text.len(),
            _ => self.nodes().iter().map(|child| child.len()).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn map_element(&self, update: impl FnOnce(&Element) -> Element) -> Node {
        match self {
            Node::Document(element) => Node::Document(update(element)),
            Node::Block(element) => Node::Block(update(element)),
            Node::Inline(element) => Node::Inline(update(element)),
            Node::Text(_) => self.clone(),
        }
    }

    /// Same node with its children replaced. Text nodes are returned as is.
    pub fn with_nodes(&self, nodes: Vec<Arc<Node>>) -> Node {
        self.map_element(|element| Element {
            key: element.key.clone(),
            node_type: element.node_type.clone(),
            data: element.data.clone(),
            is_void: element.is_void,
            nodes,
        })
    }

    /// Applies type, data and void flag from `properties`. Key and children
    /// are left alone.
    pub fn merge(&self, properties: &NodeProperties) -> Node {
        self.map_element(|element| Element {
            key: element.key.clone(),
            node_type: properties
                .node_type
                .clone()
                .unwrap_or_else(|| element.node_type.clone()),
            data: properties
                .data
                .clone()
                .unwrap_or_else(|| element.data.clone()),
            is_void: properties.is_void.unwrap_or(element.is_void),
            nodes: element.nodes.clone(),
        })
    }

    /// Inserts `node` as a child at `index`, clamped to the child count.
    pub fn insert_node(&self, index: usize, node: Arc<Node>) -> Result<Node> {
        let element = self
            .as_element()
            .ok_or_else(|| NodeError::NotAContainer(self.key().clone()))?;
        let mut nodes = element.nodes.clone();
        let insert_index = index.min(nodes.len());
        nodes.insert(insert_index, node);
        Ok(self.with_nodes(nodes))
    }

    pub fn remove_node(&self, index: usize) -> Result<Node> {
        let element = self
            .as_element()
            .ok_or_else(|| NodeError::NotAContainer(self.key().clone()))?;
        if index >= element.nodes.len() {
            return Err(NodeError::IndexOutOfRange {
                key: self.key().clone(),
                index,
            });
        }
        let mut nodes = element.nodes.clone();
        nodes.remove(index);
        Ok(self.with_nodes(nodes))
    }

    /// Applies `update` to every descendant, children before parents.
    pub fn map_descendants<F>(&self, update: &mut F) -> Node
    where
        F: FnMut(Node) -> Node,
    {
        let mut nodes = Vec::with_capacity(self.nodes().len());
        for child in self.nodes() {
            let mapped = if child.is_text() {
                child.as_ref().clone()
            } else {
                child.map_descendants(update)
            };
            nodes.push(Arc::new(update(mapped)));
        }
        self.with_nodes(nodes)
    }

    /// Fresh keys for this node and every descendant
    pub fn regenerate_key(&self) -> Node {
        self.map_descendants(&mut |node| node.with_key(Key::generate()))
            .with_key(Key::generate())
    }

    /// Node at `path`, the root itself for an empty path
    pub fn get_at_path(&self, path: &[usize]) -> Option<&Node> {
        path.iter()
            .try_fold(self, |node, &index| node.nodes().get(index).map(Arc::as_ref))
    }

    pub fn assert_path(&self, path: &[usize]) -> Result<&Node> {
        self.get_at_path(path)
            .ok_or_else(|| NodeError::PathNotFound(path.to_vec()))
    }

    pub fn get_path(&self, key: &Key) -> Option<Path> {
        if self.key() == key {
            return Some(Vec::new());
        }
        self.nodes().iter().enumerate().find_map(|(index, child)| {
            child.get_path(key).map(|mut path| {
                path.insert(0, index);
                path
            })
        })
    }

    pub fn assert_path_of(&self, key: &Key) -> Result<Path> {
        self.get_path(key)
            .ok_or_else(|| NodeError::KeyNotFound(key.clone()))
    }

    /// Replaces the node at `path` with `node`, rebuilding its ancestors.
    pub fn update_at_path(&self, path: &[usize], node: Node) -> Result<Node> {
        let Some((&index, rest)) = path.split_first() else {
            return Ok(node);
        };
        let child = self
            .nodes()
            .get(index)
            .ok_or_else(|| NodeError::PathNotFound(path.to_vec()))?;
        let updated = child.update_at_path(rest, node)?;
        let mut nodes = self.nodes().to_vec();
        nodes[index] = Arc::new(updated);
        Ok(self.with_nodes(nodes))
    }

    /// Replaces the descendant carrying `node`'s key.
    pub fn update_descendant(&self, node: Node) -> Result<Node> {
        let path = self.assert_path_of(node.key())?;
        self.update_at_path(&path, node)
    }

    pub fn remove_descendant(&self, key: &Key) -> Result<Node> {
        let path = self.assert_path_of(key)?;
        let (&index, parent_path) = path.split_last().ok_or(NodeError::RootNode)?;
        let parent = self.assert_path(parent_path)?.remove_node(index)?;
        self.update_at_path(parent_path, parent)
    }

    /// Splits the node at `path` into two siblings at text `offset`, relative
    /// to that node. Every node between the target and the split point is
    /// split too; the right-hand pieces get fresh keys.
    pub fn split_node(&self, path: &[usize], offset: usize) -> Result<Node> {
        let (&index, parent_path) = path.split_last().ok_or(NodeError::RootNode)?;
        let node = self.assert_path(path)?;
        let (one, two) = node.split_at_offset(offset)?;

        let parent = self.assert_path(parent_path)?;
        let mut nodes = parent.nodes().to_vec();
        nodes[index] = Arc::new(one);
        nodes.insert(index + 1, Arc::new(two));
        let parent = parent.with_nodes(nodes);
        self.update_at_path(parent_path, parent)
    }

    /// The two halves of this node split at text `offset`
    pub fn split_at_offset(&self, offset: usize) -> Result<(Node, Node)> {
        if let Node::Text(text) = self {
            let (one, two) = text.split_at(offset)?;
            return Ok((Node::Text(one), Node::Text(two)));
        }
        let text = self
            .get_text_at_offset(offset)
            .ok_or_else(|| NodeError::OffsetOutOfRange {
                key: self.key().clone(),
                offset,
                end: offset,
                length: self.len(),
            })?;
        let text_offset = offset - self.get_offset(&text.key)?;
        let target = text.key.clone();
        self.split_around(&target, text_offset)
    }

    fn split_around(&self, target: &Key, text_offset: usize) -> Result<(Node, Node)> {
        if let Node::Text(text) = self {
            let (one, two) = text.split_at(text_offset)?;
            return Ok((Node::Text(one), Node::Text(two)));
        }
        let nodes = self.nodes();
        let index = nodes
            .iter()
            .position(|child| child.key() == target || child.has_descendant(target))
            .ok_or_else(|| NodeError::KeyNotFound(target.clone()))?;
        let (one, two) = nodes[index].split_around(target, text_offset)?;

        let mut left = nodes[..index].to_vec();
        left.push(Arc::new(one));
        let mut right = vec![Arc::new(two)];
        right.extend(nodes[index + 1..].iter().cloned());

        Ok((
            self.with_nodes(left),
            self.with_nodes(right).with_key(Key::generate()),
        ))
    }

    /// Appends `second`'s content to `first` and removes `second`.
    pub fn join_node(&self, first: &Key, second: &Key) -> Result<Node> {
        let one = self.assert_descendant(first)?;
        let two = self.assert_descendant(second)?;

        let joined = match (one.as_ref(), two.as_ref()) {
            (Node::Text(one), Node::Text(two)) => Node::Text(one.join(two)),
            (one, two) if !one.is_text() && !two.is_text() => {
                let mut nodes = one.nodes().to_vec();
                nodes.extend(two.nodes().iter().cloned());
                one.with_nodes(nodes)
            }
            _ => {
                return Err(NodeError::JoinMismatch {
                    first: first.clone(),
                    second: second.clone(),
                })
            }
        };

        self.remove_descendant(second)?.update_descendant(joined)
    }
}
