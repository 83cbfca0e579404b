//! Core structural rules.
//!
//! - documents contain only blocks
//! - a block contains only blocks, or only inlines and texts, decided by its
//!   first child
//! - inlines contain only inlines and texts
//! - blocks and inlines are never childless
//! - no two texts are adjacent siblings

use std::sync::Arc;

use folio_model::{Key, Node, NodeError};

use crate::errors::Result;
use crate::schema::Rule;
use crate::transform::Options;
use crate::Transform;

pub(crate) fn core_rules() -> Vec<Arc<dyn Rule>> {
    vec![
        Arc::new(DocumentChildrenAreBlocks),
        Arc::new(BlockChildrenAreUniform),
        Arc::new(InlineChildrenAreInline),
        Arc::new(ContainerHasText),
        Arc::new(AdjacentTextsAreJoined),
    ]
}

fn offenders(node: &Node, is_invalid: impl Fn(&Node) -> bool) -> Option<Vec<Key>> {
    let keys: Vec<Key> = node
        .nodes()
        .iter()
        .filter(|child| is_invalid(child))
        .map(|child| child.key().clone())
        .collect();
    (!keys.is_empty()).then_some(keys)
}

fn remove_all(transform: &mut Transform, keys: &[Key]) -> Result<()> {
    for key in keys {
        transform.remove_node_by_key(key, Options::skip_normalize())?;
    }
    Ok(())
}

#[derive(Debug)]
pub struct DocumentChildrenAreBlocks;

impl Rule for DocumentChildrenAreBlocks {
    fn name(&self) -> &str {
        "document_children_are_blocks"
    }

    fn validate(&self, node: &Node) -> Option<Vec<Key>> {
        if !node.is_document() {
            return None;
        }
        offenders(node, |child| !child.is_block())
    }

    fn normalize(&self, transform: &mut Transform, _node: &Node, value: &[Key]) -> Result<()> {
        remove_all(transform, value)
    }
}

#[derive(Debug)]
pub struct BlockChildrenAreUniform;

impl Rule for BlockChildrenAreUniform {
    fn name(&self) -> &str {
        "block_children_are_uniform"
    }

    fn validate(&self, node: &Node) -> Option<Vec<Key>> {
        if !node.is_block() {
            return None;
        }
        let wants_blocks = node.nodes().first()?.is_block();
        offenders(node, |child| {
            child.is_document() || child.is_block() != wants_blocks
        })
    }

    fn normalize(&self, transform: &mut Transform, _node: &Node, value: &[Key]) -> Result<()> {
        remove_all(transform, value)
    }
}

#[derive(Debug)]
pub struct InlineChildrenAreInline;

impl Rule for InlineChildrenAreInline {
    fn name(&self) -> &str {
        "inline_children_are_inline"
    }

    fn validate(&self, node: &Node) -> Option<Vec<Key>> {
        if !node.is_inline() {
            return None;
        }
        offenders(node, |child| !child.is_inline() && !child.is_text())
    }

    fn normalize(&self, transform: &mut Transform, _node: &Node, value: &[Key]) -> Result<()> {
        remove_all(transform, value)
    }
}

#[derive(Debug)]
pub struct ContainerHasText;

impl Rule for ContainerHasText {
    fn name(&self) -> &str {
        "container_has_text"
    }

    fn validate(&self, node: &Node) -> Option<Vec<Key>> {
        let is_container = node.is_block() || node.is_inline();
        (is_container && node.nodes().is_empty()).then(Vec::new)
    }

    fn normalize(&self, transform: &mut Transform, node: &Node, _value: &[Key]) -> Result<()> {
        transform.insert_node_by_key(node.key(), 0, Node::leaf(""), Options::skip_normalize())?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct AdjacentTextsAreJoined;

impl Rule for AdjacentTextsAreJoined {
    fn name(&self) -> &str {
        "adjacent_texts_are_joined"
    }

    /// Keys of every text that directly follows another text
    fn validate(&self, node: &Node) -> Option<Vec<Key>> {
        let keys: Vec<Key> = node
            .nodes()
            .windows(2)
            .filter(|pair| pair[0].is_text() && pair[1].is_text())
            .map(|pair| pair[1].key().clone())
            .collect();
        (!keys.is_empty()).then_some(keys)
    }

    fn normalize(&self, transform: &mut Transform, _node: &Node, value: &[Key]) -> Result<()> {
        // right to left, so each text joins whatever precedes it by then
        for key in value.iter().rev() {
            let document = transform.document().clone();
            let previous = document
                .get_previous_sibling(key)
                .ok_or_else(|| NodeError::KeyNotFound(key.clone()))?;
            transform.join_node_by_key(key, previous.key(), Options::skip_normalize())?;
        }
        Ok(())
    }
}
