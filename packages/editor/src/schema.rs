//! # Schema
//!
//! Normalization rules that keep a document well formed.
//!
//! A rule inspects one node. When the node is invalid, `validate` returns the
//! keys the rule needs to repair it, and `normalize` performs the repair
//! through ordinary transforms. Repairs are therefore recorded as operations
//! like any other edit.
//!
//! Rules are checked in order and only the first failing rule is repaired
//! before the node is validated again.

use std::fmt::Debug;
use std::sync::Arc;

use folio_model::{Key, Node};

use crate::errors::Result;
use crate::rules;
use crate::Transform;

/// A normalization rule
pub trait Rule: Debug + Send + Sync {
    fn name(&self) -> &str;

    /// `None` when `node` is valid, otherwise the keys to hand to `normalize`
    fn validate(&self, node: &Node) -> Option<Vec<Key>>;

    /// Repair `node`, given the value returned by `validate`
    fn normalize(&self, transform: &mut Transform, node: &Node, value: &[Key]) -> Result<()>;
}

/// First rule a node fails, with the rule's validation value
pub struct Failure<'a> {
    pub rule: &'a dyn Rule,
    pub value: Vec<Key>,
}

#[derive(Debug, Clone, Default)]
pub struct Schema {
    rules: Vec<Arc<dyn Rule>>,
}

impl Schema {
    pub fn new(rules: Vec<Arc<dyn Rule>>) -> Self {
        Self { rules }
    }

    /// Structural rules every document obeys
    pub fn core() -> Self {
        Self::new(rules::core_rules())
    }

    pub fn with_rule(mut self, rule: impl Rule + 'static) -> Self {
        self.rules.push(Arc::new(rule));
        self
    }

    pub fn rules(&self) -> &[Arc<dyn Rule>] {
        &self.rules
    }

    /// Whether this schema can change anything at all
    pub fn is_normalization(&self) -> bool {
        !self.rules.is_empty()
    }

    pub fn validate(&self, node: &Node) -> Option<Failure<'_>> {
        self.rules.iter().find_map(|rule| {
            rule.validate(node).map(|value| Failure {
                rule: rule.as_ref(),
                value,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_failing_rule_wins() {
        let schema = Schema::core();
        let document = Node::document([Node::leaf("loose"), Node::inline("link", [])]);
        let failure = schema.validate(&document).unwrap();
        assert_eq!(failure.rule.name(), "document_children_are_blocks");
        assert_eq!(failure.value.len(), 2);
    }

    #[test]
    fn test_valid_node_passes() {
        let schema = Schema::core();
        let block = Node::block("p", [Node::leaf("ok")]);
        assert!(schema.validate(&block).is_none());
    }

    #[test]
    fn test_empty_schema_does_not_normalize() {
        assert!(!Schema::default().is_normalization());
        assert!(Schema::core().is_normalization());
    }
}
