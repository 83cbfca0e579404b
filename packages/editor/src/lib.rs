//! # Folio Editor
//!
//! Transform engine for Folio documents.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ at_range: editing commands over a range     │
//! │  - delete, insert text/block/fragment       │
//! │  - marks, wrap/unwrap, split                │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ by_key: edits addressed by node key         │
//! │  - key → path resolution                    │
//! │  - scoped normalization after each edit     │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ operation: primitive path-addressed edits   │
//! │  - applied to immutable State snapshots     │
//! │  - recorded in the transform's log          │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Normalization sits beside the by-key layer. Schema rules validate nodes
//! and repair them with by-key edits, so repairs are logged operations too.
//!
//! ## Core Principles
//!
//! 1. **Snapshots are immutable**: every operation yields a new [`State`]
//! 2. **Operations are the record**: replaying a log rebuilds the document
//! 3. **Keys are identity**: paths are derived fresh for each edit
//! 4. **Normalize after, not during**: composite commands repair once
//!
//! ## Usage
//!
//! ```rust,ignore
//! use folio_editor::{Node, Options, Selection, State};
//!
//! let document = Node::document([Node::block("paragraph", [Node::leaf("Hello").with_key("t")])]);
//! let state = State::new(document);
//!
//! let mut transform = state.transform();
//! transform.insert_text_at_range(&Selection::collapsed("t".into(), 5), " world", None, Options::default())?;
//! let change = transform.commit()?;
//!
//! assert_eq!(change.state.document.text(), "Hello world");
//! // change.operations can be sent to peers and replayed
//! ```

mod apply;
pub mod at_range;
pub mod by_key;
pub mod errors;
pub mod normalize;
pub mod operation;
mod rules;
pub mod schema;
pub mod state;
pub mod transform;

pub use errors::{Result, TransformError};
pub use normalize::MAX_NORMALIZE_CALLS;
pub use operation::{operations_from_json, Operation};
pub use rules::{
    AdjacentTextsAreJoined, BlockChildrenAreUniform, ContainerHasText, DocumentChildrenAreBlocks,
    InlineChildrenAreInline,
};
pub use schema::{Failure, Rule, Schema};
pub use state::State;
pub use transform::{Change, Options, Transform};

pub use folio_model::{
    Character, Data, Key, Kind, Mark, MarkProperties, Marks, Node, NodeError, NodeProperties,
    Path, Selection, SelectionProperties, Text,
};
