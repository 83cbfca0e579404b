//! # Folio Model
//!
//! Immutable document tree for the Folio editing engine.
//!
//! ```text
//! Document
//!  └─ Block ("paragraph", "quote", ...)
//!      ├─ Text ──── Character { text, marks }
//!      └─ Inline ("link", ...)
//!          └─ Text
//! ```
//!
//! Values here never change in place. Every update returns a new tree that
//! shares unchanged subtrees with the old one through `Arc`, which keeps
//! snapshots cheap and lets callers detect untouched nodes by pointer.

pub mod error;
pub mod key;
pub mod mark;
pub mod node;
mod query;
pub mod selection;
pub mod text;

pub use error::NodeError;
pub use key::Key;
pub use mark::{is_superset, Data, Mark, MarkProperties, Marks};
pub use node::{Element, Kind, Node, NodeProperties, Path};
pub use selection::{Selection, SelectionProperties};
pub use text::{Character, Text};
