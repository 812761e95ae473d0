//! # Pagemap DOM
//!
//! A small arena-backed markup document used by the page mapper. Source
//! pages and rendered pages are both parsed into a [`Document`]; nodes are
//! addressed by [`NodeId`] so that mapping tables can hold plain indexes
//! instead of borrowed references.

pub mod error;
pub mod node;
pub mod parser;
pub mod selector;
pub mod serializer;
pub mod tokenizer;

pub use error::{SelectorError, SelectorResult};
pub use node::{Attribute, Document, Element, NodeData, NodeId};
pub use parser::parse;
pub use selector::Selector;
pub use serializer::{escape_attribute, escape_text};
