//! Document tree and range operations.
//!
//! This module provides:
//! - `Document`, an arena of elements and text with generation-checked handles
//! - `Boundary`/`Anchor` ranges with extract, insert and surround operations
//! - `TextIndex` for boundary <-> byte offset conversion
//! - Markup loading (`roxmltree`) and serialization

mod markup;
mod node;
mod range;
mod text;
mod tree;

pub use markup::MarkupError;
pub use node::{Element, NodeId, NodeKind};
pub use range::{
    common_ancestor, compare, extract_contents, insert_at, surround_contents, text_in,
    validate_anchor, Anchor, Boundary, WrapError,
};
pub use text::{Affinity, TextIndex};
pub use tree::{Document, TreeError};
