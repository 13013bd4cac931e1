//! Highlight span model: palette, engine marker and removal policy.

mod color;
mod span;

pub use color::HighlightColor;
pub use span::{create as create_span, HighlightSpan, RemovalPolicy, COLOR_ATTR, MARKER_CLASS};
