//! Markup loading and serialization.
//!
//! Input is parsed with `roxmltree`, so it must be well-formed (XHTML-style:
//! void elements self-closed, only XML entities). Fragments with several top
//! level nodes are accepted by wrapping them before parsing.

use roxmltree::ParsingOptions;

use super::node::{NodeId, NodeKind};
use super::tree::Document;

const WRAPPER: &str = "spanmark-fragment";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Markup could not be parsed.
#[derive(Debug, thiserror::Error)]
#[error("invalid markup: {0}")]
pub struct MarkupError(#[from] roxmltree::Error);

fn options() -> ParsingOptions {
    ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    }
}

impl Document {
    /// Parse markup into a new document.
    pub fn parse(markup: &str) -> Result<Self, MarkupError> {
        let mut document = Self::new();
        let root = document.root();
        document.load_markup(root, markup)?;
        Ok(document)
    }

    /// Parse markup, falling back to a single text run when it is not
    /// well-formed.
    pub fn parse_or_text(markup: &str) -> Self {
        Self::parse(markup).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "markup rejected, loading as plain text");
            Self::from_text(markup)
        })
    }

    /// Parse `markup` and append the resulting nodes under `parent`.
    ///
    /// Nothing is appended when parsing fails.
    pub fn load_markup(&mut self, parent: NodeId, markup: &str) -> Result<(), MarkupError> {
        if markup.trim().is_empty() {
            if !markup.is_empty() {
                let text = self.create_text(markup);
                self.attach_fresh(parent, text);
            }
            return Ok(());
        }

        if let Ok(parsed) = roxmltree::Document::parse_with_options(markup, options()) {
            self.import(parent, parsed.root_element());
            return Ok(());
        }

        let wrapped = format!("<{WRAPPER}>{markup}</{WRAPPER}>");
        let parsed = roxmltree::Document::parse_with_options(&wrapped, options())?;
        for child in parsed.root_element().children() {
            self.import(parent, child);
        }
        Ok(())
    }

    fn import(&mut self, parent: NodeId, source: roxmltree::Node<'_, '_>) {
        if source.is_text() {
            if let Some(text) = source.text() {
                let node = self.create_text(text);
                self.attach_fresh(parent, node);
            }
            return;
        }
        if !source.is_element() {
            return;
        }

        let node = self.create_element(source.tag_name().name());
        if let Some(element) = self.element_mut(node) {
            for attribute in source.attributes() {
                element.set_attribute(attribute.name(), attribute.value());
            }
        }
        self.attach_fresh(parent, node);
        for child in source.children() {
            self.import(node, child);
        }
    }

    /// Serialize the whole document body.
    pub fn to_markup(&self) -> String {
        self.inner_markup(self.root())
    }

    /// Serialize the children of `id`.
    pub fn inner_markup(&self, id: NodeId) -> String {
        let mut out = String::new();
        for &child in self.children(id) {
            self.write_node(child, &mut out);
        }
        out
    }

    /// Serialize `id` including its own tag.
    pub fn outer_markup(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match self.kind(id) {
            Some(NodeKind::Text(text)) => {
                out.push_str(&html_escape::encode_text(text));
            }
            Some(NodeKind::Element(element)) => {
                out.push('<');
                out.push_str(&element.tag);
                for (name, value) in &element.attributes {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&html_escape::encode_double_quoted_attribute(value));
                    out.push('"');
                }
                let children = self.children(id);
                if children.is_empty() && VOID_ELEMENTS.iter().any(|tag| element.is(tag)) {
                    out.push_str("/>");
                    return;
                }
                out.push('>');
                for &child in children {
                    self.write_node(child, out);
                }
                out.push_str("</");
                out.push_str(&element.tag);
                out.push('>');
            }
            Some(NodeKind::Root | NodeKind::Fragment) => {
                for &child in self.children(id) {
                    self.write_node(child, out);
                }
            }
            None => {}
        }
    }
}
