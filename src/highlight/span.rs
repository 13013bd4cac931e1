//! Engine-authored highlight containers and the removal policy.

use std::sync::LazyLock;

use regex::Regex;

use super::color::HighlightColor;
use crate::document::{Document, Element, NodeId};

/// Class carried by every container the engine creates.
pub const MARKER_CLASS: &str = "spanmark-highlight";

/// Attribute recording the palette token of an engine container.
pub const COLOR_ATTR: &str = "data-highlight-color";

static BACKGROUND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)background(?:-color)?\s*:\s*([^;]+)").unwrap());

const TRANSPARENT: &[&str] = &[
    "transparent",
    "none",
    "initial",
    "inherit",
    "unset",
    "rgba(0,0,0,0)",
    "#0000",
    "#00000000",
];

/// Allocate a detached highlight container for `color`.
pub fn create(document: &mut Document, color: HighlightColor) -> NodeId {
    let node = document.create_element("span");
    if let Some(element) = document.element_mut(node) {
        element.set_attribute("class", MARKER_CLASS);
        element.set_attribute(COLOR_ATTR, color.name());
        element.set_attribute(
            "style",
            format!("background-color: {}; color: black", color.hex()),
        );
    }
    node
}

/// Whether the element carries the engine marker.
pub fn is_engine_span(element: &Element) -> bool {
    element.has_class(MARKER_CLASS)
}

/// Whether an inline `style` sets a visible background.
pub fn has_background(element: &Element) -> bool {
    let Some(style) = element.attribute("style") else {
        return false;
    };
    BACKGROUND.captures_iter(style).any(|captures| {
        let value: String = captures[1]
            .trim()
            .trim_end_matches("!important")
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        !value.is_empty() && !TRANSPARENT.contains(&value.as_str())
    })
}

/// An engine container found in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightSpan {
    pub node: NodeId,
    pub color: HighlightColor,
}

impl HighlightSpan {
    /// View `node` as an engine container, if it is one.
    pub fn from_node(document: &Document, node: NodeId) -> Option<Self> {
        let element = document.element(node)?;
        if !is_engine_span(element) {
            return None;
        }
        let color = element
            .attribute(COLOR_ATTR)
            .map(HighlightColor::from_token)
            .unwrap_or_default();
        Some(Self { node, color })
    }

    /// Every engine container under `root`, in document order.
    pub fn all(document: &Document, root: NodeId) -> Vec<Self> {
        document
            .descendants(root)
            .filter_map(|node| Self::from_node(document, node))
            .collect()
    }
}

/// Decides which containers `remove` unwraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemovalPolicy {
    /// Also strip inline `span`/`mark` elements with a non-transparent
    /// background that the engine did not author.
    pub strip_foreign_backgrounds: bool,
}

impl Default for RemovalPolicy {
    fn default() -> Self {
        Self {
            strip_foreign_backgrounds: true,
        }
    }
}

impl RemovalPolicy {
    pub fn matches(&self, element: &Element) -> bool {
        if is_engine_span(element) {
            return true;
        }
        self.strip_foreign_backgrounds
            && (element.is("span") || element.is("mark"))
            && has_background(element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn styled(tag: &str, style: &str) -> Element {
        let mut element = Element::new(tag);
        element.set_attribute("style", style);
        element
    }

    #[test]
    fn create_tags_container() {
        let mut doc = Document::new();
        let node = create(&mut doc, HighlightColor::Green);
        assert_eq!(
            doc.outer_markup(node),
            r#"<span class="spanmark-highlight" data-highlight-color="green" style="background-color: #4caf50; color: black"></span>"#
        );
        assert_eq!(
            HighlightSpan::from_node(&doc, node),
            Some(HighlightSpan {
                node,
                color: HighlightColor::Green
            })
        );
    }

    #[test]
    fn background_detection() {
        assert!(has_background(&styled("span", "background-color: #ff0")));
        assert!(has_background(&styled("span", "color: red; BACKGROUND: yellow")));
        assert!(!has_background(&styled("span", "background-color: transparent")));
        assert!(!has_background(&styled("span", "background: rgba(0, 0, 0, 0)")));
        assert!(!has_background(&styled("span", "color: red")));
        assert!(!has_background(&Element::new("span")));
    }

    #[test]
    fn policy_covers_inline_backgrounds() {
        let policy = RemovalPolicy::default();
        assert!(policy.matches(&styled("span", "background-color: pink")));
        assert!(policy.matches(&styled("mark", "background: #ff0")));
        assert!(!policy.matches(&styled("div", "background: #ff0")));
        assert!(!policy.matches(&styled("span", "font-weight: bold")));
    }

    #[test]
    fn strict_policy_only_matches_marker() {
        let policy = RemovalPolicy {
            strip_foreign_backgrounds: false,
        };
        let mut engine = Element::new("span");
        engine.set_attribute("class", MARKER_CLASS);
        assert!(policy.matches(&engine));
        assert!(!policy.matches(&styled("span", "background-color: pink")));
    }
}
