//! Decides whether a selection belongs to the owned notes document or to the
//! foreign page.

use crate::document::{common_ancestor, validate_anchor, Anchor, Document};
use crate::selection::SelectionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Notes,
    Page,
}

/// Containment test against the notes root element.
///
/// Holds no state about previous answers; every call re-reads the tree.
#[derive(Debug, Clone)]
pub struct ScopeResolver {
    root_id: String,
}

impl ScopeResolver {
    pub fn new(root_id: impl Into<String>) -> Self {
        Self {
            root_id: root_id.into(),
        }
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    /// Whether the anchor's common ancestor lies inside the notes root.
    pub fn contains(&self, document: &Document, anchor: &Anchor) -> bool {
        if validate_anchor(document, anchor).is_err() {
            return false;
        }
        let Some(root) = document.element_by_id(&self.root_id) else {
            return false;
        };
        common_ancestor(document, anchor.start.node, anchor.end.node)
            .is_some_and(|ancestor| document.contains(root, ancestor))
    }

    /// Route the current live selection.
    pub fn resolve(&self, document: &Document, selection: &SelectionState) -> Scope {
        match selection.live() {
            Some(anchor) if self.contains(document, &anchor) => Scope::Notes,
            _ => Scope::Page,
        }
    }
}
