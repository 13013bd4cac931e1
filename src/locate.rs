//! Span locator: resolve a highlight request into a concrete anchor.
//!
//! Resolution is an ordered chain of strategies; the first one that yields a
//! usable anchor wins:
//! 1. the live selection, if it still covers non-blank text
//! 2. the frozen anchor captured at the last non-empty selection
//! 3. a content search for a literal string, within a single text node

use std::fmt;

use crate::document::{text_in, validate_anchor, Anchor, Boundary, Document};
use crate::selection::SelectionState;

/// Where a located anchor came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnchorSource {
    LiveSelection,
    FrozenRange,
    LiteralText,
}

impl fmt::Display for AnchorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AnchorSource::LiveSelection => "live selection",
            AnchorSource::FrozenRange => "frozen range",
            AnchorSource::LiteralText => "literal text",
        })
    }
}

/// Inputs to a locate call beyond the selection state.
#[derive(Debug, Clone, Default)]
pub struct LocateRequest {
    pub literal_text: Option<String>,
}

/// A resolved anchor and the strategy that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Located {
    pub anchor: Anchor,
    pub source: AnchorSource,
}

/// Every strategy in the chain came up empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no text found to annotate")]
pub struct NotFound;

/// One tier of the locator chain.
pub trait LocateStrategy: Send + Sync {
    fn source(&self) -> AnchorSource;

    fn locate(
        &self,
        document: &Document,
        selection: &SelectionState,
        request: &LocateRequest,
    ) -> Option<Anchor>;
}

/// Returns the anchor if it resolves and covers non-blank text.
fn usable(document: &Document, anchor: Option<Anchor>) -> Option<Anchor> {
    let anchor = anchor?;
    if let Err(err) = validate_anchor(document, &anchor) {
        tracing::debug!(error = %err, "cached anchor no longer resolves");
        return None;
    }
    (!text_in(document, &anchor).trim().is_empty()).then_some(anchor)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LiveSelection;

impl LocateStrategy for LiveSelection {
    fn source(&self) -> AnchorSource {
        AnchorSource::LiveSelection
    }

    fn locate(
        &self,
        document: &Document,
        selection: &SelectionState,
        _: &LocateRequest,
    ) -> Option<Anchor> {
        usable(document, selection.live())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FrozenRange;

impl LocateStrategy for FrozenRange {
    fn source(&self) -> AnchorSource {
        AnchorSource::FrozenRange
    }

    fn locate(
        &self,
        document: &Document,
        selection: &SelectionState,
        _: &LocateRequest,
    ) -> Option<Anchor> {
        let anchor = usable(document, selection.frozen())?;
        // Same nodes, different content: the captured selection is gone.
        if text_in(document, &anchor).trim() != selection.last_text() {
            tracing::debug!("frozen anchor content changed");
            return None;
        }
        Some(anchor)
    }
}

/// First occurrence of the literal inside one text node, in document order.
///
/// Text split across nodes is never matched.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiteralText;

impl LocateStrategy for LiteralText {
    fn source(&self) -> AnchorSource {
        AnchorSource::LiteralText
    }

    fn locate(
        &self,
        document: &Document,
        _: &SelectionState,
        request: &LocateRequest,
    ) -> Option<Anchor> {
        let literal = request.literal_text.as_deref()?;
        if literal.trim().is_empty() {
            return None;
        }
        document
            .text_nodes(document.root())
            .find_map(|(node, text)| {
                let index = text.find(literal)?;
                Some(Anchor::new(
                    Boundary::new(node, index),
                    Boundary::new(node, index + literal.len()),
                ))
            })
    }
}

/// The ordered strategy chain.
pub struct SpanLocator {
    strategies: Vec<Box<dyn LocateStrategy>>,
}

impl fmt::Debug for SpanLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.strategies.iter().map(|s| s.source()))
            .finish()
    }
}

impl Default for SpanLocator {
    fn default() -> Self {
        Self::new(vec![
            Box::new(LiveSelection),
            Box::new(FrozenRange),
            Box::new(LiteralText),
        ])
    }
}

impl SpanLocator {
    pub fn new(strategies: Vec<Box<dyn LocateStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn locate(
        &self,
        document: &Document,
        selection: &SelectionState,
        request: &LocateRequest,
    ) -> Result<Located, NotFound> {
        self.locate_skipping(document, selection, request, &[])
    }

    /// Like [`locate`](Self::locate), ignoring the listed tiers.
    pub fn locate_skipping(
        &self,
        document: &Document,
        selection: &SelectionState,
        request: &LocateRequest,
        skip: &[AnchorSource],
    ) -> Result<Located, NotFound> {
        self.strategies
            .iter()
            .filter(|strategy| !skip.contains(&strategy.source()))
            .find_map(|strategy| {
                let anchor = strategy.locate(document, selection, request)?;
                tracing::debug!(source = %strategy.source(), "anchor located");
                Some(Located {
                    anchor,
                    source: strategy.source(),
                })
            })
            .ok_or(NotFound)
    }
}
