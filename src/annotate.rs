//! Annotation mutator: apply and remove highlights over a resolved anchor.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::document::{
    compare, extract_contents, insert_at, surround_contents, text_in, validate_anchor, Anchor,
    Boundary, Document, NodeId, TextIndex, TreeError, WrapError,
};
use crate::highlight::{create_span, HighlightColor, RemovalPolicy};
use crate::selection::SelectionState;

/// Caller-visible failure reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum AnnotateError {
    #[error("nothing is selected")]
    EmptySpan,
    #[error("the selected content is no longer in the document")]
    StaleAnchor,
    #[error("text not found")]
    NotFound,
}

impl From<TreeError> for AnnotateError {
    fn from(_: TreeError) -> Self {
        AnnotateError::StaleAnchor
    }
}

/// Which wrapping strategy produced the highlight container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapPath {
    /// The range was wrapped in place.
    Direct,
    /// The range crossed element boundaries; its contents were extracted and
    /// re-inserted inside the container.
    Extracted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
    pub container: NodeId,
    pub path: WrapPath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Removed {
    pub unwrapped: usize,
}

/// Applies and removes highlights according to a [`RemovalPolicy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Annotator {
    policy: RemovalPolicy,
}

impl Annotator {
    pub fn new(policy: RemovalPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> RemovalPolicy {
        self.policy
    }

    /// Wrap the anchored content in a new highlight of `color`.
    ///
    /// Existing highlights inside the range are unwrapped first, so no
    /// character ever ends up inside two engine containers. The new
    /// container becomes the selection.
    pub fn apply(
        &self,
        document: &mut Document,
        selection: &mut SelectionState,
        anchor: &Anchor,
        color: HighlightColor,
    ) -> Result<Applied, AnnotateError> {
        let covered = resolve(document, anchor)?;

        let anchor = match self.unwrap_within(document, anchor)? {
            0 => *anchor,
            _ => remap(document, covered)?,
        };

        let container = create_span(document, color);
        let path = match surround_contents(document, &anchor, container) {
            Ok(()) => WrapPath::Direct,
            Err(WrapError::Rejected(node)) => {
                tracing::debug!(?node, "direct wrap rejected, extracting contents");
                if let Err(err) = wrap_extracted(document, &anchor, container) {
                    discard(document, container);
                    return Err(err.into());
                }
                WrapPath::Extracted
            }
            Err(WrapError::Tree(err)) => {
                discard(document, container);
                return Err(err.into());
            }
        };

        if let Some(selected) = Anchor::selecting(document, container) {
            selection.select(selected, document.text_content(container).trim());
        }
        tracing::debug!(%color, ?path, "highlight applied");
        Ok(Applied { container, path })
    }

    /// Unwrap every matching container that intersects the anchor.
    ///
    /// Removing where nothing matches succeeds without touching the tree.
    pub fn remove(
        &self,
        document: &mut Document,
        selection: &mut SelectionState,
        anchor: &Anchor,
    ) -> Result<Removed, AnnotateError> {
        let covered = resolve(document, anchor)?;
        let unwrapped = self.unwrap_within(document, anchor)?;
        if unwrapped > 0 {
            let restored = remap(document, covered)?;
            selection.select(restored, text_in(document, &restored).trim());
        }
        tracing::debug!(unwrapped, "highlights removed");
        Ok(Removed { unwrapped })
    }

    fn unwrap_within(&self, document: &mut Document, anchor: &Anchor) -> Result<usize, TreeError> {
        let matching: Vec<NodeId> = document
            .descendants(document.root())
            .filter(|&node| {
                document
                    .element(node)
                    .is_some_and(|element| self.policy.matches(element))
            })
            .filter(|&node| intersects(document, node, anchor))
            .collect();

        let mut unwrapped = 0;
        for node in matching {
            // Nested matches are freed along with their outer container.
            if !document.is_attached(node) {
                continue;
            }
            let text = document.text_content(node);
            if text.is_empty() {
                document.remove(node)?;
            } else {
                let plain = document.create_text(text);
                document.replace(node, plain)?;
            }
            unwrapped += 1;
        }
        Ok(unwrapped)
    }
}

/// Drop an unused container after a failed wrap.
fn discard(document: &mut Document, container: NodeId) {
    if let Err(err) = document.remove(container) {
        tracing::debug!(error = %err, "failed to discard highlight container");
    }
}

/// Validate the anchor and return the byte range of its text.
fn resolve(document: &Document, anchor: &Anchor) -> Result<Range<usize>, AnnotateError> {
    validate_anchor(document, anchor)?;
    if anchor.is_collapsed() || text_in(document, anchor).trim().is_empty() {
        return Err(AnnotateError::EmptySpan);
    }
    TextIndex::build(document)
        .range_of(document, anchor)
        .ok_or(AnnotateError::StaleAnchor)
}

/// Rebuild an anchor over the same text after the tree was restructured.
fn remap(document: &Document, covered: Range<usize>) -> Result<Anchor, AnnotateError> {
    TextIndex::build(document)
        .anchor_for(covered)
        .ok_or(AnnotateError::StaleAnchor)
}

/// Whether any part of `node` lies inside the anchor.
fn intersects(document: &Document, node: NodeId, anchor: &Anchor) -> bool {
    let (Some(parent), Some(index)) = (document.parent(node), document.index_in_parent(node)) else {
        return false;
    };
    let before = Boundary::new(parent, index);
    let after = Boundary::new(parent, index + 1);
    compare(document, before, anchor.end).is_lt() && compare(document, after, anchor.start).is_gt()
}

fn wrap_extracted(
    document: &mut Document,
    anchor: &Anchor,
    container: NodeId,
) -> Result<(), TreeError> {
    let (fragment, at) = extract_contents(document, anchor)?;
    document.move_children(fragment, container)?;
    document.remove(fragment)?;
    insert_at(document, at, container)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlight::HighlightSpan;

    fn text_anchor(doc: &Document, needle: &str) -> Anchor {
        let index = TextIndex::build(doc);
        let start = index.text().find(needle).unwrap();
        index.anchor_for(start..start + needle.len()).unwrap()
    }

    fn apply(doc: &mut Document, needle: &str, color: HighlightColor) -> Applied {
        let anchor = text_anchor(doc, needle);
        Annotator::default()
            .apply(doc, &mut SelectionState::new(), &anchor, color)
            .unwrap()
    }

    #[test]
    fn direct_wrap_within_paragraph() {
        let mut doc = Document::parse("<p>The quick brown fox</p>").unwrap();
        let applied = apply(&mut doc, "quick brown", HighlightColor::Green);

        assert_eq!(applied.path, WrapPath::Direct);
        assert_eq!(doc.text_content(applied.container), "quick brown");
        assert_eq!(doc.text_content(doc.root()), "The quick brown fox");
    }

    #[test]
    fn cross_paragraph_uses_extraction() {
        let mut doc = Document::parse("<p>one two</p><p>three four</p>").unwrap();
        let applied = apply(&mut doc, "twothree", HighlightColor::Blue);

        assert_eq!(applied.path, WrapPath::Extracted);
        assert_eq!(doc.text_content(applied.container), "twothree");
        assert_eq!(doc.text_content(doc.root()), "one twothree four");
    }

    #[test]
    fn selects_new_container() {
        let mut doc = Document::parse("<p>The quick brown fox</p>").unwrap();
        let mut selection = SelectionState::new();
        let anchor = text_anchor(&doc, "brown");
        let applied = Annotator::default()
            .apply(&mut doc, &mut selection, &anchor, HighlightColor::Pink)
            .unwrap();

        let live = selection.live().unwrap();
        assert_eq!(live, Anchor::selecting(&doc, applied.container).unwrap());
        assert_eq!(selection.live_text(&doc), "brown");
    }

    #[test]
    fn recolor_replaces_container() {
        let mut doc = Document::parse("<p>The quick brown fox</p>").unwrap();
        let mut selection = SelectionState::new();
        let annotator = Annotator::default();
        let anchor = text_anchor(&doc, "quick");
        annotator
            .apply(&mut doc, &mut selection, &anchor, HighlightColor::Yellow)
            .unwrap();

        let reselected = selection.live().unwrap();
        annotator
            .apply(&mut doc, &mut selection, &reselected, HighlightColor::Orange)
            .unwrap();

        let spans = HighlightSpan::all(&doc, doc.root());
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].color, HighlightColor::Orange);
        assert_eq!(doc.text_content(spans[0].node), "quick");
    }

    #[test]
    fn overlapping_applies_never_nest() {
        let mut doc = Document::parse("<p>The quick brown fox</p>").unwrap();
        apply(&mut doc, "quick brown", HighlightColor::Yellow);
        apply(&mut doc, "brown fox", HighlightColor::Green);

        let spans = HighlightSpan::all(&doc, doc.root());
        assert_eq!(spans.len(), 1);
        assert_eq!(doc.text_content(spans[0].node), "brown fox");
        assert_eq!(doc.text_content(doc.root()), "The quick brown fox");
    }

    #[test]
    fn remove_unwraps_and_is_idempotent() {
        let mut doc = Document::parse("<p>The quick brown fox</p>").unwrap();
        apply(&mut doc, "quick brown", HighlightColor::Green);

        let annotator = Annotator::default();
        let mut selection = SelectionState::new();
        let anchor = text_anchor(&doc, "quick brown");
        let removed = annotator.remove(&mut doc, &mut selection, &anchor).unwrap();
        assert_eq!(removed.unwrapped, 1);
        assert_eq!(doc.to_markup(), "<p>The quick brown fox</p>");

        let anchor = text_anchor(&doc, "quick brown");
        let again = annotator.remove(&mut doc, &mut selection, &anchor).unwrap();
        assert_eq!(again.unwrapped, 0);
        assert_eq!(doc.to_markup(), "<p>The quick brown fox</p>");
    }

    #[test]
    fn remove_strips_foreign_backgrounds() {
        let markup = r#"<p>a <span style="background-color: yellow">b</span> <b>c</b></p>"#;
        let mut doc = Document::parse(markup).unwrap();
        let anchor = text_anchor(&doc, "a b c");
        Annotator::default()
            .remove(&mut doc, &mut SelectionState::new(), &anchor)
            .unwrap();
        assert_eq!(doc.to_markup(), "<p>a b <b>c</b></p>");
    }

    #[test]
    fn empty_and_stale_anchors_fail() {
        let mut doc = Document::parse("<p>a  b</p>").unwrap();
        let annotator = Annotator::default();
        let mut selection = SelectionState::new();

        let blank = text_anchor(&doc, "  ");
        assert_eq!(
            annotator.apply(&mut doc, &mut selection, &blank, HighlightColor::Yellow),
            Err(AnnotateError::EmptySpan)
        );

        let anchor = text_anchor(&doc, "a");
        let paragraph = doc.children(doc.root())[0];
        doc.remove(paragraph).unwrap();
        assert_eq!(
            annotator.apply(&mut doc, &mut selection, &anchor, HighlightColor::Yellow),
            Err(AnnotateError::StaleAnchor)
        );
    }

    #[test]
    fn apply_preserves_text_for_every_range() {
        let markup = "<p>ab <em>cd</em></p><p>e<span style=\"background: red\">fg</span>h</p>";
        let original = Document::parse(markup).unwrap();
        let text = TextIndex::build(&original).text().to_string();

        for start in 0..text.len() {
            for end in start + 1..=text.len() {
                if text[start..end].trim().is_empty() {
                    continue;
                }
                let mut doc = original.clone();
                let anchor = TextIndex::build(&doc).anchor_for(start..end).unwrap();
                Annotator::default()
                    .apply(&mut doc, &mut SelectionState::new(), &anchor, HighlightColor::Blue)
                    .unwrap();
                assert_eq!(doc.text_content(doc.root()), text, "range {start}..{end}");

                // No character sits inside two engine containers.
                for span in HighlightSpan::all(&doc, doc.root()) {
                    let nested = doc
                        .ancestors(span.node)
                        .skip(1)
                        .any(|node| HighlightSpan::from_node(&doc, node).is_some());
                    assert!(!nested, "nested highlight for range {start}..{end}");
                }
            }
        }
    }
}
