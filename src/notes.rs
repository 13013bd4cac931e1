//! Word limit and plain-text paste for the notes document.

use serde::{Deserialize, Serialize};

use crate::document::{
    extract_contents, insert_at, validate_anchor, Anchor, Boundary, Document, NodeId, TreeError,
};
use crate::selection::SelectionState;

/// Whitespace-separated word count.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordCount {
    pub count: usize,
    pub limit: usize,
    pub limit_reached: bool,
}

impl WordCount {
    pub fn new(count: usize, limit: usize) -> Self {
        Self {
            count,
            limit,
            limit_reached: count >= limit,
        }
    }

    /// Count the words under `root`.
    pub fn of(document: &Document, root: NodeId, limit: usize) -> Self {
        Self::new(word_count(&document.text_content(root)), limit)
    }
}

/// The words of `pasted` that still fit, joined by single spaces.
pub fn fit_to_limit(pasted: &str, current: usize, limit: usize) -> String {
    let remaining = limit.saturating_sub(current);
    pasted
        .split_whitespace()
        .take(remaining)
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasteOutcome {
    /// Text actually inserted; empty when nothing fit or there was no caret.
    pub inserted: String,
    pub word_count: WordCount,
}

/// Replace the live selection inside `root` with as much of `text` as the
/// word limit allows, leaving a collapsed caret after it.
pub fn paste(
    document: &mut Document,
    selection: &mut SelectionState,
    root: NodeId,
    text: &str,
    limit: usize,
) -> Result<PasteOutcome, TreeError> {
    let before = WordCount::of(document, root, limit);
    let fitted = fit_to_limit(text, before.count, limit);

    let caret = selection.live().filter(|anchor| {
        validate_anchor(document, anchor).is_ok()
            && document.contains(root, anchor.start.node)
            && document.contains(root, anchor.end.node)
    });
    let Some(anchor) = caret.filter(|_| !fitted.is_empty()) else {
        tracing::debug!(limit, count = before.count, "paste skipped");
        return Ok(PasteOutcome {
            inserted: String::new(),
            word_count: before,
        });
    };

    let at = if anchor.is_collapsed() {
        anchor.start
    } else {
        let (fragment, at) = extract_contents(document, &anchor)?;
        document.remove(fragment)?;
        at
    };

    let node = document.create_text(fitted.clone());
    insert_at(document, at, node)?;
    let parent = document.parent(node).ok_or(TreeError::Orphan(node))?;
    let index = document
        .index_in_parent(node)
        .ok_or(TreeError::Orphan(node))?;
    selection.set_live(Some(Anchor::collapsed(Boundary::new(parent, index + 1))));
    // Text under any earlier frozen anchor may have shifted.
    selection.forget_frozen();

    Ok(PasteOutcome {
        inserted: fitted,
        word_count: WordCount::of(document, root, limit),
    })
}
