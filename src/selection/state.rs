//! Per-context selection cache.

use crate::document::{text_in, validate_anchor, Anchor, Document};

/// The most recent selection of one document context.
///
/// `live` mirrors what the user currently has selected; `frozen` is the last
/// non-empty selection, kept after focus moves elsewhere. Every change to the
/// live selection bumps `revision` so observers can skip repeated reports.
#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    live: Option<Anchor>,
    frozen: Option<Anchor>,
    last_text: String,
    revision: u64,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live(&self) -> Option<Anchor> {
        self.live
    }

    pub fn frozen(&self) -> Option<Anchor> {
        self.frozen
    }

    /// Text captured when the frozen anchor was taken.
    pub fn last_text(&self) -> &str {
        &self.last_text
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Replace the live selection. `None` means nothing is selected; the
    /// frozen anchor is kept.
    pub fn set_live(&mut self, anchor: Option<Anchor>) {
        self.live = anchor;
        self.revision += 1;
    }

    /// Record a selection reported by the host. A non-blank selection is
    /// frozen right away, ahead of any debounced observation.
    pub fn report(&mut self, document: &Document, anchor: Option<Anchor>) {
        self.set_live(anchor);
        let text = self.live_text(document);
        if !text.is_empty() {
            self.freeze(text);
        }
    }

    /// Programmatically select `anchor`, as after wrapping a new highlight.
    /// `text` is what the anchor covers.
    pub fn select(&mut self, anchor: Anchor, text: impl Into<String>) {
        self.live = Some(anchor);
        self.frozen = Some(anchor);
        self.last_text = text.into();
        self.revision += 1;
    }

    /// Capture the live selection as the frozen anchor.
    pub fn freeze(&mut self, text: impl Into<String>) {
        if let Some(live) = self.live {
            self.frozen = Some(live);
            self.last_text = text.into();
        }
    }

    /// Explicit deselect: drop everything.
    pub fn clear(&mut self) {
        self.live = None;
        self.frozen = None;
        self.last_text.clear();
        self.revision += 1;
    }

    pub fn forget_live(&mut self) {
        if self.live.take().is_some() {
            self.revision += 1;
        }
    }

    pub fn forget_frozen(&mut self) {
        self.frozen = None;
        self.last_text.clear();
    }

    /// Trimmed text of the live selection, or `""` when there is none or it
    /// no longer resolves.
    pub fn live_text(&self, document: &Document) -> String {
        self.live
            .filter(|anchor| validate_anchor(document, anchor).is_ok())
            .map(|anchor| text_in(document, &anchor).trim().to_string())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Boundary;

    fn sample() -> (Document, Anchor) {
        let doc = Document::parse("<p>hello world</p>").unwrap();
        let (text, _) = doc.text_nodes(doc.root()).next().unwrap();
        let anchor = Anchor::new(Boundary::new(text, 0), Boundary::new(text, 6));
        (doc, anchor)
    }

    #[test]
    fn live_text_is_trimmed() {
        let (doc, anchor) = sample();
        let mut state = SelectionState::new();
        state.set_live(Some(anchor));
        assert_eq!(state.live_text(&doc), "hello");
    }

    #[test]
    fn freeze_survives_focus_loss() {
        let (_, anchor) = sample();
        let mut state = SelectionState::new();
        state.set_live(Some(anchor));
        state.freeze("hello");
        state.set_live(None);

        assert_eq!(state.live(), None);
        assert_eq!(state.frozen(), Some(anchor));
        assert_eq!(state.last_text(), "hello");
    }

    #[test]
    fn clear_resets_and_bumps_revision() {
        let (_, anchor) = sample();
        let mut state = SelectionState::new();
        state.select(anchor, "hello");
        let before = state.revision();
        state.clear();

        assert_eq!(state.frozen(), None);
        assert_eq!(state.live(), None);
        assert!(state.revision() > before);
    }

    #[test]
    fn report_freezes_without_observation() {
        let (doc, anchor) = sample();
        let mut state = SelectionState::new();
        state.report(&doc, Some(anchor));
        state.report(&doc, None);

        assert_eq!(state.frozen(), Some(anchor));
        assert_eq!(state.last_text(), "hello");
    }

    #[test]
    fn blank_report_keeps_previous_frozen_anchor() {
        let doc = Document::parse("<p>hello   world</p>").unwrap();
        let (text, _) = doc.text_nodes(doc.root()).next().unwrap();
        let hello = Anchor::new(Boundary::new(text, 0), Boundary::new(text, 5));
        let blank = Anchor::new(Boundary::new(text, 5), Boundary::new(text, 8));
        let mut state = SelectionState::new();
        state.report(&doc, Some(hello));
        state.report(&doc, Some(blank));

        assert_eq!(state.live(), Some(blank));
        assert_eq!(state.frozen(), Some(hello));
    }

    #[test]
    fn stale_live_selection_reads_empty() {
        let (mut doc, anchor) = sample();
        let mut state = SelectionState::new();
        state.set_live(Some(anchor));
        let paragraph = doc.children(doc.root())[0];
        doc.remove(paragraph).unwrap();
        assert_eq!(state.live_text(&doc), "");
    }
}
