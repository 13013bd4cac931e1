//! Selection change detection.

use serde::{Deserialize, Serialize};

use super::state::SelectionState;
use crate::document::Document;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrackerState {
    #[default]
    Idle,
    Active,
}

/// Payload emitted to observers when the selected text changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionNotice {
    pub has_selection: bool,
    pub selected_text: String,
}

/// Turns selection revisions into deduplicated notices.
#[derive(Debug, Clone, Default)]
pub struct SelectionTracker {
    state: TrackerState,
    reported: String,
    observed: Option<u64>,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    /// Check the selection and return a notice if its text changed since the
    /// last report. Entering a non-empty selection freezes its anchor.
    pub fn observe(
        &mut self,
        document: &Document,
        selection: &mut SelectionState,
    ) -> Option<SelectionNotice> {
        let revision = selection.revision();
        if self.observed == Some(revision) {
            return None;
        }
        self.observed = Some(revision);

        let text = selection.live_text(document);
        if !text.is_empty() {
            selection.freeze(text.clone());
        }
        if text == self.reported {
            return None;
        }

        self.state = if text.is_empty() {
            TrackerState::Idle
        } else {
            TrackerState::Active
        };
        self.reported.clone_from(&text);
        tracing::trace!(state = ?self.state, len = text.len(), "selection changed");
        Some(SelectionNotice {
            has_selection: !text.is_empty(),
            selected_text: text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Anchor, Boundary};

    fn setup() -> (Document, Anchor) {
        let doc = Document::parse("<p>hello world</p>").unwrap();
        let (text, _) = doc.text_nodes(doc.root()).next().unwrap();
        (
            doc,
            Anchor::new(Boundary::new(text, 6), Boundary::new(text, 11)),
        )
    }

    #[test]
    fn reports_once_per_change() {
        let (doc, anchor) = setup();
        let mut selection = SelectionState::new();
        let mut tracker = SelectionTracker::new();

        selection.set_live(Some(anchor));
        let notice = tracker.observe(&doc, &mut selection).unwrap();
        assert_eq!(
            notice,
            SelectionNotice {
                has_selection: true,
                selected_text: "world".to_string()
            }
        );
        assert_eq!(tracker.state(), TrackerState::Active);

        // Same revision, then same text under a new revision.
        assert_eq!(tracker.observe(&doc, &mut selection), None);
        selection.set_live(Some(anchor));
        assert_eq!(tracker.observe(&doc, &mut selection), None);
    }

    #[test]
    fn activation_freezes_anchor() {
        let (doc, anchor) = setup();
        let mut selection = SelectionState::new();
        let mut tracker = SelectionTracker::new();

        selection.set_live(Some(anchor));
        tracker.observe(&doc, &mut selection);
        selection.set_live(None);

        let notice = tracker.observe(&doc, &mut selection).unwrap();
        assert!(!notice.has_selection);
        assert_eq!(tracker.state(), TrackerState::Idle);
        assert_eq!(selection.frozen(), Some(anchor));
    }

    #[test]
    fn notice_is_camel_case() {
        let notice = SelectionNotice {
            has_selection: false,
            selected_text: String::new(),
        };
        assert_eq!(
            serde_json::to_string(&notice).unwrap(),
            r#"{"hasSelection":false,"selectedText":""}"#
        );
    }
}
