//! Custom JSON-RPC methods and their payloads.

use serde::{Deserialize, Serialize};
use tower_lsp::lsp_types::notification::Notification;
use tower_lsp::lsp_types::Url;

use crate::annotate::AnnotateError;
use crate::highlight::HighlightColor;
use crate::selection::SelectionNotice;

pub const SELECTION_UPDATE: &str = "selection/update";
pub const SELECTION_INTERACTION: &str = "selection/interaction";
pub const SELECTION_TEXT: &str = "selection/text";
pub const HIGHLIGHT_ANNOTATE: &str = "highlight/annotate";
pub const DOCUMENT_MARKUP: &str = "document/markup";
pub const NOTES_WORD_COUNT: &str = "notes/wordCount";
pub const NOTES_PASTE: &str = "notes/paste";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationOp {
    Apply,
    Remove,
}

/// What to annotate and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationRequest {
    pub op: AnnotationOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<HighlightColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub literal_text: Option<String>,
}

impl AnnotationRequest {
    pub fn apply(color: HighlightColor) -> Self {
        Self {
            op: AnnotationOp::Apply,
            color: Some(color),
            literal_text: None,
        }
    }

    pub fn remove() -> Self {
        Self {
            op: AnnotationOp::Remove,
            color: None,
            literal_text: None,
        }
    }

    pub fn with_literal(mut self, text: impl Into<String>) -> Self {
        self.literal_text = Some(text.into());
        self
    }

    /// Literal text worth searching for, if any.
    pub fn literal(&self) -> Option<&str> {
        self.literal_text
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<AnnotateError>,
}

impl From<Result<(), AnnotateError>> for AnnotationResponse {
    fn from(result: Result<(), AnnotateError>) -> Self {
        Self {
            success: result.is_ok(),
            reason: result.err(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotateParams {
    #[serde(flatten)]
    pub request: AnnotationRequest,
    /// Page context to target; defaults to the active page.
    #[serde(default)]
    pub page: Option<Url>,
}

/// A selection report from a host, offsets in UTF-16 code units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SelectionUpdate {
    Range { start: usize, end: usize },
    /// Focus left without an explicit deselect.
    Collapsed,
    /// Explicit deselect.
    Cleared,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionUpdateParams {
    pub uri: Url,
    #[serde(flatten)]
    pub update: SelectionUpdate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionParams {
    pub uri: Url,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectedTextParams {
    #[serde(default)]
    pub page: Option<Url>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedTextResult {
    pub selected_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkupParams {
    pub uri: Url,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkupResult {
    pub markup: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasteParams {
    pub text: String,
}

/// A selection notice tagged with the document it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextNotice {
    pub uri: Url,
    #[serde(flatten)]
    pub notice: SelectionNotice,
}

/// Server to client: the selected text of a document changed.
#[derive(Debug)]
pub enum SelectionDidChange {}

impl Notification for SelectionDidChange {
    type Params = ContextNotice;
    const METHOD: &'static str = "selection/didChange";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn annotate_params_from_wire() {
        let params: AnnotateParams = serde_json::from_value(json!({
            "op": "apply",
            "color": "violet",
            "literalText": "quick"
        }))
        .unwrap();
        assert_eq!(params.request.op, AnnotationOp::Apply);
        assert_eq!(params.request.color, Some(HighlightColor::Yellow));
        assert_eq!(params.request.literal(), Some("quick"));
        assert_eq!(params.page, None);
    }

    #[test]
    fn response_omits_reason_on_success() {
        let ok = serde_json::to_value(AnnotationResponse::from(Ok(()))).unwrap();
        assert_eq!(ok, json!({ "success": true }));

        let failed = AnnotationResponse::from(Err(AnnotateError::StaleAnchor));
        assert_eq!(
            serde_json::to_value(failed).unwrap(),
            json!({ "success": false, "reason": "StaleAnchor" })
        );
    }

    #[test]
    fn selection_update_kinds() {
        let range: SelectionUpdateParams = serde_json::from_value(json!({
            "uri": "https://example.com/article",
            "kind": "range",
            "start": 4,
            "end": 9
        }))
        .unwrap();
        assert_eq!(range.update, SelectionUpdate::Range { start: 4, end: 9 });

        let cleared: SelectionUpdateParams = serde_json::from_value(json!({
            "uri": "notes:///draft",
            "kind": "cleared"
        }))
        .unwrap();
        assert_eq!(cleared.update, SelectionUpdate::Cleared);
    }

    #[test]
    fn notice_is_flat() {
        let notice = ContextNotice {
            uri: Url::parse("notes:///draft").unwrap(),
            notice: SelectionNotice {
                has_selection: true,
                selected_text: "hi".into(),
            },
        };
        assert_eq!(
            serde_json::to_value(notice).unwrap(),
            json!({ "uri": "notes:///draft", "hasSelection": true, "selectedText": "hi" })
        );
    }
}
