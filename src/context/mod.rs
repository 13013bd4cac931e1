//! Document contexts.
//!
//! A context owns one document (the notes document or a foreign page) and
//! everything that mutates it: the selection state, the locator and the
//! annotator. Each context runs on its own task; see [`ContextHandle`].

mod handle;
mod store;

use std::time::Duration;

use tower_lsp::lsp_types::Url;

use crate::annotate::{AnnotateError, Annotator};
use crate::document::{Document, NodeId, TextIndex};
use crate::highlight::RemovalPolicy;
use crate::locate::{AnchorSource, LocateRequest, SpanLocator};
use crate::notes::{self, PasteOutcome, WordCount};
use crate::protocol::{AnnotationOp, AnnotationRequest, SelectionUpdate};
use crate::scope::{Scope, ScopeResolver};
use crate::selection::{SelectionNotice, SelectionState, SelectionTracker};
use crate::settings::Settings;

pub use handle::ContextHandle;
pub use store::ContextStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    /// The user's own notes document.
    Notes,
    /// A third-party page.
    Page,
}

/// Per-context tuning, derived from [`Settings`].
#[derive(Debug, Clone)]
pub struct ContextOptions {
    pub debounce: Duration,
    pub prompt_check: Duration,
    pub request_timeout: Duration,
    pub notes_root_id: String,
    pub word_limit: usize,
    pub policy: RemovalPolicy,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl ContextOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            debounce: settings.debounce(),
            prompt_check: settings.prompt_check(),
            request_timeout: settings.request_timeout(),
            notes_root_id: settings.notes_root_id().to_string(),
            word_limit: settings.word_limit(),
            policy: RemovalPolicy {
                strip_foreign_backgrounds: settings.strip_foreign_backgrounds(),
            },
        }
    }
}

/// One document and its selection.
#[derive(Debug)]
pub struct DocumentContext {
    uri: Url,
    kind: ContextKind,
    document: Document,
    selection: SelectionState,
    tracker: SelectionTracker,
    locator: SpanLocator,
    annotator: Annotator,
    scope: ScopeResolver,
    word_limit: usize,
}

impl DocumentContext {
    pub fn new(uri: Url, kind: ContextKind, markup: &str, options: &ContextOptions) -> Self {
        Self {
            uri,
            kind,
            document: Document::parse_or_text(markup),
            selection: SelectionState::new(),
            tracker: SelectionTracker::new(),
            locator: SpanLocator::default(),
            annotator: Annotator::new(options.policy),
            scope: ScopeResolver::new(options.notes_root_id.clone()),
            word_limit: options.word_limit,
        }
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn kind(&self) -> ContextKind {
        self.kind
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    /// Apply a selection report from the host.
    pub fn update_selection(&mut self, update: SelectionUpdate) {
        match update {
            SelectionUpdate::Range { start, end } => {
                let index = TextIndex::build(&self.document);
                let (Some(start), Some(end)) =
                    (index.utf16_to_byte(start), index.utf16_to_byte(end))
                else {
                    tracing::warn!(uri = %self.uri, start, end, "selection out of range");
                    return;
                };
                let (start, end) = (start.min(end), start.max(end));
                self.selection
                    .report(&self.document, index.anchor_for(start..end));
            }
            SelectionUpdate::Collapsed => self.selection.set_live(None),
            SelectionUpdate::Cleared => self.selection.clear(),
        }
    }

    /// Check for a selection change worth reporting.
    pub fn observe_selection(&mut self) -> Option<SelectionNotice> {
        self.tracker.observe(&self.document, &mut self.selection)
    }

    /// Locate the target span and apply or remove a highlight.
    ///
    /// A tier whose anchor turns out stale is dropped and resolution retried
    /// with the remaining tiers.
    pub fn annotate(&mut self, request: &AnnotationRequest) -> Result<(), AnnotateError> {
        let locate = LocateRequest {
            literal_text: request.literal().map(str::to_string),
        };
        let mut skip: Vec<AnchorSource> = Vec::new();
        loop {
            let Ok(located) =
                self.locator
                    .locate_skipping(&self.document, &self.selection, &locate, &skip)
            else {
                return Err(match locate.literal_text {
                    Some(_) => AnnotateError::NotFound,
                    None => AnnotateError::EmptySpan,
                });
            };

            let result = match request.op {
                AnnotationOp::Apply => self
                    .annotator
                    .apply(
                        &mut self.document,
                        &mut self.selection,
                        &located.anchor,
                        request.color.unwrap_or_default(),
                    )
                    .map(drop),
                AnnotationOp::Remove => self
                    .annotator
                    .remove(&mut self.document, &mut self.selection, &located.anchor)
                    .map(drop),
            };

            match result {
                Err(AnnotateError::StaleAnchor) => {
                    tracing::debug!(source = %located.source, "stale anchor, retrying");
                    match located.source {
                        AnchorSource::LiveSelection => self.selection.forget_live(),
                        AnchorSource::FrozenRange => self.selection.forget_frozen(),
                        AnchorSource::LiteralText => {}
                    }
                    skip.push(located.source);
                }
                other => return other,
            }
        }
    }

    /// Where the current live selection belongs. Page contexts never hold
    /// notes.
    pub fn resolve_scope(&self) -> Scope {
        match self.kind {
            ContextKind::Notes => self.scope.resolve(&self.document, &self.selection),
            ContextKind::Page => Scope::Page,
        }
    }

    pub fn selected_text(&self) -> String {
        self.selection.live_text(&self.document)
    }

    /// Replace the document content in place. Anchors into the old content
    /// go stale.
    pub fn replace_markup(&mut self, markup: &str) {
        let root = self.document.root();
        if let Err(err) = self.document.clear_children(root) {
            tracing::warn!(uri = %self.uri, error = %err, "failed to clear document");
        }
        if let Err(err) = self.document.load_markup(root, markup) {
            tracing::warn!(uri = %self.uri, error = %err, "markup rejected, loading as plain text");
            let text = self.document.create_text(markup);
            if let Err(err) = self.document.append_child(root, text) {
                tracing::warn!(uri = %self.uri, error = %err, "failed to load text");
            }
        }
        self.selection.set_live(None);
    }

    pub fn markup(&self) -> String {
        self.document.to_markup()
    }

    fn notes_root(&self) -> NodeId {
        self.document
            .element_by_id(self.scope.root_id())
            .unwrap_or_else(|| self.document.root())
    }

    pub fn word_count(&self) -> WordCount {
        WordCount::of(&self.document, self.notes_root(), self.word_limit)
    }

    pub fn paste(&mut self, text: &str) -> PasteOutcome {
        let root = self.notes_root();
        notes::paste(
            &mut self.document,
            &mut self.selection,
            root,
            text,
            self.word_limit,
        )
        .unwrap_or_else(|err| {
            tracing::warn!(uri = %self.uri, error = %err, "paste failed");
            PasteOutcome {
                inserted: String::new(),
                word_count: self.word_count(),
            }
        })
    }
}
