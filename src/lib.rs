//! Range-anchored highlight annotation engine, served over JSON-RPC.

use std::sync::{Arc, Mutex, OnceLock};

use tokio::sync::mpsc;
use tower_lsp::jsonrpc::{Error, Result};
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService};

mod annotate;
mod context;
mod document;
mod highlight;
mod locate;
mod notes;
pub mod protocol;
mod scope;
mod selection;
mod settings;

pub use annotate::{AnnotateError, Annotator, Applied, Removed, WrapPath};
pub use context::{ContextHandle, ContextKind, ContextOptions, ContextStore, DocumentContext};
pub use document::{
    Affinity, Anchor, Boundary, Document, Element, MarkupError, NodeId, NodeKind, TextIndex,
    TreeError,
};
pub use highlight::{HighlightColor, HighlightSpan, RemovalPolicy, COLOR_ATTR, MARKER_CLASS};
pub use locate::{AnchorSource, LocateRequest, LocateStrategy, Located, NotFound, SpanLocator};
pub use notes::{fit_to_limit, word_count, PasteOutcome, WordCount};
pub use scope::{Scope, ScopeResolver};
pub use selection::{Debouncer, SelectionNotice, SelectionState, SelectionTracker, TrackerState};
pub use settings::{discover_settings, load_settings, Settings};

use protocol::{
    AnnotateParams, AnnotationResponse, ContextNotice, InteractionParams, MarkupParams,
    MarkupResult, PasteParams, SelectedTextParams, SelectedTextResult, SelectionDidChange,
    SelectionUpdateParams,
};

pub struct Backend {
    client: Client,
    contexts: ContextStore,
    settings: OnceLock<Arc<Settings>>,
    active_page: Mutex<Option<Url>>,
    notices: Mutex<Option<mpsc::UnboundedReceiver<ContextNotice>>>,
}

impl Backend {
    pub(crate) fn new(client: Client) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            client,
            contexts: ContextStore::new(tx),
            settings: OnceLock::new(),
            active_page: Mutex::new(None),
            notices: Mutex::new(Some(rx)),
        }
    }

    fn settings(&self) -> Arc<Settings> {
        Arc::clone(self.settings.get_or_init(Default::default))
    }

    fn options(&self) -> ContextOptions {
        ContextOptions::from_settings(&self.settings())
    }

    fn kind_of(&self, uri: &Url) -> ContextKind {
        if uri.scheme() == self.settings().notes_scheme() {
            ContextKind::Notes
        } else {
            ContextKind::Page
        }
    }

    /// Remember the most recently touched page.
    fn touch(&self, uri: &Url) {
        if self.kind_of(uri) != ContextKind::Page {
            return;
        }
        if let Ok(mut active) = self.active_page.lock() {
            *active = Some(uri.clone());
        }
    }

    fn active_page(&self) -> Option<Url> {
        self.active_page.lock().ok().and_then(|active| active.clone())
    }

    /// The requested page context, or the active one.
    fn page(&self, page: Option<Url>) -> Option<ContextHandle> {
        let uri = page.or_else(|| self.active_page())?;
        self.contexts.get(&uri)
    }

    async fn on_document_change(&self, uri: Url, text: String) {
        let kind = self.kind_of(&uri);
        self.contexts
            .open(uri.clone(), kind, &text, &self.options())
            .await;
        self.touch(&uri);
    }

    async fn selection_update(&self, params: SelectionUpdateParams) {
        let Some(handle) = self.contexts.get(&params.uri) else {
            tracing::debug!(uri = %params.uri, "selection for unknown document");
            return;
        };
        handle.select(params.update).await;
        self.touch(&params.uri);
    }

    async fn selection_interaction(&self, params: InteractionParams) {
        if let Some(handle) = self.contexts.get(&params.uri) {
            handle.interaction().await;
        }
    }

    /// Route to the notes document when its selection sits inside the notes
    /// root, otherwise to a page.
    async fn annotate(&self, params: AnnotateParams) -> Result<AnnotationResponse> {
        let page = params.page.or_else(|| self.active_page());
        let result = self.contexts.annotate(page.as_ref(), params.request).await;
        Ok(result.into())
    }

    async fn selected_text(&self, params: SelectedTextParams) -> Result<SelectedTextResult> {
        let selected_text = match self.page(params.page) {
            Some(page) => page.selected_text().await,
            None => String::new(),
        };
        Ok(SelectedTextResult { selected_text })
    }

    async fn markup(&self, params: MarkupParams) -> Result<MarkupResult> {
        let handle = self
            .contexts
            .get(&params.uri)
            .ok_or_else(|| Error::invalid_params(format!("unknown document {}", params.uri)))?;
        let markup = handle.markup().await.ok_or_else(Error::internal_error)?;
        Ok(MarkupResult { markup })
    }

    async fn word_count(&self) -> Result<WordCount> {
        let limit = self.settings().word_limit();
        let count = match self.contexts.notes() {
            Some(notes) => notes.word_count().await,
            None => None,
        };
        Ok(count.unwrap_or_else(|| WordCount::new(0, limit)))
    }

    async fn paste(&self, params: PasteParams) -> Result<PasteOutcome> {
        let notes = self
            .contexts
            .notes()
            .ok_or_else(|| Error::invalid_params("no notes document is open"))?;
        notes
            .paste(params.text)
            .await
            .ok_or_else(Error::internal_error)
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        // Extract workspace root from params
        let workspace_root = params
            .workspace_folders
            .as_ref()
            .and_then(|folders| folders.first())
            .and_then(|f| f.uri.to_file_path().ok())
            .or_else(|| {
                #[allow(deprecated)]
                params.root_uri.as_ref()?.to_file_path().ok()
            });

        if let Some(root) = workspace_root {
            // Discover settings by walking up the directory tree
            let (settings, settings_dir) = settings::discover_settings(&root);
            tracing::info!(dir = %settings_dir.display(), "settings loaded");
            let _ = self.settings.set(Arc::new(settings));
        } else {
            let _ = self.settings.set(Arc::new(Settings::default()));
        }

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        let receiver = self.notices.lock().ok().and_then(|mut n| n.take());
        if let Some(mut receiver) = receiver {
            let client = self.client.clone();
            tokio::spawn(async move {
                while let Some(notice) = receiver.recv().await {
                    client.send_notification::<SelectionDidChange>(notice).await;
                }
            });
        }
        self.client
            .log_message(MessageType::INFO, "spanmark initialized")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        self.on_document_change(params.text_document.uri, params.text_document.text)
            .await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        // We use FULL sync, so there's exactly one change with the full text
        if let Some(change) = params.content_changes.into_iter().next() {
            self.on_document_change(params.text_document.uri, change.text)
                .await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        self.contexts.close(&uri);
        if let Ok(mut active) = self.active_page.lock() {
            if active.as_ref() == Some(&uri) {
                *active = None;
            }
        }
    }
}

pub fn create_service() -> (LspService<Backend>, tower_lsp::ClientSocket) {
    LspService::build(Backend::new)
        .custom_method(protocol::SELECTION_UPDATE, Backend::selection_update)
        .custom_method(protocol::SELECTION_INTERACTION, Backend::selection_interaction)
        .custom_method(protocol::HIGHLIGHT_ANNOTATE, Backend::annotate)
        .custom_method(protocol::SELECTION_TEXT, Backend::selected_text)
        .custom_method(protocol::DOCUMENT_MARKUP, Backend::markup)
        .custom_method(protocol::NOTES_WORD_COUNT, Backend::word_count)
        .custom_method(protocol::NOTES_PASTE, Backend::paste)
        .finish()
}
