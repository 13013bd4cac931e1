//! Registry of running document contexts.

use dashmap::DashMap;
use tokio::sync::mpsc;
use tower_lsp::lsp_types::Url;

use super::{ContextHandle, ContextKind, ContextOptions, DocumentContext};
use crate::annotate::AnnotateError;
use crate::protocol::{AnnotationRequest, ContextNotice};
use crate::scope::Scope;

pub struct ContextStore {
    contexts: DashMap<Url, ContextHandle>,
    notices: mpsc::UnboundedSender<ContextNotice>,
}

impl ContextStore {
    /// Create an empty store whose contexts report selection changes to
    /// `notices`.
    pub fn new(notices: mpsc::UnboundedSender<ContextNotice>) -> Self {
        Self {
            contexts: DashMap::new(),
            notices,
        }
    }

    /// Open a context, or replace the content of one already open for `uri`.
    pub async fn open(
        &self,
        uri: Url,
        kind: ContextKind,
        markup: &str,
        options: &ContextOptions,
    ) -> ContextHandle {
        if let Some(existing) = self.get(&uri).filter(|handle| !handle.is_closed()) {
            existing.replace(markup.to_string()).await;
            return existing;
        }
        let context = DocumentContext::new(uri.clone(), kind, markup, options);
        let handle = ContextHandle::spawn(context, options, self.notices.clone());
        self.contexts.insert(uri, handle.clone());
        handle
    }

    /// Close a context. Its task stops once in-flight requests finish.
    pub fn close(&self, uri: &Url) {
        self.contexts.remove(uri);
    }

    pub fn get(&self, uri: &Url) -> Option<ContextHandle> {
        self.contexts.get(uri).map(|r| r.clone())
    }

    /// The open notes context, if any.
    pub fn notes(&self) -> Option<ContextHandle> {
        self.contexts
            .iter()
            .find(|entry| entry.kind() == ContextKind::Notes)
            .map(|entry| entry.value().clone())
    }

    /// Annotate in the notes context when its live selection sits inside the
    /// notes root, otherwise in `page`.
    ///
    /// The scope is resolved on every call. A notes context that does not
    /// answer in time is treated as not holding the selection.
    pub async fn annotate(
        &self,
        page: Option<&Url>,
        request: AnnotationRequest,
    ) -> Result<(), AnnotateError> {
        if let Some(notes) = self.notes() {
            if notes.resolve_scope().await == Some(Scope::Notes) {
                return notes.annotate(request).await;
            }
        }
        let Some(page) = page.and_then(|uri| self.get(uri)) else {
            tracing::info!("no page to annotate");
            return Err(AnnotateError::NotFound);
        };
        page.annotate(request).await
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}
