//! The context task and its handle.
//!
//! Each [`DocumentContext`] is owned by a single task, which processes
//! messages one at a time, so document mutations never interleave. Callers
//! talk to it through a cloneable [`ContextHandle`]; every request is bounded
//! by the configured timeout and degrades to `None` if the task does not
//! answer in time.

use std::future::Future;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, timeout, Instant};
use tower_lsp::lsp_types::Url;

use super::{ContextKind, ContextOptions, DocumentContext};
use crate::annotate::AnnotateError;
use crate::notes::{PasteOutcome, WordCount};
use crate::protocol::{AnnotationRequest, ContextNotice, SelectionUpdate};
use crate::scope::Scope;
use crate::selection::Debouncer;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug)]
pub(crate) enum ContextMessage {
    Select(SelectionUpdate),
    Interaction,
    Annotate {
        request: AnnotationRequest,
        reply: oneshot::Sender<Result<(), AnnotateError>>,
    },
    ResolveScope {
        reply: oneshot::Sender<Scope>,
    },
    SelectedText {
        reply: oneshot::Sender<String>,
    },
    Replace {
        markup: String,
    },
    Markup {
        reply: oneshot::Sender<String>,
    },
    Paste {
        text: String,
        reply: oneshot::Sender<PasteOutcome>,
    },
    WordCount {
        reply: oneshot::Sender<WordCount>,
    },
}

/// Cloneable address of a running context task.
#[derive(Debug, Clone)]
pub struct ContextHandle {
    uri: Url,
    kind: ContextKind,
    tx: mpsc::Sender<ContextMessage>,
    timeout: Duration,
}

impl ContextHandle {
    /// Start a task owning `context`. Selection notices go to `notices`.
    pub fn spawn(
        context: DocumentContext,
        options: &ContextOptions,
        notices: mpsc::UnboundedSender<ContextNotice>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let handle = Self {
            uri: context.uri().clone(),
            kind: context.kind(),
            tx,
            timeout: options.request_timeout,
        };
        let debouncer = Debouncer::new(options.debounce, options.prompt_check);
        tokio::spawn(run(context, rx, debouncer, notices));
        handle
    }

    /// A handle whose messages are parked in the returned receiver and never
    /// answered.
    #[cfg(test)]
    pub(crate) fn unanswered(
        uri: Url,
        kind: ContextKind,
        timeout: Duration,
    ) -> (Self, mpsc::Receiver<ContextMessage>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        (
            Self {
                uri,
                kind,
                tx,
                timeout,
            },
            rx,
        )
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn kind(&self) -> ContextKind {
        self.kind
    }

    /// Whether the task has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn send(&self, message: ContextMessage) {
        if self.tx.send(message).await.is_err() {
            tracing::warn!(uri = %self.uri, "context is gone, message dropped");
        }
    }

    async fn request<T, F>(&self, make: F) -> Option<T>
    where
        F: FnOnce(oneshot::Sender<T>) -> ContextMessage,
    {
        let (reply, rx) = oneshot::channel();
        let exchange = async {
            self.tx.send(make(reply)).await.ok()?;
            rx.await.ok()
        };
        bounded(self.timeout, &self.uri, exchange).await
    }

    pub async fn select(&self, update: SelectionUpdate) {
        self.send(ContextMessage::Select(update)).await;
    }

    pub async fn interaction(&self) {
        self.send(ContextMessage::Interaction).await;
    }

    pub async fn replace(&self, markup: String) {
        self.send(ContextMessage::Replace { markup }).await;
    }

    /// Annotate in this context. An unavailable context reports `NotFound`.
    pub async fn annotate(&self, request: AnnotationRequest) -> Result<(), AnnotateError> {
        self.request(|reply| ContextMessage::Annotate { request, reply })
            .await
            .unwrap_or(Err(AnnotateError::NotFound))
    }

    pub async fn resolve_scope(&self) -> Option<Scope> {
        self.request(|reply| ContextMessage::ResolveScope { reply }).await
    }

    /// Current trimmed selected text; `""` if the context does not answer.
    pub async fn selected_text(&self) -> String {
        self.request(|reply| ContextMessage::SelectedText { reply })
            .await
            .unwrap_or_default()
    }

    pub async fn markup(&self) -> Option<String> {
        self.request(|reply| ContextMessage::Markup { reply }).await
    }

    pub async fn paste(&self, text: String) -> Option<PasteOutcome> {
        self.request(|reply| ContextMessage::Paste { text, reply }).await
    }

    pub async fn word_count(&self) -> Option<WordCount> {
        self.request(|reply| ContextMessage::WordCount { reply }).await
    }
}

async fn bounded<T>(
    limit: Duration,
    uri: &Url,
    exchange: impl Future<Output = Option<T>>,
) -> Option<T> {
    match timeout(limit, exchange).await {
        Ok(answer) => answer,
        Err(_) => {
            tracing::warn!(%uri, ?limit, "context did not answer in time");
            None
        }
    }
}

async fn run(
    mut context: DocumentContext,
    mut rx: mpsc::Receiver<ContextMessage>,
    mut debouncer: Debouncer,
    notices: mpsc::UnboundedSender<ContextNotice>,
) {
    tracing::debug!(uri = %context.uri(), kind = ?context.kind(), "context started");
    loop {
        let deadline = debouncer.next_deadline();
        tokio::select! {
            message = rx.recv() => {
                let Some(message) = message else { break };
                handle(&mut context, &mut debouncer, message);
            }
            () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if debouncer.take_due(Instant::now()) {
                    emit(&mut context, &notices);
                }
            }
        }
    }
    tracing::debug!(uri = %context.uri(), "context stopped");
}

fn handle(context: &mut DocumentContext, debouncer: &mut Debouncer, message: ContextMessage) {
    let now = Instant::now();
    match message {
        ContextMessage::Select(update) => {
            context.update_selection(update);
            debouncer.schedule_debounced(now);
        }
        ContextMessage::Interaction => debouncer.schedule_prompt(now),
        ContextMessage::Annotate { request, reply } => {
            let result = context.annotate(&request);
            if let Err(reason) = result {
                tracing::info!(uri = %context.uri(), ?reason, "annotation failed");
            }
            let _ = reply.send(result);
            debouncer.schedule_debounced(now);
        }
        ContextMessage::ResolveScope { reply } => {
            let _ = reply.send(context.resolve_scope());
        }
        ContextMessage::SelectedText { reply } => {
            let _ = reply.send(context.selected_text());
        }
        ContextMessage::Replace { markup } => {
            context.replace_markup(&markup);
            debouncer.schedule_debounced(now);
        }
        ContextMessage::Markup { reply } => {
            let _ = reply.send(context.markup());
        }
        ContextMessage::Paste { text, reply } => {
            let _ = reply.send(context.paste(&text));
            debouncer.schedule_debounced(now);
        }
        ContextMessage::WordCount { reply } => {
            let _ = reply.send(context.word_count());
        }
    }
}

fn emit(context: &mut DocumentContext, notices: &mpsc::UnboundedSender<ContextNotice>) {
    let Some(notice) = context.observe_selection() else {
        return;
    };
    let notice = ContextNotice {
        uri: context.uri().clone(),
        notice,
    };
    if notices.send(notice).is_err() {
        tracing::debug!(uri = %context.uri(), "no notice listener");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlight::HighlightColor;
    use crate::selection::SelectionNotice;

    fn spawn(markup: &str) -> (ContextHandle, mpsc::UnboundedReceiver<ContextNotice>) {
        let (notices, rx) = mpsc::unbounded_channel();
        let options = ContextOptions::default();
        let context = DocumentContext::new(
            Url::parse("https://example.com/article").unwrap(),
            ContextKind::Page,
            markup,
            &options,
        );
        (ContextHandle::spawn(context, &options, notices), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn bursts_produce_one_notice() {
        let (handle, mut notices) = spawn("<p>The quick brown fox</p>");
        handle
            .select(SelectionUpdate::Range { start: 4, end: 5 })
            .await;
        handle
            .select(SelectionUpdate::Range { start: 4, end: 7 })
            .await;
        handle
            .select(SelectionUpdate::Range { start: 4, end: 9 })
            .await;

        tokio::time::sleep(Duration::from_millis(99)).await;
        assert!(notices.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(2)).await;
        let notice = notices.recv().await.unwrap();
        assert_eq!(
            notice.notice,
            SelectionNotice {
                has_selection: true,
                selected_text: "quick".into()
            }
        );
        assert!(notices.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn interaction_checks_promptly() {
        let (handle, mut notices) = spawn("<p>The quick brown fox</p>");
        handle
            .select(SelectionUpdate::Range { start: 10, end: 15 })
            .await;
        handle.interaction().await;

        tokio::time::sleep(Duration::from_millis(11)).await;
        let notice = notices.try_recv().unwrap();
        assert_eq!(notice.notice.selected_text, "brown");

        // The debounced check still fires later but has nothing new to say.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(notices.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn annotate_and_read_back() {
        let (handle, _notices) = spawn("<p>The quick brown fox</p>");
        handle
            .select(SelectionUpdate::Range { start: 4, end: 15 })
            .await;
        assert_eq!(handle.selected_text().await, "quick brown");

        let result = handle
            .annotate(AnnotationRequest::apply(HighlightColor::Green))
            .await;
        assert_eq!(result, Ok(()));
        let markup = handle.markup().await.unwrap();
        assert!(markup.contains(r#"data-highlight-color="green""#));

        handle.annotate(AnnotationRequest::remove()).await.unwrap();
        assert_eq!(
            handle.markup().await.unwrap(),
            "<p>The quick brown fox</p>"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unresponsive_context_degrades() {
        let (handle, mut rx) = ContextHandle::unanswered(
            Url::parse("https://example.com/stuck").unwrap(),
            ContextKind::Page,
            Duration::from_millis(750),
        );
        // Hold replies without answering.
        let parked = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Some(message) = rx.recv().await {
                held.push(message);
            }
        });

        let result = handle
            .annotate(AnnotationRequest::apply(HighlightColor::Yellow))
            .await;
        assert_eq!(result, Err(AnnotateError::NotFound));
        assert_eq!(handle.selected_text().await, "");
        parked.abort();
    }
}
