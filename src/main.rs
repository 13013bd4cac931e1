use spanmark::create_service;
use tower_lsp::Server;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    // stdout carries the JSON-RPC stream, so logs go to stderr.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env("SPANMARK_LOG").unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = create_service();
    Server::new(stdin, stdout, socket).serve(service).await;
}
