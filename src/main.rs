//! arch Language Server - Main entry point
//!
//! Provides LSP support for the arch DSL with:
//! - Scope-aware error detection (uninitialized variables, unknown functions)
//! - Semantic token highlighting for variables, calls and quantifiers
//! - Debounced re-analysis on every edit

use tower_lsp::{LspService, Server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use arch_lsp::server::ArchLanguageServer;

#[tokio::main]
async fn main() {
    // Setup logging to stderr (LSP uses stdout for protocol)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "arch_lsp=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting arch Language Server");

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(ArchLanguageServer::new);

    Server::new(stdin, stdout, socket).serve(service).await;
}
