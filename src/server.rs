//! LSP server implementation for the arch DSL.
//!
//! Thin protocol glue: document lifecycle events feed the analysis
//! pipeline (tree cache, scope validation) through the debounce
//! scheduler, and semantic token requests go straight through the cache.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};

use crate::analysis::scheduler::DebounceScheduler;
use crate::analysis::{scope, tokens};
use crate::config::ServerConfig;
use crate::parser::bridge::{ParseFailure, ParserBridge};
use crate::parser::cache::TreeCache;

/// Diagnostic source tag for parser failures.
pub const PARSER_DIAGNOSTIC_SOURCE: &str = "parser";

/// Text and revision of an open document.
#[derive(Debug, Clone)]
struct DocumentSnapshot {
    version: i32,
    text: String,
}

/// Shared state behind every analysis pass.
///
/// Lives in an `Arc` so debounced tasks can run after the triggering
/// notification handler has returned.
struct AnalysisEngine {
    client: Client,
    documents: RwLock<HashMap<Url, DocumentSnapshot>>,
    cache: TreeCache,
    bridge: ParserBridge,
}

impl AnalysisEngine {
    fn new(client: Client, config: &ServerConfig) -> Self {
        Self {
            client,
            documents: RwLock::new(HashMap::new()),
            cache: TreeCache::new(),
            bridge: ParserBridge::new(config.parser_path.clone(), config.parse_timeout),
        }
    }

    /// Run one full pass for the latest snapshot of `uri` and publish
    /// the resulting diagnostics.
    ///
    /// The snapshot is read at call time, after the debounce window, so
    /// a burst of edits analyzes only the final text. If the document
    /// moves on while the parser runs, the completed result is
    /// discarded instead of overwriting newer diagnostics.
    async fn analyze(&self, uri: &Url) {
        let Some(snapshot) = self.documents.read().await.get(uri).cloned() else {
            return; // closed while the timer slept
        };

        let diagnostics = match self
            .cache
            .get_or_parse(uri, snapshot.version, &snapshot.text, &self.bridge)
            .await
        {
            Ok(tree) => scope::analyze(&tree),
            Err(failure) => {
                tracing::warn!(%uri, error = %failure, "parse failed");
                vec![parse_failure_diagnostic(&failure)]
            }
        };

        let superseded = match self.documents.read().await.get(uri) {
            Some(current) => current.version != snapshot.version,
            None => true,
        };
        if superseded {
            tracing::debug!(%uri, version = snapshot.version, "discarding stale analysis");
            return;
        }

        self.client
            .publish_diagnostics(uri.clone(), diagnostics, Some(snapshot.version))
            .await;
    }

    /// Build the semantic token stream for a document, bypassing the
    /// debounce timer. Parse failures yield an empty stream; the error
    /// itself surfaces through the diagnostics pipeline.
    async fn semantic_tokens(&self, uri: &Url) -> Option<Vec<SemanticToken>> {
        let snapshot = self.documents.read().await.get(uri).cloned()?;
        match self
            .cache
            .get_or_parse(uri, snapshot.version, &snapshot.text, &self.bridge)
            .await
        {
            Ok(tree) => Some(tokens::encode(&tokens::classify(&tree))),
            Err(failure) => {
                tracing::debug!(%uri, error = %failure, "no semantic tokens: parse failed");
                Some(Vec::new())
            }
        }
    }
}

fn parse_failure_diagnostic(failure: &ParseFailure) -> Diagnostic {
    // Anchored at the document start: there is no tree to point into.
    Diagnostic {
        range: Range {
            start: Position::new(0, 0),
            end: Position::new(0, 1),
        },
        severity: Some(DiagnosticSeverity::ERROR),
        source: Some(PARSER_DIAGNOSTIC_SOURCE.to_owned()),
        message: format!("Parse error: {failure}"),
        ..Default::default()
    }
}

/// arch Language Server.
pub struct ArchLanguageServer {
    engine: Arc<AnalysisEngine>,
    scheduler: DebounceScheduler,
}

impl ArchLanguageServer {
    /// Create a server configured from the environment.
    pub fn new(client: Client) -> Self {
        Self::with_config(client, ServerConfig::from_env())
    }

    pub fn with_config(client: Client, config: ServerConfig) -> Self {
        Self {
            engine: Arc::new(AnalysisEngine::new(client, &config)),
            scheduler: DebounceScheduler::new(config.debounce),
        }
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for ArchLanguageServer {
    async fn initialize(&self, _: InitializeParams) -> Result<InitializeResult> {
        tracing::info!("Initializing arch Language Server");

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                // Full sync: the parser consumes whole documents anyway.
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                semantic_tokens_provider: Some(
                    SemanticTokensServerCapabilities::SemanticTokensOptions(
                        SemanticTokensOptions {
                            legend: tokens::legend(),
                            full: Some(SemanticTokensFullOptions::Bool(true)),
                            ..Default::default()
                        },
                    ),
                ),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "arch-lsp".to_owned(),
                version: Some(env!("CARGO_PKG_VERSION").to_owned()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        tracing::info!("arch Language Server initialized");
        self.engine
            .client
            .log_message(MessageType::INFO, "arch Language Server ready")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        tracing::info!("Shutting down arch Language Server");
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        tracing::debug!(%uri, "document opened");

        self.engine.documents.write().await.insert(
            uri.clone(),
            DocumentSnapshot {
                version: params.text_document.version,
                text: params.text_document.text,
            },
        );

        // Opening analyzes immediately; debouncing is for edit bursts.
        self.engine.analyze(&uri).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;
        tracing::debug!(%uri, version, "document changed");

        // Full sync: the last change event carries the complete text.
        let Some(change) = params.content_changes.into_iter().next_back() else {
            return;
        };
        self.engine.documents.write().await.insert(
            uri.clone(),
            DocumentSnapshot {
                version,
                text: change.text,
            },
        );

        let engine = Arc::clone(&self.engine);
        let task_uri = uri.clone();
        self.scheduler.schedule(uri, async move {
            engine.analyze(&task_uri).await;
        });
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        tracing::debug!(%uri, "document closed");

        self.scheduler.cancel(&uri);
        self.engine.documents.write().await.remove(&uri);
        self.engine.cache.remove(&uri).await;

        // The sink replaces wholesale, so an empty publish clears.
        self.engine
            .client
            .publish_diagnostics(uri, Vec::new(), None)
            .await;
    }

    async fn semantic_tokens_full(
        &self,
        params: SemanticTokensParams,
    ) -> Result<Option<SemanticTokensResult>> {
        let uri = params.text_document.uri;
        tracing::debug!(%uri, "semantic tokens requested");

        let Some(data) = self.engine.semantic_tokens(&uri).await else {
            return Ok(None);
        };
        Ok(Some(SemanticTokensResult::Tokens(SemanticTokens {
            result_id: None,
            data,
        })))
    }
}
