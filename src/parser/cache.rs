//! Per-document syntax tree cache.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tower_lsp::lsp_types::Url;

use crate::parser::bridge::{ParseFailure, ParseSource};
use crate::parser::tree::SyntaxNode;

#[derive(Default)]
struct Slot {
    state: Mutex<Option<(i32, Arc<SyntaxNode>)>>,
}

/// Caches the most recent parsed tree per document.
///
/// One entry per document, keyed by the LSP document version: a request
/// with a matching version is served from memory, anything else
/// re-parses and replaces the entry. Parse failures are never cached, so
/// a transient subprocess failure does not poison the revision.
#[derive(Default)]
pub struct TreeCache {
    slots: Mutex<HashMap<Url, Arc<Slot>>>,
}

impl TreeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the tree for `(uri, version)`, invoking `source` on a miss.
    ///
    /// The per-document slot lock is held across the parse: concurrent
    /// requests for the same document collapse into a single parser
    /// invocation, while other documents proceed independently.
    pub async fn get_or_parse(
        &self,
        uri: &Url,
        version: i32,
        text: &str,
        source: &dyn ParseSource,
    ) -> Result<Arc<SyntaxNode>, ParseFailure> {
        let slot = {
            let mut slots = self.slots.lock().await;
            slots.entry(uri.clone()).or_default().clone()
        };

        let mut state = slot.state.lock().await;
        if let Some((cached_version, tree)) = state.as_ref() {
            if *cached_version == version {
                tracing::debug!(%uri, version, "tree cache hit");
                return Ok(tree.clone());
            }
        }

        let tree = Arc::new(source.parse(text).await?);
        *state = Some((version, tree.clone()));
        Ok(tree)
    }

    /// Drop the entry for a closed document.
    pub async fn remove(&self, uri: &Url) {
        self.slots.lock().await.remove(uri);
    }
}
