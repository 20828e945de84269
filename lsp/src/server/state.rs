use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use ropey::Rope;
use tower_lsp::lsp_types::{Position, Url};
use tower_lsp::Client;

use super::config::ServerConfig;
use crate::analyzer::{AnalysisSession, PipelineCache, TextDocument};

/// An open buffer as the editor last described it.
#[derive(Debug, Default)]
pub(crate) struct Document {
    pub(crate) content: Rope,
    pub(crate) version: i32,
}

/// Server state shared across handlers.
pub struct QlsLanguageServer {
    pub(crate) client: Client,
    pub(crate) documents: Arc<DashMap<Url, Document>>,
    pub(crate) cache: Arc<PipelineCache>,
    pub(crate) config: Mutex<ServerConfig>,
}

impl QlsLanguageServer {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            documents: Arc::new(DashMap::new()),
            cache: Arc::new(PipelineCache::default()),
            config: Mutex::new(ServerConfig::default()),
        }
    }

    /// Immutable copy of the buffer for one request.
    pub(crate) fn snapshot(&self, uri: &Url) -> Option<TextDocument> {
        let doc = self.documents.get(uri)?;
        Some(TextDocument::new(uri.as_str(), doc.content.to_string(), doc.version))
    }

    pub(crate) fn session(&self, uri: &Url, position: Position) -> Option<AnalysisSession<'_>> {
        let document = self.snapshot(uri)?;
        let settings = self.config.lock().ok()?.analysis_settings();
        Some(AnalysisSession::new(document, position, &self.cache, settings))
    }

    /// Forget every cached pipeline artifact of the open documents.
    pub(crate) fn cache_reset(&self) {
        for entry in self.documents.iter() {
            self.cache.invalidate(entry.key().as_str());
        }
    }
}
