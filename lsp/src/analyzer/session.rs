use std::sync::Arc;

use futures::future::join_all;
use qls_core::{inspect::Inspection, Settings};
use tokio::task::JoinError;
use tower_lsp::lsp_types::{CompletionItem, Hover, Position, SignatureHelp};
use tracing::{debug, warn};

use super::cache::PipelineCache;
use super::completions::KeywordProvider;
use super::document::TextDocument;
use super::environment::EnvironmentProvider;
use super::library::{Library, LibraryProvider};
use super::local::LocalDocumentProvider;
use super::position::{identifier_at, token_at};
use super::provider::{
    is_empty_hover, CompletionContext, HoverContext, NullProvider, SignatureHelpContext, SymbolProvider,
    EMPTY_HOVER, EMPTY_SIGNATURE_HELP,
};
use super::utils::to_core_position;

/// Provider slots a host may fill. Empty slots answer nothing, except the
/// local slot which falls back to the request's own inspection scope.
#[derive(Clone, Default)]
pub struct ProviderSet {
    pub keyword: Option<Arc<dyn SymbolProvider>>,
    pub library: Option<Arc<dyn SymbolProvider>>,
    pub environment: Option<Arc<dyn SymbolProvider>>,
    pub local_document: Option<Arc<dyn SymbolProvider>>,
}

fn or_null(slot: &Option<Arc<dyn SymbolProvider>>) -> Arc<dyn SymbolProvider> {
    match slot {
        Some(provider) => Arc::clone(provider),
        None => Arc::new(NullProvider),
    }
}

#[derive(Clone, Default)]
pub struct AnalysisSettings {
    pub pipeline: Settings,
    pub providers: ProviderSet,
}

impl AnalysisSettings {
    /// Keywords plus `library`, with the library's type resolver wired into
    /// inspection.
    pub fn for_library(library: Arc<Library>) -> Self {
        Self {
            pipeline: Settings::default().with_type_resolver(library.type_resolver()),
            providers: ProviderSet {
                keyword: Some(Arc::new(KeywordProvider)),
                library: Some(Arc::new(LibraryProvider::new(library))),
                ..Default::default()
            },
        }
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.pipeline.locale = locale.into();
        self
    }

    pub fn with_environment(mut self, environment: EnvironmentProvider) -> Self {
        self.providers.environment = Some(Arc::new(environment));
        self
    }
}

/// One editor request against one document snapshot.
///
/// Every public operation resolves to a value: provider faults and pipeline
/// failures surface only as missing results.
pub struct AnalysisSession<'c> {
    document: TextDocument,
    position: Position,
    cache: &'c PipelineCache,
    settings: AnalysisSettings,
}

impl<'c> AnalysisSession<'c> {
    pub fn new(document: TextDocument, position: Position, cache: &'c PipelineCache, settings: AnalysisSettings) -> Self {
        Self {
            document,
            position,
            cache,
            settings,
        }
    }

    fn inspection(&self) -> Option<Arc<Inspection>> {
        self.cache
            .inspection(&self.document, to_core_position(self.position), &self.settings.pipeline)
            .ok()
            .map(|staged| staged.value)
    }

    fn completion_context(&self) -> CompletionContext {
        match self.cache.lexer_state(&self.document, &self.settings.pipeline) {
            Ok(state) => token_at(&state, self.position)
                .map(|token| CompletionContext::from_token(&token))
                .unwrap_or_default(),
            Err(_) => CompletionContext::default(),
        }
    }

    /// Keyword, library, environment, then local items, concatenated as-is.
    pub async fn completion_items(&self) -> Vec<CompletionItem> {
        let context = self.completion_context();
        let providers = &self.settings.providers;
        let local: Arc<dyn SymbolProvider> = match &providers.local_document {
            Some(provider) => Arc::clone(provider),
            None => Arc::new(LocalDocumentProvider::new(self.inspection())),
        };
        let fan_out: [(&str, Arc<dyn SymbolProvider>); 4] = [
            ("keyword", or_null(&providers.keyword)),
            ("library", or_null(&providers.library)),
            ("environment", or_null(&providers.environment)),
            ("local", local),
        ];

        let tasks = fan_out.iter().map(|(_, provider)| {
            let provider = Arc::clone(provider);
            let context = context.clone();
            tokio::spawn(async move { provider.completion_items(&context).await })
        });
        let results = join_all(tasks).await;

        let items: Vec<CompletionItem> = fan_out
            .iter()
            .zip(results)
            .flat_map(|((name, _), joined)| settle(name, joined))
            .collect();
        debug!(uri = self.document.uri(), count = items.len(), "completion");
        items
    }

    pub async fn hover(&self) -> Hover {
        let Ok(state) = self.cache.lexer_state(&self.document, &self.settings.pipeline) else {
            return EMPTY_HOVER.clone();
        };
        let Some(token) = identifier_at(&state, self.position) else {
            return EMPTY_HOVER.clone();
        };
        let context = HoverContext {
            identifier: token.text,
            range: token.range,
        };

        let chain = [("library", or_null(&self.settings.providers.library))];
        for (name, provider) in chain {
            let context = context.clone();
            let joined = tokio::spawn(async move { provider.hover(&context).await }).await;
            if let Some(hover) = settle(name, joined).filter(|hover| !is_empty_hover(hover)) {
                return hover;
            }
        }
        EMPTY_HOVER.clone()
    }

    pub async fn signature_help(&self) -> SignatureHelp {
        let Some(inspection) = self.inspection() else {
            return EMPTY_SIGNATURE_HELP.clone();
        };
        let Some(invoke) = &inspection.invoke_expression else {
            return EMPTY_SIGNATURE_HELP.clone();
        };
        let Some(function_name) = invoke.name.clone() else {
            return EMPTY_SIGNATURE_HELP.clone();
        };
        let context = SignatureHelpContext {
            function_name,
            argument_ordinal: invoke.argument_ordinal,
            num_arguments: invoke.num_arguments,
        };

        let provider = or_null(&self.settings.providers.library);
        let joined = tokio::spawn(async move { provider.signature_help(&context).await }).await;
        settle("library", joined).unwrap_or_else(|| EMPTY_SIGNATURE_HELP.clone())
    }
}

/// A provider's answer, or its empty default when it failed or panicked.
fn settle<T: Default>(provider: &str, joined: Result<anyhow::Result<T>, JoinError>) -> T {
    match joined {
        Ok(Ok(value)) => value,
        Ok(Err(err)) => {
            warn!(provider, error = %err, "symbol provider failed");
            T::default()
        }
        Err(err) => {
            warn!(provider, error = %err, "symbol provider task aborted");
            T::default()
        }
    }
}
