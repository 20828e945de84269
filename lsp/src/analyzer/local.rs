use std::sync::Arc;

use qls_core::inspect::{Inspection, ScopeItem, ScopeItemKind};
use tower_lsp::async_trait;
use tower_lsp::lsp_types::{CompletionItem, CompletionItemKind, Documentation, Hover, SignatureHelp};

use super::provider::{text_hover, CompletionContext, HoverContext, SignatureHelpContext, SymbolProvider};

/// Names visible at the cursor in the document itself.
///
/// Built per request from the inspection; with no inspection (the document
/// failed to parse) it knows nothing.
#[derive(Debug, Default, Clone)]
pub struct LocalDocumentProvider {
    inspection: Option<Arc<Inspection>>,
}

impl LocalDocumentProvider {
    pub fn new(inspection: Option<Arc<Inspection>>) -> Self {
        Self { inspection }
    }

    fn scope(&self) -> &[ScopeItem] {
        self.inspection.as_deref().map(|i| i.scope.as_slice()).unwrap_or_default()
    }
}

fn describe(item: &ScopeItem) -> String {
    match item.kind {
        ScopeItemKind::LetVariable => format!("[let-variable] {}: {}", item.name, item.ty),
    }
}

#[async_trait]
impl SymbolProvider for LocalDocumentProvider {
    async fn completion_items(&self, context: &CompletionContext) -> anyhow::Result<Vec<CompletionItem>> {
        let prefix = context.prefix();
        Ok(self
            .scope()
            .iter()
            .filter(|item| item.name.starts_with(prefix))
            .map(|item| CompletionItem {
                label: item.name.clone(),
                kind: Some(CompletionItemKind::VARIABLE),
                documentation: Some(Documentation::String(describe(item))),
                ..Default::default()
            })
            .collect())
    }

    async fn hover(&self, context: &HoverContext) -> anyhow::Result<Option<Hover>> {
        Ok(self
            .scope()
            .iter()
            .find(|item| item.name == context.identifier)
            .map(|item| text_hover(describe(item), context.range)))
    }

    async fn signature_help(&self, _context: &SignatureHelpContext) -> anyhow::Result<Option<SignatureHelp>> {
        Ok(None)
    }
}
