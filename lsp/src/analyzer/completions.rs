use once_cell::sync::Lazy;
use qls_core::token::KEYWORDS;
use tower_lsp::async_trait;
use tower_lsp::lsp_types::{CompletionItem, CompletionItemKind, Hover, SignatureHelp};

use super::provider::{CompletionContext, HoverContext, SignatureHelpContext, SymbolProvider};

// Keywords never change, so the items are built once
static KEYWORD_ITEMS: Lazy<Vec<CompletionItem>> = Lazy::new(|| {
    KEYWORDS
        .iter()
        .map(|keyword| CompletionItem {
            label: keyword.to_string(),
            kind: Some(CompletionItemKind::KEYWORD),
            detail: Some("keyword".to_string()),
            ..Default::default()
        })
        .collect()
});

/// Completes language keywords by case-sensitive prefix.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordProvider;

#[async_trait]
impl SymbolProvider for KeywordProvider {
    async fn completion_items(&self, context: &CompletionContext) -> anyhow::Result<Vec<CompletionItem>> {
        let prefix = context.prefix();
        Ok(KEYWORD_ITEMS
            .iter()
            .filter(|item| item.label.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn hover(&self, _context: &HoverContext) -> anyhow::Result<Option<Hover>> {
        Ok(None)
    }

    async fn signature_help(&self, _context: &SignatureHelpContext) -> anyhow::Result<Option<SignatureHelp>> {
        Ok(None)
    }
}
