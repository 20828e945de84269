use qls_core::typ::TypeKind;
use serde::Deserialize;
use tower_lsp::async_trait;
use tower_lsp::lsp_types::{CompletionItem, CompletionItemKind, Documentation, Hover, SignatureHelp};

use super::provider::{text_hover, CompletionContext, HoverContext, SignatureHelpContext, SymbolProvider};

/// A name the host declares to exist at evaluation time.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EnvironmentSymbol {
    pub name: String,
    #[serde(rename = "type", default)]
    pub ty: TypeKind,
    #[serde(default)]
    pub documentation: Option<String>,
}

impl EnvironmentSymbol {
    pub fn new(name: impl Into<String>, ty: TypeKind) -> Self {
        Self {
            name: name.into(),
            ty,
            documentation: None,
        }
    }

    fn hover_text(&self) -> String {
        format!("[environment] {}: {}", self.name, self.ty)
    }
}

#[derive(Debug, Default, Clone)]
pub struct EnvironmentProvider {
    symbols: Vec<EnvironmentSymbol>,
}

impl EnvironmentProvider {
    pub fn new(symbols: Vec<EnvironmentSymbol>) -> Self {
        Self { symbols }
    }
}

#[async_trait]
impl SymbolProvider for EnvironmentProvider {
    async fn completion_items(&self, context: &CompletionContext) -> anyhow::Result<Vec<CompletionItem>> {
        let prefix = context.prefix();
        Ok(self
            .symbols
            .iter()
            .filter(|symbol| symbol.name.starts_with(prefix))
            .map(|symbol| CompletionItem {
                label: symbol.name.clone(),
                kind: Some(CompletionItemKind::VARIABLE),
                detail: Some(symbol.hover_text()),
                documentation: symbol.documentation.clone().map(Documentation::String),
                ..Default::default()
            })
            .collect())
    }

    async fn hover(&self, context: &HoverContext) -> anyhow::Result<Option<Hover>> {
        Ok(self
            .symbols
            .iter()
            .find(|symbol| symbol.name == context.identifier)
            .map(|symbol| text_hover(symbol.hover_text(), context.range)))
    }

    async fn signature_help(&self, _context: &SignatureHelpContext) -> anyhow::Result<Option<SignatureHelp>> {
        Ok(None)
    }
}
