use once_cell::sync::Lazy;
use qls_core::token::TokenKind;
use tower_lsp::async_trait;
use tower_lsp::lsp_types::{
    CompletionItem, Hover, HoverContents, MarkupContent, MarkupKind, Range, SignatureHelp,
};

use super::position::ActiveToken;

/// The "no hover" value returned instead of an absent response.
pub static EMPTY_HOVER: Lazy<Hover> = Lazy::new(|| Hover {
    contents: HoverContents::Array(Vec::new()),
    range: None,
});

/// The "no signature" value returned instead of an absent response.
pub static EMPTY_SIGNATURE_HELP: Lazy<SignatureHelp> = Lazy::new(|| SignatureHelp {
    signatures: Vec::new(),
    active_signature: None,
    active_parameter: None,
});

pub fn is_empty_hover(hover: &Hover) -> bool {
    *hover == *EMPTY_HOVER
}

pub fn is_empty_signature_help(help: &SignatureHelp) -> bool {
    help.signatures.is_empty()
}

/// Plain-text hover over `range`.
pub fn text_hover(text: String, range: Range) -> Hover {
    Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::PlainText,
            value: text,
        }),
        range: Some(range),
    }
}

/// Completion input. All fields are `None` when no token was found at the
/// cursor; providers then decide between offering everything or nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionContext {
    pub text: Option<String>,
    pub kind: Option<TokenKind>,
    pub range: Option<Range>,
}

impl CompletionContext {
    pub fn from_token(token: &ActiveToken) -> Self {
        Self {
            text: Some(token.text.clone()),
            kind: Some(token.kind),
            range: Some(token.range),
        }
    }

    /// Text to filter by. Only word-like tokens count; after punctuation
    /// everything is a candidate.
    pub fn prefix(&self) -> &str {
        match self.kind {
            Some(TokenKind::Identifier | TokenKind::Keyword | TokenKind::LogicalLiteral | TokenKind::NullLiteral) => {
                self.text.as_deref().unwrap_or("")
            }
            _ => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoverContext {
    pub identifier: String,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHelpContext {
    pub function_name: String,
    pub argument_ordinal: u32,
    pub num_arguments: u32,
}

/// A pluggable source of completion, hover and signature-help answers.
///
/// `Ok(None)` / an empty list means "nothing to say"; `Err` is a fault the
/// caller isolates.
#[async_trait]
pub trait SymbolProvider: Send + Sync {
    async fn completion_items(&self, context: &CompletionContext) -> anyhow::Result<Vec<CompletionItem>>;

    async fn hover(&self, context: &HoverContext) -> anyhow::Result<Option<Hover>>;

    async fn signature_help(&self, context: &SignatureHelpContext) -> anyhow::Result<Option<SignatureHelp>>;
}

/// Fills any provider slot the host left empty.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProvider;

#[async_trait]
impl SymbolProvider for NullProvider {
    async fn completion_items(&self, _context: &CompletionContext) -> anyhow::Result<Vec<CompletionItem>> {
        Ok(Vec::new())
    }

    async fn hover(&self, _context: &HoverContext) -> anyhow::Result<Option<Hover>> {
        Ok(None)
    }

    async fn signature_help(&self, _context: &SignatureHelpContext) -> anyhow::Result<Option<SignatureHelp>> {
        Ok(None)
    }
}
