//! Editor intelligence over the `qls_core` pipeline: a per-document stage
//! cache, cursor resolution, symbol providers, and the per-request session
//! that combines them.

mod cache;
mod completions;
mod document;
mod environment;
mod library;
mod local;
mod position;
mod provider;
mod session;
#[cfg(test)]
mod tests;
mod utils;

pub use cache::{
    CacheStats, CoreEngine, InspectionKey, PipelineCache, PipelineEngine, PipelineError, Stage, StageError,
    StageOutcome, Staged,
};
pub use completions::KeywordProvider;
pub use document::TextDocument;
pub use environment::{EnvironmentProvider, EnvironmentSymbol};
pub use library::{DefinitionKind, Library, LibraryDefinition, LibraryProvider, Parameter};
pub use local::LocalDocumentProvider;
pub use position::{identifier_at, token_at, ActiveToken};
pub use provider::{
    is_empty_hover, is_empty_signature_help, text_hover, CompletionContext, HoverContext, NullProvider,
    SignatureHelpContext, SymbolProvider, EMPTY_HOVER, EMPTY_SIGNATURE_HELP,
};
pub use session::{AnalysisSession, AnalysisSettings, ProviderSet};
