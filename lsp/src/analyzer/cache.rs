use std::fmt;
use std::hash::Hash;
use std::ops::Deref;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use qls_core::{
    ast::ParseResult,
    inspect::Inspection,
    token::{CommonError, LexError, LexerSnapshot, LexerState, ParseError, Position},
    Settings,
};
use tracing::debug;

use super::document::TextDocument;

/// One step of the lex → snapshot → parse → inspect pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Lexer,
    LexerSnapshot,
    Parser,
    Inspection,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    Lex(LexError),
    Parse(ParseError),
    Common(CommonError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Lex(err) => write!(f, "lex error: {}", err),
            PipelineError::Parse(err) => write!(f, "parse error: {}", err),
            PipelineError::Common(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for PipelineError {}

/// Successful stage output, tagged with the stage that produced it.
#[derive(Debug)]
pub struct Staged<T> {
    pub stage: Stage,
    pub value: Arc<T>,
}

impl<T> Clone for Staged<T> {
    fn clone(&self) -> Self {
        Self {
            stage: self.stage,
            value: self.value.clone(),
        }
    }
}

impl<T> Deref for Staged<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

/// Failed stage output. Downstream stages hand it back untouched, so `stage`
/// always names where the pipeline actually broke.
#[derive(Debug, Clone)]
pub struct StageError {
    pub stage: Stage,
    pub error: Arc<PipelineError>,
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} stage failed: {}", self.stage, self.error)
    }
}

impl std::error::Error for StageError {}

pub type StageOutcome<T> = Result<Staged<T>, StageError>;

fn staged<T, E>(stage: Stage, result: Result<T, E>, wrap: impl FnOnce(E) -> PipelineError) -> StageOutcome<T> {
    match result {
        Ok(value) => Ok(Staged {
            stage,
            value: Arc::new(value),
        }),
        Err(err) => Err(StageError {
            stage,
            error: Arc::new(wrap(err)),
        }),
    }
}

/// The stage functions the cache memoizes.
pub trait PipelineEngine: Send + Sync {
    fn try_lex(&self, text: &str, settings: &Settings) -> Result<LexerState, LexError>;
    fn try_snapshot(&self, state: &LexerState) -> Result<LexerSnapshot, LexError>;
    fn try_parse(&self, settings: &Settings, snapshot: &LexerSnapshot) -> Result<ParseResult, ParseError>;
    fn try_inspect(&self, settings: &Settings, parse: &ParseResult, position: Position) -> Result<Inspection, CommonError>;
}

/// Engine backed by `qls_core`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CoreEngine;

impl PipelineEngine for CoreEngine {
    fn try_lex(&self, text: &str, settings: &Settings) -> Result<LexerState, LexError> {
        qls_core::try_lex(text, settings)
    }

    fn try_snapshot(&self, state: &LexerState) -> Result<LexerSnapshot, LexError> {
        qls_core::try_snapshot(state)
    }

    fn try_parse(&self, settings: &Settings, snapshot: &LexerSnapshot) -> Result<ParseResult, ParseError> {
        qls_core::try_parse(settings, snapshot)
    }

    fn try_inspect(&self, settings: &Settings, parse: &ParseResult, position: Position) -> Result<Inspection, CommonError> {
        qls_core::try_inspect(settings, parse, position)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InspectionKey {
    pub uri: String,
    pub line: u32,
    pub character: u32,
}

struct Memo<T> {
    version: i32,
    outcome: StageOutcome<T>,
}

/// Entry counts per stage map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub lexer: usize,
    pub snapshots: usize,
    pub parses: usize,
    pub inspections: usize,
}

/// Per-document memo of every pipeline stage, failures included.
///
/// Each get-or-create runs while holding the map entry, so concurrent
/// requests for the same document compute a stage at most once per miss.
/// Locks are always taken downstream-first (inspection, parse, snapshot,
/// lexer), never the other way round.
///
/// Inspection entries accumulate per cursor position until the document is
/// invalidated or closed; there is no size bound.
pub struct PipelineCache {
    engine: Arc<dyn PipelineEngine>,
    lexer: DashMap<String, Memo<LexerState>>,
    snapshots: DashMap<String, Memo<LexerSnapshot>>,
    parses: DashMap<String, Memo<ParseResult>>,
    inspections: DashMap<InspectionKey, Memo<Inspection>>,
}

impl Default for PipelineCache {
    fn default() -> Self {
        Self::new(Arc::new(CoreEngine))
    }
}

impl PipelineCache {
    pub fn new(engine: Arc<dyn PipelineEngine>) -> Self {
        Self {
            engine,
            lexer: DashMap::new(),
            snapshots: DashMap::new(),
            parses: DashMap::new(),
            inspections: DashMap::new(),
        }
    }

    pub fn lexer_state(&self, document: &TextDocument, settings: &Settings) -> StageOutcome<LexerState> {
        memoize(&self.lexer, document.uri().to_string(), document.version(), Stage::Lexer, || {
            staged(
                Stage::Lexer,
                self.engine.try_lex(document.text(), settings),
                PipelineError::Lex,
            )
        })
    }

    pub fn snapshot(&self, document: &TextDocument, settings: &Settings) -> StageOutcome<LexerSnapshot> {
        memoize(
            &self.snapshots,
            document.uri().to_string(),
            document.version(),
            Stage::LexerSnapshot,
            || {
                let state = self.lexer_state(document, settings)?;
                staged(
                    Stage::LexerSnapshot,
                    self.engine.try_snapshot(&state),
                    PipelineError::Lex,
                )
            },
        )
    }

    pub fn parse_result(&self, document: &TextDocument, settings: &Settings) -> StageOutcome<ParseResult> {
        memoize(&self.parses, document.uri().to_string(), document.version(), Stage::Parser, || {
            let snapshot = self.snapshot(document, settings)?;
            staged(
                Stage::Parser,
                self.engine.try_parse(settings, &snapshot),
                PipelineError::Parse,
            )
        })
    }

    pub fn inspection(&self, document: &TextDocument, position: Position, settings: &Settings) -> StageOutcome<Inspection> {
        let key = InspectionKey {
            uri: document.uri().to_string(),
            line: position.line,
            character: position.character,
        };
        memoize(&self.inspections, key, document.version(), Stage::Inspection, || {
            let parse = self.parse_result(document, settings)?;
            staged(
                Stage::Inspection,
                self.engine.try_inspect(settings, &parse, position),
                PipelineError::Common,
            )
        })
    }

    /// Drop every stage memoized for `uri`; the next request recomputes from text.
    pub fn invalidate(&self, uri: &str) {
        self.lexer.remove(uri);
        self.snapshots.remove(uri);
        self.parses.remove(uri);
        self.inspections.retain(|key, _| key.uri != uri);
        debug!(uri, "pipeline cache invalidated");
    }

    pub fn close(&self, uri: &str) {
        self.invalidate(uri);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            lexer: self.lexer.len(),
            snapshots: self.snapshots.len(),
            parses: self.parses.len(),
            inspections: self.inspections.len(),
        }
    }
}

fn memoize<K, T>(
    map: &DashMap<K, Memo<T>>,
    key: K,
    version: i32,
    stage: Stage,
    compute: impl FnOnce() -> StageOutcome<T>,
) -> StageOutcome<T>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    match map.entry(key) {
        Entry::Occupied(entry) if entry.get().version == version => {
            debug!(key = ?entry.key(), ?stage, "pipeline cache hit");
            entry.get().outcome.clone()
        }
        Entry::Occupied(mut entry) => {
            // Written by a request that raced an edit
            debug!(key = ?entry.key(), ?stage, "pipeline cache entry from another version");
            let outcome = compute();
            entry.insert(Memo {
                version,
                outcome: outcome.clone(),
            });
            outcome
        }
        Entry::Vacant(entry) => {
            let outcome = compute();
            match &outcome {
                Ok(_) => debug!(key = ?entry.key(), ?stage, "pipeline cache miss"),
                Err(err) => debug!(key = ?entry.key(), ?stage, error = %err, "pipeline stage failed"),
            }
            entry.insert(Memo {
                version,
                outcome: outcome.clone(),
            });
            outcome
        }
    }
}
