use super::*;
use qls_core::{
    ast::ParseResult,
    inspect::Inspection,
    token::{CommonError, LexError, LexerSnapshot, LexerState, ParseError, Position as CorePosition, TokenKind},
    typ::TypeKind,
    Settings,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower_lsp::async_trait;
use tower_lsp::lsp_types::{CompletionItem, Hover, Position, Range, SignatureHelp};

#[derive(Default)]
struct CountingEngine {
    lex: AtomicUsize,
    snapshot: AtomicUsize,
    parse: AtomicUsize,
    inspect: AtomicUsize,
    fail_lex: AtomicBool,
}

impl CountingEngine {
    fn failing() -> Self {
        let engine = Self::default();
        engine.fail_lex.store(true, Ordering::SeqCst);
        engine
    }

    fn counts(&self) -> [usize; 4] {
        [
            self.lex.load(Ordering::SeqCst),
            self.snapshot.load(Ordering::SeqCst),
            self.parse.load(Ordering::SeqCst),
            self.inspect.load(Ordering::SeqCst),
        ]
    }
}

impl PipelineEngine for CountingEngine {
    fn try_lex(&self, text: &str, settings: &Settings) -> Result<LexerState, LexError> {
        self.lex.fetch_add(1, Ordering::SeqCst);
        if self.fail_lex.load(Ordering::SeqCst) {
            return Err(LexError::ControlCharacter { line: 0, character: 0 });
        }
        CoreEngine.try_lex(text, settings)
    }

    fn try_snapshot(&self, state: &LexerState) -> Result<LexerSnapshot, LexError> {
        self.snapshot.fetch_add(1, Ordering::SeqCst);
        CoreEngine.try_snapshot(state)
    }

    fn try_parse(&self, settings: &Settings, snapshot: &LexerSnapshot) -> Result<ParseResult, ParseError> {
        self.parse.fetch_add(1, Ordering::SeqCst);
        CoreEngine.try_parse(settings, snapshot)
    }

    fn try_inspect(
        &self,
        settings: &Settings,
        parse: &ParseResult,
        position: CorePosition,
    ) -> Result<Inspection, CommonError> {
        self.inspect.fetch_add(1, Ordering::SeqCst);
        CoreEngine.try_inspect(settings, parse, position)
    }
}

fn counting_cache(engine: CountingEngine) -> (Arc<CountingEngine>, PipelineCache) {
    let engine = Arc::new(engine);
    let cache = PipelineCache::new(engine.clone());
    (engine, cache)
}

fn doc(text: &str) -> TextDocument {
    TextDocument::new("file:///test.q", text, 1)
}

#[test]
fn test_stage_getters_compute_once() {
    let (engine, cache) = counting_cache(CountingEngine::default());
    let document = doc("1 + 2");
    let settings = Settings::default();

    let first = cache.parse_result(&document, &settings).unwrap();
    let second = cache.parse_result(&document, &settings).unwrap();
    assert!(Arc::ptr_eq(&first.value, &second.value));
    assert_eq!(first.stage, Stage::Parser);

    let lexer = cache.lexer_state(&document, &settings).unwrap();
    assert_eq!(lexer.stage, Stage::Lexer);
    assert_eq!(engine.counts(), [1, 1, 1, 0]);
}

#[test]
fn test_invalidate_and_close_recompute() {
    let (engine, cache) = counting_cache(CountingEngine::default());
    let document = doc("1 + 2");
    let settings = Settings::default();

    cache.inspection(&document, CorePosition::new(0, 1), &settings).unwrap();
    assert_eq!(
        cache.stats(),
        CacheStats {
            lexer: 1,
            snapshots: 1,
            parses: 1,
            inspections: 1
        }
    );

    cache.invalidate(document.uri());
    assert_eq!(cache.stats(), CacheStats::default());
    cache.parse_result(&document, &settings).unwrap();
    assert_eq!(engine.counts(), [2, 2, 2, 1]);

    cache.close(document.uri());
    cache.lexer_state(&document, &settings).unwrap();
    assert_eq!(engine.counts()[0], 3);
}

#[test]
fn test_invalidate_leaves_other_documents() {
    let (engine, cache) = counting_cache(CountingEngine::default());
    let settings = Settings::default();
    let a = TextDocument::new("file:///a.q", "1", 1);
    let b = TextDocument::new("file:///b.q", "2", 1);

    cache.inspection(&a, CorePosition::new(0, 0), &settings).unwrap();
    cache.inspection(&b, CorePosition::new(0, 0), &settings).unwrap();
    cache.invalidate(a.uri());

    cache.inspection(&b, CorePosition::new(0, 0), &settings).unwrap();
    assert_eq!(engine.counts(), [2, 2, 2, 2]);
    assert_eq!(cache.stats().inspections, 1);
}

#[test]
fn test_lex_failure_short_circuits() {
    let (engine, cache) = counting_cache(CountingEngine::failing());
    let document = doc("anything");
    let settings = Settings::default();

    let err = cache.parse_result(&document, &settings).unwrap_err();
    assert_eq!(err.stage, Stage::Lexer);
    assert!(matches!(err.error.as_ref(), PipelineError::Lex(LexError::ControlCharacter { .. })));

    let inspect_err = cache
        .inspection(&document, CorePosition::new(0, 0), &settings)
        .unwrap_err();
    assert_eq!(inspect_err.stage, Stage::Lexer);
    assert!(Arc::ptr_eq(&err.error, &inspect_err.error));

    // The failure itself is memoized
    cache.snapshot(&document, &settings).unwrap_err();
    assert_eq!(engine.counts(), [1, 0, 0, 0]);
}

#[test]
fn test_parse_failure_skips_inspection() {
    let (engine, cache) = counting_cache(CountingEngine::default());
    let document = doc("1 2");
    let settings = Settings::default();

    let err = cache
        .inspection(&document, CorePosition::new(0, 0), &settings)
        .unwrap_err();
    assert_eq!(err.stage, Stage::Parser);
    cache
        .inspection(&document, CorePosition::new(0, 1), &settings)
        .unwrap_err();
    assert_eq!(engine.counts(), [1, 1, 1, 0]);
}

#[test]
fn test_inspection_keyed_by_position_value() {
    let (engine, cache) = counting_cache(CountingEngine::default());
    let document = doc("f(1, 2)");
    let settings = Settings::default();

    let first = cache.inspection(&document, CorePosition::new(0, 3), &settings).unwrap();
    let again = cache.inspection(&document, CorePosition::new(0, 3), &settings).unwrap();
    assert!(Arc::ptr_eq(&first.value, &again.value));
    assert_eq!(engine.counts()[3], 1);

    let other = cache.inspection(&document, CorePosition::new(0, 6), &settings).unwrap();
    assert_eq!(other.invoke_expression.as_ref().map(|i| i.argument_ordinal), Some(1));
    assert_eq!(engine.counts()[3], 2);
    assert_eq!(cache.stats().inspections, 2);
}

#[test]
fn test_invalid_position_is_an_inspection_failure() {
    let (_engine, cache) = counting_cache(CountingEngine::default());
    let err = cache
        .inspection(&doc("abc"), CorePosition::new(3, 0), &Settings::default())
        .unwrap_err();
    assert_eq!(err.stage, Stage::Inspection);
    assert!(matches!(err.error.as_ref(), PipelineError::Common(CommonError::InvalidPosition(_))));
}

#[test]
fn test_new_version_replaces_entry() {
    let (engine, cache) = counting_cache(CountingEngine::default());
    let settings = Settings::default();
    cache
        .lexer_state(&TextDocument::new("file:///v.q", "1", 1), &settings)
        .unwrap();
    let state = cache
        .lexer_state(&TextDocument::new("file:///v.q", "abc", 2), &settings)
        .unwrap();
    assert_eq!(state.lines[0].tokens[0].text, "abc");
    assert_eq!(engine.counts()[0], 2);
    assert_eq!(cache.stats().lexer, 1);
}

#[test]
fn test_parallel_requests_compute_once() {
    let (engine, cache) = counting_cache(CountingEngine::default());
    let document = doc("let a = 1 in a + 2");
    let settings = Settings::default();

    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                cache
                    .inspection(&document, CorePosition::new(0, 14), &settings)
                    .unwrap();
            });
        }
    });
    assert_eq!(engine.counts(), [1, 1, 1, 1]);
}

fn lex(text: &str) -> LexerState {
    qls_core::try_lex(text, &Settings::default()).unwrap()
}

#[test]
fn test_token_at_touching_cursor() {
    let state = lex("Test.NumberO");
    let token = token_at(&state, Position::new(0, 12)).unwrap();
    assert_eq!(token.kind, TokenKind::Identifier);
    assert_eq!(token.text, "Test.NumberO");
    assert_eq!(token.range, Range::new(Position::new(0, 0), Position::new(0, 12)));

    let token = token_at(&state, Position::new(0, 0)).unwrap();
    assert_eq!(token.text, "Test.NumberO");
}

#[test]
fn test_token_at_trailing_dot() {
    let state = lex("1 + Test.");
    let token = token_at(&state, Position::new(0, 9)).unwrap();
    assert_eq!(token.kind, TokenKind::Identifier);
    assert_eq!(token.text, "Test.");
    assert_eq!(token.range, Range::new(Position::new(0, 4), Position::new(0, 9)));
}

#[test]
fn test_token_at_dot_after_non_identifier() {
    let state = lex("f(x).");
    assert_eq!(token_at(&state, Position::new(0, 5)), None);
}

#[test]
fn test_token_at_nothing() {
    let state = lex("a\n\n  b");
    assert_eq!(token_at(&state, Position::new(1, 0)), None);
    assert_eq!(token_at(&state, Position::new(2, 1)), None);
    assert_eq!(token_at(&state, Position::new(7, 0)), None);
}

#[test]
fn test_identifier_at_rejects_other_kinds() {
    let state = lex("if x then 1 else 2");
    assert_eq!(identifier_at(&state, Position::new(0, 1)), None);
    assert_eq!(identifier_at(&state, Position::new(0, 10)), None);
    assert_eq!(identifier_at(&state, Position::new(0, 3)).map(|t| t.text), Some("x".to_string()));
}

#[test]
fn test_completion_context_prefix() {
    assert_eq!(CompletionContext::default().prefix(), "");
    let state = lex("a + ");
    let plus = token_at(&state, Position::new(0, 3)).unwrap();
    assert_eq!(plus.kind, TokenKind::Plus);
    assert_eq!(CompletionContext::from_token(&plus).prefix(), "");
}

/// Test double with scripted behavior.
#[derive(Default)]
struct ScriptedProvider {
    labels: Vec<&'static str>,
    delay: Option<Duration>,
    fail: bool,
    panic: bool,
    empty_hover: bool,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    fn labels(labels: &[&'static str]) -> Self {
        Self {
            labels: labels.to_vec(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl SymbolProvider for ScriptedProvider {
    async fn completion_items(&self, _context: &CompletionContext) -> anyhow::Result<Vec<CompletionItem>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.panic {
            panic!("scripted provider panic");
        }
        if self.fail {
            anyhow::bail!("scripted provider failure");
        }
        Ok(self
            .labels
            .iter()
            .map(|label| CompletionItem {
                label: label.to_string(),
                ..Default::default()
            })
            .collect())
    }

    async fn hover(&self, context: &HoverContext) -> anyhow::Result<Option<Hover>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("scripted provider failure");
        }
        if self.empty_hover {
            return Ok(Some(EMPTY_HOVER.clone()));
        }
        Ok(Some(text_hover(context.identifier.clone(), context.range)))
    }

    async fn signature_help(&self, _context: &SignatureHelpContext) -> anyhow::Result<Option<SignatureHelp>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("scripted provider failure")
    }
}

fn scripted_settings(
    keyword: ScriptedProvider,
    library: ScriptedProvider,
    environment: ScriptedProvider,
    local: ScriptedProvider,
) -> AnalysisSettings {
    AnalysisSettings {
        pipeline: Settings::default(),
        providers: ProviderSet {
            keyword: Some(Arc::new(keyword)),
            library: Some(Arc::new(library)),
            environment: Some(Arc::new(environment)),
            local_document: Some(Arc::new(local)),
        },
    }
}

fn labels(items: &[CompletionItem]) -> Vec<&str> {
    items.iter().map(|item| item.label.as_str()).collect()
}

#[tokio::test]
async fn test_completion_merge_order_is_fixed() {
    let cache = PipelineCache::default();
    let slow_keyword = ScriptedProvider {
        labels: vec!["k"],
        delay: Some(Duration::from_millis(30)),
        ..Default::default()
    };
    let settings = scripted_settings(
        slow_keyword,
        ScriptedProvider::labels(&["l1", "l2"]),
        ScriptedProvider::labels(&["e"]),
        ScriptedProvider::labels(&["x"]),
    );
    let session = AnalysisSession::new(doc("a"), Position::new(0, 1), &cache, settings);
    let items = session.completion_items().await;
    assert_eq!(labels(&items), vec!["k", "l1", "l2", "e", "x"]);
}

#[tokio::test]
async fn test_completion_isolates_failing_provider() {
    let cache = PipelineCache::default();
    let failing = ScriptedProvider {
        fail: true,
        ..Default::default()
    };
    let settings = scripted_settings(
        ScriptedProvider::labels(&["k"]),
        failing,
        ScriptedProvider::labels(&["e"]),
        ScriptedProvider::labels(&["x"]),
    );
    let session = AnalysisSession::new(doc("a"), Position::new(0, 1), &cache, settings);
    assert_eq!(labels(&session.completion_items().await), vec!["k", "e", "x"]);
}

#[tokio::test]
async fn test_completion_isolates_panicking_provider() {
    let cache = PipelineCache::default();
    let panicking = ScriptedProvider {
        panic: true,
        ..Default::default()
    };
    let settings = scripted_settings(
        ScriptedProvider::labels(&["k"]),
        ScriptedProvider::labels(&["l"]),
        panicking,
        ScriptedProvider::labels(&["x"]),
    );
    let session = AnalysisSession::new(doc("a"), Position::new(0, 1), &cache, settings);
    assert_eq!(labels(&session.completion_items().await), vec!["k", "l", "x"]);
}

#[tokio::test]
async fn test_empty_slots_answer_nothing() {
    let cache = PipelineCache::default();
    let session = AnalysisSession::new(doc("b"), Position::new(0, 1), &cache, AnalysisSettings::default());
    assert!(session.completion_items().await.is_empty());
    assert!(is_empty_hover(&session.hover().await));
    assert!(is_empty_signature_help(&session.signature_help().await));
}

#[tokio::test]
async fn test_local_scope_follows_keywords() {
    let cache = PipelineCache::default();
    let settings = AnalysisSettings::for_library(Arc::new(Library::default()));
    let text = "let abc = 1 in a";
    let session = AnalysisSession::new(doc(text), Position::new(0, 16), &cache, settings);
    let items = session.completion_items().await;
    assert_eq!(labels(&items), vec!["and", "abc"]);
}

#[tokio::test]
async fn test_completion_without_token_offers_all_keywords() {
    let cache = PipelineCache::default();
    let settings = AnalysisSettings {
        pipeline: Settings::default(),
        providers: ProviderSet {
            keyword: Some(Arc::new(KeywordProvider)),
            ..Default::default()
        },
    };
    let session = AnalysisSession::new(doc("1 +  "), Position::new(0, 5), &cache, settings);
    let items = session.completion_items().await;
    assert_eq!(items.len(), qls_core::token::KEYWORDS.len());
}

#[tokio::test]
async fn test_hover_without_identifier_skips_providers() {
    let cache = PipelineCache::default();
    let library = Arc::new(ScriptedProvider::default());
    let settings = AnalysisSettings {
        pipeline: Settings::default(),
        providers: ProviderSet {
            library: Some(library.clone()),
            ..Default::default()
        },
    };
    let session = AnalysisSession::new(doc("1 + 2"), Position::new(0, 0), &cache, settings.clone());
    assert_eq!(session.hover().await, *EMPTY_HOVER);
    assert_eq!(library.calls.load(Ordering::SeqCst), 0);

    let session = AnalysisSession::new(doc("1 + abc"), Position::new(0, 5), &cache, settings);
    let hover = session.hover().await;
    assert!(!is_empty_hover(&hover));
    assert_eq!(library.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_hover_provider_failure_is_empty() {
    let cache = PipelineCache::default();
    let settings = scripted_settings(
        ScriptedProvider::default(),
        ScriptedProvider {
            fail: true,
            ..Default::default()
        },
        ScriptedProvider::default(),
        ScriptedProvider::default(),
    );
    let session = AnalysisSession::new(doc("abc"), Position::new(0, 1), &cache, settings);
    assert_eq!(session.hover().await, *EMPTY_HOVER);
}

#[tokio::test]
async fn test_hover_empty_answer_is_not_an_answer() {
    let cache = PipelineCache::default();
    let library = Arc::new(ScriptedProvider {
        empty_hover: true,
        ..Default::default()
    });
    let settings = AnalysisSettings {
        pipeline: Settings::default(),
        providers: ProviderSet {
            library: Some(library.clone()),
            ..Default::default()
        },
    };
    let session = AnalysisSession::new(doc("abc"), Position::new(0, 1), &cache, settings);
    let hover = session.hover().await;
    assert!(is_empty_hover(&hover));
    assert_eq!(hover, *EMPTY_HOVER);
    assert_eq!(library.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_deeply_nested_document_answers_empty() {
    let cache = PipelineCache::default();
    let settings = scripted_settings(
        ScriptedProvider::labels(&["k"]),
        ScriptedProvider::default(),
        ScriptedProvider::default(),
        ScriptedProvider::default(),
    );

    for text in ["(".repeat(10_000), "f(".repeat(10_000)] {
        let document = doc(&text);
        let end = Position::new(0, text.len() as u32);

        let session = AnalysisSession::new(document.clone(), end, &cache, settings.clone());
        assert_eq!(session.signature_help().await, *EMPTY_SIGNATURE_HELP);
        assert_eq!(session.hover().await, *EMPTY_HOVER);
        assert_eq!(labels(&session.completion_items().await), vec!["k"]);

        let err = cache.parse_result(&document, &settings.pipeline).unwrap_err();
        assert_eq!(err.stage, Stage::Parser);
        assert!(err.to_string().contains("nested too deeply"));
    }
}

#[tokio::test]
async fn test_signature_help_failure_paths() {
    let cache = PipelineCache::default();
    let settings = scripted_settings(
        ScriptedProvider::default(),
        ScriptedProvider::default(),
        ScriptedProvider::default(),
        ScriptedProvider::default(),
    );

    // Provider error
    let session = AnalysisSession::new(doc("f("), Position::new(0, 2), &cache, settings.clone());
    assert_eq!(session.signature_help().await, *EMPTY_SIGNATURE_HELP);

    // Parse failure
    let session = AnalysisSession::new(doc("f( 1 2"), Position::new(0, 2), &cache, settings.clone());
    assert_eq!(session.signature_help().await, *EMPTY_SIGNATURE_HELP);

    // Callee is not a name
    let session = AnalysisSession::new(doc("(f)("), Position::new(0, 4), &cache, settings);
    assert_eq!(session.signature_help().await, *EMPTY_SIGNATURE_HELP);
}

#[test]
fn test_library_type_resolver() {
    use qls_core::typ::ExternalTypeRequest;

    let library = Arc::new(Library::new([
        LibraryDefinition::constant("Test.Number", TypeKind::Number),
        LibraryDefinition::function(
            "Test.Upper",
            vec![Parameter::required("t", TypeKind::Text)],
            TypeKind::Text,
        ),
    ]));
    let resolve = library.type_resolver();

    let value = |name: &str| ExternalTypeRequest::Value {
        identifier: name.to_string(),
    };
    let call = |name: &str| ExternalTypeRequest::Invocation {
        identifier: name.to_string(),
        arguments: vec![TypeKind::Text],
    };
    assert_eq!(resolve(&value("Test.Number")), Some(TypeKind::Number));
    assert_eq!(resolve(&value("Test.Upper")), Some(TypeKind::Function));
    assert_eq!(resolve(&call("Test.Upper")), Some(TypeKind::Text));
    assert_eq!(resolve(&call("Test.Number")), None);
    assert_eq!(resolve(&value("Nope")), None);
}

#[test]
fn test_library_display_strings() {
    let function = LibraryDefinition::function(
        "Text.Pad",
        vec![
            Parameter::required("text", TypeKind::Text),
            Parameter {
                name: "fill".to_string(),
                ty: TypeKind::Text,
                nullable: true,
                optional: true,
            },
        ],
        TypeKind::Text,
    );
    assert_eq!(
        function.hover_text(),
        "[library function] Text.Pad: (text: text, optional fill: nullable text) => text"
    );
    assert_eq!(
        function.signature_label().as_deref(),
        Some("Text.Pad(text: text, optional fill: nullable text)")
    );
    assert_eq!(LibraryDefinition::constant("X", TypeKind::Logical).signature_label(), None);
}

#[test]
fn test_library_later_definition_replaces() {
    let library = Library::new([
        LibraryDefinition::constant("A", TypeKind::Number),
        LibraryDefinition::constant("B", TypeKind::Number),
        LibraryDefinition::constant("A", TypeKind::Text),
    ]);
    assert_eq!(library.len(), 2);
    let names: Vec<&str> = library.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["A", "B"]);
    assert_eq!(library.get("A").map(|d| &d.kind), Some(&DefinitionKind::Constant { ty: TypeKind::Text }));
}

#[tokio::test]
async fn test_signature_help_without_parameters() {
    let provider = LibraryProvider::new(Arc::new(Library::new([LibraryDefinition::function(
        "Now",
        Vec::new(),
        TypeKind::Number,
    )])));
    let help = provider
        .signature_help(&SignatureHelpContext {
            function_name: "Now".to_string(),
            argument_ordinal: 0,
            num_arguments: 0,
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(help.active_signature, Some(0));
    assert_eq!(help.active_parameter, None);
    assert_eq!(help.signatures[0].label, "Now()");
}

#[tokio::test]
async fn test_environment_provider() {
    let provider = EnvironmentProvider::new(vec![
        EnvironmentSymbol::new("Env.User", TypeKind::Text),
        EnvironmentSymbol::new("Env.Count", TypeKind::Number),
        EnvironmentSymbol::new("Other", TypeKind::Any),
    ]);
    let context = CompletionContext {
        text: Some("Env.".to_string()),
        kind: Some(TokenKind::Identifier),
        range: None,
    };
    let items = provider.completion_items(&context).await.unwrap();
    assert_eq!(labels(&items), vec!["Env.User", "Env.Count"]);

    let range = Range::default();
    let hover = provider
        .hover(&HoverContext {
            identifier: "Env.Count".to_string(),
            range,
        })
        .await
        .unwrap();
    assert_eq!(hover, Some(text_hover("[environment] Env.Count: number".to_string(), range)));
}
