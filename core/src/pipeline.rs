//! The four stage functions, each a pure transformation of the previous
//! stage's output into a tagged success or failure.

use tracing::trace;

use crate::{
    ast::{ParseResult, Parser},
    inspect::{self, Inspection},
    settings::Settings,
    token::{CommonError, LexError, Lexer, LexerSnapshot, LexerState, ParseError, Position},
};

pub fn try_lex(text: &str, settings: &Settings) -> Result<LexerState, LexError> {
    trace!(locale = %settings.locale, len = text.len(), "lex");
    Lexer::lex(text, &settings.locale)
}

pub fn try_snapshot(state: &LexerState) -> Result<LexerSnapshot, LexError> {
    LexerSnapshot::try_from_state(state)
}

pub fn try_parse(settings: &Settings, snapshot: &LexerSnapshot) -> Result<ParseResult, ParseError> {
    trace!(locale = %settings.locale, tokens = snapshot.tokens.len(), "parse");
    Parser::parse(snapshot)
}

pub fn try_inspect(settings: &Settings, parse: &ParseResult, position: Position) -> Result<Inspection, CommonError> {
    inspect::inspect(settings, parse, position)
}
