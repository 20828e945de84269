use qls_core::token::{LexerLine, LexerState, TokenKind};
use tower_lsp::lsp_types::{Position, Range};

use super::utils::line_range;

/// The lexical token a request is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveToken {
    pub kind: TokenKind,
    pub text: String,
    pub range: Range,
}

/// Token under or touching the cursor.
///
/// Spans are matched inclusively on both ends so a cursor sitting right
/// after a word still resolves to it. When nothing matches and the cursor
/// follows a `.` glued to an identifier (`Test.|`), an identifier token with
/// the trailing dot is synthesized.
pub fn token_at(state: &LexerState, position: Position) -> Option<ActiveToken> {
    let line = state.line(position.line)?;
    let cursor = position.character;

    if let Some(token) = line.tokens.iter().find(|t| t.start <= cursor && cursor <= t.end) {
        return Some(ActiveToken {
            kind: token.kind,
            text: token.text.clone(),
            range: line_range(position.line, token.start, token.end),
        });
    }

    if cursor == 0 || char_before(line, cursor) != Some('.') {
        return None;
    }
    let dot = cursor - 1;
    let ident = line
        .tokens
        .iter()
        .find(|t| t.end == dot && t.kind == TokenKind::Identifier)?;
    Some(ActiveToken {
        kind: TokenKind::Identifier,
        text: format!("{}.", ident.text),
        range: line_range(position.line, ident.start, cursor),
    })
}

/// Like [`token_at`] but only identifiers qualify.
pub fn identifier_at(state: &LexerState, position: Position) -> Option<ActiveToken> {
    token_at(state, position).filter(|token| token.kind == TokenKind::Identifier)
}

/// Character ending exactly at UTF-16 column `column`.
fn char_before(line: &LexerLine, column: u32) -> Option<char> {
    let mut offset = 0u32;
    for ch in line.text.chars() {
        offset += ch.len_utf16() as u32;
        if offset == column {
            return Some(ch);
        }
        if offset > column {
            break;
        }
    }
    None
}
