use crate::token::{LexError, LexerState, Position, Span, TokenKind};

/// A token positioned in the whole document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotToken {
    pub kind: TokenKind,
    pub text: String,
    pub span: Span,
}

/// Flattened, error-free view of a [`LexerState`], the input of the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexerSnapshot {
    pub tokens: Vec<SnapshotToken>,
    /// UTF-16 length of every line, used to validate cursor positions.
    pub line_lengths: Vec<u32>,
}

impl LexerSnapshot {
    pub fn try_from_state(state: &LexerState) -> Result<Self, LexError> {
        if let Some((line_no, line)) = state
            .lines
            .iter()
            .enumerate()
            .find(|(_, line)| line.error.is_some())
        {
            if let Some(error) = &line.error {
                return Err(LexError::Line {
                    line: line_no as u32,
                    error: error.clone(),
                });
            }
        }
        if let Some(start) = state.open_comment {
            return Err(LexError::UnterminatedComment { start });
        }

        let mut tokens = Vec::new();
        let mut line_lengths = Vec::with_capacity(state.lines.len());
        for (line_no, line) in state.lines.iter().enumerate() {
            let line_no = line_no as u32;
            line_lengths.push(line.len_utf16());
            tokens.extend(line.tokens.iter().map(|t| SnapshotToken {
                kind: t.kind,
                text: t.text.clone(),
                span: Span::new(Position::new(line_no, t.start), Position::new(line_no, t.end)),
            }));
        }

        Ok(Self { tokens, line_lengths })
    }

    /// Position just past the last character of the document.
    pub fn end_position(&self) -> Position {
        let last = self.line_lengths.len().saturating_sub(1);
        Position::new(last as u32, self.line_lengths.last().copied().unwrap_or(0))
    }
}
