use std::fmt;

use crate::token::{LexError, LineError, Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Identifier,       // Test.Number
    Keyword,          // let, in, if ...
    NumericLiteral,   // 1, 1.5, 2e10
    TextLiteral,      // "abc"
    NullLiteral,      // null
    LogicalLiteral,   // true, false
    LeftParen,        // (
    RightParen,       // )
    LeftBrace,        // {
    RightBrace,       // }
    LeftBracket,      // [
    RightBracket,     // ]
    Comma,            // ,
    Equal,            // =
    NotEqual,         // <>
    LessThan,         // <
    LessThanEqual,    // <=
    GreaterThan,      // >
    GreaterThanEqual, // >=
    Plus,             // +
    Minus,            // -
    Asterisk,         // *
    Division,         // /
    Ampersand,        // &
    FatArrow,         // =>
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Identifier => "identifier",
            TokenKind::Keyword => "keyword",
            TokenKind::NumericLiteral => "numeric literal",
            TokenKind::TextLiteral => "text literal",
            TokenKind::NullLiteral => "null",
            TokenKind::LogicalLiteral => "logical literal",
            TokenKind::LeftParen => "'('",
            TokenKind::RightParen => "')'",
            TokenKind::LeftBrace => "'{'",
            TokenKind::RightBrace => "'}'",
            TokenKind::LeftBracket => "'['",
            TokenKind::RightBracket => "']'",
            TokenKind::Comma => "','",
            TokenKind::Equal => "'='",
            TokenKind::NotEqual => "'<>'",
            TokenKind::LessThan => "'<'",
            TokenKind::LessThanEqual => "'<='",
            TokenKind::GreaterThan => "'>'",
            TokenKind::GreaterThanEqual => "'>='",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Asterisk => "'*'",
            TokenKind::Division => "'/'",
            TokenKind::Ampersand => "'&'",
            TokenKind::FatArrow => "'=>'",
        };
        f.write_str(name)
    }
}

/// Reserved words recognised by the lexer, in alphabetical order.
pub const KEYWORDS: &[&str] = &[
    "and", "else", "false", "if", "in", "let", "not", "null", "or", "then", "true",
];

/// A token within a single line. `start`/`end` are UTF-16 columns, `end` exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineToken {
    pub kind: TokenKind,
    pub text: String,
    pub start: u32,
    pub end: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineMode {
    #[default]
    Default,
    Comment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexerLine {
    pub text: String,
    pub tokens: Vec<LineToken>,
    pub mode_start: LineMode,
    pub mode_end: LineMode,
    pub error: Option<LineError>,
}

impl LexerLine {
    /// Length of the line in UTF-16 code units.
    pub fn len_utf16(&self) -> u32 {
        self.text.encode_utf16().count() as u32
    }
}

/// Output of the lexer stage: every line of the document with its tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexerState {
    pub locale: String,
    pub lines: Vec<LexerLine>,
    /// Where the block comment still open at end of text was started.
    pub open_comment: Option<Position>,
}

impl LexerState {
    pub fn line(&self, line: u32) -> Option<&LexerLine> {
        self.lines.get(line as usize)
    }
}

#[inline]
fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

#[inline]
fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

pub struct Lexer;

impl Lexer {
    pub fn lex(text: &str, locale: &str) -> Result<LexerState, LexError> {
        let mut lines = Vec::new();
        let mut mode = LineMode::Default;
        let mut open_comment = None;

        for (line_no, raw) in text.split('\n').enumerate() {
            let line_no = line_no as u32;
            let line_text = raw.strip_suffix('\r').unwrap_or(raw);

            let mut col = 0u32;
            for c in line_text.chars() {
                if c.is_control() && c != '\t' && c != '\r' {
                    return Err(LexError::ControlCharacter {
                        line: line_no,
                        character: col,
                    });
                }
                col += c.len_utf16() as u32;
            }

            let mut line_lexer = LineLexer::new(line_no, line_text, mode, open_comment);
            line_lexer.run();
            mode = line_lexer.mode;
            open_comment = line_lexer.open_comment;
            lines.push(LexerLine {
                text: line_text.to_string(),
                tokens: line_lexer.tokens,
                mode_start: line_lexer.mode_start,
                mode_end: mode,
                error: line_lexer.error,
            });
        }

        Ok(LexerState {
            locale: locale.to_string(),
            lines,
            open_comment: if mode == LineMode::Comment { open_comment } else { None },
        })
    }
}

struct LineLexer {
    line: u32,
    chars: Vec<char>,
    idx: usize,
    col: u32,
    mode_start: LineMode,
    mode: LineMode,
    open_comment: Option<Position>,
    tokens: Vec<LineToken>,
    error: Option<LineError>,
}

impl LineLexer {
    fn new(line: u32, text: &str, mode: LineMode, open_comment: Option<Position>) -> Self {
        Self {
            line,
            chars: text.chars().collect(),
            idx: 0,
            col: 0,
            mode_start: mode,
            mode,
            open_comment,
            tokens: Vec::new(),
            error: None,
        }
    }

    fn eof(&self) -> bool {
        self.idx >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.idx).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.idx + ahead).copied()
    }

    fn advance_char(&mut self) {
        if let Some(c) = self.peek() {
            self.col += c.len_utf16() as u32;
            self.idx += 1;
        }
    }

    fn push(&mut self, kind: TokenKind, start_idx: usize, start_col: u32) {
        let text: String = self.chars[start_idx..self.idx].iter().collect();
        self.tokens.push(LineToken {
            kind,
            text,
            start: start_col,
            end: self.col,
        });
    }

    fn run(&mut self) {
        while !self.eof() {
            if self.mode == LineMode::Comment {
                self.skip_block_comment_body();
                continue;
            }

            let c = match self.peek() {
                Some(c) => c,
                None => break,
            };
            if c.is_whitespace() {
                self.advance_char();
                continue;
            }
            if c == '/' && self.peek_at(1) == Some('/') {
                // Line comment: the rest of the line is ignored
                self.idx = self.chars.len();
                break;
            }
            if c == '/' && self.peek_at(1) == Some('*') {
                self.open_comment = Some(Position::new(self.line, self.col));
                self.advance_char();
                self.advance_char();
                self.mode = LineMode::Comment;
                continue;
            }

            let result = if is_ident_start(c) {
                self.lex_identifier();
                Ok(())
            } else if c.is_ascii_digit() {
                self.lex_number();
                Ok(())
            } else if c == '"' {
                self.lex_text()
            } else {
                self.lex_punctuation(c)
            };

            if let Err(err) = result {
                self.error = Some(err);
                break;
            }
        }
    }

    fn skip_block_comment_body(&mut self) {
        while !self.eof() {
            if self.peek() == Some('*') && self.peek_at(1) == Some('/') {
                self.advance_char();
                self.advance_char();
                self.mode = LineMode::Default;
                self.open_comment = None;
                return;
            }
            self.advance_char();
        }
    }

    fn lex_identifier(&mut self) {
        let start_idx = self.idx;
        let start_col = self.col;
        loop {
            while self.peek().is_some_and(is_ident_continue) {
                self.advance_char();
            }
            // A dot continues a generalized identifier only when another part follows
            if self.peek() == Some('.') && self.peek_at(1).is_some_and(is_ident_start) {
                self.advance_char();
                continue;
            }
            break;
        }

        let text: String = self.chars[start_idx..self.idx].iter().collect();
        let kind = match text.as_str() {
            "true" | "false" => TokenKind::LogicalLiteral,
            "null" => TokenKind::NullLiteral,
            kw if KEYWORDS.contains(&kw) => TokenKind::Keyword,
            _ => TokenKind::Identifier,
        };
        self.push(kind, start_idx, start_col);
    }

    fn lex_number(&mut self) {
        let start_idx = self.idx;
        let start_col = self.col;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance_char();
        }
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.advance_char();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance_char();
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let signed = matches!(self.peek_at(1), Some('+' | '-'));
            let digit_at = if signed { 2 } else { 1 };
            if self.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                for _ in 0..digit_at {
                    self.advance_char();
                }
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.advance_char();
                }
            }
        }
        self.push(TokenKind::NumericLiteral, start_idx, start_col);
    }

    fn lex_text(&mut self) -> Result<(), LineError> {
        let start_idx = self.idx;
        let start_col = self.col;
        self.advance_char(); // opening quote
        loop {
            match self.peek() {
                None => return Err(LineError::UnterminatedText { character: start_col }),
                Some('"') if self.peek_at(1) == Some('"') => {
                    // "" is an escaped quote
                    self.advance_char();
                    self.advance_char();
                }
                Some('"') => {
                    self.advance_char();
                    break;
                }
                Some(_) => self.advance_char(),
            }
        }
        self.push(TokenKind::TextLiteral, start_idx, start_col);
        Ok(())
    }

    fn lex_punctuation(&mut self, c: char) -> Result<(), LineError> {
        let start_idx = self.idx;
        let start_col = self.col;
        let next = self.peek_at(1);

        let (kind, width) = match (c, next) {
            ('<', Some('>')) => (TokenKind::NotEqual, 2),
            ('<', Some('=')) => (TokenKind::LessThanEqual, 2),
            ('>', Some('=')) => (TokenKind::GreaterThanEqual, 2),
            ('=', Some('>')) => (TokenKind::FatArrow, 2),
            ('(', _) => (TokenKind::LeftParen, 1),
            (')', _) => (TokenKind::RightParen, 1),
            ('{', _) => (TokenKind::LeftBrace, 1),
            ('}', _) => (TokenKind::RightBrace, 1),
            ('[', _) => (TokenKind::LeftBracket, 1),
            (']', _) => (TokenKind::RightBracket, 1),
            (',', _) => (TokenKind::Comma, 1),
            ('=', _) => (TokenKind::Equal, 1),
            ('<', _) => (TokenKind::LessThan, 1),
            ('>', _) => (TokenKind::GreaterThan, 1),
            ('+', _) => (TokenKind::Plus, 1),
            ('-', _) => (TokenKind::Minus, 1),
            ('*', _) => (TokenKind::Asterisk, 1),
            ('/', _) => (TokenKind::Division, 1),
            ('&', _) => (TokenKind::Ampersand, 1),
            _ => {
                return Err(LineError::UnexpectedCharacter {
                    character: start_col,
                    found: c,
                });
            }
        };

        for _ in 0..width {
            self.advance_char();
        }
        self.push(kind, start_idx, start_col);
        Ok(())
    }
}
