use std::fmt;

/// Zero-based cursor location; `character` counts UTF-16 code units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }

    pub fn start() -> Self {
        Self { line: 0, character: 0 }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Displayed one-based, the way editors show it
        write!(f, "{}:{}", self.line + 1, self.character + 1)
    }
}

/// Half-open source range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    pub fn single(pos: Position) -> Self {
        Self { start: pos, end: pos }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn cover(&self, other: &Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start.line == self.end.line {
            write!(
                f,
                "{}:{}-{}",
                self.start.line + 1,
                self.start.character + 1,
                self.end.character + 1
            )
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// A problem confined to a single line. Lexing of that line stops at the
/// problem but the tokens before it are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineError {
    UnexpectedCharacter { character: u32, found: char },
    UnterminatedText { character: u32 },
}

impl fmt::Display for LineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineError::UnexpectedCharacter { character, found } => {
                write!(f, "unexpected character '{}' at column {}", found, character + 1)
            }
            LineError::UnterminatedText { character } => {
                write!(f, "text literal starting at column {} is not terminated", character + 1)
            }
        }
    }
}

/// Failure of the lexer or snapshot stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    ControlCharacter { line: u32, character: u32 },
    Line { line: u32, error: LineError },
    UnterminatedComment { start: Position },
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::ControlCharacter { line, character } => {
                write!(f, "control character at {}", Position::new(*line, *character))
            }
            LexError::Line { line, error } => write!(f, "line {}: {}", line + 1, error),
            LexError::UnterminatedComment { start } => {
                write!(f, "block comment opened at {} is not closed", start)
            }
        }
    }
}

impl std::error::Error for LexError {}

/// Parse error with position information
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub span: Option<Span>,
}

impl ParseError {
    pub fn new(message: String) -> Self {
        Self { message, span: None }
    }

    pub fn with_span(message: String, span: Span) -> Self {
        Self {
            message,
            span: Some(span),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(span) = &self.span {
            write!(f, "{} at {}", self.message, span)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ParseError {}

/// Failure of the inspection stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    InvalidPosition(Position),
}

impl fmt::Display for CommonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommonError::InvalidPosition(pos) => write!(f, "position {} is outside the document", pos),
        }
    }
}

impl std::error::Error for CommonError {}
