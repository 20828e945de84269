use qls_core::token::Position as CorePosition;
use tower_lsp::lsp_types::{Position, Range};

pub(crate) fn to_core_position(position: Position) -> CorePosition {
    CorePosition::new(position.line, position.character)
}

/// Range of `[start, end)` columns on one line.
pub(crate) fn line_range(line: u32, start: u32, end: u32) -> Range {
    Range::new(Position::new(line, start), Position::new(line, end))
}
