use ropey::Rope;
use tower_lsp::lsp_types::{Position, TextDocumentContentChangeEvent};

/// Rope char index of an LSP (UTF-16) position, clamped to the line's text.
pub(crate) fn position_to_char_idx(rope: &Rope, position: Position) -> usize {
    let line_idx = position.line as usize;
    if line_idx >= rope.len_lines() {
        return rope.len_chars();
    }

    let line = rope.line(line_idx);
    let mut line_chars = line.len_chars();
    for ending in ['\n', '\r'] {
        if line_chars > 0 && line.char(line_chars - 1) == ending {
            line_chars -= 1;
        }
    }
    let line_cu = line.char_to_utf16_cu(line_chars);
    let line_start_cu = rope.char_to_utf16_cu(rope.line_to_char(line_idx));
    rope.utf16_cu_to_char(line_start_cu + (position.character as usize).min(line_cu))
}

fn apply_change(rope: &mut Rope, change: TextDocumentContentChangeEvent) {
    let Some(range) = change.range else {
        *rope = Rope::from_str(&change.text);
        return;
    };
    let start = position_to_char_idx(rope, range.start);
    let end = position_to_char_idx(rope, range.end);
    let (start, end) = (start.min(end), start.max(end));
    if start != end {
        rope.remove(start..end);
    }
    if !change.text.is_empty() {
        rope.insert(start, &change.text);
    }
}

/// Apply `didChange` events in order; a change without a range replaces
/// the whole buffer.
pub(crate) fn apply_changes(rope: &mut Rope, changes: Vec<TextDocumentContentChangeEvent>) {
    for change in changes {
        apply_change(rope, change);
    }
}
