//! Wire (LSP) position conversion.
//!
//! Wire positions are 0-based `(line, character)` with `character` counted
//! in UTF-16 code units, per LSP 3.16. Internal positions are 1-based
//! lines and 1-based UTF-8 byte columns.

use crate::line_index::LineIndex;
use serde::{Deserialize, Serialize};

/// 0-based LSP position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WirePosition {
    /// 0-based line.
    pub line: u32,
    /// 0-based UTF-16 code unit offset on the line.
    pub character: u32,
}

/// 0-based LSP range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WireRange {
    /// Start position.
    pub start: WirePosition,
    /// End position.
    pub end: WirePosition,
}

/// Convert an internal 1-based `(line, column)` to a wire position.
///
/// Columns past the end of the line clamp to the line's UTF-16 length; a
/// line past end of file clamps to the last line.
pub fn to_wire(index: &LineIndex, line: u32, column: u32) -> WirePosition {
    let line = line.max(1).min(index.line_count() as u32);
    let text = index.line_text(line).unwrap_or("");
    let byte_col = ((column.max(1) - 1) as usize).min(text.len());
    // Walk to the nearest char boundary at or before the byte column, then
    // count UTF-16 units up to it.
    let mut boundary = byte_col;
    while boundary > 0 && !text.is_char_boundary(boundary) {
        boundary -= 1;
    }
    let character = text[..boundary].chars().map(char::len_utf16).sum::<usize>() as u32;
    WirePosition { line: line - 1, character }
}

/// Convert a wire position to internal 1-based `(line, column)`.
///
/// Characters that land inside a surrogate pair snap to the start of the
/// character; anything past the line end clamps to one past the last byte.
pub fn from_wire(index: &LineIndex, pos: WirePosition) -> (u32, u32) {
    let line = pos.line + 1;
    let Some(text) = index.line_text(line) else {
        // Past end of file: clamp to the end of the last line.
        let last = index.line_count() as u32;
        let len = index.line_text(last).map_or(0, str::len);
        return (last, len as u32 + 1);
    };
    let mut units = 0u32;
    for (byte, ch) in text.char_indices() {
        if units >= pos.character {
            return (line, byte as u32 + 1);
        }
        units += ch.len_utf16() as u32;
    }
    (line, text.len() as u32 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ascii_round_trip() {
        let idx = LineIndex::new("func add(a: Int)\n".to_string());
        let wire = to_wire(&idx, 1, 6);
        assert_eq!(wire, WirePosition { line: 0, character: 5 });
        assert_eq!(from_wire(&idx, wire), (1, 6));
    }

    #[test]
    fn utf16_counts_surrogate_pairs() {
        // '𝕏' is 4 UTF-8 bytes and 2 UTF-16 units.
        let idx = LineIndex::new("𝕏ab\n".to_string());
        let wire = to_wire(&idx, 1, 5); // byte column after the symbol
        assert_eq!(wire.character, 2);
        assert_eq!(from_wire(&idx, WirePosition { line: 0, character: 2 }), (1, 5));
    }

    #[test]
    fn past_end_of_file_clamps() {
        let idx = LineIndex::new("ab".to_string());
        let (line, col) = from_wire(&idx, WirePosition { line: 9, character: 9 });
        assert_eq!((line, col), (1, 3));
    }

    #[test]
    fn past_end_of_line_clamps() {
        let idx = LineIndex::new("ab\ncd\n".to_string());
        let wire = to_wire(&idx, 1, 99);
        assert_eq!(wire, WirePosition { line: 0, character: 2 });
    }
}
