//! Text edits and their application.

use cangjie_ast::Range;
use cangjie_position::LineIndex;
use serde::{Deserialize, Serialize};

/// One replacement. The range end is exclusive (an insertion has
/// `start == end`); lines and columns are the internal 1-based form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEdit {
    /// Replaced extent, end-exclusive.
    pub range: Range,
    /// Replacement text.
    pub new_text: String,
}

impl TextEdit {
    /// An insertion at `range.start`.
    pub fn insert(at: cangjie_ast::Position, text: impl Into<String>) -> Self {
        Self { range: Range::new(at, at), new_text: text.into() }
    }

    /// A replacement.
    pub fn replace(range: Range, text: impl Into<String>) -> Self {
        Self { range, new_text: text.into() }
    }
}

/// Apply `edits` to `text`. Edits must not overlap; they are applied last
/// to first so earlier offsets stay valid.
pub fn apply_text_edits(text: &str, edits: &[TextEdit]) -> String {
    let index = LineIndex::new(text.to_string());
    let mut offset_edits: Vec<(usize, usize, &str)> = edits
        .iter()
        .filter_map(|edit| {
            let start = index.offset(edit.range.start.line, edit.range.start.column)?;
            let end = index.offset(edit.range.end.line, edit.range.end.column)?;
            Some((start, end.max(start), edit.new_text.as_str()))
        })
        .collect();
    offset_edits.sort_by_key(|(start, end, _)| (*start, *end));
    let mut out = text.to_string();
    for (start, end, new_text) in offset_edits.into_iter().rev() {
        out.replace_range(start..end, new_text);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use cangjie_ast::Position;
    use pretty_assertions::assert_eq;

    fn range(l1: u32, c1: u32, l2: u32, c2: u32) -> Range {
        Range::new(Position::new(1, l1, c1), Position::new(1, l2, c2))
    }

    #[test]
    fn replace_and_insert_compose() {
        let text = "var x = 1 + 2";
        let edits = vec![
            TextEdit::insert(Position::new(1, 1, 1), "const y = 2\n"),
            TextEdit::replace(range(1, 13, 1, 14), "y"),
        ];
        assert_eq!(apply_text_edits(text, &edits), "const y = 2\nvar x = 1 + y");
    }

    #[test]
    fn edits_apply_in_reverse_offset_order() {
        let text = "a b c";
        let edits = vec![
            TextEdit::replace(range(1, 1, 1, 2), "x"),
            TextEdit::replace(range(1, 5, 1, 6), "z"),
        ];
        assert_eq!(apply_text_edits(text, &edits), "x b z");
    }
}
