//! Source positions.
//!
//! Internally the server uses 1-based lines and 1-based UTF-8 columns plus a
//! synthetic `file_id`; the LSP façade converts to 0-based UTF-16 positions
//! at every boundary.

use serde::{Deserialize, Serialize};

/// A point in a source file: `(file_id, line, column)`, both 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Synthetic id of the file this position belongs to.
    pub file_id: u32,
    /// 1-based line.
    pub line: u32,
    /// 1-based UTF-8 column.
    pub column: u32,
}

/// The "no position" sentinel used by handlers that failed to resolve one.
pub const INVALID_POSITION: Position = Position { file_id: 0, line: 0, column: 0 };

impl Position {
    /// Create a position.
    pub fn new(file_id: u32, line: u32, column: u32) -> Self {
        Self { file_id, line, column }
    }

    /// True for the zero sentinel.
    pub fn is_zero(&self) -> bool {
        self.line == 0 && self.column == 0
    }
}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Position {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // file_id is intentionally not part of the ordering: comparisons are
        // only meaningful within one file.
        (self.line, self.column).cmp(&(other.line, other.column))
    }
}

/// A region of one file with inclusive endpoints, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Range {
    /// Inclusive start.
    pub start: Position,
    /// Inclusive end.
    pub end: Position,
}

impl Default for Position {
    fn default() -> Self {
        INVALID_POSITION
    }
}

impl Range {
    /// Create a range.
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// True when `pos` lies within the range.
    pub fn contains(&self, pos: Position) -> bool {
        self.start <= pos && pos <= self.end
    }

    /// True when the ranges share at least one position.
    pub fn overlaps(&self, other: &Range) -> bool {
        !(self.end < other.start || other.end < self.start)
    }

    /// True when `other` is fully inside `self`.
    pub fn encloses(&self, other: &Range) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(line: u32, column: u32) -> Position {
        Position::new(1, line, column)
    }

    #[test]
    fn position_ordering_ignores_file_id() {
        assert!(Position::new(1, 2, 3) < Position::new(9, 2, 4));
        assert!(p(1, 9) < p(2, 1));
    }

    #[test]
    fn range_contains_endpoints() {
        let r = Range::new(p(1, 5), p(1, 8));
        assert!(r.contains(p(1, 5)));
        assert!(r.contains(p(1, 8)));
        assert!(!r.contains(p(1, 9)));
    }

    #[test]
    fn range_overlap_and_enclose() {
        let outer = Range::new(p(1, 1), p(4, 1));
        let inner = Range::new(p(2, 1), p(3, 1));
        let apart = Range::new(p(5, 1), p(6, 1));
        assert!(outer.overlaps(&inner));
        assert!(outer.encloses(&inner));
        assert!(!inner.encloses(&outer));
        assert!(!outer.overlaps(&apart));
    }
}
