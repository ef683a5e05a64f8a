//! Lexer tokens.

use crate::pos::{Position, Range};
use serde::{Deserialize, Serialize};

/// Token classification produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    /// Identifiers and keywords that resolve to declarations.
    Identifier,
    /// A reserved word (`func`, `var`, `let`, `const`, `class`, ...).
    Keyword,
    /// Integer, float, boolean, rune or string literal.
    Literal,
    /// The body of an interpolated string.
    StringInterpolation,
    /// Operators and punctuation.
    Punctuation,
    /// `//` and `/* */` comments.
    Comment,
    /// Line break token kept so column math can skip it.
    Newline,
    /// End of input.
    End,
}

/// One lexed token with its source extent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Classification.
    pub kind: TokenKind,
    /// Verbatim token text.
    pub value: String,
    /// Start position (1-based).
    pub begin: Position,
    /// End position, one past the last character on the same line.
    pub end: Position,
}

impl Token {
    /// Create a token.
    pub fn new(kind: TokenKind, value: impl Into<String>, begin: Position, end: Position) -> Self {
        Self { kind, value: value.into(), begin, end }
    }

    /// The token's extent as a [`Range`].
    pub fn range(&self) -> Range {
        Range::new(self.begin, self.end)
    }

    /// True when `pos` falls on this token.
    pub fn covers(&self, pos: Position) -> bool {
        self.begin.line == pos.line && self.begin.column <= pos.column && pos.column <= self.end.column
    }

    /// True for tokens navigation must ignore (comments, newlines, EOF).
    pub fn is_trivia(&self) -> bool {
        matches!(self.kind, TokenKind::Comment | TokenKind::Newline | TokenKind::End)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covers_is_line_local() {
        let tok = Token::new(
            TokenKind::Identifier,
            "add",
            Position::new(1, 1, 6),
            Position::new(1, 1, 9),
        );
        assert!(tok.covers(Position::new(1, 1, 6)));
        assert!(tok.covers(Position::new(1, 1, 9)));
        assert!(!tok.covers(Position::new(1, 2, 7)));
    }
}
