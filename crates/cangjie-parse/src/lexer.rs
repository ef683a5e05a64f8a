//! The lexer.
//!
//! Produces the flat token stream the AST, the scheduler's token queries
//! and the refactorings all share. Columns are 1-based byte columns; every
//! line break emits a `Newline` token so downstream consumers can reason
//! about line boundaries without re-scanning text.

use cangjie_ast::{Position, Token, TokenKind};
use once_cell::sync::Lazy;
use std::collections::HashSet;

static KEYWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "package", "import", "func", "main", "var", "let", "const", "class", "interface",
        "struct", "enum", "extend", "if", "else", "while", "do", "for", "in", "match", "case",
        "try", "catch", "finally", "return", "break", "continue", "true", "false", "static",
        "mut", "open", "init", "this", "super", "is", "as", "spawn", "unsafe", "where",
    ]
    .into_iter()
    .collect()
});

/// True for reserved words.
pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(word)
}

/// Lex `text` belonging to `file_id` into tokens. Never fails: unknown
/// bytes become single-character punctuation tokens.
pub fn lex(file_id: u32, text: &str) -> Vec<Token> {
    Lexer { file_id, text, bytes: text.as_bytes(), pos: 0, line: 1, column: 1, tokens: Vec::new() }
        .run()
}

struct Lexer<'a> {
    file_id: u32,
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn run(mut self) -> Vec<Token> {
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            match b {
                b'\n' => self.newline(),
                b'\r' => {
                    // CRLF collapses into one newline token.
                    if self.peek(1) == Some(b'\n') {
                        self.advance(1);
                    }
                    self.newline();
                }
                b' ' | b'\t' => self.advance(1),
                b'/' if self.peek(1) == Some(b'/') => self.line_comment(),
                b'/' if self.peek(1) == Some(b'*') => self.block_comment(),
                b'"' => self.string_literal(),
                b'0'..=b'9' => self.number(),
                _ if b == b'_' || (b as char).is_ascii_alphabetic() || b >= 0x80 => self.word(),
                _ => self.punctuation(),
            }
        }
        let at = self.here();
        self.tokens.push(Token::new(TokenKind::End, "", at, at));
        self.tokens
    }

    fn here(&self) -> Position {
        Position::new(self.file_id, self.line, self.column)
    }

    fn peek(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    fn advance(&mut self, n: usize) {
        self.pos += n;
        self.column += n as u32;
    }

    fn newline(&mut self) {
        let begin = self.here();
        self.tokens.push(Token::new(TokenKind::Newline, "\n", begin, begin));
        self.pos += 1;
        self.line += 1;
        self.column = 1;
    }

    fn line_comment(&mut self) {
        let begin = self.here();
        let start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
            self.advance(1);
        }
        let end = Position::new(self.file_id, self.line, self.column.saturating_sub(1).max(1));
        self.tokens.push(Token::new(TokenKind::Comment, &self.text[start..self.pos], begin, end));
    }

    fn block_comment(&mut self) {
        let begin = self.here();
        let start = self.pos;
        self.advance(2);
        while self.pos < self.bytes.len() {
            if self.bytes[self.pos] == b'*' && self.peek(1) == Some(b'/') {
                self.advance(2);
                break;
            }
            if self.bytes[self.pos] == b'\n' {
                self.pos += 1;
                self.line += 1;
                self.column = 1;
            } else {
                self.advance(1);
            }
        }
        let end = Position::new(self.file_id, self.line, self.column.saturating_sub(1).max(1));
        self.tokens.push(Token::new(TokenKind::Comment, &self.text[start..self.pos], begin, end));
    }

    fn string_literal(&mut self) {
        let begin = self.here();
        let start = self.pos;
        let mut interpolated = false;
        self.advance(1);
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'"' => {
                    self.advance(1);
                    break;
                }
                b'\\' => self.advance(2.min(self.bytes.len() - self.pos)),
                b'$' if self.peek(1) == Some(b'{') => {
                    interpolated = true;
                    self.advance(1);
                }
                b'\n' => break, // unterminated, stop at line end
                _ => self.advance(1),
            }
        }
        let kind = if interpolated { TokenKind::StringInterpolation } else { TokenKind::Literal };
        let end = Position::new(self.file_id, self.line, self.column.saturating_sub(1).max(1));
        self.tokens.push(Token::new(kind, &self.text[start..self.pos], begin, end));
    }

    fn number(&mut self) {
        let begin = self.here();
        let start = self.pos;
        let mut seen_dot = false;
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'0'..=b'9' | b'_' => self.advance(1),
                // A dot only continues the literal if a digit follows:
                // `1..2` must lex as two literals around a range operator.
                b'.' if !seen_dot && matches!(self.peek(1), Some(b'0'..=b'9')) => {
                    seen_dot = true;
                    self.advance(1);
                }
                _ => break,
            }
        }
        let end = Position::new(self.file_id, self.line, self.column.saturating_sub(1).max(1));
        self.tokens.push(Token::new(TokenKind::Literal, &self.text[start..self.pos], begin, end));
    }

    fn word(&mut self) {
        let begin = self.here();
        let start = self.pos;
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            if b == b'_' || (b as char).is_ascii_alphanumeric() || b >= 0x80 {
                self.advance(1);
            } else {
                break;
            }
        }
        let word = &self.text[start..self.pos];
        let kind = if is_keyword(word) { TokenKind::Keyword } else { TokenKind::Identifier };
        let end = Position::new(self.file_id, self.line, self.column.saturating_sub(1).max(1));
        self.tokens.push(Token::new(kind, word, begin, end));
    }

    fn punctuation(&mut self) {
        let begin = self.here();
        let two: &[&str] = &[
            "==", "!=", "<=", ">=", "&&", "||", "+=", "-=", "*=", "/=", "%=", "..", "=>", "<:",
            "->",
        ];
        let start = self.pos;
        let rest = &self.text[self.pos..];
        let len = two.iter().find(|op| rest.starts_with(**op)).map_or(1, |op| op.len());
        self.advance(len);
        let end = Position::new(self.file_id, self.line, self.column.saturating_sub(1).max(1));
        self.tokens.push(Token::new(
            TokenKind::Punctuation,
            &self.text[start..start + len],
            begin,
            end,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(text: &str) -> Vec<(TokenKind, String)> {
        lex(1, text)
            .into_iter()
            .filter(|t| !t.is_trivia())
            .map(|t| (t.kind, t.value))
            .collect()
    }

    #[test]
    fn lexes_function_header() {
        let toks = kinds("func add(a: Int): Int");
        assert_eq!(toks[0], (TokenKind::Keyword, "func".to_string()));
        assert_eq!(toks[1], (TokenKind::Identifier, "add".to_string()));
        assert_eq!(toks[2], (TokenKind::Punctuation, "(".to_string()));
    }

    #[test]
    fn columns_are_one_based() {
        let toks = lex(1, "func add");
        assert_eq!(toks[0].begin.column, 1);
        assert_eq!(toks[0].end.column, 4);
        assert_eq!(toks[1].begin.column, 6);
        assert_eq!(toks[1].end.column, 8);
    }

    #[test]
    fn range_operator_splits_literals() {
        let toks = kinds("1..5");
        assert_eq!(toks[0].1, "1");
        assert_eq!(toks[1].1, "..");
        assert_eq!(toks[2].1, "5");
    }

    #[test]
    fn interpolated_string_is_marked() {
        let toks = kinds(r#""got ${x} items""#);
        assert_eq!(toks[0].0, TokenKind::StringInterpolation);
    }

    #[test]
    fn crlf_counts_one_line() {
        let toks = lex(1, "a\r\nb");
        let b = toks.iter().find(|t| t.value == "b");
        assert_eq!(b.map(|t| t.begin.line), Some(2));
    }

    #[test]
    fn compound_assign_is_single_token() {
        let toks = kinds("x += 1");
        assert_eq!(toks[1].1, "+=");
    }
}
