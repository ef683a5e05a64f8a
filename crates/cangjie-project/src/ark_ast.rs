//! The per-file compilation snapshot.

use cangjie_ast::{Ast, Diagnostic, Position, Token, TokenKind};
use std::sync::Arc;

/// Inputs for one scheduler update.
#[derive(Debug, Clone, Default)]
pub struct ParseInputs {
    /// Absolute file path.
    pub file_name: String,
    /// Full buffer contents.
    pub contents: String,
    /// Monotonic editor version.
    pub version: i64,
    /// Force a rebuild even when the digest is unchanged.
    pub force_rebuild: bool,
}

impl ParseInputs {
    /// Create update inputs.
    pub fn new(file_name: impl Into<String>, contents: impl Into<String>, version: i64) -> Self {
        Self {
            file_name: file_name.into(),
            contents: contents.into(),
            version,
            force_rebuild: false,
        }
    }
}

/// Identifies one semantic build generation of a file.
///
/// Parse-only snapshots point at the last good semantic snapshot through
/// this id rather than a raw pointer; readers resolve it through the
/// project and must handle `None` (no semantic build yet).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SemanticId(pub u64);

/// One file's compiler output, as handed to scheduler tasks.
///
/// Two views exist per file: the cheap parse-only view (whose `sema_cache`
/// names the last semantic generation) and the semantic view produced by a
/// full package typecheck.
#[derive(Debug, Clone)]
pub struct ArkAst {
    /// Synthetic file id.
    pub file_id: u32,
    /// Absolute path.
    pub path: String,
    /// Editor version this snapshot was built from.
    pub version: i64,
    /// Token stream including trivia.
    pub tokens: Vec<Token>,
    /// The arena; empty when compilation failed before parsing.
    pub ast: Arc<Ast>,
    /// Owning package name.
    pub package: String,
    /// Last good semantic generation, when one exists.
    pub sema_cache: Option<SemanticId>,
    /// Diagnostics from parse and typecheck.
    pub diagnostics: Vec<Diagnostic>,
}

impl ArkAst {
    /// True when no usable tree exists (the `file == nullptr` case);
    /// handlers reply "no result" instead of crashing.
    pub fn is_empty(&self) -> bool {
        self.ast.root().is_none()
    }

    /// Index of the non-trivia token covering `pos`.
    pub fn token_at(&self, pos: Position) -> Option<usize> {
        self.tokens
            .iter()
            .position(|t| !t.is_trivia() && t.covers(pos))
    }

    /// The identifier token covering `pos`, if any.
    pub fn identifier_at(&self, pos: Position) -> Option<&Token> {
        let idx = self.token_at(pos)?;
        let token = &self.tokens[idx];
        (token.kind == TokenKind::Identifier).then_some(token)
    }
}
