//! The frontend boundary.

use crate::parser::parse_file;
use crate::sema::typecheck_package;
use cangjie_ast::{Ast, Diagnostic, Token};

/// One source file as handed to the frontend.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Absolute path.
    pub path: String,
    /// Full text.
    pub text: String,
    /// Synthetic file id assigned by the project model.
    pub file_id: u32,
}

/// Parse output for one file: the AST, the raw token stream and the
/// diagnostics collected while producing them.
#[derive(Debug, Clone, Default)]
pub struct ParsedFile {
    /// File id this output belongs to.
    pub file_id: u32,
    /// Absolute path of the parsed file.
    pub path: String,
    /// Arena AST (best-effort on syntax errors).
    pub ast: Ast,
    /// Token stream, including trivia.
    pub tokens: Vec<Token>,
    /// Parse diagnostics.
    pub diagnostics: Vec<Diagnostic>,
}

/// The compiler interface the project model drives.
///
/// `parse` is per-file and cheap; `typecheck` receives every parsed file of
/// one package and mutates them in place (resolution targets, types).
pub trait Frontend: Send + Sync {
    /// Parse one file.
    fn parse(&self, source: &SourceFile) -> ParsedFile;

    /// Resolve and type the files of one package; returns package-level
    /// diagnostics.
    fn typecheck(&self, files: &mut [ParsedFile]) -> Vec<Diagnostic>;
}

/// The in-tree frontend for the supported language subset.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceFrontend;

impl Frontend for ReferenceFrontend {
    fn parse(&self, source: &SourceFile) -> ParsedFile {
        let (ast, tokens, diagnostics) = parse_file(source.file_id, &source.path, &source.text);
        ParsedFile { file_id: source.file_id, path: source.path.clone(), ast, tokens, diagnostics }
    }

    fn typecheck(&self, files: &mut [ParsedFile]) -> Vec<Diagnostic> {
        typecheck_package(files)
    }
}
