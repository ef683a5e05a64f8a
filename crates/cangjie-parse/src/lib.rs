//! Frontend interface and reference parser.
//!
//! The project model consumes the language through the [`Frontend`] trait:
//! `parse` turns one source file into an arena AST and `typecheck` resolves
//! names and assigns types across the files of a package. The
//! [`ReferenceFrontend`] implements both for the supported language subset;
//! a production build can swap in bindings to the full compiler without
//! touching anything above this crate.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod frontend;
mod lexer;
mod parser;
mod sema;

pub use frontend::{Frontend, ParsedFile, ReferenceFrontend, SourceFile};
pub use lexer::lex;
pub use parser::parse_file;
pub use sema::{render_signature, typecheck_package};
