//! Arena-owned AST, tokens and positions for the Cangjie language server.
//!
//! Everything the scheduler, index and refactoring layers consume lives
//! here: 1-based [`Position`]s carrying a synthetic `file_id`, the lexer
//! [`Token`] stream, and the arena [`Ast`] addressed through [`NodeId`]
//! indices. Parent/child links are ids, never references, so snapshots can
//! be shared across worker threads without lifetime plumbing.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod arena;
mod diag;
mod node;
mod pos;
mod token;
mod walk;

pub use arena::{Ast, NodeId};
pub use diag::{Diagnostic, DiagnosticSeverity};
pub use node::{Node, NodeData, NodeFlags, NodeKind, Param};
pub use pos::{INVALID_POSITION, Position, Range};
pub use token::{Token, TokenKind};
pub use walk::{WalkAction, walk, walk_from};
