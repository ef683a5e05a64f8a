//! Project model and incremental compilation driver.
//!
//! [`CompilerProject`] is the hub everything else talks to: it maps files
//! to packages, packages to a dependency DAG, computes content digests,
//! drives (re)compilation in topological order, coordinates the on-disk
//! cache, and owns the live [`ArkAst`] snapshots handed to scheduler
//! tasks.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod ark_ast;
mod docs;
mod graph;
mod indexer;
mod project;

pub use ark_ast::{ArkAst, ParseInputs, SemanticId};
pub use docs::{DocCache, Document};
pub use graph::{FileChangeType, Package, PackageGraph};
pub use indexer::build_index_shard;
pub use project::{CompilerProject, ProjectError};
