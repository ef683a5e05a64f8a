//! Per-file worker scheduler.
//!
//! One [`ArkScheduler`] owns one worker thread per tracked file. Within a
//! worker the queue is FIFO; across workers execution is parallel. The
//! server runs three independent instances side by side (general requests,
//! completion, signature help), so a file may have up to three workers at
//! once.
//!
//! Ordering guarantees: tasks for one file on one scheduler observe FIFO
//! effects, and an update is ordered before every task enqueued after it —
//! a `run_with_ast` always sees the preceding update applied. Across files
//! or schedulers nothing is promised.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cancel;
mod scheduler;

pub use cancel::CancellationToken;
pub use scheduler::{ArkScheduler, DiagnosticsSink, InputsAndAst, NeedDiagnostics, TaskError};
