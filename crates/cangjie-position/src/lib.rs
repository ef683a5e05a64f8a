//! Line index and position conversion.
//!
//! The wire protocol speaks 0-based `(line, character)` in UTF-16 code
//! units; the server core speaks 1-based lines and 1-based UTF-8 byte
//! columns. Every boundary crossing goes through this crate so the
//! conversion rules live in exactly one place.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod line_index;
mod wire;

pub use line_index::LineIndex;
pub use wire::{WirePosition, WireRange, from_wire, to_wire};
