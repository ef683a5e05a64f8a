//! Cross-project symbol index and on-disk cache shards.
//!
//! Three layers stack here:
//!
//! 1. record types keyed by a 64-bit [`SymbolId`] ([`Symbol`], [`Ref`],
//!    [`Relation`], [`ExtendItem`]);
//! 2. the in-memory [`MemIndex`]: per-package slabs merged into keyed
//!    collections behind reader/writer locks, answering the lookups every
//!    feature handler needs;
//! 3. the [`CacheManager`]: content-addressed shard files under
//!    `.cache/astdata` and `.cache/index`, named `<pkg>.<digest>.<ext>`,
//!    verified on load and atomically replaced on store.
//!
//! A missing or corrupt shard never fails a query — it yields the empty
//! answer and the owning package is rebuilt.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod mem_index;
mod shard;
mod symbol;

pub use cache::{CacheManager, IndexError};
pub use mem_index::{CompletionCandidate, MemIndex};
pub use shard::{IndexShard, decode_shard, encode_shard, AST_MAGIC, IDX_MAGIC};
pub use symbol::{
    ExtendItem, Modifier, Ref, RefKind, Relation, RelationKind, Symbol, SymbolId, SymbolLocation,
};
