//! Shard framing and the index record bundle.
//!
//! A shard file is `magic ++ version ++ payload_len ++ md5(payload) ++
//! payload`. The checksum is mandatory: a file that fails any part of the
//! frame check is treated as absent and deleted by the cache layer.

use crate::symbol::{ExtendItem, Ref, Relation, Symbol, SymbolId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Magic for index shards (`.idx`).
pub const IDX_MAGIC: [u8; 4] = *b"CJIX";
/// Magic for AST shards (`.ast`).
pub const AST_MAGIC: [u8; 4] = *b"CJAS";

const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 8 + 16;

/// The four slabs of one package, as serialized into an `.idx` shard.
///
/// `BTreeMap` keeps the encoding deterministic so identical inputs produce
/// byte-identical shards (content-addressing relies on it).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexShard {
    /// Symbol slab.
    pub symbols: Vec<Symbol>,
    /// Per-symbol reference slab.
    pub refs: BTreeMap<SymbolId, Vec<Ref>>,
    /// Relation slab.
    pub relations: Vec<Relation>,
    /// Per-symbol extend slab.
    pub extends: BTreeMap<SymbolId, Vec<ExtendItem>>,
}

/// Frame `payload` into shard bytes.
pub fn encode_shard(magic: [u8; 4], payload: &[u8]) -> Vec<u8> {
    let digest = md5::compute(payload);
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&magic);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    out.extend_from_slice(&digest.0);
    out.extend_from_slice(payload);
    out
}

/// Unframe shard bytes, verifying magic, version, length and checksum.
/// Returns `None` on any mismatch.
pub fn decode_shard(magic: [u8; 4], bytes: &[u8]) -> Option<Vec<u8>> {
    if bytes.len() < HEADER_LEN {
        return None;
    }
    if bytes[0..4] != magic {
        return None;
    }
    let mut version = [0u8; 4];
    version.copy_from_slice(&bytes[4..8]);
    if u32::from_le_bytes(version) != FORMAT_VERSION {
        return None;
    }
    let mut len = [0u8; 8];
    len.copy_from_slice(&bytes[8..16]);
    let payload_len = u64::from_le_bytes(len) as usize;
    if bytes.len() != HEADER_LEN + payload_len {
        return None;
    }
    let payload = &bytes[HEADER_LEN..];
    let digest = md5::compute(payload);
    if digest.0 != bytes[16..32] {
        return None;
    }
    Some(payload.to_vec())
}

impl IndexShard {
    /// Serialize into framed `.idx` bytes.
    pub fn to_bytes(&self) -> Option<Vec<u8>> {
        let payload = bincode::serde::encode_to_vec(self, bincode::config::standard()).ok()?;
        Some(encode_shard(IDX_MAGIC, &payload))
    }

    /// Deserialize from framed `.idx` bytes, `None` when the verifier or
    /// the decoder rejects them.
    pub fn from_bytes(bytes: &[u8]) -> Option<IndexShard> {
        let payload = decode_shard(IDX_MAGIC, bytes)?;
        bincode::serde::decode_from_slice(&payload, bincode::config::standard())
            .ok()
            .map(|(shard, _)| shard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{RefKind, SymbolLocation};
    use cangjie_testkit::must_some;
    use pretty_assertions::assert_eq;

    fn sample() -> IndexShard {
        let mut shard = IndexShard::default();
        let id = SymbolId(42);
        shard.symbols.push(Symbol {
            id,
            name: "add".to_string(),
            scope: "demo.core".to_string(),
            signature: "func add(a: Int, b: Int): Int".to_string(),
            ..Symbol::default()
        });
        shard.refs.insert(
            id,
            vec![Ref {
                location: SymbolLocation::default(),
                kind: RefKind::Call,
                container: SymbolId::NONE,
                is_cjo_ref: false,
            }],
        );
        shard
    }

    #[test]
    fn round_trip() {
        let shard = sample();
        let bytes = must_some(shard.to_bytes());
        let back = must_some(IndexShard::from_bytes(&bytes));
        assert_eq!(shard, back);
    }

    #[test]
    fn encoding_is_deterministic() {
        let a = must_some(sample().to_bytes());
        let b = must_some(sample().to_bytes());
        assert_eq!(a, b);
    }

    #[test]
    fn corrupt_payload_is_rejected() {
        let mut bytes = must_some(sample().to_bytes());
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        assert!(IndexShard::from_bytes(&bytes).is_none());
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let mut bytes = must_some(sample().to_bytes());
        bytes[0] = b'X';
        assert!(IndexShard::from_bytes(&bytes).is_none());
    }

    #[test]
    fn truncated_file_is_rejected() {
        let bytes = must_some(sample().to_bytes());
        assert!(IndexShard::from_bytes(&bytes[..bytes.len() / 2]).is_none());
        assert!(IndexShard::from_bytes(&[]).is_none());
    }
}
