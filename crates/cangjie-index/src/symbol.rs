//! Index record types.

use cangjie_ast::{NodeKind, Position};
use serde::{Deserialize, Serialize};

/// 64-bit globally unique identifier of an indexed declaration.
///
/// Computed as the truncated md5 of `package::scope::name/kind`, so the
/// same declaration hashes to the same id across sessions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct SymbolId(pub u64);

impl SymbolId {
    /// The null id used for "no container".
    pub const NONE: SymbolId = SymbolId(0);

    /// Derive the stable id for a declaration.
    pub fn of(package: &str, scope: &str, name: &str, kind: NodeKind) -> SymbolId {
        let text = format!("{package}::{scope}::{name}/{kind:?}");
        let digest = md5::compute(text.as_bytes());
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&digest.0[..8]);
        let id = u64::from_le_bytes(raw);
        // Reserve 0 for NONE.
        SymbolId(if id == 0 { 1 } else { id })
    }

    /// True for the null id.
    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

/// A source extent with its file URI, as stored in shards.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SymbolLocation {
    /// Start position `(file_id, line, column)`.
    pub begin: Position,
    /// End position.
    pub end: Position,
    /// `file://` URI of the containing file.
    pub file_uri: String,
}

/// Visibility modifier recorded on symbols and extends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Modifier {
    /// Visible everywhere.
    #[default]
    Public,
    /// Visible inside the declaring package.
    Internal,
    /// Visible to subtypes.
    Protected,
    /// Visible inside the declaring type.
    Private,
}

/// One indexed declaration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Symbol {
    /// Stable id.
    pub id: SymbolId,
    /// Declared name.
    pub name: String,
    /// Enclosing scope path (`pkg` or `pkg::Type`).
    pub scope: String,
    /// Declaration kind.
    pub kind: Option<NodeKind>,
    /// Extent of the name token.
    pub location: SymbolLocation,
    /// Extent of the whole declaration.
    pub declaration: SymbolLocation,
    /// Macro-call extent when the symbol was produced by expansion.
    pub cur_macro_call: SymbolLocation,
    /// Rendered signature (`func add(a: Int, b: Int): Int`).
    pub signature: String,
    /// Rendered return type for callables.
    pub return_type: String,
    /// True for constructor parameters that double as members.
    pub is_member_param: bool,
    /// Visibility.
    pub modifier: Modifier,
    /// True when the symbol comes from a compiled dependency, not source.
    pub is_cjo_sym: bool,
    /// True when marked deprecated.
    pub is_deprecated: bool,
    /// Completion insert text, when it differs from the name.
    pub insert_text: String,
    /// Module the symbol belongs to.
    pub cur_module: String,
}

/// How a reference uses its symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RefKind {
    /// Any read/name use.
    #[default]
    Reference,
    /// The defining occurrence.
    Definition,
    /// A write access.
    Write,
    /// A call site.
    Call,
}

/// One recorded reference, grouped per symbol in the slabs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Ref {
    /// Where the reference occurs.
    pub location: SymbolLocation,
    /// Use kind.
    pub kind: RefKind,
    /// Id of the enclosing (container) symbol, [`SymbolId::NONE`] at file
    /// scope. A non-null container must name an existing symbol in some
    /// loaded shard.
    pub container: SymbolId,
    /// True when the reference lives in a compiled dependency.
    pub is_cjo_ref: bool,
}

/// Relation predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    /// `subject` is a base (supertype) of `object`.
    BaseOf,
    /// `subject` is extended by the extend declaration `object`.
    ExtendedBy,
}

/// A `(subject, predicate, object)` triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    /// Subject symbol.
    pub subject: SymbolId,
    /// Predicate.
    pub predicate: RelationKind,
    /// Object symbol.
    pub object: SymbolId,
}

/// One extend recorded against the extended type's symbol.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExtendItem {
    /// Symbol id of the extend declaration.
    pub id: SymbolId,
    /// Visibility of the extension.
    pub modifier: Modifier,
    /// Interface the extension implements, empty for direct extends.
    pub interface_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_ids_are_stable_and_distinct() {
        let a = SymbolId::of("demo.core", "demo.core", "add", NodeKind::FuncDecl);
        let b = SymbolId::of("demo.core", "demo.core", "add", NodeKind::FuncDecl);
        let c = SymbolId::of("demo.core", "demo.core", "add", NodeKind::VarDecl);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(!a.is_none());
    }

    #[test]
    fn none_id_is_reserved() {
        assert!(SymbolId::NONE.is_none());
    }
}
