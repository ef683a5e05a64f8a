//! Node kinds, flags and per-kind payloads.

use crate::arena::NodeId;
use crate::pos::Position;
use serde::{Deserialize, Serialize};

/// Syntactic classification of an AST node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// One source file; always the arena root.
    File,
    /// `import a.b` item.
    Import,
    /// `class` declaration.
    ClassDecl,
    /// `interface` declaration.
    InterfaceDecl,
    /// `struct` declaration.
    StructDecl,
    /// `enum` declaration.
    EnumDecl,
    /// `extend` declaration augmenting an existing type.
    ExtendDecl,
    /// `func` declaration (including member functions and constructors).
    FuncDecl,
    /// `main` entry declaration.
    MainDecl,
    /// `var`/`let`/`const` declaration.
    VarDecl,
    /// A function parameter.
    FuncParam,
    /// `{ ... }` block.
    Block,
    /// `if` expression.
    IfExpr,
    /// `while` loop.
    WhileExpr,
    /// `do ... while` loop.
    DoWhileExpr,
    /// `for ... in` loop.
    ForInExpr,
    /// `try` expression.
    TryExpr,
    /// `match` expression.
    MatchExpr,
    /// One arm of a `match`.
    MatchCase,
    /// `break`/`continue`.
    JumpExpr,
    /// `return` expression.
    ReturnExpr,
    /// Assignment, possibly compound.
    AssignExpr,
    /// Binary operator expression.
    BinaryExpr,
    /// Unary operator expression.
    UnaryExpr,
    /// Call expression.
    CallExpr,
    /// `recv.field` access.
    MemberAccess,
    /// A name referencing a declaration.
    RefExpr,
    /// Literal constant.
    LitConstExpr,
    /// Parenthesized expression.
    ParenExpr,
    /// Lambda expression.
    LambdaExpr,
    /// `${...}` inside an interpolated string.
    InterpolationExpr,
    /// The interpolated string itself.
    StrInterpolationExpr,
    /// `a..b` range expression.
    RangeExpr,
    /// `a[i]` subscript.
    SubscriptExpr,
    /// A type annotation reference.
    TypeRef,
}

impl NodeKind {
    /// True for expression kinds.
    pub fn is_expr(self) -> bool {
        matches!(
            self,
            NodeKind::IfExpr
                | NodeKind::WhileExpr
                | NodeKind::DoWhileExpr
                | NodeKind::ForInExpr
                | NodeKind::TryExpr
                | NodeKind::MatchExpr
                | NodeKind::JumpExpr
                | NodeKind::ReturnExpr
                | NodeKind::AssignExpr
                | NodeKind::BinaryExpr
                | NodeKind::UnaryExpr
                | NodeKind::CallExpr
                | NodeKind::MemberAccess
                | NodeKind::RefExpr
                | NodeKind::LitConstExpr
                | NodeKind::ParenExpr
                | NodeKind::LambdaExpr
                | NodeKind::InterpolationExpr
                | NodeKind::StrInterpolationExpr
                | NodeKind::RangeExpr
                | NodeKind::SubscriptExpr
        )
    }

    /// True for declaration kinds.
    pub fn is_decl(self) -> bool {
        matches!(
            self,
            NodeKind::ClassDecl
                | NodeKind::InterfaceDecl
                | NodeKind::StructDecl
                | NodeKind::EnumDecl
                | NodeKind::ExtendDecl
                | NodeKind::FuncDecl
                | NodeKind::MainDecl
                | NodeKind::VarDecl
                | NodeKind::FuncParam
        )
    }

    /// True for the class-like container kinds.
    pub fn is_classlike(self) -> bool {
        matches!(
            self,
            NodeKind::ClassDecl
                | NodeKind::InterfaceDecl
                | NodeKind::StructDecl
                | NodeKind::EnumDecl
                | NodeKind::ExtendDecl
        )
    }
}

/// Attribute bits carried on a node.
///
/// The set mirrors what the refactoring rules and index writers inspect:
/// placement (`GLOBAL`, `MEMBER`), modifiers (`STATIC`, `CONST`, `MUT`,
/// `OPEN`), and provenance (`COMPILER_ADD`, `IN_MACRO`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeFlags(u16);

impl NodeFlags {
    /// Declared at file scope.
    pub const GLOBAL: NodeFlags = NodeFlags(1 << 0);
    /// Declared inside a class/interface/struct/enum/extend body.
    pub const MEMBER: NodeFlags = NodeFlags(1 << 1);
    /// `static` modifier.
    pub const STATIC: NodeFlags = NodeFlags(1 << 2);
    /// `const` modifier.
    pub const CONST: NodeFlags = NodeFlags(1 << 3);
    /// `mut` modifier.
    pub const MUT: NodeFlags = NodeFlags(1 << 4);
    /// `open` modifier.
    pub const OPEN: NodeFlags = NodeFlags(1 << 5);
    /// Synthesized by the compiler, absent from source.
    pub const COMPILER_ADD: NodeFlags = NodeFlags(1 << 6);
    /// Produced by macro expansion; selection and edits must skip it.
    pub const IN_MACRO: NodeFlags = NodeFlags(1 << 7);
    /// Marked `@Deprecated`.
    pub const DEPRECATED: NodeFlags = NodeFlags(1 << 8);

    /// The empty flag set.
    pub fn empty() -> Self {
        NodeFlags(0)
    }

    /// Union.
    pub fn with(self, other: NodeFlags) -> Self {
        NodeFlags(self.0 | other.0)
    }

    /// True when every bit of `other` is set.
    pub fn has(self, other: NodeFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// True when at least one bit of `other` is set.
    pub fn has_any(self, other: NodeFlags) -> bool {
        self.0 & other.0 != 0
    }

    /// Insert bits in place.
    pub fn insert(&mut self, other: NodeFlags) {
        self.0 |= other.0;
    }
}

/// A parameter view used when rendering signatures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    /// Parameter name.
    pub name: String,
    /// Declared or inferred type, if known.
    pub ty: Option<String>,
}

/// Per-kind payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum NodeData {
    /// Kinds that carry nothing extra.
    #[default]
    None,
    /// [`NodeKind::File`].
    File {
        /// Absolute path of the file.
        path: String,
        /// Declared package name.
        package: String,
    },
    /// [`NodeKind::Import`].
    Import {
        /// Imported module (`std`).
        module: String,
        /// Imported item (`collection`), empty for trailing-dot imports.
        item: String,
    },
    /// Class/interface/struct/enum declarations.
    TypeDecl {
        /// Declared name.
        name: String,
        /// Named supertypes in declaration order.
        supers: Vec<String>,
    },
    /// [`NodeKind::ExtendDecl`].
    Extend {
        /// Name of the extended type.
        name: String,
        /// Interfaces the extension adds.
        interfaces: Vec<String>,
    },
    /// [`NodeKind::FuncDecl`] / [`NodeKind::MainDecl`].
    Func {
        /// Declared name.
        name: String,
        /// Declared return type, if annotated.
        ret_ty: Option<String>,
    },
    /// [`NodeKind::VarDecl`] / [`NodeKind::FuncParam`].
    Var {
        /// Declared name.
        name: String,
        /// Declared or inferred type.
        ty: Option<String>,
    },
    /// [`NodeKind::RefExpr`].
    Ref {
        /// Referenced name.
        name: String,
        /// Resolution target inside the same arena, if resolved.
        target: Option<NodeId>,
    },
    /// [`NodeKind::LitConstExpr`].
    Lit {
        /// Verbatim literal text.
        text: String,
    },
    /// [`NodeKind::BinaryExpr`] / [`NodeKind::UnaryExpr`].
    Op {
        /// Operator spelling.
        op: String,
    },
    /// [`NodeKind::AssignExpr`].
    Assign {
        /// Operator spelling (`=`, `+=`, ...).
        op: String,
        /// True for compound assignments.
        compound: bool,
    },
    /// [`NodeKind::JumpExpr`].
    Jump {
        /// True for `break`, false for `continue`.
        is_break: bool,
    },
    /// [`NodeKind::MemberAccess`].
    Member {
        /// Accessed field or method name.
        field: String,
    },
}

impl NodeData {
    /// The declared name, for kinds that have one.
    pub fn name(&self) -> Option<&str> {
        match self {
            NodeData::TypeDecl { name, .. }
            | NodeData::Extend { name, .. }
            | NodeData::Func { name, .. }
            | NodeData::Var { name, .. }
            | NodeData::Ref { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// One arena node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// This node's arena id.
    pub id: NodeId,
    /// Syntactic kind.
    pub kind: NodeKind,
    /// Parent id; `None` only for the root.
    pub parent: Option<NodeId>,
    /// Children in source order.
    pub children: Vec<NodeId>,
    /// Start of the node's extent.
    pub begin: Position,
    /// End of the node's extent.
    pub end: Position,
    /// Attribute bits.
    pub flags: NodeFlags,
    /// Type assigned by the checker, for expressions and typed decls.
    pub ty: Option<String>,
    /// Per-kind payload.
    pub data: NodeData,
}

impl Node {
    /// The node's declared or referenced name, if any.
    pub fn name(&self) -> Option<&str> {
        self.data.name()
    }

    /// True when `pos` lies in `[begin, end]`.
    pub fn contains(&self, pos: Position) -> bool {
        self.begin <= pos && pos <= self.end
    }
}
