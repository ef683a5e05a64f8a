//! Feature handlers behind the façade.
//!
//! Every handler is a plain function over a [`FeatureCtx`] snapshot and
//! returns the reply as a `serde_json::Value`; the façade owns scheduling,
//! cancellation and the JSON-RPC envelope.

pub mod code_actions;
pub mod completion;
pub mod hierarchy;
pub mod hover;
pub mod navigation;
pub mod semantic_tokens;
pub mod symbols;

use cangjie_ast::{NodeData, NodeId, NodeKind, Position};
use cangjie_index::{MemIndex, Symbol, SymbolId};
use cangjie_position::LineIndex;
use cangjie_project::{ArkAst, CompilerProject};
use std::sync::Arc;

/// Everything a handler may look at for one request.
pub struct FeatureCtx<'a> {
    /// The project model.
    pub project: &'a CompilerProject,
    /// The file snapshot chosen by the scheduler.
    pub ast: &'a ArkAst,
    /// The file's current text.
    pub text: String,
    /// The shared symbol index.
    pub index: Arc<MemIndex>,
}

impl<'a> FeatureCtx<'a> {
    /// Build a context for `ast`, reading the text from the doc cache.
    pub fn new(project: &'a CompilerProject, ast: &'a ArkAst) -> Self {
        let text = project.docs().get(&ast.path).map(|d| d.text).unwrap_or_default();
        Self { project, ast, text, index: project.index() }
    }

    /// A line index over the current text.
    pub fn line_index(&self) -> LineIndex {
        LineIndex::new(self.text.clone())
    }
}

/// What the cursor resolved to.
#[derive(Debug, Clone)]
pub enum Resolved {
    /// A declaration in this file's arena.
    Local(NodeId),
    /// A symbol known only through the index.
    Indexed(Symbol),
}

/// Resolve the identifier under `pos` to a declaration.
///
/// Order: the syntax tree first (a reference's bound target or the
/// declaration whose name token sits under the cursor), then the index by
/// name for cross-file and cross-package symbols.
pub fn resolve_at(ctx: &FeatureCtx<'_>, pos: Position) -> Option<Resolved> {
    let token = ctx.ast.identifier_at(pos)?;
    let name = token.value.clone();
    let node_id = ctx.ast.ast.node_at(pos)?;
    let node = ctx.ast.ast.node(node_id);

    match &node.data {
        NodeData::Ref { target: Some(target), .. } => return Some(Resolved::Local(*target)),
        NodeData::Ref { target: None, .. } => {}
        _ if node.kind.is_decl() && node.name() == Some(name.as_str()) => {
            return Some(Resolved::Local(node_id));
        }
        _ => {
            // The cursor may sit on a decl's name while `node_at` found a
            // child; check the ancestors.
            let mut cur = Some(node_id);
            while let Some(id) = cur {
                let n = ctx.ast.ast.node(id);
                if n.kind.is_decl() && n.name() == Some(name.as_str()) {
                    return Some(Resolved::Local(id));
                }
                cur = ctx.ast.ast.parent(id);
            }
        }
    }

    // Fall back to the index: exact-name matches, same package first.
    let mut best: Option<Symbol> = None;
    ctx.index.fuzzy_find(&name, |symbol| {
        if symbol.name != name {
            return;
        }
        let better = match &best {
            None => true,
            Some(current) => {
                current.scope.split("::").next() != Some(ctx.ast.package.as_str())
                    && symbol.scope.split("::").next() == Some(ctx.ast.package.as_str())
            }
        };
        if better {
            best = Some(symbol.clone());
        }
    });
    best.map(Resolved::Indexed)
}

/// The index symbol corresponding to a local declaration, when the
/// declaration is indexed (top-level decls and type members).
pub fn index_symbol_for_local(ctx: &FeatureCtx<'_>, decl: NodeId) -> Option<Symbol> {
    let ast = &ctx.ast.ast;
    let node = ast.node(decl);
    let name = node.name()?;
    let package = &ctx.ast.package;
    let scope = match ast.parent(decl).map(|p| ast.node(p)) {
        Some(parent) if parent.kind.is_classlike() => {
            format!("{package}::{}", parent.name().unwrap_or(""))
        }
        _ => package.clone(),
    };
    let id = SymbolId::of(package, &scope, name, node.kind);
    ctx.index.symbol(id)
}

/// The LSP `SymbolKind` number for a node kind.
pub fn lsp_symbol_kind(kind: NodeKind) -> u32 {
    match kind {
        NodeKind::ClassDecl => 5,
        NodeKind::FuncDecl | NodeKind::MainDecl => 12,
        NodeKind::EnumDecl => 10,
        NodeKind::InterfaceDecl => 11,
        NodeKind::StructDecl => 23,
        NodeKind::ExtendDecl => 5,
        NodeKind::VarDecl | NodeKind::FuncParam => 13,
        _ => 13,
    }
}

/// The declaration's name-token range within this file, for precise
/// highlight/rename extents.
pub fn name_token_range(ctx: &FeatureCtx<'_>, decl: NodeId) -> Option<cangjie_ast::Range> {
    let node = ctx.ast.ast.node(decl);
    let name = node.name()?;
    ctx.ast
        .tokens
        .iter()
        .find(|t| {
            t.kind == cangjie_ast::TokenKind::Identifier
                && t.value == name
                && t.begin >= node.begin
                && t.end <= node.end
        })
        .map(|t| cangjie_ast::Range::new(t.begin, t.end))
}
