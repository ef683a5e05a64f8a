//! The node arena.
//!
//! Nodes own no pointers; all structure is expressed through [`NodeId`]
//! indices so a finished [`Ast`] is `Send + Sync` and can be handed to any
//! worker thread behind an `Arc`.

use crate::node::{Node, NodeData, NodeFlags, NodeKind};
use crate::pos::{Position, Range};
use serde::{Deserialize, Serialize};

/// Index of a node inside its [`Ast`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    /// The arena slot this id addresses.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// An arena-owned syntax tree for one file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ast {
    nodes: Vec<Node>,
    root: Option<NodeId>,
}

impl Ast {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a node and return its id. Children and payload are filled
    /// in by the parser through [`Ast::node_mut`].
    pub fn alloc(&mut self, kind: NodeKind, begin: Position, end: Position) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            id,
            kind,
            parent: None,
            children: Vec::new(),
            begin,
            end,
            flags: NodeFlags::empty(),
            ty: None,
            data: NodeData::None,
        });
        id
    }

    /// Attach `child` under `parent`, keeping source order.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.index()].parent = Some(parent);
        self.nodes[parent.index()].children.push(child);
    }

    /// Mark `id` as the root (the `File` node).
    pub fn set_root(&mut self, id: NodeId) {
        self.root = Some(id);
    }

    /// The root node id, if the tree was built.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Borrow a node.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Borrow a node mutably.
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Borrow a node, tolerating ids from another arena generation.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Number of allocated nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when no nodes were allocated.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Children of `id` in source order.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    /// Parent of `id`.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    /// Walk ancestors from `id` upward, excluding `id` itself.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut cur = self.parent(id);
        std::iter::from_fn(move || {
            let next = cur?;
            cur = self.parent(next);
            Some(next)
        })
    }

    /// Top-level declarations: decl children of the root file node.
    pub fn top_level_decls(&self) -> Vec<NodeId> {
        let Some(root) = self.root else {
            return Vec::new();
        };
        self.children(root)
            .iter()
            .copied()
            .filter(|id| self.node(*id).kind.is_decl())
            .collect()
    }

    /// The smallest node whose extent encloses `range`, searching from the
    /// root. Returns `None` for an empty tree or a range outside the file.
    pub fn smallest_enclosing(&self, range: Range) -> Option<NodeId> {
        let root = self.root?;
        let mut best: Option<NodeId> = None;
        let mut cursor = root;
        loop {
            let node = self.node(cursor);
            if node.begin <= range.start && range.end <= node.end {
                best = Some(cursor);
            }
            let next = self
                .children(cursor)
                .iter()
                .copied()
                .find(|c| {
                    let n = self.node(*c);
                    n.begin <= range.start && range.end <= n.end
                });
            match next {
                Some(child) => cursor = child,
                None => break,
            }
        }
        best
    }

    /// The innermost node covering `pos`, preferring later siblings when
    /// extents touch.
    pub fn node_at(&self, pos: Position) -> Option<NodeId> {
        self.smallest_enclosing(Range::new(pos, pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(line: u32, column: u32) -> Position {
        Position::new(1, line, column)
    }

    fn sample() -> Ast {
        // file { func f { block { lit } } }
        let mut ast = Ast::new();
        let file = ast.alloc(NodeKind::File, pos(1, 1), pos(3, 1));
        let func = ast.alloc(NodeKind::FuncDecl, pos(1, 1), pos(2, 10));
        let block = ast.alloc(NodeKind::Block, pos(1, 20), pos(2, 10));
        let lit = ast.alloc(NodeKind::LitConstExpr, pos(2, 3), pos(2, 4));
        ast.set_root(file);
        ast.attach(file, func);
        ast.attach(func, block);
        ast.attach(block, lit);
        ast
    }

    #[test]
    fn smallest_enclosing_finds_leaf() {
        let ast = sample();
        let found = ast.smallest_enclosing(Range::new(pos(2, 3), pos(2, 4)));
        assert_eq!(found.map(|id| ast.node(id).kind), Some(NodeKind::LitConstExpr));
    }

    #[test]
    fn smallest_enclosing_falls_back_to_ancestor() {
        let ast = sample();
        let found = ast.smallest_enclosing(Range::new(pos(1, 21), pos(2, 4)));
        assert_eq!(found.map(|id| ast.node(id).kind), Some(NodeKind::Block));
    }

    #[test]
    fn ancestors_walks_to_root() {
        let ast = sample();
        let lit = NodeId(3);
        let kinds: Vec<_> = ast.ancestors(lit).map(|id| ast.node(id).kind).collect();
        assert_eq!(kinds, vec![NodeKind::Block, NodeKind::FuncDecl, NodeKind::File]);
    }

    #[test]
    fn top_level_decls_skips_non_decls() {
        let ast = sample();
        assert_eq!(ast.top_level_decls().len(), 1);
    }
}
