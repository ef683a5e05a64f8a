//! Selection trees.
//!
//! Given a text range, [`SelectionTree::build`] locates the smallest
//! top-level declaration containing the range and mirrors its AST subtree,
//! classifying every node as `Unselected`, `Partial` or `Complete`. The
//! refactoring rules traverse the result exclusively through
//! [`SelectionTree::walk`].

#![deny(unsafe_code)]
#![warn(missing_docs)]

use cangjie_ast::{Ast, NodeFlags, NodeId, NodeKind, Position, WalkAction};

/// How much of a node the selection covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// The selection does not touch the node.
    Unselected,
    /// The selection crosses a node boundary.
    Partial,
    /// The node lies entirely inside the selection.
    Complete,
}

/// The enclosing scope of the selection, used by refactoring rules to
/// reject illegal contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionScope {
    /// Inside a global variable declaration.
    GlobalVar,
    /// Inside a member variable declaration.
    MemberVar,
    /// Inside a function body.
    FuncBody,
    /// Anything else.
    Unknown,
}

/// One mirrored node.
#[derive(Debug)]
pub struct SelectionTreeNode {
    /// The arena node this mirrors.
    pub node: NodeId,
    /// Parent index within the tree, `None` for the root.
    pub parent: Option<usize>,
    /// Child indices in source order.
    pub children: Vec<usize>,
    /// Coverage classification.
    pub selected: Selection,
}

/// The selection tree over one top-level declaration.
#[derive(Debug)]
pub struct SelectionTree {
    nodes: Vec<SelectionTreeNode>,
    scope: SelectionScope,
    /// The declaration owning the matched scope.
    target_decl: Option<NodeId>,
    /// The enclosing top-level decl (class-like, or global func/var).
    top_decl: Option<NodeId>,
    /// Innermost interpolation expression containing the selection.
    outer_interp: Option<NodeId>,
}

impl SelectionTree {
    /// Build the tree for `[start, end]`. Returns `None` when no single
    /// top-level declaration contains the range (e.g. it spans two decls)
    /// or the file has no tree.
    pub fn build(ast: &Ast, start: Position, end: Position) -> Option<SelectionTree> {
        let root_file = ast.root()?;
        for decl in ast.children(root_file) {
            let node = ast.node(*decl);
            if !node.kind.is_decl() {
                continue;
            }
            if let Some(tree) = Self::build_in_decl(ast, *decl, start, end) {
                return Some(tree);
            }
        }
        None
    }

    /// Run `f` over the tree built for a non-empty range, mirroring the
    /// original guard that an empty range never builds a tree.
    pub fn create_each<R>(
        ast: &Ast,
        start: Position,
        end: Position,
        f: impl FnOnce(SelectionTree) -> R,
    ) -> Option<R> {
        if start == end {
            return None;
        }
        Self::build(ast, start, end).map(f)
    }

    fn build_in_decl(
        ast: &Ast,
        decl: NodeId,
        start: Position,
        end: Position,
    ) -> Option<SelectionTree> {
        // Find the smallest node whose extent covers the whole range,
        // recording scope, top decl and interpolation context on the way.
        let mut selection_root: Option<NodeId> = None;
        let mut scope = SelectionScope::Unknown;
        let mut target_decl = None;
        let mut top_decl = None;
        let mut outer_interp = None;

        let mut stack = vec![decl];
        while let Some(id) = stack.pop() {
            let node = ast.node(id);
            if node.begin > end || node.end < start {
                continue;
            }
            if node.flags.has(NodeFlags::IN_MACRO) {
                continue;
            }
            if node.begin > node.end {
                continue;
            }
            if node.begin <= start && node.end >= end {
                if outer_interp.is_none() && node.kind == NodeKind::InterpolationExpr {
                    outer_interp = Some(id);
                }
                selection_root = Some(id);
                Self::match_selected_scope(ast, id, start, end, &mut scope, &mut target_decl);
                Self::find_top_decl(ast, id, &mut top_decl);
                if node.begin == start && node.end == end {
                    break;
                }
                // Only a child that still covers the range can shrink it.
                for child in ast.children(id).iter().rev() {
                    stack.push(*child);
                }
            }
        }

        let root = selection_root?;
        let mut tree = SelectionTree {
            nodes: Vec::new(),
            scope,
            target_decl,
            top_decl,
            outer_interp,
        };
        tree.mirror(ast, root, None, start, end);
        Some(tree)
    }

    fn classify(ast: &Ast, id: NodeId, start: Position, end: Position) -> Selection {
        let node = ast.node(id);
        if node.begin > end || node.end < start {
            Selection::Unselected
        } else if node.begin >= start && node.end <= end {
            Selection::Complete
        } else {
            Selection::Partial
        }
    }

    /// Mirror the arena subtree into tree nodes, depth-first.
    fn mirror(
        &mut self,
        ast: &Ast,
        id: NodeId,
        parent: Option<usize>,
        start: Position,
        end: Position,
    ) -> usize {
        let index = self.nodes.len();
        self.nodes.push(SelectionTreeNode {
            node: id,
            parent,
            children: Vec::new(),
            selected: Self::classify(ast, id, start, end),
        });
        for child in ast.children(id) {
            let child_node = ast.node(*child);
            if child_node.begin > child_node.end {
                continue;
            }
            if child_node.flags.has(NodeFlags::IN_MACRO) {
                continue;
            }
            let child_index = self.mirror(ast, *child, Some(index), start, end);
            self.nodes[index].children.push(child_index);
        }
        index
    }

    fn match_selected_scope(
        ast: &Ast,
        id: NodeId,
        start: Position,
        end: Position,
        scope: &mut SelectionScope,
        target_decl: &mut Option<NodeId>,
    ) {
        if *scope != SelectionScope::Unknown {
            return;
        }
        let node = ast.node(id);
        match node.kind {
            NodeKind::VarDecl => {
                if node.flags.has(NodeFlags::GLOBAL) {
                    *scope = SelectionScope::GlobalVar;
                    *target_decl = Some(id);
                } else if node.flags.has(NodeFlags::MEMBER) {
                    *scope = SelectionScope::MemberVar;
                    *target_decl = Some(id);
                }
            }
            NodeKind::FuncDecl | NodeKind::MainDecl => {
                let body = ast
                    .children(id)
                    .iter()
                    .copied()
                    .find(|c| ast.node(*c).kind == NodeKind::Block);
                if let Some(body) = body {
                    let body_node = ast.node(body);
                    if start >= body_node.begin && end <= body_node.end {
                        *scope = SelectionScope::FuncBody;
                        *target_decl = Some(id);
                    }
                }
            }
            _ => {}
        }
    }

    fn find_top_decl(ast: &Ast, id: NodeId, top_decl: &mut Option<NodeId>) {
        if top_decl.is_some() {
            return;
        }
        let node = ast.node(id);
        match node.kind {
            NodeKind::ClassDecl
            | NodeKind::InterfaceDecl
            | NodeKind::StructDecl
            | NodeKind::EnumDecl
            | NodeKind::ExtendDecl => *top_decl = Some(id),
            NodeKind::FuncDecl | NodeKind::MainDecl | NodeKind::VarDecl
                if node.flags.has(NodeFlags::GLOBAL) =>
            {
                *top_decl = Some(id)
            }
            _ => {}
        }
    }

    /// The root tree node.
    pub fn root(&self) -> Option<&SelectionTreeNode> {
        self.nodes.first()
    }

    /// The matched scope classification.
    pub fn scope(&self) -> SelectionScope {
        self.scope
    }

    /// The declaration owning the matched scope.
    pub fn target_decl(&self) -> Option<NodeId> {
        self.target_decl
    }

    /// The enclosing top-level declaration.
    pub fn top_decl(&self) -> Option<NodeId> {
        self.top_decl
    }

    /// The innermost interpolation expression containing the selection.
    pub fn outer_interp(&self) -> Option<NodeId> {
        self.outer_interp
    }

    /// Deepest node on the single-child selected spine, the way the
    /// original picks a common ancestor; `None` when that would be the
    /// root itself.
    pub fn common_ancestor(&self) -> Option<&SelectionTreeNode> {
        let mut index = 0usize;
        let mut moved = false;
        loop {
            let node = self.nodes.get(index)?;
            if node.children.len() == 1 && node.selected != Selection::Unselected {
                index = node.children[0];
                moved = true;
            } else {
                break;
            }
        }
        if moved { self.nodes.get(index) } else { None }
    }

    /// The only supported traversal: pre-order over the mirrored tree with
    /// the usual prune/stop actions.
    pub fn walk(&self, from: &SelectionTreeNode, cb: &mut dyn FnMut(&SelectionTreeNode) -> WalkAction) {
        let start = self
            .nodes
            .iter()
            .position(|n| std::ptr::eq(n, from))
            .unwrap_or(0);
        let mut stack = vec![start];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            match cb(node) {
                WalkAction::Stop => return,
                WalkAction::SkipChildren => continue,
                WalkAction::WalkChildren => {
                    for child in node.children.iter().rev() {
                        stack.push(*child);
                    }
                }
            }
        }
    }

    /// Walk from the root.
    pub fn walk_all(&self, cb: &mut dyn FnMut(&SelectionTreeNode) -> WalkAction) {
        if let Some(root) = self.root() {
            self.walk(root, cb);
        }
    }

    /// Number of mirrored nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when nothing was mirrored.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cangjie_parse::parse_file;
    use cangjie_testkit::must_some;
    use pretty_assertions::assert_eq;

    fn pos(line: u32, column: u32) -> Position {
        Position::new(1, line, column)
    }

    fn ast_of(text: &str) -> Ast {
        let (ast, _, _) = parse_file(1, "/t/main.cj", text);
        ast
    }

    #[test]
    fn exact_expression_selection_is_complete_root() {
        // columns:            1234567890123456789012345678
        let ast = ast_of("func f() { var x = 1 + 2 * 3 }");
        // select `2 * 3` (columns 26..=30 hold "2 * 3")
        let tree = must_some(SelectionTree::build(&ast, pos(1, 24), pos(1, 28)));
        let root = must_some(tree.root());
        assert_eq!(root.selected, Selection::Complete);
        assert_eq!(tree.scope(), SelectionScope::FuncBody);
    }

    #[test]
    fn complete_nodes_have_no_unselected_ancestors_on_their_path() {
        let ast = ast_of("func f() { var x = 1 + 2 * 3 }");
        let tree = must_some(SelectionTree::build(&ast, pos(1, 20), pos(1, 28)));
        // Every Complete node's ancestors inside the tree must be Partial
        // or Complete, never Unselected.
        let mut ok = true;
        tree.walk_all(&mut |node| {
            if node.selected == Selection::Complete {
                let mut parent = node.parent;
                while let Some(p) = parent {
                    let pn = &tree.nodes[p];
                    if pn.selected == Selection::Unselected {
                        ok = false;
                    }
                    parent = pn.parent;
                }
            }
            WalkAction::WalkChildren
        });
        assert!(ok);
    }

    #[test]
    fn selection_spanning_two_top_decls_refuses() {
        let ast = ast_of("func a() { 1 }\nfunc b() { 2 }");
        assert!(SelectionTree::build(&ast, pos(1, 12), pos(2, 12)).is_none());
    }

    #[test]
    fn empty_range_never_builds() {
        let ast = ast_of("func f() { 1 }");
        let ran = SelectionTree::create_each(&ast, pos(1, 12), pos(1, 12), |_| ());
        assert!(ran.is_none());
    }

    #[test]
    fn global_var_scope_is_detected() {
        let ast = ast_of("var total = 1 + 2");
        let tree = must_some(SelectionTree::build(&ast, pos(1, 13), pos(1, 17)));
        assert_eq!(tree.scope(), SelectionScope::GlobalVar);
        assert!(tree.top_decl().is_some());
    }

    #[test]
    fn member_var_scope_is_detected() {
        let ast = ast_of("class A { var x = 1 + 2 }");
        let tree = must_some(SelectionTree::build(&ast, pos(1, 19), pos(1, 23)));
        assert_eq!(tree.scope(), SelectionScope::MemberVar);
    }

    #[test]
    fn interpolation_context_is_recorded() {
        let ast = ast_of(r#"func f() { var s = "n=${1 + 2}" }"#);
        // select inside ${...}
        let tree = must_some(SelectionTree::build(&ast, pos(1, 25), pos(1, 29)));
        assert!(tree.outer_interp().is_some());
    }

    #[test]
    fn partial_selection_is_classified() {
        let ast = ast_of("func f() { if (x > 0) { y() } }");
        // Start inside the if condition, end before the block closes.
        let tree = must_some(SelectionTree::build(&ast, pos(1, 16), pos(1, 26)));
        let mut saw_partial = false;
        tree.walk_all(&mut |node| {
            if node.selected == Selection::Partial {
                saw_partial = true;
            }
            WalkAction::WalkChildren
        });
        assert!(saw_partial);
    }

    #[test]
    fn walk_skip_children_prunes() {
        let ast = ast_of("func f() { var x = 1 + 2 }");
        let tree = must_some(SelectionTree::build(&ast, pos(1, 12), pos(1, 26)));
        let mut visits_with_skip = 0;
        tree.walk_all(&mut |_| {
            visits_with_skip += 1;
            WalkAction::SkipChildren
        });
        assert_eq!(visits_with_skip, 1, "root only when children are skipped");
    }
}
