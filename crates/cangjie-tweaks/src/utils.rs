//! Helpers shared by the tweak implementations.

use cangjie_ast::{Ast, NodeFlags, NodeId, NodeKind, Position, Range, Token, TokenKind};
use cangjie_position::LineIndex;

/// Extract the source text covered by `range` (inclusive endpoints).
pub fn content_between(source: &str, range: Range) -> String {
    let index = LineIndex::new(source.to_string());
    let Some(start) = index.offset(range.start.line, range.start.column) else {
        return String::new();
    };
    let Some(end) = index.offset(range.end.line, range.end.column) else {
        return String::new();
    };
    let mut end_excl = end;
    let bytes = source.as_bytes();
    if end_excl < bytes.len() {
        end_excl += 1;
        while end_excl < bytes.len() && !source.is_char_boundary(end_excl) {
            end_excl += 1;
        }
    }
    index.slice(start, end_excl).to_string()
}

/// Convert an inclusive node extent into an end-exclusive edit range.
pub fn exclusive(range: Range) -> Range {
    let mut out = range;
    out.end.column += 1;
    out
}

/// Leading whitespace of the line holding `pos`.
pub fn indent_at(source: &str, pos: Position) -> String {
    let index = LineIndex::new(source.to_string());
    let line = index.line_text(pos.line).unwrap_or("");
    line.chars().take_while(|c| *c == ' ' || *c == '\t').collect()
}

/// A column's worth of spaces.
pub fn spaces(n: u32) -> String {
    " ".repeat(n.saturating_sub(1) as usize)
}

/// The smallest `Block` under `from` whose extent contains `range`, with
/// the direct statement child containing the range.
pub fn enclosing_block_stmt(ast: &Ast, from: NodeId, range: Range) -> Option<(NodeId, NodeId)> {
    let mut best: Option<(NodeId, NodeId)> = None;
    let mut stack = vec![from];
    while let Some(id) = stack.pop() {
        let node = ast.node(id);
        if node.begin > range.start || node.end < range.end {
            continue;
        }
        if node.kind == NodeKind::Block {
            for stmt in ast.children(id) {
                let stmt_node = ast.node(*stmt);
                if stmt_node.begin <= range.start && stmt_node.end >= range.end {
                    best = Some((id, *stmt));
                }
            }
        }
        for child in ast.children(id) {
            stack.push(*child);
        }
    }
    best
}

/// The nearest `{`, `;` or `=>` token before `before` on the same line.
/// Statements that share a line with one of these need the insertion to go
/// after the anchor instead of the line start.
pub fn same_line_anchor(tokens: &[Token], before: Position) -> Option<Token> {
    tokens
        .iter()
        .filter(|t| {
            t.kind == TokenKind::Punctuation
                && t.begin.line == before.line
                && t.end.column < before.column
                && matches!(t.value.as_str(), "{" | ";" | "=>")
        })
        .next_back()
        .cloned()
}

/// The `do ... while` whose condition fully contains `range`, if any.
pub fn enclosing_do_while_cond(ast: &Ast, from: NodeId, range: Range) -> Option<NodeId> {
    let mut found = None;
    let mut stack = vec![from];
    while let Some(id) = stack.pop() {
        let node = ast.node(id);
        if node.begin > range.start || node.end < range.end {
            continue;
        }
        if node.kind == NodeKind::DoWhileExpr {
            // The condition is the non-block child.
            let cond = ast
                .children(id)
                .iter()
                .copied()
                .find(|c| ast.node(*c).kind != NodeKind::Block);
            if let Some(cond) = cond {
                let cond_node = ast.node(cond);
                if cond_node.begin <= range.start && cond_node.end >= range.end {
                    found = Some(id);
                }
            }
        }
        for child in ast.children(id) {
            stack.push(*child);
        }
    }
    found
}

/// Position after the last top-level declaration, for global insertions.
pub fn global_insert_pos_after_last(ast: &Ast) -> Option<Position> {
    let decls = ast.top_level_decls();
    let last = decls.last()?;
    let mut pos = ast.node(*last).end;
    pos.column += 1;
    Some(pos)
}

/// Position at the start of the top-level declaration containing `range`,
/// for constants that must precede their first use.
pub fn global_insert_pos_before(ast: &Ast, range: Range) -> Option<Position> {
    for decl in ast.top_level_decls() {
        let node = ast.node(decl);
        if node.begin <= range.start && range.end <= node.end {
            return Some(Position::new(node.begin.file_id, node.begin.line, 1));
        }
    }
    None
}

/// True when the subtree at `id` is constant-evaluable: literals and
/// references to global `const` declarations, transitively; calls must
/// target global `const` functions and every argument must satisfy the
/// same rule.
pub fn is_const_evaluable(ast: &Ast, id: NodeId) -> bool {
    let node = ast.node(id);
    match node.kind {
        NodeKind::LitConstExpr => true,
        NodeKind::ParenExpr | NodeKind::BinaryExpr | NodeKind::UnaryExpr | NodeKind::RangeExpr => {
            ast.children(id).iter().all(|c| is_const_evaluable(ast, *c))
        }
        NodeKind::RefExpr => match &node.data {
            cangjie_ast::NodeData::Ref { target: Some(target), .. } => {
                let decl = match ast.get(*target) {
                    Some(d) => d,
                    None => return false,
                };
                decl.flags.has(NodeFlags::CONST) && decl.flags.has(NodeFlags::GLOBAL)
            }
            _ => false,
        },
        NodeKind::CallExpr => {
            let mut children = ast.children(id).iter();
            let Some(callee) = children.next() else {
                return false;
            };
            let callee_const = match &ast.node(*callee).data {
                cangjie_ast::NodeData::Ref { target: Some(target), .. } => ast
                    .get(*target)
                    .map(|d| {
                        d.kind == NodeKind::FuncDecl
                            && d.flags.has(NodeFlags::CONST)
                            && d.flags.has(NodeFlags::GLOBAL)
                    })
                    .unwrap_or(false),
                _ => false,
            };
            callee_const && children.all(|arg| is_const_evaluable(ast, *arg))
        }
        _ => false,
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

    #[test]
    fn content_between_is_inclusive() {
        let src = "var x = 1 + 2 * 3";
        let range = Range::new(pos(1, 13), pos(1, 17));
        assert_eq!(content_between(src, range), "2 * 3");
    }

    #[test]
    fn indent_is_taken_from_the_line() {
        let src = "func f() {\n    var x = 1\n}";
        assert_eq!(indent_at(src, pos(2, 5)), "    ");
    }

    #[test]
    fn anchor_finds_preceding_brace() {
        let (_, tokens, _) = parse_file(1, "/t/a.cj", "func f(){ var x = 1 }");
        let anchor = must_some(same_line_anchor(&tokens, pos(1, 11)));
        assert_eq!(anchor.value, "{");
    }

    #[test]
    fn const_evaluable_accepts_literals_and_const_refs() {
        let (mut files, _) = parse_and_check("const base = 10\nfunc f() { var x = base + 1 }");
        let ast = &files.remove(0).ast;
        // find the binary expr `base + 1`
        let mut found = false;
        cangjie_ast::walk_from(ast, &mut |n| {
            if n.kind == NodeKind::BinaryExpr {
                found = is_const_evaluable(ast, n.id);
                return cangjie_ast::WalkAction::Stop;
            }
            cangjie_ast::WalkAction::WalkChildren
        });
        assert!(found);
    }

    #[test]
    fn const_evaluable_rejects_plain_vars() {
        let (mut files, _) = parse_and_check("func f(n: Int) { var x = n + 1 }");
        let ast = &files.remove(0).ast;
        let mut verdict = true;
        cangjie_ast::walk_from(ast, &mut |n| {
            if n.kind == NodeKind::BinaryExpr {
                verdict = is_const_evaluable(ast, n.id);
                return cangjie_ast::WalkAction::Stop;
            }
            cangjie_ast::WalkAction::WalkChildren
        });
        assert!(!verdict);
    }

    fn parse_and_check(text: &str) -> (Vec<cangjie_parse::ParsedFile>, Vec<cangjie_ast::Diagnostic>) {
        use cangjie_parse::{Frontend, ReferenceFrontend, SourceFile};
        let frontend = ReferenceFrontend;
        let mut files = vec![frontend.parse(&SourceFile {
            path: "/t/a.cj".to_string(),
            text: text.to_string(),
            file_id: 1,
        })];
        let diags = frontend.typecheck(&mut files);
        (files, diags)
    }
}
