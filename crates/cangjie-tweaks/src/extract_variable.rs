//! Extract a selected expression into a local variable.

use crate::edits::TextEdit;
use crate::engine::{Effect, Tweak, TweakSelection, common_check};
use crate::utils::{
    content_between, enclosing_block_stmt, enclosing_do_while_cond, exclusive,
    global_insert_pos_before, same_line_anchor, spaces,
};
use cangjie_ast::{NodeData, NodeFlags, NodeKind, Range, WalkAction};
use cangjie_selection::Selection;
use std::collections::BTreeMap;

/// Error codes recorded when `prepare` rejects a selection.
#[repr(i32)]
enum ExtractVariableError {
    FailGetRootExpr = 10,
    InvalidCodeSegment = 11,
    InvalidExpr = 12,
}

const CANNOT_EXTRACT: &[NodeKind] = &[
    NodeKind::Block,
    NodeKind::StrInterpolationExpr,
    NodeKind::InterpolationExpr,
];

const INVALID_PARTIAL: &[NodeKind] = &[
    NodeKind::IfExpr,
    NodeKind::DoWhileExpr,
    NodeKind::TryExpr,
    NodeKind::Block,
];

/// `Extract to variable`.
pub struct ExtractVariable;

impl Tweak for ExtractVariable {
    fn id(&self) -> &'static str {
        "ExtractVariable"
    }

    fn title(&self) -> String {
        "Extract to variable".to_string()
    }

    fn kind(&self) -> &'static str {
        "refactor.extract.variable"
    }

    fn prepare(&self, sel: &TweakSelection<'_>, extra: &mut BTreeMap<String, String>) -> bool {
        if !common_check(sel, extra) {
            return false;
        }
        let Some(root) = sel.tree.root() else {
            return false;
        };
        let root_node = sel.ast.ast.node(root.node);

        if root.selected == Selection::Complete {
            if CANNOT_EXTRACT.contains(&root_node.kind) {
                record(extra, ExtractVariableError::InvalidCodeSegment);
                return false;
            }
            if root_node.kind.is_expr() {
                return true;
            }
            record(extra, ExtractVariableError::FailGetRootExpr);
            return false;
        }
        if INVALID_PARTIAL.contains(&root_node.kind) && root.selected == Selection::Partial {
            record(extra, ExtractVariableError::FailGetRootExpr);
            return false;
        }

        // A partial root is fine only if every Complete node directly
        // below is itself an expression.
        let mut valid = true;
        let ast = &sel.ast.ast;
        let mut at_root = true;
        sel.tree.walk_all(&mut |tree_node| {
            if at_root {
                at_root = false;
                return WalkAction::WalkChildren;
            }
            if tree_node.selected == Selection::Complete {
                if !ast.node(tree_node.node).kind.is_expr() {
                    valid = false;
                    record(extra, ExtractVariableError::InvalidExpr);
                    return WalkAction::Stop;
                }
                return WalkAction::SkipChildren;
            }
            WalkAction::WalkChildren
        });
        valid
    }

    fn apply(&self, sel: &TweakSelection<'_>) -> Option<Effect> {
        let var_name = sel
            .extra_options
            .get("suggestName")
            .cloned()
            .unwrap_or_else(|| "newVariable".to_string());

        let range = extraction_range(sel)?;
        if range.start.is_zero() || range.start == range.end {
            return None;
        }
        let insert = insert_declaration(sel, range, &var_name)?;
        let replace = TextEdit::replace(exclusive(range), var_name);

        let uri = cangjie_uri::fs_path_to_uri(&sel.ast.path)
            .unwrap_or_else(|_| format!("file://{}", sel.ast.path));
        Some(Effect::default().with_edits(uri, vec![insert, replace]))
    }
}

fn record(extra: &mut BTreeMap<String, String>, code: ExtractVariableError) {
    extra.insert("ErrorCode".to_string(), (code as i32).to_string());
}

/// The extent to extract: the root when fully selected, otherwise the
/// union of the outermost `Complete` expressions.
fn extraction_range(sel: &TweakSelection<'_>) -> Option<Range> {
    let root = sel.tree.root()?;
    let ast = &sel.ast.ast;
    if root.selected == Selection::Complete {
        let node = ast.node(root.node);
        return Some(Range::new(node.begin, node.end));
    }
    let mut range: Option<Range> = None;
    let mut at_root = true;
    sel.tree.walk_all(&mut |tree_node| {
        if at_root {
            at_root = false;
            return WalkAction::WalkChildren;
        }
        if tree_node.selected == Selection::Complete {
            let node = ast.node(tree_node.node);
            if node.kind.is_expr() {
                range = Some(match range {
                    None => Range::new(node.begin, node.end),
                    Some(r) => Range::new(r.start.min(node.begin), r.end.max(node.end)),
                });
            }
        }
        WalkAction::WalkChildren
    });
    range
}

/// Build the `var name = <expr>` insertion, picking the insert site per
/// the surrounding shape.
fn insert_declaration(sel: &TweakSelection<'_>, range: Range, var_name: &str) -> Option<TextEdit> {
    let ast = &sel.ast.ast;
    let source_code = content_between(sel.source, range);
    let modifier = var_modifier(sel, range);
    // Assignments extract parenthesized so the value keeps its meaning.
    let root_is_assign = sel.tree.root().is_some_and(|r| {
        r.selected == Selection::Complete && ast.node(r.node).kind == NodeKind::AssignExpr
    });

    let keyword =
        if modifier.contains("const") { modifier.clone() } else { format!("{modifier}var ") };
    let rhs = if root_is_assign { format!("({source_code})") } else { source_code };
    let decl = format!("{keyword}{var_name} = {rhs}");

    // Interpolated selections hoist out of the whole string's statement.
    let anchor_range = match sel.tree.outer_interp() {
        Some(interp) => {
            let node = ast.node(interp);
            Range::new(node.begin, node.end)
        }
        None => range,
    };

    // do-while conditions hoist before the `do`.
    if let Some(target) = sel.tree.target_decl() {
        if let Some(dw) = enclosing_do_while_cond(ast, target, anchor_range) {
            let begin = ast.node(dw).begin;
            return Some(TextEdit::insert(begin, format!("{decl}\n{}", spaces(begin.column))));
        }
    }

    // Normal path: before the enclosing block statement.
    if let Some(target) = sel.tree.target_decl() {
        if let Some((_, stmt)) = enclosing_block_stmt(ast, target, anchor_range) {
            let begin = ast.node(stmt).begin;
            // Statements sharing a line with `{`, `;` or `=>` insert after
            // the anchor token instead of the line start.
            if let Some(anchor) = same_line_anchor(&sel.ast.tokens, begin) {
                let mut at = anchor.end;
                at.column += 1;
                return Some(TextEdit::insert(at, format!(" {decl}\n ")));
            }
            return Some(TextEdit::insert(begin, format!("{decl}\n{}", spaces(begin.column))));
        }
    }

    // Global scope: before the containing top-level declaration.
    let at = global_insert_pos_before(ast, anchor_range)?;
    Some(TextEdit::insert(at, format!("{decl}\n")))
}

/// `static `/`const ` when the enclosing assignment target or variable
/// declaration carries them.
fn var_modifier(sel: &TweakSelection<'_>, range: Range) -> String {
    let ast = &sel.ast.ast;
    let Some(top) = sel.tree.top_decl() else {
        return String::new();
    };
    let mut modifier = String::new();
    cangjie_ast::walk(ast, top, &mut |node| {
        if node.begin > range.end || node.end < range.start {
            return WalkAction::SkipChildren;
        }
        if node.flags.has(NodeFlags::IN_MACRO) || node.flags.has(NodeFlags::COMPILER_ADD) {
            return WalkAction::SkipChildren;
        }
        if node.begin <= range.start && node.end >= range.end {
            match (&node.kind, &node.data) {
                (NodeKind::VarDecl, _) => {
                    let mut m = String::new();
                    if node.flags.has(NodeFlags::STATIC) {
                        m.push_str("static ");
                    }
                    if node.flags.has(NodeFlags::CONST) {
                        m.push_str("const ");
                    }
                    modifier = m;
                }
                (NodeKind::AssignExpr, NodeData::Assign { .. }) => {
                    // Inherit from the assignment target's declaration.
                    if let Some(lhs) = node.children.first() {
                        if let NodeData::Ref { target: Some(target), .. } = &ast.node(*lhs).data {
                            if let Some(decl) = ast.get(*target) {
                                let mut m = String::new();
                                if decl.flags.has(NodeFlags::STATIC) {
                                    m.push_str("static ");
                                }
                                if decl.flags.has(NodeFlags::CONST) {
                                    m.push_str("const ");
                                }
                                modifier = m;
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        WalkAction::WalkChildren
    });
    modifier
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edits::apply_text_edits;
    use crate::engine::TweakSelection;
    use cangjie_ast::Position;
    use cangjie_parse::{Frontend, ReferenceFrontend, SourceFile};
    use cangjie_project::ArkAst;
    use cangjie_selection::SelectionTree;
    use cangjie_testkit::must_some;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn snapshot(text: &str) -> ArkAst {
        let frontend = ReferenceFrontend;
        let mut files = vec![frontend.parse(&SourceFile {
            path: "/t/main.cj".to_string(),
            text: text.to_string(),
            file_id: 1,
        })];
        frontend.typecheck(&mut files);
        let file = files.remove(0);
        ArkAst {
            file_id: 1,
            path: file.path,
            version: 1,
            tokens: file.tokens,
            ast: Arc::new(file.ast),
            package: "demo.core".to_string(),
            sema_cache: None,
            diagnostics: file.diagnostics,
        }
    }

    fn selection<'a>(ast: &'a ArkAst, source: &'a str, range: Range) -> TweakSelection<'a> {
        let tree = must_some(SelectionTree::build(&ast.ast, range.start, range.end));
        TweakSelection {
            ast,
            source,
            range,
            tree,
            extra_options: BTreeMap::new(),
        }
    }

    fn pos(line: u32, column: u32) -> Position {
        Position::new(1, line, column)
    }

    fn apply_to(text: &str, range: Range) -> String {
        let ast = snapshot(text);
        let sel = selection(&ast, text, range);
        let mut extra = BTreeMap::new();
        assert!(ExtractVariable.prepare(&sel, &mut extra), "prepare failed: {extra:?}");
        let effect = must_some(ExtractVariable.apply(&sel));
        let edits = must_some(effect.edits_by_uri.values().next());
        apply_text_edits(text, edits)
    }

    #[test]
    fn extracts_from_single_line_function() {
        // The seed scenario: select `2 * 3`.
        let text = "func f(){ var x = 1 + 2 * 3 }";
        let out = apply_to(text, Range::new(pos(1, 23), pos(1, 27)));
        assert_eq!(out, "func f(){ var newVariable = 2 * 3\n  var x = 1 + newVariable }");
    }

    #[test]
    fn extracts_onto_own_line_with_indent() {
        let text = "func f() {\n    var x = 1 + 2 * 3\n}";
        let out = apply_to(text, Range::new(pos(2, 17), pos(2, 21)));
        assert_eq!(
            out,
            "func f() {\n    var newVariable = 2 * 3\n    var x = 1 + newVariable\n}"
        );
    }

    #[test]
    fn suggested_name_is_honored() {
        let text = "func f() {\n    var x = 9 + 1\n}";
        let ast = snapshot(text);
        let range = Range::new(pos(2, 13), pos(2, 17));
        let mut sel = selection(&ast, text, range);
        sel.extra_options.insert("suggestName".to_string(), "sum".to_string());
        let effect = must_some(ExtractVariable.apply(&sel));
        let edits = must_some(effect.edits_by_uri.values().next());
        let out = apply_text_edits(text, edits);
        assert!(out.contains("var sum = 9 + 1"), "{out}");
    }

    #[test]
    fn do_while_condition_hoists_before_do() {
        let text = "func f() {\n    do { step() } while (count() > 0)\n}";
        // select `count() > 0`
        let out = apply_to(text, Range::new(pos(2, 26), pos(2, 36)));
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[1].trim_start().starts_with("var newVariable = count() > 0"), "{out}");
        assert!(lines[2].trim_start().starts_with("do"), "{out}");
    }

    #[test]
    fn rejects_empty_selection() {
        let text = "func f() { var x = 1 }";
        let ast = snapshot(text);
        let range = Range::new(pos(1, 20), pos(1, 20));
        let tree = SelectionTree::build(&ast.ast, range.start, range.end);
        // The empty range still builds a tree over the literal, but the
        // common rule rejects it.
        if let Some(tree) = tree {
            let sel = TweakSelection {
                ast: &ast,
                source: text,
                range,
                tree,
                extra_options: BTreeMap::new(),
            };
            let mut extra = BTreeMap::new();
            assert!(!ExtractVariable.prepare(&sel, &mut extra));
            assert_eq!(extra.get("ErrorCode"), Some(&"1".to_string()));
        }
    }

    #[test]
    fn rejects_block_selection() {
        let text = "func f() { var x = 1 }";
        let ast = snapshot(text);
        // Select the whole block `{ var x = 1 }`.
        let range = Range::new(pos(1, 10), pos(1, 22));
        let sel = selection(&ast, text, range);
        let mut extra = BTreeMap::new();
        assert!(!ExtractVariable.prepare(&sel, &mut extra));
    }

    #[test]
    fn const_modifier_is_inherited() {
        let text = "func f() {\n    const limit = 2 + 3\n}";
        let out = apply_to(text, Range::new(pos(2, 19), pos(2, 23)));
        assert!(out.contains("const newVariable = 2 + 3"), "{out}");
    }
}
