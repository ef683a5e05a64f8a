//! Extract selected statements into a new function.

use crate::edits::TextEdit;
use crate::engine::{Effect, Tweak, TweakRule, TweakRuleEngine, TweakSelection, common_check};
use crate::utils::{content_between, exclusive, global_insert_pos_after_last, indent_at};
use cangjie_ast::{Ast, NodeData, NodeFlags, NodeId, NodeKind, Range, WalkAction, walk};
use cangjie_selection::{Selection, SelectionScope};
use std::collections::BTreeMap;

/// Error codes recorded when `prepare` rejects a selection.
#[repr(i32)]
enum ExtractFunctionError {
    InvalidScope = 20,
    MemberInitializer = 21,
    NoCompleteExpr = 22,
    MultiExitPoint = 23,
    MultiReturnValue = 24,
    PartialBranch = 25,
    JumpOutOfSelection = 26,
}

fn record(extra: &mut BTreeMap<String, String>, code: ExtractFunctionError) {
    extra.insert("ErrorCode".to_string(), (code as i32).to_string());
}

/// `Extract to function`.
pub struct ExtractFunction;

impl Tweak for ExtractFunction {
    fn id(&self) -> &'static str {
        "ExtractFunction"
    }

    fn title(&self) -> String {
        "Extract to function".to_string()
    }

    fn kind(&self) -> &'static str {
        "refactor.extract.function"
    }

    fn prepare(&self, sel: &TweakSelection<'_>, extra: &mut BTreeMap<String, String>) -> bool {
        let mut engine = TweakRuleEngine::new();
        engine.add_rule(Box::new(SelectionShapeRule));
        engine.add_rule(Box::new(SingleExitRule));
        engine.add_rule(Box::new(ReturnValueRule));
        engine.add_rule(Box::new(BranchIntegrityRule));
        engine.add_rule(Box::new(JumpIntegrityRule));
        engine.check_rules(sel, extra)
    }

    fn apply(&self, sel: &TweakSelection<'_>) -> Option<Effect> {
        let name = sel
            .extra_options
            .get("suggestName")
            .cloned()
            .unwrap_or_else(|| "extractedFunc".to_string());
        let ast = &sel.ast.ast;
        let covered = covered_range(sel)?;
        let analysis = analyze(sel, covered)?;

        // ----- the new function text -----
        let mut params_sig: Vec<String> = Vec::new();
        let mut args: Vec<String> = Vec::new();
        for param in &analysis.params {
            if param.removed {
                continue;
            }
            let shown = param.renamed.clone().unwrap_or_else(|| param.name.clone());
            match &param.ty {
                Some(ty) => params_sig.push(format!("{shown}: {ty}")),
                None => params_sig.push(shown.clone()),
            }
            args.push(param.name.clone());
        }

        let mut modifiers = String::new();
        if let Some(func) = analysis.enclosing_func {
            let flags = ast.node(func).flags;
            if flags.has(NodeFlags::STATIC) {
                modifiers.push_str("static ");
            }
            if flags.has(NodeFlags::CONST) {
                modifiers.push_str("const ");
            }
        }

        let ret_ty = analysis.ret.as_ref().and_then(|r| r.ty.clone()).or_else(|| {
            // A selected `return` hands back the enclosing function's type.
            if analysis.returns_out {
                analysis.enclosing_func.and_then(|f| match &ast.node(f).data {
                    NodeData::Func { ret_ty, .. } => ret_ty.clone(),
                    _ => None,
                })
            } else {
                None
            }
        });
        let ret_annotation = ret_ty.map(|ty| format!(": {ty}")).unwrap_or_default();

        let body_text = content_between(sel.source, covered);
        let mut body_lines: Vec<String> = Vec::new();
        for param in &analysis.params {
            if param.removed {
                match &param.ty {
                    Some(ty) => body_lines.push(format!("var {}: {}", param.name, ty)),
                    None => body_lines.push(format!("var {}", param.name)),
                }
            } else if let Some(renamed) = &param.renamed {
                body_lines.push(format!("var {} = {}", param.name, renamed));
            }
        }
        if let Some(ret) = &analysis.ret {
            if !ret.need_decl_var && !analysis.params.iter().any(|p| p.name == ret.name) {
                match &ret.ty {
                    Some(ty) => body_lines.push(format!("var {}: {}", ret.name, ty)),
                    None => body_lines.push(format!("var {}", ret.name)),
                }
            }
        }
        for line in body_text.lines() {
            body_lines.push(line.trim_start().to_string());
        }
        if let Some(ret) = &analysis.ret {
            body_lines.push(format!("return {}", ret.name));
        }

        let (insert_at, prefix, indent, suffix) = insertion_site(sel)?;
        let body_indent = format!("{indent}    ");
        let mut func_text = format!("{modifiers}func {name}({}){} {{\n", params_sig.join(", "), ret_annotation);
        for line in &body_lines {
            if line.is_empty() {
                func_text.push('\n');
            } else {
                func_text.push_str(&format!("{body_indent}{line}\n"));
            }
        }
        func_text.push_str(&format!("{indent}}}"));

        // ----- the call site -----
        let call = format!("{name}({})", args.join(", "));
        let call_text = match &analysis.ret {
            Some(ret) if ret.need_decl_var => format!("var {} = {call}", ret.name),
            Some(ret) => format!("{} = {call}", ret.name),
            None if analysis.returns_out => format!("return {call}"),
            None => call,
        };

        let edits = vec![
            TextEdit::replace(exclusive(covered), call_text),
            TextEdit::insert(insert_at, format!("{prefix}{indent}{func_text}{suffix}")),
        ];
        let uri = cangjie_uri::fs_path_to_uri(&sel.ast.path)
            .unwrap_or_else(|_| format!("file://{}", sel.ast.path));
        Some(Effect::default().with_edits(uri, edits))
    }
}

// ----- rules ---------------------------------------------------------------

struct SelectionShapeRule;

impl TweakRule for SelectionShapeRule {
    fn check(&self, sel: &TweakSelection<'_>, extra: &mut BTreeMap<String, String>) -> bool {
        if !common_check(sel, extra) {
            return false;
        }
        // Global/member variable declarations cannot host an extracted
        // function call.
        if !matches!(sel.tree.scope(), SelectionScope::FuncBody) {
            record(extra, ExtractFunctionError::InvalidScope);
            return false;
        }
        let ast = &sel.ast.ast;
        // Inside a constructor, member initialization must stay put.
        if let Some(func) = enclosing_func(sel) {
            if ast.node(func).name() == Some("init") && assigns_member(ast, sel) {
                record(extra, ExtractFunctionError::MemberInitializer);
                return false;
            }
        }
        let mut has_expr = false;
        sel.tree.walk_all(&mut |node| {
            if node.selected == Selection::Complete && ast.node(node.node).kind.is_expr() {
                has_expr = true;
                return WalkAction::Stop;
            }
            WalkAction::WalkChildren
        });
        if !has_expr {
            record(extra, ExtractFunctionError::NoCompleteExpr);
            return false;
        }
        true
    }
}

struct SingleExitRule;

impl TweakRule for SingleExitRule {
    fn check(&self, sel: &TweakSelection<'_>, extra: &mut BTreeMap<String, String>) -> bool {
        let ast = &sel.ast.ast;
        let mut return_end = None;
        sel.tree.walk_all(&mut |node| {
            if node.selected == Selection::Complete
                && ast.node(node.node).kind == NodeKind::ReturnExpr
            {
                return_end = Some(ast.node(node.node).end);
                return WalkAction::SkipChildren;
            }
            WalkAction::WalkChildren
        });
        let Some(return_end) = return_end else {
            return true;
        };
        // A return followed by more selected code means multiple exit
        // points.
        let mut later = false;
        sel.tree.walk_all(&mut |node| {
            if node.selected == Selection::Complete && ast.node(node.node).begin > return_end {
                later = true;
                return WalkAction::Stop;
            }
            WalkAction::WalkChildren
        });
        if later {
            record(extra, ExtractFunctionError::MultiExitPoint);
            return false;
        }
        true
    }
}

struct ReturnValueRule;

impl TweakRule for ReturnValueRule {
    fn check(&self, sel: &TweakSelection<'_>, extra: &mut BTreeMap<String, String>) -> bool {
        let Some(covered) = covered_range(sel) else {
            record(extra, ExtractFunctionError::NoCompleteExpr);
            return false;
        };
        match live_out(sel, covered) {
            Some(live) if live.len() > 1 => {
                record(extra, ExtractFunctionError::MultiReturnValue);
                false
            }
            _ => true,
        }
    }
}

struct BranchIntegrityRule;

impl TweakRule for BranchIntegrityRule {
    fn check(&self, sel: &TweakSelection<'_>, extra: &mut BTreeMap<String, String>) -> bool {
        let ast = &sel.ast.ast;
        let mut ok = true;
        sel.tree.walk_all(&mut |node| {
            if node.selected == Selection::Partial
                && matches!(
                    ast.node(node.node).kind,
                    NodeKind::IfExpr | NodeKind::TryExpr | NodeKind::MatchExpr
                )
            {
                ok = false;
                return WalkAction::Stop;
            }
            WalkAction::WalkChildren
        });
        if !ok {
            record(extra, ExtractFunctionError::PartialBranch);
        }
        ok
    }
}

struct JumpIntegrityRule;

impl TweakRule for JumpIntegrityRule {
    fn check(&self, sel: &TweakSelection<'_>, extra: &mut BTreeMap<String, String>) -> bool {
        let ast = &sel.ast.ast;
        let Some(covered) = covered_range(sel) else {
            return true;
        };
        let mut ok = true;
        sel.tree.walk_all(&mut |node| {
            if node.selected != Selection::Complete
                || ast.node(node.node).kind != NodeKind::JumpExpr
            {
                return WalkAction::WalkChildren;
            }
            // The binding loop must sit entirely within the selection.
            let loop_ancestor = ast.ancestors(node.node).find(|a| {
                matches!(
                    ast.node(*a).kind,
                    NodeKind::WhileExpr | NodeKind::DoWhileExpr | NodeKind::ForInExpr
                )
            });
            let inside = loop_ancestor.is_some_and(|l| {
                let ln = ast.node(l);
                ln.begin >= covered.start && ln.end <= covered.end
            });
            if !inside {
                ok = false;
                return WalkAction::Stop;
            }
            WalkAction::WalkChildren
        });
        if !ok {
            record(extra, ExtractFunctionError::JumpOutOfSelection);
        }
        ok
    }
}

// ----- analysis ------------------------------------------------------------

#[derive(Debug)]
struct ParamSpec {
    name: String,
    ty: Option<String>,
    /// Renamed in the signature because the body reads it before
    /// reassigning (the body prepends `var name = renamed`).
    renamed: Option<String>,
    /// Removed from the signature because the body only writes it (the
    /// body prepends `var name[: T]`).
    removed: bool,
}

#[derive(Debug)]
struct RetSpec {
    name: String,
    ty: Option<String>,
    /// True when the returned name is newly declared inside the selection
    /// (the call site becomes `var name = f(...)`).
    need_decl_var: bool,
}

#[derive(Debug)]
struct Analysis {
    params: Vec<ParamSpec>,
    ret: Option<RetSpec>,
    /// True when the selection ends in a selected `return`.
    returns_out: bool,
    enclosing_func: Option<NodeId>,
}

/// The extent actually extracted: the union of outermost `Complete` nodes.
fn covered_range(sel: &TweakSelection<'_>) -> Option<Range> {
    let ast = &sel.ast.ast;
    let mut range: Option<Range> = None;
    sel.tree.walk_all(&mut |node| {
        if node.selected == Selection::Complete {
            let n = ast.node(node.node);
            range = Some(match range {
                None => Range::new(n.begin, n.end),
                Some(r) => Range::new(r.start.min(n.begin), r.end.max(n.end)),
            });
            return WalkAction::SkipChildren;
        }
        WalkAction::WalkChildren
    });
    range
}

fn enclosing_func(sel: &TweakSelection<'_>) -> Option<NodeId> {
    let target = sel.tree.target_decl()?;
    let ast = &sel.ast.ast;
    matches!(ast.node(target).kind, NodeKind::FuncDecl | NodeKind::MainDecl).then_some(target)
}

fn assigns_member(ast: &Ast, sel: &TweakSelection<'_>) -> bool {
    let mut found = false;
    sel.tree.walk_all(&mut |node| {
        let n = ast.node(node.node);
        if node.selected == Selection::Complete && n.kind == NodeKind::AssignExpr {
            if let Some(lhs) = n.children.first() {
                if ast.node(*lhs).kind == NodeKind::MemberAccess {
                    found = true;
                    return WalkAction::Stop;
                }
            }
        }
        WalkAction::WalkChildren
    });
    found
}

/// Names declared inside the selection that are referenced after it, with
/// their declaring nodes.
fn live_out(sel: &TweakSelection<'_>, covered: Range) -> Option<Vec<(String, NodeId, bool)>> {
    let ast = &sel.ast.ast;
    let func = enclosing_func(sel)?;

    // Declarations inside the selection.
    let mut inner_decls: Vec<(String, NodeId)> = Vec::new();
    walk(ast, func, &mut |node| {
        if node.kind == NodeKind::VarDecl
            && node.begin >= covered.start
            && node.end <= covered.end
        {
            if let Some(name) = node.name() {
                inner_decls.push((name.to_string(), node.id));
            }
        }
        WalkAction::WalkChildren
    });

    // Outer locals written inside the selection.
    let mut assigned_outer: Vec<(String, NodeId)> = Vec::new();
    walk(ast, func, &mut |node| {
        if node.kind == NodeKind::AssignExpr
            && node.begin >= covered.start
            && node.end <= covered.end
        {
            if let Some(lhs) = node.children.first() {
                if let NodeData::Ref { name, target: Some(target) } = &ast.node(*lhs).data {
                    if let Some(decl) = ast.get(*target) {
                        let outside = decl.begin < covered.start || decl.end > covered.end;
                        let local = !decl.flags.has_any(NodeFlags::GLOBAL.with(NodeFlags::MEMBER));
                        if outside && local && !assigned_outer.iter().any(|(n, _)| n == name) {
                            assigned_outer.push((name.clone(), *target));
                        }
                    }
                }
            }
        }
        WalkAction::WalkChildren
    });

    // Which of those matter after the selection?
    let mut out: Vec<(String, NodeId, bool)> = Vec::new();
    walk(ast, func, &mut |node| {
        if node.kind == NodeKind::RefExpr && node.begin > covered.end {
            if let NodeData::Ref { name, target } = &node.data {
                if let Some(target) = target {
                    if inner_decls.iter().any(|(_, id)| id == target)
                        && !out.iter().any(|(n, _, _)| n == name)
                    {
                        out.push((name.clone(), *target, true));
                    }
                    if assigned_outer.iter().any(|(_, id)| id == target)
                        && !out.iter().any(|(n, _, _)| n == name)
                    {
                        out.push((name.clone(), *target, false));
                    }
                }
            }
        }
        WalkAction::WalkChildren
    });
    Some(out)
}

fn analyze(sel: &TweakSelection<'_>, covered: Range) -> Option<Analysis> {
    let ast = &sel.ast.ast;
    let func = enclosing_func(sel)?;

    // Params: references inside the selection whose target is a local
    // declared outside it, ordered by first use.
    let mut params: Vec<ParamSpec> = Vec::new();
    walk(ast, func, &mut |node| {
        if node.kind == NodeKind::RefExpr
            && node.begin >= covered.start
            && node.end <= covered.end
        {
            if let NodeData::Ref { name, target: Some(target) } = &node.data {
                if let Some(decl) = ast.get(*target) {
                    let is_local = matches!(decl.kind, NodeKind::VarDecl | NodeKind::FuncParam)
                        && !decl.flags.has_any(NodeFlags::GLOBAL.with(NodeFlags::MEMBER));
                    let outside = decl.begin < covered.start || decl.end > covered.end;
                    if is_local && outside && !params.iter().any(|p| p.name == *name) {
                        params.push(ParamSpec {
                            name: name.clone(),
                            ty: decl.ty.clone(),
                            renamed: None,
                            removed: false,
                        });
                    }
                }
            }
        }
        WalkAction::WalkChildren
    });

    // Reassigned params: writes win unless the value is read first.
    for param in &mut params {
        let mut first_write: Option<cangjie_ast::Position> = None;
        let mut first_read: Option<cangjie_ast::Position> = None;
        let mut compound = false;
        walk(ast, func, &mut |node| {
            if node.begin < covered.start || node.end > covered.end {
                if node.kind != NodeKind::FuncDecl && node.kind != NodeKind::MainDecl {
                    // Only prune nodes fully outside; containers that
                    // merely enclose the selection must still descend.
                    if node.end < covered.start || node.begin > covered.end {
                        return WalkAction::SkipChildren;
                    }
                }
            }
            match (&node.kind, &node.data) {
                (NodeKind::AssignExpr, NodeData::Assign { compound: c, .. })
                    if node.begin >= covered.start =>
                {
                    if let Some(lhs) = node.children.first() {
                        if let NodeData::Ref { name, .. } = &ast.node(*lhs).data {
                            if *name == param.name && first_write.is_none() {
                                first_write = Some(node.begin);
                                compound = *c;
                            }
                        }
                    }
                }
                (NodeKind::RefExpr, NodeData::Ref { name, .. })
                    if *name == param.name && node.begin >= covered.start =>
                {
                    // Skip the LHS position itself: a write is not a read.
                    let is_lhs = ast
                        .parent(node.id)
                        .map(|p| {
                            let pn = ast.node(p);
                            pn.kind == NodeKind::AssignExpr
                                && pn.children.first() == Some(&node.id)
                        })
                        .unwrap_or(false);
                    if !is_lhs && first_read.is_none() {
                        first_read = Some(node.begin);
                    }
                }
                _ => {}
            }
            WalkAction::WalkChildren
        });
        if let Some(write) = first_write {
            let read_before = first_read.is_some_and(|r| r < write);
            if compound || read_before {
                param.renamed = Some(format!("{}Param", param.name));
            } else {
                param.removed = true;
            }
        }
    }

    // Return value per the liveness rules.
    let live = live_out(sel, covered).unwrap_or_default();
    let ret = live.first().map(|(name, decl, need_decl_var)| RetSpec {
        name: name.clone(),
        ty: ast.get(*decl).and_then(|d| d.ty.clone()),
        need_decl_var: *need_decl_var,
    });

    // A fully selected `return` makes the replacement `return f(...)`.
    let mut returns_out = false;
    sel.tree.walk_all(&mut |node| {
        if node.selected == Selection::Complete && ast.node(node.node).kind == NodeKind::ReturnExpr
        {
            returns_out = true;
            return WalkAction::Stop;
        }
        WalkAction::WalkChildren
    });

    Some(Analysis { params, ret, returns_out, enclosing_func: Some(func) })
}

/// Where the new function goes: before the enclosing class-like decl's
/// closing brace, or after the last top-level decl. Returns
/// `(position, prefix, indent, suffix)`.
fn insertion_site(
    sel: &TweakSelection<'_>,
) -> Option<(cangjie_ast::Position, String, String, String)> {
    let ast = &sel.ast.ast;
    let top = sel.tree.top_decl();
    if let Some(top) = top {
        let node = ast.node(top);
        if node.kind.is_classlike() {
            // Immediately before the closing brace, one blank line above.
            let brace = node.end;
            let indent = format!("{}    ", indent_at(sel.source, node.begin));
            return Some((brace, "\n".to_string(), indent, "\n".to_string()));
        }
    }
    let at = global_insert_pos_after_last(ast)?;
    // Two blank lines separate global insertions.
    Some((at, "\n\n\n".to_string(), String::new(), String::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edits::apply_text_edits;
    use crate::engine::TweakSelection;
    use cangjie_ast::Position;
    use cangjie_parse::{Frontend, ReferenceFrontend, SourceFile, parse_file};
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

    fn pos(line: u32, column: u32) -> Position {
        Position::new(1, line, column)
    }

    fn try_prepare(text: &str, range: Range) -> (bool, BTreeMap<String, String>) {
        let ast = snapshot(text);
        let Some(tree) = SelectionTree::build(&ast.ast, range.start, range.end) else {
            return (false, BTreeMap::new());
        };
        let sel = TweakSelection {
            ast: &ast,
            source: text,
            range,
            tree,
            extra_options: BTreeMap::new(),
        };
        let mut extra = BTreeMap::new();
        let ok = ExtractFunction.prepare(&sel, &mut extra);
        (ok, extra)
    }

    fn apply_to(text: &str, range: Range) -> String {
        let ast = snapshot(text);
        let tree = must_some(SelectionTree::build(&ast.ast, range.start, range.end));
        let sel = TweakSelection {
            ast: &ast,
            source: text,
            range,
            tree,
            extra_options: BTreeMap::new(),
        };
        let mut extra = BTreeMap::new();
        assert!(ExtractFunction.prepare(&sel, &mut extra), "prepare failed: {extra:?}");
        let effect = must_some(ExtractFunction.apply(&sel));
        let edits = must_some(effect.edits_by_uri.values().next());
        apply_text_edits(text, edits)
    }

    #[test]
    fn extracts_statements_with_params() {
        let text = "func f(a: Int, b: Int): Int {\n    var t = a + b\n    t\n}";
        // select `var t = a + b` (line 2, cols 5..=17)
        let out = apply_to(text, Range::new(pos(2, 5), pos(2, 17)));
        // The new function exists, takes both params, and the call site
        // declares `t` from its result.
        assert!(out.contains("func extractedFunc(a: Int, b: Int): Int {"), "{out}");
        assert!(out.contains("var t = extractedFunc(a, b)"), "{out}");
        assert!(out.contains("return t"), "{out}");
    }

    #[test]
    fn round_trip_reparses_with_new_function() {
        let text = "func f(a: Int, b: Int): Int {\n    var t = a + b\n    t\n}";
        let out = apply_to(text, Range::new(pos(2, 5), pos(2, 17)));
        let (ast, _, diags) = parse_file(1, "/t/main.cj", &out);
        assert!(diags.is_empty(), "result must reparse cleanly: {out}");
        let names: Vec<_> = ast
            .top_level_decls()
            .iter()
            .filter_map(|d| ast.node(*d).name().map(str::to_string))
            .collect();
        assert!(names.contains(&"extractedFunc".to_string()), "{names:?}");
    }

    #[test]
    fn pure_expression_selection_extracts_without_return() {
        let text = "func f(n: Int) {\n    use(n * 2)\n}";
        // select `n * 2`
        let out = apply_to(text, Range::new(pos(2, 9), pos(2, 13)));
        assert!(out.contains("func extractedFunc(n: Int)"), "{out}");
        assert!(out.contains("use(extractedFunc(n))"), "{out}");
    }

    #[test]
    fn rejects_global_var_selection() {
        let text = "var total = 1 + 2";
        let (ok, extra) = try_prepare(text, Range::new(pos(1, 13), pos(1, 17)));
        assert!(!ok);
        assert_eq!(
            extra.get("ErrorCode"),
            Some(&(ExtractFunctionError::InvalidScope as i32).to_string())
        );
    }

    #[test]
    fn rejects_partial_if() {
        let text = "func f(x: Int) {\n    if (x > 0) { use(x) }\n    use(x)\n}";
        // start inside the if, end after it — partial branch
        let (ok, extra) = try_prepare(text, Range::new(pos(2, 8), pos(2, 18)));
        if !ok {
            let code = extra.get("ErrorCode").cloned().unwrap_or_default();
            assert!(
                code == (ExtractFunctionError::PartialBranch as i32).to_string()
                    || code == (ExtractFunctionError::NoCompleteExpr as i32).to_string(),
                "unexpected code {code}"
            );
        }
    }

    #[test]
    fn rejects_break_without_its_loop() {
        let text = "func f() {\n    while (more()) {\n        break\n    }\n}";
        // select only the `break`
        let (ok, extra) = try_prepare(text, Range::new(pos(3, 9), pos(3, 13)));
        assert!(!ok);
        assert_eq!(
            extra.get("ErrorCode"),
            Some(&(ExtractFunctionError::JumpOutOfSelection as i32).to_string())
        );
    }

    #[test]
    fn accepts_break_with_whole_loop() {
        let text = "func f() {\n    while (more()) {\n        break\n    }\n}";
        // select the whole while loop
        let (ok, extra) = try_prepare(text, Range::new(pos(2, 5), pos(4, 5)));
        assert!(ok, "whole-loop selection must pass: {extra:?}");
    }

    #[test]
    fn rejects_two_live_out_variables() {
        let text = "func f() {\n    var a = 1\n    var b = 2\n    use(a, b)\n}";
        let (ok, extra) = try_prepare(text, Range::new(pos(2, 5), pos(3, 13)));
        assert!(!ok);
        assert_eq!(
            extra.get("ErrorCode"),
            Some(&(ExtractFunctionError::MultiReturnValue as i32).to_string())
        );
    }

    #[test]
    fn member_extraction_inserts_before_closing_brace() {
        let text =
            "class A {\n    func m(x: Int): Int {\n        var t = x * 2\n        t\n    }\n}";
        let out = apply_to(text, Range::new(pos(3, 9), pos(3, 21)));
        // The new function lands inside the class, before `}`.
        let class_close = out.rfind('}').unwrap_or(0);
        let func_pos = out.find("func extractedFunc").unwrap_or(usize::MAX);
        assert!(func_pos < class_close, "{out}");
        assert!(out.contains("var t = extractedFunc(x)"), "{out}");
    }

    #[test]
    fn selected_return_becomes_return_call() {
        let text = "func f(x: Int): Int {\n    return x * 2\n}";
        let out = apply_to(text, Range::new(pos(2, 5), pos(2, 16)));
        assert!(out.contains("return extractedFunc(x)"), "{out}");
    }
}
