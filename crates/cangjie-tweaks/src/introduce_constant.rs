//! Introduce a named constant for a constant-evaluable expression.

use crate::edits::TextEdit;
use crate::engine::{Effect, Tweak, TweakSelection, common_check};
use crate::utils::{content_between, exclusive, global_insert_pos_before, is_const_evaluable};
use cangjie_ast::Range;
use cangjie_selection::Selection;
use std::collections::BTreeMap;

/// Error codes recorded when `prepare` rejects a selection.
#[repr(i32)]
enum IntroduceConstantError {
    NotAnExpr = 30,
    NotConstEvaluable = 31,
}

/// `Introduce constant`.
pub struct IntroduceConstant;

impl Tweak for IntroduceConstant {
    fn id(&self) -> &'static str {
        "IntroduceConstant"
    }

    fn title(&self) -> String {
        "Introduce constant".to_string()
    }

    fn kind(&self) -> &'static str {
        "refactor.extract.constant"
    }

    fn prepare(&self, sel: &TweakSelection<'_>, extra: &mut BTreeMap<String, String>) -> bool {
        if !common_check(sel, extra) {
            return false;
        }
        let Some(root) = sel.tree.root() else {
            return false;
        };
        let ast = &sel.ast.ast;
        let node = ast.node(root.node);
        if root.selected != Selection::Complete || !node.kind.is_expr() {
            extra.insert(
                "ErrorCode".to_string(),
                (IntroduceConstantError::NotAnExpr as i32).to_string(),
            );
            return false;
        }
        if !is_const_evaluable(ast, root.node) {
            extra.insert(
                "ErrorCode".to_string(),
                (IntroduceConstantError::NotConstEvaluable as i32).to_string(),
            );
            return false;
        }
        true
    }

    fn apply(&self, sel: &TweakSelection<'_>) -> Option<Effect> {
        let name = sel
            .extra_options
            .get("suggestName")
            .cloned()
            .unwrap_or_else(|| "constVar".to_string());
        let ast = &sel.ast.ast;
        let root = sel.tree.root()?;
        let node = ast.node(root.node);
        let range = Range::new(node.begin, node.end);
        let text = content_between(sel.source, range);

        let at = global_insert_pos_before(ast, range)?;
        let edits = vec![
            TextEdit::insert(at, format!("const {name} = {text}\n")),
            TextEdit::replace(exclusive(range), name),
        ];
        let uri = cangjie_uri::fs_path_to_uri(&sel.ast.path)
            .unwrap_or_else(|_| format!("file://{}", sel.ast.path));
        Some(Effect::default().with_edits(uri, edits))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
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

    fn pos(line: u32, column: u32) -> Position {
        Position::new(1, line, column)
    }

    fn run(text: &str, range: Range) -> Result<String, BTreeMap<String, String>> {
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
        if !IntroduceConstant.prepare(&sel, &mut extra) {
            return Err(extra);
        }
        let effect = must_some(IntroduceConstant.apply(&sel));
        let edits = must_some(effect.edits_by_uri.values().next());
        Ok(apply_text_edits(text, edits))
    }

    #[test]
    fn literal_expression_becomes_constant() {
        let text = "func f() {\n    var x = 60 * 60 * 24\n}";
        // select `60 * 60 * 24`
        let out = match run(text, Range::new(pos(2, 13), pos(2, 24))) {
            Ok(out) => out,
            Err(extra) => panic!("rejected: {extra:?}"),
        };
        assert_eq!(out, "const constVar = 60 * 60 * 24\nfunc f() {\n    var x = constVar\n}");
    }

    #[test]
    fn const_references_are_allowed() {
        let text = "const base = 10\nfunc f() {\n    var x = base + 5\n}";
        let out = match run(text, Range::new(pos(3, 13), pos(3, 20))) {
            Ok(out) => out,
            Err(extra) => panic!("rejected: {extra:?}"),
        };
        assert!(out.contains("const constVar = base + 5"), "{out}");
    }

    #[test]
    fn plain_variable_reference_is_rejected() {
        let text = "func f(n: Int) {\n    var x = n + 5\n}";
        let err = match run(text, Range::new(pos(2, 13), pos(2, 17))) {
            Ok(out) => panic!("must reject, got {out}"),
            Err(extra) => extra,
        };
        assert_eq!(
            err.get("ErrorCode"),
            Some(&(IntroduceConstantError::NotConstEvaluable as i32).to_string())
        );
    }

    #[test]
    fn partial_selection_is_rejected() {
        let text = "func f() {\n    var x = 1 + 2\n}";
        // cover `+ 2` only — no complete root expr
        let result = run(text, Range::new(pos(2, 15), pos(2, 17)));
        assert!(result.is_err());
    }
}
