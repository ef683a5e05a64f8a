//! Completion and signature help.
//!
//! Both run on their dedicated schedulers against the parse-only AST: a
//! stale semantic view beats blocking on a recompile while the user types.

use super::{FeatureCtx, Resolved, resolve_at};
use cangjie_ast::{NodeKind, Position, TokenKind, WalkAction, walk_from};
use cangjie_index::SymbolId;
use cangjie_parse::render_signature;
use once_cell::sync::Lazy;
use rustc_hash::FxHashSet;
use serde_json::{Value, json};

/// Completion item kinds (LSP numeric values).
mod item_kind {
    pub const FUNCTION: u32 = 3;
    pub const VARIABLE: u32 = 6;
    pub const CLASS: u32 = 7;
    pub const MODULE: u32 = 9;
    pub const KEYWORD: u32 = 14;
}

/// Standard-library modules offered after `import std.`.
static STD_MODULES: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "collection", "io", "math", "time", "fs", "net", "regex", "sync", "process", "random",
        "sort", "convert", "unicode",
    ]
});

const KEYWORDS: &[&str] = &[
    "func", "var", "let", "const", "class", "interface", "struct", "enum", "extend", "if",
    "else", "while", "do", "for", "in", "match", "case", "try", "catch", "finally", "return",
    "break", "continue", "true", "false", "static", "import", "package",
];

/// `textDocument/completion`.
///
/// Replies `null` only when no snapshot exists at all (`NoSemanticCache`
/// with no parse view either); otherwise a list, possibly empty.
pub fn find_completion(ctx: &FeatureCtx<'_>, pos: Position) -> Value {
    let index = ctx.line_index();
    let line_text = index.line_text(pos.line).unwrap_or("");
    let mut prefix_end = (pos.column.saturating_sub(1) as usize).min(line_text.len());
    while prefix_end > 0 && !line_text.is_char_boundary(prefix_end) {
        prefix_end -= 1;
    }
    let line_prefix = &line_text[..prefix_end];

    // `import std.` offers module names.
    if let Some(rest) = line_prefix.trim_start().strip_prefix("import ") {
        return import_completion(rest);
    }

    // The word being typed.
    let word: String = line_prefix
        .chars()
        .rev()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    let mut items = Vec::new();
    let mut seen_names: FxHashSet<String> = FxHashSet::default();

    // File-local declarations from the parse view (sema may be stale).
    walk_from(&ctx.ast.ast, &mut |node| {
        if node.kind.is_decl() {
            if let Some(name) = node.name() {
                if name.starts_with(word.as_str()) && seen_names.insert(name.to_string()) {
                    let kind = match node.kind {
                        NodeKind::FuncDecl | NodeKind::MainDecl => item_kind::FUNCTION,
                        NodeKind::ClassDecl
                        | NodeKind::InterfaceDecl
                        | NodeKind::StructDecl
                        | NodeKind::EnumDecl => item_kind::CLASS,
                        _ => item_kind::VARIABLE,
                    };
                    items.push(json!({
                        "label": name,
                        "kind": kind,
                        "detail": render_signature(&ctx.ast.ast, node.id),
                    }));
                }
            }
        }
        WalkAction::WalkChildren
    });

    // Cross-package symbols by prefix, with the import hint.
    let seen_ids: FxHashSet<SymbolId> = FxHashSet::default();
    let module = ctx.ast.package.split('.').next().unwrap_or("").to_string();
    ctx.index.find_import_syms_on_completion(
        &seen_ids,
        &ctx.ast.package,
        &module,
        &word,
        |candidate| {
            if seen_names.insert(candidate.symbol.name.clone()) {
                let kind = match candidate.symbol.kind {
                    Some(NodeKind::FuncDecl) | Some(NodeKind::MainDecl) => item_kind::FUNCTION,
                    Some(k) if k.is_classlike() => item_kind::CLASS,
                    _ => item_kind::VARIABLE,
                };
                items.push(json!({
                    "label": candidate.symbol.name,
                    "kind": kind,
                    "detail": candidate.symbol.signature,
                    "labelDetails": { "description": candidate.hint },
                    "insertText": candidate.symbol.insert_text,
                }));
            }
        },
    );

    // Keywords last.
    for keyword in KEYWORDS {
        if keyword.starts_with(word.as_str()) && seen_names.insert((*keyword).to_string()) {
            items.push(json!({ "label": keyword, "kind": item_kind::KEYWORD }));
        }
    }
    Value::Array(items)
}

fn import_completion(after_import: &str) -> Value {
    // `std.` or `std.co` — offer matching std modules as module items.
    let (root, partial) = match after_import.split_once('.') {
        Some((root, partial)) => (root.trim(), partial.trim()),
        None => (after_import.trim(), ""),
    };
    if root != "std" && !("std".starts_with(root) && partial.is_empty()) {
        return Value::Array(Vec::new());
    }
    let items: Vec<Value> = if root == "std" {
        STD_MODULES
            .iter()
            .filter(|m| m.starts_with(partial))
            .map(|m| json!({ "label": m, "kind": item_kind::MODULE }))
            .collect()
    } else {
        vec![json!({ "label": "std", "kind": item_kind::MODULE })]
    };
    Value::Array(items)
}

/// `textDocument/signatureHelp`: the callee's signature with the active
/// parameter derived from comma counting. `null` when the cursor is not
/// inside a call.
pub fn find_signature_help(ctx: &FeatureCtx<'_>, pos: Position) -> Value {
    // Walk tokens on the line backwards to the innermost unclosed `(`.
    let mut depth = 0i32;
    let mut active_param = 0u32;
    let mut callee: Option<(String, Position)> = None;
    let before: Vec<&cangjie_ast::Token> = ctx
        .ast
        .tokens
        .iter()
        .filter(|t| !t.is_trivia() && (t.begin.line < pos.line || (t.begin.line == pos.line && t.begin.column < pos.column)))
        .collect();
    for (i, token) in before.iter().enumerate().rev() {
        match token.value.as_str() {
            ")" => depth += 1,
            "(" if depth > 0 => depth -= 1,
            "(" => {
                if let Some(prev) = i.checked_sub(1).and_then(|j| before.get(j)) {
                    if prev.kind == TokenKind::Identifier {
                        callee = Some((prev.value.clone(), prev.begin));
                    }
                }
                break;
            }
            "," if depth == 0 => active_param += 1,
            _ => {}
        }
    }
    let Some((name, name_pos)) = callee else {
        return Value::Null;
    };

    // Resolve the callee like any other identifier.
    let signature = match resolve_at(ctx, name_pos) {
        Some(Resolved::Local(decl)) => render_signature(&ctx.ast.ast, decl),
        Some(Resolved::Indexed(symbol)) => symbol.signature,
        None => return Value::Null,
    };
    if signature.is_empty() {
        return Value::Null;
    }
    let params: Vec<Value> = signature
        .split_once('(')
        .map(|(_, rest)| rest.trim_end_matches(|c| c != ')').trim_end_matches(')'))
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| json!({ "label": p }))
        .collect();
    let _ = name;
    json!({
        "signatures": [{
            "label": signature,
            "parameters": params,
        }],
        "activeSignature": 0,
        "activeParameter": active_param,
    })
}
