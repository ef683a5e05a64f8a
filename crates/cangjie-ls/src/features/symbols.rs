//! Document/workspace symbols, document links, breakpoints and code lens.

use super::{FeatureCtx, lsp_symbol_kind, name_token_range};
use crate::convert::{range_json, uri_of};
use cangjie_ast::{NodeKind, Range, TokenKind};
use cangjie_position::LineIndex;
use serde_json::{Value, json};

/// `textDocument/documentSymbol`: hierarchical symbols for the file.
pub fn find_document_symbols(ctx: &FeatureCtx<'_>) -> Value {
    let ast = &ctx.ast.ast;
    let index = ctx.line_index();
    let items: Vec<Value> = ast
        .top_level_decls()
        .into_iter()
        .filter_map(|decl| document_symbol(ctx, &index, decl))
        .collect();
    Value::Array(items)
}

fn document_symbol(
    ctx: &FeatureCtx<'_>,
    index: &LineIndex,
    decl: cangjie_ast::NodeId,
) -> Option<Value> {
    let ast = &ctx.ast.ast;
    let node = ast.node(decl);
    let name = node.name()?;
    let selection = name_token_range(ctx, decl).unwrap_or(Range::new(node.begin, node.begin));
    let children: Vec<Value> = if node.kind.is_classlike() {
        ast.children(decl)
            .iter()
            .filter(|c| ast.node(**c).kind.is_decl())
            .filter_map(|c| document_symbol(ctx, index, *c))
            .collect()
    } else {
        Vec::new()
    };
    Some(json!({
        "name": name,
        "kind": lsp_symbol_kind(node.kind),
        "range": range_json(index, Range::new(node.begin, node.end)),
        "selectionRange": range_json(index, selection),
        "children": children,
    }))
}

/// `workspace/symbol`: indexed symbols matching `query`.
pub fn find_workspace_symbols(ctx: &FeatureCtx<'_>, query: &str) -> Value {
    let mut items = Vec::new();
    ctx.index.fuzzy_find(query, |symbol| {
        let Some(path) = cangjie_uri::uri_to_fs_path(&symbol.location.file_uri) else {
            return;
        };
        let text = ctx
            .project
            .docs()
            .get(&path.display().to_string())
            .map(|d| d.text)
            .unwrap_or_default();
        let index = LineIndex::new(text);
        items.push(json!({
            "name": symbol.name,
            "kind": symbol.kind.map(lsp_symbol_kind).unwrap_or(13),
            "location": {
                "uri": symbol.location.file_uri,
                "range": range_json(&index, Range::new(symbol.location.begin, symbol.location.end)),
            },
            "containerName": symbol.scope,
        }));
    });
    Value::Array(items)
}

/// `textDocument/documentLink`: always an empty array; links for imports
/// resolve through definition instead. (Diagnostics are driven by the
/// scheduler, not from here.)
pub fn find_document_links(_ctx: &FeatureCtx<'_>) -> Value {
    Value::Array(Vec::new())
}

/// `textDocument/breakpointLocations`: lines that can carry a breakpoint
/// within the requested range — skipping blank lines, comments and lines
/// holding only a closing brace.
pub fn find_breakpoint_locations(ctx: &FeatureCtx<'_>, range: Range) -> Value {
    let index = ctx.line_index();
    let mut items = Vec::new();
    for line in range.start.line..=range.end.line {
        let Some(text) = index.line_text(line) else {
            break;
        };
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed.starts_with("//") || trimmed == "}" {
            continue;
        }
        // A line must hold at least one non-trivia token to be stoppable.
        let has_code = ctx
            .ast
            .tokens
            .iter()
            .any(|t| t.begin.line == line && !t.is_trivia() && t.kind != TokenKind::Punctuation);
        if !has_code {
            continue;
        }
        let first_col = text.len() - text.trim_start().len() + 1;
        items.push(json!({
            "range": range_json(
                &index,
                Range::new(
                    cangjie_ast::Position::new(ctx.ast.file_id, line, first_col as u32),
                    cangjie_ast::Position::new(ctx.ast.file_id, line, text.len() as u32),
                ),
            ),
        }));
    }
    Value::Array(items)
}

/// `textDocument/codeLens`: run/debug lenses over `main` and test
/// functions.
pub fn find_code_lens(ctx: &FeatureCtx<'_>) -> Value {
    let ast = &ctx.ast.ast;
    let index = ctx.line_index();
    let mut items = Vec::new();
    for decl in ast.top_level_decls() {
        let node = ast.node(decl);
        let runnable = node.kind == NodeKind::MainDecl
            || (node.kind == NodeKind::FuncDecl
                && node.name().is_some_and(|n| n.starts_with("test")));
        if !runnable {
            continue;
        }
        let range = name_token_range(ctx, decl).unwrap_or(Range::new(node.begin, node.begin));
        let uri = uri_of(&ctx.ast.path);
        for (title, command) in [("run", "cangjie.run"), ("debug", "cangjie.debug")] {
            items.push(json!({
                "range": range_json(&index, range),
                "command": {
                    "title": title,
                    "command": command,
                    "arguments": [uri, node.name().unwrap_or("")],
                },
            }));
        }
    }
    Value::Array(items)
}
