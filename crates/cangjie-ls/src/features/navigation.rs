//! References, highlights, prepare-rename and rename.

use super::{FeatureCtx, Resolved, index_symbol_for_local, name_token_range, resolve_at};
use crate::convert::{range_json, uri_of};
use cangjie_ast::{NodeData, NodeId, NodeKind, Position, Range, TokenKind, WalkAction, walk_from};
use cangjie_position::LineIndex;
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// Occurrences of the symbol under `pos` within this file, as
/// `(range, is_write)`.
fn local_occurrences(ctx: &FeatureCtx<'_>, pos: Position) -> Vec<(Range, bool)> {
    let Some(resolved) = resolve_at(ctx, pos) else {
        return Vec::new();
    };
    let ast = &ctx.ast.ast;
    let mut out = Vec::new();
    match resolved {
        Resolved::Local(decl) => {
            if let Some(range) = name_token_range(ctx, decl) {
                out.push((range, false));
            }
            walk_from(ast, &mut |node| {
                if let NodeData::Ref { target: Some(target), .. } = &node.data {
                    if *target == decl {
                        let is_write = ast
                            .parent(node.id)
                            .map(|p| {
                                let pn = ast.node(p);
                                pn.kind == NodeKind::AssignExpr
                                    && pn.children.first() == Some(&node.id)
                            })
                            .unwrap_or(false);
                        out.push((Range::new(node.begin, node.end), is_write));
                    }
                }
                WalkAction::WalkChildren
            });
        }
        Resolved::Indexed(symbol) => {
            // Cross-file symbol: occurrences in this file are unbound refs
            // sharing the name.
            walk_from(ast, &mut |node| {
                if let NodeData::Ref { name, target: None } = &node.data {
                    if *name == symbol.name {
                        out.push((Range::new(node.begin, node.end), false));
                    }
                }
                WalkAction::WalkChildren
            });
        }
    }
    out.sort_by_key(|(r, _)| (r.start.line, r.start.column));
    out.dedup();
    out
}

/// `textDocument/documentHighlight`: same-file occurrences with
/// read/write kinds.
pub fn find_document_highlights(ctx: &FeatureCtx<'_>, pos: Position) -> Value {
    let occurrences = local_occurrences(ctx, pos);
    if occurrences.is_empty() {
        return Value::Null;
    }
    let index = ctx.line_index();
    let items: Vec<Value> = occurrences
        .into_iter()
        .map(|(range, is_write)| {
            json!({
                "range": range_json(&index, range),
                "kind": if is_write { 3 } else { 2 },
            })
        })
        .collect();
    Value::Array(items)
}

/// `textDocument/references`: this file's occurrences plus indexed refs
/// across the project. Empty array on miss.
pub fn find_references(ctx: &FeatureCtx<'_>, pos: Position) -> Value {
    let mut locations: Vec<(String, Range)> = local_occurrences(ctx, pos)
        .into_iter()
        .map(|(range, _)| (ctx.ast.path.clone(), range))
        .collect();

    // Cross-file refs through the index.
    if let Some(symbol) = indexed_symbol_at(ctx, pos) {
        ctx.index.refs(&[symbol.id], None, |r| {
            if let Some(path) = cangjie_uri::uri_to_fs_path(&r.location.file_uri) {
                let path = path.display().to_string();
                locations.push((path, Range::new(r.location.begin, r.location.end)));
            }
        });
    }
    locations.sort_by(|a, b| {
        (a.0.as_str(), a.1.start.line, a.1.start.column)
            .cmp(&(b.0.as_str(), b.1.start.line, b.1.start.column))
    });
    locations.dedup();

    let items: Vec<Value> = locations
        .into_iter()
        .map(|(path, range)| {
            let text = ctx.project.docs().get(&path).map(|d| d.text).unwrap_or_default();
            let index = LineIndex::new(text);
            json!({ "uri": uri_of(&path), "range": range_json(&index, range) })
        })
        .collect();
    Value::Array(items)
}

/// The index symbol for whatever the cursor resolves to.
fn indexed_symbol_at(ctx: &FeatureCtx<'_>, pos: Position) -> Option<cangjie_index::Symbol> {
    match resolve_at(ctx, pos)? {
        Resolved::Local(decl) => index_symbol_for_local(ctx, decl),
        Resolved::Indexed(symbol) => Some(symbol),
    }
}

/// `textDocument/prepareRename`: the renameable token's range, `null`
/// when renaming is not allowed here.
pub fn prepare_rename(ctx: &FeatureCtx<'_>, pos: Position) -> Value {
    let Some(token) = ctx.ast.identifier_at(pos) else {
        return Value::Null;
    };
    if token.kind != TokenKind::Identifier {
        return Value::Null;
    }
    // Imported (compiled) symbols cannot be renamed from here.
    if let Some(Resolved::Indexed(symbol)) = resolve_at(ctx, pos) {
        if symbol.is_cjo_sym {
            return Value::Null;
        }
    }
    if resolve_at(ctx, pos).is_none() {
        return Value::Null;
    }
    let index = ctx.line_index();
    json!({
        "range": range_json(&index, token.range()),
        "placeholder": token.value,
    })
}

/// `textDocument/rename`: a `documentChanges` workspace edit renaming
/// every occurrence.
pub fn rename(ctx: &FeatureCtx<'_>, pos: Position, new_name: &str) -> Value {
    if new_name.is_empty() || prepare_rename(ctx, pos).is_null() {
        return Value::Null;
    }
    let mut edits_by_path: BTreeMap<String, Vec<Range>> = BTreeMap::new();
    for (range, _) in local_occurrences(ctx, pos) {
        edits_by_path.entry(ctx.ast.path.clone()).or_default().push(range);
    }
    if let Some(symbol) = indexed_symbol_at(ctx, pos) {
        ctx.index.refs(&[symbol.id], None, |r| {
            if let Some(path) = cangjie_uri::uri_to_fs_path(&r.location.file_uri) {
                edits_by_path
                    .entry(path.display().to_string())
                    .or_default()
                    .push(Range::new(r.location.begin, r.location.end));
            }
        });
    }
    if edits_by_path.is_empty() {
        return Value::Null;
    }

    let document_changes: Vec<Value> = edits_by_path
        .into_iter()
        .map(|(path, mut ranges)| {
            ranges.sort_by_key(|r| (r.start.line, r.start.column));
            ranges.dedup();
            let text = ctx.project.docs().get(&path).map(|d| d.text).unwrap_or_default();
            let version = ctx.project.docs().version(&path).unwrap_or(0);
            let index = LineIndex::new(text);
            let edits: Vec<Value> = ranges
                .into_iter()
                .map(|range| json!({ "range": range_json(&index, range), "newText": new_name }))
                .collect();
            json!({
                "textDocument": { "uri": uri_of(&path), "version": version },
                "edits": edits,
            })
        })
        .collect();
    json!({ "documentChanges": document_changes })
}

/// Find the file-local declaration node whose name token covers `pos`, if
/// the cursor is on a declaration rather than a reference.
pub fn decl_at(ctx: &FeatureCtx<'_>, pos: Position) -> Option<NodeId> {
    match resolve_at(ctx, pos)? {
        Resolved::Local(decl) => Some(decl),
        Resolved::Indexed(_) => None,
    }
}
