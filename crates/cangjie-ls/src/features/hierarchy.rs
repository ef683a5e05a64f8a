//! Type hierarchy, call hierarchy and override methods.

use super::{FeatureCtx, Resolved, index_symbol_for_local, resolve_at};
use crate::convert::range_json;
use cangjie_ast::{Position, Range};
use cangjie_index::{RefKind, RelationKind, Symbol, SymbolId};
use cangjie_position::LineIndex;
use serde_json::{Value, json};

fn item_json(ctx: &FeatureCtx<'_>, symbol: &Symbol) -> Option<Value> {
    let path = cangjie_uri::uri_to_fs_path(&symbol.location.file_uri)?;
    let text = ctx
        .project
        .docs()
        .get(&path.display().to_string())
        .map(|d| d.text)
        .unwrap_or_default();
    let index = LineIndex::new(text);
    let selection = Range::new(symbol.location.begin, symbol.location.end);
    let full = Range::new(symbol.declaration.begin, symbol.declaration.end);
    Some(json!({
        "name": symbol.name,
        "kind": symbol.kind.map(super::lsp_symbol_kind).unwrap_or(5),
        "uri": symbol.location.file_uri,
        "range": range_json(&index, full),
        "selectionRange": range_json(&index, selection),
        "data": symbol.id.0,
    }))
}

/// The indexed symbol under the cursor, for hierarchy roots.
fn symbol_at(ctx: &FeatureCtx<'_>, pos: Position) -> Option<Symbol> {
    match resolve_at(ctx, pos)? {
        Resolved::Local(decl) => index_symbol_for_local(ctx, decl),
        Resolved::Indexed(symbol) => Some(symbol),
    }
}

/// The symbol id carried in a hierarchy item's `data` field.
fn id_from_item(params: &Value) -> Option<SymbolId> {
    params.get("item")?.get("data")?.as_u64().map(SymbolId)
}

/// `textDocument/typeHierarchy/prepare`.
pub fn prepare_type_hierarchy(ctx: &FeatureCtx<'_>, pos: Position) -> Value {
    match symbol_at(ctx, pos).and_then(|s| item_json(ctx, &s)) {
        Some(item) => json!([item]),
        None => Value::Null,
    }
}

/// `typeHierarchy/supertypes`: subjects that are `base_of` this item.
pub fn find_supertypes(ctx: &FeatureCtx<'_>, params: &Value) -> Value {
    let Some(id) = id_from_item(params) else {
        return Value::Null;
    };
    let supers = ctx.index.relations_to(id, RelationKind::BaseOf);
    collect_items(ctx, &supers)
}

/// `typeHierarchy/subtypes`: objects this item is `base_of`.
pub fn find_subtypes(ctx: &FeatureCtx<'_>, params: &Value) -> Value {
    let Some(id) = id_from_item(params) else {
        return Value::Null;
    };
    let subs = ctx.index.relations(id, RelationKind::BaseOf);
    collect_items(ctx, &subs)
}

fn collect_items(ctx: &FeatureCtx<'_>, ids: &[SymbolId]) -> Value {
    let mut items = Vec::new();
    ctx.index.lookup(ids, |symbol| {
        if let Some(item) = item_json(ctx, symbol) {
            items.push(item);
        }
    });
    Value::Array(items)
}

/// `textDocument/callHierarchy/prepare`.
pub fn prepare_call_hierarchy(ctx: &FeatureCtx<'_>, pos: Position) -> Value {
    match symbol_at(ctx, pos).and_then(|s| item_json(ctx, &s)) {
        Some(item) => json!([item]),
        None => Value::Null,
    }
}

/// `callHierarchy/incomingCalls`: call refs of this symbol grouped by
/// their container.
pub fn find_incoming_calls(ctx: &FeatureCtx<'_>, params: &Value) -> Value {
    let Some(id) = id_from_item(params) else {
        return Value::Null;
    };
    let mut by_container: Vec<(SymbolId, Vec<Range>)> = Vec::new();
    ctx.index.refs(&[id], Some(RefKind::Call), |r| {
        let range = Range::new(r.location.begin, r.location.end);
        match by_container.iter_mut().find(|(c, _)| *c == r.container) {
            Some((_, ranges)) => ranges.push(range),
            None => by_container.push((r.container, vec![range])),
        }
    });
    let mut items = Vec::new();
    for (container, ranges) in by_container {
        if container.is_none() {
            continue;
        }
        let Some(symbol) = ctx.index.symbol(container) else {
            continue;
        };
        let Some(from) = item_json(ctx, &symbol) else {
            continue;
        };
        let Some(path) = cangjie_uri::uri_to_fs_path(&symbol.location.file_uri) else {
            continue;
        };
        let text = ctx
            .project
            .docs()
            .get(&path.display().to_string())
            .map(|d| d.text)
            .unwrap_or_default();
        let line_index = LineIndex::new(text);
        let from_ranges: Vec<Value> =
            ranges.iter().map(|r| range_json(&line_index, *r)).collect();
        items.push(json!({ "from": from, "fromRanges": from_ranges }));
    }
    Value::Array(items)
}

/// `callHierarchy/outgoingCalls`: call refs whose container is this
/// symbol.
pub fn find_outgoing_calls(ctx: &FeatureCtx<'_>, params: &Value) -> Value {
    let Some(id) = id_from_item(params) else {
        return Value::Null;
    };
    let mut items = Vec::new();
    for (callee, refs) in ctx.index.calls_from(id) {
        let Some(symbol) = ctx.index.symbol(callee) else {
            continue;
        };
        let Some(to) = item_json(ctx, &symbol) else {
            continue;
        };
        let from_ranges: Vec<Value> = refs
            .iter()
            .filter_map(|r| {
                let path = cangjie_uri::uri_to_fs_path(&r.location.file_uri)?;
                let text = ctx
                    .project
                    .docs()
                    .get(&path.display().to_string())
                    .map(|d| d.text)
                    .unwrap_or_default();
                let line_index = LineIndex::new(text);
                Some(range_json(&line_index, Range::new(r.location.begin, r.location.end)))
            })
            .collect();
        items.push(json!({ "to": to, "fromRanges": from_ranges }));
    }
    Value::Array(items)
}

/// `textDocument/overrideMethods`: inherited methods the type under the
/// cursor has not overridden, `null` outside class-like contexts.
pub fn find_override_methods(ctx: &FeatureCtx<'_>, pos: Position) -> Value {
    let Some(symbol) = symbol_at(ctx, pos) else {
        return Value::Null;
    };
    let is_type = symbol.kind.is_some_and(cangjie_ast::NodeKind::is_classlike);
    if !is_type {
        return Value::Null;
    }

    // Names already defined on the type itself.
    let own_scope = format!("{}::{}", symbol.scope, symbol.name);
    let mut own: Vec<String> = Vec::new();
    ctx.index.fuzzy_find("", |s| {
        if s.scope == own_scope {
            own.push(s.name.clone());
        }
    });

    // Every supertype, transitively.
    let mut supers = Vec::new();
    ctx.index.find_ridden_up(symbol.id, &mut supers);
    let mut bases: Vec<Symbol> = Vec::new();
    ctx.index.lookup(&supers, |base| bases.push(base.clone()));

    let mut items = Vec::new();
    for base in bases {
        let base_scope = format!("{}::{}", base.scope, base.name);
        ctx.index.fuzzy_find("", |member| {
            if member.scope == base_scope
                && member.kind == Some(cangjie_ast::NodeKind::FuncDecl)
                && !own.contains(&member.name)
            {
                items.push(json!({
                    "name": member.name,
                    "signature": member.signature,
                    "definedIn": base.name,
                }));
            }
        });
    }
    Value::Array(items)
}
