//! `textDocument/codeAction` backed by the tweak engine.

use super::FeatureCtx;
use crate::convert::range_json_exclusive;
use cangjie_ast::Range;
use cangjie_position::LineIndex;
use cangjie_selection::SelectionTree;
use cangjie_tweaks::{TweakSelection, prepare_tweak, prepare_tweaks};
use serde_json::{Value, json};
use std::collections::BTreeMap;

fn selection<'a>(
    ctx: &'a FeatureCtx<'_>,
    range: Range,
) -> Option<TweakSelection<'a>> {
    let tree = SelectionTree::build(&ctx.ast.ast, range.start, range.end)?;
    Some(TweakSelection {
        ast: ctx.ast,
        source: &ctx.text,
        range,
        tree,
        extra_options: BTreeMap::new(),
    })
}

/// List the tweaks applicable to `range`. An invalid selection yields an
/// empty list, never an error.
pub fn find_code_actions(ctx: &FeatureCtx<'_>, range: Range) -> Value {
    if range.start == range.end {
        return Value::Array(Vec::new());
    }
    let Some(sel) = selection(ctx, range) else {
        return Value::Array(Vec::new());
    };
    let refs = prepare_tweaks(&sel);
    let items: Vec<Value> = refs
        .into_iter()
        .filter(|r| !r.extra_options.contains_key("ErrorCode"))
        .filter_map(|r| {
            // The edit is computed eagerly so clients can apply directly.
            let tweak = prepare_tweak(&r.id, &sel)?;
            let effect = tweak.apply(&sel)?;
            let mut changes = serde_json::Map::new();
            for (uri, edits) in &effect.edits_by_uri {
                let text = cangjie_uri::uri_to_fs_path(uri)
                    .and_then(|p| ctx.project.docs().get(&p.display().to_string()))
                    .map(|d| d.text)
                    .unwrap_or_else(|| ctx.text.clone());
                let line_index = LineIndex::new(text);
                let wire_edits: Vec<Value> = edits
                    .iter()
                    .map(|e| {
                        json!({
                            "range": range_json_exclusive(&line_index, e.range),
                            "newText": e.new_text,
                        })
                    })
                    .collect();
                changes.insert(uri.clone(), Value::Array(wire_edits));
            }
            Some(json!({
                "title": r.title,
                "kind": r.kind,
                "data": { "id": r.id },
                "edit": { "changes": changes },
            }))
        })
        .collect();
    Value::Array(items)
}

/// Apply the tweak `id` over `range`, returning the workspace edit the
/// server forwards through `workspace/applyEdit`.
pub fn apply_tweak(
    ctx: &FeatureCtx<'_>,
    id: &str,
    range: Range,
    extra_options: BTreeMap<String, String>,
) -> Option<Value> {
    let mut sel = selection(ctx, range)?;
    sel.extra_options = extra_options;
    let tweak = prepare_tweak(id, &sel)?;
    let effect = tweak.apply(&sel)?;
    let mut changes = serde_json::Map::new();
    for (uri, edits) in &effect.edits_by_uri {
        let text = cangjie_uri::uri_to_fs_path(uri)
            .and_then(|p| ctx.project.docs().get(&p.display().to_string()))
            .map(|d| d.text)
            .unwrap_or_else(|| ctx.text.clone());
        let line_index = LineIndex::new(text);
        let wire_edits: Vec<Value> = edits
            .iter()
            .map(|e| {
                json!({
                    "range": range_json_exclusive(&line_index, e.range),
                    "newText": e.new_text,
                })
            })
            .collect();
        changes.insert(uri.clone(), Value::Array(wire_edits));
    }
    Some(json!({ "edit": { "changes": changes }, "format": effect.format }))
}
