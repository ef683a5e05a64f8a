//! `textDocument/hover`.

use super::{FeatureCtx, Resolved, name_token_range, resolve_at};
use crate::convert::range_json;
use cangjie_ast::Position;
use cangjie_parse::render_signature;
use serde_json::{Value, json};

/// Hover shows the declaration signature in a Cangjie code block, ranged
/// over the hovered identifier token.
pub fn find_hover(ctx: &FeatureCtx<'_>, pos: Position) -> Value {
    let Some(token) = ctx.ast.identifier_at(pos) else {
        return Value::Null;
    };
    let token_range = token.range();
    let Some(resolved) = resolve_at(ctx, pos) else {
        return Value::Null;
    };
    let value = match resolved {
        Resolved::Local(decl) => {
            let signature = render_signature(&ctx.ast.ast, decl);
            if signature.is_empty() {
                // Declarations render; bare locals fall back to name: type.
                let node = ctx.ast.ast.node(decl);
                match (&node.name(), &node.ty) {
                    (Some(name), Some(ty)) => format!("{name}: {ty}"),
                    (Some(name), None) => (*name).to_string(),
                    _ => return Value::Null,
                }
            } else {
                signature
            }
        }
        Resolved::Indexed(symbol) => {
            if symbol.signature.is_empty() {
                symbol.name.clone()
            } else {
                symbol.signature.clone()
            }
        }
    };
    let index = ctx.line_index();
    json!({
        "contents": { "language": "Cangjie", "value": value },
        "range": range_json(&index, token_range),
    })
}

/// `textDocument/definition`: the declaration's location, `null` on miss.
pub fn find_definition(ctx: &FeatureCtx<'_>, pos: Position) -> Value {
    let Some(resolved) = resolve_at(ctx, pos) else {
        return Value::Null;
    };
    match resolved {
        Resolved::Local(decl) => {
            let range = name_token_range(ctx, decl).unwrap_or_else(|| {
                let node = ctx.ast.ast.node(decl);
                cangjie_ast::Range::new(node.begin, node.begin)
            });
            let index = ctx.line_index();
            json!([{
                "uri": crate::convert::uri_of(&ctx.ast.path),
                "range": range_json(&index, range),
            }])
        }
        Resolved::Indexed(symbol) => {
            let Some(path) = cangjie_uri::uri_to_fs_path(&symbol.location.file_uri) else {
                return Value::Null;
            };
            let text = ctx
                .project
                .docs()
                .get(&path.display().to_string())
                .map(|d| d.text)
                .unwrap_or_default();
            let index = cangjie_position::LineIndex::new(text);
            json!([{
                "uri": symbol.location.file_uri,
                "range": range_json(
                    &index,
                    cangjie_ast::Range::new(symbol.location.begin, symbol.location.end),
                ),
            }])
        }
    }
}
