//! `textDocument/semanticTokens/full`.

use super::FeatureCtx;
use cangjie_ast::{NodeData, NodeKind, TokenKind};
use serde_json::{Value, json};

/// Token type indices into the legend advertised at initialize.
pub mod token_type {
    pub const NAMESPACE: u32 = 0;
    pub const TYPE: u32 = 1;
    pub const FUNCTION: u32 = 2;
    pub const VARIABLE: u32 = 3;
    pub const KEYWORD: u32 = 4;
    pub const STRING: u32 = 5;
    pub const NUMBER: u32 = 6;
    pub const COMMENT: u32 = 7;
}

/// The legend advertised in the server capabilities.
pub fn legend() -> Value {
    json!({
        "tokenTypes": [
            "namespace", "type", "function", "variable", "keyword", "string", "number", "comment"
        ],
        "tokenModifiers": [],
    })
}

/// Full-document semantic tokens in LSP relative encoding.
///
/// Replies `null` when the file has no semantic cache yet (the committed
/// policy for this method).
pub fn find_semantic_tokens(ctx: &FeatureCtx<'_>) -> Value {
    if !ctx.project.file_has_sema_cache(&ctx.ast.path) {
        return Value::Null;
    }
    let mut data: Vec<u32> = Vec::new();
    let mut prev_line = 0u32;
    let mut prev_start = 0u32;
    for token in &ctx.ast.tokens {
        let Some(token_type) = classify(ctx, token) else {
            continue;
        };
        let line = token.begin.line.saturating_sub(1);
        let start = token.begin.column.saturating_sub(1);
        let length = token.value.len() as u32;
        let delta_line = line - prev_line;
        let delta_start = if delta_line == 0 { start - prev_start } else { start };
        data.extend_from_slice(&[delta_line, delta_start, length, token_type, 0]);
        prev_line = line;
        prev_start = start;
    }
    json!({ "data": data })
}

fn classify(ctx: &FeatureCtx<'_>, token: &cangjie_ast::Token) -> Option<u32> {
    match token.kind {
        TokenKind::Keyword => Some(token_type::KEYWORD),
        TokenKind::Comment => Some(token_type::COMMENT),
        TokenKind::Literal | TokenKind::StringInterpolation => {
            if token.value.starts_with('"') {
                Some(token_type::STRING)
            } else {
                Some(token_type::NUMBER)
            }
        }
        TokenKind::Identifier => {
            // Identifier classification leans on the semantic tree.
            let node_id = ctx.ast.ast.node_at(token.begin)?;
            let node = ctx.ast.ast.node(node_id);
            let decl_kind = match &node.data {
                NodeData::Ref { target: Some(target), .. } => {
                    ctx.ast.ast.get(*target).map(|d| d.kind)
                }
                _ if node.kind.is_decl() => Some(node.kind),
                _ => None,
            };
            match decl_kind {
                Some(NodeKind::FuncDecl) | Some(NodeKind::MainDecl) => {
                    Some(token_type::FUNCTION)
                }
                Some(k) if k.is_classlike() => Some(token_type::TYPE),
                Some(_) => Some(token_type::VARIABLE),
                None => {
                    if node.kind == NodeKind::Import {
                        Some(token_type::NAMESPACE)
                    } else {
                        Some(token_type::VARIABLE)
                    }
                }
            }
        }
        _ => None,
    }
}
