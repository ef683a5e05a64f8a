//! Builds one package's index shard from its typechecked files.

use cangjie_ast::{Ast, NodeData, NodeFlags, NodeId, NodeKind, Position, Range, WalkAction, walk};
use cangjie_index::{
    ExtendItem, IndexShard, Modifier, Ref, RefKind, Relation, RelationKind, Symbol, SymbolId,
    SymbolLocation,
};
use cangjie_parse::{ParsedFile, render_signature};
use rustc_hash::FxHashMap;

/// Build the `.idx` slabs for `package` from its parsed files, given as
/// `(file_uri, parsed)` pairs. Files must already be typechecked so
/// reference targets are bound.
pub fn build_index_shard(
    package: &str,
    module: &str,
    files: &[(String, &ParsedFile)],
) -> IndexShard {
    let mut shard = IndexShard::default();
    // (file index, NodeId) -> symbol, plus a package-wide name map for
    // cross-file references.
    let mut by_node: FxHashMap<(usize, NodeId), SymbolId> = FxHashMap::default();
    let mut by_name: FxHashMap<String, SymbolId> = FxHashMap::default();

    for (file_idx, (uri, parsed)) in files.iter().enumerate() {
        collect_symbols(package, module, uri, parsed, file_idx, &mut shard, &mut by_node, &mut by_name);
    }
    for (file_idx, (uri, parsed)) in files.iter().enumerate() {
        collect_refs(uri, parsed, file_idx, &mut shard, &by_node, &by_name);
    }
    collect_relations(package, files, &mut shard, &by_name);
    shard
}

fn location(uri: &str, begin: Position, end: Position) -> SymbolLocation {
    SymbolLocation { begin, end, file_uri: uri.to_string() }
}

/// The extent of the declaration's name token, falling back to the decl
/// start when the token cannot be found (error recovery).
fn name_token_range(parsed: &ParsedFile, decl: &cangjie_ast::Node) -> Range {
    if let Some(name) = decl.name() {
        for token in &parsed.tokens {
            if token.kind == cangjie_ast::TokenKind::Identifier
                && token.value == name
                && token.begin >= decl.begin
                && token.end <= decl.end
            {
                return Range::new(token.begin, token.end);
            }
        }
    }
    Range::new(decl.begin, decl.begin)
}

fn modifier_of(flags: NodeFlags) -> Modifier {
    // The subset has no explicit visibility keywords; macro-generated and
    // compiler-added decls stay package-internal.
    if flags.has_any(NodeFlags::COMPILER_ADD.with(NodeFlags::IN_MACRO)) {
        Modifier::Internal
    } else {
        Modifier::Public
    }
}

#[allow(clippy::too_many_arguments)]
fn collect_symbols(
    package: &str,
    module: &str,
    uri: &str,
    parsed: &ParsedFile,
    file_idx: usize,
    shard: &mut IndexShard,
    by_node: &mut FxHashMap<(usize, NodeId), SymbolId>,
    by_name: &mut FxHashMap<String, SymbolId>,
) {
    let ast = &parsed.ast;
    for decl in ast.top_level_decls() {
        record_symbol(package, module, uri, parsed, file_idx, decl, package, shard, by_node, by_name);
        let container = ast.node(decl);
        if container.kind.is_classlike() {
            let scope = format!("{package}::{}", container.name().unwrap_or(""));
            for member in ast.children(decl).iter() {
                if ast.node(*member).kind.is_decl() {
                    record_symbol(
                        package, module, uri, parsed, file_idx, *member, &scope, shard, by_node,
                        by_name,
                    );
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn record_symbol(
    package: &str,
    module: &str,
    uri: &str,
    parsed: &ParsedFile,
    file_idx: usize,
    id: NodeId,
    scope: &str,
    shard: &mut IndexShard,
    by_node: &mut FxHashMap<(usize, NodeId), SymbolId>,
    by_name: &mut FxHashMap<String, SymbolId>,
) {
    let ast = &parsed.ast;
    let node = ast.node(id);
    let Some(name) = node.name() else {
        return;
    };
    let sym_id = SymbolId::of(package, scope, name, node.kind);
    let name_range = name_token_range(parsed, node);
    let signature = render_signature(ast, id);
    let insert_text = match node.kind {
        NodeKind::FuncDecl | NodeKind::MainDecl => format!("{name}()"),
        _ => name.to_string(),
    };
    let symbol = Symbol {
        id: sym_id,
        name: name.to_string(),
        scope: scope.to_string(),
        kind: Some(node.kind),
        location: location(uri, name_range.start, name_range.end),
        declaration: location(uri, node.begin, node.end),
        cur_macro_call: SymbolLocation::default(),
        signature,
        return_type: node.ty.clone().unwrap_or_default(),
        is_member_param: false,
        modifier: modifier_of(node.flags),
        is_cjo_sym: false,
        is_deprecated: node.flags.has(NodeFlags::DEPRECATED),
        insert_text,
        cur_module: module.to_string(),
    };
    shard.symbols.push(symbol);
    by_node.insert((file_idx, id), sym_id);
    by_name.entry(name.to_string()).or_insert(sym_id);
    // The defining occurrence is the first ref recorded for a symbol.
    shard.refs.entry(sym_id).or_default().push(Ref {
        location: location(uri, name_range.start, name_range.end),
        kind: RefKind::Definition,
        container: SymbolId::NONE,
        is_cjo_ref: false,
    });
}

fn collect_refs(
    uri: &str,
    parsed: &ParsedFile,
    file_idx: usize,
    shard: &mut IndexShard,
    by_node: &FxHashMap<(usize, NodeId), SymbolId>,
    by_name: &FxHashMap<String, SymbolId>,
) {
    let ast = &parsed.ast;
    let Some(root) = ast.root() else {
        return;
    };
    walk(ast, root, &mut |node| {
        if node.kind != NodeKind::RefExpr {
            return WalkAction::WalkChildren;
        }
        let NodeData::Ref { name, target } = &node.data else {
            return WalkAction::WalkChildren;
        };
        let sym_id = target
            .and_then(|t| by_node.get(&(file_idx, t)).copied())
            .or_else(|| {
                // Local targets are not indexed; only fall back to the
                // package-global name when the ref has no local target.
                if target.is_none() { by_name.get(name).copied() } else { None }
            });
        let Some(sym_id) = sym_id else {
            return WalkAction::WalkChildren;
        };
        let kind = ref_kind(ast, node.id);
        let container = enclosing_symbol(ast, node.id, file_idx, by_node);
        shard.refs.entry(sym_id).or_default().push(Ref {
            location: location(uri, node.begin, node.end),
            kind,
            container,
            is_cjo_ref: false,
        });
        WalkAction::WalkChildren
    });
}

/// Call when the ref is a callee, write when it is an assignment target.
fn ref_kind(ast: &Ast, id: NodeId) -> RefKind {
    if let Some(parent) = ast.parent(id) {
        let parent_node = ast.node(parent);
        match parent_node.kind {
            NodeKind::CallExpr if parent_node.children.first() == Some(&id) => {
                return RefKind::Call;
            }
            NodeKind::AssignExpr if parent_node.children.first() == Some(&id) => {
                return RefKind::Write;
            }
            _ => {}
        }
    }
    RefKind::Reference
}

fn enclosing_symbol(
    ast: &Ast,
    id: NodeId,
    file_idx: usize,
    by_node: &FxHashMap<(usize, NodeId), SymbolId>,
) -> SymbolId {
    for ancestor in ast.ancestors(id) {
        if let Some(sym) = by_node.get(&(file_idx, ancestor)) {
            return *sym;
        }
    }
    SymbolId::NONE
}

fn collect_relations(
    package: &str,
    files: &[(String, &ParsedFile)],
    shard: &mut IndexShard,
    by_name: &FxHashMap<String, SymbolId>,
) {
    for (_, parsed) in files {
        let ast = &parsed.ast;
        for decl in ast.top_level_decls() {
            let node = ast.node(decl);
            match &node.data {
                NodeData::TypeDecl { name, supers } => {
                    let Some(sub) = by_name.get(name).copied() else {
                        continue;
                    };
                    for super_name in supers {
                        // Supertypes outside the package resolve through
                        // their own shard; only local edges are recorded.
                        if let Some(base) = by_name.get(super_name).copied() {
                            shard.relations.push(Relation {
                                subject: base,
                                predicate: RelationKind::BaseOf,
                                object: sub,
                            });
                        }
                    }
                }
                NodeData::Extend { name, interfaces } => {
                    let Some(extended) = by_name.get(name).copied() else {
                        continue;
                    };
                    // The extend declaration's own symbol id differs from
                    // the extended type's by kind.
                    let ext_sym = SymbolId::of(package, package, name, NodeKind::ExtendDecl);
                    let items: Vec<ExtendItem> = if interfaces.is_empty() {
                        vec![ExtendItem {
                            id: ext_sym,
                            modifier: Modifier::Public,
                            interface_name: String::new(),
                        }]
                    } else {
                        interfaces
                            .iter()
                            .map(|i| ExtendItem {
                                id: ext_sym,
                                modifier: Modifier::Public,
                                interface_name: i.clone(),
                            })
                            .collect()
                    };
                    shard.extends.entry(extended).or_default().extend(items);
                    for interface in interfaces {
                        if let Some(iface) = by_name.get(interface).copied() {
                            shard.relations.push(Relation {
                                subject: iface,
                                predicate: RelationKind::BaseOf,
                                object: extended,
                            });
                        }
                    }
                    shard.relations.push(Relation {
                        subject: extended,
                        predicate: RelationKind::ExtendedBy,
                        object: ext_sym,
                    });
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cangjie_parse::{Frontend, ReferenceFrontend, SourceFile, typecheck_package};
    use cangjie_testkit::must_some;
    use pretty_assertions::assert_eq;

    fn build(texts: &[(&str, &str)]) -> IndexShard {
        let frontend = ReferenceFrontend;
        let mut files: Vec<ParsedFile> = texts
            .iter()
            .enumerate()
            .map(|(i, (path, text))| {
                frontend.parse(&SourceFile {
                    path: (*path).to_string(),
                    text: (*text).to_string(),
                    file_id: i as u32 + 1,
                })
            })
            .collect();
        typecheck_package(&mut files);
        let pairs: Vec<(String, &ParsedFile)> = files
            .iter()
            .map(|f| (format!("file://{}", f.path), f))
            .collect();
        build_index_shard("demo.core", "demo", &pairs)
    }

    #[test]
    fn functions_and_members_are_indexed() {
        let shard = build(&[(
            "/p/a.cj",
            "package demo.core\nclass Point { var x: Int = 0 }\nfunc add(a: Int, b: Int): Int { a + b }",
        )]);
        let names: Vec<&str> = shard.symbols.iter().map(|s| s.name.as_str()).collect();
        assert!(names.contains(&"Point"));
        assert!(names.contains(&"x"));
        assert!(names.contains(&"add"));
        let add = must_some(shard.symbols.iter().find(|s| s.name == "add"));
        assert_eq!(add.signature, "func add(a: Int, b: Int): Int");
        assert_eq!(add.return_type, "Int");
        assert_eq!(add.cur_module, "demo");
    }

    #[test]
    fn name_location_covers_identifier() {
        let shard = build(&[("/p/a.cj", "func add(a: Int, b: Int): Int { a + b }")]);
        let add = must_some(shard.symbols.iter().find(|s| s.name == "add"));
        assert_eq!(add.location.begin.line, 1);
        assert_eq!(add.location.begin.column, 6);
        assert_eq!(add.location.end.column, 8);
    }

    #[test]
    fn call_refs_are_recorded_with_kind() {
        let shard = build(&[(
            "/p/a.cj",
            "func add(a: Int, b: Int): Int { a + b }\nfunc go() { add(1, 2) }",
        )]);
        let add = must_some(shard.symbols.iter().find(|s| s.name == "add"));
        let refs = must_some(shard.refs.get(&add.id));
        assert!(refs.iter().any(|r| r.kind == RefKind::Definition));
        let call = must_some(refs.iter().find(|r| r.kind == RefKind::Call));
        assert_eq!(call.location.begin.line, 2);
        let go = must_some(shard.symbols.iter().find(|s| s.name == "go"));
        assert_eq!(call.container, go.id);
    }

    #[test]
    fn cross_file_refs_resolve_by_name() {
        let shard = build(&[
            ("/p/a.cj", "package demo.core\nfunc helper(): Int { 1 }"),
            ("/p/b.cj", "package demo.core\nfunc f() { helper() }"),
        ]);
        let helper = must_some(shard.symbols.iter().find(|s| s.name == "helper"));
        let refs = must_some(shard.refs.get(&helper.id));
        assert_eq!(refs.len(), 2, "definition plus one cross-file call");
    }

    #[test]
    fn supertype_relations_are_emitted() {
        let shard = build(&[(
            "/p/a.cj",
            "interface Shape { }\nclass Circle <: Shape { }",
        )]);
        let shape = must_some(shard.symbols.iter().find(|s| s.name == "Shape"));
        let circle = must_some(shard.symbols.iter().find(|s| s.name == "Circle"));
        assert!(shard.relations.iter().any(|r| r.subject == shape.id
            && r.predicate == RelationKind::BaseOf
            && r.object == circle.id));
    }

    #[test]
    fn extends_land_in_the_extend_slab() {
        let shard = build(&[(
            "/p/a.cj",
            "interface Printable { }\nclass Point { }\nextend Point <: Printable { func show(): String { \"p\" } }",
        )]);
        let point = must_some(shard.symbols.iter().find(|s| s.name == "Point"));
        let items = must_some(shard.extends.get(&point.id));
        assert_eq!(items[0].interface_name, "Printable");
    }
}
