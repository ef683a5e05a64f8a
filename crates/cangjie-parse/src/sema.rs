//! Name resolution and light type assignment.
//!
//! `typecheck_package` runs over all parsed files of one package. Reference
//! targets are resolved to arena ids within the same file; names that
//! resolve to a declaration in a sibling file of the package are typed but
//! left without a target id (arena ids never cross files — the symbol index
//! owns cross-file identity).

use crate::frontend::ParsedFile;
use cangjie_ast::{Ast, Diagnostic, NodeData, NodeId, NodeKind};
use std::collections::HashMap;

/// Resolve names and assign types across the files of one package.
/// Returns package-level diagnostics (currently none beyond the parsers').
pub fn typecheck_package(files: &mut [ParsedFile]) -> Vec<Diagnostic> {
    // Package-global declarations: name -> declared type, gathered across
    // every file so cross-file references can still be typed.
    let mut package_globals: HashMap<String, Option<String>> = HashMap::new();
    for file in files.iter() {
        for decl in file.ast.top_level_decls() {
            let node = file.ast.node(decl);
            if let Some(name) = node.name() {
                package_globals.insert(name.to_string(), decl_type(&file.ast, decl));
            }
        }
    }

    for file in files.iter_mut() {
        let Some(root) = file.ast.root() else {
            continue;
        };
        let mut resolver = Resolver {
            ast: &mut file.ast,
            scopes: vec![HashMap::new()],
            package_globals: &package_globals,
        };
        resolver.file_scope(root);
        resolver.resolve(root);
        infer(&mut file.ast, root);
    }
    Vec::new()
}

/// The declared or rendered type of a declaration.
fn decl_type(ast: &Ast, id: NodeId) -> Option<String> {
    let node = ast.node(id);
    match node.kind {
        NodeKind::FuncDecl | NodeKind::MainDecl => node.ty.clone(),
        _ => node.ty.clone(),
    }
}

/// Render a declaration signature the way hover and the index present it,
/// e.g. `func add(a: Int, b: Int): Int`.
pub fn render_signature(ast: &Ast, id: NodeId) -> String {
    let node = ast.node(id);
    match node.kind {
        NodeKind::FuncDecl | NodeKind::MainDecl => {
            let name = node.name().unwrap_or("");
            let params: Vec<String> = ast
                .children(id)
                .iter()
                .filter(|c| ast.node(**c).kind == NodeKind::FuncParam)
                .map(|c| {
                    let p = ast.node(*c);
                    match (&p.data, &p.ty) {
                        (NodeData::Var { name, .. }, Some(ty)) => format!("{name}: {ty}"),
                        (NodeData::Var { name, .. }, None) => name.clone(),
                        _ => String::new(),
                    }
                })
                .collect();
            let mut sig = format!("func {name}({})", params.join(", "));
            if let NodeData::Func { ret_ty: Some(ret), .. } = &node.data {
                sig.push_str(": ");
                sig.push_str(ret);
            }
            sig
        }
        NodeKind::VarDecl | NodeKind::FuncParam => {
            let keyword = if node.flags.has(cangjie_ast::NodeFlags::CONST) { "const" } else { "var" };
            match (&node.data, &node.ty) {
                (NodeData::Var { name, .. }, Some(ty)) => format!("{keyword} {name}: {ty}"),
                (NodeData::Var { name, .. }, None) => format!("{keyword} {name}"),
                _ => String::new(),
            }
        }
        NodeKind::ClassDecl => format!("class {}", node.name().unwrap_or("")),
        NodeKind::InterfaceDecl => format!("interface {}", node.name().unwrap_or("")),
        NodeKind::StructDecl => format!("struct {}", node.name().unwrap_or("")),
        NodeKind::EnumDecl => format!("enum {}", node.name().unwrap_or("")),
        NodeKind::ExtendDecl => format!("extend {}", node.name().unwrap_or("")),
        _ => String::new(),
    }
}

struct Resolver<'a> {
    ast: &'a mut Ast,
    scopes: Vec<HashMap<String, NodeId>>,
    package_globals: &'a HashMap<String, Option<String>>,
}

impl Resolver<'_> {
    /// Seed the outermost scope with this file's top-level declarations so
    /// forward references work.
    fn file_scope(&mut self, root: NodeId) {
        let decls: Vec<NodeId> = self.ast.children(root).to_vec();
        for decl in decls {
            let node = self.ast.node(decl);
            if node.kind.is_decl() {
                if let Some(name) = node.name() {
                    let name = name.to_string();
                    if let Some(scope) = self.scopes.first_mut() {
                        scope.insert(name, decl);
                    }
                }
            }
        }
    }

    fn lookup(&self, name: &str) -> Option<NodeId> {
        for scope in self.scopes.iter().rev() {
            if let Some(id) = scope.get(name) {
                return Some(*id);
            }
        }
        None
    }

    fn declare(&mut self, name: &str, id: NodeId) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), id);
        }
    }

    fn resolve(&mut self, id: NodeId) {
        let kind = self.ast.node(id).kind;
        let opens_scope = matches!(
            kind,
            NodeKind::Block
                | NodeKind::FuncDecl
                | NodeKind::MainDecl
                | NodeKind::LambdaExpr
                | NodeKind::ForInExpr
                | NodeKind::MatchCase
                | NodeKind::ClassDecl
                | NodeKind::InterfaceDecl
                | NodeKind::StructDecl
                | NodeKind::EnumDecl
                | NodeKind::ExtendDecl
        );
        if opens_scope {
            self.scopes.push(HashMap::new());
            // Members are visible to each other regardless of order.
            if kind.is_classlike() {
                let members: Vec<NodeId> = self.ast.children(id).to_vec();
                for member in members {
                    let node = self.ast.node(member);
                    if node.kind.is_decl() {
                        if let Some(name) = node.name() {
                            let name = name.to_string();
                            self.declare(&name, member);
                        }
                    }
                }
            }
        }

        let parent_classlike = self.ast.node(id).kind.is_classlike();
        let children: Vec<NodeId> = self.ast.children(id).to_vec();
        for child in children {
            let child_kind = self.ast.node(child).kind;
            let child_name = self.ast.node(child).name().map(str::to_string);
            match child_kind {
                NodeKind::FuncParam => {
                    if let Some(name) = &child_name {
                        self.declare(name, child);
                    }
                }
                NodeKind::VarDecl if !parent_classlike => {
                    // Resolve the initializer before the name becomes
                    // visible, so `var x = x` refers to the outer x.
                    self.resolve(child);
                    if let Some(name) = &child_name {
                        self.declare(name, child);
                    }
                    continue;
                }
                NodeKind::RefExpr => {
                    self.bind_ref(child);
                }
                _ => {}
            }
            self.resolve(child);
        }

        if opens_scope {
            self.scopes.pop();
        }
    }

    fn bind_ref(&mut self, id: NodeId) {
        let name = match self.ast.node(id).name() {
            Some(n) => n.to_string(),
            None => return,
        };
        if let Some(target) = self.lookup(&name) {
            let target_ty = self.ast.node(target).ty.clone();
            let node = self.ast.node_mut(id);
            if let NodeData::Ref { target: slot, .. } = &mut node.data {
                *slot = Some(target);
            }
            if node.ty.is_none() {
                node.ty = target_ty;
            }
        } else if let Some(ty) = self.package_globals.get(&name) {
            // Sibling-file declaration: typed, but no arena-local target.
            self.ast.node_mut(id).ty = ty.clone();
        }
    }
}

/// Bottom-up type inference. Returns the type of `id`, caching it on the
/// node.
fn infer(ast: &mut Ast, id: NodeId) -> Option<String> {
    let children: Vec<NodeId> = ast.children(id).to_vec();
    let mut child_tys = Vec::with_capacity(children.len());
    for child in &children {
        child_tys.push(infer(ast, *child));
    }

    let node = ast.node(id);
    if node.ty.is_some() {
        return node.ty.clone();
    }
    let ty: Option<String> = match node.kind {
        NodeKind::LitConstExpr => match &node.data {
            NodeData::Lit { text } if text.starts_with('"') => Some("String".to_string()),
            NodeData::Lit { text } if text.contains('.') => Some("Float64".to_string()),
            NodeData::Lit { text } if text == "true" || text == "false" => {
                Some("Bool".to_string())
            }
            NodeData::Lit { .. } => Some("Int64".to_string()),
            _ => None,
        },
        NodeKind::BinaryExpr => match &node.data {
            NodeData::Op { op }
                if matches!(
                    op.as_str(),
                    "==" | "!=" | "<" | ">" | "<=" | ">=" | "&&" | "||" | "is"
                ) =>
            {
                Some("Bool".to_string())
            }
            _ => child_tys.first().cloned().flatten().or_else(|| child_tys.get(1).cloned().flatten()),
        },
        NodeKind::UnaryExpr => child_tys.first().cloned().flatten(),
        NodeKind::ParenExpr => child_tys.first().cloned().flatten(),
        NodeKind::AssignExpr => Some("Unit".to_string()),
        NodeKind::CallExpr => {
            // The callee's type is its return type when resolved.
            child_tys.first().cloned().flatten()
        }
        NodeKind::RefExpr => match &node.data {
            NodeData::Ref { target: Some(target), .. } => ast.get(*target).and_then(|n| n.ty.clone()),
            _ => None,
        },
        NodeKind::VarDecl => {
            // Infer from the initializer when the annotation is absent.
            child_tys.last().cloned().flatten()
        }
        NodeKind::RangeExpr => child_tys.first().cloned().flatten().map(|t| format!("Range<{t}>")),
        _ => None,
    };
    if let Some(ty) = &ty {
        ast.node_mut(id).ty = Some(ty.clone());
    }
    ty
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::{Frontend, ReferenceFrontend, SourceFile};
    use cangjie_ast::{WalkAction, walk_from};
    use cangjie_testkit::must_some;
    use pretty_assertions::assert_eq;

    fn check(text: &str) -> ParsedFile {
        let frontend = ReferenceFrontend::default();
        let mut files = vec![frontend.parse(&SourceFile {
            path: "/t/main.cj".to_string(),
            text: text.to_string(),
            file_id: 1,
        })];
        typecheck_package(&mut files);
        files.remove(0)
    }

    fn find_ref<'a>(file: &'a ParsedFile, name: &str) -> Option<&'a cangjie_ast::Node> {
        let mut found = None;
        walk_from(&file.ast, &mut |n| {
            if n.kind == NodeKind::RefExpr && n.name() == Some(name) && found.is_none() {
                found = Some(n.id);
                return WalkAction::Stop;
            }
            WalkAction::WalkChildren
        });
        found.map(|id| file.ast.node(id))
    }

    #[test]
    fn params_resolve_in_body() {
        let file = check("func add(a: Int, b: Int): Int { a + b }");
        let a = find_ref(&file, "a").and_then(|n| match &n.data {
            NodeData::Ref { target, .. } => *target,
            _ => None,
        });
        assert!(a.is_some(), "param reference must resolve");
    }

    #[test]
    fn literal_types_are_inferred() {
        let file = check("func f() { var x = 1 + 2 }");
        let mut var_ty = None;
        walk_from(&file.ast, &mut |n| {
            if n.kind == NodeKind::VarDecl && n.name() == Some("x") {
                var_ty = n.ty.clone();
            }
            WalkAction::WalkChildren
        });
        assert_eq!(var_ty.as_deref(), Some("Int64"));
    }

    #[test]
    fn comparison_is_bool() {
        let file = check("func f(n: Int) { var ok = n > 0 }");
        let mut var_ty = None;
        walk_from(&file.ast, &mut |n| {
            if n.kind == NodeKind::VarDecl && n.name() == Some("ok") {
                var_ty = n.ty.clone();
            }
            WalkAction::WalkChildren
        });
        assert_eq!(var_ty.as_deref(), Some("Bool"));
    }

    #[test]
    fn call_takes_return_type() {
        let file = check("func g(): Int { 1 }\nfunc f() { var y = g() }");
        let mut var_ty = None;
        walk_from(&file.ast, &mut |n| {
            if n.kind == NodeKind::VarDecl && n.name() == Some("y") {
                var_ty = n.ty.clone();
            }
            WalkAction::WalkChildren
        });
        assert_eq!(var_ty.as_deref(), Some("Int"));
    }

    #[test]
    fn signature_renders_like_hover() {
        let file = check("func add(a: Int, b: Int): Int { a + b }");
        let decl = file.ast.top_level_decls()[0];
        assert_eq!(render_signature(&file.ast, decl), "func add(a: Int, b: Int): Int");
    }

    #[test]
    fn cross_file_reference_gets_type_without_target() {
        let frontend = ReferenceFrontend::default();
        let mut files = vec![
            frontend.parse(&SourceFile {
                path: "/t/a.cj".to_string(),
                text: "package p\nfunc helper(): Int { 1 }".to_string(),
                file_id: 1,
            }),
            frontend.parse(&SourceFile {
                path: "/t/b.cj".to_string(),
                text: "package p\nfunc f() { var v = helper() }".to_string(),
                file_id: 2,
            }),
        ];
        typecheck_package(&mut files);
        let b = &files[1];
        let helper = must_some(find_ref(b, "helper"));
        assert_eq!(helper.ty.as_deref(), Some("Int"));
        if let NodeData::Ref { target, .. } = &helper.data {
            assert!(target.is_none(), "cross-file targets stay unresolved in the arena");
        }
    }
}
