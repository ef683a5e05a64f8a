//! The in-memory index.
//!
//! Loaded shards contribute per-package slabs; queries merge them through
//! four keyed collections. Reads take shared locks (queries run on many
//! workers at once); package (re)loads take the write side and replace that
//! package's previous contribution wholesale.

use crate::shard::IndexShard;
use crate::symbol::{ExtendItem, Ref, RefKind, Relation, RelationKind, Symbol, SymbolId};
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

/// One completion suggestion produced by the import-aware walk.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionCandidate {
    /// Package the symbol lives in.
    pub package: String,
    /// The symbol itself.
    pub symbol: Symbol,
    /// Hint shown next to the label (`import demo.util`).
    pub hint: String,
}

#[derive(Default)]
struct Slabs {
    lookup: FxHashMap<SymbolId, Symbol>,
    refs: FxHashMap<SymbolId, Vec<Ref>>,
    relations_fwd: FxHashMap<(SymbolId, RelationKind), Vec<SymbolId>>,
    relations_rev: FxHashMap<(RelationKind, SymbolId), Vec<SymbolId>>,
    extends: FxHashMap<SymbolId, Vec<ExtendItem>>,
    /// Which ids each package contributed, for wholesale replacement.
    by_package: FxHashMap<String, Vec<SymbolId>>,
    relations_by_package: FxHashMap<String, Vec<Relation>>,
}

/// Thread-safe symbol/ref/relation/extend index.
#[derive(Default)]
pub struct MemIndex {
    slabs: RwLock<Slabs>,
}

impl MemIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace `package`'s contribution with `shard`.
    pub fn load_package(&self, package: &str, shard: &IndexShard) {
        let mut slabs = self.slabs.write();
        Self::unload_locked(&mut slabs, package);

        let mut ids = Vec::with_capacity(shard.symbols.len());
        for symbol in &shard.symbols {
            ids.push(symbol.id);
            slabs.lookup.insert(symbol.id, symbol.clone());
        }
        for (id, refs) in &shard.refs {
            slabs.refs.entry(*id).or_default().extend(refs.iter().cloned());
        }
        for relation in &shard.relations {
            slabs
                .relations_fwd
                .entry((relation.subject, relation.predicate))
                .or_default()
                .push(relation.object);
            slabs
                .relations_rev
                .entry((relation.predicate, relation.object))
                .or_default()
                .push(relation.subject);
        }
        for (id, extends) in &shard.extends {
            slabs.extends.entry(*id).or_default().extend(extends.iter().cloned());
        }
        slabs.by_package.insert(package.to_string(), ids);
        slabs
            .relations_by_package
            .insert(package.to_string(), shard.relations.clone());
    }

    /// Drop `package`'s contribution.
    pub fn unload_package(&self, package: &str) {
        let mut slabs = self.slabs.write();
        Self::unload_locked(&mut slabs, package);
    }

    fn unload_locked(slabs: &mut Slabs, package: &str) {
        let Some(ids) = slabs.by_package.remove(package) else {
            return;
        };
        for id in &ids {
            slabs.lookup.remove(id);
            slabs.refs.remove(id);
            slabs.extends.remove(id);
        }
        if let Some(relations) = slabs.relations_by_package.remove(package) {
            for relation in relations {
                if let Some(objects) =
                    slabs.relations_fwd.get_mut(&(relation.subject, relation.predicate))
                {
                    objects.retain(|o| *o != relation.object);
                }
                if let Some(subjects) =
                    slabs.relations_rev.get_mut(&(relation.predicate, relation.object))
                {
                    subjects.retain(|s| *s != relation.subject);
                }
            }
        }
    }

    /// Invoke `cb` for each id in `ids` that resolves to a symbol.
    pub fn lookup(&self, ids: &[SymbolId], mut cb: impl FnMut(&Symbol)) {
        let slabs = self.slabs.read();
        for id in ids {
            if let Some(symbol) = slabs.lookup.get(id) {
                cb(symbol);
            }
        }
    }

    /// Convenience single-id lookup.
    pub fn symbol(&self, id: SymbolId) -> Option<Symbol> {
        let slabs = self.slabs.read();
        slabs.lookup.get(&id).cloned()
    }

    /// Invoke `cb` for each reference of each id, optionally filtered by
    /// kind.
    pub fn refs(&self, ids: &[SymbolId], kind: Option<RefKind>, mut cb: impl FnMut(&Ref)) {
        let slabs = self.slabs.read();
        for id in ids {
            if let Some(refs) = slabs.refs.get(id) {
                for r in refs {
                    if kind.is_none() || kind == Some(r.kind) {
                        cb(r);
                    }
                }
            }
        }
    }

    /// Objects related to `id` under `predicate` (forward direction).
    pub fn relations(&self, id: SymbolId, predicate: RelationKind) -> Vec<SymbolId> {
        let slabs = self.slabs.read();
        slabs.relations_fwd.get(&(id, predicate)).cloned().unwrap_or_default()
    }

    /// Subjects relating to `id` under `predicate` (reverse direction).
    pub fn relations_to(&self, id: SymbolId, predicate: RelationKind) -> Vec<SymbolId> {
        let slabs = self.slabs.read();
        slabs.relations_rev.get(&(predicate, id)).cloned().unwrap_or_default()
    }

    /// Extends recorded against `id`.
    pub fn extends(&self, id: SymbolId) -> Vec<ExtendItem> {
        let slabs = self.slabs.read();
        slabs.extends.get(&id).cloned().unwrap_or_default()
    }

    /// Walk `base_of` upward from `id`, collecting every supertype up to
    /// the topmost. `out` receives intermediate and final ids, deepest
    /// last; cycles terminate.
    pub fn find_ridden_up(&self, id: SymbolId, out: &mut Vec<SymbolId>) {
        let slabs = self.slabs.read();
        let mut seen = FxHashSet::default();
        let mut frontier = vec![id];
        while let Some(cur) = frontier.pop() {
            let supers = slabs
                .relations_rev
                .get(&(RelationKind::BaseOf, cur))
                .cloned()
                .unwrap_or_default();
            for s in supers {
                if seen.insert(s) {
                    out.push(s);
                    frontier.push(s);
                }
            }
        }
    }

    /// Walk `base_of` downward from `id`, collecting every subtype.
    pub fn find_ridden_down(&self, id: SymbolId, out: &mut Vec<SymbolId>) {
        let slabs = self.slabs.read();
        let mut seen = FxHashSet::default();
        let mut frontier = vec![id];
        while let Some(cur) = frontier.pop() {
            let subs = slabs
                .relations_fwd
                .get(&(cur, RelationKind::BaseOf))
                .cloned()
                .unwrap_or_default();
            for s in subs {
                if seen.insert(s) {
                    out.push(s);
                    frontier.push(s);
                }
            }
        }
    }

    /// Outgoing calls: every `(callee, call refs)` pair whose references
    /// are contained by `container`. Drives `callHierarchy/outgoingCalls`.
    pub fn calls_from(&self, container: SymbolId) -> Vec<(SymbolId, Vec<Ref>)> {
        let slabs = self.slabs.read();
        let mut out: Vec<(SymbolId, Vec<Ref>)> = Vec::new();
        for (callee, refs) in &slabs.refs {
            let calls: Vec<Ref> = refs
                .iter()
                .filter(|r| r.kind == RefKind::Call && r.container == container)
                .cloned()
                .collect();
            if !calls.is_empty() {
                out.push((*callee, calls));
            }
        }
        out.sort_by_key(|(id, _)| *id);
        out
    }

    /// All symbols whose name contains `query` (case-insensitive), for
    /// `workspace/symbol`.
    pub fn fuzzy_find(&self, query: &str, mut cb: impl FnMut(&Symbol)) {
        let needle = query.to_lowercase();
        let slabs = self.slabs.read();
        for symbol in slabs.lookup.values() {
            if needle.is_empty() || symbol.name.to_lowercase().contains(&needle) {
                cb(symbol);
            }
        }
    }

    /// Walk indexed symbols of packages other than `cur_pkg` whose name
    /// starts with `prefix`, skipping ids in `seen`, deprecated symbols and
    /// non-public ones, and emit a candidate per hit. Mirrors the
    /// import-aware completion walk.
    pub fn find_import_syms_on_completion(
        &self,
        seen: &FxHashSet<SymbolId>,
        cur_pkg: &str,
        cur_module: &str,
        prefix: &str,
        mut cb: impl FnMut(CompletionCandidate),
    ) {
        let slabs = self.slabs.read();
        for (package, ids) in &slabs.by_package {
            if package == cur_pkg {
                continue;
            }
            for id in ids {
                if seen.contains(id) {
                    continue;
                }
                let Some(symbol) = slabs.lookup.get(id) else {
                    continue;
                };
                if !symbol.name.starts_with(prefix) {
                    continue;
                }
                // Capability gate: only public, non-deprecated API leaks
                // across packages, and cjo symbols only within one module.
                if symbol.is_deprecated || symbol.modifier != crate::symbol::Modifier::Public {
                    continue;
                }
                if symbol.is_cjo_sym && symbol.cur_module != cur_module {
                    continue;
                }
                cb(CompletionCandidate {
                    package: package.clone(),
                    symbol: symbol.clone(),
                    hint: format!("import {package}"),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::Modifier;
    use cangjie_ast::NodeKind;
    use pretty_assertions::assert_eq;

    fn sym(id: u64, name: &str) -> Symbol {
        Symbol {
            id: SymbolId(id),
            name: name.to_string(),
            kind: Some(NodeKind::FuncDecl),
            modifier: Modifier::Public,
            ..Symbol::default()
        }
    }

    fn shard_with(symbols: Vec<Symbol>, relations: Vec<Relation>) -> IndexShard {
        IndexShard { symbols, relations, ..IndexShard::default() }
    }

    #[test]
    fn load_then_lookup() {
        let index = MemIndex::new();
        index.load_package("demo.core", &shard_with(vec![sym(1, "add")], vec![]));
        let mut names = Vec::new();
        index.lookup(&[SymbolId(1), SymbolId(9)], |s| names.push(s.name.clone()));
        assert_eq!(names, vec!["add".to_string()]);
    }

    #[test]
    fn reload_replaces_contribution() {
        let index = MemIndex::new();
        index.load_package("demo.core", &shard_with(vec![sym(1, "add")], vec![]));
        index.load_package("demo.core", &shard_with(vec![sym(2, "sum")], vec![]));
        assert!(index.symbol(SymbolId(1)).is_none());
        assert!(index.symbol(SymbolId(2)).is_some());
    }

    #[test]
    fn relations_are_bidirectional() {
        let index = MemIndex::new();
        let base_of = Relation {
            subject: SymbolId(10),
            predicate: RelationKind::BaseOf,
            object: SymbolId(20),
        };
        index.load_package("demo.core", &shard_with(vec![sym(10, "Base"), sym(20, "Sub")], vec![base_of]));
        assert_eq!(index.relations(SymbolId(10), RelationKind::BaseOf), vec![SymbolId(20)]);
        assert_eq!(index.relations_to(SymbolId(20), RelationKind::BaseOf), vec![SymbolId(10)]);
    }

    #[test]
    fn ridden_up_walks_transitively() {
        let index = MemIndex::new();
        let rels = vec![
            Relation { subject: SymbolId(1), predicate: RelationKind::BaseOf, object: SymbolId(2) },
            Relation { subject: SymbolId(2), predicate: RelationKind::BaseOf, object: SymbolId(3) },
        ];
        index.load_package(
            "demo.core",
            &shard_with(vec![sym(1, "Top"), sym(2, "Mid"), sym(3, "Leaf")], rels),
        );
        let mut out = Vec::new();
        index.find_ridden_up(SymbolId(3), &mut out);
        assert_eq!(out, vec![SymbolId(2), SymbolId(1)]);

        let mut down = Vec::new();
        index.find_ridden_down(SymbolId(1), &mut down);
        assert_eq!(down, vec![SymbolId(2), SymbolId(3)]);
    }

    #[test]
    fn completion_walk_filters() {
        let index = MemIndex::new();
        let mut deprecated = sym(5, "prefixOld");
        deprecated.is_deprecated = true;
        index.load_package(
            "demo.util",
            &shard_with(vec![sym(4, "prefixNew"), deprecated, sym(6, "other")], vec![]),
        );
        index.load_package("demo.core", &shard_with(vec![sym(7, "prefixLocal")], vec![]));

        let mut hits = Vec::new();
        index.find_import_syms_on_completion(
            &FxHashSet::default(),
            "demo.core",
            "demo",
            "prefix",
            |c| hits.push(c),
        );
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].symbol.name, "prefixNew");
        assert_eq!(hits[0].hint, "import demo.util");
    }

    #[test]
    fn missing_shard_yields_empty_answers() {
        let index = MemIndex::new();
        assert!(index.symbol(SymbolId(1)).is_none());
        assert!(index.relations(SymbolId(1), RelationKind::BaseOf).is_empty());
        let mut refs = 0;
        index.refs(&[SymbolId(1)], None, |_| refs += 1);
        assert_eq!(refs, 0);
    }

    #[test]
    fn refs_filter_by_kind() {
        let index = MemIndex::new();
        let mut shard = shard_with(vec![sym(1, "x")], vec![]);
        shard.refs.insert(
            SymbolId(1),
            vec![
                Ref { kind: RefKind::Definition, ..Ref::default() },
                Ref { kind: RefKind::Call, ..Ref::default() },
            ],
        );
        index.load_package("demo.core", &shard);
        let mut calls = 0;
        index.refs(&[SymbolId(1)], Some(RefKind::Call), |_| calls += 1);
        assert_eq!(calls, 1);
        let mut all = 0;
        index.refs(&[SymbolId(1)], None, |_| all += 1);
        assert_eq!(all, 2);
    }
}
