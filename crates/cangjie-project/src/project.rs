//! The compiler project: file registry, digests, rebuild driver, cache
//! coordination and live AST ownership.

use crate::ark_ast::{ArkAst, ParseInputs, SemanticId};
use crate::docs::DocCache;
use crate::graph::{FileChangeType, PackageGraph};
use crate::indexer::build_index_shard;
use cangjie_ast::{Ast, Diagnostic, NodeData, NodeId, Range, Token};
use cangjie_index::{CacheManager, MemIndex};
use cangjie_parse::{Frontend, ParsedFile, SourceFile};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Project-level failures. Most degrade to empty query answers; these are
/// the ones worth reporting.
#[derive(Debug, Error)]
pub enum ProjectError {
    /// The package dependency graph contains a cycle.
    #[error("cyclic package imports: {0:?}")]
    CyclicImports(Vec<String>),
    /// A file could not be read from disk.
    #[error("cannot read {path}: {source}")]
    Unreadable {
        /// File path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// What the AST shard stores per file: enough to reinstall semantic views
/// without re-parsing.
#[derive(Debug, Serialize, Deserialize)]
struct StoredFile {
    path: String,
    ast: Ast,
    tokens: Vec<Token>,
    diagnostics: Vec<Diagnostic>,
}

#[derive(Default)]
struct State {
    graph: PackageGraph,
    file_ids: FxHashMap<String, u32>,
    paths: FxHashMap<u32, String>,
    next_file_id: u32,
    digests: FxHashMap<String, String>,
    parse_views: FxHashMap<String, Arc<ArkAst>>,
    sema_views: FxHashMap<String, Arc<ArkAst>>,
    semas: FxHashMap<SemanticId, Arc<ArkAst>>,
    sema_ids: FxHashMap<String, SemanticId>,
    /// Files of packages currently known to come from a loaded shard.
    parsed: FxHashMap<String, ParsedFile>,
}

/// The live project model. One instance exists per server; handlers share
/// it behind an `Arc` (no singletons).
pub struct CompilerProject {
    root: PathBuf,
    frontend: Arc<dyn Frontend>,
    docs: DocCache,
    cache: CacheManager,
    index: Arc<MemIndex>,
    state: RwLock<State>,
    build_locks: Mutex<FxHashMap<String, Arc<Mutex<()>>>>,
    sema_counter: AtomicU64,
    parse_calls: AtomicU64,
}

impl CompilerProject {
    /// Open a project rooted at `root`.
    pub fn new(root: &Path, frontend: Arc<dyn Frontend>, test_mode: bool) -> Self {
        Self {
            root: root.to_path_buf(),
            frontend,
            docs: DocCache::new(),
            cache: CacheManager::new(root, test_mode),
            index: Arc::new(MemIndex::new()),
            state: RwLock::new(State::default()),
            build_locks: Mutex::new(FxHashMap::default()),
            sema_counter: AtomicU64::new(1),
            parse_calls: AtomicU64::new(0),
        }
    }

    /// The shared symbol index.
    pub fn index(&self) -> Arc<MemIndex> {
        Arc::clone(&self.index)
    }

    /// The document cache.
    pub fn docs(&self) -> &DocCache {
        &self.docs
    }

    /// Number of `parse` calls issued so far (observable cache-reuse
    /// signal).
    pub fn parse_call_count(&self) -> u64 {
        self.parse_calls.load(Ordering::Relaxed)
    }

    // ----- file registry --------------------------------------------------

    /// The synthetic id for `path`, interning on first sight.
    pub fn get_file_id(&self, path: &str) -> u32 {
        if let Some(id) = self.state.read().file_ids.get(path) {
            return *id;
        }
        let mut state = self.state.write();
        if let Some(id) = state.file_ids.get(path) {
            return *id;
        }
        state.next_file_id += 1;
        let id = state.next_file_id;
        state.file_ids.insert(path.to_string(), id);
        state.paths.insert(id, path.to_string());
        id
    }

    /// The path registered for a file id.
    pub fn get_path_by_id(&self, file_id: u32) -> Option<String> {
        self.state.read().paths.get(&file_id).cloned()
    }

    // ----- scanning & documents ------------------------------------------

    /// Scan the project root for `.cj` sources and compile everything.
    pub fn load_workspace(&self) -> Result<(), ProjectError> {
        let mut found: Vec<(String, String)> = Vec::new();
        for entry in walkdir::WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|e| e.file_name() != ".cache")
            .flatten()
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("cj") {
                continue;
            }
            let text = std::fs::read_to_string(path).map_err(|source| ProjectError::Unreadable {
                path: path.display().to_string(),
                source,
            })?;
            found.push((path.display().to_string(), text));
        }
        for (path, text) in found {
            self.register_document(&path, 0, text);
        }
        let packages = { self.state.read().graph.package_names() };
        self.rebuild(&packages)
    }

    /// Track a document and place its file in the package graph.
    pub fn register_document(&self, path: &str, version: i64, text: String) {
        let package = self.package_name_of(path, &text);
        self.docs.open(path, version, text);
        self.get_file_id(path);
        let mut state = self.state.write();
        state.graph.add_file(&package, path);
    }

    /// The package a file belongs to: its `package` declaration when
    /// present, otherwise the directory relative to the project root.
    fn package_name_of(&self, path: &str, text: &str) -> String {
        for line in text.lines().take(10) {
            let line = line.trim();
            if let Some(rest) = line.strip_prefix("package ") {
                let name = rest.trim().trim_end_matches(';').to_string();
                if !name.is_empty() {
                    return name;
                }
            }
        }
        let rel = Path::new(path)
            .parent()
            .and_then(|p| p.strip_prefix(&self.root).ok())
            .map(|p| p.display().to_string().replace(['/', '\\'], "."))
            .unwrap_or_default();
        if rel.is_empty() { "default".to_string() } else { rel }
    }

    // ----- updates --------------------------------------------------------

    /// Apply one editor update and rebuild whatever became stale. This is
    /// the scheduler's update entry point.
    pub fn update_document(&self, inputs: &ParseInputs) -> Result<(), ProjectError> {
        if self.docs.is_open(&inputs.file_name) {
            self.docs.update(&inputs.file_name, inputs.version, inputs.contents.clone());
        } else {
            self.register_document(&inputs.file_name, inputs.version, inputs.contents.clone());
        }
        self.refresh_parse_view(&inputs.file_name, inputs.version, &inputs.contents);

        let package = {
            let state = self.state.read();
            state.graph.package_of(&inputs.file_name).map(|p| p.name.clone())
        };
        let Some(package) = package else {
            return Ok(());
        };
        let affected = { self.state.read().graph.affected_by(&package) };
        if inputs.force_rebuild {
            let mut state = self.state.write();
            for pkg in &affected {
                state.digests.remove(pkg);
            }
        }
        self.rebuild(&affected)?;

        // A digest-identical update skips recompilation but must still
        // advance the version tasks observe.
        let mut state = self.state.write();
        let existing = state.sema_views.get(&inputs.file_name).cloned();
        if let Some(view) = existing {
            if view.version < inputs.version {
                let mut bumped = (*view).clone();
                bumped.version = inputs.version;
                let bumped = Arc::new(bumped);
                state.sema_views.insert(inputs.file_name.clone(), Arc::clone(&bumped));
                if let Some(id) = state.sema_ids.get(&inputs.file_name).copied() {
                    state.semas.insert(id, bumped);
                }
            }
        }
        Ok(())
    }

    /// Rebuild the cheap parse-only view of one file, pointing its
    /// `sema_cache` at the last good semantic generation.
    fn refresh_parse_view(&self, path: &str, version: i64, text: &str) {
        let file_id = self.get_file_id(path);
        self.parse_calls.fetch_add(1, Ordering::Relaxed);
        let parsed = self.frontend.parse(&SourceFile {
            path: path.to_string(),
            text: text.to_string(),
            file_id,
        });
        let mut state = self.state.write();
        let sema_cache = state.sema_ids.get(path).copied();
        let package = state
            .graph
            .package_of(path)
            .map(|p| p.name.clone())
            .unwrap_or_default();
        state.parse_views.insert(
            path.to_string(),
            Arc::new(ArkAst {
                file_id,
                path: path.to_string(),
                version,
                tokens: parsed.tokens,
                ast: Arc::new(parsed.ast),
                package,
                sema_cache,
                diagnostics: parsed.diagnostics,
            }),
        );
    }

    /// Watched-file events. `Changed` is a no-op because the editor buffer
    /// is authoritative.
    pub fn file_changed(&self, path: &str, change: FileChangeType) -> Result<(), ProjectError> {
        match change {
            FileChangeType::Changed => Ok(()),
            FileChangeType::Created => {
                let text = std::fs::read_to_string(path).map_err(|source| {
                    ProjectError::Unreadable { path: path.to_string(), source }
                })?;
                self.register_document(path, 0, text);
                let package = {
                    let state = self.state.read();
                    state.graph.package_of(path).map(|p| p.name.clone())
                };
                match package {
                    Some(p) => {
                        let affected = { self.state.read().graph.affected_by(&p) };
                        self.rebuild(&affected)
                    }
                    None => Ok(()),
                }
            }
            FileChangeType::Deleted => self.increment_for_file_delete(path),
        }
    }

    /// Prune a deleted file from its package and rebuild dependents.
    pub fn increment_for_file_delete(&self, path: &str) -> Result<(), ProjectError> {
        self.docs.close(path);
        let owner = {
            let mut state = self.state.write();
            state.parse_views.remove(path);
            state.sema_views.remove(path);
            state.graph.remove_file(path)
        };
        let Some(owner) = owner else {
            return Ok(());
        };
        let affected = {
            let state = self.state.read();
            if state.graph.package(&owner).is_some() {
                state.graph.affected_by(&owner)
            } else {
                // Last file of the package: dependents still need a
                // rebuild against the now-missing package.
                let mut v = state.graph.package_names();
                v.sort();
                v
            }
        };
        if self.state.read().graph.package(&owner).is_none() {
            self.index.unload_package(&owner);
        }
        let mut state = self.state.write();
        for pkg in &affected {
            state.digests.remove(pkg);
        }
        drop(state);
        self.rebuild(&affected)
    }

    // ----- compilation ----------------------------------------------------

    fn build_lock(&self, package: &str) -> Arc<Mutex<()>> {
        let mut locks = self.build_locks.lock();
        Arc::clone(locks.entry(package.to_string()).or_default())
    }

    /// Texts of the package's files, editor buffers taking precedence.
    fn file_texts(&self, package: &str) -> Vec<(String, String)> {
        let files = {
            let state = self.state.read();
            state.graph.package(package).map(|p| p.files.clone()).unwrap_or_default()
        };
        files
            .into_iter()
            .map(|path| {
                let text = self
                    .docs
                    .get(&path)
                    .map(|d| d.text)
                    .or_else(|| std::fs::read_to_string(&path).ok())
                    .unwrap_or_default();
                (path, text)
            })
            .collect()
    }

    /// digest(pkg) = md5(ordered source texts ++ each dependency digest).
    fn compute_digest(&self, package: &str) -> String {
        let mut ctx = Vec::new();
        for (path, text) in self.file_texts(package) {
            ctx.extend_from_slice(path.as_bytes());
            ctx.push(0);
            ctx.extend_from_slice(text.as_bytes());
            ctx.push(0);
        }
        let deps = {
            let state = self.state.read();
            state.graph.package(package).map(|p| p.deps.clone()).unwrap_or_default()
        };
        for dep in deps {
            if let Some(digest) = self.state.read().digests.get(&dep) {
                ctx.extend_from_slice(digest.as_bytes());
                ctx.push(0);
            }
        }
        format!("{:x}", md5::compute(&ctx))
    }

    /// Rebuild `packages` (a subset already ordered dependencies-first is
    /// fine; anything else is reordered topologically).
    pub fn rebuild(&self, packages: &[String]) -> Result<(), ProjectError> {
        let order = {
            let state = self.state.read();
            state.graph.topo_order()
        };
        let order = match order {
            Ok(order) => order,
            Err(cycle) => {
                tracing::warn!(?cycle, "cyclic package imports");
                return Err(ProjectError::CyclicImports(cycle));
            }
        };
        for package in order.iter().filter(|p| packages.contains(p)) {
            self.compile_package(package)?;
        }
        Ok(())
    }

    fn compile_package(&self, package: &str) -> Result<(), ProjectError> {
        let lock = self.build_lock(package);
        let _guard = lock.lock();

        // Refresh the dependency list from current imports before hashing.
        self.refresh_deps(package);
        let digest = self.compute_digest(package);
        let unchanged = {
            let state = self.state.read();
            state.digests.get(package).map(String::as_str) == Some(digest.as_str())
        };
        if unchanged {
            return Ok(());
        }

        if !self.cache.is_stale(package, &digest) {
            if self.try_load_from_cache(package, &digest) {
                self.state.write().digests.insert(package.to_string(), digest);
                return Ok(());
            }
        }

        // Full compile: parse every file, then typecheck the package.
        let module = package.split('.').next().unwrap_or(package).to_string();
        let texts = self.file_texts(package);
        let mut parsed: Vec<ParsedFile> = texts
            .iter()
            .map(|(path, text)| {
                self.parse_calls.fetch_add(1, Ordering::Relaxed);
                self.frontend.parse(&SourceFile {
                    path: path.clone(),
                    text: text.clone(),
                    file_id: self.get_file_id(path),
                })
            })
            .collect();
        let pkg_diags = self.frontend.typecheck(&mut parsed);

        let uris: Vec<(String, &ParsedFile)> = parsed
            .iter()
            .map(|f| {
                let uri = cangjie_uri::fs_path_to_uri(&f.path)
                    .unwrap_or_else(|_| format!("file://{}", f.path));
                (uri, f)
            })
            .collect();
        let shard = build_index_shard(package, &module, &uris);
        drop(uris);

        self.index.load_package(package, &shard);
        if let Err(e) = self.cache.store_index(package, &digest, &shard) {
            tracing::warn!(package, error = %e, "index shard store failed");
        }
        let stored: Vec<StoredFile> = parsed
            .iter()
            .map(|f| StoredFile {
                path: f.path.clone(),
                ast: f.ast.clone(),
                tokens: f.tokens.clone(),
                diagnostics: f.diagnostics.clone(),
            })
            .collect();
        if let Ok(payload) = bincode::serde::encode_to_vec(&stored, bincode::config::standard()) {
            if let Err(e) = self.cache.store_ast(package, &digest, &payload) {
                tracing::warn!(package, error = %e, "ast shard store failed");
            }
        }

        self.install_sema_views(package, parsed, &pkg_diags);
        self.state.write().digests.insert(package.to_string(), digest);
        Ok(())
    }

    /// Derive project-local dependencies from the files' imports.
    fn refresh_deps(&self, package: &str) {
        let texts = self.file_texts(package);
        let mut deps = Vec::new();
        for (_, text) in &texts {
            for line in text.lines() {
                let line = line.trim();
                if let Some(rest) = line.strip_prefix("import ") {
                    let name = rest.trim().trim_end_matches(';');
                    // `import demo.util.helper` may name a symbol inside
                    // the package; try the full name then its parent.
                    deps.push(name.to_string());
                    if let Some((parent, _)) = name.rsplit_once('.') {
                        deps.push(parent.to_string());
                    }
                }
            }
        }
        self.state.write().graph.set_deps(package, deps);
    }

    /// Reinstall semantic views from a verified cache shard pair. Returns
    /// false when either shard is unusable (caller recompiles).
    fn try_load_from_cache(&self, package: &str, digest: &str) -> bool {
        let Some(idx_shard) = self.cache.load_index(package, digest) else {
            return false;
        };
        let Some(payload) = self.cache.load_ast(package) else {
            return false;
        };
        let stored: Vec<StoredFile> =
            match bincode::serde::decode_from_slice(&payload, bincode::config::standard()) {
                Ok((stored, _)) => stored,
                Err(e) => {
                    tracing::warn!(package, error = %e, "ast shard decode failed");
                    return false;
                }
            };
        self.index.load_package(package, &idx_shard);
        let parsed: Vec<ParsedFile> = stored
            .into_iter()
            .map(|f| ParsedFile {
                file_id: self.get_file_id(&f.path),
                path: f.path,
                ast: f.ast,
                tokens: f.tokens,
                diagnostics: f.diagnostics,
            })
            .collect();
        self.install_sema_views(package, parsed, &[]);
        true
    }

    fn install_sema_views(
        &self,
        package: &str,
        parsed: Vec<ParsedFile>,
        pkg_diags: &[Diagnostic],
    ) {
        let mut state = self.state.write();
        for file in parsed {
            let sema_id = SemanticId(self.sema_counter.fetch_add(1, Ordering::Relaxed));
            let version = self.docs.version(&file.path).unwrap_or(0);
            let mut diagnostics = file.diagnostics.clone();
            diagnostics.extend(pkg_diags.iter().cloned());
            let view = Arc::new(ArkAst {
                file_id: file.file_id,
                path: file.path.clone(),
                version,
                tokens: file.tokens.clone(),
                ast: Arc::new(file.ast.clone()),
                package: package.to_string(),
                sema_cache: Some(sema_id),
                diagnostics,
            });
            state.semas.insert(sema_id, Arc::clone(&view));
            // Retire the previous generation so memory stays bounded.
            if let Some(old) = state.sema_ids.insert(file.path.clone(), sema_id) {
                state.semas.remove(&old);
            }
            state.sema_views.insert(file.path.clone(), Arc::clone(&view));
            state.parsed.insert(file.path.clone(), file);
        }
    }

    // ----- queries --------------------------------------------------------

    /// The latest fully built (semantic) snapshot for `file`.
    pub fn get_ark_ast(&self, file: &str) -> Option<Arc<ArkAst>> {
        self.state.read().sema_views.get(file).cloned()
    }

    /// The parse-only snapshot for `file` (its `sema_cache` names the last
    /// semantic generation). Falls back to the semantic view when no edit
    /// arrived yet.
    pub fn get_parse_ast(&self, file: &str) -> Option<Arc<ArkAst>> {
        let state = self.state.read();
        state.parse_views.get(file).cloned().or_else(|| state.sema_views.get(file).cloned())
    }

    /// Resolve a semantic generation id.
    pub fn semantic(&self, id: SemanticId) -> Option<Arc<ArkAst>> {
        self.state.read().semas.get(&id).cloned()
    }

    /// True when `file` has been through at least one semantic build.
    pub fn file_has_sema_cache(&self, file: &str) -> bool {
        self.state.read().sema_ids.contains_key(file)
    }

    /// Diagnostics for `file` from its latest builds (parse view wins for
    /// freshness, semantic view for completeness).
    pub fn diagnostics_for(&self, file: &str) -> Vec<Diagnostic> {
        let state = self.state.read();
        if let Some(view) = state.parse_views.get(file) {
            if state
                .sema_views
                .get(file)
                .map(|s| s.version < view.version)
                .unwrap_or(true)
            {
                return view.diagnostics.clone();
            }
        }
        state.sema_views.get(file).map(|v| v.diagnostics.clone()).unwrap_or_default()
    }

    /// Package-declaration mismatch diagnostics for `file`; part of the
    /// modifier diagnostics published after every update.
    pub fn check_package_modifier(&self, file: &str) -> Vec<Diagnostic> {
        let Some(view) = self.get_parse_ast(file) else {
            return Vec::new();
        };
        let Some(root) = view.ast.root() else {
            return Vec::new();
        };
        let declared = match &view.ast.node(root).data {
            NodeData::File { package, .. } => package.clone(),
            _ => String::new(),
        };
        if declared.is_empty() {
            return Vec::new();
        }
        let expected = {
            let state = self.state.read();
            state.graph.package_of(file).map(|p| p.name.clone())
        };
        match expected {
            Some(expected) if expected != declared => vec![Diagnostic::warning(
                Range::new(view.ast.node(root).begin, view.ast.node(root).begin),
                format!("file belongs to package `{expected}` but declares `{declared}`"),
            )
            .with_code("package-modifier")],
            _ => Vec::new(),
        }
    }

    /// Extend declarations of `type_name` within `package`, as
    /// `(file_path, node_id)` pairs.
    pub fn get_extend_decls(&self, type_name: &str, package: &str) -> Vec<(String, NodeId)> {
        let state = self.state.read();
        let Some(pkg) = state.graph.package(package) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for file in &pkg.files {
            let Some(view) = state.sema_views.get(file) else {
                continue;
            };
            for decl in view.ast.top_level_decls() {
                if let NodeData::Extend { name, .. } = &view.ast.node(decl).data {
                    if name == type_name {
                        out.push((file.clone(), decl));
                    }
                }
            }
        }
        out
    }

    /// True when `pkg_name` is consumed by `module` as a compiled (cjo)
    /// dependency rather than project source.
    pub fn is_cur_module_cjo_dep(&self, module: &str, pkg_name: &str) -> bool {
        let state = self.state.read();
        if state.graph.package(pkg_name).is_some() {
            return false;
        }
        state.graph.package_names().iter().any(|p| {
            p.split('.').next() == Some(module)
                && state
                    .graph
                    .package(p)
                    .is_some_and(|pkg| pkg.files.iter().any(|f| {
                        self.docs
                            .get(f)
                            .map(|d| d.text.contains(&format!("import {pkg_name}")))
                            .unwrap_or(false)
                    }))
        })
    }

    /// Drop parse-only views (the parse cache).
    pub fn clear_parse_cache(&self) {
        self.state.write().parse_views.clear();
    }

    /// Drop AST snapshots for files the editor no longer has open; disk
    /// shards stay.
    pub fn release_memory(&self, open_files: &[String]) {
        let mut state = self.state.write();
        let keep: rustc_hash::FxHashSet<&str> = open_files.iter().map(String::as_str).collect();
        state.parse_views.retain(|path, _| keep.contains(path.as_str()));
        let dropped: Vec<String> = state
            .sema_views
            .keys()
            .filter(|p| !keep.contains(p.as_str()))
            .cloned()
            .collect();
        for path in dropped {
            state.sema_views.remove(&path);
            state.parsed.remove(&path);
            if let Some(id) = state.sema_ids.remove(&path) {
                state.semas.remove(&id);
            }
        }
    }
}
