//! The request façade and server loop.
//!
//! [`ArkServer`] binds every LSP method to a pipeline over the core: it
//! normalizes URIs, converts wire positions, picks the right scheduler
//! (general, completion or signature help), posts a task whose body calls
//! the feature handler, and wraps the reply in a cancellation-aware
//! callback. [`LspServer`] owns the transport loop around it.

use crate::convert;
use crate::features::{self, FeatureCtx};
use crate::options::Options;
use crate::protocol::{JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, error_codes};
use crate::transport;
use cangjie_ast::{Position, Range};
use cangjie_parse::ReferenceFrontend;
use cangjie_position::LineIndex;
use cangjie_project::{CompilerProject, FileChangeType, ParseInputs};
use cangjie_scheduler::{ArkScheduler, CancellationToken, InputsAndAst, NeedDiagnostics};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{Value, json};
use std::io::{BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;

/// Shared reply channel: everything written to the client goes through
/// here, from any worker thread.
pub struct Callbacks {
    out: Mutex<Box<dyn Write + Send>>,
}

impl Callbacks {
    /// Wrap a writer.
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self { out: Mutex::new(out) }
    }

    /// Send a response.
    pub fn reply(&self, response: JsonRpcResponse) {
        let mut out = self.out.lock();
        if let Err(e) = transport::write_message(&mut *out, &response) {
            tracing::warn!(error = %e, "reply write failed");
        }
    }

    /// Send a notification.
    pub fn notify(&self, notification: JsonRpcNotification) {
        let mut out = self.out.lock();
        if let Err(e) = transport::write_notification(&mut *out, &notification) {
            tracing::warn!(error = %e, "notification write failed");
        }
    }
}

/// The façade over project, schedulers and feature handlers.
pub struct ArkServer {
    project: Arc<CompilerProject>,
    scheduler: Arc<ArkScheduler>,
    scheduler_complete: Arc<ArkScheduler>,
    scheduler_signature: Arc<ArkScheduler>,
    callbacks: Arc<Callbacks>,
    pending: Arc<Mutex<FxHashMap<String, CancellationToken>>>,
}

fn id_key(id: &Value) -> String {
    id.to_string()
}

impl ArkServer {
    /// Build the façade over a project root.
    pub fn new(root: &std::path::Path, callbacks: Arc<Callbacks>, test_mode: bool) -> Self {
        let project = Arc::new(CompilerProject::new(
            root,
            Arc::new(ReferenceFrontend),
            test_mode,
        ));
        let scheduler = Arc::new(ArkScheduler::new(Arc::clone(&project)));
        let scheduler_complete = Arc::new(ArkScheduler::new(Arc::clone(&project)));
        let scheduler_signature = Arc::new(ArkScheduler::new(Arc::clone(&project)));

        // Diagnostics are driven from the general scheduler after every
        // update; feature handlers never publish them.
        let diag_callbacks = Arc::clone(&callbacks);
        let diag_project = Arc::clone(&project);
        scheduler.set_diagnostics_sink(Arc::new(move |file, version, diagnostics| {
            let text = diag_project.docs().get(file).map(|d| d.text).unwrap_or_default();
            let index = LineIndex::new(text);
            let items: Vec<Value> = diagnostics
                .iter()
                .map(|d| {
                    json!({
                        "range": convert::range_json(&index, d.range),
                        "severity": d.severity as u8,
                        "message": d.message,
                        "code": d.code,
                        "source": "Cangjie",
                    })
                })
                .collect();
            diag_callbacks.notify(JsonRpcNotification::new(
                "textDocument/publishDiagnostics",
                json!({
                    "uri": convert::uri_of(file),
                    "version": version,
                    "diagnostics": items,
                }),
            ));
        }));

        Self {
            project,
            scheduler,
            scheduler_complete,
            scheduler_signature,
            callbacks,
            pending: Arc::new(Mutex::new(FxHashMap::default())),
        }
    }

    /// The underlying project (tests reach through here).
    pub fn project(&self) -> Arc<CompilerProject> {
        Arc::clone(&self.project)
    }

    /// Scan and compile the workspace (driven by `initialized`).
    pub fn load_workspace(&self) {
        if let Err(e) = self.project.load_workspace() {
            tracing::warn!(error = %e, "workspace load failed");
        }
    }

    /// Track an editor update.
    pub fn add_doc(&self, file: String, contents: String, version: i64, need_diagnostics: NeedDiagnostics) {
        let inputs = ParseInputs::new(file, contents, version);
        self.scheduler.update(inputs, need_diagnostics);
    }

    /// Watched-file events.
    pub fn change_watched_file(&self, file: &str, change: FileChangeType) {
        if let Err(e) = self.project.file_changed(file, change) {
            tracing::warn!(file, error = %e, "watched-file handling failed");
        }
    }

    /// Explicit `$/cancelRequest`.
    pub fn cancel(&self, id: &Value) {
        if let Some(token) = self.pending.lock().remove(&id_key(id)) {
            token.cancel();
        }
    }

    /// Post a task on a scheduler, wiring the cancellation-aware reply.
    #[allow(clippy::too_many_arguments)]
    fn post(
        &self,
        scheduler: &Arc<ArkScheduler>,
        use_cache: bool,
        task_name: &'static str,
        file: String,
        id: Option<Value>,
        on_miss: Value,
        handler: impl FnOnce(&FeatureCtx<'_>, &InputsAndAst) -> Value + Send + 'static,
    ) {
        let callbacks = Arc::clone(&self.callbacks);
        let project = Arc::clone(&self.project);
        let pending = Arc::clone(&self.pending);
        let reply_id = id.clone();
        let pending_key = id.as_ref().map(|v| id_key(v));

        let action = move |input: &InputsAndAst| {
            if let Some(key) = &pending_key {
                pending.lock().remove(key);
            }
            if input.token.is_cancelled() {
                callbacks.reply(JsonRpcResponse::error(reply_id, JsonRpcError::cancelled()));
                return;
            }
            let value = match &input.ast {
                Some(ast) => {
                    let ctx = FeatureCtx::new(&project, ast);
                    handler(&ctx, input)
                }
                None => on_miss,
            };
            callbacks.reply(JsonRpcResponse::success(reply_id, value));
        };

        let token = if use_cache {
            scheduler.run_with_ast_cache(task_name, &file, action)
        } else {
            scheduler.run_with_ast(task_name, &file, action)
        };
        if let Some(id) = id {
            self.pending.lock().insert(id_key(&id), token);
        }
    }

    /// Route one request. Unknown methods get `MethodNotFound`.
    pub fn dispatch(&self, req: JsonRpcRequest) {
        let id = req.id.clone();
        let params = req.params.clone().unwrap_or(Value::Null);

        // Hierarchy follow-ups carry their file inside `item.uri`.
        let file_from_item = params
            .get("item")
            .and_then(|i| i.get("uri"))
            .and_then(Value::as_str)
            .and_then(cangjie_uri::uri_to_fs_path)
            .map(|p| p.display().to_string());
        let Some(file) = convert::path_of(&params).or(file_from_item) else {
            // Methods without a textDocument param.
            match req.method.as_str() {
                "workspace/symbol" => {
                    let query = params.get("query").and_then(Value::as_str).unwrap_or("").to_string();
                    self.workspace_symbol(id, query);
                }
                _ => self.callbacks.reply(JsonRpcResponse::error(
                    id,
                    JsonRpcError::new(error_codes::INVALID_PARAMS, "missing textDocument.uri"),
                )),
            }
            return;
        };

        let wire_pos = convert::wire_position(&params);
        match req.method.as_str() {
            "textDocument/hover" => self.positional(id, file, wire_pos, "Hover", Value::Null, features::hover::find_hover),
            "textDocument/definition" => self.positional(id, file, wire_pos, "Definition", Value::Null, features::hover::find_definition),
            "textDocument/references" => self.positional(id, file, wire_pos, "References", json!([]), features::navigation::find_references),
            "textDocument/documentHighlight" => self.positional(id, file, wire_pos, "Highlights", Value::Null, features::navigation::find_document_highlights),
            "textDocument/prepareRename" => self.positional(id, file, wire_pos, "PrepareRename", Value::Null, features::navigation::prepare_rename),
            "textDocument/rename" => {
                let new_name = params.get("newName").and_then(Value::as_str).unwrap_or("").to_string();
                self.positional(id, file, wire_pos, "Rename", Value::Null, move |ctx, pos| {
                    features::navigation::rename(ctx, pos, &new_name)
                });
            }
            "textDocument/typeHierarchy/prepare" => self.positional(id, file, wire_pos, "TypeHierarchy", Value::Null, features::hierarchy::prepare_type_hierarchy),
            "typeHierarchy/supertypes" => self.with_item(id, file, "SuperTypes", params, features::hierarchy::find_supertypes),
            "typeHierarchy/subtypes" => self.with_item(id, file, "SubTypes", params, features::hierarchy::find_subtypes),
            "textDocument/callHierarchy/prepare" | "textDocument/prepareCallHierarchy" => {
                self.positional(id, file, wire_pos, "CallHierarchy", Value::Null, features::hierarchy::prepare_call_hierarchy)
            }
            "callHierarchy/incomingCalls" => self.with_item(id, file, "IncomingCalls", params, features::hierarchy::find_incoming_calls),
            "callHierarchy/outgoingCalls" => self.with_item(id, file, "OutgoingCalls", params, features::hierarchy::find_outgoing_calls),
            "textDocument/overrideMethods" => self.positional(id, file, wire_pos, "OverrideMethods", Value::Null, features::hierarchy::find_override_methods),
            "textDocument/documentSymbol" => self.whole_file(id, file, "DocumentSymbol", json!([]), |ctx, _| features::symbols::find_document_symbols(ctx)),
            "textDocument/documentLink" => self.whole_file(id, file, "DocumentLink", json!([]), |ctx, _| features::symbols::find_document_links(ctx)),
            "textDocument/codeLens" => self.whole_file(id, file, "CodeLens", json!([]), |ctx, _| features::symbols::find_code_lens(ctx)),
            "textDocument/semanticTokens/full" => self.whole_file(id, file, "SemanticTokens", Value::Null, |ctx, _| features::semantic_tokens::find_semantic_tokens(ctx)),
            "textDocument/breakpointLocations" => {
                let wire = convert::wire_range(&params);
                self.whole_file(id, file, "Breakpoints", json!([]), move |ctx, _| {
                    let Some((start, end)) = wire else {
                        return json!([]);
                    };
                    let start = convert::to_internal(&ctx.text, ctx.ast.file_id, start);
                    let end = convert::to_internal(&ctx.text, ctx.ast.file_id, end);
                    features::symbols::find_breakpoint_locations(ctx, Range::new(start, end))
                });
            }
            "textDocument/codeAction" => {
                let wire = convert::wire_range(&params);
                self.whole_file(id, file, "CodeAction", json!([]), move |ctx, _| {
                    let Some((start, end)) = wire else {
                        return json!([]);
                    };
                    let start = convert::to_internal(&ctx.text, ctx.ast.file_id, start);
                    let mut end = convert::to_internal(&ctx.text, ctx.ast.file_id, end);
                    // The wire end is exclusive; selections are inclusive.
                    if end.column > 1 {
                        end.column -= 1;
                    }
                    features::code_actions::find_code_actions(ctx, Range::new(start, end))
                });
            }
            "textDocument/completion" => {
                let Some(wire) = wire_pos else {
                    self.callbacks.reply(JsonRpcResponse::null(id));
                    return;
                };
                self.post(
                    &self.scheduler_complete,
                    true,
                    "Completion",
                    file,
                    id,
                    Value::Null,
                    move |ctx, _| {
                        let pos = convert::to_internal(&ctx.text, ctx.ast.file_id, wire);
                        features::completion::find_completion(ctx, pos)
                    },
                );
            }
            "textDocument/signatureHelp" => {
                let Some(wire) = wire_pos else {
                    self.callbacks.reply(JsonRpcResponse::null(id));
                    return;
                };
                self.post(
                    &self.scheduler_signature,
                    true,
                    "SignatureHelp",
                    file,
                    id,
                    Value::Null,
                    move |ctx, _| {
                        let pos = convert::to_internal(&ctx.text, ctx.ast.file_id, wire);
                        features::completion::find_signature_help(ctx, pos)
                    },
                );
            }
            other => {
                tracing::debug!(method = other, "unsupported method");
                self.callbacks.reply(JsonRpcResponse::error(
                    id,
                    JsonRpcError::new(error_codes::METHOD_NOT_FOUND, format!("unknown method {other}")),
                ));
            }
        }
    }

    /// A position-based request on the general scheduler.
    fn positional(
        &self,
        id: Option<Value>,
        file: String,
        wire_pos: Option<cangjie_position::WirePosition>,
        task_name: &'static str,
        on_miss: Value,
        handler: impl FnOnce(&FeatureCtx<'_>, Position) -> Value + Send + 'static,
    ) {
        let Some(wire) = wire_pos else {
            self.callbacks.reply(JsonRpcResponse::success(id, on_miss));
            return;
        };
        let miss = on_miss.clone();
        self.post(&self.scheduler, false, task_name, file, id, on_miss, move |ctx, _| {
            let pos = convert::to_internal(&ctx.text, ctx.ast.file_id, wire);
            if pos == cangjie_ast::INVALID_POSITION {
                return miss;
            }
            handler(ctx, pos)
        });
    }

    /// A whole-file request on the general scheduler.
    fn whole_file(
        &self,
        id: Option<Value>,
        file: String,
        task_name: &'static str,
        on_miss: Value,
        handler: impl FnOnce(&FeatureCtx<'_>, &InputsAndAst) -> Value + Send + 'static,
    ) {
        self.post(&self.scheduler, false, task_name, file, id, on_miss, handler);
    }

    /// Hierarchy follow-up requests carrying an `item` payload.
    fn with_item(
        &self,
        id: Option<Value>,
        file: String,
        task_name: &'static str,
        params: Value,
        handler: impl FnOnce(&FeatureCtx<'_>, &Value) -> Value + Send + 'static,
    ) {
        self.post(&self.scheduler, false, task_name, file, id, Value::Null, move |ctx, _| {
            handler(ctx, &params)
        });
    }

    fn workspace_symbol(&self, id: Option<Value>, query: String) {
        // Workspace symbols do not target one file; answer from the index
        // directly on any worker via the first known document, falling
        // back to a synchronous reply on an empty project.
        let docs = self.project.docs().all();
        let Some(doc) = docs.first() else {
            self.callbacks.reply(JsonRpcResponse::success(id, json!([])));
            return;
        };
        let file = doc.path.clone();
        self.post(&self.scheduler, false, "WorkspaceSymbol", file, id, json!([]), move |ctx, _| {
            features::symbols::find_workspace_symbols(ctx, &query)
        });
    }
}

/// The transport loop.
pub struct LspServer {
    options: Options,
    callbacks: Arc<Callbacks>,
    server: Option<ArkServer>,
    shutdown_requested: bool,
}

impl LspServer {
    /// Create a server writing to stdout.
    pub fn new(options: Options) -> anyhow::Result<Self> {
        Ok(Self::with_writer(options, Box::new(std::io::stdout())))
    }

    /// Create a server writing replies to `out` (tests capture replies
    /// this way).
    pub fn with_writer(options: Options, out: Box<dyn Write + Send>) -> Self {
        let callbacks = Arc::new(Callbacks::new(out));
        Self { options, callbacks, server: None, shutdown_requested: false }
    }

    /// Run until `exit`. Returns the process exit code: 0 after a clean
    /// `shutdown`/`exit` pair, 1 otherwise.
    pub fn run(&mut self) -> anyhow::Result<i32> {
        let stdin = std::io::stdin();
        let mut reader = BufReader::new(stdin.lock());
        loop {
            let message = match transport::read_message(&mut reader) {
                Ok(Some(message)) => message,
                Ok(None) => return Ok(if self.shutdown_requested { 0 } else { 1 }),
                Err(e) => {
                    tracing::warn!(error = %e, "transport error");
                    continue;
                }
            };
            if let Some(code) = self.handle(message) {
                return Ok(code);
            }
        }
    }

    /// Handle one message; `Some(code)` ends the loop.
    pub fn handle(&mut self, req: JsonRpcRequest) -> Option<i32> {
        match req.method.as_str() {
            "initialize" => {
                let root = req
                    .params
                    .as_ref()
                    .and_then(|p| p.get("rootUri"))
                    .and_then(Value::as_str)
                    .and_then(cangjie_uri::uri_to_fs_path)
                    .or_else(|| {
                        self.options.value("root").map(PathBuf::from)
                    })
                    .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());
                self.server = Some(ArkServer::new(
                    &root,
                    Arc::clone(&self.callbacks),
                    self.options.test_mode(),
                ));
                self.callbacks.reply(JsonRpcResponse::success(req.id, capabilities()));
            }
            "initialized" => {
                if let Some(server) = &self.server {
                    server.load_workspace();
                }
            }
            "shutdown" => {
                self.shutdown_requested = true;
                self.callbacks.reply(JsonRpcResponse::null(req.id));
            }
            "exit" => {
                return Some(if self.shutdown_requested { 0 } else { 1 });
            }
            "$/cancelRequest" => {
                if let (Some(server), Some(params)) = (&self.server, &req.params) {
                    if let Some(id) = params.get("id") {
                        server.cancel(id);
                    }
                }
            }
            "textDocument/didOpen" => {
                if let (Some(server), Some(params)) = (&self.server, &req.params) {
                    if let Some((path, text, version)) = text_document_payload(params, "textDocument") {
                        server.add_doc(path, text, version, NeedDiagnostics::Yes);
                    }
                }
            }
            "textDocument/didChange" => {
                if let (Some(server), Some(params)) = (&self.server, &req.params) {
                    // Full-sync: the last change carries the whole text.
                    let path = convert::path_of(params);
                    let version = params
                        .get("textDocument")
                        .and_then(|d| d.get("version"))
                        .and_then(Value::as_i64)
                        .unwrap_or(0);
                    let text = params
                        .get("contentChanges")
                        .and_then(Value::as_array)
                        .and_then(|c| c.last())
                        .and_then(|c| c.get("text"))
                        .and_then(Value::as_str)
                        .map(str::to_string);
                    if let (Some(path), Some(text)) = (path, text) {
                        server.add_doc(path, text, version, NeedDiagnostics::Yes);
                    }
                }
            }
            "textDocument/didClose" => {
                if let (Some(server), Some(params)) = (&self.server, &req.params) {
                    if let Some(path) = convert::path_of(params) {
                        server.project().docs().close(&path);
                    }
                }
            }
            "cangjie/releaseMemory" => {
                // Drop AST snapshots for files the editor closed; on-disk
                // shards stay.
                if let Some(server) = &self.server {
                    let project = server.project();
                    let open: Vec<String> =
                        project.docs().all().into_iter().map(|d| d.path).collect();
                    project.release_memory(&open);
                }
            }
            "workspace/didChangeWatchedFiles" => {
                if let (Some(server), Some(params)) = (&self.server, &req.params) {
                    let changes = params.get("changes").and_then(Value::as_array);
                    for change in changes.into_iter().flatten() {
                        let path = change
                            .get("uri")
                            .and_then(Value::as_str)
                            .and_then(cangjie_uri::uri_to_fs_path);
                        let kind = match change.get("type").and_then(Value::as_u64) {
                            Some(1) => Some(FileChangeType::Created),
                            Some(2) => Some(FileChangeType::Changed),
                            Some(3) => Some(FileChangeType::Deleted),
                            _ => None,
                        };
                        if let (Some(path), Some(kind)) = (path, kind) {
                            server.change_watched_file(&path.display().to_string(), kind);
                        }
                    }
                }
            }
            "workspace/applyEdit" => {
                // Response to a server-initiated request; nothing to do.
            }
            _ if req.is_notification() => {
                tracing::debug!(method = %req.method, "ignored notification");
            }
            _ => match &self.server {
                Some(server) => server.dispatch(req),
                None => self.callbacks.reply(JsonRpcResponse::error(
                    req.id,
                    JsonRpcError::new(error_codes::INTERNAL_ERROR, "server not initialized"),
                )),
            },
        }
        None
    }
}

fn text_document_payload(params: &Value, key: &str) -> Option<(String, String, i64)> {
    let doc = params.get(key)?;
    let uri = doc.get("uri")?.as_str()?;
    let path = cangjie_uri::uri_to_fs_path(uri)?.display().to_string();
    let text = doc.get("text")?.as_str()?.to_string();
    let version = doc.get("version").and_then(Value::as_i64).unwrap_or(0);
    Some((path, text, version))
}

fn capabilities() -> Value {
    json!({
        "capabilities": {
            "textDocumentSync": { "openClose": true, "change": 1 },
            "hoverProvider": true,
            "definitionProvider": true,
            "referencesProvider": true,
            "documentHighlightProvider": true,
            "documentSymbolProvider": true,
            "documentLinkProvider": {},
            "workspaceSymbolProvider": true,
            "renameProvider": { "prepareProvider": true },
            "completionProvider": { "triggerCharacters": [".", ":"] },
            "signatureHelpProvider": { "triggerCharacters": ["(", ","] },
            "semanticTokensProvider": {
                "legend": crate::features::semantic_tokens::legend(),
                "full": true,
            },
            "typeHierarchyProvider": true,
            "callHierarchyProvider": true,
            "codeActionProvider": true,
            "codeLensProvider": {},
        },
        "serverInfo": { "name": "cangjie-ls", "version": env!("CARGO_PKG_VERSION") },
    })
}
