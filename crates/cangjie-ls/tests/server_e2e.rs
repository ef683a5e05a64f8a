#![allow(clippy::panic)]

//! End-to-end scenarios driven through the façade.

use cangjie_ls::protocol::JsonRpcRequest;
use cangjie_ls::server::{ArkServer, Callbacks, LspServer};
use cangjie_ls::Options;
use cangjie_testkit::{must, must_some};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A writer both the server workers and the test can see.
#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl SharedBuf {
    /// All framed JSON payloads received so far.
    fn messages(&self) -> Vec<Value> {
        let bytes = self.0.lock().clone();
        let text = String::from_utf8_lossy(&bytes).to_string();
        let mut out = Vec::new();
        let mut rest = text.as_str();
        while let Some(idx) = rest.find("\r\n\r\n") {
            let header = &rest[..idx];
            let len: usize = header
                .lines()
                .find_map(|l| l.strip_prefix("Content-Length:"))
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0);
            let body_start = idx + 4;
            if rest.len() < body_start + len {
                break;
            }
            if let Ok(value) = serde_json::from_str(&rest[body_start..body_start + len]) {
                out.push(value);
            }
            rest = &rest[body_start + len..];
        }
        out
    }

    /// Wait for the response with `id`.
    fn wait_for(&self, id: i64) -> Value {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            for message in self.messages() {
                if message.get("id") == Some(&json!(id)) {
                    return message;
                }
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("no response for id {id}");
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    server: ArkServer,
    out: SharedBuf,
    file_uri: String,
}

fn fixture(content: &str) -> Fixture {
    let dir = must(tempfile::tempdir());
    let path = dir.path().join("core/main.cj");
    must(std::fs::create_dir_all(must_some(path.parent())));
    must(std::fs::write(&path, content));
    let out = SharedBuf::default();
    let callbacks = Arc::new(Callbacks::new(Box::new(out.clone())));
    let server = ArkServer::new(dir.path(), callbacks, true);
    server.load_workspace();
    let file_uri = must(cangjie_uri::fs_path_to_uri(&path));
    Fixture { _dir: dir, server, out, file_uri }
}

fn request(fixture: &Fixture, id: i64, method: &str, params: Value) -> Value {
    let req: JsonRpcRequest = must(serde_json::from_value(json!({
        "jsonrpc": "2.0", "id": id, "method": method, "params": params
    })));
    fixture.server.dispatch(req);
    fixture.out.wait_for(id)
}

#[test]
fn hover_shows_the_function_signature() {
    let fx = fixture("func add(a: Int, b: Int): Int { a + b }\n");
    let response = request(
        &fx,
        1,
        "textDocument/hover",
        json!({
            "textDocument": { "uri": fx.file_uri },
            "position": { "line": 0, "character": 5 },
        }),
    );
    let result = &response["result"];
    assert_eq!(result["contents"]["language"], json!("Cangjie"));
    assert_eq!(result["contents"]["value"], json!("func add(a: Int, b: Int): Int"));
    assert_eq!(result["range"]["start"], json!({"line": 0, "character": 5}));
    assert_eq!(result["range"]["end"], json!({"line": 0, "character": 8}));
}

#[test]
fn rename_edits_definition_and_call_site() {
    let fx = fixture("func add(a: Int, b: Int): Int { a + b }\nadd(1, 2)\n");
    let response = request(
        &fx,
        2,
        "textDocument/rename",
        json!({
            "textDocument": { "uri": fx.file_uri },
            "position": { "line": 0, "character": 6 },
            "newName": "sum",
        }),
    );
    let changes = response["result"]["documentChanges"]
        .as_array()
        .cloned()
        .unwrap_or_default();
    assert_eq!(changes.len(), 1, "one file changed: {response}");
    let edits = changes[0]["edits"].as_array().cloned().unwrap_or_default();
    assert_eq!(edits.len(), 2, "definition and call site: {response}");
    assert_eq!(edits[0]["range"]["start"], json!({"line": 0, "character": 5}));
    assert_eq!(edits[0]["range"]["end"], json!({"line": 0, "character": 8}));
    assert_eq!(edits[1]["range"]["start"], json!({"line": 1, "character": 0}));
    assert_eq!(edits[1]["newText"], json!("sum"));
}

#[test]
fn import_completion_offers_std_modules() {
    let fx = fixture("import std.\n");
    let response = request(
        &fx,
        3,
        "textDocument/completion",
        json!({
            "textDocument": { "uri": fx.file_uri },
            "position": { "line": 0, "character": 11 },
        }),
    );
    let items = response["result"].as_array().cloned().unwrap_or_default();
    let labels: Vec<&str> = items.iter().filter_map(|i| i["label"].as_str()).collect();
    assert!(labels.contains(&"collection"), "{labels:?}");
    assert!(labels.contains(&"io"), "{labels:?}");
    for item in &items {
        assert_eq!(item["kind"], json!(9), "import completion is module-kinded");
    }
}

#[test]
fn definition_jumps_to_the_declaration() {
    let fx = fixture("func add(a: Int, b: Int): Int { a + b }\nadd(1, 2)\n");
    let response = request(
        &fx,
        4,
        "textDocument/definition",
        json!({
            "textDocument": { "uri": fx.file_uri },
            "position": { "line": 1, "character": 1 },
        }),
    );
    let locations = response["result"].as_array().cloned().unwrap_or_default();
    assert_eq!(locations.len(), 1, "{response}");
    assert_eq!(locations[0]["range"]["start"]["line"], json!(0));
}

#[test]
fn references_cover_both_occurrences() {
    let fx = fixture("func add(a: Int, b: Int): Int { a + b }\nadd(1, 2)\n");
    let response = request(
        &fx,
        5,
        "textDocument/references",
        json!({
            "textDocument": { "uri": fx.file_uri },
            "position": { "line": 0, "character": 6 },
            "context": { "includeDeclaration": true },
        }),
    );
    let refs = response["result"].as_array().cloned().unwrap_or_default();
    assert_eq!(refs.len(), 2, "{response}");
}

#[test]
fn position_past_end_of_file_replies_null() {
    let fx = fixture("func f() { 1 }\n");
    let response = request(
        &fx,
        6,
        "textDocument/hover",
        json!({
            "textDocument": { "uri": fx.file_uri },
            "position": { "line": 99, "character": 42 },
        }),
    );
    assert_eq!(response["result"], Value::Null);
}

#[test]
fn document_link_is_always_an_empty_array() {
    let fx = fixture("import std.io\nfunc f() { 1 }\n");
    let response = request(
        &fx,
        7,
        "textDocument/documentLink",
        json!({ "textDocument": { "uri": fx.file_uri } }),
    );
    assert_eq!(response["result"], json!([]));
}

#[test]
fn semantic_tokens_present_after_semantic_build() {
    let fx = fixture("func f() { 1 }\n");
    let response = request(
        &fx,
        8,
        "textDocument/semanticTokens/full",
        json!({ "textDocument": { "uri": fx.file_uri } }),
    );
    let data = response["result"]["data"].as_array().cloned().unwrap_or_default();
    assert!(!data.is_empty(), "{response}");
    assert_eq!(data.len() % 5, 0, "relative encoding comes in 5-tuples");
}

#[test]
fn code_action_extract_variable_is_offered() {
    let fx = fixture("func f(){ var x = 1 + 2 * 3 }\n");
    let response = request(
        &fx,
        9,
        "textDocument/codeAction",
        json!({
            "textDocument": { "uri": fx.file_uri },
            "range": {
                "start": { "line": 0, "character": 22 },
                "end": { "line": 0, "character": 27 },
            },
        }),
    );
    let actions = response["result"].as_array().cloned().unwrap_or_default();
    let titles: Vec<&str> = actions.iter().filter_map(|a| a["title"].as_str()).collect();
    assert!(titles.contains(&"Extract to variable"), "{titles:?}");
}

#[test]
fn lsp_server_exit_code_honors_shutdown() {
    let out = SharedBuf::default();
    let mut server = LspServer::with_writer(must(Options::parse(["--test"])), Box::new(out));
    let shutdown: JsonRpcRequest = must(serde_json::from_value(json!({
        "jsonrpc": "2.0", "id": 1, "method": "shutdown"
    })));
    assert!(server.handle(shutdown).is_none());
    let exit: JsonRpcRequest = must(serde_json::from_value(json!({
        "jsonrpc": "2.0", "method": "exit"
    })));
    assert_eq!(server.handle(exit), Some(0));
}

#[test]
fn exit_without_shutdown_is_nonzero() {
    let out = SharedBuf::default();
    let mut server = LspServer::with_writer(must(Options::parse(["--test"])), Box::new(out));
    let exit: JsonRpcRequest = must(serde_json::from_value(json!({
        "jsonrpc": "2.0", "method": "exit"
    })));
    assert_eq!(server.handle(exit), Some(1));
}
