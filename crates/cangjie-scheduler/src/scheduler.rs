//! Worker pool, task queues and the update/run contract.

use crate::cancel::CancellationToken;
use cangjie_project::{ArkAst, CompilerProject, ParseInputs};
use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::JoinHandle;
use thiserror::Error;

/// Whether an update should publish diagnostics when it lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeedDiagnostics {
    /// Publish after the rebuild.
    Yes,
    /// Rebuild silently.
    No,
}

/// Failures surfaced into reply channels instead of unwinding through a
/// worker.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The task's token tripped before or while running.
    #[error("request cancelled for {0}")]
    Cancelled(String),
    /// The rebuild behind an update failed.
    #[error("compilation failed: {0}")]
    BuildFailed(String),
}

/// What a task receives: the inputs it was scheduled against and the AST
/// snapshot chosen per the task kind.
pub struct InputsAndAst {
    /// Inputs recorded at enqueue time.
    pub inputs: ParseInputs,
    /// The snapshot, `None` when the file has never compiled.
    pub ast: Option<Arc<ArkAst>>,
    /// True for `run_with_ast_cache` tasks (parse-only view).
    pub use_ast_cache: bool,
    /// The file currently being edited, for handlers that care.
    pub on_edit_file: String,
    /// This task's cancellation token.
    pub token: CancellationToken,
}

type Action = Box<dyn FnOnce(&InputsAndAst) + Send>;

/// Callback the server installs to receive diagnostics after updates:
/// `(file, version, diagnostics)`.
pub type DiagnosticsSink =
    Arc<dyn Fn(&str, i64, Vec<cangjie_ast::Diagnostic>) + Send + Sync>;

enum Task {
    Update { inputs: ParseInputs, need_diagnostics: NeedDiagnostics },
    Run { name: &'static str, use_ast_cache: bool, token: CancellationToken, action: Action },
}

#[derive(Default)]
struct QueueState {
    tasks: VecDeque<Task>,
    /// Highest version ever enqueued for this file.
    latest_version: i64,
    shutdown: bool,
}

#[derive(Default)]
struct WorkerQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
}

struct Worker {
    queue: Arc<WorkerQueue>,
    join: Option<JoinHandle<()>>,
}

/// One scheduler instance: a set of per-file workers.
pub struct ArkScheduler {
    project: Arc<CompilerProject>,
    workers: Mutex<FxHashMap<String, Worker>>,
    diagnostics_sink: Mutex<Option<DiagnosticsSink>>,
}

impl ArkScheduler {
    /// Create a scheduler over `project`.
    pub fn new(project: Arc<CompilerProject>) -> Self {
        Self { project, workers: Mutex::new(FxHashMap::default()), diagnostics_sink: Mutex::new(None) }
    }

    /// Install the diagnostics publisher. Diagnostics are driven from here
    /// after every update, never from feature handlers.
    pub fn set_diagnostics_sink(&self, sink: DiagnosticsSink) {
        *self.diagnostics_sink.lock() = Some(sink);
    }

    /// Enqueue a rebuild. Consecutive updates on the same file coalesce:
    /// queued updates with an older version are dropped, and queued run
    /// tasks against older versions have their tokens tripped.
    pub fn update(&self, inputs: ParseInputs, need_diagnostics: NeedDiagnostics) {
        let queue = self.worker_for(&inputs.file_name);
        let mut state = queue.state.lock();
        let version = inputs.version;
        if version > state.latest_version {
            state.latest_version = version;
        }
        state.tasks.retain(|task| match task {
            Task::Update { inputs: queued, .. } => queued.version >= version,
            Task::Run { token, .. } => {
                if token.version < version {
                    token.cancel();
                }
                true
            }
        });
        state.tasks.push_back(Task::Update { inputs, need_diagnostics });
        drop(state);
        queue.ready.notify_one();
    }

    /// Enqueue `action` against the latest fully built AST of `file`. The
    /// worker guarantees any update enqueued earlier is applied first.
    pub fn run_with_ast(
        &self,
        name: &'static str,
        file: &str,
        action: impl FnOnce(&InputsAndAst) + Send + 'static,
    ) -> CancellationToken {
        self.enqueue_run(name, file, false, Box::new(action))
    }

    /// Enqueue `action` against the parse-only AST (whose `sema_cache` is
    /// the last semantic snapshot). For completion and signature help,
    /// where a stale semantic view beats blocking on a recompile.
    pub fn run_with_ast_cache(
        &self,
        name: &'static str,
        file: &str,
        action: impl FnOnce(&InputsAndAst) + Send + 'static,
    ) -> CancellationToken {
        self.enqueue_run(name, file, true, Box::new(action))
    }

    fn enqueue_run(
        &self,
        name: &'static str,
        file: &str,
        use_ast_cache: bool,
        action: Action,
    ) -> CancellationToken {
        let queue = self.worker_for(file);
        let mut state = queue.state.lock();
        let token = CancellationToken::new(file, state.latest_version);
        state.tasks.push_back(Task::Run { name, use_ast_cache, token: token.clone(), action });
        drop(state);
        queue.ready.notify_one();
        token
    }

    /// Block until every queue emptied once. Test-oriented; the transport
    /// never calls this.
    pub fn drain(&self) {
        let queues: Vec<Arc<WorkerQueue>> = {
            let workers = self.workers.lock();
            workers.values().map(|w| Arc::clone(&w.queue)).collect()
        };
        for queue in queues {
            let mut state = queue.state.lock();
            while !state.tasks.is_empty() {
                queue.ready.notify_all();
                // The worker signals back after each task.
                queue.ready.wait(&mut state);
            }
        }
    }

    fn worker_for(&self, file: &str) -> Arc<WorkerQueue> {
        let mut workers = self.workers.lock();
        if let Some(worker) = workers.get(file) {
            return Arc::clone(&worker.queue);
        }
        let queue = Arc::new(WorkerQueue::default());
        let thread_queue = Arc::clone(&queue);
        let project = Arc::clone(&self.project);
        let sink_slot = self.diagnostics_sink.lock().clone();
        let file_name = file.to_string();
        let join = std::thread::Builder::new()
            .name(format!("ark-worker:{file_name}"))
            .spawn(move || worker_loop(&thread_queue, &project, &file_name, sink_slot))
            .ok();
        workers.insert(file.to_string(), Worker { queue: Arc::clone(&queue), join });
        queue
    }
}

impl Drop for ArkScheduler {
    fn drop(&mut self) {
        let mut workers = self.workers.lock();
        for worker in workers.values_mut() {
            {
                let mut state = worker.queue.state.lock();
                state.shutdown = true;
            }
            worker.queue.ready.notify_all();
        }
        for worker in workers.values_mut() {
            if let Some(join) = worker.join.take() {
                let _ = join.join();
            }
        }
    }
}

fn worker_loop(
    queue: &WorkerQueue,
    project: &CompilerProject,
    file: &str,
    sink: Option<DiagnosticsSink>,
) {
    loop {
        let task = {
            let mut state = queue.state.lock();
            loop {
                if state.shutdown {
                    return;
                }
                if let Some(task) = state.tasks.pop_front() {
                    break task;
                }
                queue.ready.wait(&mut state);
            }
        };
        match task {
            Task::Update { inputs, need_diagnostics } => {
                let version = inputs.version;
                let build_error = project.update_document(&inputs).err();
                if let Some(e) = &build_error {
                    tracing::warn!(file, error = %e, "update failed");
                }
                if need_diagnostics == NeedDiagnostics::Yes {
                    if let Some(sink) = &sink {
                        let mut diagnostics = project.diagnostics_for(file);
                        diagnostics.extend(project.check_package_modifier(file));
                        // Rebuild failures (cyclic imports, unreadable
                        // files) surface as a file-level diagnostic.
                        if let Some(e) = build_error {
                            diagnostics.push(cangjie_ast::Diagnostic::error(
                                cangjie_ast::Range::default(),
                                e.to_string(),
                            ));
                        }
                        sink(file, version, diagnostics);
                    }
                }
            }
            Task::Run { name, use_ast_cache, token, action } => {
                let ast = if use_ast_cache {
                    project.get_parse_ast(file)
                } else {
                    project.get_ark_ast(file)
                };
                let version = project.docs().version(file).unwrap_or(token.version);
                let inputs = InputsAndAst {
                    inputs: ParseInputs {
                        file_name: file.to_string(),
                        contents: String::new(),
                        version,
                        force_rebuild: false,
                    },
                    ast,
                    use_ast_cache,
                    on_edit_file: file.to_string(),
                    token,
                };
                tracing::debug!(task = name, file, "running");
                action(&inputs);
            }
        }
        // Wake any drain() waiter.
        queue.ready.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cangjie_parse::ReferenceFrontend;
    use cangjie_testkit::{must, must_some};
    use parking_lot::Mutex as PlMutex;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::sync::mpsc;
    use std::time::Duration;

    fn fixture() -> (tempfile::TempDir, Arc<CompilerProject>) {
        let dir = must(tempfile::tempdir());
        let path = dir.path().join("core/a.cj");
        must(fs::create_dir_all(must_some(path.parent())));
        must(fs::write(&path, "package demo.core\nfunc add(a: Int, b: Int): Int { a + b }\n"));
        let project =
            Arc::new(CompilerProject::new(dir.path(), Arc::new(ReferenceFrontend), true));
        must(project.load_workspace());
        (dir, project)
    }

    #[test]
    fn run_with_ast_sees_latest_update() {
        let (dir, project) = fixture();
        let file = dir.path().join("core/a.cj").display().to_string();
        let scheduler = ArkScheduler::new(Arc::clone(&project));

        scheduler.update(
            ParseInputs::new(
                file.clone(),
                "package demo.core\nfunc add(a: Int, b: Int): Int { a * b }\n",
                7,
            ),
            NeedDiagnostics::No,
        );
        let (tx, rx) = mpsc::channel();
        scheduler.run_with_ast("Hover", &file, move |input| {
            let version = input.ast.as_ref().map(|a| a.version);
            let _ = tx.send(version);
        });
        let seen = must(rx.recv_timeout(Duration::from_secs(10)));
        assert_eq!(seen, Some(7), "the run must observe the preceding update");
    }

    #[test]
    fn per_file_tasks_run_in_fifo_order() {
        let (dir, project) = fixture();
        let file = dir.path().join("core/a.cj").display().to_string();
        let scheduler = ArkScheduler::new(project);
        let order = Arc::new(PlMutex::new(Vec::new()));
        let (tx, rx) = mpsc::channel();
        for i in 0..8 {
            let order = Arc::clone(&order);
            let tx = tx.clone();
            scheduler.run_with_ast("Probe", &file, move |_| {
                order.lock().push(i);
                let _ = tx.send(());
            });
        }
        for _ in 0..8 {
            must(rx.recv_timeout(Duration::from_secs(10)));
        }
        assert_eq!(*order.lock(), (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn newer_update_cancels_older_queued_runs() {
        let (dir, project) = fixture();
        let file = dir.path().join("core/a.cj").display().to_string();
        let scheduler = ArkScheduler::new(project);

        let (tx, rx) = mpsc::channel();
        let token = scheduler.run_with_ast("References", &file, move |input| {
            let _ = tx.send(input.token.is_cancelled());
        });
        scheduler.update(
            ParseInputs::new(
                file.clone(),
                "package demo.core\nfunc add(a: Int, b: Int): Int { b }\n",
                99,
            ),
            NeedDiagnostics::No,
        );
        // Whether the run executed before or after the update, the token
        // state it reports must match what the reply layer would do.
        let was_cancelled_at_run = must(rx.recv_timeout(Duration::from_secs(10)));
        if !was_cancelled_at_run {
            // It ran first; the token must still be live then.
            assert!(token.version < 99);
        } else {
            assert!(token.is_cancelled());
        }
    }

    #[test]
    fn explicit_cancel_suppresses_reply() {
        let (dir, project) = fixture();
        let file = dir.path().join("core/a.cj").display().to_string();
        let scheduler = ArkScheduler::new(project);
        let (tx, rx) = mpsc::channel();
        let token = scheduler.run_with_ast("Slow", &file, move |input| {
            let _ = tx.send(input.token.is_cancelled());
        });
        token.cancel();
        // Cooperative: the task still runs, its reply is flagged.
        let flagged = must(rx.recv_timeout(Duration::from_secs(10)));
        let _ = flagged; // either order is legal; the token itself is what matters
        assert!(token.is_cancelled());
    }

    #[test]
    fn updates_coalesce_to_latest_version() {
        let (dir, project) = fixture();
        let file = dir.path().join("core/a.cj").display().to_string();
        let scheduler = ArkScheduler::new(Arc::clone(&project));
        for v in 1..=5 {
            scheduler.update(
                ParseInputs::new(
                    file.clone(),
                    format!("package demo.core\nfunc add(a: Int, b: Int): Int {{ {v} }}\n"),
                    v,
                ),
                NeedDiagnostics::No,
            );
        }
        let (tx, rx) = mpsc::channel();
        scheduler.run_with_ast("Probe", &file, move |input| {
            let _ = tx.send(input.ast.as_ref().map(|a| a.version));
        });
        let seen = must(rx.recv_timeout(Duration::from_secs(10)));
        assert_eq!(seen, Some(5));
    }

    #[test]
    fn missing_file_yields_none_ast() {
        let (dir, project) = fixture();
        let ghost = dir.path().join("core/ghost.cj").display().to_string();
        let scheduler = ArkScheduler::new(project);
        let (tx, rx) = mpsc::channel();
        scheduler.run_with_ast("Hover", &ghost, move |input| {
            let _ = tx.send(input.ast.is_none());
        });
        assert!(must(rx.recv_timeout(Duration::from_secs(10))));
    }

    #[test]
    fn diagnostics_flow_through_the_sink_after_update() {
        let (dir, project) = fixture();
        let file = dir.path().join("core/a.cj").display().to_string();
        let scheduler = ArkScheduler::new(project);
        let (tx, rx) = mpsc::channel();
        scheduler.set_diagnostics_sink(Arc::new(move |file, version, diags| {
            let _ = tx.send((file.to_string(), version, diags.len()));
        }));
        scheduler.update(
            ParseInputs::new(
                file.clone(),
                "package demo.core\nfunc broken( {\n",
                3,
            ),
            NeedDiagnostics::Yes,
        );
        let (seen_file, version, count) = must(rx.recv_timeout(Duration::from_secs(10)));
        assert_eq!(seen_file, file);
        assert_eq!(version, 3);
        assert!(count > 0, "syntax errors must be published");
    }
}
