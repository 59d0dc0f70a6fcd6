//! Task Runner Loop: polls the `Queue` column every 15 s, enforces the
//! concurrency cap and RAM-floor backpressure, dispatches the first queued
//! task to a routed agent, and advances the workflow state machine on
//! completion. Mirrors the teacher's monitoring loop shape but each tick
//! runs its single dispatch to completion before returning — concurrency
//! beyond the cap comes from raising `MAX_CONCURRENT_AGENTS`, not from
//! overlapping ticks.

use crate::archiver;
use crate::board::BoardStore;
use crate::columns::ResolvedColumns;
use crate::config::{Config, PathsConfig};
use crate::constants::{
    COLUMN_AGENT_WIP, COLUMN_QUEUE, COLUMN_REVIEW, MAX_TASK_ATTEMPTS, TASK_RUNNER_POLL_INTERVAL_SECS,
};
use crate::mem;
use crate::meta;
use crate::models::{AgentMeta, AgentMetaStatus, Board, Task, TaskPatch};
use crate::registry::AgentRegistry;
use crate::router;
use crate::supervisor;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::watch;

const RELATED_TASKS_LIMIT: usize = 5;

#[derive(Debug, Clone)]
pub struct ActiveAgent {
    pub agent: String,
    pub pid: u32,
    pub started_at: Instant,
}

pub struct TaskRunner {
    store: Arc<dyn BoardStore>,
    registry: Arc<AgentRegistry>,
    columns: RwLock<ResolvedColumns>,
    active: Mutex<HashMap<String, ActiveAgent>>,
    completed: AtomicU64,
    /// Per-agent failure counts, surfaced on the status endpoint for
    /// operator visibility. Not a circuit breaker — nothing reads this to
    /// gate dispatch.
    agent_failures: Mutex<HashMap<String, u64>>,
    max_concurrent_agents: usize,
    global_ram_floor_mb: u64,
    paths: PathsConfig,
    last_poll_error: Mutex<Option<String>>,
}

impl TaskRunner {
    pub fn new(
        store: Arc<dyn BoardStore>,
        registry: Arc<AgentRegistry>,
        columns: ResolvedColumns,
        config: &Config,
    ) -> Self {
        Self {
            store,
            registry,
            columns: RwLock::new(columns),
            active: Mutex::new(HashMap::new()),
            completed: AtomicU64::new(0),
            agent_failures: Mutex::new(HashMap::new()),
            max_concurrent_agents: config.runner.max_concurrent_agents,
            global_ram_floor_mb: config.runner.global_ram_floor_mb,
            paths: config.paths.clone(),
            last_poll_error: Mutex::new(None),
        }
    }

    pub fn active_snapshot(&self) -> HashMap<String, ActiveAgent> {
        self.active.lock().unwrap().clone()
    }

    pub fn completed_count(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn last_poll_error(&self) -> Option<String> {
        self.last_poll_error.lock().unwrap().clone()
    }

    pub fn cached_columns(&self) -> ResolvedColumns {
        self.columns.read().unwrap().clone()
    }

    pub fn max_concurrent_agents(&self) -> usize {
        self.max_concurrent_agents
    }

    pub fn global_ram_floor_mb(&self) -> u64 {
        self.global_ram_floor_mb
    }

    pub fn agent_failures_snapshot(&self) -> HashMap<String, u64> {
        self.agent_failures.lock().unwrap().clone()
    }

    /// Sends a graceful `SIGTERM` to every currently-active agent process,
    /// then a hard `SIGKILL` to any still alive after `grace`. Used on
    /// `SIGTERM`/`SIGINT` shutdown alongside the shutdown signal that stops
    /// the poll loop itself.
    pub async fn terminate_active(&self, grace: Duration) {
        let pids: Vec<u32> = self.active.lock().unwrap().values().map(|a| a.pid).collect();
        if pids.is_empty() {
            return;
        }
        for pid in &pids {
            tracing::info!(pid, "sending SIGTERM to active agent for shutdown");
            unsafe {
                libc::kill(*pid as i32, libc::SIGTERM);
            }
        }
        tokio::time::sleep(grace).await;
        for pid in &pids {
            if self.active.lock().unwrap().values().any(|a| a.pid == *pid) {
                tracing::warn!(pid, "agent still alive after grace period, sending SIGKILL");
                unsafe {
                    libc::kill(*pid as i32, libc::SIGKILL);
                }
            }
        }
    }

    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(Duration::from_secs(TASK_RUNNER_POLL_INTERVAL_SECS));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                }
                _ = shutdown.changed() => {
                    tracing::info!("task runner loop shutting down");
                    break;
                }
            }
        }
    }

    async fn tick(&self) {
        if self.active.lock().unwrap().len() >= self.max_concurrent_agents {
            return;
        }
        if let Some(available) = mem::available_mb() {
            if available < self.global_ram_floor_mb {
                tracing::warn!(available, floor = self.global_ram_floor_mb, "below global RAM floor, skipping tick");
                return;
            }
        }

        let board = match self.store.get_board().await {
            Ok(board) => board,
            Err(err) => {
                tracing::warn!(error = %err, "task runner: failed to fetch board");
                *self.last_poll_error.lock().unwrap() = Some(err.to_string());
                return;
            }
        };
        *self.last_poll_error.lock().unwrap() = None;
        self.refresh_columns(&board);

        let queue_id = self.columns.read().unwrap().queue.clone();
        let Some(queue) = board.column_by_id(&queue_id) else {
            return;
        };
        let Some(task) = queue.tasks.first().cloned() else {
            return;
        };
        if self.active.lock().unwrap().contains_key(&task.id) {
            return;
        }

        let mut meta = meta::parse(&task.description).unwrap_or_default();
        if meta.status == AgentMetaStatus::Running {
            tracing::warn!(task_id = %task.id, "stale running meta with no local supervisor, resetting to queued");
            meta.status = AgentMetaStatus::Queued;
            self.write_meta(&task, &meta).await;
        }

        self.dispatch(&board, task, meta).await;
    }

    /// Refreshes cached column ids by title, since titles (not ids) are
    /// authoritative; a column rename elsewhere on the board still needs a
    /// matching id here.
    fn refresh_columns(&self, board: &Board) {
        let mut columns = self.columns.write().unwrap();
        if let Some(c) = board.column_by_title(COLUMN_QUEUE) {
            columns.queue = c.id.clone();
        }
        if let Some(c) = board.column_by_title(COLUMN_AGENT_WIP) {
            columns.agent_wip = c.id.clone();
        }
        if let Some(c) = board.column_by_title(COLUMN_REVIEW) {
            columns.review = c.id.clone();
        }
    }

    async fn dispatch(&self, board: &Board, task: Task, mut meta: AgentMeta) {
        let registry = self.registry.current().await;
        let agent_id = router::route(&task, meta.agent.as_deref(), &registry);
        let Some(agent) = registry.get(&agent_id) else {
            tracing::error!(task_id = %task.id, agent_id, "routed agent is not in the registry, leaving task queued");
            return;
        };

        if let Some(available) = mem::available_mb() {
            if available < agent.ram_mb {
                tracing::warn!(task_id = %task.id, agent_id, available, floor = agent.ram_mb, "below agent RAM floor, deferring dispatch");
                return;
            }
        }

        let workspace_dir = PathBuf::from(&self.paths.workspaces_dir).join(&task.id);
        if let Err(err) = tokio::fs::create_dir_all(&workspace_dir).await {
            tracing::error!(task_id = %task.id, error = %err, "failed to create task workspace");
            return;
        }

        meta.attempts += 1;
        meta.agent = Some(agent_id.clone());
        meta.status = AgentMetaStatus::Running;
        meta.started_at = Some(chrono::Utc::now());
        self.write_meta(&task, &meta).await;

        let agent_wip = self.columns.read().unwrap().agent_wip.clone();
        if let Err(err) = self.store.move_task(&task.id, &agent_wip).await {
            tracing::warn!(task_id = %task.id, error = %err, "failed to move task to Agent WIP");
        }

        let prompt = build_prompt(&task, board);

        let task_id = task.id.clone();
        let active = &self.active;
        let agent_id_for_active = agent_id.clone();
        let task_id_for_active = task_id.clone();
        let result = supervisor::run(&agent, &prompt, &workspace_dir, move |pid| {
            active.lock().unwrap().insert(
                task_id_for_active.clone(),
                ActiveAgent {
                    agent: agent_id_for_active.clone(),
                    pid,
                    started_at: Instant::now(),
                },
            );
        })
        .await;
        self.active.lock().unwrap().remove(&task_id);

        let result = match result {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(task_id = %task.id, error = %err, "agent failed to spawn");
                self.handle_failure(&task, meta, format!("Spawn error: {err}")).await;
                return;
            }
        };

        let workspace_result = workspace_dir.join("RESULT.md");
        let workspace_result = if tokio::fs::metadata(&workspace_result).await.is_ok() {
            Some(workspace_result)
        } else {
            None
        };
        let archived = archiver::archive(&self.paths, &task.id, &result, workspace_result.as_deref()).await;

        let summary = match archived {
            Ok(archived) => Some(archived.summary),
            Err(err) => {
                tracing::warn!(task_id = %task.id, error = %err, "failed to archive result");
                None
            }
        };

        if result.success {
            meta.status = AgentMetaStatus::Review;
            meta.result_path = Some(format!("{}/{}", self.paths.results_dir, task.id));
            meta.last_error = None;
            meta.result_summary = summary;
            self.write_meta(&task, &meta).await;

            let review = self.columns.read().unwrap().review.clone();
            if let Err(err) = self.store.move_task(&task.id, &review).await {
                tracing::warn!(task_id = %task.id, error = %err, "failed to move task to Review");
            }
            self.completed.fetch_add(1, Ordering::Relaxed);
        } else {
            let error_text = if result.timed_out {
                "Timeout (10min)".to_string()
            } else {
                let stderr_excerpt: String = result.stderr.chars().take(200).collect();
                format!("Exit {}: {stderr_excerpt}", result.exit_code.map(|c| c.to_string()).unwrap_or_else(|| "?".to_string()))
            };
            meta.result_summary = summary;
            self.handle_failure(&task, meta, error_text).await;
        }
    }

    async fn handle_failure(&self, task: &Task, mut meta: AgentMeta, error_text: String) {
        meta.last_error = Some(error_text);
        if let Some(agent_id) = meta.agent.clone() {
            *self.agent_failures.lock().unwrap().entry(agent_id).or_insert(0) += 1;
        }

        if meta.attempts < MAX_TASK_ATTEMPTS {
            meta.status = AgentMetaStatus::Queued;
            self.write_meta(task, &meta).await;
            let queue = self.columns.read().unwrap().queue.clone();
            if let Err(err) = self.store.move_task(&task.id, &queue).await {
                tracing::warn!(task_id = %task.id, error = %err, "failed to move task back to Queue");
            }
        } else {
            meta.status = AgentMetaStatus::Failed;
            self.write_meta(task, &meta).await;
            let review = self.columns.read().unwrap().review.clone();
            if let Err(err) = self.store.move_task(&task.id, &review).await {
                tracing::warn!(task_id = %task.id, error = %err, "failed to move permanently-failed task to Review");
            }
        }
    }

    async fn write_meta(&self, task: &Task, meta: &AgentMeta) {
        let description = meta::embed(&task.description, meta);
        if let Err(err) = self
            .store
            .update_task(
                &task.id,
                TaskPatch {
                    description: Some(description),
                    ..Default::default()
                },
            )
            .await
        {
            tracing::warn!(task_id = %task.id, error = %err, "failed to write agent meta");
        }
    }
}

/// Title, stripped description, the fixed result-format constraint, and up
/// to [`RELATED_TASKS_LIMIT`] sibling tasks sharing the same non-zero color.
fn build_prompt(task: &Task, board: &Board) -> String {
    let description = meta::strip(&task.description);
    let related = related_tasks(task, board);

    let mut prompt = format!("# {}\n\n{description}\n", task.title);
    prompt.push_str(
        "\n## Anforderungen\n\
        Erstelle am Ende eine Datei `RESULT.md` im Arbeitsverzeichnis mit einer \
        Zusammenfassung deiner Änderungen, einer Liste der betroffenen Dateien, \
        relevanten Links, und gegebenenfalls einer Fehlerbeschreibung, falls die \
        Aufgabe nicht abgeschlossen werden konnte.\n",
    );

    if !related.is_empty() {
        prompt.push_str("\n## Verwandte Aufgaben\n");
        for title in related {
            prompt.push_str(&format!("- {title}\n"));
        }
    }

    prompt
}

fn related_tasks(task: &Task, board: &Board) -> Vec<String> {
    if task.color == 0 {
        return Vec::new();
    }
    board
        .columns
        .iter()
        .flat_map(|c| c.tasks.iter())
        .filter(|t| t.id != task.id && t.color == task.color)
        .take(RELATED_TASKS_LIMIT)
        .map(|t| t.title.clone())
        .collect()
}

/// Constructs the runner from process configuration and the bootstrapped
/// workflow columns.
pub fn build(
    config: &Config,
    store: Arc<dyn BoardStore>,
    registry: Arc<AgentRegistry>,
    columns: ResolvedColumns,
) -> Arc<TaskRunner> {
    Arc::new(TaskRunner::new(store, registry, columns, config))
}
