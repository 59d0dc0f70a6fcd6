//! Health & Control Surfaces: three endpoints on a local-only HTTP server.
//!
//! `GET /` reports coordinator status, `GET /api/agents` lists the current
//! registry, and `GET /export` writes a one-shot backup combining the board
//! snapshot, every archived result, and summary stats. None of these
//! endpoints accept a body or mutate board state.

use crate::board::BoardStore;
use crate::config::{ApiConfig, PathsConfig};
use crate::registry::AgentRegistry;
use crate::runner::TaskRunner;
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

const SERVICE_NAME: &str = "kanflow-core";

#[derive(Clone)]
pub struct ApiServer {
    config: ApiConfig,
    state: ApiState,
}

#[derive(Clone)]
struct ApiState {
    store: Arc<dyn BoardStore>,
    registry: Arc<AgentRegistry>,
    runner: Arc<TaskRunner>,
    paths: PathsConfig,
    started_at: Instant,
}

impl ApiServer {
    pub fn new(
        config: ApiConfig,
        store: Arc<dyn BoardStore>,
        registry: Arc<AgentRegistry>,
        runner: Arc<TaskRunner>,
        paths: PathsConfig,
    ) -> Self {
        Self {
            config,
            state: ApiState {
                store,
                registry,
                runner,
                paths,
                started_at: Instant::now(),
            },
        }
    }

    pub fn build_router(&self) -> Router {
        Router::new()
            .route("/", get(get_status))
            .route("/api/agents", get(get_agents))
            .route("/export", get(get_export))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    pub async fn run(&self) -> crate::Result<()> {
        let app = self.build_router();
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(crate::CoreError::Io)?;
        info!(%addr, "health and control server listening");
        axum::serve(listener, app).await.map_err(crate::CoreError::Io)?;
        Ok(())
    }
}

#[derive(Serialize)]
struct ActiveAgentView {
    agent: String,
    pid: u32,
    runtime_ms: u128,
}

#[derive(Serialize)]
struct ColumnIdsView {
    queue: String,
    agent_wip: String,
    review: String,
}

#[derive(Serialize)]
struct StatusResponse {
    service: &'static str,
    uptime_secs: u64,
    max_concurrent_agents: usize,
    active_agents: HashMap<String, ActiveAgentView>,
    completed_tasks: u64,
    agent_failures: HashMap<String, u64>,
    free_memory_mb: Option<u64>,
    global_ram_floor_mb: u64,
    cached_columns: ColumnIdsView,
    last_poll_error: Option<String>,
}

async fn get_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let active_agents = state
        .runner
        .active_snapshot()
        .into_iter()
        .map(|(task_id, active)| {
            (
                task_id,
                ActiveAgentView {
                    agent: active.agent,
                    pid: active.pid,
                    runtime_ms: active.started_at.elapsed().as_millis(),
                },
            )
        })
        .collect();

    let columns = state.runner.cached_columns();

    Json(StatusResponse {
        service: SERVICE_NAME,
        uptime_secs: state.started_at.elapsed().as_secs(),
        max_concurrent_agents: state.runner.max_concurrent_agents(),
        active_agents,
        completed_tasks: state.runner.completed_count(),
        agent_failures: state.runner.agent_failures_snapshot(),
        free_memory_mb: crate::mem::available_mb(),
        global_ram_floor_mb: state.runner.global_ram_floor_mb(),
        cached_columns: ColumnIdsView {
            queue: columns.queue,
            agent_wip: columns.agent_wip,
            review: columns.review,
        },
        last_poll_error: state.runner.last_poll_error(),
    })
}

#[derive(Serialize)]
struct AgentView {
    id: String,
    name: String,
    cmd: String,
    args: Vec<String>,
    keywords: Vec<String>,
    ram_mb: u64,
    default: bool,
    enabled: bool,
    note: Option<String>,
}

async fn get_agents(State(state): State<ApiState>) -> Json<Vec<AgentView>> {
    let snapshot = state.registry.current().await;
    let agents = snapshot
        .all_in_order()
        .map(|agent| AgentView {
            id: agent.id.clone(),
            name: agent.name.clone(),
            cmd: agent.cmd.clone(),
            args: agent.args.clone(),
            keywords: agent.keywords.clone(),
            ram_mb: agent.ram_mb,
            default: agent.default,
            enabled: agent.enabled,
            note: agent.note.clone(),
        })
        .collect();
    Json(agents)
}

#[derive(Serialize)]
pub struct ExportSummary {
    pub path: String,
    pub task_results: usize,
    pub backlog_projects: usize,
    pub columns: usize,
}

#[derive(Serialize)]
struct ArchivedTaskResult {
    task_id: String,
    meta: Option<serde_json::Value>,
    result_md: Option<String>,
}

#[derive(Serialize)]
struct Backup {
    generated_at: chrono::DateTime<Utc>,
    board: crate::models::Board,
    results: Vec<ArchivedTaskResult>,
    stats: BackupStats,
}

#[derive(Serialize)]
struct BackupStats {
    completed_tasks: u64,
    agent_failures: HashMap<String, u64>,
}

async fn get_export(
    State(state): State<ApiState>,
) -> std::result::Result<Json<ExportSummary>, (StatusCode, String)> {
    export_backup(
        &state.store,
        &state.paths,
        state.runner.completed_count(),
        state.runner.agent_failures_snapshot(),
    )
    .await
    .map(Json)
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// Builds and writes a backup file, independent of the HTTP layer, so the
/// `export` CLI subcommand can produce one without starting a server.
pub async fn export_backup(
    store: &Arc<dyn BoardStore>,
    paths: &PathsConfig,
    completed_tasks: u64,
    agent_failures: HashMap<String, u64>,
) -> crate::Result<ExportSummary> {
    let board = store.get_board().await?;
    let results = collect_archived_results(paths).await.map_err(crate::CoreError::Io)?;

    let backup = Backup {
        generated_at: Utc::now(),
        board,
        results,
        stats: BackupStats { completed_tasks, agent_failures },
    };

    write_backup(paths, backup).await.map_err(crate::CoreError::Io)
}

async fn collect_archived_results(paths: &PathsConfig) -> std::io::Result<Vec<ArchivedTaskResult>> {
    let mut out = Vec::new();
    let mut entries = match tokio::fs::read_dir(&paths.results_dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(out),
        Err(err) => return Err(err),
    };

    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        let task_id = entry.file_name().to_string_lossy().into_owned();
        let dir = entry.path();

        let meta = match tokio::fs::read(dir.join("meta.json")).await {
            Ok(bytes) => serde_json::from_slice(&bytes).ok(),
            Err(_) => None,
        };
        let result_md = tokio::fs::read_to_string(dir.join("RESULT.md")).await.ok();

        out.push(ArchivedTaskResult { task_id, meta, result_md });
    }

    Ok(out)
}

async fn write_backup(paths: &PathsConfig, backup: Backup) -> std::io::Result<ExportSummary> {
    tokio::fs::create_dir_all(&paths.exports_dir).await?;
    let filename = format!("backup-{}.json", backup.generated_at.to_rfc3339());
    let path = std::path::Path::new(&paths.exports_dir).join(filename);

    let task_results = backup.results.len();
    let backlog_projects = backup.board.backlog.len();
    let columns = backup.board.columns.len();

    let bytes = serde_json::to_vec_pretty(&backup)?;
    tokio::fs::write(&path, bytes).await?;

    Ok(ExportSummary {
        path: path.to_string_lossy().into_owned(),
        task_results,
        backlog_projects,
        columns,
    })
}
