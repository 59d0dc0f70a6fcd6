//! Result Archiver: persists what an agent run produced under
//! `results/<taskId>/` and distills a short summary for embedding back into
//! the task's agent-meta block.

use crate::config::PathsConfig;
use crate::constants::{RESULT_SUMMARY_MAX_CHARS, SYNTHESIZED_RESULT_TAIL_LINES};
use crate::supervisor::SupervisionResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

pub struct ArchivedResult {
    pub result_dir: PathBuf,
    pub summary: String,
}

#[derive(Serialize)]
struct RunMeta {
    outcome: &'static str,
    exit_code: Option<i32>,
    timed_out: bool,
    duration_ms: u64,
    completed_at: DateTime<Utc>,
}

/// Writes `agent.log`, `RESULT.md`, and `meta.json` for a finished run, and
/// returns a caller-ready summary truncated to embed in the task's meta.
///
/// `workspace_result` is an optional `RESULT.md` the agent itself wrote into
/// its workspace; when present it's copied verbatim, otherwise one is
/// synthesized from the tail of stdout.
pub async fn archive(
    paths: &PathsConfig,
    task_id: &str,
    result: &SupervisionResult,
    workspace_result: Option<&Path>,
) -> std::io::Result<ArchivedResult> {
    let result_dir = Path::new(&paths.results_dir).join(task_id);
    tokio::fs::create_dir_all(&result_dir).await?;

    let log = format!(
        "=== stdout ===\n{}\n=== stderr ===\n{}\n",
        result.stdout, result.stderr
    );
    tokio::fs::write(result_dir.join("agent.log"), log).await?;

    let result_md = match workspace_result {
        Some(path) if tokio::fs::metadata(path).await.is_ok() => {
            tokio::fs::read_to_string(path).await?
        }
        _ => synthesize_result_md(result),
    };
    tokio::fs::write(result_dir.join("RESULT.md"), &result_md).await?;

    let meta = RunMeta {
        outcome: if result.success { "success" } else { "failure" },
        exit_code: result.exit_code,
        timed_out: result.timed_out,
        duration_ms: result.duration_ms,
        completed_at: Utc::now(),
    };
    tokio::fs::write(result_dir.join("meta.json"), serde_json::to_vec_pretty(&meta)?).await?;

    let summary = truncate(&result_md, RESULT_SUMMARY_MAX_CHARS);
    Ok(ArchivedResult { result_dir, summary })
}

/// Falls back to the last `SYNTHESIZED_RESULT_TAIL_LINES` lines of stdout
/// when the agent didn't write its own `RESULT.md`.
fn synthesize_result_md(result: &SupervisionResult) -> String {
    let lines: Vec<&str> = result.stdout.lines().collect();
    let start = lines.len().saturating_sub(SYNTHESIZED_RESULT_TAIL_LINES);
    let tail = lines[start..].join("\n");
    let heading = if result.success {
        "# Result"
    } else {
        "# Result (failed)"
    };
    truncate(&format!("{heading}\n{tail}"), RESULT_SUMMARY_MAX_CHARS)
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(limit).collect();
        format!("{truncated}…")
    }
}
