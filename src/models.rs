//! Core board data model shared by the spec generator and task runner.
//!
//! These types mirror the document shape exposed by the board store (see
//! [`crate::board`]): a single JSON document holding columns, a backlog, and
//! a set of initiatives the orchestrator never interprets.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The full board document.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub columns: Vec<Column>,
    /// Opaque to the core; carried through untouched on every `saveBoard`.
    #[serde(default)]
    pub initiatives: Vec<serde_json::Value>,
    #[serde(default)]
    pub backlog: Vec<BacklogProject>,
}

impl Board {
    pub fn column_by_title(&self, title: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.title.eq_ignore_ascii_case(title))
    }

    pub fn column_by_title_mut(&mut self, title: &str) -> Option<&mut Column> {
        self.columns
            .iter_mut()
            .find(|c| c.title.eq_ignore_ascii_case(title))
    }

    pub fn column_by_id(&self, id: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == id)
    }

    pub fn column_by_id_mut(&mut self, id: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.id == id)
    }

    pub fn find_task(&self, task_id: &str) -> Option<(&Column, &Task)> {
        self.columns
            .iter()
            .find_map(|c| c.tasks.iter().find(|t| t.id == task_id).map(|t| (c, t)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub color: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub moved_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Task {
    pub fn new(title: impl Into<String>, description: impl Into<String>, color: i32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            description: description.into(),
            color,
            created_at: chrono::Utc::now(),
            moved_at: None,
        }
    }
}

/// Orchestration state embedded inside a task's `description`, after the
/// `---agent-meta---` sentinel. See [`crate::meta`] for the codec.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentMeta {
    pub agent: Option<String>,
    pub status: AgentMetaStatus,
    #[serde(default)]
    pub attempts: u32,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub result_path: Option<String>,
    pub last_error: Option<String>,
    pub result_summary: Option<String>,
}

impl Default for AgentMeta {
    fn default() -> Self {
        Self {
            agent: None,
            status: AgentMetaStatus::Queued,
            attempts: 0,
            started_at: None,
            result_path: None,
            last_error: None,
            result_summary: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AgentMetaStatus {
    Queued,
    Running,
    Review,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacklogProject {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub github_link: Option<String>,
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub spec_status: SpecStatus,
    #[serde(default)]
    pub spec: Option<String>,
    #[serde(default)]
    pub spec_tasks: Vec<SpecTask>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpecStatus {
    #[default]
    None,
    Generating,
    Ready,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecTask {
    pub title: String,
    pub details: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// A registered external CLI agent, as loaded by [`crate::registry`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDefinition {
    pub id: String,
    pub name: String,
    pub cmd: String,
    pub args: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(rename = "ramMB")]
    pub ram_mb: u64,
    #[serde(default)]
    pub default: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub note: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Partial update for a task, used by `PUT /api/tasks/:id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<i32>,
}

/// Partial update for a backlog project, used by `PUT /api/backlog/:id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacklogPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec_status: Option<SpecStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec_tasks: Option<Vec<SpecTask>>,
}

/// Extra per-task context attached at dispatch time (e.g. related task titles).
pub type TaskContext = HashMap<String, String>;
