use super::BoardStore;
use crate::models::{BacklogPatch, BacklogProject, Board, Column, Task, TaskPatch};
use crate::{CoreError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;

/// Board Store Client backed by a single JSON file on disk, guarded by an
/// in-process lock. Intended for single-instance deployments that don't run
/// the remote CRUD service (Design Note 9).
pub struct LocalFileBoardStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl LocalFileBoardStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    async fn read_board(&self) -> Result<Board> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Board::default()),
            Err(e) => Err(CoreError::Io(e)),
        }
    }

    async fn write_board(&self, board: &Board) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(board)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, &bytes).await?;
        fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl BoardStore for LocalFileBoardStore {
    async fn get_board(&self) -> Result<Board> {
        let _guard = self.lock.lock().await;
        self.read_board().await
    }

    async fn save_board(&self, board: &Board) -> Result<()> {
        let _guard = self.lock.lock().await;
        let current = self.read_board().await?;
        let mut outgoing = board.clone();
        outgoing.backlog = current.backlog;
        self.write_board(&outgoing).await
    }

    async fn list_backlog(&self) -> Result<Vec<BacklogProject>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_board().await?.backlog)
    }

    async fn update_backlog(&self, id: &str, patch: BacklogPatch) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut board = self.read_board().await?;
        let project = board
            .backlog
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| CoreError::NotFound(format!("backlog project {id}")))?;
        if let Some(status) = patch.spec_status {
            project.spec_status = status;
        }
        if let Some(spec) = patch.spec {
            project.spec = Some(spec);
        }
        if let Some(tasks) = patch.spec_tasks {
            project.spec_tasks = tasks;
        }
        self.write_board(&board).await
    }

    async fn list_tasks(&self) -> Result<Vec<Task>> {
        let _guard = self.lock.lock().await;
        let board = self.read_board().await?;
        Ok(board.columns.into_iter().flat_map(|c| c.tasks).collect())
    }

    async fn create_task(&self, column_id: &str, task: Task) -> Result<Task> {
        let _guard = self.lock.lock().await;
        let mut board = self.read_board().await?;
        let column = board
            .column_by_id_mut(column_id)
            .ok_or_else(|| CoreError::NotFound(format!("column {column_id}")))?;
        column.tasks.push(task.clone());
        self.write_board(&board).await?;
        Ok(task)
    }

    async fn update_task(&self, id: &str, patch: TaskPatch) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut board = self.read_board().await?;
        let task = board
            .columns
            .iter_mut()
            .find_map(|c| c.tasks.iter_mut().find(|t| t.id == id))
            .ok_or_else(|| CoreError::NotFound(format!("task {id}")))?;
        if let Some(title) = patch.title {
            task.title = title;
        }
        if let Some(description) = patch.description {
            task.description = description;
        }
        if let Some(color) = patch.color {
            task.color = color;
        }
        self.write_board(&board).await
    }

    async fn move_task(&self, id: &str, target_column_id: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut board = self.read_board().await?;

        if board.column_by_id(target_column_id).is_none() {
            return Err(CoreError::NotFound(format!("column {target_column_id}")));
        }

        let mut removed = None;
        for column in board.columns.iter_mut() {
            if let Some(pos) = column.tasks.iter().position(|t| t.id == id) {
                removed = Some(column.tasks.remove(pos));
                break;
            }
        }
        let mut task = removed.ok_or_else(|| CoreError::NotFound(format!("task {id}")))?;
        task.moved_at = Some(chrono::Utc::now());

        board
            .column_by_id_mut(target_column_id)
            .expect("checked above")
            .tasks
            .push(task);

        self.write_board(&board).await
    }

    async fn delete_task(&self, id: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut board = self.read_board().await?;
        let mut found = false;
        for column in board.columns.iter_mut() {
            let before = column.tasks.len();
            column.tasks.retain(|t| t.id != id);
            if column.tasks.len() != before {
                found = true;
            }
        }
        if !found {
            return Err(CoreError::NotFound(format!("task {id}")));
        }
        self.write_board(&board).await
    }

    async fn list_columns(&self) -> Result<Vec<Column>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_board().await?.columns)
    }

    async fn create_column(&self, title: &str) -> Result<Column> {
        let _guard = self.lock.lock().await;
        let mut board = self.read_board().await?;
        let column = Column {
            id: crate::columns::synthesize_column_id(),
            title: title.to_string(),
            tasks: Vec::new(),
        };
        board.columns.push(column.clone());
        self.write_board(&board).await?;
        Ok(column)
    }
}
