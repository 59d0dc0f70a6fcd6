use super::BoardStore;
use crate::models::{BacklogPatch, BacklogProject, Board, Column, Task, TaskPatch};
use crate::{CoreError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

/// In-process Board Store. Default when no store is configured, and the
/// workhorse for every other module's unit tests.
#[derive(Clone, Default)]
pub struct InMemoryBoardStore {
    board: Arc<Mutex<Board>>,
}

impl InMemoryBoardStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(board: Board) -> Self {
        Self {
            board: Arc::new(Mutex::new(board)),
        }
    }
}

#[async_trait]
impl BoardStore for InMemoryBoardStore {
    async fn get_board(&self) -> Result<Board> {
        Ok(self.board.lock().await.clone())
    }

    async fn save_board(&self, board: &Board) -> Result<()> {
        let mut guard = self.board.lock().await;
        let backlog = guard.backlog.clone();
        *guard = board.clone();
        guard.backlog = backlog;
        Ok(())
    }

    async fn list_backlog(&self) -> Result<Vec<BacklogProject>> {
        Ok(self.board.lock().await.backlog.clone())
    }

    async fn update_backlog(&self, id: &str, patch: BacklogPatch) -> Result<()> {
        let mut guard = self.board.lock().await;
        let project = guard
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
        Ok(())
    }

    async fn list_tasks(&self) -> Result<Vec<Task>> {
        Ok(self
            .board
            .lock()
            .await
            .columns
            .iter()
            .flat_map(|c| c.tasks.clone())
            .collect())
    }

    async fn create_task(&self, column_id: &str, task: Task) -> Result<Task> {
        let mut guard = self.board.lock().await;
        let column = guard
            .column_by_id_mut(column_id)
            .ok_or_else(|| CoreError::NotFound(format!("column {column_id}")))?;
        column.tasks.push(task.clone());
        Ok(task)
    }

    async fn update_task(&self, id: &str, patch: TaskPatch) -> Result<()> {
        let mut guard = self.board.lock().await;
        let task = guard
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
        Ok(())
    }

    async fn move_task(&self, id: &str, target_column_id: &str) -> Result<()> {
        let mut guard = self.board.lock().await;

        if guard.column_by_id(target_column_id).is_none() {
            return Err(CoreError::NotFound(format!("column {target_column_id}")));
        }

        let mut removed = None;
        for column in guard.columns.iter_mut() {
            if let Some(pos) = column.tasks.iter().position(|t| t.id == id) {
                removed = Some(column.tasks.remove(pos));
                break;
            }
        }
        let mut task = removed.ok_or_else(|| CoreError::NotFound(format!("task {id}")))?;
        task.moved_at = Some(chrono::Utc::now());

        guard
            .column_by_id_mut(target_column_id)
            .expect("checked above")
            .tasks
            .push(task);

        Ok(())
    }

    async fn delete_task(&self, id: &str) -> Result<()> {
        let mut guard = self.board.lock().await;
        let mut found = false;
        for column in guard.columns.iter_mut() {
            let before = column.tasks.len();
            column.tasks.retain(|t| t.id != id);
            if column.tasks.len() != before {
                found = true;
            }
        }
        if !found {
            return Err(CoreError::NotFound(format!("task {id}")));
        }
        Ok(())
    }

    async fn list_columns(&self) -> Result<Vec<Column>> {
        Ok(self.board.lock().await.columns.clone())
    }

    async fn create_column(&self, title: &str) -> Result<Column> {
        let mut guard = self.board.lock().await;
        let column = Column {
            id: crate::columns::synthesize_column_id(),
            title: title.to_string(),
            tasks: Vec::new(),
        };
        guard.columns.push(column.clone());
        Ok(column)
    }
}
