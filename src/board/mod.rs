//! Board Store: typed CRUD access to the shared board document.
//!
//! The board is the sole piece of shared state; every other component
//! mutates it only through this trait. Three implementations exist because
//! which storage is authoritative for a given deployment is a runtime
//! decision, not a compile-time one (spec.md design note 9): a remote
//! key/value service fronted by HTTP, a single local JSON file, or an
//! in-process map for tests and the zero-config default.

mod http;
mod local_file;
mod memory;

pub use http::HttpBoardStore;
pub use local_file::LocalFileBoardStore;
pub use memory::InMemoryBoardStore;

use crate::models::{BacklogPatch, BacklogProject, Board, Column, Task, TaskPatch};
use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait BoardStore: Send + Sync {
    async fn get_board(&self) -> Result<Board>;

    /// Full replace. Implementations must preserve the server-owned
    /// `backlog` field regardless of what `board.backlog` contains — the
    /// caller only ever intends to replace `columns`.
    async fn save_board(&self, board: &Board) -> Result<()>;

    async fn list_backlog(&self) -> Result<Vec<BacklogProject>>;
    async fn update_backlog(&self, id: &str, patch: BacklogPatch) -> Result<()>;

    async fn list_tasks(&self) -> Result<Vec<Task>>;
    async fn create_task(&self, column_id: &str, task: Task) -> Result<Task>;
    async fn update_task(&self, id: &str, patch: TaskPatch) -> Result<()>;
    async fn move_task(&self, id: &str, target_column_id: &str) -> Result<()>;
    async fn delete_task(&self, id: &str) -> Result<()>;

    async fn list_columns(&self) -> Result<Vec<Column>>;
    async fn create_column(&self, title: &str) -> Result<Column>;
}

/// Build the configured store from `Config::board`.
pub fn from_config(config: &crate::config::BoardConfig) -> Result<std::sync::Arc<dyn BoardStore>> {
    use crate::config::BoardMode;
    use std::sync::Arc;

    match config.mode {
        BoardMode::Remote => {
            let base_url = config.base_url.clone().ok_or_else(|| {
                crate::CoreError::Config("BOARD_BASE_URL is required in remote mode".to_string())
            })?;
            Ok(Arc::new(HttpBoardStore::new(base_url, config.token.clone())?))
        }
        BoardMode::LocalFile => {
            let path = config
                .local_file_path
                .clone()
                .unwrap_or_else(|| "board.json".to_string());
            Ok(Arc::new(LocalFileBoardStore::new(path)))
        }
        BoardMode::Memory => Ok(Arc::new(InMemoryBoardStore::new())),
    }
}
