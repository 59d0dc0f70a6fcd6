//! Workflow Columns Bootstrap: guarantees the three columns the runner
//! depends on (`Queue`, `Agent WIP`, `Review`) exist on the board, in that
//! order, immediately before whichever column is titled `Done` (if any).
//! Runs once at startup; the resolved ids are cached for the life of the
//! process so the runner and generator don't re-resolve titles every tick.

use crate::board::BoardStore;
use crate::constants::{COLUMN_AGENT_WIP, COLUMN_DONE, COLUMN_QUEUE, COLUMN_REVIEW};
use crate::models::Column;
use crate::Result;
use rand::Rng;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ResolvedColumns {
    pub queue: String,
    pub agent_wip: String,
    pub review: String,
}

/// Synthesizes a column id from the wall-clock time plus a random suffix,
/// avoiding a dependency on the board store's own id scheme.
pub fn synthesize_column_id() -> String {
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("col-{millis}-{suffix:06}")
}

/// Ensures the required columns exist, creating any that are missing and
/// persisting the result, then returns their resolved ids.
pub async fn bootstrap(store: &Arc<dyn BoardStore>) -> Result<ResolvedColumns> {
    let mut board = store.get_board().await?;
    let mut changed = false;

    for title in [COLUMN_QUEUE, COLUMN_AGENT_WIP, COLUMN_REVIEW] {
        if board.column_by_title(title).is_none() {
            let insert_at = board
                .columns
                .iter()
                .position(|c| c.title.eq_ignore_ascii_case(COLUMN_DONE))
                .unwrap_or(board.columns.len());
            board.columns.insert(
                insert_at,
                Column {
                    id: synthesize_column_id(),
                    title: title.to_string(),
                    tasks: Vec::new(),
                },
            );
            changed = true;
        }
    }

    if changed {
        store.save_board(&board).await?;
        tracing::info!("workflow columns bootstrapped");
    }

    Ok(ResolvedColumns {
        queue: board.column_by_title(COLUMN_QUEUE).unwrap().id.clone(),
        agent_wip: board.column_by_title(COLUMN_AGENT_WIP).unwrap().id.clone(),
        review: board.column_by_title(COLUMN_REVIEW).unwrap().id.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::InMemoryBoardStore;
    use crate::models::Board;

    #[tokio::test]
    async fn creates_all_three_columns_on_an_empty_board() {
        let store: Arc<dyn BoardStore> = Arc::new(InMemoryBoardStore::new());
        let resolved = bootstrap(&store).await.unwrap();

        let board = store.get_board().await.unwrap();
        assert_eq!(board.columns.len(), 3);
        assert_eq!(board.columns[0].title, COLUMN_QUEUE);
        assert_eq!(board.columns[1].title, COLUMN_AGENT_WIP);
        assert_eq!(board.columns[2].title, COLUMN_REVIEW);
        assert_eq!(board.columns[0].id, resolved.queue);
    }

    #[tokio::test]
    async fn inserts_before_an_existing_done_column() {
        let seeded = Board {
            columns: vec![Column {
                id: "done-1".into(),
                title: COLUMN_DONE.into(),
                tasks: vec![],
            }],
            initiatives: vec![],
            backlog: vec![],
        };
        let store: Arc<dyn BoardStore> = Arc::new(InMemoryBoardStore::seeded(seeded));
        bootstrap(&store).await.unwrap();

        let board = store.get_board().await.unwrap();
        let titles: Vec<_> = board.columns.iter().map(|c| c.title.clone()).collect();
        assert_eq!(
            titles,
            vec![COLUMN_QUEUE, COLUMN_AGENT_WIP, COLUMN_REVIEW, COLUMN_DONE]
        );
    }

    #[tokio::test]
    async fn is_idempotent_when_columns_already_exist() {
        let store: Arc<dyn BoardStore> = Arc::new(InMemoryBoardStore::new());
        let first = bootstrap(&store).await.unwrap();
        let second = bootstrap(&store).await.unwrap();

        assert_eq!(first.queue, second.queue);
        let board = store.get_board().await.unwrap();
        assert_eq!(board.columns.len(), 3);
    }

    #[test]
    fn synthesized_ids_are_unique() {
        let a = synthesize_column_id();
        let b = synthesize_column_id();
        assert_ne!(a, b);
    }
}
