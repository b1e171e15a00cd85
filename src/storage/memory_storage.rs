use crate::{
    error::Result,
    storage::table_storage::{Snapshotter, TableStorage, Tables},
};
use async_trait::async_trait;

/// Keeps tables only in process memory
#[derive(Debug, Default)]
pub struct Volatile;

#[async_trait]
impl Snapshotter for Volatile {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn is_initialized(&self) -> bool {
        true
    }

    async fn load(&self) -> Result<Option<Tables>> {
        Ok(None)
    }

    async fn save(&self, _tables: &Tables) -> Result<()> {
        Ok(())
    }
}

/// In-memory storage backend, used by tests and embedders without persistence
pub type MemoryStorage = TableStorage<Volatile>;

impl TableStorage<Volatile> {
    pub fn new() -> Self {
        Self::with_snapshotter(Volatile)
    }
}

impl Default for TableStorage<Volatile> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Priority, TaskPosition, TaskUpdate, UserId};
    use crate::storage::{BoardStore, Storage, SubtaskStore};

    #[tokio::test]
    async fn test_round_trip_through_store() {
        let storage = MemoryStorage::new();
        storage.initialize().await.unwrap();
        assert!(storage.is_initialized().await);

        let board = storage.create_board("Roadmap", UserId::new()).await.unwrap();
        let todo = storage.create_column(board.id, "To Do").await.unwrap();
        let done = storage.create_column(board.id, "Done").await.unwrap();
        let task = storage.create_task(todo.id, "Write release notes").await.unwrap();

        storage
            .update_task_position(
                task.id,
                TaskPosition {
                    column_id: done.id,
                    order_index: 0,
                },
            )
            .await
            .unwrap();

        let details = storage.read_board(board.id).await.unwrap();
        assert!(details.column(todo.id).unwrap().tasks.is_empty());
        assert_eq!(details.column(done.id).unwrap().tasks[0].id, task.id);
    }

    #[tokio::test]
    async fn test_list_boards_newest_first() {
        let storage = MemoryStorage::new();
        let owner = UserId::new();
        storage.create_board("Older", owner).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        storage.create_board("Newer", owner).await.unwrap();

        let boards = storage.list_boards().await.unwrap();
        assert_eq!(boards[0].title, "Newer");
        assert_eq!(boards[1].title, "Older");
    }

    #[tokio::test]
    async fn test_update_task_fields() {
        let storage = MemoryStorage::new();
        let board = storage.create_board("B", UserId::new()).await.unwrap();
        let column = storage.create_column(board.id, "To Do").await.unwrap();
        let task = storage.create_task(column.id, "Draft").await.unwrap();

        let updated = storage
            .update_task(task.id, &TaskUpdate::default().priority(Priority::High))
            .await
            .unwrap();
        assert_eq!(updated.priority, Priority::High);

        let loaded = storage.load_task(task.id).await.unwrap();
        assert_eq!(loaded, updated);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_tables_untouched() {
        let storage = MemoryStorage::new();
        let board = storage.create_board("B", UserId::new()).await.unwrap();
        let column = storage.create_column(board.id, "To Do").await.unwrap();

        assert!(storage.rename_column(column.id, "  ").await.is_err());

        let details = storage.read_board(board.id).await.unwrap();
        assert_eq!(details.columns[0].column.title, "To Do");
    }

    #[tokio::test]
    async fn test_search_tasks_case_insensitive() {
        let storage = MemoryStorage::new();
        let board = storage.create_board("B", UserId::new()).await.unwrap();
        let column = storage.create_column(board.id, "To Do").await.unwrap();
        storage.create_task(column.id, "First Task").await.unwrap();
        let other = storage.create_task(column.id, "Other").await.unwrap();
        storage
            .update_task(
                other.id,
                &TaskUpdate::default().description(Some("mentions the FIRST one".to_string())),
            )
            .await
            .unwrap();

        let results = storage.search_tasks(board.id, "first").await.unwrap();
        assert_eq!(results.len(), 2);

        let results = storage.search_tasks(board.id, "nothing").await.unwrap();
        assert!(results.is_empty());
    }
}
