use crate::{
    domain::{
        Board, BoardDetails, BoardId, BoardMember, Column, ColumnId, InviteToken, MemberId,
        Subtask, SubtaskId, Task, TaskId, TaskPosition, TaskUpdate, UserId,
    },
    error::Result,
};
use async_trait::async_trait;

pub mod memory_storage;
pub mod table_storage;

#[cfg(feature = "file-storage")]
pub mod file_storage;

#[cfg(feature = "sqlite-storage")]
pub mod sqlite_storage;

pub use memory_storage::MemoryStorage;
pub use table_storage::{Snapshotter, TableStorage, Tables};

#[cfg(feature = "file-storage")]
pub use file_storage::FileStorage;

#[cfg(feature = "sqlite-storage")]
pub use sqlite_storage::SqliteStorage;

/// Board-level operations the reconciler needs from the store
#[async_trait]
pub trait BoardStore: Send + Sync {
    /// Loads a board with its columns and tasks, each ordered by `order_index`
    async fn read_board(&self, board_id: BoardId) -> Result<BoardDetails>;

    async fn rename_board(&self, board_id: BoardId, title: &str) -> Result<()>;

    /// Appends a column after the board's last column
    async fn create_column(&self, board_id: BoardId, title: &str) -> Result<Column>;

    async fn rename_column(&self, column_id: ColumnId, title: &str) -> Result<()>;

    /// Deletes a column together with its tasks and their subtasks
    async fn delete_column(&self, column_id: ColumnId) -> Result<()>;

    /// Appends a task after the column's last task
    async fn create_task(&self, column_id: ColumnId, title: &str) -> Result<Task>;

    /// Patches a task's editable fields and returns the stored row
    async fn update_task(&self, task_id: TaskId, update: &TaskUpdate) -> Result<Task>;

    /// Writes a task's column and position
    async fn update_task_position(&self, task_id: TaskId, position: TaskPosition) -> Result<()>;

    /// Deletes a task together with its subtasks
    async fn delete_task(&self, task_id: TaskId) -> Result<()>;
}

/// Task detail and checklist operations
#[async_trait]
pub trait SubtaskStore: Send + Sync {
    async fn load_task(&self, task_id: TaskId) -> Result<Task>;

    /// Lists a task's subtasks ordered by `order_index`
    async fn list_subtasks(&self, task_id: TaskId) -> Result<Vec<Subtask>>;

    /// Appends an incomplete subtask after the task's last one
    async fn create_subtask(&self, task_id: TaskId, title: &str) -> Result<Subtask>;

    async fn set_subtask_completed(&self, subtask_id: SubtaskId, completed: bool) -> Result<()>;

    async fn delete_subtask(&self, subtask_id: SubtaskId) -> Result<()>;
}

/// Full persistence backend for boards, tasks, subtasks and membership
#[async_trait]
pub trait Storage: BoardStore + SubtaskStore {
    /// Initializes the storage backend
    async fn initialize(&self) -> Result<()>;

    /// Checks if the backend has been initialized
    async fn is_initialized(&self) -> bool;

    /// Lists boards, newest first
    async fn list_boards(&self) -> Result<Vec<Board>>;

    /// Creates a board and records its owner as a member
    async fn create_board(&self, title: &str, owner_id: UserId) -> Result<Board>;

    /// Deletes a board and everything on it
    async fn delete_board(&self, board_id: BoardId) -> Result<()>;

    /// Searches a board's tasks by title or description (case-insensitive)
    async fn search_tasks(&self, board_id: BoardId, query: &str) -> Result<Vec<Task>>;

    /// Lists a board's members, oldest first
    async fn list_members(&self, board_id: BoardId) -> Result<Vec<BoardMember>>;

    /// Issues a token that lets another user join the board
    async fn create_invite(&self, board_id: BoardId) -> Result<InviteToken>;

    /// Redeems an invite token, returning the joined board
    async fn join_board(&self, token: &InviteToken, user_id: UserId) -> Result<BoardId>;

    async fn remove_member(&self, member_id: MemberId) -> Result<()>;
}
