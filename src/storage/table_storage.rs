//! In-process relational tables shared by the memory and file backends.

use crate::{
    domain::{
        board::to_order_index, next_order_index, normalize_title, Board, BoardDetails, BoardId,
        BoardMember, Column, ColumnId, InviteToken, MemberId, MemberRole, Subtask, SubtaskId,
        Task, TaskId, TaskPosition, TaskUpdate, UserId,
    },
    error::{PlankoError, Result},
    storage::{BoardStore, Storage, SubtaskStore},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invite {
    pub token: InviteToken,
    pub board_id: BoardId,
    pub created_at: DateTime<Utc>,
}

/// Row storage for every entity kind.
///
/// Deletes cascade to children and compact the remaining siblings so that
/// `order_index` values stay dense.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tables {
    #[serde(default)]
    pub boards: Vec<Board>,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    #[serde(default)]
    pub members: Vec<BoardMember>,
    #[serde(default)]
    pub invites: Vec<Invite>,
}

impl Tables {
    fn board_mut(&mut self, id: BoardId) -> Result<&mut Board> {
        self.boards
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| PlankoError::BoardNotFound(id.to_string()))
    }

    fn column(&self, id: ColumnId) -> Result<&Column> {
        self.columns
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| PlankoError::ColumnNotFound(id.to_string()))
    }

    fn task_mut(&mut self, id: TaskId) -> Result<&mut Task> {
        self.tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| PlankoError::TaskNotFound(id.to_string()))
    }

    fn ensure_board(&self, id: BoardId) -> Result<()> {
        if self.boards.iter().any(|b| b.id == id) {
            Ok(())
        } else {
            Err(PlankoError::BoardNotFound(id.to_string()))
        }
    }

    pub fn read_board(&self, board_id: BoardId) -> Result<BoardDetails> {
        let board = self
            .boards
            .iter()
            .find(|b| b.id == board_id)
            .cloned()
            .ok_or_else(|| PlankoError::BoardNotFound(board_id.to_string()))?;

        let columns: Vec<Column> = self
            .columns
            .iter()
            .filter(|c| c.board_id == board_id)
            .cloned()
            .collect();
        let tasks = self
            .tasks
            .iter()
            .filter(|t| columns.iter().any(|c| c.id == t.column_id))
            .cloned()
            .collect();

        Ok(BoardDetails::assemble(board, columns, tasks))
    }

    pub fn list_boards(&self) -> Vec<Board> {
        let mut boards = self.boards.clone();
        boards.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        boards
    }

    pub fn create_board(&mut self, title: &str, owner_id: UserId) -> Result<Board> {
        let board = Board::new(normalize_title(title)?, owner_id);
        self.members
            .push(BoardMember::new(board.id, owner_id, MemberRole::Owner));
        self.boards.push(board.clone());
        Ok(board)
    }

    pub fn rename_board(&mut self, board_id: BoardId, title: &str) -> Result<()> {
        let title = normalize_title(title)?;
        self.board_mut(board_id)?.title = title;
        Ok(())
    }

    pub fn delete_board(&mut self, board_id: BoardId) -> Result<()> {
        self.ensure_board(board_id)?;

        let column_ids: Vec<ColumnId> = self
            .columns
            .iter()
            .filter(|c| c.board_id == board_id)
            .map(|c| c.id)
            .collect();
        for column_id in column_ids {
            self.remove_column_rows(column_id);
        }

        self.boards.retain(|b| b.id != board_id);
        self.members.retain(|m| m.board_id != board_id);
        self.invites.retain(|i| i.board_id != board_id);
        Ok(())
    }

    pub fn create_column(&mut self, board_id: BoardId, title: &str) -> Result<Column> {
        let title = normalize_title(title)?;
        self.ensure_board(board_id)?;

        let order_index = next_order_index(
            self.columns
                .iter()
                .filter(|c| c.board_id == board_id)
                .map(|c| c.order_index),
        );
        let column = Column::new(board_id, title, order_index);
        self.columns.push(column.clone());
        Ok(column)
    }

    pub fn rename_column(&mut self, column_id: ColumnId, title: &str) -> Result<()> {
        let title = normalize_title(title)?;
        let column = self
            .columns
            .iter_mut()
            .find(|c| c.id == column_id)
            .ok_or_else(|| PlankoError::ColumnNotFound(column_id.to_string()))?;
        column.title = title;
        Ok(())
    }

    pub fn delete_column(&mut self, column_id: ColumnId) -> Result<()> {
        let board_id = self.column(column_id)?.board_id;
        self.remove_column_rows(column_id);
        self.compact_columns(board_id);
        Ok(())
    }

    fn remove_column_rows(&mut self, column_id: ColumnId) {
        let task_ids: Vec<TaskId> = self
            .tasks
            .iter()
            .filter(|t| t.column_id == column_id)
            .map(|t| t.id)
            .collect();
        self.subtasks.retain(|s| !task_ids.contains(&s.task_id));
        self.tasks.retain(|t| t.column_id != column_id);
        self.columns.retain(|c| c.id != column_id);
    }

    pub fn create_task(&mut self, column_id: ColumnId, title: &str) -> Result<Task> {
        let title = normalize_title(title)?;
        self.column(column_id)?;

        let order_index = next_order_index(
            self.tasks
                .iter()
                .filter(|t| t.column_id == column_id)
                .map(|t| t.order_index),
        );
        let task = Task::new(column_id, title, order_index);
        self.tasks.push(task.clone());
        Ok(task)
    }

    pub fn load_task(&self, task_id: TaskId) -> Result<Task> {
        self.tasks
            .iter()
            .find(|t| t.id == task_id)
            .cloned()
            .ok_or_else(|| PlankoError::TaskNotFound(task_id.to_string()))
    }

    pub fn update_task(&mut self, task_id: TaskId, update: &TaskUpdate) -> Result<Task> {
        let task = self.task_mut(task_id)?;
        let mut patched = task.clone();
        patched.apply(update)?;
        *task = patched.clone();
        Ok(patched)
    }

    /// Moves a task within its board; columns of other boards are refused
    pub fn update_task_position(&mut self, task_id: TaskId, position: TaskPosition) -> Result<()> {
        let target_board = self.column(position.column_id)?.board_id;
        let current_column = self.load_task(task_id)?.column_id;
        let current_board = self.column(current_column)?.board_id;
        if target_board != current_board {
            return Err(PlankoError::ForeignColumn {
                column_id: position.column_id.to_string(),
                board_id: current_board.to_string(),
            });
        }

        self.task_mut(task_id)?.set_position(position);
        Ok(())
    }

    pub fn delete_task(&mut self, task_id: TaskId) -> Result<()> {
        let column_id = self.load_task(task_id)?.column_id;
        self.subtasks.retain(|s| s.task_id != task_id);
        self.tasks.retain(|t| t.id != task_id);
        self.compact_tasks(column_id);
        Ok(())
    }

    pub fn search_tasks(&self, board_id: BoardId, query: &str) -> Result<Vec<Task>> {
        let board = self.read_board(board_id)?;
        let query_lower = query.to_lowercase();

        Ok(board
            .tasks()
            .filter(|task| {
                let title_matches = task.title.to_lowercase().contains(&query_lower);
                let description_matches = task
                    .description
                    .as_ref()
                    .map(|d| d.to_lowercase().contains(&query_lower))
                    .unwrap_or(false);
                title_matches || description_matches
            })
            .cloned()
            .collect())
    }

    pub fn list_subtasks(&self, task_id: TaskId) -> Result<Vec<Subtask>> {
        self.load_task(task_id)?;
        let mut subtasks: Vec<Subtask> = self
            .subtasks
            .iter()
            .filter(|s| s.task_id == task_id)
            .cloned()
            .collect();
        subtasks.sort_by_key(|s| s.order_index);
        Ok(subtasks)
    }

    pub fn create_subtask(&mut self, task_id: TaskId, title: &str) -> Result<Subtask> {
        let title = normalize_title(title)?;
        self.load_task(task_id)?;

        let order_index = next_order_index(
            self.subtasks
                .iter()
                .filter(|s| s.task_id == task_id)
                .map(|s| s.order_index),
        );
        let subtask = Subtask::new(task_id, title, order_index);
        self.subtasks.push(subtask.clone());
        Ok(subtask)
    }

    pub fn set_subtask_completed(&mut self, subtask_id: SubtaskId, completed: bool) -> Result<()> {
        let subtask = self
            .subtasks
            .iter_mut()
            .find(|s| s.id == subtask_id)
            .ok_or_else(|| PlankoError::SubtaskNotFound(subtask_id.to_string()))?;
        subtask.is_completed = completed;
        Ok(())
    }

    pub fn delete_subtask(&mut self, subtask_id: SubtaskId) -> Result<()> {
        let task_id = self
            .subtasks
            .iter()
            .find(|s| s.id == subtask_id)
            .map(|s| s.task_id)
            .ok_or_else(|| PlankoError::SubtaskNotFound(subtask_id.to_string()))?;
        self.subtasks.retain(|s| s.id != subtask_id);
        self.compact_subtasks(task_id);
        Ok(())
    }

    pub fn list_members(&self, board_id: BoardId) -> Result<Vec<BoardMember>> {
        self.ensure_board(board_id)?;
        let mut members: Vec<BoardMember> = self
            .members
            .iter()
            .filter(|m| m.board_id == board_id)
            .cloned()
            .collect();
        members.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(members)
    }

    pub fn create_invite(&mut self, board_id: BoardId) -> Result<InviteToken> {
        self.ensure_board(board_id)?;
        let token = InviteToken::generate();
        self.invites.push(Invite {
            token: token.clone(),
            board_id,
            created_at: Utc::now(),
        });
        Ok(token)
    }

    pub fn join_board(&mut self, token: &InviteToken, user_id: UserId) -> Result<BoardId> {
        let board_id = self
            .invites
            .iter()
            .find(|i| &i.token == token)
            .map(|i| i.board_id)
            .ok_or(PlankoError::InvalidInvite)?;
        self.ensure_board(board_id)?;

        let already_member = self
            .members
            .iter()
            .any(|m| m.board_id == board_id && m.user_id == user_id);
        if !already_member {
            self.members
                .push(BoardMember::new(board_id, user_id, MemberRole::Member));
        }
        Ok(board_id)
    }

    pub fn remove_member(&mut self, member_id: MemberId) -> Result<()> {
        let before = self.members.len();
        self.members.retain(|m| m.id != member_id);
        if self.members.len() == before {
            return Err(PlankoError::MemberNotFound(member_id.to_string()));
        }
        Ok(())
    }

    fn compact_columns(&mut self, board_id: BoardId) {
        let mut siblings: Vec<&mut Column> = self
            .columns
            .iter_mut()
            .filter(|c| c.board_id == board_id)
            .collect();
        siblings.sort_by_key(|c| c.order_index);
        for (index, column) in siblings.into_iter().enumerate() {
            column.order_index = to_order_index(index);
        }
    }

    fn compact_tasks(&mut self, column_id: ColumnId) {
        let mut siblings: Vec<&mut Task> = self
            .tasks
            .iter_mut()
            .filter(|t| t.column_id == column_id)
            .collect();
        siblings.sort_by_key(|t| t.order_index);
        for (index, task) in siblings.into_iter().enumerate() {
            task.order_index = to_order_index(index);
        }
    }

    fn compact_subtasks(&mut self, task_id: TaskId) {
        let mut siblings: Vec<&mut Subtask> = self
            .subtasks
            .iter_mut()
            .filter(|s| s.task_id == task_id)
            .collect();
        siblings.sort_by_key(|s| s.order_index);
        for (index, subtask) in siblings.into_iter().enumerate() {
            subtask.order_index = to_order_index(index);
        }
    }
}

/// Where a [`TableStorage`] keeps its tables between operations
#[async_trait]
pub trait Snapshotter: Send + Sync {
    async fn initialize(&self) -> Result<()>;

    async fn is_initialized(&self) -> bool;

    /// Loads the last saved tables, or `None` if nothing was saved yet
    async fn load(&self) -> Result<Option<Tables>>;

    async fn save(&self, tables: &Tables) -> Result<()>;
}

/// Storage backend over [`Tables`], persisted through a [`Snapshotter`]
pub struct TableStorage<P> {
    snapshots: P,
    tables: Mutex<Option<Tables>>,
}

impl<P: Snapshotter> TableStorage<P> {
    pub fn with_snapshotter(snapshots: P) -> Self {
        Self {
            snapshots,
            tables: Mutex::new(None),
        }
    }

    pub fn snapshotter(&self) -> &P {
        &self.snapshots
    }

    async fn read<T>(&self, op: impl FnOnce(&Tables) -> Result<T>) -> Result<T> {
        let mut guard = self.tables.lock().await;
        if guard.is_none() {
            *guard = Some(self.snapshots.load().await?.unwrap_or_default());
        }
        match guard.as_ref() {
            Some(tables) => op(tables),
            None => Err(PlankoError::StorageError("tables not loaded".to_string())),
        }
    }

    /// Applies a mutation to a copy of the tables and commits it only after
    /// the snapshot was saved.
    async fn write<T>(&self, op: impl FnOnce(&mut Tables) -> Result<T>) -> Result<T> {
        let mut guard = self.tables.lock().await;
        let mut tables = match guard.as_ref() {
            Some(tables) => tables.clone(),
            None => self.snapshots.load().await?.unwrap_or_default(),
        };

        let value = op(&mut tables)?;
        self.snapshots.save(&tables).await?;
        *guard = Some(tables);
        Ok(value)
    }
}

#[async_trait]
impl<P: Snapshotter> BoardStore for TableStorage<P> {
    async fn read_board(&self, board_id: BoardId) -> Result<BoardDetails> {
        self.read(|t| t.read_board(board_id)).await
    }

    async fn rename_board(&self, board_id: BoardId, title: &str) -> Result<()> {
        self.write(|t| t.rename_board(board_id, title)).await
    }

    async fn create_column(&self, board_id: BoardId, title: &str) -> Result<Column> {
        self.write(|t| t.create_column(board_id, title)).await
    }

    async fn rename_column(&self, column_id: ColumnId, title: &str) -> Result<()> {
        self.write(|t| t.rename_column(column_id, title)).await
    }

    async fn delete_column(&self, column_id: ColumnId) -> Result<()> {
        self.write(|t| t.delete_column(column_id)).await
    }

    async fn create_task(&self, column_id: ColumnId, title: &str) -> Result<Task> {
        self.write(|t| t.create_task(column_id, title)).await
    }

    async fn update_task(&self, task_id: TaskId, update: &TaskUpdate) -> Result<Task> {
        self.write(|t| t.update_task(task_id, update)).await
    }

    async fn update_task_position(&self, task_id: TaskId, position: TaskPosition) -> Result<()> {
        self.write(|t| t.update_task_position(task_id, position))
            .await
    }

    async fn delete_task(&self, task_id: TaskId) -> Result<()> {
        self.write(|t| t.delete_task(task_id)).await
    }
}

#[async_trait]
impl<P: Snapshotter> SubtaskStore for TableStorage<P> {
    async fn load_task(&self, task_id: TaskId) -> Result<Task> {
        self.read(|t| t.load_task(task_id)).await
    }

    async fn list_subtasks(&self, task_id: TaskId) -> Result<Vec<Subtask>> {
        self.read(|t| t.list_subtasks(task_id)).await
    }

    async fn create_subtask(&self, task_id: TaskId, title: &str) -> Result<Subtask> {
        self.write(|t| t.create_subtask(task_id, title)).await
    }

    async fn set_subtask_completed(&self, subtask_id: SubtaskId, completed: bool) -> Result<()> {
        self.write(|t| t.set_subtask_completed(subtask_id, completed))
            .await
    }

    async fn delete_subtask(&self, subtask_id: SubtaskId) -> Result<()> {
        self.write(|t| t.delete_subtask(subtask_id)).await
    }
}

#[async_trait]
impl<P: Snapshotter> Storage for TableStorage<P> {
    async fn initialize(&self) -> Result<()> {
        self.snapshots.initialize().await?;
        let mut guard = self.tables.lock().await;
        *guard = Some(self.snapshots.load().await?.unwrap_or_default());
        Ok(())
    }

    async fn is_initialized(&self) -> bool {
        self.snapshots.is_initialized().await
    }

    async fn list_boards(&self) -> Result<Vec<Board>> {
        self.read(|t| Ok(t.list_boards())).await
    }

    async fn create_board(&self, title: &str, owner_id: UserId) -> Result<Board> {
        self.write(|t| t.create_board(title, owner_id)).await
    }

    async fn delete_board(&self, board_id: BoardId) -> Result<()> {
        self.write(|t| t.delete_board(board_id)).await
    }

    async fn search_tasks(&self, board_id: BoardId, query: &str) -> Result<Vec<Task>> {
        self.read(|t| t.search_tasks(board_id, query)).await
    }

    async fn list_members(&self, board_id: BoardId) -> Result<Vec<BoardMember>> {
        self.read(|t| t.list_members(board_id)).await
    }

    async fn create_invite(&self, board_id: BoardId) -> Result<InviteToken> {
        self.write(|t| t.create_invite(board_id)).await
    }

    async fn join_board(&self, token: &InviteToken, user_id: UserId) -> Result<BoardId> {
        self.write(|t| t.join_board(token, user_id)).await
    }

    async fn remove_member(&self, member_id: MemberId) -> Result<()> {
        self.write(|t| t.remove_member(member_id)).await
    }
}
