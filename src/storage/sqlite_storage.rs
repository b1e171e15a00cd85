use crate::{
    domain::{
        board::to_order_index, next_order_index, normalize_title, Board, BoardDetails, BoardId,
        BoardMember, Column, ColumnId, InviteToken, MemberId, MemberRole, Subtask, SubtaskId,
        Task, TaskFilter, TaskId, TaskPosition, TaskUpdate, UserId,
    },
    error::{PlankoError, Result},
    storage::{BoardStore, Storage, SubtaskStore},
};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, types::Type, Connection, OptionalExtension, Row, Transaction};
use std::{path::Path, str::FromStr, sync::Mutex};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS boards (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    owner_id TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS board_columns (
    id TEXT PRIMARY KEY,
    board_id TEXT NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    order_index INTEGER NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY,
    column_id TEXT NOT NULL REFERENCES board_columns(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    description TEXT,
    priority TEXT NOT NULL DEFAULT 'medium',
    due_date TEXT,
    assignee_id TEXT,
    order_index INTEGER NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS subtasks (
    id TEXT PRIMARY KEY,
    task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    is_completed INTEGER NOT NULL DEFAULT 0,
    order_index INTEGER NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS board_members (
    id TEXT PRIMARY KEY,
    board_id TEXT NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
    user_id TEXT NOT NULL,
    role TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (board_id, user_id)
);
CREATE TABLE IF NOT EXISTS board_invites (
    token TEXT PRIMARY KEY,
    board_id TEXT NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_columns_board ON board_columns (board_id, order_index);
CREATE INDEX IF NOT EXISTS idx_tasks_column ON tasks (column_id, order_index);
CREATE INDEX IF NOT EXISTS idx_subtasks_task ON subtasks (task_id, order_index);
";

const TASK_COLUMNS: &str =
    "t.id, t.column_id, t.title, t.description, t.priority, t.due_date, t.assignee_id, t.order_index, t.created_at";

/// SQLite-based storage backend.
///
/// Cascading deletes are enforced by foreign keys.
pub struct SqliteStorage {
    connection: Mutex<Connection>,
}

impl SqliteStorage {
    /// Opens (or creates) a database file
    pub fn open(database_path: impl AsRef<Path>) -> Result<Self> {
        Self::configure(Connection::open(database_path)?)
    }

    /// Opens a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::configure(Connection::open_in_memory()?)
    }

    fn configure(connection: Connection) -> Result<Self> {
        connection.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn with_conn<T>(&self, op: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut conn = self
            .connection
            .lock()
            .map_err(|_| PlankoError::StorageError("connection lock poisoned".to_string()))?;
        op(&mut conn)
    }
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn parse<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|e| conversion_error(idx, e))
}

fn parse_opt<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|r| r.parse::<T>().map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn board_from_row(row: &Row<'_>) -> rusqlite::Result<Board> {
    Ok(Board {
        id: parse(row, 0)?,
        title: row.get(1)?,
        owner_id: parse(row, 2)?,
        created_at: parse(row, 3)?,
    })
}

fn column_from_row(row: &Row<'_>) -> rusqlite::Result<Column> {
    Ok(Column {
        id: parse(row, 0)?,
        board_id: parse(row, 1)?,
        title: row.get(2)?,
        order_index: row.get(3)?,
        created_at: parse(row, 4)?,
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: parse(row, 0)?,
        column_id: parse(row, 1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        priority: parse(row, 4)?,
        due_date: parse_opt(row, 5)?,
        assignee_id: parse_opt(row, 6)?,
        order_index: row.get(7)?,
        created_at: parse(row, 8)?,
    })
}

fn subtask_from_row(row: &Row<'_>) -> rusqlite::Result<Subtask> {
    Ok(Subtask {
        id: parse(row, 0)?,
        task_id: parse(row, 1)?,
        title: row.get(2)?,
        is_completed: row.get(3)?,
        order_index: row.get(4)?,
        created_at: parse(row, 5)?,
    })
}

fn member_from_row(row: &Row<'_>) -> rusqlite::Result<BoardMember> {
    let role: String = row.get(3)?;
    let role = match role.as_str() {
        "owner" => MemberRole::Owner,
        "member" => MemberRole::Member,
        other => {
            return Err(conversion_error(
                3,
                PlankoError::StorageError(format!("unknown member role '{}'", other)),
            ))
        }
    };
    Ok(BoardMember {
        id: parse(row, 0)?,
        board_id: parse(row, 1)?,
        user_id: parse(row, 2)?,
        role,
        created_at: parse(row, 4)?,
    })
}

fn ensure_board(conn: &Connection, board_id: BoardId) -> Result<()> {
    let found = conn
        .query_row(
            "SELECT 1 FROM boards WHERE id = ?1",
            params![board_id.to_string()],
            |_| Ok(()),
        )
        .optional()?;
    found.ok_or_else(|| PlankoError::BoardNotFound(board_id.to_string()))
}

fn ensure_column(conn: &Connection, column_id: ColumnId) -> Result<BoardId> {
    let board_id = conn
        .query_row(
            "SELECT board_id FROM board_columns WHERE id = ?1",
            params![column_id.to_string()],
            |row| parse::<BoardId>(row, 0),
        )
        .optional()?;
    board_id.ok_or_else(|| PlankoError::ColumnNotFound(column_id.to_string()))
}

fn load_task(conn: &Connection, task_id: TaskId) -> Result<Task> {
    let task = conn
        .query_row(
            &format!("SELECT {} FROM tasks t WHERE t.id = ?1", TASK_COLUMNS),
            params![task_id.to_string()],
            task_from_row,
        )
        .optional()?;
    task.ok_or_else(|| PlankoError::TaskNotFound(task_id.to_string()))
}

fn max_order_index(conn: &Connection, sql: &str, parent: String) -> Result<Option<u32>> {
    Ok(conn.query_row(sql, params![parent], |row| row.get::<_, Option<u32>>(0))?)
}

/// Rewrites sibling positions to `0..n`, keeping their current order
fn renumber(tx: &Transaction<'_>, table: &str, parent_column: &str, parent: String) -> Result<()> {
    let ids: Vec<String> = {
        let mut stmt = tx.prepare(&format!(
            "SELECT id FROM {table} WHERE {parent_column} = ?1 ORDER BY order_index, created_at"
        ))?;
        let rows = stmt.query_map(params![parent], |row| row.get::<_, String>(0))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };

    let mut update = tx.prepare(&format!("UPDATE {table} SET order_index = ?1 WHERE id = ?2"))?;
    for (index, id) in ids.iter().enumerate() {
        update.execute(params![to_order_index(index), id])?;
    }
    Ok(())
}

fn read_board(conn: &Connection, board_id: BoardId) -> Result<BoardDetails> {
    let board = conn
        .query_row(
            "SELECT id, title, owner_id, created_at FROM boards WHERE id = ?1",
            params![board_id.to_string()],
            board_from_row,
        )
        .optional()?
        .ok_or_else(|| PlankoError::BoardNotFound(board_id.to_string()))?;

    let mut stmt = conn.prepare(
        "SELECT id, board_id, title, order_index, created_at FROM board_columns
         WHERE board_id = ?1 ORDER BY order_index, created_at",
    )?;
    let columns = stmt
        .query_map(params![board_id.to_string()], column_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM tasks t JOIN board_columns c ON c.id = t.column_id
         WHERE c.board_id = ?1 ORDER BY t.order_index, t.created_at",
        TASK_COLUMNS
    ))?;
    let tasks = stmt
        .query_map(params![board_id.to_string()], task_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(BoardDetails::assemble(board, columns, tasks))
}

#[async_trait]
impl BoardStore for SqliteStorage {
    async fn read_board(&self, board_id: BoardId) -> Result<BoardDetails> {
        self.with_conn(|conn| read_board(conn, board_id))
    }

    async fn rename_board(&self, board_id: BoardId, title: &str) -> Result<()> {
        let title = normalize_title(title)?;
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE boards SET title = ?1 WHERE id = ?2",
                params![title, board_id.to_string()],
            )?;
            if changed == 0 {
                return Err(PlankoError::BoardNotFound(board_id.to_string()));
            }
            Ok(())
        })
    }

    async fn create_column(&self, board_id: BoardId, title: &str) -> Result<Column> {
        let title = normalize_title(title)?;
        self.with_conn(|conn| {
            ensure_board(conn, board_id)?;
            let max = max_order_index(
                conn,
                "SELECT MAX(order_index) FROM board_columns WHERE board_id = ?1",
                board_id.to_string(),
            )?;
            let column = Column::new(board_id, title, next_order_index(max.into_iter()));
            conn.execute(
                "INSERT INTO board_columns (id, board_id, title, order_index, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    column.id.to_string(),
                    board_id.to_string(),
                    column.title,
                    column.order_index,
                    timestamp(&column.created_at),
                ],
            )?;
            Ok(column)
        })
    }

    async fn rename_column(&self, column_id: ColumnId, title: &str) -> Result<()> {
        let title = normalize_title(title)?;
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE board_columns SET title = ?1 WHERE id = ?2",
                params![title, column_id.to_string()],
            )?;
            if changed == 0 {
                return Err(PlankoError::ColumnNotFound(column_id.to_string()));
            }
            Ok(())
        })
    }

    async fn delete_column(&self, column_id: ColumnId) -> Result<()> {
        self.with_conn(|conn| {
            let board_id = ensure_column(conn, column_id)?;
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM board_columns WHERE id = ?1",
                params![column_id.to_string()],
            )?;
            renumber(&tx, "board_columns", "board_id", board_id.to_string())?;
            tx.commit()?;
            Ok(())
        })
    }

    async fn create_task(&self, column_id: ColumnId, title: &str) -> Result<Task> {
        let title = normalize_title(title)?;
        self.with_conn(|conn| {
            ensure_column(conn, column_id)?;
            let max = max_order_index(
                conn,
                "SELECT MAX(order_index) FROM tasks WHERE column_id = ?1",
                column_id.to_string(),
            )?;
            let task = Task::new(column_id, title, next_order_index(max.into_iter()));
            conn.execute(
                "INSERT INTO tasks (id, column_id, title, priority, order_index, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    task.id.to_string(),
                    column_id.to_string(),
                    task.title,
                    task.priority.as_str(),
                    task.order_index,
                    timestamp(&task.created_at),
                ],
            )?;
            Ok(task)
        })
    }

    async fn update_task(&self, task_id: TaskId, update: &TaskUpdate) -> Result<Task> {
        self.with_conn(|conn| {
            let mut task = load_task(conn, task_id)?;
            task.apply(update)?;
            conn.execute(
                "UPDATE tasks SET title = ?1, description = ?2, priority = ?3, due_date = ?4,
                 assignee_id = ?5 WHERE id = ?6",
                params![
                    task.title,
                    task.description,
                    task.priority.as_str(),
                    task.due_date.as_ref().map(timestamp),
                    task.assignee_id.map(|id| id.to_string()),
                    task_id.to_string(),
                ],
            )?;
            Ok(task)
        })
    }

    async fn update_task_position(&self, task_id: TaskId, position: TaskPosition) -> Result<()> {
        self.with_conn(|conn| {
            let target_board = ensure_column(conn, position.column_id)?;
            let current_board = ensure_column(conn, load_task(conn, task_id)?.column_id)?;
            if target_board != current_board {
                return Err(PlankoError::ForeignColumn {
                    column_id: position.column_id.to_string(),
                    board_id: current_board.to_string(),
                });
            }

            let changed = conn.execute(
                "UPDATE tasks SET column_id = ?1, order_index = ?2 WHERE id = ?3",
                params![
                    position.column_id.to_string(),
                    position.order_index,
                    task_id.to_string(),
                ],
            )?;
            if changed == 0 {
                return Err(PlankoError::TaskNotFound(task_id.to_string()));
            }
            Ok(())
        })
    }

    async fn delete_task(&self, task_id: TaskId) -> Result<()> {
        self.with_conn(|conn| {
            let column_id = load_task(conn, task_id)?.column_id;
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM tasks WHERE id = ?1", params![task_id.to_string()])?;
            renumber(&tx, "tasks", "column_id", column_id.to_string())?;
            tx.commit()?;
            Ok(())
        })
    }
}

#[async_trait]
impl SubtaskStore for SqliteStorage {
    async fn load_task(&self, task_id: TaskId) -> Result<Task> {
        self.with_conn(|conn| load_task(conn, task_id))
    }

    async fn list_subtasks(&self, task_id: TaskId) -> Result<Vec<Subtask>> {
        self.with_conn(|conn| {
            load_task(conn, task_id)?;
            let mut stmt = conn.prepare(
                "SELECT id, task_id, title, is_completed, order_index, created_at FROM subtasks
                 WHERE task_id = ?1 ORDER BY order_index, created_at",
            )?;
            let subtasks = stmt
                .query_map(params![task_id.to_string()], subtask_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(subtasks)
        })
    }

    async fn create_subtask(&self, task_id: TaskId, title: &str) -> Result<Subtask> {
        let title = normalize_title(title)?;
        self.with_conn(|conn| {
            load_task(conn, task_id)?;
            let max = max_order_index(
                conn,
                "SELECT MAX(order_index) FROM subtasks WHERE task_id = ?1",
                task_id.to_string(),
            )?;
            let subtask = Subtask::new(task_id, title, next_order_index(max.into_iter()));
            conn.execute(
                "INSERT INTO subtasks (id, task_id, title, is_completed, order_index, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    subtask.id.to_string(),
                    task_id.to_string(),
                    subtask.title,
                    subtask.is_completed,
                    subtask.order_index,
                    timestamp(&subtask.created_at),
                ],
            )?;
            Ok(subtask)
        })
    }

    async fn set_subtask_completed(&self, subtask_id: SubtaskId, completed: bool) -> Result<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE subtasks SET is_completed = ?1 WHERE id = ?2",
                params![completed, subtask_id.to_string()],
            )?;
            if changed == 0 {
                return Err(PlankoError::SubtaskNotFound(subtask_id.to_string()));
            }
            Ok(())
        })
    }

    async fn delete_subtask(&self, subtask_id: SubtaskId) -> Result<()> {
        self.with_conn(|conn| {
            let task_id = conn
                .query_row(
                    "SELECT task_id FROM subtasks WHERE id = ?1",
                    params![subtask_id.to_string()],
                    |row| parse::<TaskId>(row, 0),
                )
                .optional()?
                .ok_or_else(|| PlankoError::SubtaskNotFound(subtask_id.to_string()))?;

            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM subtasks WHERE id = ?1",
                params![subtask_id.to_string()],
            )?;
            renumber(&tx, "subtasks", "task_id", task_id.to_string())?;
            tx.commit()?;
            Ok(())
        })
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn initialize(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
    }

    async fn is_initialized(&self) -> bool {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'boards'",
                [],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .unwrap_or(false)
    }

    async fn list_boards(&self) -> Result<Vec<Board>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, owner_id, created_at FROM boards ORDER BY created_at DESC",
            )?;
            let boards = stmt
                .query_map([], board_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(boards)
        })
    }

    async fn create_board(&self, title: &str, owner_id: UserId) -> Result<Board> {
        let title = normalize_title(title)?;
        self.with_conn(|conn| {
            let board = Board::new(title, owner_id);
            let owner = BoardMember::new(board.id, owner_id, MemberRole::Owner);

            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO boards (id, title, owner_id, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    board.id.to_string(),
                    board.title,
                    owner_id.to_string(),
                    timestamp(&board.created_at),
                ],
            )?;
            tx.execute(
                "INSERT INTO board_members (id, board_id, user_id, role, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    owner.id.to_string(),
                    board.id.to_string(),
                    owner_id.to_string(),
                    owner.role.to_string(),
                    timestamp(&owner.created_at),
                ],
            )?;
            tx.commit()?;
            Ok(board)
        })
    }

    async fn delete_board(&self, board_id: BoardId) -> Result<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM boards WHERE id = ?1",
                params![board_id.to_string()],
            )?;
            if changed == 0 {
                return Err(PlankoError::BoardNotFound(board_id.to_string()));
            }
            Ok(())
        })
    }

    async fn search_tasks(&self, board_id: BoardId, query: &str) -> Result<Vec<Task>> {
        let board = self.with_conn(|conn| read_board(conn, board_id))?;
        let filter = TaskFilter::default().with_text(query);
        Ok(board.tasks().filter(|t| filter.matches(t)).cloned().collect())
    }

    async fn list_members(&self, board_id: BoardId) -> Result<Vec<BoardMember>> {
        self.with_conn(|conn| {
            ensure_board(conn, board_id)?;
            let mut stmt = conn.prepare(
                "SELECT id, board_id, user_id, role, created_at FROM board_members
                 WHERE board_id = ?1 ORDER BY created_at",
            )?;
            let members = stmt
                .query_map(params![board_id.to_string()], member_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(members)
        })
    }

    async fn create_invite(&self, board_id: BoardId) -> Result<InviteToken> {
        self.with_conn(|conn| {
            ensure_board(conn, board_id)?;
            let token = InviteToken::generate();
            conn.execute(
                "INSERT INTO board_invites (token, board_id, created_at) VALUES (?1, ?2, ?3)",
                params![
                    token.as_str(),
                    board_id.to_string(),
                    timestamp(&Utc::now()),
                ],
            )?;
            Ok(token)
        })
    }

    async fn join_board(&self, token: &InviteToken, user_id: UserId) -> Result<BoardId> {
        self.with_conn(|conn| {
            let board_id = conn
                .query_row(
                    "SELECT board_id FROM board_invites WHERE token = ?1",
                    params![token.as_str()],
                    |row| parse::<BoardId>(row, 0),
                )
                .optional()?
                .ok_or(PlankoError::InvalidInvite)?;

            let member = BoardMember::new(board_id, user_id, MemberRole::Member);
            conn.execute(
                "INSERT OR IGNORE INTO board_members (id, board_id, user_id, role, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    member.id.to_string(),
                    board_id.to_string(),
                    user_id.to_string(),
                    member.role.to_string(),
                    timestamp(&member.created_at),
                ],
            )?;
            Ok(board_id)
        })
    }

    async fn remove_member(&self, member_id: MemberId) -> Result<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM board_members WHERE id = ?1",
                params![member_id.to_string()],
            )?;
            if changed == 0 {
                return Err(PlankoError::MemberNotFound(member_id.to_string()));
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn storage() -> SqliteStorage {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage.initialize().await.unwrap();
        storage
    }

    #[tokio::test]
    async fn test_initialization() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        assert!(!storage.is_initialized().await);

        storage.initialize().await.unwrap();
        storage.initialize().await.unwrap();

        assert!(storage.is_initialized().await);
    }

    #[tokio::test]
    async fn test_board_round_trip() {
        let storage = storage().await;
        let board = storage.create_board("Roadmap", UserId::new()).await.unwrap();
        let todo = storage.create_column(board.id, "To Do").await.unwrap();
        let done = storage.create_column(board.id, "Done").await.unwrap();
        let a = storage.create_task(todo.id, "A").await.unwrap();
        let b = storage.create_task(todo.id, "B").await.unwrap();

        assert_eq!(done.order_index, 1);
        assert_eq!(b.order_index, 1);

        storage
            .update_task_position(
                a.id,
                TaskPosition {
                    column_id: done.id,
                    order_index: 0,
                },
            )
            .await
            .unwrap();

        let details = storage.read_board(board.id).await.unwrap();
        assert_eq!(details.columns.len(), 2);
        assert_eq!(details.column(todo.id).unwrap().tasks[0].id, b.id);
        assert_eq!(details.column(done.id).unwrap().tasks[0].id, a.id);
    }

    #[tokio::test]
    async fn test_position_update_rejects_other_board() {
        let storage = storage().await;
        let board = storage.create_board("Roadmap", UserId::new()).await.unwrap();
        let other = storage.create_board("Hiring", UserId::new()).await.unwrap();
        let todo = storage.create_column(board.id, "To Do").await.unwrap();
        let inbox = storage.create_column(other.id, "Inbox").await.unwrap();
        let task = storage.create_task(todo.id, "A").await.unwrap();

        let result = storage
            .update_task_position(
                task.id,
                TaskPosition {
                    column_id: inbox.id,
                    order_index: 0,
                },
            )
            .await;

        assert!(matches!(result, Err(PlankoError::ForeignColumn { .. })));
        let details = storage.read_board(board.id).await.unwrap();
        assert_eq!(details.column(todo.id).unwrap().tasks[0].id, task.id);
    }

    #[tokio::test]
    async fn test_update_task_fields() {
        let storage = storage().await;
        let board = storage.create_board("B", UserId::new()).await.unwrap();
        let column = storage.create_column(board.id, "To Do").await.unwrap();
        let task = storage.create_task(column.id, "Draft").await.unwrap();
        let assignee = UserId::new();

        storage
            .update_task(
                task.id,
                &TaskUpdate::default()
                    .priority(crate::domain::Priority::High)
                    .description(Some("notes".to_string()))
                    .assignee(Some(assignee))
                    .due_date(Some(Utc::now())),
            )
            .await
            .unwrap();

        let loaded = storage.load_task(task.id).await.unwrap();
        assert_eq!(loaded.priority, crate::domain::Priority::High);
        assert_eq!(loaded.description.as_deref(), Some("notes"));
        assert_eq!(loaded.assignee_id, Some(assignee));
        assert!(loaded.due_date.is_some());
    }

    #[tokio::test]
    async fn test_delete_column_cascades() {
        let storage = storage().await;
        let board = storage.create_board("B", UserId::new()).await.unwrap();
        let first = storage.create_column(board.id, "First").await.unwrap();
        let second = storage.create_column(board.id, "Second").await.unwrap();
        let task = storage.create_task(first.id, "A").await.unwrap();
        storage.create_subtask(task.id, "step").await.unwrap();

        storage.delete_column(first.id).await.unwrap();

        assert!(matches!(
            storage.load_task(task.id).await,
            Err(PlankoError::TaskNotFound(_))
        ));
        let details = storage.read_board(board.id).await.unwrap();
        assert_eq!(details.columns.len(), 1);
        assert_eq!(details.columns[0].id(), second.id);
        assert_eq!(details.columns[0].column.order_index, 0);

        let orphans: i64 = storage
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM subtasks", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[tokio::test]
    async fn test_delete_task_compacts() {
        let storage = storage().await;
        let board = storage.create_board("B", UserId::new()).await.unwrap();
        let column = storage.create_column(board.id, "To Do").await.unwrap();
        let a = storage.create_task(column.id, "A").await.unwrap();
        storage.create_task(column.id, "B").await.unwrap();

        storage.delete_task(a.id).await.unwrap();

        let details = storage.read_board(board.id).await.unwrap();
        assert!(details.columns[0].is_dense());
    }

    #[tokio::test]
    async fn test_subtasks() {
        let storage = storage().await;
        let board = storage.create_board("B", UserId::new()).await.unwrap();
        let column = storage.create_column(board.id, "To Do").await.unwrap();
        let task = storage.create_task(column.id, "A").await.unwrap();

        let first = storage.create_subtask(task.id, "one").await.unwrap();
        storage.create_subtask(task.id, "two").await.unwrap();
        storage.set_subtask_completed(first.id, true).await.unwrap();

        let subtasks = storage.list_subtasks(task.id).await.unwrap();
        assert_eq!(subtasks.len(), 2);
        assert!(subtasks[0].is_completed);

        storage.delete_subtask(first.id).await.unwrap();
        let subtasks = storage.list_subtasks(task.id).await.unwrap();
        assert_eq!(subtasks[0].title, "two");
        assert_eq!(subtasks[0].order_index, 0);
    }

    #[tokio::test]
    async fn test_membership() {
        let storage = storage().await;
        let owner = UserId::new();
        let guest = UserId::new();
        let board = storage.create_board("Shared", owner).await.unwrap();

        let token = storage.create_invite(board.id).await.unwrap();
        assert_eq!(storage.join_board(&token, guest).await.unwrap(), board.id);
        assert_eq!(storage.join_board(&token, guest).await.unwrap(), board.id);

        let members = storage.list_members(board.id).await.unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].role, MemberRole::Owner);

        storage.remove_member(members[1].id).await.unwrap();
        assert_eq!(storage.list_members(board.id).await.unwrap().len(), 1);

        let bogus = InviteToken::from("missing".to_string());
        assert!(matches!(
            storage.join_board(&bogus, guest).await,
            Err(PlankoError::InvalidInvite)
        ));
    }

    #[tokio::test]
    async fn test_delete_board_cascades() {
        let storage = storage().await;
        let board = storage.create_board("Gone", UserId::new()).await.unwrap();
        let column = storage.create_column(board.id, "To Do").await.unwrap();
        storage.create_task(column.id, "A").await.unwrap();

        storage.delete_board(board.id).await.unwrap();

        assert!(storage.list_boards().await.unwrap().is_empty());
        assert!(matches!(
            storage.read_board(board.id).await,
            Err(PlankoError::BoardNotFound(_))
        ));
    }
}
