use crate::domain::ids::{BoardId, ColumnId, MemberId, TaskId, UserId};
use crate::domain::task::Task;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A kanban board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: BoardId,
    pub title: String,
    pub owner_id: UserId,
    pub created_at: DateTime<Utc>,
}

impl Board {
    pub fn new(title: String, owner_id: UserId) -> Self {
        Self {
            id: BoardId::new(),
            title,
            owner_id,
            created_at: Utc::now(),
        }
    }
}

/// An ordered lane of tasks within a board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub id: ColumnId,
    pub board_id: BoardId,
    pub title: String,
    pub order_index: u32,
    pub created_at: DateTime<Utc>,
}

impl Column {
    pub fn new(board_id: BoardId, title: String, order_index: u32) -> Self {
        Self {
            id: ColumnId::new(),
            board_id,
            title,
            order_index,
            created_at: Utc::now(),
        }
    }
}

/// A column together with its tasks in display order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnWithTasks {
    #[serde(flatten)]
    pub column: Column,
    pub tasks: Vec<Task>,
}

impl ColumnWithTasks {
    pub fn id(&self) -> ColumnId {
        self.column.id
    }

    /// Rewrites every task's position to match its array position
    pub fn renumber(&mut self) {
        let column_id = self.column.id;
        for (index, task) in self.tasks.iter_mut().enumerate() {
            task.column_id = column_id;
            task.order_index = to_order_index(index);
        }
    }

    /// Whether task positions form the sequence `0..n` in display order
    pub fn is_dense(&self) -> bool {
        self.tasks.iter().enumerate().all(|(index, task)| {
            task.order_index == to_order_index(index) && task.column_id == self.column.id
        })
    }
}

/// Board snapshot: a board with all of its columns and tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardDetails {
    #[serde(flatten)]
    pub board: Board,
    pub columns: Vec<ColumnWithTasks>,
}

impl BoardDetails {
    /// Groups flat column and task rows into a snapshot.
    ///
    /// Columns and tasks are ordered by `order_index`, falling back to
    /// creation time. Tasks whose column is not part of the board are dropped.
    pub fn assemble(board: Board, mut columns: Vec<Column>, mut tasks: Vec<Task>) -> Self {
        columns.sort_by(|a, b| {
            a.order_index
                .cmp(&b.order_index)
                .then(a.created_at.cmp(&b.created_at))
        });
        tasks.sort_by(|a, b| {
            a.order_index
                .cmp(&b.order_index)
                .then(a.created_at.cmp(&b.created_at))
        });

        let columns = columns
            .into_iter()
            .map(|column| {
                let column_tasks = tasks
                    .iter()
                    .filter(|task| task.column_id == column.id)
                    .cloned()
                    .collect();
                ColumnWithTasks {
                    column,
                    tasks: column_tasks,
                }
            })
            .collect();

        Self { board, columns }
    }

    pub fn id(&self) -> BoardId {
        self.board.id
    }

    pub fn column(&self, id: ColumnId) -> Option<&ColumnWithTasks> {
        self.columns.iter().find(|c| c.column.id == id)
    }

    pub fn column_mut(&mut self, id: ColumnId) -> Option<&mut ColumnWithTasks> {
        self.columns.iter_mut().find(|c| c.column.id == id)
    }

    pub fn column_position(&self, id: ColumnId) -> Option<usize> {
        self.columns.iter().position(|c| c.column.id == id)
    }

    pub fn task_count(&self) -> usize {
        self.columns.iter().map(|c| c.tasks.len()).sum()
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.columns.iter().flat_map(|c| c.tasks.iter())
    }

    /// Finds a task, returning the index of its column and its index within it
    pub fn locate_task(&self, task_id: TaskId) -> Option<(usize, usize)> {
        self.columns.iter().enumerate().find_map(|(ci, column)| {
            column
                .tasks
                .iter()
                .position(|t| t.id == task_id)
                .map(|ti| (ci, ti))
        })
    }

    /// Renumbers column positions to match their array order
    pub fn renumber_columns(&mut self) {
        for (index, column) in self.columns.iter_mut().enumerate() {
            column.column.order_index = to_order_index(index);
        }
    }
}

/// Role of a user on a board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Owner,
    Member,
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Owner => write!(f, "owner"),
            Self::Member => write!(f, "member"),
        }
    }
}

/// A user's membership of a board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardMember {
    pub id: MemberId,
    pub board_id: BoardId,
    pub user_id: UserId,
    pub role: MemberRole,
    pub created_at: DateTime<Utc>,
}

impl BoardMember {
    pub fn new(board_id: BoardId, user_id: UserId, role: MemberRole) -> Self {
        Self {
            id: MemberId::new(),
            board_id,
            user_id,
            role,
            created_at: Utc::now(),
        }
    }
}

/// Opaque token that grants membership of one board when redeemed
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InviteToken(String);

impl InviteToken {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for InviteToken {
    fn from(token: String) -> Self {
        Self(token.trim().to_string())
    }
}

impl fmt::Display for InviteToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub(crate) fn to_order_index(index: usize) -> u32 {
    u32::try_from(index).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board() -> Board {
        Board::new("Roadmap".to_string(), UserId::new())
    }

    #[test]
    fn test_assemble_groups_and_orders() {
        let board = board();
        let todo = Column::new(board.id, "To Do".to_string(), 1);
        let doing = Column::new(board.id, "Doing".to_string(), 0);

        let second = Task::new(todo.id, "Second".to_string(), 1);
        let first = Task::new(todo.id, "First".to_string(), 0);
        let active = Task::new(doing.id, "Active".to_string(), 0);
        let orphan = Task::new(ColumnId::new(), "Orphan".to_string(), 0);

        let details = BoardDetails::assemble(
            board,
            vec![todo.clone(), doing.clone()],
            vec![second, active, first, orphan],
        );

        assert_eq!(details.columns.len(), 2);
        assert_eq!(details.columns[0].column.title, "Doing");
        assert_eq!(details.columns[1].column.title, "To Do");

        let titles: Vec<_> = details.columns[1]
            .tasks
            .iter()
            .map(|t| t.title.as_str())
            .collect();
        assert_eq!(titles, vec!["First", "Second"]);
        assert_eq!(details.task_count(), 3);
    }

    #[test]
    fn test_renumber_makes_column_dense() {
        let board = board();
        let column = Column::new(board.id, "To Do".to_string(), 0);
        let mut lane = ColumnWithTasks {
            tasks: vec![
                Task::new(column.id, "A".to_string(), 4),
                Task::new(ColumnId::new(), "B".to_string(), 4),
            ],
            column,
        };
        assert!(!lane.is_dense());

        lane.renumber();

        assert!(lane.is_dense());
        assert_eq!(lane.tasks[1].order_index, 1);
        assert_eq!(lane.tasks[1].column_id, lane.id());
    }

    #[test]
    fn test_locate_task() {
        let board = board();
        let column = Column::new(board.id, "To Do".to_string(), 0);
        let task = Task::new(column.id, "Find me".to_string(), 0);
        let task_id = task.id;
        let details = BoardDetails::assemble(board, vec![column], vec![task]);

        assert_eq!(details.locate_task(task_id), Some((0, 0)));
        assert_eq!(details.locate_task(TaskId::new()), None);
    }

    #[test]
    fn test_snapshot_serializes_flat() {
        let board = board();
        let column = Column::new(board.id, "To Do".to_string(), 0);
        let details = BoardDetails::assemble(board, vec![column], Vec::new());

        let value = serde_json::to_value(&details).unwrap();
        assert!(value.get("title").is_some());
        assert!(value["columns"][0].get("tasks").is_some());
        assert!(value["columns"][0].get("order_index").is_some());
    }

    #[test]
    fn test_invite_token_is_trimmed() {
        let token = InviteToken::from(" abc \n".to_string());
        assert_eq!(token.as_str(), "abc");
        assert_eq!(InviteToken::generate().as_str().len(), 32);
    }
}
