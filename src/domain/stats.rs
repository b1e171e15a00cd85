use crate::domain::board::BoardDetails;
use crate::domain::ids::ColumnId;
use crate::domain::task::Priority;
use serde::{Deserialize, Serialize};

/// Task count of one column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnCount {
    pub column_id: ColumnId,
    pub title: String,
    pub tasks: usize,
}

/// Task counts per priority
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityBreakdown {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl PriorityBreakdown {
    pub fn get(&self, priority: Priority) -> usize {
        match priority {
            Priority::High => self.high,
            Priority::Medium => self.medium,
            Priority::Low => self.low,
        }
    }
}

/// Summary metrics for a board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardStats {
    pub total: usize,
    pub per_column: Vec<ColumnCount>,
    pub priorities: PriorityBreakdown,
    /// Tasks in the last column, which is treated as "done"
    pub completed: usize,
    /// Whole-number percentage of tasks in the last column
    pub completion_rate: u8,
}

impl BoardStats {
    pub fn from_board(board: &BoardDetails) -> Self {
        let per_column: Vec<ColumnCount> = board
            .columns
            .iter()
            .map(|c| ColumnCount {
                column_id: c.column.id,
                title: c.column.title.clone(),
                tasks: c.tasks.len(),
            })
            .collect();

        let mut priorities = PriorityBreakdown::default();
        for task in board.tasks() {
            match task.priority {
                Priority::High => priorities.high += 1,
                Priority::Medium => priorities.medium += 1,
                Priority::Low => priorities.low += 1,
            }
        }

        let total = board.task_count();
        let completed = per_column.last().map(|c| c.tasks).unwrap_or(0);
        let completion_rate = if total == 0 {
            0
        } else {
            ((completed as f64 / total as f64) * 100.0).round() as u8
        };

        Self {
            total,
            per_column,
            priorities,
            completed,
            completion_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::board::{Board, Column};
    use crate::domain::ids::UserId;
    use crate::domain::task::Task;

    #[test]
    fn test_empty_board() {
        let board = Board::new("Empty".to_string(), UserId::new());
        let stats = BoardStats::from_board(&BoardDetails::assemble(board, vec![], vec![]));

        assert_eq!(stats.total, 0);
        assert_eq!(stats.completed, 0);
        assert_eq!(stats.completion_rate, 0);
        assert!(stats.per_column.is_empty());
    }

    #[test]
    fn test_counts_and_completion_rate() {
        let board = Board::new("Release".to_string(), UserId::new());
        let todo = Column::new(board.id, "To Do".to_string(), 0);
        let done = Column::new(board.id, "Done".to_string(), 1);

        let mut tasks = vec![
            Task::new(todo.id, "a".to_string(), 0),
            Task::new(todo.id, "b".to_string(), 1),
            Task::new(done.id, "c".to_string(), 0),
        ];
        tasks[0].priority = Priority::High;
        tasks[2].priority = Priority::Low;

        let stats = BoardStats::from_board(&BoardDetails::assemble(board, vec![todo, done], tasks));

        assert_eq!(stats.total, 3);
        assert_eq!(stats.per_column[0].tasks, 2);
        assert_eq!(stats.per_column[1].title, "Done");
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.completion_rate, 33);
        assert_eq!(stats.priorities.get(Priority::High), 1);
        assert_eq!(stats.priorities.get(Priority::Medium), 1);
        assert_eq!(stats.priorities.get(Priority::Low), 1);
    }
}
