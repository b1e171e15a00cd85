use crate::domain::board::{BoardDetails, ColumnWithTasks};
use crate::domain::task::{Priority, Task};
use serde::{Deserialize, Serialize};

/// Text and priority predicates applied to a board view
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

impl TaskFilter {
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Whether any predicate narrows the view.
    ///
    /// Blank search text does not count.
    pub fn is_active(&self) -> bool {
        self.needle().is_some() || self.priority.is_some()
    }

    pub fn clear(&mut self) {
        self.text = None;
        self.priority = None;
    }

    fn needle(&self) -> Option<String> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
    }

    /// Checks a task against every active predicate.
    ///
    /// Text matches case-insensitively against title or description.
    pub fn matches(&self, task: &Task) -> bool {
        if let Some(priority) = self.priority {
            if task.priority != priority {
                return false;
            }
        }

        match self.needle() {
            None => true,
            Some(needle) => {
                task.title.to_lowercase().contains(&needle)
                    || task
                        .description
                        .as_ref()
                        .map(|d| d.to_lowercase().contains(&needle))
                        .unwrap_or(false)
            }
        }
    }

    /// Builds the display-only view of a board.
    ///
    /// All columns are kept; only their tasks are narrowed. Task indices in
    /// the result are not sibling positions and must not drive a move.
    pub fn apply(&self, board: &BoardDetails) -> BoardDetails {
        if !self.is_active() {
            return board.clone();
        }

        BoardDetails {
            board: board.board.clone(),
            columns: board
                .columns
                .iter()
                .map(|column| ColumnWithTasks {
                    column: column.column.clone(),
                    tasks: column
                        .tasks
                        .iter()
                        .filter(|t| self.matches(t))
                        .cloned()
                        .collect(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::board::{Board, Column};
    use crate::domain::ids::{ColumnId, UserId};

    fn task(title: &str, priority: Priority) -> Task {
        let mut task = Task::new(ColumnId::new(), title.to_string(), 0);
        task.priority = priority;
        task
    }

    #[test]
    fn test_default_filter_is_inactive() {
        assert!(!TaskFilter::default().is_active());
        assert!(!TaskFilter::default().with_text("   ").is_active());
        assert!(TaskFilter::default().with_text("bug").is_active());
        assert!(TaskFilter::default()
            .with_priority(Priority::Low)
            .is_active());
    }

    #[test]
    fn test_text_match_is_case_insensitive() {
        let filter = TaskFilter::default().with_text("LOGIN");
        assert!(filter.matches(&task("Fix login page", Priority::Medium)));
        assert!(!filter.matches(&task("Fix logout", Priority::Medium)));
    }

    #[test]
    fn test_text_matches_description() {
        let filter = TaskFilter::default().with_text("oauth");
        let mut t = task("Auth", Priority::Medium);
        t.description = Some("Switch to OAuth flow".to_string());
        assert!(filter.matches(&t));
    }

    #[test]
    fn test_priority_and_text_combine() {
        let filter = TaskFilter::default()
            .with_text("fix")
            .with_priority(Priority::High);
        assert!(filter.matches(&task("Fix crash", Priority::High)));
        assert!(!filter.matches(&task("Fix typo", Priority::Low)));
        assert!(!filter.matches(&task("Write docs", Priority::High)));
    }

    #[test]
    fn test_apply_keeps_columns() {
        let board = Board::new("B".to_string(), UserId::new());
        let column = Column::new(board.id, "To Do".to_string(), 0);
        let empty = Column::new(board.id, "Done".to_string(), 1);
        let mut hot = Task::new(column.id, "Hot".to_string(), 0);
        hot.priority = Priority::High;
        let cold = Task::new(column.id, "Cold".to_string(), 1);
        let details = BoardDetails::assemble(board, vec![column, empty], vec![hot, cold]);

        let mut filter = TaskFilter::default().with_priority(Priority::High);
        let view = filter.apply(&details);

        assert_eq!(view.columns.len(), 2);
        assert_eq!(view.columns[0].tasks.len(), 1);
        assert_eq!(view.columns[0].tasks[0].title, "Hot");

        filter.clear();
        assert_eq!(filter.apply(&details), details);
    }
}
