use crate::domain::ids::{SubtaskId, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A checklist item belonging to a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: SubtaskId,
    pub task_id: TaskId,
    pub title: String,
    pub is_completed: bool,
    pub order_index: u32,
    pub created_at: DateTime<Utc>,
}

impl Subtask {
    pub fn new(task_id: TaskId, title: String, order_index: u32) -> Self {
        Self {
            id: SubtaskId::new(),
            task_id,
            title,
            is_completed: false,
            order_index,
            created_at: Utc::now(),
        }
    }

    pub fn toggle(&mut self) {
        self.is_completed = !self.is_completed;
    }
}

/// Counts completed items, returning `(completed, total)`
pub fn progress(subtasks: &[Subtask]) -> (usize, usize) {
    let completed = subtasks.iter().filter(|s| s.is_completed).count();
    (completed, subtasks.len())
}
