pub mod board;
pub mod filter;
pub mod ids;
pub mod ordering;
pub mod stats;
pub mod subtask;
pub mod task;

pub use board::{
    Board, BoardDetails, BoardMember, Column, ColumnWithTasks, InviteToken, MemberRole,
};
pub use filter::TaskFilter;
pub use ids::{BoardId, ColumnId, MemberId, SubtaskId, TaskId, UserId};
pub use ordering::{plan_move, DropLocation, MovePlan, MoveRejection, TaskMove};
pub use stats::BoardStats;
pub use subtask::Subtask;
pub use task::{Priority, Task, TaskPosition, TaskUpdate};

use crate::error::{PlankoError, Result};

/// Trims a user-supplied title, rejecting blank ones
pub fn normalize_title(title: &str) -> Result<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(PlankoError::EmptyTitle);
    }
    Ok(trimmed.to_string())
}

/// Next free position after the given sibling positions
pub(crate) fn next_order_index(existing: impl Iterator<Item = u32>) -> u32 {
    existing.max().map(|max| max.saturating_add(1)).unwrap_or(0)
}
