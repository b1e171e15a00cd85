//! Positional model for drag-and-drop.
//!
//! Planning a move is pure: it takes a board snapshot and a move descriptor
//! and returns the reordered snapshot plus the position writes needed to make
//! the store agree with it. Every column the move touches is renumbered in
//! full, so sibling `order_index` values stay `0..n` with no gaps.

use crate::domain::board::BoardDetails;
use crate::domain::ids::{ColumnId, TaskId};
use crate::domain::task::TaskPosition;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A slot in a column's task list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropLocation {
    pub column_id: ColumnId,
    pub index: usize,
}

impl DropLocation {
    pub fn new(column_id: ColumnId, index: usize) -> Self {
        Self { column_id, index }
    }
}

/// A drag gesture: where the task was picked up, and where it was dropped.
///
/// `destination` is `None` when the task was released outside any column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMove {
    pub source: DropLocation,
    pub destination: Option<DropLocation>,
}

impl TaskMove {
    pub fn new(source: DropLocation, destination: DropLocation) -> Self {
        Self {
            source,
            destination: Some(destination),
        }
    }

    pub fn cancelled(source: DropLocation) -> Self {
        Self {
            source,
            destination: None,
        }
    }

    /// Columns whose order this move may rewrite, deduplicated and sorted
    pub fn columns(&self) -> Vec<ColumnId> {
        let mut columns = vec![self.source.column_id];
        if let Some(dest) = self.destination {
            columns.push(dest.column_id);
        }
        columns.sort();
        columns.dedup();
        columns
    }

    pub fn is_cross_column(&self) -> bool {
        self.destination
            .map(|d| d.column_id != self.source.column_id)
            .unwrap_or(false)
    }
}

/// Why a move was ignored without touching state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveRejection {
    /// Dropped outside any column
    Cancelled,
    /// Dropped back where it started
    Unchanged,
    /// A filter is active, so view indices are not sibling positions
    FilterActive,
    /// Another move touching the same column has not resolved yet
    ColumnBusy(ColumnId),
    /// The board has no column with this id
    UnknownColumn(ColumnId),
    /// The source index does not point at a task
    SourceOutOfRange,
    /// No board snapshot is loaded
    NotLoaded,
}

impl fmt::Display for MoveRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(f, "drop cancelled"),
            Self::Unchanged => write!(f, "task dropped in place"),
            Self::FilterActive => write!(f, "filters are active"),
            Self::ColumnBusy(id) => write!(f, "column {} has a move in flight", id),
            Self::UnknownColumn(id) => write!(f, "unknown column {}", id),
            Self::SourceOutOfRange => write!(f, "source index out of range"),
            Self::NotLoaded => write!(f, "board not loaded"),
        }
    }
}

/// Result of planning a move
#[derive(Debug, Clone)]
pub struct MovePlan {
    pub task_id: TaskId,
    /// Snapshot with the move applied and touched columns renumbered
    pub snapshot: BoardDetails,
    /// Position writes, one per task in every touched column
    pub batch: Vec<(TaskId, TaskPosition)>,
}

/// Computes the snapshot and position batch for a move.
///
/// A destination index past the end of the column appends.
pub fn plan_move(board: &BoardDetails, mv: &TaskMove) -> Result<MovePlan, MoveRejection> {
    let destination = mv.destination.ok_or(MoveRejection::Cancelled)?;
    if destination == mv.source {
        return Err(MoveRejection::Unchanged);
    }

    let source_pos = board
        .column_position(mv.source.column_id)
        .ok_or(MoveRejection::UnknownColumn(mv.source.column_id))?;
    let dest_pos = board
        .column_position(destination.column_id)
        .ok_or(MoveRejection::UnknownColumn(destination.column_id))?;

    let source_len = board.columns[source_pos].tasks.len();
    if mv.source.index >= source_len {
        return Err(MoveRejection::SourceOutOfRange);
    }
    // An index past the end of the same column clamps back onto the source slot
    if source_pos == dest_pos && destination.index.min(source_len - 1) == mv.source.index {
        return Err(MoveRejection::Unchanged);
    }

    let mut snapshot = board.clone();
    let task = snapshot.columns[source_pos].tasks.remove(mv.source.index);
    let task_id = task.id;

    let dest_tasks = &mut snapshot.columns[dest_pos].tasks;
    let insert_at = destination.index.min(dest_tasks.len());
    dest_tasks.insert(insert_at, task);

    let mut touched = vec![dest_pos];
    if source_pos != dest_pos {
        touched.push(source_pos);
    }

    let mut batch = Vec::new();
    for pos in touched {
        let column = &mut snapshot.columns[pos];
        column.renumber();
        batch.extend(column.tasks.iter().map(|t| (t.id, t.position())));
    }

    Ok(MovePlan {
        task_id,
        snapshot,
        batch,
    })
}
