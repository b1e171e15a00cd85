//! # Planko Core
//!
//! Board model, persistence and optimistic reconciliation for Planko
//! kanban boards.
//!
//! The [`Reconciler`] keeps a cached board snapshot in step with a
//! [`storage::BoardStore`] while tasks are dragged between columns. Views
//! read the snapshot through the [`cache::QueryCache`] port and receive
//! user-facing messages through a [`notify::Notifier`].

pub mod cache;
pub mod config;
pub mod details;
pub mod domain;
pub mod error;
pub mod generator;
pub mod notify;
pub mod reconciler;
pub mod storage;

// Re-export commonly used types
pub use cache::{InMemoryQueryCache, QueryCache};
pub use config::{OverlapPolicy, PlankoConfig};
pub use details::TaskDetails;
pub use domain::{
    Board, BoardDetails, BoardId, Column, ColumnId, ColumnWithTasks, DropLocation,
    MoveRejection, Priority, Subtask, Task, TaskFilter, TaskId, TaskMove,
};
pub use error::{PlankoError, Result};
pub use reconciler::{MoveOutcome, PollOutcome, Reconciler};
pub use storage::{BoardStore, Storage, SubtaskStore};
