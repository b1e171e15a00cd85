//! Board ordering reconciler.
//!
//! Keeps one board's cached snapshot in step with the store while the user
//! drags tasks around. A move is planned against the cached snapshot,
//! published to the cache at once, then written task by task. Success ends
//! with a refetch; failure discards the optimistic snapshot and refetches.
//!
//! Moves are serialized per column: a move claims the locks of every column
//! it touches, in ascending id order, before it reads the snapshot. A refetch
//! that overlaps another write only replaces the columns its own write
//! touched; the last write to resolve publishes the whole board.

use crate::{
    cache::QueryCache,
    config::{OverlapPolicy, ReconcilerConfig},
    domain::{
        normalize_title, plan_move, BoardDetails, BoardId, BoardStats, Column, ColumnId,
        MoveRejection, Task, TaskFilter, TaskId, TaskMove, TaskPosition, TaskUpdate,
    },
    error::{PlankoError, Result},
    notify::{Notifier, TracingNotifier},
    storage::BoardStore,
};
use std::{
    collections::HashMap,
    future::Future,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex, PoisonError, RwLock,
    },
};
use tokio::{
    sync::{Mutex as AsyncMutex, OwnedMutexGuard},
    task::JoinHandle,
};

/// How a move ended
#[derive(Debug)]
pub enum MoveOutcome {
    /// Nothing was published or written
    Ignored(MoveRejection),
    /// Every position write succeeded
    Committed { task_id: TaskId },
    /// A position write failed and the snapshot was refetched
    RolledBack { task_id: TaskId, error: PlankoError },
}

/// Whether a background poll replaced the cached snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Applied,
    /// A write was in flight during the read
    Discarded,
}

/// Reads attempted before a refetch gives up on a quiet window
const SETTLE_ATTEMPTS: usize = 3;

/// Decrements the in-flight counter when a write resolves
struct InFlight<'a> {
    counter: &'a AtomicUsize,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Optimistic controller for a single board
pub struct Reconciler<S: BoardStore + ?Sized = dyn BoardStore> {
    board_id: BoardId,
    store: Arc<S>,
    cache: Arc<dyn QueryCache<BoardId, BoardDetails>>,
    notifier: Arc<dyn Notifier>,
    config: ReconcilerConfig,
    filter: RwLock<TaskFilter>,
    column_locks: Mutex<HashMap<ColumnId, Arc<AsyncMutex<()>>>>,
    in_flight: AtomicUsize,
    epoch: AtomicU64,
}

impl<S: BoardStore + ?Sized> Reconciler<S> {
    pub fn new(
        board_id: BoardId,
        store: Arc<S>,
        cache: Arc<dyn QueryCache<BoardId, BoardDetails>>,
    ) -> Self {
        Self {
            board_id,
            store,
            cache,
            notifier: Arc::new(TracingNotifier),
            config: ReconcilerConfig::default(),
            filter: RwLock::new(TaskFilter::default()),
            column_locks: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn board_id(&self) -> BoardId {
        self.board_id
    }

    /// Current snapshot, optimistic or confirmed
    pub fn board(&self) -> Option<BoardDetails> {
        self.cache.get(&self.board_id)
    }

    /// Current snapshot narrowed by the active filter, for display only
    pub fn view(&self) -> Option<BoardDetails> {
        let board = self.board()?;
        Some(self.filter().apply(&board))
    }

    pub fn stats(&self) -> Option<BoardStats> {
        self.board().map(|board| BoardStats::from_board(&board))
    }

    pub fn filter(&self) -> TaskFilter {
        self.filter
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_filter(&self, filter: TaskFilter) {
        *self.filter.write().unwrap_or_else(PoisonError::into_inner) = filter;
    }

    pub fn clear_filter(&self) {
        self.filter
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Reads the board from the store and caches it.
    ///
    /// On failure the cached entry is marked stale and the error returned.
    pub async fn refresh(&self) -> Result<BoardDetails> {
        match self.store.read_board(self.board_id).await {
            Ok(board) => {
                self.cache.set(self.board_id, board.clone());
                Ok(board)
            }
            Err(error) => {
                tracing::warn!(board_id = %self.board_id, %error, "failed to load board");
                self.cache.invalidate(&self.board_id);
                Err(error)
            }
        }
    }

    /// Moves a task between positions, optimistically.
    ///
    /// The planned snapshot is published before the first position write.
    /// Position writes are issued in order, one per task in every column the
    /// move touches, and any failure fails the whole move.
    pub async fn apply_move(&self, mv: TaskMove) -> MoveOutcome {
        if self.filter().is_active() {
            return self.ignore(MoveRejection::FilterActive);
        }
        let Some(destination) = mv.destination else {
            return self.ignore(MoveRejection::Cancelled);
        };
        if destination == mv.source {
            return self.ignore(MoveRejection::Unchanged);
        }

        let columns = mv.columns();
        let _columns = match self.claim_columns(&columns).await {
            Ok(guards) => guards,
            Err(rejection) => return self.ignore(rejection),
        };
        let _in_flight = self.begin_write();

        let Some(previous) = self.board() else {
            return self.ignore(MoveRejection::NotLoaded);
        };
        let plan = match plan_move(&previous, &mv) {
            Ok(plan) => plan,
            Err(rejection) => return self.ignore(rejection),
        };

        let task_id = plan.task_id;
        self.cache.set(self.board_id, plan.snapshot);

        match self.write_positions(&plan.batch).await {
            Ok(()) => {
                tracing::debug!(
                    board_id = %self.board_id,
                    %task_id,
                    writes = plan.batch.len(),
                    "move committed"
                );
                self.resync(&columns).await;
                MoveOutcome::Committed { task_id }
            }
            Err(error) => {
                tracing::warn!(board_id = %self.board_id, %task_id, %error, "move failed");
                self.notifier.error("Failed to move task");
                self.recover(Some(previous), &columns).await;
                MoveOutcome::RolledBack { task_id, error }
            }
        }
    }

    pub async fn rename_board(&self, title: &str) -> Result<()> {
        let title = normalize_title(title)?;
        self.mutate_optimistically(
            |_| "Failed to rename board".to_string(),
            |board| {
                board.board.title = title.clone();
                Ok(())
            },
            self.store.rename_board(self.board_id, &title),
        )
        .await
    }

    pub async fn rename_column(&self, column_id: ColumnId, title: &str) -> Result<()> {
        let title = normalize_title(title)?;
        self.mutate_optimistically(
            |_| "Failed to rename column".to_string(),
            |board| {
                if let Some(column) = board.column_mut(column_id) {
                    column.column.title = title.clone();
                }
                Ok(())
            },
            self.store.rename_column(column_id, &title),
        )
        .await
    }

    /// Deletes a column and its tasks; remaining columns close the gap
    pub async fn delete_column(&self, column_id: ColumnId) -> Result<()> {
        self.mutate_optimistically(
            |_| "Failed to delete column".to_string(),
            |board| {
                board.columns.retain(|c| c.id() != column_id);
                board.renumber_columns();
                Ok(())
            },
            self.store.delete_column(column_id),
        )
        .await
    }

    pub async fn delete_task(&self, task_id: TaskId) -> Result<()> {
        self.mutate_optimistically(
            |_| "Failed to delete task".to_string(),
            |board| {
                if let Some((column, index)) = board.locate_task(task_id) {
                    board.columns[column].tasks.remove(index);
                    board.columns[column].renumber();
                }
                Ok(())
            },
            self.store.delete_task(task_id),
        )
        .await
    }

    /// Patches a task's editable fields
    pub async fn update_task(&self, task_id: TaskId, update: &TaskUpdate) -> Result<Task> {
        let task = self
            .mutate_optimistically(
                |error| format!("Failed to update task: {}", error),
                |board| {
                    if let Some((column, index)) = board.locate_task(task_id) {
                        board.columns[column].tasks[index].apply(update)?;
                    }
                    Ok(())
                },
                self.store.update_task(task_id, update),
            )
            .await?;

        self.notifier.success("Task updated successfully");
        Ok(task)
    }

    /// Appends a column, then refetches
    pub async fn add_column(&self, title: &str) -> Result<Column> {
        let title = normalize_title(title)?;
        let _in_flight = self.begin_write();

        match self.store.create_column(self.board_id, &title).await {
            Ok(column) => {
                self.resync(&[]).await;
                Ok(column)
            }
            Err(error) => {
                tracing::warn!(board_id = %self.board_id, %error, "failed to add column");
                self.notifier.error("Failed to add column");
                Err(error)
            }
        }
    }

    /// Appends a task to a column, then refetches
    pub async fn add_task(&self, column_id: ColumnId, title: &str) -> Result<Task> {
        let title = normalize_title(title)?;
        let _in_flight = self.begin_write();

        match self.store.create_task(column_id, &title).await {
            Ok(task) => {
                self.resync(&[]).await;
                Ok(task)
            }
            Err(error) => {
                tracing::warn!(
                    board_id = %self.board_id,
                    %column_id,
                    %error,
                    "failed to add task"
                );
                self.notifier.error("Failed to add task");
                Err(error)
            }
        }
    }

    /// Reads the board and caches it unless a write overlapped the read
    pub async fn poll(&self) -> Result<PollOutcome> {
        let started = self.epoch.load(Ordering::SeqCst);
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            return Ok(PollOutcome::Discarded);
        }

        let board = self.store.read_board(self.board_id).await?;

        if self.in_flight.load(Ordering::SeqCst) > 0 || self.epoch.load(Ordering::SeqCst) != started
        {
            tracing::debug!(board_id = %self.board_id, "discarding stale poll");
            return Ok(PollOutcome::Discarded);
        }

        self.cache.set(self.board_id, board);
        Ok(PollOutcome::Applied)
    }

    /// Starts polling at the configured interval.
    ///
    /// Returns `None` when polling is disabled. The task runs until its
    /// handle is aborted.
    pub fn spawn_polling(self: Arc<Self>) -> Option<JoinHandle<()>>
    where
        S: 'static,
    {
        let period = self.config.poll_interval()?;

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick fires immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(error) = self.poll().await {
                    tracing::warn!(board_id = %self.board_id, %error, "board poll failed");
                }
            }
        }))
    }

    fn ignore(&self, rejection: MoveRejection) -> MoveOutcome {
        tracing::debug!(board_id = %self.board_id, reason = %rejection, "move ignored");
        MoveOutcome::Ignored(rejection)
    }

    fn begin_write(&self) -> InFlight<'_> {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        InFlight {
            counter: &self.in_flight,
        }
    }

    fn column_lock(&self, column_id: ColumnId) -> Arc<AsyncMutex<()>> {
        let mut locks = self
            .column_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks.entry(column_id).or_default().clone()
    }

    /// Claims column locks in the given order, per the overlap policy
    async fn claim_columns(
        &self,
        columns: &[ColumnId],
    ) -> std::result::Result<Vec<OwnedMutexGuard<()>>, MoveRejection> {
        let mut guards = Vec::with_capacity(columns.len());
        for &column_id in columns {
            let lock = self.column_lock(column_id);
            let guard = match self.config.overlap {
                OverlapPolicy::Reject => lock
                    .try_lock_owned()
                    .map_err(|_| MoveRejection::ColumnBusy(column_id))?,
                OverlapPolicy::Queue => lock.lock_owned().await,
            };
            guards.push(guard);
        }
        Ok(guards)
    }

    async fn write_positions(&self, batch: &[(TaskId, TaskPosition)]) -> Result<()> {
        for (task_id, position) in batch {
            self.store.update_task_position(*task_id, *position).await?;
        }
        Ok(())
    }

    /// Publishes a patched snapshot, then runs the write.
    ///
    /// The patch is skipped when no snapshot is cached. A patch error aborts
    /// before anything is published or written.
    async fn mutate_optimistically<T, M, P, W>(&self, failure: M, patch: P, write: W) -> Result<T>
    where
        M: FnOnce(&PlankoError) -> String,
        P: FnOnce(&mut BoardDetails) -> Result<()>,
        W: Future<Output = Result<T>>,
    {
        let _in_flight = self.begin_write();
        let previous = self.board();

        if let Some(mut snapshot) = previous.clone() {
            patch(&mut snapshot)?;
            self.cache.set(self.board_id, snapshot);
        }

        match write.await {
            Ok(value) => {
                self.resync(&[]).await;
                Ok(value)
            }
            Err(error) => {
                tracing::warn!(board_id = %self.board_id, %error, "board write failed");
                self.notifier.error(&failure(&error));
                self.recover(previous, &[]).await;
                Err(error)
            }
        }
    }

    /// Marks the snapshot stale and refetches it, keeping the stale copy on failure
    async fn resync(&self, touched: &[ColumnId]) {
        self.cache.invalidate(&self.board_id);
        if let Err(error) = self.settle(touched).await {
            tracing::warn!(board_id = %self.board_id, %error, "resync failed");
        }
    }

    /// Replaces an optimistic snapshot after a failed write.
    ///
    /// Prefers a fresh read; falls back to the snapshot from before the
    /// write, left marked stale.
    async fn recover(&self, previous: Option<BoardDetails>, touched: &[ColumnId]) {
        self.cache.invalidate(&self.board_id);
        let Err(error) = self.settle(touched).await else {
            return;
        };

        tracing::warn!(board_id = %self.board_id, %error, "refetch after failed write");
        let Some(previous) = previous else {
            return;
        };
        if self.in_flight.load(Ordering::SeqCst) > 1 {
            self.merge_columns(&previous, touched);
        } else {
            self.cache.set(self.board_id, previous);
            self.cache.invalidate(&self.board_id);
        }
    }

    /// Reads the board once the calling write has resolved.
    ///
    /// The read replaces the snapshot only when no other write overlapped
    /// it. While another write is in flight only `touched` columns are taken
    /// from the read and the entry stays stale.
    async fn settle(&self, touched: &[ColumnId]) -> Result<()> {
        for _ in 0..SETTLE_ATTEMPTS {
            let started = self.epoch.load(Ordering::SeqCst);
            let overlapped = self.in_flight.load(Ordering::SeqCst) > 1;

            let board = self.store.read_board(self.board_id).await?;

            if self.in_flight.load(Ordering::SeqCst) > 1 {
                self.merge_columns(&board, touched);
                return Ok(());
            }
            if !overlapped && self.epoch.load(Ordering::SeqCst) == started {
                self.cache.set(self.board_id, board);
                return Ok(());
            }
        }

        tracing::debug!(board_id = %self.board_id, "board kept changing during refetch");
        Ok(())
    }

    /// Copies `touched` columns from `source` into the cached snapshot and marks it stale
    fn merge_columns(&self, source: &BoardDetails, touched: &[ColumnId]) {
        if let Some(mut current) = self.board() {
            for column_id in touched {
                if let (Some(slot), Some(column)) =
                    (current.column_mut(*column_id), source.column(*column_id))
                {
                    *slot = column.clone();
                }
            }
            self.cache.set(self.board_id, current);
        }
        self.cache.invalidate(&self.board_id);
    }
}
