use crate::{
    cache::QueryCache,
    domain::{normalize_title, Subtask, SubtaskId, Task, TaskId},
    error::{PlankoError, Result},
    generator::{BreakdownRequest, SubtaskGenerator},
    notify::{Notifier, TracingNotifier},
    storage::SubtaskStore,
};
use std::sync::Arc;

/// Controller for one task's detail view and its checklist
pub struct TaskDetails<S: SubtaskStore + ?Sized = dyn SubtaskStore> {
    task_id: TaskId,
    store: Arc<S>,
    cache: Arc<dyn QueryCache<TaskId, Vec<Subtask>>>,
    notifier: Arc<dyn Notifier>,
    generator: Option<Arc<dyn SubtaskGenerator>>,
}

impl<S: SubtaskStore + ?Sized> TaskDetails<S> {
    pub fn new(
        task_id: TaskId,
        store: Arc<S>,
        cache: Arc<dyn QueryCache<TaskId, Vec<Subtask>>>,
    ) -> Self {
        Self {
            task_id,
            store,
            cache,
            notifier: Arc::new(TracingNotifier),
            generator: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn SubtaskGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Reads the task and its subtasks, caching the subtasks
    pub async fn load(&self) -> Result<(Task, Vec<Subtask>)> {
        let task = self.store.load_task(self.task_id).await?;
        let subtasks = self.refresh_subtasks().await?;
        Ok((task, subtasks))
    }

    /// Cached subtasks, possibly optimistic
    pub fn subtasks(&self) -> Option<Vec<Subtask>> {
        self.cache.get(&self.task_id)
    }

    pub async fn refresh_subtasks(&self) -> Result<Vec<Subtask>> {
        match self.store.list_subtasks(self.task_id).await {
            Ok(subtasks) => {
                self.cache.set(self.task_id, subtasks.clone());
                Ok(subtasks)
            }
            Err(error) => {
                self.cache.invalidate(&self.task_id);
                Err(error)
            }
        }
    }

    pub async fn add_subtask(&self, title: &str) -> Result<Subtask> {
        let title = normalize_title(title)?;

        match self.store.create_subtask(self.task_id, &title).await {
            Ok(subtask) => {
                self.settle().await;
                self.notifier.success("Subtask added successfully");
                Ok(subtask)
            }
            Err(error) => {
                self.notifier
                    .error(&format!("Failed to add subtask: {}", error));
                Err(error)
            }
        }
    }

    /// Sets a subtask's completion, showing the change before the write lands
    pub async fn toggle_subtask(&self, subtask_id: SubtaskId, completed: bool) -> Result<()> {
        let previous = self.subtasks();
        if let Some(mut subtasks) = previous.clone() {
            for subtask in subtasks.iter_mut().filter(|s| s.id == subtask_id) {
                subtask.is_completed = completed;
            }
            self.cache.set(self.task_id, subtasks);
        }

        let result = self.store.set_subtask_completed(subtask_id, completed).await;
        if let Err(error) = &result {
            tracing::warn!(task_id = %self.task_id, %subtask_id, %error, "subtask toggle failed");
            match previous {
                Some(previous) => self.cache.set(self.task_id, previous),
                None => self.cache.invalidate(&self.task_id),
            }
            self.notifier.error("Failed to update subtask");
        }

        self.settle().await;
        result
    }

    pub async fn delete_subtask(&self, subtask_id: SubtaskId) -> Result<()> {
        match self.store.delete_subtask(subtask_id).await {
            Ok(()) => {
                self.settle().await;
                self.notifier.success("Subtask deleted successfully");
                Ok(())
            }
            Err(error) => {
                self.notifier
                    .error(&format!("Failed to delete subtask: {}", error));
                Err(error)
            }
        }
    }

    /// Asks the generator for a breakdown and appends every returned title.
    ///
    /// Returns the number of subtasks created.
    pub async fn generate_subtasks(&self) -> Result<usize> {
        let generator = self
            .generator
            .as_ref()
            .ok_or_else(|| PlankoError::Other("No subtask generator configured".to_string()))?;

        let task = self.store.load_task(self.task_id).await?;
        let request = BreakdownRequest {
            task_id: task.id,
            title: task.title,
            description: task.description,
        };

        let titles = match generator.generate(&request).await {
            Ok(titles) => titles,
            Err(error) => {
                tracing::warn!(task_id = %self.task_id, %error, "subtask generation failed");
                self.notifier
                    .error(&format!("Failed to generate subtasks: {}", error));
                return Err(PlankoError::External(error));
            }
        };

        let mut created = 0;
        for title in titles.iter().filter(|t| !t.trim().is_empty()) {
            if let Err(error) = self.store.create_subtask(self.task_id, title).await {
                tracing::warn!(task_id = %self.task_id, created, %error, "subtask insert failed");
                self.notifier
                    .error(&format!("Failed to generate subtasks: {}", error));
                self.settle().await;
                return Err(error);
            }
            created += 1;
        }

        tracing::debug!(task_id = %self.task_id, created, "generated subtasks");
        self.settle().await;
        Ok(created)
    }

    /// Marks the subtask list stale and refetches it
    async fn settle(&self) {
        self.cache.invalidate(&self.task_id);
        if let Err(error) = self.refresh_subtasks().await {
            tracing::warn!(task_id = %self.task_id, %error, "subtask refetch failed");
        }
    }
}
