//! In-memory task list for the signed-in identity.
//!
//! The list is loaded once per identity and then reconciled from each
//! mutation's response: created rows are prepended, updated rows replace the
//! entry with the same id, deleted rows are removed. Untouched entries keep
//! their `Arc` so views can compare them by pointer.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::ports::TaskRepository;
use crate::domain::store_support::map_task_error;
use crate::domain::{Error, Identity, Task, TaskChanges, TaskDraft, TaskId};

/// Owns the task rows visible to the current identity.
pub struct TaskStore<T> {
    repo: Arc<T>,
    owner: Option<Identity>,
    tasks: Vec<Arc<Task>>,
    loading: bool,
    error: Option<String>,
}

impl<T> TaskStore<T> {
    pub fn new(repo: Arc<T>) -> Self {
        Self {
            repo,
            owner: None,
            tasks: Vec::new(),
            loading: false,
            error: None,
        }
    }

    /// Tasks ordered newest first.
    pub fn tasks(&self) -> &[Arc<Task>] {
        &self.tasks
    }

    /// Identity the list currently belongs to.
    pub fn owner(&self) -> Option<&Identity> {
        self.owner.as_ref()
    }

    /// Whether a load is in flight.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Message from the last failed load, cleared by the next success.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Look up a task by id.
    pub fn find(&self, id: &TaskId) -> Option<&Arc<Task>> {
        self.tasks.iter().find(|task| task.id == *id)
    }

    /// Tasks whose id starts with `prefix` (case-insensitive hex).
    pub fn find_by_prefix(&self, prefix: &str) -> Vec<&Arc<Task>> {
        let needle = prefix.trim().to_ascii_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.tasks
            .iter()
            .filter(|task| {
                let id = task.id.to_string();
                id.starts_with(&needle) || task.id.as_uuid().simple().to_string().starts_with(&needle)
            })
            .collect()
    }
}

impl<T: TaskRepository> TaskStore<T> {
    /// Track the signed-in identity, reloading when it changes and clearing
    /// the list on sign-out.
    pub async fn follow_identity(&mut self, identity: Option<&Identity>) {
        let changed = match (self.owner.as_ref(), identity) {
            (Some(current), Some(next)) => current.id() != next.id(),
            (None, None) => false,
            _ => true,
        };
        if !changed {
            return;
        }

        self.owner = identity.cloned();
        self.tasks.clear();
        self.error = None;
        match identity {
            Some(identity) => {
                info!(user_id = %identity.id(), "loading tasks for new identity");
                self.load_tasks().await;
            }
            None => debug!("identity cleared; task list emptied"),
        }
    }

    /// Replace the list with every visible task, newest first.
    ///
    /// Failures leave the previous list in place and record the message.
    pub async fn load_tasks(&mut self) {
        self.loading = true;
        match self.repo.list_newest_first().await {
            Ok(rows) => {
                debug!(count = rows.len(), "tasks loaded");
                self.tasks = rows.into_iter().map(Arc::new).collect();
                self.error = None;
            }
            Err(err) => {
                warn!(error = %err, "failed to load tasks");
                self.error = Some(map_task_error(err, "Failed to load tasks").message().to_owned());
            }
        }
        self.loading = false;
    }

    /// Reload the list on demand.
    pub async fn refresh_tasks(&mut self) {
        self.load_tasks().await;
    }

    /// Insert a task owned by the current identity and prepend it.
    pub async fn create_task(&mut self, draft: TaskDraft) -> Result<Arc<Task>, Error> {
        let Some(owner) = self.owner.as_ref() else {
            return Err(Error::unauthorized("No user logged in"));
        };
        let new_task = draft.owned_by(owner.id().clone());
        let created = self
            .repo
            .insert(&new_task)
            .await
            .map_err(|err| map_task_error(err, "Failed to create task"))?;

        info!(task_id = %created.id, "task created");
        let created = Arc::new(created);
        self.tasks.insert(0, Arc::clone(&created));
        Ok(created)
    }

    /// Apply `changes` to the task with `id` and replace the local entry.
    ///
    /// When the id is not in the list the response is returned but the list
    /// is left as is. Empty changes send nothing and return the listed task.
    pub async fn update_task(&mut self, id: &TaskId, changes: TaskChanges) -> Result<Arc<Task>, Error> {
        if changes.is_empty() {
            debug!(task_id = %id, "no task fields changed; skipping update");
            return self
                .find(id)
                .cloned()
                .ok_or_else(|| Error::not_found("Task not found"));
        }
        let updated = self
            .repo
            .update(id, &changes)
            .await
            .map_err(|err| map_task_error(err, "Failed to update task"))?;

        info!(task_id = %id, "task updated");
        let updated = Arc::new(updated);
        if let Some(slot) = self.tasks.iter_mut().find(|task| task.id == *id) {
            *slot = Arc::clone(&updated);
        }
        Ok(updated)
    }

    /// Delete the task with `id` and drop the local entry.
    pub async fn delete_task(&mut self, id: &TaskId) -> Result<(), Error> {
        self.repo
            .delete(id)
            .await
            .map_err(|err| map_task_error(err, "Failed to delete task"))?;

        info!(task_id = %id, "task deleted");
        self.tasks.retain(|task| task.id != *id);
        Ok(())
    }
}

#[cfg(test)]
#[path = "task_store_tests.rs"]
mod tests;
