//! Port for rows of the `tasks` table.

use async_trait::async_trait;

use crate::domain::{NewTask, Task, TaskChanges, TaskId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by task repository adapters.
    pub enum TaskRepositoryError {
        /// The backend could not be reached.
        Connection { message: String } => "task repository connection failed: {message}",
        /// The backend refused the query or mutation.
        Query { message: String } => "{message}",
        /// The caller's session is missing or expired.
        Unauthorized { message: String } => "{message}",
        /// No visible row matched the id.
        NotFound { message: String } => "{message}",
        /// The response rows could not be decoded.
        Decode { message: String } => "task row could not be decoded: {message}",
    }
}

/// Row-level access to tasks owned by the current session.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Every visible task ordered by `created_at`, newest first.
    async fn list_newest_first(&self) -> Result<Vec<Task>, TaskRepositoryError>;

    /// Insert a task and return the stored row.
    async fn insert(&self, task: &NewTask) -> Result<Task, TaskRepositoryError>;

    /// Apply `changes` to the task with `id` and return the stored row.
    async fn update(&self, id: &TaskId, changes: &TaskChanges) -> Result<Task, TaskRepositoryError>;

    /// Delete the task with `id`.
    async fn delete(&self, id: &TaskId) -> Result<(), TaskRepositoryError>;
}
