//! Client-side filtering of the loaded task list.

use std::sync::Arc;

use super::task::{Task, TaskPriority, TaskStatus, TaskValidationError};

/// Search text plus optional status and priority selections.
///
/// A task passes when the query is a case-insensitive substring of its title
/// or description, and it matches the selected status and priority. `None`
/// selections mean "all".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub query: String,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
}

impl TaskFilter {
    /// Whether any criterion narrows the list.
    pub fn is_active(&self) -> bool {
        !self.query.is_empty() || self.status.is_some() || self.priority.is_some()
    }

    /// Evaluate the predicate against one task.
    pub fn matches(&self, task: &Task) -> bool {
        self.matches_query(task)
            && self.status.is_none_or(|status| task.status == status)
            && self.priority.is_none_or(|priority| task.priority == priority)
    }

    /// Filter a slice, preserving its order.
    pub fn apply<'a>(&self, tasks: &'a [Arc<Task>]) -> Vec<&'a Arc<Task>> {
        tasks.iter().filter(|task| self.matches(task)).collect()
    }

    fn matches_query(&self, task: &Task) -> bool {
        if self.query.is_empty() {
            return true;
        }
        let needle = self.query.to_lowercase();
        task.title.to_lowercase().contains(&needle)
            || task
                .description
                .as_deref()
                .is_some_and(|description| description.to_lowercase().contains(&needle))
    }
}

/// Parse a status selection where `all` clears the criterion.
pub fn parse_status_selection(raw: &str) -> Result<Option<TaskStatus>, TaskValidationError> {
    if raw.trim().eq_ignore_ascii_case("all") {
        return Ok(None);
    }
    raw.parse().map(Some)
}

/// Parse a priority selection where `all` clears the criterion.
pub fn parse_priority_selection(raw: &str) -> Result<Option<TaskPriority>, TaskValidationError> {
    if raw.trim().eq_ignore_ascii_case("all") {
        return Ok(None);
    }
    raw.parse().map(Some)
}
