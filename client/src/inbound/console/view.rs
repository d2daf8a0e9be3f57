//! Text rendering for the console screens.
//!
//! Pure functions from store state to strings so the layout can be asserted
//! without driving a terminal.

use std::fmt::Write as _;
use std::sync::Arc;

use crate::domain::{Error, Profile, Task, TaskFilter};

use super::forms::FieldErrors;

/// Shown after a successful profile update.
pub const PROFILE_UPDATED: &str = "Profile updated successfully!";

/// "1 task" or "N tasks".
pub fn task_count(count: usize) -> String {
    if count == 1 {
        "1 task".to_owned()
    } else {
        format!("{count} tasks")
    }
}

/// Render the filtered task list, or the empty state when nothing matches.
pub fn task_list(tasks: &[&Arc<Task>], filter: &TaskFilter) -> String {
    let mut out = String::new();
    if tasks.is_empty() {
        out.push_str("No tasks found\n");
        let hint = if filter.is_active() {
            "Try adjusting your filters"
        } else {
            "Create your first task to get started"
        };
        out.push_str(hint);
        out.push('\n');
        return out;
    }

    let _ = writeln!(out, "{}", task_count(tasks.len()));
    for task in tasks {
        out.push_str(&task_line(task));
    }
    out
}

fn task_line(task: &Task) -> String {
    let mut line = format!(
        "  [{}] {}  ({}, {})",
        task.id.short(),
        task.title,
        task.status.label(),
        task.priority,
    );
    if let Some(due) = task.due_date {
        let _ = write!(line, "  due {}", due.format("%Y-%m-%d"));
    }
    line.push('\n');
    if let Some(description) = task.description.as_deref().filter(|d| !d.is_empty()) {
        let _ = writeln!(line, "      {description}");
    }
    line
}

/// One-line summary of the active filter criteria.
pub fn filter_summary(filter: &TaskFilter) -> String {
    let status = filter
        .status
        .map_or_else(|| "all".to_owned(), |status| status.label());
    let priority = filter
        .priority
        .map_or("all", |priority| priority.as_str());
    if filter.query.is_empty() {
        format!("filters: status={status} priority={priority}")
    } else {
        format!(
            "filters: search=\"{}\" status={status} priority={priority}",
            filter.query
        )
    }
}

/// Profile card with account statistics.
pub fn profile_card(profile: &Profile) -> String {
    let mut out = String::new();
    let initial = profile.initial().map_or_else(String::new, String::from);
    let _ = writeln!(out, "({initial}) {}", profile.full_name);
    let _ = writeln!(out, "  Email: {} (Email cannot be changed)", profile.email);
    let _ = writeln!(out, "  Joined: {}", profile.created_at.format("%Y-%m-%d"));
    let bio = profile.bio.as_deref().filter(|bio| !bio.is_empty());
    let _ = writeln!(out, "  Bio: {}", bio.unwrap_or("(none)"));
    out.push_str("Account statistics\n");
    out.push_str("  Account status: Active\n");
    let _ = writeln!(
        out,
        "  Profile completeness: {}%",
        profile.completeness_percent()
    );
    let _ = writeln!(out, "  Member since: {}", profile.created_at.format("%Y"));
    out
}

/// Dashboard header naming the signed-in user.
pub fn dashboard_header(profile: Option<&Profile>, email: &str) -> String {
    let name = profile.map_or(email, |profile| profile.full_name.as_str());
    format!("Task Manager | {name} | [tasks] [profile] [logout]")
}

/// General error banner above a form.
pub fn banner(err: &Error) -> String {
    format!("! {}", err.message())
}

/// Inline field errors below a rejected form.
pub fn field_errors(errors: &FieldErrors) -> String {
    format!("{errors}\n")
}

#[cfg(test)]
mod tests {
    //! Regression coverage for rendered text.
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use rstest::rstest;

    use crate::domain::{TaskId, TaskPriority, TaskStatus, UserId};

    fn task(title: &str) -> Arc<Task> {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).single().expect("time");
        Arc::new(Task {
            id: TaskId::new("3fa85f64-5717-4562-b3fc-2c963f66afa6").expect("id"),
            user_id: UserId::random(),
            title: title.to_owned(),
            description: Some("Before Friday".to_owned()),
            status: TaskStatus::InProgress,
            priority: TaskPriority::High,
            due_date: NaiveDate::from_ymd_opt(2026, 3, 6),
            created_at: now,
            updated_at: now,
        })
    }

    fn profile(bio: Option<&str>) -> Profile {
        let joined = Utc.with_ymd_and_hms(2025, 7, 14, 9, 0, 0).single().expect("time");
        Profile {
            id: UserId::random(),
            email: "ada@example.com".to_owned(),
            full_name: "ada lovelace".to_owned(),
            bio: bio.map(str::to_owned),
            created_at: joined,
            updated_at: joined,
        }
    }

    #[rstest]
    #[case(0, "0 tasks")]
    #[case(1, "1 task")]
    #[case(7, "7 tasks")]
    fn counts_pluralise(#[case] count: usize, #[case] expected: &str) {
        assert_eq!(task_count(count), expected);
    }

    #[rstest]
    fn task_rows_show_label_priority_and_due_date() {
        let item = task("Write report");
        let rendered = task_list(&[&item], &TaskFilter::default());
        assert!(rendered.starts_with("1 task\n"));
        assert!(rendered.contains("[3fa85f64] Write report  (in progress, high)  due 2026-03-06"));
        assert!(rendered.contains("      Before Friday"));
    }

    #[rstest]
    #[case(TaskFilter::default(), "Create your first task to get started")]
    #[case(
        TaskFilter { query: "x".to_owned(), ..TaskFilter::default() },
        "Try adjusting your filters"
    )]
    #[case(
        TaskFilter { status: Some(TaskStatus::Completed), ..TaskFilter::default() },
        "Try adjusting your filters"
    )]
    fn empty_state_hint_depends_on_filters(#[case] filter: TaskFilter, #[case] hint: &str) {
        let rendered = task_list(&[], &filter);
        assert_eq!(rendered, format!("No tasks found\n{hint}\n"));
    }

    #[rstest]
    #[case(Some("Analyst"), "100%")]
    #[case(Some(""), "80%")]
    #[case(None, "80%")]
    fn profile_card_reports_completeness(#[case] bio: Option<&str>, #[case] percent: &str) {
        let rendered = profile_card(&profile(bio));
        assert!(rendered.starts_with("(A) ada lovelace\n"));
        assert!(rendered.contains("Email cannot be changed"));
        assert!(rendered.contains("Account status: Active"));
        assert!(rendered.contains(&format!("Profile completeness: {percent}")));
        assert!(rendered.contains("Member since: 2025"));
    }

    #[rstest]
    fn filter_summary_names_labels() {
        let filter = TaskFilter {
            query: "report".to_owned(),
            status: Some(TaskStatus::InProgress),
            priority: None,
        };
        assert_eq!(
            filter_summary(&filter),
            "filters: search=\"report\" status=in progress priority=all"
        );
    }

    #[rstest]
    fn header_falls_back_to_email_without_profile() {
        assert_eq!(
            dashboard_header(None, "ada@example.com"),
            "Task Manager | ada@example.com | [tasks] [profile] [logout]"
        );
    }
}
