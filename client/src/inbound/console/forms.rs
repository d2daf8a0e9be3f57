//! Local validation for the console's forms.
//!
//! Every form validates synchronously and either yields the payload the
//! stores expect or a [`FieldErrors`] map; invalid input never reaches the
//! backend.
//!
//! Text fields are trimmed before their minimum length is counted, and the
//! trimmed text is what gets submitted. Passwords are taken as typed.

use std::fmt;

use chrono::NaiveDate;

use crate::domain::{
    Credentials, ProfileChanges, Task, TaskChanges, TaskDraft, TaskPriority, TaskStatus,
    TaskTitle, TaskValidationError,
};

/// Minimum length of a trimmed full name.
pub const FULL_NAME_MIN: usize = 2;

const DUE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Input that clears an optional field while editing.
pub const CLEAR_MARKER: &str = "-";

/// Form field an error is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Field {
    FullName,
    Email,
    Password,
    Title,
    Status,
    Priority,
    DueDate,
}

impl Field {
    pub const fn label(self) -> &'static str {
        match self {
            Self::FullName => "Full name",
            Self::Email => "Email",
            Self::Password => "Password",
            Self::Title => "Title",
            Self::Status => "Status",
            Self::Priority => "Priority",
            Self::DueDate => "Due date",
        }
    }
}

/// Field-keyed validation messages in form order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(Vec<(Field, String)>);

impl FieldErrors {
    /// Record `message` for `field`; the first message per field wins.
    pub fn insert(&mut self, field: Field, message: impl Into<String>) {
        if self.get(field).is_none() {
            self.0.push((field, message.into()));
        }
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.0
            .iter()
            .find(|(candidate, _)| *candidate == field)
            .map(|(_, message)| message.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.0.iter().map(|(field, message)| (*field, message.as_str()))
    }

    fn into_result<T>(self, value: impl FnOnce() -> T) -> Result<T, Self> {
        if self.is_empty() { Ok(value()) } else { Err(self) }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (field, message)) in self.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "  {}: {message}", field.label())?;
        }
        Ok(())
    }
}

fn check_email(errors: &mut FieldErrors, email: &str) {
    if let Err(err) = Credentials::check_email(email) {
        errors.insert(Field::Email, err.to_string());
    }
}

fn check_password(errors: &mut FieldErrors, password: &str) {
    if let Err(err) = Credentials::check_password(password) {
        errors.insert(Field::Password, err.to_string());
    }
}

fn check_full_name(errors: &mut FieldErrors, full_name: &str) {
    let trimmed = full_name.trim();
    if trimmed.is_empty() {
        errors.insert(Field::FullName, "Full name is required");
    } else if trimmed.chars().count() < FULL_NAME_MIN {
        errors.insert(
            Field::FullName,
            format!("Full name must be at least {FULL_NAME_MIN} characters"),
        );
    }
}

/// Email and password entered on the login screen.
#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();
        check_email(&mut errors, &self.email);
        check_password(&mut errors, &self.password);
        errors.into_result(|| ())
    }
}

/// Fields of the sign-up screen.
#[derive(Debug, Clone, Default)]
pub struct SignUpForm {
    pub full_name: String,
    pub email: String,
    pub password: String,
}

impl SignUpForm {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();
        check_full_name(&mut errors, &self.full_name);
        check_email(&mut errors, &self.email);
        check_password(&mut errors, &self.password);
        errors.into_result(|| ())
    }
}

/// Editable profile fields. The email is shown but never submitted.
///
/// A blank `bio` leaves the stored bio untouched; [`CLEAR_MARKER`] empties
/// it.
#[derive(Debug, Clone, Default)]
pub struct ProfileForm {
    pub full_name: String,
    pub bio: String,
}

impl ProfileForm {
    /// Validate and produce the update payload.
    pub fn validate(&self) -> Result<ProfileChanges, FieldErrors> {
        let mut errors = FieldErrors::default();
        check_full_name(&mut errors, &self.full_name);
        let bio = match self.bio.trim() {
            "" => None,
            CLEAR_MARKER => Some(String::new()),
            typed => Some(typed.to_owned()),
        };
        errors.into_result(|| ProfileChanges {
            full_name: Some(self.full_name.trim().to_owned()),
            bio,
        })
    }
}

/// Shared create/edit form for tasks.
///
/// Status and priority hold their wire names (`in_progress`, `high`, ...);
/// an empty description or due date means absent.
#[derive(Debug, Clone)]
pub struct TaskForm {
    pub title: String,
    pub description: String,
    pub status: String,
    pub priority: String,
    pub due_date: String,
}

impl Default for TaskForm {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            status: TaskStatus::default().as_str().to_owned(),
            priority: TaskPriority::default().as_str().to_owned(),
            due_date: String::new(),
        }
    }
}

impl TaskForm {
    /// Pre-fill the form from an existing task.
    pub fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone().unwrap_or_default(),
            status: task.status.as_str().to_owned(),
            priority: task.priority.as_str().to_owned(),
            due_date: task
                .due_date
                .map(|date| date.format(DUE_DATE_FORMAT).to_string())
                .unwrap_or_default(),
        }
    }

    /// Validate the form into a draft for `create_task`.
    pub fn validate(&self) -> Result<TaskDraft, FieldErrors> {
        let mut errors = FieldErrors::default();

        let title = TaskTitle::new(&self.title)
            .map_err(|err| errors.insert(Field::Title, title_message(&err)))
            .ok();
        let status = self
            .status
            .parse::<TaskStatus>()
            .map_err(|_| errors.insert(Field::Status, status_message()))
            .ok();
        let priority = self
            .priority
            .parse::<TaskPriority>()
            .map_err(|_| errors.insert(Field::Priority, priority_message()))
            .ok();
        let due_date = parse_due_date(&self.due_date)
            .map_err(|()| {
                errors.insert(Field::DueDate, "Due date must be a valid date (YYYY-MM-DD)");
            })
            .ok();

        match (title, status, priority, due_date) {
            (Some(title), Some(status), Some(priority), Some(due_date)) if errors.is_empty() => {
                Ok(TaskDraft {
                    title,
                    description: non_blank(&self.description),
                    status,
                    priority,
                    due_date,
                })
            }
            _ => Err(errors),
        }
    }

    /// Validate the form into a full update for `update_task`.
    pub fn validate_changes(&self) -> Result<TaskChanges, FieldErrors> {
        let draft = self.validate()?;
        Ok(TaskChanges {
            title: Some(draft.title),
            description: Some(draft.description),
            status: Some(draft.status),
            priority: Some(draft.priority),
            due_date: Some(draft.due_date),
        })
    }
}

fn title_message(err: &TaskValidationError) -> String {
    match err {
        TaskValidationError::TitleTooShort { min } => {
            format!("Title must be at least {min} characters")
        }
        _ => "Title is required".to_owned(),
    }
}

fn status_message() -> String {
    let names: Vec<&str> = TaskStatus::ALL.iter().map(|status| status.as_str()).collect();
    format!("Status must be one of: {}", names.join(", "))
}

fn priority_message() -> String {
    let names: Vec<&str> = TaskPriority::ALL
        .iter()
        .map(|priority| priority.as_str())
        .collect();
    format!("Priority must be one of: {}", names.join(", "))
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

fn parse_due_date(raw: &str) -> Result<Option<NaiveDate>, ()> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(trimmed, DUE_DATE_FORMAT)
        .map(Some)
        .map_err(|_| ())
}
