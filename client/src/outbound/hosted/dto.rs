//! Wire payloads for the hosted auth and row services.
//!
//! Responses are decoded into these DTOs first and then mapped into domain
//! types in one pass, so decode failures surface as adapter errors rather
//! than half-built domain values.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    Identity, NewProfile, NewTask, Profile, ProfileChanges, Session, SessionToken, Task,
    TaskChanges, TaskId, TaskPriority, TaskStatus, UserId,
};

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(super) struct PasswordGrantDto<'a> {
    pub(super) email: &'a str,
    pub(super) password: &'a str,
}

#[derive(Debug, Serialize)]
pub(super) struct RefreshGrantDto<'a> {
    pub(super) refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
pub(super) struct UserDto {
    pub(super) id: String,
    pub(super) email: Option<String>,
}

impl UserDto {
    pub(super) fn into_identity(self) -> Result<Identity, String> {
        let email = self
            .email
            .ok_or_else(|| format!("user {} has no email", self.id))?;
        Identity::try_from_strings(&self.id, email).map_err(|err| err.to_string())
    }
}

/// Token grant response.
#[derive(Debug, Deserialize)]
pub(super) struct SessionDto {
    pub(super) access_token: String,
    pub(super) refresh_token: Option<String>,
    pub(super) expires_in: Option<i64>,
    pub(super) expires_at: Option<i64>,
    pub(super) user: UserDto,
}

impl SessionDto {
    pub(super) fn into_session(self, now: DateTime<Utc>) -> Result<Session, String> {
        let access_token = SessionToken::new(self.access_token).map_err(|err| err.to_string())?;
        let refresh_token = self
            .refresh_token
            .filter(|token| !token.trim().is_empty())
            .map(SessionToken::new)
            .transpose()
            .map_err(|err| err.to_string())?;
        let expires_at = match (self.expires_at, self.expires_in) {
            (Some(epoch), _) => Utc.timestamp_opt(epoch, 0).single(),
            (None, Some(seconds)) => Some(now + Duration::seconds(seconds)),
            (None, None) => None,
        };
        Ok(Session {
            identity: self.user.into_identity()?,
            access_token,
            refresh_token,
            expires_at,
        })
    }
}

/// Sign-up answers with a session when confirmation is disabled and with the
/// bare user otherwise.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum SignUpResponseDto {
    Session(SessionDto),
    User(UserDto),
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(super) struct ProfileRowDto {
    pub(super) id: String,
    pub(super) email: String,
    pub(super) full_name: String,
    pub(super) bio: Option<String>,
    pub(super) created_at: DateTime<Utc>,
    pub(super) updated_at: DateTime<Utc>,
}

impl ProfileRowDto {
    pub(super) fn into_profile(self) -> Result<Profile, String> {
        Ok(Profile {
            id: UserId::new(&self.id).map_err(|err| format!("profile {}: {err}", self.id))?,
            email: self.email,
            full_name: self.full_name,
            bio: self.bio,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Serialize)]
pub(super) struct NewProfileDto<'a> {
    pub(super) id: &'a str,
    pub(super) email: &'a str,
    pub(super) full_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) bio: Option<&'a str>,
}

impl<'a> From<&'a NewProfile> for NewProfileDto<'a> {
    fn from(row: &'a NewProfile) -> Self {
        Self {
            id: row.id.as_ref(),
            email: row.email.as_str(),
            full_name: row.full_name.as_str(),
            bio: row.bio.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct ProfilePatchDto<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) full_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) bio: Option<&'a str>,
    pub(super) updated_at: DateTime<Utc>,
}

impl<'a> ProfilePatchDto<'a> {
    pub(super) fn new(changes: &'a ProfileChanges, updated_at: DateTime<Utc>) -> Self {
        Self {
            full_name: changes.full_name.as_deref(),
            bio: changes.bio.as_deref(),
            updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct TaskRowDto {
    pub(super) id: String,
    pub(super) user_id: String,
    pub(super) title: String,
    pub(super) description: Option<String>,
    pub(super) status: String,
    pub(super) priority: String,
    pub(super) due_date: Option<String>,
    pub(super) created_at: DateTime<Utc>,
    pub(super) updated_at: DateTime<Utc>,
}

impl TaskRowDto {
    pub(super) fn into_task(self) -> Result<Task, String> {
        let context = |err: &dyn std::fmt::Display| format!("task {}: {err}", self.id);
        Ok(Task {
            id: TaskId::new(&self.id).map_err(|err| context(&err))?,
            user_id: UserId::new(&self.user_id).map_err(|err| context(&err))?,
            status: self.status.parse::<TaskStatus>().map_err(|err| context(&err))?,
            priority: self.priority.parse::<TaskPriority>().map_err(|err| context(&err))?,
            due_date: self
                .due_date
                .as_deref()
                .map(parse_due_date)
                .transpose()
                .map_err(|err| context(&err))?,
            title: self.title,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Date columns may come back as full timestamps; only the date part counts.
fn parse_due_date(raw: &str) -> Result<NaiveDate, chrono::ParseError> {
    let date = raw.split('T').next().unwrap_or(raw);
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
}

#[derive(Debug, Serialize)]
pub(super) struct NewTaskDto<'a> {
    pub(super) user_id: &'a str,
    pub(super) title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) description: Option<&'a str>,
    pub(super) status: &'static str,
    pub(super) priority: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) due_date: Option<NaiveDate>,
}

impl<'a> From<&'a NewTask> for NewTaskDto<'a> {
    fn from(task: &'a NewTask) -> Self {
        Self {
            user_id: task.user_id.as_ref(),
            title: task.draft.title.as_ref(),
            description: task.draft.description.as_deref(),
            status: task.draft.status.as_str(),
            priority: task.draft.priority.as_str(),
            due_date: task.draft.due_date,
        }
    }
}

/// Partial update body. `Some(None)` serialises as `null` to clear a column.
#[derive(Debug, Serialize)]
pub(super) struct TaskPatchDto<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) description: Option<Option<&'a str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) status: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) priority: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) due_date: Option<Option<NaiveDate>>,
}

impl<'a> From<&'a TaskChanges> for TaskPatchDto<'a> {
    fn from(changes: &'a TaskChanges) -> Self {
        Self {
            title: changes.title.as_ref().map(|title| title.as_ref()),
            description: changes.description.as_ref().map(Option::as_deref),
            status: changes.status.map(|status| status.as_str()),
            priority: changes.priority.map(|priority| priority.as_str()),
            due_date: changes.due_date,
        }
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for wire decoding and encoding.
    use super::*;
    use crate::domain::{TaskDraft, TaskTitle};
    use rstest::rstest;
    use serde_json::json;

    const USER_ID: &str = "7d444840-9dc0-11d1-b245-5ffdce74fad2";
    const TASK_ID: &str = "3fa85f64-5717-4562-b3fc-2c963f66afa6";

    fn task_row(due_date: serde_json::Value) -> serde_json::Value {
        json!({
            "id": TASK_ID,
            "user_id": USER_ID,
            "title": "Ship it",
            "description": null,
            "status": "in_progress",
            "priority": "high",
            "due_date": due_date,
            "created_at": "2026-03-01T10:00:00.123456+00:00",
            "updated_at": "2026-03-01T10:00:00+00:00"
        })
    }

    #[rstest]
    #[case(json!("2026-03-09"))]
    #[case(json!("2026-03-09T00:00:00+00:00"))]
    fn due_dates_keep_only_the_date_part(#[case] raw: serde_json::Value) {
        let dto: TaskRowDto = serde_json::from_value(task_row(raw)).expect("row decodes");
        let task = dto.into_task().expect("row maps");
        assert_eq!(task.due_date, NaiveDate::from_ymd_opt(2026, 3, 9));
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.priority, TaskPriority::High);
    }

    #[rstest]
    fn unknown_status_is_a_decode_error() {
        let mut row = task_row(json!(null));
        row["status"] = json!("archived");
        let dto: TaskRowDto = serde_json::from_value(row).expect("row decodes");
        let err = dto.into_task().expect_err("status rejected");
        assert!(err.contains("archived"), "unexpected message: {err}");
    }

    #[rstest]
    fn session_expiry_falls_back_to_expires_in() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().expect("timestamp");
        let dto: SessionDto = serde_json::from_value(json!({
            "access_token": "a",
            "refresh_token": "r",
            "expires_in": 3600,
            "user": { "id": USER_ID, "email": "ada@example.com" }
        }))
        .expect("session decodes");
        let session = dto.into_session(now).expect("session maps");
        assert_eq!(session.expires_at, Some(now + Duration::hours(1)));
        assert_eq!(session.identity.email().as_ref(), "ada@example.com");
    }

    #[rstest]
    fn sign_up_without_session_decodes_as_user() {
        let dto: SignUpResponseDto = serde_json::from_value(json!({
            "id": USER_ID,
            "email": "ada@example.com",
            "confirmation_sent_at": "2026-01-01T00:00:00Z"
        }))
        .expect("decodes");
        assert!(matches!(dto, SignUpResponseDto::User(_)));
    }

    #[rstest]
    fn new_task_omits_empty_optionals() {
        let draft = TaskDraft::titled(TaskTitle::new("abc").expect("title"));
        let new_task = draft.owned_by(UserId::new(USER_ID).expect("id"));
        let body = serde_json::to_value(NewTaskDto::from(&new_task)).expect("encodes");
        assert_eq!(
            body,
            json!({
                "user_id": USER_ID,
                "title": "abc",
                "status": "pending",
                "priority": "medium"
            })
        );
    }

    #[rstest]
    fn patch_sends_null_for_cleared_columns() {
        let changes = TaskChanges {
            description: Some(None),
            status: Some(TaskStatus::Completed),
            ..TaskChanges::default()
        };
        let body = serde_json::to_value(TaskPatchDto::from(&changes)).expect("encodes");
        assert_eq!(body, json!({ "description": null, "status": "completed" }));
    }
}
