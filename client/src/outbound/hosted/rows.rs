//! `ProfileRepository` and `TaskRepository` over the `/rest/v1` API.
//!
//! Row visibility is enforced by the service's row-level policies; the
//! adapter only forwards the session's bearer token.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::HeaderValue;
use reqwest::{Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;

use super::HostedBackend;
use super::dto::{
    NewProfileDto, NewTaskDto, ProfilePatchDto, ProfileRowDto, TaskPatchDto, TaskRowDto,
};
use super::http::{FailureKind, HttpFailure};
use crate::domain::ports::{
    ProfileRepository, ProfileRepositoryError, TaskRepository, TaskRepositoryError,
};
use crate::domain::{
    NewProfile, NewTask, Profile, ProfileChanges, Task, TaskChanges, TaskId, UserId,
};

const PROFILES: &str = "profiles";
const TASKS: &str = "tasks";

impl HostedBackend {
    async fn table_request(
        &self,
        method: Method,
        table: &str,
        filters: &[(&str, String)],
    ) -> Result<RequestBuilder, HttpFailure> {
        let mut url: Url = self.endpoint(super::REST_PREFIX, table)?;
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in filters {
                query.append_pair(key, value);
            }
        }
        let bearer = self.bearer().await?;
        Ok(self.request(method, url).bearer_auth(bearer))
    }

    /// Mutations that echo the affected rows back.
    fn returning_rows(request: RequestBuilder) -> RequestBuilder {
        request.header("Prefer", HeaderValue::from_static("return=representation"))
    }

    async fn fetch_rows<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Vec<T>, HttpFailure> {
        self.send_json(request).await
    }
}

fn eq(value: impl AsRef<str>) -> String {
    format!("eq.{}", value.as_ref())
}

fn single_row<T>(rows: Vec<T>, missing: &str) -> Result<T, HttpFailure> {
    rows.into_iter()
        .next()
        .ok_or_else(|| HttpFailure::new(FailureKind::NotFound, missing))
}

fn into_profile(row: ProfileRowDto) -> Result<Profile, HttpFailure> {
    row.into_profile().map_err(HttpFailure::decode)
}

fn into_task(row: TaskRowDto) -> Result<Task, HttpFailure> {
    row.into_task().map_err(HttpFailure::decode)
}

#[async_trait]
impl ProfileRepository for HostedBackend {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<Profile>, ProfileRepositoryError> {
        let filters = [("select", "*".to_owned()), ("id", eq(id))];
        let request = self.table_request(Method::GET, PROFILES, &filters).await?;
        let rows: Vec<ProfileRowDto> = self.fetch_rows(request).await?;
        Ok(rows.into_iter().next().map(into_profile).transpose()?)
    }

    async fn insert(&self, profile: &NewProfile) -> Result<Profile, ProfileRepositoryError> {
        let request = self.table_request(Method::POST, PROFILES, &[]).await?;
        let request = Self::returning_rows(request).json(&NewProfileDto::from(profile));
        let rows: Vec<ProfileRowDto> = self.fetch_rows(request).await?;
        Ok(into_profile(single_row(rows, "profile insert returned no row")?)?)
    }

    async fn update(
        &self,
        id: &UserId,
        changes: &ProfileChanges,
        updated_at: DateTime<Utc>,
    ) -> Result<Profile, ProfileRepositoryError> {
        let request = self
            .table_request(Method::PATCH, PROFILES, &[("id", eq(id))])
            .await?;
        let request = Self::returning_rows(request).json(&ProfilePatchDto::new(changes, updated_at));
        let rows: Vec<ProfileRowDto> = self.fetch_rows(request).await?;
        Ok(into_profile(single_row(rows, "no profile row matched the update")?)?)
    }
}

#[async_trait]
impl TaskRepository for HostedBackend {
    async fn list_newest_first(&self) -> Result<Vec<Task>, TaskRepositoryError> {
        let filters = [
            ("select", "*".to_owned()),
            ("order", "created_at.desc".to_owned()),
        ];
        let request = self.table_request(Method::GET, TASKS, &filters).await?;
        let rows: Vec<TaskRowDto> = self.fetch_rows(request).await?;
        Ok(rows.into_iter().map(into_task).collect::<Result<_, _>>()?)
    }

    async fn insert(&self, task: &NewTask) -> Result<Task, TaskRepositoryError> {
        let request = self.table_request(Method::POST, TASKS, &[]).await?;
        let request = Self::returning_rows(request).json(&NewTaskDto::from(task));
        let rows: Vec<TaskRowDto> = self.fetch_rows(request).await?;
        Ok(into_task(single_row(rows, "task insert returned no row")?)?)
    }

    async fn update(&self, id: &TaskId, changes: &TaskChanges) -> Result<Task, TaskRepositoryError> {
        let request = self
            .table_request(Method::PATCH, TASKS, &[("id", eq(id.to_string()))])
            .await?;
        let request = Self::returning_rows(request).json(&TaskPatchDto::from(changes));
        let rows: Vec<TaskRowDto> = self.fetch_rows(request).await?;
        Ok(into_task(single_row(rows, "Task not found")?)?)
    }

    async fn delete(&self, id: &TaskId) -> Result<(), TaskRepositoryError> {
        let request = self
            .table_request(Method::DELETE, TASKS, &[("id", eq(id.to_string()))])
            .await?;
        self.send(request).await?;
        Ok(())
    }
}
