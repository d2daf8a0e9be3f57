//! Port for reading and writing rows of the `profiles` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{NewProfile, Profile, ProfileChanges, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by profile repository adapters.
    pub enum ProfileRepositoryError {
        /// The backend could not be reached.
        Connection { message: String } => "profile repository connection failed: {message}",
        /// The backend refused the query or mutation.
        Query { message: String } => "{message}",
        /// The caller's session is missing or expired.
        Unauthorized { message: String } => "{message}",
        /// The response rows could not be decoded.
        Decode { message: String } => "profile row could not be decoded: {message}",
    }
}

/// Row-level access to profiles. Adapters only see rows owned by the
/// current session.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Fetch the profile with `id`, returning `None` when no row exists.
    async fn find_by_id(&self, id: &UserId) -> Result<Option<Profile>, ProfileRepositoryError>;

    /// Insert a new row and return it as stored.
    async fn insert(&self, profile: &NewProfile) -> Result<Profile, ProfileRepositoryError>;

    /// Apply `changes` to the row with `id`, stamping `updated_at`.
    async fn update(
        &self,
        id: &UserId,
        changes: &ProfileChanges,
        updated_at: DateTime<Utc>,
    ) -> Result<Profile, ProfileRepositoryError>;
}
