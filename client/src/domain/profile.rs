//! Profile rows keyed by identity id.

use chrono::{DateTime, Utc};

use super::identity::{Identity, UserId};

/// One row of the `profiles` table.
///
/// ## Invariants
/// - `id` equals the owning identity's id and never changes.
/// - `created_at` is assigned by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub id: UserId,
    pub email: String,
    pub full_name: String,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Uppercase first character of the full name, shown as the avatar.
    pub fn initial(&self) -> Option<char> {
        self.full_name.chars().next().and_then(|c| c.to_uppercase().next())
    }

    /// Percentage shown as profile completeness.
    pub fn completeness_percent(&self) -> u8 {
        if self.bio.as_deref().is_some_and(|bio| !bio.is_empty()) {
            100
        } else {
            80
        }
    }
}

/// Payload inserted when a profile row is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProfile {
    pub id: UserId,
    pub email: String,
    pub full_name: String,
    pub bio: Option<String>,
}

impl NewProfile {
    /// Default row provisioned the first time an identity is seen without a
    /// profile: the name is the email's local part and the bio is empty.
    ///
    /// # Examples
    /// ```
    /// use taskboard::domain::{Identity, NewProfile};
    ///
    /// let identity = Identity::try_from_strings(
    ///     "3fa85f64-5717-4562-b3fc-2c963f66afa6",
    ///     "grace@example.com",
    /// )
    /// .unwrap();
    /// let row = NewProfile::default_for(&identity);
    /// assert_eq!(row.full_name, "grace");
    /// assert_eq!(row.bio.as_deref(), Some(""));
    /// ```
    pub fn default_for(identity: &Identity) -> Self {
        Self {
            id: identity.id().clone(),
            email: identity.email().to_string(),
            full_name: identity.email().local_part().to_owned(),
            bio: Some(String::new()),
        }
    }

    /// Row written during sign-up with the name the user typed.
    pub fn for_sign_up(identity: &Identity, full_name: impl Into<String>) -> Self {
        Self {
            id: identity.id().clone(),
            email: identity.email().to_string(),
            full_name: full_name.into(),
            bio: None,
        }
    }
}

/// Partial profile update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileChanges {
    pub full_name: Option<String>,
    pub bio: Option<String>,
}

impl ProfileChanges {
    /// Whether the update would change nothing.
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.bio.is_none()
    }
}
