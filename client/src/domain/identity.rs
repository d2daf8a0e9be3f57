//! Authenticated identity and session primitives.
//!
//! The hosted auth service owns these values; the client mirrors them
//! read-only. Tokens are kept in zeroizing buffers and redacted from `Debug`
//! output so they never reach the logs.

use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;
use zeroize::Zeroizing;

/// Validation errors returned by identity constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityValidationError {
    EmptyId,
    InvalidId,
    EmptyEmail,
    EmailWithoutLocalPart,
    EmptyToken,
}

impl fmt::Display for IdentityValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyId => write!(f, "user id must not be empty"),
            Self::InvalidId => write!(f, "user id must be a valid UUID"),
            Self::EmptyEmail => write!(f, "email must not be empty"),
            Self::EmailWithoutLocalPart => {
                write!(f, "email must contain a local part before '@'")
            }
            Self::EmptyToken => write!(f, "session token must not be empty"),
        }
    }
}

impl std::error::Error for IdentityValidationError {}

/// Stable user identifier stored as a UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserId(Uuid, String);

impl UserId {
    /// Validate and construct a [`UserId`] from borrowed input.
    pub fn new(id: impl AsRef<str>) -> Result<Self, IdentityValidationError> {
        let id = id.as_ref();
        if id.is_empty() {
            return Err(IdentityValidationError::EmptyId);
        }
        if id.trim() != id {
            return Err(IdentityValidationError::InvalidId);
        }
        let parsed = Uuid::parse_str(id).map_err(|_| IdentityValidationError::InvalidId)?;
        Ok(Self::from_uuid(parsed))
    }

    /// Wrap an already parsed UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid, uuid.to_string())
    }

    /// Generate a new random [`UserId`].
    pub fn random() -> Self {
        Self::from_uuid(Uuid::new_v4())
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        self.1.as_str()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// Email address reported by the auth service.
///
/// Only the structure needed by the client is enforced: a non-empty local
/// part before the first `@`. Shape validation of user input lives with the
/// forms.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Validate and construct an [`EmailAddress`].
    pub fn new(email: impl Into<String>) -> Result<Self, IdentityValidationError> {
        let email = email.into();
        if email.trim().is_empty() {
            return Err(IdentityValidationError::EmptyEmail);
        }
        if email.split('@').next().is_none_or(str::is_empty) {
            return Err(IdentityValidationError::EmailWithoutLocalPart);
        }
        Ok(Self(email))
    }

    /// Substring before the first `@`, used as the default profile name.
    ///
    /// # Examples
    /// ```
    /// use taskboard::domain::EmailAddress;
    ///
    /// let email = EmailAddress::new("ada@example.com").unwrap();
    /// assert_eq!(email.local_part(), "ada");
    /// ```
    pub fn local_part(&self) -> &str {
        self.0.split('@').next().unwrap_or(self.0.as_str())
    }
}

impl AsRef<str> for EmailAddress {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// The authenticated user as seen by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    id: UserId,
    email: EmailAddress,
}

impl Identity {
    /// Build an identity from validated components.
    pub fn new(id: UserId, email: EmailAddress) -> Self {
        Self { id, email }
    }

    /// Fallible constructor from raw strings.
    pub fn try_from_strings(
        id: impl AsRef<str>,
        email: impl Into<String>,
    ) -> Result<Self, IdentityValidationError> {
        Ok(Self::new(UserId::new(id)?, EmailAddress::new(email)?))
    }

    /// Stable identifier shared with the `profiles` and `tasks` tables.
    pub fn id(&self) -> &UserId {
        &self.id
    }

    /// Email address used to sign in.
    pub fn email(&self) -> &EmailAddress {
        &self.email
    }
}

/// Opaque bearer credential. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(Zeroizing<String>);

impl SessionToken {
    /// Wrap a token string, rejecting blanks.
    pub fn new(token: impl Into<String>) -> Result<Self, IdentityValidationError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(IdentityValidationError::EmptyToken);
        }
        Ok(Self(Zeroizing::new(token)))
    }

    /// Expose the raw value for request headers.
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// An authenticated session: identity plus the tokens proving it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub identity: Identity,
    pub access_token: SessionToken,
    pub refresh_token: Option<SessionToken>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Whether the access token has passed its expiry at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }
}
