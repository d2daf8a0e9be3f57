//! Sign-in credentials and the rules an email/password pair must meet.
//!
//! The console reports these rules per field before anything is sent, and
//! the session store applies them again before calling the auth gateway, so
//! both read the same checks and messages from here.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use zeroize::Zeroizing;

/// Minimum password length, counted in characters.
pub const PASSWORD_MIN: usize = 6;

static EMAIL_SHAPE: OnceLock<Regex> = OnceLock::new();

fn email_shape() -> &'static Regex {
    EMAIL_SHAPE.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$")
            .unwrap_or_else(|error| panic!("email regex failed to compile: {error}"))
    })
}

/// Why an email or password was refused.
///
/// The `Display` text is the message shown next to the offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialsValidationError {
    EmptyEmail,
    /// Not of the `local@domain.tld` shape.
    MalformedEmail,
    EmptyPassword,
    PasswordTooShort { min: usize },
}

impl CredentialsValidationError {
    /// Whether the error concerns the email rather than the password.
    pub const fn is_email(&self) -> bool {
        matches!(self, Self::EmptyEmail | Self::MalformedEmail)
    }
}

impl fmt::Display for CredentialsValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyEmail => write!(f, "Email is required"),
            Self::MalformedEmail => write!(f, "Invalid email format"),
            Self::EmptyPassword => write!(f, "Password is required"),
            Self::PasswordTooShort { min } => {
                write!(f, "Password must be at least {min} characters")
            }
        }
    }
}

impl std::error::Error for CredentialsValidationError {}

/// Validated email/password pair passed to the auth gateway.
///
/// ## Invariants
/// - `email` is trimmed and matches `local@domain.tld`.
/// - `password` has at least [`PASSWORD_MIN`] characters and keeps
///   caller-provided whitespace.
///
/// # Examples
/// ```
/// use taskboard::domain::Credentials;
///
/// let creds = Credentials::try_from_parts(" ada@example.com ", "hunter22").unwrap();
/// assert_eq!(creds.email(), "ada@example.com");
/// assert_eq!(creds.password(), "hunter22");
/// assert!(Credentials::try_from_parts("ada@example", "hunter22").is_err());
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    email: String,
    password: Zeroizing<String>,
}

impl Credentials {
    /// Construct credentials from raw inputs, checking the email first.
    pub fn try_from_parts(email: &str, password: &str) -> Result<Self, CredentialsValidationError> {
        let email = Self::check_email(email)?;
        Self::check_password(password)?;
        Ok(Self {
            email: email.to_owned(),
            password: Zeroizing::new(password.to_owned()),
        })
    }

    /// Check an email on its own, returning it trimmed.
    pub fn check_email(email: &str) -> Result<&str, CredentialsValidationError> {
        let email = email.trim();
        if email.is_empty() {
            Err(CredentialsValidationError::EmptyEmail)
        } else if !email_shape().is_match(email) {
            Err(CredentialsValidationError::MalformedEmail)
        } else {
            Ok(email)
        }
    }

    /// Check a password on its own. Whitespace counts toward the length.
    pub fn check_password(password: &str) -> Result<(), CredentialsValidationError> {
        if password.is_empty() {
            Err(CredentialsValidationError::EmptyPassword)
        } else if password.chars().count() < PASSWORD_MIN {
            Err(CredentialsValidationError::PasswordTooShort { min: PASSWORD_MIN })
        } else {
            Ok(())
        }
    }

    pub fn email(&self) -> &str {
        self.email.as_str()
    }

    pub fn password(&self) -> &str {
        self.password.as_str()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}
