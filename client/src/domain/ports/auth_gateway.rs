//! Port for the hosted authentication service.
//!
//! Adapters own the current session. Every transition (sign-in, sign-out,
//! refresh) is also published to subscribers so the session store can react
//! to changes it did not initiate, such as a background token refresh.

use async_trait::async_trait;

use crate::domain::{Credentials, Identity, Session, SessionSubscription};

use super::define_port_error;

define_port_error! {
    /// Errors raised by auth gateway adapters.
    pub enum AuthGatewayError {
        /// The service rejected the email/password pair.
        InvalidCredentials { message: String } => "{message}",
        /// The request was refused, for example a duplicate sign-up.
        Rejected { message: String } => "{message}",
        /// No session is active or the refresh token is no longer valid.
        Unauthorized { message: String } => "{message}",
        /// The service did not answer within the configured timeout.
        Timeout { message: String } => "auth service timed out: {message}",
        /// The service could not be reached.
        Connection { message: String } => "auth service unreachable: {message}",
        /// The response could not be understood.
        Decode { message: String } => "auth response could not be decoded: {message}",
    }
}

/// Result of registering a new account.
///
/// `session` is `None` when the service requires email confirmation before
/// the first sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpOutcome {
    pub identity: Identity,
    pub session: Option<Session>,
}

/// Authentication operations offered by the hosted backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// Register a new account.
    async fn sign_up(&self, credentials: &Credentials) -> Result<SignUpOutcome, AuthGatewayError>;

    /// Exchange credentials for a session.
    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthGatewayError>;

    /// End the current session. The local session is cleared even when the
    /// remote call fails.
    async fn sign_out(&self) -> Result<(), AuthGatewayError>;

    /// Session persisted by the adapter, if any.
    async fn current_session(&self) -> Result<Option<Session>, AuthGatewayError>;

    /// Trade the refresh token for a new access token.
    async fn refresh_session(&self) -> Result<Session, AuthGatewayError>;

    /// Subscribe to session transitions published from now on.
    fn subscribe(&self) -> SessionSubscription;
}
