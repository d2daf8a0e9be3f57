//! `AuthGateway` implementation over the `/auth/v1` API.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use tracing::{info, warn};

use super::HostedBackend;
use super::dto::{PasswordGrantDto, RefreshGrantDto, SessionDto, SignUpResponseDto};
use super::http::{FailureKind, HttpFailure};
use crate::domain::ports::{AuthGateway, AuthGatewayError, SignUpOutcome};
use crate::domain::{Credentials, Session, SessionChange, SessionEvent, SessionSubscription};

impl HostedBackend {
    async fn token_grant<B: serde::Serialize + Sync>(
        &self,
        grant_type: &str,
        body: &B,
    ) -> Result<Session, HttpFailure> {
        let mut url = self.endpoint(super::AUTH_PREFIX, "token")?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);
        let dto: SessionDto = self
            .send_json(self.request(Method::POST, url).json(body))
            .await?;
        dto.into_session(Utc::now()).map_err(HttpFailure::decode)
    }

    /// Trade the stored refresh token for a new session.
    ///
    /// A refused refresh token ends the session: it is cleared and
    /// `SignedOut` is published. Transport failures leave it in place so a
    /// later attempt can succeed.
    pub(super) async fn renew_session(&self) -> Result<Session, HttpFailure> {
        let refresh_token = {
            let guard = self.session.read().await;
            let Some(current) = guard.as_ref() else {
                return Err(HttpFailure::new(
                    FailureKind::Unauthorized,
                    "No active session to refresh",
                ));
            };
            current
                .refresh_token
                .as_ref()
                .map(|token| token.expose().to_owned())
        };

        let granted = match refresh_token {
            Some(token) => {
                let body = RefreshGrantDto {
                    refresh_token: &token,
                };
                self.token_grant("refresh_token", &body).await
            }
            None => Err(HttpFailure::new(
                FailureKind::Unauthorized,
                "Session has no refresh token",
            )),
        };

        match granted {
            Ok(session) => {
                info!(user_id = %session.identity.id(), "session refreshed");
                self.adopt(SessionEvent::TokenRefreshed, Some(session.clone()))
                    .await;
                Ok(session)
            }
            Err(failure)
                if matches!(
                    failure.kind,
                    FailureKind::Rejected | FailureKind::Unauthorized
                ) =>
            {
                warn!(error = %failure.message, "refresh token refused; ending session");
                self.adopt(SessionEvent::SignedOut, None).await;
                Err(HttpFailure::new(FailureKind::Unauthorized, failure.message))
            }
            Err(failure) => Err(failure),
        }
    }

    async fn adopt(&self, event: SessionEvent, session: Option<Session>) {
        {
            let mut guard = self.session.write().await;
            guard.clone_from(&session);
        }
        self.events.publish(SessionChange::new(event, session));
    }
}

#[async_trait]
impl AuthGateway for HostedBackend {
    async fn sign_up(&self, credentials: &Credentials) -> Result<SignUpOutcome, AuthGatewayError> {
        let url = self.endpoint(super::AUTH_PREFIX, "signup")?;
        let body = PasswordGrantDto {
            email: credentials.email(),
            password: credentials.password(),
        };
        let dto: SignUpResponseDto = self
            .send_json(self.request(Method::POST, url).json(&body))
            .await?;

        match dto {
            SignUpResponseDto::Session(session) => {
                let session = session
                    .into_session(Utc::now())
                    .map_err(AuthGatewayError::decode)?;
                let identity = session.identity.clone();
                info!(user_id = %identity.id(), "account created and signed in");
                self.adopt(SessionEvent::SignedIn, Some(session.clone())).await;
                Ok(SignUpOutcome {
                    identity,
                    session: Some(session),
                })
            }
            SignUpResponseDto::User(user) => {
                let identity = user.into_identity().map_err(AuthGatewayError::decode)?;
                info!(user_id = %identity.id(), "account created; confirmation pending");
                Ok(SignUpOutcome {
                    identity,
                    session: None,
                })
            }
        }
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthGatewayError> {
        let body = PasswordGrantDto {
            email: credentials.email(),
            password: credentials.password(),
        };
        let session = self
            .token_grant("password", &body)
            .await
            .map_err(|failure| match failure.kind {
                FailureKind::Rejected | FailureKind::Unauthorized => {
                    AuthGatewayError::invalid_credentials(failure.message)
                }
                _ => AuthGatewayError::from(failure),
            })?;
        info!(user_id = %session.identity.id(), "signed in");
        self.adopt(SessionEvent::SignedIn, Some(session.clone())).await;
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthGatewayError> {
        let token = self
            .session
            .read()
            .await
            .as_ref()
            .map(|session| session.access_token.expose().to_owned());

        let remote = match token {
            Some(token) => match self.endpoint(super::AUTH_PREFIX, "logout") {
                Ok(url) => self
                    .send(self.request(Method::POST, url).bearer_auth(token))
                    .await
                    .map(drop),
                Err(failure) => Err(failure),
            },
            None => Ok(()),
        };
        if let Err(failure) = &remote {
            warn!(error = %failure.message, "remote sign-out failed; clearing local session");
        }

        self.adopt(SessionEvent::SignedOut, None).await;
        info!("signed out");
        remote.map_err(AuthGatewayError::from)
    }

    async fn current_session(&self) -> Result<Option<Session>, AuthGatewayError> {
        Ok(self.session.read().await.clone())
    }

    async fn refresh_session(&self) -> Result<Session, AuthGatewayError> {
        self.renew_session().await.map_err(AuthGatewayError::from)
    }

    fn subscribe(&self) -> SessionSubscription {
        self.events.subscribe()
    }
}
