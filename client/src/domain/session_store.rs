//! Session and profile state for the signed-in user.
//!
//! The store mirrors the auth gateway: every observed [`SessionChange`]
//! either establishes an identity (and loads or provisions its profile) or
//! clears everything. Store operations that change the session do not touch
//! the identity directly; they call the gateway and then drain the
//! subscription so the published change is the only writer.

use std::sync::Arc;

use mockable::Clock;
use tracing::{debug, error, info, warn};

use crate::domain::ports::{AuthGateway, AuthGatewayError, ProfileRepository};
use crate::domain::store_support::{map_auth_error, map_profile_error};
use crate::domain::{
    Credentials, Error, Identity, NewProfile, Profile, ProfileChanges, Session, SessionChange,
    SessionEvent, SessionSubscription,
};

/// Outcome of a successful sign-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignUpStatus {
    /// The service issued a session and the user is now signed in.
    SignedIn,
    /// The account exists but must be confirmed before signing in.
    ConfirmationPending,
}

#[derive(Debug, Default)]
struct SessionState {
    identity: Option<Identity>,
    session: Option<Session>,
    profile: Option<Profile>,
    loading: bool,
}

/// Owns the current identity, session and profile.
pub struct SessionStore<A, P> {
    auth: Arc<A>,
    profiles: Arc<P>,
    clock: Arc<dyn Clock>,
    subscription: Option<SessionSubscription>,
    state: SessionState,
}

impl<A, P> SessionStore<A, P> {
    /// Create an idle store. Call [`SessionStore::start`] before use.
    pub fn new(auth: Arc<A>, profiles: Arc<P>, clock: Arc<dyn Clock>) -> Self {
        Self {
            auth,
            profiles,
            clock,
            subscription: None,
            state: SessionState {
                loading: true,
                ..SessionState::default()
            },
        }
    }

    /// Identity of the signed-in user.
    pub fn identity(&self) -> Option<&Identity> {
        self.state.identity.as_ref()
    }

    /// Active session, including its tokens.
    pub fn session(&self) -> Option<&Session> {
        self.state.session.as_ref()
    }

    /// Profile row for the signed-in user, once loaded.
    pub fn profile(&self) -> Option<&Profile> {
        self.state.profile.as_ref()
    }

    /// True until the first session has been resolved and while a profile
    /// load is in flight.
    pub fn is_loading(&self) -> bool {
        self.state.loading
    }

    /// Whether the change subscription is open.
    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Close the change subscription. The store keeps its last state.
    pub fn shutdown(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.close();
            info!("session subscription closed");
        }
    }
}

impl<A, P> SessionStore<A, P>
where
    A: AuthGateway,
    P: ProfileRepository,
{
    /// Subscribe to session changes and adopt the persisted session.
    ///
    /// A failure to read the persisted session is logged and treated as
    /// signed out.
    pub async fn start(&mut self) {
        if self.subscription.is_none() {
            self.subscription = Some(self.auth.subscribe());
        }
        let current = match self.auth.current_session().await {
            Ok(session) => session,
            Err(err) => {
                warn!(error = %err, "failed to restore persisted session");
                None
            }
        };
        self.apply_change(SessionChange::new(SessionEvent::InitialSession, current))
            .await;
    }

    /// Apply every change already queued on the subscription.
    ///
    /// Returns how many changes were applied.
    pub async fn pump_events(&mut self) -> usize {
        let mut applied = 0;
        while let Some(change) = self.next_queued() {
            self.apply_change(change).await;
            applied += 1;
        }
        applied
    }

    /// Register a new account and record the name the user typed.
    ///
    /// The profile insert is best effort: a failure is logged and the
    /// sign-up still succeeds.
    pub async fn sign_up(
        &mut self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<SignUpStatus, Error> {
        let credentials = Credentials::try_from_parts(email, password)
            .map_err(|err| Error::invalid_request(err.to_string()))?;
        let outcome = self
            .auth
            .sign_up(&credentials)
            .await
            .map_err(|err| map_auth_error(err, "Failed to create account"))?;

        let row = NewProfile::for_sign_up(&outcome.identity, full_name);
        if let Err(err) = self.profiles.insert(&row).await {
            warn!(
                user_id = %outcome.identity.id(),
                error = %err,
                "profile insert after sign-up failed"
            );
        }

        self.pump_events().await;
        Ok(if outcome.session.is_some() {
            SignUpStatus::SignedIn
        } else {
            SignUpStatus::ConfirmationPending
        })
    }

    /// Exchange credentials for a session.
    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<(), Error> {
        let credentials = Credentials::try_from_parts(email, password)
            .map_err(|err| Error::invalid_request(err.to_string()))?;
        self.auth
            .sign_in(&credentials)
            .await
            .map_err(|err| map_auth_error(err, "Invalid credentials"))?;
        self.pump_events().await;
        Ok(())
    }

    /// End the session. Local state is cleared even if the remote call fails.
    pub async fn sign_out(&mut self) -> Result<(), Error> {
        let result = self.auth.sign_out().await;
        self.pump_events().await;
        if self.state.identity.is_some() {
            self.clear();
        }
        result.map_err(|err| map_auth_error(err, "Failed to sign out"))
    }

    /// Trade the refresh token for a new access token.
    pub async fn refresh_session(&mut self) -> Result<(), Error> {
        self.auth
            .refresh_session()
            .await
            .map_err(|err| map_auth_error(err, "Failed to refresh session"))?;
        self.pump_events().await;
        Ok(())
    }

    /// Refresh the session if its access token has expired by the clock's
    /// current time.
    ///
    /// When the gateway refuses the refresh token the session ends locally
    /// as well. Transport failures leave the session in place so the next
    /// call can retry.
    pub async fn renew_if_expired(&mut self) {
        let now = self.clock.utc();
        let expired = self
            .state
            .session
            .as_ref()
            .is_some_and(|session| session.is_expired_at(now));
        if !expired {
            return;
        }

        info!("access token expired; refreshing session");
        let outcome = self.auth.refresh_session().await;
        self.pump_events().await;
        match outcome {
            Ok(_) => {}
            Err(err) if ends_session(&err) => {
                warn!(error = %err, "session refresh refused; signing out");
                if self.state.identity.is_some() {
                    self.apply_change(SessionChange::new(SessionEvent::SignedOut, None))
                        .await;
                }
            }
            Err(err) => warn!(error = %err, "session refresh failed"),
        }
    }

    /// Update the signed-in user's profile, then reload it.
    pub async fn update_profile(&mut self, changes: ProfileChanges) -> Result<(), Error> {
        let Some(identity) = self.state.identity.clone() else {
            return Err(Error::unauthorized("No user logged in"));
        };
        if changes.is_empty() {
            debug!(user_id = %identity.id(), "no profile fields changed; skipping update");
            return Ok(());
        }
        self.profiles
            .update(identity.id(), &changes, self.clock.utc())
            .await
            .map_err(|err| map_profile_error(err, "Failed to update profile"))?;
        self.load_profile(&identity).await;
        Ok(())
    }

    fn next_queued(&mut self) -> Option<SessionChange> {
        self.subscription.as_mut().and_then(SessionSubscription::try_recv)
    }

    async fn apply_change(&mut self, change: SessionChange) {
        info!(event = ?change.event, signed_in = change.session.is_some(), "session change");
        let Some(session) = change.session else {
            self.clear();
            return;
        };

        let identity = session.identity.clone();
        if self.state.identity.as_ref() != Some(&identity) {
            self.state.profile = None;
        }
        self.state.identity = Some(identity.clone());
        self.state.session = Some(session);
        self.state.loading = true;
        self.load_profile(&identity).await;
        self.state.loading = false;
    }

    async fn load_profile(&mut self, identity: &Identity) {
        match self.profiles.find_by_id(identity.id()).await {
            Ok(Some(profile)) => {
                debug!(user_id = %identity.id(), "profile loaded");
                self.state.profile = Some(profile);
            }
            Ok(None) => self.provision_profile(identity).await,
            Err(err) => {
                error!(user_id = %identity.id(), error = %err, "failed to load profile");
            }
        }
    }

    async fn provision_profile(&mut self, identity: &Identity) {
        let row = NewProfile::default_for(identity);
        match self.profiles.insert(&row).await {
            Ok(profile) => {
                info!(user_id = %identity.id(), "provisioned default profile");
                self.state.profile = Some(profile);
            }
            Err(err) => {
                error!(user_id = %identity.id(), error = %err, "failed to provision profile");
            }
        }
    }
}

/// Refresh failures after which the session cannot be recovered.
fn ends_session(error: &AuthGatewayError) -> bool {
    matches!(
        error,
        AuthGatewayError::Unauthorized { .. }
            | AuthGatewayError::InvalidCredentials { .. }
            | AuthGatewayError::Rejected { .. }
    )
}

impl<A, P> SessionStore<A, P> {
    fn clear(&mut self) {
        self.state.identity = None;
        self.state.session = None;
        self.state.profile = None;
        self.state.loading = false;
    }
}

#[cfg(test)]
#[path = "session_store_tests.rs"]
mod tests;
