//! Application context owning both stores.
//!
//! The context is created once by the binary (or a test), started, handed to
//! the view layer by `&mut` reference, and shut down on exit. After every
//! user action the view calls [`AppContext::sync`] so the task list follows
//! whatever identity the session store settled on.

use std::sync::Arc;

use mockable::Clock;
use tracing::info;

use crate::domain::ports::{AuthGateway, ProfileRepository, TaskRepository};
use crate::domain::{SessionStore, TaskStore};

/// Explicitly owned session and task state.
pub struct AppContext<A, P, T> {
    session: SessionStore<A, P>,
    tasks: TaskStore<T>,
}

impl<A, P, T> AppContext<A, P, T>
where
    A: AuthGateway,
    P: ProfileRepository,
    T: TaskRepository,
{
    /// Build a context from the three ports. Nothing is fetched until
    /// [`AppContext::start`].
    pub fn new(auth: Arc<A>, profiles: Arc<P>, tasks: Arc<T>, clock: Arc<dyn Clock>) -> Self {
        Self {
            session: SessionStore::new(auth, profiles, clock),
            tasks: TaskStore::new(tasks),
        }
    }

    /// Subscribe to session changes, adopt the persisted session and load
    /// its tasks.
    pub async fn start(&mut self) {
        self.session.start().await;
        self.follow_session().await;
        info!(signed_in = self.session.identity().is_some(), "application context started");
    }

    /// Renew an expired session, apply queued session changes and realign
    /// the task list.
    pub async fn sync(&mut self) {
        self.session.renew_if_expired().await;
        self.session.pump_events().await;
        self.follow_session().await;
    }

    /// Session and profile state.
    pub fn session(&self) -> &SessionStore<A, P> {
        &self.session
    }

    /// Mutable access for session operations.
    pub fn session_mut(&mut self) -> &mut SessionStore<A, P> {
        &mut self.session
    }

    /// Task list state.
    pub fn tasks(&self) -> &TaskStore<T> {
        &self.tasks
    }

    /// Mutable access for task operations.
    pub fn tasks_mut(&mut self) -> &mut TaskStore<T> {
        &mut self.tasks
    }

    /// Close the session subscription.
    pub fn shutdown(&mut self) {
        self.session.shutdown();
        info!("application context shut down");
    }

    async fn follow_session(&mut self) {
        let identity = self.session.identity().cloned();
        self.tasks.follow_identity(identity.as_ref()).await;
    }
}
