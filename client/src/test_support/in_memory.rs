//! In-memory stand-in for the hosted backend.
//!
//! Emulates the behaviour the client depends on: password accounts,
//! sessions broadcast on every transition, server-assigned ids and
//! timestamps, and row-level visibility restricted to the session's user.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use mockable::{Clock, DefaultClock};
use uuid::Uuid;

use crate::domain::ports::{
    AuthGateway, AuthGatewayError, ProfileRepository, ProfileRepositoryError, SignUpOutcome,
    TaskRepository, TaskRepositoryError,
};
use crate::domain::{
    Credentials, EmailAddress, Identity, NewProfile, NewTask, Profile, ProfileChanges, Session,
    SessionBroadcaster, SessionChange, SessionEvent, SessionSubscription, SessionToken, Task,
    TaskChanges, TaskDraft, TaskId, TaskTitle, UserId,
};

const RLS_VIOLATION: &str = "new row violates row-level security policy";
const JWT_EXPIRED: &str = "JWT expired";

/// Number of calls received per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendCalls {
    pub sign_ups: usize,
    pub sign_ins: usize,
    pub sign_outs: usize,
    pub refreshes: usize,
    pub profile_lookups: usize,
    pub profile_inserts: usize,
    pub profile_updates: usize,
    pub task_lists: usize,
    pub task_inserts: usize,
    pub task_updates: usize,
    pub task_deletes: usize,
}

impl BackendCalls {
    /// Calls that touched the `tasks` table.
    pub fn task_calls(&self) -> usize {
        self.task_lists + self.task_inserts + self.task_updates + self.task_deletes
    }
}

struct Account {
    identity: Identity,
    password: String,
    confirmed: bool,
}

struct StoredTask {
    seq: u64,
    task: Task,
}

#[derive(Default)]
struct State {
    accounts: Vec<Account>,
    session: Option<Session>,
    profiles: HashMap<UserId, Profile>,
    tasks: Vec<StoredTask>,
    next_seq: u64,
    calls: BackendCalls,
    require_confirmation: bool,
    fail_profile_reads: bool,
    fail_task_writes: Option<String>,
    fail_remote_sign_out: bool,
    session_lifetime: Option<Duration>,
    refuse_refresh: bool,
}

/// Hosted backend emulation implementing every port.
pub struct InMemoryBackend {
    state: Mutex<State>,
    events: SessionBroadcaster,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new(Arc::new(DefaultClock))
    }
}

impl InMemoryBackend {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            events: SessionBroadcaster::new(),
            clock,
        }
    }

    /// Create a confirmed account without a profile row.
    pub fn register_account(&self, email: &str, password: &str) -> Identity {
        let identity = new_identity(email);
        self.lock().accounts.push(Account {
            identity: identity.clone(),
            password: password.to_owned(),
            confirmed: true,
        });
        identity
    }

    /// Pretend a session for `identity` survived from an earlier run.
    pub fn restore_session(&self, identity: &Identity) {
        let mut state = self.lock();
        let expires_at = self.expiry_for(&state);
        state.session = Some(issue_session(identity.clone(), expires_at));
    }

    /// Store a profile row directly, bypassing row-level checks.
    pub fn seed_profile(&self, id: &UserId, email: &str, full_name: &str, bio: Option<&str>) {
        let now = self.clock.utc();
        self.lock().profiles.insert(
            id.clone(),
            Profile {
                id: id.clone(),
                email: email.to_owned(),
                full_name: full_name.to_owned(),
                bio: bio.map(str::to_owned),
                created_at: now,
                updated_at: now,
            },
        );
    }

    /// Store a task row directly, bypassing row-level checks.
    pub fn seed_task(&self, owner: &UserId, title: &str) -> TaskId {
        let now = self.clock.utc();
        let mut state = self.lock();
        let title = TaskTitle::new(title)
            .unwrap_or_else(|err| panic!("seeded task title must be valid: {err}"));
        let draft = TaskDraft::titled(title);
        let task = materialise(&draft.owned_by(owner.clone()), now);
        let id = task.id;
        push_task(&mut state, task);
        id
    }

    /// Answer sign-ups without a session until the email is confirmed.
    pub fn require_email_confirmation(&self, required: bool) {
        self.lock().require_confirmation = required;
    }

    /// Make profile lookups fail with a connection error.
    pub fn fail_profile_reads(&self, fail: bool) {
        self.lock().fail_profile_reads = fail;
    }

    /// Make task inserts, updates and deletes fail with `message`.
    pub fn fail_task_writes(&self, message: Option<&str>) {
        self.lock().fail_task_writes = message.map(str::to_owned);
    }

    /// Make the remote half of sign-out fail.
    pub fn fail_remote_sign_out(&self, fail: bool) {
        self.lock().fail_remote_sign_out = fail;
    }

    /// Give sessions issued from now on an access token valid for
    /// `lifetime`. Row requests made with an expired token are refused.
    pub fn expire_sessions_after(&self, lifetime: Duration) {
        self.lock().session_lifetime = Some(lifetime);
    }

    /// Refuse refresh tokens, ending the session on the next refresh.
    pub fn refuse_refresh(&self, refuse: bool) {
        self.lock().refuse_refresh = refuse;
    }

    /// Simulate a background token refresh.
    pub fn publish_token_refresh(&self) {
        let session = {
            let mut state = self.lock();
            let expires_at = self.expiry_for(&state);
            let refreshed = state
                .session
                .as_ref()
                .map(|session| issue_session(session.identity.clone(), expires_at));
            state.session.clone_from(&refreshed);
            refreshed
        };
        self.events
            .publish(SessionChange::new(SessionEvent::TokenRefreshed, session));
    }

    pub fn calls(&self) -> BackendCalls {
        self.lock().calls
    }

    pub fn profile_of(&self, id: &UserId) -> Option<Profile> {
        self.lock().profiles.get(id).cloned()
    }

    /// Every stored task regardless of owner.
    pub fn stored_tasks(&self) -> Vec<Task> {
        self.lock().tasks.iter().map(|stored| stored.task.clone()).collect()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("in-memory backend mutex"),
        }
    }

    fn expiry_for(&self, state: &State) -> Option<DateTime<Utc>> {
        state.session_lifetime.map(|lifetime| self.clock.utc() + lifetime)
    }

    fn token_expired(&self, state: &State) -> bool {
        state
            .session
            .as_ref()
            .is_some_and(|session| session.is_expired_at(self.clock.utc()))
    }

    fn adopt(&self, event: SessionEvent, session: Option<Session>) {
        self.lock().session.clone_from(&session);
        self.events.publish(SessionChange::new(event, session));
    }
}

fn new_identity(email: &str) -> Identity {
    let email = EmailAddress::new(email)
        .unwrap_or_else(|err| panic!("test account email must be valid: {err}"));
    Identity::new(UserId::random(), email)
}

fn issue_session(identity: Identity, expires_at: Option<DateTime<Utc>>) -> Session {
    let token = |kind: &str| {
        SessionToken::new(format!("{kind}-{}", Uuid::new_v4()))
            .unwrap_or_else(|err| panic!("generated token must be valid: {err}"))
    };
    Session {
        identity,
        access_token: token("access"),
        refresh_token: Some(token("refresh")),
        expires_at,
    }
}

fn materialise(new_task: &NewTask, now: DateTime<Utc>) -> Task {
    Task {
        id: TaskId::random(),
        user_id: new_task.user_id.clone(),
        title: new_task.draft.title.as_ref().to_owned(),
        description: new_task.draft.description.clone(),
        status: new_task.draft.status,
        priority: new_task.draft.priority,
        due_date: new_task.draft.due_date,
        created_at: now,
        updated_at: now,
    }
}

fn push_task(state: &mut State, task: Task) {
    state.next_seq += 1;
    let seq = state.next_seq;
    state.tasks.push(StoredTask { seq, task });
}

fn session_user(state: &State) -> Option<UserId> {
    state
        .session
        .as_ref()
        .map(|session| session.identity.id().clone())
}

#[async_trait]
impl AuthGateway for InMemoryBackend {
    async fn sign_up(&self, credentials: &Credentials) -> Result<SignUpOutcome, AuthGatewayError> {
        let (identity, confirmed, expires_at) = {
            let mut state = self.lock();
            state.calls.sign_ups += 1;
            if state
                .accounts
                .iter()
                .any(|account| account.identity.email().as_ref() == credentials.email())
            {
                return Err(AuthGatewayError::rejected("User already registered"));
            }
            let identity = new_identity(credentials.email());
            let confirmed = !state.require_confirmation;
            state.accounts.push(Account {
                identity: identity.clone(),
                password: credentials.password().to_owned(),
                confirmed,
            });
            (identity, confirmed, self.expiry_for(&state))
        };

        if !confirmed {
            return Ok(SignUpOutcome {
                identity,
                session: None,
            });
        }
        let session = issue_session(identity.clone(), expires_at);
        self.adopt(SessionEvent::SignedIn, Some(session.clone()));
        Ok(SignUpOutcome {
            identity,
            session: Some(session),
        })
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthGatewayError> {
        let (identity, expires_at) = {
            let mut state = self.lock();
            state.calls.sign_ins += 1;
            let account = state
                .accounts
                .iter()
                .find(|account| {
                    account.identity.email().as_ref() == credentials.email()
                        && account.password == credentials.password()
                })
                .ok_or_else(|| AuthGatewayError::invalid_credentials("Invalid login credentials"))?;
            if !account.confirmed {
                return Err(AuthGatewayError::invalid_credentials("Email not confirmed"));
            }
            (account.identity.clone(), self.expiry_for(&state))
        };
        let session = issue_session(identity, expires_at);
        self.adopt(SessionEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthGatewayError> {
        let fail = {
            let mut state = self.lock();
            state.calls.sign_outs += 1;
            state.fail_remote_sign_out
        };
        self.adopt(SessionEvent::SignedOut, None);
        if fail {
            return Err(AuthGatewayError::connection("logout request failed"));
        }
        Ok(())
    }

    async fn current_session(&self) -> Result<Option<Session>, AuthGatewayError> {
        Ok(self.lock().session.clone())
    }

    async fn refresh_session(&self) -> Result<Session, AuthGatewayError> {
        let (identity, refuse, expires_at) = {
            let mut state = self.lock();
            state.calls.refreshes += 1;
            let identity = state
                .session
                .as_ref()
                .map(|session| session.identity.clone())
                .ok_or_else(|| AuthGatewayError::unauthorized("No active session to refresh"))?;
            (identity, state.refuse_refresh, self.expiry_for(&state))
        };
        if refuse {
            self.adopt(SessionEvent::SignedOut, None);
            return Err(AuthGatewayError::unauthorized(
                "Invalid Refresh Token: Already Used",
            ));
        }
        let session = issue_session(identity, expires_at);
        self.adopt(SessionEvent::TokenRefreshed, Some(session.clone()));
        Ok(session)
    }

    fn subscribe(&self) -> SessionSubscription {
        self.events.subscribe()
    }
}

#[async_trait]
impl ProfileRepository for InMemoryBackend {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<Profile>, ProfileRepositoryError> {
        let mut state = self.lock();
        state.calls.profile_lookups += 1;
        if state.fail_profile_reads {
            return Err(ProfileRepositoryError::connection("profiles unavailable"));
        }
        if self.token_expired(&state) {
            return Err(ProfileRepositoryError::unauthorized(JWT_EXPIRED));
        }
        if session_user(&state).as_ref() != Some(id) {
            return Ok(None);
        }
        Ok(state.profiles.get(id).cloned())
    }

    async fn insert(&self, profile: &NewProfile) -> Result<Profile, ProfileRepositoryError> {
        let now = self.clock.utc();
        let mut state = self.lock();
        state.calls.profile_inserts += 1;
        if session_user(&state).as_ref() != Some(&profile.id) {
            return Err(ProfileRepositoryError::unauthorized(RLS_VIOLATION));
        }
        if state.profiles.contains_key(&profile.id) {
            return Err(ProfileRepositoryError::query(
                "duplicate key value violates unique constraint \"profiles_pkey\"",
            ));
        }
        let row = Profile {
            id: profile.id.clone(),
            email: profile.email.clone(),
            full_name: profile.full_name.clone(),
            bio: profile.bio.clone(),
            created_at: now,
            updated_at: now,
        };
        state.profiles.insert(row.id.clone(), row.clone());
        Ok(row)
    }

    async fn update(
        &self,
        id: &UserId,
        changes: &ProfileChanges,
        updated_at: DateTime<Utc>,
    ) -> Result<Profile, ProfileRepositoryError> {
        let mut state = self.lock();
        state.calls.profile_updates += 1;
        if session_user(&state).as_ref() != Some(id) {
            return Err(ProfileRepositoryError::query("no profile row matched the update"));
        }
        let row = state
            .profiles
            .get_mut(id)
            .ok_or_else(|| ProfileRepositoryError::query("no profile row matched the update"))?;
        if let Some(full_name) = &changes.full_name {
            row.full_name.clone_from(full_name);
        }
        if let Some(bio) = &changes.bio {
            row.bio = Some(bio.clone());
        }
        row.updated_at = updated_at;
        Ok(row.clone())
    }
}

#[async_trait]
impl TaskRepository for InMemoryBackend {
    async fn list_newest_first(&self) -> Result<Vec<Task>, TaskRepositoryError> {
        let mut state = self.lock();
        state.calls.task_lists += 1;
        if self.token_expired(&state) {
            return Err(TaskRepositoryError::unauthorized(JWT_EXPIRED));
        }
        let Some(user) = session_user(&state) else {
            return Ok(Vec::new());
        };
        let mut visible: Vec<&StoredTask> = state
            .tasks
            .iter()
            .filter(|stored| stored.task.user_id == user)
            .collect();
        visible.sort_by(|a, b| {
            b.task
                .created_at
                .cmp(&a.task.created_at)
                .then(b.seq.cmp(&a.seq))
        });
        Ok(visible.into_iter().map(|stored| stored.task.clone()).collect())
    }

    async fn insert(&self, task: &NewTask) -> Result<Task, TaskRepositoryError> {
        let now = self.clock.utc();
        let mut state = self.lock();
        state.calls.task_inserts += 1;
        if self.token_expired(&state) {
            return Err(TaskRepositoryError::unauthorized(JWT_EXPIRED));
        }
        if let Some(message) = &state.fail_task_writes {
            return Err(TaskRepositoryError::query(message.clone()));
        }
        if session_user(&state).as_ref() != Some(&task.user_id) {
            return Err(TaskRepositoryError::unauthorized(RLS_VIOLATION));
        }
        let row = materialise(task, now);
        push_task(&mut state, row.clone());
        Ok(row)
    }

    async fn update(&self, id: &TaskId, changes: &TaskChanges) -> Result<Task, TaskRepositoryError> {
        let now = self.clock.utc();
        let mut state = self.lock();
        state.calls.task_updates += 1;
        if self.token_expired(&state) {
            return Err(TaskRepositoryError::unauthorized(JWT_EXPIRED));
        }
        if let Some(message) = &state.fail_task_writes {
            return Err(TaskRepositoryError::query(message.clone()));
        }
        let user = session_user(&state);
        let stored = state
            .tasks
            .iter_mut()
            .find(|stored| stored.task.id == *id && Some(&stored.task.user_id) == user.as_ref())
            .ok_or_else(|| TaskRepositoryError::not_found("Task not found"))?;
        changes.apply_to(&mut stored.task);
        stored.task.updated_at = now;
        Ok(stored.task.clone())
    }

    async fn delete(&self, id: &TaskId) -> Result<(), TaskRepositoryError> {
        let mut state = self.lock();
        state.calls.task_deletes += 1;
        if self.token_expired(&state) {
            return Err(TaskRepositoryError::unauthorized(JWT_EXPIRED));
        }
        if let Some(message) = &state.fail_task_writes {
            return Err(TaskRepositoryError::query(message.clone()));
        }
        let user = session_user(&state);
        state
            .tasks
            .retain(|stored| !(stored.task.id == *id && Some(&stored.task.user_id) == user.as_ref()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for the emulated row-level visibility.
    use super::*;
    use crate::test_support::MutableClock;
    use rstest::rstest;

    fn credentials(email: &str) -> Credentials {
        Credentials::try_from_parts(email, "secret1").expect("credentials")
    }

    #[rstest]
    #[tokio::test]
    async fn tasks_are_scoped_to_the_session_user() {
        let backend = InMemoryBackend::default();
        let ada = backend.register_account("ada@example.com", "secret1");
        let bob = backend.register_account("bob@example.com", "secret1");
        backend.seed_task(ada.id(), "Ada's task");
        backend.seed_task(bob.id(), "Bob's task");

        backend.sign_in(&credentials("ada@example.com")).await.expect("sign in");
        let visible = backend.list_newest_first().await.expect("list");

        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].title, "Ada's task");
    }

    #[rstest]
    #[tokio::test]
    async fn inserting_for_another_user_violates_policy() {
        let backend = InMemoryBackend::default();
        backend.register_account("ada@example.com", "secret1");
        let bob = backend.register_account("bob@example.com", "secret1");
        backend.sign_in(&credentials("ada@example.com")).await.expect("sign in");

        let row = NewProfile::default_for(&bob);
        let err = ProfileRepository::insert(&backend, &row).await.expect_err("rls");
        assert_eq!(err, ProfileRepositoryError::unauthorized(RLS_VIOLATION));
    }

    #[rstest]
    #[tokio::test]
    async fn expired_tokens_are_refused_until_refreshed() {
        let clock = Arc::new(MutableClock::new(Utc::now()));
        let backend = InMemoryBackend::new(clock.clone());
        backend.expire_sessions_after(Duration::seconds(60));
        backend.register_account("ada@example.com", "secret1");
        backend.sign_in(&credentials("ada@example.com")).await.expect("sign in");

        clock.advance_seconds(61);
        let err = backend.list_newest_first().await.expect_err("expired");
        assert_eq!(err, TaskRepositoryError::unauthorized(JWT_EXPIRED));

        backend.refresh_session().await.expect("refresh");
        assert!(backend.list_newest_first().await.is_ok());
        assert_eq!(backend.calls().refreshes, 1);
    }

    #[rstest]
    #[tokio::test]
    async fn duplicate_sign_up_is_rejected() {
        let backend = InMemoryBackend::default();
        backend.register_account("ada@example.com", "secret1");
        let err = backend
            .sign_up(&credentials("ada@example.com"))
            .await
            .expect_err("duplicate");
        assert_eq!(err, AuthGatewayError::rejected("User already registered"));
    }
}
