//! Tests for the session store bootstrap and profile provisioning.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Local, TimeZone, Utc};
use mockable::Clock;
use rstest::{fixture, rstest};

use super::*;
use crate::domain::ports::{
    AuthGatewayError, MockAuthGateway, MockProfileRepository, ProfileRepositoryError,
    SignUpOutcome,
};
use crate::domain::{ErrorCode, SessionBroadcaster, SessionToken, UserId};

const USER_ID: &str = "7d444840-9dc0-11d1-b245-5ffdce74fad2";
const EMAIL: &str = "ada@example.com";

fn fixture_timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 1, 9, 30, 0)
        .single()
        .expect("valid fixture timestamp")
}

struct FixtureClock {
    utc_now: DateTime<Utc>,
}

impl Clock for FixtureClock {
    fn local(&self) -> DateTime<Local> {
        self.utc_now.with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.utc_now
    }
}

fn fixture_clock() -> Arc<dyn Clock> {
    Arc::new(FixtureClock {
        utc_now: fixture_timestamp(),
    })
}

#[fixture]
fn identity() -> Identity {
    Identity::try_from_strings(USER_ID, EMAIL).expect("identity")
}

#[fixture]
fn session(identity: Identity) -> Session {
    Session {
        identity,
        access_token: SessionToken::new("access").expect("token"),
        refresh_token: Some(SessionToken::new("refresh").expect("token")),
        expires_at: None,
    }
}

fn stored_profile(full_name: &str, bio: Option<&str>) -> Profile {
    Profile {
        id: UserId::new(USER_ID).expect("user id"),
        email: EMAIL.to_owned(),
        full_name: full_name.to_owned(),
        bio: bio.map(str::to_owned),
        created_at: fixture_timestamp(),
        updated_at: fixture_timestamp(),
    }
}

fn profile_from(row: &NewProfile) -> Profile {
    Profile {
        id: row.id.clone(),
        email: row.email.clone(),
        full_name: row.full_name.clone(),
        bio: row.bio.clone(),
        created_at: fixture_timestamp(),
        updated_at: fixture_timestamp(),
    }
}

/// Auth mock wired to a broadcaster the test controls.
fn auth_with(broadcaster: &SessionBroadcaster, current: Option<Session>) -> MockAuthGateway {
    let mut auth = MockAuthGateway::new();
    let subscribe_from = broadcaster.clone();
    auth.expect_subscribe()
        .returning(move || subscribe_from.subscribe());
    auth.expect_current_session()
        .returning(move || Ok(current.clone()));
    auth
}

fn build_store(
    auth: MockAuthGateway,
    profiles: MockProfileRepository,
) -> SessionStore<MockAuthGateway, MockProfileRepository> {
    SessionStore::new(Arc::new(auth), Arc::new(profiles), fixture_clock())
}

#[rstest]
#[tokio::test]
async fn start_without_session_settles_signed_out() {
    let broadcaster = SessionBroadcaster::new();
    let mut profiles = MockProfileRepository::new();
    profiles.expect_find_by_id().times(0);
    profiles.expect_insert().times(0);

    let mut store = build_store(auth_with(&broadcaster, None), profiles);
    assert!(store.is_loading());
    store.start().await;

    assert!(store.identity().is_none());
    assert!(store.profile().is_none());
    assert!(!store.is_loading());
    assert!(store.is_subscribed());
}

#[rstest]
#[tokio::test]
async fn start_adopts_existing_profile(session: Session) {
    let broadcaster = SessionBroadcaster::new();
    let mut profiles = MockProfileRepository::new();
    profiles
        .expect_find_by_id()
        .times(1)
        .returning(|_| Ok(Some(stored_profile("Ada Lovelace", Some("Analyst")))));
    profiles.expect_insert().times(0);

    let mut store = build_store(auth_with(&broadcaster, Some(session)), profiles);
    store.start().await;

    assert_eq!(store.identity().map(|id| id.email().to_string()), Some(EMAIL.to_owned()));
    assert_eq!(store.profile().map(|p| p.full_name.as_str()), Some("Ada Lovelace"));
    assert!(!store.is_loading());
}

#[rstest]
#[tokio::test]
async fn first_sign_in_provisions_exactly_one_default_profile(session: Session) {
    let broadcaster = SessionBroadcaster::new();
    let mut auth = auth_with(&broadcaster, None);
    let publisher = broadcaster.clone();
    auth.expect_sign_in().times(1).returning(move |_| {
        publisher.publish(SessionChange::new(SessionEvent::SignedIn, Some(session.clone())));
        Ok(session.clone())
    });

    let mut profiles = MockProfileRepository::new();
    profiles.expect_find_by_id().times(1).returning(|_| Ok(None));
    profiles
        .expect_insert()
        .withf(|row| row.full_name == "ada" && row.email == EMAIL && row.bio.as_deref() == Some(""))
        .times(1)
        .returning(|row| Ok(profile_from(row)));

    let mut store = build_store(auth, profiles);
    store.start().await;
    store.sign_in(EMAIL, "secret1").await.expect("sign in");

    assert_eq!(store.profile().map(|p| p.full_name.as_str()), Some("ada"));
    assert!(store.session().is_some());
}

#[rstest]
#[tokio::test]
async fn profile_lookup_failures_are_swallowed(session: Session) {
    let broadcaster = SessionBroadcaster::new();
    let mut profiles = MockProfileRepository::new();
    profiles
        .expect_find_by_id()
        .returning(|_| Err(ProfileRepositoryError::connection("refused")));
    profiles.expect_insert().times(0);

    let mut store = build_store(auth_with(&broadcaster, Some(session)), profiles);
    store.start().await;

    assert!(store.identity().is_some());
    assert!(store.profile().is_none());
    assert!(!store.is_loading());
}

#[rstest]
#[tokio::test]
async fn provisioning_failures_are_swallowed(session: Session) {
    let broadcaster = SessionBroadcaster::new();
    let mut profiles = MockProfileRepository::new();
    profiles.expect_find_by_id().returning(|_| Ok(None));
    profiles
        .expect_insert()
        .times(1)
        .returning(|_| Err(ProfileRepositoryError::query("duplicate key")));

    let mut store = build_store(auth_with(&broadcaster, Some(session)), profiles);
    store.start().await;

    assert!(store.profile().is_none());
    assert!(!store.is_loading());
}

#[rstest]
#[tokio::test]
async fn rejected_sign_in_uses_backend_message() {
    let broadcaster = SessionBroadcaster::new();
    let mut auth = auth_with(&broadcaster, None);
    auth.expect_sign_in()
        .returning(|_| Err(AuthGatewayError::invalid_credentials("Invalid login credentials")));

    let mut store = build_store(auth, MockProfileRepository::new());
    store.start().await;
    let err = store.sign_in(EMAIL, "wrong-pw").await.expect_err("rejected");

    assert_eq!(err.code(), ErrorCode::Unauthorized);
    assert_eq!(err.message(), "Invalid login credentials");
    assert!(store.identity().is_none());
}

#[rstest]
#[tokio::test]
async fn blank_credentials_never_reach_the_gateway() {
    let broadcaster = SessionBroadcaster::new();
    let mut auth = auth_with(&broadcaster, None);
    auth.expect_sign_in().times(0);

    let mut store = build_store(auth, MockProfileRepository::new());
    let err = store.sign_in("  ", "secret1").await.expect_err("invalid");
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
    assert_eq!(err.message(), "Email is required");

    let err = store.sign_in(EMAIL, "12345").await.expect_err("invalid");
    assert_eq!(err.message(), "Password must be at least 6 characters");
}

#[rstest]
#[tokio::test]
async fn sign_up_records_typed_name_without_default_provisioning(session: Session) {
    let broadcaster = SessionBroadcaster::new();
    let mut auth = auth_with(&broadcaster, None);
    let publisher = broadcaster.clone();
    auth.expect_sign_up().times(1).returning(move |_| {
        publisher.publish(SessionChange::new(SessionEvent::SignedIn, Some(session.clone())));
        Ok(SignUpOutcome {
            identity: session.identity.clone(),
            session: Some(session.clone()),
        })
    });

    let mut profiles = MockProfileRepository::new();
    profiles
        .expect_insert()
        .withf(|row| row.full_name == "Ada Lovelace" && row.bio.is_none())
        .times(1)
        .returning(|row| Ok(profile_from(row)));
    profiles
        .expect_find_by_id()
        .returning(|_| Ok(Some(stored_profile("Ada Lovelace", None))));

    let mut store = build_store(auth, profiles);
    store.start().await;
    let status = store
        .sign_up(EMAIL, "secret1", "Ada Lovelace")
        .await
        .expect("sign up");

    assert_eq!(status, SignUpStatus::SignedIn);
    assert_eq!(store.profile().map(|p| p.full_name.as_str()), Some("Ada Lovelace"));
}

#[rstest]
#[tokio::test]
async fn sign_up_survives_profile_insert_failure(identity: Identity) {
    let broadcaster = SessionBroadcaster::new();
    let mut auth = auth_with(&broadcaster, None);
    auth.expect_sign_up().returning(move |_| {
        Ok(SignUpOutcome {
            identity: identity.clone(),
            session: None,
        })
    });
    let mut profiles = MockProfileRepository::new();
    profiles
        .expect_insert()
        .times(1)
        .returning(|_| Err(ProfileRepositoryError::unauthorized("JWT required")));

    let mut store = build_store(auth, profiles);
    store.start().await;
    let status = store
        .sign_up(EMAIL, "secret1", "Ada")
        .await
        .expect("sign up still succeeds");

    assert_eq!(status, SignUpStatus::ConfirmationPending);
    assert!(store.identity().is_none());
}

#[rstest]
#[tokio::test]
async fn update_profile_requires_identity() {
    let broadcaster = SessionBroadcaster::new();
    let mut profiles = MockProfileRepository::new();
    profiles.expect_update().times(0);

    let mut store = build_store(auth_with(&broadcaster, None), profiles);
    store.start().await;
    let err = store
        .update_profile(ProfileChanges::default())
        .await
        .expect_err("no identity");

    assert_eq!(err.code(), ErrorCode::Unauthorized);
    assert_eq!(err.message(), "No user logged in");
}

#[rstest]
#[tokio::test]
async fn empty_profile_changes_send_nothing(session: Session) {
    let broadcaster = SessionBroadcaster::new();
    let mut profiles = MockProfileRepository::new();
    profiles
        .expect_find_by_id()
        .times(1)
        .returning(|_| Ok(Some(stored_profile("Ada", None))));
    profiles.expect_update().times(0);

    let mut store = build_store(auth_with(&broadcaster, Some(session)), profiles);
    store.start().await;

    store
        .update_profile(ProfileChanges::default())
        .await
        .expect("nothing to send");
}

#[rstest]
#[tokio::test]
async fn update_profile_stamps_clock_and_reloads(session: Session) {
    let broadcaster = SessionBroadcaster::new();
    let mut profiles = MockProfileRepository::new();
    let lookups = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&lookups);
    profiles.expect_find_by_id().times(2).returning(move |_| {
        let bio = (counter.fetch_add(1, Ordering::SeqCst) > 0).then_some("Poet");
        Ok(Some(stored_profile("Ada", bio)))
    });
    profiles
        .expect_update()
        .withf(|id, changes, updated_at| {
            id.as_ref() == USER_ID
                && changes.bio.as_deref() == Some("Poet")
                && *updated_at == fixture_timestamp()
        })
        .times(1)
        .returning(|_, _, _| Ok(stored_profile("Ada", Some("Poet"))));

    let mut store = build_store(auth_with(&broadcaster, Some(session)), profiles);
    store.start().await;
    store
        .update_profile(ProfileChanges {
            full_name: None,
            bio: Some("Poet".to_owned()),
        })
        .await
        .expect("update");

    assert_eq!(store.profile().and_then(|p| p.bio.as_deref()), Some("Poet"));
    assert_eq!(store.profile().map(Profile::completeness_percent), Some(100));
    assert_eq!(lookups.load(Ordering::SeqCst), 2);
}

#[rstest]
#[tokio::test]
async fn sign_out_clears_state_even_when_remote_call_fails(session: Session) {
    let broadcaster = SessionBroadcaster::new();
    let mut auth = auth_with(&broadcaster, Some(session));
    let publisher = broadcaster.clone();
    auth.expect_sign_out().times(1).returning(move || {
        publisher.publish(SessionChange::new(SessionEvent::SignedOut, None));
        Err(AuthGatewayError::connection("reset by peer"))
    });
    let mut profiles = MockProfileRepository::new();
    profiles
        .expect_find_by_id()
        .returning(|_| Ok(Some(stored_profile("Ada", None))));

    let mut store = build_store(auth, profiles);
    store.start().await;
    let err = store.sign_out().await.expect_err("remote failure reported");

    assert_eq!(err.code(), ErrorCode::ServiceUnavailable);
    assert!(store.identity().is_none());
    assert!(store.session().is_none());
    assert!(store.profile().is_none());
}

#[rstest]
#[tokio::test]
async fn external_refresh_reloads_profile(session: Session) {
    let broadcaster = SessionBroadcaster::new();
    let mut profiles = MockProfileRepository::new();
    profiles
        .expect_find_by_id()
        .times(2)
        .returning(|_| Ok(Some(stored_profile("Ada", None))));

    let mut store = build_store(auth_with(&broadcaster, Some(session.clone())), profiles);
    store.start().await;
    broadcaster.publish(SessionChange::new(SessionEvent::TokenRefreshed, Some(session)));

    assert_eq!(store.pump_events().await, 1);
    assert!(store.identity().is_some());
}

#[rstest]
#[tokio::test]
async fn shutdown_closes_the_subscription() {
    let broadcaster = SessionBroadcaster::new();
    let mut store = build_store(auth_with(&broadcaster, None), MockProfileRepository::new());
    store.start().await;
    assert_eq!(broadcaster.subscriber_count(), 1);

    store.shutdown();

    assert!(!store.is_subscribed());
    assert_eq!(broadcaster.subscriber_count(), 0);
    assert_eq!(store.pump_events().await, 0);
}

fn expired(session: Session) -> Session {
    Session {
        expires_at: Some(fixture_timestamp() - chrono::Duration::minutes(5)),
        ..session
    }
}

#[rstest]
#[tokio::test]
async fn unexpired_session_is_not_refreshed(session: Session) {
    let broadcaster = SessionBroadcaster::new();
    let live = Session {
        expires_at: Some(fixture_timestamp() + chrono::Duration::minutes(5)),
        ..session
    };
    let mut auth = auth_with(&broadcaster, Some(live));
    auth.expect_refresh_session().times(0);
    let mut profiles = MockProfileRepository::new();
    profiles
        .expect_find_by_id()
        .returning(|_| Ok(Some(stored_profile("Ada", None))));

    let mut store = build_store(auth, profiles);
    store.start().await;
    store.renew_if_expired().await;

    assert!(store.identity().is_some());
}

#[rstest]
#[tokio::test]
async fn expired_session_is_refreshed_once(session: Session) {
    let broadcaster = SessionBroadcaster::new();
    let mut auth = auth_with(&broadcaster, Some(expired(session.clone())));
    let publisher = broadcaster.clone();
    let renewed = Session {
        access_token: SessionToken::new("access-2").expect("token"),
        expires_at: Some(fixture_timestamp() + chrono::Duration::hours(1)),
        ..session
    };
    auth.expect_refresh_session().times(1).returning(move || {
        publisher.publish(SessionChange::new(
            SessionEvent::TokenRefreshed,
            Some(renewed.clone()),
        ));
        Ok(renewed.clone())
    });
    let mut profiles = MockProfileRepository::new();
    profiles
        .expect_find_by_id()
        .returning(|_| Ok(Some(stored_profile("Ada", None))));

    let mut store = build_store(auth, profiles);
    store.start().await;
    store.renew_if_expired().await;
    store.renew_if_expired().await;

    assert_eq!(
        store.session().map(|s| s.access_token.expose().to_owned()),
        Some("access-2".to_owned())
    );
}

#[rstest]
#[tokio::test]
async fn refused_refresh_signs_out(session: Session) {
    let broadcaster = SessionBroadcaster::new();
    let mut auth = auth_with(&broadcaster, Some(expired(session)));
    auth.expect_refresh_session()
        .times(1)
        .returning(|| Err(AuthGatewayError::unauthorized("Invalid Refresh Token")));
    let mut profiles = MockProfileRepository::new();
    profiles
        .expect_find_by_id()
        .returning(|_| Ok(Some(stored_profile("Ada", None))));

    let mut store = build_store(auth, profiles);
    store.start().await;
    store.renew_if_expired().await;

    assert!(store.identity().is_none());
    assert!(store.session().is_none());
    assert!(store.profile().is_none());
}

#[rstest]
#[tokio::test]
async fn unreachable_refresh_keeps_the_session(session: Session) {
    let broadcaster = SessionBroadcaster::new();
    let mut auth = auth_with(&broadcaster, Some(expired(session)));
    auth.expect_refresh_session()
        .times(1)
        .returning(|| Err(AuthGatewayError::connection("connection refused")));
    let mut profiles = MockProfileRepository::new();
    profiles
        .expect_find_by_id()
        .returning(|_| Ok(Some(stored_profile("Ada", None))));

    let mut store = build_store(auth, profiles);
    store.start().await;
    store.renew_if_expired().await;

    assert!(store.identity().is_some());
}
