//! Tests for task list reconciliation.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rstest::{fixture, rstest};

use super::*;
use crate::domain::ports::{MockTaskRepository, TaskRepositoryError};
use crate::domain::{ErrorCode, TaskPriority, TaskStatus, TaskTitle, UserId};

const USER_ID: &str = "7d444840-9dc0-11d1-b245-5ffdce74fad2";

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 1, 8, 0, 0)
        .single()
        .expect("valid fixture timestamp")
}

#[fixture]
fn identity() -> Identity {
    Identity::try_from_strings(USER_ID, "ada@example.com").expect("identity")
}

fn task(title: &str, minutes: i64) -> Task {
    let stamp = base_time() + Duration::minutes(minutes);
    Task {
        id: TaskId::random(),
        user_id: UserId::new(USER_ID).expect("user id"),
        title: title.to_owned(),
        description: None,
        status: TaskStatus::Pending,
        priority: TaskPriority::Medium,
        due_date: None,
        created_at: stamp,
        updated_at: stamp,
    }
}

/// Three rows, newest first, as the backend returns them.
#[fixture]
fn rows() -> Vec<Task> {
    vec![task("third", 3), task("second", 2), task("first", 1)]
}

fn repo_listing(rows: Vec<Task>) -> MockTaskRepository {
    let mut repo = MockTaskRepository::new();
    repo.expect_list_newest_first()
        .times(1)
        .returning(move || Ok(rows.clone()));
    repo
}

async fn loaded_store(repo: MockTaskRepository, identity: &Identity) -> TaskStore<MockTaskRepository> {
    let mut store = TaskStore::new(Arc::new(repo));
    store.follow_identity(Some(identity)).await;
    store
}

fn titles(store: &TaskStore<MockTaskRepository>) -> Vec<String> {
    store.tasks().iter().map(|task| task.title.clone()).collect()
}

#[rstest]
#[tokio::test]
async fn following_an_identity_loads_newest_first(identity: Identity, rows: Vec<Task>) {
    let store = loaded_store(repo_listing(rows), &identity).await;

    assert_eq!(titles(&store), vec!["third", "second", "first"]);
    assert!(!store.is_loading());
    assert!(store.error().is_none());
}

#[rstest]
#[tokio::test]
async fn same_identity_does_not_reload(identity: Identity, rows: Vec<Task>) {
    let mut store = loaded_store(repo_listing(rows), &identity).await;
    store.follow_identity(Some(&identity)).await;
    assert_eq!(store.tasks().len(), 3);
}

#[rstest]
#[tokio::test]
async fn signing_out_clears_the_list(identity: Identity, rows: Vec<Task>) {
    let mut store = loaded_store(repo_listing(rows), &identity).await;
    store.follow_identity(None).await;

    assert!(store.tasks().is_empty());
    assert!(store.owner().is_none());
}

#[rstest]
#[tokio::test]
async fn load_failure_records_message_and_keeps_list(identity: Identity, rows: Vec<Task>) {
    let mut repo = MockTaskRepository::new();
    let mut calls = 0;
    repo.expect_list_newest_first().times(3).returning(move || {
        calls += 1;
        match calls {
            2 => Err(TaskRepositoryError::query("permission denied for table tasks")),
            _ => Ok(rows.clone()),
        }
    });

    let mut store = loaded_store(repo, &identity).await;
    store.refresh_tasks().await;
    assert_eq!(store.error(), Some("permission denied for table tasks"));
    assert_eq!(store.tasks().len(), 3);

    store.refresh_tasks().await;
    assert!(store.error().is_none());
}

#[rstest]
#[tokio::test]
async fn create_without_identity_makes_no_call() {
    let mut repo = MockTaskRepository::new();
    repo.expect_insert().times(0);
    let mut store = TaskStore::new(Arc::new(repo));

    let draft = TaskDraft::titled(TaskTitle::new("abc").expect("title"));
    let err = store.create_task(draft).await.expect_err("no identity");

    assert_eq!(err.code(), ErrorCode::Unauthorized);
    assert!(store.tasks().is_empty());
}

#[rstest]
#[tokio::test]
async fn created_task_is_prepended_once(identity: Identity, rows: Vec<Task>) {
    let mut repo = repo_listing(rows);
    repo.expect_insert()
        .withf(|new_task| {
            new_task.user_id.as_ref() == USER_ID
                && new_task.draft.status == TaskStatus::Pending
                && new_task.draft.priority == TaskPriority::Medium
        })
        .times(1)
        .returning(|new_task| {
            let mut stored = task(new_task.draft.title.as_ref(), 10);
            stored.user_id = new_task.user_id.clone();
            Ok(stored)
        });

    let mut store = loaded_store(repo, &identity).await;
    let draft = TaskDraft::titled(TaskTitle::new("fourth").expect("title"));
    let created = store.create_task(draft).await.expect("create");

    assert_eq!(titles(&store), vec!["fourth", "third", "second", "first"]);
    let occurrences = store.tasks().iter().filter(|task| task.id == created.id).count();
    assert_eq!(occurrences, 1);
}

#[rstest]
#[tokio::test]
async fn update_replaces_only_the_matching_entry(identity: Identity, rows: Vec<Task>) {
    let target = rows[1].clone();
    let mut repo = repo_listing(rows);
    repo.expect_update().times(1).returning(move |_, changes| {
        let mut stored = target.clone();
        changes.apply_to(&mut stored);
        Ok(stored)
    });

    let mut store = loaded_store(repo, &identity).await;
    let before: Vec<Arc<Task>> = store.tasks().to_vec();
    let id = before[1].id;

    let changes = TaskChanges {
        status: Some(TaskStatus::Completed),
        ..TaskChanges::default()
    };
    store.update_task(&id, changes).await.expect("update");

    let after = store.tasks();
    assert_eq!(after.len(), 3);
    assert!(Arc::ptr_eq(&before[0], &after[0]));
    assert!(Arc::ptr_eq(&before[2], &after[2]));
    assert!(!Arc::ptr_eq(&before[1], &after[1]));
    assert_eq!(after[1].status, TaskStatus::Completed);
    assert_eq!(after[1].title, "second");
}

#[rstest]
#[tokio::test]
async fn update_of_unknown_id_leaves_list_unchanged(identity: Identity, rows: Vec<Task>) {
    let stray = task("elsewhere", 99);
    let stray_id = stray.id;
    let mut repo = repo_listing(rows);
    repo.expect_update()
        .returning(move |_, _| Ok(stray.clone()));

    let mut store = loaded_store(repo, &identity).await;
    let before: Vec<Arc<Task>> = store.tasks().to_vec();
    store
        .update_task(&stray_id, TaskChanges::default())
        .await
        .expect("update");

    assert_eq!(store.tasks().len(), before.len());
    assert!(before.iter().zip(store.tasks()).all(|(a, b)| Arc::ptr_eq(a, b)));
}

#[rstest]
#[tokio::test]
async fn delete_removes_exactly_one_entry(identity: Identity, rows: Vec<Task>) {
    let mut repo = repo_listing(rows);
    repo.expect_delete().times(1).returning(|_| Ok(()));

    let mut store = loaded_store(repo, &identity).await;
    let id = store.tasks()[0].id;
    store.delete_task(&id).await.expect("delete");

    assert_eq!(store.tasks().len(), 2);
    assert!(store.find(&id).is_none());
}

#[rstest]
#[tokio::test]
async fn empty_changes_skip_the_repository(identity: Identity, rows: Vec<Task>) {
    let mut repo = repo_listing(rows);
    repo.expect_update().times(0);

    let mut store = loaded_store(repo, &identity).await;
    let listed = Arc::clone(&store.tasks()[1]);
    let returned = store
        .update_task(&listed.id, TaskChanges::default())
        .await
        .expect("nothing to send");

    assert!(Arc::ptr_eq(&listed, &returned));
    let missing = store
        .update_task(&TaskId::random(), TaskChanges::default())
        .await
        .expect_err("unknown id");
    assert_eq!(missing.code(), ErrorCode::NotFound);
}

#[rstest]
#[tokio::test]
async fn failed_delete_keeps_the_entry(identity: Identity, rows: Vec<Task>) {
    let mut repo = repo_listing(rows);
    repo.expect_delete()
        .returning(|_| Err(TaskRepositoryError::connection("timed out")));

    let mut store = loaded_store(repo, &identity).await;
    let id = store.tasks()[0].id;
    let err = store.delete_task(&id).await.expect_err("delete fails");

    assert_eq!(err.code(), ErrorCode::ServiceUnavailable);
    assert_eq!(store.tasks().len(), 3);
}

#[rstest]
#[tokio::test]
async fn prefix_lookup_matches_leading_hex(identity: Identity, rows: Vec<Task>) {
    let store = loaded_store(repo_listing(rows), &identity).await;
    let id = store.tasks()[2].id;
    let short = id.short();

    let found = store.find_by_prefix(&short.to_uppercase());
    assert!(found.iter().any(|task| task.id == id));
    assert!(store.find_by_prefix("").is_empty());
}
