//! Shared world for the behaviour suites.
//!
//! Steps run synchronously, so the world owns a Tokio runtime and blocks on
//! each store call. State lives in `RefCell`s because step functions only
//! receive `&TaskboardWorld`.

use std::cell::{RefCell, RefMut};
use std::future::Future;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use taskboard::domain::{AppContext, Error, Identity, SignUpStatus, Task, TaskFilter};
use taskboard::test_support::{InMemoryBackend, MutableClock};
use rstest_bdd_macros::{then, when};
use tokio::runtime::Runtime;

pub const PASSWORD: &str = "secret1";

pub type Ctx = AppContext<InMemoryBackend, InMemoryBackend, InMemoryBackend>;

pub struct TaskboardWorld {
    runtime: Runtime,
    pub clock: Arc<MutableClock>,
    pub backend: Arc<InMemoryBackend>,
    ctx: RefCell<Option<Ctx>>,
    pub account: RefCell<Option<Identity>>,
    pub last_error: RefCell<Option<Error>>,
    pub sign_up_status: RefCell<Option<SignUpStatus>>,
    pub snapshot: RefCell<Vec<Arc<Task>>>,
    pub filter: RefCell<TaskFilter>,
}

impl TaskboardWorld {
    pub fn new() -> Self {
        let start = Utc
            .with_ymd_and_hms(2026, 3, 1, 9, 0, 0)
            .single()
            .expect("valid start time");
        let clock = Arc::new(MutableClock::new(start));
        let backend = Arc::new(InMemoryBackend::new(clock.clone()));
        Self {
            runtime: Runtime::new().expect("create runtime"),
            clock,
            backend,
            ctx: RefCell::new(None),
            account: RefCell::new(None),
            last_error: RefCell::new(None),
            sign_up_status: RefCell::new(None),
            snapshot: RefCell::new(Vec::new()),
            filter: RefCell::new(TaskFilter::default()),
        }
    }

    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// The started application context, created on first use.
    pub fn ctx(&self) -> RefMut<'_, Ctx> {
        let mut slot = self.ctx.borrow_mut();
        if slot.is_none() {
            let mut ctx = AppContext::new(
                self.backend.clone(),
                self.backend.clone(),
                self.backend.clone(),
                self.clock.clone(),
            );
            self.block_on(ctx.start());
            *slot = Some(ctx);
        }
        RefMut::map(slot, |slot| slot.as_mut().expect("context initialised"))
    }

    pub fn sync(&self) {
        let mut ctx = self.ctx();
        self.block_on(ctx.sync());
    }

    pub fn record<T>(&self, result: Result<T, Error>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                *self.last_error.borrow_mut() = Some(err);
                None
            }
        }
    }

    pub fn account(&self) -> Identity {
        self.account.borrow().clone().expect("account registered")
    }

    pub fn titles(&self) -> Vec<String> {
        self.ctx()
            .tasks()
            .tasks()
            .iter()
            .map(|task| task.title.clone())
            .collect()
    }

    pub fn find_task(&self, title: &str) -> Arc<Task> {
        self.ctx()
            .tasks()
            .tasks()
            .iter()
            .find(|task| task.title == title)
            .cloned()
            .unwrap_or_else(|| panic!("no task titled {title}"))
    }
}

impl Drop for TaskboardWorld {
    fn drop(&mut self) {
        if let Some(ctx) = self.ctx.get_mut().as_mut() {
            ctx.shutdown();
        }
    }
}

/// Split a comma-separated step argument.
pub fn list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_owned())
        .filter(|item| !item.is_empty())
        .collect()
}

#[when("the application starts")]
fn the_application_starts(world: &TaskboardWorld) {
    drop(world.ctx());
}

#[then("the last operation failed with {message}")]
fn the_last_operation_failed_with(world: &TaskboardWorld, message: String) {
    let error = world.last_error.borrow();
    let error = error.as_ref().expect("an operation failed");
    assert_eq!(error.message(), message);
}

#[then("the task list reads {titles}")]
fn the_task_list_reads(world: &TaskboardWorld, titles: String) {
    assert_eq!(world.titles(), list(&titles));
}
