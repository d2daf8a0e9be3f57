//! Domain types, ports and stores.
//!
//! Purpose: hold the client's state and rules independently of any backend
//! or terminal. Adapters implement the traits in [`ports`]; the view layer
//! drives the stores through [`AppContext`].
//!
//! Public surface:
//! - Error / ErrorCode: transport-agnostic failure reported by stores.
//! - Identity, Session, Credentials: authentication primitives.
//! - Profile, Task and their insert/update payloads.
//! - TaskFilter: client-side list filtering.
//! - SessionStore, TaskStore, AppContext: owned application state.

pub mod app_context;
pub mod auth;
pub mod error;
pub mod identity;
pub mod ports;
pub mod profile;
pub mod session_events;
pub mod session_store;
mod store_support;
pub mod task;
pub mod task_filter;
pub mod task_store;

pub use self::app_context::AppContext;
pub use self::auth::{Credentials, CredentialsValidationError, PASSWORD_MIN};
pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::identity::{
    EmailAddress, Identity, IdentityValidationError, Session, SessionToken, UserId,
};
pub use self::profile::{NewProfile, Profile, ProfileChanges};
pub use self::session_events::{
    SessionBroadcaster, SessionChange, SessionEvent, SessionSubscription,
};
pub use self::session_store::{SessionStore, SignUpStatus};
pub use self::task::{
    NewTask, TASK_TITLE_MIN, Task, TaskChanges, TaskDraft, TaskId, TaskPriority, TaskStatus,
    TaskTitle, TaskValidationError,
};
pub use self::task_filter::{TaskFilter, parse_priority_selection, parse_status_selection};
pub use self::task_store::TaskStore;

