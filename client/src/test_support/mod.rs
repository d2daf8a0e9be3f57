//! Test doubles shared by unit and integration tests.
//!
//! Compiled for `cfg(test)` and behind the `test-support` feature.

mod clock;
mod in_memory;

pub use clock::MutableClock;
pub use in_memory::{BackendCalls, InMemoryBackend};
