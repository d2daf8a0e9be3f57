//! Outbound ports implemented by backend adapters.

mod macros;
pub(crate) use macros::define_port_error;

mod auth_gateway;
mod profile_repository;
mod task_repository;

#[cfg(test)]
pub use auth_gateway::MockAuthGateway;
pub use auth_gateway::{AuthGateway, AuthGatewayError, SignUpOutcome};
#[cfg(test)]
pub use profile_repository::MockProfileRepository;
pub use profile_repository::{ProfileRepository, ProfileRepositoryError};
#[cfg(test)]
pub use task_repository::MockTaskRepository;
pub use task_repository::{TaskRepository, TaskRepositoryError};
