//! Mapping from port errors to the transport-agnostic [`Error`].
//!
//! Backend messages are kept verbatim because the view layer shows them to
//! the user. Each mapper takes the fallback shown when the adapter produced
//! no readable text.

use crate::domain::Error;
use crate::domain::ErrorCode;
use crate::domain::ports::{AuthGatewayError, ProfileRepositoryError, TaskRepositoryError};

pub(crate) fn map_auth_error(error: AuthGatewayError, fallback: &str) -> Error {
    let code = match &error {
        AuthGatewayError::InvalidCredentials { .. } | AuthGatewayError::Unauthorized { .. } => {
            ErrorCode::Unauthorized
        }
        AuthGatewayError::Rejected { .. } => ErrorCode::InvalidRequest,
        AuthGatewayError::Timeout { .. } | AuthGatewayError::Connection { .. } => {
            ErrorCode::ServiceUnavailable
        }
        AuthGatewayError::Decode { .. } => ErrorCode::InternalError,
    };
    Error::from_message_or(code, error.to_string(), fallback)
}

pub(crate) fn map_profile_error(error: ProfileRepositoryError, fallback: &str) -> Error {
    let code = match &error {
        ProfileRepositoryError::Connection { .. } => ErrorCode::ServiceUnavailable,
        ProfileRepositoryError::Query { .. } => ErrorCode::InvalidRequest,
        ProfileRepositoryError::Unauthorized { .. } => ErrorCode::Unauthorized,
        ProfileRepositoryError::Decode { .. } => ErrorCode::InternalError,
    };
    Error::from_message_or(code, error.to_string(), fallback)
}

pub(crate) fn map_task_error(error: TaskRepositoryError, fallback: &str) -> Error {
    let code = match &error {
        TaskRepositoryError::Connection { .. } => ErrorCode::ServiceUnavailable,
        TaskRepositoryError::Query { .. } => ErrorCode::InvalidRequest,
        TaskRepositoryError::Unauthorized { .. } => ErrorCode::Unauthorized,
        TaskRepositoryError::NotFound { .. } => ErrorCode::NotFound,
        TaskRepositoryError::Decode { .. } => ErrorCode::InternalError,
    };
    Error::from_message_or(code, error.to_string(), fallback)
}
