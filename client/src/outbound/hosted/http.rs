//! Transport error mapping shared by the auth and row adapters.

use reqwest::StatusCode;
use serde::Deserialize;

use crate::domain::ports::{AuthGatewayError, ProfileRepositoryError, TaskRepositoryError};

const PREVIEW_CHAR_LIMIT: usize = 160;

/// Failure category derived from a transport error or HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum FailureKind {
    Unauthorized,
    NotFound,
    Timeout,
    Rejected,
    Connection,
    Decode,
}

/// Port-neutral HTTP failure, converted into each port's error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct HttpFailure {
    pub(super) kind: FailureKind,
    pub(super) message: String,
}

impl HttpFailure {
    pub(super) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub(super) fn decode(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Decode, message)
    }
}

pub(super) fn map_transport_error(error: reqwest::Error) -> HttpFailure {
    if error.is_timeout() {
        HttpFailure::new(FailureKind::Timeout, error.to_string())
    } else if error.is_decode() {
        HttpFailure::decode(error.to_string())
    } else {
        HttpFailure::new(FailureKind::Connection, error.to_string())
    }
}

pub(super) fn map_status_error(status: StatusCode, body: &[u8]) -> HttpFailure {
    let message = error_message(body).unwrap_or_else(|| {
        let preview = body_preview(body);
        if preview.is_empty() {
            format!("status {}", status.as_u16())
        } else {
            format!("status {}: {preview}", status.as_u16())
        }
    });

    let kind = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FailureKind::Unauthorized,
        StatusCode::NOT_FOUND => FailureKind::NotFound,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => FailureKind::Timeout,
        _ if status.is_client_error() => FailureKind::Rejected,
        _ => FailureKind::Connection,
    };
    HttpFailure::new(kind, message)
}

/// Error bodies from the auth and row services use different field names.
#[derive(Debug, Deserialize)]
struct ErrorBodyDto {
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

/// Human-readable message from a JSON error body, if there is one.
fn error_message(body: &[u8]) -> Option<String> {
    let parsed: ErrorBodyDto = serde_json::from_slice(body).ok()?;
    [
        parsed.error_description,
        parsed.msg,
        parsed.message,
        parsed.error,
    ]
    .into_iter()
    .flatten()
    .find(|text| !text.trim().is_empty())
}

pub(super) fn body_preview(body: &[u8]) -> String {
    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}

impl From<HttpFailure> for AuthGatewayError {
    fn from(failure: HttpFailure) -> Self {
        let HttpFailure { kind, message } = failure;
        match kind {
            FailureKind::Unauthorized | FailureKind::NotFound => Self::unauthorized(message),
            FailureKind::Timeout => Self::timeout(message),
            FailureKind::Rejected => Self::rejected(message),
            FailureKind::Connection => Self::connection(message),
            FailureKind::Decode => Self::decode(message),
        }
    }
}

impl From<HttpFailure> for ProfileRepositoryError {
    fn from(failure: HttpFailure) -> Self {
        let HttpFailure { kind, message } = failure;
        match kind {
            FailureKind::Unauthorized => Self::unauthorized(message),
            FailureKind::NotFound | FailureKind::Rejected => Self::query(message),
            FailureKind::Timeout | FailureKind::Connection => Self::connection(message),
            FailureKind::Decode => Self::decode(message),
        }
    }
}

impl From<HttpFailure> for TaskRepositoryError {
    fn from(failure: HttpFailure) -> Self {
        let HttpFailure { kind, message } = failure;
        match kind {
            FailureKind::Unauthorized => Self::unauthorized(message),
            FailureKind::NotFound => Self::not_found(message),
            FailureKind::Rejected => Self::query(message),
            FailureKind::Timeout | FailureKind::Connection => Self::connection(message),
            FailureKind::Decode => Self::decode(message),
        }
    }
}
