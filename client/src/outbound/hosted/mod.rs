//! Reqwest adapter for the hosted auth and row storage service.
//!
//! One [`HostedBackend`] implements all three ports. It keeps the current
//! session in memory, attaches its access token to row requests, and
//! broadcasts every session transition.

mod auth;
mod dto;
mod http;
mod rows;

use std::time::Duration;

use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::{Session, SessionBroadcaster};

use self::http::{FailureKind, HttpFailure, map_status_error, map_transport_error};

const AUTH_PREFIX: &str = "auth/v1/";
const REST_PREFIX: &str = "rest/v1/";

/// Errors raised while constructing the adapter.
#[derive(Debug, thiserror::Error)]
pub enum HostedBackendError {
    /// The anon key cannot be sent as a header value.
    #[error("anon key is not a valid header value")]
    InvalidAnonKey,
    /// The base URL cannot serve as a base for relative paths.
    #[error("backend url {url} cannot be used as a base url")]
    InvalidBaseUrl { url: String },
    /// The HTTP client could not be built.
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Adapter for the hosted backend's auth (`/auth/v1`) and rows (`/rest/v1`)
/// APIs.
pub struct HostedBackend {
    client: Client,
    base_url: Url,
    anon_key: String,
    session: RwLock<Option<Session>>,
    events: SessionBroadcaster,
}

impl HostedBackend {
    /// Build an adapter with an explicit request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the base URL cannot carry relative paths, the
    /// anon key is not a valid header, or the client cannot be constructed.
    pub fn new(
        base_url: Url,
        anon_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, HostedBackendError> {
        let anon_key = anon_key.into();
        let mut headers = HeaderMap::new();
        let key_header =
            HeaderValue::from_str(&anon_key).map_err(|_| HostedBackendError::InvalidAnonKey)?;
        headers.insert("apikey", key_header);
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: normalise_base(base_url)?,
            anon_key,
            session: RwLock::new(None),
            events: SessionBroadcaster::new(),
        })
    }

    fn endpoint(&self, prefix: &str, path: &str) -> Result<Url, HttpFailure> {
        self.base_url
            .join(prefix)
            .and_then(|url| url.join(path))
            .map_err(|err| {
                HttpFailure::new(FailureKind::Rejected, format!("invalid endpoint {path}: {err}"))
            })
    }

    /// Bearer value for row requests: the session's access token, or the
    /// anon key when signed out. An expired access token is refreshed first.
    async fn bearer(&self) -> Result<String, HttpFailure> {
        {
            let guard = self.session.read().await;
            match guard.as_ref() {
                None => return Ok(self.anon_key.clone()),
                Some(session) if !session.is_expired_at(Utc::now()) => {
                    return Ok(session.access_token.expose().to_owned());
                }
                Some(_) => {}
            }
        }
        debug!("access token expired; refreshing before row request");
        let session = self.renew_session().await?;
        Ok(session.access_token.expose().to_owned())
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        debug!(%method, path = url.path(), "hosted backend request");
        self.client.request(method, url)
    }

    /// Send a request and return the body of a successful response.
    async fn send(&self, request: RequestBuilder) -> Result<Vec<u8>, HttpFailure> {
        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }
        Ok(body.to_vec())
    }

    /// Send a request and decode its JSON body.
    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, HttpFailure> {
        let body = self.send(request).await?;
        serde_json::from_slice(&body)
            .map_err(|err| HttpFailure::decode(format!("invalid JSON payload: {err}")))
    }
}

/// Make sure relative joins append to the base path instead of replacing its
/// last segment.
fn normalise_base(mut base_url: Url) -> Result<Url, HostedBackendError> {
    if base_url.cannot_be_a_base() {
        return Err(HostedBackendError::InvalidBaseUrl {
            url: base_url.to_string(),
        });
    }
    if !base_url.path().ends_with('/') {
        let path = format!("{}/", base_url.path());
        base_url.set_path(&path);
    }
    Ok(base_url)
}
