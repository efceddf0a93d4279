//! The remote work-tracking API.
//!
//! Services never talk HTTP directly. They build a [`RemoteRequest`] and hand
//! it to a [`TrackerApi`]; [`HttpTrackerApi`] is the production
//! implementation, tests substitute a scripted fake.

use std::time::Duration;

use futures_util::future::BoxFuture;
use miette::Diagnostic;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::auth::Credential;
use crate::redact::redact;
use crate::retry::ErrorClass;

mod http;

#[cfg(test)]
mod http_test;

pub use http::{API_VERSION, HttpTrackerApi};

/// Fallback wait when a throttling response carries an unparseable hint.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
        }
    }
}

/// One call against the tracker, relative to the organization URL.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRequest {
    pub method: Method,
    /// Path below the organization URL, without a leading slash,
    /// e.g. `Alpha/_apis/wit/wiql`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Send the body as `application/json-patch+json`.
    pub json_patch: bool,
}

impl RemoteRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path, None)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, path, Some(body))
    }

    /// A JSON Patch request (`[{"op": "add", "path": ..., "value": ...}]`).
    pub fn patch(path: impl Into<String>, operations: Value) -> Self {
        Self {
            json_patch: true,
            ..Self::new(Method::Patch, path, Some(operations))
        }
    }

    /// JSON Patch sent with POST, as work item creation expects.
    pub fn post_patch(path: impl Into<String>, operations: Value) -> Self {
        Self {
            json_patch: true,
            ..Self::new(Method::Post, path, Some(operations))
        }
    }

    fn new(method: Method, path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body,
            json_patch: false,
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum RemoteError {
    #[error("Remote returned HTTP {status}: {message}")]
    #[diagnostic(code(sprintgate::remote::status))]
    Status {
        status: u16,
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("Connection to remote failed: {message}")]
    #[diagnostic(
        code(sprintgate::remote::connection),
        help("Check AZURE_DEVOPS_ORG_URL and network connectivity")
    )]
    Connection { message: String },

    #[error("Invalid response from remote: {message}")]
    #[diagnostic(code(sprintgate::remote::invalid_response))]
    InvalidResponse { message: String },
}

impl RemoteError {
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() || e.is_request() {
            RemoteError::Connection {
                message: redact(&e.to_string()),
            }
        } else {
            RemoteError::InvalidResponse {
                message: redact(&e.to_string()),
            }
        }
    }
}

/// Map a remote failure onto the retry taxonomy.
pub fn classify_remote_error(error: &RemoteError) -> ErrorClass {
    match error {
        RemoteError::Status {
            status,
            retry_after,
            ..
        } => match status {
            400 => ErrorClass::Validation,
            401 => ErrorClass::Unauthorized,
            404 => ErrorClass::NotFound,
            429 => ErrorClass::RateLimited {
                retry_after: *retry_after,
            },
            408 | 500 | 502 | 503 | 504 => ErrorClass::Transient,
            _ => ErrorClass::Permanent,
        },
        RemoteError::Connection { .. } => ErrorClass::Transient,
        RemoteError::InvalidResponse { .. } => ErrorClass::Permanent,
    }
}

/// Parse a `Retry-After` header value.
///
/// Integer seconds are taken as-is; any other form (HTTP date, garbage)
/// becomes [`DEFAULT_RETRY_AFTER`]. A missing header or `0` yields `None`.
pub fn parse_retry_after(value: Option<&str>) -> Option<Duration> {
    let value = value?.trim();
    match value.parse::<u64>() {
        Ok(0) => None,
        Ok(secs) => Some(Duration::from_secs(secs)),
        Err(_) => {
            warn!(value, "could not parse Retry-After header, using default");
            Some(DEFAULT_RETRY_AFTER)
        }
    }
}

/// Transport to the tracker's REST API.
pub trait TrackerApi: Send + Sync {
    fn send<'a>(
        &'a self,
        credential: &'a Credential,
        request: RemoteRequest,
    ) -> BoxFuture<'a, Result<Value, RemoteError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: u16) -> RemoteError {
        RemoteError::Status {
            status,
            message: String::new(),
            retry_after: None,
        }
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(classify_remote_error(&status(400)), ErrorClass::Validation);
        assert_eq!(classify_remote_error(&status(401)), ErrorClass::Unauthorized);
        assert_eq!(classify_remote_error(&status(403)), ErrorClass::Permanent);
        assert_eq!(classify_remote_error(&status(404)), ErrorClass::NotFound);
        assert_eq!(classify_remote_error(&status(409)), ErrorClass::Permanent);
        for transient in [408, 500, 502, 503, 504] {
            assert_eq!(classify_remote_error(&status(transient)), ErrorClass::Transient);
        }
        assert_eq!(classify_remote_error(&status(501)), ErrorClass::Permanent);
    }

    #[test]
    fn test_rate_limit_carries_hint() {
        let error = RemoteError::Status {
            status: 429,
            message: "slow down".to_string(),
            retry_after: Some(Duration::from_secs(7)),
        };
        assert_eq!(
            classify_remote_error(&error),
            ErrorClass::RateLimited {
                retry_after: Some(Duration::from_secs(7))
            }
        );
    }

    #[test]
    fn test_transport_failures() {
        let connection = RemoteError::Connection {
            message: "reset".to_string(),
        };
        let garbage = RemoteError::InvalidResponse {
            message: "not json".to_string(),
        };
        assert_eq!(classify_remote_error(&connection), ErrorClass::Transient);
        assert_eq!(classify_remote_error(&garbage), ErrorClass::Permanent);
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after(None), None);
        assert_eq!(parse_retry_after(Some("12")), Some(Duration::from_secs(12)));
        assert_eq!(parse_retry_after(Some(" 3 ")), Some(Duration::from_secs(3)));
        assert_eq!(parse_retry_after(Some("0")), None);
        assert_eq!(
            parse_retry_after(Some("Wed, 21 Oct 2026 07:28:00 GMT")),
            Some(DEFAULT_RETRY_AFTER)
        );
    }

    #[test]
    fn test_request_builders() {
        let request = RemoteRequest::get("Alpha/_apis/wit/workitems/42")
            .query("$expand", "Relations");
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.query_value("$expand"), Some("Relations"));
        assert!(request.body.is_none());

        let patch = RemoteRequest::patch("_apis/wit/workitems/42", serde_json::json!([]));
        assert_eq!(patch.method, Method::Patch);
        assert!(patch.json_patch);
    }
}
