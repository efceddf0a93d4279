//! Crate-level error types.
//!
//! Every service operation returns [`TrackerResult`]. The variants keep the
//! original cause (`#[source]`) so diagnostics can render the full chain,
//! while [`TrackerError::kind`] collapses them into the seven categories
//! callers branch on.

use std::fmt;

use miette::Diagnostic;
use thiserror::Error;

use crate::auth::AuthError;
use crate::cache::CacheError;
use crate::remote::RemoteError;
use crate::retry::{ErrorClass, RetryError};
use crate::validation::ValidationError;

/// Coarse category of a [`TrackerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    RateLimited,
    Permanent,
    NotFound,
    Unauthorized,
    Validation,
    Canceled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Transient => "transient",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Permanent => "permanent",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Validation => "validation",
            ErrorKind::Canceled => "canceled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Diagnostic, Debug)]
pub enum TrackerError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Validation(#[from] ValidationError),

    #[error("{operation}: remote rejected the request: {source}")]
    #[diagnostic(code(sprintgate::tracker::remote_validation))]
    RemoteValidation {
        operation: String,
        #[source]
        source: RemoteError,
    },

    #[error("{operation}: not found: {source}")]
    #[diagnostic(code(sprintgate::tracker::not_found))]
    NotFound {
        operation: String,
        #[source]
        source: RemoteError,
    },

    #[error("{operation}: unauthorized: {source}")]
    #[diagnostic(
        code(sprintgate::tracker::unauthorized),
        help("Check that the personal access token is valid and has work item scope")
    )]
    Unauthorized {
        operation: String,
        #[source]
        source: RemoteError,
    },

    #[error("{operation}: {source}")]
    #[diagnostic(code(sprintgate::tracker::permanent))]
    Permanent {
        operation: String,
        #[source]
        source: RemoteError,
    },

    #[error("{operation}: failed after {attempts} attempts: {cause}")]
    #[diagnostic(code(sprintgate::tracker::transient))]
    Transient {
        operation: String,
        attempts: u32,
        cause: String,
    },

    #[error("{operation}: rate limited after {attempts} attempts: {cause}")]
    #[diagnostic(
        code(sprintgate::tracker::rate_limited),
        help("The tracker is throttling requests; try again later")
    )]
    RateLimited {
        operation: String,
        attempts: u32,
        cause: String,
    },

    #[error("{operation}: canceled after {attempts} attempts")]
    #[diagnostic(code(sprintgate::tracker::canceled))]
    Canceled { operation: String, attempts: u32 },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Cache(#[from] CacheError),

    #[error("Service registry is closed")]
    #[diagnostic(code(sprintgate::tracker::closed))]
    Closed,

    #[error("Unexpected response for {operation}: {message}")]
    #[diagnostic(code(sprintgate::tracker::invalid_response))]
    InvalidResponse { operation: String, message: String },
}

impl TrackerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TrackerError::Validation(_) | TrackerError::RemoteValidation { .. } => {
                ErrorKind::Validation
            }
            TrackerError::NotFound { .. } => ErrorKind::NotFound,
            TrackerError::Unauthorized { .. } => ErrorKind::Unauthorized,
            TrackerError::Auth(AuthError::Closed) => ErrorKind::Permanent,
            TrackerError::Auth(_) => ErrorKind::Unauthorized,
            TrackerError::Transient { .. } => ErrorKind::Transient,
            TrackerError::RateLimited { .. } => ErrorKind::RateLimited,
            TrackerError::Canceled { .. } => ErrorKind::Canceled,
            TrackerError::Permanent { .. }
            | TrackerError::Cache(_)
            | TrackerError::Closed
            | TrackerError::InvalidResponse { .. } => ErrorKind::Permanent,
        }
    }

    /// Fold the outcome of a retried remote call into a tracker error.
    pub fn from_retry(operation: &str, error: RetryError<RemoteError>) -> Self {
        let operation = operation.to_string();
        match error {
            RetryError::Rejected { class, source, .. } => match class {
                ErrorClass::NotFound => TrackerError::NotFound { operation, source },
                ErrorClass::Unauthorized => TrackerError::Unauthorized { operation, source },
                ErrorClass::Validation => TrackerError::RemoteValidation { operation, source },
                _ => TrackerError::Permanent { operation, source },
            },
            RetryError::Exhausted { attempts, last } => {
                let rate_limited = matches!(last.class(), ErrorClass::RateLimited { .. });
                let cause = last.to_string();
                if rate_limited {
                    TrackerError::RateLimited {
                        operation,
                        attempts,
                        cause,
                    }
                } else {
                    TrackerError::Transient {
                        operation,
                        attempts,
                        cause,
                    }
                }
            }
            RetryError::Canceled { attempts } => TrackerError::Canceled {
                operation,
                attempts,
            },
        }
    }

    pub fn invalid_response(operation: &str, message: impl Into<String>) -> Self {
        TrackerError::InvalidResponse {
            operation: operation.to_string(),
            message: message.into(),
        }
    }
}

pub type TrackerResult<T> = Result<T, TrackerError>;

/// One component that failed to shut down cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentFailure {
    pub component: String,
    pub message: String,
}

/// Aggregated shutdown failures. Every component is attempted; this lists
/// each one that failed.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
#[error("Shutdown failed for {} component(s): {}", .failures.len(), list_failures(.failures))]
#[diagnostic(code(sprintgate::shutdown))]
pub struct ShutdownError {
    pub failures: Vec<ComponentFailure>,
}

fn list_failures(failures: &[ComponentFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.component, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}
