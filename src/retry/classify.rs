use std::fmt;
use std::time::Duration;

/// How a failed attempt should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Worth retrying with backoff (5xx, connection loss, timeouts).
    Transient,
    /// Throttled. `retry_after` is the server's hint, if it gave one.
    RateLimited { retry_after: Option<Duration> },
    Permanent,
    NotFound,
    Unauthorized,
    Validation,
}

impl ErrorClass {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient | Self::RateLimited { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::RateLimited { .. } => "rate_limited",
            Self::Permanent => "permanent",
            Self::NotFound => "not_found",
            Self::Unauthorized => "unauthorized",
            Self::Validation => "validation",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps an operation's error onto an [`ErrorClass`].
pub trait Classifier<E> {
    fn classify(&self, error: &E) -> ErrorClass;
}

impl<E, F> Classifier<E> for F
where
    F: Fn(&E) -> ErrorClass,
{
    fn classify(&self, error: &E) -> ErrorClass {
        self(error)
    }
}
