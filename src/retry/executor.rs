use std::error::Error;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use super::{Classifier, ErrorClass, RetryPolicy};

/// Why one attempt failed.
#[derive(Debug)]
pub enum AttemptError<E> {
    Failed { class: ErrorClass, source: E },
    TimedOut(Duration),
}

impl<E> AttemptError<E> {
    /// Timeouts count as transient.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Failed { class, .. } => *class,
            Self::TimedOut(_) => ErrorClass::Transient,
        }
    }
}

impl<E: fmt::Display> fmt::Display for AttemptError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { source, .. } => write!(f, "{source}"),
            Self::TimedOut(after) => write!(f, "attempt timed out after {}s", after.as_secs_f64()),
        }
    }
}

impl<E: Error + 'static> Error for AttemptError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Failed { source, .. } => Some(source),
            Self::TimedOut(_) => None,
        }
    }
}

/// Final outcome of [`RetryExecutor::execute`] when no attempt succeeded.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Non-retryable failure, returned as soon as it was seen.
    Rejected {
        class: ErrorClass,
        attempts: u32,
        source: E,
    },
    /// Every attempt in the budget failed transiently.
    Exhausted { attempts: u32, last: AttemptError<E> },
    Canceled { attempts: u32 },
}

impl<E> RetryError<E> {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Rejected { attempts, .. }
            | Self::Exhausted { attempts, .. }
            | Self::Canceled { attempts } => *attempts,
        }
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected { class, source, .. } => write!(f, "{class} error: {source}"),
            Self::Exhausted { attempts, last } => {
                write!(f, "gave up after {attempts} attempts: {last}")
            }
            Self::Canceled { attempts } => write!(f, "canceled after {attempts} attempts"),
        }
    }
}

impl<E: Error + 'static> Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Rejected { source, .. } => Some(source),
            Self::Exhausted { last, .. } => Some(last),
            Self::Canceled { .. } => None,
        }
    }
}

/// Runs an operation under a per-attempt deadline, retrying transient
/// failures according to a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    timeout: Duration,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy, timeout: Duration) -> Self {
        Self { policy, timeout }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `operation` until it succeeds, fails permanently, exhausts the
    /// attempt budget or `cancel` fires.
    ///
    /// `operation` receives the zero-based attempt number. Cancellation is
    /// observed before each attempt, while it runs and during backoff.
    pub async fn execute<T, E, F, Fut, C>(
        &self,
        mut operation: F,
        classifier: &C,
        cancel: &CancellationToken,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Classifier<E> + ?Sized,
        E: fmt::Display,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Canceled { attempts: attempt });
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(RetryError::Canceled { attempts: attempt + 1 });
                }
                outcome = tokio::time::timeout(self.timeout, operation(attempt)) => outcome,
            };
            attempt += 1;

            let failure = match outcome {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(source)) => {
                    let class = classifier.classify(&source);
                    if !class.is_retryable() {
                        return Err(RetryError::Rejected {
                            class,
                            attempts: attempt,
                            source,
                        });
                    }
                    AttemptError::Failed { class, source }
                }
                Err(_) => AttemptError::TimedOut(self.timeout),
            };

            if attempt >= max_attempts {
                error!(attempts = attempt, error = %failure, "retry budget exhausted");
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: failure,
                });
            }

            let delay = self
                .policy
                .jittered(self.policy.delay_for(attempt - 1, failure.class()));
            warn!(
                attempt,
                max_attempts,
                class = %failure.class(),
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "attempt failed, retrying"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(RetryError::Canceled { attempts: attempt });
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
