//! Timeout, retry and backoff around a single unit of remote work.
//!
//! The executor knows nothing about HTTP or the tracker; callers supply a
//! [`Classifier`] that sorts their error type into an [`ErrorClass`], and only
//! `Transient` and `RateLimited` failures are retried.

mod classify;
mod executor;
mod policy;

#[cfg(test)]
mod policy_test;

pub use classify::{Classifier, ErrorClass};
pub use executor::{AttemptError, RetryError, RetryExecutor};
pub use policy::{InvalidPolicy, RetryPolicy};
