use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

use super::ErrorClass;

#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
#[error("Invalid retry policy: {reason}")]
#[diagnostic(code(sprintgate::retry::invalid_policy))]
pub struct InvalidPolicy {
    pub reason: String,
}

/// Attempt budget and delay schedule.
///
/// The delay after the failure of zero-based attempt `n` is
/// `min(base_delay * exponential_base^n, max_delay)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub exponential_base: f64,
    /// Fraction in `[0, 1]` shaved off each delay at random.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            exponential_base: 2.0,
            jitter: 0.25,
        }
    }
}

impl RetryPolicy {
    pub fn without_jitter(self) -> Self {
        Self { jitter: 0.0, ..self }
    }

    pub fn validate(&self) -> Result<(), InvalidPolicy> {
        let invalid = |reason: &str| {
            Err(InvalidPolicy {
                reason: reason.to_string(),
            })
        };
        if self.max_attempts == 0 {
            return invalid("max_attempts must be at least 1");
        }
        if self.max_delay < self.base_delay {
            return invalid("max_delay must not be shorter than base_delay");
        }
        if !self.exponential_base.is_finite() || self.exponential_base < 1.0 {
            return invalid("exponential_base must be a finite number >= 1");
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return invalid("jitter must be within [0, 1]");
        }
        Ok(())
    }

    /// Exponential backoff for zero-based `attempt`, capped at `max_delay`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.exponential_base.powi(exponent);
        Duration::try_from_secs_f64(secs)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Delay before retrying a failure of `class` on zero-based `attempt`.
    ///
    /// A rate-limit hint replaces the backoff, still capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32, class: ErrorClass) -> Duration {
        match class {
            ErrorClass::RateLimited {
                retry_after: Some(hint),
            } => hint.min(self.max_delay),
            _ => self.backoff_delay(attempt),
        }
    }

    /// Random delay in `[delay * (1 - jitter), delay]`.
    pub fn jittered(&self, delay: Duration) -> Duration {
        let jitter = self.jitter.clamp(0.0, 1.0);
        if jitter == 0.0 {
            return delay;
        }
        delay.mul_f64(1.0 - jitter * rand::random::<f64>())
    }
}
