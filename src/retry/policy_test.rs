//! Tests for retry policy arithmetic.

use std::time::Duration;

use crate::retry::{ErrorClass, RetryPolicy};

#[test]
fn default_policy_matches_documented_values() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.max_attempts, 4);
    assert_eq!(policy.base_delay, Duration::from_secs(1));
    assert_eq!(policy.max_delay, Duration::from_secs(60));
    assert_eq!(policy.exponential_base, 2.0);
    assert!(policy.validate().is_ok());
}

#[test]
fn backoff_grows_exponentially_and_caps() {
    let policy = RetryPolicy::default();
    let delays: Vec<u64> = (0..8).map(|n| policy.backoff_delay(n).as_secs()).collect();
    assert_eq!(delays, vec![1, 2, 4, 8, 16, 32, 60, 60]);
    assert_eq!(policy.backoff_delay(u32::MAX), Duration::from_secs(60));
}

#[test]
fn rate_limit_hint_is_used_and_capped() {
    let policy = RetryPolicy::default();
    let hinted = |secs| ErrorClass::RateLimited {
        retry_after: Some(Duration::from_secs(secs)),
    };

    assert_eq!(policy.delay_for(0, hinted(7)), Duration::from_secs(7));
    assert_eq!(policy.delay_for(0, hinted(600)), Duration::from_secs(60));
    assert_eq!(
        policy.delay_for(2, ErrorClass::RateLimited { retry_after: None }),
        Duration::from_secs(4)
    );
    assert_eq!(policy.delay_for(3, ErrorClass::Transient), Duration::from_secs(8));
}

#[test]
fn jitter_never_exceeds_unjittered_delay() {
    let policy = RetryPolicy::default();
    let delay = Duration::from_secs(8);
    for _ in 0..1000 {
        let jittered = policy.jittered(delay);
        assert!(jittered <= delay);
        assert!(jittered >= Duration::from_secs(6));
    }
}

#[test]
fn zero_jitter_is_exact() {
    let policy = RetryPolicy::default().without_jitter();
    assert_eq!(policy.jittered(Duration::from_secs(3)), Duration::from_secs(3));
}

#[test]
fn invalid_policies_are_rejected() {
    let base = RetryPolicy::default();
    assert!(RetryPolicy { max_attempts: 0, ..base }.validate().is_err());
    assert!(RetryPolicy { jitter: 1.5, ..base }.validate().is_err());
    assert!(RetryPolicy { exponential_base: 0.5, ..base }.validate().is_err());
    assert!(
        RetryPolicy {
            max_delay: Duration::from_millis(10),
            ..base
        }
        .validate()
        .is_err()
    );
}

#[test]
fn only_transient_and_rate_limited_are_retryable() {
    assert!(ErrorClass::Transient.is_retryable());
    assert!(ErrorClass::RateLimited { retry_after: None }.is_retryable());
    assert!(!ErrorClass::Permanent.is_retryable());
    assert!(!ErrorClass::NotFound.is_retryable());
    assert!(!ErrorClass::Unauthorized.is_retryable());
    assert!(!ErrorClass::Validation.is_retryable());
}
