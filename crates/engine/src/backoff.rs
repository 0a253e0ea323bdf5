// SPDX-License-Identifier: MIT

//! Per-error-kind retry policy and jittered delay calculation.

use rand::Rng;
use s2p_core::ErrorKind;
use std::time::Duration;

/// `(base, cap, max_retries)` for one error kind. `max_retries == None`
/// means unbounded — `ServerDown` never exhausts into the DLQ because
/// outages end, jobs don't.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryParams {
    pub base: Duration,
    pub cap: Duration,
    pub max_retries: Option<u32>,
}

/// Retry policy for each error kind. `Permanent` carries a zero policy —
/// the worker DLQs it immediately rather than consulting this table.
pub fn retry_params(kind: ErrorKind) -> RetryParams {
    match kind {
        ErrorKind::Transient => RetryParams {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(60),
            max_retries: Some(5),
        },
        ErrorKind::NotFound => RetryParams {
            base: Duration::from_secs(30),
            cap: Duration::from_secs(600),
            max_retries: Some(12),
        },
        ErrorKind::ServerDown => RetryParams {
            base: Duration::from_secs(5),
            cap: Duration::from_secs(60),
            max_retries: None,
        },
        ErrorKind::Permanent => RetryParams {
            base: Duration::ZERO,
            cap: Duration::ZERO,
            max_retries: Some(0),
        },
    }
}

/// `min(cap, base * 2^retry_count)`, then scaled by a uniform jitter
/// factor in `[0.5, 1.0]` (full jitter, lower-bounded so a delay is never
/// zero). Each call draws its own jitter, so concurrent callers never
/// converge on the same delay.
pub fn calculate_delay(retry_count: u32, base: Duration, cap: Duration) -> Duration {
    let exponential = base.saturating_mul(1u32.checked_shl(retry_count).unwrap_or(u32::MAX));
    let bounded = exponential.min(cap);
    let jitter: f64 = rand::rng().random_range(0.5..=1.0);
    bounded.mul_f64(jitter)
}

/// The health-check sleep interval while the breaker is open:
/// 5 -> 10 -> 20 -> 40 -> 60s, capping at 60s, with full jitter.
pub fn health_check_interval(consecutive_checks: u32) -> Duration {
    let base = Duration::from_secs(5);
    let cap = Duration::from_secs(60);
    let exponential = base.saturating_mul(1u32.checked_shl(consecutive_checks).unwrap_or(u32::MAX));
    let bounded = exponential.min(cap);
    let jitter: f64 = rand::rng().random_range(0.5..=1.0);
    bounded.mul_f64(jitter)
}
