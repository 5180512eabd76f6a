//! Quota policy and decision types for the fixed-window limiter.

use std::time::Duration;

/// How many requests a scope may make per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitPolicy {
    pub max_requests: u64,
    pub window: Duration,
}

impl LimitPolicy {
    pub const fn new(max_requests: u64, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    /// Policy applied to unauthenticated resolve traffic when none is configured.
    pub const DYNAMIC_DEFAULT: LimitPolicy = LimitPolicy::new(100, Duration::from_secs(30));

    /// Policy applied to link writes when none is configured.
    pub const SHORTEN_DEFAULT: LimitPolicy = LimitPolicy::new(10, Duration::from_secs(60));
}

/// Outcome of a quota check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    /// Remaining window time; only meaningful on denial.
    pub retry_after: Duration,
    /// Counter value after this request, zero when the store was bypassed.
    pub count: u64,
}

impl RateDecision {
    pub fn allow(count: u64) -> Self {
        Self {
            allowed: true,
            retry_after: Duration::ZERO,
            count,
        }
    }

    pub fn deny(count: u64, retry_after: Duration) -> Self {
        Self {
            allowed: false,
            retry_after,
            count,
        }
    }
}
