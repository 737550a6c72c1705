//! # Backoff / Retry Scheduling
//!
//! Delay sequences and retry budgets for the two independent retry domains.
//!
//! ## Delay Formula
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              delay(attempt) = min(base * 2^(attempt-1), cap)            │
//! │                                                                         │
//! │  INIT DOMAIN (engine setup)          SYNC DOMAIN (cycle failures)      │
//! │  ──────────────────────────          ───────────────────────────       │
//! │  base = 2s, cap = 10s, max = 3       base = 5s, cap = 30s, max = 3     │
//! │                                                                         │
//! │  Attempt 1:  2s                      Attempt 1:  5s                    │
//! │  Attempt 2:  4s                      Attempt 2: 10s                    │
//! │  Attempt 3:  8s                      Attempt 3: 20s                    │
//! │  Attempt 4: 10s (capped)             Attempt 4: 30s (capped)           │
//! │                                                                         │
//! │  Budget exhausted:                   Budget exhausted:                 │
//! │  → Degraded mode + 2 min recovery    → terminal failure logged,        │
//! │                                        counter reset to zero           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`DomainBackoff`] implements the `backoff` crate's [`Backoff`] trait with
//! a deterministic, jitter-free sequence so retries are reproducible under a
//! paused clock.

use ::backoff::backoff::Backoff;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// =============================================================================
// Retry Domain
// =============================================================================

/// The two independent retry domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryDomain {
    /// Engine setup (auth readiness, subscription binding).
    Init,
    /// Sync cycle execution.
    Sync,
}

impl std::fmt::Display for RetryDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryDomain::Init => write!(f, "init"),
            RetryDomain::Sync => write!(f, "sync"),
        }
    }
}

// =============================================================================
// Retry Policy
// =============================================================================

/// Delay parameters and budget for one retry domain.
///
/// ## Example
/// ```rust
/// use shopdesk_sync::backoff::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::sync();
/// assert_eq!(policy.delay(1), Duration::from_secs(5));
/// assert_eq!(policy.delay(3), Duration::from_secs(20));
/// assert_eq!(policy.delay(9), Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Delay before the first retry (seconds).
    pub base_delay_secs: u64,

    /// Upper bound on any delay (seconds).
    pub cap_delay_secs: u64,

    /// Failures tolerated before the domain's exhaustion handling.
    pub max_retries: u32,
}

impl RetryPolicy {
    /// Init domain defaults: 2s base, 10s cap, 3 retries.
    pub const fn init() -> Self {
        RetryPolicy {
            base_delay_secs: 2,
            cap_delay_secs: 10,
            max_retries: 3,
        }
    }

    /// Sync domain defaults: 5s base, 30s cap, 3 retries.
    pub const fn sync() -> Self {
        RetryPolicy {
            base_delay_secs: 5,
            cap_delay_secs: 30,
            max_retries: 3,
        }
    }

    /// Returns the default policy for a domain.
    pub const fn for_domain(domain: RetryDomain) -> Self {
        match domain {
            RetryDomain::Init => Self::init(),
            RetryDomain::Sync => Self::sync(),
        }
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_secs(self.base_delay_secs)
    }

    pub fn cap_delay(&self) -> Duration {
        Duration::from_secs(self.cap_delay_secs)
    }

    /// Delay before retry number `attempt` (1-based; 0 is treated as 1).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay()
            .saturating_mul(1u32 << exponent)
            .min(self.cap_delay())
    }

    /// Starts a fresh backoff sequence for this policy.
    pub fn backoff(&self) -> DomainBackoff {
        DomainBackoff::new(*self)
    }
}

// =============================================================================
// Domain Backoff
// =============================================================================

/// Stateful retry sequence for one domain.
///
/// `next_backoff` hands out `delay(1)`, `delay(2)`, ... up to `max_retries`
/// delays, then `None`. `reset` starts the budget over.
#[derive(Debug, Clone)]
pub struct DomainBackoff {
    policy: RetryPolicy,
    attempt: u32,
}

impl DomainBackoff {
    pub fn new(policy: RetryPolicy) -> Self {
        DomainBackoff { policy, attempt: 0 }
    }

    /// Retries handed out since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// True once every retry in the budget has been handed out.
    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.policy.max_retries
    }
}

impl Backoff for DomainBackoff {
    fn next_backoff(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        self.attempt += 1;
        Some(self.policy.delay(self.attempt))
    }

    fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_delays() {
        let policy = RetryPolicy::init();
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(2), Duration::from_secs(4));
        assert_eq!(policy.delay(3), Duration::from_secs(8));
        assert_eq!(policy.delay(4), Duration::from_secs(10));
    }

    #[test]
    fn test_delay_never_exceeds_cap() {
        for policy in [RetryPolicy::init(), RetryPolicy::sync()] {
            for attempt in 0..200 {
                assert!(policy.delay(attempt) <= policy.cap_delay());
            }
        }
    }

    #[test]
    fn test_delays_are_monotonic() {
        let policy = RetryPolicy::sync();
        let delays: Vec<_> = (1..10).map(|a| policy.delay(a)).collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_domain_backoff_budget() {
        let mut backoff = RetryPolicy::sync().backoff();

        assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(5)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(10)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(20)));
        assert_eq!(backoff.attempt(), 3);
        assert!(backoff.is_exhausted());

        assert_eq!(backoff.next_backoff(), None);
        assert_eq!(backoff.attempt(), 3);

        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_policy_for_domain() {
        assert_eq!(RetryPolicy::for_domain(RetryDomain::Init), RetryPolicy::init());
        assert_eq!(RetryPolicy::for_domain(RetryDomain::Sync), RetryPolicy::sync());
        assert_eq!(RetryDomain::Sync.to_string(), "sync");
    }
}
