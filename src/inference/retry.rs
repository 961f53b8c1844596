//! Bounded exponential backoff for rate-limited attempts.
//!
//! ```text
//! attempt:   1      2        3         4
//! wait:      -    base    2*base    4*base
//! ```

use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    ZeroAttempts,
    ZeroDelay,
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyError::ZeroAttempts => write!(f, "max_attempts must be at least 1"),
            PolicyError::ZeroDelay => write!(f, "base delay must be greater than zero"),
        }
    }
}

impl std::error::Error for PolicyError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Result<Self, PolicyError> {
        if max_attempts == 0 {
            return Err(PolicyError::ZeroAttempts);
        }
        if base_delay.is_zero() {
            return Err(PolicyError::ZeroDelay);
        }
        Ok(Self {
            max_attempts,
            base_delay,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Wait before the given 1-based attempt. `None` for the first attempt
    /// and for attempts beyond the budget.
    pub fn delay_before(&self, attempt: u32) -> Option<Duration> {
        if attempt < 2 || attempt > self.max_attempts {
            return None;
        }
        let factor = 1u32.checked_shl(attempt - 2).unwrap_or(u32::MAX);
        Some(self.base_delay.saturating_mul(factor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_double_from_base() {
        let policy = RetryPolicy::new(4, Duration::from_millis(1000)).unwrap();
        assert_eq!(policy.delay_before(1), None);
        assert_eq!(policy.delay_before(2), Some(Duration::from_millis(1000)));
        assert_eq!(policy.delay_before(3), Some(Duration::from_millis(2000)));
        assert_eq!(policy.delay_before(4), Some(Duration::from_millis(4000)));
        assert_eq!(policy.delay_before(5), None);
    }

    #[test]
    fn test_single_attempt_never_waits() {
        let policy = RetryPolicy::new(1, Duration::from_millis(500)).unwrap();
        assert_eq!(policy.delay_before(2), None);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert_eq!(
            RetryPolicy::new(0, Duration::from_millis(1)),
            Err(PolicyError::ZeroAttempts)
        );
        assert_eq!(RetryPolicy::new(3, Duration::ZERO), Err(PolicyError::ZeroDelay));
    }

    #[test]
    fn test_huge_attempt_counts_saturate() {
        let policy = RetryPolicy::new(100, Duration::from_millis(1)).unwrap();
        assert!(policy.delay_before(100).is_some());
    }
}
