//! Reconnect delay policy.

use std::time::Duration;

use crate::constants::{FIRST_RECONNECT_DELAY, RECONNECT_DELAY};

/// Fixed two-tier reconnect schedule.
///
/// Attempt 0 (the first reconnect after a loss) waits `first`; every later
/// attempt waits `rest`. There is no growth beyond the second tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub first: Duration,
    pub rest: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            first: FIRST_RECONNECT_DELAY,
            rest: RECONNECT_DELAY,
        }
    }
}

impl Backoff {
    pub fn new(first: Duration, rest: Duration) -> Self {
        Self { first, rest }
    }

    /// Delay to wait before reconnect attempt number `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 { self.first } else { self.rest }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_tier_schedule() {
        let backoff = Backoff::default();
        assert_eq!(backoff.delay(0), Duration::from_millis(1000));
        assert_eq!(backoff.delay(1), Duration::from_millis(10_000));
        assert_eq!(backoff.delay(2), Duration::from_millis(10_000));
        assert_eq!(backoff.delay(u32::MAX), Duration::from_millis(10_000));
    }
}
