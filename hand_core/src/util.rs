//! Common time helpers for hand_core.

use std::time::Duration;

/// Number of microseconds in one second.
pub const MICROS_PER_SEC: u64 = 1_000_000;

/// Duration from milliseconds, with zero bumped to one millisecond.
#[inline]
pub fn period_from_ms(ms: u64) -> Duration {
    Duration::from_millis(ms.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_period_is_bumped() {
        assert_eq!(period_from_ms(0), Duration::from_millis(1));
        assert_eq!(period_from_ms(20), Duration::from_millis(20));
    }
}
