//! Idle deadline tracking for blocked consumers.
//!
//! An [`IdleDeadline`] remembers the last time a producer touched a stream and
//! answers two questions for a waiting consumer: has the idle budget run out,
//! and if not, how long should the next wait be.
//!
//! # Example
//!
//! ```ignore
//! use jitstream::time::IdleDeadline;
//! use std::time::{Duration, Instant};
//!
//! let start = Instant::now();
//! let mut deadline = IdleDeadline::new(Duration::from_millis(100), start);
//!
//! // Nothing pushed for 150ms: the budget is gone.
//! assert!(deadline.remaining(start + Duration::from_millis(150)).is_none());
//!
//! // A push renews it.
//! deadline.touch(start + Duration::from_millis(150));
//! assert!(deadline.remaining(start + Duration::from_millis(160)).is_some());
//! ```

use std::time::{Duration, Instant};

/// Tracks producer activity against an idle timeout.
#[derive(Clone, Copy, Debug)]
pub struct IdleDeadline {
    /// Maximum silence allowed between touches.
    timeout: Duration,

    /// Instant of the last push (or construction).
    last_touch: Instant,
}

impl IdleDeadline {
    /// Creates a deadline whose idle budget starts at `now`.
    ///
    /// # Arguments
    /// * `timeout` - The maximum silence allowed
    /// * `now` - The instant counted as the first touch
    pub fn new(timeout: Duration, now: Instant) -> Self {
        Self {
            timeout,
            last_touch: now,
        }
    }

    /// Records producer activity, renewing the idle budget.
    pub fn touch(&mut self, now: Instant) {
        self.last_touch = now;
    }

    /// The configured idle timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Time since the last touch.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_touch)
    }

    /// Remaining idle budget, or `None` once the timeout has elapsed.
    ///
    /// # Returns
    /// `Some(remaining)` while the producer is still within budget, `None` when expired
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        let idle = self.idle_for(now);

        if idle >= self.timeout {
            None
        } else {
            Some(self.timeout - idle)
        }
    }

    /// Length of the next wait: the remaining budget capped at `slice`.
    ///
    /// Returns `None` once expired, so callers fail the stream instead of waiting.
    pub fn next_wait(&self, now: Instant, slice: Duration) -> Option<Duration> {
        self.remaining(now).map(|remaining| remaining.min(slice))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining_shrinks_until_expiry() {
        let start = Instant::now();
        let deadline = IdleDeadline::new(Duration::from_millis(100), start);

        assert_eq!(
            deadline.remaining(start + Duration::from_millis(40)),
            Some(Duration::from_millis(60))
        );
        assert_eq!(deadline.remaining(start + Duration::from_millis(100)), None);
        assert_eq!(deadline.remaining(start + Duration::from_secs(1)), None);
    }

    #[test]
    fn test_touch_renews_budget() {
        let start = Instant::now();
        let mut deadline = IdleDeadline::new(Duration::from_millis(100), start);

        deadline.touch(start + Duration::from_millis(90));

        assert_eq!(
            deadline.remaining(start + Duration::from_millis(150)),
            Some(Duration::from_millis(40))
        );
    }

    #[test]
    fn test_next_wait_is_capped_by_slice() {
        let start = Instant::now();
        let deadline = IdleDeadline::new(Duration::from_secs(60), start);

        assert_eq!(
            deadline.next_wait(start, Duration::from_millis(250)),
            Some(Duration::from_millis(250))
        );
        assert_eq!(
            deadline.next_wait(start + Duration::from_millis(59_900), Duration::from_secs(1)),
            Some(Duration::from_millis(100))
        );
    }
}
