//! Time utilities: the monotonic clock and idle deadlines.
//!
//! This module provides the time-related primitives the blocking streams rely on:
//!
//! - [`Clock`] for reading monotonic time, replaceable for diagnostics
//! - [`MonotonicClock`], the default backed by [`Instant::now`]
//! - [`IdleDeadline`] for tracking producer silence against an idle timeout
//!
//! # Example: Idle budget
//!
//! ```ignore
//! use jitstream::time::{IdleDeadline, MonotonicClock, Clock};
//! use std::time::Duration;
//!
//! let clock = MonotonicClock;
//! let deadline = IdleDeadline::new(Duration::from_secs(5), clock.now());
//! assert!(deadline.remaining(clock.now()).is_some());
//! ```

pub mod idle;

pub use idle::IdleDeadline;

use std::fmt;
use std::time::{Duration, Instant};

/// Idle timeout applied when the caller does not choose one.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Longest single wait of a blocked consumer before it re-evaluates and logs.
pub const DEFAULT_WAIT_SLICE: Duration = Duration::from_secs(1);

/// A monotonic time source.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// Clock backed by [`Instant::now`].
#[derive(Clone, Copy, Debug, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl fmt::Debug for dyn Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Clock")
    }
}
