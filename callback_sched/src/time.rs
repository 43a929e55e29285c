// src/time.rs
//! Microsecond time base shared by the scheduler and its clock sources.
//!
//! `Duration` is signed so that a caller handing in a negative delay gets an
//! `InvalidParameter` instead of a silent wrap. `Instant` counts microseconds
//! since the epoch of whatever clock produced it.

use std::fmt;
use std::ops::{Add, AddAssign, Sub};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duration(i64);

impl Duration {
    pub const ZERO: Duration = Duration(0);
    pub const MAX: Duration = Duration(i64::MAX);

    pub const fn from_micros(us: i64) -> Self {
        Duration(us)
    }

    pub const fn from_millis(ms: i64) -> Self {
        Duration(ms.saturating_mul(1_000))
    }

    pub const fn from_secs(s: i64) -> Self {
        Duration(s.saturating_mul(1_000_000))
    }

    pub const fn as_micros(self) -> i64 {
        self.0
    }

    pub const fn as_millis(self) -> i64 {
        self.0 / 1_000
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// `None` for negative durations.
    pub fn to_std(self) -> Option<std::time::Duration> {
        u64::try_from(self.0).ok().map(std::time::Duration::from_micros)
    }
}

pub const fn microseconds(n: i64) -> Duration {
    Duration::from_micros(n)
}

pub const fn milliseconds(n: i64) -> Duration {
    Duration::from_millis(n)
}

pub const fn seconds(n: i64) -> Duration {
    Duration::from_secs(n)
}

impl From<std::time::Duration> for Duration {
    fn from(d: std::time::Duration) -> Self {
        Duration(i64::try_from(d.as_micros()).unwrap_or(i64::MAX))
    }
}

impl Add for Duration {
    type Output = Duration;
    fn add(self, rhs: Duration) -> Duration {
        Duration(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Duration {
    type Output = Duration;
    fn sub(self, rhs: Duration) -> Duration {
        Duration(self.0.saturating_sub(rhs.0))
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let us = self.0;
        if us != 0 && us % 1_000_000 == 0 {
            write!(f, "{}s", us / 1_000_000)
        } else if us % 1_000 == 0 {
            write!(f, "{}ms", us / 1_000)
        } else {
            write!(f, "{}us", us)
        }
    }
}

/// A point on a clock's monotonic timeline, in microseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Instant(u64);

impl Instant {
    pub const ZERO: Instant = Instant(0);

    pub const fn from_micros(us: u64) -> Self {
        Instant(us)
    }

    pub const fn as_micros(self) -> u64 {
        self.0
    }

    /// Signed distance `self - earlier`, saturating at the `i64` range.
    pub fn since(self, earlier: Instant) -> Duration {
        let diff = self.0 as i128 - earlier.0 as i128;
        Duration(diff.clamp(i64::MIN as i128, i64::MAX as i128) as i64)
    }

    /// Distance to `earlier`, or zero if `earlier` is in the future.
    pub fn saturating_since(self, earlier: Instant) -> Duration {
        Duration(self.0.saturating_sub(earlier.0).min(i64::MAX as u64) as i64)
    }
}

// Saturates at both ends of the timeline; a negative offset moves backwards.
impl Add<Duration> for Instant {
    type Output = Instant;
    fn add(self, rhs: Duration) -> Instant {
        if rhs.0 >= 0 {
            Instant(self.0.saturating_add(rhs.0 as u64))
        } else {
            Instant(self.0.saturating_sub(rhs.0.unsigned_abs()))
        }
    }
}

impl AddAssign<Duration> for Instant {
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

impl Sub for Instant {
    type Output = Duration;
    fn sub(self, rhs: Instant) -> Duration {
        self.since(rhs)
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T+{}.{:06}s", self.0 / 1_000_000, self.0 % 1_000_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_agree() {
        assert_eq!(milliseconds(3), microseconds(3_000));
        assert_eq!(seconds(2), milliseconds(2_000));
        assert_eq!(milliseconds(i64::MAX), Duration::MAX);
        assert!(milliseconds(-1).is_negative());
        assert!(!Duration::ZERO.is_positive());
    }

    #[test]
    fn instant_arithmetic_saturates() {
        let t = Instant::from_micros(500);
        assert_eq!(t + microseconds(250), Instant::from_micros(750));
        assert_eq!(t + microseconds(-800), Instant::ZERO);
        assert_eq!(Instant::from_micros(u64::MAX) + seconds(1), Instant::from_micros(u64::MAX));
        assert_eq!(Instant::from_micros(100) - Instant::from_micros(400), microseconds(-300));
        assert_eq!(Instant::from_micros(100).saturating_since(Instant::from_micros(400)), Duration::ZERO);
    }

    #[test]
    fn std_conversions() {
        assert_eq!(Duration::from(std::time::Duration::from_millis(7)), milliseconds(7));
        assert_eq!(milliseconds(7).to_std(), Some(std::time::Duration::from_millis(7)));
        assert_eq!(milliseconds(-7).to_std(), None);
    }

    #[test]
    fn display_picks_unit() {
        assert_eq!(seconds(3).to_string(), "3s");
        assert_eq!(milliseconds(10).to_string(), "10ms");
        assert_eq!(microseconds(1_500).to_string(), "1500us");
        assert_eq!(Duration::ZERO.to_string(), "0ms");
        assert_eq!(Instant::from_micros(1_000_250).to_string(), "T+1.000250s");
    }
}
