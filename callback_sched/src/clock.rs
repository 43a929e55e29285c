// src/clock.rs
//! Clock sources: the monotonic time reference plus the wake-up alarm the
//! dispatch loop parks on.

use crate::time::{Duration, Instant};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};

/// Timer facility consumed by the scheduler.
///
/// `arm` may be called from any thread, including while another thread is
/// inside `sleep`; an earlier alarm must cut that sleep short. `arm(None)`
/// disarms, after which `sleep` only returns once something re-arms.
pub trait ClockSource: Send + Sync {
    fn now(&self) -> Instant;

    fn arm(&self, at: Option<Instant>);

    /// Park the dispatch thread until the armed instant has been reached.
    /// Spurious early returns are allowed.
    fn sleep(&self);
}

/// Host monotonic clock backed by `std::time::Instant`.
#[derive(Debug)]
pub struct SystemClock {
    epoch: std::time::Instant,
    alarm: Mutex<Option<Instant>>,
    cv: Condvar,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            epoch: std::time::Instant::now(),
            alarm: Mutex::new(None),
            cv: Condvar::new(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for SystemClock {
    fn now(&self) -> Instant {
        let us = self.epoch.elapsed().as_micros();
        Instant::from_micros(u64::try_from(us).unwrap_or(u64::MAX))
    }

    fn arm(&self, at: Option<Instant>) {
        *self.alarm.lock() = at;
        self.cv.notify_all();
    }

    fn sleep(&self) {
        let mut alarm = self.alarm.lock();
        loop {
            match *alarm {
                None => self.cv.wait(&mut alarm),
                Some(at) => {
                    let left = at.saturating_since(self.now());
                    let Some(wait) = left.to_std().filter(|w| !w.is_zero()) else {
                        return;
                    };
                    let _ = self.cv.wait_for(&mut alarm, wait);
                }
            }
        }
    }
}

/// Virtual clock for tests and simulations. Time only moves when told to, or
/// when the dispatch loop sleeps: `sleep` jumps straight to the armed instant.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_us: AtomicU64,
    alarm: Mutex<Option<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(t: Instant) -> Self {
        Self {
            now_us: AtomicU64::new(t.as_micros()),
            alarm: Mutex::new(None),
        }
    }

    /// Negative durations are ignored; time never runs backwards.
    pub fn advance(&self, d: Duration) {
        if let Ok(us) = u64::try_from(d.as_micros()) {
            let _ = self
                .now_us
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |t| Some(t.saturating_add(us)));
        }
    }

    pub fn set(&self, t: Instant) {
        self.now_us.fetch_max(t.as_micros(), Ordering::SeqCst);
    }

    pub fn alarm(&self) -> Option<Instant> {
        *self.alarm.lock()
    }
}

impl ClockSource for ManualClock {
    fn now(&self) -> Instant {
        Instant::from_micros(self.now_us.load(Ordering::SeqCst))
    }

    fn arm(&self, at: Option<Instant>) {
        *self.alarm.lock() = at;
    }

    fn sleep(&self) {
        if let Some(at) = *self.alarm.lock() {
            self.set(at);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::milliseconds;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn manual_clock_jumps_to_alarm() {
        let clock = ManualClock::new();
        clock.advance(milliseconds(5));
        assert_eq!(clock.now(), Instant::from_micros(5_000));

        clock.arm(Some(Instant::from_micros(12_000)));
        clock.sleep();
        assert_eq!(clock.now(), Instant::from_micros(12_000));

        // an alarm in the past never rewinds
        clock.arm(Some(Instant::from_micros(1_000)));
        clock.sleep();
        assert_eq!(clock.now(), Instant::from_micros(12_000));

        clock.arm(None);
        clock.sleep();
        assert_eq!(clock.now(), Instant::from_micros(12_000));
        clock.advance(milliseconds(-3));
        assert_eq!(clock.now(), Instant::from_micros(12_000));
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        thread::sleep(std::time::Duration::from_millis(2));
        let b = clock.now();
        assert!(b >= a + milliseconds(2));
    }

    #[test]
    fn system_clock_sleeps_until_alarm() {
        let clock = SystemClock::new();
        let start = clock.now();
        clock.arm(Some(start + milliseconds(15)));
        clock.sleep();
        assert!(clock.now() >= start + milliseconds(15));
    }

    #[test]
    fn system_clock_rearm_cuts_sleep_short() {
        let clock = Arc::new(SystemClock::new());
        clock.arm(None);

        let sleeper = {
            let clock = clock.clone();
            thread::spawn(move || {
                clock.sleep();
                clock.now()
            })
        };

        thread::sleep(std::time::Duration::from_millis(10));
        let armed_at = clock.now();
        clock.arm(Some(armed_at));
        let woke = sleeper.join().unwrap();
        assert!(woke >= armed_at);
        assert!(woke < armed_at + milliseconds(1_000));
    }
}
