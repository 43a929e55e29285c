// src/builder.rs
use crate::entry::Handle;
use crate::errors::{Result, check_delay, check_period, check_tolerance};
use crate::scheduler::Scheduler;
use crate::time::Duration;

/// Chainable view over a freshly posted, already queued callback.
///
/// The entry is visible to the dispatch loop before the first builder call
/// returns. Producers that post from another thread and need a delay should
/// prefer [`Scheduler::post_with`], which commits the whole [`Timing`] at once.
#[derive(Debug)]
pub struct CallbackBuilder<'a> {
    scheduler: &'a Scheduler,
    handle: Handle,
}

impl<'a> CallbackBuilder<'a> {
    pub(crate) fn new(scheduler: &'a Scheduler, handle: Handle) -> Self {
        Self { scheduler, handle }
    }

    /// Earliest run becomes `now + d`.
    pub fn delay(self, d: Duration) -> Result<Self> {
        let d = check_delay(d)?;
        let now = self.scheduler.now();
        self.scheduler
            .reconfigure(self.handle, "delay", |e| e.earliest = now + d);
        Ok(self)
    }

    /// Window closes `t` after the earliest instant.
    pub fn tolerance(self, t: Duration) -> Result<Self> {
        let t = check_tolerance(t)?;
        self.scheduler
            .reconfigure(self.handle, "tolerance", |e| e.tolerance = t);
        Ok(self)
    }

    /// Re-arm every `p` after each run, phase-locked to the first window.
    pub fn period(self, p: Duration) -> Result<Self> {
        let p = check_period(p)?;
        self.scheduler
            .reconfigure(self.handle, "period", |e| e.period = Some(p));
        Ok(self)
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }
}

impl From<CallbackBuilder<'_>> for Handle {
    fn from(b: CallbackBuilder<'_>) -> Handle {
        b.handle
    }
}

/// Complete timing for [`Scheduler::post_with`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Timing {
    pub delay: Duration,
    /// `None` falls back to the scheduler's default tolerance.
    pub tolerance: Option<Duration>,
    pub period: Option<Duration>,
}

impl Timing {
    pub fn now() -> Self {
        Self::default()
    }

    pub fn after(delay: Duration) -> Self {
        Self { delay, ..Self::default() }
    }

    /// First run one period from now.
    pub fn every(period: Duration) -> Self {
        Self {
            delay: period,
            period: Some(period),
            ..Self::default()
        }
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        Self { delay, ..self }
    }

    pub fn with_tolerance(self, tolerance: Duration) -> Self {
        Self { tolerance: Some(tolerance), ..self }
    }

    pub fn with_period(self, period: Duration) -> Self {
        Self { period: Some(period), ..self }
    }

    pub(crate) fn validate(self) -> Result<Self> {
        check_delay(self.delay)?;
        if let Some(t) = self.tolerance {
            check_tolerance(t)?;
        }
        if let Some(p) = self.period {
            check_period(p)?;
        }
        Ok(self)
    }
}
