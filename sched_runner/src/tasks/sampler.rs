// tasks/sampler.rs
// Periodic sensor sampler: records how far each run landed from its window.
use crate::config::{SamplerConfig, millis};
use crate::errors::RunnerError;
use crate::logging::csv;
use callback_sched::{CurrentRun, Duration, Handle, Instant, post_callback, scheduler};
use tracing::{trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    /// Start time minus the earliest allowed instant.
    pub lateness: Duration,
    /// Interval since the previous run minus the period (zero for the first).
    pub period_error: Duration,
    /// Started after the window closed.
    pub missed: bool,
}

impl Sample {
    pub fn measure(run: &CurrentRun, now: Instant, prev: Option<Instant>, period: Duration) -> Self {
        Self {
            lateness: now - run.earliest,
            period_error: prev.map_or(Duration::ZERO, |p| (now - p) - period),
            missed: now > run.latest,
        }
    }
}

pub fn spawn(cfg: &SamplerConfig) -> Result<Handle, RunnerError> {
    let name = cfg.name.clone();
    let period = millis(cfg.period_ms);
    let work = std::time::Duration::from_micros(cfg.work_us);
    let mut prev: Option<Instant> = None;

    let builder = post_callback(move || {
        let s = scheduler();
        let now = s.now();
        let Some(run) = s.current() else { return };

        let m = Sample::measure(&run, now, prev, period);
        prev = Some(now);
        if m.missed {
            warn!(task = %name, run = run.run, lateness = %m.lateness, "sample started after its window");
        } else {
            trace!(task = %name, run = run.run, lateness = %m.lateness);
        }
        csv::log_dispatch(
            &name,
            run.run,
            run.earliest.as_micros(),
            now.as_micros(),
            m.lateness.as_micros(),
            m.period_error.as_micros(),
        );

        if !work.is_zero() {
            std::thread::sleep(work);
        }
    })?;

    let h = builder
        .delay(period)?
        .tolerance(millis(cfg.tolerance_ms))?
        .period(period)?
        .handle();
    Ok(h)
}
