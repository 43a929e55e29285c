// tasks/heartbeat.rs
use crate::errors::RunnerError;
use crate::logging::csv;
use crate::config::millis;
use callback_sched::{Handle, Timing, scheduler};
use tracing::info;

/// Periodic status line plus a CSV flush.
pub fn spawn(period_ms: u64) -> Result<Handle, RunnerError> {
    let period = millis(period_ms);
    let h = scheduler().post_with(Timing::every(period), || {
        let s = scheduler();
        let st = s.stats();
        info!(
            pending = s.pending(),
            posted = st.posted,
            executed = st.executed,
            cancelled = st.cancelled,
            late = st.late,
            rejected = st.rejected,
            "heartbeat"
        );
        csv::flush();
    })?;
    Ok(h)
}
