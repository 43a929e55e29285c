pub mod heartbeat;
pub mod sampler;

use crate::config::Config;
use crate::errors::RunnerError;
use tracing::info;

/// Register every periodic task on the process scheduler. Must run before the
/// dispatch loop starts so builder changes land before any first run.
pub fn spawn_all(cfg: &Config) -> Result<(), RunnerError> {
    for s in &cfg.samplers {
        let h = sampler::spawn(s)?;
        info!(task = %s.name, handle = %h, period_ms = s.period_ms, "sampler registered");
    }
    heartbeat::spawn(cfg.heartbeat_ms)?;
    Ok(())
}
