// irq/mod.rs
// Simulated noisy interrupt line. Each edge restarts a debounce callback, so
// the settle action only runs once the line has been quiet for `debounce_ms`.
use crate::config::{IrqConfig, millis};
use crate::errors::RunnerError;
use crate::logging::csv;
use callback_sched::{Duration, EntryState, Handle, Scheduler, Timing, scheduler};
use rand::{SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Exp};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct Debounce {
    settle: Duration,
    tolerance: Duration,
    pending: Option<Handle>,
    edges: u64,
    settled: Arc<AtomicU64>,
}

impl Debounce {
    pub fn new(cfg: &IrqConfig) -> Self {
        Self {
            settle: millis(cfg.debounce_ms),
            tolerance: millis(cfg.debounce_tolerance_ms),
            pending: None,
            edges: 0,
            settled: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn settled(&self) -> u64 {
        self.settled.load(Ordering::Relaxed)
    }

    /// Handle one edge: drop the pending settle callback (if it has not
    /// started) and post a fresh one.
    pub fn edge(&mut self, s: &Scheduler) -> Result<Handle, RunnerError> {
        self.edges += 1;
        if let Some(prev) = self.pending.take() {
            if s.status(prev) == EntryState::Pending {
                s.cancel(prev);
                csv::log_irq("cancel", &prev.to_string(), "bounce");
            }
        }

        let edges = self.edges;
        let settled = self.settled.clone();
        let h = s.post_with(Timing::after(self.settle).with_tolerance(self.tolerance), move || {
            let n = settled.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(edges, settled = n, "irq line settled");
            csv::log_irq("settled", "-", &format!("edges={edges}"));
        })?;
        self.pending = Some(h);
        csv::log_irq("edge", &h.to_string(), &format!("n={edges}"));
        Ok(h)
    }
}

/// Spawn the edge generator on the tokio runtime. Gaps between edges are
/// exponentially distributed around `mean_interval_ms`.
pub fn spawn(cfg: IrqConfig) -> Option<JoinHandle<()>> {
    if !cfg.enabled {
        info!("irq source disabled");
        return None;
    }
    Some(tokio::spawn(async move {
        let gaps = match Exp::new(1.0 / cfg.mean_interval_ms) {
            Ok(d) => d,
            Err(e) => {
                warn!(?e, "bad irq interval; source not started");
                return;
            }
        };
        let mut rng = StdRng::from_os_rng();
        let mut debounce = Debounce::new(&cfg);
        loop {
            let gap_ms: f64 = gaps.sample(&mut rng);
            tokio::time::sleep(std::time::Duration::from_secs_f64(gap_ms / 1_000.0)).await;
            if let Err(e) = debounce.edge(scheduler()) {
                warn!(%e, "irq edge dropped");
            }
        }
    }))
}
