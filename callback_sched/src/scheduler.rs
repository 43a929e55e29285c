// src/scheduler.rs
use crate::builder::{CallbackBuilder, Timing};
use crate::clock::ClockSource;
use crate::entry::{Action, Entry, EntryState, Handle, Slab};
use crate::errors::{Result, SchedError};
use crate::queue::PendingQueue;
use crate::time::{Duration, Instant, milliseconds};
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Upper bound on live entries (pending + executing).
    pub capacity: usize,
    /// Window applied when a post does not set a tolerance.
    pub default_tolerance: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            capacity: 64,
            default_tolerance: milliseconds(10),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub posted: u64,
    pub executed: u64,
    pub cancelled: u64,
    /// Periodic re-insertions after a run.
    pub rearmed: u64,
    /// Runs that started after their window closed.
    pub late: u64,
    pub rejected: u64,
}

/// The entry the dispatch loop is invoking right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentRun {
    pub handle: Handle,
    pub earliest: Instant,
    pub latest: Instant,
    /// 1 for the first run of the entry.
    pub run: u64,
}

/// State shared by producers and the dispatch loop; always behind the lock.
#[derive(Debug)]
pub(crate) struct Core {
    pub slab: Slab,
    pub queue: PendingQueue,
    /// Last instant handed to the clock source.
    pub armed: Option<Instant>,
    pub stats: SchedulerStats,
    pub executing: Option<CurrentRun>,
    pub draining: bool,
    pub stopping: bool,
}

impl Core {
    /// Point the clock at the current head of the queue.
    pub fn rearm(&mut self, clock: &dyn ClockSource) {
        let head = self.queue.next_instant();
        self.arm(clock, head);
    }

    pub fn arm(&mut self, clock: &dyn ClockSource, at: Option<Instant>) {
        if self.armed != at {
            self.armed = at;
            clock.arm(at);
        }
    }
}

struct Inner {
    clock: Arc<dyn ClockSource>,
    config: SchedulerConfig,
    core: Mutex<Core>,
}

/// Cooperative callback scheduler.
///
/// Cheap to clone; clones share one queue. Any thread may post, cancel or
/// reconfigure; only the thread running [`run`](Scheduler::run) (or
/// [`dispatch_due`](Scheduler::dispatch_due)) ever invokes actions, one at a
/// time and to completion. The internal lock is held for queue bookkeeping
/// only, never while an action runs, so actions are free to post and cancel.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn new(clock: Arc<dyn ClockSource>, config: SchedulerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                clock,
                config,
                core: Mutex::new(Core {
                    slab: Slab::new(config.capacity),
                    queue: PendingQueue::with_capacity(config.capacity),
                    armed: None,
                    stats: SchedulerStats::default(),
                    executing: None,
                    draining: false,
                    stopping: false,
                }),
            }),
        }
    }

    pub fn with_clock(clock: Arc<dyn ClockSource>) -> Self {
        Self::new(clock, SchedulerConfig::default())
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    pub fn now(&self) -> Instant {
        self.inner.clock.now()
    }

    pub(crate) fn clock(&self) -> &dyn ClockSource {
        &*self.inner.clock
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Core> {
        self.inner.core.lock()
    }

    /// Queue `action` to run as soon as possible with the default tolerance.
    /// The returned builder adjusts delay, tolerance and period in place.
    pub fn post<F>(&self, action: F) -> Result<CallbackBuilder<'_>>
    where
        F: FnMut() + Send + 'static,
    {
        let handle = self.insert(Box::new(action), Timing::now())?;
        Ok(CallbackBuilder::new(self, handle))
    }

    /// Queue `action` with its complete timing in one step.
    pub fn post_with<F>(&self, timing: Timing, action: F) -> Result<Handle>
    where
        F: FnMut() + Send + 'static,
    {
        let timing = timing.validate()?;
        self.insert(Box::new(action), timing)
    }

    fn insert(&self, action: Action, timing: Timing) -> Result<Handle> {
        let tolerance = timing
            .tolerance
            .unwrap_or(self.inner.config.default_tolerance);

        let mut guard = self.lock();
        let core = &mut *guard;
        if core.slab.len() >= core.slab.capacity() {
            core.stats.rejected += 1;
            let capacity = core.slab.capacity();
            drop(guard);
            warn!(capacity, "post rejected: callback slab full");
            return Err(SchedError::ResourceExhausted { capacity });
        }

        let earliest = self.now() + timing.delay;
        let handle = core
            .slab
            .insert(Entry::new(action, earliest, tolerance, timing.period))?;
        core.queue.push(handle, earliest);
        core.stats.posted += 1;
        core.rearm(self.clock());
        drop(guard);

        trace!(%handle, %earliest, %tolerance, period = ?timing.period, "posted");
        Ok(handle)
    }

    /// Withdraw a posted callback. A pending entry never runs; an executing
    /// one finishes but is not re-armed. Stale handles are ignored.
    pub fn cancel(&self, handle: Handle) {
        let mut guard = self.lock();
        let core = &mut *guard;
        let state = match core.slab.get(handle) {
            Some(e) => e.state,
            None => {
                drop(guard);
                trace!(%handle, "cancel ignored: stale handle");
                return;
            }
        };

        let removed = match state {
            EntryState::Pending => {
                core.queue.remove(handle);
                core.stats.cancelled += 1;
                let removed = core.slab.remove(handle);
                core.rearm(self.clock());
                removed
            }
            EntryState::Executing => {
                if let Some(e) = core.slab.get_mut(handle) {
                    e.state = EntryState::Cancelled;
                    // a one-shot run completes anyway; only a periodic one loses future runs
                    if e.period.is_some() {
                        core.stats.cancelled += 1;
                    }
                }
                None
            }
            EntryState::Cancelled | EntryState::Retired => None,
        };
        // the action may own arbitrary state; release it outside the lock
        drop(guard);
        drop(removed);
        trace!(%handle, ?state, "cancelled");
    }

    /// Apply a builder change to an entry that has not run yet.
    pub(crate) fn reconfigure(&self, handle: Handle, what: &'static str, apply: impl FnOnce(&mut Entry)) {
        let mut guard = self.lock();
        let core = &mut *guard;
        let outcome = match core.slab.get_mut(handle) {
            Some(e) if e.state == EntryState::Pending && e.runs == 0 => {
                let before = e.earliest;
                apply(e);
                Some((e.earliest != before).then_some(e.earliest))
            }
            _ => None,
        };
        match outcome {
            Some(Some(at)) => {
                debug_assert!(core.queue.contains(handle));
                core.queue.push(handle, at);
                core.rearm(self.clock());
            }
            Some(None) => {}
            None => {
                drop(guard);
                debug!(%handle, what, "builder change ignored: entry no longer pending");
            }
        }
    }

    /// `Retired` for handles whose entry is gone (finished, cancelled or unknown).
    pub fn status(&self, handle: Handle) -> EntryState {
        self.lock()
            .slab
            .get(handle)
            .map_or(EntryState::Retired, |e| e.state)
    }

    /// Entries waiting in the queue (excludes one currently executing).
    pub fn pending(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn next_wakeup(&self) -> Option<Instant> {
        self.lock().queue.next_instant()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.lock().stats
    }

    /// Window of the callback being invoked; `Some` only from inside an action.
    pub fn current(&self) -> Option<CurrentRun> {
        self.lock().executing
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Scheduler");
        d.field("config", &self.inner.config);
        if let Some(core) = self.inner.core.try_lock() {
            d.field("pending", &core.queue.len())
                .field("live", &core.slab.len())
                .field("armed", &core.armed);
        }
        d.finish_non_exhaustive()
    }
}
