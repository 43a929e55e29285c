// src/dispatch.rs
//! The dispatch loop: the only code path that invokes posted actions.

use crate::entry::{Action, EntryState, Handle};
use crate::scheduler::{CurrentRun, Scheduler};
use crate::time::Instant;
use tracing::{debug, info, warn};

/// Clears the draining flag and re-arms the clock, also when an action panics.
struct DrainGuard<'a>(&'a Scheduler);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        let mut core = self.0.lock();
        core.draining = false;
        core.executing = None;
        core.rearm(self.0.clock());
    }
}

impl Scheduler {
    /// Run every entry whose window opened by now, in order, then arm the
    /// clock for the next head. Returns the number of actions invoked.
    ///
    /// Only one drain runs at a time: a nested call from inside an action,
    /// or a second thread racing the loop, gets 0.
    pub fn dispatch_due(&self) -> usize {
        let horizon = {
            let mut core = self.lock();
            if core.draining {
                drop(core);
                warn!("dispatch_due re-entered while a drain is running; ignored");
                return 0;
            }
            core.draining = true;
            self.now()
        };
        let _guard = DrainGuard(self);

        let mut ran = 0;
        while let Some((handle, mut action)) = self.begin(horizon) {
            action();
            self.finish(handle, action);
            ran += 1;
        }
        ran
    }

    /// Pop the next due entry and move it to `Executing`. This transition is
    /// the cancellation boundary.
    fn begin(&self, horizon: Instant) -> Option<(Handle, Action)> {
        let mut guard = self.lock();
        let core = &mut *guard;
        while let Some(handle) = core.queue.pop_due(horizon) {
            let Some(entry) = core.slab.get_mut(handle) else {
                debug_assert!(false, "queued handle {handle} has no entry");
                continue;
            };
            let Some(action) = entry.action.take() else {
                debug_assert!(false, "queued entry {handle} has no action");
                continue;
            };
            entry.state = EntryState::Executing;

            let now = self.now();
            let latest = entry.latest();
            if now > latest {
                core.stats.late += 1;
                debug!(%handle, late_by = %(now - latest), runs = entry.runs, "callback started after its window");
            }
            core.executing = Some(CurrentRun {
                handle,
                earliest: entry.earliest,
                latest,
                run: entry.runs + 1,
            });
            return Some((handle, action));
        }
        None
    }

    /// Re-arm a periodic entry one period after its previous window, or
    /// retire it.
    fn finish(&self, handle: Handle, action: Action) {
        let mut guard = self.lock();
        let core = &mut *guard;
        core.stats.executed += 1;
        core.executing = None;

        let Some(entry) = core.slab.get_mut(handle) else {
            return;
        };
        entry.runs += 1;
        let retired = match (entry.state, entry.period) {
            (EntryState::Executing, Some(period)) => {
                entry.earliest += period;
                entry.state = EntryState::Pending;
                entry.action = Some(action);
                let next = entry.earliest;
                core.queue.push(handle, next);
                core.stats.rearmed += 1;
                None
            }
            _ => Some((core.slab.remove(handle), action)),
        };
        drop(guard);
        drop(retired);
    }

    /// Drain, sleep on the clock, repeat. Returns only after [`shutdown`].
    ///
    /// Meant for clocks whose `sleep` blocks (e.g. `SystemClock`); drive a
    /// `ManualClock` with [`run_until`](Scheduler::run_until) instead.
    ///
    /// [`shutdown`]: Scheduler::shutdown
    pub fn run(&self) {
        info!(capacity = self.config().capacity, "dispatch loop started");
        loop {
            self.dispatch_due();
            if self.lock().stopping {
                break;
            }
            self.clock().sleep();
        }
        self.lock().stopping = false;
        let stats = self.stats();
        info!(executed = stats.executed, pending = self.pending(), "dispatch loop stopped");
    }

    /// Run the loop until the clock reaches `deadline` (or `shutdown`).
    /// With a `ManualClock` this simulates the elapsed time instantly.
    pub fn run_until(&self, deadline: Instant) -> usize {
        let mut ran = 0;
        loop {
            ran += self.dispatch_due();
            if self.now() >= deadline {
                break;
            }
            {
                let mut core = self.lock();
                if core.stopping {
                    break;
                }
                let target = core
                    .queue
                    .next_instant()
                    .map_or(deadline, |head| head.min(deadline));
                core.arm(self.clock(), Some(target));
            }
            self.clock().sleep();
        }
        self.lock().rearm(self.clock());
        ran
    }

    /// Ask [`run`](Scheduler::run) to return once the current drain is done.
    pub fn shutdown(&self) {
        let mut core = self.lock();
        core.stopping = true;
        let now = self.now();
        core.arm(self.clock(), Some(now));
        drop(core);
        debug!("dispatch loop shutdown requested");
    }
}
