// src/global.rs
//! Process-wide scheduler for code (drivers, interrupt handlers) that has no
//! scheduler reference threaded through to it.

use crate::builder::CallbackBuilder;
use crate::clock::SystemClock;
use crate::entry::Handle;
use crate::errors::Result;
use crate::scheduler::{Scheduler, SchedulerConfig};
use once_cell::sync::OnceCell;
use std::sync::Arc;

static GLOBAL: OnceCell<Scheduler> = OnceCell::new();

/// Install the process scheduler. Fails (handing it back) if one is already
/// installed, including the default one created by an earlier [`scheduler`].
pub fn install(s: Scheduler) -> std::result::Result<(), Scheduler> {
    GLOBAL.set(s)
}

/// The process scheduler; a `SystemClock` one with default config unless
/// [`install`] ran first.
pub fn scheduler() -> &'static Scheduler {
    GLOBAL.get_or_init(|| Scheduler::new(Arc::new(SystemClock::new()), SchedulerConfig::default()))
}

pub fn post_callback<F>(action: F) -> Result<CallbackBuilder<'static>>
where
    F: FnMut() + Send + 'static,
{
    scheduler().post(action)
}

pub fn cancel_callback(handle: Handle) {
    scheduler().cancel(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryState;
    use crate::time::milliseconds;

    // The cell is process-wide, so everything lives in one test.
    #[test]
    fn global_post_and_cancel() {
        let first = scheduler();
        assert!(install(Scheduler::with_clock(Arc::new(SystemClock::new()))).is_err());
        assert!(std::ptr::eq(first, scheduler()));

        let h = post_callback(|| {})
            .unwrap()
            .delay(milliseconds(60_000))
            .unwrap()
            .handle();
        assert_eq!(scheduler().status(h), EntryState::Pending);
        cancel_callback(h);
        cancel_callback(h);
        assert_eq!(scheduler().status(h), EntryState::Retired);
    }
}
