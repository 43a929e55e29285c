// src/lib.rs
//! Cooperative callback scheduler.
//!
//! Code anywhere (including interrupt-like contexts on other threads) posts
//! zero-argument callbacks to run once after a delay or repeatedly at a
//! period. Callbacks run serially, to completion, on the single thread that
//! drives the dispatch loop, so state shared only between callbacks needs no
//! locking.
//!
//! ```no_run
//! use callback_sched::{Scheduler, SystemClock, milliseconds};
//! use std::sync::Arc;
//!
//! let sched = Scheduler::with_clock(Arc::new(SystemClock::new()));
//! let blink = sched
//!     .post(|| println!("tick"))?
//!     .delay(milliseconds(100))?
//!     .period(milliseconds(500))?
//!     .handle();
//!
//! let worker = {
//!     let sched = sched.clone();
//!     std::thread::spawn(move || sched.run())
//! };
//! std::thread::sleep(std::time::Duration::from_secs(2));
//! sched.cancel(blink);
//! sched.shutdown();
//! worker.join().unwrap();
//! # Ok::<(), callback_sched::SchedError>(())
//! ```

mod builder;
mod clock;
mod dispatch;
mod entry;
mod errors;
mod global;
mod queue;
mod scheduler;
mod time;

pub use builder::{CallbackBuilder, Timing};
pub use clock::{ClockSource, ManualClock, SystemClock};
pub use entry::{EntryState, Handle};
pub use errors::{Result, SchedError};
pub use global::{cancel_callback, install, post_callback, scheduler};
pub use scheduler::{CurrentRun, Scheduler, SchedulerConfig, SchedulerStats};
pub use time::{Duration, Instant, microseconds, milliseconds, seconds};
