// src/entry.rs
//! Callback entries and the generation-tagged slab that owns them.

use crate::errors::{Result, SchedError};
use crate::time::{Duration, Instant};
use std::collections::VecDeque;
use std::fmt;

/// Zero-argument unit of work. `FnMut` so a periodic entry can run it again.
pub type Action = Box<dyn FnMut() + Send + 'static>;

/// Freed slots wait behind this many other freed slots before reuse, unless
/// the slab is at capacity.
const RECYCLE_DELAY: usize = 16;

/// Opaque reference to a posted callback. Only good for cancellation and
/// status queries; a handle outliving its entry is simply ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    pub const fn index(self) -> u32 {
        self.index
    }

    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryState {
    Pending,
    Executing,
    /// Cancel arrived while executing; dropped once the action returns.
    Cancelled,
    /// Finished, cancelled while pending, or never existed.
    Retired,
}

pub(crate) struct Entry {
    /// Taken out while the action runs.
    pub action: Option<Action>,
    pub earliest: Instant,
    pub tolerance: Duration,
    pub period: Option<Duration>,
    pub state: EntryState,
    pub runs: u64,
}

impl Entry {
    pub fn new(action: Action, earliest: Instant, tolerance: Duration, period: Option<Duration>) -> Self {
        Self {
            action: Some(action),
            earliest,
            tolerance,
            period,
            state: EntryState::Pending,
            runs: 0,
        }
    }

    pub fn latest(&self) -> Instant {
        self.earliest + self.tolerance
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("earliest", &self.earliest)
            .field("tolerance", &self.tolerance)
            .field("period", &self.period)
            .field("state", &self.state)
            .field("runs", &self.runs)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

#[derive(Debug)]
pub(crate) struct Slab {
    slots: Vec<Slot>,
    free: VecDeque<u32>,
    capacity: usize,
    live: usize,
}

impl Slab {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: VecDeque::new(),
            capacity: capacity.min(u32::MAX as usize),
            live: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn insert(&mut self, entry: Entry) -> Result<Handle> {
        if self.live >= self.capacity {
            return Err(SchedError::ResourceExhausted { capacity: self.capacity });
        }
        let can_grow = self.slots.len() < self.capacity;
        let index = match self.free.front() {
            Some(_) if self.free.len() > RECYCLE_DELAY || !can_grow => self.free.pop_front(),
            _ => None,
        };
        let index = match index {
            Some(i) => i,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
        };

        let slot = &mut self.slots[index as usize];
        debug_assert!(slot.entry.is_none(), "recycled a live slot");
        slot.entry = Some(entry);
        self.live += 1;
        Ok(Handle { index, generation: slot.generation })
    }

    fn slot(&self, h: Handle) -> Option<&Slot> {
        self.slots
            .get(h.index as usize)
            .filter(|s| s.generation == h.generation)
    }

    pub fn get(&self, h: Handle) -> Option<&Entry> {
        self.slot(h).and_then(|s| s.entry.as_ref())
    }

    pub fn get_mut(&mut self, h: Handle) -> Option<&mut Entry> {
        self.slots
            .get_mut(h.index as usize)
            .filter(|s| s.generation == h.generation)
            .and_then(|s| s.entry.as_mut())
    }

    /// Retire the entry and invalidate every copy of its handle.
    pub fn remove(&mut self, h: Handle) -> Option<Entry> {
        let slot = self
            .slots
            .get_mut(h.index as usize)
            .filter(|s| s.generation == h.generation)?;
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push_back(h.index);
        self.live -= 1;
        Some(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::milliseconds;

    fn entry() -> Entry {
        Entry::new(Box::new(|| {}), Instant::ZERO, milliseconds(10), None)
    }

    #[test]
    fn latest_is_earliest_plus_tolerance() {
        let e = Entry::new(Box::new(|| {}), Instant::from_micros(1_000), milliseconds(10), None);
        assert_eq!(e.latest(), Instant::from_micros(11_000));
        assert_eq!(e.state, EntryState::Pending);
    }

    #[test]
    fn stale_handle_misses_after_remove() {
        let mut slab = Slab::new(4);
        let h = slab.insert(entry()).unwrap();
        assert!(slab.get(h).is_some());
        assert!(slab.remove(h).is_some());
        assert!(slab.get(h).is_none());
        assert!(slab.remove(h).is_none());
        assert_eq!(slab.len(), 0);
    }

    #[test]
    fn capacity_is_enforced_and_recovers() {
        let mut slab = Slab::new(2);
        let a = slab.insert(entry()).unwrap();
        let _b = slab.insert(entry()).unwrap();
        assert_eq!(
            slab.insert(entry()).unwrap_err(),
            SchedError::ResourceExhausted { capacity: 2 }
        );

        slab.remove(a);
        // at capacity the freed slot is reused at once, with a new generation
        let c = slab.insert(entry()).unwrap();
        assert_eq!(c.index(), a.index());
        assert_ne!(c.generation(), a.generation());
        assert!(slab.get(a).is_none());
        assert!(slab.get(c).is_some());
    }

    #[test]
    fn freed_slots_are_not_reused_immediately() {
        let mut slab = Slab::new(1024);
        let first = slab.insert(entry()).unwrap();
        slab.remove(first);

        let mut reused_after = None;
        for n in 1..=RECYCLE_DELAY + 2 {
            let h = slab.insert(entry()).unwrap();
            if h.index() == first.index() {
                reused_after = Some(n);
                break;
            }
            slab.remove(h);
        }
        let n = reused_after.expect("slot never recycled");
        assert!(n > RECYCLE_DELAY, "slot reused after only {n} inserts");
    }

    #[test]
    fn handle_display() {
        let mut slab = Slab::new(1);
        let h = slab.insert(entry()).unwrap();
        assert_eq!(h.to_string(), "#0.0");
    }
}
