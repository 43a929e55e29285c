// src/queue.rs
use crate::entry::Handle;
use crate::time::Instant;
use priority_queue::PriorityQueue;
use std::cmp::Reverse;

/// Ordering key: earliest instant first, then insertion order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct Key {
    earliest: Instant,
    seq: u64,
}

/// Pending entries ordered by their earliest execution instant (FIFO among
/// equals). Holds handles only; the entries themselves live in the slab.
#[derive(Debug)]
pub(crate) struct PendingQueue {
    heap: PriorityQueue<Handle, Reverse<Key>>,
    next_seq: u64,
}

impl PendingQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            heap: PriorityQueue::with_capacity(capacity),
            next_seq: 0,
        }
    }

    fn key(&mut self, earliest: Instant) -> Reverse<Key> {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        Reverse(Key { earliest, seq })
    }

    /// Insert, or move an already queued handle to the back of its new slot.
    pub fn push(&mut self, handle: Handle, earliest: Instant) {
        let key = self.key(earliest);
        self.heap.push(handle, key);
    }

    pub fn remove(&mut self, handle: Handle) -> bool {
        self.heap.remove(&handle).is_some()
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.heap.get(&handle).is_some()
    }

    pub fn peek(&self) -> Option<(Handle, Instant)> {
        self.heap.peek().map(|(h, Reverse(k))| (*h, k.earliest))
    }

    pub fn next_instant(&self) -> Option<Instant> {
        self.peek().map(|(_, at)| at)
    }

    /// Pop the head if its window has opened by `horizon`.
    pub fn pop_due(&mut self, horizon: Instant) -> Option<Handle> {
        match self.peek() {
            Some((_, at)) if at <= horizon => self.heap.pop().map(|(h, _)| h),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{Entry, Slab};
    use crate::time::milliseconds;
    use proptest::prelude::*;

    fn handles(n: usize) -> (Slab, Vec<Handle>) {
        let mut slab = Slab::new(n.max(1));
        let hs = (0..n)
            .map(|_| {
                slab.insert(Entry::new(Box::new(|| {}), Instant::ZERO, milliseconds(10), None))
                    .unwrap()
            })
            .collect();
        (slab, hs)
    }

    fn at(ms: u64) -> Instant {
        Instant::from_micros(ms * 1_000)
    }

    #[test]
    fn pops_in_time_order_only_when_due() {
        let (_slab, h) = handles(3);
        let mut q = PendingQueue::with_capacity(3);
        q.push(h[0], at(30));
        q.push(h[1], at(10));
        q.push(h[2], at(20));

        assert_eq!(q.next_instant(), Some(at(10)));
        assert_eq!(q.pop_due(at(5)), None);
        assert_eq!(q.pop_due(at(25)), Some(h[1]));
        assert_eq!(q.pop_due(at(25)), Some(h[2]));
        assert_eq!(q.pop_due(at(25)), None);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn equal_instants_are_fifo() {
        let (_slab, h) = handles(4);
        let mut q = PendingQueue::with_capacity(4);
        for &x in &h {
            q.push(x, at(7));
        }
        let order: Vec<_> = std::iter::from_fn(|| q.pop_due(at(7))).collect();
        assert_eq!(order, h);
    }

    #[test]
    fn remove_and_reschedule() {
        let (_slab, h) = handles(3);
        let mut q = PendingQueue::with_capacity(3);
        q.push(h[0], at(1));
        q.push(h[1], at(2));
        q.push(h[2], at(3));

        assert!(q.remove(h[0]));
        assert!(!q.remove(h[0]));
        assert!(!q.contains(h[0]));

        // moving h[1] behind h[2]
        q.push(h[1], at(3));
        assert_eq!(q.len(), 2);
        assert_eq!(q.pop_due(at(3)), Some(h[2]));
        assert_eq!(q.pop_due(at(3)), Some(h[1]));
        assert_eq!(q.len(), 0);
    }

    proptest! {
        #[test]
        fn drain_is_sorted_by_instant_then_insertion(instants in proptest::collection::vec(0u64..8, 1..48)) {
            let (_slab, h) = handles(instants.len());
            let mut q = PendingQueue::with_capacity(instants.len());
            for (i, &t) in instants.iter().enumerate() {
                q.push(h[i], at(t));
            }

            let mut expected: Vec<(u64, usize)> = instants.iter().copied().zip(0..).collect();
            expected.sort();
            let drained: Vec<Handle> = std::iter::from_fn(|| q.pop_due(at(u64::MAX / 1_000))).collect();
            let expected: Vec<Handle> = expected.into_iter().map(|(_, i)| h[i]).collect();
            prop_assert_eq!(drained, expected);
        }
    }
}
