//! Per-worker work ranges.
//!
//! Every worker owns a [`WorkerSlot`] describing the half-open interval
//! `[range_start, range_end)` it still has to process. The owner consumes
//! indices from the front, thieves take them from the back. `range_length`
//! arbitrates between the two: an index may only be taken after successfully
//! decrementing the length from a positive value, so the number of claims
//! never exceeds the number of indices the slot was assigned.
//!
//! Because the length is decremented *before* `range_start`/`range_end`
//! move, `range_length <= range_end - range_start` holds at every instant.
//! The two can disagree transiently, which is why a claim only trusts the
//! length counter.

use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Cache line size assumed for padding and alignment checks.
pub const CACHE_LINE_SIZE: usize = 64;

/// Work range of a single worker.
///
/// The pool stores slots inside [`crossbeam::utils::CachePadded`] so that no
/// two slots share a cache line.
#[derive(Debug)]
pub struct WorkerSlot {
    range_start: AtomicUsize,
    range_end: AtomicUsize,
    range_length: AtomicUsize,
    thread_id: usize,
}

/// Point-in-time view of a [`WorkerSlot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSnapshot {
    pub thread_id: usize,
    pub start: usize,
    pub end: usize,
    pub length: usize,
}

impl RangeSnapshot {
    /// Whether the claimable length fits inside the observed interval.
    pub fn is_consistent(&self) -> bool {
        self.start <= self.end && self.length <= self.end - self.start
    }
}

impl WorkerSlot {
    /// Creates an empty slot for worker `thread_id`.
    pub fn new(thread_id: usize) -> Self {
        WorkerSlot {
            range_start: AtomicUsize::new(0),
            range_end: AtomicUsize::new(0),
            range_length: AtomicUsize::new(0),
            thread_id,
        }
    }

    pub fn thread_id(&self) -> usize {
        self.thread_id
    }

    /// Assigns `range` to this slot.
    ///
    /// Must only be called while no worker is running. The release store on
    /// the length pairs with the acquire in the claim paths; the command
    /// publication that follows makes the whole slot visible anyway.
    #[inline]
    pub(crate) fn assign(&self, range: Range<usize>) {
        let length = range.end.saturating_sub(range.start);
        self.range_start.store(range.start, Ordering::Relaxed);
        self.range_end.store(range.end, Ordering::Relaxed);
        self.range_length.store(length, Ordering::Release);
    }

    /// Compare-and-decrement on `range_length`. Fails once it reached zero.
    #[inline]
    fn reserve_one(&self) -> bool {
        self.range_length
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |length| {
                length.checked_sub(1)
            })
            .is_ok()
    }

    /// Claims the lowest remaining index. Only the owning worker calls this.
    #[inline]
    pub fn try_claim_own(&self) -> Option<usize> {
        if !self.reserve_one() {
            return None;
        }
        Some(self.range_start.fetch_add(1, Ordering::AcqRel))
    }

    /// Claims the highest remaining index on behalf of another worker.
    #[inline]
    pub fn try_steal(&self) -> Option<usize> {
        if !self.reserve_one() {
            return None;
        }
        // fetch_sub returns the old end; the claimed index sits just below it.
        Some(self.range_end.fetch_sub(1, Ordering::AcqRel) - 1)
    }

    /// Number of indices still known to be claimable.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.range_length.load(Ordering::Acquire)
    }

    /// Reads start, end and then length.
    ///
    /// The length is read last: any claim visible through `start` or `end`
    /// has already decremented it, so the snapshot never overstates it.
    pub fn snapshot(&self) -> RangeSnapshot {
        let start = self.range_start.load(Ordering::SeqCst);
        let end = self.range_end.load(Ordering::SeqCst);
        let length = self.range_length.load(Ordering::SeqCst);
        RangeSnapshot {
            thread_id: self.thread_id,
            start,
            end,
            length,
        }
    }
}

/// Sub-range of `[0, range)` owned by worker `part` out of `parts`.
///
/// Every worker gets `range / parts` indices and the first `range % parts`
/// workers one more, in order, so worker 0 owns the lowest indices.
pub fn partition(range: usize, parts: usize, part: usize) -> Range<usize> {
    debug_assert!(part < parts);
    let base = range / parts;
    let extra = range % parts;
    let start = part * base + part.min(extra);
    let length = base + usize::from(part < extra);
    start..start + length
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::utils::CachePadded;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_padded_slot_occupies_whole_lines() {
        let size = std::mem::size_of::<CachePadded<WorkerSlot>>();
        let align = std::mem::align_of::<CachePadded<WorkerSlot>>();
        assert!(align >= CACHE_LINE_SIZE);
        assert_eq!(size % CACHE_LINE_SIZE, 0);
    }

    #[test]
    fn test_assign() {
        let slot = WorkerSlot::new(3);
        slot.assign(10..20);

        let snapshot = slot.snapshot();
        assert_eq!(snapshot.thread_id, 3);
        assert_eq!(snapshot.start, 10);
        assert_eq!(snapshot.end, 20);
        assert_eq!(snapshot.length, 10);
    }

    #[test]
    fn test_claim_own_from_front() {
        let slot = WorkerSlot::new(0);
        slot.assign(0..5);

        let claimed: Vec<_> = std::iter::from_fn(|| slot.try_claim_own()).collect();
        assert_eq!(claimed, vec![0, 1, 2, 3, 4]);
        assert_eq!(slot.try_claim_own(), None);
        assert_eq!(slot.remaining(), 0);
    }

    #[test]
    fn test_steal_from_back() {
        let slot = WorkerSlot::new(0);
        slot.assign(3..8);

        let stolen: Vec<_> = std::iter::from_fn(|| slot.try_steal()).collect();
        assert_eq!(stolen, vec![7, 6, 5, 4, 3]);
        assert_eq!(slot.try_steal(), None);
    }

    #[test]
    fn test_owner_and_thief_meet() {
        let slot = WorkerSlot::new(0);
        slot.assign(0..4);

        assert_eq!(slot.try_claim_own(), Some(0));
        assert_eq!(slot.try_steal(), Some(3));
        assert_eq!(slot.try_claim_own(), Some(1));
        assert_eq!(slot.try_steal(), Some(2));
        assert_eq!(slot.try_claim_own(), None);
        assert_eq!(slot.try_steal(), None);

        let snapshot = slot.snapshot();
        assert_eq!(snapshot.start, snapshot.end);
        assert_eq!(snapshot.length, 0);
    }

    #[test]
    fn test_empty_range() {
        let slot = WorkerSlot::new(0);
        slot.assign(5..5);

        assert_eq!(slot.remaining(), 0);
        assert_eq!(slot.try_claim_own(), None);
        assert_eq!(slot.try_steal(), None);
        assert!(slot.snapshot().is_consistent());
    }

    #[test]
    fn test_concurrent_owner_and_thieves_claim_each_index_once() {
        const LEN: usize = 10_000;
        let slot = Arc::new(WorkerSlot::new(0));
        slot.assign(0..LEN);

        let owner = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || std::iter::from_fn(|| slot.try_claim_own()).collect::<Vec<_>>())
        };
        let thieves: Vec<_> = (0..3)
            .map(|_| {
                let slot = Arc::clone(&slot);
                thread::spawn(move || std::iter::from_fn(|| slot.try_steal()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for index in owner.join().unwrap() {
            assert!(seen.insert(index), "index {index} claimed twice");
        }
        for thief in thieves {
            for index in thief.join().unwrap() {
                assert!(seen.insert(index), "index {index} claimed twice");
            }
        }
        assert_eq!(seen.len(), LEN);
        assert!(slot.snapshot().is_consistent());
    }

    #[test]
    fn test_partition_near_equal() {
        let parts: Vec<_> = (0..4).map(|part| partition(10, 4, part)).collect();
        assert_eq!(parts, vec![0..3, 3..6, 6..8, 8..10]);
    }

    #[test]
    fn test_partition_fewer_items_than_parts() {
        let parts: Vec<_> = (0..5).map(|part| partition(2, 5, part)).collect();
        assert_eq!(parts, vec![0..1, 1..2, 2..2, 2..2, 2..2]);
    }

    #[test]
    fn test_partition_covers_range_without_gaps() {
        for range in [0, 1, 7, 64, 1000, 1001] {
            for parts in 1..=9 {
                let mut next = 0;
                for part in 0..parts {
                    let sub = partition(range, parts, part);
                    assert_eq!(sub.start, next);
                    next = sub.end;
                }
                assert_eq!(next, range);
            }
        }
    }
}
