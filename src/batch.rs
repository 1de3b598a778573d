/*!
 * Coalescing Batch
 * Single-slot set of signals recorded since the last consumption
 */

use crate::types::{Signal, SignalSet};
use std::sync::atomic::{AtomicU64, Ordering};

/// Mutable set of signals that fired since the consumer last looked.
///
/// Backed by one atomic bitmask: `record` is a single `fetch_or` and `take`
/// a single `swap`, so the producer side is lock-free and safe to run in
/// delivery context while the consumer reads concurrently. Repeated
/// delivery of one signal before consumption collapses to one membership
/// bit.
#[derive(Default)]
pub struct CoalescingBatch {
    bits: AtomicU64,
}

/// What a `record` call observed about the batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recorded {
    /// The batch was empty before this record; a wakeup is owed
    pub was_empty: bool,
    /// The signal was already a member; the record coalesced into it
    pub coalesced: bool,
}

impl CoalescingBatch {
    pub const fn new() -> Self {
        Self {
            bits: AtomicU64::new(0),
        }
    }

    /// Record a delivered signal.
    ///
    /// # Performance
    /// Hot path, runs in delivery context: one atomic RMW, no locks.
    #[inline(always)]
    pub fn record(&self, signal: Signal) -> Recorded {
        let prev = self.bits.fetch_or(signal.bit(), Ordering::AcqRel);
        Recorded {
            was_empty: prev == 0,
            coalesced: prev & signal.bit() != 0,
        }
    }

    /// Atomically remove and return the full current batch.
    ///
    /// Returns the empty set when nothing was recorded.
    #[inline]
    pub fn take(&self) -> SignalSet {
        SignalSet::from_bits(self.bits.swap(0, Ordering::AcqRel))
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bits.load(Ordering::Acquire) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_take() {
        let batch = CoalescingBatch::new();
        assert!(batch.is_empty());

        let r = batch.record(Signal::SIGINT);
        assert!(r.was_empty);
        assert!(!r.coalesced);
        assert!(!batch.is_empty());

        let taken = batch.take();
        assert_eq!(taken, SignalSet::from(Signal::SIGINT));
        assert!(batch.is_empty());
        assert!(batch.take().is_empty());
    }

    #[test]
    fn test_repeated_records_coalesce() {
        let batch = CoalescingBatch::new();
        assert!(batch.record(Signal::SIGHUP).was_empty);

        let r = batch.record(Signal::SIGHUP);
        assert!(!r.was_empty);
        assert!(r.coalesced);

        let taken = batch.take();
        assert_eq!(taken.len(), 1);
        assert!(taken.contains(Signal::SIGHUP));
    }

    #[test]
    fn test_distinct_records_union() {
        let batch = CoalescingBatch::new();
        batch.record(Signal::SIGHUP);
        let r = batch.record(Signal::SIGTERM);
        assert!(!r.was_empty);
        assert!(!r.coalesced);

        let expected: SignalSet = [Signal::SIGHUP, Signal::SIGTERM].into_iter().collect();
        assert_eq!(batch.take(), expected);
    }
}
