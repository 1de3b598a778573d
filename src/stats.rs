/*!
 * Lock-Free Bridge Statistics
 * Atomic counters safe to bump from delivery context
 */

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Bridge statistics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeStats {
    /// Deliveries recorded into the batch
    pub signals_recorded: u64,
    /// Deliveries that hit a signal already in the batch
    pub signals_coalesced: u64,
    /// Loop wakeups requested (one per empty-to-non-empty transition)
    pub wakeups_requested: u64,
    /// Batches handed to the consumer
    pub batches_delivered: u64,
}

/// Atomic bridge statistics
///
/// # Performance
/// - Cache-line aligned to prevent false sharing
/// - Relaxed ordering throughout; counters never synchronize other state
#[repr(C, align(64))]
#[derive(Default)]
pub(crate) struct AtomicBridgeStats {
    signals_recorded: AtomicU64,
    signals_coalesced: AtomicU64,
    wakeups_requested: AtomicU64,
    batches_delivered: AtomicU64,
}

impl AtomicBridgeStats {
    pub(crate) const fn new() -> Self {
        Self {
            signals_recorded: AtomicU64::new(0),
            signals_coalesced: AtomicU64::new(0),
            wakeups_requested: AtomicU64::new(0),
            batches_delivered: AtomicU64::new(0),
        }
    }

    #[inline(always)]
    pub(crate) fn inc_recorded(&self) {
        self.signals_recorded.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub(crate) fn inc_coalesced(&self) {
        self.signals_coalesced.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub(crate) fn inc_wakeups(&self) {
        self.wakeups_requested.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub(crate) fn inc_batches(&self) {
        self.batches_delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot of current stats (no locks required)
    ///
    /// Values may not be mutually consistent under concurrent updates, but
    /// each individual value is accurate.
    pub(crate) fn snapshot(&self) -> BridgeStats {
        BridgeStats {
            signals_recorded: self.signals_recorded.load(Ordering::Relaxed),
            signals_coalesced: self.signals_coalesced.load(Ordering::Relaxed),
            wakeups_requested: self.wakeups_requested.load(Ordering::Relaxed),
            batches_delivered: self.batches_delivered.load(Ordering::Relaxed),
        }
    }
}
