/*!
 * Signal Queue
 * Async consumer surface over the coalescing batch
 */

use crate::batch::CoalescingBatch;
use crate::stats::{AtomicBridgeStats, BridgeStats};
use crate::types::{Signal, SignalSet};
use futures::task::AtomicWaker;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// State shared between the installed callbacks (producer side) and the
/// queue handle (consumer side).
pub(crate) struct BridgeCell {
    batch: CoalescingBatch,
    waker: AtomicWaker,
    stats: AtomicBridgeStats,
}

impl BridgeCell {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            batch: CoalescingBatch::new(),
            waker: AtomicWaker::new(),
            stats: AtomicBridgeStats::new(),
        })
    }

    /// Delivery-context entry point.
    ///
    /// One atomic insert, then at most one wakeup request per
    /// empty-to-non-empty transition. Nothing here blocks or allocates;
    /// this may interrupt the consumer mid-critical-section.
    #[inline]
    pub(crate) fn publish(&self, signal: Signal) {
        let recorded = self.batch.record(signal);
        self.stats.inc_recorded();
        if recorded.coalesced {
            self.stats.inc_coalesced();
        }
        if recorded.was_empty {
            self.stats.inc_wakeups();
            self.waker.wake();
        }
    }

    pub(crate) fn drain(&self) -> SignalSet {
        self.batch.take()
    }
}

/// Consumer handle yielding coalesced batches of delivered signals.
///
/// `next_batch` is the sole suspension point; the [`Stream`] impl is the
/// lazy-sequence adaptor over repeated calls (finite per step, infinite
/// overall). The queue holds a single pending batch, never a backlog: N
/// deliveries between two consumptions wake the consumer once, and it
/// observes their union as one set.
///
/// Not `Clone`; exclusive ownership keeps the consumer single.
pub struct SignalQueue {
    cell: Arc<BridgeCell>,
}

impl std::fmt::Debug for SignalQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalQueue").finish_non_exhaustive()
    }
}

impl SignalQueue {
    pub(crate) fn new(cell: Arc<BridgeCell>) -> Self {
        Self { cell }
    }

    /// Wait for the next non-empty batch and take it.
    ///
    /// Returns immediately if signals were recorded while the consumer was
    /// away; otherwise suspends until a delivery wakes the loop.
    pub async fn next_batch(&mut self) -> SignalSet {
        std::future::poll_fn(|cx| self.poll_next_batch(cx)).await
    }

    /// Poll-level form of [`next_batch`](Self::next_batch).
    ///
    /// Register-then-recheck: a delivery that lands between the first
    /// check and `register` would otherwise suspend us with a full batch.
    pub fn poll_next_batch(&mut self, cx: &mut Context<'_>) -> Poll<SignalSet> {
        let batch = self.cell.batch.take();
        if !batch.is_empty() {
            self.cell.stats.inc_batches();
            return Poll::Ready(batch);
        }

        self.cell.waker.register(cx.waker());

        let batch = self.cell.batch.take();
        if !batch.is_empty() {
            self.cell.stats.inc_batches();
            return Poll::Ready(batch);
        }
        Poll::Pending
    }

    /// Snapshot of bridge counters
    pub fn stats(&self) -> BridgeStats {
        self.cell.stats.snapshot()
    }
}

impl Stream for SignalQueue {
    type Item = SignalSet;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<SignalSet>> {
        self.get_mut().poll_next_batch(cx).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready_eq};

    #[test]
    fn test_suspends_until_publish() {
        let cell = BridgeCell::new();
        let mut queue = SignalQueue::new(cell.clone());

        let mut task = tokio_test::task::spawn(queue.next_batch());
        assert_pending!(task.poll());

        cell.publish(Signal::SIGINT);
        assert!(task.is_woken());
        assert_ready_eq!(task.poll(), SignalSet::from(Signal::SIGINT));
    }

    #[test]
    fn test_ready_without_suspension_when_recorded_early() {
        let cell = BridgeCell::new();
        cell.publish(Signal::SIGTERM);
        cell.publish(Signal::SIGHUP);

        let mut queue = SignalQueue::new(cell);
        let expected: SignalSet = [Signal::SIGHUP, Signal::SIGTERM].into_iter().collect();
        let mut task = tokio_test::task::spawn(queue.next_batch());
        assert_ready_eq!(task.poll(), expected);
    }

    #[test]
    fn test_many_publishes_one_wakeup_one_batch() {
        let cell = BridgeCell::new();
        let mut queue = SignalQueue::new(cell.clone());

        let mut task = tokio_test::task::spawn(queue.next_batch());
        assert_pending!(task.poll());

        cell.publish(Signal::SIGINT);
        cell.publish(Signal::SIGINT);
        cell.publish(Signal::SIGTERM);

        let expected: SignalSet = [Signal::SIGINT, Signal::SIGTERM].into_iter().collect();
        assert_ready_eq!(task.poll(), expected);
        drop(task);

        let stats = queue.stats();
        assert_eq!(stats.signals_recorded, 3);
        assert_eq!(stats.signals_coalesced, 1);
        assert_eq!(stats.wakeups_requested, 1);
        assert_eq!(stats.batches_delivered, 1);

        // The slot is a latest-state cell, not a FIFO: nothing is buffered
        // beyond the one batch already taken.
        let mut task = tokio_test::task::spawn(queue.next_batch());
        assert_pending!(task.poll());
    }

    #[test]
    fn test_publish_between_batches_wakes_again() {
        let cell = BridgeCell::new();
        let mut queue = SignalQueue::new(cell.clone());

        let mut task = tokio_test::task::spawn(queue.next_batch());
        assert_pending!(task.poll());
        cell.publish(Signal::SIGUSR1);
        assert_ready_eq!(task.poll(), SignalSet::from(Signal::SIGUSR1));
        drop(task);

        let mut task = tokio_test::task::spawn(queue.next_batch());
        assert_pending!(task.poll());
        cell.publish(Signal::SIGUSR1);
        assert!(task.is_woken());
        assert_ready_eq!(task.poll(), SignalSet::from(Signal::SIGUSR1));

        assert_eq!(cell.stats.snapshot().wakeups_requested, 2);
    }
}
