/*!
 * Test Backend
 * In-process disposition table simulating OS delivery
 */

use crate::traits::{HandlerFn, SignalBackend};
use crate::types::{Signal, SignalError, SignalResult, SignalSet};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Simulated OS disposition, inspectable by tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestDisposition {
    /// Whatever the process started with
    Default,
    /// A bridge callback, tagged by install serial
    Bridge(u64),
}

struct TableEntry {
    disposition: TestDisposition,
    handler: Option<HandlerFn>,
}

/// In-process stand-in for the OS signal table.
///
/// `raise` invokes the installed callback synchronously on the calling
/// thread, which is exactly what a delivery interrupting straight-line
/// consumer code looks like to the bridge.
#[derive(Default)]
pub struct TestBackend {
    table: Mutex<HashMap<Signal, TableEntry>>,
    fail_on: Mutex<SignalSet>,
    next_serial: AtomicU64,
}

impl TestBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `install` for `signal` fail, for rollback tests
    pub fn fail_install_on(&self, signal: Signal) {
        self.fail_on.lock().insert(signal);
    }

    /// Simulate OS delivery of `signal` at this exact point.
    ///
    /// Returns whether a bridge callback was installed to receive it.
    pub fn raise(&self, signal: Signal) -> bool {
        let handler = self
            .table
            .lock()
            .get(&signal)
            .and_then(|entry| entry.handler.clone());
        match handler {
            Some(handler) => {
                handler(signal);
                true
            }
            None => false,
        }
    }

    /// Current disposition for `signal`
    pub fn disposition(&self, signal: Signal) -> TestDisposition {
        self.table
            .lock()
            .get(&signal)
            .map(|entry| entry.disposition)
            .unwrap_or(TestDisposition::Default)
    }

    /// Whether a bridge callback is currently installed for `signal`
    pub fn is_installed(&self, signal: Signal) -> bool {
        matches!(self.disposition(signal), TestDisposition::Bridge(_))
    }
}

impl SignalBackend for TestBackend {
    type Saved = TestDisposition;

    fn install(&self, signal: Signal, handler: HandlerFn) -> SignalResult<TestDisposition> {
        if !signal.can_catch() {
            return Err(SignalError::Uncatchable(signal));
        }
        if self.fail_on.lock().remove(signal) {
            return Err(SignalError::RegistrationFailed {
                signal,
                reason: "injected install failure".into(),
            });
        }

        let serial = self.next_serial.fetch_add(1, Ordering::Relaxed);
        let mut table = self.table.lock();
        let previous = table
            .get(&signal)
            .map(|entry| entry.disposition)
            .unwrap_or(TestDisposition::Default);
        table.insert(
            signal,
            TableEntry {
                disposition: TestDisposition::Bridge(serial),
                handler: Some(handler),
            },
        );
        Ok(previous)
    }

    fn restore(&self, signal: Signal, saved: TestDisposition) -> SignalResult<()> {
        let mut table = self.table.lock();
        match saved {
            TestDisposition::Default => {
                table.remove(&signal);
            }
            other => {
                table.insert(
                    signal,
                    TableEntry {
                        disposition: other,
                        handler: None,
                    },
                );
            }
        }
        Ok(())
    }
}

/// Test-only synchronization point: let the loop process pending wakeups
/// before asserting on consumer state.
pub async fn await_loop_idle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}
