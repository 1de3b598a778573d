/*!
 * Handler Registry
 * Captures previous dispositions and reinstalls them exactly once
 */

use crate::traits::{HandlerFn, SignalBackend};
use crate::types::{Signal, SignalError, SignalResult, SignalSet};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Process-wide mask of signal numbers held by open sessions.
///
/// OS dispositions are process-global state; this mask is what rejects a
/// second session intercepting a signal the first still owns.
static INTERCEPTED: AtomicU64 = AtomicU64::new(0);

fn claim(signal: Signal) -> SignalResult<()> {
    let prev = INTERCEPTED.fetch_or(signal.bit(), Ordering::AcqRel);
    if prev & signal.bit() != 0 {
        Err(SignalError::AlreadyIntercepted(signal))
    } else {
        Ok(())
    }
}

fn release(signal: Signal) {
    INTERCEPTED.fetch_and(!signal.bit(), Ordering::AcqRel);
}

/// Per-session record of displaced OS dispositions.
///
/// Holds exactly one record per intercepted signal, only while the owning
/// session is open. `restore_all` drains the records, so teardown is safe
/// to reach from both the explicit close path and the drop backstop.
pub struct HandlerRegistry<B: SignalBackend> {
    backend: Arc<B>,
    records: Vec<(Signal, B::Saved)>,
}

impl<B: SignalBackend> HandlerRegistry<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            records: Vec::new(),
        }
    }

    /// Signals currently recorded by this registry
    pub fn intercepted(&self) -> SignalSet {
        self.records.iter().map(|(signal, _)| *signal).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Capture the current disposition for `signal` and install the bridge
    /// callback in its place.
    ///
    /// Rejects signals this registry already holds (no self-nesting) and
    /// signals owned by another open session.
    pub fn install(&mut self, signal: Signal, handler: HandlerFn) -> SignalResult<()> {
        if self.records.iter().any(|(s, _)| *s == signal) {
            return Err(SignalError::AlreadyIntercepted(signal));
        }

        claim(signal)?;
        match self.backend.install(signal, handler) {
            Ok(saved) => {
                debug!("installed bridge handler for {}", signal);
                self.records.push((signal, saved));
                Ok(())
            }
            Err(e) => {
                release(signal);
                Err(e)
            }
        }
    }

    /// Install the bridge callback for every member of `signals`.
    ///
    /// All-or-nothing: the first failure restores everything installed in
    /// this call and returns the error.
    pub fn install_all(&mut self, signals: SignalSet, handler: &HandlerFn) -> SignalResult<()> {
        for signal in signals.iter() {
            if let Err(e) = self.install(signal, handler.clone()) {
                warn!(
                    "install failed for {}, rolling back {} handler(s): {}",
                    signal,
                    self.records.len(),
                    e
                );
                let _ = self.restore_all();
                return Err(e);
            }
        }
        info!("intercepting {}", signals);
        Ok(())
    }

    /// Reinstall every captured disposition and clear the records.
    ///
    /// Restore failures do not abort the remaining restores; the first
    /// error is returned after every record has been processed. Calling
    /// again on an empty registry is a no-op.
    pub fn restore_all(&mut self) -> SignalResult<()> {
        let mut first_err = None;
        for (signal, saved) in self.records.drain(..) {
            if let Err(e) = self.backend.restore(signal, saved) {
                warn!("failed to restore disposition for {}: {}", signal, e);
                first_err.get_or_insert(e);
            } else {
                debug!("restored previous disposition for {}", signal);
            }
            release(signal);
        }
        match first_err {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }
}

impl<B: SignalBackend> Drop for HandlerRegistry<B> {
    fn drop(&mut self) {
        if !self.records.is_empty() {
            warn!(
                "registry dropped with {} live handler(s); restoring",
                self.records.len()
            );
            let _ = self.restore_all();
        }
    }
}
