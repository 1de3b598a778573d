/*!
 * Catch-Signals Session
 * Scoped interception lifecycle: install on entry, restore on every exit
 */

use crate::affinity::ThreadAffinityGuard;
use crate::queue::{BridgeCell, SignalQueue};
use crate::registry::HandlerRegistry;
use crate::traits::{HandlerFn, SignalBackend};
use crate::types::{SignalError, SignalResult, SignalSet};
use log::{debug, info};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Session lifecycle states. `Closed` is terminal; a new session object is
/// required to intercept again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unopened,
    Open,
    Closed,
}

/// One scoped interception of a set of signals.
///
/// Composes the affinity guard, the handler registry, and (once open) the
/// bridge cell feeding the consumer queue. Construct it on the thread
/// driving the run loop; `enter` and `close` validate against that thread.
pub struct CatchSignalsSession<B: SignalBackend> {
    state: SessionState,
    signals: SignalSet,
    affinity: ThreadAffinityGuard,
    registry: HandlerRegistry<B>,
    cell: Option<Arc<BridgeCell>>,
}

impl<B: SignalBackend> CatchSignalsSession<B> {
    /// Create an unopened session for `signals`.
    pub fn new(backend: Arc<B>, signals: SignalSet) -> Self {
        Self {
            state: SessionState::Unopened,
            signals,
            affinity: ThreadAffinityGuard::capture(),
            registry: HandlerRegistry::new(backend),
            cell: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Install handlers for every requested signal and hand back the
    /// consumer queue.
    ///
    /// All-or-nothing: if any install fails, previously installed handlers
    /// from this call are rolled back and the session stays unopened.
    pub fn enter(&mut self) -> SignalResult<SignalQueue> {
        match self.state {
            SessionState::Unopened => {}
            SessionState::Open => return Err(SignalError::SessionAlreadyOpen),
            SessionState::Closed => return Err(SignalError::SessionClosed),
        }
        self.affinity.ensure_current()?;

        let cell = BridgeCell::new();
        let producer = Arc::clone(&cell);
        // The installed callback is the whole delivery-context code path.
        let handler: HandlerFn = Arc::new(move |signal| producer.publish(signal));
        self.registry.install_all(self.signals, &handler)?;

        self.cell = Some(Arc::clone(&cell));
        self.state = SessionState::Open;
        info!("signal session open for {}", self.signals);
        Ok(SignalQueue::new(cell))
    }

    /// Restore every displaced disposition and close the session.
    ///
    /// Surfaces the first restore failure after attempting all restores.
    /// Closing a session that was never entered just marks it closed.
    pub fn close(&mut self) -> SignalResult<()> {
        match self.state {
            SessionState::Open => {}
            SessionState::Unopened => {
                self.state = SessionState::Closed;
                return Ok(());
            }
            SessionState::Closed => return Err(SignalError::SessionClosed),
        }
        self.affinity.ensure_current()?;
        self.teardown()
    }

    fn teardown(&mut self) -> SignalResult<()> {
        self.state = SessionState::Closed;
        if let Some(cell) = self.cell.take() {
            let leftover = cell.drain();
            if !leftover.is_empty() {
                debug!("discarding unconsumed batch {}", leftover);
            }
        }
        let result = self.registry.restore_all();
        info!("signal session closed for {}", self.signals);
        result
    }
}

impl<B: SignalBackend> Drop for CatchSignalsSession<B> {
    fn drop(&mut self) {
        // Restoration is a scoped guarantee, not best-effort: it runs on
        // early break, `?`, and unwind alike. Errors are logged by the
        // registry; Drop must not panic.
        if self.state == SessionState::Open {
            let _ = self.teardown();
        }
    }
}

/// RAII guard returned by [`catch_signals`] / [`catch_signals_with`].
///
/// Derefs to the [`SignalQueue`]; dropping it restores every displaced
/// disposition no matter how control left the scope.
pub struct CatchSignals<B: SignalBackend> {
    session: CatchSignalsSession<B>,
    queue: SignalQueue,
}

impl<B: SignalBackend> std::fmt::Debug for CatchSignals<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatchSignals").finish_non_exhaustive()
    }
}

impl<B: SignalBackend> CatchSignals<B> {
    /// Restore handlers now, surfacing restore errors that `Drop` would
    /// only log.
    pub fn close(mut self) -> SignalResult<()> {
        self.session.close()
    }

    pub fn queue(&mut self) -> &mut SignalQueue {
        &mut self.queue
    }
}

impl<B: SignalBackend> Deref for CatchSignals<B> {
    type Target = SignalQueue;

    fn deref(&self) -> &SignalQueue {
        &self.queue
    }
}

impl<B: SignalBackend> DerefMut for CatchSignals<B> {
    fn deref_mut(&mut self) -> &mut SignalQueue {
        &mut self.queue
    }
}

/// Intercept `signals` through `backend` for the lifetime of the returned
/// guard.
pub fn catch_signals_with<B: SignalBackend>(
    backend: Arc<B>,
    signals: SignalSet,
) -> SignalResult<CatchSignals<B>> {
    let mut session = CatchSignalsSession::new(backend, signals);
    let queue = session.enter()?;
    Ok(CatchSignals { session, queue })
}

/// Intercept `signals` via the OS backend for the lifetime of the returned
/// guard.
///
/// Call on the thread driving the run loop.
#[cfg(unix)]
pub fn catch_signals(signals: SignalSet) -> SignalResult<CatchSignals<crate::backend::UnixBackend>> {
    catch_signals_with(Arc::new(crate::backend::UnixBackend::new()), signals)
}
