/*!
 * Backend Traits
 * Seam over the host's signal-registration primitives
 */

use crate::types::{Signal, SignalResult};
use std::sync::Arc;

/// Bridge callback invoked on signal delivery.
///
/// Runs in delivery context: implementations must restrict themselves to
/// atomic operations and a wakeup request.
pub type HandlerFn = Arc<dyn Fn(Signal) + Send + Sync>;

/// OS-level signal registration.
///
/// `install` captures the previous disposition and installs the bridge
/// callback in one step; `restore` reinstalls exactly the captured
/// disposition. The bridge never inspects `Saved`, it only hands tokens
/// back in reverse.
pub trait SignalBackend: Send + Sync + 'static {
    /// Previous-disposition token, opaque to the bridge
    type Saved: Send;

    /// Replace the current disposition for `signal` with the bridge
    /// callback, returning the displaced disposition.
    ///
    /// Must be all-or-nothing per signal: on error, the prior disposition
    /// is still in effect and `handler` will never be invoked.
    fn install(&self, signal: Signal, handler: HandlerFn) -> SignalResult<Self::Saved>;

    /// Reinstall a previously captured disposition.
    ///
    /// After return, the bridge callback for `signal` no longer runs.
    fn restore(&self, signal: Signal, saved: Self::Saved) -> SignalResult<()>;
}
