/*!
 * Unix Backend
 * sigaction-based registration with wait-free trampoline dispatch
 */

use crate::traits::{HandlerFn, SignalBackend};
use crate::types::{Signal, SignalError, SignalResult};
use arc_swap::ArcSwapOption;
use log::debug;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet};
use std::os::raw::c_int;
use std::sync::Arc;

const NSIG: usize = 64;

/// Per-signal callback slots read by the trampoline.
///
/// `ArcSwapOption::load` is wait-free; the trampoline may run in delivery
/// context, where taking any lock could deadlock against the interrupted
/// consumer.
static SLOTS: [ArcSwapOption<SlotEntry>; NSIG] = [const { ArcSwapOption::const_empty() }; NSIG];

struct SlotEntry {
    signal: Signal,
    handler: HandlerFn,
}

extern "C" fn trampoline(signum: c_int) {
    // Delivery context: slot load plus the bridge callback, nothing else.
    if let Some(slot) = SLOTS.get(signum as usize) {
        if let Some(entry) = &*slot.load() {
            (entry.handler)(entry.signal);
        }
    }
}

/// Production backend over `nix::sys::signal::sigaction`.
///
/// Stateless; the disposition table it manipulates is the process's own.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnixBackend;

impl UnixBackend {
    pub const fn new() -> Self {
        Self
    }
}

fn os_signal(signal: Signal) -> SignalResult<signal::Signal> {
    signal::Signal::try_from(signal.number() as i32).map_err(|errno| {
        SignalError::RegistrationFailed {
            signal,
            reason: errno.to_string(),
        }
    })
}

impl SignalBackend for UnixBackend {
    type Saved = SigAction;

    fn install(&self, signal: Signal, handler: HandlerFn) -> SignalResult<SigAction> {
        if !signal.can_catch() {
            return Err(SignalError::Uncatchable(signal));
        }
        let signum = os_signal(signal)?;

        // Publish the slot before swapping the disposition so the
        // trampoline never observes an armed signal without a callback.
        SLOTS[signal.number() as usize].store(Some(Arc::new(SlotEntry { signal, handler })));

        let action = SigAction::new(
            SigHandler::Handler(trampoline),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );
        // SAFETY: the trampoline restricts itself to atomic operations and
        // a wakeup request, and stays installed until `restore` swaps it
        // back out.
        match unsafe { signal::sigaction(signum, &action) } {
            Ok(previous) => {
                debug!("sigaction installed for {}", signal);
                Ok(previous)
            }
            Err(errno) => {
                SLOTS[signal.number() as usize].store(None);
                Err(SignalError::RegistrationFailed {
                    signal,
                    reason: errno.desc().to_string(),
                })
            }
        }
    }

    fn restore(&self, signal: Signal, saved: SigAction) -> SignalResult<()> {
        let signum = os_signal(signal)?;
        // SAFETY: reinstalls a disposition previously returned by
        // sigaction for this same signal.
        let result = unsafe { signal::sigaction(signum, &saved) };
        SLOTS[signal.number() as usize].store(None);
        match result {
            Ok(_) => {
                debug!("sigaction restored for {}", signal);
                Ok(())
            }
            Err(errno) => Err(SignalError::RestoreFailed {
                signal,
                reason: errno.desc().to_string(),
            }),
        }
    }
}
