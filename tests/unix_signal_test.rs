/*!
 * Unix Signal Tests
 * End-to-end interception with real process signals
 */

#![cfg(unix)]

use nix::sys::signal::{self as os, SaFlags, SigAction, SigHandler, SigSet};
use pretty_assertions::assert_eq;
use serial_test::serial;
use signal_bridge::{catch_signals, Signal, SignalError, SignalSet};

fn raise_self(signal: Signal) {
    os::raise(os::Signal::try_from(signal.number() as i32).unwrap()).unwrap();
}

/// Park the disposition on SIG_IGN and return what it displaced.
///
/// SIGURG and SIGWINCH are ignored by default, so even a stray delivery
/// outside the session cannot kill the test process.
fn set_ignored(signal: os::Signal) -> SigAction {
    let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
    unsafe { os::sigaction(signal, &ignore) }.unwrap()
}

fn run_loop() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

#[test]
#[serial]
fn test_real_delivery_coalesces_and_restores() {
    let orig = set_ignored(os::Signal::SIGURG);

    run_loop().block_on(async {
        let mut guard = catch_signals(Signal::SIGURG.into()).unwrap();

        // Handler runs synchronously inside raise(), so both deliveries
        // land in the batch before the consumer looks.
        raise_self(Signal::SIGURG);
        raise_self(Signal::SIGURG);

        let batch = guard.next_batch().await;
        assert_eq!(batch, SignalSet::from(Signal::SIGURG));

        raise_self(Signal::SIGURG);
        let batch = guard.next_batch().await;
        assert_eq!(batch, SignalSet::from(Signal::SIGURG));

        guard.close().unwrap();
    });

    // The disposition observed before entry is back in force.
    let after = set_ignored(os::Signal::SIGURG);
    assert_eq!(after.handler(), SigHandler::SigIgn);

    unsafe { os::sigaction(os::Signal::SIGURG, &orig) }.unwrap();
}

#[test]
#[serial]
fn test_union_of_distinct_real_signals() {
    let orig_urg = set_ignored(os::Signal::SIGURG);
    let orig_winch = set_ignored(os::Signal::SIGWINCH);

    let signals: SignalSet = [Signal::SIGURG, Signal::SIGWINCH].into_iter().collect();
    run_loop().block_on(async {
        let mut guard = catch_signals(signals).unwrap();

        raise_self(Signal::SIGURG);
        raise_self(Signal::SIGWINCH);
        raise_self(Signal::SIGURG);

        assert_eq!(guard.next_batch().await, signals);
        guard.close().unwrap();
    });

    unsafe {
        os::sigaction(os::Signal::SIGURG, &orig_urg).unwrap();
        os::sigaction(os::Signal::SIGWINCH, &orig_winch).unwrap();
    }
}

#[test]
#[serial]
fn test_uncatchable_signal_rejected() {
    let err = catch_signals(Signal::SIGKILL.into()).unwrap_err();
    assert!(matches!(err, SignalError::Uncatchable(Signal::SIGKILL)));
    assert!(!err.is_usage());
}
