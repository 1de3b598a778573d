/*!
 * Bridge Types
 * Signal numbers, coalesced signal sets, and result types
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Bridge operation result
pub type SignalResult<T> = Result<T, SignalError>;

/// Bridge errors
///
/// Usage errors are programmer errors and are never retryable; environment
/// errors come from the host's signal-registration primitives.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum SignalError {
    #[error("signal bridge bound to thread {expected}, used from {actual}")]
    WrongThread { expected: String, actual: String },

    #[error("session is closed; open a new session to intercept again")]
    SessionClosed,

    #[error("session is already open")]
    SessionAlreadyOpen,

    #[error("signal {0} is already intercepted by an open session")]
    AlreadyIntercepted(Signal),

    #[error("signal {0} cannot be caught on this platform")]
    Uncatchable(Signal),

    #[error("failed to install handler for {signal}: {reason}")]
    RegistrationFailed { signal: Signal, reason: String },

    #[error("failed to restore handler for {signal}: {reason}")]
    RestoreFailed { signal: Signal, reason: String },

    #[error("invalid signal number: {0}")]
    InvalidSignal(u32),
}

impl SignalError {
    /// Whether this error is a non-retryable usage (programmer) error
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            SignalError::WrongThread { .. }
                | SignalError::SessionClosed
                | SignalError::SessionAlreadyOpen
                | SignalError::AlreadyIntercepted(_)
        )
    }
}

/// UNIX-style signal numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum Signal {
    /// Hangup detected on controlling terminal
    SIGHUP = 1,
    /// Interrupt from keyboard (Ctrl+C)
    SIGINT = 2,
    /// Quit from keyboard (Ctrl+\)
    SIGQUIT = 3,
    /// Illegal instruction
    SIGILL = 4,
    /// Trace/breakpoint trap
    SIGTRAP = 5,
    /// Abort signal
    SIGABRT = 6,
    /// Bus error (bad memory access)
    SIGBUS = 7,
    /// Floating-point exception
    SIGFPE = 8,
    /// Kill signal (cannot be caught or ignored)
    SIGKILL = 9,
    /// User-defined signal 1
    SIGUSR1 = 10,
    /// Invalid memory reference
    SIGSEGV = 11,
    /// User-defined signal 2
    SIGUSR2 = 12,
    /// Broken pipe
    SIGPIPE = 13,
    /// Timer signal
    SIGALRM = 14,
    /// Termination signal
    SIGTERM = 15,
    /// Child process stopped or terminated
    SIGCHLD = 17,
    /// Continue if stopped
    SIGCONT = 18,
    /// Stop process (cannot be caught or ignored)
    SIGSTOP = 19,
    /// Stop typed at terminal (Ctrl+Z)
    SIGTSTP = 20,
    /// Terminal input for background process
    SIGTTIN = 21,
    /// Terminal output for background process
    SIGTTOU = 22,
    /// Urgent condition on socket
    SIGURG = 23,
    /// CPU time limit exceeded
    SIGXCPU = 24,
    /// File size limit exceeded
    SIGXFSZ = 25,
    /// Virtual alarm clock
    SIGVTALRM = 26,
    /// Profiling timer expired
    SIGPROF = 27,
    /// Window resize signal
    SIGWINCH = 28,
    /// I/O now possible
    SIGIO = 29,
    /// Power failure
    SIGPWR = 30,
    /// Bad system call
    SIGSYS = 31,
}

impl Signal {
    /// Convert from signal number
    pub fn from_number(n: u32) -> SignalResult<Self> {
        match n {
            1 => Ok(Signal::SIGHUP),
            2 => Ok(Signal::SIGINT),
            3 => Ok(Signal::SIGQUIT),
            4 => Ok(Signal::SIGILL),
            5 => Ok(Signal::SIGTRAP),
            6 => Ok(Signal::SIGABRT),
            7 => Ok(Signal::SIGBUS),
            8 => Ok(Signal::SIGFPE),
            9 => Ok(Signal::SIGKILL),
            10 => Ok(Signal::SIGUSR1),
            11 => Ok(Signal::SIGSEGV),
            12 => Ok(Signal::SIGUSR2),
            13 => Ok(Signal::SIGPIPE),
            14 => Ok(Signal::SIGALRM),
            15 => Ok(Signal::SIGTERM),
            17 => Ok(Signal::SIGCHLD),
            18 => Ok(Signal::SIGCONT),
            19 => Ok(Signal::SIGSTOP),
            20 => Ok(Signal::SIGTSTP),
            21 => Ok(Signal::SIGTTIN),
            22 => Ok(Signal::SIGTTOU),
            23 => Ok(Signal::SIGURG),
            24 => Ok(Signal::SIGXCPU),
            25 => Ok(Signal::SIGXFSZ),
            26 => Ok(Signal::SIGVTALRM),
            27 => Ok(Signal::SIGPROF),
            28 => Ok(Signal::SIGWINCH),
            29 => Ok(Signal::SIGIO),
            30 => Ok(Signal::SIGPWR),
            31 => Ok(Signal::SIGSYS),
            _ => Err(SignalError::InvalidSignal(n)),
        }
    }

    /// Get signal number
    pub fn number(&self) -> u32 {
        *self as u32
    }

    /// Bit position in a [`SignalSet`] mask
    #[inline]
    pub(crate) fn bit(&self) -> u64 {
        1u64 << self.number()
    }

    /// Check if signal can be caught/intercepted
    pub fn can_catch(&self) -> bool {
        !matches!(self, Signal::SIGKILL | Signal::SIGSTOP)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.number())
    }
}

/// A set of signal numbers backed by a single bitmask.
///
/// Duplicates collapse on insert; this is the coalescing mechanism, so the
/// memory footprint is independent of delivery rate.
#[derive(Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SignalSet {
    bits: u64,
}

impl SignalSet {
    /// Create an empty set
    pub const fn new() -> Self {
        Self { bits: 0 }
    }

    pub(crate) const fn from_bits(bits: u64) -> Self {
        Self { bits }
    }

    pub(crate) const fn bits(&self) -> u64 {
        self.bits
    }

    /// Insert a signal; returns false if it was already present
    pub fn insert(&mut self, signal: Signal) -> bool {
        let fresh = self.bits & signal.bit() == 0;
        self.bits |= signal.bit();
        fresh
    }

    /// Remove a signal; returns whether it was present
    pub fn remove(&mut self, signal: Signal) -> bool {
        let present = self.contains(signal);
        self.bits &= !signal.bit();
        present
    }

    pub fn contains(&self, signal: Signal) -> bool {
        self.bits & signal.bit() != 0
    }

    /// Whether any member of `other` is also a member of `self`
    pub fn intersects(&self, other: SignalSet) -> bool {
        self.bits & other.bits != 0
    }

    pub fn len(&self) -> usize {
        self.bits.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Iterate members in ascending signal-number order
    pub fn iter(&self) -> impl Iterator<Item = Signal> + '_ {
        let bits = self.bits;
        (1..64u32).filter_map(move |n| {
            if bits & (1u64 << n) != 0 {
                Signal::from_number(n).ok()
            } else {
                None
            }
        })
    }
}

impl FromIterator<Signal> for SignalSet {
    fn from_iter<I: IntoIterator<Item = Signal>>(iter: I) -> Self {
        let mut set = SignalSet::new();
        for signal in iter {
            set.insert(signal);
        }
        set
    }
}

impl From<Signal> for SignalSet {
    fn from(signal: Signal) -> Self {
        SignalSet::from_bits(signal.bit())
    }
}

impl Extend<Signal> for SignalSet {
    fn extend<I: IntoIterator<Item = Signal>>(&mut self, iter: I) {
        for signal in iter {
            self.insert(signal);
        }
    }
}

impl fmt::Debug for SignalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for SignalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, signal) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:?}", signal)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_from_number() {
        assert_eq!(Signal::from_number(2).unwrap(), Signal::SIGINT);
        assert_eq!(Signal::from_number(15).unwrap(), Signal::SIGTERM);
        assert_eq!(Signal::from_number(31).unwrap(), Signal::SIGSYS);
        assert!(Signal::from_number(0).is_err());
        assert!(Signal::from_number(16).is_err());
        assert!(Signal::from_number(99).is_err());
    }

    #[test]
    fn test_signal_properties() {
        assert!(!Signal::SIGKILL.can_catch());
        assert!(!Signal::SIGSTOP.can_catch());
        assert!(Signal::SIGINT.can_catch());
        assert!(Signal::SIGUSR1.can_catch());
    }

    #[test]
    fn test_set_collapses_duplicates() {
        let mut set = SignalSet::new();
        assert!(set.insert(Signal::SIGINT));
        assert!(!set.insert(Signal::SIGINT));
        assert_eq!(set.len(), 1);
        assert!(set.contains(Signal::SIGINT));
    }

    #[test]
    fn test_set_ops() {
        let set: SignalSet = [Signal::SIGTERM, Signal::SIGHUP, Signal::SIGTERM]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 2);
        assert!(set.intersects(Signal::SIGHUP.into()));
        assert!(!set.intersects(Signal::SIGUSR2.into()));

        let members: Vec<Signal> = set.iter().collect();
        assert_eq!(members, vec![Signal::SIGHUP, Signal::SIGTERM]);

        let mut set = set;
        assert!(set.remove(Signal::SIGHUP));
        assert!(!set.remove(Signal::SIGHUP));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_set_display() {
        let set: SignalSet = [Signal::SIGINT, Signal::SIGTERM].into_iter().collect();
        assert_eq!(set.to_string(), "{SIGINT, SIGTERM}");
        assert_eq!(SignalSet::new().to_string(), "{}");
    }

    #[test]
    fn test_usage_error_classification() {
        assert!(SignalError::SessionClosed.is_usage());
        assert!(SignalError::AlreadyIntercepted(Signal::SIGINT).is_usage());
        assert!(!SignalError::Uncatchable(Signal::SIGKILL).is_usage());
        assert!(!SignalError::RegistrationFailed {
            signal: Signal::SIGINT,
            reason: "EINVAL".into(),
        }
        .is_usage());
    }
}
