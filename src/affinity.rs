/*!
 * Thread Affinity Guard
 * Pins session lifecycle operations to the run-loop thread
 */

use crate::types::{SignalError, SignalResult};
use std::thread::{self, ThreadId};

/// Captures the thread driving the run loop and rejects lifecycle calls
/// from anywhere else.
///
/// Handler tables are process-wide but the consumer protocol is
/// single-threaded; every install/restore has to happen on the captured
/// thread or the wakeup discipline breaks down.
#[derive(Debug, Clone)]
pub struct ThreadAffinityGuard {
    id: ThreadId,
    name: String,
}

impl ThreadAffinityGuard {
    /// Capture the current thread as the designated loop thread
    pub fn capture() -> Self {
        let current = thread::current();
        Self {
            id: current.id(),
            name: describe(&current),
        }
    }

    /// Fail with a usage error unless called on the captured thread
    pub fn ensure_current(&self) -> SignalResult<()> {
        let current = thread::current();
        if current.id() == self.id {
            Ok(())
        } else {
            Err(SignalError::WrongThread {
                expected: self.name.clone(),
                actual: describe(&current),
            })
        }
    }
}

fn describe(t: &thread::Thread) -> String {
    match t.name() {
        Some(name) => format!("{} ({:?})", name, t.id()),
        None => format!("{:?}", t.id()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_thread_passes() {
        let guard = ThreadAffinityGuard::capture();
        assert!(guard.ensure_current().is_ok());
    }

    #[test]
    fn test_other_thread_fails() {
        let guard = ThreadAffinityGuard::capture();
        let result = thread::spawn(move || guard.ensure_current())
            .join()
            .unwrap();

        match result {
            Err(err @ SignalError::WrongThread { .. }) => assert!(err.is_usage()),
            other => panic!("expected WrongThread, got {:?}", other),
        }
    }
}
