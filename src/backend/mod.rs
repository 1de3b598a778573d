/*!
 * Signal Backends
 * Implementations of the registration seam
 */

pub mod testing;
#[cfg(unix)]
mod unix;

pub use testing::{TestBackend, TestDisposition};
#[cfg(unix)]
pub use unix::UnixBackend;
