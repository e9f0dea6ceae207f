//! Storage calls from async workers
//!
//! SQLite calls block, and a contended claim can wait for the whole busy
//! timeout. On a multi-threaded runtime the calling worker thread is handed
//! over to the blocking pool for the duration, so the browser handler and
//! the other workers keep running.

use tokio::runtime::{Handle, RuntimeFlavor};

/// Runs a blocking call from inside a worker task
///
/// Falls back to a plain call on a current-thread runtime, where there is
/// no other worker thread to hand the tasks to.
pub(crate) fn run_blocking<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current().map(|handle| handle.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(f),
        _ => f(),
    }
}
