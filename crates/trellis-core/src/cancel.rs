//! Cooperative cancellation for the batch loop

use crate::error::{Result, TrellisError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// A shared flag set from a signal watcher and polled by the driver.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Return `Err(Cancelled)` once the token has been set
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(TrellisError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleep for `duration`, waking early if the token is cancelled
    pub fn sleep(&self, duration: Duration) -> Result<()> {
        let deadline = Instant::now() + duration;
        loop {
            self.check()?;
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            std::thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }

    /// Run a blocking job on a worker thread and wait for it, giving up as
    /// soon as the token is cancelled.
    ///
    /// An abandoned worker keeps running until its own I/O timeouts fire;
    /// its result is dropped.
    pub fn run<T, F>(&self, job: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.check()?;
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("trellis-worker".to_string())
            .spawn(move || {
                // The receiver is gone when the caller was cancelled
                let _ = tx.send(job());
            })?;

        loop {
            match rx.recv_timeout(SLEEP_SLICE) {
                Ok(result) => return result,
                Err(RecvTimeoutError::Timeout) => self.check()?,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(TrellisError::IoError(std::io::Error::other(
                        "worker thread exited without a result",
                    )))
                }
            }
        }
    }
}
