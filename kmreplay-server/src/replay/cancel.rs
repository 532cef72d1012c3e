//! Cooperative cancellation shared between a replay worker and its owner.

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

struct Inner {
    cancelled: AtomicBool,
    /// Dropped on cancel, which wakes every waiter on `rx`
    tx: Mutex<Option<Sender<()>>>,
    rx: Receiver<()>,
}

/// Cancellation flag that can also interrupt a timed wait
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = channel::bounded(0);
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                tx: Mutex::new(Some(tx)),
                rx,
            }),
        }
    }

    /// Request cancellation. Calling this more than once is a no-op.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        let tx = self
            .inner
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(tx);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Sleep for `timeout` unless cancelled first.
    ///
    /// Returns `true` when the token is cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }
        match self.inner.rx.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => self.is_cancelled(),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_wait_times_out() {
        let token = CancelToken::new();
        let start = Instant::now();
        assert!(!token.wait_timeout(Duration::from_millis(50)));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let token = CancelToken::new();
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
        assert!(token.wait_timeout(Duration::from_secs(60)));
    }

    #[test]
    fn test_cancel_interrupts_wait() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let start = Instant::now();
        let handle = thread::spawn(move || waiter.wait_timeout(Duration::from_secs(60)));

        thread::sleep(Duration::from_millis(50));
        token.cancel();

        assert!(handle.join().unwrap());
        assert!(start.elapsed() < Duration::from_secs(10));
    }
}
