//! Replay pacing with an explicit locking contract.
//!
//! The pace value is only reachable through [`Pace::lock`], which returns a
//! scoped [`PaceGuard`]. The guard releases the lock when dropped, so reading
//! or writing the pace without holding the lock cannot be expressed:
//!
//! ```compile_fail
//! use kmreplay_server::replay::Pace;
//! use std::time::Duration;
//!
//! let pace = Pace::new(Duration::from_secs(1));
//! let secs = pace.value;
//! ```
//!
//! The replay worker holds the guard for the whole pacing wait after each
//! forwarded datagram, so an update from another thread is applied between
//! datagrams and never shortens or stretches a wait already in progress.
//! The worker releases it with [`PaceGuard::unlock_fair`], which hands the
//! lock to a blocked [`Pace::lock`] caller before the worker can take it
//! again, so such a caller waits at most one pacing interval.

use parking_lot::{Mutex, MutexGuard};
use std::time::Duration;

/// Minimum delay between consecutive forwarded datagrams
#[derive(Debug)]
pub struct Pace {
    value: Mutex<Duration>,
}

impl Pace {
    pub fn new(pace: Duration) -> Self {
        Self {
            value: Mutex::new(pace),
        }
    }

    /// Acquire the pace lock, blocking while the worker is pacing
    pub fn lock(&self) -> PaceGuard<'_> {
        PaceGuard {
            guard: self.value.lock(),
        }
    }

    /// Acquire the pace lock only if it is free right now
    pub fn try_lock(&self) -> Option<PaceGuard<'_>> {
        self.value.try_lock().map(|guard| PaceGuard { guard })
    }
}

/// Scoped access to the pace value
pub struct PaceGuard<'a> {
    guard: MutexGuard<'a, Duration>,
}

impl PaceGuard<'_> {
    pub fn get(&self) -> Duration {
        *self.guard
    }

    pub fn set(&mut self, pace: Duration) {
        *self.guard = pace;
    }

    /// Set the pace in seconds. Negative and NaN values become zero, values
    /// too large for a `Duration` saturate to `Duration::MAX`.
    pub fn set_secs_f64(&mut self, secs: f64) {
        let pace = if secs.is_nan() || secs <= 0.0 {
            Duration::ZERO
        } else {
            Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
        };
        self.set(pace);
    }

    /// Release the lock, handing it to a thread blocked in [`Pace::lock`]
    /// if there is one
    pub fn unlock_fair(self) {
        MutexGuard::unlock_fair(self.guard);
    }
}

impl std::fmt::Debug for PaceGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PaceGuard").field(&*self.guard).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_get_set() {
        let pace = Pace::new(Duration::from_secs(1));
        {
            let mut guard = pace.lock();
            assert_eq!(guard.get(), Duration::from_secs(1));
            guard.set(Duration::from_millis(250));
        }
        assert_eq!(pace.lock().get(), Duration::from_millis(250));
    }

    #[test]
    fn test_set_secs_rejects_negative() {
        let pace = Pace::new(Duration::from_secs(1));
        pace.lock().set_secs_f64(-3.0);
        assert_eq!(pace.lock().get(), Duration::ZERO);
        pace.lock().set_secs_f64(0.5);
        assert_eq!(pace.lock().get(), Duration::from_millis(500));
        pace.lock().set_secs_f64(f64::NAN);
        assert_eq!(pace.lock().get(), Duration::ZERO);
    }

    #[test]
    fn test_set_secs_saturates_on_overflow() {
        let pace = Pace::new(Duration::ZERO);
        pace.lock().set_secs_f64(1e30);
        assert_eq!(pace.lock().get(), Duration::MAX);
        pace.lock().set_secs_f64(f64::INFINITY);
        assert_eq!(pace.lock().get(), Duration::MAX);
    }

    #[test]
    fn test_fair_unlock_hands_over_to_waiter() {
        let pace = Arc::new(Pace::new(Duration::from_secs(1)));
        let holder = pace.lock();

        let waiter = {
            let pace = pace.clone();
            thread::spawn(move || pace.lock().set(Duration::ZERO))
        };
        // let the waiter park on the lock
        thread::sleep(Duration::from_millis(100));

        holder.unlock_fair();
        // retaking at once must not beat the parked waiter
        let again = pace.lock();
        assert_eq!(again.get(), Duration::ZERO);
        drop(again);
        waiter.join().unwrap();
    }

    #[test]
    fn test_try_lock_while_held() {
        let pace = Pace::new(Duration::ZERO);
        let guard = pace.lock();
        assert!(pace.try_lock().is_none());
        drop(guard);
        assert!(pace.try_lock().is_some());
    }

    #[test]
    fn test_lock_released_on_panic_path() {
        let pace = Arc::new(Pace::new(Duration::from_secs(2)));
        let worker = pace.clone();
        let result = thread::spawn(move || {
            let _guard = worker.lock();
            panic!("worker failed while pacing");
        })
        .join();
        assert!(result.is_err());

        let mut guard = pace.lock();
        assert_eq!(guard.get(), Duration::from_secs(2));
        guard.set(Duration::ZERO);
    }
}
