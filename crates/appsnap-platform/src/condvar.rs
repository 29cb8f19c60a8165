//! Condition variable paired with [`Mutex`]

use crate::mutex::MutexLocker;
use parking_lot::Condvar;
use std::time::Duration;

/// Outcome of a timed wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    /// Woken by a notify (or spuriously)
    Notified,
    /// The timeout elapsed first
    TimedOut,
}

/// Condition variable. Every wait must hold a [`MutexLocker`].
pub struct ConditionVariable {
    cond: Condvar,
}

impl ConditionVariable {
    pub fn new() -> Self {
        Self {
            cond: Condvar::new(),
        }
    }

    /// Atomically release the locker's mutex and block until notified.
    ///
    /// The mutex is re-acquired before returning. Spurious wakeups are
    /// possible; callers re-check their predicate.
    pub fn wait(&self, locker: &mut MutexLocker<'_>) {
        let mutex = locker.mutex();
        mutex.clear_owner();
        self.cond.wait(locker.guard_mut());
        mutex.mark_owned();
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`.
    pub fn wait_for(&self, locker: &mut MutexLocker<'_>, timeout: Duration) -> WaitResult {
        let mutex = locker.mutex();
        mutex.clear_owner();
        let result = self.cond.wait_for(locker.guard_mut(), timeout);
        mutex.mark_owned();
        if result.timed_out() {
            WaitResult::TimedOut
        } else {
            WaitResult::Notified
        }
    }

    /// Wake one waiter
    pub fn notify_one(&self) {
        self.cond.notify_one();
    }

    /// Wake all waiters
    pub fn notify_all(&self) {
        self.cond.notify_all();
    }
}

impl Default for ConditionVariable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_wait_for_times_out() {
        let mutex = Mutex::new();
        let cond = ConditionVariable::new();

        let mut locker = mutex.lock();
        let result = cond.wait_for(&mut locker, Duration::from_millis(10));
        assert_eq!(result, WaitResult::TimedOut);
        assert!(mutex.is_owned_by_current_thread());
    }

    #[test]
    fn test_notify_wakes_waiter() {
        let shared = Arc::new((Mutex::new(), ConditionVariable::new(), AtomicBool::new(false)));

        let remote = Arc::clone(&shared);
        let waiter = std::thread::spawn(move || {
            let (mutex, cond, ready) = &*remote;
            let mut locker = mutex.lock();
            while !ready.load(Ordering::Relaxed) {
                cond.wait(&mut locker);
            }
            mutex.is_owned_by_current_thread()
        });

        {
            let (mutex, cond, ready) = &*shared;
            let _locker = mutex.lock();
            ready.store(true, Ordering::Relaxed);
            cond.notify_all();
        }

        assert!(waiter.join().unwrap());
    }
}
