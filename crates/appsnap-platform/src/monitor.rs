//! Monitor: a mutex and condition variable that are always used together

use crate::condvar::{ConditionVariable, WaitResult};
use crate::mutex::{Mutex, MutexLocker};
use std::time::Duration;

/// A [`Mutex`] plus the [`ConditionVariable`] that waits on it.
pub struct Monitor {
    mutex: Mutex,
    cond: ConditionVariable,
}

impl Monitor {
    pub fn new() -> Self {
        Self {
            mutex: Mutex::new(),
            cond: ConditionVariable::new(),
        }
    }

    /// Enter the monitor, blocking until the mutex is acquired.
    pub fn enter(&self) -> MonitorLocker<'_> {
        MonitorLocker {
            locker: self.mutex.lock(),
            cond: &self.cond,
        }
    }

    /// Enter the monitor only if it is free right now.
    pub fn try_enter(&self) -> Option<MonitorLocker<'_>> {
        Some(MonitorLocker {
            locker: self.mutex.try_lock()?,
            cond: &self.cond,
        })
    }

    pub fn is_owned_by_current_thread(&self) -> bool {
        self.mutex.is_owned_by_current_thread()
    }

    /// Wake one thread waiting in this monitor.
    ///
    /// Notifying without holding the monitor is allowed but usually races
    /// with the waiter's predicate check.
    pub fn notify(&self) {
        self.cond.notify_one();
    }

    /// Wake all threads waiting in this monitor.
    pub fn notify_all(&self) {
        self.cond.notify_all();
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Held monitor. Dropping it exits the monitor.
pub struct MonitorLocker<'a> {
    locker: MutexLocker<'a>,
    cond: &'a ConditionVariable,
}

impl MonitorLocker<'_> {
    /// Wait until notified.
    pub fn wait(&mut self) {
        self.cond.wait(&mut self.locker);
    }

    /// Wait until notified or `timeout` elapses.
    pub fn wait_for(&mut self, timeout: Duration) -> WaitResult {
        self.cond.wait_for(&mut self.locker, timeout)
    }

    /// Wait in milliseconds; zero waits without a timeout.
    pub fn wait_millis(&mut self, millis: u64) -> WaitResult {
        if millis == 0 {
            self.wait();
            WaitResult::Notified
        } else {
            self.wait_for(Duration::from_millis(millis))
        }
    }

    /// Wait in microseconds; zero waits without a timeout.
    pub fn wait_micros(&mut self, micros: u64) -> WaitResult {
        if micros == 0 {
            self.wait();
            WaitResult::Notified
        } else {
            self.wait_for(Duration::from_micros(micros))
        }
    }

    pub fn notify(&self) {
        self.cond.notify_one();
    }

    pub fn notify_all(&self) {
        self.cond.notify_all();
    }

    /// Leave the monitor before the end of scope
    pub fn exit(self) {
        drop(self);
    }
}
