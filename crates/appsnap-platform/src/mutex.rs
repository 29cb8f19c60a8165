//! Non-recursive OS-thread mutex

use crate::os_thread::ThreadId;
use crossbeam::atomic::AtomicCell;
use parking_lot::{Mutex as ParkingLotMutex, MutexGuard as ParkingLotGuard};

/// Mutex guarding no data, used to build critical sections.
///
/// Unlike `std::sync::Mutex` this type does not own the protected state;
/// callers pair it with whatever it protects (as [`crate::Monitor`] does).
/// Re-locking from the owning thread is a bug and trips a debug assertion
/// instead of deadlocking.
pub struct Mutex {
    /// Underlying lock
    lock: ParkingLotMutex<()>,

    /// Current owner thread (None if unlocked)
    owner: AtomicCell<Option<ThreadId>>,
}

impl Mutex {
    /// Create an unlocked mutex
    pub fn new() -> Self {
        Self {
            lock: ParkingLotMutex::new(()),
            owner: AtomicCell::new(None),
        }
    }

    /// Block until the lock is acquired.
    pub fn lock(&self) -> MutexLocker<'_> {
        debug_assert!(
            !self.is_owned_by_current_thread(),
            "recursive lock of non-recursive Mutex"
        );
        let guard = self.lock.lock();
        self.owner.store(Some(ThreadId::current()));
        MutexLocker { mutex: self, guard }
    }

    /// Acquire the lock only if it is free right now.
    pub fn try_lock(&self) -> Option<MutexLocker<'_>> {
        let guard = self.lock.try_lock()?;
        self.owner.store(Some(ThreadId::current()));
        Some(MutexLocker { mutex: self, guard })
    }

    /// Check if the mutex is currently held by anyone
    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    /// Check if the calling thread holds the mutex
    pub fn is_owned_by_current_thread(&self) -> bool {
        self.owner.load() == Some(ThreadId::current())
    }

    pub(crate) fn clear_owner(&self) {
        self.owner.store(None);
    }

    pub(crate) fn mark_owned(&self) {
        self.owner.store(Some(ThreadId::current()));
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII lock holder for [`Mutex`] (unlocks on drop)
pub struct MutexLocker<'a> {
    /// Mutex this locker holds
    mutex: &'a Mutex,
    /// Guard of the underlying lock
    guard: ParkingLotGuard<'a, ()>,
}

impl<'a> MutexLocker<'a> {
    /// The mutex held by this locker
    pub fn mutex(&self) -> &'a Mutex {
        self.mutex
    }

    /// Release the lock before the end of scope
    pub fn unlock(self) {
        drop(self);
    }

    pub(crate) fn guard_mut(&mut self) -> &mut ParkingLotGuard<'a, ()> {
        &mut self.guard
    }
}

impl Drop for MutexLocker<'_> {
    fn drop(&mut self) {
        // Cleared before `guard` drops, so no other thread observes a stale owner.
        self.mutex.clear_owner();
    }
}
