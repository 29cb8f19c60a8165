//! Thread identity and thread-local storage keys

#[cfg(unix)]
use std::ffi::c_void;

/// Identity of an OS thread.
///
/// On Unix this is the `pthread_t` of the thread; elsewhere it falls back to
/// the standard library's thread id.
#[cfg(unix)]
#[derive(Debug, Clone, Copy)]
pub struct ThreadId(libc::pthread_t);

#[cfg(not(unix))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadId(std::thread::ThreadId);

// `pthread_t` is an opaque pointer on some hosts; it is only ever compared.
#[cfg(unix)]
unsafe impl Send for ThreadId {}
#[cfg(unix)]
unsafe impl Sync for ThreadId {}

#[cfg(unix)]
impl ThreadId {
    /// The calling thread's id.
    pub fn current() -> Self {
        Self(unsafe { libc::pthread_self() })
    }

    /// Integer form, for logging and hashing.
    #[allow(clippy::unnecessary_cast)]
    pub fn as_raw(&self) -> usize {
        self.0 as usize
    }
}

#[cfg(unix)]
impl PartialEq for ThreadId {
    fn eq(&self, other: &Self) -> bool {
        unsafe { libc::pthread_equal(self.0, other.0) != 0 }
    }
}

#[cfg(unix)]
impl Eq for ThreadId {}

#[cfg(not(unix))]
impl ThreadId {
    /// The calling thread's id.
    pub fn current() -> Self {
        Self(std::thread::current().id())
    }

    /// Integer form, for logging and hashing.
    pub fn as_raw(&self) -> usize {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.0.hash(&mut hasher);
        hasher.finish() as usize
    }
}

/// Errors from the thread-local key API. Each carries the OS error code.
#[cfg(unix)]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ThreadLocalError {
    /// `pthread_key_create` failed
    #[error("failed to create thread-local key (errno {0})")]
    Create(i32),

    /// `pthread_key_delete` failed
    #[error("failed to delete thread-local key (errno {0})")]
    Delete(i32),

    /// `pthread_setspecific` failed
    #[error("failed to set thread-local value (errno {0})")]
    Set(i32),

    /// Operation on the unset sentinel key
    #[error("thread-local key is unset")]
    Unset,
}

/// Destructor run for a thread's non-null value when that thread exits.
#[cfg(unix)]
pub type ThreadDestructor = unsafe extern "C" fn(*mut c_void);

/// An owned pthread thread-local key.
///
/// The key is deleted when dropped. [`ThreadLocalKey::unset`] builds the
/// sentinel that owns nothing; reading through it is a bug and trips a
/// debug assertion.
#[cfg(unix)]
#[derive(Debug, PartialEq, Eq)]
pub struct ThreadLocalKey(libc::pthread_key_t);

#[cfg(unix)]
impl ThreadLocalKey {
    const UNSET: libc::pthread_key_t = libc::pthread_key_t::MAX;

    /// The "no key" sentinel.
    pub const fn unset() -> Self {
        Self(Self::UNSET)
    }

    /// Allocate a new key, optionally with a per-thread destructor.
    pub fn create(destructor: Option<ThreadDestructor>) -> Result<Self, ThreadLocalError> {
        let mut key: libc::pthread_key_t = 0;
        let rc = unsafe { libc::pthread_key_create(&mut key, destructor) };
        if rc != 0 {
            return Err(ThreadLocalError::Create(rc));
        }
        debug_assert_ne!(key, Self::UNSET);
        Ok(Self(key))
    }

    pub fn is_unset(&self) -> bool {
        self.0 == Self::UNSET
    }

    /// Read the calling thread's value. Zero if never set.
    pub fn get(&self) -> usize {
        debug_assert!(!self.is_unset(), "read through unset thread-local key");
        unsafe { libc::pthread_getspecific(self.0) as usize }
    }

    /// Store a value for the calling thread.
    pub fn set(&self, value: usize) -> Result<(), ThreadLocalError> {
        if self.is_unset() {
            return Err(ThreadLocalError::Unset);
        }
        let rc = unsafe { libc::pthread_setspecific(self.0, value as *const c_void) };
        if rc != 0 {
            return Err(ThreadLocalError::Set(rc));
        }
        Ok(())
    }

    /// Delete the key now instead of on drop, reporting failure.
    pub fn delete(mut self) -> Result<(), ThreadLocalError> {
        if self.is_unset() {
            return Err(ThreadLocalError::Unset);
        }
        let key = std::mem::replace(&mut self.0, Self::UNSET);
        let rc = unsafe { libc::pthread_key_delete(key) };
        if rc != 0 {
            return Err(ThreadLocalError::Delete(rc));
        }
        Ok(())
    }
}

#[cfg(unix)]
impl Drop for ThreadLocalKey {
    fn drop(&mut self) {
        if !self.is_unset() {
            unsafe {
                libc::pthread_key_delete(self.0);
            }
        }
    }
}
