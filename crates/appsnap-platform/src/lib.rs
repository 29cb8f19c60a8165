//! Platform layer
//!
//! Thin wrappers over the host's threading primitives plus the
//! ThreadSanitizer shim:
//! - **os_thread**: thread identity and thread-local keys
//! - **mutex**: non-recursive mutex with an RAII locker
//! - **condvar**: condition variable paired with [`Mutex`]
//! - **monitor**: mutex + condition variable used as one unit
//! - **tsan**: race-detector hooks that vanish in normal builds
//!
//! None of these types implement `Clone`; each owns exactly one OS-level
//! resource.

#![cfg_attr(feature = "tsan", feature(sanitize))]

pub mod condvar;
pub mod monitor;
pub mod mutex;
pub mod os_thread;
pub mod tsan;

pub use condvar::{ConditionVariable, WaitResult};
pub use monitor::{Monitor, MonitorLocker};
pub use mutex::{Mutex, MutexLocker};
pub use os_thread::ThreadId;
#[cfg(unix)]
pub use os_thread::{ThreadLocalError, ThreadLocalKey};
