//! ThreadSanitizer shim
//!
//! Three names exist in every build: [`no_sanitize_thread!`],
//! [`do_if_tsan!`] and [`do_if_not_tsan!`]. With the `tsan` feature the
//! crate also forwards [`acquire`]/[`release`] to the detector so code can
//! announce happens-before edges it establishes by other means (fences,
//! publication through raw pointers). Without the feature the hooks are
//! empty `#[inline(always)]` functions.
//!
//! The `tsan` feature must be paired with `-Zsanitizer=thread` on nightly.

use std::ffi::c_void;

/// Whether this build was compiled for ThreadSanitizer.
pub const USING_THREAD_SANITIZER: bool = cfg!(feature = "tsan");

#[cfg(feature = "tsan")]
extern "C" {
    fn __tsan_acquire(addr: *mut c_void);
    fn __tsan_release(addr: *mut c_void);
}

/// Tell the race detector that the current thread acquires `addr`.
#[inline(always)]
pub fn acquire<T: ?Sized>(addr: *const T) {
    #[cfg(feature = "tsan")]
    unsafe {
        __tsan_acquire(addr as *const c_void as *mut c_void);
    }
    #[cfg(not(feature = "tsan"))]
    let _ = addr as *const c_void;
}

/// Tell the race detector that the current thread releases `addr`.
#[inline(always)]
pub fn release<T: ?Sized>(addr: *const T) {
    #[cfg(feature = "tsan")]
    unsafe {
        __tsan_release(addr as *const c_void as *mut c_void);
    }
    #[cfg(not(feature = "tsan"))]
    let _ = addr as *const c_void;
}

/// Expands to the given statements only under ThreadSanitizer.
#[cfg(feature = "tsan")]
#[macro_export]
macro_rules! do_if_tsan {
    ($($code:tt)*) => { $($code)* };
}

/// Expands to the given statements only under ThreadSanitizer.
#[cfg(not(feature = "tsan"))]
#[macro_export]
macro_rules! do_if_tsan {
    ($($code:tt)*) => {};
}

/// Expands to the given statements only when ThreadSanitizer is off.
#[cfg(feature = "tsan")]
#[macro_export]
macro_rules! do_if_not_tsan {
    ($($code:tt)*) => {};
}

/// Expands to the given statements only when ThreadSanitizer is off.
#[cfg(not(feature = "tsan"))]
#[macro_export]
macro_rules! do_if_not_tsan {
    ($($code:tt)*) => { $($code)* };
}

/// Excludes the wrapped functions from race instrumentation.
///
/// Under ThreadSanitizer the calling crate needs `#![feature(sanitize)]`.
#[cfg(feature = "tsan")]
#[macro_export]
macro_rules! no_sanitize_thread {
    ($($item:item)*) => { $( #[sanitize(thread = "off")] $item )* };
}

/// Excludes the wrapped functions from race instrumentation.
#[cfg(not(feature = "tsan"))]
#[macro_export]
macro_rules! no_sanitize_thread {
    ($($item:item)*) => { $( $item )* };
}
