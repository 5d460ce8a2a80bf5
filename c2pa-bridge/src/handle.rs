//! Single-owner wrapper for native engine handles.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr::NonNull;

use tracing::{error, trace};

use crate::error::{C2paError, C2paResult};

/// An engine object released through `release` exactly once.
///
/// After [`release`](Self::release) every [`get`](Self::get) fails with
/// [`C2paError::ClosedResource`] without touching the engine.
pub(crate) struct NativeHandle<T> {
    ptr: Option<NonNull<T>>,
    release: unsafe extern "C" fn(*mut T),
    kind: &'static str,
}

// SAFETY: engine handles are not tied to the creating thread; `&mut self`
// on every mutating path keeps use single-threaded per handle.
unsafe impl<T> Send for NativeHandle<T> {}

impl<T> NativeHandle<T> {
    /// Take ownership of `ptr`; `None` when the engine returned null.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live engine object releasable by `release`
    /// and owned by nothing else.
    pub(crate) unsafe fn new(
        ptr: *mut T,
        release: unsafe extern "C" fn(*mut T),
        kind: &'static str,
    ) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Self {
            ptr: Some(ptr),
            release,
            kind,
        })
    }

    pub(crate) fn get(&self) -> C2paResult<*mut T> {
        self.ptr
            .map(NonNull::as_ptr)
            .ok_or(C2paError::ClosedResource(self.kind))
    }

    pub(crate) fn is_released(&self) -> bool {
        self.ptr.is_none()
    }

    /// Release the engine object. Later calls do nothing.
    pub(crate) fn release(&mut self) {
        let Some(ptr) = self.ptr.take() else {
            return;
        };
        let release = self.release;
        // SAFETY: ptr was live and is released exactly once.
        let outcome = catch_unwind(AssertUnwindSafe(|| unsafe { release(ptr.as_ptr()) }));
        match outcome {
            Ok(()) => trace!(kind = self.kind, "Native handle released"),
            Err(_) => error!(kind = self.kind, "Native handle release panicked"),
        }
    }
}

impl<T> Drop for NativeHandle<T> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    thread_local! {
        static RELEASED: Cell<usize> = const { Cell::new(0) };
    }

    unsafe extern "C" fn count_release(ptr: *mut u8) {
        RELEASED.with(|n| n.set(n.get() + 1));
        drop(Box::from_raw(ptr));
    }

    fn boxed() -> *mut u8 {
        Box::into_raw(Box::new(7u8))
    }

    #[test]
    fn test_null_is_rejected() {
        assert!(unsafe { NativeHandle::new(std::ptr::null_mut(), count_release, "Test") }.is_none());
    }

    #[test]
    fn test_release_runs_once() {
        RELEASED.with(|n| n.set(0));
        let mut handle = unsafe { NativeHandle::new(boxed(), count_release, "Test") }.unwrap();
        assert!(handle.get().is_ok());

        handle.release();
        handle.release();
        drop(handle);
        assert_eq!(RELEASED.with(Cell::get), 1);
    }

    #[test]
    fn test_get_after_release_is_closed_resource() {
        let mut handle = unsafe { NativeHandle::new(boxed(), count_release, "Reader") }.unwrap();
        handle.release();
        assert!(handle.is_released());
        assert!(matches!(handle.get(), Err(C2paError::ClosedResource("Reader"))));
    }

    #[test]
    fn test_drop_releases() {
        RELEASED.with(|n| n.set(0));
        drop(unsafe { NativeHandle::new(boxed(), count_release, "Test") }.unwrap());
        assert_eq!(RELEASED.with(Cell::get), 1);
    }
}
