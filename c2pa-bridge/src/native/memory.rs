//! Owning guards for memory allocated by the native engine.
//!
//! Each guard pairs an allocation with the free function that must release
//! it and calls that function exactly once, on drop.

use std::ffi::{c_char, CStr};
use std::ptr::NonNull;

use super::NativeApi;

/// A NUL-terminated string owned by the engine.
pub(crate) struct NativeString<'a> {
    api: &'a NativeApi,
    ptr: NonNull<c_char>,
}

impl<'a> NativeString<'a> {
    /// Take ownership of `ptr`; `None` when it is null.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a string allocated by the engine and releasable
    /// with `c2pa_string_free`, not owned by anything else.
    pub(crate) unsafe fn from_raw(api: &'a NativeApi, ptr: *mut c_char) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Self { api, ptr })
    }

    pub(crate) fn to_string_lossy(&self) -> String {
        // SAFETY: ptr is a live NUL-terminated engine string.
        unsafe { CStr::from_ptr(self.ptr.as_ptr()) }
            .to_string_lossy()
            .into_owned()
    }
}

impl Drop for NativeString<'_> {
    fn drop(&mut self) {
        // SAFETY: ptr came from the engine and is released once, here.
        unsafe { (self.api.c2pa_string_free)(self.ptr.as_ptr()) }
    }
}

/// A byte buffer owned by the engine with its own free function.
pub(crate) struct NativeBytes<'a> {
    ptr: NonNull<u8>,
    len: usize,
    free: unsafe extern "C" fn(*const u8),
    _api: std::marker::PhantomData<&'a NativeApi>,
}

impl<'a> NativeBytes<'a> {
    /// Take ownership of `len` bytes at `ptr`; `None` when it is null.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or point at `len` readable bytes allocated by the
    /// engine and releasable with `free`.
    pub(crate) unsafe fn from_raw(
        _api: &'a NativeApi,
        ptr: *const u8,
        len: usize,
        free: unsafe extern "C" fn(*const u8),
    ) -> Option<Self> {
        NonNull::new(ptr as *mut u8).map(|ptr| Self {
            ptr,
            len,
            free,
            _api: std::marker::PhantomData,
        })
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr points at len readable bytes for the guard's lifetime.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub(crate) fn to_vec(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }
}

impl Drop for NativeBytes<'_> {
    fn drop(&mut self) {
        // SAFETY: ptr came from the engine allocator matching `free`.
        unsafe { (self.free)(self.ptr.as_ptr()) }
    }
}

/// An array of engine strings released with `c2pa_free_string_array`.
pub(crate) struct NativeStringArray<'a> {
    api: &'a NativeApi,
    ptr: NonNull<*const c_char>,
    len: usize,
}

impl<'a> NativeStringArray<'a> {
    /// # Safety
    ///
    /// `ptr` must be null or an engine-allocated array of `len` entries.
    pub(crate) unsafe fn from_raw(
        api: &'a NativeApi,
        ptr: *const *const c_char,
        len: usize,
    ) -> Option<Self> {
        NonNull::new(ptr as *mut *const c_char).map(|ptr| Self { api, ptr, len })
    }

    /// Copy out every non-null, non-empty entry.
    pub(crate) fn to_vec(&self) -> Vec<String> {
        // SAFETY: ptr points at len entries for the guard's lifetime.
        let entries = unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) };
        entries
            .iter()
            .filter(|entry| !entry.is_null())
            // SAFETY: non-null entries are NUL-terminated engine strings.
            .map(|entry| unsafe { CStr::from_ptr(*entry) }.to_string_lossy().into_owned())
            .filter(|entry| !entry.is_empty())
            .collect()
    }
}

impl Drop for NativeStringArray<'_> {
    fn drop(&mut self) {
        // SAFETY: the array and its length came from the engine together.
        unsafe { (self.api.c2pa_free_string_array)(self.ptr.as_ptr(), self.len) }
    }
}
