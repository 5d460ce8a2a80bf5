//! Engine-owned buffers and their free functions.

use std::collections::HashMap;
use std::ffi::{c_char, CString};
use std::sync::{Mutex, OnceLock};

use crate::spy;

/// Byte buffers by address; their free functions only receive the pointer.
fn byte_buffers() -> &'static Mutex<HashMap<usize, Box<[u8]>>> {
    static BUFFERS: OnceLock<Mutex<HashMap<usize, Box<[u8]>>>> = OnceLock::new();
    BUFFERS.get_or_init(|| Mutex::new(HashMap::new()))
}

pub(crate) fn alloc_string(value: &str) -> *mut c_char {
    let sanitized: String = value.chars().filter(|c| *c != '\0').collect();
    match CString::new(sanitized) {
        Ok(s) => {
            spy::allocated();
            s.into_raw()
        }
        Err(_) => std::ptr::null_mut(),
    }
}

pub(crate) unsafe fn free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
        spy::freed();
    }
}

pub(crate) fn alloc_bytes(data: &[u8]) -> *const u8 {
    let buffer: Box<[u8]> = data.into();
    let ptr = buffer.as_ptr();
    if let Ok(mut buffers) = byte_buffers().lock() {
        buffers.insert(ptr as usize, buffer);
        spy::allocated();
        ptr
    } else {
        std::ptr::null()
    }
}

pub(crate) fn free_bytes(ptr: *const u8) {
    if ptr.is_null() {
        return;
    }
    if let Ok(mut buffers) = byte_buffers().lock() {
        if buffers.remove(&(ptr as usize)).is_some() {
            spy::freed();
        }
    }
}

/// A heap array of owned C strings; `count` is written through the out-parameter.
pub(crate) fn alloc_string_array(values: &[&str], count: *mut usize) -> *const *const c_char {
    let array: Box<[*const c_char]> = values
        .iter()
        .map(|v| CString::new(*v).map_or(std::ptr::null(), |s| s.into_raw().cast_const()))
        .collect();
    if !count.is_null() {
        // SAFETY: the caller passed a valid out-parameter.
        unsafe { *count = array.len() };
    }
    spy::allocated();
    Box::into_raw(array).cast::<*const c_char>().cast_const()
}

pub(crate) unsafe fn free_string_array(ptr: *const *const c_char, count: usize) {
    if ptr.is_null() {
        return;
    }
    let slice = std::ptr::slice_from_raw_parts_mut(ptr.cast_mut(), count);
    let array = Box::from_raw(slice);
    for entry in array.iter() {
        if !entry.is_null() {
            drop(CString::from_raw(entry.cast_mut()));
        }
    }
    spy::freed();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_are_tracked_until_freed() {
        let before = spy::outstanding_allocations();
        let ptr = alloc_bytes(b"abc");
        assert_eq!(spy::outstanding_allocations(), before + 1);
        free_bytes(ptr);
        free_bytes(ptr);
        assert_eq!(spy::outstanding_allocations(), before);
    }

    #[test]
    fn test_string_array_round_trip() {
        let before = spy::outstanding_allocations();
        let mut count = 0;
        let ptr = alloc_string_array(&["a", "", "b"], &mut count);
        assert_eq!(count, 3);
        unsafe { free_string_array(ptr, count) };
        assert_eq!(spy::outstanding_allocations(), before);
    }
}
