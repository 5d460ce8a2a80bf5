#![no_main]

//! Fuzz target for C2paError::from_native_message()
//!
//! Error strings come from the native engine and are not trusted. Every
//! input must translate to some error kind without panicking.
//!
//! Run with: cargo +nightly fuzz run fuzz_native_error

use c2pa_bridge::C2paError;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    let err = C2paError::from_native_message(&raw);
    assert!(err.is_native());
    let _ = err.to_string();
});
