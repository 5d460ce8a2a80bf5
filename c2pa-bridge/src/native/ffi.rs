//! C ABI types shared with the native engine.
//!
//! Layouts here must match the engine's headers byte for byte. Handle types
//! are opaque: the binding only ever holds pointers to them.

use std::ffi::{c_char, c_int, c_void};

/// Opaque per-stream context handed back to every stream callback.
#[repr(C)]
pub struct StreamContext {
    _private: [u8; 0],
}

#[repr(C)]
pub struct C2paReader {
    _private: [u8; 0],
}

#[repr(C)]
pub struct C2paBuilder {
    _private: [u8; 0],
}

#[repr(C)]
pub struct C2paSigner {
    _private: [u8; 0],
}

/// Read up to `len` bytes into `data`; bytes read, 0 at EOF, -1 on error.
pub type ReadCallback = unsafe extern "C" fn(*mut StreamContext, *mut u8, isize) -> isize;

/// Seek by `offset` relative to `whence`; new absolute position or -1.
pub type SeekCallback = unsafe extern "C" fn(*mut StreamContext, isize, c_int) -> isize;

/// Write `len` bytes from `data`; bytes written or -1.
pub type WriteCallback = unsafe extern "C" fn(*mut StreamContext, *const u8, isize) -> isize;

/// Flush buffered data; 0 or -1.
pub type FlushCallback = unsafe extern "C" fn(*mut StreamContext) -> isize;

/// Sign `data`, writing at most `signed_len` bytes to `signed_bytes`;
/// signature length or -1.
pub type SignerCallback =
    unsafe extern "C" fn(*const c_void, *const u8, usize, *mut u8, usize) -> isize;

/// Stream record allocated by `c2pa_create_stream`.
#[repr(C)]
pub struct C2paStream {
    pub context: *mut StreamContext,
    pub reader: ReadCallback,
    pub seeker: SeekCallback,
    pub writer: WriteCallback,
    pub flusher: FlushCallback,
}

/// Raw signer configuration for `c2pa_signer_from_info`.
#[repr(C)]
pub struct C2paSignerInfo {
    pub alg: *const c_char,
    pub sign_cert: *const c_char,
    pub private_key: *const c_char,
    pub ta_url: *const c_char,
}

pub const SEEK_START: c_int = 0;
pub const SEEK_CURRENT: c_int = 1;
pub const SEEK_END: c_int = 2;
