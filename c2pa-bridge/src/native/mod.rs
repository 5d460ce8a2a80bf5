//! Native engine boundary.
//!
//! The engine is reached only through a table of `extern "C"` function
//! pointers. The table is resolved by symbol name, either from a shared
//! library opened with `dlopen` or from any other resolver, and every
//! required symbol is validated before the table exists.

pub mod ffi;
pub(crate) mod loader;
pub(crate) mod memory;

use std::ffi::{c_char, c_int, c_void};

use self::ffi::*;
use self::loader::Library;
use crate::error::{C2paError, C2paResult};

macro_rules! native_api {
    ($( $name:ident: fn($($arg:ty),* $(,)?) $(-> $ret:ty)?; )+) => {
        /// Resolved native entry points.
        pub(crate) struct NativeApi {
            library: Option<Library>,
            $( pub(crate) $name: unsafe extern "C" fn($($arg),*) $(-> $ret)?, )+
        }

        /// Every entry point that must be exported before the binding is usable.
        pub const REQUIRED_SYMBOLS: &[&str] = &[$(stringify!($name)),+];

        impl NativeApi {
            /// Resolve the full table through `lookup`.
            ///
            /// Fails with [`C2paError::MissingSymbols`] listing every name the
            /// lookup could not produce.
            ///
            /// # Safety
            ///
            /// Each non-null pointer returned by `lookup` must be a function
            /// with the C signature of the entry point of that name, and must
            /// stay valid for as long as the returned table is alive.
            pub(crate) unsafe fn resolve<F>(mut lookup: F) -> C2paResult<Self>
            where
                F: FnMut(&str) -> Option<*const c_void>,
            {
                let mut missing = Vec::new();
                $(
                    let $name = lookup(stringify!($name)).filter(|sym| !sym.is_null());
                    if $name.is_none() {
                        missing.push(stringify!($name));
                    }
                )+
                $(
                    let Some($name) = $name else {
                        return Err(C2paError::MissingSymbols(missing));
                    };
                )+

                Ok(Self {
                    library: None,
                    $(
                        $name: std::mem::transmute::<
                            *const c_void,
                            unsafe extern "C" fn($($arg),*) $(-> $ret)?,
                        >($name),
                    )+
                })
            }
        }
    };
}

native_api! {
    c2pa_version: fn() -> *mut c_char;
    c2pa_error: fn() -> *mut c_char;
    c2pa_string_free: fn(*mut c_char);
    c2pa_load_settings: fn(*const c_char, *const c_char) -> c_int;

    c2pa_create_stream: fn(
        *mut StreamContext,
        ReadCallback,
        SeekCallback,
        WriteCallback,
        FlushCallback,
    ) -> *mut C2paStream;
    c2pa_release_stream: fn(*mut C2paStream);

    c2pa_reader_from_stream: fn(*const c_char, *mut C2paStream) -> *mut C2paReader;
    c2pa_reader_from_manifest_data_and_stream: fn(
        *const c_char,
        *mut C2paStream,
        *const u8,
        usize,
    ) -> *mut C2paReader;
    c2pa_reader_free: fn(*mut C2paReader);
    c2pa_reader_json: fn(*mut C2paReader) -> *mut c_char;
    c2pa_reader_resource_to_stream: fn(*mut C2paReader, *const c_char, *mut C2paStream) -> i64;
    c2pa_reader_supported_mime_types: fn(*mut usize) -> *const *const c_char;

    c2pa_builder_from_json: fn(*const c_char) -> *mut C2paBuilder;
    c2pa_builder_from_archive: fn(*mut C2paStream) -> *mut C2paBuilder;
    c2pa_builder_free: fn(*mut C2paBuilder);
    c2pa_builder_set_no_embed: fn(*mut C2paBuilder);
    c2pa_builder_set_remote_url: fn(*mut C2paBuilder, *const c_char) -> c_int;
    c2pa_builder_add_resource: fn(*mut C2paBuilder, *const c_char, *mut C2paStream) -> c_int;
    c2pa_builder_add_ingredient_from_stream: fn(
        *mut C2paBuilder,
        *const c_char,
        *const c_char,
        *mut C2paStream,
    ) -> c_int;
    c2pa_builder_to_archive: fn(*mut C2paBuilder, *mut C2paStream) -> c_int;
    c2pa_builder_sign: fn(
        *mut C2paBuilder,
        *const c_char,
        *mut C2paStream,
        *mut C2paStream,
        *mut C2paSigner,
        *mut *const u8,
    ) -> i64;
    c2pa_builder_supported_mime_types: fn(*mut usize) -> *const *const c_char;
    c2pa_manifest_bytes_free: fn(*const u8);

    c2pa_format_embeddable: fn(*const c_char, *const u8, usize, *mut *const u8) -> i64;

    c2pa_signer_create: fn(
        *const c_void,
        SignerCallback,
        c_int,
        *const c_char,
        *const c_char,
    ) -> *mut C2paSigner;
    c2pa_signer_from_info: fn(*const C2paSignerInfo) -> *mut C2paSigner;
    c2pa_signer_reserve_size: fn(*mut C2paSigner) -> i64;
    c2pa_signer_free: fn(*mut C2paSigner);

    c2pa_ed25519_sign: fn(*const u8, usize, *const c_char) -> *const u8;
    c2pa_signature_free: fn(*const u8);
    c2pa_free_string_array: fn(*const *const c_char, usize);
}

impl NativeApi {
    /// Keep `library` mapped for as long as this table lives.
    pub(crate) fn with_library(mut self, library: Library) -> Self {
        self.library = Some(library);
        self
    }

    /// Path of the backing shared library, if the table came from one.
    pub(crate) fn library_path(&self) -> Option<&std::path::Path> {
        self.library.as_ref().map(Library::path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_symbols_are_unique() {
        let mut names = REQUIRED_SYMBOLS.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), REQUIRED_SYMBOLS.len());
    }

    #[test]
    fn test_empty_resolver_reports_every_symbol() {
        let err = unsafe { NativeApi::resolve(|_| None) }
            .err()
            .expect("resolution must fail");
        match err {
            C2paError::MissingSymbols(missing) => assert_eq!(missing, REQUIRED_SYMBOLS),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_partial_resolver_reports_only_missing() {
        let err = unsafe {
            NativeApi::resolve(|name| {
                if name == "c2pa_builder_sign" || name == "c2pa_reader_json" {
                    None
                } else {
                    c2pa_bridge_testkit::resolve(name)
                }
            })
        }
        .err()
        .expect("resolution must fail");

        match err {
            C2paError::MissingSymbols(missing) => {
                assert_eq!(missing, vec!["c2pa_reader_json", "c2pa_builder_sign"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_null_symbol_counts_as_missing() {
        let err = unsafe {
            NativeApi::resolve(|name| {
                if name == "c2pa_version" {
                    Some(std::ptr::null())
                } else {
                    c2pa_bridge_testkit::resolve(name)
                }
            })
        }
        .err()
        .expect("resolution must fail");
        assert!(matches!(err, C2paError::MissingSymbols(ref m) if m == &["c2pa_version"]));
    }
}
