//! C2PA Bridge Testkit - an in-process fake of the native C2PA engine
//!
//! Every entry point the binding requires is implemented here with the same
//! C signature, so tests can build an engine without a shared library:
//!
//! ```ignore
//! let engine = unsafe { c2pa_bridge::Engine::from_symbols(c2pa_bridge_testkit::resolve) }?;
//! ```
//!
//! The fake keeps the engine's observable contract: sentinel returns with a
//! `"<Kind> <message>"` error left for `c2pa_error`, engine-owned buffers
//! that must be freed with the matching function, and host callbacks driven
//! for every stream and signer. Signed assets use a simple trailer format
//! (see `container`) instead of JUMBF.
//!
//! Call logs, allocation counts and fault switches are thread-local; see
//! [`native_calls`], [`outstanding_allocations`] and
//! [`fail_next_stream_creation`].

mod alloc;
pub mod builder;
mod container;
pub mod engine;
pub mod reader;
pub mod signer;
mod spy;
pub mod stream;

use std::ffi::c_void;

pub use crate::engine::FAKE_VERSION;
pub use crate::signer::RESERVE_SIZE;
pub use crate::spy::{
    fail_next_stream_creation, native_calls, outstanding_allocations, reset_native_calls,
    NativeCalls,
};

macro_rules! symbol_table {
    ($($module:ident::$name:ident),+ $(,)?) => {
        /// Every symbol name the fake exports.
        pub const SYMBOLS: &[&str] = &[$(stringify!($name)),+];

        /// Look up a fake entry point by its exported name.
        pub fn resolve(name: &str) -> Option<*const c_void> {
            match name {
                $(stringify!($name) => Some($module::$name as *const c_void),)+
                _ => None,
            }
        }
    };
}

symbol_table! {
    engine::c2pa_version,
    engine::c2pa_error,
    engine::c2pa_string_free,
    engine::c2pa_load_settings,
    stream::c2pa_create_stream,
    stream::c2pa_release_stream,
    reader::c2pa_reader_from_stream,
    reader::c2pa_reader_from_manifest_data_and_stream,
    reader::c2pa_reader_free,
    reader::c2pa_reader_json,
    reader::c2pa_reader_resource_to_stream,
    engine::c2pa_reader_supported_mime_types,
    builder::c2pa_builder_from_json,
    builder::c2pa_builder_from_archive,
    builder::c2pa_builder_free,
    builder::c2pa_builder_set_no_embed,
    builder::c2pa_builder_set_remote_url,
    builder::c2pa_builder_add_resource,
    builder::c2pa_builder_add_ingredient_from_stream,
    builder::c2pa_builder_to_archive,
    builder::c2pa_builder_sign,
    engine::c2pa_builder_supported_mime_types,
    engine::c2pa_manifest_bytes_free,
    engine::c2pa_format_embeddable,
    signer::c2pa_signer_create,
    signer::c2pa_signer_from_info,
    signer::c2pa_signer_reserve_size,
    signer::c2pa_signer_free,
    engine::c2pa_ed25519_sign,
    engine::c2pa_signature_free,
    engine::c2pa_free_string_array,
}
