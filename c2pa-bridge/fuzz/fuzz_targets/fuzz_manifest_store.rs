#![no_main]

//! Fuzz target for ManifestStore deserialization
//!
//! Reader JSON is produced by the engine from untrusted assets.
//!
//! Run with: cargo +nightly fuzz run fuzz_manifest_store

use c2pa_bridge::ManifestStore;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(store) = serde_json::from_slice::<ManifestStore>(data) {
        let _ = store.active();
        let _ = store.has_errors();
    }
});
