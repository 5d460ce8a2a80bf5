//! Reader objects: parse the trailer, validate the asset hash, report JSON.

use std::collections::BTreeMap;
use std::ffi::c_char;

use serde_json::json;

use crate::alloc::alloc_string;
use crate::container::{self, EmbeddedManifest};
use crate::engine::{arg, supports, READER_MIME_TYPES};
use crate::spy;
use crate::stream::{stream_mut, FakeStream};

pub struct FakeReader {
    json: String,
    resources: BTreeMap<String, Vec<u8>>,
}

impl FakeReader {
    fn new(asset: &[u8], manifest: EmbeddedManifest) -> Self {
        let mut store = manifest.store;
        if container::asset_hash(asset) != manifest.asset_hash {
            if let Some(store) = store.as_object_mut() {
                store.insert(
                    "validation_status".into(),
                    json!([{
                        "code": "assertion.dataHash.mismatch",
                        "explanation": "asset hash does not match the manifest"
                    }]),
                );
            }
        }

        let resources = manifest
            .resources
            .into_iter()
            .filter_map(|(uri, data)| hex::decode(data).ok().map(|d| (uri, d)))
            .collect();

        Self {
            json: store.to_string(),
            resources,
        }
    }
}

/// Validate the format and pull the whole asset out of the host stream.
unsafe fn read_asset(format: *const c_char, stream: *mut FakeStream) -> Option<Vec<u8>> {
    let format = arg(format, "format")?;
    if !supports(READER_MIME_TYPES, format) {
        spy::set_error("NotSupported", format_args!("type is unsupported: {format}"));
        return None;
    }
    let Some(stream) = stream_mut(stream) else {
        spy::set_error("Other", "stream is null");
        return None;
    };
    match stream.read_to_end() {
        Ok(data) => Some(data),
        Err(e) => {
            spy::set_error("Io", e);
            None
        }
    }
}

pub unsafe extern "C" fn c2pa_reader_from_stream(
    format: *const c_char,
    stream: *mut FakeStream,
) -> *mut FakeReader {
    spy::record("c2pa_reader_from_stream");
    let Some(data) = read_asset(format, stream) else {
        return std::ptr::null_mut();
    };
    let Some((asset, manifest)) = container::split(&data) else {
        spy::set_error("ManifestNotFound", "no JUMBF data found");
        return std::ptr::null_mut();
    };
    match container::parse(manifest) {
        Ok(manifest) => Box::into_raw(Box::new(FakeReader::new(asset, manifest))),
        Err(e) => {
            spy::set_error("Decoding", e);
            std::ptr::null_mut()
        }
    }
}

pub unsafe extern "C" fn c2pa_reader_from_manifest_data_and_stream(
    format: *const c_char,
    stream: *mut FakeStream,
    manifest_data: *const u8,
    len: usize,
) -> *mut FakeReader {
    spy::record("c2pa_reader_from_manifest_data_and_stream");
    if manifest_data.is_null() || len == 0 {
        spy::set_error("Decoding", "manifest data is empty");
        return std::ptr::null_mut();
    }
    let manifest = std::slice::from_raw_parts(manifest_data, len);
    let Some(data) = read_asset(format, stream) else {
        return std::ptr::null_mut();
    };
    match container::parse(manifest) {
        Ok(manifest) => {
            let asset = container::strip(&data);
            Box::into_raw(Box::new(FakeReader::new(asset, manifest)))
        }
        Err(e) => {
            spy::set_error("Decoding", e);
            std::ptr::null_mut()
        }
    }
}

pub unsafe extern "C" fn c2pa_reader_json(reader: *mut FakeReader) -> *mut c_char {
    spy::record("c2pa_reader_json");
    match reader.as_ref() {
        Some(reader) => alloc_string(&reader.json),
        None => {
            spy::set_error("Other", "reader is null");
            std::ptr::null_mut()
        }
    }
}

pub unsafe extern "C" fn c2pa_reader_resource_to_stream(
    reader: *mut FakeReader,
    uri: *const c_char,
    stream: *mut FakeStream,
) -> i64 {
    spy::record("c2pa_reader_resource_to_stream");
    let (Some(reader), Some(stream)) = (reader.as_ref(), stream_mut(stream)) else {
        spy::set_error("Other", "null argument");
        return -1;
    };
    let Some(uri) = arg(uri, "uri") else {
        return -1;
    };
    let Some(data) = reader.resources.get(uri) else {
        spy::set_error("ResourceNotFound", uri);
        return -1;
    };
    match stream.write_all(data) {
        Ok(()) => data.len() as i64,
        Err(e) => {
            spy::set_error("Io", e);
            -1
        }
    }
}

pub unsafe extern "C" fn c2pa_reader_free(reader: *mut FakeReader) {
    spy::record("c2pa_reader_free");
    if !reader.is_null() {
        drop(Box::from_raw(reader));
    }
}
