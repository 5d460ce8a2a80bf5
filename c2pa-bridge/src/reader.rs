//! Manifest reader
//!
//! A [`Reader`] owns a native reader handle and, when it opened the asset
//! itself, the file and the stream channel feeding it. Closing releases
//! those in that order.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::engine::{to_cstring, Engine};
use crate::error::{C2paError, C2paResult};
use crate::handle::NativeHandle;
use crate::manifest::{Manifest, ManifestStore};
use crate::mime::format_from_path;
use crate::native::ffi::C2paReader;
use crate::native::memory::NativeString;
use crate::stream::{ByteChannel, ByteStream, Capabilities, ReadOnly, SharedFile};

/// Reads and validates the manifest store of an asset.
pub struct Reader {
    handle: NativeHandle<C2paReader>,
    channel: Option<ByteChannel<'static>>,
    file: Option<Arc<File>>,
    format: String,
    engine: Engine,
}

impl std::fmt::Debug for Reader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("format", &self.format)
            .field("owns_file", &self.file.is_some())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Reader {
    /// Open the asset at `path`, deriving its format from the extension.
    pub fn from_path(engine: &Engine, path: impl AsRef<Path>) -> C2paResult<Self> {
        let path = path.as_ref();
        let format = format_from_path(path)?;
        Self::from_path_with_format(engine, format, path, None)
    }

    /// Open the asset at `path` as `format`, optionally validating it
    /// against externally stored manifest bytes.
    #[instrument(level = "debug", skip_all, fields(format = %format, path = %path.as_ref().display()))]
    pub fn from_path_with_format(
        engine: &Engine,
        format: &str,
        path: impl AsRef<Path>,
        manifest_data: Option<&[u8]>,
    ) -> C2paResult<Self> {
        check_manifest_data(manifest_data)?;
        engine.check_reader_format(format)?;

        let file = Arc::new(File::open(path.as_ref())?);
        let channel = ByteChannel::create_with(
            engine,
            ReadOnly(SharedFile(Arc::clone(&file))),
            Capabilities::SOURCE,
        )?;
        let handle = create_native(engine, format, &channel, manifest_data)?;

        debug!(stream_id = channel.id(), "Reader opened from file");
        Ok(Self {
            handle,
            channel: Some(channel),
            file: Some(file),
            format: format.to_string(),
            engine: engine.clone(),
        })
    }

    /// Read the manifest embedded in `stream`.
    ///
    /// The stream is consumed during construction and not retained.
    #[instrument(level = "debug", skip(engine, stream))]
    pub fn from_stream(engine: &Engine, format: &str, stream: impl ByteStream) -> C2paResult<Self> {
        engine.check_reader_format(format)?;

        let channel = ByteChannel::create_with(engine, stream, Capabilities::SOURCE)?;
        let handle = create_native(engine, format, &channel, None)?;
        drop(channel);

        Ok(Self::adopt(engine, handle, format))
    }

    /// Validate `stream` against manifest bytes stored outside the asset.
    #[instrument(level = "debug", skip(engine, stream, manifest_data), fields(len = manifest_data.len()))]
    pub fn from_manifest_data_and_stream(
        engine: &Engine,
        format: &str,
        stream: impl ByteStream,
        manifest_data: &[u8],
    ) -> C2paResult<Self> {
        check_manifest_data(Some(manifest_data))?;
        engine.check_reader_format(format)?;

        let channel = ByteChannel::create_with(engine, stream, Capabilities::SOURCE)?;
        let handle = create_native(engine, format, &channel, Some(manifest_data))?;
        drop(channel);

        Ok(Self::adopt(engine, handle, format))
    }

    fn adopt(engine: &Engine, handle: NativeHandle<C2paReader>, format: &str) -> Self {
        Self {
            handle,
            channel: None,
            file: None,
            format: format.to_string(),
            engine: engine.clone(),
        }
    }

    /// The manifest store as JSON.
    pub fn json(&self) -> C2paResult<String> {
        let raw = self.handle.get()?;
        let api = self.engine.api();
        // SAFETY: raw is a live reader; the result is an owned engine string.
        let json = unsafe { NativeString::from_raw(api, (api.c2pa_reader_json)(raw)) }
            .ok_or_else(|| self.engine.last_error("reader returned no JSON"))?;
        Ok(json.to_string_lossy())
    }

    /// The manifest store, parsed.
    pub fn manifest_store(&self) -> C2paResult<ManifestStore> {
        Ok(serde_json::from_str(&self.json()?)?)
    }

    /// The active manifest, if the store names one.
    pub fn active_manifest(&self) -> C2paResult<Option<Manifest>> {
        let mut store = self.manifest_store()?;
        Ok(store
            .active_manifest
            .take()
            .and_then(|label| store.manifests.remove(&label)))
    }

    /// Write the resource identified by `uri` into `stream`, returning the
    /// number of bytes written.
    #[instrument(level = "debug", skip(self, stream))]
    pub fn resource_to_stream(&self, uri: &str, stream: impl ByteStream) -> C2paResult<u64> {
        let raw = self.handle.get()?;
        let uri = to_cstring(uri, "resource URI")?;
        let channel = ByteChannel::create_with(&self.engine, stream, Capabilities::SINK)?;

        let api = self.engine.api();
        // SAFETY: reader, URI and stream are all live for the call.
        let written = unsafe { (api.c2pa_reader_resource_to_stream)(raw, uri.as_ptr(), channel.as_raw()?) };
        u64::try_from(written).map_err(|_| self.engine.last_error("failed to write resource"))
    }

    /// MIME type the reader was opened with.
    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_released()
    }

    /// Release the native reader, then the channel and file it owns.
    ///
    /// Safe to call any number of times.
    pub fn close(&mut self) {
        if self.is_closed() && self.channel.is_none() && self.file.is_none() {
            return;
        }
        self.handle.release();
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
        self.file = None;
        debug!(format = %self.format, "Reader closed");
    }
}

impl Drop for Reader {
    fn drop(&mut self) {
        self.close();
    }
}

fn check_manifest_data(manifest_data: Option<&[u8]>) -> C2paResult<()> {
    match manifest_data {
        Some([]) => Err(C2paError::InvalidManifestData(
            "manifest data is empty".into(),
        )),
        _ => Ok(()),
    }
}

fn create_native(
    engine: &Engine,
    format: &str,
    channel: &ByteChannel<'_>,
    manifest_data: Option<&[u8]>,
) -> C2paResult<NativeHandle<C2paReader>> {
    let format = to_cstring(format, "format")?;
    let stream = channel.as_raw()?;
    let api = engine.api();

    // SAFETY: format, stream and manifest bytes outlive the call.
    let raw = unsafe {
        match manifest_data {
            Some(data) => (api.c2pa_reader_from_manifest_data_and_stream)(
                format.as_ptr(),
                stream,
                data.as_ptr(),
                data.len(),
            ),
            None => (api.c2pa_reader_from_stream)(format.as_ptr(), stream),
        }
    };

    // SAFETY: raw is null or a fresh reader owned by nobody else.
    unsafe { NativeHandle::new(raw, api.c2pa_reader_free, "Reader") }
        .ok_or_else(|| engine.last_error("failed to create reader"))
}
