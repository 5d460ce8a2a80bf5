//! Manifest builder and signing
//!
//! A [`Builder`] stages a manifest definition plus its resources and
//! ingredients inside the engine, then signs it into an asset. Streams
//! passed to any operation are bridged only for the duration of that call.

use std::fs::OpenOptions;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::engine::{to_cstring, Engine};
use crate::error::{C2paError, C2paResult};
use crate::handle::NativeHandle;
use crate::mime::format_from_path;
use crate::native::ffi::C2paBuilder;
use crate::native::memory::NativeBytes;
use crate::signer::Signer;
use crate::stream::{ByteChannel, ByteStream, Capabilities, ReadOnly};

/// Builds and signs C2PA manifests.
pub struct Builder {
    handle: NativeHandle<C2paBuilder>,
    engine: Engine,
}

impl std::fmt::Debug for Builder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Builder {
    /// Create a builder from a manifest definition in JSON form.
    #[instrument(level = "debug", skip_all, fields(len = manifest_json.len()))]
    pub fn from_json(engine: &Engine, manifest_json: &str) -> C2paResult<Self> {
        let json = to_cstring(manifest_json, "manifest JSON")?;
        let api = engine.api();
        // SAFETY: json outlives the call.
        let raw = unsafe { (api.c2pa_builder_from_json)(json.as_ptr()) };
        Self::adopt(engine, raw, "failed to create builder from JSON")
    }

    /// Create a builder from any serializable manifest definition, such as
    /// [`ManifestDefinition`](crate::ManifestDefinition).
    pub fn from_manifest<T: Serialize + ?Sized>(engine: &Engine, manifest: &T) -> C2paResult<Self> {
        let json = serde_json::to_string(manifest)
            .map_err(|e| C2paError::InvalidManifestJson(e.to_string()))?;
        Self::from_json(engine, &json)
    }

    /// Restore a builder from an archive written by [`to_archive`](Self::to_archive).
    #[instrument(level = "debug", skip_all)]
    pub fn from_archive(engine: &Engine, stream: impl ByteStream) -> C2paResult<Self> {
        let channel = ByteChannel::create_with(engine, stream, Capabilities::SOURCE)?;
        let api = engine.api();
        // SAFETY: the channel is live for the call.
        let raw = unsafe { (api.c2pa_builder_from_archive)(channel.as_raw()?) };
        Self::adopt(engine, raw, "failed to restore builder from archive")
    }

    fn adopt(engine: &Engine, raw: *mut C2paBuilder, context: &str) -> C2paResult<Self> {
        let api = engine.api();
        // SAFETY: raw is null or a fresh builder owned by nobody else.
        let handle = unsafe { NativeHandle::new(raw, api.c2pa_builder_free, "Builder") }
            .ok_or_else(|| engine.last_error(context))?;
        debug!("Builder created");
        Ok(Self {
            handle,
            engine: engine.clone(),
        })
    }

    /// Do not embed the manifest in signed output; only return its bytes.
    pub fn set_no_embed(&mut self) -> C2paResult<()> {
        let raw = self.handle.get()?;
        let api = self.engine.api();
        // SAFETY: raw is a live builder.
        unsafe { (api.c2pa_builder_set_no_embed)(raw) };
        Ok(())
    }

    /// Embed a reference to `remote_url` where the manifest will be hosted.
    pub fn set_remote_url(&mut self, remote_url: &str) -> C2paResult<()> {
        let raw = self.handle.get()?;
        let url = to_cstring(remote_url, "remote URL")?;
        let api = self.engine.api();
        // SAFETY: raw is a live builder and url outlives the call.
        let status = unsafe { (api.c2pa_builder_set_remote_url)(raw, url.as_ptr()) };
        self.check_status(status, "failed to set remote URL")
    }

    /// Stage binary data referenced from the manifest by `uri`.
    #[instrument(level = "debug", skip(self, stream))]
    pub fn add_resource(&mut self, uri: &str, stream: impl ByteStream) -> C2paResult<()> {
        let raw = self.handle.get()?;
        let uri = to_cstring(uri, "resource URI")?;
        let channel = ByteChannel::create_with(&self.engine, stream, Capabilities::SOURCE)?;
        let api = self.engine.api();
        // SAFETY: builder, URI and channel are live for the call.
        let status = unsafe { (api.c2pa_builder_add_resource)(raw, uri.as_ptr(), channel.as_raw()?) };
        self.check_status(status, "failed to add resource")
    }

    /// Stage an ingredient asset described by `ingredient_json`.
    ///
    /// Repeated additions of the same ingredient get distinct labels from
    /// the engine (`c2pa.ingredient.v3`, then `__1`, `__2`, ...).
    #[instrument(level = "debug", skip(self, ingredient_json, stream))]
    pub fn add_ingredient(
        &mut self,
        ingredient_json: &str,
        format: &str,
        stream: impl ByteStream,
    ) -> C2paResult<()> {
        let raw = self.handle.get()?;
        let json = to_cstring(ingredient_json, "ingredient JSON")?;
        let format = to_cstring(format, "format")?;
        let channel = ByteChannel::create_with(&self.engine, stream, Capabilities::SOURCE)?;
        let api = self.engine.api();
        // SAFETY: all arguments are live for the call.
        let status = unsafe {
            (api.c2pa_builder_add_ingredient_from_stream)(
                raw,
                json.as_ptr(),
                format.as_ptr(),
                channel.as_raw()?,
            )
        };
        self.check_status(status, "failed to add ingredient")
    }

    /// Write the builder's full state to `stream`.
    #[instrument(level = "debug", skip_all)]
    pub fn to_archive(&mut self, stream: impl ByteStream) -> C2paResult<()> {
        let raw = self.handle.get()?;
        let channel = ByteChannel::create_with(&self.engine, stream, Capabilities::SINK)?;
        let api = self.engine.api();
        // SAFETY: builder and channel are live for the call.
        let status = unsafe { (api.c2pa_builder_to_archive)(raw, channel.as_raw()?) };
        self.check_status(status, "failed to write archive")
    }

    /// Sign `source` into `dest` and return the manifest bytes produced.
    ///
    /// Both streams are bridged for this call only and are never closed.
    /// On failure the contents of `dest` are unspecified.
    #[instrument(level = "debug", skip(self, signer, source, dest))]
    pub fn sign(
        &mut self,
        signer: &Signer,
        format: &str,
        source: impl ByteStream,
        dest: impl ByteStream,
    ) -> C2paResult<Vec<u8>> {
        let raw = self.handle.get()?;
        let signer_raw = signer.as_raw()?;
        self.engine.check_builder_format(format)?;
        let c_format = to_cstring(format, "format")?;

        let mut source = ByteChannel::create_with(&self.engine, source, Capabilities::SOURCE)?;
        let mut dest = ByteChannel::create_with(&self.engine, dest, Capabilities::DESTINATION)?;

        let api = self.engine.api();
        let mut manifest_ptr: *const u8 = std::ptr::null();
        // SAFETY: builder, signer, both channels and the format are live for
        // the call; manifest_ptr is a valid out-parameter.
        let result = unsafe {
            (api.c2pa_builder_sign)(
                raw,
                c_format.as_ptr(),
                source.as_raw()?,
                dest.as_raw()?,
                signer_raw,
                &mut manifest_ptr,
            )
        };

        let len = usize::try_from(result).unwrap_or(0);
        // SAFETY: a non-null manifest_ptr is an engine buffer of `len` bytes,
        // freed exactly once by the guard whether or not signing succeeded.
        let manifest = unsafe {
            NativeBytes::from_raw(api, manifest_ptr, len, api.c2pa_manifest_bytes_free)
        };

        let outcome = if result < 0 {
            Err(self.engine.last_error("signing failed"))
        } else {
            Ok(manifest.as_ref().map(NativeBytes::to_vec).unwrap_or_default())
        };
        drop(manifest);

        source.close();
        dest.close();

        match &outcome {
            Ok(bytes) => info!(manifest_len = bytes.len(), "Manifest signed"),
            Err(e) => warn!(error = %e, "Signing failed"),
        }
        outcome
    }

    /// Sign `source` into an in-memory buffer.
    ///
    /// Returns the manifest bytes and the signed asset.
    pub fn sign_to_memory(
        &mut self,
        signer: &Signer,
        format: &str,
        source: impl ByteStream,
    ) -> C2paResult<(Vec<u8>, Vec<u8>)> {
        let mut dest = std::io::Cursor::new(Vec::new());
        let manifest = self.sign(signer, format, source, &mut dest)?;
        Ok((manifest, dest.into_inner()))
    }

    /// Sign the file at `source_path` into `dest_path`.
    ///
    /// The format comes from the source extension. The destination is
    /// created or truncated; if signing fails it must be treated as corrupt.
    pub fn sign_file(
        &mut self,
        signer: &Signer,
        source_path: impl AsRef<Path>,
        dest_path: impl AsRef<Path>,
    ) -> C2paResult<Vec<u8>> {
        self.handle.get()?;
        let source_path = source_path.as_ref();
        let dest_path = dest_path.as_ref();
        let format = format_from_path(source_path)?;

        let source = std::fs::File::open(source_path)?;
        let dest = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(dest_path)?;

        self.sign(signer, format, ReadOnly(source), dest)
            .inspect_err(|_| {
                warn!(dest = %dest_path.display(), "Destination left in an unspecified state");
            })
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_released()
    }

    /// Release the native builder. Safe to call more than once.
    pub fn close(&mut self) {
        if !self.handle.is_released() {
            self.handle.release();
            debug!("Builder closed");
        }
    }

    fn check_status(&self, status: std::ffi::c_int, context: &str) -> C2paResult<()> {
        if status == 0 {
            Ok(())
        } else {
            Err(self.engine.last_error(context))
        }
    }
}

impl Drop for Builder {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ManifestDefinition;
    use std::io::Cursor;

    fn engine() -> Engine {
        unsafe { Engine::from_symbols(c2pa_bridge_testkit::resolve) }.unwrap()
    }

    #[test]
    fn test_from_json_rejects_malformed_json() {
        let err = Builder::from_json(&engine(), "{ not json").unwrap_err();
        assert!(matches!(err, C2paError::Json(_)), "got {err:?}");
    }

    #[test]
    fn test_from_manifest_serializes_definition() {
        let manifest = ManifestDefinition::new("test/1.0").with_title("T");
        let builder = Builder::from_manifest(&engine(), &manifest).unwrap();
        assert!(!builder.is_closed());
    }

    #[test]
    fn test_from_manifest_reports_serialization_failure() {
        let mut bad = std::collections::HashMap::new();
        bad.insert(vec![1u8], "keys must be strings");
        let err = Builder::from_manifest(&engine(), &bad).unwrap_err();
        assert!(matches!(err, C2paError::InvalidManifestJson(_)));
    }

    #[test]
    fn test_remote_url_is_validated_by_engine() {
        let mut builder = Builder::from_json(&engine(), r#"{"title": "T"}"#).unwrap();
        builder.set_remote_url("https://example.com/manifest.c2pa").unwrap();
        let err = builder.set_remote_url("").unwrap_err();
        assert!(matches!(err, C2paError::RemoteManifest(_)));
    }

    #[test]
    fn test_archive_round_trip_restores_builder() {
        let engine = engine();
        let mut builder = Builder::from_json(&engine, r#"{"title": "Archived"}"#).unwrap();
        builder
            .add_resource("thumb.jpg", Cursor::new(b"thumbnail".to_vec()))
            .unwrap();

        let mut archive = Cursor::new(Vec::new());
        builder.to_archive(&mut archive).unwrap();
        assert!(!archive.get_ref().is_empty());

        archive.set_position(0);
        let restored = Builder::from_archive(&engine, archive).unwrap();
        assert!(!restored.is_closed());
    }

    #[test]
    fn test_from_archive_rejects_garbage() {
        let err = Builder::from_archive(&engine(), Cursor::new(b"garbage".to_vec())).unwrap_err();
        assert!(matches!(err, C2paError::Decoding(_)), "got {err:?}");
    }

    #[test]
    fn test_sign_rejects_unsupported_format_locally() {
        let engine = engine();
        let mut builder = Builder::from_json(&engine, r#"{"title": "T"}"#).unwrap();
        let signer = crate::Signer::from_callback(
            &engine,
            |_: &[u8]| -> Result<Vec<u8>, crate::BoxError> { Ok(vec![1; 64]) },
            crate::SigningAlg::Es256,
            "-----BEGIN CERTIFICATE-----\n-----END CERTIFICATE-----\n",
            None,
        )
        .unwrap();

        let err = builder
            .sign(
                &signer,
                "application/x-unknown",
                Cursor::new(b"asset".to_vec()),
                Cursor::new(Vec::new()),
            )
            .unwrap_err();
        assert!(matches!(err, C2paError::NotSupported(_)));
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut builder = Builder::from_json(&engine(), r#"{"title": "T"}"#).unwrap();
        c2pa_bridge_testkit::reset_native_calls();
        builder.close();
        builder.close();
        drop(builder);
        assert_eq!(c2pa_bridge_testkit::native_calls().count("c2pa_builder_free"), 1);
    }
}
