//! Handle lifecycle, failure isolation and callback containment.

mod common;

use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use c2pa_bridge::{
    BoxError, Builder, ByteChannel, C2paError, Engine, Reader, ReadOnly, Signer, SigningAlg,
};
use c2pa_bridge_testkit::{native_calls, outstanding_allocations, reset_native_calls};
use common::{engine, info_signer, manifest, ASSET};

fn signed_asset(engine: &Engine) -> Vec<u8> {
    let signer = info_signer(engine);
    let mut builder = Builder::from_manifest(engine, &manifest("T")).unwrap();
    let mut out = Cursor::new(Vec::new());
    builder
        .sign(&signer, "image/jpeg", Cursor::new(ASSET.to_vec()), &mut out)
        .unwrap();
    out.into_inner()
}

#[test]
fn test_close_releases_each_handle_once() {
    let engine = engine();
    let mut signer = info_signer(&engine);
    let mut builder = Builder::from_manifest(&engine, &manifest("T")).unwrap();
    let mut reader =
        Reader::from_stream(&engine, "image/jpeg", Cursor::new(signed_asset(&engine))).unwrap();

    reset_native_calls();
    for _ in 0..3 {
        reader.close();
        builder.close();
        signer.close();
    }
    drop(reader);
    drop(builder);
    drop(signer);

    let calls = native_calls();
    assert_eq!(calls.count("c2pa_reader_free"), 1);
    assert_eq!(calls.count("c2pa_builder_free"), 1);
    assert_eq!(calls.count("c2pa_signer_free"), 1);
}

#[test]
fn test_closed_handles_fail_without_native_calls() {
    let engine = engine();
    let signer = info_signer(&engine);
    let mut builder = Builder::from_manifest(&engine, &manifest("T")).unwrap();
    let mut reader =
        Reader::from_stream(&engine, "image/jpeg", Cursor::new(signed_asset(&engine))).unwrap();
    builder.close();
    reader.close();

    reset_native_calls();
    assert!(matches!(reader.json(), Err(C2paError::ClosedResource("Reader"))));
    assert!(matches!(
        reader.resource_to_stream("thumb.jpg", Cursor::new(Vec::new())),
        Err(C2paError::ClosedResource("Reader"))
    ));
    assert!(matches!(
        builder.set_no_embed(),
        Err(C2paError::ClosedResource("Builder"))
    ));
    assert!(matches!(
        builder.add_resource("x", Cursor::new(Vec::new())),
        Err(C2paError::ClosedResource("Builder"))
    ));
    assert!(matches!(
        builder.sign(&signer, "image/jpeg", Cursor::new(ASSET.to_vec()), Cursor::new(Vec::new())),
        Err(C2paError::ClosedResource("Builder"))
    ));
    assert_eq!(native_calls().total(), 0);
}

#[test]
fn test_closed_signer_is_rejected_before_signing() {
    let engine = engine();
    let mut signer = info_signer(&engine);
    signer.close();
    let mut builder = Builder::from_manifest(&engine, &manifest("T")).unwrap();

    reset_native_calls();
    let err = builder
        .sign(&signer, "image/jpeg", Cursor::new(ASSET.to_vec()), Cursor::new(Vec::new()))
        .unwrap_err();
    assert!(matches!(err, C2paError::ClosedResource("Signer")));
    assert_eq!(native_calls().count("c2pa_builder_sign"), 0);
    assert_eq!(native_calls().count("c2pa_create_stream"), 0);
}

#[test]
fn test_reader_from_path_releases_file_and_channel() {
    let engine = engine();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("signed.jpg");
    std::fs::write(&path, signed_asset(&engine)).unwrap();

    let mut reader = Reader::from_path(&engine, &path).unwrap();
    reset_native_calls();
    reader.close();
    reader.close();

    let calls = native_calls();
    assert_eq!(calls.count("c2pa_reader_free"), 1);
    assert_eq!(calls.count("c2pa_release_stream"), 1);
    assert_eq!(calls.names(), ["c2pa_reader_free", "c2pa_release_stream"]);
}

#[test]
fn test_sign_releases_channels_and_buffers_on_every_path() {
    let engine = engine();
    let signer = info_signer(&engine);
    let mut builder = Builder::from_manifest(&engine, &manifest("T")).unwrap();

    reset_native_calls();
    let mut out = Cursor::new(Vec::new());
    builder
        .sign(&signer, "image/jpeg", Cursor::new(ASSET.to_vec()), &mut out)
        .unwrap();
    let calls = native_calls();
    assert_eq!(calls.count("c2pa_create_stream"), 2);
    assert_eq!(calls.count("c2pa_release_stream"), 2);
    assert_eq!(calls.count("c2pa_manifest_bytes_free"), 1);

    reset_native_calls();
    let err = builder
        .sign(&signer, "image/jpeg", FailingStream, Cursor::new(Vec::new()))
        .unwrap_err();
    assert!(matches!(err, C2paError::Io(_)), "got {err:?}");
    let calls = native_calls();
    assert_eq!(calls.count("c2pa_release_stream"), 2);
    assert_eq!(outstanding_allocations(), 0);
}

#[test]
fn test_failing_callback_does_not_poison_later_signs() {
    let engine = engine();
    let identity = common::test_identity();
    let failing = Signer::from_callback(
        &engine,
        |_: &[u8]| -> Result<Vec<u8>, BoxError> { Err("hardware token unplugged".into()) },
        SigningAlg::Es256,
        &identity.cert_pem,
        None,
    )
    .unwrap();
    let panicking = Signer::from_callback(
        &engine,
        |_: &[u8]| -> Result<Vec<u8>, BoxError> { panic!("bug in host signer") },
        SigningAlg::Es256,
        &identity.cert_pem,
        None,
    )
    .unwrap();
    let good = info_signer(&engine);
    let mut builder = Builder::from_manifest(&engine, &manifest("T")).unwrap();

    for bad in [&failing, &panicking] {
        let mut out = Cursor::new(Vec::new());
        let err = builder
            .sign(bad, "image/jpeg", Cursor::new(ASSET.to_vec()), &mut out)
            .unwrap_err();
        assert!(matches!(err, C2paError::Signature(_)), "got {err:?}");
    }

    let mut out = Cursor::new(Vec::new());
    builder
        .sign(&good, "image/jpeg", Cursor::new(ASSET.to_vec()), &mut out)
        .unwrap();
    Reader::from_stream(&engine, "image/jpeg", Cursor::new(out.into_inner())).unwrap();
}

#[test]
fn test_same_signer_recovers_after_callback_failure() {
    let engine = engine();
    let identity = common::test_identity();
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&calls);
    let key = identity.key.clone();
    let signer = Signer::from_callback(
        &engine,
        move |data: &[u8]| -> Result<Vec<u8>, BoxError> {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                return Ok(Vec::new());
            }
            common::es256_sign(&key, data)
        },
        SigningAlg::Es256,
        &identity.cert_pem,
        None,
    )
    .unwrap();
    let mut builder = Builder::from_manifest(&engine, &manifest("retry")).unwrap();

    let err = builder
        .sign(&signer, "image/jpeg", Cursor::new(ASSET.to_vec()), Cursor::new(Vec::new()))
        .unwrap_err();
    assert!(matches!(err, C2paError::Signature(_)), "got {err:?}");
    assert!(!signer.is_closed());

    let mut out = Cursor::new(Vec::new());
    builder
        .sign(&signer, "image/jpeg", Cursor::new(ASSET.to_vec()), &mut out)
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let reader = Reader::from_stream(&engine, "image/jpeg", Cursor::new(out.into_inner())).unwrap();
    let active = reader.active_manifest().unwrap().unwrap();
    assert_eq!(active.title.as_deref(), Some("retry"));
}

/// Source stream whose every read fails or panics.
struct FailingStream;

impl Read for FailingStream {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::other("disk on fire"))
    }
}

impl Write for FailingStream {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::other("read-only"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for FailingStream {
    fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
        Ok(0)
    }
}

struct PanickingStream;

impl Read for PanickingStream {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        panic!("host stream bug")
    }
}

impl Seek for PanickingStream {
    fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
        Ok(0)
    }
}

#[test]
fn test_stream_panic_becomes_engine_error() {
    let engine = engine();
    let err = Reader::from_stream(&engine, "image/jpeg", ReadOnly(PanickingStream)).unwrap_err();
    assert!(matches!(err, C2paError::Io(_)), "got {err:?}");

    // The engine is still usable afterwards.
    Reader::from_stream(&engine, "image/jpeg", Cursor::new(signed_asset(&engine))).unwrap();
}

#[test]
fn test_channel_outlives_nothing_it_borrows() {
    let engine = engine();
    let mut data = Cursor::new(b"borrowed".to_vec());
    {
        let mut channel = ByteChannel::create(&engine, &mut data).unwrap();
        assert!(!channel.is_closed());
        channel.close();
    }
    // The borrow has ended; the stream is untouched and still usable.
    data.seek(SeekFrom::Start(0)).unwrap();
    assert_eq!(data.into_inner(), b"borrowed");
}

#[test]
fn test_stream_creation_failure_is_reported() {
    let engine = engine();
    c2pa_bridge_testkit::fail_next_stream_creation();
    let err = Reader::from_stream(&engine, "image/jpeg", Cursor::new(ASSET.to_vec())).unwrap_err();
    assert!(matches!(err, C2paError::ChannelCreationFailed(_)));
}
