//! Host byte streams bridged to the native engine
//!
//! A [`ByteChannel`] wraps any [`ByteStream`] behind the engine's stream
//! record: four `extern "C"` trampolines plus a context pointer that leads
//! back to the boxed stream. The channel owns that box and the native record,
//! and releases both together, so no trampoline can run after its stream is
//! gone.
//!
//! Trampolines never unwind. I/O errors, panics, closed channels and bad
//! pointers all come back to the engine as `-1`.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, error, trace};
use zeroize::Zeroizing;

use crate::engine::Engine;
use crate::error::{C2paError, C2paResult};
use crate::native::ffi::{C2paStream, StreamContext, SEEK_CURRENT, SEEK_END, SEEK_START};

/// Largest chunk handed back from a single read callback.
const MAX_READ_CHUNK: usize = 1024 * 1024;

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

/// Operations a stream can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub read: bool,
    pub write: bool,
    pub seek: bool,
    pub flush: bool,
}

impl Capabilities {
    pub const ALL: Self = Self {
        read: true,
        write: true,
        seek: true,
        flush: true,
    };

    /// Assets consumed by the engine.
    pub const SOURCE: Self = Self {
        read: true,
        write: false,
        seek: true,
        flush: false,
    };

    /// Signed output; the engine reads back what it wrote.
    pub const DESTINATION: Self = Self {
        read: true,
        write: true,
        seek: true,
        flush: false,
    };

    /// Resource and archive output.
    pub const SINK: Self = Self {
        read: false,
        write: true,
        seek: true,
        flush: false,
    };

    /// Names of the capabilities in `required` that `self` lacks.
    pub fn missing(&self, required: Capabilities) -> Vec<&'static str> {
        [
            (required.read && !self.read, "read"),
            (required.write && !self.write, "write"),
            (required.seek && !self.seek, "seek"),
            (required.flush && !self.flush, "flush"),
        ]
        .into_iter()
        .filter_map(|(lacking, name)| lacking.then_some(name))
        .collect()
    }
}

/// A byte stream the engine can drive.
///
/// Every `Read + Write + Seek + Send` type is a full-capability stream.
/// [`ReadOnly`] and [`WriteOnly`] adapt types with fewer abilities.
pub trait ByteStream: Send {
    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64>;

    fn flush(&mut self) -> io::Result<()>;
}

impl<T: Read + Write + Seek + Send> ByteStream for T {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(self, buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Write::write(self, buf)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Seek::seek(self, pos)
    }

    fn flush(&mut self) -> io::Result<()> {
        Write::flush(self)
    }
}

fn unsupported(op: &str) -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, format!("stream does not support {op}"))
}

/// Adapter for readable, seekable streams that cannot be written.
#[derive(Debug)]
pub struct ReadOnly<R>(pub R);

impl<R: Read + Seek + Send> ByteStream for ReadOnly<R> {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            flush: true,
            ..Capabilities::SOURCE
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }

    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(unsupported("write"))
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.0.seek(pos)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Adapter for writable, seekable streams that cannot be read back.
#[derive(Debug)]
pub struct WriteOnly<W>(pub W);

impl<W: Write + Seek + Send> ByteStream for WriteOnly<W> {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            flush: true,
            ..Capabilities::SINK
        }
    }

    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(unsupported("read"))
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.0.seek(pos)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

/// A file shared between its owner and a channel reading from it.
#[derive(Debug, Clone)]
pub(crate) struct SharedFile(pub(crate) Arc<File>);

impl Read for SharedFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(&mut &*self.0, buf)
    }
}

impl Seek for SharedFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Seek::seek(&mut &*self.0, pos)
    }
}

/// State reached through the engine's context pointer.
struct ChannelState<'a> {
    id: u64,
    live: bool,
    stream: Box<dyn ByteStream + 'a>,
}

/// A host stream exposed to the engine through native callbacks.
///
/// The underlying stream is never closed by the channel; it is dropped (or
/// the borrow ends) when the channel is.
pub struct ByteChannel<'a> {
    engine: Engine,
    raw: *mut C2paStream,
    state: *mut ChannelState<'a>,
    id: u64,
}

// SAFETY: the state owns a `Send` stream and is only touched by the thread
// currently driving a native call on this channel.
unsafe impl Send for ByteChannel<'_> {}

impl std::fmt::Debug for ByteChannel<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteChannel")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<'a> ByteChannel<'a> {
    /// Bridge `stream`, which must support read, write, seek and flush.
    pub fn create(engine: &Engine, stream: impl ByteStream + 'a) -> C2paResult<Self> {
        Self::create_with(engine, stream, Capabilities::ALL)
    }

    /// Bridge `stream`, requiring only the `required` capabilities.
    pub(crate) fn create_with(
        engine: &Engine,
        stream: impl ByteStream + 'a,
        required: Capabilities,
    ) -> C2paResult<Self> {
        let missing = stream.capabilities().missing(required);
        if !missing.is_empty() {
            return Err(C2paError::UnsupportedStream(format!(
                "stream lacks required capabilities: {}",
                missing.join(", ")
            )));
        }

        let id = NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed);
        let state = Box::into_raw(Box::new(ChannelState {
            id,
            live: true,
            stream: Box::new(stream),
        }));

        let api = engine.api();
        // SAFETY: state stays allocated until the native record is released
        // in `close`; the trampolines match the callback signatures.
        let raw = unsafe {
            (api.c2pa_create_stream)(
                state.cast::<StreamContext>(),
                read_trampoline,
                seek_trampoline,
                write_trampoline,
                flush_trampoline,
            )
        };

        if raw.is_null() {
            // SAFETY: the engine never saw a live record, so state is ours alone.
            drop(unsafe { Box::from_raw(state) });
            let reason = engine
                .last_error_message()
                .unwrap_or_else(|| "engine returned a null stream".to_string());
            return Err(C2paError::ChannelCreationFailed(reason));
        }

        trace!(stream_id = id, "Stream channel created");
        Ok(Self {
            engine: engine.clone(),
            raw,
            state,
            id,
        })
    }

    /// Native stream record, for passing to engine calls.
    pub(crate) fn as_raw(&self) -> C2paResult<*mut C2paStream> {
        if self.raw.is_null() {
            Err(C2paError::ClosedResource("ByteChannel"))
        } else {
            Ok(self.raw)
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.raw.is_null()
    }

    /// Release the native record and the bridge state.
    ///
    /// Safe to call any number of times. Release failures are logged.
    pub fn close(&mut self) {
        if self.raw.is_null() {
            return;
        }
        let raw = std::mem::replace(&mut self.raw, std::ptr::null_mut());

        // SAFETY: state is live until reclaimed below.
        unsafe { (*self.state).live = false };

        let api = self.engine.api();
        // SAFETY: raw came from c2pa_create_stream and is released once.
        let released = catch_unwind(AssertUnwindSafe(|| unsafe { (api.c2pa_release_stream)(raw) }));
        if released.is_err() {
            error!(stream_id = self.id, "Native stream release panicked");
        }

        // SAFETY: the native record no longer references state.
        drop(unsafe { Box::from_raw(self.state) });
        self.state = std::ptr::null_mut();
        trace!(stream_id = self.id, "Stream channel closed");
    }
}

impl Drop for ByteChannel<'_> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Run a stream operation behind the context pointer, mapping every failure
/// to `-1`.
///
/// # Safety
///
/// `ctx` must be null or the context of a channel that has not been closed.
unsafe fn contain<F>(ctx: *mut StreamContext, op: &'static str, f: F) -> isize
where
    F: FnOnce(&mut ChannelState<'_>) -> io::Result<isize>,
{
    if ctx.is_null() {
        return -1;
    }
    let state = &mut *ctx.cast::<ChannelState<'_>>();
    let id = state.id;
    if !state.live {
        debug!(stream_id = id, op, "Callback on closed stream");
        return -1;
    }

    match catch_unwind(AssertUnwindSafe(|| f(state))) {
        Ok(Ok(n)) => n,
        Ok(Err(e)) => {
            debug!(stream_id = id, op, error = %e, "Stream callback failed");
            -1
        }
        Err(_) => {
            error!(stream_id = id, op, "Stream callback panicked");
            -1
        }
    }
}

fn too_large(n: usize) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, format!("{n} does not fit in isize"))
}

unsafe extern "C" fn read_trampoline(ctx: *mut StreamContext, data: *mut u8, len: isize) -> isize {
    if data.is_null() || len <= 0 {
        return -1;
    }
    contain(ctx, "read", |state| {
        let want = (len as usize).min(MAX_READ_CHUNK);
        // SAFETY: the engine provided `len` writable bytes at `data` for the
        // duration of this call and want <= len.
        let buf = std::slice::from_raw_parts_mut(data, want);
        let n = state.stream.read(buf)?.min(want);
        isize::try_from(n).map_err(|_| too_large(n))
    })
}

unsafe extern "C" fn seek_trampoline(ctx: *mut StreamContext, offset: isize, whence: i32) -> isize {
    contain(ctx, "seek", |state| {
        let offset = offset as i64;
        let pos = match whence {
            SEEK_START => SeekFrom::Start(u64::try_from(offset).map_err(|_| {
                io::Error::new(io::ErrorKind::InvalidInput, "negative absolute seek")
            })?),
            SEEK_CURRENT => SeekFrom::Current(offset),
            SEEK_END => SeekFrom::End(offset),
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("unknown seek mode {other}"),
                ))
            }
        };
        let new_pos = state.stream.seek(pos)?;
        isize::try_from(new_pos).map_err(|_| too_large(new_pos as usize))
    })
}

unsafe extern "C" fn write_trampoline(ctx: *mut StreamContext, data: *const u8, len: isize) -> isize {
    if data.is_null() || len <= 0 {
        return -1;
    }
    contain(ctx, "write", |state| {
        // SAFETY: the engine provided `len` readable bytes at `data` for the
        // duration of this call; they are copied before use and the copy is
        // wiped afterwards.
        let chunk = Zeroizing::new(std::slice::from_raw_parts(data, len as usize).to_vec());
        write_all(&mut *state.stream, &chunk)?;
        Ok(len)
    })
}

unsafe extern "C" fn flush_trampoline(ctx: *mut StreamContext) -> isize {
    contain(ctx, "flush", |state| {
        state.stream.flush()?;
        Ok(0)
    })
}

fn write_all(stream: &mut dyn ByteStream, mut buf: &[u8]) -> io::Result<()> {
    while !buf.is_empty() {
        match stream.write(buf) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => buf = &buf[n..],
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
