//! Stream records and the engine side of the stream callbacks.

use std::ffi::{c_int, c_void};

use crate::spy;

pub type ReadCallback = unsafe extern "C" fn(*mut c_void, *mut u8, isize) -> isize;
pub type SeekCallback = unsafe extern "C" fn(*mut c_void, isize, c_int) -> isize;
pub type WriteCallback = unsafe extern "C" fn(*mut c_void, *const u8, isize) -> isize;
pub type FlushCallback = unsafe extern "C" fn(*mut c_void) -> isize;

const SEEK_START: c_int = 0;
const SEEK_END: c_int = 2;

const CHUNK: usize = 64 * 1024;

#[repr(C)]
pub struct FakeStream {
    context: *mut c_void,
    reader: ReadCallback,
    seeker: SeekCallback,
    writer: WriteCallback,
    flusher: FlushCallback,
}

impl FakeStream {
    fn seek(&mut self, offset: isize, whence: c_int) -> Result<usize, String> {
        // SAFETY: the host supplied the callback and context together.
        let pos = unsafe { (self.seeker)(self.context, offset, whence) };
        usize::try_from(pos).map_err(|_| "stream seek failed".to_string())
    }

    /// Everything from the start of the stream to its end.
    pub(crate) fn read_to_end(&mut self) -> Result<Vec<u8>, String> {
        let len = self.seek(0, SEEK_END)?;
        self.seek(0, SEEK_START)?;

        let mut out = Vec::with_capacity(len);
        let mut chunk = vec![0u8; CHUNK];
        loop {
            // SAFETY: chunk is CHUNK writable bytes.
            let n = unsafe { (self.reader)(self.context, chunk.as_mut_ptr(), CHUNK as isize) };
            match usize::try_from(n) {
                Ok(0) => break,
                Ok(n) if n <= CHUNK => out.extend_from_slice(&chunk[..n]),
                _ => return Err("stream read failed".to_string()),
            }
        }
        Ok(out)
    }

    /// Write `data` at the current position.
    pub(crate) fn write_all(&mut self, mut data: &[u8]) -> Result<(), String> {
        while !data.is_empty() {
            let len = data.len().min(CHUNK);
            // SAFETY: data has at least `len` readable bytes.
            let n = unsafe { (self.writer)(self.context, data.as_ptr(), len as isize) };
            match usize::try_from(n) {
                Ok(n) if n > 0 && n <= len => data = &data[n..],
                _ => return Err("stream write failed".to_string()),
            }
        }
        // SAFETY: as above.
        if unsafe { (self.flusher)(self.context) } != 0 {
            return Err("stream flush failed".to_string());
        }
        Ok(())
    }

    /// Replace the stream contents from the start with `data`.
    pub(crate) fn rewrite(&mut self, data: &[u8]) -> Result<(), String> {
        self.seek(0, SEEK_START)?;
        self.write_all(data)
    }
}

/// Borrow a stream record for the duration of one entry point.
pub(crate) unsafe fn stream_mut<'a>(ptr: *mut FakeStream) -> Option<&'a mut FakeStream> {
    ptr.as_mut()
}

pub unsafe extern "C" fn c2pa_create_stream(
    context: *mut c_void,
    reader: ReadCallback,
    seeker: SeekCallback,
    writer: WriteCallback,
    flusher: FlushCallback,
) -> *mut FakeStream {
    spy::record("c2pa_create_stream");
    if spy::take_stream_failure() {
        spy::set_error("Other", "stream creation forced to fail");
        return std::ptr::null_mut();
    }
    Box::into_raw(Box::new(FakeStream {
        context,
        reader,
        seeker,
        writer,
        flusher,
    }))
}

pub unsafe extern "C" fn c2pa_release_stream(stream: *mut FakeStream) {
    spy::record("c2pa_release_stream");
    if !stream.is_null() {
        drop(Box::from_raw(stream));
    }
}
