//! `IBStream` adapters.
//!
//! [`StreamReader`] and [`StreamWriter`] expose a host stream as
//! `std::io::Read`/`Write` so the state header codec can run over it.
//! [`MemoryStream`] is an in-process `IBStream` used to copy the hosted
//! component's state into the hosted controller.

use std::ffi::c_void;
use std::io;

use parking_lot::Mutex;
use vst3::Steinberg::{int32, int64, kInvalidArgument, kResultFalse, kResultOk, tresult};
use vst3::Steinberg::{IBStream, IBStreamTrait};
use vst3::{Class, ComRef};

/// `IBStream::seek` modes.
const SEEK_SET: int32 = 0;
const SEEK_CUR: int32 = 1;
const SEEK_END: int32 = 2;

// =============================================================================
// Host stream adapters
// =============================================================================

/// Read side of a host-provided stream.
pub struct StreamReader<'a> {
    stream: ComRef<'a, IBStream>,
}

impl<'a> StreamReader<'a> {
    pub fn new(stream: ComRef<'a, IBStream>) -> Self {
        Self { stream }
    }
}

impl io::Read for StreamReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = buf.len().min(int32::MAX as usize) as int32;
        let mut read: int32 = 0;
        // SAFETY: buf is valid for len bytes; the stream is live for 'a.
        let result = unsafe { self.stream.read(buf.as_mut_ptr() as *mut c_void, len, &mut read) };
        if result != kResultOk {
            return Err(io::Error::other(format!("IBStream::read returned {result}")));
        }
        Ok(read.max(0) as usize)
    }
}

/// Write side of a host-provided stream.
pub struct StreamWriter<'a> {
    stream: ComRef<'a, IBStream>,
}

impl<'a> StreamWriter<'a> {
    pub fn new(stream: ComRef<'a, IBStream>) -> Self {
        Self { stream }
    }
}

impl io::Write for StreamWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let len = buf.len().min(int32::MAX as usize) as int32;
        let mut written: int32 = 0;
        // SAFETY: buf is valid for len bytes; the stream only reads from it.
        let result =
            unsafe { self.stream.write(buf.as_ptr() as *mut c_void, len, &mut written) };
        if result != kResultOk {
            return Err(io::Error::other(format!("IBStream::write returned {result}")));
        }
        Ok(written.max(0) as usize)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// =============================================================================
// MemoryStream
// =============================================================================

struct Buffer {
    data: Vec<u8>,
    pos: usize,
}

/// Growable in-memory `IBStream`.
pub struct MemoryStream {
    buffer: Mutex<Buffer>,
}

impl MemoryStream {
    pub fn new() -> Self {
        Self::from_bytes(Vec::new())
    }

    /// Stream positioned at the start of `data`.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            buffer: Mutex::new(Buffer { data, pos: 0 }),
        }
    }

    /// Copy of everything written so far.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.buffer.lock().data.clone()
    }

    /// Move the cursor back to the start.
    pub fn rewind(&self) {
        self.buffer.lock().pos = 0;
    }
}

impl Default for MemoryStream {
    fn default() -> Self {
        Self::new()
    }
}

impl Class for MemoryStream {
    type Interfaces = (IBStream,);
}

impl IBStreamTrait for MemoryStream {
    unsafe fn read(&self, buffer: *mut c_void, num_bytes: int32, num_bytes_read: *mut int32) -> tresult {
        if buffer.is_null() || num_bytes < 0 {
            return kInvalidArgument;
        }
        let mut state = self.buffer.lock();
        let available = state.data.len().saturating_sub(state.pos);
        let count = available.min(num_bytes as usize);
        // SAFETY: buffer holds num_bytes bytes per the IBStream contract and
        // count never exceeds it.
        unsafe {
            std::ptr::copy_nonoverlapping(
                state.data.as_ptr().add(state.pos),
                buffer as *mut u8,
                count,
            );
        }
        state.pos += count;
        if !num_bytes_read.is_null() {
            // SAFETY: Non-null out-parameter supplied by the caller.
            unsafe { *num_bytes_read = count as int32 };
        }
        kResultOk
    }

    unsafe fn write(
        &self,
        buffer: *mut c_void,
        num_bytes: int32,
        num_bytes_written: *mut int32,
    ) -> tresult {
        if buffer.is_null() || num_bytes < 0 {
            return kInvalidArgument;
        }
        // SAFETY: buffer holds num_bytes readable bytes per the IBStream contract.
        let bytes = unsafe { std::slice::from_raw_parts(buffer as *const u8, num_bytes as usize) };
        let mut state = self.buffer.lock();
        let end = state.pos + bytes.len();
        if state.data.len() < end {
            state.data.resize(end, 0);
        }
        let pos = state.pos;
        state.data[pos..end].copy_from_slice(bytes);
        state.pos = end;
        if !num_bytes_written.is_null() {
            // SAFETY: Non-null out-parameter supplied by the caller.
            unsafe { *num_bytes_written = num_bytes };
        }
        kResultOk
    }

    unsafe fn seek(&self, pos: int64, mode: int32, result: *mut int64) -> tresult {
        let mut state = self.buffer.lock();
        let base = match mode {
            SEEK_SET => 0,
            SEEK_CUR => state.pos as int64,
            SEEK_END => state.data.len() as int64,
            _ => return kInvalidArgument,
        };
        let target = base.saturating_add(pos);
        if target < 0 {
            return kResultFalse;
        }
        state.pos = target as usize;
        if !result.is_null() {
            // SAFETY: Non-null out-parameter supplied by the caller.
            unsafe { *result = target };
        }
        kResultOk
    }

    unsafe fn tell(&self, pos: *mut int64) -> tresult {
        if pos.is_null() {
            return kInvalidArgument;
        }
        // SAFETY: Checked non-null above.
        unsafe { *pos = self.buffer.lock().pos as int64 };
        kResultOk
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use vmcw_core::state::{read_header, write_header};
    use vst3::ComWrapper;

    #[test]
    fn test_header_roundtrip_through_ibstream() {
        let stream = ComWrapper::new(MemoryStream::new());
        let ptr = stream.to_com_ptr::<IBStream>().unwrap();

        write_header(&mut StreamWriter::new(ptr.as_com_ref()), "/p/Gain.vst3").unwrap();
        StreamWriter::new(ptr.as_com_ref()).write_all(b"tail").unwrap();

        stream.rewind();
        let mut reader = StreamReader::new(ptr.as_com_ref());
        assert_eq!(read_header(&mut reader).unwrap(), "/p/Gain.vst3");
        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"tail");
    }

    #[test]
    fn test_seek_and_tell() {
        let stream = MemoryStream::from_bytes(vec![1, 2, 3, 4, 5]);
        let mut at: int64 = -1;
        // SAFETY: Out-parameters point to locals.
        unsafe {
            assert_eq!(stream.seek(-2, SEEK_END, &mut at), kResultOk);
            assert_eq!(at, 3);
            assert_eq!(stream.seek(1, SEEK_CUR, std::ptr::null_mut()), kResultOk);
            assert_eq!(stream.tell(&mut at), kResultOk);
            assert_eq!(at, 4);
            assert_eq!(stream.seek(-1, SEEK_SET, &mut at), kResultFalse);
            assert_eq!(stream.seek(0, 7, &mut at), kInvalidArgument);
        }
    }

    #[test]
    fn test_read_past_end_is_short() {
        let stream = MemoryStream::from_bytes(vec![9, 8]);
        let mut buf = [0u8; 4];
        let mut read: int32 = 0;
        // SAFETY: buf holds 4 bytes.
        let result = unsafe { stream.read(buf.as_mut_ptr() as *mut c_void, 4, &mut read) };
        assert_eq!(result, kResultOk);
        assert_eq!(read, 2);
        assert_eq!(&buf[..2], &[9, 8]);
    }

    #[test]
    fn test_write_overwrites_in_place() {
        let stream = MemoryStream::from_bytes(b"abcdef".to_vec());
        let mut written: int32 = 0;
        // SAFETY: Source slice is 2 bytes.
        unsafe {
            stream.seek(2, SEEK_SET, std::ptr::null_mut());
            stream.write(b"XY".as_ptr() as *mut c_void, 2, &mut written);
        }
        assert_eq!(written, 2);
        assert_eq!(stream.to_bytes(), b"abXYef");
    }
}
