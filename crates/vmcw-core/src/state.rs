//! Persisted-state header codec.
//!
//! Every state blob the wrapper hands to the DAW starts with a small header
//! naming the hosted plugin, followed by the hosted plugin's own opaque state:
//!
//! ```text
//! [ "VMCW" ][ version: u32 LE ][ path_len: u32 LE ][ path bytes ][ hosted state ... ]
//! ```
//!
//! The codec only touches the header. Whatever follows is left in the stream
//! for the hosted plugin. Each field is transferred with a single read or
//! write call and anything short of the full field is an error.

use std::io::{Read, Write};

use crate::config::{MAX_PATH_LEN, STATE_MAGIC, STATE_VERSION};
use crate::error::{Result, StateError};

/// Size of the fixed part of the header (magic, version, length).
pub const HEADER_FIXED_LEN: usize = 12;

fn write_field<W: Write + ?Sized>(stream: &mut W, bytes: &[u8]) -> Result<()> {
    let written = stream.write(bytes)?;
    if written != bytes.len() {
        return Err(StateError::ShortWrite {
            expected: bytes.len(),
            actual: written,
        });
    }
    Ok(())
}

fn read_field<R: Read + ?Sized>(stream: &mut R, buf: &mut [u8]) -> Result<()> {
    let read = stream.read(buf)?;
    if read != buf.len() {
        return Err(StateError::Truncated {
            expected: buf.len(),
            actual: read,
        });
    }
    Ok(())
}

/// Write the header for `path`.
///
/// An empty path is valid and means "no plugin loaded".
pub fn write_header<W: Write + ?Sized>(stream: &mut W, path: &str) -> Result<()> {
    let path_len = u32::try_from(path.len()).map_err(|_| StateError::PathTooLong(u32::MAX))?;
    if path_len > MAX_PATH_LEN {
        return Err(StateError::PathTooLong(path_len));
    }

    write_field(stream, &STATE_MAGIC)?;
    write_field(stream, &STATE_VERSION.to_le_bytes())?;
    write_field(stream, &path_len.to_le_bytes())?;
    if path_len > 0 {
        write_field(stream, path.as_bytes())?;
    }
    Ok(())
}

/// Read and validate the header, returning the embedded path.
///
/// On success the stream is positioned at the first byte of the hosted
/// plugin's state.
pub fn read_header<R: Read + ?Sized>(stream: &mut R) -> Result<String> {
    let mut magic = [0u8; 4];
    read_field(stream, &mut magic)?;
    if magic != STATE_MAGIC {
        return Err(StateError::BadMagic(magic));
    }

    let mut word = [0u8; 4];
    read_field(stream, &mut word)?;
    let version = u32::from_le_bytes(word);
    if version != STATE_VERSION {
        return Err(StateError::UnsupportedVersion(version));
    }

    read_field(stream, &mut word)?;
    let path_len = u32::from_le_bytes(word);
    if path_len > MAX_PATH_LEN {
        return Err(StateError::PathTooLong(path_len));
    }

    if path_len == 0 {
        return Ok(String::new());
    }

    let mut path = vec![0u8; path_len as usize];
    read_field(stream, &mut path)?;
    String::from_utf8(path).map_err(|_| StateError::InvalidUtf8)
}

// =========================================================================
// Tests
// =========================================================================
