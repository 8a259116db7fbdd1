//! Direction-agnostic binary archivers.
//!
//! An [`Archive`] either reads from or writes to a byte stream; the same
//! `serialize` code path on an object works for both directions, which is
//! what lets a lazily loaded object reuse the code that saved it. Integers
//! are little-endian; strings and blobs are u32-length-prefixed.
//!
//! Object references ([`Archive::object_ref`]) are only meaningful to the
//! package archivers, which know how to map a handle to a package-relative
//! index and back. The plain memory archivers reject them.

use crate::error::{Error, Result};
use crate::id::ObjectId;

/// A seekable binary serialization stream.
///
/// All multi-byte helpers are provided in terms of
/// [`serialize_bytes`](Archive::serialize_bytes): when loading, the buffer is
/// filled from the stream; when saving, the buffer is written out.
pub trait Archive {
    /// True if this archive populates values from bytes (a reader).
    fn is_loading(&self) -> bool;

    /// Current cursor position.
    fn tell(&self) -> u64;

    /// Moves the cursor to an absolute position.
    ///
    /// # Errors
    ///
    /// Returns an error if the position is not representable by the
    /// underlying stream.
    fn seek(&mut self, pos: u64) -> Result<()>;

    /// Total number of bytes in the underlying stream.
    fn total_size(&self) -> u64;

    /// Reads into or writes out of `buf`, advancing the cursor.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream cannot satisfy the transfer
    /// (e.g. a read past the end of the buffer).
    fn serialize_bytes(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Serializes an object reference.
    ///
    /// Package archivers encode the handle as a signed package-relative
    /// index; plain memory archivers do not know what an object is.
    ///
    /// # Errors
    ///
    /// Returns an error if this archive does not support object references,
    /// or if the reference cannot be resolved.
    fn object_ref(&mut self, slot: &mut Option<ObjectId>) -> Result<()> {
        let _ = slot;
        Err(Error::unsupported("object references"))
    }

    /// Serializes a `u8`.
    ///
    /// # Errors
    ///
    /// Propagates stream errors.
    fn serialize_u8(&mut self, value: &mut u8) -> Result<()> {
        let mut buf = [*value];
        self.serialize_bytes(&mut buf)?;
        if self.is_loading() {
            *value = buf[0];
        }
        Ok(())
    }

    /// Serializes a `u16` (little-endian).
    ///
    /// # Errors
    ///
    /// Propagates stream errors.
    fn serialize_u16(&mut self, value: &mut u16) -> Result<()> {
        let mut buf = value.to_le_bytes();
        self.serialize_bytes(&mut buf)?;
        if self.is_loading() {
            *value = u16::from_le_bytes(buf);
        }
        Ok(())
    }

    /// Serializes a `u32` (little-endian).
    ///
    /// # Errors
    ///
    /// Propagates stream errors.
    fn serialize_u32(&mut self, value: &mut u32) -> Result<()> {
        let mut buf = value.to_le_bytes();
        self.serialize_bytes(&mut buf)?;
        if self.is_loading() {
            *value = u32::from_le_bytes(buf);
        }
        Ok(())
    }

    /// Serializes a `u64` (little-endian).
    ///
    /// # Errors
    ///
    /// Propagates stream errors.
    fn serialize_u64(&mut self, value: &mut u64) -> Result<()> {
        let mut buf = value.to_le_bytes();
        self.serialize_bytes(&mut buf)?;
        if self.is_loading() {
            *value = u64::from_le_bytes(buf);
        }
        Ok(())
    }

    /// Serializes an `i32` (little-endian).
    ///
    /// # Errors
    ///
    /// Propagates stream errors.
    fn serialize_i32(&mut self, value: &mut i32) -> Result<()> {
        let mut buf = value.to_le_bytes();
        self.serialize_bytes(&mut buf)?;
        if self.is_loading() {
            *value = i32::from_le_bytes(buf);
        }
        Ok(())
    }

    /// Serializes an `i64` (little-endian).
    ///
    /// # Errors
    ///
    /// Propagates stream errors.
    fn serialize_i64(&mut self, value: &mut i64) -> Result<()> {
        let mut buf = value.to_le_bytes();
        self.serialize_bytes(&mut buf)?;
        if self.is_loading() {
            *value = i64::from_le_bytes(buf);
        }
        Ok(())
    }

    /// Serializes an `f32` (little-endian bit pattern).
    ///
    /// # Errors
    ///
    /// Propagates stream errors.
    fn serialize_f32(&mut self, value: &mut f32) -> Result<()> {
        let mut bits = value.to_bits();
        self.serialize_u32(&mut bits)?;
        if self.is_loading() {
            *value = f32::from_bits(bits);
        }
        Ok(())
    }

    /// Serializes a `bool` as a single byte (0 or 1).
    ///
    /// # Errors
    ///
    /// Returns `Corrupt` when loading a byte that is neither 0 nor 1.
    fn serialize_bool(&mut self, value: &mut bool) -> Result<()> {
        let mut byte = u8::from(*value);
        self.serialize_u8(&mut byte)?;
        if self.is_loading() {
            *value = match byte {
                0 => false,
                1 => true,
                other => return Err(Error::corrupt(format!("invalid bool byte {other}"))),
            };
        }
        Ok(())
    }

    /// Serializes a string as u32 length + UTF-8 bytes.
    ///
    /// # Errors
    ///
    /// Returns `Corrupt` when loading bytes that are not valid UTF-8, and
    /// propagates stream errors.
    ///
    /// # Panics
    ///
    /// Panics when saving a string longer than `u32::MAX` bytes.
    fn serialize_string(&mut self, value: &mut String) -> Result<()> {
        if self.is_loading() {
            let mut len = 0u32;
            self.serialize_u32(&mut len)?;
            // A length prefix larger than the remaining stream is corrupt;
            // reject it before allocating.
            let remaining = self.total_size().saturating_sub(self.tell());
            if u64::from(len) > remaining {
                return Err(Error::short_read(self.tell(), u64::from(len), remaining));
            }
            let mut bytes = vec![0u8; len as usize];
            self.serialize_bytes(&mut bytes)?;
            *value = String::from_utf8(bytes)
                .map_err(|_| Error::corrupt("string is not valid UTF-8"))?;
        } else {
            let mut len = u32::try_from(value.len()).expect("string exceeds u32 length");
            self.serialize_u32(&mut len)?;
            let mut bytes = value.clone().into_bytes();
            self.serialize_bytes(&mut bytes)?;
        }
        Ok(())
    }

    /// Serializes a byte blob as u32 length + raw bytes.
    ///
    /// # Errors
    ///
    /// Propagates stream errors.
    ///
    /// # Panics
    ///
    /// Panics when saving a blob longer than `u32::MAX` bytes.
    fn serialize_blob(&mut self, value: &mut Vec<u8>) -> Result<()> {
        if self.is_loading() {
            let mut len = 0u32;
            self.serialize_u32(&mut len)?;
            let remaining = self.total_size().saturating_sub(self.tell());
            if u64::from(len) > remaining {
                return Err(Error::short_read(self.tell(), u64::from(len), remaining));
            }
            let mut bytes = vec![0u8; len as usize];
            self.serialize_bytes(&mut bytes)?;
            *value = bytes;
        } else {
            let mut len = u32::try_from(value.len()).expect("blob exceeds u32 length");
            self.serialize_u32(&mut len)?;
            self.serialize_bytes(value)?;
        }
        Ok(())
    }
}

/// Growable in-memory writer.
///
/// Seeking past the end and writing zero-fills the gap, which is how the
/// package saver reserves header space before the table offsets are known.
#[derive(Debug, Default)]
pub struct MemoryWriter {
    bytes: Vec<u8>,
    pos: usize,
}

impl MemoryWriter {
    /// Creates an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes the writer, returning the accumulated bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Returns the accumulated bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

impl Archive for MemoryWriter {
    fn is_loading(&self) -> bool {
        false
    }

    fn tell(&self) -> u64 {
        self.pos as u64
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        self.pos = usize::try_from(pos)
            .map_err(|_| Error::io(format!("seek position {pos} out of range")))?;
        Ok(())
    }

    fn total_size(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn serialize_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        let end = self.pos + buf.len();
        if end > self.bytes.len() {
            self.bytes.resize(end, 0);
        }
        self.bytes[self.pos..end].copy_from_slice(buf);
        self.pos = end;
        Ok(())
    }
}

/// Bounds-checked in-memory reader.
#[derive(Debug)]
pub struct MemoryReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> MemoryReader<'a> {
    /// Creates a reader over the given bytes, cursor at zero.
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }
}

impl Archive for MemoryReader<'_> {
    fn is_loading(&self) -> bool {
        true
    }

    fn tell(&self) -> u64 {
        self.pos as u64
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        self.pos = usize::try_from(pos)
            .map_err(|_| Error::io(format!("seek position {pos} out of range")))?;
        Ok(())
    }

    fn total_size(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn serialize_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        let end = self.pos.checked_add(buf.len()).ok_or_else(|| {
            Error::short_read(self.pos as u64, buf.len() as u64, 0)
        })?;
        if end > self.bytes.len() {
            let available = self.bytes.len().saturating_sub(self.pos);
            return Err(Error::short_read(
                self.pos as u64,
                buf.len() as u64,
                available as u64,
            ));
        }
        buf.copy_from_slice(&self.bytes[self.pos..end]);
        self.pos = end;
        Ok(())
    }
}
