//! The buffer-bound package reader.
//!
//! A loaded package keeps its whole file in memory behind a [`PackageLoader`]
//! so individual exports can be deserialized lazily, in any order. The read
//! cursor is shared: a recursive load saves the cursor, seeks to its own
//! export, reads, and restores the cursor, which is what makes load order a
//! free choice.

use std::sync::Arc;

use parking_lot::Mutex;

use stowage_foundation::{Archive, Error, ObjectId, Result};

use crate::index::PackageIndex;
use crate::package::PackageStore;

/// A package's in-memory file image plus a shared, seekable read cursor.
#[derive(Debug)]
pub struct PackageLoader {
    bytes: Vec<u8>,
    pos: Mutex<u64>,
}

impl PackageLoader {
    /// Wraps a file image, cursor at zero.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            pos: Mutex::new(0),
        }
    }

    /// Current cursor position.
    #[must_use]
    pub fn tell(&self) -> u64 {
        *self.pos.lock()
    }

    /// Moves the cursor. Reads past the end fail at read time.
    pub fn seek(&self, pos: u64) {
        *self.pos.lock() = pos;
    }

    /// Total file size in bytes.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// The raw file image.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Reads at the cursor, advancing it.
    ///
    /// # Errors
    ///
    /// Returns `ShortRead` if the buffer cannot satisfy the read.
    pub fn read(&self, buf: &mut [u8]) -> Result<()> {
        let mut pos = self.pos.lock();
        let start = usize::try_from(*pos)
            .map_err(|_| Error::io(format!("cursor position {} out of range", *pos)))?;
        let end = start.checked_add(buf.len());
        match end {
            Some(end) if end <= self.bytes.len() => {
                buf.copy_from_slice(&self.bytes[start..end]);
                *pos += buf.len() as u64;
                Ok(())
            }
            _ => Err(Error::short_read(
                *pos,
                buf.len() as u64,
                (self.bytes.len() as u64).saturating_sub(*pos),
            )),
        }
    }
}

/// The reading archiver bound to one package's loader.
///
/// Object references are decoded from their signed package-relative index
/// and resolved through the package's tables; resolving an import may load
/// the imported package on demand.
pub(crate) struct LoaderArchive<'a> {
    packages: &'a PackageStore,
    package: ObjectId,
    loader: Arc<PackageLoader>,
}

impl<'a> LoaderArchive<'a> {
    pub(crate) fn new(
        packages: &'a PackageStore,
        package: ObjectId,
        loader: Arc<PackageLoader>,
    ) -> Self {
        Self {
            packages,
            package,
            loader,
        }
    }
}

impl Archive for LoaderArchive<'_> {
    fn is_loading(&self) -> bool {
        true
    }

    fn tell(&self) -> u64 {
        self.loader.tell()
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        self.loader.seek(pos);
        Ok(())
    }

    fn total_size(&self) -> u64 {
        self.loader.total_size()
    }

    fn serialize_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        self.loader.read(buf)
    }

    fn object_ref(&mut self, slot: &mut Option<ObjectId>) -> Result<()> {
        let mut raw = 0i64;
        self.serialize_i64(&mut raw)?;
        *slot = self
            .packages
            .index_to_object(self.package, PackageIndex::from_raw(raw))?;
        Ok(())
    }
}
