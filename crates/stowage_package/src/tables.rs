//! Package wire structures: header, import table, export table.
//!
//! Counts live in the header only; the table sections are bare runs of
//! entries. Names travel as length-prefixed strings and are interned on
//! read.

use stowage_foundation::{Archive, Name, NameTable, ObjectId, Result};

/// Magic tag identifying a package file.
pub const PACKAGE_FILE_TAG: u32 = 0x9E2A_83C1;

/// Current package file format version.
pub const PACKAGE_FILE_VERSION: u32 = 1;

/// Fixed byte size of [`PackageHeader`] on disk.
pub const HEADER_SIZE: u64 = 48;

/// Fixed-size file header: written first, finalized last.
///
/// The save path reserves [`HEADER_SIZE`] bytes up front, serializes the
/// tables and object data (learning the offsets as it goes), then seeks back
/// to offset 0 and writes the completed header.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PackageHeader {
    /// Must equal [`PACKAGE_FILE_TAG`].
    pub tag: u32,
    /// File format version.
    pub version: u32,
    /// Byte offset of the import table.
    pub import_offset: u64,
    /// Number of import entries.
    pub import_count: u32,
    /// Byte offset of the export table.
    pub export_offset: u64,
    /// Number of export entries.
    pub export_count: u32,
    /// Byte offset of the raw object data block.
    pub data_offset: u64,
    /// Byte offset of the thumbnail (end of file when absent).
    pub thumbnail_offset: u64,
}

impl PackageHeader {
    /// Writes the header at the archive's current position.
    ///
    /// # Errors
    ///
    /// Propagates archive errors.
    pub fn write(&self, ar: &mut dyn Archive) -> Result<()> {
        let mut copy = *self;
        ar.serialize_u32(&mut copy.tag)?;
        ar.serialize_u32(&mut copy.version)?;
        ar.serialize_u64(&mut copy.import_offset)?;
        ar.serialize_u32(&mut copy.import_count)?;
        ar.serialize_u64(&mut copy.export_offset)?;
        ar.serialize_u32(&mut copy.export_count)?;
        ar.serialize_u64(&mut copy.data_offset)?;
        ar.serialize_u64(&mut copy.thumbnail_offset)
    }

    /// Reads a header from the archive's current position.
    ///
    /// Performs no validation; the caller checks tag and version.
    ///
    /// # Errors
    ///
    /// Propagates archive errors.
    pub fn read(ar: &mut dyn Archive) -> Result<Self> {
        let mut header = Self::default();
        ar.serialize_u32(&mut header.tag)?;
        ar.serialize_u32(&mut header.version)?;
        ar.serialize_u64(&mut header.import_offset)?;
        ar.serialize_u32(&mut header.import_count)?;
        ar.serialize_u64(&mut header.export_offset)?;
        ar.serialize_u32(&mut header.export_count)?;
        ar.serialize_u64(&mut header.data_offset)?;
        ar.serialize_u64(&mut header.thumbnail_offset)?;
        Ok(header)
    }
}

/// An object defined inside this package.
#[derive(Clone, Debug)]
pub struct ObjectExport {
    /// Object name within the package (e.g. `HeroMesh`).
    pub object_name: Name,
    /// Class of the object (e.g. `Mesh`).
    pub class_name: Name,
    /// Offset into the object data block where the payload begins.
    pub offset: i64,
    /// Payload size in bytes.
    pub size: i64,
    /// The object, once constructed (immediately on save, shell on load).
    pub object: Option<ObjectId>,
}

impl ObjectExport {
    /// Writes the entry (resolved handle is runtime-only and not written).
    ///
    /// # Errors
    ///
    /// Propagates archive errors.
    pub fn write(&self, ar: &mut dyn Archive, names: &NameTable) -> Result<()> {
        write_name(ar, names, self.object_name)?;
        write_name(ar, names, self.class_name)?;
        let (mut offset, mut size) = (self.offset, self.size);
        ar.serialize_i64(&mut offset)?;
        ar.serialize_i64(&mut size)
    }

    /// Reads an entry, interning its names.
    ///
    /// # Errors
    ///
    /// Propagates archive errors.
    pub fn read(ar: &mut dyn Archive, names: &NameTable) -> Result<Self> {
        let object_name = read_name(ar, names)?;
        let class_name = read_name(ar, names)?;
        let (mut offset, mut size) = (0i64, 0i64);
        ar.serialize_i64(&mut offset)?;
        ar.serialize_i64(&mut size)?;
        Ok(Self {
            object_name,
            class_name,
            offset,
            size,
            object: None,
        })
    }
}

/// A reference to an object living in a different package.
#[derive(Clone, Debug)]
pub struct ObjectImport {
    /// Name of the package the object comes from.
    pub package: Name,
    /// Name of the object within that package.
    pub object_name: Name,
    /// Class of the object (validated on resolution).
    pub class_name: Name,
    /// Runtime-resolved handle, populated lazily.
    pub object: Option<ObjectId>,
}

impl ObjectImport {
    /// Writes the entry (resolved handle is runtime-only and not written).
    ///
    /// # Errors
    ///
    /// Propagates archive errors.
    pub fn write(&self, ar: &mut dyn Archive, names: &NameTable) -> Result<()> {
        write_name(ar, names, self.package)?;
        write_name(ar, names, self.object_name)?;
        write_name(ar, names, self.class_name)
    }

    /// Reads an entry, interning its names.
    ///
    /// # Errors
    ///
    /// Propagates archive errors.
    pub fn read(ar: &mut dyn Archive, names: &NameTable) -> Result<Self> {
        let package = read_name(ar, names)?;
        let object_name = read_name(ar, names)?;
        let class_name = read_name(ar, names)?;
        Ok(Self {
            package,
            object_name,
            class_name,
            object: None,
        })
    }
}

fn write_name(ar: &mut dyn Archive, names: &NameTable, name: Name) -> Result<()> {
    let mut string = names.resolve(name).to_string();
    ar.serialize_string(&mut string)
}

fn read_name(ar: &mut dyn Archive, names: &NameTable) -> Result<Name> {
    let mut string = String::new();
    ar.serialize_string(&mut string)?;
    Ok(names.intern(&string))
}
