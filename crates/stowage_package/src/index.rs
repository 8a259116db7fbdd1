//! Signed package-relative reference encoding.

use std::fmt;

/// A package-relative object reference.
///
/// Stores a negative number for an import index, a positive number for an
/// export index, and 0 for null (no reference). Always use
/// [`PackageIndex::from_import`] / [`PackageIndex::from_export`] rather than
/// raw arithmetic: the ±1 bias is easy to get wrong by hand.
#[derive(Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct PackageIndex(i64);

impl PackageIndex {
    /// The null reference.
    #[must_use]
    pub const fn null() -> Self {
        Self(0)
    }

    /// Wraps a raw signed encoding (import: `-(i+1)`, export: `i+1`).
    #[must_use]
    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    /// Encodes an import-table array index.
    ///
    /// # Panics
    ///
    /// Panics if the index does not fit the signed encoding.
    #[must_use]
    pub fn from_import(import_array_index: usize) -> Self {
        let index = i64::try_from(import_array_index).expect("import index out of range");
        Self(-(index + 1))
    }

    /// Encodes an export-table array index.
    ///
    /// # Panics
    ///
    /// Panics if the index does not fit the signed encoding.
    #[must_use]
    pub fn from_export(export_array_index: usize) -> Self {
        let index = i64::try_from(export_array_index).expect("export index out of range");
        Self(index + 1)
    }

    /// True for the null reference.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// True if this encodes an import-table index.
    #[must_use]
    pub const fn is_import(self) -> bool {
        self.0 < 0
    }

    /// True if this encodes an export-table index.
    #[must_use]
    pub const fn is_export(self) -> bool {
        self.0 > 0
    }

    /// The raw signed encoding, as written to disk.
    #[must_use]
    pub const fn raw(self) -> i64 {
        self.0
    }

    /// The usable array index into the import or export table.
    ///
    /// Returns `None` for the null reference.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn array_index(self) -> Option<usize> {
        if self.is_null() {
            None
        } else if self.is_export() {
            Some((self.0 - 1) as usize)
        } else {
            Some((-self.0 - 1) as usize)
        }
    }
}

impl fmt::Debug for PackageIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "PackageIndex(null)")
        } else if self.is_export() {
            write!(f, "PackageIndex(export {})", self.0 - 1)
        } else {
            write!(f, "PackageIndex(import {})", -self.0 - 1)
        }
    }
}
