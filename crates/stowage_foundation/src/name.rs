//! String interning for object and class names.
//!
//! Names are interned to enable fast equality comparison and to keep the
//! object hash tables keyed on small copyable handles instead of strings.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Interned name identifier.
///
/// Two `Name`s compare equal iff they were interned from the same string
/// in the same [`NameTable`].
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Name(pub(crate) u32);

impl Name {
    /// Returns the raw index of this name.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self.0)
    }
}

/// Interner for names.
///
/// Internally synchronized: the table is shared between the class registry
/// and the object store, both of which may intern from different threads.
/// Resolution hands out `Arc<str>` so callers never borrow the table.
#[derive(Debug, Default)]
pub struct NameTable {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    /// String storage, indexed by `Name`.
    strings: Vec<Arc<str>>,
    /// Map from string to index.
    lookup: HashMap<Arc<str>, u32>,
}

impl NameTable {
    /// Creates a new empty name table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a string, returning its handle.
    ///
    /// Interning the same string twice returns the same handle.
    ///
    /// # Panics
    ///
    /// Panics if more than `u32::MAX` distinct names are interned.
    pub fn intern(&self, string: &str) -> Name {
        if let Some(existing) = self.find(string) {
            return existing;
        }

        let mut inner = self.inner.write();
        // Re-check under the write lock: another thread may have interned
        // between our read and write.
        if let Some(&index) = inner.lookup.get(string) {
            return Name(index);
        }

        let index = u32::try_from(inner.strings.len()).expect("name table overflow");
        let shared: Arc<str> = Arc::from(string);
        inner.strings.push(Arc::clone(&shared));
        inner.lookup.insert(shared, index);
        Name(index)
    }

    /// Looks up the handle for a string without interning it.
    #[must_use]
    pub fn find(&self, string: &str) -> Option<Name> {
        self.inner.read().lookup.get(string).copied().map(Name)
    }

    /// Resolves a handle back to its string.
    ///
    /// # Panics
    ///
    /// Panics if the handle was not produced by this table.
    #[must_use]
    pub fn resolve(&self, name: Name) -> Arc<str> {
        let inner = self.inner.read();
        let string = inner
            .strings
            .get(name.0 as usize)
            .unwrap_or_else(|| panic!("name {} resolved against the wrong table", name.0));
        Arc::clone(string)
    }

    /// Returns the number of interned names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().strings.len()
    }

    /// Returns true if nothing has been interned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
