//! The save-side archivers.
//!
//! Saving is two phases. First a [`ReferenceCollector`] serializes every
//! package-contained object while discarding the bytes: its only job is to
//! watch which object references flow past, splitting them into exports
//! (same package) and imports (other packages) with a seen-set for
//! deduplication. Import indices are assigned here, in discovery order, so
//! the import table is complete before any payload bytes exist. Then the
//! [`PackageSaver`] serializes payloads for real, encoding each reference as
//! the package-relative index the collection phase decided.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::warn;

use stowage_foundation::{Archive, MemoryWriter, ObjectId, Result};
use stowage_object::ObjectStore;

use crate::index::PackageIndex;

/// Accumulated import/export lists for one save operation.
///
/// Indices are package-relative and per-save: the same object may receive a
/// different import index when some other package saves.
pub(crate) struct SaveContext {
    package: ObjectId,
    exports: Vec<ObjectId>,
    imports: Vec<ObjectId>,
    seen_exports: HashSet<ObjectId>,
    import_indices: HashMap<ObjectId, usize>,
    pending: VecDeque<ObjectId>,
}

impl SaveContext {
    pub(crate) fn new(package: ObjectId) -> Self {
        Self {
            package,
            exports: Vec::new(),
            imports: Vec::new(),
            seen_exports: HashSet::new(),
            import_indices: HashMap::new(),
            pending: VecDeque::new(),
        }
    }

    /// Records a same-package object; newly seen exports are queued for the
    /// reference walk. Transient objects are skipped entirely.
    pub(crate) fn add_export(&mut self, store: &ObjectStore, id: ObjectId) {
        if store.is_transient(id) {
            return;
        }
        if self.seen_exports.insert(id) {
            self.exports.push(id);
            self.pending.push_back(id);
        }
    }

    /// Records a foreign-package object, assigning its import index on first
    /// sight.
    pub(crate) fn add_import(&mut self, id: ObjectId) {
        let next = self.imports.len();
        if let std::collections::hash_map::Entry::Vacant(entry) = self.import_indices.entry(id) {
            entry.insert(next);
            self.imports.push(id);
        }
    }

    pub(crate) fn next_pending(&mut self) -> Option<ObjectId> {
        self.pending.pop_front()
    }

    pub(crate) fn package(&self) -> ObjectId {
        self.package
    }

    pub(crate) fn exports(&self) -> &[ObjectId] {
        &self.exports
    }

    pub(crate) fn imports(&self) -> &[ObjectId] {
        &self.imports
    }

    pub(crate) fn import_index_of(&self, id: ObjectId) -> Option<usize> {
        self.import_indices.get(&id).copied()
    }
}

/// Byte-discarding archiver that records object references.
pub(crate) struct ReferenceCollector<'a> {
    store: &'a ObjectStore,
    ctx: &'a mut SaveContext,
}

impl<'a> ReferenceCollector<'a> {
    pub(crate) fn new(store: &'a ObjectStore, ctx: &'a mut SaveContext) -> Self {
        Self { store, ctx }
    }
}

impl Archive for ReferenceCollector<'_> {
    fn is_loading(&self) -> bool {
        false
    }

    fn tell(&self) -> u64 {
        0
    }

    fn seek(&mut self, _pos: u64) -> Result<()> {
        Ok(())
    }

    fn total_size(&self) -> u64 {
        0
    }

    fn serialize_bytes(&mut self, _buf: &mut [u8]) -> Result<()> {
        // Only references matter during collection.
        Ok(())
    }

    fn object_ref(&mut self, slot: &mut Option<ObjectId>) -> Result<()> {
        let Some(id) = *slot else { return Ok(()) };
        if !self.store.is_live(id) {
            warn!(?id, "dropping reference to a destroyed object");
            return Ok(());
        }
        match self.store.package_of(id) {
            Some(package) if package == self.ctx.package() => {
                self.ctx.add_export(self.store, id);
            }
            Some(_) => {
                if !self.store.is_transient(id) {
                    self.ctx.add_import(id);
                }
            }
            // Packageless (script/transient) objects serialize as null.
            None => {}
        }
        Ok(())
    }
}

/// Byte-emitting archiver that encodes references as package indices.
pub(crate) struct PackageSaver<'a> {
    store: &'a ObjectStore,
    ctx: &'a SaveContext,
    writer: &'a mut MemoryWriter,
}

impl<'a> PackageSaver<'a> {
    pub(crate) fn new(
        store: &'a ObjectStore,
        ctx: &'a SaveContext,
        writer: &'a mut MemoryWriter,
    ) -> Self {
        Self { store, ctx, writer }
    }

    fn encode(&self, slot: Option<ObjectId>) -> PackageIndex {
        let Some(id) = slot else {
            return PackageIndex::null();
        };
        if !self.store.is_live(id) {
            return PackageIndex::null();
        }
        match self.store.package_of(id) {
            Some(_) if self.store.is_transient(id) => PackageIndex::null(),
            Some(package) if package == self.ctx.package() => {
                let index = PackageIndex::from_raw(self.store.loader_index(id));
                assert!(
                    index.is_export(),
                    "{id:?} reached the saver without a loader index"
                );
                index
            }
            Some(_) => {
                let index = self.ctx.import_index_of(id).unwrap_or_else(|| {
                    panic!("{id:?} reached the saver without being collected")
                });
                PackageIndex::from_import(index)
            }
            None => PackageIndex::null(),
        }
    }
}

impl Archive for PackageSaver<'_> {
    fn is_loading(&self) -> bool {
        false
    }

    fn tell(&self) -> u64 {
        self.writer.tell()
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        self.writer.seek(pos)
    }

    fn total_size(&self) -> u64 {
        self.writer.total_size()
    }

    fn serialize_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        self.writer.serialize_bytes(buf)
    }

    fn object_ref(&mut self, slot: &mut Option<ObjectId>) -> Result<()> {
        let mut raw = self.encode(*slot).raw();
        self.serialize_i64(&mut raw)
    }
}
