//! The package object and the save/load orchestrator.
//!
//! A package is the authoritative root for any object path: all persistent
//! objects exist *within* a package, and object references across package
//! boundaries resolve through import tables. Objects are lazy-loaded: when a
//! package is loaded, every export gets a registered shell object flagged
//! `NeedsLoad`, and payloads are deserialized on first request, possibly
//! recursively across packages.

use std::any::Any;
use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};

use stowage_foundation::{
    Archive, Error, ErrorKind, MemoryReader, MemoryWriter, Name, ObjectId, Result,
};
use stowage_object::{ClassId, ClassRegistryBuilder, ClassSpec, Object, ObjectStore};

use crate::fs::PackageFs;
use crate::index::PackageIndex;
use crate::loader::{LoaderArchive, PackageLoader};
use crate::policy::PackagePolicy;
use crate::saver::{PackageSaver, ReferenceCollector, SaveContext};
use crate::tables::{
    ObjectExport, ObjectImport, PackageHeader, HEADER_SIZE, PACKAGE_FILE_TAG, PACKAGE_FILE_VERSION,
};
use crate::thumbnail::Thumbnail;

/// Name of the intrinsic package class.
pub const PACKAGE_CLASS: &str = "Package";

/// Registrant declaring the intrinsic `Package` class.
///
/// Enqueue this on the [`ClassRegistryBuilder`] before building the registry
/// used with a [`PackageStore`].
pub fn register_package_class(builder: &mut ClassRegistryBuilder) {
    builder.declare(ClassSpec {
        name: PACKAGE_CLASS,
        parent: None,
        package: "script://stowage",
        construct: Some(|| Box::new(Package::default())),
    });
}

/// The package payload: import/export tables, loader, thumbnail, dirty bit.
///
/// Packages are the only objects without an owning package of their own.
#[derive(Default)]
pub struct Package {
    pub(crate) imports: Vec<ObjectImport>,
    pub(crate) exports: Vec<ObjectExport>,
    pub(crate) loader: Option<Arc<PackageLoader>>,
    pub(crate) thumbnail: Option<Thumbnail>,
    dirty: bool,
}

impl Package {
    /// The import table.
    #[must_use]
    pub fn imports(&self) -> &[ObjectImport] {
        &self.imports
    }

    /// The export table.
    #[must_use]
    pub fn exports(&self) -> &[ObjectExport] {
        &self.exports
    }

    /// The attached loader, if the package has been loaded or saved.
    #[must_use]
    pub fn loader(&self) -> Option<&Arc<PackageLoader>> {
        self.loader.as_ref()
    }

    /// The package thumbnail, if any.
    #[must_use]
    pub fn thumbnail(&self) -> Option<&Thumbnail> {
        self.thumbnail.as_ref()
    }

    /// Sets the thumbnail and marks the package dirty.
    pub fn set_thumbnail(&mut self, thumbnail: Thumbnail) {
        self.thumbnail = Some(thumbnail);
        self.dirty = true;
    }

    /// True if in-memory state has diverged from disk.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Flags the package as needing a save.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Clears the dirty flag.
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}

impl Object for Package {
    fn serialize(&mut self, _ar: &mut dyn Archive) -> Result<()> {
        // Packages are containers; their tables are written by the saver,
        // never as an export payload.
        Ok(())
    }

    fn on_marked_garbage(&mut self) {
        // Release the file image as soon as the package is condemned.
        self.loader = None;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// The save/load orchestrator: object store + filesystem + policy.
///
/// Load and save of a single package are not reentrant across threads —
/// callers serialize access per package. Loads of *different* packages may
/// run concurrently; each package owns its own loader buffer.
pub struct PackageStore {
    store: Arc<ObjectStore>,
    fs: Arc<dyn PackageFs>,
    policy: PackagePolicy,
}

impl PackageStore {
    /// Creates a store with the default policy.
    #[must_use]
    pub fn new(store: Arc<ObjectStore>, fs: Arc<dyn PackageFs>) -> Self {
        Self::with_policy(store, fs, PackagePolicy::default())
    }

    /// Creates a store with an explicit policy.
    #[must_use]
    pub fn with_policy(
        store: Arc<ObjectStore>,
        fs: Arc<dyn PackageFs>,
        policy: PackagePolicy,
    ) -> Self {
        Self { store, fs, policy }
    }

    /// The underlying object store.
    #[must_use]
    pub fn store(&self) -> &Arc<ObjectStore> {
        &self.store
    }

    /// The active policy.
    #[must_use]
    pub fn policy(&self) -> &PackagePolicy {
        &self.policy
    }

    fn package_class(&self) -> ClassId {
        self.store
            .classes()
            .find(PACKAGE_CLASS)
            .expect("Package class is not registered")
    }

    /// Strips the package extension from a caller-supplied name.
    fn identity<'n>(&self, name: &'n str) -> &'n str {
        let suffix = format!(".{}", self.policy.extension);
        name.strip_suffix(suffix.as_str()).unwrap_or(name)
    }

    fn file_path(&self, identity: &str) -> String {
        format!("{identity}.{}", self.policy.extension)
    }

    // =========================================================================
    // Create / destroy
    // =========================================================================

    /// Creates an empty, dirty package, or returns the existing one.
    pub fn create_package(&self, name: &str) -> ObjectId {
        let identity = self.identity(name);
        let name_id = self.store.names().intern(identity);
        let class = self.package_class();

        if let Some(existing) = self.store.find_object(Some(class), None, name_id, true) {
            warn!(package = identity, "attempted to create a package that already exists");
            return existing;
        }

        let package = self.store.new_object(class, None, name_id);
        self.store
            .with_payload_as::<Package, _>(package, Package::mark_dirty);
        info!(package = identity, "created package");
        package
    }

    /// Loads a package, marks all of its exports and the package itself as
    /// garbage, and runs a collection pass.
    ///
    /// Returns `Ok(false)` if no such package exists.
    ///
    /// # Errors
    ///
    /// Propagates load failures other than `PackageNotFound`.
    pub fn destroy_package(&self, name: &str) -> Result<bool> {
        let package = match self.load_package(name) {
            Ok(package) => package,
            Err(Error {
                kind: ErrorKind::PackageNotFound(_),
                ..
            }) => return Ok(false),
            Err(other) => return Err(other),
        };

        let exports: Vec<ObjectId> = self
            .store
            .with_payload_as::<Package, _>(package, |payload| {
                let ids = payload.exports.iter().filter_map(|e| e.object).collect();
                payload.exports.clear();
                ids
            });
        for id in exports {
            self.store.mark_garbage(id);
        }
        self.store.mark_garbage(package);
        self.store.collect_garbage();
        Ok(true)
    }

    // =========================================================================
    // Load
    // =========================================================================

    /// Loads a package file, constructing shell objects for every export.
    ///
    /// Idempotent: if the package is already in memory, it is returned
    /// unchanged. Shells stay flagged `NeedsLoad` until
    /// [`PackageStore::load_object`] deserializes them.
    ///
    /// # Errors
    ///
    /// Returns `PackageNotFound` if no file exists, `BadTag` /
    /// `UnsupportedVersion` / `Corrupt` / `ShortRead` for malformed files,
    /// and `ClassNotFound` / `AbstractClass` if an export names a class this
    /// build cannot construct.
    pub fn load_package(&self, name: &str) -> Result<ObjectId> {
        let identity = self.identity(name);
        let name_id = self.store.names().intern(identity);
        let class = self.package_class();

        if let Some(existing) = self.store.find_object(Some(class), None, name_id, true) {
            // Package is already loaded.
            return Ok(existing);
        }

        let path = self.file_path(identity);
        if !self.fs.exists(&path) {
            return Err(Error::package_not_found(identity));
        }
        let bytes = self.fs.load_bytes(&path)?;

        // Parse and validate everything before touching the object store, so
        // a malformed file never leaves a half-registered package behind.
        let mut reader = MemoryReader::new(&bytes);
        let header = PackageHeader::read(&mut reader)?;
        if header.tag != PACKAGE_FILE_TAG {
            return Err(Error::bad_tag(header.tag));
        }
        if header.version > PACKAGE_FILE_VERSION {
            return Err(Error::unsupported_version(
                header.version,
                PACKAGE_FILE_VERSION,
            ));
        }

        let names = self.store.names();
        reader.seek(header.import_offset)?;
        let mut imports = Vec::with_capacity(header.import_count as usize);
        for _ in 0..header.import_count {
            imports.push(ObjectImport::read(&mut reader, names)?);
        }

        reader.seek(header.export_offset)?;
        let mut exports = Vec::with_capacity(header.export_count as usize);
        for _ in 0..header.export_count {
            exports.push(ObjectExport::read(&mut reader, names)?);
        }

        let thumbnail = if header.thumbnail_offset < bytes.len() as u64 {
            reader.seek(header.thumbnail_offset)?;
            Some(Thumbnail::read(&mut reader)?)
        } else {
            None
        };

        let mut seen_names: HashSet<Name> = HashSet::new();
        let mut export_classes = Vec::with_capacity(exports.len());
        for export in &exports {
            if !seen_names.insert(export.object_name) {
                return Err(Error::corrupt(format!(
                    "duplicate export name {}",
                    names.resolve(export.object_name)
                )));
            }
            let class_name = names.resolve(export.class_name);
            let export_class = self
                .store
                .classes()
                .find_name(export.class_name)
                .ok_or_else(|| Error::class_not_found(&*class_name))?;
            if self.store.classes().descriptor(export_class).is_abstract() {
                return Err(Error::abstract_class(&*class_name));
            }
            export_classes.push(export_class);
        }

        // Construct the package and one shell per export.
        let package = self.store.new_object(class, None, name_id);
        for (index, (export, export_class)) in
            exports.iter_mut().zip(export_classes).enumerate()
        {
            let shell = self.store.new_shell(export_class, package, export.object_name);
            self.store
                .set_loader_index(shell, PackageIndex::from_export(index).raw());
            export.object = Some(shell);
        }

        let export_count = exports.len();
        let import_count = imports.len();
        let byte_count = bytes.len();
        self.store.with_payload_as::<Package, _>(package, move |payload| {
            payload.imports = imports;
            payload.exports = exports;
            payload.loader = Some(Arc::new(PackageLoader::new(bytes)));
            payload.thumbnail = thumbnail;
        });

        info!(
            package = identity,
            exports = export_count,
            imports = import_count,
            bytes = byte_count,
            "loaded package"
        );
        Ok(package)
    }

    /// Deserializes one object's payload from its owning package.
    ///
    /// No-op unless the object is flagged `NeedsLoad`. The owning package is
    /// resolved from the object itself, so calls made "through" the wrong
    /// package delegate correctly. The loader cursor is saved and restored
    /// around the read, which is what permits arbitrary-order and recursive
    /// loads.
    ///
    /// # Errors
    ///
    /// Propagates archive and import-resolution failures; under
    /// `strict_sizes`, a payload that consumed a different number of bytes
    /// than its export entry recorded fails with `SizeMismatch`. On error
    /// the object keeps its `NeedsLoad` flag.
    ///
    /// # Panics
    ///
    /// Panics if the object's loader index or export entry is out of range —
    /// those are core invariant violations, not file conditions.
    pub fn load_object(&self, object: ObjectId) -> Result<()> {
        if !self.store.needs_load(object) {
            return Ok(());
        }
        let Some(package) = self.store.package_of(object) else {
            return Ok(());
        };

        let raw = self.store.loader_index(object);
        let index = PackageIndex::from_raw(raw);
        let slot = match index.array_index() {
            Some(slot) if index.is_export() => slot,
            _ => panic!("{object:?} needs load but has loader index {raw}"),
        };

        let (loader, offset, size) =
            self.store
                .inspect_payload_as::<Package, _>(package, |payload| {
                    let export = payload
                        .exports
                        .get(slot)
                        .unwrap_or_else(|| panic!("export index {slot} out of range"));
                    (payload.loader.clone(), export.offset, export.size)
                });
        let Some(loader) = loader else {
            return Err(Error::io("package has no loader attached")
                .with_context(format!("loading {object:?}")));
        };
        if offset < 0 || size < 0 {
            return Err(Error::corrupt(format!(
                "export entry has offset {offset}, size {size}"
            )));
        }

        #[allow(clippy::cast_sign_loss)]
        let data_pos = offset as u64;
        let saved_pos = loader.tell();
        loader.seek(data_pos);

        let mut payload = self.store.take_payload(object);
        let mut archive = LoaderArchive::new(self, package, Arc::clone(&loader));
        let outcome = payload.serialize(&mut archive);
        self.store.restore_payload(object, payload);

        #[allow(clippy::cast_possible_wrap)]
        let consumed = loader.tell() as i64 - offset;
        loader.seek(saved_pos);
        outcome?;

        if consumed != size {
            let name = self.store.names().resolve(self.store.name_of(object));
            if self.policy.strict_sizes {
                return Err(Error::size_mismatch(&*name, size, consumed));
            }
            warn!(
                object = &*name,
                expected = size,
                actual = consumed,
                "mismatched size when loading object"
            );
        }

        self.store.finish_load(object);
        Ok(())
    }

    /// Eagerly loads every export of a package.
    ///
    /// # Errors
    ///
    /// Stops at and propagates the first failing load.
    pub fn load_all_objects(&self, package: ObjectId) -> Result<()> {
        let objects: Vec<ObjectId> = self
            .store
            .inspect_payload_as::<Package, _>(package, |payload| {
                payload.exports.iter().filter_map(|e| e.object).collect()
            });
        for object in objects {
            self.load_object(object)?;
        }
        Ok(())
    }

    /// Resolves a package-relative index against a package's tables.
    ///
    /// Export indices resolve to the (possibly still unloaded) shell.
    /// Import indices resolve by loading the imported package on demand and
    /// looking the object up by name; resolution is cached in the import
    /// entry.
    ///
    /// # Errors
    ///
    /// Propagates imported-package load failures; returns `ObjectNotFound`
    /// if the imported package has no such object.
    ///
    /// # Panics
    ///
    /// Panics if the index is out of table range — a core invariant
    /// violation.
    pub fn index_to_object(
        &self,
        package: ObjectId,
        index: PackageIndex,
    ) -> Result<Option<ObjectId>> {
        let Some(slot) = index.array_index() else {
            return Ok(None);
        };

        if index.is_export() {
            let object = self
                .store
                .inspect_payload_as::<Package, _>(package, |payload| {
                    payload
                        .exports
                        .get(slot)
                        .unwrap_or_else(|| panic!("export index {slot} out of range"))
                        .object
                });
            return Ok(object);
        }

        let (cached, package_name, object_name, class_name) = self
            .store
            .inspect_payload_as::<Package, _>(package, |payload| {
                let import = payload
                    .imports
                    .get(slot)
                    .unwrap_or_else(|| panic!("import index {slot} out of range"));
                (
                    import.object,
                    import.package,
                    import.object_name,
                    import.class_name,
                )
            });
        if let Some(object) = cached {
            return Ok(Some(object));
        }

        let names = self.store.names();
        let imported_package = self.load_package(&names.resolve(package_name))?;
        let class_filter = self.store.classes().find_name(class_name);
        let object = self
            .store
            .find_object(class_filter, Some(imported_package), object_name, false)
            .ok_or_else(|| {
                Error::object_not_found(&*names.resolve(package_name), &*names.resolve(object_name))
            })?;

        self.store.with_payload_as::<Package, _>(package, |payload| {
            payload.imports[slot].object = Some(object);
        });
        Ok(Some(object))
    }

    // =========================================================================
    // Save
    // =========================================================================

    /// Saves a package and everything it contains to `name`.
    ///
    /// The reference graph reachable from the package's objects (seeded with
    /// `asset`) is walked to build fresh import/export tables, payloads are
    /// serialized with references encoded as package-relative indices, and
    /// the completed buffer is handed to the filesystem in one piece. On
    /// success the package's loader is rebound to the new image and the
    /// dirty flag clears.
    ///
    /// # Errors
    ///
    /// Propagates payload serialization and filesystem failures. On failure
    /// the previous on-disk state is untouched.
    ///
    /// # Panics
    ///
    /// Panics if `asset` does not belong to `package`.
    pub fn save_package(&self, package: ObjectId, asset: ObjectId, name: &str) -> Result<()> {
        let identity = self.identity(name);
        let path = self.file_path(identity);
        let store = &*self.store;
        assert!(
            store.package_of(asset) == Some(package),
            "{asset:?} does not belong to the package being saved"
        );

        // Stale tables from a previous save or load are rebuilt from scratch.
        store.with_payload_as::<Package, _>(package, |payload| {
            payload.imports.clear();
            payload.exports.clear();
        });

        // Phase one: walk the reference graph, no bytes emitted.
        let mut ctx = SaveContext::new(package);
        ctx.add_export(store, asset);
        for id in store.objects_in_package(package) {
            ctx.add_export(store, id);
        }
        while let Some(id) = ctx.next_pending() {
            let mut payload = store.take_payload(id);
            let mut collector = ReferenceCollector::new(store, &mut ctx);
            let outcome = payload.serialize(&mut collector);
            store.restore_payload(id, payload);
            outcome?;
        }

        // Phase two: emit bytes. Header space is reserved and patched last.
        let mut writer = MemoryWriter::new();
        let mut header = PackageHeader {
            tag: PACKAGE_FILE_TAG,
            version: PACKAGE_FILE_VERSION,
            ..PackageHeader::default()
        };
        writer.seek(HEADER_SIZE)?;

        let names = store.names();
        header.import_offset = writer.tell();
        header.import_count = u32::try_from(ctx.imports().len()).expect("import table overflow");
        let import_entries: Vec<ObjectImport> = ctx
            .imports()
            .iter()
            .map(|&id| describe_import(store, id))
            .collect();
        for entry in &import_entries {
            entry.write(&mut writer, names)?;
        }

        let export_ids: Vec<ObjectId> = ctx.exports().to_vec();
        let mut export_entries: Vec<ObjectExport> = export_ids
            .iter()
            .enumerate()
            .map(|(index, &id)| {
                store.set_loader_index(id, PackageIndex::from_export(index).raw());
                describe_export(store, id)
            })
            .collect();

        header.data_offset = writer.tell();
        for (entry, &id) in export_entries.iter_mut().zip(&export_ids) {
            #[allow(clippy::cast_possible_wrap)]
            {
                entry.offset = writer.tell() as i64;
            }
            let mut payload = store.take_payload(id);
            let mut saver = PackageSaver::new(store, &ctx, &mut writer);
            let outcome = payload.serialize(&mut saver);
            store.restore_payload(id, payload);
            outcome?;
            #[allow(clippy::cast_possible_wrap)]
            {
                entry.size = writer.tell() as i64 - entry.offset;
            }
        }

        header.export_offset = writer.tell();
        header.export_count = u32::try_from(export_entries.len()).expect("export table overflow");
        for entry in &export_entries {
            entry.write(&mut writer, names)?;
        }

        header.thumbnail_offset = writer.tell();
        let thumbnail = store.inspect_payload_as::<Package, _>(package, |p| p.thumbnail.clone());
        if let Some(thumbnail) = &thumbnail {
            thumbnail.write(&mut writer)?;
        }

        writer.seek(0)?;
        header.write(&mut writer)?;

        let bytes = writer.into_bytes();
        self.fs.save_bytes(&path, &bytes)?;

        let export_count = export_entries.len();
        let import_count = import_entries.len();
        let byte_count = bytes.len();
        store.with_payload_as::<Package, _>(package, move |payload| {
            payload.imports = import_entries;
            payload.exports = export_entries;
            // Rebind the loader so lazy reads see the image just written.
            payload.loader = Some(Arc::new(PackageLoader::new(bytes)));
            payload.clear_dirty();
        });

        info!(
            package = identity,
            exports = export_count,
            imports = import_count,
            bytes = byte_count,
            "saved package"
        );
        Ok(())
    }
}

fn describe_export(store: &ObjectStore, id: ObjectId) -> ObjectExport {
    ObjectExport {
        object_name: store.name_of(id),
        class_name: class_name_of(store, id),
        offset: 0,
        size: 0,
        object: Some(id),
    }
}

fn describe_import(store: &ObjectStore, id: ObjectId) -> ObjectImport {
    let package = store
        .package_of(id)
        .expect("imports always have an owning package");
    ObjectImport {
        package: store.name_of(package),
        object_name: store.name_of(id),
        class_name: class_name_of(store, id),
        object: Some(id),
    }
}

fn class_name_of(store: &ObjectStore, id: ObjectId) -> Name {
    store.classes().descriptor(store.class_of(id)).name
}
