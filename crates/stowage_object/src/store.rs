//! The object store: slot arena, hash-table indexes, and garbage queue.
//!
//! One `ObjectStore` owns every live object. A single mutex guards the slot
//! arena, the three indexes (by name, by owning package, by class), and the
//! garbage queue — this lock is the synchronization boundary for the whole
//! object system. The lock is never held across user code: payloads are
//! checked out of their slot before `serialize` or a lifecycle hook runs, so
//! recursive loads can re-enter the store safely.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use stowage_foundation::{Name, NameTable, ObjectId};

use crate::class::{ClassId, ClassRegistry};
use crate::object::{Lifecycle, LoadState, Object};

struct LiveObject {
    class: ClassId,
    name: Name,
    package: Option<ObjectId>,
    lifecycle: Lifecycle,
    load_state: LoadState,
    transient: bool,
    was_loaded: bool,
    loader_index: i64,
    refs: u32,
    payload: Option<Box<dyn Object>>,
}

struct Slot {
    generation: u32,
    entry: Option<LiveObject>,
}

#[derive(Default)]
struct Inner {
    slots: Vec<Slot>,
    free: Vec<u32>,
    by_name: HashMap<Name, HashSet<ObjectId>>,
    by_package: HashMap<ObjectId, HashSet<ObjectId>>,
    by_class: HashMap<ClassId, HashSet<ObjectId>>,
    garbage: VecDeque<ObjectId>,
    live: usize,
}

impl Inner {
    fn entry(&self, id: ObjectId) -> &LiveObject {
        let slot = self
            .slots
            .get(id.index as usize)
            .unwrap_or_else(|| panic!("{id:?} does not name a slot"));
        assert!(
            slot.generation == id.generation,
            "{id:?} is stale (slot generation {})",
            slot.generation
        );
        slot.entry
            .as_ref()
            .unwrap_or_else(|| panic!("{id:?} names an empty slot"))
    }

    fn entry_mut(&mut self, id: ObjectId) -> &mut LiveObject {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .unwrap_or_else(|| panic!("{id:?} does not name a slot"));
        assert!(
            slot.generation == id.generation,
            "{id:?} is stale (slot generation {})",
            slot.generation
        );
        slot.entry
            .as_mut()
            .unwrap_or_else(|| panic!("{id:?} names an empty slot"))
    }

    fn is_live(&self, id: ObjectId) -> bool {
        self.slots
            .get(id.index as usize)
            .is_some_and(|slot| slot.generation == id.generation && slot.entry.is_some())
    }

    /// Finds the object registered under (package, name), if any.
    ///
    /// With a package, the package bucket is scanned for the name; without
    /// one, the global name bucket is scanned for packageless objects, so
    /// package-contained and global objects of the same name never collide.
    fn find_named(&self, package: Option<ObjectId>, name: Name) -> Option<ObjectId> {
        match package {
            Some(package) => self.by_package.get(&package).and_then(|bucket| {
                bucket
                    .iter()
                    .copied()
                    .find(|&id| self.entry(id).name == name)
            }),
            None => self.by_name.get(&name).and_then(|bucket| {
                bucket
                    .iter()
                    .copied()
                    .find(|&id| self.entry(id).package.is_none())
            }),
        }
    }

    /// Inserts an object into all three indexes. Double-adds are fatal: they
    /// indicate a bookkeeping bug in the object core.
    fn index_add(&mut self, id: ObjectId, name: Name, package: Option<ObjectId>, class: ClassId) {
        let added = self.by_name.entry(name).or_default().insert(id);
        assert!(added, "{id:?} already present in the name index");

        if let Some(package) = package {
            let added = self.by_package.entry(package).or_default().insert(id);
            assert!(added, "{id:?} already present in the package index");
        }

        let added = self.by_class.entry(class).or_default().insert(id);
        assert!(added, "{id:?} already present in the class index");
    }

    /// Removes an object from all three indexes. Removing an object that was
    /// never added is fatal for the same reason double-adds are.
    fn index_remove(&mut self, id: ObjectId, name: Name, package: Option<ObjectId>, class: ClassId) {
        let bucket = self
            .by_name
            .get_mut(&name)
            .unwrap_or_else(|| panic!("{id:?} missing from the name index"));
        assert!(bucket.remove(&id), "{id:?} missing from the name index");
        if bucket.is_empty() {
            self.by_name.remove(&name);
        }

        if let Some(package) = package {
            let bucket = self
                .by_package
                .get_mut(&package)
                .unwrap_or_else(|| panic!("{id:?} missing from the package index"));
            assert!(bucket.remove(&id), "{id:?} missing from the package index");
            if bucket.is_empty() {
                self.by_package.remove(&package);
            }
        }

        let bucket = self
            .by_class
            .get_mut(&class)
            .unwrap_or_else(|| panic!("{id:?} missing from the class index"));
        assert!(bucket.remove(&id), "{id:?} missing from the class index");
        if bucket.is_empty() {
            self.by_class.remove(&class);
        }
    }

    fn allocate(&mut self, entry: LiveObject) -> ObjectId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = Some(entry);
            ObjectId::new(index, slot.generation)
        } else {
            let index = u32::try_from(self.slots.len()).expect("object store overflow");
            self.slots.push(Slot {
                generation: 1,
                entry: Some(entry),
            });
            ObjectId::new(index, 1)
        }
    }
}

/// The single service owning all live objects.
///
/// Construction, lookup, reference counting, renaming, and garbage
/// collection all go through here; there are no global tables. Handles
/// (`ObjectId`) are generational, so access through a handle that survived a
/// collection pass fails loudly instead of dangling.
///
/// Reference cycles are never collected — the collector is refcount-driven
/// by design. Back-references should be held as plain `ObjectId` without a
/// matching `add_ref` (weak by convention).
pub struct ObjectStore {
    classes: Arc<ClassRegistry>,
    names: Arc<NameTable>,
    inner: Mutex<Inner>,
}

impl ObjectStore {
    /// Creates an empty store sharing the registry's name table.
    #[must_use]
    pub fn new(classes: Arc<ClassRegistry>) -> Self {
        let names = Arc::clone(classes.names());
        Self {
            classes,
            names,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// The shared name table.
    #[must_use]
    pub fn names(&self) -> &Arc<NameTable> {
        &self.names
    }

    /// The class registry.
    #[must_use]
    pub fn classes(&self) -> &Arc<ClassRegistry> {
        &self.classes
    }

    // =========================================================================
    // Construction & lookup
    // =========================================================================

    /// Constructs a new object and registers it under (package, name).
    ///
    /// The returned handle carries one reference.
    ///
    /// # Panics
    ///
    /// Panics if an object is already registered under (package, name), or
    /// if the class is abstract — both are caller bugs, not runtime
    /// conditions.
    pub fn new_object(&self, class: ClassId, package: Option<ObjectId>, name: Name) -> ObjectId {
        self.construct(class, package, name, LoadState::Loaded)
    }

    /// Constructs a shell object: registered and findable, but flagged
    /// `NeedsLoad` until its payload is lazily deserialized.
    ///
    /// # Panics
    ///
    /// Same conditions as [`ObjectStore::new_object`].
    pub fn new_shell(&self, class: ClassId, package: ObjectId, name: Name) -> ObjectId {
        self.construct(class, Some(package), name, LoadState::NeedsLoad)
    }

    fn construct(
        &self,
        class: ClassId,
        package: Option<ObjectId>,
        name: Name,
        load_state: LoadState,
    ) -> ObjectId {
        let payload = self.classes.instantiate(class).unwrap_or_else(|e| {
            panic!("cannot construct {}: {e}", self.names.resolve(name))
        });

        let mut inner = self.inner.lock();
        if let Some(existing) = inner.find_named(package, name) {
            panic!(
                "duplicate registration of {} (already registered as {existing:?})",
                self.names.resolve(name)
            );
        }

        let id = inner.allocate(LiveObject {
            class,
            name,
            package,
            lifecycle: Lifecycle::Live,
            load_state,
            transient: false,
            was_loaded: false,
            loader_index: 0,
            refs: 1,
            payload: Some(payload),
        });
        inner.index_add(id, name, package, class);
        id
    }

    /// Finds an object by identity, optionally filtered by class.
    ///
    /// With `package`, searches that package's objects; without, searches
    /// global (packageless) objects only. `exact_class` selects between
    /// exact-match and is-a class filtering.
    #[must_use]
    pub fn find_object(
        &self,
        class: Option<ClassId>,
        package: Option<ObjectId>,
        name: Name,
        exact_class: bool,
    ) -> Option<ObjectId> {
        let inner = self.inner.lock();
        let id = inner.find_named(package, name)?;
        if let Some(class) = class {
            let actual = inner.entry(id).class;
            let matches = if exact_class {
                actual == class
            } else {
                self.classes.is_a(actual, class)
            };
            if !matches {
                return None;
            }
        }
        Some(id)
    }

    /// Generates a free name of the form `ClassName_N` under the package.
    #[must_use]
    pub fn unique_name(&self, class: ClassId, package: Option<ObjectId>) -> Name {
        let base = self.names.resolve(self.classes.descriptor(class).name);
        for n in 0u32.. {
            let candidate = format!("{base}_{n}");
            let taken = self
                .names
                .find(&candidate)
                .is_some_and(|name| self.find_object(None, package, name, false).is_some());
            if !taken {
                return self.names.intern(&candidate);
            }
        }
        unreachable!("u32 name space exhausted");
    }

    /// Moves an object to a new (package, name) identity atomically.
    ///
    /// The object is never findable under both identities: removal and
    /// reinsertion happen under one lock acquisition.
    ///
    /// # Panics
    ///
    /// Panics if the target identity is already taken by another object.
    pub fn rename(&self, id: ObjectId, new_name: Name, new_package: Option<ObjectId>) {
        let mut inner = self.inner.lock();
        if let Some(existing) = inner.find_named(new_package, new_name) {
            if existing == id {
                return;
            }
            panic!(
                "rename collision: {} is already registered as {existing:?}",
                self.names.resolve(new_name)
            );
        }

        let entry = inner.entry(id);
        let (old_name, old_package, class) = (entry.name, entry.package, entry.class);
        inner.index_remove(id, old_name, old_package, class);
        {
            let entry = inner.entry_mut(id);
            entry.name = new_name;
            entry.package = new_package;
        }
        inner.index_add(id, new_name, new_package, class);
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// True if the handle refers to a live (possibly garbage-marked) object.
    #[must_use]
    pub fn is_live(&self, id: ObjectId) -> bool {
        self.inner.lock().is_live(id)
    }

    /// The object's class.
    #[must_use]
    pub fn class_of(&self, id: ObjectId) -> ClassId {
        self.inner.lock().entry(id).class
    }

    /// The object's name.
    #[must_use]
    pub fn name_of(&self, id: ObjectId) -> Name {
        self.inner.lock().entry(id).name
    }

    /// The object's owning package, if any.
    #[must_use]
    pub fn package_of(&self, id: ObjectId) -> Option<ObjectId> {
        self.inner.lock().entry(id).package
    }

    /// Current reference count.
    #[must_use]
    pub fn ref_count(&self, id: ObjectId) -> u32 {
        self.inner.lock().entry(id).refs
    }

    /// True if the object is a shell awaiting lazy load.
    #[must_use]
    pub fn needs_load(&self, id: ObjectId) -> bool {
        self.inner.lock().entry(id).load_state == LoadState::NeedsLoad
    }

    /// True if the object was populated from a package file.
    #[must_use]
    pub fn was_loaded(&self, id: ObjectId) -> bool {
        self.inner.lock().entry(id).was_loaded
    }

    /// Clears `NeedsLoad` and records that the payload came from disk.
    pub fn finish_load(&self, id: ObjectId) {
        let mut inner = self.inner.lock();
        let entry = inner.entry_mut(id);
        entry.load_state = LoadState::Loaded;
        entry.was_loaded = true;
    }

    /// True if the object is excluded from package saves.
    #[must_use]
    pub fn is_transient(&self, id: ObjectId) -> bool {
        self.inner.lock().entry(id).transient
    }

    /// Excludes the object from package saves; references to it serialize
    /// as null.
    pub fn mark_transient(&self, id: ObjectId) {
        self.inner.lock().entry_mut(id).transient = true;
    }

    /// The object's package-relative loader index (raw signed encoding).
    #[must_use]
    pub fn loader_index(&self, id: ObjectId) -> i64 {
        self.inner.lock().entry(id).loader_index
    }

    /// Records the object's package-relative loader index.
    pub fn set_loader_index(&self, id: ObjectId, raw: i64) {
        self.inner.lock().entry_mut(id).loader_index = raw;
    }

    /// Whether the object has been marked for collection.
    #[must_use]
    pub fn is_marked_garbage(&self, id: ObjectId) -> bool {
        self.inner.lock().entry(id).lifecycle == Lifecycle::MarkedGarbage
    }

    /// Number of live objects (including garbage-marked, not yet collected).
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.inner.lock().live
    }

    /// All objects owned by the package, in slot order.
    #[must_use]
    pub fn objects_in_package(&self, package: ObjectId) -> Vec<ObjectId> {
        let inner = self.inner.lock();
        let mut ids: Vec<ObjectId> = inner
            .by_package
            .get(&package)
            .map(|bucket| bucket.iter().copied().collect())
            .unwrap_or_default();
        ids.sort_by_key(|id| id.index);
        ids
    }

    /// All objects of the class (exact or is-a), in slot order.
    #[must_use]
    pub fn objects_of_class(&self, class: ClassId, exact: bool) -> Vec<ObjectId> {
        let inner = self.inner.lock();
        let mut ids: Vec<ObjectId> = inner
            .by_class
            .iter()
            .filter(|(&actual, _)| {
                if exact {
                    actual == class
                } else {
                    self.classes.is_a(actual, class)
                }
            })
            .flat_map(|(_, bucket)| bucket.iter().copied())
            .collect();
        ids.sort_by_key(|id| id.index);
        ids
    }

    // =========================================================================
    // Payload checkout
    // =========================================================================

    /// Removes the object's payload from its slot for serialization.
    ///
    /// The store lock is *not* held while the caller works with the payload,
    /// so the payload may freely call back into the store. Pair with
    /// [`ObjectStore::restore_payload`].
    ///
    /// # Panics
    ///
    /// Panics if the payload is already checked out.
    #[must_use]
    pub fn take_payload(&self, id: ObjectId) -> Box<dyn Object> {
        let mut inner = self.inner.lock();
        inner
            .entry_mut(id)
            .payload
            .take()
            .unwrap_or_else(|| panic!("payload of {id:?} is already checked out"))
    }

    /// Returns a checked-out payload to its slot.
    ///
    /// # Panics
    ///
    /// Panics if the slot already holds a payload.
    pub fn restore_payload(&self, id: ObjectId, payload: Box<dyn Object>) {
        let mut inner = self.inner.lock();
        let entry = inner.entry_mut(id);
        assert!(
            entry.payload.is_none(),
            "payload of {id:?} restored while present"
        );
        entry.payload = Some(payload);
    }

    /// Checks the payload out, runs `f` on it without the store lock held,
    /// and checks it back in.
    pub fn with_payload<R>(&self, id: ObjectId, f: impl FnOnce(&mut dyn Object) -> R) -> R {
        let mut payload = self.take_payload(id);
        let result = f(&mut *payload);
        self.restore_payload(id, payload);
        result
    }

    /// Typed variant of [`ObjectStore::with_payload`].
    ///
    /// # Panics
    ///
    /// Panics if the payload is not a `T`.
    pub fn with_payload_as<T: Object, R>(&self, id: ObjectId, f: impl FnOnce(&mut T) -> R) -> R {
        self.with_payload(id, |payload| {
            let typed = payload
                .as_any_mut()
                .downcast_mut::<T>()
                .unwrap_or_else(|| panic!("payload of {id:?} has an unexpected type"));
            f(typed)
        })
    }

    /// Runs `f` on the payload **under the store lock**.
    ///
    /// `f` must not call back into the store. Intended for cheap reads
    /// (cloning an `Arc`, reading a table entry).
    ///
    /// # Panics
    ///
    /// Panics if the payload is checked out or not a `T`.
    pub fn inspect_payload_as<T: Object, R>(&self, id: ObjectId, f: impl FnOnce(&T) -> R) -> R {
        let inner = self.inner.lock();
        let payload = inner
            .entry(id)
            .payload
            .as_deref()
            .unwrap_or_else(|| panic!("payload of {id:?} is checked out"));
        let typed = payload
            .as_any()
            .downcast_ref::<T>()
            .unwrap_or_else(|| panic!("payload of {id:?} has an unexpected type"));
        f(typed)
    }

    // =========================================================================
    // Reference counting & garbage collection
    // =========================================================================

    /// Adds a reference. Returns the new count.
    pub fn add_ref(&self, id: ObjectId) -> u32 {
        let mut inner = self.inner.lock();
        let entry = inner.entry_mut(id);
        entry.refs += 1;
        entry.refs
    }

    /// Drops a reference. Reaching zero marks the object as garbage (it is
    /// not destroyed until the next [`ObjectStore::collect_garbage`] pass).
    /// Returns the new count.
    ///
    /// # Panics
    ///
    /// Panics on a release without a matching reference.
    pub fn release(&self, id: ObjectId) -> u32 {
        let remaining = {
            let mut inner = self.inner.lock();
            let entry = inner.entry_mut(id);
            assert!(entry.refs > 0, "release of {id:?} without a reference");
            entry.refs -= 1;
            entry.refs
        };
        if remaining == 0 {
            self.mark_garbage(id);
        }
        remaining
    }

    /// Marks an object for deferred destruction. Idempotent.
    ///
    /// The object stays registered and findable until the next collection
    /// pass, so code already holding it this frame is not invalidated. The
    /// `on_marked_garbage` hook runs here (once), releasing any external
    /// resources the object holds.
    pub fn mark_garbage(&self, id: ObjectId) {
        {
            let mut inner = self.inner.lock();
            let entry = inner.entry_mut(id);
            if entry.lifecycle == Lifecycle::MarkedGarbage {
                return;
            }
            entry.lifecycle = Lifecycle::MarkedGarbage;
            inner.garbage.push_back(id);
        }
        let mut payload = self.take_payload(id);
        payload.on_marked_garbage();
        self.restore_payload(id, payload);
    }

    /// Destroys every queued object, FIFO. Returns the number destroyed.
    ///
    /// For each object: verify it is still marked (anything else means the
    /// queue or the lifecycle state was corrupted), remove it from all three
    /// indexes, free its slot, then run `on_destroy` outside the lock.
    ///
    /// # Panics
    ///
    /// Panics if a queued object is no longer marked as garbage.
    pub fn collect_garbage(&self) -> usize {
        let mut destroyed = 0usize;
        loop {
            let next = self.inner.lock().garbage.pop_front();
            let Some(id) = next else { break };

            let entry = {
                let mut inner = self.inner.lock();
                let slot = inner
                    .slots
                    .get_mut(id.index as usize)
                    .unwrap_or_else(|| panic!("garbage queue holds unknown {id:?}"));
                assert!(
                    slot.generation == id.generation,
                    "{id:?} was destroyed twice"
                );
                let entry = slot
                    .entry
                    .take()
                    .unwrap_or_else(|| panic!("garbage queue holds empty {id:?}"));
                assert!(
                    entry.lifecycle == Lifecycle::MarkedGarbage,
                    "{id:?} reached the collector without being marked"
                );
                slot.generation += 1;
                inner.free.push(id.index);
                inner.live -= 1;
                inner.index_remove(id, entry.name, entry.package, entry.class);
                entry
            };

            let mut payload = entry
                .payload
                .unwrap_or_else(|| panic!("payload of {id:?} checked out during collection"));
            payload.on_destroy();
            drop(payload);
            destroyed += 1;
        }

        if destroyed > 0 {
            debug!(destroyed, "garbage collection pass");
        }
        destroyed
    }

    /// Number of objects waiting in the garbage queue.
    #[must_use]
    pub fn pending_garbage(&self) -> usize {
        self.inner.lock().garbage.len()
    }
}
