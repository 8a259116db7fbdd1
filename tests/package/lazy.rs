//! Integration tests for lazy and cross-package object loading.

use std::sync::Arc;

use stowage_foundation::ErrorKind;
use stowage_package::{MemoryFs, Package, PackagePolicy, PackageStore};

use crate::fixtures::{self, Drifty, Material, Mesh};

/// Authors two packages: `World` holds a mesh whose material lives in
/// `Materials`.
fn author_cross_package(fs: &Arc<MemoryFs>) {
    let packages = fixtures::packages_over(Arc::clone(fs));
    let store = packages.store();
    let mesh_class = store.classes().find("Mesh").unwrap();
    let material_class = store.classes().find("Material").unwrap();

    let materials = packages.create_package("Materials");
    let steel = store.new_object(
        material_class,
        Some(materials),
        store.names().intern("Steel"),
    );
    store.with_payload_as::<Material, _>(steel, |m| m.roughness = 0.75);
    packages.save_package(materials, steel, "Materials").unwrap();

    let world = packages.create_package("World");
    let anvil = store.new_object(mesh_class, Some(world), store.names().intern("Anvil"));
    store.with_payload_as::<Mesh, _>(anvil, |m| {
        m.vertex_data = vec![1, 2, 3];
        m.material = Some(steel);
    });
    packages.save_package(world, anvil, "World").unwrap();
}

#[test]
fn loading_a_package_creates_unloaded_shells() {
    let fs = Arc::new(MemoryFs::new());
    author_cross_package(&fs);

    let packages = fixtures::packages_over(fs);
    let store = packages.store();
    let world = packages.load_package("World").unwrap();

    let anvil = store
        .find_object(None, Some(world), store.names().intern("Anvil"), false)
        .unwrap();
    assert!(store.needs_load(anvil));
    assert!(!store.was_loaded(anvil));
    // The shell is registered and findable before any payload bytes exist.
    store.with_payload_as::<Mesh, _>(anvil, |m| assert!(m.vertex_data.is_empty()));
}

#[test]
fn lazy_load_populates_the_shell_and_clears_needs_load() {
    let fs = Arc::new(MemoryFs::new());
    author_cross_package(&fs);

    let packages = fixtures::packages_over(fs);
    let store = packages.store();
    let world = packages.load_package("World").unwrap();
    let anvil = store
        .find_object(None, Some(world), store.names().intern("Anvil"), false)
        .unwrap();

    packages.load_object(anvil).unwrap();
    assert!(!store.needs_load(anvil));
    assert!(store.was_loaded(anvil));
    store.with_payload_as::<Mesh, _>(anvil, |m| assert_eq!(m.vertex_data, vec![1, 2, 3]));

    // Loading again is a no-op.
    packages.load_object(anvil).unwrap();
}

#[test]
fn resolving_an_import_loads_the_other_package() {
    let fs = Arc::new(MemoryFs::new());
    author_cross_package(&fs);

    let packages = fixtures::packages_over(fs);
    let store = packages.store();
    let world = packages.load_package("World").unwrap();
    let anvil = store
        .find_object(None, Some(world), store.names().intern("Anvil"), false)
        .unwrap();

    // Only `World` is loaded so far.
    assert!(store
        .find_object(None, None, store.names().intern("Materials"), false)
        .is_none());

    packages.load_object(anvil).unwrap();

    // Deserializing the mesh resolved its import, pulling `Materials` in.
    let materials = store
        .find_object(None, None, store.names().intern("Materials"), false)
        .expect("import resolution loads the owning package");
    let steel = store
        .find_object(None, Some(materials), store.names().intern("Steel"), false)
        .unwrap();
    store.with_payload_as::<Mesh, _>(anvil, |m| assert_eq!(m.material, Some(steel)));

    // The imported object itself is still a lazy shell until requested.
    assert!(store.needs_load(steel));
    packages.load_object(steel).unwrap();
    store.with_payload_as::<Material, _>(steel, |m| {
        assert!((m.roughness - 0.75).abs() < f32::EPSILON);
    });
}

#[test]
fn exports_load_in_any_order() {
    let fs = Arc::new(MemoryFs::new());
    {
        let packages = fixtures::packages_over(Arc::clone(&fs));
        let store = packages.store();
        let material_class = store.classes().find("Material").unwrap();
        let package = packages.create_package("Props");
        let first = store.new_object(
            material_class,
            Some(package),
            store.names().intern("First"),
        );
        for name in ["Second", "Third", "Fourth"] {
            store.new_object(material_class, Some(package), store.names().intern(name));
        }
        packages.save_package(package, first, "Props").unwrap();
    }

    let packages = fixtures::packages_over(fs);
    let store = packages.store();
    let package = packages.load_package("Props").unwrap();

    // Load back-to-front; the shared cursor is saved and restored around
    // every read, so order is a free choice.
    let exports: Vec<_> = store.inspect_payload_as::<Package, _>(package, |p| {
        p.exports().iter().filter_map(|e| e.object).collect()
    });
    for &id in exports.iter().rev() {
        packages.load_object(id).unwrap();
    }
    for &id in &exports {
        assert!(!store.needs_load(id));
    }
}

#[test]
fn size_mismatch_warns_but_loads_by_default() {
    let fs = Arc::new(MemoryFs::new());
    {
        let packages = fixtures::packages_over(Arc::clone(&fs));
        let store = packages.store();
        let drifty_class = store.classes().find("Drifty").unwrap();
        let package = packages.create_package("Drift");
        let drifty = store.new_object(drifty_class, Some(package), store.names().intern("Off"));
        store.with_payload_as::<Drifty, _>(drifty, |d| d.value = 77);
        packages.save_package(package, drifty, "Drift").unwrap();
    }

    let packages = fixtures::packages_over(fs);
    let store = packages.store();
    let package = packages.load_package("Drift").unwrap();
    let drifty = store
        .find_object(None, Some(package), store.names().intern("Off"), false)
        .unwrap();

    // Reads four bytes fewer than the export recorded: suspect, not fatal.
    packages.load_object(drifty).unwrap();
    assert!(!store.needs_load(drifty));
    store.with_payload_as::<Drifty, _>(drifty, |d| assert_eq!(d.value, 77));
}

#[test]
fn size_mismatch_fails_under_strict_policy() {
    let fs = Arc::new(MemoryFs::new());
    {
        let packages = fixtures::packages_over(Arc::clone(&fs));
        let store = packages.store();
        let drifty_class = store.classes().find("Drifty").unwrap();
        let package = packages.create_package("Drift");
        let drifty = store.new_object(drifty_class, Some(package), store.names().intern("Off"));
        packages.save_package(package, drifty, "Drift").unwrap();
    }

    let lenient = fixtures::packages_over(Arc::clone(&fs));
    let strict = PackageStore::with_policy(
        Arc::clone(lenient.store()),
        fs,
        PackagePolicy::new().with_strict_sizes(true),
    );
    let store = strict.store();
    let package = strict.load_package("Drift").unwrap();
    let drifty = store
        .find_object(None, Some(package), store.names().intern("Off"), false)
        .unwrap();

    let err = strict.load_object(drifty).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::SizeMismatch { .. }));
    // The object is left detectably unloaded.
    assert!(store.needs_load(drifty));
}

#[test]
fn destroy_package_collects_everything() {
    let fs = Arc::new(MemoryFs::new());
    author_cross_package(&fs);

    let packages = fixtures::packages_over(fs);
    let store = packages.store();

    assert!(packages.destroy_package("World").unwrap());
    assert!(store
        .find_object(None, None, store.names().intern("World"), false)
        .is_none());

    // A second destroy reloads from disk and destroys again.
    assert!(packages.destroy_package("World").unwrap());
    assert!(!packages.destroy_package("NoSuchPackage").unwrap());
}

#[test]
fn missing_import_surfaces_object_not_found() {
    let fs = Arc::new(MemoryFs::new());
    author_cross_package(&fs);

    // Replace `Materials` with an empty package so the import dangles.
    {
        let packages = fixtures::packages_over(Arc::clone(&fs));
        let store = packages.store();
        let material_class = store.classes().find("Material").unwrap();
        let materials = packages.create_package("Materials");
        let placeholder = store.new_object(
            material_class,
            Some(materials),
            store.names().intern("NotSteel"),
        );
        packages
            .save_package(materials, placeholder, "Materials")
            .unwrap();
    }

    let packages = fixtures::packages_over(fs);
    let store = packages.store();
    let world = packages.load_package("World").unwrap();
    let anvil = store
        .find_object(None, Some(world), store.names().intern("Anvil"), false)
        .unwrap();

    let err = packages.load_object(anvil).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::ObjectNotFound { .. }));
    // Failed loads leave the shell flagged for diagnosis.
    assert!(store.needs_load(anvil));
}
