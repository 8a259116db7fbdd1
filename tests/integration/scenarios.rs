//! Full-system scenarios.

use std::sync::Arc;

use stowage_package::{MemoryFs, Package};

use crate::fixtures::{self, Material, Mesh};

#[test]
#[should_panic(expected = "duplicate registration")]
fn constructing_the_same_identity_twice_is_fatal() {
    let packages = fixtures::packages();
    let store = packages.store();
    let mesh_class = store.classes().find("Mesh").unwrap();

    let package = packages.create_package("Pkg");
    let name = store.names().intern("Foo");
    let _first = store.new_object(mesh_class, Some(package), name);
    let _second = store.new_object(mesh_class, Some(package), name);
}

#[test]
fn graph_spanning_three_packages_round_trips() {
    let fs = Arc::new(MemoryFs::new());

    // Author: two material packages, one world referencing both.
    {
        let packages = fixtures::packages_over(Arc::clone(&fs));
        let store = packages.store();
        let mesh_class = store.classes().find("Mesh").unwrap();
        let material_class = store.classes().find("Material").unwrap();

        let mut materials = Vec::new();
        for (package_name, object_name) in [("MetalLib", "Steel"), ("StoneLib", "Granite")] {
            let package = packages.create_package(package_name);
            let material = store.new_object(
                material_class,
                Some(package),
                store.names().intern(object_name),
            );
            packages.save_package(package, material, package_name).unwrap();
            materials.push(material);
        }

        let world = packages.create_package("World");
        for (i, &material) in materials.iter().enumerate() {
            let mesh = store.new_object(
                mesh_class,
                Some(world),
                store.names().intern(&format!("Mesh_{i}")),
            );
            store.with_payload_as::<Mesh, _>(mesh, |m| m.material = Some(material));
        }
        let asset = store
            .find_object(None, Some(world), store.names().intern("Mesh_0"), false)
            .unwrap();
        packages.save_package(world, asset, "World").unwrap();

        let (exports, imports) = store
            .inspect_payload_as::<Package, _>(world, |p| (p.exports().len(), p.imports().len()));
        assert_eq!(exports, 2);
        assert_eq!(imports, 2);
    }

    // Reload everything in a fresh store and chase both imports.
    let packages = fixtures::packages_over(fs);
    let store = packages.store();
    let world = packages.load_package("World").unwrap();
    packages.load_all_objects(world).unwrap();

    for (i, (lib, name)) in [("MetalLib", "Steel"), ("StoneLib", "Granite")]
        .into_iter()
        .enumerate()
    {
        let mesh = store
            .find_object(None, Some(world), store.names().intern(&format!("Mesh_{i}")), false)
            .unwrap();
        let lib_package = store
            .find_object(None, None, store.names().intern(lib), false)
            .expect("imported package was loaded on demand");
        let material = store
            .find_object(None, Some(lib_package), store.names().intern(name), false)
            .unwrap();
        store.with_payload_as::<Mesh, _>(mesh, |m| assert_eq!(m.material, Some(material)));
    }
}

#[test]
fn released_objects_disappear_after_collection() {
    let packages = fixtures::packages();
    let store = packages.store();
    let material_class = store.classes().find("Material").unwrap();

    let package = packages.create_package("Pkg");
    let name = store.names().intern("Fleeting");
    let id = store.new_object(material_class, Some(package), name);
    store.with_payload_as::<Material, _>(id, |m| m.roughness = 1.0);

    assert_eq!(store.release(id), 0);
    assert!(store.is_marked_garbage(id));
    store.collect_garbage();

    assert!(store.find_object(None, Some(package), name, false).is_none());
    assert!(store.objects_in_package(package).is_empty());
    // The package itself is untouched.
    assert!(store.is_live(package));
}

#[test]
fn destroying_a_package_releases_its_loader() {
    let fs = Arc::new(MemoryFs::new());
    {
        let packages = fixtures::packages_over(Arc::clone(&fs));
        let store = packages.store();
        let material_class = store.classes().find("Material").unwrap();
        let package = packages.create_package("Pkg");
        let material =
            store.new_object(material_class, Some(package), store.names().intern("Mat"));
        packages.save_package(package, material, "Pkg").unwrap();
    }

    let packages = fixtures::packages_over(fs);
    let store = packages.store();
    let package = packages.load_package("Pkg").unwrap();
    assert!(store.inspect_payload_as::<Package, _>(package, |p| p.loader().is_some()));

    // Marking runs the resource-release hook before the sweep happens.
    store.mark_garbage(package);
    assert!(store.inspect_payload_as::<Package, _>(package, |p| p.loader().is_none()));
    store.collect_garbage();
    assert!(!store.is_live(package));
}

#[test]
fn resaving_a_loaded_package_keeps_it_loadable() {
    let fs = Arc::new(MemoryFs::new());
    {
        let packages = fixtures::packages_over(Arc::clone(&fs));
        let store = packages.store();
        let material_class = store.classes().find("Material").unwrap();
        let package = packages.create_package("Pkg");
        let material =
            store.new_object(material_class, Some(package), store.names().intern("Mat"));
        store.with_payload_as::<Material, _>(material, |m| m.roughness = 0.5);
        packages.save_package(package, material, "Pkg").unwrap();
    }

    // Load, mutate, save again, then lazy-load from the rebound loader.
    let session = fixtures::packages_over(Arc::clone(&fs));
    let store = session.store();
    let package = session.load_package("Pkg").unwrap();
    let material = store
        .find_object(None, Some(package), store.names().intern("Mat"), false)
        .unwrap();
    session.load_object(material).unwrap();
    store.with_payload_as::<Material, _>(material, |m| m.roughness = 0.9);
    session.save_package(package, material, "Pkg").unwrap();

    let reload = fixtures::packages_over(fs);
    let store = reload.store();
    let package = reload.load_package("Pkg").unwrap();
    let material = store
        .find_object(None, Some(package), store.names().intern("Mat"), false)
        .unwrap();
    reload.load_object(material).unwrap();
    store.with_payload_as::<Material, _>(material, |m| {
        assert!((m.roughness - 0.9).abs() < f32::EPSILON);
    });
}

#[test]
fn concurrent_loads_of_different_packages() {
    let fs = Arc::new(MemoryFs::new());
    {
        let packages = fixtures::packages_over(Arc::clone(&fs));
        let store = packages.store();
        let material_class = store.classes().find("Material").unwrap();
        for i in 0..4 {
            let name = format!("Lib_{i}");
            let package = packages.create_package(&name);
            let material =
                store.new_object(material_class, Some(package), store.names().intern("Mat"));
            packages.save_package(package, material, &name).unwrap();
        }
    }

    let packages = Arc::new(fixtures::packages_over(fs));
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let packages = Arc::clone(&packages);
            std::thread::spawn(move || {
                let package = packages.load_package(&format!("Lib_{i}")).unwrap();
                packages.load_all_objects(package).unwrap();
                package
            })
        })
        .collect();

    let loaded: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(loaded.len(), 4);
    assert_eq!(packages.store().live_count(), 8); // 4 packages + 4 materials
}
