//! End-to-end persistence through the on-disk filesystem backend.

use std::sync::Arc;

use stowage_foundation::NameTable;
use stowage_object::{ClassRegistryBuilder, ObjectStore};
use stowage_package::{register_package_class, DiskFs, PackageFs, PackageStore};

use crate::fixtures::{register_assets, Material, Mesh};

fn packages_on_disk(root: &std::path::Path) -> PackageStore {
    let mut builder = ClassRegistryBuilder::new(Arc::new(NameTable::new()));
    builder.enqueue(register_package_class);
    builder.enqueue(register_assets);
    let store = Arc::new(ObjectStore::new(Arc::new(builder.build())));
    let fs: Arc<dyn PackageFs> = Arc::new(DiskFs::new(root));
    PackageStore::new(store, fs)
}

#[test]
fn packages_survive_a_real_round_trip_on_disk() {
    let dir = tempfile::tempdir().unwrap();

    {
        let packages = packages_on_disk(dir.path());
        let store = packages.store();
        let mesh_class = store.classes().find("Mesh").unwrap();
        let material_class = store.classes().find("Material").unwrap();

        let package = packages.create_package("Props/Smithy");
        let material = store.new_object(
            material_class,
            Some(package),
            store.names().intern("Steel"),
        );
        store.with_payload_as::<Material, _>(material, |m| m.roughness = 0.6);
        let mesh = store.new_object(mesh_class, Some(package), store.names().intern("Anvil"));
        store.with_payload_as::<Mesh, _>(mesh, |m| {
            m.vertex_data = vec![42; 16];
            m.material = Some(material);
        });

        packages.save_package(package, mesh, "Props/Smithy").unwrap();
        assert!(dir.path().join("Props/Smithy.stow").is_file());
    }

    let packages = packages_on_disk(dir.path());
    let store = packages.store();
    let package = packages.load_package("Props/Smithy").unwrap();
    packages.load_all_objects(package).unwrap();

    let mesh = store
        .find_object(None, Some(package), store.names().intern("Anvil"), false)
        .unwrap();
    let material = store
        .find_object(None, Some(package), store.names().intern("Steel"), false)
        .unwrap();
    store.with_payload_as::<Mesh, _>(mesh, |m| {
        assert_eq!(m.vertex_data, vec![42; 16]);
        assert_eq!(m.material, Some(material));
    });
    store.with_payload_as::<Material, _>(material, |m| {
        assert!((m.roughness - 0.6).abs() < f32::EPSILON);
    });
}
