//! Shared fixtures for the end-to-end tests.

use std::any::Any;
use std::sync::Arc;

use stowage_foundation::{Archive, NameTable, ObjectId, Result};
use stowage_object::{ClassRegistryBuilder, ClassSpec, Object, ObjectStore};
use stowage_package::{register_package_class, MemoryFs, PackageFs, PackageStore};

/// An asset with bulk data and one cross-object reference.
#[derive(Default)]
pub struct Mesh {
    pub vertex_data: Vec<u8>,
    pub material: Option<ObjectId>,
}

impl Object for Mesh {
    fn serialize(&mut self, ar: &mut dyn Archive) -> Result<()> {
        ar.serialize_blob(&mut self.vertex_data)?;
        ar.object_ref(&mut self.material)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A leaf asset.
#[derive(Default)]
pub struct Material {
    pub roughness: f32,
}

impl Object for Material {
    fn serialize(&mut self, ar: &mut dyn Archive) -> Result<()> {
        ar.serialize_f32(&mut self.roughness)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub fn register_assets(builder: &mut ClassRegistryBuilder) {
    builder.declare(ClassSpec {
        name: "Mesh",
        parent: None,
        package: "script://tests",
        construct: Some(|| Box::new(Mesh::default())),
    });
    builder.declare(ClassSpec {
        name: "Material",
        parent: None,
        package: "script://tests",
        construct: Some(|| Box::new(Material::default())),
    });
}

/// A package store over the given filesystem.
pub fn packages_over(fs: Arc<MemoryFs>) -> PackageStore {
    let mut builder = ClassRegistryBuilder::new(Arc::new(NameTable::new()));
    builder.enqueue(register_package_class);
    builder.enqueue(register_assets);
    let store = Arc::new(ObjectStore::new(Arc::new(builder.build())));
    let fs: Arc<dyn PackageFs> = fs;
    PackageStore::new(store, fs)
}

/// A package store over a fresh in-memory filesystem.
pub fn packages() -> PackageStore {
    packages_over(Arc::new(MemoryFs::new()))
}
