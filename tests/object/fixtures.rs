//! Shared fixtures for the object-layer tests.

use std::any::Any;
use std::sync::Arc;

use stowage_foundation::{Archive, NameTable, Result};
use stowage_object::{ClassRegistryBuilder, ClassSpec, Object, ObjectStore};

/// Minimal concrete object used across the object tests.
#[derive(Default)]
pub struct Prop {
    pub weight: u32,
}

impl Object for Prop {
    fn serialize(&mut self, ar: &mut dyn Archive) -> Result<()> {
        ar.serialize_u32(&mut self.weight)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub fn register_props(builder: &mut ClassRegistryBuilder) {
    builder.declare(ClassSpec {
        name: "Prop",
        parent: None,
        package: "script://tests",
        construct: Some(|| Box::new(Prop::default())),
    });
    builder.declare(ClassSpec {
        name: "Crate",
        parent: Some("Prop"),
        package: "script://tests",
        construct: Some(|| Box::new(Prop::default())),
    });
    builder.declare(ClassSpec {
        name: "Barrel",
        parent: Some("Prop"),
        package: "script://tests",
        construct: Some(|| Box::new(Prop::default())),
    });
}

/// A store with the `Prop`/`Crate`/`Barrel` hierarchy registered.
pub fn store() -> ObjectStore {
    let mut builder = ClassRegistryBuilder::new(Arc::new(NameTable::new()));
    builder.enqueue(register_props);
    ObjectStore::new(Arc::new(builder.build()))
}
