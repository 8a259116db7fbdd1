//! Class registry, object model, hash tables, and garbage collection.
//!
//! This crate provides:
//! - [`ClassRegistry`] / [`ClassRegistryBuilder`] - Reflection metadata with
//!   deferred, order-independent registration
//! - [`Object`] - The behavior seam every typed object implements
//! - [`ObjectStore`] - The single service owning all live objects: slot
//!   arena, name/package/class indexes, and the deferred garbage queue

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod class;
mod object;
mod store;

pub use class::{
    ClassDescriptor, ClassId, ClassRegistry, ClassRegistryBuilder, ClassSpec, ConstructFn,
    Registrant,
};
pub use object::{Lifecycle, LoadState, Object};
pub use store::ObjectStore;
