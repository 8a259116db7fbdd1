//! Stowage - Typed object runtime with lazy binary package persistence
//!
//! This crate re-exports all layers of the Stowage system for convenient
//! access. For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 2: stowage_package    — Packages, import/export tables, archivers, VFS
//! Layer 1: stowage_object     — Class registry, object store, garbage collection
//! Layer 0: stowage_foundation — Core types (Name, ObjectId, Archive, Error)
//! ```

pub use stowage_foundation as foundation;
pub use stowage_object as object;
pub use stowage_package as package;
