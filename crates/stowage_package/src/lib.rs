//! Binary package persistence for Stowage.
//!
//! A package is the unit of persistence: the only object without an owning
//! package of its own, holding an import table (references to objects in
//! other packages), an export table (objects defined here), and — once
//! loaded — a buffer-bound loader for lazy reads.
//!
//! This crate provides:
//! - [`PackageIndex`] - Signed package-relative reference encoding
//! - [`Package`] / [`PackageStore`] - The package payload and the DI'd
//!   save/load orchestrator
//! - [`PackageFs`] - The filesystem seam ([`DiskFs`], [`MemoryFs`])
//! - [`PackagePolicy`] - File extension and strictness knobs

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod fs;
mod index;
mod loader;
mod package;
mod policy;
mod saver;
mod tables;
mod thumbnail;

pub use fs::{DiskFs, MemoryFs, PackageFs};
pub use index::PackageIndex;
pub use loader::PackageLoader;
pub use package::{register_package_class, Package, PackageStore, PACKAGE_CLASS};
pub use policy::PackagePolicy;
pub use tables::{ObjectExport, ObjectImport, PackageHeader, HEADER_SIZE, PACKAGE_FILE_TAG, PACKAGE_FILE_VERSION};
pub use thumbnail::Thumbnail;
