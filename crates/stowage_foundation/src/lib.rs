//! Core types for the Stowage object system.
//!
//! This crate provides:
//! - [`Name`] / [`NameTable`] - Interned string handles for object and class names
//! - [`ObjectId`] - Generational object handles
//! - [`Archive`] - The direction-agnostic byte archiver seam
//! - [`Error`] - Rich error types with context

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod archive;
mod error;
mod id;
mod name;

pub use archive::{Archive, MemoryReader, MemoryWriter};
pub use error::{Error, ErrorKind, Result};
pub use id::ObjectId;
pub use name::{Name, NameTable};
