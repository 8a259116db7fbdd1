//! End-to-end integration tests
//!
//! Full-system scenarios exercising the object store, class registry, and
//! package persistence together, including byte-level checks of the wire
//! format.

mod disk;
mod fixtures;
mod scenarios;
