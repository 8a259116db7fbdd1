//! The filesystem seam.
//!
//! Package I/O goes through [`PackageFs`] so the persistence logic never
//! touches `std::fs` directly: production uses [`DiskFs`], tests use
//! [`MemoryFs`]. Saves are staged in memory by the caller and handed over as
//! one buffer, so a failed save never corrupts prior on-disk state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use stowage_foundation::{Error, Result};

/// Byte-level storage for package files.
pub trait PackageFs: Send + Sync {
    /// Reads an entire file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read.
    fn load_bytes(&self, path: &str) -> Result<Vec<u8>>;

    /// Writes an entire file, replacing any previous content.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be written.
    fn save_bytes(&self, path: &str, bytes: &[u8]) -> Result<()>;

    /// True if a file exists at the path.
    fn exists(&self, path: &str) -> bool;
}

/// On-disk storage rooted at a directory.
#[derive(Debug)]
pub struct DiskFs {
    root: PathBuf,
}

impl DiskFs {
    /// Creates a store rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    fn io_error(action: &str, path: &Path, source: &std::io::Error) -> Error {
        Error::io(format!("failed to {action} '{}': {source}", path.display()))
    }
}

impl PackageFs for DiskFs {
    fn load_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.full_path(path);
        std::fs::read(&full).map_err(|e| Self::io_error("read", &full, &e))
    }

    fn save_bytes(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let full = self.full_path(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Self::io_error("create directory for", &full, &e))?;
        }
        std::fs::write(&full, bytes).map_err(|e| Self::io_error("write", &full, &e))
    }

    fn exists(&self, path: &str) -> bool {
        self.full_path(path).is_file()
    }
}

/// In-memory storage for tests and tooling.
#[derive(Debug, Default)]
pub struct MemoryFs {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryFs {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.lock().len()
    }

    /// True if no files are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.lock().is_empty()
    }
}

impl PackageFs for MemoryFs {
    fn load_bytes(&self, path: &str) -> Result<Vec<u8>> {
        self.files
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| Error::io(format!("no such file '{path}'")))
    }

    fn save_bytes(&self, path: &str, bytes: &[u8]) -> Result<()> {
        self.files.lock().insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        self.files.lock().contains_key(path)
    }
}
