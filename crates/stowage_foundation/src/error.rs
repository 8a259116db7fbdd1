//! Error types for the Stowage system.
//!
//! Uses `thiserror` for ergonomic error definition. Only recoverable
//! conditions are modeled here: invariant violations (double registration,
//! out-of-range table indices) are fatal panics, not errors.

use thiserror::Error;

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Stowage operations.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<String>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Creates an I/O error.
    #[must_use]
    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io(message.into()))
    }

    /// Creates a package-not-found error.
    #[must_use]
    pub fn package_not_found(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::PackageNotFound(name.into()))
    }

    /// Creates a bad-tag error.
    #[must_use]
    pub fn bad_tag(found: u32) -> Self {
        Self::new(ErrorKind::BadTag { found })
    }

    /// Creates an unsupported-version error.
    #[must_use]
    pub fn unsupported_version(found: u32, supported: u32) -> Self {
        Self::new(ErrorKind::UnsupportedVersion { found, supported })
    }

    /// Creates a short-read error.
    #[must_use]
    pub fn short_read(offset: u64, requested: u64, available: u64) -> Self {
        Self::new(ErrorKind::ShortRead {
            offset,
            requested,
            available,
        })
    }

    /// Creates a corrupt-data error.
    #[must_use]
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Corrupt(message.into()))
    }

    /// Creates a class-not-found error.
    #[must_use]
    pub fn class_not_found(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::ClassNotFound(name.into()))
    }

    /// Creates an abstract-class error.
    #[must_use]
    pub fn abstract_class(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::AbstractClass(name.into()))
    }

    /// Creates an object-not-found error.
    #[must_use]
    pub fn object_not_found(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(ErrorKind::ObjectNotFound {
            package: package.into(),
            name: name.into(),
        })
    }

    /// Creates a size-mismatch error.
    #[must_use]
    pub fn size_mismatch(name: impl Into<String>, expected: i64, actual: i64) -> Self {
        Self::new(ErrorKind::SizeMismatch {
            name: name.into(),
            expected,
            actual,
        })
    }

    /// Creates an unsupported-operation error.
    #[must_use]
    pub fn unsupported(what: &'static str) -> Self {
        Self::new(ErrorKind::Unsupported(what))
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// Filesystem operation failed.
    #[error("i/o failure: {0}")]
    Io(String),

    /// No package file exists under the requested name.
    #[error("package not found: {0}")]
    PackageNotFound(String),

    /// The file did not start with the package tag.
    #[error("bad package tag: {found:#010x}")]
    BadTag {
        /// The tag value actually read.
        found: u32,
    },

    /// The file version is newer than this build understands.
    #[error("unsupported package version {found} (supported: <= {supported})")]
    UnsupportedVersion {
        /// The version actually read.
        found: u32,
        /// The newest version this build reads.
        supported: u32,
    },

    /// A read ran past the end of the buffer.
    #[error("short read at offset {offset}: requested {requested}, available {available}")]
    ShortRead {
        /// Cursor position at the time of the read.
        offset: u64,
        /// Bytes requested.
        requested: u64,
        /// Bytes remaining.
        available: u64,
    },

    /// Structurally invalid data (bad UTF-8, nonsensical table entries).
    #[error("corrupt package data: {0}")]
    Corrupt(String),

    /// A serialized class name is not present in the class registry.
    #[error("class not found: {0}")]
    ClassNotFound(String),

    /// Attempted to construct an instance of an abstract class.
    #[error("class is abstract: {0}")]
    AbstractClass(String),

    /// An imported object could not be found in its owning package.
    #[error("object not found: {package}.{name}")]
    ObjectNotFound {
        /// Owning package name.
        package: String,
        /// Object name within the package.
        name: String,
    },

    /// A lazily loaded object consumed a different number of bytes than its
    /// export entry recorded (surfaced as an error only under strict policy).
    #[error("size mismatch loading {name}: expected {expected}, got {actual}")]
    SizeMismatch {
        /// Object name.
        name: String,
        /// Size recorded in the export table.
        expected: i64,
        /// Bytes actually consumed.
        actual: i64,
    },

    /// The archive does not support the requested operation.
    #[error("unsupported archive operation: {0}")]
    Unsupported(&'static str),
}
