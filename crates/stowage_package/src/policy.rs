//! Configuration for package persistence.

/// Knobs controlling how packages are written and validated.
#[derive(Clone, Debug)]
pub struct PackagePolicy {
    /// File extension appended to package names (without the dot).
    pub extension: String,
    /// Treat a lazy-load size mismatch as a hard error instead of a warning.
    pub strict_sizes: bool,
}

impl Default for PackagePolicy {
    fn default() -> Self {
        Self {
            extension: String::from("stow"),
            strict_sizes: false,
        }
    }
}

impl PackagePolicy {
    /// Creates the default policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the package file extension.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Builder method to set strict size checking.
    #[must_use]
    pub fn with_strict_sizes(mut self, strict: bool) -> Self {
        self.strict_sizes = strict;
        self
    }
}
