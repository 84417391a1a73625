//! Temporary directory management for tests.
//!
//! [`TestDir`] wraps [`tempfile::TempDir`] with helpers for snapshot files.

// Test utilities are expected to panic on failure - that's their purpose
#![allow(clippy::expect_used)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A managed temporary directory for tests.
///
/// The directory is removed when this struct is dropped.
///
/// # Example
///
/// ```
/// use rewind_test_utils::TestDir;
///
/// let dir = TestDir::new();
/// let path = dir.snapshot_path("cluster");
/// assert!(path.ends_with("cluster.rwd"));
/// ```
pub struct TestDir {
    inner: TempDir,
}

impl TestDir {
    /// Creates a new temporary directory.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        let inner = TempDir::new().expect("failed to create temp directory");
        Self { inner }
    }

    /// Returns the path to the temporary directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// Joins a relative path onto the temporary directory.
    #[must_use]
    pub fn join<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.inner.path().join(path)
    }

    /// Path for a snapshot file named `stem` inside the directory.
    #[must_use]
    pub fn snapshot_path(&self, stem: &str) -> PathBuf {
        self.join(format!("{stem}.rwd"))
    }
}

impl Default for TestDir {
    fn default() -> Self {
        Self::new()
    }
}
