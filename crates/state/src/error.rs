use std::path::PathBuf;

use rewind_types::{CodecError, ConfigError};
use snafu::Snafu;

/// Errors raised by the snapshot store.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StoreError {
    /// The underlying temporal map failed.
    #[snafu(display("Temporal store error: {source}"))]
    Store {
        /// The underlying store error.
        source: rewind_store::Error,
    },

    /// A stored resource could not be encoded or decoded.
    #[snafu(display("Resource {id} codec error: {source}"))]
    Codec {
        /// Identifier of the resource.
        id: String,
        /// The underlying codec error.
        source: CodecError,
    },

    /// IO error while saving or loading a snapshot file.
    #[snafu(display("IO error on {}: {source}", path.display()))]
    Io {
        /// File being read or written.
        path: PathBuf,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// The container ended before a declared section did.
    #[snafu(display("Truncated snapshot: {section} needs {needed} bytes, {available} remain"))]
    Truncated {
        /// Section being read.
        section: &'static str,
        /// Bytes the section header declared.
        needed: u64,
        /// Bytes left in the container.
        available: u64,
    },

    /// A section is too large for its 32-bit length prefix.
    #[snafu(display("Snapshot {section} section of {len} bytes exceeds the container limit"))]
    TooLarge {
        /// Section being written.
        section: &'static str,
        /// Encoded length of the section.
        len: u64,
    },

    /// The store configuration is invalid.
    #[snafu(display("Invalid store configuration: {source}"))]
    Config {
        /// The underlying validation error.
        source: ConfigError,
    },
}

/// Result type for snapshot store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Returns `true` if the error means stored data is damaged rather than
    /// unreachable or misconfigured.
    pub fn is_corruption(&self) -> bool {
        match self {
            StoreError::Store { source } => source.is_corruption(),
            StoreError::Codec { .. } | StoreError::Truncated { .. } => true,
            StoreError::Io { .. } | StoreError::TooLarge { .. } | StoreError::Config { .. } => {
                false
            },
        }
    }
}
