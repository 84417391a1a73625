//! Error types for the temporal store.

use std::io;

use rewind_types::{CodecError, DeltaAlgorithm};
use snafu::Snafu;

/// Result type alias for temporal map operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by a delta codec or by delta replay.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DeltaError {
    /// The delta is malformed or was not produced against the supplied base.
    ///
    /// Stored history depending on this delta cannot be reconstructed.
    #[snafu(display("Corrupt delta: {reason}"))]
    Corrupt {
        /// Description of what failed to verify.
        reason: String,
    },

    /// The compression backend failed while producing or reading a delta.
    #[snafu(display("Compression error: {source}"))]
    Compression {
        /// The underlying I/O error from the compressor.
        source: io::Error,
    },

    /// The delta envelope could not be encoded.
    #[snafu(display("Delta encoding failed: {source}"))]
    Envelope {
        /// The underlying codec error.
        source: CodecError,
    },
}

/// Errors that can occur during temporal map operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// Writing or replaying the history of `key` failed.
    #[snafu(display("History of key {key} is unreadable: {source}"))]
    History {
        /// The key whose history failed.
        key: String,
        /// The underlying delta error.
        source: DeltaError,
    },

    /// A serialized map could not be encoded or decoded.
    #[snafu(display("Map codec error: {source}"))]
    Codec {
        /// The underlying codec error.
        source: CodecError,
    },

    /// A serialized map was written with a different delta algorithm.
    #[snafu(display(
        "Serialized map uses delta algorithm id {found}, this map is configured for {expected}"
    ))]
    CodecMismatch {
        /// Algorithm of the map being loaded into.
        expected: DeltaAlgorithm,
        /// Algorithm id found in the serialized map.
        found: u8,
    },

    /// A serialized map holds chains longer than this map's bound allows.
    #[snafu(display(
        "Serialized map was written with chain bound {found}, this map is configured for {configured}"
    ))]
    ChainBoundMismatch {
        /// Chain bound of the map being loaded into.
        configured: usize,
        /// Chain bound recorded in the serialized map.
        found: u32,
    },

    /// Unsupported serialized map format version.
    #[snafu(display("Unsupported map format version: {version}"))]
    UnsupportedVersion {
        /// The unsupported version number.
        version: u16,
    },
}

impl Error {
    /// Returns `true` if the error means stored history is corrupt, as opposed
    /// to a configuration or format mismatch.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::History { source: DeltaError::Corrupt { .. }, .. })
    }
}
