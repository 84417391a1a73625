use rewind_state::StoreError;
use rewind_types::Timestamp;
use snafu::Snafu;

/// Errors reported by the `rewind` binary.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CliError {
    /// The configuration file or environment could not be read.
    #[snafu(display("failed to load config: {source}"))]
    LoadConfig {
        /// The underlying config crate error.
        source: config::ConfigError,
    },

    /// The merged configuration is out of range.
    #[snafu(display("{source}"))]
    InvalidConfig {
        /// The underlying validation error.
        source: rewind_types::ConfigError,
    },

    /// The snapshot file could not be opened or queried.
    #[snafu(display("{source}"))]
    Snapshot {
        /// The underlying store error.
        source: StoreError,
    },

    /// The requested resource does not exist at the requested time.
    #[snafu(display("{id} is not present at {at}"))]
    NotFound {
        /// Resource id that was looked up.
        id: String,
        /// Instant of the lookup.
        at: Timestamp,
    },

    /// Rendering JSON output failed.
    #[snafu(display("failed to render JSON: {source}"))]
    Render {
        /// The underlying serde_json error.
        source: serde_json::Error,
    },

    /// Writing to stdout failed.
    #[snafu(display("failed to write output: {source}"))]
    Output {
        /// The underlying IO error.
        source: std::io::Error,
    },
}

/// Result type for CLI commands.
pub type Result<T> = std::result::Result<T, CliError>;
