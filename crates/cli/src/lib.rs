//! Inspector for saved rewind snapshot files.
//!
//! The `rewind` binary loads a file written by
//! [`SnapshotStore::save`](rewind_state::SnapshotStore::save) and answers
//! point-in-time questions about it:
//!
//! ```bash
//! rewind range cluster.rwd
//! rewind list cluster.rwd --at 2024-05-01T12:00:00Z --kind po --namespace default
//! rewind get cluster.rwd pod/default/web --at 1714564800
//! rewind history cluster.rwd pod/default/web
//! rewind labels cluster.rwd --at 1714564800
//! rewind stats cluster.rwd
//!
//! # Settings must match the ones the file was written with
//! REWIND__STORE__DELTA_ALGORITHM=zstd rewind stats cluster.rwd
//! ```

#![deny(unsafe_code)]

pub mod commands;
pub mod config;
mod error;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
pub use error::{CliError, Result};
use rewind_types::{DeltaAlgorithm, Timestamp};

use crate::config::{LogFormat, Overrides};

/// Command-line interface of the `rewind` binary.
#[derive(Debug, Parser)]
#[command(name = "rewind")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// TOML config file (default: ./rewind.toml if present)
    #[arg(short, long, env = "REWIND_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, env = "REWIND_LOG_FORMAT", global = true)]
    pub log_format: Option<LogFormat>,

    /// Delta algorithm the snapshot was written with (suffix, zstd)
    #[arg(long, value_parser = config::parse_algorithm, global = true)]
    pub algorithm: Option<DeltaAlgorithm>,

    /// Diff-chain bound the snapshot was written with
    #[arg(long, global = true)]
    pub max_chain_length: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Flag values that override file and environment configuration.
    pub fn overrides(&self) -> Overrides {
        Overrides {
            log_format: self.log_format,
            delta_algorithm: self.algorithm,
            max_chain_length: self.max_chain_length,
        }
    }
}

/// `rewind` subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the first and last recorded instants
    Range {
        /// Snapshot file
        file: PathBuf,
    },
    /// List resources present at an instant
    List {
        /// Snapshot file
        file: PathBuf,
        #[command(flatten)]
        args: ListArgs,
    },
    /// Print one resource's payload at an instant
    Get {
        /// Snapshot file
        file: PathBuf,
        /// Resource id (`kind/namespace/name` or `kind/name`)
        id: String,
        /// Instant to read (RFC 3339 or unix seconds; default: end of range)
        #[arg(long)]
        at: Option<Timestamp>,
    },
    /// List every recorded change of one resource
    History {
        /// Snapshot file
        file: PathBuf,
        /// Resource id
        id: String,
    },
    /// List label bookmarks, or show the label around an instant
    Labels {
        /// Snapshot file
        file: PathBuf,
        #[command(flatten)]
        args: LabelArgs,
    },
    /// Print storage statistics
    Stats {
        /// Snapshot file
        file: PathBuf,
    },
    /// Configuration helpers
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Arguments of `rewind list`.
#[derive(Debug, Clone, Default, Args)]
pub struct ListArgs {
    /// Instant to list (RFC 3339 or unix seconds; default: end of range)
    #[arg(long)]
    pub at: Option<Timestamp>,
    /// Kind, plural, or short name (e.g. `po`)
    #[arg(short, long)]
    pub kind: Option<String>,
    /// Namespace (ignored for cluster-scoped kinds)
    #[arg(short, long)]
    pub namespace: Option<String>,
}

/// Arguments of `rewind labels`.
#[derive(Debug, Clone, Default, Args)]
pub struct LabelArgs {
    /// Show the label in effect at this instant and its neighbours
    #[arg(long)]
    pub at: Option<Timestamp>,
}

/// `rewind config` subcommands.
#[derive(Debug, Clone, Copy, Subcommand)]
pub enum ConfigAction {
    /// Print the JSON schema of the config file
    Schema,
    /// Print the effective configuration
    Show,
}
