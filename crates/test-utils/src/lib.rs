//! Shared test utilities for rewind crates.
//!
//! - [`TestDir`] - Managed temporary directory with snapshot path helpers
//! - [`strategies`] - Proptest generators for timestamps, values, and resources
//! - [`test_store_config`] - Store configuration with a short chain bound
//! - [`assert_maps_agree`] - Compare two temporal maps over a set of instants

#![deny(unsafe_code)]
// Test utilities are allowed to use unwrap for simplicity
#![cfg_attr(test, allow(clippy::disallowed_methods))]

mod test_dir;
pub use test_dir::TestDir;

mod assertions;
pub use assertions::{assert_maps_agree, probe_seconds};

mod config;
pub use config::{TEST_CHAIN_LENGTH, all_algorithms, test_store_config, test_store_config_with};

pub mod strategies;
