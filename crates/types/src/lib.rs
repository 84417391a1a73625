//! Core types, configuration, and codec for rewind.
//!
//! This crate provides the foundational pieces shared by the store, the
//! snapshot DAO, and the CLI:
//! - [`Timestamp`] and [`TimeRange`] for the recorded timeline
//! - The [`Resource`] contract and the generic [`ResourceRecord`]
//! - Store configuration ([`config::StoreConfig`])
//! - Postcard encoding helpers ([`codec`])

#![deny(unsafe_code)]

pub mod codec;
pub mod config;
pub mod types;

pub use codec::{CodecError, decode, decode_prefix, encode};
pub use config::{ConfigError, DeltaAlgorithm, StoreConfig};
pub use types::*;
