//! Snapshot store for rewind.
//!
//! This crate sits between the raw temporal history (`rewind-store`) and the
//! watchers and viewers that use it, providing:
//!
//! - Typed add/update/delete of [`Resource`](rewind_types::Resource) versions
//! - Point-in-time resource listings with kind and namespace filters
//! - Label bookmarks along the timeline with next/previous navigation
//! - Whole-store persistence as a two-blob container file
//! - An explicit [`KindRegistry`] for resolving user-typed kinds

#![deny(unsafe_code)]

mod container;
mod error;
mod kinds;
mod snapshot_store;

pub use error::{Result, StoreError};
pub use kinds::{KindDescriptor, KindRegistry};
pub use snapshot_store::{SnapshotStore, StoreStats};
