//! rewind-store: in-memory temporal history of byte values.
//!
//! Every key keeps each version ever written to it, compressed as bounded
//! chains of binary deltas anchored at full snapshots ("keyframes"). Any
//! past instant can be reconstructed by replaying at most one chain.
//!
//! - **Any-order writes**: values may arrive for historical timestamps; later
//!   deltas in the affected chain are regenerated
//! - **Bounded replay**: chains never exceed `max_chain_length` frames
//! - **Pluggable deltas**: [`DeltaCodec`] with suffix-array and zstd implementations
//! - **Checked replay**: a delta applied to the wrong base fails instead of
//!   returning wrong bytes
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                TemporalMap                   │
//! │   (add, update, remove, get, state_at)      │
//! └────────────────┬────────────────────────────┘
//!                  │  one per key
//! ┌────────────────▼────────────────────────────┐
//! │              TimeValueStore                  │
//! │       (add_value, query_value, history)     │
//! └────────────────┬────────────────────────────┘
//!                  │  ordered
//! ┌────────────────▼────────────────────────────┐
//! │         Keyframe + DiffFrame chain           │
//! │     (insert, split, repair, replay)         │
//! └────────────────┬────────────────────────────┘
//!                  │
//! ┌────────────────▼────────────────────────────┐
//! │               DeltaCodec                     │
//! │         (SuffixDelta / ZstdDelta)           │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use rewind_store::TemporalMap;
//! use rewind_types::{StoreConfig, Timestamp};
//!
//! let map = TemporalMap::from_config(&StoreConfig::default());
//! map.add("pod/default/web-0", Timestamp::from_secs(100), b"Pending".to_vec())?;
//! map.add("pod/default/web-0", Timestamp::from_secs(200), b"Running".to_vec())?;
//!
//! let value = map.get("pod/default/web-0", Timestamp::from_secs(150))?;
//! assert_eq!(value.as_deref(), Some(&b"Pending"[..]));
//! # Ok::<(), rewind_store::Error>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod delta;
pub mod error;
pub mod frame;
pub mod temporal_map;
pub mod value_store;

pub use delta::{DeltaCodec, SuffixDelta, ZstdDelta, codec_for};
pub use error::{DeltaError, Error, Result};
pub use frame::{DiffFrame, FrameDelta, Keyframe, Version};
pub use temporal_map::{MapStats, TemporalMap};
pub use value_store::TimeValueStore;
