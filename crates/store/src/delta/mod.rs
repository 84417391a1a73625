//! Pluggable binary delta primitive.
//!
//! A [`DeltaCodec`] turns a `(base, target)` pair into a delta and back, with
//! `patch(base, diff(base, target)) == target` for all byte strings including
//! empty ones. The store never assumes a delta is smaller than the raw target.
//!
//! Both codecs wrap their payload in a common envelope carrying XXH3-64 hashes
//! of the base and target. `patch` checks the base hash before decoding and the
//! target hash after, so a delta applied to the wrong base, or a damaged
//! delta, yields [`DeltaError::Corrupt`] rather than wrong bytes.

mod compress;
mod suffix;

use std::{fmt, sync::Arc};

pub use compress::ZstdDelta;
use rewind_types::{DeltaAlgorithm, StoreConfig, decode, encode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use snafu::ResultExt;
pub use suffix::SuffixDelta;

use crate::error::{DeltaError, EnvelopeSnafu};

/// Envelope format version.
const ENVELOPE_VERSION: u8 = 1;

/// Upper bound on a reconstructed value; larger claims are treated as corruption.
pub const MAX_TARGET_LEN: u64 = 256 * 1024 * 1024;

/// A reversible binary delta algorithm.
///
/// Implementations must be stateless with respect to calls: the store invokes
/// them from whichever thread holds the map lock.
pub trait DeltaCodec: Send + Sync + fmt::Debug {
    /// Identifies the algorithm in serialized maps.
    fn algorithm(&self) -> DeltaAlgorithm;

    /// Produces a delta that turns `base` into `target`.
    fn diff(&self, base: &[u8], target: &[u8]) -> Result<Vec<u8>, DeltaError>;

    /// Applies `delta` to `base`, returning the target it was produced from.
    ///
    /// # Errors
    ///
    /// Returns [`DeltaError::Corrupt`] if `delta` is malformed or was not
    /// produced against `base`.
    fn patch(&self, base: &[u8], delta: &[u8]) -> Result<Vec<u8>, DeltaError>;
}

/// Builds the delta codec selected by `config`.
pub fn codec_for(config: &StoreConfig) -> Arc<dyn DeltaCodec> {
    match config.delta_algorithm {
        DeltaAlgorithm::Suffix => Arc::new(SuffixDelta::new()),
        DeltaAlgorithm::Zstd => Arc::new(ZstdDelta::new(config.compression_level)),
    }
}

/// Common wrapper around an algorithm-specific delta body.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope<B> {
    version: u8,
    base_hash: u64,
    target_hash: u64,
    target_len: u64,
    body: B,
}

fn checksum(bytes: &[u8]) -> u64 {
    xxhash_rust::xxh3::xxh3_64(bytes)
}

/// Wraps `body` in an envelope describing `base` and `target`.
fn seal<B: Serialize>(base: &[u8], target: &[u8], body: B) -> Result<Vec<u8>, DeltaError> {
    let envelope = Envelope {
        version: ENVELOPE_VERSION,
        base_hash: checksum(base),
        target_hash: checksum(target),
        target_len: target.len() as u64,
        body,
    };
    encode(&envelope).context(EnvelopeSnafu)
}

/// Decodes an envelope and checks that it was sealed against `base`.
fn open<B: DeserializeOwned>(base: &[u8], delta: &[u8]) -> Result<Envelope<B>, DeltaError> {
    let envelope: Envelope<B> = decode(delta)
        .map_err(|e| DeltaError::Corrupt { reason: format!("malformed delta: {e}") })?;
    if envelope.version != ENVELOPE_VERSION {
        return Err(DeltaError::Corrupt {
            reason: format!("unknown delta envelope version {}", envelope.version),
        });
    }
    if envelope.base_hash != checksum(base) {
        return Err(DeltaError::Corrupt {
            reason: "delta was not produced against the supplied base".to_string(),
        });
    }
    if envelope.target_len > MAX_TARGET_LEN {
        return Err(DeltaError::Corrupt {
            reason: format!("delta claims a {}-byte target", envelope.target_len),
        });
    }
    Ok(envelope)
}

/// Checks a reconstructed target against the envelope it came from.
fn verify<B>(envelope: &Envelope<B>, target: Vec<u8>) -> Result<Vec<u8>, DeltaError> {
    if target.len() as u64 != envelope.target_len {
        return Err(DeltaError::Corrupt {
            reason: format!(
                "reconstructed {} bytes, expected {}",
                target.len(),
                envelope.target_len
            ),
        });
    }
    if checksum(&target) != envelope.target_hash {
        return Err(DeltaError::Corrupt {
            reason: "reconstructed value fails its checksum".to_string(),
        });
    }
    Ok(target)
}
