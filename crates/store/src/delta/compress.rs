//! zstd deltas using the base value as a raw-content dictionary.
//!
//! Compressing the target with the base loaded as dictionary content lets the
//! encoder reference any run of the base, so a mostly-unchanged object costs
//! a handful of bytes. An empty base, or one that happens to start with the
//! zstd dictionary magic (and would be parsed as a trained dictionary), falls
//! back to plain compression.

use rewind_types::DeltaAlgorithm;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use super::{DeltaCodec, open, seal, verify};
use crate::error::{CompressionSnafu, DeltaError};

/// Magic number opening a trained zstd dictionary (little-endian `0xEC30A437`).
const ZSTD_DICT_MAGIC: [u8; 4] = [0x37, 0xA4, 0x30, 0xEC];

#[derive(Debug, Serialize, Deserialize)]
struct ZstdBody {
    /// Whether `frame` was compressed with the base as dictionary.
    dictionary: bool,
    frame: Vec<u8>,
}

/// Compressing binary differ backed by zstd.
#[derive(Debug, Clone, Copy)]
pub struct ZstdDelta {
    level: i32,
}

impl ZstdDelta {
    /// Creates the codec with the given zstd compression level.
    pub fn new(level: i32) -> Self {
        Self { level }
    }

    /// Returns the configured compression level.
    pub fn level(&self) -> i32 {
        self.level
    }
}

impl Default for ZstdDelta {
    fn default() -> Self {
        Self::new(3)
    }
}

fn usable_as_dictionary(base: &[u8]) -> bool {
    !base.is_empty() && !base.starts_with(&ZSTD_DICT_MAGIC)
}

impl DeltaCodec for ZstdDelta {
    fn algorithm(&self) -> DeltaAlgorithm {
        DeltaAlgorithm::Zstd
    }

    fn diff(&self, base: &[u8], target: &[u8]) -> Result<Vec<u8>, DeltaError> {
        let dictionary = usable_as_dictionary(base);
        let frame = if dictionary {
            let mut compressor = zstd::bulk::Compressor::with_dictionary(self.level, base)
                .context(CompressionSnafu)?;
            compressor.compress(target).context(CompressionSnafu)?
        } else {
            zstd::bulk::compress(target, self.level).context(CompressionSnafu)?
        };
        seal(base, target, ZstdBody { dictionary, frame })
    }

    fn patch(&self, base: &[u8], delta: &[u8]) -> Result<Vec<u8>, DeltaError> {
        let envelope = open::<ZstdBody>(base, delta)?;
        let body = &envelope.body;
        if body.dictionary != usable_as_dictionary(base) {
            return Err(DeltaError::Corrupt {
                reason: "dictionary flag disagrees with the supplied base".to_string(),
            });
        }

        // `open` bounds target_len by MAX_TARGET_LEN, which fits in usize on supported targets.
        let capacity = usize::try_from(envelope.target_len).map_err(|_| DeltaError::Corrupt {
            reason: format!("target length {} overflows usize", envelope.target_len),
        })?;
        let decompressed = if body.dictionary {
            let mut decompressor =
                zstd::bulk::Decompressor::with_dictionary(base).context(CompressionSnafu)?;
            decompressor.decompress(&body.frame, capacity)
        } else {
            zstd::bulk::decompress(&body.frame, capacity)
        }
        .map_err(|e| DeltaError::Corrupt { reason: format!("zstd frame rejected: {e}") })?;

        verify(&envelope, decompressed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_dictionary_shrinks_similar_values() {
        let base: Vec<u8> =
            (0..4096u32).flat_map(|i| i.wrapping_mul(2_654_435_761).to_le_bytes()).collect();
        let mut target = base.clone();
        target[100..104].copy_from_slice(b"EDIT");

        let codec = ZstdDelta::default();
        let delta = codec.diff(&base, &target).expect("diff");
        let plain = zstd::bulk::compress(&target, 3).expect("compress");
        assert!(
            delta.len() < plain.len() / 4,
            "dictionary delta {} vs plain {}",
            delta.len(),
            plain.len()
        );
        assert_eq!(codec.patch(&base, &delta).expect("patch"), target);
    }

    #[test]
    fn test_base_with_dictionary_magic_falls_back_to_plain() {
        let mut base = ZSTD_DICT_MAGIC.to_vec();
        base.extend_from_slice(b"not really a dictionary");
        let target = b"not really a dictionary either".to_vec();

        let codec = ZstdDelta::new(1);
        let delta = codec.diff(&base, &target).expect("diff");
        assert_eq!(codec.patch(&base, &delta).expect("patch"), target);
    }

    #[test]
    fn test_level_is_kept() {
        assert_eq!(ZstdDelta::new(19).level(), 19);
        assert_eq!(ZstdDelta::default().level(), 3);
    }
}
