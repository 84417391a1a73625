//! Store configurations for tests.

use rewind_types::{DeltaAlgorithm, StoreConfig};

/// Chain bound used by tests that want keyframe splits to happen early.
pub const TEST_CHAIN_LENGTH: usize = 3;

/// Returns a configuration with a short chain bound so that few writes
/// exercise keyframe creation and splitting.
#[must_use]
pub fn test_store_config() -> StoreConfig {
    test_store_config_with(DeltaAlgorithm::Suffix)
}

/// Like [`test_store_config`] with the given delta algorithm.
#[must_use]
pub fn test_store_config_with(delta_algorithm: DeltaAlgorithm) -> StoreConfig {
    StoreConfig { max_chain_length: TEST_CHAIN_LENGTH, delta_algorithm, compression_level: 1 }
}

/// Both delta algorithms, for tests that run once per codec.
#[must_use]
pub fn all_algorithms() -> [DeltaAlgorithm; 2] {
    [DeltaAlgorithm::Suffix, DeltaAlgorithm::Zstd]
}
