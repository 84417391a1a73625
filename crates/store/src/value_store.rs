//! Versioned history of a single key.

use rewind_types::Timestamp;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    delta::DeltaCodec,
    error::DeltaError,
    frame::{Insertion, Keyframe, Version},
};

/// Ordered keyframes holding every version ever written for one key.
///
/// Keyframes are strictly ordered by timestamp and every frame of keyframe
/// `i` precedes keyframe `i + 1`, so the keyframe covering an instant is
/// found by binary search and only its own chain is replayed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeValueStore {
    keyframes: Vec<Keyframe>,
}

impl TimeValueStore {
    /// Creates an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keyframes in timestamp order.
    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    /// Returns `true` if nothing was ever written.
    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    /// Records `value` as live from `timestamp` until the next existing write.
    ///
    /// Writes may arrive in any order; a write at an already-recorded
    /// timestamp replaces that version.
    ///
    /// # Errors
    ///
    /// Returns [`DeltaError`] if the affected chain cannot be reconstructed
    /// or re-encoded. The history is unchanged in that case.
    pub fn add_value(
        &mut self,
        timestamp: Timestamp,
        value: Version,
        max_chain_length: usize,
        codec: &dyn DeltaCodec,
    ) -> Result<(), DeltaError> {
        let index = self.keyframes.partition_point(|kf| kf.timestamp() <= timestamp);
        let Some(owner) = index.checked_sub(1) else {
            debug!(timestamp = %timestamp, "Created leading keyframe");
            self.keyframes.insert(0, Keyframe::new(timestamp, value));
            return Ok(());
        };

        match self.keyframes[owner].insert(timestamp, value, max_chain_length, codec)? {
            Insertion::Done => {},
            Insertion::Full(value) => {
                debug!(
                    timestamp = %timestamp,
                    keyframes = self.keyframes.len() + 1,
                    "Chain full, created keyframe"
                );
                self.keyframes.insert(index, Keyframe::new(timestamp, value));
            },
            Insertion::Split(next) => {
                debug!(
                    timestamp = %timestamp,
                    keyframes = self.keyframes.len() + 1,
                    "Split chain into new keyframe"
                );
                self.keyframes.insert(index, next);
            },
        }
        Ok(())
    }

    /// Returns the version live at `timestamp`.
    ///
    /// `None` means the key did not exist yet or was deleted.
    ///
    /// # Errors
    ///
    /// Returns [`DeltaError`] if a delta on the replay path is corrupt.
    pub fn query_value(
        &self,
        timestamp: Timestamp,
        codec: &dyn DeltaCodec,
    ) -> Result<Version, DeltaError> {
        let index = self.keyframes.partition_point(|kf| kf.timestamp() <= timestamp);
        match index.checked_sub(1) {
            Some(i) => self.keyframes[i].value_at(timestamp, codec),
            None => Ok(None),
        }
    }

    /// Every timestamp at which a version was written, ascending.
    pub fn change_times(&self) -> Vec<Timestamp> {
        self.keyframes
            .iter()
            .flat_map(|kf| {
                std::iter::once(kf.timestamp()).chain(kf.frames().iter().map(|f| f.timestamp()))
            })
            .collect()
    }

    /// Every recorded version with its timestamp, ascending.
    ///
    /// # Errors
    ///
    /// Returns [`DeltaError`] if any chain is corrupt.
    pub fn history(
        &self,
        codec: &dyn DeltaCodec,
    ) -> Result<Vec<(Timestamp, Version)>, DeltaError> {
        let mut out = Vec::new();
        for kf in &self.keyframes {
            out.push((kf.timestamp(), kf.base().map(<[u8]>::to_vec)));
            let times = kf.frames().iter().map(|f| f.timestamp());
            out.extend(times.zip(kf.versions(codec)?));
        }
        Ok(out)
    }

    /// Total number of diff frames across all keyframes.
    pub fn frame_count(&self) -> usize {
        self.keyframes.iter().map(|kf| kf.frames().len()).sum()
    }

    /// Checks ordering invariants of a history read from untrusted bytes.
    pub(crate) fn check_order(&self, max_chain_length: usize) -> Result<(), String> {
        for pair in self.keyframes.windows(2) {
            if pair[1].timestamp() <= pair[0].last_timestamp() {
                return Err(format!(
                    "keyframe at {} overlaps the chain ending at {}",
                    pair[1].timestamp(),
                    pair[0].last_timestamp()
                ));
            }
        }
        self.keyframes.iter().try_for_each(|kf| kf.check_order(max_chain_length))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use std::collections::BTreeMap;

    use proptest::prelude::*;

    use super::*;
    use crate::delta::{SuffixDelta, ZstdDelta};

    fn ts(secs: i64) -> Timestamp {
        Timestamp::from_secs(secs)
    }

    fn v(s: &str) -> Version {
        Some(s.as_bytes().to_vec())
    }

    fn phase(p: &str) -> Version {
        v(&format!(r#"{{"metadata":{{"name":"a","namespace":"default"}},"phase":"{p}"}}"#))
    }

    #[test]
    fn test_query_before_first_write_is_absent() {
        let codec = SuffixDelta::new();
        let mut store = TimeValueStore::new();
        assert_eq!(store.query_value(ts(5), &codec).unwrap(), None);

        store.add_value(ts(10), v("x"), 10, &codec).unwrap();
        assert_eq!(store.query_value(ts(9), &codec).unwrap(), None);
        assert_eq!(store.query_value(ts(10), &codec).unwrap(), v("x"));
    }

    #[test]
    fn test_increasing_writes_roundtrip() {
        let codec = SuffixDelta::new();
        let mut store = TimeValueStore::new();
        for i in 0..25 {
            store.add_value(ts(i * 10), v(&format!("value-{i}")), 10, &codec).unwrap();
        }
        for i in 0..25 {
            assert_eq!(store.query_value(ts(i * 10), &codec).unwrap(), v(&format!("value-{i}")));
            assert_eq!(
                store.query_value(ts(i * 10 + 9), &codec).unwrap(),
                v(&format!("value-{i}"))
            );
        }
    }

    #[test]
    fn test_out_of_order_pod_phases() {
        let codec = SuffixDelta::new();
        let mut store = TimeValueStore::new();
        store.add_value(ts(100), phase("Pending"), 10, &codec).unwrap();
        store.add_value(ts(200), phase("Running"), 10, &codec).unwrap();
        store.add_value(ts(150), phase("ContainerCreating"), 10, &codec).unwrap();

        assert_eq!(store.query_value(ts(120), &codec).unwrap(), phase("Pending"));
        assert_eq!(store.query_value(ts(160), &codec).unwrap(), phase("ContainerCreating"));
        assert_eq!(store.query_value(ts(250), &codec).unwrap(), phase("Running"));
    }

    #[test]
    fn test_middle_insert_leaves_neighbours_alone() {
        let codec = ZstdDelta::default();
        let mut store = TimeValueStore::new();
        store.add_value(ts(10), v("first"), 10, &codec).unwrap();
        store.add_value(ts(30), v("third"), 10, &codec).unwrap();
        store.add_value(ts(20), v("second"), 10, &codec).unwrap();

        assert_eq!(store.query_value(ts(10), &codec).unwrap(), v("first"));
        assert_eq!(store.query_value(ts(19), &codec).unwrap(), v("first"));
        assert_eq!(store.query_value(ts(20), &codec).unwrap(), v("second"));
        assert_eq!(store.query_value(ts(30), &codec).unwrap(), v("third"));
    }

    #[test]
    fn test_fifteen_writes_a_second_apart_span_keyframes() {
        let codec = SuffixDelta::new();
        let mut store = TimeValueStore::new();
        for i in 0..15 {
            store.add_value(ts(1_000 + i), phase(&format!("step-{i}")), 10, &codec).unwrap();
        }

        assert!(store.keyframes().len() >= 2, "chain bound should force a second keyframe");
        assert!(store.keyframes().iter().all(|kf| kf.frames().len() <= 10));
        for i in 0..15 {
            assert_eq!(
                store.query_value(ts(1_000 + i), &codec).unwrap(),
                phase(&format!("step-{i}"))
            );
        }
    }

    #[test]
    fn test_tombstone_hides_value_until_next_write() {
        let codec = SuffixDelta::new();
        let mut store = TimeValueStore::new();
        store.add_value(ts(10), v("alive"), 10, &codec).unwrap();
        store.add_value(ts(20), None, 10, &codec).unwrap();
        store.add_value(ts(30), v("recreated"), 10, &codec).unwrap();

        assert_eq!(store.query_value(ts(15), &codec).unwrap(), v("alive"));
        assert_eq!(store.query_value(ts(20), &codec).unwrap(), None);
        assert_eq!(store.query_value(ts(29), &codec).unwrap(), None);
        assert_eq!(store.query_value(ts(30), &codec).unwrap(), v("recreated"));
    }

    #[test]
    fn test_write_before_first_keyframe() {
        let codec = SuffixDelta::new();
        let mut store = TimeValueStore::new();
        store.add_value(ts(50), v("later"), 10, &codec).unwrap();
        store.add_value(ts(10), v("earlier"), 10, &codec).unwrap();

        assert_eq!(store.keyframes().len(), 2);
        assert_eq!(store.query_value(ts(49), &codec).unwrap(), v("earlier"));
        assert_eq!(store.query_value(ts(50), &codec).unwrap(), v("later"));
        assert_eq!(store.change_times(), vec![ts(10), ts(50)]);
    }

    #[test]
    fn test_history_lists_every_version() {
        let codec = SuffixDelta::new();
        let mut store = TimeValueStore::new();
        for (secs, value) in [(1, v("a")), (3, None), (2, v("b")), (4, v("c"))] {
            store.add_value(ts(secs), value, 2, &codec).unwrap();
        }

        let history = store.history(&codec).unwrap();
        assert_eq!(
            history,
            vec![(ts(1), v("a")), (ts(2), v("b")), (ts(3), None), (ts(4), v("c"))]
        );
        assert_eq!(store.change_times(), vec![ts(1), ts(2), ts(3), ts(4)]);
    }

    fn arb_version() -> impl Strategy<Value = Version> {
        proptest::option::weighted(0.85, proptest::collection::vec(any::<u8>(), 0..24))
    }

    proptest! {
        /// Random-order writes with a tiny chain bound answer every query like a
        /// "last write at or before T" oracle.
        #[test]
        fn prop_matches_last_write_oracle(
            writes in proptest::collection::vec((0i64..60, arb_version()), 1..60),
            bound in 1usize..5,
        ) {
            let codec = SuffixDelta::new();
            let mut store = TimeValueStore::new();
            let mut oracle: BTreeMap<i64, Version> = BTreeMap::new();

            for (secs, value) in writes {
                store.add_value(ts(secs), value.clone(), bound, &codec).expect("add");
                oracle.insert(secs, value);
            }

            prop_assert!(store.check_order(bound).is_ok());
            for probe in -1..=61 {
                let expected = oracle.range(..=probe).next_back().and_then(|(_, v)| v.clone());
                prop_assert_eq!(store.query_value(ts(probe), &codec).expect("query"), expected);
            }
            let times: Vec<Timestamp> = oracle.keys().map(|s| ts(*s)).collect();
            prop_assert_eq!(store.change_times(), times);
        }
    }
}
