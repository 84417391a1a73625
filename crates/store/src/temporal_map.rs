//! Thread-safe collection of per-key histories.
//!
//! A [`TemporalMap`] keeps one [`TimeValueStore`] per key together with the
//! span of every timestamp ever written. All operations take one coarse
//! lock for their full duration, so a snapshot query never observes half of
//! a diff-chain repair.
//!
//! # Serialized form
//!
//! ```text
//! ┌────────────────────────────┐
//! │ header: version, algorithm │  postcard
//! │         chain bound        │
//! ├────────────────────────────┤
//! │ body: range, items         │  postcard
//! └────────────────────────────┘
//! ```
//!
//! The header is decoded first so that a blob from another format version,
//! delta algorithm, or a larger chain bound is rejected before its body is
//! interpreted. Chains written under a smaller bound load unchanged.

use std::{collections::BTreeMap, sync::Arc};

use parking_lot::Mutex;
use rewind_types::{StoreConfig, TimeRange, Timestamp, decode, decode_prefix, encode};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, ensure};

use crate::{
    delta::{DeltaCodec, codec_for},
    error::{
        ChainBoundMismatchSnafu, CodecMismatchSnafu, CodecSnafu, DeltaError, Error, HistorySnafu, Result,
        UnsupportedVersionSnafu,
    },
    frame::Version,
    value_store::TimeValueStore,
};

/// Current serialized map format.
const MAP_FORMAT_VERSION: u16 = 2;

#[derive(Debug, Serialize, Deserialize)]
struct MapHeader {
    version: u16,
    algorithm: u8,
    max_chain_length: u32,
}

#[derive(Serialize)]
struct MapBodyRef<'a> {
    range: Option<TimeRange>,
    items: &'a BTreeMap<String, TimeValueStore>,
}

#[derive(Deserialize)]
struct MapBody {
    range: Option<TimeRange>,
    items: BTreeMap<String, TimeValueStore>,
}

#[derive(Debug, Default)]
struct MapState {
    range: Option<TimeRange>,
    items: BTreeMap<String, TimeValueStore>,
}

impl MapState {
    fn touch(&mut self, timestamp: Timestamp) {
        match &mut self.range {
            Some(range) => range.extend(timestamp),
            None => self.range = Some(TimeRange::at(timestamp)),
        }
    }
}

/// Storage statistics for a [`TemporalMap`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapStats {
    /// Number of keys ever written.
    pub keys: u64,
    /// Keyframes across all keys.
    pub keyframes: u64,
    /// Diff frames across all keys.
    pub diff_frames: u64,
    /// Bytes held in keyframe base values.
    pub base_bytes: u64,
    /// Bytes held in deltas.
    pub delta_bytes: u64,
}

/// Key → history map with global time-range tracking.
#[derive(Debug)]
pub struct TemporalMap {
    codec: Arc<dyn DeltaCodec>,
    max_chain_length: usize,
    state: Mutex<MapState>,
}

impl TemporalMap {
    /// Creates an empty map using `codec` and chains of at most `max_chain_length` frames.
    ///
    /// A bound of zero is treated as one.
    pub fn new(codec: Arc<dyn DeltaCodec>, max_chain_length: usize) -> Self {
        Self { codec, max_chain_length: max_chain_length.max(1), state: Mutex::default() }
    }

    /// Creates an empty map from a validated configuration.
    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(codec_for(config), config.max_chain_length)
    }

    /// The delta codec used for diff frames.
    pub fn codec(&self) -> &Arc<dyn DeltaCodec> {
        &self.codec
    }

    /// The diff-chain bound.
    pub fn max_chain_length(&self) -> usize {
        self.max_chain_length
    }

    /// Records `value` for `key` from `timestamp` onward, creating the key if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::History`] if the key's existing history cannot be rebuilt.
    pub fn add(&self, key: &str, timestamp: Timestamp, value: Vec<u8>) -> Result<()> {
        self.write(key, timestamp, Some(value))
    }

    /// Records `value` for `key` only if the key holds a live value at `timestamp`.
    ///
    /// Returns `false` (and writes nothing) when the key was never written, is
    /// first written after `timestamp`, or is deleted at `timestamp`. The time
    /// range is extended either way.
    ///
    /// # Errors
    ///
    /// Returns [`Error::History`] if the key's history cannot be read or rebuilt.
    pub fn update(&self, key: &str, timestamp: Timestamp, value: Vec<u8>) -> Result<bool> {
        let mut state = self.state.lock();
        state.touch(timestamp);
        let Some(store) = state.items.get_mut(key) else {
            return Ok(false);
        };
        let codec = self.codec.as_ref();
        let live = store.query_value(timestamp, codec).context(HistorySnafu { key })?.is_some();
        if live {
            store
                .add_value(timestamp, Some(value), self.max_chain_length, codec)
                .context(HistorySnafu { key })?;
        }
        Ok(live)
    }

    /// Records a deletion of `key` at `timestamp`, whether or not it existed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::History`] if the key's existing history cannot be rebuilt.
    pub fn remove(&self, key: &str, timestamp: Timestamp) -> Result<()> {
        self.write(key, timestamp, None)
    }

    fn write(&self, key: &str, timestamp: Timestamp, value: Version) -> Result<()> {
        let mut state = self.state.lock();
        state.touch(timestamp);
        state
            .items
            .entry(key.to_string())
            .or_default()
            .add_value(timestamp, value, self.max_chain_length, self.codec.as_ref())
            .context(HistorySnafu { key })
    }

    /// Returns the value of `key` at `timestamp`, `None` if absent or deleted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::History`] if replay hits a corrupt delta.
    pub fn get(&self, key: &str, timestamp: Timestamp) -> Result<Option<Vec<u8>>> {
        let state = self.state.lock();
        match state.items.get(key) {
            Some(store) => {
                store.query_value(timestamp, self.codec.as_ref()).context(HistorySnafu { key })
            },
            None => Ok(None),
        }
    }

    /// Returns every key with a live value at `timestamp`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::History`] for the first key whose replay fails; no
    /// partial snapshot is returned.
    pub fn state_at(&self, timestamp: Timestamp) -> Result<BTreeMap<String, Vec<u8>>> {
        let state = self.state.lock();
        let mut out = BTreeMap::new();
        for (key, store) in &state.items {
            let value =
                store.query_value(timestamp, self.codec.as_ref()).context(HistorySnafu { key })?;
            if let Some(value) = value {
                out.insert(key.clone(), value);
            }
        }
        Ok(out)
    }

    /// Earliest and latest timestamps ever written, `None` for a fresh map.
    pub fn time_range(&self) -> Option<TimeRange> {
        self.state.lock().range
    }

    /// Every recorded version of `key`, ascending. Empty for unknown keys.
    ///
    /// # Errors
    ///
    /// Returns [`Error::History`] if any chain of the key is corrupt.
    pub fn history(&self, key: &str) -> Result<Vec<(Timestamp, Option<Vec<u8>>)>> {
        let state = self.state.lock();
        match state.items.get(key) {
            Some(store) => store.history(self.codec.as_ref()).context(HistorySnafu { key }),
            None => Ok(Vec::new()),
        }
    }

    /// Timestamps at which `key` was written, ascending.
    pub fn change_times(&self, key: &str) -> Vec<Timestamp> {
        self.state.lock().items.get(key).map(TimeValueStore::change_times).unwrap_or_default()
    }

    /// All keys ever written, including deleted ones, in order.
    pub fn keys(&self) -> Vec<String> {
        self.state.lock().items.keys().cloned().collect()
    }

    /// Returns `true` if `key` was ever written.
    pub fn contains_key(&self, key: &str) -> bool {
        self.state.lock().items.contains_key(key)
    }

    /// Number of keys ever written.
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Returns `true` if no key was ever written.
    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    /// Returns storage statistics.
    pub fn stats(&self) -> MapStats {
        let state = self.state.lock();
        let mut stats = MapStats { keys: state.items.len() as u64, ..MapStats::default() };
        for store in state.items.values() {
            stats.keyframes += store.keyframes().len() as u64;
            stats.diff_frames += store.frame_count() as u64;
            for kf in store.keyframes() {
                let (base, deltas) = kf.stored_bytes();
                stats.base_bytes += base as u64;
                stats.delta_bytes += deltas as u64;
            }
        }
        stats
    }

    /// Serializes the whole map, including the time range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codec`] if encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let state = self.state.lock();
        let header = MapHeader {
            version: MAP_FORMAT_VERSION,
            algorithm: self.codec.algorithm().id(),
            max_chain_length: u32::try_from(self.max_chain_length).unwrap_or(u32::MAX),
        };
        let mut bytes = encode(&header).context(CodecSnafu)?;
        let body = MapBodyRef { range: state.range, items: &state.items };
        bytes.extend_from_slice(&encode(&body).context(CodecSnafu)?);
        Ok(bytes)
    }

    /// Rebuilds a map serialized by [`TemporalMap::to_bytes`].
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedVersion`] for an unknown format version
    /// - [`Error::CodecMismatch`] if the blob was written with another delta algorithm
    /// - [`Error::ChainBoundMismatch`] if the blob was written with a larger chain bound
    /// - [`Error::Codec`] if the blob cannot be decoded
    /// - [`Error::History`] if a key's keyframes violate ordering or the chain bound
    pub fn from_bytes(
        bytes: &[u8],
        codec: Arc<dyn DeltaCodec>,
        max_chain_length: usize,
    ) -> Result<Self> {
        let (header, rest): (MapHeader, _) = decode_prefix(bytes).context(CodecSnafu)?;
        ensure!(
            header.version == MAP_FORMAT_VERSION,
            UnsupportedVersionSnafu { version: header.version }
        );
        let expected = codec.algorithm();
        ensure!(
            header.algorithm == expected.id(),
            CodecMismatchSnafu { expected, found: header.algorithm }
        );

        let map = Self::new(codec, max_chain_length);
        let written_bound = usize::try_from(header.max_chain_length).unwrap_or(usize::MAX);
        ensure!(
            written_bound <= map.max_chain_length,
            ChainBoundMismatchSnafu {
                configured: map.max_chain_length,
                found: header.max_chain_length,
            }
        );

        let body: MapBody = decode(rest).context(CodecSnafu)?;
        for (key, store) in &body.items {
            store.check_order(map.max_chain_length).map_err(|reason| Error::History {
                key: key.clone(),
                source: DeltaError::Corrupt { reason },
            })?;
        }

        *map.state.lock() = MapState { range: body.range, items: body.items };
        Ok(map)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use std::thread;

    use proptest::prelude::*;
    use rewind_types::DeltaAlgorithm;

    use super::*;
    use crate::delta::{SuffixDelta, ZstdDelta};

    fn ts(secs: i64) -> Timestamp {
        Timestamp::from_secs(secs)
    }

    fn map() -> TemporalMap {
        TemporalMap::new(Arc::new(SuffixDelta::new()), 10)
    }

    #[test]
    fn test_add_get_and_state_at() {
        let map = map();
        map.add("pod/default/a", ts(100), b"pending".to_vec()).unwrap();
        map.add("pod/default/b", ts(150), b"running".to_vec()).unwrap();

        assert_eq!(map.get("pod/default/a", ts(99)).unwrap(), None);
        assert_eq!(map.get("pod/default/a", ts(120)).unwrap(), Some(b"pending".to_vec()));
        assert_eq!(map.get("missing", ts(120)).unwrap(), None);

        let at_120 = map.state_at(ts(120)).unwrap();
        assert_eq!(at_120.keys().collect::<Vec<_>>(), vec!["pod/default/a"]);
        assert_eq!(map.state_at(ts(200)).unwrap().len(), 2);
        assert_eq!(map.time_range(), Some(TimeRange { start: ts(100), end: ts(150) }));
    }

    #[test]
    fn test_update_requires_live_value() {
        let map = map();
        assert!(!map.update("pod/default/a", ts(50), b"orphan".to_vec()).unwrap());
        assert!(!map.contains_key("pod/default/a"));

        map.add("pod/default/a", ts(100), b"v1".to_vec()).unwrap();
        assert!(!map.update("pod/default/a", ts(90), b"too early".to_vec()).unwrap());
        assert!(map.update("pod/default/a", ts(200), b"v2".to_vec()).unwrap());

        map.remove("pod/default/a", ts(300)).unwrap();
        assert!(!map.update("pod/default/a", ts(310), b"after delete".to_vec()).unwrap());

        assert_eq!(map.get("pod/default/a", ts(95)).unwrap(), None);
        assert_eq!(map.get("pod/default/a", ts(250)).unwrap(), Some(b"v2".to_vec()));
        assert_eq!(map.get("pod/default/a", ts(400)).unwrap(), None);
        // No-op updates still widen the range.
        assert_eq!(map.time_range(), Some(TimeRange { start: ts(50), end: ts(310) }));
    }

    #[test]
    fn test_remove_unknown_key_records_tombstone() {
        let map = map();
        map.remove("node/n1", ts(10)).unwrap();
        assert!(map.contains_key("node/n1"));
        assert!(map.state_at(ts(10)).unwrap().is_empty());
        assert_eq!(map.history("node/n1").unwrap(), vec![(ts(10), None)]);
    }

    #[test]
    fn test_tombstone_only_affects_later_queries() {
        let map = map();
        map.add("k", ts(10), b"v".to_vec()).unwrap();
        map.add("k", ts(30), b"w".to_vec()).unwrap();
        map.remove("k", ts(20)).unwrap();

        assert_eq!(map.get("k", ts(15)).unwrap(), Some(b"v".to_vec()));
        assert_eq!(map.get("k", ts(25)).unwrap(), None);
        assert_eq!(map.get("k", ts(30)).unwrap(), Some(b"w".to_vec()));
        assert_eq!(map.change_times("k"), vec![ts(10), ts(20), ts(30)]);
    }

    #[test]
    fn test_serialization_preserves_queries() {
        let map = map();
        for i in 0..30 {
            let key = format!("pod/default/p{}", i % 4);
            map.add(&key, ts(i * 7 % 50), format!("value {i}").into_bytes()).unwrap();
            if i % 9 == 0 {
                map.remove(&key, ts(i * 3 + 1)).unwrap();
            }
        }

        let bytes = map.to_bytes().unwrap();
        let restored = TemporalMap::from_bytes(&bytes, Arc::new(SuffixDelta::new()), 10).unwrap();

        assert_eq!(restored.time_range(), map.time_range());
        assert_eq!(restored.keys(), map.keys());
        for t in -1..60 {
            assert_eq!(restored.state_at(ts(t)).unwrap(), map.state_at(ts(t)).unwrap(), "t={t}");
        }
    }

    #[test]
    fn test_empty_map_roundtrip() {
        let bytes = map().to_bytes().unwrap();
        let restored = TemporalMap::from_bytes(&bytes, Arc::new(SuffixDelta::new()), 10).unwrap();
        assert!(restored.is_empty());
        assert_eq!(restored.time_range(), None);
    }

    #[test]
    fn test_from_bytes_rejects_other_algorithm() {
        let map = map();
        map.add("k", ts(1), b"v".to_vec()).unwrap();
        let bytes = map.to_bytes().unwrap();

        let err = TemporalMap::from_bytes(&bytes, Arc::new(ZstdDelta::default()), 10).unwrap_err();
        assert!(
            matches!(err, Error::CodecMismatch { expected: DeltaAlgorithm::Zstd, found: 1 }),
            "{err}"
        );
    }

    #[test]
    fn test_from_bytes_rejects_unknown_version() {
        let mut bytes =
            encode(&MapHeader { version: 99, algorithm: 1, max_chain_length: 10 }).unwrap();
        bytes.extend_from_slice(&[0, 0]);
        let err = TemporalMap::from_bytes(&bytes, Arc::new(SuffixDelta::new()), 10).unwrap_err();
        assert!(matches!(err, Error::UnsupportedVersion { version: 99 }));
    }

    #[test]
    fn test_larger_written_bound_is_a_mismatch() {
        let map = TemporalMap::new(Arc::new(SuffixDelta::new()), 16);
        for i in 0..14 {
            map.add("pod/default/a", ts(i), vec![i as u8; 4]).unwrap();
        }
        let bytes = map.to_bytes().unwrap();

        let err = TemporalMap::from_bytes(&bytes, Arc::new(SuffixDelta::new()), 10).unwrap_err();
        assert!(
            matches!(err, Error::ChainBoundMismatch { configured: 10, found: 16 }),
            "{err}"
        );
        assert!(!err.is_corruption(), "{err}");

        // Same data under an equal or larger bound loads.
        for bound in [16, 32] {
            let restored =
                TemporalMap::from_bytes(&bytes, Arc::new(SuffixDelta::new()), bound).unwrap();
            let expected = map.history("pod/default/a").unwrap();
            assert_eq!(restored.history("pod/default/a").unwrap(), expected);
        }
    }

    #[test]
    fn test_smaller_written_bound_loads() {
        let map = TemporalMap::new(Arc::new(SuffixDelta::new()), 3);
        for i in 0..8 {
            map.add("k", ts(i), vec![i as u8; 4]).unwrap();
        }
        let restored =
            TemporalMap::from_bytes(&map.to_bytes().unwrap(), Arc::new(SuffixDelta::new()), 10)
                .unwrap();
        assert_eq!(restored.state_at(ts(7)).unwrap(), map.state_at(ts(7)).unwrap());
    }

    #[test]
    fn test_chain_over_recorded_bound_is_corruption() {
        let map = map();
        for i in 0..8 {
            map.add("k", ts(i), vec![i as u8; 4]).unwrap();
        }
        let bytes = map.to_bytes().unwrap();
        let (_, body): (MapHeader, _) = decode_prefix(&bytes).unwrap();

        // A header claiming bound 3 in front of chains of seven frames.
        let mut forged = encode(&MapHeader {
            version: MAP_FORMAT_VERSION,
            algorithm: DeltaAlgorithm::Suffix.id(),
            max_chain_length: 3,
        })
        .unwrap();
        forged.extend_from_slice(body);

        let err = TemporalMap::from_bytes(&forged, Arc::new(SuffixDelta::new()), 3).unwrap_err();
        assert!(err.is_corruption(), "{err}");
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        let err = TemporalMap::from_bytes(&[0xFF; 3], Arc::new(SuffixDelta::new()), 10);
        assert!(err.is_err());
    }

    #[test]
    fn test_stats_count_frames() {
        let map = TemporalMap::new(Arc::new(SuffixDelta::new()), 2);
        for i in 0..5 {
            map.add("a", ts(i), format!("version {i}").into_bytes()).unwrap();
        }
        map.add("b", ts(0), b"solo".to_vec()).unwrap();

        let stats = map.stats();
        assert_eq!(stats.keys, 2);
        // "a": keyframes at 0 and 3, frames at 1, 2 and 4.
        assert_eq!(stats.keyframes, 3);
        assert_eq!(stats.diff_frames, 3);
        assert!(stats.base_bytes >= 4);
    }

    #[test]
    fn test_concurrent_writers_and_reader() {
        let map = TemporalMap::from_config(&StoreConfig::default());
        thread::scope(|scope| {
            for writer in 0..4 {
                let map = &map;
                scope.spawn(move || {
                    for i in 0..50 {
                        let key = format!("pod/ns{writer}/p{}", i % 5);
                        map.add(&key, ts(i), format!("{writer}:{i}").into_bytes()).unwrap();
                    }
                });
            }
            let map = &map;
            scope.spawn(move || {
                for _ in 0..50 {
                    let snapshot = map.state_at(ts(25)).unwrap();
                    assert!(snapshot.len() <= 20);
                }
            });
        });

        assert_eq!(map.len(), 20);
        assert_eq!(map.get("pod/ns3/p4", ts(49)).unwrap(), Some(b"3:49".to_vec()));
        assert_eq!(map.time_range(), Some(TimeRange { start: ts(0), end: ts(49) }));
    }

    proptest! {
        /// The range only ever widens, whatever order writes arrive in.
        #[test]
        fn prop_range_is_monotone(times in proptest::collection::vec(-1_000i64..1_000, 1..40)) {
            let map = map();
            let mut previous: Option<TimeRange> = None;
            for (i, t) in times.iter().enumerate() {
                match i % 3 {
                    0 => map.add("k", ts(*t), vec![1, 2, 3]).unwrap(),
                    1 => { map.update("k", ts(*t), vec![4]).unwrap(); },
                    _ => map.remove("j", ts(*t)).unwrap(),
                }
                let range = map.time_range().expect("range after a write");
                if let Some(prev) = previous {
                    prop_assert!(range.start <= prev.start);
                    prop_assert!(range.end >= prev.end);
                }
                prop_assert!(range.contains(ts(*t)));
                previous = Some(range);
            }
        }
    }
}
