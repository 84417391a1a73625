//! Fuzz target for decoding serialized temporal maps.
//!
//! Arbitrary bytes must never panic `TemporalMap::from_bytes`, and a map that
//! decodes must answer queries and re-serialize to an equivalent map.

#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use rewind_store::{DeltaCodec, SuffixDelta, TemporalMap, ZstdDelta};

fuzz_target!(|data: &[u8]| {
    let Some((selector, payload)) = data.split_first() else {
        return;
    };

    let codec: Arc<dyn DeltaCodec> = if selector % 2 == 0 {
        Arc::new(SuffixDelta::new())
    } else {
        Arc::new(ZstdDelta::new(1))
    };
    let max_chain_length = usize::from(selector >> 1).max(1);

    let Ok(map) = TemporalMap::from_bytes(payload, Arc::clone(&codec), max_chain_length) else {
        return;
    };

    // Corrupt deltas surface as errors on read, never as panics.
    if let Some(range) = map.time_range() {
        for key in map.keys() {
            let _ = map.get(&key, range.start);
            let _ = map.get(&key, range.end);
            let _ = map.history(&key);
        }
        let _ = map.state_at(range.end);
    }

    let bytes = map.to_bytes().expect("encode after successful decode");
    let again = TemporalMap::from_bytes(&bytes, codec, max_chain_length)
        .expect("re-decode after successful encode");
    assert_eq!(map.stats(), again.stats(), "stats changed across roundtrip");
    assert_eq!(map.time_range(), again.time_range(), "range changed across roundtrip");
});
