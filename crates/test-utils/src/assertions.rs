//! Assertions comparing temporal maps.

#![allow(clippy::expect_used)]

use rewind_store::TemporalMap;
use rewind_types::Timestamp;

/// Asserts that two maps report the same range and the same snapshot at every probe.
///
/// # Panics
///
/// Panics on the first disagreement, or if either map fails to replay.
pub fn assert_maps_agree(
    expected: &TemporalMap,
    actual: &TemporalMap,
    probes: impl IntoIterator<Item = Timestamp>,
) {
    assert_eq!(actual.time_range(), expected.time_range(), "time ranges differ");
    for probe in probes {
        let want = expected.state_at(probe).expect("replay expected map");
        let got = actual.state_at(probe).expect("replay actual map");
        assert_eq!(got, want, "snapshots differ at {probe}");
    }
}

/// Probe instants covering `[start, end]` in whole seconds, plus one second either side.
pub fn probe_seconds(start: i64, end: i64) -> impl Iterator<Item = Timestamp> {
    (start - 1..=end + 1).map(Timestamp::from_secs)
}
