//! Fuzz target for the snapshot file container.
//!
//! Truncated or garbled snapshot files must be rejected with an error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use rewind_state::SnapshotStore;
use rewind_types::{ResourceFilter, ResourceRecord, StoreConfig};

fuzz_target!(|data: &[u8]| {
    let Ok(store) = SnapshotStore::<ResourceRecord>::from_bytes(data, StoreConfig::default())
    else {
        return;
    };

    if let Some(range) = store.time_range() {
        let _ = store.get_resources_at(range.end, &ResourceFilter::all());
        let _ = store.get_label(range.end);
        let _ = store.next_label_time(range.start);
        let _ = store.prev_label_time(range.end);
    }
});
