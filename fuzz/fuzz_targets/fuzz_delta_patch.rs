//! Fuzz target for the delta codecs.
//!
//! Arbitrary deltas applied to arbitrary bases must fail cleanly, and a delta
//! produced by `diff` must always patch back to its target.

#![no_main]

use libfuzzer_sys::fuzz_target;
use rewind_store::{DeltaCodec, SuffixDelta, ZstdDelta};

fuzz_target!(|data: &[u8]| {
    let [selector, split, rest @ ..] = data else {
        return;
    };

    let codec: Box<dyn DeltaCodec> = if selector % 2 == 0 {
        Box::new(SuffixDelta::new())
    } else {
        Box::new(ZstdDelta::new(1))
    };

    let at = usize::from(*split).min(rest.len());
    let (left, right) = rest.split_at(at);

    // Untrusted delta: any outcome but a panic is acceptable.
    let _ = codec.patch(left, right);

    // Trusted delta: the roundtrip must be exact.
    let delta = codec.diff(left, right).expect("diff of in-memory buffers");
    let patched = codec.patch(left, &delta).expect("patch of a fresh delta");
    assert_eq!(patched, right, "roundtrip mismatch");
});
