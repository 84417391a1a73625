//! Copy/insert deltas driven by a suffix array of the base.
//!
//! The differ walks the target left to right. At each position it finds the
//! longest prefix of the remaining target that occurs anywhere in the base by
//! binary-searching the base's suffix array; matches of at least
//! [`MIN_MATCH`] bytes become `Copy` ops, everything else is gathered into
//! `Insert` literals.

use rewind_types::DeltaAlgorithm;
use serde::{Deserialize, Serialize};

use super::{DeltaCodec, open, seal, verify};
use crate::error::DeltaError;

/// Shortest match worth encoding as a copy instead of literal bytes.
const MIN_MATCH: usize = 8;

/// One reconstruction step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
enum DeltaOp {
    /// Append `len` bytes of the base starting at `offset`.
    Copy { offset: u64, len: u64 },
    /// Append literal bytes.
    Insert(Vec<u8>),
}

/// Longest-match copy/insert delta codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct SuffixDelta;

impl SuffixDelta {
    /// Creates the codec.
    pub fn new() -> Self {
        Self
    }
}

impl DeltaCodec for SuffixDelta {
    fn algorithm(&self) -> DeltaAlgorithm {
        DeltaAlgorithm::Suffix
    }

    fn diff(&self, base: &[u8], target: &[u8]) -> Result<Vec<u8>, DeltaError> {
        seal(base, target, compute_ops(base, target))
    }

    fn patch(&self, base: &[u8], delta: &[u8]) -> Result<Vec<u8>, DeltaError> {
        let envelope = open::<Vec<DeltaOp>>(base, delta)?;
        let mut out = Vec::new();

        for op in &envelope.body {
            match op {
                DeltaOp::Copy { offset, len } => {
                    let range = usize::try_from(*offset)
                        .ok()
                        .zip(usize::try_from(*len).ok())
                        .and_then(|(start, len)| Some(start..start.checked_add(len)?))
                        .filter(|range| range.end <= base.len())
                        .ok_or_else(|| DeltaError::Corrupt {
                            reason: format!(
                                "copy of {len} bytes at {offset} exceeds {}-byte base",
                                base.len()
                            ),
                        })?;
                    out.extend_from_slice(&base[range]);
                },
                DeltaOp::Insert(bytes) => out.extend_from_slice(bytes),
            }
            if out.len() as u64 > envelope.target_len {
                return Err(DeltaError::Corrupt {
                    reason: "delta overruns its declared target length".to_string(),
                });
            }
        }

        verify(&envelope, out)
    }
}

fn compute_ops(base: &[u8], target: &[u8]) -> Vec<DeltaOp> {
    let sa = suffix_array(base);
    let mut ops = Vec::new();
    let mut literal = Vec::new();
    let mut pos = 0;

    while pos < target.len() {
        let (offset, len) = longest_match(base, &sa, &target[pos..]);
        if len >= MIN_MATCH {
            if !literal.is_empty() {
                ops.push(DeltaOp::Insert(std::mem::take(&mut literal)));
            }
            ops.push(DeltaOp::Copy { offset: offset as u64, len: len as u64 });
            pos += len;
        } else {
            literal.push(target[pos]);
            pos += 1;
        }
    }
    if !literal.is_empty() {
        ops.push(DeltaOp::Insert(literal));
    }
    ops
}

/// Builds the suffix array of `data` by prefix doubling.
fn suffix_array(data: &[u8]) -> Vec<usize> {
    let n = data.len();
    let mut sa: Vec<usize> = (0..n).collect();
    if n == 0 {
        return sa;
    }

    let mut rank: Vec<usize> = data.iter().map(|&b| usize::from(b)).collect();
    let mut next = vec![0usize; n];
    let mut k = 1;

    loop {
        // Rank pairs; a suffix that ends before `i + k` sorts first via the 0 sentinel.
        let key = |i: usize| (rank[i], if i + k < n { rank[i + k] + 1 } else { 0 });
        sa.sort_unstable_by_key(|&i| key(i));

        next[sa[0]] = 0;
        for w in 1..n {
            let bump = usize::from(key(sa[w - 1]) != key(sa[w]));
            next[sa[w]] = next[sa[w - 1]] + bump;
        }
        std::mem::swap(&mut rank, &mut next);

        if rank[sa[n - 1]] == n - 1 || k >= n {
            break;
        }
        k *= 2;
    }
    sa
}

/// Finds the longest prefix of `needle` occurring in `base`.
///
/// Returns `(offset, len)`; `len` is 0 when no byte matches.
fn longest_match(base: &[u8], sa: &[usize], needle: &[u8]) -> (usize, usize) {
    if sa.is_empty() || needle.is_empty() {
        return (0, 0);
    }

    // The suffix sharing the longest prefix with `needle` sits next to its insertion point.
    let idx = sa.partition_point(|&s| &base[s..] < needle);
    let mut best = (0, 0);
    for candidate in [idx.checked_sub(1), Some(idx)].into_iter().flatten() {
        if let Some(&start) = sa.get(candidate) {
            let len = common_prefix(&base[start..], needle);
            if len > best.1 {
                best = (start, len);
            }
        }
    }
    best
}

fn common_prefix(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use rewind_types::decode;

    use super::*;
    use crate::delta::Envelope;

    fn naive_suffix_array(data: &[u8]) -> Vec<usize> {
        let mut sa: Vec<usize> = (0..data.len()).collect();
        sa.sort_by(|&a, &b| data[a..].cmp(&data[b..]));
        sa
    }

    #[test]
    fn test_suffix_array_matches_naive_sort() {
        let cases: [&[u8]; 6] = [
            b"",
            b"a",
            b"banana",
            b"mississippi",
            b"aaaaaaaaaaaaaaaa",
            b"abababababab\x00\xff\x00",
        ];
        for data in cases {
            assert_eq!(suffix_array(data), naive_suffix_array(data), "{data:?}");
        }
    }

    #[test]
    fn test_longest_match_finds_best_occurrence() {
        let base = b"the quick brown fox jumps over the lazy dog";
        let sa = suffix_array(base);
        let (offset, len) = longest_match(base, &sa, b"the lazy cat");
        assert_eq!(&base[offset..offset + len], b"the lazy ");
        assert_eq!(longest_match(base, &sa, b"zzz").1, 0);
    }

    #[test]
    fn test_unchanged_value_is_single_copy() {
        let base = b"apiVersion: v1\nkind: ConfigMap\ndata:\n  key: value\n".to_vec();
        let ops = compute_ops(&base, &base);
        assert_eq!(ops, vec![DeltaOp::Copy { offset: 0, len: base.len() as u64 }]);
    }

    #[test]
    fn test_small_edit_keeps_copies_around_literal() {
        let base = b"status: Pending; node: worker-1; restarts: 0".to_vec();
        let target = b"status: Running; node: worker-1; restarts: 0".to_vec();
        let ops = compute_ops(&base, &target);
        assert!(ops.iter().any(|op| matches!(op, DeltaOp::Insert(_))));
        let copied: u64 = ops
            .iter()
            .map(|op| match op {
                DeltaOp::Copy { len, .. } => *len,
                DeltaOp::Insert(_) => 0,
            })
            .sum();
        assert!(copied >= 30, "most of the value should be copied, got {copied}");
    }

    #[test]
    fn test_delta_smaller_than_target_for_similar_values() {
        let base: Vec<u8> = (0..2048u32).flat_map(|i| i.to_le_bytes()).collect();
        let mut target = base.clone();
        target[4000..4008].copy_from_slice(b"CHANGED!");
        let delta = SuffixDelta::new().diff(&base, &target).expect("diff");
        assert!(delta.len() < target.len() / 10, "delta is {} bytes", delta.len());
    }

    #[test]
    fn test_out_of_bounds_copy_is_corrupt() {
        let base = b"0123456789";
        let target = b"0123456789";
        let delta = SuffixDelta::new().diff(base, target).expect("diff");
        let mut envelope: Envelope<Vec<DeltaOp>> = decode(&delta).expect("decode");
        envelope.body = vec![DeltaOp::Copy { offset: 5, len: 10 }];
        let forged = rewind_types::encode(&envelope).expect("encode");

        let err = SuffixDelta::new().patch(base, &forged).unwrap_err();
        assert!(err.to_string().contains("exceeds"), "{err}");
    }
}
