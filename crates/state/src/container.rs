//! Two-blob snapshot container.
//!
//! ```text
//! u32 BE  length of resources blob
//! bytes   resources blob (serialized TemporalMap)
//! u32 BE  length of labels blob
//! bytes   labels blob    (serialized TemporalMap)
//! ```

use snafu::ensure;

use crate::error::{Result, StoreError, TruncatedSnafu};

/// Length prefix size in bytes.
const LEN_PREFIX: usize = 4;

/// Concatenates the two blobs behind big-endian `u32` length prefixes.
pub(crate) fn pack(resources: &[u8], labels: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(2 * LEN_PREFIX + resources.len() + labels.len());
    for (section, blob) in [("resources", resources), ("labels", labels)] {
        let len = u32::try_from(blob.len())
            .map_err(|_| StoreError::TooLarge { section, len: blob.len() as u64 })?;
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(blob);
    }
    Ok(out)
}

/// Splits a container into its resources and labels blobs.
///
/// Trailing bytes after the second blob are ignored.
pub(crate) fn unpack(bytes: &[u8]) -> Result<(&[u8], &[u8])> {
    let (resources, rest) = take_blob(bytes, "resources")?;
    let (labels, _) = take_blob(rest, "labels")?;
    Ok((resources, labels))
}

fn take_blob<'a>(bytes: &'a [u8], section: &'static str) -> Result<(&'a [u8], &'a [u8])> {
    ensure!(
        bytes.len() >= LEN_PREFIX,
        TruncatedSnafu { section, needed: LEN_PREFIX as u64, available: bytes.len() as u64 }
    );
    let (prefix, rest) = bytes.split_at(LEN_PREFIX);
    let len = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
    ensure!(
        rest.len() >= len,
        TruncatedSnafu { section, needed: len as u64, available: rest.len() as u64 }
    );
    Ok(rest.split_at(len))
}
