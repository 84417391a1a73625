//! Keyframes and their bounded diff-frame chains.
//!
//! # Layout
//!
//! A [`Keyframe`] holds a full base value valid from its own timestamp, then a
//! strictly ordered chain of [`DiffFrame`]s. Each frame stores the delta from
//! the value live immediately *before* it (the reconstructed predecessor, not
//! the base), so reading frame `k` replays frames `0..=k` in order.
//!
//! # Insertion
//!
//! Writing at timestamp `t` into a keyframe whose timestamp is `<= t`:
//!
//! 1. `t` equals the keyframe timestamp: the base is replaced.
//! 2. `t` equals a frame timestamp: that frame's value is replaced.
//! 3. The chain has room: a frame is inserted at its sorted slot.
//! 4. The chain is full and `t` is past the last frame: the keyframe rejects the write
//!    ([`Insertion::Full`]) and the caller starts a new keyframe.
//! 5. The chain is full and `t` lands inside it at slot `j`: the chain splits
//!    ([`Insertion::Split`]). A new keyframe at `t` takes the frames after `j`; this one
//!    keeps `[0, j)`.
//!
//! Cases 1–3 and 5 change the predecessor of every later frame, so those
//! deltas are regenerated from the reconstructed versions. No write ever drops
//! history and no chain grows past its bound.

use rewind_types::Timestamp;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{delta::DeltaCodec, error::DeltaError};

/// A stored version: `None` is a tombstone.
pub type Version = Option<Vec<u8>>;

/// Payload of one diff frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameDelta {
    /// Delta from the predecessor value, or from the empty string after a tombstone.
    Patch(Vec<u8>),
    /// The key was deleted at this frame.
    Tombstone,
}

/// One timestamped delta within a keyframe's chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffFrame {
    timestamp: Timestamp,
    delta: FrameDelta,
}

impl DiffFrame {
    /// Instant from which this frame's value is live.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Stored payload.
    pub fn delta(&self) -> &FrameDelta {
        &self.delta
    }
}

/// Outcome of [`Keyframe::insert`].
#[derive(Debug)]
pub enum Insertion {
    /// The write was absorbed by this keyframe.
    Done,
    /// The chain is full and the write is past its end; the value is handed back.
    Full(Version),
    /// The chain was split; the returned keyframe must follow this one.
    Split(Keyframe),
}

/// A full snapshot anchoring a bounded chain of deltas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyframe {
    timestamp: Timestamp,
    base: Version,
    frames: Vec<DiffFrame>,
}

impl Keyframe {
    /// Creates a keyframe with an empty chain.
    pub fn new(timestamp: Timestamp, base: Version) -> Self {
        Self { timestamp, base, frames: Vec::new() }
    }

    /// Instant from which the base value is live.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// The full value stored at the keyframe timestamp.
    pub fn base(&self) -> Option<&[u8]> {
        self.base.as_deref()
    }

    /// The diff chain, ordered by timestamp.
    pub fn frames(&self) -> &[DiffFrame] {
        &self.frames
    }

    /// Timestamp of the last write this keyframe covers.
    pub fn last_timestamp(&self) -> Timestamp {
        self.frames.last().map_or(self.timestamp, |f| f.timestamp)
    }

    /// Bytes held by the base and all deltas.
    pub fn stored_bytes(&self) -> (usize, usize) {
        let base = self.base.as_ref().map_or(0, Vec::len);
        let deltas = self
            .frames
            .iter()
            .map(|f| match &f.delta {
                FrameDelta::Patch(bytes) => bytes.len(),
                FrameDelta::Tombstone => 0,
            })
            .sum();
        (base, deltas)
    }

    /// Returns the value live at `timestamp`, which must be `>=` the keyframe timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`DeltaError`] if a delta on the replay path fails to apply.
    pub fn value_at(
        &self,
        timestamp: Timestamp,
        codec: &dyn DeltaCodec,
    ) -> Result<Version, DeltaError> {
        let count = self.frames.partition_point(|f| f.timestamp <= timestamp);
        let mut value = self.base.clone();
        for frame in &self.frames[..count] {
            value = apply(value.as_deref(), &frame.delta, codec)?;
        }
        Ok(value)
    }

    /// Reconstructs the value live after each frame, in chain order.
    ///
    /// # Errors
    ///
    /// Returns [`DeltaError`] if any delta fails to apply.
    pub fn versions(&self, codec: &dyn DeltaCodec) -> Result<Vec<Version>, DeltaError> {
        let mut out: Vec<Version> = Vec::with_capacity(self.frames.len());
        for frame in &self.frames {
            let prev = out.last().map_or(self.base.as_deref(), |v| v.as_deref());
            let value = apply(prev, &frame.delta, codec)?;
            out.push(value);
        }
        Ok(out)
    }

    /// Writes `value` at `timestamp` following the module's insertion rules.
    ///
    /// `timestamp` must be `>=` the keyframe timestamp. On error the keyframe
    /// is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`DeltaError`] if reconstructing the chain or computing a delta fails.
    pub fn insert(
        &mut self,
        timestamp: Timestamp,
        value: Version,
        max_chain_length: usize,
        codec: &dyn DeltaCodec,
    ) -> Result<Insertion, DeltaError> {
        debug_assert!(timestamp >= self.timestamp);

        let versions = self.versions(codec)?;
        let mut history: Vec<(Timestamp, Version)> =
            self.frames.iter().map(|f| f.timestamp).zip(versions).collect();

        if timestamp == self.timestamp {
            let frames = encode_chain(value.as_deref(), &history, codec)?;
            self.base = value;
            self.frames = frames;
            trace!(
                timestamp = %timestamp,
                regenerated = self.frames.len(),
                "Replaced keyframe base"
            );
            return Ok(Insertion::Done);
        }

        let slot = history.partition_point(|(t, _)| *t < timestamp);
        let replaces = history.get(slot).is_some_and(|(t, _)| *t == timestamp);

        if replaces || history.len() < max_chain_length {
            if replaces {
                history[slot].1 = value;
            } else {
                history.insert(slot, (timestamp, value));
            }
            let prev = predecessor(self.base.as_deref(), &history, slot);
            let tail = encode_chain(prev, &history[slot..], codec)?;
            self.frames.truncate(slot);
            self.frames.extend(tail);
            trace!(
                timestamp = %timestamp,
                slot,
                regenerated = self.frames.len() - slot,
                "Inserted diff frame"
            );
            return Ok(Insertion::Done);
        }

        if slot == history.len() {
            return Ok(Insertion::Full(value));
        }

        let moved = history.split_off(slot);
        let mut next = Keyframe::new(timestamp, value);
        next.frames = encode_chain(next.base.as_deref(), &moved, codec)?;
        self.frames.truncate(slot);
        trace!(
            timestamp = %timestamp,
            kept = self.frames.len(),
            moved = next.frames.len(),
            "Split full diff chain"
        );
        Ok(Insertion::Split(next))
    }

    /// Checks the ordering invariants of a keyframe read from untrusted bytes.
    pub(crate) fn check_order(&self, max_chain_length: usize) -> Result<(), String> {
        if self.frames.len() > max_chain_length {
            return Err(format!(
                "keyframe at {} holds {} frames, bound is {max_chain_length}",
                self.timestamp,
                self.frames.len()
            ));
        }
        let mut prev = self.timestamp;
        for frame in &self.frames {
            if frame.timestamp <= prev {
                return Err(format!("frame at {} is not after {prev}", frame.timestamp));
            }
            prev = frame.timestamp;
        }
        Ok(())
    }
}

/// Value live just before `history[slot]`.
fn predecessor<'a>(
    base: Option<&'a [u8]>,
    history: &'a [(Timestamp, Version)],
    slot: usize,
) -> Option<&'a [u8]> {
    match slot.checked_sub(1) {
        Some(i) => history[i].1.as_deref(),
        None => base,
    }
}

/// Encodes `history` as a chain of deltas starting from `start`.
fn encode_chain(
    start: Option<&[u8]>,
    history: &[(Timestamp, Version)],
    codec: &dyn DeltaCodec,
) -> Result<Vec<DiffFrame>, DeltaError> {
    let mut prev = start;
    let mut frames = Vec::with_capacity(history.len());
    for (timestamp, value) in history {
        let delta = match value {
            Some(bytes) => FrameDelta::Patch(codec.diff(prev.unwrap_or_default(), bytes)?),
            None => FrameDelta::Tombstone,
        };
        frames.push(DiffFrame { timestamp: *timestamp, delta });
        prev = value.as_deref();
    }
    Ok(frames)
}

fn apply(
    prev: Option<&[u8]>,
    delta: &FrameDelta,
    codec: &dyn DeltaCodec,
) -> Result<Version, DeltaError> {
    match delta {
        FrameDelta::Patch(bytes) => codec.patch(prev.unwrap_or_default(), bytes).map(Some),
        FrameDelta::Tombstone => Ok(None),
    }
}
