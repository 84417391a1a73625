//! Core type definitions shared by every rewind crate.
//!
//! - [`Timestamp`]: the temporal key of every recorded version
//! - [`TimeRange`]: the inclusive span covered by a map or store
//! - [`Resource`]: the contract a watched cluster object fulfils
//! - [`ResourceRecord`]: a ready-made [`Resource`] carrying an opaque payload
//! - [`ResourceFilter`]: kind/namespace equality filters for snapshot queries

use std::{fmt, str::FromStr};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

// ============================================================================
// Timestamp
// ============================================================================

const NANOS_PER_SEC: i64 = 1_000_000_000;
const NANOS_PER_MILLI: i64 = 1_000_000;

/// An instant on the recorded timeline, in nanoseconds since the Unix epoch.
///
/// Timestamps come from the record being stored (its "valid at" time), never
/// from the wall clock of the process storing it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Earliest representable instant.
    pub const MIN: Timestamp = Timestamp(i64::MIN);
    /// Latest representable instant.
    pub const MAX: Timestamp = Timestamp(i64::MAX);

    /// Creates a timestamp from nanoseconds since the epoch.
    #[inline]
    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    /// Creates a timestamp from milliseconds since the epoch.
    #[inline]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis.saturating_mul(NANOS_PER_MILLI))
    }

    /// Creates a timestamp from whole seconds since the epoch.
    #[inline]
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs.saturating_mul(NANOS_PER_SEC))
    }

    /// Returns nanoseconds since the epoch.
    #[inline]
    pub const fn as_nanos(self) -> i64 {
        self.0
    }

    /// Returns whole seconds since the epoch, rounded toward negative infinity.
    #[inline]
    pub const fn as_secs(self) -> i64 {
        self.0.div_euclid(NANOS_PER_SEC)
    }

    /// Converts to a chrono UTC datetime.
    pub fn to_datetime(self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.0)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        // Out-of-range datetimes (beyond year 2262) clamp to the representable bounds.
        match dt.timestamp_nanos_opt() {
            Some(nanos) => Self(nanos),
            None if dt.timestamp() < 0 => Self::MIN,
            None => Self::MAX,
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_datetime().to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

/// Error returned when a timestamp string is neither RFC 3339 nor an integer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTimestampError {
    input: String,
}

impl fmt::Display for ParseTimestampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid timestamp '{}': expected RFC 3339 or unix seconds", self.input)
    }
}

impl std::error::Error for ParseTimestampError {}

impl FromStr for Timestamp {
    type Err = ParseTimestampError;

    /// Accepts RFC 3339 (`2024-05-01T12:00:00Z`) or integer unix seconds (`1714564800`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(secs) = trimmed.parse::<i64>() {
            return Ok(Self::from_secs(secs));
        }
        DateTime::parse_from_rfc3339(trimmed)
            .map(|dt| Self::from(dt.with_timezone(&Utc)))
            .map_err(|_| ParseTimestampError { input: s.to_string() })
    }
}

// ============================================================================
// TimeRange
// ============================================================================

/// Inclusive range of timestamps observed by a map or store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Earliest timestamp ever written.
    pub start: Timestamp,
    /// Latest timestamp ever written.
    pub end: Timestamp,
}

impl TimeRange {
    /// Creates a range covering exactly one instant.
    pub const fn at(timestamp: Timestamp) -> Self {
        Self { start: timestamp, end: timestamp }
    }

    /// Widens the range to include `timestamp`. Never shrinks.
    pub fn extend(&mut self, timestamp: Timestamp) {
        if timestamp < self.start {
            self.start = timestamp;
        }
        if timestamp > self.end {
            self.end = timestamp;
        }
    }

    /// Returns `true` if `timestamp` lies within the range.
    pub fn contains(&self, timestamp: Timestamp) -> bool {
        self.start <= timestamp && timestamp <= self.end
    }
}

// ============================================================================
// Resources
// ============================================================================

/// A tracked cluster object as seen by the snapshot store.
///
/// Watchers hand implementors of this trait to the store; the store keys the
/// history by [`Resource::id`] and places each version at [`Resource::valid_at`].
pub trait Resource: Serialize + DeserializeOwned {
    /// Stable identifier, unique across kinds and namespaces.
    fn id(&self) -> &str;

    /// The instant this version of the object became current.
    fn valid_at(&self) -> Timestamp;

    /// Object kind (e.g. `Pod`, `Deployment`).
    fn kind(&self) -> &str;

    /// Namespace, or `None` for cluster-scoped objects.
    fn namespace(&self) -> Option<&str>;
}

/// A generic resource version: identity, timestamp, and an opaque payload.
///
/// The payload is whatever byte form the producing watcher chose (typically
/// the object's JSON or YAML); the store never looks inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// `kind/namespace/name`, or `kind/name` for cluster-scoped objects.
    pub id: String,
    /// Object kind.
    pub kind: String,
    /// Namespace for namespaced kinds.
    pub namespace: Option<String>,
    /// Object name.
    pub name: String,
    /// When this version became current.
    pub valid_at: Timestamp,
    /// Serialized object body.
    pub payload: Vec<u8>,
}

impl ResourceRecord {
    /// Creates a record, deriving its id from kind, namespace, and name.
    pub fn new(
        kind: impl Into<String>,
        namespace: Option<&str>,
        name: impl Into<String>,
        valid_at: Timestamp,
        payload: Vec<u8>,
    ) -> Self {
        let kind = kind.into();
        let name = name.into();
        let namespace = namespace.map(str::to_string);
        let id = resource_id(&kind, namespace.as_deref(), &name);
        Self { id, kind, namespace, name, valid_at, payload }
    }

    /// Returns a copy of this record placed at a different instant.
    #[must_use]
    pub fn at(&self, valid_at: Timestamp) -> Self {
        Self { valid_at, ..self.clone() }
    }

    /// Returns a copy of this record with a new payload.
    #[must_use]
    pub fn with_payload(&self, valid_at: Timestamp, payload: Vec<u8>) -> Self {
        Self { valid_at, payload, ..self.clone() }
    }
}

impl Resource for ResourceRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn valid_at(&self) -> Timestamp {
        self.valid_at
    }

    fn kind(&self) -> &str {
        &self.kind
    }

    fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }
}

/// Builds the canonical resource id: lowercase kind, then namespace (if any), then name.
pub fn resource_id(kind: &str, namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) => format!("{}/{}/{}", kind.to_ascii_lowercase(), ns, name),
        None => format!("{}/{}", kind.to_ascii_lowercase(), name),
    }
}

/// Equality filters applied to snapshot query results.
///
/// An unset field matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceFilter {
    /// Only return resources of this kind.
    pub kind: Option<String>,
    /// Only return resources in this namespace.
    pub namespace: Option<String>,
}

impl ResourceFilter {
    /// A filter that matches every resource.
    pub fn all() -> Self {
        Self::default()
    }

    /// Restricts results to `kind`.
    #[must_use]
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Restricts results to `namespace`.
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Returns `true` if `resource` passes both filters.
    pub fn matches<R: Resource>(&self, resource: &R) -> bool {
        if let Some(kind) = &self.kind
            && resource.kind() != kind
        {
            return false;
        }
        if let Some(namespace) = &self.namespace
            && resource.namespace() != Some(namespace.as_str())
        {
            return false;
        }
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_unit_constructors_agree() {
        assert_eq!(Timestamp::from_secs(2), Timestamp::from_millis(2_000));
        assert_eq!(Timestamp::from_millis(3), Timestamp::from_nanos(3_000_000));
        assert_eq!(Timestamp::from_secs(-1).as_secs(), -1);
        assert_eq!(Timestamp::from_nanos(-1).as_secs(), -1);
    }

    #[test]
    fn test_timestamp_datetime_roundtrip() {
        let ts = Timestamp::from_nanos(1_714_564_800_123_456_789);
        assert_eq!(Timestamp::from(ts.to_datetime()), ts);
    }

    #[test]
    fn test_timestamp_parse_unix_seconds() {
        let ts: Timestamp = "1714564800".parse().expect("parse seconds");
        assert_eq!(ts, Timestamp::from_secs(1_714_564_800));
    }

    #[test]
    fn test_timestamp_parse_rfc3339() {
        let ts: Timestamp = "2024-05-01T12:00:00Z".parse().expect("parse rfc3339");
        assert_eq!(ts, Timestamp::from_secs(1_714_564_800));
        let offset: Timestamp = "2024-05-01T14:00:00+02:00".parse().expect("parse offset");
        assert_eq!(offset, ts);
    }

    #[test]
    fn test_timestamp_parse_rejects_garbage() {
        let err = "yesterday".parse::<Timestamp>().unwrap_err();
        assert!(err.to_string().contains("yesterday"));
    }

    #[test]
    fn test_timestamp_display_is_rfc3339() {
        assert_eq!(Timestamp::from_secs(1_714_564_800).to_string(), "2024-05-01T12:00:00Z");
    }

    #[test]
    fn test_time_range_extend_never_shrinks() {
        let mut range = TimeRange::at(Timestamp::from_secs(100));
        range.extend(Timestamp::from_secs(150));
        range.extend(Timestamp::from_secs(50));
        range.extend(Timestamp::from_secs(120));
        assert_eq!(range.start, Timestamp::from_secs(50));
        assert_eq!(range.end, Timestamp::from_secs(150));
        assert!(range.contains(Timestamp::from_secs(120)));
        assert!(!range.contains(Timestamp::from_secs(151)));
    }

    #[test]
    fn test_resource_id_format() {
        assert_eq!(resource_id("Pod", Some("default"), "a"), "pod/default/a");
        assert_eq!(resource_id("Node", None, "worker-1"), "node/worker-1");
    }

    #[test]
    fn test_filter_matches_kind_and_namespace() {
        let pod =
            ResourceRecord::new("Pod", Some("default"), "a", Timestamp::from_secs(1), Vec::new());
        let node = ResourceRecord::new("Node", None, "n1", Timestamp::from_secs(1), Vec::new());

        assert!(ResourceFilter::all().matches(&pod));
        assert!(ResourceFilter::all().matches(&node));
        assert!(ResourceFilter::all().kind("Pod").matches(&pod));
        assert!(!ResourceFilter::all().kind("Pod").matches(&node));
        assert!(ResourceFilter::all().namespace("default").matches(&pod));
        assert!(!ResourceFilter::all().namespace("kube-system").matches(&pod));
        assert!(!ResourceFilter::all().namespace("default").matches(&node));
        assert!(ResourceFilter::all().kind("Pod").namespace("default").matches(&pod));
    }

    #[test]
    fn test_record_with_payload_keeps_identity() {
        let v1 =
            ResourceRecord::new("Pod", Some("default"), "a", Timestamp::from_secs(1), b"v1".to_vec());
        let v2 = v1.with_payload(Timestamp::from_secs(2), b"v2".to_vec());
        assert_eq!(v1.id, v2.id);
        assert_eq!(v2.valid_at, Timestamp::from_secs(2));
        assert_eq!(v2.payload, b"v2");
    }
}
