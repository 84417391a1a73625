//! Proptest strategies for rewind domain types.
//!
//! Timestamps are drawn from a narrow window so that generated histories
//! collide, land between each other, and overflow chain bounds.
//!
//! # Usage
//!
//! ```no_run
//! use rewind_test_utils::strategies;
//! use proptest::prelude::*;
//!
//! proptest! {
//!     #[test]
//!     fn my_property(ops in proptest::collection::vec(strategies::arb_store_op(), 1..50)) {
//!         // apply ops and check an invariant
//!     }
//! }
//! ```

use proptest::prelude::*;
use rewind_types::{ResourceRecord, Timestamp};

/// Generates a timestamp within the first 120 seconds after the epoch.
pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
    (0i64..120).prop_map(Timestamp::from_secs)
}

/// Generates an arbitrary value of 0-255 random bytes.
pub fn arb_value() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(any::<u8>(), 0..256)
}

/// Generates a stored version: mostly values, sometimes a tombstone.
pub fn arb_version() -> impl Strategy<Value = Option<Vec<u8>>> {
    proptest::option::weighted(0.8, arb_value())
}

/// Generates a JSON-ish document sharing most bytes with its siblings,
/// the shape deltas are meant for.
pub fn arb_document() -> impl Strategy<Value = Vec<u8>> {
    (
        prop::sample::select(vec!["Pending", "ContainerCreating", "Running", "Succeeded"]),
        0u32..5,
        "[a-z]{0,12}",
    )
        .prop_map(|(phase, restarts, note)| {
            format!(
                r#"{{"status":{{"phase":"{phase}","restartCount":{restarts}}},"note":"{note}"}}"#
            )
            .into_bytes()
        })
}

/// Generates a resource of one of a few kinds; nodes are cluster-scoped.
pub fn arb_record() -> impl Strategy<Value = ResourceRecord> {
    (
        prop::sample::select(vec!["Pod", "Service", "ConfigMap", "Node"]),
        prop::sample::select(vec!["default", "kube-system"]),
        prop::sample::select(vec!["a", "b", "c"]),
        arb_timestamp(),
        arb_document(),
    )
        .prop_map(|(kind, namespace, name, valid_at, payload)| {
            let namespace = (kind != "Node").then_some(namespace);
            ResourceRecord::new(kind, namespace, name, valid_at, payload)
        })
}

/// A watcher call against a snapshot store.
#[derive(Debug, Clone)]
pub enum StoreOp {
    /// `add_resource`
    Add(ResourceRecord),
    /// `update_resource`
    Update(ResourceRecord),
    /// `delete_resource`
    Delete(ResourceRecord),
}

/// Generates watcher calls, weighted toward adds and updates.
pub fn arb_store_op() -> impl Strategy<Value = StoreOp> {
    prop_oneof![
        3 => arb_record().prop_map(StoreOp::Add),
        3 => arb_record().prop_map(StoreOp::Update),
        1 => arb_record().prop_map(StoreOp::Delete),
    ]
}
