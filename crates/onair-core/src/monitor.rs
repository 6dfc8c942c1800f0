// crates/onair-core/src/monitor.rs
//
// Telemetry state tree. Producers, consumers, stages and channels each
// publish a `MonitorValue` snapshot (§4.1 `state()`, §4.7 step 6); the
// channel's publisher merges these into one tree per tick. This crate
// only defines the shape — fanning it out over OSC or any other wire
// format is an external concern (§1).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MonitorValue {
    Leaf(String),
    Node(BTreeMap<String, MonitorValue>),
}

impl MonitorValue {
    pub fn leaf(value: impl ToString) -> Self {
        MonitorValue::Leaf(value.to_string())
    }

    pub fn node() -> Self {
        MonitorValue::Node(BTreeMap::new())
    }

    /// Insert `value` at `key` if this is a `Node`; no-op on a `Leaf`
    /// (callers build up a tree from the root down, so a leaf here means
    /// a caller mistakenly tried to nest under a terminal value).
    pub fn set(&mut self, key: impl Into<String>, value: MonitorValue) {
        if let MonitorValue::Node(map) = self {
            map.insert(key.into(), value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&MonitorValue> {
        match self {
            MonitorValue::Node(map) => map.get(key),
            MonitorValue::Leaf(_) => None,
        }
    }

    /// Merge `other` into `self`, with `other`'s leaves winning on
    /// conflicting keys — used when a channel folds per-layer/per-consumer
    /// snapshots into one tree at publish time.
    pub fn merge(&mut self, other: MonitorValue) {
        match (self, other) {
            (MonitorValue::Node(into), MonitorValue::Node(from)) => {
                for (k, v) in from {
                    into.entry(k).or_insert_with(MonitorValue::node).merge(v);
                }
            }
            (slot, other) => *slot = other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_round_trip() {
        let mut root = MonitorValue::node();
        root.set("frame_number", MonitorValue::leaf(42));
        assert_eq!(root.get("frame_number"), Some(&MonitorValue::leaf(42)));
    }

    #[test]
    fn merge_combines_disjoint_keys() {
        let mut a = MonitorValue::node();
        a.set("layer/1", MonitorValue::leaf("foo"));
        let mut b = MonitorValue::node();
        b.set("layer/2", MonitorValue::leaf("bar"));
        a.merge(b);
        assert_eq!(a.get("layer/1"), Some(&MonitorValue::leaf("foo")));
        assert_eq!(a.get("layer/2"), Some(&MonitorValue::leaf("bar")));
    }

    #[test]
    fn merge_lets_incoming_leaves_win() {
        let mut a = MonitorValue::node();
        a.set("status", MonitorValue::leaf("stale"));
        let mut b = MonitorValue::node();
        b.set("status", MonitorValue::leaf("fresh"));
        a.merge(b);
        assert_eq!(a.get("status"), Some(&MonitorValue::leaf("fresh")));
    }

    #[test]
    fn serializes_without_a_tag_wrapper() {
        let mut root = MonitorValue::node();
        root.set("x", MonitorValue::leaf("1"));
        let json = serde_json::to_string(&root).unwrap();
        assert_eq!(json, r#"{"x":"1"}"#);
    }
}
