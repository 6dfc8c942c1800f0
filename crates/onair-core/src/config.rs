// crates/onair-core/src/config.rs
//
// Typed configuration surface for an engine instance. Loading this from
// a file on disk is the control surface's job (§1 non-goal); this crate
// only defines the shape a loader would deserialize into and the
// defaults a caller gets by constructing one directly (as the demo
// binary in onair-engine does).

use serde::{Deserialize, Serialize};

/// Per-channel configuration: which video format it starts on and how
/// many frames of warm-up replay new consumers with a nonzero
/// `buffer_depth` should receive.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub index: u32,
    pub format_id: String,
    #[serde(default = "default_consumer_depth_hint")]
    pub consumer_depth_hint: usize,
}

fn default_consumer_depth_hint() -> usize {
    4
}

impl ChannelConfig {
    pub fn new(index: u32, format_id: impl Into<String>) -> Self {
        Self {
            index,
            format_id: format_id.into(),
            consumer_depth_hint: default_consumer_depth_hint(),
        }
    }
}

/// Top-level engine configuration: the set of channels to bring up.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub channels: Vec<ChannelConfig>,
}

impl EngineConfig {
    pub fn single_channel(format_id: impl Into<String>) -> Self {
        Self {
            channels: vec![ChannelConfig::new(1, format_id)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_channel_helper_builds_one_entry() {
        let cfg = EngineConfig::single_channel("PAL");
        assert_eq!(cfg.channels.len(), 1);
        assert_eq!(cfg.channels[0].index, 1);
        assert_eq!(cfg.channels[0].format_id, "PAL");
    }

    #[test]
    fn deserializing_without_depth_hint_uses_default() {
        let json = r#"{"index":2,"format_id":"1080p50"}"#;
        let cfg: ChannelConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.consumer_depth_hint, 4);
    }

    #[test]
    fn round_trips_through_json() {
        let cfg = EngineConfig::single_channel("NTSC");
        let json = serde_json::to_string(&cfg).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }
}
