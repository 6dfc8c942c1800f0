// crates/onair-mixer/src/error.rs

use thiserror::Error;

/// Failures the image/audio mixer can surface to a channel tick. These
/// are distinct from `ProducerError`/`ConsumerError` (defined in
/// onair-engine next to those contracts) since the mixer sits below
/// both, in the render path itself.
#[derive(Debug, Error)]
pub enum MixerError {
    #[error("mixer device unavailable: {0}")]
    DeviceLost(String),

    #[error("pixel format error: {0}")]
    PixelFormat(#[from] onair_core::PixelFormatError),

    #[error("push/pop stack imbalance: {0} unmatched pop(s)")]
    UnbalancedPop(usize),

    #[error("render requested with an empty layer tree")]
    EmptyTree,
}
