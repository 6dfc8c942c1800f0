// crates/onair-core/src/error.rs
//
// Shared error taxonomy for the pieces that live in onair-core itself
// (format/pixel validation, the blocking task queue). The producer and
// consumer error kinds live next to their contracts in onair-engine;
// this module only covers failures that can happen below that layer.

use thiserror::Error;

/// Failure constructing or looking up a `VideoFormat`.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("unknown video format id: {0}")]
    UnknownFormat(String),

    #[error("video format {0} already registered")]
    AlreadyRegistered(String),

    #[error("invalid cadence for format {format}: period_sum * time_scale = {sum}, expected sample_rate * duration * period_len = {expected}")]
    InvalidCadence {
        format: String,
        sum: u64,
        expected: u64,
    },
}

/// Failure building a `PixelFormatDesc`.
#[derive(Debug, Error)]
pub enum PixelFormatError {
    #[error("pixel format {format:?} expects {expected} planes, got {got}")]
    PlaneCountMismatch {
        format: crate::pixel::PixelFormat,
        expected: usize,
        got: usize,
    },
}

/// A task queue that has been asked to shut down will fail every
/// still-pending and every newly submitted operation with this error,
/// delivered to all pending futures at teardown.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("stage shutting down")]
pub struct ShuttingDown;
