// crates/onair-engine/src/error.rs
//
// Error taxonomy for the channel engine (§7): producer/consumer failures
// recovered locally inside a tick, and stage/engine-level failures that
// surface through a `Reply`'s result. Nothing here ever unwinds out of
// a tick as a panic — `Stage::tick` and `Channel::tick` convert every
// producer/consumer failure into the taxonomy below and either recover
// (substituting `last_frame`/empty, counting a transient) or escalate
// (detaching a consumer, tearing down a channel).

use thiserror::Error;

use onair_core::ShuttingDown;

/// A producer's `receive`/`call` failed (§4.1). `Late` is recovered
/// locally by substituting the empty frame; `Broken` is left in place
/// for the operator to replace; `NotImplemented`/`InvalidArgument`
/// surface straight back to whoever issued the `call`.
#[derive(Debug, Error, Clone)]
pub enum ProducerError {
    #[error("producer '{0}' was late and returned no frame in time")]
    Late(String),

    #[error("producer '{0}' is broken: {detail}", detail = .1)]
    Broken(String, String),

    #[error("producer '{0}' does not implement '{method}'", method = .1)]
    NotImplemented(String, String),

    #[error("invalid argument to producer '{0}': {detail}", detail = .1)]
    InvalidArgument(String, String),
}

impl ProducerError {
    /// A `late` error is treated as an empty frame per §4.1 — this is
    /// the only kind `Layer::receive` swallows without further action.
    pub fn is_late(&self) -> bool {
        matches!(self, ProducerError::Late(_))
    }
}

/// A consumer's `send`/`initialize` failed (§4.2).
#[derive(Debug, Error, Clone)]
pub enum ConsumerError {
    #[error("consumer at port {0} was sent a frame before initialize()")]
    NotInitialized(u32),

    #[error("consumer at port {0} failed fatally: {detail}", detail = .1)]
    Fatal(u32, String),

    #[error("consumer at port {0} missed its deadline: {detail}", detail = .1)]
    Transient(u32, String),
}

/// Stage-op level failures (§6's external interface, §7's `InvalidArgument`/
/// `NotFound`/`Shutdown` taxonomy entries).
#[derive(Debug, Error, Clone)]
pub enum StageError {
    #[error("layer {0} does not exist on this stage")]
    UnknownLayer(i64),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unknown tweener: {0}")]
    UnknownTweener(String),

    #[error("stage is shutting down")]
    Shutdown,
}

impl From<ShuttingDown> for StageError {
    fn from(_: ShuttingDown) -> Self {
        StageError::Shutdown
    }
}

impl From<onair_core::UnknownTweener> for StageError {
    fn from(e: onair_core::UnknownTweener) -> Self {
        StageError::UnknownTweener(e.0)
    }
}

/// Top-level engine failures (§6/§7): channel lifecycle, format lookup,
/// and the mixer-device-lost condition that is fatal to a whole channel.
#[derive(Debug, Error, Clone)]
pub enum EngineError {
    #[error("channel {0} already exists")]
    ChannelAlreadyExists(u32),

    #[error("channel {0} does not exist")]
    UnknownChannel(u32),

    #[error("video format error: {0}")]
    Format(String),

    #[error("consumer port {0} is not attached to channel {1}")]
    UnknownConsumerPort(u32, u32),

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error("mixer device lost on channel {0}: {1}")]
    MixerDeviceLost(u32, String),
}

impl From<onair_core::FormatError> for EngineError {
    fn from(e: onair_core::FormatError) -> Self {
        EngineError::Format(e.to_string())
    }
}
