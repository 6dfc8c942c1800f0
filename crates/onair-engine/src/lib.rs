// crates/onair-engine/src/lib.rs
//
// Playout engine (C5-C11): producer/consumer contracts, the per-channel
// Stage/Layer state machine, transitions, the Channel tick loop and its
// Output fan-out, the producer/consumer registries, and the
// `PlayoutServer` external interface (§6) that ties a whole engine
// instance together.

pub mod channel;
pub mod consumer;
pub mod error;
pub mod layer;
pub mod output;
pub mod producer;
pub mod registry;
pub mod server;
pub mod stage;
pub mod transition;

pub use channel::Channel;
pub use consumer::{Consumer, ConsumerHandle, InMemorySinkConsumer};
pub use error::{ConsumerError, EngineError, ProducerError, StageError};
pub use layer::LayerIndex;
pub use output::Output;
pub use producer::{ColorProducer, EmptyProducer, FrameSequenceProducer, Producer, ProducerHandle};
pub use registry::{ConsumerRegistry, ProducerRegistry};
pub use server::PlayoutServer;
pub use stage::{Stage, TransformFn};
pub use transition::TransitionSpec;
