// crates/onair-core/src/lib.rs
//
// Shared data model and low-level plumbing for the playout engine: the
// video format registry, the frame/buffer model, geometry and the
// per-layer transform pipeline, tweeners, color conversion, the object
// pool, the telemetry tree, configuration types, and the blocking
// future/executor primitives the rest of the workspace is built on.
// onair-mixer and onair-engine both depend on this crate; nothing here
// depends on either of them.

pub mod color;
pub mod config;
pub mod error;
pub mod executor;
pub mod format;
pub mod frame;
pub mod future;
pub mod geometry;
pub mod monitor;
pub mod pixel;
pub mod pool;
pub mod transform;
pub mod tween;

pub use color::ColorSpace;
pub use config::{ChannelConfig, EngineConfig};
pub use error::{FormatError, PixelFormatError, ShuttingDown};
pub use executor::TaskQueue;
pub use format::{Cadence, FieldMode, VideoFormat, VideoFormatRegistry, AUDIO_SAMPLE_RATE};
pub use frame::{AudioBuffer, Frame, MutableFrame, TextureHandle};
pub use future::{Reply, ReplySender, ReplyTimeout};
pub use geometry::{Geometry, ScaleCorrection, ScaleMode, Vertex};
pub use monitor::MonitorValue;
pub use pixel::{PixelFormat, PixelFormatDesc, Plane};
pub use pool::{Pool, Pooled};
pub use transform::{AudioTransform, BlendMode, Chroma, FrameTransform, ImageTransform, Levels, PerspectiveQuad, Rect};
pub use tween::{Tween, UnknownTweener};
