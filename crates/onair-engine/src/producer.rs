// crates/onair-engine/src/producer.rs
//
// The pull-source contract (C5, §4.1): `receive(nb_samples) -> Frame`
// called at most once per tick, plus the capability set a Layer and the
// control surface need around it (`last_frame`, `is_ready`, `nb_frames`,
// `frame_number`, `leading_producer`, `call`, `state`). Concrete media
// producers (file decoders, HTML renderers, routing sources) are
// external collaborators per §1 — this module only carries the contract
// itself and the handful of primitives simple enough to live with it:
// the distinguished empty producer every Layer starts with, and a
// constant-color generator.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use onair_core::{AudioBuffer, Frame, MonitorValue, MutableFrame, PixelFormat, PixelFormatDesc, Reply};

use crate::error::ProducerError;

/// Shared handle to a producer. Layers, transitions and the registry all
/// pass these around by `Arc` — a producer may be referenced by more
/// than one Layer (e.g. a routing source feeding several channels).
pub type ProducerHandle = Arc<dyn Producer>;

/// Pull interface a Layer drives once per tick (§4.1). Implementors must
/// not block past the channel's soft tick deadline; a producer that
/// cannot deliver in time should return `Err(ProducerError::Late(..))`
/// rather than stall the caller.
pub trait Producer: Send + Sync {
    /// Produce the next frame. `nb_samples` is the audio sample count
    /// the channel format's cadence dictates for this tick; producers
    /// that carry audio must deliver exactly that many samples.
    fn receive(&self, nb_samples: u32) -> Result<Frame, ProducerError>;

    /// The most recently produced frame, used by Layer when paused or
    /// when `receive` returned late/empty.
    fn last_frame(&self) -> Frame;

    /// Hint that the next `receive` will not be late. Producers that
    /// cannot offer a cheap readiness check may always return `true`.
    fn is_ready(&self) -> bool {
        true
    }

    /// Total frame count if finite, else `u64::MAX`.
    fn nb_frames(&self) -> u64 {
        u64::MAX
    }

    /// Monotonic count of frames actually produced (not attempted).
    fn frame_number(&self) -> u64;

    /// For transition producers: the producer this one is converging
    /// toward, once `progress >= 1`. Stage replaces itself with this on
    /// the tick after it turns `Some`. Non-transition producers never
    /// have one.
    fn leading_producer(&self, _layer_index: i64) -> Option<ProducerHandle> {
        None
    }

    /// Producer-specific RPC (seek, length, play, cg update, ...). The
    /// default rejects every call as unimplemented; producers that
    /// support RPC override this.
    fn call(&self, params: Vec<String>) -> Reply<Result<String, ProducerError>> {
        let method = params.first().cloned().unwrap_or_default();
        Reply::ready(Err(ProducerError::NotImplemented(self.name().to_string(), method)))
    }

    /// Telemetry tree for this producer, folded into the channel's
    /// per-tick monitor snapshot (§4.1, §6).
    fn state(&self) -> MonitorValue {
        let mut node = MonitorValue::node();
        node.set("type", MonitorValue::leaf(self.name()));
        node
    }

    /// Stable producer-type name, used in telemetry and log lines.
    fn name(&self) -> &str;

    /// Human-readable one-liner for `call print` / debug dumps.
    fn print(&self) -> String {
        self.name().to_string()
    }
}

/// The distinguished always-empty producer. Every Layer's foreground
/// starts here (§3: "foreground producer, never null; 'empty producer'
/// is a distinguished instance producing transparent frames"), and
/// `stop` replaces whatever foreground was running with a fresh one.
pub struct EmptyProducer;

impl EmptyProducer {
    pub fn handle() -> ProducerHandle {
        Arc::new(EmptyProducer)
    }
}

impl Producer for EmptyProducer {
    fn receive(&self, _nb_samples: u32) -> Result<Frame, ProducerError> {
        Ok(Frame::empty("empty"))
    }

    fn last_frame(&self) -> Frame {
        Frame::empty("empty")
    }

    fn nb_frames(&self) -> u64 {
        0
    }

    fn frame_number(&self) -> u64 {
        0
    }

    fn name(&self) -> &str {
        "empty"
    }
}

/// Constant-color generator, parsed from an `#RRGGBBAA` (or `#RRGGBB`,
/// alpha defaults to opaque) parameter string. The pixel payload is
/// built once at construction and reused every tick — only the audio
/// buffer's sample count changes, to match whatever the channel's
/// cadence asks for that tick.
pub struct ColorProducer {
    base_frame: Frame,
    audio_channels: u16,
    frame_number: AtomicU64,
}

impl ColorProducer {
    pub fn new(width: u32, height: u32, audio_channels: u16, rgba: [u8; 4]) -> Self {
        let mut mf = MutableFrame::new("color", PixelFormatDesc::new(PixelFormat::Bgra, width, height));
        for px in mf.planes[0].chunks_mut(4) {
            px[0] = rgba[2];
            px[1] = rgba[1];
            px[2] = rgba[0];
            px[3] = rgba[3];
        }
        Self {
            base_frame: mf.commit(),
            audio_channels,
            frame_number: AtomicU64::new(0),
        }
    }

    /// Parse `#RRGGBB` or `#RRGGBBAA`; case-insensitive hex digits.
    pub fn parse_hex(s: &str) -> Result<[u8; 4], ProducerError> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        let parse_byte = |slice: &str| {
            u8::from_str_radix(slice, 16).map_err(|_| ProducerError::InvalidArgument("color".into(), format!("bad hex in '{s}'")))
        };
        match hex.len() {
            6 => Ok([parse_byte(&hex[0..2])?, parse_byte(&hex[2..4])?, parse_byte(&hex[4..6])?, 0xFF]),
            8 => Ok([parse_byte(&hex[0..2])?, parse_byte(&hex[2..4])?, parse_byte(&hex[4..6])?, parse_byte(&hex[6..8])?]),
            _ => Err(ProducerError::InvalidArgument("color".into(), format!("'{s}' is not #RRGGBB or #RRGGBBAA"))),
        }
    }

    pub fn handle(width: u32, height: u32, audio_channels: u16, rgba: [u8; 4]) -> ProducerHandle {
        Arc::new(Self::new(width, height, audio_channels, rgba))
    }
}

impl Producer for ColorProducer {
    fn receive(&self, nb_samples: u32) -> Result<Frame, ProducerError> {
        self.frame_number.fetch_add(1, Ordering::SeqCst);
        Ok(self.base_frame.with_audio(AudioBuffer::silence(self.audio_channels, nb_samples)))
    }

    fn last_frame(&self) -> Frame {
        self.base_frame.clone()
    }

    fn frame_number(&self) -> u64 {
        self.frame_number.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "color"
    }
}

/// Deterministic test double: replays a fixed list of const frames, then
/// reports end-of-stream (empty, `is_ready() == false`) forever after.
/// Used to drive the transition and boundary-behavior scenarios without
/// a real decoder — a simple stand-in, not real media I/O.
pub struct FrameSequenceProducer {
    frames: Vec<Frame>,
    cursor: AtomicU64,
    name: String,
}

impl FrameSequenceProducer {
    pub fn new(name: impl Into<String>, frames: Vec<Frame>) -> Self {
        Self {
            frames,
            cursor: AtomicU64::new(0),
            name: name.into(),
        }
    }

    pub fn handle(name: impl Into<String>, frames: Vec<Frame>) -> ProducerHandle {
        Arc::new(Self::new(name, frames))
    }
}

impl Producer for FrameSequenceProducer {
    fn receive(&self, _nb_samples: u32) -> Result<Frame, ProducerError> {
        let i = self.cursor.fetch_add(1, Ordering::SeqCst) as usize;
        match self.frames.get(i) {
            Some(frame) => Ok(frame.clone()),
            None => Err(ProducerError::Late(self.name.clone())),
        }
    }

    fn last_frame(&self) -> Frame {
        let i = self.cursor.load(Ordering::SeqCst).saturating_sub(1) as usize;
        self.frames.get(i).cloned().unwrap_or_else(|| Frame::empty(&self.name))
    }

    fn is_ready(&self) -> bool {
        (self.cursor.load(Ordering::SeqCst) as usize) < self.frames.len()
    }

    fn nb_frames(&self) -> u64 {
        self.frames.len() as u64
    }

    fn frame_number(&self) -> u64 {
        self.cursor.load(Ordering::SeqCst).min(self.frames.len() as u64)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_producer_is_always_empty_and_finite_zero() {
        let p = EmptyProducer::handle();
        assert!(p.receive(0).unwrap().is_empty());
        assert_eq!(p.nb_frames(), 0);
        assert_eq!(p.frame_number(), 0);
    }

    #[test]
    fn color_producer_parses_rgb_and_rgba_hex() {
        assert_eq!(ColorProducer::parse_hex("#FF0000FF").unwrap(), [0xFF, 0x00, 0x00, 0xFF]);
        assert_eq!(ColorProducer::parse_hex("00FF00").unwrap(), [0x00, 0xFF, 0x00, 0xFF]);
        assert!(ColorProducer::parse_hex("bogus").is_err());
    }

    #[test]
    fn color_producer_delivers_requested_sample_count() {
        let p = ColorProducer::new(4, 4, 2, [255, 0, 0, 255]);
        let frame = p.receive(37).unwrap();
        assert_eq!(frame.audio().nb_frames(), 37);
        assert_eq!(frame.planes()[0][2], 255); // BGRA: R lands at byte 2
    }

    #[test]
    fn color_producer_frame_number_advances_once_per_receive() {
        let p = ColorProducer::new(2, 2, 1, [0, 0, 0, 255]);
        p.receive(10).unwrap();
        p.receive(10).unwrap();
        assert_eq!(p.frame_number(), 2);
    }

    #[test]
    fn frame_sequence_producer_exhausts_then_reports_late() {
        let frames = vec![Frame::empty("a"), Frame::empty("b")];
        let p = FrameSequenceProducer::new("seq", frames);
        assert!(p.is_ready());
        p.receive(0).unwrap();
        p.receive(0).unwrap();
        assert!(!p.is_ready());
        assert!(p.receive(0).unwrap_err().is_late());
    }

    #[test]
    fn frame_sequence_with_zero_frames_is_immediately_exhausted() {
        let p = FrameSequenceProducer::new("empty-seq", Vec::new());
        assert_eq!(p.nb_frames(), 0);
        assert!(!p.is_ready());
    }

    #[test]
    fn default_call_is_not_implemented() {
        let p = EmptyProducer::handle();
        let result = p.call(vec!["seek".into()]).wait();
        assert!(matches!(result, Err(ProducerError::NotImplemented(_, _))));
    }
}
