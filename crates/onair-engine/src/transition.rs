// crates/onair-engine/src/transition.rs
//
// Transition producers (§4.5): wrappers around a captured `source`
// producer and a `target` producer that animate from one to the other
// over a finite duration, then hand the Layer back to `target` alone.
// Both specializations keep the producer contract uniform — `receive`
// still returns exactly one `Frame` per call — by doing their own
// internal two-layer composite instead of asking Stage to `visit` twice
// with separate geometries. See DESIGN.md for why.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use onair_core::{AudioBuffer, Frame, MonitorValue, MutableFrame, PixelFormat, Tween};
use onair_mixer::{frame_to_rgba, AudioMixer, VolumeFade};

use crate::error::ProducerError;
use crate::producer::{Producer, ProducerHandle};

/// What `Layer::play` needs to wrap a captured `source` and a freshly
/// staged `target` into a transition producer (§4.5). Stage/Layer code
/// builds one of these from the control surface's parsed parameters and
/// hands it to `Layer::play`, which owns the actual `source` capture.
#[derive(Clone)]
pub enum TransitionSpec {
    Basic {
        duration_frames: u64,
        direction: Direction,
        kind: TransitionKind,
        tweener: Tween,
    },
    Sting {
        mask: ProducerHandle,
        overlay: Option<ProducerHandle>,
        trigger_point: u64,
        audio_fade_start: u64,
        audio_fade_duration: u64,
    },
}

impl TransitionSpec {
    /// Wrap `source` (the Layer's current foreground) and `target` (the
    /// staged background) into the concrete transition producer.
    pub fn build(self, source: ProducerHandle, target: ProducerHandle) -> ProducerHandle {
        match self {
            TransitionSpec::Basic {
                duration_frames,
                direction,
                kind,
                tweener,
            } => BasicTransition::handle(source, target, duration_frames, direction, kind, tweener),
            TransitionSpec::Sting {
                mask,
                overlay,
                trigger_point,
                audio_fade_start,
                audio_fade_duration,
            } => StingTransition::handle(source, target, mask, overlay, trigger_point, audio_fade_start, audio_fade_duration),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    FromLeft,
    FromRight,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionKind {
    Cut,
    Mix,
    Push,
    Slide,
    Wipe,
}

/// Cross-fade / push / slide / wipe between `source` and `target` over
/// `duration_frames` calls to `receive` (§4.5). `elapsed` counts calls
/// made so far; progress for the Nth call (0-indexed) is `N / duration`,
/// so the first call renders pure source and `leading_producer` starts
/// reporting `target` as soon as the call whose progress reaches 1.0 has
/// been served — Stage swaps the Layer's foreground to `target` on the
/// tick after that.
pub struct BasicTransition {
    source: ProducerHandle,
    target: ProducerHandle,
    duration_frames: u64,
    direction: Direction,
    kind: TransitionKind,
    tweener: Tween,
    elapsed: AtomicU64,
    frame_number: AtomicU64,
}

impl BasicTransition {
    pub fn new(source: ProducerHandle, target: ProducerHandle, duration_frames: u64, direction: Direction, kind: TransitionKind, tweener: Tween) -> Self {
        Self {
            source,
            target,
            duration_frames: duration_frames.max(1),
            direction,
            kind,
            tweener,
            elapsed: AtomicU64::new(0),
            frame_number: AtomicU64::new(0),
        }
    }

    pub fn handle(source: ProducerHandle, target: ProducerHandle, duration_frames: u64, direction: Direction, kind: TransitionKind, tweener: Tween) -> ProducerHandle {
        Arc::new(Self::new(source, target, duration_frames, direction, kind, tweener))
    }

    fn progress(&self, count: u64) -> f32 {
        (count as f32 / self.duration_frames as f32).min(1.0)
    }
}

impl Producer for BasicTransition {
    fn receive(&self, nb_samples: u32) -> Result<Frame, ProducerError> {
        let count = self.elapsed.fetch_add(1, Ordering::SeqCst);
        let t = self.tweener.unit(self.progress(count));

        let src = self.source.receive(nb_samples).unwrap_or_else(|_| self.source.last_frame());
        let dst = self.target.receive(nb_samples).unwrap_or_else(|_| self.target.last_frame());
        self.frame_number.fetch_add(1, Ordering::SeqCst);

        let mixed = composite(&src, &dst, t, self.kind, self.direction);

        let audio_mixer = AudioMixer::new();
        let channels = src.audio().channels.max(dst.audio().channels).max(1);
        let samples = if self.kind == TransitionKind::Cut {
            if t < 1.0 { src.audio().clone() } else { dst.audio().clone() }
        } else {
            audio_mixer.mix(channels, nb_samples, &[(src.audio().clone(), 1.0 - t), (dst.audio().clone(), t)])
        };

        Ok(mixed.with_audio(AudioBuffer { channels, ..samples }))
    }

    fn last_frame(&self) -> Frame {
        self.target.last_frame()
    }

    fn is_ready(&self) -> bool {
        self.source.is_ready() && self.target.is_ready()
    }

    fn nb_frames(&self) -> u64 {
        self.duration_frames
    }

    fn frame_number(&self) -> u64 {
        self.frame_number.load(Ordering::SeqCst)
    }

    fn leading_producer(&self, _layer_index: i64) -> Option<ProducerHandle> {
        if self.elapsed.load(Ordering::SeqCst) >= self.duration_frames {
            Some(Arc::clone(&self.target))
        } else {
            None
        }
    }

    fn name(&self) -> &str {
        "transition"
    }

    fn state(&self) -> MonitorValue {
        let mut node = MonitorValue::node();
        node.set("type", MonitorValue::leaf("basic-transition"));
        node.set("progress", MonitorValue::leaf(self.progress(self.elapsed.load(Ordering::SeqCst))));
        node
    }
}

/// Composite `src`/`dst` at progress `t` per `kind`/`direction`. Falls
/// back to whichever frame is non-empty if the other carries no pixels
/// (e.g. `target` hasn't produced its first frame yet).
fn composite(src: &Frame, dst: &Frame, t: f32, kind: TransitionKind, direction: Direction) -> Frame {
    if src.is_empty() && dst.is_empty() {
        return Frame::empty("transition");
    }
    let (w, h) = dims(src).or_else(|| dims(dst)).unwrap_or((0, 0));
    if w == 0 || h == 0 {
        return Frame::empty("transition");
    }

    let src_rgba = frame_to_rgba(src);
    let dst_rgba = frame_to_rgba(dst);
    let blank = vec![0.0f32; w as usize * h as usize * 4];
    let src_rgba = if src_rgba.is_empty() { &blank } else { &src_rgba };
    let dst_rgba = if dst_rgba.is_empty() { &blank } else { &dst_rgba };

    let sign = match direction {
        Direction::FromLeft => 1.0,
        Direction::FromRight => -1.0,
    };

    let mut out = vec![0.0f32; w as usize * h as usize * 4];
    for y in 0..h as usize {
        for x in 0..w as usize {
            let i = (y * w as usize + x) * 4;
            let px = match kind {
                TransitionKind::Cut => {
                    if t < 1.0 {
                        [src_rgba[i], src_rgba[i + 1], src_rgba[i + 2], src_rgba[i + 3]]
                    } else {
                        [dst_rgba[i], dst_rgba[i + 1], dst_rgba[i + 2], dst_rgba[i + 3]]
                    }
                }
                TransitionKind::Mix => lerp_pixel(&src_rgba[i..i + 4], &dst_rgba[i..i + 4], t),
                TransitionKind::Push => {
                    let shift = (sign * t * w as f32) as i64;
                    let src_x = x as i64 + shift;
                    let dst_x = x as i64 + shift - sign as i64 * w as i64;
                    sample_or(&src_rgba, &dst_rgba, src_x, dst_x, x as i64, w as usize, y, h as usize)
                }
                TransitionKind::Slide => {
                    let dst_x = x as i64 - (sign * (1.0 - t) * w as f32) as i64;
                    if (0..w as i64).contains(&dst_x) {
                        let di = (y * w as usize + dst_x as usize) * 4;
                        [dst_rgba[di], dst_rgba[di + 1], dst_rgba[di + 2], dst_rgba[di + 3]]
                    } else {
                        [src_rgba[i], src_rgba[i + 1], src_rgba[i + 2], src_rgba[i + 3]]
                    }
                }
                TransitionKind::Wipe => {
                    let edge = match direction {
                        Direction::FromLeft => t * w as f32,
                        Direction::FromRight => (1.0 - t) * w as f32,
                    };
                    let revealed = match direction {
                        Direction::FromLeft => (x as f32) < edge,
                        Direction::FromRight => (x as f32) >= edge,
                    };
                    if revealed {
                        [dst_rgba[i], dst_rgba[i + 1], dst_rgba[i + 2], dst_rgba[i + 3]]
                    } else {
                        [src_rgba[i], src_rgba[i + 1], src_rgba[i + 2], src_rgba[i + 3]]
                    }
                }
            };
            out[i..i + 4].copy_from_slice(&px);
        }
    }

    let (desc, planes) = onair_mixer::convert::convert_from_rgba(&out, w, h, PixelFormat::Bgra, src.color_space());
    let mut mf = MutableFrame::new("transition", desc);
    mf.planes = planes;
    mf.commit()
}

#[allow(clippy::too_many_arguments)]
fn sample_or(src_rgba: &[f32], dst_rgba: &[f32], src_x: i64, dst_x: i64, fallback_x: i64, w: usize, y: usize, h: usize) -> [f32; 4] {
    if (0..w as i64).contains(&dst_x) && (0..h as i64).contains(&(y as i64)) {
        let di = (y * w + dst_x as usize) * 4;
        [dst_rgba[di], dst_rgba[di + 1], dst_rgba[di + 2], dst_rgba[di + 3]]
    } else if (0..w as i64).contains(&src_x) {
        let si = (y * w + src_x as usize) * 4;
        [src_rgba[si], src_rgba[si + 1], src_rgba[si + 2], src_rgba[si + 3]]
    } else {
        let _ = fallback_x;
        [0.0, 0.0, 0.0, 0.0]
    }
}

fn lerp_pixel(a: &[f32], b: &[f32], t: f32) -> [f32; 4] {
    [a[0] + (b[0] - a[0]) * t, a[1] + (b[1] - a[1]) * t, a[2] + (b[2] - a[2]) * t, a[3] + (b[3] - a[3]) * t]
}

fn dims(frame: &Frame) -> Option<(u32, u32)> {
    let p = frame.pixel_desc().planes.first()?;
    if p.width == 0 || p.height == 0 {
        None
    } else {
        Some((p.width, p.height))
    }
}

/// Sting transition (§4.5): a mask producer (luma sequence) gates
/// `source` until `trigger_point`, then gates `target` by the
/// complement. An optional `overlay` composites on top throughout.
/// Audio crossfades symmetrically around `audio_fade_start` over
/// `audio_fade_duration` ticks.
pub struct StingTransition {
    source: ProducerHandle,
    target: ProducerHandle,
    mask: ProducerHandle,
    overlay: Option<ProducerHandle>,
    trigger_point: u64,
    audio_fade_start: u64,
    audio_fade_duration: u64,
    tick_index: AtomicU64,
    frame_number: AtomicU64,
}

impl StingTransition {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: ProducerHandle,
        target: ProducerHandle,
        mask: ProducerHandle,
        overlay: Option<ProducerHandle>,
        trigger_point: u64,
        audio_fade_start: u64,
        audio_fade_duration: u64,
    ) -> Self {
        Self {
            source,
            target,
            mask,
            overlay,
            trigger_point,
            audio_fade_start,
            audio_fade_duration,
            tick_index: AtomicU64::new(0),
            frame_number: AtomicU64::new(0),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn handle(
        source: ProducerHandle,
        target: ProducerHandle,
        mask: ProducerHandle,
        overlay: Option<ProducerHandle>,
        trigger_point: u64,
        audio_fade_start: u64,
        audio_fade_duration: u64,
    ) -> ProducerHandle {
        Arc::new(Self::new(source, target, mask, overlay, trigger_point, audio_fade_start, audio_fade_duration))
    }
}

impl Producer for StingTransition {
    fn receive(&self, nb_samples: u32) -> Result<Frame, ProducerError> {
        let idx = self.tick_index.fetch_add(1, Ordering::SeqCst);
        self.frame_number.fetch_add(1, Ordering::SeqCst);

        let before_trigger = idx < self.trigger_point;
        let src = self.source.receive(nb_samples).unwrap_or_else(|_| self.source.last_frame());
        let dst = self.target.receive(nb_samples).unwrap_or_else(|_| self.target.last_frame());
        let mask_frame = self.mask.receive(nb_samples).unwrap_or_else(|_| self.mask.last_frame());

        let active = if before_trigger { &src } else { &dst };
        let (w, h) = dims(active).unwrap_or((0, 0));
        if w == 0 || h == 0 {
            return Ok(Frame::empty("sting"));
        }

        let active_rgba = frame_to_rgba(active);
        let mask_rgba = frame_to_rgba(&mask_frame);
        let mut out = vec![0.0f32; w as usize * h as usize * 4];

        for i in 0..(w as usize * h as usize) {
            let base = i * 4;
            let mask_luma = if mask_rgba.len() > base + 2 {
                (mask_rgba[base] + mask_rgba[base + 1] + mask_rgba[base + 2]) / 3.0
            } else {
                1.0
            };
            let gate = if before_trigger { mask_luma } else { 1.0 - mask_luma };
            out[base] = active_rgba.get(base).copied().unwrap_or(0.0);
            out[base + 1] = active_rgba.get(base + 1).copied().unwrap_or(0.0);
            out[base + 2] = active_rgba.get(base + 2).copied().unwrap_or(0.0);
            out[base + 3] = active_rgba.get(base + 3).copied().unwrap_or(0.0) * gate;
        }

        if let Some(overlay) = &self.overlay {
            let overlay_frame = overlay.receive(nb_samples).unwrap_or_else(|_| overlay.last_frame());
            let overlay_rgba = frame_to_rgba(&overlay_frame);
            for i in 0..(w as usize * h as usize) {
                let base = i * 4;
                if overlay_rgba.len() <= base + 3 {
                    continue;
                }
                let a = overlay_rgba[base + 3];
                for c in 0..3 {
                    out[base + c] = overlay_rgba[base + c] * a + out[base + c] * (1.0 - a);
                }
                out[base + 3] = a + out[base + 3] * (1.0 - a);
            }
        }

        let (desc, planes) = onair_mixer::convert::convert_from_rgba(&out, w, h, PixelFormat::Bgra, active.color_space());
        let mut mf = MutableFrame::new("sting", desc);
        mf.planes = planes;

        let source_fade = VolumeFade {
            start_frame: self.audio_fade_start,
            duration_frames: self.audio_fade_duration,
            from: 1.0,
            to: 0.0,
        };
        let target_fade = VolumeFade {
            start_frame: self.audio_fade_start,
            duration_frames: self.audio_fade_duration,
            from: 0.0,
            to: 1.0,
        };
        let channels = src.audio().channels.max(dst.audio().channels).max(1);
        let mixer = AudioMixer::new();
        mf.audio = mixer.mix(channels, nb_samples, &[(src.audio().clone(), source_fade.volume_at(idx)), (dst.audio().clone(), target_fade.volume_at(idx))]);

        Ok(mf.commit())
    }

    fn last_frame(&self) -> Frame {
        self.target.last_frame()
    }

    fn is_ready(&self) -> bool {
        self.mask.is_ready()
    }

    fn nb_frames(&self) -> u64 {
        self.mask.nb_frames()
    }

    fn frame_number(&self) -> u64 {
        self.frame_number.load(Ordering::SeqCst)
    }

    fn leading_producer(&self, _layer_index: i64) -> Option<ProducerHandle> {
        if self.mask.is_ready() {
            None
        } else {
            Some(Arc::clone(&self.target))
        }
    }

    fn name(&self) -> &str {
        "sting"
    }

    fn state(&self) -> MonitorValue {
        let mut node = MonitorValue::node();
        node.set("type", MonitorValue::leaf("sting-transition"));
        node.set("tick", MonitorValue::leaf(self.tick_index.load(Ordering::SeqCst)));
        node
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::producer::{ColorProducer, FrameSequenceProducer};

    #[test]
    fn mix_transition_starts_pure_source_and_ends_pure_target() {
        let source = ColorProducer::handle(2, 2, 1, [0, 0, 255, 255]);
        let target = ColorProducer::handle(2, 2, 1, [0, 255, 0, 255]);
        let transition = BasicTransition::handle(source, target, 10, Direction::FromLeft, TransitionKind::Mix, Tween::linear());

        let first = transition.receive(0).unwrap();
        assert_eq!(first.planes()[0][2], 255); // BGRA red byte -> source's R (blue has r=0 actually)

        for _ in 1..9 {
            transition.receive(0).unwrap();
        }
        assert!(transition.leading_producer(1).is_none());
        transition.receive(0).unwrap(); // 10th call reaches progress 1.0
        assert!(transition.leading_producer(1).is_some());
    }

    #[test]
    fn cut_transition_switches_instantly_at_final_call() {
        let source = ColorProducer::handle(2, 2, 1, [255, 0, 0, 255]);
        let target = ColorProducer::handle(2, 2, 1, [0, 255, 0, 255]);
        let transition = BasicTransition::handle(source, target, 1, Direction::FromLeft, TransitionKind::Cut, Tween::linear());

        let frame = transition.receive(0).unwrap();
        // duration 1: first call already reaches progress 1.0, so it is pure target.
        assert_eq!(frame.planes()[0][1], 255); // BGRA green byte
        assert!(transition.leading_producer(1).is_some());
    }

    #[test]
    fn sting_transition_switches_to_target_after_trigger() {
        let source = ColorProducer::handle(2, 2, 1, [255, 0, 0, 255]);
        let target = ColorProducer::handle(2, 2, 1, [0, 255, 0, 255]);
        let mask_frames: Vec<Frame> = (0..4).map(|_| ColorProducer::new(2, 2, 1, [255, 255, 255, 255]).last_frame()).collect();
        let mask = FrameSequenceProducer::handle("mask", mask_frames);
        let sting = StingTransition::handle(source, target, mask, None, 2, 0, 4);

        sting.receive(0).unwrap();
        sting.receive(0).unwrap();
        let after_trigger = sting.receive(0).unwrap();
        assert_eq!(after_trigger.planes()[0][1], 255); // showing target now (green)
    }

    #[test]
    fn sting_reports_leading_producer_once_mask_is_exhausted() {
        let source = ColorProducer::handle(2, 2, 1, [255, 0, 0, 255]);
        let target = ColorProducer::handle(2, 2, 1, [0, 255, 0, 255]);
        let mask_frames: Vec<Frame> = (0..2).map(|_| ColorProducer::new(2, 2, 1, [255, 255, 255, 255]).last_frame()).collect();
        let mask = FrameSequenceProducer::handle("mask", mask_frames);
        let sting = StingTransition::handle(source, target, mask, None, 1, 0, 2);

        assert!(sting.leading_producer(1).is_none());
        sting.receive(0).unwrap();
        sting.receive(0).unwrap();
        assert!(sting.leading_producer(1).is_some());
    }

    #[test]
    fn spec_builds_a_basic_transition() {
        let source = ColorProducer::handle(2, 2, 1, [255, 0, 0, 255]);
        let target = ColorProducer::handle(2, 2, 1, [0, 255, 0, 255]);
        let spec = TransitionSpec::Basic {
            duration_frames: 4,
            direction: Direction::FromLeft,
            kind: TransitionKind::Mix,
            tweener: Tween::linear(),
        };
        let transition = spec.build(source, target);
        assert_eq!(transition.name(), "transition");
    }

    #[test]
    fn spec_builds_a_sting_transition() {
        let source = ColorProducer::handle(2, 2, 1, [255, 0, 0, 255]);
        let target = ColorProducer::handle(2, 2, 1, [0, 255, 0, 255]);
        let mask = FrameSequenceProducer::handle("mask", vec![ColorProducer::new(2, 2, 1, [255, 255, 255, 255]).last_frame()]);
        let spec = TransitionSpec::Sting {
            mask,
            overlay: None,
            trigger_point: 1,
            audio_fade_start: 0,
            audio_fade_duration: 2,
        };
        let transition = spec.build(source, target);
        assert_eq!(transition.name(), "sting");
    }
}
