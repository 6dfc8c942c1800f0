// crates/onair-engine/src/layer.rs
//
// Layer state machine (C7, §4.4): `Empty | Foreground(producer, paused) |
// Loaded(foreground, background) | Transitioning(transition_producer)`.
// Rather than a literal enum of those four states, the foreground slot
// is never null (the empty producer IS the `Empty` state) and
// `Transitioning` is simply whatever tick observes the foreground to be
// a transition producer — the state diagram collapses onto three
// fields (`foreground`, `background`, `paused`) plus the tween
// animation slot. Every mutating method here assumes it is already
// running on the owning Stage's task queue.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use onair_core::{Frame, FrameTransform, Reply, ReplySender, Tween};

use crate::error::StageError;
use crate::producer::{EmptyProducer, Producer, ProducerHandle};
use crate::transition::TransitionSpec;

pub type LayerIndex = i64;

/// Counts down as each layer in an `apply_transforms` batch finishes its
/// animation; resolves the batch's shared future once the last one
/// lands. A layer whose animation is cancelled by a new `apply_transforms`
/// call still counts toward its *old* batch so that batch doesn't hang.
pub struct BatchLatch {
    remaining: AtomicUsize,
    sender: Mutex<Option<ReplySender<()>>>,
}

impl BatchLatch {
    pub fn new(n: usize) -> (Arc<BatchLatch>, Reply<()>) {
        let (tx, rx) = Reply::new();
        (Self::with_sender(n, tx), rx)
    }

    /// Build a latch around a `ReplySender` created by the caller ahead
    /// of time — used by `Stage::apply_transforms`, which must hand back
    /// a `Reply<()>` to its own caller before the batch's animations
    /// have even been queued on the stage's task queue.
    pub fn with_sender(n: usize, sender: ReplySender<()>) -> Arc<BatchLatch> {
        Arc::new(BatchLatch {
            remaining: AtomicUsize::new(n.max(1)),
            sender: Mutex::new(Some(sender)),
        })
    }

    pub fn complete_one(&self) {
        if self.remaining.fetch_sub(1, Ordering::SeqCst) == 1 {
            if let Some(tx) = self.sender.lock().unwrap().take() {
                tx.send(());
            }
        }
    }
}

/// One queued tween: interpolates `start` toward `target` over
/// `duration` ticks via `tween`, advancing one tick per call to
/// `Layer::tick` (§4.4's "each tick consumes one unit of duration").
struct Animation {
    start: FrameTransform,
    target: FrameTransform,
    duration: u64,
    elapsed: u64,
    tween: Tween,
    batch: Arc<BatchLatch>,
}

pub struct Layer {
    foreground: ProducerHandle,
    background: Option<ProducerHandle>,
    preview_frame: Option<Frame>,
    transform: FrameTransform,
    paused: bool,
    auto_play: bool,
    last_frame: Frame,
    animation: Option<Animation>,
}

impl Layer {
    pub fn empty() -> Self {
        Self {
            foreground: EmptyProducer::handle(),
            background: None,
            preview_frame: None,
            transform: FrameTransform::default(),
            paused: false,
            auto_play: false,
            last_frame: Frame::empty("empty"),
            animation: None,
        }
    }

    pub fn transform(&self) -> FrameTransform {
        self.transform
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Producer-swap primitives for `swap_layer`/`swap_channel` (§4.4):
    /// pull a layer's foreground/background handles and transform out so
    /// Stage can exchange them with another layer's, then reinstall with
    /// `set_*`. Never called mid-tick — only from inside a Stage op.
    pub(crate) fn foreground_handle(&self) -> ProducerHandle {
        Arc::clone(&self.foreground)
    }

    pub(crate) fn background_handle(&self) -> Option<ProducerHandle> {
        self.background.clone()
    }

    pub(crate) fn set_foreground(&mut self, producer: ProducerHandle) {
        self.foreground = producer;
    }

    pub(crate) fn set_background(&mut self, producer: Option<ProducerHandle>) {
        self.background = producer;
    }

    pub(crate) fn set_transform(&mut self, transform: FrameTransform) {
        self.transform = transform;
    }

    /// `load(layer, producer, preview, auto_play)` (§4.4): stage the
    /// producer as background; optionally pull one frame for immediate
    /// preview display while the current foreground stays paused.
    pub fn load(&mut self, producer: ProducerHandle, preview: bool, auto_play: bool) {
        if preview {
            self.preview_frame = producer.receive(0).ok().filter(|f| !f.is_empty());
        }
        self.background = Some(producer);
        self.auto_play = auto_play;
    }

    /// `play(layer, producer?)` (§4.4). With a producer, behaves as
    /// `load(producer, false, false); play()`. Without one, promotes the
    /// staged background to foreground, optionally wrapped in a
    /// transition that interpolates from the current foreground.
    pub fn play(&mut self, producer: Option<ProducerHandle>, transition: Option<TransitionSpec>) -> Result<(), StageError> {
        if let Some(p) = producer {
            self.background = Some(p);
            self.auto_play = false;
        }
        let background = self
            .background
            .take()
            .ok_or_else(|| StageError::InvalidArgument("play: no background producer loaded".into()))?;

        self.foreground = match transition {
            Some(spec) => spec.build(Arc::clone(&self.foreground), background),
            None => background,
        };
        self.preview_frame = None;
        self.paused = false;
        Ok(())
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// `stop(layer)`: replaces foreground with the empty producer;
    /// background is left as-is. Per the documented open-question
    /// decision (DESIGN.md), this also cancels an in-flight transition —
    /// there is nothing extra to do for that case since the transition
    /// producer IS the foreground being replaced.
    pub fn stop(&mut self) {
        self.foreground = EmptyProducer::handle();
    }

    /// `clear(layer)`: resets to `Empty` and drops the background.
    /// Cancels any in-flight animation, releasing its batch so the
    /// batch's future doesn't wait forever on a layer that no longer
    /// exists.
    pub fn clear(&mut self) {
        if let Some(anim) = self.animation.take() {
            anim.batch.complete_one();
        }
        *self = Layer::empty();
    }

    pub fn call(&self, params: Vec<String>) -> Reply<Result<String, crate::error::ProducerError>> {
        self.foreground.call(params)
    }

    /// Queue a tween animation. Cancels any animation already in
    /// progress for this layer (completing its batch so that batch's
    /// future still resolves).
    pub fn start_animation(&mut self, target: FrameTransform, duration_frames: u64, tween: Tween, batch: Arc<BatchLatch>) {
        if let Some(old) = self.animation.take() {
            old.batch.complete_one();
        }
        if duration_frames == 0 {
            self.transform = target;
            batch.complete_one();
            return;
        }
        self.animation = Some(Animation {
            start: self.transform,
            target,
            duration: duration_frames,
            elapsed: 0,
            tween,
            batch,
        });
    }

    /// Advance this layer by one channel tick (§4.4 steps 1-2):
    /// progress any pending animation, then pull a frame from the active
    /// producer, promoting the background on end-of-stream when
    /// `auto_play` is set, and adopting a transition producer's
    /// `leading_producer` once it reaches steady state.
    pub fn tick(&mut self, layer_index: LayerIndex, nb_samples: u32) -> Frame {
        self.advance_animation();

        let frame = if self.paused {
            self.preview_frame.clone().unwrap_or_else(|| self.last_frame.clone())
        } else {
            self.receive_frame(nb_samples)
        };

        if let Some(leader) = self.foreground.leading_producer(layer_index) {
            self.foreground = leader;
        }

        frame.with_transform(self.transform)
    }

    fn advance_animation(&mut self) {
        let Some(anim) = &mut self.animation else { return };
        anim.elapsed += 1;
        let progress = anim.elapsed as f32 / anim.duration as f32;
        self.transform = FrameTransform::lerp(&anim.start, &anim.target, anim.tween.unit(progress));
        if anim.elapsed >= anim.duration {
            let anim = self.animation.take().unwrap();
            anim.batch.complete_one();
        }
    }

    fn receive_frame(&mut self, nb_samples: u32) -> Frame {
        match self.foreground.receive(nb_samples) {
            Ok(frame) if !frame.is_empty() => {
                self.last_frame = frame.clone();
                frame
            }
            _ => self.promote_or_hold(nb_samples),
        }
    }

    /// End-of-stream (or a late/error) on the current foreground: if
    /// `auto_play` staged a background, promote it and retry once
    /// (§4.4 step 2); otherwise hold `last_frame`.
    fn promote_or_hold(&mut self, nb_samples: u32) -> Frame {
        if self.auto_play {
            if let Some(bg) = self.background.take() {
                self.foreground = bg;
                self.auto_play = false;
                if let Ok(frame) = self.foreground.receive(nb_samples) {
                    if !frame.is_empty() {
                        self.last_frame = frame.clone();
                        return frame;
                    }
                }
            }
        }
        self.last_frame.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::producer::ColorProducer;
    use crate::transition::{Direction, TransitionKind};

    #[test]
    fn fresh_layer_is_empty_and_produces_transparent_frames() {
        let mut layer = Layer::empty();
        let frame = layer.tick(1, 0);
        assert!(frame.is_empty());
    }

    #[test]
    fn load_then_play_promotes_background_to_foreground() {
        let mut layer = Layer::empty();
        layer.load(ColorProducer::handle(2, 2, 1, [255, 0, 0, 255]), false, false);
        layer.play(None, None).unwrap();
        let frame = layer.tick(1, 0);
        assert!(!frame.is_empty());
    }

    #[test]
    fn play_with_producer_is_equivalent_to_load_then_play() {
        let mut layer = Layer::empty();
        layer.play(Some(ColorProducer::handle(2, 2, 1, [0, 255, 0, 255])), None).unwrap();
        let frame = layer.tick(1, 0);
        assert!(!frame.is_empty());
    }

    #[test]
    fn play_without_a_staged_background_is_an_error() {
        let mut layer = Layer::empty();
        assert!(layer.play(None, None).is_err());
    }

    #[test]
    fn pause_then_resume_replays_last_frame_while_paused() {
        let mut layer = Layer::empty();
        layer.play(Some(ColorProducer::handle(2, 2, 1, [10, 20, 30, 255])), None).unwrap();
        let first = layer.tick(1, 0);
        layer.pause();
        let paused_frame = layer.tick(1, 0);
        assert_eq!(paused_frame.planes()[0], first.planes()[0]);
        layer.resume();
        let resumed = layer.tick(1, 0);
        assert!(!resumed.is_empty());
    }

    #[test]
    fn stop_replaces_foreground_with_empty_producer() {
        let mut layer = Layer::empty();
        layer.play(Some(ColorProducer::handle(2, 2, 1, [1, 2, 3, 255])), None).unwrap();
        layer.tick(1, 0);
        layer.stop();
        let frame = layer.tick(1, 0);
        assert!(frame.is_empty());
    }

    #[test]
    fn clear_resets_layer_and_completes_pending_batch() {
        let mut layer = Layer::empty();
        layer.play(Some(ColorProducer::handle(2, 2, 1, [1, 2, 3, 255])), None).unwrap();
        let (batch, reply) = BatchLatch::new(1);
        let mut target = FrameTransform::default();
        target.image.opacity = 0.0;
        layer.start_animation(target, 10, Tween::linear(), batch);
        layer.clear();
        assert!(reply.wait_timeout(std::time::Duration::from_millis(50)).is_ok());
    }

    #[test]
    fn animation_resolves_exactly_on_the_duration_th_tick() {
        let mut layer = Layer::empty();
        layer.play(Some(ColorProducer::handle(2, 2, 1, [255, 255, 255, 255])), None).unwrap();
        let (batch, reply) = BatchLatch::new(1);
        let mut target = FrameTransform::default();
        target.image.opacity = 0.0;
        layer.start_animation(target, 5, Tween::linear(), batch);

        for _ in 0..4 {
            layer.tick(1, 0);
            assert!(reply.try_get().is_none());
        }
        layer.tick(1, 0);
        assert!(reply.try_get().is_some());
    }

    #[test]
    fn new_apply_transforms_cancels_the_prior_animation() {
        let mut layer = Layer::empty();
        layer.play(Some(ColorProducer::handle(2, 2, 1, [255, 255, 255, 255])), None).unwrap();
        let (first_batch, first_reply) = BatchLatch::new(1);
        layer.start_animation(FrameTransform::default(), 100, Tween::linear(), first_batch);

        let (second_batch, second_reply) = BatchLatch::new(1);
        layer.start_animation(FrameTransform::default(), 5, Tween::linear(), second_batch);

        assert!(first_reply.wait_timeout(std::time::Duration::from_millis(50)).is_ok());
        for _ in 0..5 {
            layer.tick(1, 0);
        }
        assert!(second_reply.try_get().is_some());
    }

    #[test]
    fn leading_producer_swap_adopts_the_transition_target() {
        let mut layer = Layer::empty();
        layer.play(Some(ColorProducer::handle(2, 2, 1, [0, 0, 255, 255])), None).unwrap();
        let source = ColorProducer::handle(2, 2, 1, [0, 0, 255, 255]);
        let target = ColorProducer::handle(2, 2, 1, [0, 255, 0, 255]);
        layer.background = Some(target);
        let transition = TransitionSpec::Basic {
            duration_frames: 2,
            direction: Direction::FromLeft,
            kind: TransitionKind::Cut,
            tweener: Tween::linear(),
        };
        layer.play(None, Some(transition)).unwrap();
        let _ = source; // captured by the transition producer already

        layer.tick(1, 0);
        layer.tick(1, 0);
        // The transition's leading_producer should now point at the target
        // and have been adopted as the foreground on the next tick.
        layer.tick(1, 0);
        assert!(matches!(
            layer.foreground.name(),
            "color"
        ));
    }
}
