// crates/onair-engine/src/stage.rs
//
// Stage (C8, §4.4): the ordered `LayerIndex -> Layer` map for one
// channel, plus the single task queue every public operation — and the
// tick itself — runs through, so "all public operations on Stage
// complete-ordered via that queue; no layer is mutated outside the
// queue thread" (§3) holds without a caller ever having to think about
// locking. `swap_layer`/`swap_channel` are the one place two Stages'
// queues have to cooperate; they always reach the lower channel index's
// queue first (§5's deadlock-free ordering rule).

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use log::debug;
use onair_core::{Cadence, Frame, FrameTransform, Reply, TaskQueue, Tween};

use crate::error::{ProducerError, StageError};
use crate::layer::{BatchLatch, Layer, LayerIndex};
use crate::producer::{EmptyProducer, ProducerHandle};
use crate::transition::TransitionSpec;

/// A transform-update function passed to `apply_transforms`: given the
/// layer's current transform, returns the transform to animate toward.
pub type TransformFn = Box<dyn FnOnce(FrameTransform) -> FrameTransform + Send>;

struct StageState {
    layers: BTreeMap<LayerIndex, Layer>,
}

impl StageState {
    fn new() -> Self {
        Self { layers: BTreeMap::new() }
    }

    fn layer_mut(&mut self, index: LayerIndex) -> &mut Layer {
        self.layers.entry(index).or_insert_with(Layer::empty)
    }
}

pub struct Stage {
    channel_index: u32,
    state: Arc<Mutex<StageState>>,
    queue: TaskQueue,
}

impl Stage {
    pub fn new(channel_index: u32) -> Arc<Stage> {
        Arc::new(Stage {
            channel_index,
            state: Arc::new(Mutex::new(StageState::new())),
            queue: TaskQueue::spawn(format!("stage-{channel_index}")),
        })
    }

    pub fn channel_index(&self) -> u32 {
        self.channel_index
    }

    pub fn load(&self, layer: LayerIndex, producer: ProducerHandle, preview: bool, auto_play: bool) -> Reply<()> {
        let state = Arc::clone(&self.state);
        self.queue
            .submit(move || {
                state.lock().unwrap().layer_mut(layer).load(producer, preview, auto_play);
            })
            .unwrap_or_else(|_| Reply::ready(()))
    }

    pub fn play(&self, layer: LayerIndex, producer: Option<ProducerHandle>, transition: Option<TransitionSpec>) -> Reply<Result<(), StageError>> {
        let state = Arc::clone(&self.state);
        self.queue
            .submit(move || state.lock().unwrap().layer_mut(layer).play(producer, transition))
            .unwrap_or_else(|_| Reply::ready(Err(StageError::Shutdown)))
    }

    pub fn pause(&self, layer: LayerIndex) -> Reply<()> {
        let state = Arc::clone(&self.state);
        self.queue
            .submit(move || state.lock().unwrap().layer_mut(layer).pause())
            .unwrap_or_else(|_| Reply::ready(()))
    }

    pub fn resume(&self, layer: LayerIndex) -> Reply<()> {
        let state = Arc::clone(&self.state);
        self.queue
            .submit(move || state.lock().unwrap().layer_mut(layer).resume())
            .unwrap_or_else(|_| Reply::ready(()))
    }

    pub fn stop(&self, layer: LayerIndex) -> Reply<()> {
        let state = Arc::clone(&self.state);
        self.queue
            .submit(move || state.lock().unwrap().layer_mut(layer).stop())
            .unwrap_or_else(|_| Reply::ready(()))
    }

    /// `clear(layer)` (§4.4): reset a single layer to `Empty`.
    pub fn clear_layer(&self, layer: LayerIndex) -> Reply<()> {
        let state = Arc::clone(&self.state);
        self.queue
            .submit(move || {
                if let Some(l) = state.lock().unwrap().layers.get_mut(&layer) {
                    l.clear();
                }
            })
            .unwrap_or_else(|_| Reply::ready(()))
    }

    /// `clear()` (§4.4): reset the whole Stage.
    pub fn clear(&self) -> Reply<()> {
        let state = Arc::clone(&self.state);
        self.queue
            .submit(move || {
                for l in state.lock().unwrap().layers.values_mut() {
                    l.clear();
                }
            })
            .unwrap_or_else(|_| Reply::ready(()))
    }

    pub fn call(&self, layer: LayerIndex, params: Vec<String>) -> Reply<Result<String, ProducerError>> {
        let state = Arc::clone(&self.state);
        self.queue
            .submit(move || {
                let inner = state.lock().unwrap().layers.get(&layer).map(|l| l.call(params.clone()));
                match inner {
                    Some(reply) => reply.wait(),
                    None => Err(ProducerError::NotImplemented(format!("layer {layer}"), params.first().cloned().unwrap_or_default())),
                }
            })
            .unwrap_or_else(|_| Reply::ready(Err(ProducerError::Broken("stage".into(), "shutting down".into()))))
    }

    pub fn get_current_transform(&self, layer: LayerIndex) -> Reply<FrameTransform> {
        let state = Arc::clone(&self.state);
        self.queue
            .submit(move || state.lock().unwrap().layers.get(&layer).map(Layer::transform).unwrap_or_default())
            .unwrap_or_else(|_| Reply::ready(FrameTransform::default()))
    }

    /// `apply_transforms([(layer, f, duration, tween), ...])` (§4.4):
    /// the returned future resolves when *every* animation in the batch
    /// has completed, exactly `duration` ticks after the op is dequeued
    /// (§8 invariant 2). The `Reply<()>`'s sender is created up front so
    /// it can be handed back to the caller before the batch even starts
    /// running, the same way `submit` hands back a `Reply` without
    /// waiting for its job to be dequeued.
    pub fn apply_transforms(&self, ops: Vec<(LayerIndex, TransformFn, u64, Tween)>) -> Reply<()> {
        let (tx, rx) = Reply::<()>::new();
        if self.queue.is_shut_down() {
            tx.send(());
            return rx;
        }
        let n = ops.len().max(1);
        let state = Arc::clone(&self.state);
        let submitted = self.queue.submit_detached(move || {
            let batch = BatchLatch::with_sender(n, tx);
            let mut guard = state.lock().unwrap();
            for (index, f, duration, tween) in ops {
                let layer = guard.layer_mut(index);
                let target = f(layer.transform());
                layer.start_animation(target, duration, tween, Arc::clone(&batch));
            }
        });
        if submitted.is_err() {
            // The sender was dropped along with the rejected job;
            // nothing left to resolve `rx` with other than a fresh one.
            return Reply::ready(());
        }
        rx
    }

    /// Number of frame-advance ticks this Stage has served — used by
    /// `Channel` to feed the cadence lookup and tag the tick's monitor
    /// snapshot.
    pub fn tick(&self, tick_index: u64, cadence: &Cadence) -> Reply<Vec<(LayerIndex, Frame)>> {
        let state = Arc::clone(&self.state);
        let nb_samples = cadence.nb_samples_for_tick(tick_index);
        self.queue
            .submit(move || {
                let mut guard = state.lock().unwrap();
                guard
                    .layers
                    .iter_mut()
                    .map(|(&index, layer)| (index, layer.tick(index, nb_samples)))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_else(|_| Reply::ready(Vec::new()))
    }

    /// Exchange `(a, a_layer)`'s producers — and, if `swap_transforms`,
    /// transforms — with `(b, b_layer)`'s (§4.4, §8 invariant 5). Always
    /// reaches the lower-`channel_index` stage's queue first, then
    /// (if the stages differ) nests into the higher one's queue for the
    /// other half, so the exchange is indivisible from the perspective
    /// of either channel's tick (§5).
    pub fn swap_layer(a: &Arc<Stage>, a_layer: LayerIndex, b: &Arc<Stage>, b_layer: LayerIndex, swap_transforms: bool) -> Reply<()> {
        if Arc::ptr_eq(a, b) {
            return Self::swap_within(a, a_layer, b_layer, swap_transforms);
        }
        let (low, low_idx, high, high_idx) = if a.channel_index <= b.channel_index {
            (Arc::clone(a), a_layer, Arc::clone(b), b_layer)
        } else {
            (Arc::clone(b), b_layer, Arc::clone(a), a_layer)
        };
        Self::swap_across(low, low_idx, high, high_idx, swap_transforms)
    }

    /// `swap_channel(other, swap_transforms)` (§4.4): pairwise swap over
    /// the union of layer indices present on either stage, as a single
    /// atomic step on each side (one job per stage, not one per layer) —
    /// so a tick can never land between two of the union's layer swaps
    /// and observe a half-swapped channel.
    pub fn swap_channel(a: &Arc<Stage>, b: &Arc<Stage>, swap_transforms: bool) -> Reply<()> {
        if Arc::ptr_eq(a, b) {
            return Reply::ready(());
        }
        let (low, high) = if a.channel_index <= b.channel_index { (Arc::clone(a), Arc::clone(b)) } else { (Arc::clone(b), Arc::clone(a)) };

        let low_state = Arc::clone(&low.state);
        let high_for_job = Arc::clone(&high);
        low.queue
            .submit(move || {
                let indices: Vec<LayerIndex> = {
                    let low_guard = low_state.lock().unwrap();
                    let high_guard = high_for_job.state.lock().unwrap();
                    let mut set: Vec<LayerIndex> = low_guard.layers.keys().chain(high_guard.layers.keys()).copied().collect();
                    set.sort_unstable();
                    set.dedup();
                    set
                };

                let taken: Vec<(LayerIndex, ProducerHandle, Option<ProducerHandle>, FrameTransform)> = {
                    let mut guard = low_state.lock().unwrap();
                    indices
                        .iter()
                        .map(|&idx| {
                            let layer = guard.layer_mut(idx);
                            (idx, layer.foreground_handle(), layer.background_handle(), layer.transform())
                        })
                        .collect()
                };

                let high_state = Arc::clone(&high_for_job.state);
                let returned = high_for_job
                    .queue
                    .submit(move || {
                        let mut guard = high_state.lock().unwrap();
                        taken
                            .into_iter()
                            .map(|(idx, fg, bg, tr)| {
                                let layer = guard.layer_mut(idx);
                                let prev = (idx, layer.foreground_handle(), layer.background_handle(), layer.transform());
                                layer.set_foreground(fg);
                                layer.set_background(bg);
                                if swap_transforms {
                                    layer.set_transform(tr);
                                }
                                prev
                            })
                            .collect::<Vec<_>>()
                    })
                    .map(Reply::wait)
                    .unwrap_or_default();

                let mut guard = low_state.lock().unwrap();
                for (idx, fg, bg, tr) in returned {
                    let layer = guard.layer_mut(idx);
                    layer.set_foreground(fg);
                    layer.set_background(bg);
                    if swap_transforms {
                        layer.set_transform(tr);
                    }
                }
                debug!("swap_channel {} <-> {} over {} layer(s)", low.channel_index, high_for_job.channel_index, indices.len());
            })
            .unwrap_or_else(|_| Reply::ready(()))
    }

    fn swap_within(stage: &Arc<Stage>, a_layer: LayerIndex, b_layer: LayerIndex, swap_transforms: bool) -> Reply<()> {
        if a_layer == b_layer {
            return Reply::ready(());
        }
        let state = Arc::clone(&stage.state);
        stage
            .queue
            .submit(move || {
                let mut guard = state.lock().unwrap();
                let (a_fg, a_bg, a_tr) = {
                    let layer = guard.layer_mut(a_layer);
                    (layer.foreground_handle(), layer.background_handle(), layer.transform())
                };
                let (b_fg, b_bg, b_tr) = {
                    let layer = guard.layer_mut(b_layer);
                    (layer.foreground_handle(), layer.background_handle(), layer.transform())
                };
                {
                    let layer = guard.layer_mut(a_layer);
                    layer.set_foreground(b_fg);
                    layer.set_background(b_bg);
                    if swap_transforms {
                        layer.set_transform(b_tr);
                    }
                }
                let layer = guard.layer_mut(b_layer);
                layer.set_foreground(a_fg);
                layer.set_background(a_bg);
                if swap_transforms {
                    layer.set_transform(a_tr);
                }
            })
            .unwrap_or_else(|_| Reply::ready(()))
    }

    fn swap_across(low: Arc<Stage>, low_idx: LayerIndex, high: Arc<Stage>, high_idx: LayerIndex, swap_transforms: bool) -> Reply<()> {
        let low_state = Arc::clone(&low.state);
        let high_for_job = Arc::clone(&high);
        low.queue
            .submit(move || {
                let (fg, bg, tr) = {
                    let mut guard = low_state.lock().unwrap();
                    let layer = guard.layer_mut(low_idx);
                    (layer.foreground_handle(), layer.background_handle(), layer.transform())
                };

                let high_state = Arc::clone(&high_for_job.state);
                let prev = high_for_job
                    .queue
                    .submit(move || {
                        let mut guard = high_state.lock().unwrap();
                        let layer = guard.layer_mut(high_idx);
                        let prev = (layer.foreground_handle(), layer.background_handle(), layer.transform());
                        layer.set_foreground(fg);
                        layer.set_background(bg);
                        if swap_transforms {
                            layer.set_transform(tr);
                        }
                        prev
                    })
                    .map(Reply::wait)
                    .unwrap_or_else(|_| (EmptyProducer::handle(), None, FrameTransform::default()));

                let mut guard = low_state.lock().unwrap();
                let layer = guard.layer_mut(low_idx);
                layer.set_foreground(prev.0);
                layer.set_background(prev.1);
                if swap_transforms {
                    layer.set_transform(prev.2);
                }
            })
            .unwrap_or_else(|_| Reply::ready(()))
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::producer::ColorProducer;
    use onair_core::Cadence;

    fn cadence() -> Cadence {
        Cadence::new(vec![1920])
    }

    #[test]
    fn load_then_play_then_tick_delivers_a_frame() {
        let stage = Stage::new(1);
        stage.load(10, ColorProducer::handle(2, 2, 1, [255, 0, 0, 255]), false, false).wait();
        stage.play(10, None, None).wait().unwrap();
        let frames = stage.tick(0, &cadence()).wait();
        assert_eq!(frames.len(), 1);
        assert!(!frames[0].1.is_empty());
    }

    #[test]
    fn play_with_producer_skips_the_explicit_load() {
        let stage = Stage::new(1);
        stage.play(5, Some(ColorProducer::handle(2, 2, 1, [0, 255, 0, 255])), None).wait().unwrap();
        let frames = stage.tick(0, &cadence()).wait();
        assert_eq!(frames[0].0, 5);
    }

    #[test]
    fn clear_layer_resets_just_that_layer() {
        let stage = Stage::new(1);
        stage.play(1, Some(ColorProducer::handle(2, 2, 1, [1, 2, 3, 255])), None).wait().unwrap();
        stage.play(2, Some(ColorProducer::handle(2, 2, 1, [4, 5, 6, 255])), None).wait().unwrap();
        stage.clear_layer(1).wait();
        let frames = stage.tick(0, &cadence()).wait();
        let by_index: std::collections::HashMap<_, _> = frames.into_iter().collect();
        assert!(by_index[&1].is_empty());
        assert!(!by_index[&2].is_empty());
    }

    #[test]
    fn clear_resets_every_layer() {
        let stage = Stage::new(1);
        stage.play(1, Some(ColorProducer::handle(2, 2, 1, [1, 2, 3, 255])), None).wait().unwrap();
        stage.clear().wait();
        let frames = stage.tick(0, &cadence()).wait();
        assert!(frames[0].1.is_empty());
    }

    #[test]
    fn apply_transforms_future_resolves_after_exactly_duration_ticks() {
        let stage = Stage::new(1);
        stage.play(1, Some(ColorProducer::handle(2, 2, 1, [255, 255, 255, 255])), None).wait().unwrap();

        let reply = stage.apply_transforms(vec![(
            1,
            Box::new(|mut t: FrameTransform| {
                t.image.opacity = 0.0;
                t
            }),
            5,
            Tween::linear(),
        )]);

        for _ in 0..4 {
            stage.tick(0, &cadence()).wait();
            assert!(reply.try_get().is_none());
        }
        stage.tick(0, &cadence()).wait();
        assert!(reply.try_get().is_some());
    }

    #[test]
    fn swap_layer_exchanges_producers_across_stages() {
        let ch1 = Stage::new(1);
        let ch2 = Stage::new(2);
        ch1.play(1, Some(ColorProducer::handle(2, 2, 1, [255, 0, 0, 255])), None).wait().unwrap();
        ch2.play(2, Some(ColorProducer::handle(2, 2, 1, [0, 255, 0, 255])), None).wait().unwrap();

        Stage::swap_layer(&ch1, 1, &ch2, 2, false).wait();

        let ch1_frame = ch1.tick(0, &cadence()).wait();
        let ch2_frame = ch2.tick(0, &cadence()).wait();
        assert_eq!(ch1_frame[0].1.planes()[0][1], 255); // now green (BGRA G byte)
        assert_eq!(ch2_frame[0].1.planes()[0][2], 255); // now red (BGRA R byte)
    }

    #[test]
    fn swap_layer_within_the_same_stage_exchanges_two_layers() {
        let stage = Stage::new(1);
        stage.play(1, Some(ColorProducer::handle(2, 2, 1, [255, 0, 0, 255])), None).wait().unwrap();
        stage.play(2, Some(ColorProducer::handle(2, 2, 1, [0, 255, 0, 255])), None).wait().unwrap();

        Stage::swap_layer(&stage, 1, &stage, 2, false).wait();

        let frames = stage.tick(0, &cadence()).wait();
        let by_index: std::collections::HashMap<_, _> = frames.into_iter().collect();
        assert_eq!(by_index[&1].planes()[0][1], 255);
        assert_eq!(by_index[&2].planes()[0][2], 255);
    }

    #[test]
    fn swap_channel_exchanges_every_layer_in_the_union() {
        let ch1 = Stage::new(1);
        let ch2 = Stage::new(2);
        ch1.play(1, Some(ColorProducer::handle(2, 2, 1, [255, 0, 0, 255])), None).wait().unwrap();
        ch2.play(1, Some(ColorProducer::handle(2, 2, 1, [0, 255, 0, 255])), None).wait().unwrap();

        Stage::swap_channel(&ch1, &ch2, false).wait();

        let ch1_frame = ch1.tick(0, &cadence()).wait();
        let ch2_frame = ch2.tick(0, &cadence()).wait();
        assert_eq!(ch1_frame[0].1.planes()[0][1], 255);
        assert_eq!(ch2_frame[0].1.planes()[0][2], 255);
    }

    #[test]
    fn get_current_transform_reads_back_what_apply_transforms_set() {
        let stage = Stage::new(1);
        stage.play(1, Some(ColorProducer::handle(2, 2, 1, [1, 1, 1, 255])), None).wait().unwrap();
        stage
            .apply_transforms(vec![(
                1,
                Box::new(|mut t: FrameTransform| {
                    t.image.opacity = 0.5;
                    t
                }),
                1,
                Tween::linear(),
            )])
            .wait();
        stage.tick(0, &cadence()).wait();
        let transform = stage.get_current_transform(1).wait();
        assert!((transform.image.opacity - 0.5).abs() < 1e-6);
    }
}
