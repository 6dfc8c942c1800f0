// crates/onair-engine/src/channel.rs
//
// Channel (C9, §4.4/§4.7): one frame-clocked tick thread per on-air
// channel, wiring the Stage's composited layers through the image and
// audio mixers and into the Output fan-out. Owns the `Arc<Stage>` it
// forwards layer operations to and the `Arc<Output>` it forwards
// consumer attach/detach to, so both can be reached directly for
// cross-channel `swap_layer`/`swap_channel` and for registry lookups.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::{debug, warn};
use onair_core::{AudioBuffer, MonitorValue, PixelFormat, Reply, Tween, VideoFormat};
use onair_mixer::{AudioMixer, ImageMixer};

use crate::consumer::ConsumerHandle;
use crate::error::StageError;
use crate::layer::LayerIndex;
use crate::producer::ProducerHandle;
use crate::stage::{Stage, TransformFn};
use crate::transition::TransitionSpec;

struct ChannelMixers {
    image: ImageMixer,
    audio: AudioMixer,
    format: VideoFormat,
}

/// A single on-air channel (§3 Channel): frame clock, stage, mixers, and
/// output fan-out, ticking on its own thread per §5's "one tick thread
/// per channel" concurrency model.
pub struct Channel {
    index: u32,
    stage: Arc<Stage>,
    output: Arc<crate::output::Output>,
    mixers: Arc<Mutex<ChannelMixers>>,
    target_pixel_format: PixelFormat,
    tick_counter: Arc<AtomicU64>,
    monitor: Arc<Mutex<MonitorValue>>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Channel {
    pub fn new(index: u32, format: VideoFormat, target_pixel_format: PixelFormat) -> Arc<Channel> {
        let stage = Stage::new(index);
        let output = Arc::new(crate::output::Output::new(index));
        let mixers = Arc::new(Mutex::new(ChannelMixers {
            image: ImageMixer::new(format!("channel-{index}")),
            audio: AudioMixer::new(),
            format,
        }));
        let running = Arc::new(AtomicBool::new(true));
        let tick_counter = Arc::new(AtomicU64::new(0));
        let monitor = Arc::new(Mutex::new(MonitorValue::node()));

        let thread = {
            let stage = Arc::clone(&stage);
            let output = Arc::clone(&output);
            let mixers = Arc::clone(&mixers);
            let running = Arc::clone(&running);
            let tick_counter = Arc::clone(&tick_counter);
            let monitor = Arc::clone(&monitor);
            std::thread::Builder::new()
                .name(format!("channel-{index}-tick"))
                .spawn(move || run_tick_loop(index, stage, output, mixers, target_pixel_format, running, tick_counter, monitor))
                .expect("failed to spawn channel tick thread")
        };

        Arc::new(Channel {
            index,
            stage,
            output,
            mixers,
            target_pixel_format,
            tick_counter,
            monitor,
            running,
            thread: Some(thread),
        })
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// Exposed so the server can pass `Arc<Stage>` handles of two
    /// channels into `Stage::swap_layer`/`Stage::swap_channel` (§4.4).
    pub fn stage(&self) -> &Arc<Stage> {
        &self.stage
    }

    pub fn output(&self) -> &Arc<crate::output::Output> {
        &self.output
    }

    pub fn load(&self, layer: LayerIndex, producer: ProducerHandle, preview: bool, auto_play: bool) -> Reply<()> {
        self.stage.load(layer, producer, preview, auto_play)
    }

    pub fn play(&self, layer: LayerIndex, producer: Option<ProducerHandle>, transition: Option<TransitionSpec>) -> Reply<Result<(), StageError>> {
        self.stage.play(layer, producer, transition)
    }

    pub fn pause(&self, layer: LayerIndex) -> Reply<()> {
        self.stage.pause(layer)
    }

    pub fn resume(&self, layer: LayerIndex) -> Reply<()> {
        self.stage.resume(layer)
    }

    pub fn stop(&self, layer: LayerIndex) -> Reply<()> {
        self.stage.stop(layer)
    }

    pub fn clear_layer(&self, layer: LayerIndex) -> Reply<()> {
        self.stage.clear_layer(layer)
    }

    pub fn clear(&self) -> Reply<()> {
        self.stage.clear()
    }

    pub fn call(&self, layer: LayerIndex, params: Vec<String>) -> Reply<Result<String, crate::error::ProducerError>> {
        self.stage.call(layer, params)
    }

    pub fn apply_transforms(&self, ops: Vec<(LayerIndex, TransformFn, u64, Tween)>) -> Reply<()> {
        self.stage.apply_transforms(ops)
    }

    pub fn get_current_transform(&self, layer: LayerIndex) -> Reply<onair_core::FrameTransform> {
        self.stage.get_current_transform(layer)
    }

    /// `add_consumer(channel, port?, params)` (§6). Format is read under
    /// the channel's own mixer lock so attach sees the live format, not
    /// a stale snapshot from before a `set_format` race.
    pub fn add_consumer(&self, params: Vec<String>, consumer: ConsumerHandle, requested_port: Option<u32>) -> u32 {
        let format = self.mixers.lock().unwrap().format.clone();
        self.output.attach(format, params, consumer, requested_port)
    }

    pub fn remove_consumer_by_port(&self, port: u32) -> bool {
        self.output.detach_by_port(port)
    }

    pub fn remove_consumer_by_params(&self, params: &[String]) -> bool {
        self.output.detach_by_params(params)
    }

    /// `set_channel_format` (§6): rebuilds both mixers for the new
    /// geometry/cadence and reinitializes every attached consumer.
    pub fn set_format(&self, format: VideoFormat) {
        let mut mixers = self.mixers.lock().unwrap();
        mixers.image = ImageMixer::new(format!("channel-{}", self.index));
        mixers.audio = AudioMixer::new();
        mixers.format = format.clone();
        drop(mixers);
        self.output.reinitialize(format);
    }

    pub fn monitor_snapshot(&self) -> MonitorValue {
        self.monitor.lock().unwrap().clone()
    }

    pub fn tick_index(&self) -> u64 {
        self.tick_counter.load(Ordering::SeqCst)
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// The per-channel tick loop (§4.7):
/// 1. pace to the frame clock, unless a consumer supplies its own
/// 2. pull the tick's composited layer frames from the Stage
/// 3. build the video frame through the image mixer's draw tree
/// 4. mix the tick's audio through the audio mixer
/// 5. fan the combined frame out to every attached consumer
/// 6. publish a monitor snapshot
fn run_tick_loop(
    index: u32,
    stage: Arc<Stage>,
    output: Arc<crate::output::Output>,
    mixers: Arc<Mutex<ChannelMixers>>,
    target_pixel_format: PixelFormat,
    running: Arc<AtomicBool>,
    tick_counter: Arc<AtomicU64>,
    monitor: Arc<Mutex<MonitorValue>>,
) {
    let mut next_deadline = Instant::now();
    while running.load(Ordering::Acquire) {
        let format_snapshot = mixers.lock().unwrap().format.clone();
        let frame_duration = format_snapshot.frame_duration();

        if !output.has_synchronization_clock() {
            let now = Instant::now();
            if now < next_deadline {
                std::thread::sleep(next_deadline - now);
            }
            next_deadline = Instant::now() + frame_duration;
        } else {
            next_deadline = Instant::now() + frame_duration;
        }

        let tick_index = tick_counter.fetch_add(1, Ordering::SeqCst);
        let layer_frames = match stage.tick(tick_index, &format_snapshot.audio_cadence).wait_timeout(frame_duration * 4) {
            Ok(frames) => frames,
            Err(_) => {
                warn!("channel {index} stage tick {tick_index} timed out");
                Vec::new()
            }
        };

        let combined = {
            let mut mixers = mixers.lock().unwrap();
            mixers.image.begin_tick();
            for (_, frame) in &layer_frames {
                let transform = *frame.transform();
                mixers.image.push(transform);
                mixers.image.visit(frame.clone(), onair_core::FrameTransform::default());
                mixers.image.pop();
            }
            let video = mixers
                .image
                .render_frame(&format_snapshot, target_pixel_format, format!("channel-{index}-tick-{tick_index}"))
                .wait();

            let nb_samples = format_snapshot.audio_cadence.nb_samples_for_tick(tick_index);
            let channels = layer_frames.iter().map(|(_, f)| f.audio().channels).max().unwrap_or(1).max(1);
            let volumed: Vec<(AudioBuffer, f32)> = layer_frames.iter().map(|(_, f)| (f.audio().clone(), f.transform().audio.volume)).collect();
            let mixed_audio = mixers.audio.mix(channels, nb_samples, &volumed);
            video.with_audio(mixed_audio)
        };

        let deadline = frame_duration * 2;
        let events = output.publish(combined, deadline);

        let mut snapshot = MonitorValue::node();
        snapshot.set("tick", MonitorValue::leaf(tick_index.to_string()));
        snapshot.set("format", MonitorValue::leaf(format_snapshot.id.clone()));
        snapshot.set("layers", MonitorValue::leaf(layer_frames.len().to_string()));
        snapshot.set("consumers", output.state());
        snapshot.set("events", MonitorValue::leaf(format!("{events:?}")));
        *monitor.lock().unwrap() = snapshot;

        debug!("channel {index} tick {tick_index} published to {} consumer(s)", output.ports().len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::producer::ColorProducer;
    use crate::consumer::InMemorySinkConsumer;
    use onair_core::{Cadence, FieldMode};
    use std::time::Duration;

    fn fast_format() -> VideoFormat {
        VideoFormat {
            id: "fast-test".into(),
            width: 4,
            height: 4,
            square_width: 4,
            square_height: 4,
            field_mode: FieldMode::Progressive,
            time_scale: 1000,
            duration: 1,
            audio_sample_rate: 48_000,
            audio_cadence: Cadence::new(vec![48]),
        }
    }

    #[test]
    fn channel_ticks_and_publishes_frames_to_an_attached_consumer() {
        let channel = Channel::new(7, fast_format(), PixelFormat::Bgra);
        let sink = InMemorySinkConsumer::new("probe").handle();
        channel.add_consumer(vec![], sink.clone(), None);

        let rgba = ColorProducer::parse_hex("#ff0000").unwrap();
        let producer = ColorProducer::handle(4, 4, 2, rgba);
        channel.load(0, producer, false, true).wait();

        std::thread::sleep(Duration::from_millis(200));
        assert!(sink.frame_count() > 0);
    }

    #[test]
    fn set_format_reinitializes_attached_consumers() {
        let channel = Channel::new(8, fast_format(), PixelFormat::Bgra);
        let sink = InMemorySinkConsumer::new("probe").handle();
        channel.add_consumer(vec![], sink.clone(), None);

        let mut new_format = fast_format();
        new_format.id = "fast-test-2".into();
        channel.set_format(new_format);

        std::thread::sleep(Duration::from_millis(100));
        assert!(sink.frame_count() > 0);
    }
}
