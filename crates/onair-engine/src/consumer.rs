// crates/onair-engine/src/consumer.rs
//
// The push-sink contract (C6, §4.2): `send(frame) -> Future<bool>` plus
// the declarations the channel needs around it (`initialize`,
// `buffer_depth`, `has_synchronization_clock`, `index`, `state`).
// Concrete consumers (SDI cards, screen output, file recorders) are
// external collaborators per §1; this module carries the contract and
// one primitive simple enough to live with it — an in-memory sink used
// by the control surface's preview path and by every integration test
// in `tests/scenarios.rs`.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use onair_core::{Frame, MonitorValue, Reply, VideoFormat};

use crate::error::ConsumerError;

pub type ConsumerHandle = Arc<dyn Consumer>;

/// Push interface the Output fan-out drives once per tick (§4.2).
/// `send` must not block past the fan-out's per-consumer deadline; a
/// consumer that cannot keep up should drop frames internally and keep
/// returning `Ok(true)`, or return `Ok(false)` to unlatch itself.
pub trait Consumer: Send + Sync {
    /// Called once when the consumer is attached to a channel. `port` is
    /// the consumer's stable key for the lifetime of the attachment.
    fn initialize(&self, format: VideoFormat, port: u32);

    /// Push a fully mixed frame. Resolves to `Ok(true)` to keep
    /// receiving frames, `Ok(false)` to self-remove.
    fn send(&self, frame: Frame) -> Reply<Result<bool, ConsumerError>>;

    /// Number of frames of warm-up the channel should replay to this
    /// consumer on attach (§4.7's output fan-out policy).
    fn buffer_depth(&self) -> usize {
        0
    }

    /// If `true`, this consumer becomes the channel's tick pacer instead
    /// of its internal precision timer (§4.7 step 1).
    fn has_synchronization_clock(&self) -> bool {
        false
    }

    /// Priority/ordering hint for fan-out (§4.2).
    fn index(&self) -> i32 {
        0
    }

    fn name(&self) -> &str;

    fn state(&self) -> MonitorValue {
        let mut node = MonitorValue::node();
        node.set("type", MonitorValue::leaf(self.name()));
        node
    }
}

/// Collects every frame sent to it, for assertions. Optionally sleeps
/// for a fixed delay before resolving `send`'s future, to drive the
/// consumer-backpressure scenario (S4) deterministically: three
/// consecutive sends that miss `2 * frame_duration` promote the
/// consumer to `ConsumerFatal` and it is detached (§4.7 step 5, §7).
pub struct InMemorySinkConsumer {
    name: String,
    frames: Mutex<Vec<Frame>>,
    buffer_depth: usize,
    artificial_delay: Option<Duration>,
    self_remove_after: Option<usize>,
    sent: AtomicUsize,
    initialized: AtomicBool,
}

impl InMemorySinkConsumer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            frames: Mutex::new(Vec::new()),
            buffer_depth: 0,
            artificial_delay: None,
            self_remove_after: None,
            sent: AtomicUsize::new(0),
            initialized: AtomicBool::new(false),
        }
    }

    pub fn with_buffer_depth(mut self, depth: usize) -> Self {
        self.buffer_depth = depth;
        self
    }

    /// Simulates a slow consumer: `send`'s future doesn't resolve until
    /// `delay` has elapsed, used by S4's backpressure scenario.
    pub fn with_artificial_delay(mut self, delay: Duration) -> Self {
        self.artificial_delay = Some(delay);
        self
    }

    /// Resolves `Ok(false)` (self-removal) starting on the `n`th send.
    pub fn self_removing_after(mut self, n: usize) -> Self {
        self.self_remove_after = Some(n);
        self
    }

    pub fn handle(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().unwrap().clone()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.lock().unwrap().len()
    }
}

impl Consumer for InMemorySinkConsumer {
    fn initialize(&self, _format: VideoFormat, _port: u32) {
        self.initialized.store(true, Ordering::SeqCst);
    }

    fn send(&self, frame: Frame) -> Reply<Result<bool, ConsumerError>> {
        let n = self.sent.fetch_add(1, Ordering::SeqCst) + 1;
        let keep_going = self.self_remove_after.map(|limit| n < limit).unwrap_or(true);

        if let Some(delay) = self.artificial_delay {
            let (tx, rx) = Reply::new();
            // The delay models the consumer's own slow I/O, not the
            // fan-out's bookkeeping — runs off-thread so it genuinely
            // blocks only the caller awaiting this reply.
            thread::spawn(move || {
                thread::sleep(delay);
                tx.send(Ok(keep_going));
            });
            return rx;
        }

        self.frames.lock().unwrap().push(frame);
        Reply::ready(Ok(keep_going))
    }

    fn buffer_depth(&self) -> usize {
        self.buffer_depth
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> MonitorValue {
        let mut node = MonitorValue::node();
        node.set("type", MonitorValue::leaf("in-memory-sink"));
        node.set("frames-received", MonitorValue::leaf(self.sent.load(Ordering::SeqCst)));
        node
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onair_core::{FieldMode, Cadence};

    fn test_format() -> VideoFormat {
        VideoFormat {
            id: "test".into(),
            width: 4,
            height: 4,
            square_width: 4,
            square_height: 4,
            field_mode: FieldMode::Progressive,
            time_scale: 25,
            duration: 1,
            audio_sample_rate: 48_000,
            audio_cadence: Cadence::new(vec![1920]),
        }
    }

    #[test]
    fn sink_collects_frames_in_order() {
        let sink = InMemorySinkConsumer::new("sink").handle();
        sink.initialize(test_format(), 1);
        for i in 0..5u8 {
            sink.send(Frame::empty(format!("f{i}"))).wait().unwrap();
        }
        let frames = sink.frames();
        assert_eq!(frames.len(), 5);
        assert_eq!(frames[2].source_tag(), "f2");
    }

    #[test]
    fn self_removing_consumer_reports_false_from_its_limit() {
        let sink = InMemorySinkConsumer::new("sink").self_removing_after(3).handle();
        assert!(sink.send(Frame::empty("a")).wait().unwrap());
        assert!(sink.send(Frame::empty("b")).wait().unwrap());
        assert!(!sink.send(Frame::empty("c")).wait().unwrap());
    }

    #[test]
    fn artificial_delay_still_resolves_eventually() {
        let sink = InMemorySinkConsumer::new("slow").with_artificial_delay(Duration::from_millis(5)).handle();
        assert!(sink.send(Frame::empty("a")).wait().unwrap());
    }
}
