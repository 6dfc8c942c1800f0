// crates/onair-engine/src/output.rs
//
// Output fan-out (C10, §4.2/§4.7): the per-channel consumer multiplexer.
// Holds the attached consumers, replays warm-up frames to new ones, and
// enforces the `2 * frame_duration` per-consumer deadline on every
// published frame, promoting three consecutive misses to a fatal detach
// (§7). Also keeps the short frame history new consumers warm up from.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use log::{info, warn};
use onair_core::{Frame, MonitorValue, VideoFormat};

use crate::consumer::ConsumerHandle;
use crate::error::ConsumerError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ConsumerStatus {
    Active,
    TransientLate,
}

/// Outcome of publishing one frame to one consumer, folded into the
/// channel's per-tick monitor snapshot and logged at the level §4.9
/// assigns each case.
#[derive(Debug)]
pub enum ConsumerEvent {
    Delivered,
    TransientLate,
    SelfRemoved,
    Fatal(ConsumerError),
}

struct Entry {
    port: u32,
    params: Vec<String>,
    consumer: ConsumerHandle,
    status: ConsumerStatus,
    consecutive_late: u32,
}

pub struct Output {
    channel_index: u32,
    entries: Mutex<Vec<Entry>>,
    history: Mutex<VecDeque<Frame>>,
    next_port: AtomicU32,
}

impl Output {
    pub fn new(channel_index: u32) -> Self {
        Self {
            channel_index,
            entries: Mutex::new(Vec::new()),
            history: Mutex::new(VecDeque::new()),
            next_port: AtomicU32::new(1),
        }
    }

    /// `add_consumer(channel, port?, params)` (§6): initializes the
    /// consumer, replays its declared `buffer_depth` of warm-up frames
    /// synchronously, then joins the steady stream.
    pub fn attach(&self, format: VideoFormat, params: Vec<String>, consumer: ConsumerHandle, requested_port: Option<u32>) -> u32 {
        let port = requested_port.unwrap_or_else(|| self.next_port.fetch_add(1, Ordering::SeqCst));
        consumer.initialize(format, port);

        let depth = consumer.buffer_depth();
        if depth > 0 {
            let warm_up: Vec<Frame> = {
                let history = self.history.lock().unwrap();
                let skip = history.len().saturating_sub(depth);
                history.iter().skip(skip).cloned().collect()
            };
            for frame in warm_up {
                let _ = consumer.send(frame).wait();
            }
        }

        info!("channel {} consumer '{}' attached at port {port}", self.channel_index, consumer.name());
        self.entries.lock().unwrap().push(Entry {
            port,
            params,
            consumer,
            status: ConsumerStatus::Active,
            consecutive_late: 0,
        });
        port
    }

    /// Drains the consumer's outstanding send (there isn't one in this
    /// synchronous design beyond the in-flight `publish` call) and
    /// removes it, per §4.7's "drains its outstanding future before
    /// returning" fan-out policy.
    pub fn detach_by_port(&self, port: u32) -> bool {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|e| e.port != port);
        let removed = entries.len() != before;
        if removed {
            info!("channel {} consumer at port {port} detached", self.channel_index);
        }
        removed
    }

    pub fn detach_by_params(&self, params: &[String]) -> bool {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|e| e.params != params);
        let removed = entries.len() != before;
        if removed {
            info!("channel {} consumer matching {params:?} detached", self.channel_index);
        }
        removed
    }

    pub fn has_synchronization_clock(&self) -> bool {
        self.entries.lock().unwrap().iter().any(|e| e.consumer.has_synchronization_clock())
    }

    /// `set_channel_format` (§6): re-`initialize` every attached consumer
    /// on a format change, without disturbing attachment/port identity.
    pub fn reinitialize(&self, format: VideoFormat) {
        for entry in self.entries.lock().unwrap().iter() {
            entry.consumer.initialize(format.clone(), entry.port);
        }
    }

    /// Push `frame` into the warm-up history and fan it out to every
    /// attached consumer, concurrently, each under `deadline` (§4.7 step
    /// 4-5). Fatal/self-removing/three-times-late consumers are dropped
    /// from the active set; the rest carry on next tick.
    pub fn publish(&self, frame: Frame, deadline: Duration) -> Vec<(u32, ConsumerEvent)> {
        {
            let mut history = self.history.lock().unwrap();
            history.push_back(frame.clone());
            while history.len() > 32 {
                history.pop_front();
            }
        }

        let pending: Vec<(u32, onair_core::Reply<Result<bool, ConsumerError>>)> = {
            let entries = self.entries.lock().unwrap();
            entries.iter().map(|e| (e.port, e.consumer.send(frame.clone()))).collect()
        };

        let mut events = Vec::with_capacity(pending.len());
        let mut to_remove = Vec::new();
        let mut late_ports = Vec::new();

        for (port, reply) in pending {
            match reply.wait_timeout(deadline) {
                Ok(Ok(true)) => events.push((port, ConsumerEvent::Delivered)),
                Ok(Ok(false)) => {
                    to_remove.push(port);
                    events.push((port, ConsumerEvent::SelfRemoved));
                }
                Ok(Err(ConsumerError::Transient(p, detail))) => {
                    warn!("channel {} consumer at port {p} transient: {detail}", self.channel_index);
                    late_ports.push(port);
                    events.push((port, ConsumerEvent::TransientLate));
                }
                Ok(Err(e)) => {
                    to_remove.push(port);
                    events.push((port, ConsumerEvent::Fatal(e)));
                }
                Err(_timeout) => {
                    late_ports.push(port);
                    events.push((port, ConsumerEvent::TransientLate));
                }
            }
        }

        let mut entries = self.entries.lock().unwrap();
        for port in &late_ports {
            if let Some(entry) = entries.iter_mut().find(|e| e.port == *port) {
                entry.status = ConsumerStatus::TransientLate;
                entry.consecutive_late += 1;
                if entry.consecutive_late >= 3 {
                    to_remove.push(*port);
                }
            }
        }
        for port in entries.iter().filter(|e| !late_ports.contains(&e.port)).map(|e| e.port).collect::<Vec<_>>() {
            if let Some(entry) = entries.iter_mut().find(|e| e.port == port) {
                entry.status = ConsumerStatus::Active;
                entry.consecutive_late = 0;
            }
        }
        if !to_remove.is_empty() {
            for port in &to_remove {
                log::error!("channel {} consumer at port {port} detached (fatal/self-removed/3x late)", self.channel_index);
            }
            entries.retain(|e| !to_remove.contains(&e.port));
        }

        events
    }

    pub fn ports(&self) -> Vec<u32> {
        self.entries.lock().unwrap().iter().map(|e| e.port).collect()
    }

    pub fn state(&self) -> MonitorValue {
        let mut node = MonitorValue::node();
        for entry in self.entries.lock().unwrap().iter() {
            let mut consumer_node = entry.consumer.state();
            consumer_node.set("status", MonitorValue::leaf(if entry.status == ConsumerStatus::Active { "active" } else { "transient-late" }));
            node.set(format!("consumer/{}", entry.port), consumer_node);
        }
        node
    }
}
