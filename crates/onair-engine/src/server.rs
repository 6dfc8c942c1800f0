// crates/onair-engine/src/server.rs
//
// `PlayoutServer` (§6): the external-interface facade an operator or
// control surface talks to. Owns the channel table, the format
// registry, and the producer/consumer factory registries; forwards
// stage/consumer ops to the named channel and arbitrates cross-channel
// swaps through `Stage::swap_layer`/`Stage::swap_channel`.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

use onair_core::{MonitorValue, PixelFormat, Reply, Tween, VideoFormat, VideoFormatRegistry};

use crate::channel::Channel;
use crate::consumer::ConsumerHandle;
use crate::error::{EngineError, StageError};
use crate::layer::LayerIndex;
use crate::producer::ProducerHandle;
use crate::registry::{ConsumerRegistry, ProducerRegistry};
use crate::stage::TransformFn;
use crate::transition::TransitionSpec;

pub type ChannelHandle = Arc<Channel>;

pub struct PlayoutServer {
    channels: RwLock<BTreeMap<u32, ChannelHandle>>,
    formats: Mutex<VideoFormatRegistry>,
    producers: Mutex<ProducerRegistry>,
    consumers: Mutex<ConsumerRegistry>,
    target_pixel_format: PixelFormat,
}

impl PlayoutServer {
    /// An engine starts with the stock format table (§3's named
    /// cadences) and empty factory registries; callers add their own
    /// producer/consumer kinds via `register_producer`/`register_consumer`.
    pub fn new(target_pixel_format: PixelFormat) -> Self {
        Self {
            channels: RwLock::new(BTreeMap::new()),
            formats: Mutex::new(VideoFormatRegistry::with_stock_formats()),
            producers: Mutex::new(ProducerRegistry::new()),
            consumers: Mutex::new(ConsumerRegistry::new()),
            target_pixel_format,
        }
    }

    pub fn register_format(&self, format: VideoFormat) -> Result<(), EngineError> {
        self.formats.lock().unwrap().upsert(format).map_err(|e| EngineError::Format(e.to_string()))
    }

    pub fn register_producer_factory(&self, factory: crate::registry::ProducerFactory) {
        self.producers.lock().unwrap().register(factory);
    }

    pub fn register_consumer_factory(&self, factory: crate::registry::ConsumerFactory) {
        self.consumers.lock().unwrap().register(factory);
    }

    pub fn build_producer(&self, channel_index: u32, params: &[String]) -> Option<ProducerHandle> {
        self.producers.lock().unwrap().build(channel_index, params)
    }

    pub fn build_consumer(&self, channel_index: u32, params: &[String]) -> Option<ConsumerHandle> {
        self.consumers.lock().unwrap().build(channel_index, params)
    }

    /// `create_channel(index, format_id) -> ChannelHandle` (§6). Fails if
    /// `index` already exists or `format_id` is unknown.
    pub fn create_channel(&self, index: u32, format_id: &str) -> Result<ChannelHandle, EngineError> {
        let mut channels = self.channels.write().unwrap();
        if channels.contains_key(&index) {
            return Err(EngineError::ChannelAlreadyExists(index));
        }
        let format = self.formats.lock().unwrap().get(format_id).map_err(|e| EngineError::Format(e.to_string()))?.clone();
        let channel = Channel::new(index, format, self.target_pixel_format);
        channels.insert(index, Arc::clone(&channel));
        Ok(channel)
    }

    pub fn channel(&self, index: u32) -> Result<ChannelHandle, EngineError> {
        self.channels.read().unwrap().get(&index).cloned().ok_or(EngineError::UnknownChannel(index))
    }

    pub fn remove_channel(&self, index: u32) -> Result<(), EngineError> {
        self.channels.write().unwrap().remove(&index).map(|_| ()).ok_or(EngineError::UnknownChannel(index))
    }

    /// `set_channel_format` (§6): tears down and rebuilds the channel's
    /// mixers for the new format id and reinitializes its consumers.
    pub fn set_channel_format(&self, index: u32, format_id: &str) -> Result<(), EngineError> {
        let channel = self.channel(index)?;
        let format = self.formats.lock().unwrap().get(format_id).map_err(|e| EngineError::Format(e.to_string()))?.clone();
        channel.set_format(format);
        Ok(())
    }

    pub fn load(&self, channel: u32, layer: LayerIndex, producer: ProducerHandle, preview: bool, auto_play: bool) -> Result<Reply<()>, EngineError> {
        Ok(self.channel(channel)?.load(layer, producer, preview, auto_play))
    }

    pub fn play(&self, channel: u32, layer: LayerIndex, producer: Option<ProducerHandle>, transition: Option<TransitionSpec>) -> Result<Reply<Result<(), StageError>>, EngineError> {
        Ok(self.channel(channel)?.play(layer, producer, transition))
    }

    pub fn pause(&self, channel: u32, layer: LayerIndex) -> Result<Reply<()>, EngineError> {
        Ok(self.channel(channel)?.pause(layer))
    }

    pub fn resume(&self, channel: u32, layer: LayerIndex) -> Result<Reply<()>, EngineError> {
        Ok(self.channel(channel)?.resume(layer))
    }

    pub fn stop(&self, channel: u32, layer: LayerIndex) -> Result<Reply<()>, EngineError> {
        Ok(self.channel(channel)?.stop(layer))
    }

    pub fn clear_layer(&self, channel: u32, layer: LayerIndex) -> Result<Reply<()>, EngineError> {
        Ok(self.channel(channel)?.clear_layer(layer))
    }

    pub fn clear(&self, channel: u32) -> Result<Reply<()>, EngineError> {
        Ok(self.channel(channel)?.clear())
    }

    pub fn call(&self, channel: u32, layer: LayerIndex, params: Vec<String>) -> Result<Reply<Result<String, crate::error::ProducerError>>, EngineError> {
        Ok(self.channel(channel)?.call(layer, params))
    }

    pub fn apply_transforms(&self, channel: u32, ops: Vec<(LayerIndex, TransformFn, u64, Tween)>) -> Result<Reply<()>, EngineError> {
        Ok(self.channel(channel)?.apply_transforms(ops))
    }

    pub fn get_current_transform(&self, channel: u32, layer: LayerIndex) -> Result<Reply<onair_core::FrameTransform>, EngineError> {
        Ok(self.channel(channel)?.get_current_transform(layer))
    }

    /// `swap_layer`/`swap_channel` (§4.4): reached through the two
    /// channels' own `Arc<Stage>` handles, so Stage's ascending-index
    /// locking order is what prevents deadlock here, not this facade.
    pub fn swap_layer(&self, channel_a: u32, layer_a: LayerIndex, channel_b: u32, layer_b: LayerIndex, swap_transforms: bool) -> Result<Reply<()>, EngineError> {
        let a = self.channel(channel_a)?;
        let b = self.channel(channel_b)?;
        Ok(crate::stage::Stage::swap_layer(a.stage(), layer_a, b.stage(), layer_b, swap_transforms))
    }

    pub fn swap_channel(&self, channel_a: u32, channel_b: u32, swap_transforms: bool) -> Result<Reply<()>, EngineError> {
        let a = self.channel(channel_a)?;
        let b = self.channel(channel_b)?;
        Ok(crate::stage::Stage::swap_channel(a.stage(), b.stage(), swap_transforms))
    }

    /// `add_consumer(channel, port?, params)` (§6): returns the assigned
    /// port.
    pub fn add_consumer(&self, channel: u32, params: Vec<String>, consumer: ConsumerHandle, requested_port: Option<u32>) -> Result<u32, EngineError> {
        Ok(self.channel(channel)?.add_consumer(params, consumer, requested_port))
    }

    pub fn remove_consumer_by_port(&self, channel: u32, port: u32) -> Result<bool, EngineError> {
        Ok(self.channel(channel)?.remove_consumer_by_port(port))
    }

    pub fn remove_consumer_by_params(&self, channel: u32, params: &[String]) -> Result<bool, EngineError> {
        Ok(self.channel(channel)?.remove_consumer_by_params(params))
    }

    /// Monitor subscribe interface (§6): a snapshot per channel, folded
    /// into one nested tree keyed by channel index.
    pub fn monitor_snapshot(&self) -> MonitorValue {
        let mut root = MonitorValue::node();
        for (index, channel) in self.channels.read().unwrap().iter() {
            root.set(index.to_string(), channel.monitor_snapshot());
        }
        root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_channel_rejects_a_duplicate_index() {
        let server = PlayoutServer::new(PixelFormat::Bgra);
        server.create_channel(1, "PAL").unwrap();
        assert!(matches!(server.create_channel(1, "PAL"), Err(EngineError::ChannelAlreadyExists(1))));
    }

    #[test]
    fn create_channel_rejects_an_unknown_format() {
        let server = PlayoutServer::new(PixelFormat::Bgra);
        assert!(matches!(server.create_channel(1, "nonexistent"), Err(EngineError::Format(_))));
    }

    #[test]
    fn stage_ops_on_an_unknown_channel_return_unknown_channel() {
        let server = PlayoutServer::new(PixelFormat::Bgra);
        assert!(matches!(server.pause(99, 0), Err(EngineError::UnknownChannel(99))));
    }

    #[test]
    fn monitor_snapshot_has_an_entry_per_channel() {
        let server = PlayoutServer::new(PixelFormat::Bgra);
        server.create_channel(1, "PAL").unwrap();
        server.create_channel(2, "PAL").unwrap();
        let snapshot = server.monitor_snapshot();
        assert!(snapshot.get("1").is_some());
        assert!(snapshot.get("2").is_some());
    }
}
