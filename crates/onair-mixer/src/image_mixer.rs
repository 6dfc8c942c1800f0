// crates/onair-mixer/src/image_mixer.rs
//
// Public image mixer facade (C3): frame factory, the push/visit/pop
// draw-tree DSL, and `render`. One instance per channel; `push`/`visit`/
// `pop` are called from the Stage's tick (already single-threaded via
// its own queue), so this type itself needs no internal locking — only
// `render`'s device work is handed to the mixer's own queue thread.

use std::sync::Arc;

use onair_core::{ColorSpace, Frame, FrameTransform, MutableFrame, PixelFormat, PixelFormatDesc, Reply, VideoFormat};

use crate::convert::convert_from_rgba;
use crate::device::{CpuDevice, Device, DeviceThread};
use crate::item::TreeBuilder;

pub struct ImageMixer {
    device: Arc<dyn Device>,
    device_thread: DeviceThread,
    builder: TreeBuilder,
}

impl ImageMixer {
    pub fn new(channel_name: impl Into<String>) -> Self {
        Self {
            device: Arc::new(CpuDevice::new()),
            device_thread: DeviceThread::spawn(format!("{}-mixer", channel_name.into())),
            builder: TreeBuilder::new(),
        }
    }

    /// `create_frame(tag, pixel_format_desc) -> MutableFrame` from §4.3.
    pub fn create_frame(&self, tag: impl Into<String>, pixel_desc: PixelFormatDesc) -> MutableFrame {
        MutableFrame::new(tag, pixel_desc)
    }

    /// Begin a new tree for the tick. Must be called once before the
    /// first `push`/`visit` of a tick; any tree left over from a prior
    /// tick is dropped.
    pub fn begin_tick(&mut self) {
        self.builder = TreeBuilder::new();
    }

    pub fn push(&mut self, transform: FrameTransform) {
        self.builder.push(transform);
    }

    pub fn visit(&mut self, frame: Frame, transform: FrameTransform) {
        self.builder.visit(frame, transform);
    }

    pub fn pop(&mut self) {
        self.builder.pop();
    }

    pub fn push_depth(&self) -> usize {
        self.builder.depth()
    }

    /// Render the tree built so far into the channel format's native
    /// pixel layout, asynchronously on the device thread, per §4.3's
    /// `render(format) -> Future<Bytes>`.
    pub fn render(&mut self, format: &VideoFormat, target_pixel_format: PixelFormat) -> Reply<Vec<u8>> {
        let tree = std::mem::replace(&mut self.builder, TreeBuilder::new()).finish();
        let device = Arc::clone(&self.device);
        let (width, height) = (format.width, format.height);
        let color_space = ColorSpace::from_height(height);

        self.device_thread
            .queue()
            .submit(move || {
                let composited = device.composite(&tree, width, height);
                let (_, planes) = convert_from_rgba(&composited.rgba, width, height, target_pixel_format, color_space);
                planes.into_iter().flatten().collect()
            })
            .unwrap_or_else(|_| Reply::ready(Vec::new()))
    }

    /// Same composite as `render`, but keeps the per-plane structure
    /// instead of flattening into one byte blob — what `Channel::tick`
    /// needs to hand consumers a proper `Frame` (§4.7 step 3) rather
    /// than a raw buffer.
    pub fn render_frame(&mut self, format: &VideoFormat, target_pixel_format: PixelFormat, tag: impl Into<String>) -> Reply<Frame> {
        let tree = std::mem::replace(&mut self.builder, TreeBuilder::new()).finish();
        let device = Arc::clone(&self.device);
        let (width, height) = (format.width, format.height);
        let color_space = ColorSpace::from_height(height);
        let tag = tag.into();

        self.device_thread
            .queue()
            .submit(move || {
                let composited = device.composite(&tree, width, height);
                let (desc, planes) = convert_from_rgba(&composited.rgba, width, height, target_pixel_format, color_space);
                let mut mf = MutableFrame::new(tag, desc);
                mf.planes = planes;
                mf.color_space = Some(color_space);
                mf.commit()
            })
            .unwrap_or_else(|_| Reply::ready(Frame::empty("mixer-shutdown")))
    }
}
