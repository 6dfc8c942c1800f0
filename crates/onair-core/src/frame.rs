// crates/onair-core/src/frame.rs
//
// Frame & buffer model (C2). A frame is either under construction by a
// producer (`MutableFrame`, owned byte buffers) or committed and shared
// (`Frame`, reference-counted, immutable). Committing hands the planes
// to an `Arc` so the mixer, a preview consumer and a routing producer
// can all hold the same bytes without copying.

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::color::ColorSpace;
use crate::geometry::Geometry;
use crate::pixel::{PixelFormat, PixelFormatDesc};
use crate::transform::FrameTransform;

/// Opaque handle the mixer attaches to a const frame the first time it
/// uploads its bytes to the accelerator. This core crate never looks
/// inside it — onair-mixer's `CpuDevice` is the only thing that assigns
/// or interprets one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureHandle(pub u64);

/// Audio payload: interleaved f32 samples, `channels` wide.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioBuffer {
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl AudioBuffer {
    pub fn silence(channels: u16, nb_samples: u32) -> Self {
        Self {
            channels,
            samples: vec![0.0; channels as usize * nb_samples as usize],
        }
    }

    pub fn nb_frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }
}

/// A frame under construction by a producer: owned, mutable byte planes
/// plus an audio buffer. Built via the mixer's frame factory, populated,
/// then `commit()`-ed into a shareable `Frame`.
#[derive(Clone, Debug)]
pub struct MutableFrame {
    pub source_tag: String,
    pub pixel_desc: PixelFormatDesc,
    pub planes: Vec<Vec<u8>>,
    pub audio: AudioBuffer,
    pub geometry: Geometry,
    pub transform: FrameTransform,
    pub color_space: Option<ColorSpace>,
}

impl MutableFrame {
    pub fn new(source_tag: impl Into<String>, pixel_desc: PixelFormatDesc) -> Self {
        let planes = pixel_desc.planes.iter().map(|p| vec![0u8; p.size_bytes()]).collect();
        Self {
            source_tag: source_tag.into(),
            pixel_desc,
            planes,
            audio: AudioBuffer::default(),
            geometry: Geometry::default(),
            transform: FrameTransform::default(),
            color_space: None,
        }
    }

    /// Finalize into an immutable, reference-counted `Frame`. The owned
    /// byte planes move into `Arc`s; no copy.
    pub fn commit(self) -> Frame {
        Frame {
            inner: Arc::new(FrameInner {
                source_tag: self.source_tag,
                pixel_desc: self.pixel_desc,
                planes: self.planes.into_iter().map(Bytes::from).collect(),
                audio: self.audio,
                geometry: self.geometry,
                transform: self.transform,
                color_space: self.color_space,
                texture: None,
            }),
        }
    }
}

#[derive(Debug)]
struct FrameInner {
    source_tag: String,
    pixel_desc: PixelFormatDesc,
    planes: Vec<Bytes>,
    audio: AudioBuffer,
    geometry: Geometry,
    transform: FrameTransform,
    color_space: Option<ColorSpace>,
    texture: Option<TextureHandle>,
}

/// Immutable, reference-counted frame. Once committed its bytes and
/// texture handle never change — a `Frame` may be cheaply cloned and
/// shared across the mixer, a routing producer and preview consumers.
#[derive(Clone, Debug)]
pub struct Frame {
    inner: Arc<FrameInner>,
}

impl Frame {
    /// The distinguished empty frame: zero planes, no samples. Producers
    /// that cannot deliver in time return this rather than block the
    /// tick (§4.1).
    pub fn empty(source_tag: impl Into<String>) -> Frame {
        MutableFrame::new(source_tag, PixelFormatDesc::new(PixelFormat::Invalid, 0, 0)).commit()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.pixel_desc.format == PixelFormat::Invalid || self.inner.planes.is_empty()
    }

    pub fn source_tag(&self) -> &str {
        &self.inner.source_tag
    }

    pub fn pixel_desc(&self) -> &PixelFormatDesc {
        &self.inner.pixel_desc
    }

    pub fn planes(&self) -> &[Bytes] {
        &self.inner.planes
    }

    pub fn audio(&self) -> &AudioBuffer {
        &self.inner.audio
    }

    pub fn geometry(&self) -> &Geometry {
        &self.inner.geometry
    }

    pub fn transform(&self) -> &FrameTransform {
        &self.inner.transform
    }

    pub fn color_space(&self) -> ColorSpace {
        self.inner
            .color_space
            .unwrap_or_else(|| ColorSpace::from_height(self.inner.pixel_desc.planes.first().map_or(0, |p| p.height)))
    }

    pub fn texture(&self) -> Option<&TextureHandle> {
        self.inner.texture.as_ref()
    }

    /// Reattach a different transform without touching the pixel data —
    /// used when Stage pushes a Layer's current transform onto a frame
    /// it just pulled from a producer that doesn't know about transforms.
    pub fn with_transform(&self, transform: FrameTransform) -> Frame {
        Frame {
            inner: Arc::new(FrameInner {
                source_tag: self.inner.source_tag.clone(),
                pixel_desc: self.inner.pixel_desc.clone(),
                planes: self.inner.planes.clone(),
                audio: self.inner.audio.clone(),
                geometry: self.inner.geometry.clone(),
                transform,
                color_space: self.inner.color_space,
                texture: self.inner.texture.clone(),
            }),
        }
    }

    /// Reattach a different audio payload without touching the image
    /// planes — producers with a fixed pixel-only const frame (e.g. a
    /// color generator) reuse it every tick and only swap in the audio
    /// buffer whose length the channel's cadence dictates that tick.
    pub fn with_audio(&self, audio: AudioBuffer) -> Frame {
        Frame {
            inner: Arc::new(FrameInner {
                source_tag: self.inner.source_tag.clone(),
                pixel_desc: self.inner.pixel_desc.clone(),
                planes: self.inner.planes.clone(),
                audio,
                geometry: self.inner.geometry.clone(),
                transform: self.inner.transform,
                color_space: self.inner.color_space,
                texture: self.inner.texture.clone(),
            }),
        }
    }

    /// Record the mixer's upload handle onto an existing frame, the one
    /// mutation a committed frame is allowed: it doesn't touch pixel
    /// data, only caches where the bytes already live on the device.
    pub fn with_texture(&self, handle: TextureHandle) -> Frame {
        Frame {
            inner: Arc::new(FrameInner {
                source_tag: self.inner.source_tag.clone(),
                pixel_desc: self.inner.pixel_desc.clone(),
                planes: self.inner.planes.clone(),
                audio: self.inner.audio.clone(),
                geometry: self.inner.geometry.clone(),
                transform: self.inner.transform,
                color_space: self.inner.color_space,
                texture: Some(handle),
            }),
        }
    }
}
