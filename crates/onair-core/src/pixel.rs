// crates/onair-core/src/pixel.rs
//
// Pixel layouts a Frame's buffer can be in. The mixer's internal
// reference device always composites in planar float RGBA; this enum
// describes the layouts frames carry *into* and *out of* that pipeline
// (what a producer hands in, what a consumer asks to receive back).

use serde::{Deserialize, Serialize};

use crate::error::PixelFormatError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    Bgra,
    Rgba,
    Bgr,
    Rgb,
    Yuv420p,
    Yuv422p,
    Yuv444p,
    YCbCrA,
    Gray,
    Invalid,
}

impl PixelFormat {
    /// Number of image planes this layout is stored across.
    pub fn plane_count(self) -> usize {
        match self {
            PixelFormat::Bgra | PixelFormat::Rgba | PixelFormat::Bgr | PixelFormat::Rgb | PixelFormat::Gray => 1,
            PixelFormat::Yuv420p | PixelFormat::Yuv422p | PixelFormat::Yuv444p => 3,
            PixelFormat::YCbCrA => 4,
            PixelFormat::Invalid => 0,
        }
    }

    /// Bytes per sample in each plane (all planes uniform for every
    /// layout this engine supports).
    pub fn depth_bytes(self) -> usize {
        match self {
            PixelFormat::Invalid => 0,
            _ => 1,
        }
    }

    pub fn is_packed(self) -> bool {
        matches!(self, PixelFormat::Bgra | PixelFormat::Rgba | PixelFormat::Bgr | PixelFormat::Rgb | PixelFormat::Gray)
    }
}

/// One image plane's geometry within a `Frame` buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plane {
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub depth_bytes: usize,
}

impl Plane {
    pub fn size_bytes(&self) -> usize {
        self.stride as usize * self.height as usize
    }
}

/// Full description of how a `PixelFormat` lays out over one or more
/// `Plane`s for a given picture size, with chroma subsampling folded in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelFormatDesc {
    pub format: PixelFormat,
    pub planes: Vec<Plane>,
}

impl PixelFormatDesc {
    pub fn new(format: PixelFormat, width: u32, height: u32) -> Self {
        let planes = match format {
            PixelFormat::Bgra | PixelFormat::Rgba => vec![Plane { width, height, stride: width * 4, depth_bytes: 1 }],
            PixelFormat::Bgr | PixelFormat::Rgb => vec![Plane { width, height, stride: width * 3, depth_bytes: 1 }],
            PixelFormat::Gray => vec![Plane { width, height, stride: width, depth_bytes: 1 }],
            PixelFormat::Yuv420p => {
                let (cw, ch) = ((width + 1) / 2, (height + 1) / 2);
                vec![
                    Plane { width, height, stride: width, depth_bytes: 1 },
                    Plane { width: cw, height: ch, stride: cw, depth_bytes: 1 },
                    Plane { width: cw, height: ch, stride: cw, depth_bytes: 1 },
                ]
            }
            PixelFormat::Yuv422p => {
                let cw = (width + 1) / 2;
                vec![
                    Plane { width, height, stride: width, depth_bytes: 1 },
                    Plane { width: cw, height, stride: cw, depth_bytes: 1 },
                    Plane { width: cw, height, stride: cw, depth_bytes: 1 },
                ]
            }
            PixelFormat::Yuv444p => vec![
                Plane { width, height, stride: width, depth_bytes: 1 },
                Plane { width, height, stride: width, depth_bytes: 1 },
                Plane { width, height, stride: width, depth_bytes: 1 },
            ],
            PixelFormat::YCbCrA => vec![
                Plane { width, height, stride: width, depth_bytes: 1 },
                Plane { width, height, stride: width, depth_bytes: 1 },
                Plane { width, height, stride: width, depth_bytes: 1 },
                Plane { width, height, stride: width, depth_bytes: 1 },
            ],
            PixelFormat::Invalid => Vec::new(),
        };
        Self { format, planes }
    }

    pub fn validate(&self) -> Result<(), PixelFormatError> {
        let expected = self.format.plane_count();
        if self.planes.len() != expected {
            return Err(PixelFormatError::PlaneCountMismatch {
                format: self.format,
                expected,
                got: self.planes.len(),
            });
        }
        Ok(())
    }

    pub fn total_size_bytes(&self) -> usize {
        self.planes.iter().map(Plane::size_bytes).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bgra_is_single_packed_plane() {
        let desc = PixelFormatDesc::new(PixelFormat::Bgra, 4, 2);
        assert_eq!(desc.planes.len(), 1);
        assert_eq!(desc.planes[0].stride, 16);
        desc.validate().unwrap();
    }

    #[test]
    fn yuv420p_subsamples_chroma_planes() {
        let desc = PixelFormatDesc::new(PixelFormat::Yuv420p, 4, 4);
        assert_eq!(desc.planes.len(), 3);
        assert_eq!(desc.planes[1].width, 2);
        assert_eq!(desc.planes[1].height, 2);
    }

    #[test]
    fn odd_dimensions_round_chroma_up() {
        let desc = PixelFormatDesc::new(PixelFormat::Yuv420p, 5, 3);
        assert_eq!(desc.planes[1].width, 3);
        assert_eq!(desc.planes[1].height, 2);
    }

    #[test]
    fn plane_count_mismatch_is_detected() {
        let mut desc = PixelFormatDesc::new(PixelFormat::Yuv420p, 4, 4);
        desc.planes.pop();
        assert!(matches!(desc.validate(), Err(PixelFormatError::PlaneCountMismatch { .. })));
    }
}
