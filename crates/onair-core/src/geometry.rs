// crates/onair-core/src/geometry.rs
//
// The vertex list a producer's items are drawn with, and the scale-mode
// policy that maps a producer's native resolution onto the channel's.
// Geometry itself never changes shape at render time — scale_mode is
// resolved into an extra fill_scale/fill_translation applied on top of
// whatever ImageTransform the layer carries (see transform.rs).

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub vertex_xy: [f32; 2],
    pub texture_uvst: [f32; 4],
}

impl Vertex {
    pub fn new(x: f32, y: f32, u: f32, v: f32) -> Self {
        Self {
            vertex_xy: [x, y],
            texture_uvst: [u, v, 0.0, 1.0],
        }
    }
}

/// A polygonal vertex list. Render-time geometry for an item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub vertices: Vec<Vertex>,
    pub scale_mode: ScaleMode,
}

impl Default for Geometry {
    /// The unit quad covering the full output, used unless a producer
    /// supplies a custom geometry (e.g. a multi-region layout producer).
    fn default() -> Self {
        Self::unit_quad()
    }
}

impl Geometry {
    pub fn unit_quad() -> Self {
        Self {
            scale_mode: ScaleMode::default(),
            vertices: vec![
                Vertex::new(0.0, 0.0, 0.0, 0.0),
                Vertex::new(1.0, 0.0, 1.0, 0.0),
                Vertex::new(1.0, 1.0, 1.0, 1.0),
                Vertex::new(0.0, 1.0, 0.0, 1.0),
            ],
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScaleMode {
    #[default]
    Stretch,
    Fit,
    FitCenter,
    Fill,
    FillCenter,
    Original,
    OriginalCenter,
    HFill,
    HFillCenter,
    VFill,
    VFillCenter,
}

impl ScaleMode {
    pub fn is_centered(self) -> bool {
        matches!(
            self,
            ScaleMode::FitCenter | ScaleMode::FillCenter | ScaleMode::OriginalCenter | ScaleMode::HFillCenter | ScaleMode::VFillCenter
        )
    }

    /// Extra `(fill_scale_x, fill_scale_y, fill_translation_x,
    /// fill_translation_y)` correction this scale mode contributes on top
    /// of whatever the layer's own transform already has, given
    /// `w_scale = channel_w / source_w` and `h_scale = channel_h / source_h`.
    pub fn apply(self, w_scale: f32, h_scale: f32) -> ScaleCorrection {
        let centered = self.is_centered();
        let (sx, sy) = match self {
            ScaleMode::Stretch => (1.0, 1.0),
            ScaleMode::Fit | ScaleMode::FitCenter => {
                let min = w_scale.min(h_scale);
                (min / w_scale, min / h_scale)
            }
            ScaleMode::Fill | ScaleMode::FillCenter => {
                let max = w_scale.max(h_scale);
                (max / w_scale, max / h_scale)
            }
            ScaleMode::Original | ScaleMode::OriginalCenter => (1.0 / w_scale, 1.0 / h_scale),
            ScaleMode::HFill | ScaleMode::HFillCenter => (h_scale / w_scale, 1.0),
            ScaleMode::VFill | ScaleMode::VFillCenter => (1.0, w_scale / h_scale),
        };

        let (tx, ty) = if centered {
            ((1.0 - sx) / 2.0, (1.0 - sy) / 2.0)
        } else {
            (0.0, 0.0)
        };

        ScaleCorrection {
            fill_scale: [sx, sy],
            fill_translation: [tx, ty],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScaleCorrection {
    pub fill_scale: [f32; 2],
    pub fill_translation: [f32; 2],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stretch_is_identity() {
        let c = ScaleMode::Stretch.apply(2.0, 0.5);
        assert_eq!(c.fill_scale, [1.0, 1.0]);
        assert_eq!(c.fill_translation, [0.0, 0.0]);
    }

    #[test]
    fn fit_uses_min_scale_and_centers() {
        // source is wider-relative than channel: w_scale < h_scale
        let c = ScaleMode::FitCenter.apply(0.5, 1.0);
        assert!((c.fill_scale[0] - 1.0).abs() < 1e-6);
        assert!((c.fill_scale[1] - 0.5).abs() < 1e-6);
        assert!((c.fill_translation[1] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn fill_uses_max_scale() {
        let c = ScaleMode::Fill.apply(0.5, 1.0);
        assert!((c.fill_scale[0] - 2.0).abs() < 1e-6);
        assert!((c.fill_scale[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn uncentered_variant_has_no_translation() {
        let c = ScaleMode::Fit.apply(0.5, 1.0);
        assert_eq!(c.fill_translation, [0.0, 0.0]);
    }

    #[test]
    fn hfill_equalizes_horizontal_axis() {
        let c = ScaleMode::HFill.apply(2.0, 4.0);
        assert!((c.fill_scale[0] - 2.0).abs() < 1e-6);
        assert_eq!(c.fill_scale[1], 1.0);
    }

    #[test]
    fn default_geometry_is_unit_quad() {
        let g = Geometry::default();
        assert_eq!(g.vertices.len(), 4);
        assert_eq!(g.vertices[0].vertex_xy, [0.0, 0.0]);
        assert_eq!(g.vertices[2].vertex_xy, [1.0, 1.0]);
    }
}
