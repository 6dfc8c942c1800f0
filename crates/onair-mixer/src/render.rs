// crates/onair-mixer/src/render.rs
//
// The CPU reference rasterizer: turns a `Layer` tree (item.rs) into one
// composited RGBA float buffer, following §4.3's algorithm steps 1-5.
// Transform *composition* already happened upstream (Stage combines a
// layer's transform with whatever it pushes before calling `visit`), so
// every `Item` here already carries its final, resolved
// `FrameTransform` — this module only has to place and color each item,
// and decide which subtrees need their own intermediate target.

use onair_core::{BlendMode, ImageTransform};

use crate::blend::{blend_channel, blend_hsl_pixel};
use crate::chroma::{key_mask, mask_as_luma, suppress_spill};
use crate::convert::frame_to_rgba;
use crate::item::{Item, Layer};
use crate::levels::{apply_csb, apply_invert, apply_levels};

const OPACITY_EPSILON: f32 = 1e-3;

/// A float RGBA render target, row-major, straight (non-premultiplied)
/// alpha.
#[derive(Clone, Debug)]
pub struct RenderTarget {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<f32>,
}

impl RenderTarget {
    pub fn transparent(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            rgba: vec![0.0; width as usize * height as usize * 4],
        }
    }

    fn pixel_mut(&mut self, x: u32, y: u32) -> &mut [f32] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        &mut self.rgba[i..i + 4]
    }
}

/// Render a finished `Layer` tree onto a fresh transparent target of the
/// given channel dimensions (§4.3 step 1).
pub fn render_tree(root: &Layer, width: u32, height: u32) -> RenderTarget {
    let mut target = RenderTarget::transparent(width, height);
    render_into(root, &mut target);
    target
}

/// Draw `node`'s own items directly into `target`, then for each
/// sublayer either blend it through its own intermediate (if it opened
/// a new compositing scope) or flatten it straight into `target`
/// (§4.3 step 2).
fn render_into(node: &Layer, target: &mut RenderTarget) {
    for item in &node.items {
        draw_item(item, target);
    }

    for sub in &node.sublayers {
        let needs_scope = sub.transform.as_ref().map(|t| t.image.introduces_new_scope()).unwrap_or(false);
        if needs_scope {
            let mut intermediate = RenderTarget::transparent(target.width, target.height);
            render_into(sub, &mut intermediate);
            let blend_mode = sub.transform.as_ref().map(|t| t.image.blend_mode).unwrap_or_default();
            blend_onto(target, &intermediate, blend_mode);
        } else {
            render_into(sub, target);
        }
    }
}

/// Blend one fully-rendered layer's buffer onto another using the given
/// blend mode, straight-alpha "over" compositing with the blended color
/// (§4.3 step 2b).
pub fn blend_onto(target: &mut RenderTarget, source: &RenderTarget, mode: BlendMode) {
    for i in 0..(target.width as usize * target.height as usize) {
        let base = i * 4;
        let backdrop = [target.rgba[base], target.rgba[base + 1], target.rgba[base + 2]];
        let src = [source.rgba[base], source.rgba[base + 1], source.rgba[base + 2]];
        let src_alpha = source.rgba[base + 3];
        if src_alpha < OPACITY_EPSILON {
            continue;
        }

        let blended = if matches!(mode, BlendMode::Contrast | BlendMode::Saturation | BlendMode::Color | BlendMode::Luminosity) {
            blend_hsl_pixel(mode, backdrop, src)
        } else {
            [
                blend_channel(mode, backdrop[0], src[0]),
                blend_channel(mode, backdrop[1], src[1]),
                blend_channel(mode, backdrop[2], src[2]),
            ]
        };

        let backdrop_alpha = target.rgba[base + 3];
        let out_alpha = src_alpha + backdrop_alpha * (1.0 - src_alpha);
        for c in 0..3 {
            target.rgba[base + c] = blended[c] * src_alpha + backdrop[c] * (1.0 - src_alpha);
        }
        target.rgba[base + 3] = out_alpha.clamp(0.0, 1.0);
    }
}

/// Place and color one item, compositing it "over" `target` (§4.3 steps
/// 3-5). Items below the opacity epsilon, or whose frame has no pixels,
/// contribute nothing and are skipped.
fn draw_item(item: &Item, target: &mut RenderTarget) {
    let image = &item.transform.image;
    if image.is_effectively_invisible() {
        return;
    }

    let source_w = item.pixel_desc.planes.first().map_or(0, |p| p.width);
    let source_h = item.pixel_desc.planes.first().map_or(0, |p| p.height);
    if source_w == 0 || source_h == 0 {
        return;
    }

    let source_rgba = frame_to_rgba(&item.frame);
    if source_rgba.is_empty() {
        return;
    }

    let placement = Placement::resolve(image, &item.geometry, source_w, source_h, target.width, target.height);

    let (min_x, min_y, max_x, max_y) = placement.bounding_box(target.width, target.height);
    if min_x >= max_x || min_y >= max_y {
        return;
    }

    for y in min_y..max_y {
        for x in min_x..max_x {
            let out_u = (x as f32 + 0.5) / target.width as f32;
            let out_v = (y as f32 + 0.5) / target.height as f32;

            let Some((local_u, local_v)) = placement.inverse(out_u, out_v) else {
                continue;
            };
            if !(0.0..=1.0).contains(&local_u) || !(0.0..=1.0).contains(&local_v) {
                continue;
            }

            let crop_u = image.clip_translation[0] + local_u * image.clip_scale[0];
            let crop_v = image.clip_translation[1] + local_v * image.clip_scale[1];
            if !(0.0..=1.0).contains(&crop_u) || !(0.0..=1.0).contains(&crop_v) {
                continue;
            }

            let sx = ((crop_u * source_w as f32) as u32).min(source_w - 1);
            let sy = ((crop_v * source_h as f32) as u32).min(source_h - 1);
            let si = (sy as usize * source_w as usize + sx as usize) * 4;
            let mut rgb = [source_rgba[si], source_rgba[si + 1], source_rgba[si + 2]];
            let src_alpha = source_rgba[si + 3];

            rgb = apply_levels(rgb, &image.levels);
            rgb = apply_csb(rgb, image.contrast, image.saturation, image.brightness);
            if image.invert {
                rgb = apply_invert(rgb);
            }

            let mask = key_mask(rgb, &image.chroma);
            if image.chroma.show_mask {
                rgb = mask_as_luma(mask);
            } else {
                rgb = suppress_spill(rgb, &image.chroma);
            }

            let alpha = (src_alpha * mask * image.opacity).clamp(0.0, 1.0);
            if alpha < OPACITY_EPSILON {
                continue;
            }

            let px = target.pixel_mut(x, y);
            let backdrop = [px[0], px[1], px[2]];
            let backdrop_alpha = px[3];
            let out_alpha = alpha + backdrop_alpha * (1.0 - alpha);
            for c in 0..3 {
                px[c] = rgb[c] * alpha + backdrop[c] * (1.0 - alpha);
            }
            px[3] = out_alpha.clamp(0.0, 1.0);
        }
    }
}

/// Resolved affine placement of an item's unit square onto the output
/// canvas: scale-mode correction folded together with
/// anchor/scale/rotate/translate, order per §4.3 step 3. A rectangular
/// crop or perspective quad is evaluated as a further remap inside
/// `inverse`, not baked into the matrix.
struct Placement {
    // Forward matrix mapping a point in the item's local [0,1]^2 space
    // (already anchor-shifted) to normalized output space.
    matrix: [[f32; 3]; 2],
    perspective: Option<onair_core::PerspectiveQuad>,
}

impl Placement {
    fn resolve(image: &ImageTransform, geometry: &onair_core::Geometry, source_w: u32, source_h: u32, channel_w: u32, channel_h: u32) -> Placement {
        let w_scale = channel_w as f32 / source_w as f32;
        let h_scale = channel_h as f32 / source_h as f32;
        let correction = geometry.scale_mode.apply(w_scale, h_scale);

        let scale_x = image.fill_scale[0] * correction.fill_scale[0];
        let scale_y = image.fill_scale[1] * correction.fill_scale[1];
        let translate_x = image.fill_translation[0] + correction.fill_translation[0];
        let translate_y = image.fill_translation[1] + correction.fill_translation[1];

        let (sin, cos) = image.angle.sin_cos();
        let anchor = image.anchor;

        // p' = R * S * (p - anchor) + anchor + translate
        let matrix = [
            [cos * scale_x, -sin * scale_y, anchor[0] - cos * scale_x * anchor[0] + sin * scale_y * anchor[1] + translate_x],
            [sin * scale_x, cos * scale_y, anchor[1] - sin * scale_x * anchor[0] - cos * scale_y * anchor[1] + translate_y],
        ];

        let default_quad = onair_core::PerspectiveQuad::default();
        let perspective = if image.perspective == default_quad { None } else { Some(image.perspective) };

        Placement { matrix, perspective }
    }

    fn forward(&self, u: f32, v: f32) -> (f32, f32) {
        if let Some(q) = &self.perspective {
            let x = bilerp(q.ul[0], q.ur[0], q.ll[0], q.lr[0], u, v);
            let y = bilerp(q.ul[1], q.ur[1], q.ll[1], q.lr[1], u, v);
            return (x, y);
        }
        let m = &self.matrix;
        (m[0][0] * u + m[0][1] * v + m[0][2], m[1][0] * u + m[1][1] * v + m[1][2])
    }

    fn bounding_box(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let corners = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)].map(|(u, v)| self.forward(u, v));
        let min_u = corners.iter().fold(f32::INFINITY, |acc, &(x, _)| acc.min(x)).max(0.0);
        let max_u = corners.iter().fold(f32::NEG_INFINITY, |acc, &(x, _)| acc.max(x)).min(1.0);
        let min_v = corners.iter().fold(f32::INFINITY, |acc, &(_, y)| acc.min(y)).max(0.0);
        let max_v = corners.iter().fold(f32::NEG_INFINITY, |acc, &(_, y)| acc.max(y)).min(1.0);

        let min_x = (min_u * width as f32).floor().max(0.0) as u32;
        let max_x = (max_u * width as f32).ceil().min(width as f32) as u32;
        let min_y = (min_v * height as f32).floor().max(0.0) as u32;
        let max_y = (max_v * height as f32).ceil().min(height as f32) as u32;
        (min_x, min_y, max_x, max_y)
    }

    /// Inverse of `forward` for the affine (non-perspective) case, via
    /// the closed-form 2x2 inverse. Perspective placement uses a coarse
    /// Newton iteration instead, since the quad-to-quad map isn't affine.
    fn inverse(&self, out_u: f32, out_v: f32) -> Option<(f32, f32)> {
        if self.perspective.is_some() {
            return self.inverse_perspective(out_u, out_v);
        }
        let m = &self.matrix;
        let det = m[0][0] * m[1][1] - m[0][1] * m[1][0];
        if det.abs() < 1e-9 {
            return None;
        }
        let dx = out_u - m[0][2];
        let dy = out_v - m[1][2];
        let u = (m[1][1] * dx - m[0][1] * dy) / det;
        let v = (-m[1][0] * dx + m[0][0] * dy) / det;
        Some((u, v))
    }

    fn inverse_perspective(&self, out_u: f32, out_v: f32) -> Option<(f32, f32)> {
        let mut u = 0.5;
        let mut v = 0.5;
        for _ in 0..8 {
            let (fx, fy) = self.forward(u, v);
            let ex = out_u - fx;
            let ey = out_v - fy;
            if ex.abs() < 1e-4 && ey.abs() < 1e-4 {
                break;
            }
            let h = 1e-3;
            let (fx_u, fy_u) = self.forward(u + h, v);
            let (fx_v, fy_v) = self.forward(u, v + h);
            let j = [[(fx_u - fx) / h, (fx_v - fx) / h], [(fy_u - fy) / h, (fy_v - fy) / h]];
            let det = j[0][0] * j[1][1] - j[0][1] * j[1][0];
            if det.abs() < 1e-9 {
                return None;
            }
            let du = (j[1][1] * ex - j[0][1] * ey) / det;
            let dv = (-j[1][0] * ex + j[0][0] * ey) / det;
            u += du;
            v += dv;
        }
        Some((u, v))
    }
}

fn bilerp(ul: f32, ur: f32, ll: f32, lr: f32, u: f32, v: f32) -> f32 {
    let top = ul + (ur - ul) * u;
    let bottom = ll + (lr - ll) * u;
    top + (bottom - top) * v
}

#[cfg(test)]
mod tests {
    use super::*;
    use onair_core::{FrameTransform, Geometry, MutableFrame, PixelFormat, PixelFormatDesc};

    fn solid_item(rgb: [u8; 3], alpha: u8, size: u32) -> Item {
        let mut mf = MutableFrame::new("t", PixelFormatDesc::new(PixelFormat::Rgba, size, size));
        for px in mf.planes[0].chunks_mut(4) {
            px[0] = rgb[0];
            px[1] = rgb[1];
            px[2] = rgb[2];
            px[3] = alpha;
        }
        let frame = mf.commit();
        Item::from_frame(frame, FrameTransform::default())
    }

    #[test]
    fn identity_transform_fills_target_with_source_color() {
        let item = solid_item([255, 0, 0], 255, 4);
        let mut target = RenderTarget::transparent(4, 4);
        draw_item(&item, &mut target);
        let px = &target.rgba[0..4];
        assert!((px[0] - 1.0).abs() < 0.02);
        assert!((px[3] - 1.0).abs() < 0.02);
    }

    #[test]
    fn low_opacity_item_is_skipped() {
        let mut item = solid_item([0, 255, 0], 255, 2);
        item.transform.image.opacity = 0.0001;
        let mut target = RenderTarget::transparent(2, 2);
        draw_item(&item, &mut target);
        assert_eq!(target.rgba, vec![0.0; 2 * 2 * 4]);
    }

    #[test]
    fn half_scale_leaves_far_corner_untouched() {
        let mut item = solid_item([0, 0, 255], 255, 4);
        item.transform.image.fill_scale = [0.5, 0.5];
        let mut target = RenderTarget::transparent(4, 4);
        draw_item(&item, &mut target);
        let far = &target.rgba[(3 * 4 + 3) * 4..(3 * 4 + 3) * 4 + 4];
        assert_eq!(far[3], 0.0);
    }

    #[test]
    fn render_tree_flattens_normal_sublayers() {
        let mut root = Layer::root();
        let mut sub = Layer::root();
        sub.transform = Some(FrameTransform::default());
        sub.items.push(solid_item([255, 255, 255], 255, 2));
        root.sublayers.push(sub);

        let target = render_tree(&root, 2, 2);
        assert!((target.rgba[0] - 1.0).abs() < 0.02);
    }

    #[test]
    fn non_normal_blend_mode_opens_its_own_scope_and_blends() {
        let mut root = Layer::root();
        root.items.push(solid_item([100, 100, 100], 255, 2));

        let mut sub = Layer::root();
        let mut t = FrameTransform::default();
        t.image.blend_mode = BlendMode::Multiply;
        sub.transform = Some(t);
        sub.items.push(solid_item([255, 255, 255], 255, 2));
        root.sublayers.push(sub);

        let target = render_tree(&root, 2, 2);
        let base = 100.0 / 255.0;
        assert!((target.rgba[0] - base).abs() < 0.05, "multiply by white should leave backdrop unchanged, got {}", target.rgba[0]);
    }

    #[test]
    fn chroma_keyed_green_item_contributes_no_alpha() {
        let mut item = solid_item([0, 255, 0], 255, 2);
        item.transform.image.chroma.enable = true;
        item.transform.image.chroma.target_hue = 120.0;
        let mut target = RenderTarget::transparent(2, 2);
        draw_item(&item, &mut target);
        assert_eq!(target.rgba[3], 0.0);
    }
}
