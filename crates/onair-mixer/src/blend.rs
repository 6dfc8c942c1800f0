// crates/onair-mixer/src/blend.rs
//
// Per-channel blend-mode formulas (§3's `blend_mode` enumeration, §4.3
// step 2b). Each takes the backdrop and source channel values in
// [0,1] and returns the blended channel value; render.rs applies one of
// these per RGB channel, then composites the result over the backdrop
// using the source's own alpha.

use onair_core::BlendMode;

pub fn blend_channel(mode: BlendMode, backdrop: f32, source: f32) -> f32 {
    let (cb, cs) = (backdrop, source);
    match mode {
        BlendMode::Normal => cs,
        BlendMode::Lighten => cb.max(cs),
        BlendMode::Darken => cb.min(cs),
        BlendMode::Multiply => cb * cs,
        BlendMode::Average => (cb + cs) / 2.0,
        BlendMode::Add | BlendMode::LinearDodge => (cb + cs).min(1.0),
        BlendMode::Subtract => (cb - cs).max(0.0),
        BlendMode::Difference => (cb - cs).abs(),
        BlendMode::Negation => 1.0 - (1.0 - cb - cs).abs(),
        BlendMode::Exclusion => cb + cs - 2.0 * cb * cs,
        BlendMode::Screen => 1.0 - (1.0 - cb) * (1.0 - cs),
        BlendMode::Overlay => hard_light(cs, cb),
        BlendMode::SoftLight => soft_light(cb, cs),
        BlendMode::HardLight => hard_light(cb, cs),
        BlendMode::ColorDodge => color_dodge(cb, cs),
        BlendMode::ColorBurn => color_burn(cb, cs),
        BlendMode::LinearBurn => (cb + cs - 1.0).max(0.0),
        BlendMode::LinearLight => (cb + 2.0 * cs - 1.0).clamp(0.0, 1.0),
        BlendMode::VividLight => {
            if cs <= 0.5 {
                color_burn(cb, 2.0 * cs)
            } else {
                color_dodge(cb, 2.0 * (cs - 0.5))
            }
        }
        BlendMode::PinLight => {
            if cs <= 0.5 {
                cb.min(2.0 * cs)
            } else {
                cb.max(2.0 * (cs - 0.5))
            }
        }
        BlendMode::HardMix => {
            if vivid_light_input(cb, cs) < 1.0 {
                0.0
            } else {
                1.0
            }
        }
        BlendMode::Reflect => {
            if cs >= 1.0 {
                1.0
            } else {
                (cb * cb / (1.0 - cs)).min(1.0)
            }
        }
        BlendMode::Glow => {
            if cb >= 1.0 {
                1.0
            } else {
                (cs * cs / (1.0 - cb)).min(1.0)
            }
        }
        BlendMode::Phoenix => cb.min(cs) - cb.max(cs) + 1.0,
        // Contrast/Saturation/Color/Luminosity operate on the whole pixel
        // (they need luma/saturation across all three channels at once);
        // render.rs calls `blend_hsl_pixel` for these instead of this
        // per-channel path.
        BlendMode::Contrast | BlendMode::Saturation | BlendMode::Color | BlendMode::Luminosity => cs,
    }
}

fn hard_light(cb: f32, cs: f32) -> f32 {
    if cs <= 0.5 {
        2.0 * cb * cs
    } else {
        1.0 - 2.0 * (1.0 - cb) * (1.0 - cs)
    }
}

fn soft_light(cb: f32, cs: f32) -> f32 {
    if cs <= 0.5 {
        cb - (1.0 - 2.0 * cs) * cb * (1.0 - cb)
    } else {
        let d = if cb <= 0.25 {
            ((16.0 * cb - 12.0) * cb + 4.0) * cb
        } else {
            cb.sqrt()
        };
        cb + (2.0 * cs - 1.0) * (d - cb)
    }
}

fn color_dodge(cb: f32, cs: f32) -> f32 {
    if cb == 0.0 {
        0.0
    } else if cs >= 1.0 {
        1.0
    } else {
        (cb / (1.0 - cs)).min(1.0)
    }
}

fn color_burn(cb: f32, cs: f32) -> f32 {
    if cb >= 1.0 {
        1.0
    } else if cs == 0.0 {
        0.0
    } else {
        1.0 - ((1.0 - cb) / cs).min(1.0)
    }
}

fn vivid_light_input(cb: f32, cs: f32) -> f32 {
    if cs <= 0.5 {
        color_burn(cb, 2.0 * cs)
    } else {
        color_dodge(cb, 2.0 * (cs - 0.5))
    }
}

fn luma(rgb: [f32; 3]) -> f32 {
    0.299 * rgb[0] + 0.587 * rgb[1] + 0.114 * rgb[2]
}

fn clip_color(mut rgb: [f32; 3]) -> [f32; 3] {
    let l = luma(rgb);
    let min = rgb.iter().cloned().fold(f32::INFINITY, f32::min);
    let max = rgb.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    if min < 0.0 {
        rgb = rgb.map(|c| l + (c - l) * l / (l - min).max(1e-6));
    }
    if max > 1.0 {
        rgb = rgb.map(|c| l + (c - l) * (1.0 - l) / (max - l).max(1e-6));
    }
    rgb
}

fn set_luma(rgb: [f32; 3], target: f32) -> [f32; 3] {
    let diff = target - luma(rgb);
    clip_color(rgb.map(|c| c + diff))
}

fn saturation(rgb: [f32; 3]) -> f32 {
    let max = rgb.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let min = rgb.iter().cloned().fold(f32::INFINITY, f32::min);
    max - min
}

fn set_saturation(rgb: [f32; 3], target: f32) -> [f32; 3] {
    let mut idx = [0usize, 1, 2];
    idx.sort_by(|&a, &b| rgb[a].partial_cmp(&rgb[b]).unwrap());
    let (lo, mid, hi) = (idx[0], idx[1], idx[2]);
    let mut out = [0.0f32; 3];
    if rgb[hi] > rgb[lo] {
        out[mid] = (rgb[mid] - rgb[lo]) * target / (rgb[hi] - rgb[lo]);
        out[hi] = target;
    }
    out[lo] = 0.0;
    out
}

/// The HSL-composite blend modes (§3: Hue/Saturation/Color/Luminosity
/// family) need the whole RGB triple at once rather than a per-channel
/// formula. `mode` must be one of `Contrast, Saturation, Color,
/// Luminosity`; anything else returns `source` unchanged.
///
/// "Contrast" here names the HSL "Hue" blend mode (backdrop's
/// luma/saturation, source's hue); the name is kept as given rather than
/// renamed away from the blend-mode enum's established vocabulary.
pub fn blend_hsl_pixel(mode: BlendMode, backdrop: [f32; 3], source: [f32; 3]) -> [f32; 3] {
    match mode {
        BlendMode::Saturation => set_luma(set_saturation(backdrop, saturation(source)), luma(backdrop)),
        BlendMode::Color => set_luma(source, luma(backdrop)),
        BlendMode::Luminosity => set_luma(backdrop, luma(source)),
        BlendMode::Contrast => set_luma(set_saturation(source, saturation(backdrop)), luma(backdrop)),
        _ => source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_returns_source() {
        assert_eq!(blend_channel(BlendMode::Normal, 0.2, 0.9), 0.9);
    }

    #[test]
    fn multiply_black_is_black() {
        assert_eq!(blend_channel(BlendMode::Multiply, 0.0, 0.7), 0.0);
    }

    #[test]
    fn screen_white_is_white() {
        assert_eq!(blend_channel(BlendMode::Screen, 1.0, 0.3), 1.0);
    }

    #[test]
    fn difference_is_symmetric() {
        let a = blend_channel(BlendMode::Difference, 0.3, 0.8);
        let b = blend_channel(BlendMode::Difference, 0.8, 0.3);
        assert!((a - b).abs() < 1e-6);
    }

    #[test]
    fn add_saturates_at_one() {
        assert_eq!(blend_channel(BlendMode::Add, 0.8, 0.8), 1.0);
    }

    #[test]
    fn hard_light_midpoint_matches_overlay_swap() {
        let overlay = blend_channel(BlendMode::Overlay, 0.3, 0.6);
        let hard_light_swapped = blend_channel(BlendMode::HardLight, 0.6, 0.3);
        assert!((overlay - hard_light_swapped).abs() < 1e-6);
    }

    #[test]
    fn luminosity_preserves_backdrop_hue() {
        let out = blend_hsl_pixel(BlendMode::Luminosity, [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]);
        assert!(out[0] > out[1]);
        assert!(out[0] > out[2]);
    }

    #[test]
    fn non_hsl_mode_passes_source_through_hsl_path() {
        let out = blend_hsl_pixel(BlendMode::Normal, [0.1, 0.2, 0.3], [0.9, 0.8, 0.7]);
        assert_eq!(out, [0.9, 0.8, 0.7]);
    }
}
