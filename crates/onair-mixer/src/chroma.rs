// crates/onair-mixer/src/chroma.rs
//
// Chroma key (§4.3 step 5): convert to HSV, build a smoothstep mask
// around `target_hue` gated by minimum saturation/brightness and
// softened by `softness`, then suppress color spill near the key hue on
// pixels the mask doesn't fully keep.

use onair_core::Chroma;

fn rgb_to_hsv(rgb: [f32; 3]) -> [f32; 3] {
    let [r, g, b] = rgb;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue = if delta < 1e-6 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };

    let saturation = if max < 1e-6 { 0.0 } else { delta / max };
    [hue, saturation, max]
}

fn hsv_to_rgb(hsv: [f32; 3]) -> [f32; 3] {
    let [h, s, v] = hsv;
    let c = v * s;
    let h_prime = (h.rem_euclid(360.0)) / 60.0;
    let x = c * (1.0 - (h_prime.rem_euclid(2.0) - 1.0).abs());
    let (r1, g1, b1) = match h_prime as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = v - c;
    [r1 + m, g1 + m, b1 + m]
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    if (edge1 - edge0).abs() < 1e-6 {
        return if x < edge0 { 0.0 } else { 1.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn hue_distance(hue: f32, target: f32) -> f32 {
    let d = (hue - target).rem_euclid(360.0);
    d.min(360.0 - d)
}

/// Alpha multiplier in `[0,1]` this pixel's chroma key contributes: 0
/// means "fully keyed out" (background), 1 means "fully kept"
/// (foreground). `chroma.softness` widens the transition band at the
/// edge of `hue_width`.
pub fn key_mask(rgb: [f32; 3], chroma: &Chroma) -> f32 {
    if !chroma.enable {
        return 1.0;
    }
    let hsv = rgb_to_hsv(rgb);
    let distance = hue_distance(hsv[0], chroma.target_hue);

    let hue_gate = smoothstep(
        chroma.hue_width / 2.0,
        chroma.hue_width / 2.0 + chroma.softness.max(1e-6) * chroma.hue_width.max(1.0),
        distance,
    );
    let saturation_gate = if hsv[1] >= chroma.min_saturation { 1.0 } else { 0.0 };
    let brightness_gate = if hsv[2] >= chroma.min_brightness { 1.0 } else { 0.0 };

    let keyed_out = (1.0 - hue_gate) * saturation_gate * brightness_gate;
    1.0 - keyed_out
}

/// Desaturate pixels whose hue falls within `spill_suppress` of the key
/// hue, scaling saturation by `spill_suppress_saturation`. Applied after
/// the mask so spill on the kept (foreground) side of the edge is
/// cleaned up without affecting pixels far from the key color.
pub fn suppress_spill(rgb: [f32; 3], chroma: &Chroma) -> [f32; 3] {
    if !chroma.enable || chroma.spill_suppress <= 0.0 {
        return rgb;
    }
    let mut hsv = rgb_to_hsv(rgb);
    let distance = hue_distance(hsv[0], chroma.target_hue);
    if distance <= chroma.spill_suppress {
        hsv[1] *= chroma.spill_suppress_saturation;
    }
    hsv_to_rgb(hsv)
}

/// Per §4.3 step 5's `show_mask` flag: replace the pixel with the mask
/// value as luma for a matte preview.
pub fn mask_as_luma(mask: f32) -> [f32; 3] {
    [mask, mask, mask]
}
