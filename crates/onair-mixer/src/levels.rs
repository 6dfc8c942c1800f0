// crates/onair-mixer/src/levels.rs
//
// Per-pixel color correction stages from §4.3 step 4: Levels (input/output
// remap with gamma), then contrast/saturation/brightness (CSB), then an
// optional RGB invert. Each function operates on one normalized [0,1]
// RGB triple; render.rs calls them in sequence per pixel.

use onair_core::Levels;

pub fn apply_levels(rgb: [f32; 3], levels: &Levels) -> [f32; 3] {
    let span = (levels.max_input - levels.min_input).max(1e-6);
    let out_span = levels.max_output - levels.min_output;
    let gamma = levels.gamma.max(1e-6);

    rgb.map(|c| {
        let normalized = ((c - levels.min_input) / span).clamp(0.0, 1.0);
        let gamma_corrected = normalized.powf(1.0 / gamma);
        (levels.min_output + gamma_corrected * out_span).clamp(0.0, 1.0)
    })
}

/// Contrast pivots around mid-gray (0.5), brightness is additive,
/// saturation interpolates toward/away from the Rec.601 luma of the
/// pixel. All three are multiplicative knobs where `1.0` is identity.
pub fn apply_csb(rgb: [f32; 3], contrast: f32, saturation: f32, brightness: f32) -> [f32; 3] {
    let contrasted = rgb.map(|c| ((c - 0.5) * contrast + 0.5).clamp(0.0, 1.0));

    let luma = 0.299 * contrasted[0] + 0.587 * contrasted[1] + 0.114 * contrasted[2];
    let saturated = contrasted.map(|c| (luma + (c - luma) * saturation).clamp(0.0, 1.0));

    saturated.map(|c| (c * brightness).clamp(0.0, 1.0))
}

pub fn apply_invert(rgb: [f32; 3]) -> [f32; 3] {
    rgb.map(|c| 1.0 - c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_levels_is_identity() {
        let levels = Levels::default();
        let rgb = [0.2, 0.5, 0.9];
        let out = apply_levels(rgb, &levels);
        for (a, b) in rgb.iter().zip(out.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn levels_remaps_input_range() {
        let levels = Levels {
            min_input: 0.25,
            max_input: 0.75,
            gamma: 1.0,
            min_output: 0.0,
            max_output: 1.0,
        };
        let out = apply_levels([0.25, 0.5, 0.75], &levels);
        assert!((out[0] - 0.0).abs() < 1e-5);
        assert!((out[1] - 0.5).abs() < 1e-5);
        assert!((out[2] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn identity_csb_is_identity() {
        let rgb = [0.3, 0.6, 0.1];
        let out = apply_csb(rgb, 1.0, 1.0, 1.0);
        for (a, b) in rgb.iter().zip(out.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn zero_saturation_desaturates_to_luma() {
        let out = apply_csb([1.0, 0.0, 0.0], 1.0, 0.0, 1.0);
        assert!((out[0] - out[1]).abs() < 1e-5);
        assert!((out[1] - out[2]).abs() < 1e-5);
    }

    #[test]
    fn invert_flips_each_channel() {
        let out = apply_invert([0.2, 0.8, 1.0]);
        assert!((out[0] - 0.8).abs() < 1e-5);
        assert!((out[1] - 0.2).abs() < 1e-5);
        assert!((out[2] - 0.0).abs() < 1e-5);
    }
}
