// crates/onair-core/src/transform.rs
//
// The per-layer transform pipeline: ImageTransform (geometry + color
// pipeline parameters), AudioTransform (volume), and their pairing as
// FrameTransform. `combine` is the compositional operator Stage uses
// when a pushed sub-transform nests inside a layer's own transform —
// scales multiply, translations add in the parent's scaled space,
// opacities/volumes multiply, and discrete flags take the child's value.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Levels {
    pub min_input: f32,
    pub max_input: f32,
    pub gamma: f32,
    pub min_output: f32,
    pub max_output: f32,
}

impl Default for Levels {
    fn default() -> Self {
        Self {
            min_input: 0.0,
            max_input: 1.0,
            gamma: 1.0,
            min_output: 0.0,
            max_output: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chroma {
    pub enable: bool,
    pub show_mask: bool,
    pub target_hue: f32,
    pub hue_width: f32,
    pub min_saturation: f32,
    pub min_brightness: f32,
    pub softness: f32,
    pub spill_suppress: f32,
    pub spill_suppress_saturation: f32,
}

impl Default for Chroma {
    fn default() -> Self {
        Self {
            enable: false,
            show_mask: false,
            target_hue: 120.0,
            hue_width: 40.0,
            min_saturation: 0.2,
            min_brightness: 0.2,
            softness: 0.1,
            spill_suppress: 0.0,
            spill_suppress_saturation: 0.5,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlendMode {
    #[default]
    Normal,
    Lighten,
    Darken,
    Multiply,
    Average,
    Add,
    Subtract,
    Difference,
    Negation,
    Exclusion,
    Screen,
    Overlay,
    SoftLight,
    HardLight,
    ColorDodge,
    ColorBurn,
    LinearDodge,
    LinearBurn,
    LinearLight,
    VividLight,
    PinLight,
    HardMix,
    Reflect,
    Glow,
    Phoenix,
    Contrast,
    Saturation,
    Color,
    Luminosity,
}

impl BlendMode {
    pub fn is_normal(self) -> bool {
        matches!(self, BlendMode::Normal)
    }
}

/// Rectangular crop in normalized [0,1] coordinates, upper-left / lower-right.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub ul: [f32; 2],
    pub lr: [f32; 2],
}

impl Default for Rect {
    fn default() -> Self {
        Self {
            ul: [0.0, 0.0],
            lr: [1.0, 1.0],
        }
    }
}

/// Four-corner perspective warp, normalized [0,1] coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PerspectiveQuad {
    pub ul: [f32; 2],
    pub ur: [f32; 2],
    pub lr: [f32; 2],
    pub ll: [f32; 2],
}

impl Default for PerspectiveQuad {
    fn default() -> Self {
        Self {
            ul: [0.0, 0.0],
            ur: [1.0, 0.0],
            lr: [1.0, 1.0],
            ll: [0.0, 1.0],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageTransform {
    pub opacity: f32,
    pub contrast: f32,
    pub brightness: f32,
    pub saturation: f32,

    pub anchor: [f32; 2],
    pub fill_translation: [f32; 2],
    pub fill_scale: [f32; 2],
    pub clip_translation: [f32; 2],
    pub clip_scale: [f32; 2],
    pub angle: f32,

    pub rect: Rect,
    pub perspective: PerspectiveQuad,

    pub levels: Levels,
    pub chroma: Chroma,

    pub is_key: bool,
    pub invert: bool,
    pub is_mix: bool,

    pub blend_mode: BlendMode,
    pub layer_depth: i32,
}

impl Default for ImageTransform {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            contrast: 1.0,
            brightness: 1.0,
            saturation: 1.0,
            anchor: [0.0, 0.0],
            fill_translation: [0.0, 0.0],
            fill_scale: [1.0, 1.0],
            clip_translation: [0.0, 0.0],
            clip_scale: [1.0, 1.0],
            angle: 0.0,
            rect: Rect::default(),
            perspective: PerspectiveQuad::default(),
            levels: Levels::default(),
            chroma: Chroma::default(),
            is_key: false,
            invert: false,
            is_mix: false,
            blend_mode: BlendMode::default(),
            layer_depth: 0,
        }
    }
}

impl ImageTransform {
    /// `layer_depth` increments whenever this transform introduces a new
    /// compositing scope — keying, mixing or a non-normal blend mode all
    /// require their own intermediate render target (§4.3 step 2b).
    pub fn introduces_new_scope(&self) -> bool {
        self.is_key || self.is_mix || !self.blend_mode.is_normal()
    }

    /// Below this opacity an item contributes nothing visible and is
    /// skipped before it reaches the mixer (§4.3 edge cases).
    pub fn is_effectively_invisible(&self) -> bool {
        self.opacity < 1e-3
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioTransform {
    pub volume: f32,
}

impl AudioTransform {
    pub fn identity() -> Self {
        Self { volume: 1.0 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameTransform {
    pub image: ImageTransform,
    pub audio: AudioTransform,
}

impl Default for FrameTransform {
    fn default() -> Self {
        Self {
            image: ImageTransform::default(),
            audio: AudioTransform::identity(),
        }
    }
}

impl FrameTransform {
    /// Compose a parent transform with a nested (child, pushed) one.
    /// Scales multiply; translations add in the parent's already-scaled
    /// space; opacity and volume multiply; discrete flags take the
    /// child's value, since a nested `push` always speaks for the most
    /// specific scope.
    pub fn combine(parent: &FrameTransform, child: &FrameTransform) -> FrameTransform {
        let p = &parent.image;
        let c = &child.image;

        let fill_scale = [p.fill_scale[0] * c.fill_scale[0], p.fill_scale[1] * c.fill_scale[1]];
        let fill_translation = [
            p.fill_translation[0] + p.fill_scale[0] * c.fill_translation[0],
            p.fill_translation[1] + p.fill_scale[1] * c.fill_translation[1],
        ];
        let clip_scale = [p.clip_scale[0] * c.clip_scale[0], p.clip_scale[1] * c.clip_scale[1]];
        let clip_translation = [
            p.clip_translation[0] + p.clip_scale[0] * c.clip_translation[0],
            p.clip_translation[1] + p.clip_scale[1] * c.clip_translation[1],
        ];

        let image = ImageTransform {
            opacity: p.opacity * c.opacity,
            contrast: p.contrast * c.contrast,
            brightness: p.brightness * c.brightness,
            saturation: p.saturation * c.saturation,
            anchor: c.anchor,
            fill_translation,
            fill_scale,
            clip_translation,
            clip_scale,
            angle: p.angle + c.angle,
            rect: c.rect,
            perspective: c.perspective,
            levels: c.levels,
            chroma: c.chroma,
            is_key: c.is_key,
            invert: c.invert,
            is_mix: c.is_mix,
            blend_mode: c.blend_mode,
            layer_depth: p.layer_depth + if c.introduces_new_scope() { 1 } else { 0 },
        };

        let audio = AudioTransform {
            volume: parent.audio.volume * child.audio.volume,
        };

        FrameTransform { image, audio }
    }

    /// Interpolate every numeric field between `start` and `target` at
    /// normalized progress `t` (already eased by the caller's tweener).
    /// Discrete fields (`is_key`/`invert`/`is_mix`/`blend_mode`/
    /// `layer_depth`) have no notion of "partway" and snap to `target`'s
    /// value for any `t > 0` — used by Stage's `apply_transforms` to
    /// animate a Layer's transform tick by tick.
    pub fn lerp(start: &FrameTransform, target: &FrameTransform, t: f32) -> FrameTransform {
        let a = &start.image;
        let b = &target.image;
        let discrete = t > 0.0;

        let image = ImageTransform {
            opacity: lerp(a.opacity, b.opacity, t),
            contrast: lerp(a.contrast, b.contrast, t),
            brightness: lerp(a.brightness, b.brightness, t),
            saturation: lerp(a.saturation, b.saturation, t),
            anchor: lerp2(a.anchor, b.anchor, t),
            fill_translation: lerp2(a.fill_translation, b.fill_translation, t),
            fill_scale: lerp2(a.fill_scale, b.fill_scale, t),
            clip_translation: lerp2(a.clip_translation, b.clip_translation, t),
            clip_scale: lerp2(a.clip_scale, b.clip_scale, t),
            angle: lerp(a.angle, b.angle, t),
            rect: Rect {
                ul: lerp2(a.rect.ul, b.rect.ul, t),
                lr: lerp2(a.rect.lr, b.rect.lr, t),
            },
            perspective: PerspectiveQuad {
                ul: lerp2(a.perspective.ul, b.perspective.ul, t),
                ur: lerp2(a.perspective.ur, b.perspective.ur, t),
                lr: lerp2(a.perspective.lr, b.perspective.lr, t),
                ll: lerp2(a.perspective.ll, b.perspective.ll, t),
            },
            levels: Levels {
                min_input: lerp(a.levels.min_input, b.levels.min_input, t),
                max_input: lerp(a.levels.max_input, b.levels.max_input, t),
                gamma: lerp(a.levels.gamma, b.levels.gamma, t),
                min_output: lerp(a.levels.min_output, b.levels.min_output, t),
                max_output: lerp(a.levels.max_output, b.levels.max_output, t),
            },
            chroma: Chroma {
                enable: if discrete { b.chroma.enable } else { a.chroma.enable },
                show_mask: if discrete { b.chroma.show_mask } else { a.chroma.show_mask },
                target_hue: lerp(a.chroma.target_hue, b.chroma.target_hue, t),
                hue_width: lerp(a.chroma.hue_width, b.chroma.hue_width, t),
                min_saturation: lerp(a.chroma.min_saturation, b.chroma.min_saturation, t),
                min_brightness: lerp(a.chroma.min_brightness, b.chroma.min_brightness, t),
                softness: lerp(a.chroma.softness, b.chroma.softness, t),
                spill_suppress: lerp(a.chroma.spill_suppress, b.chroma.spill_suppress, t),
                spill_suppress_saturation: lerp(a.chroma.spill_suppress_saturation, b.chroma.spill_suppress_saturation, t),
            },
            is_key: if discrete { b.is_key } else { a.is_key },
            invert: if discrete { b.invert } else { a.invert },
            is_mix: if discrete { b.is_mix } else { a.is_mix },
            blend_mode: if discrete { b.blend_mode } else { a.blend_mode },
            layer_depth: if discrete { b.layer_depth } else { a.layer_depth },
        };

        let audio = AudioTransform {
            volume: lerp(start.audio.volume, target.audio.volume, t),
        };

        FrameTransform { image, audio }
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn lerp2(a: [f32; 2], b: [f32; 2], t: f32) -> [f32; 2] {
    [lerp(a[0], b[0], t), lerp(a[1], b[1], t)]
}
