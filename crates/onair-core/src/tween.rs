// crates/onair-core/src/tween.rs
//
// Named easing functions used by Stage's `apply_transforms` to animate a
// Layer's transform over a fixed number of frames, and by Basic
// transitions to animate their progress. Every family below is the
// standard Penner equation for that curve; `elastic`/`back` take an
// optional amplitude/period or overshoot parameter, parsed off the name
// as a `:p0[:p1]` suffix (e.g. `"easeinelastic:1.5:0.4"`).

use std::f32::consts::PI;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
#[error("unknown tweener: {0}")]
pub struct UnknownTweener(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Family {
    Linear,
    Quad,
    Cubic,
    Quart,
    Quint,
    Sine,
    Expo,
    Circ,
    Elastic,
    Back,
    Bounce,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Variant {
    In,
    Out,
    InOut,
    OutIn,
}

/// A fully resolved named tween: a curve family, a variant, and the
/// optional numeric parameters `elastic`/`back` take.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tween {
    family: Family,
    variant: Variant,
    p0: f32,
    p1: f32,
}

impl Tween {
    pub fn linear() -> Self {
        Self {
            family: Family::Linear,
            variant: Variant::In,
            p0: 0.0,
            p1: 0.0,
        }
    }

    /// Evaluate the curve at time `t` over `[0, duration]`, interpolating
    /// from `begin` to `begin + change`.
    pub fn ease(&self, t: f32, begin: f32, change: f32, duration: f32) -> f32 {
        if duration <= 0.0 {
            return begin + change;
        }
        let n = (t / duration).clamp(0.0, 1.0);
        begin + change * self.unit(n)
    }

    /// The curve evaluated on normalized progress `n ∈ [0,1]`, ignoring
    /// begin/change/duration — what the Basic transition uses directly.
    pub fn unit(&self, n: f32) -> f32 {
        let n = n.clamp(0.0, 1.0);
        match self.variant {
            Variant::In => self.ease_in(n),
            Variant::Out => 1.0 - self.ease_in(1.0 - n),
            Variant::InOut => {
                if n < 0.5 {
                    self.ease_in(2.0 * n) / 2.0
                } else {
                    1.0 - self.ease_in(2.0 * (1.0 - n)) / 2.0
                }
            }
            Variant::OutIn => {
                if n < 0.5 {
                    (1.0 - self.ease_in(1.0 - 2.0 * n)) / 2.0
                } else {
                    0.5 + self.ease_in(2.0 * n - 1.0) / 2.0
                }
            }
        }
    }

    /// The base `ease-in` shape each family defines; `unit` builds the
    /// other three variants from this by reflection/splicing.
    fn ease_in(&self, n: f32) -> f32 {
        match self.family {
            Family::Linear => n,
            Family::Quad => n * n,
            Family::Cubic => n * n * n,
            Family::Quart => n.powi(4),
            Family::Quint => n.powi(5),
            Family::Sine => 1.0 - (n * PI / 2.0).cos(),
            Family::Expo => {
                if n == 0.0 {
                    0.0
                } else {
                    2f32.powf(10.0 * (n - 1.0))
                }
            }
            Family::Circ => 1.0 - (1.0 - n * n).max(0.0).sqrt(),
            Family::Elastic => self.elastic_in(n),
            Family::Back => self.back_in(n),
            Family::Bounce => 1.0 - self.bounce_out(1.0 - n),
        }
    }

    fn elastic_in(&self, n: f32) -> f32 {
        if n == 0.0 || n == 1.0 {
            return n;
        }
        let amplitude = if self.p0 > 0.0 { self.p0 } else { 1.0 };
        let period = if self.p1 > 0.0 { self.p1 } else { 0.3 };
        let s = if amplitude < 1.0 {
            period / 4.0
        } else {
            period / (2.0 * PI) * (1.0 / amplitude).asin()
        };
        let n = n - 1.0;
        -(amplitude * 2f32.powf(10.0 * n) * ((n - s) * 2.0 * PI / period).sin())
    }

    fn back_in(&self, n: f32) -> f32 {
        let overshoot = if self.p0 != 0.0 { self.p0 } else { 1.70158 };
        n * n * ((overshoot + 1.0) * n - overshoot)
    }

    fn bounce_out(&self, n: f32) -> f32 {
        if n < 1.0 / 2.75 {
            7.5625 * n * n
        } else if n < 2.0 / 2.75 {
            let n = n - 1.5 / 2.75;
            7.5625 * n * n + 0.75
        } else if n < 2.5 / 2.75 {
            let n = n - 2.25 / 2.75;
            7.5625 * n * n + 0.9375
        } else {
            let n = n - 2.625 / 2.75;
            7.5625 * n * n + 0.984375
        }
    }
}

impl FromStr for Tween {
    type Err = UnknownTweener;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let name = parts.next().unwrap_or("").to_ascii_lowercase();
        let p0: f32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0.0);
        let p1: f32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0.0);

        if name == "linear" || name == "none" {
            return Ok(Tween::linear());
        }

        let (family_part, variant_part) = split_variant(&name).ok_or_else(|| UnknownTweener(s.to_string()))?;

        let family = match family_part {
            "quad" => Family::Quad,
            "cubic" => Family::Cubic,
            "quart" => Family::Quart,
            "quint" => Family::Quint,
            "sine" => Family::Sine,
            "expo" => Family::Expo,
            "circ" => Family::Circ,
            "elastic" => Family::Elastic,
            "back" => Family::Back,
            "bounce" => Family::Bounce,
            _ => return Err(UnknownTweener(s.to_string())),
        };

        let variant = match variant_part {
            "in" => Variant::In,
            "out" => Variant::Out,
            "inout" => Variant::InOut,
            "outin" => Variant::OutIn,
            _ => return Err(UnknownTweener(s.to_string())),
        };

        Ok(Tween { family, variant, p0, p1 })
    }
}

/// Splits e.g. `"easeinoutelastic"` into `("elastic", "inout")`. Names
/// follow the `ease<variant><family>` convention; variant is tried
/// longest-match-first so `inout`/`outin` aren't swallowed by `in`/`out`.
fn split_variant(name: &str) -> Option<(&str, &'static str)> {
    let rest = name.strip_prefix("ease")?;
    for (prefix, tag) in [("inout", "inout"), ("outin", "outin"), ("in", "in"), ("out", "out")] {
        if let Some(family) = rest.strip_prefix(prefix) {
            if !family.is_empty() {
                return Some((family, tag));
            }
        }
    }
    None
}
