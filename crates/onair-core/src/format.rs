// crates/onair-core/src/format.rs
//
// Video format registry (component C1). A VideoFormat is an immutable
// record of everything a channel's tick needs to know about its output
// cadence: resolution, field mode, time base, and the audio sample
// cadence that keeps 48 kHz audio locked to a non-integer frame rate
// like 29.97 or 59.94 fps.
//
// The audio cadence values below are the bit-exact sample counts per
// video frame for each named broadcast format. Getting these wrong
// means audio drifts out of sync with video over a long broadcast, so
// they are covered by a unit test per format rather than trusted by
// inspection.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::FormatError;

pub const AUDIO_SAMPLE_RATE: u32 = 48_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldMode {
    Progressive,
    Upper,
    Lower,
}

/// Periodic sequence of per-frame audio sample counts. `samples()[tick %
/// samples().len()]` gives the sample quota for a given tick.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cadence(Vec<u32>);

impl Cadence {
    pub fn new(samples: Vec<u32>) -> Self {
        Self(samples)
    }

    pub fn samples(&self) -> &[u32] {
        &self.0
    }

    pub fn period_len(&self) -> usize {
        self.0.len()
    }

    /// Sample quota for tick `n` (0-based, wraps around the cadence period).
    pub fn nb_samples_for_tick(&self, n: u64) -> u32 {
        self.0[(n as usize) % self.0.len()]
    }

    /// Sum of one full period, in samples. A period is `period_len()`
    /// frames, not one second — checking this against the sample rate
    /// requires scaling by the format's frame rate (see `validate()`).
    pub fn period_sum(&self) -> u64 {
        self.0.iter().map(|&s| s as u64).sum()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VideoFormat {
    pub id: String,
    pub width: u32,
    pub height: u32,
    pub square_width: u32,
    pub square_height: u32,
    pub field_mode: FieldMode,
    pub time_scale: u32,
    pub duration: u32,
    pub audio_sample_rate: u32,
    pub audio_cadence: Cadence,
}

impl VideoFormat {
    /// Frames (or fields, for interlaced modes counted as whole frames)
    /// per second as an exact rational, and as an f64 for display/timing.
    pub fn frame_rate(&self) -> f64 {
        self.time_scale as f64 / self.duration as f64
    }

    pub fn frame_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.duration as f64 / self.time_scale as f64)
    }

    /// A cadence period is `period_len()` frames, not one second, so the
    /// per-period sample sum only needs to equal the sample rate once
    /// scaled by the frame rate: `period_sum * time_scale == sample_rate
    /// * duration * period_len` (samples in a period = sample_rate ×
    /// period_frames / fps), cross-multiplied to stay in integers.
    pub fn validate(&self) -> Result<(), FormatError> {
        let period_len = self.audio_cadence.period_len() as u64;
        let lhs = self.audio_cadence.period_sum() * self.time_scale as u64;
        let rhs = self.audio_sample_rate as u64 * self.duration as u64 * period_len;
        if lhs != rhs {
            return Err(FormatError::InvalidCadence {
                format: self.id.clone(),
                sum: lhs,
                expected: rhs,
            });
        }
        Ok(())
    }

    fn new(
        id: &str,
        width: u32,
        height: u32,
        square_width: u32,
        square_height: u32,
        field_mode: FieldMode,
        time_scale: u32,
        duration: u32,
        cadence: &[u32],
    ) -> Self {
        Self {
            id: id.to_string(),
            width,
            height,
            square_width,
            square_height,
            field_mode,
            time_scale,
            duration,
            audio_sample_rate: AUDIO_SAMPLE_RATE,
            audio_cadence: Cadence::new(cadence.to_vec()),
        }
    }
}

/// Table of known `VideoFormat`s, keyed by id. Pre-populated with the
/// stock broadcast formats; `register_format` adds more at runtime.
pub struct VideoFormatRegistry {
    formats: HashMap<String, VideoFormat>,
}

impl Default for VideoFormatRegistry {
    fn default() -> Self {
        Self::with_stock_formats()
    }
}

impl VideoFormatRegistry {
    pub fn empty() -> Self {
        Self {
            formats: HashMap::new(),
        }
    }

    /// The stock broadcast formats (PAL, NTSC, and the common HD/UHD
    /// interlaced and progressive variants) a real deployment needs out
    /// of the box.
    pub fn with_stock_formats() -> Self {
        let mut reg = Self::empty();
        for fmt in stock_formats() {
            reg.register(fmt).expect("stock formats must be well-formed and unique");
        }
        reg
    }

    pub fn register(&mut self, format: VideoFormat) -> Result<(), FormatError> {
        format.validate()?;
        if self.formats.contains_key(&format.id) {
            return Err(FormatError::AlreadyRegistered(format.id));
        }
        log::info!("registered video format {} ({}x{} @{:.2}fps)", format.id, format.width, format.height, format.frame_rate());
        self.formats.insert(format.id.clone(), format);
        Ok(())
    }

    /// Replace an existing format in place (used by tests / reconfiguration
    /// flows); unlike `register` this does not error if the id exists.
    pub fn upsert(&mut self, format: VideoFormat) -> Result<(), FormatError> {
        format.validate()?;
        self.formats.insert(format.id.clone(), format);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<&VideoFormat, FormatError> {
        self.formats
            .get(id)
            .ok_or_else(|| FormatError::UnknownFormat(id.to_string()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.formats.keys().map(String::as_str)
    }
}

fn stock_formats() -> Vec<VideoFormat> {
    vec![
        VideoFormat::new("PAL", 720, 576, 1024, 576, FieldMode::Lower, 25, 1, &[1920]),
        VideoFormat::new(
            "NTSC",
            720,
            486,
            720,
            540,
            FieldMode::Lower,
            30000,
            1001,
            &[1601, 1602, 1601, 1602, 1602],
        ),
        VideoFormat::new("720p50", 1280, 720, 1280, 720, FieldMode::Progressive, 50, 1, &[960]),
        VideoFormat::new(
            "720p5994",
            1280,
            720,
            1280,
            720,
            FieldMode::Progressive,
            60000,
            1001,
            &[800, 801, 801, 801, 801],
        ),
        VideoFormat::new("720p60", 1280, 720, 1280, 720, FieldMode::Progressive, 60, 1, &[800]),
        VideoFormat::new("1080i50", 1920, 1080, 1920, 1080, FieldMode::Upper, 25, 1, &[1920]),
        VideoFormat::new(
            "1080i5994",
            1920,
            1080,
            1920,
            1080,
            FieldMode::Upper,
            30000,
            1001,
            &[1601, 1602, 1601, 1602, 1602],
        ),
        VideoFormat::new(
            "1080p2997",
            1920,
            1080,
            1920,
            1080,
            FieldMode::Progressive,
            30000,
            1001,
            &[1601, 1602, 1601, 1602, 1602],
        ),
        VideoFormat::new("1080p25", 1920, 1080, 1920, 1080, FieldMode::Progressive, 25, 1, &[1920]),
        VideoFormat::new("1080p50", 1920, 1080, 1920, 1080, FieldMode::Progressive, 50, 1, &[960]),
        VideoFormat::new(
            "1080p5994",
            1920,
            1080,
            1920,
            1080,
            FieldMode::Progressive,
            60000,
            1001,
            &[800, 801, 801, 801, 801],
        ),
        VideoFormat::new("2160p2997", 3840, 2160, 3840, 2160, FieldMode::Progressive, 30000, 1001, &[1601, 1602, 1601, 1602, 1602]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_formats_all_validate() {
        for fmt in stock_formats() {
            fmt.validate().unwrap_or_else(|e| panic!("{}: {e}", fmt.id));
        }
    }

    #[test]
    fn ntsc_cadence_matches_known_values() {
        let reg = VideoFormatRegistry::with_stock_formats();
        let ntsc = reg.get("NTSC").unwrap();
        assert_eq!(ntsc.audio_cadence.samples(), &[1601, 1602, 1601, 1602, 1602]);
        assert_eq!(ntsc.audio_cadence.period_sum(), 8_008);
    }

    #[test]
    fn pal_frame_rate_is_25() {
        let reg = VideoFormatRegistry::with_stock_formats();
        assert!((reg.get("PAL").unwrap().frame_rate() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_format_errors() {
        let reg = VideoFormatRegistry::with_stock_formats();
        assert!(matches!(reg.get("bogus"), Err(FormatError::UnknownFormat(_))));
    }

    #[test]
    fn duplicate_register_errors() {
        let mut reg = VideoFormatRegistry::empty();
        let fmt = stock_formats().remove(0);
        reg.register(fmt.clone()).unwrap();
        assert!(matches!(reg.register(fmt), Err(FormatError::AlreadyRegistered(_))));
    }

    #[test]
    fn invalid_cadence_is_rejected() {
        let bad = VideoFormat::new("bad", 1, 1, 1, 1, FieldMode::Progressive, 25, 1, &[100]);
        assert!(matches!(bad.validate(), Err(FormatError::InvalidCadence { .. })));
    }

    #[test]
    fn cadence_wraps_across_the_period() {
        let c = Cadence::new(vec![1601, 1602, 1601, 1602, 1602]);
        assert_eq!(c.nb_samples_for_tick(0), 1601);
        assert_eq!(c.nb_samples_for_tick(4), 1602);
        assert_eq!(c.nb_samples_for_tick(5), 1601);
    }
}
