// crates/onair-mixer/src/audio_mixer.rs
//
// Sample-accurate audio mixer (C4). Unlike the image mixer, audio has
// no notion of scopes or blend modes — every layer's samples are summed
// directly, scaled by its `AudioTransform::volume`, for exactly the
// sample count the channel's cadence dictates this tick (§3's cadence
// invariant; §4.1's "producers with audio MUST deliver exactly that
// many samples").

use onair_core::AudioBuffer;

#[derive(Debug, Default)]
pub struct AudioMixer;

impl AudioMixer {
    pub fn new() -> Self {
        Self
    }

    /// Sum `(buffer, volume)` pairs into one buffer of `nb_samples`
    /// frames. Buffers of the wrong length contribute silence for the
    /// remainder rather than panicking — a late/empty producer frame
    /// still needs an audio contribution of the right shape.
    pub fn mix(&self, channels: u16, nb_samples: u32, layers: &[(AudioBuffer, f32)]) -> AudioBuffer {
        let mut out = AudioBuffer::silence(channels, nb_samples);
        for (buffer, volume) in layers {
            if buffer.channels != channels {
                continue;
            }
            for (o, s) in out.samples.iter_mut().zip(buffer.samples.iter()) {
                *o += s * volume;
            }
        }
        for s in &mut out.samples {
            *s = s.clamp(-1.0, 1.0);
        }
        out
    }
}

/// Linear volume ramp used by transitions to fade a layer's audio in or
/// out over a span of frames (§4.5's sting transition audio fades).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VolumeFade {
    pub start_frame: u64,
    pub duration_frames: u64,
    pub from: f32,
    pub to: f32,
}

impl VolumeFade {
    pub fn volume_at(&self, frame: u64) -> f32 {
        if frame <= self.start_frame {
            return self.from;
        }
        let elapsed = frame - self.start_frame;
        if elapsed >= self.duration_frames || self.duration_frames == 0 {
            return self.to;
        }
        let t = elapsed as f32 / self.duration_frames as f32;
        self.from + (self.to - self.from) * t
    }
}
