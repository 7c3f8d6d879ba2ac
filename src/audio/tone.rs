//! Synthetic signal generation
//!
//! Used by the mock speech engines and by tests that need deterministic
//! audio without fixture files.

use crate::audio::AudioClip;
use crate::error::{LookoutError, Result};

/// Generate a sine tone
pub fn sine(frequency: f32, duration_secs: f32, sample_rate: u32, amplitude: f32) -> AudioClip {
    let count = (duration_secs * sample_rate as f32).round().max(0.0) as usize;
    let step = 2.0 * std::f32::consts::PI * frequency / sample_rate as f32;
    let samples = (0..count).map(|i| (i as f32 * step).sin() * amplitude).collect();
    AudioClip::new(samples, sample_rate)
}

/// Generate a silent clip
pub fn silence(duration_secs: f32, sample_rate: u32) -> AudioClip {
    let count = (duration_secs * sample_rate as f32).round().max(0.0) as usize;
    AudioClip::new(vec![0.0; count], sample_rate)
}

/// Join clips end to end
///
/// All clips must share one sample rate.
pub fn concat(clips: &[AudioClip]) -> Result<AudioClip> {
    let Some(first) = clips.first() else {
        return Err(LookoutError::EmptyAudio);
    };

    let sample_rate = first.sample_rate();
    let mut samples = Vec::with_capacity(clips.iter().map(AudioClip::len).sum());
    for clip in clips {
        if clip.sample_rate() != sample_rate {
            return Err(LookoutError::InvalidConfig {
                reason: format!(
                    "cannot concatenate clips at {} Hz and {} Hz",
                    sample_rate,
                    clip.sample_rate()
                ),
            });
        }
        samples.extend_from_slice(clip.samples());
    }

    Ok(AudioClip::new(samples, sample_rate))
}
