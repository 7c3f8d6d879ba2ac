//! Sample rate conversion
//!
//! Plain linear interpolation. Speech engines in this crate expect 16 kHz
//! mono, while capture devices and WAV fixtures arrive at whatever rate
//! they were recorded at.

use crate::audio::AudioClip;
use crate::error::{LookoutError, Result};
use num_traits::Float;

/// Linear interpolation between two samples
fn lerp<T: Float>(a: T, b: T, t: T) -> T {
    a + (b - a) * t
}

/// Convert a clip to `target_rate` by linear interpolation
pub fn resample(clip: &AudioClip, target_rate: u32) -> Result<AudioClip> {
    if target_rate == 0 {
        return Err(LookoutError::InvalidConfig {
            reason: "target sample rate must be positive".to_string(),
        });
    }
    let src_rate = clip.sample_rate();
    if src_rate == 0 {
        return Err(LookoutError::InvalidConfig {
            reason: "source sample rate must be positive".to_string(),
        });
    }

    if src_rate == target_rate || clip.is_empty() {
        return Ok(AudioClip::new(clip.samples().to_vec(), target_rate));
    }

    let samples = clip.samples();
    let out_len = (samples.len() as u64 * target_rate as u64 / src_rate as u64) as usize;
    let step = src_rate as f64 / target_rate as f64;

    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let pos = i as f64 * step;
        let base = pos.floor() as usize;
        let frac = (pos - base as f64) as f32;
        let a = samples[base.min(samples.len() - 1)];
        let b = samples[(base + 1).min(samples.len() - 1)];
        out.push(lerp(a, b, frac));
    }

    Ok(AudioClip::new(out, target_rate))
}
