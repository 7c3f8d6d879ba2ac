//! Signal level analysis
//!
//! RMS energy framing drives both silence trimming and the voiced-segment
//! detection the speech layer uses to decide whether captured audio is
//! worth transcribing.

use crate::audio::AudioClip;

/// Minimum RMS energy for a frame to count as speech
pub const DEFAULT_SILENCE_THRESHOLD: f32 = 0.03;

/// Analysis frame length in milliseconds
pub const FRAME_MS: u32 = 20;

/// A run of voiced frames, in sample indices (`start..end`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub start: usize,
    pub end: usize,
}

impl Segment {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn duration_seconds(&self, sample_rate: u32) -> f32 {
        if sample_rate == 0 {
            return 0.0;
        }
        self.len() as f32 / sample_rate as f32
    }
}

/// Root-mean-square level of a sample slice
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Largest absolute sample value
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0_f32, |acc, s| acc.max(s.abs()))
}

/// Whether the slice as a whole falls below the energy threshold
pub fn is_silent(samples: &[f32], threshold: f32) -> bool {
    rms(samples) <= threshold
}

fn frame_len(sample_rate: u32) -> usize {
    ((sample_rate as usize * FRAME_MS as usize) / 1000).max(1)
}

/// Find voiced segments by RMS-thresholding fixed 20 ms frames
///
/// Adjacent voiced frames are grouped into one segment; a single silent
/// frame is enough to split two segments. Single-frame blips are kept,
/// so callers that need noise robustness should raise the threshold.
pub fn detect_segments(samples: &[f32], sample_rate: u32, threshold: f32) -> Vec<Segment> {
    let frame = frame_len(sample_rate);
    let mut segments = Vec::new();
    let mut current: Option<Segment> = None;

    for (i, chunk) in samples.chunks(frame).enumerate() {
        let start = i * frame;
        let end = start + chunk.len();
        if rms(chunk) > threshold {
            match current.as_mut() {
                Some(seg) => seg.end = end,
                None => current = Some(Segment { start, end }),
            }
        } else if let Some(seg) = current.take() {
            segments.push(seg);
        }
    }

    if let Some(seg) = current {
        segments.push(seg);
    }

    segments
}

/// Drop silent frames from both ends of a clip
///
/// Returns an empty clip at the same rate when nothing is voiced.
pub fn trim_silence(clip: &AudioClip, threshold: f32) -> AudioClip {
    let segments = detect_segments(clip.samples(), clip.sample_rate(), threshold);
    match (segments.first(), segments.last()) {
        (Some(first), Some(last)) => AudioClip::new(
            clip.samples()[first.start..last.end].to_vec(),
            clip.sample_rate(),
        ),
        _ => AudioClip::new(Vec::new(), clip.sample_rate()),
    }
}
