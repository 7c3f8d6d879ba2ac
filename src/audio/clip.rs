//! In-memory audio representation
//!
//! Speech I/O in this crate is mono f32 throughout; WAV loading downmixes
//! and rescales at the boundary.

/// Owned mono audio, samples in -1.0..1.0
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_seconds(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Largest absolute sample value
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0_f32, |acc, s| acc.max(s.abs()))
    }

    /// Root mean square over the whole clip
    pub fn rms(&self) -> f32 {
        super::level::rms(&self.samples)
    }

    /// False when any sample is NaN or infinite
    pub fn is_valid(&self) -> bool {
        self.samples.iter().all(|s| s.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_duration() {
        let clip = AudioClip::new(vec![0.0; 8000], 16000);
        assert_relative_eq!(clip.duration_seconds(), 0.5);
        assert_eq!(clip.len(), 8000);
        assert!(!clip.is_empty());
    }

    #[test]
    fn test_peak() {
        let clip = AudioClip::new(vec![0.1, -0.7, 0.3], 16000);
        assert_relative_eq!(clip.peak(), 0.7);
        assert_relative_eq!(AudioClip::new(vec![], 16000).peak(), 0.0);
    }

    #[test]
    fn test_zero_rate_duration() {
        let clip = AudioClip::new(vec![0.0; 100], 0);
        assert_relative_eq!(clip.duration_seconds(), 0.0);
    }

    #[test]
    fn test_rms_of_constant_signal() {
        let clip = AudioClip::new(vec![0.5; 1600], 16000);
        assert_relative_eq!(clip.rms(), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_validity() {
        assert!(AudioClip::new(vec![0.1, -0.2, 0.0], 16000).is_valid());
        assert!(!AudioClip::new(vec![0.1, f32::NAN], 16000).is_valid());
        assert!(!AudioClip::new(vec![f32::INFINITY], 16000).is_valid());
        assert!(AudioClip::new(vec![], 16000).is_valid());
    }
}
