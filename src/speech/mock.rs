//! Deterministic offline speech engines
//!
//! The mock transcriber replays a scripted queue of lines, falling back to
//! an energy heuristic ("beep" per voiced segment) once the queue drains.
//! The mock synthesizer renders one tone per word at a configurable speaking
//! rate (default 150 words per minute), so a synthesized clip run back
//! through the mock transcriber reports the original word count.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Instant;

use sha2::{Digest, Sha256};

use crate::audio::level::{detect_segments, DEFAULT_SILENCE_THRESHOLD};
use crate::audio::{tone, AudioClip};
use crate::error::{LookoutError, Result};
use crate::speech::{Synthesizer, Transcriber, Transcript};

const ENGINE_NAME: &str = "mock";

/// Output rate for synthesized speech
pub const SYNTH_SAMPLE_RATE: u32 = 16000;

/// Default speaking rate in words per minute
pub const DEFAULT_SPEAKING_RATE: f32 = 150.0;

/// Tone fraction of each word slot; the remainder is the gap that lets the
/// transcriber heuristic split words
const TONE_FRACTION: f32 = 0.6;

const TONE_BASE_HZ: f32 = 220.0;
const TONE_STEP_HZ: f32 = 40.0;
const TONE_AMPLITUDE: f32 = 0.5;

/// Scripted speech-to-text engine
pub struct MockTranscriber {
    script: Mutex<VecDeque<String>>,
    threshold: f32,
}

impl MockTranscriber {
    /// Engine with no script; every call uses the segment heuristic
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            threshold: DEFAULT_SILENCE_THRESHOLD,
        }
    }

    /// Engine that replays `lines` in order before falling back
    pub fn with_script<S: Into<String>>(lines: impl IntoIterator<Item = S>) -> Self {
        Self {
            script: Mutex::new(lines.into_iter().map(Into::into).collect()),
            threshold: DEFAULT_SILENCE_THRESHOLD,
        }
    }

    fn next_scripted(&self) -> Option<String> {
        self.script.lock().ok().and_then(|mut q| q.pop_front())
    }

    fn heuristic_text(&self, clip: &AudioClip) -> String {
        let words = detect_segments(clip.samples(), clip.sample_rate(), self.threshold).len();
        vec!["beep"; words].join(" ")
    }
}

impl Default for MockTranscriber {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcriber for MockTranscriber {
    fn name(&self) -> &str {
        ENGINE_NAME
    }

    fn transcribe(&self, clip: &AudioClip) -> Result<Transcript> {
        if clip.is_empty() {
            return Err(LookoutError::EmptyAudio);
        }

        let start = Instant::now();
        let text = self
            .next_scripted()
            .unwrap_or_else(|| self.heuristic_text(clip));

        Ok(Transcript {
            text,
            engine: ENGINE_NAME.to_string(),
            audio_seconds: clip.duration_seconds(),
            processing_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// Tone-per-word text-to-speech engine
pub struct MockSynthesizer {
    rate_wpm: f32,
}

impl MockSynthesizer {
    pub fn new() -> Self {
        Self {
            rate_wpm: DEFAULT_SPEAKING_RATE,
        }
    }

    /// Engine speaking at `rate_wpm` words per minute
    pub fn with_rate(rate_wpm: f32) -> Result<Self> {
        if !rate_wpm.is_finite() || rate_wpm <= 0.0 {
            return Err(LookoutError::InvalidConfig {
                reason: format!("speaking rate must be positive, got {rate_wpm}"),
            });
        }
        Ok(Self { rate_wpm })
    }

    fn word_secs(&self) -> f32 {
        60.0 / self.rate_wpm
    }
}

impl Default for MockSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a word to a stable tone frequency
fn word_frequency(word: &str) -> f32 {
    let digest = Sha256::digest(word.to_lowercase().as_bytes());
    TONE_BASE_HZ + (digest[0] % 17) as f32 * TONE_STEP_HZ
}

impl Synthesizer for MockSynthesizer {
    fn name(&self) -> &str {
        ENGINE_NAME
    }

    fn synthesize(&self, text: &str) -> Result<AudioClip> {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return Err(LookoutError::InvalidConfig {
                reason: "cannot synthesize empty text".to_string(),
            });
        }

        let tone_secs = self.word_secs() * TONE_FRACTION;
        let gap_secs = self.word_secs() - tone_secs;

        let mut parts = Vec::with_capacity(words.len() * 2);
        for word in words {
            parts.push(tone::sine(
                word_frequency(word),
                tone_secs,
                SYNTH_SAMPLE_RATE,
                TONE_AMPLITUDE,
            ));
            parts.push(tone::silence(gap_secs, SYNTH_SAMPLE_RATE));
        }

        tone::concat(&parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_scripted_lines_play_in_order() {
        let engine = MockTranscriber::with_script(["turn left", "stop"]);
        let clip = tone::sine(440.0, 0.5, 16000, 0.5);

        assert_eq!(engine.transcribe(&clip).unwrap().text, "turn left");
        assert_eq!(engine.transcribe(&clip).unwrap().text, "stop");
        // Queue drained: one continuous tone is one segment
        assert_eq!(engine.transcribe(&clip).unwrap().text, "beep");
    }

    #[test]
    fn test_silence_transcribes_empty() {
        let engine = MockTranscriber::new();
        let clip = tone::silence(1.0, 16000);

        let transcript = engine.transcribe(&clip).unwrap();
        assert_eq!(transcript.text, "");
        assert!(transcript.is_empty());
        assert_eq!(transcript.engine, "mock");
    }

    #[test]
    fn test_empty_clip_rejected() {
        let engine = MockTranscriber::new();
        let result = engine.transcribe(&AudioClip::new(vec![], 16000));
        assert!(matches!(result, Err(LookoutError::EmptyAudio)));
    }

    #[test]
    fn test_synthesis_word_timing() {
        let engine = MockSynthesizer::new();
        let clip = engine.synthesize("hello world").unwrap();

        // Two words at 0.4 s each
        assert_eq!(clip.sample_rate(), SYNTH_SAMPLE_RATE);
        assert_eq!(clip.len(), 12800);

        let segments = detect_segments(
            clip.samples(),
            clip.sample_rate(),
            DEFAULT_SILENCE_THRESHOLD,
        );
        assert_eq!(segments.len(), 2);
    }

    #[test]
    fn test_synthesis_is_deterministic() {
        let engine = MockSynthesizer::new();
        let a = engine.synthesize("lookout").unwrap();
        let b = engine.synthesize("lookout").unwrap();
        assert_eq!(a.samples(), b.samples());
    }

    #[test]
    fn test_empty_text_rejected() {
        let engine = MockSynthesizer::new();
        assert!(matches!(
            engine.synthesize("   "),
            Err(LookoutError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_rate_scales_duration() {
        // Twice the rate, half the samples
        let fast = MockSynthesizer::with_rate(300.0).unwrap();
        let clip = fast.synthesize("hello world").unwrap();
        assert_eq!(clip.len(), 6400);
    }

    #[test]
    fn test_invalid_rate_rejected() {
        assert!(MockSynthesizer::with_rate(0.0).is_err());
        assert!(MockSynthesizer::with_rate(-150.0).is_err());
        assert!(MockSynthesizer::with_rate(f32::NAN).is_err());
    }

    #[test]
    fn test_word_count_round_trip() {
        let synth = MockSynthesizer::new();
        let stt = MockTranscriber::new();

        let clip = synth.synthesize("person detected ahead").unwrap();
        let transcript = stt.transcribe(&clip).unwrap();
        assert_eq!(transcript.text, "beep beep beep");
    }
}
