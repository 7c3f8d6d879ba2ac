//! Speech engine traits
//!
//! Transcription and synthesis are trait seams so the voice loop and CLI
//! can run against scripted mock engines in tests and against an HTTP
//! bridge service in deployments.

use crate::audio::AudioClip;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// A completed transcription with timing metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    /// Recognized text, empty when nothing was understood
    pub text: String,
    /// Name of the engine that produced this transcript
    pub engine: String,
    /// Duration of the transcribed audio
    pub audio_seconds: f32,
    /// Wall-clock time the engine spent
    pub processing_ms: u64,
}

impl Transcript {
    /// True when the engine heard nothing usable
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Speech-to-text engine
pub trait Transcriber: Send + Sync {
    /// Stable engine name used for registry lookup and reports
    fn name(&self) -> &str;

    /// Transcribe a mono clip
    fn transcribe(&self, clip: &AudioClip) -> Result<Transcript>;

    /// Whether the engine can currently serve requests
    fn is_available(&self) -> bool {
        true
    }
}

/// Text-to-speech engine
pub trait Synthesizer: Send + Sync {
    /// Stable engine name used for registry lookup and reports
    fn name(&self) -> &str;

    /// Render text as a mono clip
    fn synthesize(&self, text: &str) -> Result<AudioClip>;

    /// Whether the engine can currently serve requests
    fn is_available(&self) -> bool {
        true
    }
}
