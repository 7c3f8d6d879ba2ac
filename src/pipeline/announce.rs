//! Spoken detection announcements
//!
//! Turns labeled detections into a sentence and hands it to a synthesizer.
//! Low-confidence detections are announced less readily than they are drawn,
//! so the announcer applies its own threshold on top of suppression.

use std::sync::Arc;

use crate::audio::AudioClip;
use crate::error::Result;
use crate::pipeline::detect::LabeledDetection;
use crate::speech::Synthesizer;

/// Minimum score a detection needs to be spoken
pub const DEFAULT_ANNOUNCE_THRESHOLD: f32 = 0.4;

/// Builds and speaks detection announcements
pub struct Announcer {
    synthesizer: Arc<dyn Synthesizer>,
    min_confidence: f32,
}

impl Announcer {
    pub fn new(synthesizer: Arc<dyn Synthesizer>) -> Self {
        Self {
            synthesizer,
            min_confidence: DEFAULT_ANNOUNCE_THRESHOLD,
        }
    }

    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    /// Compose the sentence for a set of detections
    ///
    /// One clause per detection above the confidence bar, joined with
    /// ". ". Returns `None` when nothing clears it.
    pub fn phrase(&self, detections: &[LabeledDetection]) -> Option<String> {
        let clauses: Vec<String> = detections
            .iter()
            .filter(|d| d.score > self.min_confidence)
            .map(|d| {
                format!(
                    "{} detected with {:.1} percent confidence",
                    d.class_name,
                    d.score * 100.0
                )
            })
            .collect();

        if clauses.is_empty() {
            None
        } else {
            Some(clauses.join(". "))
        }
    }

    /// Synthesize the announcement for a set of detections
    ///
    /// Returns `Ok(None)` when there is nothing worth saying.
    pub fn announce(&self, detections: &[LabeledDetection]) -> Result<Option<AudioClip>> {
        match self.phrase(detections) {
            Some(text) => {
                log::info!("announcing: {text}");
                Ok(Some(self.synthesizer.synthesize(&text)?))
            }
            None => Ok(None),
        }
    }
}
