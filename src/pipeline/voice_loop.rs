//! Conversational voice exchange
//!
//! One exchange is transcribe, compose a reply, synthesize. The default
//! responder echoes the transcript back, which doubles as an end-to-end
//! check of both engines. Empty transcripts short-circuit the exchange
//! so silence never reaches the synthesizer.

use std::sync::Arc;

use crate::audio::AudioClip;
use crate::error::Result;
use crate::speech::{Synthesizer, Transcriber, Transcript};

type Responder = Box<dyn Fn(&str) -> String + Send + Sync>;

/// Result of one completed exchange
#[derive(Debug)]
pub struct Exchange {
    pub transcript: Transcript,
    pub reply_text: String,
    pub reply_audio: AudioClip,
}

/// Transcribe-reply-synthesize pipeline
pub struct VoiceLoop {
    transcriber: Arc<dyn Transcriber>,
    synthesizer: Arc<dyn Synthesizer>,
    responder: Responder,
}

impl VoiceLoop {
    /// Loop that echoes every transcript back as speech
    pub fn new(transcriber: Arc<dyn Transcriber>, synthesizer: Arc<dyn Synthesizer>) -> Self {
        Self {
            transcriber,
            synthesizer,
            responder: Box::new(|text| text.to_string()),
        }
    }

    /// Replace the echo responder with a custom reply function
    pub fn with_responder(
        mut self,
        responder: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        self.responder = Box::new(responder);
        self
    }

    /// Run one exchange on a captured clip
    ///
    /// Returns `Ok(None)` when the transcriber heard nothing usable.
    pub fn run_once(&self, clip: &AudioClip) -> Result<Option<Exchange>> {
        let transcript = self.transcriber.transcribe(clip)?;
        if transcript.is_empty() {
            log::warn!(
                "engine {} heard nothing in {:.2} s of audio, skipping reply",
                transcript.engine,
                transcript.audio_seconds
            );
            return Ok(None);
        }

        log::info!("heard: {:?}", transcript.text);
        let reply_text = (self.responder)(&transcript.text);
        let reply_audio = self.synthesizer.synthesize(&reply_text)?;
        log::info!("replying: {:?}", reply_text);

        Ok(Some(Exchange {
            transcript,
            reply_text,
            reply_audio,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::tone;
    use crate::speech::{MockSynthesizer, MockTranscriber};

    fn voiced_clip() -> AudioClip {
        tone::sine(440.0, 0.5, 16000, 0.5)
    }

    #[test]
    fn test_echo_exchange() {
        let voice_loop = VoiceLoop::new(
            Arc::new(MockTranscriber::with_script(["hello there"])),
            Arc::new(MockSynthesizer::new()),
        );

        let exchange = voice_loop.run_once(&voiced_clip()).unwrap().unwrap();
        assert_eq!(exchange.transcript.text, "hello there");
        assert_eq!(exchange.reply_text, "hello there");
        // Two words at 0.4 s each from the mock synthesizer
        assert_eq!(exchange.reply_audio.len(), 12800);
    }

    #[test]
    fn test_silence_skips_reply() {
        let voice_loop = VoiceLoop::new(
            Arc::new(MockTranscriber::new()),
            Arc::new(MockSynthesizer::new()),
        );

        let result = voice_loop.run_once(&tone::silence(1.0, 16000)).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_custom_responder() {
        let voice_loop = VoiceLoop::new(
            Arc::new(MockTranscriber::with_script(["status"])),
            Arc::new(MockSynthesizer::new()),
        )
        .with_responder(|text| format!("you said {text}"));

        let exchange = voice_loop.run_once(&voiced_clip()).unwrap().unwrap();
        assert_eq!(exchange.reply_text, "you said status");
    }
}
