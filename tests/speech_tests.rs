//! Speech Engine Integration Tests
//!
//! Round trips between the mock synthesizer and transcriber, plus engine
//! registry resolution.

use std::sync::Arc;

use lookout::audio::{tone, AudioClip};
use lookout::speech::{
    EngineRegistry, MockSynthesizer, MockTranscriber, Synthesizer, Transcriber, SYNTH_SAMPLE_RATE,
};

/// Helper for a clip of pure silence
fn silence_clip(seconds: f32) -> AudioClip {
    tone::silence(seconds, SYNTH_SAMPLE_RATE)
}

// === Round Trip Tests ===

#[test]
fn test_synthesize_then_transcribe_round_trip() {
    let synthesizer = MockSynthesizer::new();
    let transcriber = MockTranscriber::new();

    let clip = synthesizer.synthesize("person detected ahead").unwrap();
    let transcript = transcriber.transcribe(&clip).unwrap();

    assert_eq!(
        transcript.text, "beep beep beep",
        "one voiced segment per synthesized word"
    );
}

#[test]
fn test_synthesized_speech_rate() {
    let synthesizer = MockSynthesizer::new();
    let clip = synthesizer.synthesize("one two three four five").unwrap();

    // 0.4 s per word
    assert_eq!(clip.sample_rate(), SYNTH_SAMPLE_RATE);
    assert_eq!(clip.len(), 32_000);
    assert!((clip.duration_seconds() - 2.0).abs() < 1e-6);
}

#[test]
fn test_silence_transcribes_to_nothing() {
    let transcriber = MockTranscriber::new();
    let transcript = transcriber.transcribe(&silence_clip(1.0)).unwrap();

    assert!(transcript.is_empty());
    assert_eq!(transcript.engine, "mock");
}

#[test]
fn test_transcript_reports_audio_length() {
    let transcriber = MockTranscriber::new();
    let transcript = transcriber.transcribe(&silence_clip(1.5)).unwrap();

    assert!((transcript.audio_seconds - 1.5).abs() < 1e-3);
}

// === Scripted Transcriber Tests ===

#[test]
fn test_scripted_transcripts_replay_in_order() {
    let transcriber = MockTranscriber::with_script(["turn left", "stop"]);
    let clip = silence_clip(0.5);

    assert_eq!(transcriber.transcribe(&clip).unwrap().text, "turn left");
    assert_eq!(transcriber.transcribe(&clip).unwrap().text, "stop");
    // Script exhausted, heuristic takes over
    assert_eq!(transcriber.transcribe(&clip).unwrap().text, "");
}

// === Registry Tests ===

#[test]
fn test_registry_resolves_default_engines() {
    let registry = EngineRegistry::with_defaults();

    assert!(registry.has_transcriber("mock"));
    assert!(registry.has_synthesizer("mock"));

    let synthesizer = registry.synthesizer("mock").unwrap();
    let clip = synthesizer.synthesize("hello").unwrap();
    assert_eq!(clip.len(), 6_400);
}

#[test]
fn test_registry_rejects_unknown_engine() {
    let registry = EngineRegistry::with_defaults();

    assert!(registry.transcriber("whisper-large").is_err());
    assert!(registry.synthesizer("whisper-large").is_err());
}

#[test]
fn test_registered_engine_resolves_by_name() {
    let mut registry = EngineRegistry::new();
    registry.register_transcriber(Arc::new(MockTranscriber::with_script(["scripted"])));

    let engine = registry.transcriber("mock").unwrap();
    let transcript = engine.transcribe(&silence_clip(0.2)).unwrap();
    assert_eq!(transcript.text, "scripted");
}
