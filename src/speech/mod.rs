//! Speech recognition and synthesis
//!
//! This module provides:
//! - [`Transcriber`] and [`Synthesizer`] traits with a [`Transcript`] result type
//! - Deterministic mock engines for tests and offline use
//! - HTTP bridge engines behind the `bridge` feature
//! - An [`EngineRegistry`] for name-based engine selection

mod engine;
mod mock;
mod registry;

#[cfg(feature = "bridge")]
pub mod bridge;

pub use engine::{Synthesizer, Transcriber, Transcript};
pub use mock::{MockSynthesizer, MockTranscriber, DEFAULT_SPEAKING_RATE, SYNTH_SAMPLE_RATE};
pub use registry::EngineRegistry;
