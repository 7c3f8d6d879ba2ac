//! Audio primitives for the speech pipeline
//!
//! This module provides:
//! - In-memory mono clips ([`AudioClip`])
//! - WAV file and stream I/O
//! - RMS level analysis and voiced-segment detection
//! - Sample rate conversion and tone synthesis
//! - Microphone and speaker access behind the `audio-device` feature

mod clip;

pub mod level;
pub mod resample;
pub mod tone;
pub mod wav;

#[cfg(feature = "audio-device")]
pub mod device;

pub use clip::AudioClip;
