//! Detection and speech pipelines
//!
//! This module provides:
//! - A [`Detector`] that runs weights-to-report object detection
//! - An [`Announcer`] that turns detections into spoken sentences
//! - A [`VoiceLoop`] for transcribe-reply-synthesize exchanges
//! - A [`Watch`] that runs detection over a stream of frames

mod announce;
mod detect;
mod live;
mod voice_loop;

pub use announce::{Announcer, DEFAULT_ANNOUNCE_THRESHOLD};
pub use detect::{DetectReport, Detector, DetectorConfig, LabeledDetection};
pub use live::{DirectorySource, FrameSource, Watch, WatchSummary, DEFAULT_FAILURE_LIMIT};
pub use voice_loop::{Exchange, VoiceLoop};
