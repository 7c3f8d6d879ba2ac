//! Command-line interface
//!
//! Argument types for the lookout binary. Handlers live in [`commands`].

pub mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Lookout - object detection and voice interaction toolkit
#[derive(Parser, Debug)]
#[command(name = "lookout")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Detect objects in an image file
    Detect(DetectArgs),

    /// Run detection over a directory of frames
    Watch(WatchArgs),

    /// Transcribe a WAV file to text
    Transcribe(TranscribeArgs),

    /// Synthesize speech from text
    Say(SayArgs),

    /// Run one voice exchange: transcribe, reply, synthesize
    Listen(ListenArgs),

    /// List available speech engines
    Engines,
}

#[derive(Args, Debug)]
pub struct DetectArgs {
    /// Input image (PPM)
    pub image: PathBuf,

    /// Darknet weights file
    #[arg(short, long)]
    pub weights: PathBuf,

    /// Class names file, one per line (default: the COCO-80 set)
    #[arg(short, long)]
    pub names: Option<PathBuf>,

    /// Network variant: yolov3 or yolov3-tiny
    #[arg(short, long, default_value = "yolov3")]
    pub arch: String,

    /// Square network input size, multiple of 32
    #[arg(long, default_value_t = 416)]
    pub size: usize,

    /// Minimum detection score
    #[arg(long, default_value_t = 0.5)]
    pub score_threshold: f32,

    /// Overlap threshold for suppression
    #[arg(long, default_value_t = 0.5)]
    pub iou_threshold: f32,

    /// Write an annotated copy of the image here
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Write the JSON run report here
    #[arg(short, long)]
    pub report: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Directory of PPM frames to replay
    pub frames: PathBuf,

    /// Darknet weights file
    #[arg(short, long)]
    pub weights: PathBuf,

    /// Class names file, one per line (default: the COCO-80 set)
    #[arg(short, long)]
    pub names: Option<PathBuf>,

    /// Network variant: yolov3 or yolov3-tiny
    #[arg(short, long, default_value = "yolov3")]
    pub arch: String,

    /// Square network input size, multiple of 32
    #[arg(long, default_value_t = 416)]
    pub size: usize,

    /// Write annotated frames into this directory
    #[arg(long)]
    pub annotated_dir: Option<PathBuf>,

    /// Announce detections through a synthesizer
    #[arg(long)]
    pub announce: bool,

    /// Write announcement audio into this directory
    #[arg(long)]
    pub announce_dir: Option<PathBuf>,

    /// Synthesizer engine for announcements
    #[arg(short, long, default_value = "mock")]
    pub engine: String,

    /// Minimum confidence for a detection to be spoken
    #[arg(long, default_value_t = 0.4)]
    pub min_confidence: f32,

    /// Consecutive frame failures before the watch aborts
    #[arg(long, default_value_t = 8)]
    pub failure_limit: usize,

    /// Write the JSON run summary here
    #[arg(short, long)]
    pub report: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct TranscribeArgs {
    /// Input WAV file
    pub input: PathBuf,

    /// Transcriber engine
    #[arg(short, long, default_value = "mock")]
    pub engine: String,

    /// Write the transcript as JSON here
    #[arg(short, long)]
    pub report: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SayArgs {
    /// Text to speak
    pub text: String,

    /// Output WAV file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Synthesizer engine
    #[arg(short, long, default_value = "mock")]
    pub engine: String,

    /// Play the audio after writing it (requires the audio-device feature)
    #[arg(long)]
    pub play: bool,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// WAV file with the captured utterance; records from the microphone
    /// when omitted (requires the audio-device feature)
    pub input: Option<PathBuf>,

    /// Seconds to record when no input file is given
    #[arg(short, long, default_value_t = 5.0)]
    pub duration: f32,

    /// Transcriber engine
    #[arg(long, default_value = "mock")]
    pub transcriber: String,

    /// Synthesizer engine
    #[arg(long, default_value = "mock")]
    pub synthesizer: String,

    /// Write the spoken reply here
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Play the reply aloud (requires the audio-device feature)
    #[arg(long)]
    pub play: bool,
}
