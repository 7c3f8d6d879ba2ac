//! CLI command implementations
//!
//! One handler per subcommand. Handlers print for humans on stdout and log
//! through the usual logger; structured output goes to JSON report files.

use std::path::Path;

use log::info;

use crate::audio::{level, wav, AudioClip};
use crate::cli::{DetectArgs, ListenArgs, SayArgs, TranscribeArgs, WatchArgs};
use crate::error::Result;
use crate::pipeline::{Announcer, Detector, DetectorConfig, DirectorySource, VoiceLoop, Watch};
use crate::speech::EngineRegistry;
use crate::vision::{coco_names, load_names, Architecture, NmsConfig};

/// Detect objects in a single image and report them.
pub fn detect(args: &DetectArgs) -> Result<()> {
    let architecture: Architecture = args.arch.parse()?;
    info!(
        "running {} on {}",
        architecture.name(),
        args.image.display()
    );

    let detector = build_detector(
        architecture,
        args.size,
        args.names.as_deref(),
        &args.weights,
        NmsConfig {
            score_threshold: args.score_threshold,
            iou_threshold: args.iou_threshold,
            ..NmsConfig::default()
        },
    )?;

    let report = detector.detect_file(&args.image, args.output.as_deref())?;

    if report.detections.is_empty() {
        println!("No objects detected.");
    } else {
        for det in &report.detections {
            let (x1, y1, x2, y2) = det.bbox.to_pixels(report.image_width, report.image_height);
            println!(
                "{} {:.1}% at ({}, {})-({}, {})",
                det.class_name,
                det.score * 100.0,
                x1,
                y1,
                x2,
                y2
            );
        }
        println!("{} objects detected.", report.detections.len());
    }

    if let Some(path) = &args.output {
        println!("Annotated image: {}", path.display());
    }
    if let Some(path) = &args.report {
        write_json(path, &report)?;
        println!("Report written: {}", path.display());
    }

    Ok(())
}

/// Run detection over a directory of frames.
pub fn watch(args: &WatchArgs) -> Result<()> {
    let architecture: Architecture = args.arch.parse()?;
    info!(
        "watching {} with {}",
        args.frames.display(),
        architecture.name()
    );

    let detector = build_detector(
        architecture,
        args.size,
        args.names.as_deref(),
        &args.weights,
        NmsConfig::default(),
    )?;

    let registry = EngineRegistry::with_defaults();
    let announcer = if args.announce || args.announce_dir.is_some() {
        Some(
            Announcer::new(registry.synthesizer(&args.engine)?)
                .with_min_confidence(args.min_confidence),
        )
    } else {
        None
    };

    let mut watch = Watch::new(&detector).with_failure_limit(args.failure_limit);
    if let Some(announcer) = announcer.as_ref() {
        watch = watch.with_announcer(announcer);
    }
    if let Some(dir) = &args.annotated_dir {
        std::fs::create_dir_all(dir)?;
        watch = watch.with_annotated_dir(dir);
    }
    if let Some(dir) = &args.announce_dir {
        std::fs::create_dir_all(dir)?;
        watch = watch.with_announce_dir(dir);
    }

    let mut source = DirectorySource::new(&args.frames)?;
    let summary = watch.run(&mut source)?;

    println!(
        "Processed {} frames: {} detections, {} announcements, {} read failures.",
        summary.frames, summary.detections, summary.announcements, summary.failures
    );

    if let Some(path) = &args.report {
        write_json(path, &summary)?;
        println!("Summary written: {}", path.display());
    }

    Ok(())
}

/// Transcribe a WAV file to text.
pub fn transcribe(args: &TranscribeArgs) -> Result<()> {
    let clip = wav::load_wav(&args.input)?;
    info!(
        "transcribing {:.2} s from {}",
        clip.duration_seconds(),
        args.input.display()
    );

    let registry = EngineRegistry::with_defaults();
    let engine = registry.transcriber(&args.engine)?;
    let transcript = engine.transcribe(&clip)?;

    if transcript.is_empty() {
        println!("(nothing recognized)");
    } else {
        println!("{}", transcript.text);
    }

    if let Some(path) = &args.report {
        write_json(path, &transcript)?;
        println!("Report written: {}", path.display());
    }

    Ok(())
}

/// Synthesize speech from text into a WAV file.
pub fn say(args: &SayArgs) -> Result<()> {
    let registry = EngineRegistry::with_defaults();
    let engine = registry.synthesizer(&args.engine)?;

    let clip = engine.synthesize(&args.text)?;
    wav::save_wav(&clip, &args.output)?;
    println!(
        "Wrote {:.1} s of speech to {}",
        clip.duration_seconds(),
        args.output.display()
    );

    if args.play {
        play_clip(&clip)?;
    }

    Ok(())
}

/// Run one voice exchange on a recorded or captured utterance.
pub fn listen(args: &ListenArgs) -> Result<()> {
    let clip = match &args.input {
        Some(path) => wav::load_wav(path)?,
        None => record_clip(args.duration)?,
    };

    // Fixed-duration capture leaves dead air around the utterance
    let clip = level::trim_silence(&clip, level::DEFAULT_SILENCE_THRESHOLD);
    if clip.is_empty() {
        println!("Heard nothing.");
        return Ok(());
    }

    let registry = EngineRegistry::with_defaults();
    let voice_loop = VoiceLoop::new(
        registry.transcriber(&args.transcriber)?,
        registry.synthesizer(&args.synthesizer)?,
    );

    match voice_loop.run_once(&clip)? {
        Some(exchange) => {
            println!("Heard:  {}", exchange.transcript.text);
            println!("Reply:  {}", exchange.reply_text);
            if let Some(path) = &args.output {
                wav::save_wav(&exchange.reply_audio, path)?;
                println!("Reply audio written: {}", path.display());
            }
            if args.play {
                play_clip(&exchange.reply_audio)?;
            }
        }
        None => println!("Heard nothing."),
    }

    Ok(())
}

/// List registered speech engines and their availability.
pub fn engines() -> Result<()> {
    let registry = EngineRegistry::with_defaults();

    println!("Transcribers:");
    for name in registry.transcriber_names() {
        let engine = registry.transcriber(name)?;
        println!("  {} ({})", name, availability(engine.is_available()));
    }

    println!("Synthesizers:");
    for name in registry.synthesizer_names() {
        let engine = registry.synthesizer(name)?;
        println!("  {} ({})", name, availability(engine.is_available()));
    }

    Ok(())
}

fn availability(available: bool) -> &'static str {
    if available {
        "available"
    } else {
        "unavailable"
    }
}

fn build_detector(
    architecture: Architecture,
    input_size: usize,
    names_path: Option<&Path>,
    weights_path: &Path,
    nms: NmsConfig,
) -> Result<Detector> {
    let names = match names_path {
        Some(path) => load_names(path)?,
        None => coco_names(),
    };

    Detector::from_weights_file(
        DetectorConfig {
            architecture,
            input_size,
            nms,
        },
        names,
        weights_path,
    )
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    Ok(())
}

#[cfg(feature = "audio-device")]
fn play_clip(clip: &AudioClip) -> Result<()> {
    crate::audio::device::play(clip)
}

#[cfg(not(feature = "audio-device"))]
fn play_clip(_clip: &AudioClip) -> Result<()> {
    Err(crate::error::LookoutError::InvalidConfig {
        reason: "this build has no audio device support (enable the audio-device feature)"
            .to_string(),
    })
}

#[cfg(feature = "audio-device")]
fn record_clip(duration_secs: f32) -> Result<AudioClip> {
    use crate::audio::device;
    device::record(duration_secs, device::CAPTURE_SAMPLE_RATE)
}

#[cfg(not(feature = "audio-device"))]
fn record_clip(_duration_secs: f32) -> Result<AudioClip> {
    Err(crate::error::LookoutError::InvalidConfig {
        reason: "this build has no audio device support (enable the audio-device feature)"
            .to_string(),
    })
}
