//! Microphone capture and speaker playback
//!
//! Compiled only with the `audio-device` feature. Capture records at the
//! device's preferred configuration, then downmixes and resamples to the
//! requested rate so the speech engines always see mono at one rate.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;

use crate::audio::{resample, AudioClip};
use crate::error::{LookoutError, Result};

/// Sample rate speech engines expect (16 kHz mono)
pub const CAPTURE_SAMPLE_RATE: u32 = 16000;

/// Default utterance window for `record`
pub const DEFAULT_RECORD_SECONDS: f32 = 5.0;

/// Record from the default input device
///
/// Blocks for `duration_secs` of wall-clock time, then returns the captured
/// audio downmixed to mono and resampled to `sample_rate`.
pub fn record(duration_secs: f32, sample_rate: u32) -> Result<AudioClip> {
    if duration_secs <= 0.0 {
        return Err(LookoutError::InvalidConfig {
            reason: "record duration must be positive".to_string(),
        });
    }
    if sample_rate == 0 {
        return Err(LookoutError::InvalidConfig {
            reason: "record sample rate must be positive".to_string(),
        });
    }

    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| LookoutError::DeviceError {
            reason: "no input device available".to_string(),
        })?;

    let supported = device
        .default_input_config()
        .map_err(|e| LookoutError::DeviceError {
            reason: format!("no input config: {e}"),
        })?;

    let device_rate = supported.sample_rate().0;
    let channels = supported.channels() as usize;
    let config = supported.config();

    log::debug!(
        "capture device {} at {} Hz, {} channels",
        device.name().unwrap_or_default(),
        device_rate,
        channels
    );

    let buffer = Arc::new(Mutex::new(Vec::<f32>::new()));
    let sink = Arc::clone(&buffer);

    let err_fn = |err| log::error!("audio capture error: {err}");

    let stream = match supported.sample_format() {
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if let Ok(mut buf) = sink.lock() {
                    buf.extend_from_slice(data);
                }
            },
            err_fn,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                if let Ok(mut buf) = sink.lock() {
                    buf.extend(data.iter().map(|&v| v as f32 / 32768.0));
                }
            },
            err_fn,
            None,
        ),
        SampleFormat::U16 => device.build_input_stream(
            &config,
            move |data: &[u16], _: &cpal::InputCallbackInfo| {
                if let Ok(mut buf) = sink.lock() {
                    buf.extend(data.iter().map(|&v| (v as f32 - 32768.0) / 32768.0));
                }
            },
            err_fn,
            None,
        ),
        other => {
            return Err(LookoutError::DeviceError {
                reason: format!("unsupported input sample format {other}"),
            })
        }
    }
    .map_err(|e| LookoutError::DeviceError {
        reason: format!("failed to open input stream: {e}"),
    })?;

    stream.play().map_err(|e| LookoutError::DeviceError {
        reason: format!("failed to start capture: {e}"),
    })?;

    std::thread::sleep(Duration::from_secs_f32(duration_secs));
    drop(stream);

    let raw = buffer
        .lock()
        .map(|mut buf| std::mem::take(&mut *buf))
        .unwrap_or_default();

    if raw.is_empty() {
        return Err(LookoutError::EmptyAudio);
    }

    let mono: Vec<f32> = if channels <= 1 {
        raw
    } else {
        raw.chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    log::debug!("captured {} samples at {} Hz", mono.len(), device_rate);
    resample::resample(&AudioClip::new(mono, device_rate), sample_rate)
}

/// Play a clip on the default output device, blocking until done
pub fn play(clip: &AudioClip) -> Result<()> {
    if clip.is_empty() {
        return Ok(());
    }

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| LookoutError::DeviceError {
            reason: "no output device available".to_string(),
        })?;

    let supported = device
        .default_output_config()
        .map_err(|e| LookoutError::DeviceError {
            reason: format!("no output config: {e}"),
        })?;

    let device_rate = supported.sample_rate().0;
    let channels = supported.channels() as usize;
    let config = supported.config();

    let samples = Arc::new(resample::resample(clip, device_rate)?.into_samples());
    let total = samples.len();
    let position = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicBool::new(false));

    let src = Arc::clone(&samples);
    let pos = Arc::clone(&position);
    let done = Arc::clone(&finished);

    let err_fn = |err| log::error!("audio playback error: {err}");

    let stream = match supported.sample_format() {
        SampleFormat::F32 => device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    let i = pos.load(Ordering::Relaxed);
                    let sample = if i < src.len() {
                        pos.store(i + 1, Ordering::Relaxed);
                        src[i]
                    } else {
                        done.store(true, Ordering::Relaxed);
                        0.0
                    };
                    for out in frame.iter_mut() {
                        *out = sample;
                    }
                }
            },
            err_fn,
            None,
        ),
        SampleFormat::I16 => device.build_output_stream(
            &config,
            move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    let i = pos.load(Ordering::Relaxed);
                    let sample = if i < src.len() {
                        pos.store(i + 1, Ordering::Relaxed);
                        (src[i].clamp(-1.0, 1.0) * 32767.0) as i16
                    } else {
                        done.store(true, Ordering::Relaxed);
                        0
                    };
                    for out in frame.iter_mut() {
                        *out = sample;
                    }
                }
            },
            err_fn,
            None,
        ),
        other => {
            return Err(LookoutError::DeviceError {
                reason: format!("unsupported output sample format {other}"),
            })
        }
    }
    .map_err(|e| LookoutError::DeviceError {
        reason: format!("failed to open output stream: {e}"),
    })?;

    stream.play().map_err(|e| LookoutError::DeviceError {
        reason: format!("failed to start playback: {e}"),
    })?;

    let duration_ms = (total as u64 * 1000) / u64::from(device_rate.max(1));
    let timeout = Duration::from_millis(duration_ms + 500);
    let start = Instant::now();
    while !finished.load(Ordering::Relaxed) {
        if start.elapsed() > timeout {
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    std::thread::sleep(Duration::from_millis(100));
    drop(stream);

    log::debug!("playback of {total} samples complete");
    Ok(())
}
