//! WAV file I/O
//!
//! Loads PCM and float WAV files into mono [`AudioClip`]s and writes clips
//! back out as 16-bit PCM. Multi-channel input is downmixed by averaging
//! each frame. The in-memory variants back the HTTP bridge engines, which
//! ship WAV payloads rather than file paths.

use crate::audio::AudioClip;
use crate::error::{LookoutError, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::{Cursor, Read};
use std::path::Path;

const OUTPUT_BITS: u16 = 16;

/// Load a WAV file as a mono clip
pub fn load_wav<P: AsRef<Path>>(path: P) -> Result<AudioClip> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(LookoutError::FileNotFound {
            path: path.display().to_string(),
            source: None,
        });
    }

    let reader = WavReader::open(path).map_err(|e| LookoutError::InvalidAudio {
        reason: format!("failed to open {}: {}", path.display(), e),
        source: Some(Box::new(e)),
    })?;

    decode_reader(reader)
}

/// Decode WAV data from any reader (e.g. an HTTP response body)
pub fn read_wav<R: Read>(input: R) -> Result<AudioClip> {
    let reader = WavReader::new(input).map_err(|e| LookoutError::InvalidAudio {
        reason: format!("failed to parse WAV stream: {e}"),
        source: Some(Box::new(e)),
    })?;

    decode_reader(reader)
}

fn decode_reader<R: Read>(reader: WavReader<R>) -> Result<AudioClip> {
    let spec = reader.spec();
    let channels = spec.channels as usize;
    let sample_rate = spec.sample_rate;

    if channels == 0 {
        return Err(LookoutError::InvalidAudio {
            reason: "WAV header declares zero channels".to_string(),
            source: None,
        });
    }

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| {
                s.map_err(|e| LookoutError::InvalidAudio {
                    reason: format!("corrupt float sample: {e}"),
                    source: Some(Box::new(e)),
                })
            })
            .collect::<Result<Vec<f32>>>()?,
        SampleFormat::Int => {
            let bits = spec.bits_per_sample;
            let max_val = (1u32 << (bits - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| {
                    s.map(|v| v as f32 / max_val)
                        .map_err(|e| LookoutError::InvalidAudio {
                            reason: format!("corrupt integer sample: {e}"),
                            source: Some(Box::new(e)),
                        })
                })
                .collect::<Result<Vec<f32>>>()?
        }
    };

    let mono = downmix(&samples, channels);
    if mono.is_empty() {
        return Err(LookoutError::EmptyAudio);
    }

    Ok(AudioClip::new(mono, sample_rate))
}

/// Average interleaved channels into a single mono track
fn downmix(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels == 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Save a clip as a 16-bit PCM mono WAV file
pub fn save_wav<P: AsRef<Path>>(clip: &AudioClip, path: P) -> Result<()> {
    let path = path.as_ref();
    if clip.is_empty() {
        return Err(LookoutError::EmptyAudio);
    }

    let mut writer =
        WavWriter::create(path, output_spec(clip.sample_rate())).map_err(|e| {
            LookoutError::InvalidAudio {
                reason: format!("failed to create {}: {}", path.display(), e),
                source: Some(Box::new(e)),
            }
        })?;

    write_samples(&mut writer, clip.samples())?;

    writer.finalize().map_err(|e| LookoutError::InvalidAudio {
        reason: format!("failed to finalize {}: {}", path.display(), e),
        source: Some(Box::new(e)),
    })
}

/// Encode a clip as an in-memory 16-bit PCM WAV payload
pub fn wav_bytes(clip: &AudioClip) -> Result<Vec<u8>> {
    if clip.is_empty() {
        return Err(LookoutError::EmptyAudio);
    }

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, output_spec(clip.sample_rate())).map_err(
            |e| LookoutError::InvalidAudio {
                reason: format!("failed to start WAV encoding: {e}"),
                source: Some(Box::new(e)),
            },
        )?;

        write_samples(&mut writer, clip.samples())?;

        writer.finalize().map_err(|e| LookoutError::InvalidAudio {
            reason: format!("failed to finalize WAV encoding: {e}"),
            source: Some(Box::new(e)),
        })?;
    }

    Ok(cursor.into_inner())
}

fn output_spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: OUTPUT_BITS,
        sample_format: SampleFormat::Int,
    }
}

fn write_samples<W: std::io::Write + std::io::Seek>(
    writer: &mut WavWriter<W>,
    samples: &[f32],
) -> Result<()> {
    let max_val = ((1u32 << (OUTPUT_BITS - 1)) - 1) as f32;
    for &sample in samples {
        let scaled = (sample.clamp(-1.0, 1.0) * max_val) as i16;
        writer
            .write_sample(scaled)
            .map_err(|e| LookoutError::InvalidAudio {
                reason: format!("failed to write sample: {e}"),
                source: Some(Box::new(e)),
            })?;
    }
    Ok(())
}
