//! Frame-stream detection with spoken announcements
//!
//! Runs the detector over a stream of frames, annotating and announcing as
//! it goes. Frames come from a [`FrameSource`]; the bundled
//! [`DirectorySource`] replays a directory of PPM images in path order,
//! which keeps the loop testable without camera hardware.
//!
//! A failed frame read is skipped and counted, but a run aborts once reads
//! fail too many times in a row, so a dead source cannot spin forever.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::audio::wav;
use crate::error::{LookoutError, Result};
use crate::image::{draw, io as image_io, ImageBuffer};
use crate::pipeline::announce::Announcer;
use crate::pipeline::detect::Detector;

/// Consecutive read failures tolerated before a watch aborts
pub const DEFAULT_FAILURE_LIMIT: usize = 8;

/// Supplies frames to a watch run
pub trait FrameSource {
    /// Next frame, or `None` when the stream ends
    fn next_frame(&mut self) -> Result<Option<ImageBuffer>>;
}

/// Replays the PPM images under a directory in path order
pub struct DirectorySource {
    frames: std::vec::IntoIter<PathBuf>,
}

impl DirectorySource {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(LookoutError::FileNotFound {
                path: dir.display().to_string(),
                source: None,
            });
        }

        let mut frames: Vec<PathBuf> = WalkDir::new(dir)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| {
                path.extension()
                    .map(|ext| ext.eq_ignore_ascii_case("ppm"))
                    .unwrap_or(false)
            })
            .collect();
        frames.sort();

        log::info!("{} frames queued from {}", frames.len(), dir.display());
        Ok(Self {
            frames: frames.into_iter(),
        })
    }
}

impl FrameSource for DirectorySource {
    fn next_frame(&mut self) -> Result<Option<ImageBuffer>> {
        match self.frames.next() {
            Some(path) => image_io::load_ppm(&path).map(Some),
            None => Ok(None),
        }
    }
}

/// Counters for one completed watch run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchSummary {
    /// Frames detected on
    pub frames: usize,
    /// Read failures that were skipped
    pub failures: usize,
    /// Detections across all frames
    pub detections: usize,
    /// Frames that produced a spoken announcement
    pub announcements: usize,
}

/// A configured watch over a frame stream
pub struct Watch<'a> {
    detector: &'a Detector,
    announcer: Option<&'a Announcer>,
    annotated_dir: Option<PathBuf>,
    announce_dir: Option<PathBuf>,
    failure_limit: usize,
}

impl<'a> Watch<'a> {
    pub fn new(detector: &'a Detector) -> Self {
        Self {
            detector,
            announcer: None,
            annotated_dir: None,
            announce_dir: None,
            failure_limit: DEFAULT_FAILURE_LIMIT,
        }
    }

    /// Speak detections through this announcer
    pub fn with_announcer(mut self, announcer: &'a Announcer) -> Self {
        self.announcer = Some(announcer);
        self
    }

    /// Write annotated frames into this directory
    pub fn with_annotated_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.annotated_dir = Some(dir.into());
        self
    }

    /// Write announcement audio into this directory as WAV files
    pub fn with_announce_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.announce_dir = Some(dir.into());
        self
    }

    pub fn with_failure_limit(mut self, limit: usize) -> Self {
        self.failure_limit = limit.max(1);
        self
    }

    /// Consume frames until the source ends
    ///
    /// Detector errors abort the run; source errors are skipped until the
    /// failure limit is hit.
    pub fn run(&self, source: &mut dyn FrameSource) -> Result<WatchSummary> {
        let mut summary = WatchSummary::default();
        let mut consecutive_failures = 0usize;
        let mut frame_index = 0usize;

        loop {
            let frame = match source.next_frame() {
                Ok(Some(frame)) => {
                    consecutive_failures = 0;
                    frame
                }
                Ok(None) => break,
                Err(e) => {
                    consecutive_failures += 1;
                    summary.failures += 1;
                    log::warn!("frame read failed ({consecutive_failures} in a row): {e}");
                    if consecutive_failures >= self.failure_limit {
                        return Err(LookoutError::DeviceError {
                            reason: format!(
                                "frame source failed {consecutive_failures} times in a row"
                            ),
                        });
                    }
                    continue;
                }
            };

            let detections = self.detector.detect(&frame)?;
            summary.detections += detections.len();
            log::debug!("frame {frame_index}: {} detections", detections.len());

            if let Some(dir) = &self.annotated_dir {
                let mut annotated = frame.clone();
                draw::draw_detections(&mut annotated, &detections, self.detector.names());
                image_io::save_ppm(dir.join(format!("frame_{frame_index:05}.ppm")), &annotated)?;
            }

            if let Some(announcer) = self.announcer {
                let labeled = self.detector.label(detections);
                if let Some(clip) = announcer.announce(&labeled)? {
                    summary.announcements += 1;
                    if let Some(dir) = &self.announce_dir {
                        wav::save_wav(
                            &clip,
                            dir.join(format!("announcement_{frame_index:05}.wav")),
                        )?;
                    }
                }
            }

            frame_index += 1;
            summary.frames += 1;
        }

        log::info!(
            "watch complete: {} frames, {} detections, {} announcements, {} failures",
            summary.frames,
            summary.detections,
            summary.announcements,
            summary.failures
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::detect::DetectorConfig;
    use crate::vision::{Architecture, Network, NmsConfig};
    use tempfile::tempdir;

    fn tiny_detector() -> Detector {
        let config = DetectorConfig {
            architecture: Architecture::V3Tiny,
            input_size: 32,
            nms: NmsConfig::default(),
        };
        let network = Network::new(config.architecture, 1).unwrap();

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0i32.to_le_bytes());
        bytes.extend_from_slice(&2i32.to_le_bytes());
        bytes.extend_from_slice(&0i32.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes());
        bytes.extend_from_slice(&vec![0u8; network.num_params() * 4]);

        Detector::from_weights_bytes(config, vec!["widget".to_string()], &bytes).unwrap()
    }

    #[test]
    fn test_directory_source_ordering() {
        let dir = tempdir().unwrap();
        for name in ["b.ppm", "a.ppm", "notes.txt"] {
            if name.ends_with(".ppm") {
                image_io::save_ppm(dir.path().join(name), &ImageBuffer::new(4, 4)).unwrap();
            } else {
                std::fs::write(dir.path().join(name), b"ignored").unwrap();
            }
        }

        let mut source = DirectorySource::new(dir.path()).unwrap();
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_missing_directory() {
        let result = DirectorySource::new("/no/such/frames");
        assert!(matches!(result, Err(LookoutError::FileNotFound { .. })));
    }

    #[test]
    fn test_watch_counts_frames() {
        let dir = tempdir().unwrap();
        for i in 0..3 {
            image_io::save_ppm(
                dir.path().join(format!("frame{i}.ppm")),
                &ImageBuffer::new(8, 8),
            )
            .unwrap();
        }

        let detector = tiny_detector();
        let mut source = DirectorySource::new(dir.path()).unwrap();
        let summary = Watch::new(&detector).run(&mut source).unwrap();

        assert_eq!(summary.frames, 3);
        assert_eq!(summary.failures, 0);
        assert_eq!(summary.detections, 0);
        assert_eq!(summary.announcements, 0);
    }

    #[test]
    fn test_watch_writes_annotated_frames() {
        let frames = tempdir().unwrap();
        let out = tempdir().unwrap();
        image_io::save_ppm(frames.path().join("only.ppm"), &ImageBuffer::new(8, 8)).unwrap();

        let detector = tiny_detector();
        let mut source = DirectorySource::new(frames.path()).unwrap();
        let summary = Watch::new(&detector)
            .with_annotated_dir(out.path())
            .run(&mut source)
            .unwrap();

        assert_eq!(summary.frames, 1);
        assert!(out.path().join("frame_00000.ppm").exists());
    }

    #[test]
    fn test_watch_skips_bad_frames() {
        let dir = tempdir().unwrap();
        image_io::save_ppm(dir.path().join("a_good.ppm"), &ImageBuffer::new(8, 8)).unwrap();
        std::fs::write(dir.path().join("b_corrupt.ppm"), b"P6 not really").unwrap();
        image_io::save_ppm(dir.path().join("c_good.ppm"), &ImageBuffer::new(8, 8)).unwrap();

        let detector = tiny_detector();
        let mut source = DirectorySource::new(dir.path()).unwrap();
        let summary = Watch::new(&detector).run(&mut source).unwrap();

        assert_eq!(summary.frames, 2);
        assert_eq!(summary.failures, 1);
    }

    #[test]
    fn test_watch_aborts_after_repeated_failures() {
        struct BrokenSource;

        impl FrameSource for BrokenSource {
            fn next_frame(&mut self) -> Result<Option<ImageBuffer>> {
                Err(LookoutError::InvalidImage {
                    reason: "no signal".to_string(),
                })
            }
        }

        let detector = tiny_detector();
        let result = Watch::new(&detector)
            .with_failure_limit(3)
            .run(&mut BrokenSource);

        assert!(matches!(result, Err(LookoutError::DeviceError { .. })));
    }
}
