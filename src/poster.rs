use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;

use crate::probe::{self, Orientation, VideoStream};
use crate::scanner::Preview;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PosterError {
    #[error("Invalid timestamp {0}")]
    InvalidTimestamp(String),
    #[error("Unknown device type {0}")]
    UnknownDevice(String),
}

/// Store preview resolutions per device class, landscape width x height.
const DEVICE_RESOLUTIONS: &[(&str, (u32, u32))] = &[
    ("iphone4", (1136, 640)),
    ("iphone6", (1334, 750)),
    ("iphone6Plus", (2208, 1242)),
    ("iphone58", (2436, 1125)),
    ("iphone65", (2688, 1242)),
    ("ipad", (1024, 768)),
    ("ipad105", (2224, 1668)),
    ("ipadPro", (2732, 2048)),
    ("ipadPro11", (2388, 1668)),
    ("ipadPro129", (2732, 2048)),
];

/// Expected poster resolution for a device class and orientation.
pub fn preview_resolution(device_type: &str, orientation: Orientation) -> Option<(u32, u32)> {
    let (width, height) = DEVICE_RESOLUTIONS
        .iter()
        .find(|(device, _)| *device == device_type)?
        .1;
    Some(match orientation {
        Orientation::Landscape => (width, height),
        Orientation::Portrait => (height, width),
    })
}

/// Timestamps must be mm.ss: two digits, a dot, two digits.
pub fn validate_timestamp(timestamp: &str) -> Result<(), PosterError> {
    let bytes = timestamp.as_bytes();
    let valid = bytes.len() == 5
        && bytes[0].is_ascii_digit()
        && bytes[1].is_ascii_digit()
        && bytes[2] == b'.'
        && bytes[3].is_ascii_digit()
        && bytes[4].is_ascii_digit();
    if valid {
        Ok(())
    } else {
        Err(PosterError::InvalidTimestamp(timestamp.to_string()))
    }
}

/// mm.ss -> ffmpeg seek position
fn seek_position(timestamp: &str) -> String {
    format!("00:{}:{}", &timestamp[..2], &timestamp[3..5])
}

/// Seam over ffprobe/ffmpeg so the generation sequencing is testable
/// without the tools installed.
pub trait FrameExtractor {
    fn probe(&self, video_path: &Path) -> Result<VideoStream>;
    fn extract_frame(
        &self,
        video_path: &Path,
        seek: &str,
        resolution: (u32, u32),
        output: &Path,
    ) -> Result<()>;
}

/// Extractor backed by the ffprobe and ffmpeg binaries.
pub struct Ffmpeg;

fn ffmpeg_bin() -> String {
    std::env::var("FFMPEG_BIN").unwrap_or_else(|_| "ffmpeg".to_string())
}

impl FrameExtractor for Ffmpeg {
    fn probe(&self, video_path: &Path) -> Result<VideoStream> {
        probe::probe_video(video_path)
    }

    fn extract_frame(
        &self,
        video_path: &Path,
        seek: &str,
        resolution: (u32, u32),
        output: &Path,
    ) -> Result<()> {
        let (width, height) = resolution;
        let status = Command::new(ffmpeg_bin())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .arg("-nostdin")
            .arg("-y")
            .arg("-i")
            .arg(video_path)
            .args(["-ss", seek, "-frames:v", "1"])
            .arg("-vf")
            .arg(format!("scale={}:{}", width, height))
            .args(["-f", "image2"])
            .arg(output)
            .status()
            .context("failed to call ffmpeg")?;

        match status.code() {
            Some(0) => Ok(()),
            Some(code) => Err(anyhow!(
                "ffmpeg exited with code {} extracting frame from {}",
                code,
                video_path.display()
            )),
            None => Err(anyhow!(
                "ffmpeg exited by signal extracting frame from {}",
                video_path.display()
            )),
        }
    }
}

/// Derive a poster frame for every record that does not already have one
/// (or for all of them when `force` is set). The first malformed timestamp
/// or unknown device aborts the whole batch; posters written before that
/// point are kept. Returns the number of posters generated.
pub fn generate_posters(
    previews: &[Preview],
    force: bool,
    extractor: &dyn FrameExtractor,
) -> Result<usize> {
    let mut generated = 0;

    for preview in previews {
        if preview.poster_path.is_file() && !force {
            continue;
        }

        validate_timestamp(&preview.timestamp)?;

        let stream = extractor.probe(&preview.video_path)?;
        let resolution = preview_resolution(&preview.device_type, stream.orientation())
            .ok_or_else(|| PosterError::UnknownDevice(preview.device_type.clone()))?;

        // extract next to the destination, then rename into place
        let tmp_path = tmp_poster_path(&preview.poster_path);
        extractor.extract_frame(
            &preview.video_path,
            &seek_position(&preview.timestamp),
            resolution,
            &tmp_path,
        )?;
        fs::rename(&tmp_path, &preview.poster_path).with_context(|| {
            format!(
                "Failed to move poster into place at {}",
                preview.poster_path.display()
            )
        })?;

        println!("✓ Generated poster: {}", preview.poster_path.display());
        generated += 1;
    }

    Ok(generated)
}

fn tmp_poster_path(poster_path: &Path) -> PathBuf {
    poster_path.with_extension("tmp.jpg")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tempfile::TempDir;

    struct FakeExtractor {
        stream: VideoStream,
        probed: RefCell<Vec<PathBuf>>,
        extracted: RefCell<Vec<PathBuf>>,
    }

    impl FakeExtractor {
        fn new() -> Self {
            FakeExtractor {
                stream: VideoStream {
                    width: 1920,
                    height: 1080,
                    rotation: None,
                },
                probed: RefCell::new(Vec::new()),
                extracted: RefCell::new(Vec::new()),
            }
        }

        fn extract_count(&self) -> usize {
            self.extracted.borrow().len()
        }
    }

    impl FrameExtractor for FakeExtractor {
        fn probe(&self, video_path: &Path) -> Result<VideoStream> {
            self.probed.borrow_mut().push(video_path.to_path_buf());
            Ok(self.stream.clone())
        }

        fn extract_frame(
            &self,
            video_path: &Path,
            _seek: &str,
            _resolution: (u32, u32),
            output: &Path,
        ) -> Result<()> {
            self.extracted.borrow_mut().push(video_path.to_path_buf());
            fs::write(output, b"fake frame").unwrap();
            Ok(())
        }
    }

    fn preview_in(dir: &Path, name: &str, timestamp: &str, device: &str) -> Preview {
        let video_path = dir.join(name);
        fs::write(&video_path, b"video bytes").unwrap();
        Preview {
            locale: "en-US".to_string(),
            device_type: device.to_string(),
            timestamp: timestamp.to_string(),
            order: 1,
            poster_path: video_path.with_extension("jpg"),
            video_path,
        }
    }

    #[test]
    fn test_timestamp_validation() {
        assert!(validate_timestamp("05.25").is_ok());
        assert!(validate_timestamp("00.00").is_ok());
        assert!(validate_timestamp("99.99").is_ok());

        for bad in ["5.5", "abc", "123.45", "05:25", "05.2", "5.255", "", "05x25"] {
            assert_eq!(
                validate_timestamp(bad),
                Err(PosterError::InvalidTimestamp(bad.to_string())),
                "expected {:?} to be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_seek_position() {
        assert_eq!(seek_position("05.25"), "00:05:25");
        assert_eq!(seek_position("00.03"), "00:00:03");
    }

    #[test]
    fn test_resolution_swaps_for_portrait() {
        assert_eq!(
            preview_resolution("iphone65", Orientation::Landscape),
            Some((2688, 1242))
        );
        assert_eq!(
            preview_resolution("iphone65", Orientation::Portrait),
            Some((1242, 2688))
        );
        assert_eq!(preview_resolution("pebble", Orientation::Portrait), None);
    }

    #[test]
    fn test_generates_missing_poster() {
        let tmp = TempDir::new().unwrap();
        let preview = preview_in(tmp.path(), "clip.mp4", "00.05", "iphone65");
        let extractor = FakeExtractor::new();

        let generated = generate_posters(&[preview.clone()], false, &extractor).unwrap();

        assert_eq!(generated, 1);
        assert_eq!(extractor.extract_count(), 1);
        assert_eq!(fs::read(&preview.poster_path).unwrap(), b"fake frame");
    }

    #[test]
    fn test_existing_poster_is_left_untouched() {
        let tmp = TempDir::new().unwrap();
        let preview = preview_in(tmp.path(), "clip.mp4", "00.05", "iphone65");
        fs::write(&preview.poster_path, b"cached poster").unwrap();
        let extractor = FakeExtractor::new();

        let generated = generate_posters(&[preview.clone()], false, &extractor).unwrap();

        assert_eq!(generated, 0);
        assert_eq!(extractor.extract_count(), 0);
        assert!(extractor.probed.borrow().is_empty());
        assert_eq!(fs::read(&preview.poster_path).unwrap(), b"cached poster");
    }

    #[test]
    fn test_force_regenerates_cached_poster() {
        let tmp = TempDir::new().unwrap();
        let preview = preview_in(tmp.path(), "clip.mp4", "00.05", "iphone65");
        fs::write(&preview.poster_path, b"cached poster").unwrap();
        let extractor = FakeExtractor::new();

        let generated = generate_posters(&[preview.clone()], true, &extractor).unwrap();

        assert_eq!(generated, 1);
        assert_eq!(extractor.extract_count(), 1);
        assert_eq!(fs::read(&preview.poster_path).unwrap(), b"fake frame");
    }

    #[test]
    fn test_invalid_timestamp_stops_the_batch() {
        let tmp = TempDir::new().unwrap();
        let first = preview_in(tmp.path(), "a.mp4", "00.05", "iphone65");
        let second = preview_in(tmp.path(), "b.mp4", "5.5", "iphone65");
        let third = preview_in(tmp.path(), "c.mp4", "00.10", "iphone65");
        let extractor = FakeExtractor::new();

        let err = generate_posters(
            &[first.clone(), second.clone(), third.clone()],
            false,
            &extractor,
        )
        .unwrap_err();

        assert_eq!(
            err.downcast_ref::<PosterError>(),
            Some(&PosterError::InvalidTimestamp("5.5".to_string()))
        );
        // only the record before the bad one was processed
        assert_eq!(extractor.extract_count(), 1);
        assert!(first.poster_path.is_file());
        assert!(!second.poster_path.exists());
        assert!(!third.poster_path.exists());
    }

    #[test]
    fn test_unknown_device_stops_the_batch() {
        let tmp = TempDir::new().unwrap();
        let first = preview_in(tmp.path(), "a.mp4", "00.05", "pebble");
        let second = preview_in(tmp.path(), "b.mp4", "00.05", "iphone65");
        let extractor = FakeExtractor::new();

        let err = generate_posters(&[first, second.clone()], false, &extractor).unwrap_err();

        assert_eq!(
            err.downcast_ref::<PosterError>(),
            Some(&PosterError::UnknownDevice("pebble".to_string()))
        );
        assert_eq!(extractor.extract_count(), 0);
        assert!(!second.poster_path.exists());
    }
}
