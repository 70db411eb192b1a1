use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use crate::locales::{self, ALL_LOCALES, CONFIG_EXTENSION, POSTER_EXTENSION};

/// One localized preview video paired with its poster destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub locale: String,
    pub device_type: String,
    pub timestamp: String,
    pub order: u32,
    pub video_path: PathBuf,
    pub poster_path: PathBuf,
}

/// Sidecar configuration stored next to each video
#[derive(Debug, Deserialize)]
struct PreviewConfig {
    device: String,
    timestamp: String,
    order: u32,
}

/// Why a video was left out of the record set
#[derive(Debug, Error)]
pub enum SkipReason {
    #[error("Missing configuration for video: {0}")]
    MissingConfig(String),
    #[error("Invalid video configuration: {}", .0.display())]
    InvalidConfig(PathBuf),
}

#[derive(Debug, Default)]
pub struct ScanStats {
    pub locales_visited: usize,
    pub locales_skipped: usize,
    pub videos_found: usize,
    pub missing_config: usize,
    pub invalid_config: usize,
}

/// Walk the locale subdirectories of `previews_path` and build the upload
/// records. Locales are visited in table order and videos in filename order
/// within a locale; the upload stage relies on that ordering to detect
/// locale boundaries. A video with a missing or unparsable sidecar is
/// skipped with a warning, never aborting the scan.
pub fn scan(previews_path: &Path, skip_locales: &[String]) -> (Vec<Preview>, ScanStats) {
    let mut previews = Vec::new();
    let mut stats = ScanStats::default();

    println!("Scanning directory: {}", previews_path.display());

    for locale in ALL_LOCALES {
        let locale_path = previews_path.join(locale);
        if !locale_path.is_dir() {
            continue;
        }
        if skip_locales.iter().any(|s| s == locale) {
            println!("Skipping locale: {}", locale);
            stats.locales_skipped += 1;
            continue;
        }

        println!("Locale dir found: {}", locale_path.display());
        stats.locales_visited += 1;

        for video_path in list_videos(&locale_path) {
            stats.videos_found += 1;
            match read_preview(locale, &video_path) {
                Ok(preview) => previews.push(preview),
                Err(reason) => {
                    eprintln!("Warning: {}", reason);
                    match reason {
                        SkipReason::MissingConfig(_) => stats.missing_config += 1,
                        SkipReason::InvalidConfig(_) => stats.invalid_config += 1,
                    }
                }
            }
        }
    }

    (previews, stats)
}

/// List video files directly inside a locale directory, sorted by filename.
fn list_videos(locale_path: &Path) -> Vec<PathBuf> {
    let mut videos = Vec::new();

    for entry_result in WalkDir::new(locale_path)
        .max_depth(1)
        .min_depth(1)
        .into_iter()
    {
        let entry = match entry_result {
            Ok(e) => e,
            Err(err) => {
                if let Some(path) = err.path() {
                    eprintln!("Warning: Failed to access {}: {}", path.display(), err);
                } else {
                    eprintln!("Warning: WalkDir error: {}", err);
                }
                continue;
            }
        };

        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let is_video = path
            .extension()
            .and_then(|e| e.to_str())
            .map(locales::is_video_extension)
            .unwrap_or(false);
        if is_video {
            videos.push(path.to_path_buf());
        }
    }

    videos.sort_by_key(|p| p.file_name().map(|n| n.to_os_string()));
    videos
}

/// Pair one video with its sidecar and build the record, or report why the
/// video has to be skipped.
fn read_preview(locale: &str, video_path: &Path) -> Result<Preview, SkipReason> {
    let config_path = video_path.with_extension(CONFIG_EXTENSION);

    if !config_path.is_file() {
        let video_filename = video_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();
        return Err(SkipReason::MissingConfig(video_filename));
    }

    println!("Video found: {}", video_path.display());

    let config: PreviewConfig = fs::read_to_string(&config_path)
        .ok()
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .ok_or_else(|| SkipReason::InvalidConfig(config_path.clone()))?;

    Ok(Preview {
        locale: locale.to_string(),
        device_type: config.device,
        timestamp: config.timestamp,
        order: config.order,
        video_path: video_path.to_path_buf(),
        poster_path: video_path.with_extension(POSTER_EXTENSION),
    })
}
