use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::process::{Command, Stdio};

/// First video stream of a probed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoStream {
    pub width: i64,
    pub height: i64,
    pub rotation: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl VideoStream {
    /// Display dimensions after applying the rotation side data. A quarter
    /// turn swaps the coded width and height.
    pub fn display_dimensions(&self) -> (i64, i64) {
        match self.rotation.map(|r| r.rem_euclid(360)) {
            Some(90) | Some(270) => (self.height, self.width),
            _ => (self.width, self.height),
        }
    }

    pub fn orientation(&self) -> Orientation {
        let (width, height) = self.display_dimensions();
        if height > width {
            Orientation::Portrait
        } else {
            Orientation::Landscape
        }
    }
}

fn ffprobe_bin() -> String {
    std::env::var("FFPROBE_BIN").unwrap_or_else(|_| "ffprobe".to_string())
}

/// Run ffprobe on a video file and return its video stream geometry.
pub fn probe_video(path: &Path) -> Result<VideoStream> {
    let output = Command::new(ffprobe_bin())
        .args(["-v", "error", "-show_streams", "-of", "json"])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .context("failed to call ffprobe")?;

    if !output.status.success() {
        return Err(anyhow!(
            "ffprobe failed for {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    parse_video_stream(&output.stdout)
        .with_context(|| format!("could not read video stream info from {}", path.display()))
}

fn parse_video_stream(json: &[u8]) -> Result<VideoStream> {
    #[derive(Debug, Deserialize)]
    struct FFProbeSideData {
        rotation: Option<i32>,
    }
    #[derive(Debug, Deserialize)]
    struct FFProbeStream {
        codec_type: Option<String>,
        width: Option<i64>,
        height: Option<i64>,
        side_data_list: Option<Vec<FFProbeSideData>>,
    }
    #[derive(Debug, Deserialize)]
    struct FFProbeOutput {
        streams: Vec<FFProbeStream>,
    }

    let parsed: FFProbeOutput =
        serde_json::from_slice(json).context("could not parse ffprobe output")?;

    let video = parsed
        .streams
        .into_iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| anyhow!("no video stream found in file"))?;

    Ok(VideoStream {
        width: video
            .width
            .ok_or_else(|| anyhow!("video stream missing width"))?,
        height: video
            .height
            .ok_or_else(|| anyhow!("video stream missing height"))?,
        rotation: video
            .side_data_list
            .and_then(|side_datas| side_datas.into_iter().find_map(|sd| sd.rotation)),
    })
}
