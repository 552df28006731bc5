//! FFprobe video information.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use vsess_models::frame::FALLBACK_FPS;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Video file information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Duration in seconds
    pub duration: f64,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Frame rate (fps)
    pub fps: f64,
    /// Total number of video frames
    pub frame_count: u64,
    /// Video codec
    pub codec: String,
    /// File size in bytes
    pub size: u64,
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    #[serde(default)]
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    duration: Option<String>,
    nb_frames: Option<String>,
    nb_read_frames: Option<String>,
}

/// Probe a video file for information.
///
/// Resolution, frame rate and frame count come from container/stream
/// metadata. Only when the container does not record a frame count does
/// this fall back to a counting pass over the stream, and if that fails too
/// the count is estimated from duration and frame rate.
pub async fn probe_video(path: impl AsRef<Path>, timeout_secs: u64) -> MediaResult<VideoInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let stdout = run_ffprobe(
        &["-v", "error", "-print_format", "json", "-show_format", "-show_streams"],
        path,
        timeout_secs,
    )
    .await?;

    let probe: FfprobeOutput = serde_json::from_slice(&stdout)?;

    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::invalid_video("No video stream found"))?;

    let width = video_stream.width.unwrap_or(0);
    let height = video_stream.height.unwrap_or(0);
    if width == 0 || height == 0 {
        return Err(MediaError::invalid_video("Video stream has no dimensions"));
    }

    let format = probe.format.as_ref();

    let duration = format
        .and_then(|f| f.duration.as_deref())
        .or(video_stream.duration.as_deref())
        .and_then(parse_positive_f64)
        .unwrap_or(0.0);

    let size = format
        .and_then(|f| f.size.as_deref())
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    let fps = video_stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| video_stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(FALLBACK_FPS);

    let frame_count = match video_stream.nb_frames.as_deref().and_then(parse_frame_count) {
        Some(count) => count,
        None => {
            debug!("No frame count in container metadata, counting frames: {}", path.display());
            match count_frames(path, timeout_secs).await {
                Ok(count) if count > 0 => count,
                Ok(_) => estimate_frame_count(duration, fps),
                Err(e @ MediaError::Timeout(_)) => return Err(e),
                Err(e) => {
                    warn!("Frame counting failed, estimating from duration: {}", e);
                    estimate_frame_count(duration, fps)
                }
            }
        }
    };

    if frame_count == 0 {
        return Err(MediaError::invalid_video("Video stream has no frames"));
    }

    Ok(VideoInfo {
        duration,
        width,
        height,
        fps,
        frame_count,
        codec: video_stream.codec_name.clone().unwrap_or_default(),
        size,
    })
}

/// Count frames by decoding the first video stream.
async fn count_frames(path: &Path, timeout_secs: u64) -> MediaResult<u64> {
    let stdout = run_ffprobe(
        &[
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-count_frames",
            "-show_entries",
            "stream=nb_read_frames",
            "-print_format",
            "json",
        ],
        path,
        timeout_secs,
    )
    .await?;

    let probe: FfprobeOutput = serde_json::from_slice(&stdout)?;
    Ok(probe
        .streams
        .first()
        .and_then(|s| s.nb_read_frames.as_deref())
        .and_then(parse_frame_count)
        .unwrap_or(0))
}

async fn run_ffprobe(args: &[&str], path: &Path, timeout_secs: u64) -> MediaResult<Vec<u8>> {
    check_ffprobe()?;

    let mut command = Command::new("ffprobe");
    command
        .args(args)
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = tokio::time::timeout(Duration::from_secs(timeout_secs), command.output())
        .await
        .map_err(|_| {
            warn!("FFprobe timed out after {} seconds", timeout_secs);
            MediaError::Timeout(timeout_secs)
        })??;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: "FFprobe failed".to_string(),
            stderr: Some(String::from_utf8_lossy(&output.stderr).trim().to_string()),
        });
    }

    Ok(output.stdout)
}

/// Parse frame rate string (e.g., "30/1" or "29.97"). Zero rates are rejected.
fn parse_frame_rate(s: &str) -> Option<f64> {
    let rate = if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den <= 0.0 {
            return None;
        }
        num / den
    } else {
        s.parse().ok()?
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

fn parse_frame_count(s: &str) -> Option<u64> {
    s.trim().parse::<u64>().ok().filter(|&n| n > 0)
}

fn parse_positive_f64(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite() && *v > 0.0)
}

fn estimate_frame_count(duration: f64, fps: f64) -> u64 {
    if duration <= 0.0 || fps <= 0.0 {
        return 0;
    }
    (duration * fps).round().max(1.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert!(parse_frame_rate("0/0").is_none());
        assert!(parse_frame_rate("0/1").is_none());
        assert!(parse_frame_rate("N/A").is_none());
    }

    #[test]
    fn test_parse_frame_count() {
        assert_eq!(parse_frame_count("100"), Some(100));
        assert_eq!(parse_frame_count("0"), None);
        assert_eq!(parse_frame_count("N/A"), None);
    }

    #[test]
    fn test_estimate_frame_count() {
        assert_eq!(estimate_frame_count(10.0, 30.0), 300);
        assert_eq!(estimate_frame_count(0.01, 30.0), 1);
        assert_eq!(estimate_frame_count(0.0, 30.0), 0);
    }

    #[test]
    fn test_ffprobe_output_parsing() {
        let json = r#"{
            "streams": [
                {"codec_type": "audio", "codec_name": "aac"},
                {"codec_type": "video", "codec_name": "h264", "width": 320, "height": 240,
                 "avg_frame_rate": "10/1", "r_frame_rate": "10/1", "nb_frames": "10"}
            ],
            "format": {"duration": "1.000000", "size": "2048"}
        }"#;
        let probe: FfprobeOutput = serde_json::from_str(json).unwrap();
        let video = probe.streams.iter().find(|s| s.codec_type == "video").unwrap();
        assert_eq!(video.width, Some(320));
        assert_eq!(video.nb_frames.as_deref().and_then(parse_frame_count), Some(10));
    }

    #[tokio::test]
    async fn test_probe_missing_file() {
        let err = probe_video("/nonexistent/video.mp4", 5).await.unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
