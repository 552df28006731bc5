//! Single frame extraction.

use std::path::Path;
use tracing::{debug, warn};

use vsess_models::encoding::FRAME_IMAGE_CODEC;
use vsess_models::seek_timestamp;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::filter_select_frame;

/// Leading bytes of every PNG file.
const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Extract frame `index` of a video as PNG bytes.
///
/// The fast path seeks by timestamp and decodes a single frame. If that
/// yields nothing (e.g. a seek past the last keyframe on a variable frame
/// rate stream) the frame is selected by its decoded number instead, which
/// reads the stream from the start.
pub async fn extract_frame(
    video_path: impl AsRef<Path>,
    index: u64,
    fps: f64,
    timeout_secs: u64,
) -> MediaResult<Vec<u8>> {
    let video_path = video_path.as_ref();

    if !video_path.exists() {
        return Err(MediaError::FileNotFound(video_path.to_path_buf()));
    }

    let runner = FfmpegRunner::new().with_timeout(timeout_secs);

    let seek_cmd = png_command(video_path).seek(seek_timestamp(index, fps)).single_frame();
    match runner.run_capture(&seek_cmd).await {
        Ok(bytes) if is_png(&bytes) => return Ok(bytes),
        Ok(_) => debug!("Seek produced no image for frame {}, selecting by number", index),
        Err(e @ (MediaError::Timeout(_) | MediaError::FfmpegNotFound)) => return Err(e),
        Err(e) => warn!("Seek extraction of frame {} failed, selecting by number: {}", index, e),
    }

    let select_cmd = png_command(video_path)
        .video_filter(filter_select_frame(index))
        .output_args(["-vsync", "0"])
        .single_frame();
    let bytes = runner.run_capture(&select_cmd).await?;

    if is_png(&bytes) {
        Ok(bytes)
    } else {
        Err(MediaError::NoFrame(index))
    }
}

fn png_command(video_path: &Path) -> FfmpegCommand {
    FfmpegCommand::to_stdout(video_path)
        .format("image2")
        .video_codec(FRAME_IMAGE_CODEC)
        .output_arg("-an")
}

fn is_png(bytes: &[u8]) -> bool {
    bytes.starts_with(PNG_SIGNATURE)
}
