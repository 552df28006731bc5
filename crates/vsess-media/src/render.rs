//! Crop rendering.

use std::path::Path;
use tracing::{debug, info};

use vsess_models::{ClampedCrop, EncodingConfig, OutputLayout};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::{build_layout_filter, VIDEO_OUT_LABEL};

/// Dimensions of a rendered artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOutput {
    pub width: u32,
    pub height: u32,
}

/// Render `crop` of every frame of `input` into an MP4 at `output`.
///
/// Audio, when present, is re-encoded with the configured codec and bitrate
/// (AAC by default). The output file is only complete once this returns
/// `Ok`; callers are expected to write to a staging location.
pub async fn render_crop(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    crop: &ClampedCrop,
    layout: OutputLayout,
    encoding: &EncodingConfig,
    timeout_secs: u64,
) -> MediaResult<RenderOutput> {
    let input = input.as_ref();
    let output = output.as_ref();

    if !input.exists() {
        return Err(MediaError::FileNotFound(input.to_path_buf()));
    }

    let (width, height) = layout.output_size(crop);
    info!(
        "Rendering {}: {} -> {} ({}x{} at {},{} -> {}x{})",
        layout,
        input.display(),
        output.display(),
        crop.width,
        crop.height,
        crop.x,
        crop.y,
        width,
        height
    );

    let cmd = build_render_command(input, output, crop, layout, encoding);

    FfmpegRunner::new()
        .with_timeout(timeout_secs)
        .run_with_progress(&cmd, |progress| {
            debug!(
                "Render progress: frame={} fps={:.1} speed={:.2}x",
                progress.frame, progress.fps, progress.speed
            );
        })
        .await?;

    Ok(RenderOutput { width, height })
}

fn build_render_command(
    input: &Path,
    output: &Path,
    crop: &ClampedCrop,
    layout: OutputLayout,
    encoding: &EncodingConfig,
) -> FfmpegCommand {
    let (width, height) = layout.output_size(crop);

    FfmpegCommand::new(input, output)
        .filter_complex(build_layout_filter(layout, crop))
        .map(VIDEO_OUT_LABEL)
        .map("0:a?")
        .output_args(encoding.to_ffmpeg_args(width, height))
        .format("mp4")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_for(crop: ClampedCrop, layout: OutputLayout) -> Vec<String> {
        build_render_command(
            Path::new("in.mp4"),
            Path::new("out.mp4"),
            &crop,
            layout,
            &EncodingConfig::default(),
        )
        .build_args()
    }

    fn has_pair(args: &[String], key: &str, value: &str) -> bool {
        args.windows(2).any(|w| w[0] == key && w[1] == value)
    }

    #[test]
    fn test_crop_command() {
        let crop = ClampedCrop {
            x: 10,
            y: 20,
            width: 100,
            height: 50,
        };
        let args = args_for(crop, OutputLayout::Crop);

        assert!(has_pair(&args, "-filter_complex", "[0:v]crop=100:50:10:20[vout]"));
        assert!(has_pair(&args, "-map", "[vout]"));
        assert!(has_pair(&args, "-map", "0:a?"));
        assert!(has_pair(&args, "-pix_fmt", "yuv420p"));
        assert!(has_pair(&args, "-f", "mp4"));
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
    }

    #[test]
    fn test_odd_crop_uses_full_chroma() {
        let crop = ClampedCrop {
            x: 0,
            y: 0,
            width: 101,
            height: 51,
        };
        let args = args_for(crop, OutputLayout::Crop);
        assert!(has_pair(&args, "-pix_fmt", "yuv444p"));
    }

    #[test]
    fn test_panel_output_is_even() {
        let crop = ClampedCrop {
            x: 0,
            y: 0,
            width: 101,
            height: 51,
        };
        let args = args_for(crop, OutputLayout::Panel384);
        assert!(has_pair(&args, "-pix_fmt", "yuv420p"));
    }

    #[tokio::test]
    async fn test_render_missing_input() {
        let crop = ClampedCrop {
            x: 0,
            y: 0,
            width: 10,
            height: 10,
        };
        let err = render_crop(
            "/nonexistent/in.mp4",
            "/tmp/out.mp4",
            &crop,
            OutputLayout::Crop,
            &EncodingConfig::default(),
            5,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
