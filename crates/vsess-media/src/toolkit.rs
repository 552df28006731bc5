//! The media toolkit used by the session service.

use async_trait::async_trait;
use std::path::Path;

use vsess_models::{ClampedCrop, EncodingConfig, OutputLayout};

use crate::command::{check_ffmpeg, check_ffprobe};
use crate::error::MediaResult;
use crate::probe::{probe_video, VideoInfo};
use crate::render::{render_crop, RenderOutput};

/// Decoding and encoding operations over video files.
#[async_trait]
pub trait VideoToolkit: Send + Sync {
    /// Read resolution, frame rate and frame count of a video.
    async fn probe(&self, path: &Path) -> MediaResult<VideoInfo>;

    /// Decode frame `index` and return it as PNG bytes.
    async fn extract_frame(&self, path: &Path, index: u64, fps: f64) -> MediaResult<Vec<u8>>;

    /// Render the cropped video into `output`.
    async fn render(
        &self,
        input: &Path,
        output: &Path,
        crop: &ClampedCrop,
        layout: OutputLayout,
    ) -> MediaResult<RenderOutput>;

    /// Verify the underlying tools are installed.
    fn check_available(&self) -> MediaResult<()>;
}

/// Per-operation timeouts, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolkitTimeouts {
    pub probe_secs: u64,
    pub frame_secs: u64,
    pub render_secs: u64,
}

impl Default for ToolkitTimeouts {
    fn default() -> Self {
        Self {
            probe_secs: 30,
            frame_secs: 30,
            render_secs: 1800,
        }
    }
}

/// [`VideoToolkit`] backed by the `ffmpeg` and `ffprobe` binaries.
#[derive(Debug, Clone, Default)]
pub struct FfmpegToolkit {
    encoding: EncodingConfig,
    timeouts: ToolkitTimeouts,
}

impl FfmpegToolkit {
    pub fn new(encoding: EncodingConfig, timeouts: ToolkitTimeouts) -> Self {
        Self { encoding, timeouts }
    }
}

#[async_trait]
impl VideoToolkit for FfmpegToolkit {
    async fn probe(&self, path: &Path) -> MediaResult<VideoInfo> {
        probe_video(path, self.timeouts.probe_secs).await
    }

    async fn extract_frame(&self, path: &Path, index: u64, fps: f64) -> MediaResult<Vec<u8>> {
        crate::frame::extract_frame(path, index, fps, self.timeouts.frame_secs).await
    }

    async fn render(
        &self,
        input: &Path,
        output: &Path,
        crop: &ClampedCrop,
        layout: OutputLayout,
    ) -> MediaResult<RenderOutput> {
        render_crop(
            input,
            output,
            crop,
            layout,
            &self.encoding,
            self.timeouts.render_secs,
        )
        .await
    }

    fn check_available(&self) -> MediaResult<()> {
        check_ffmpeg()?;
        check_ffprobe()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{FfmpegCommand, FfmpegRunner};
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Generate a short test pattern video with `frames` frames at 10 fps.
    async fn make_video(dir: &TempDir, width: u32, height: u32, frames: u32) -> PathBuf {
        let path = dir.path().join("source.mp4");
        let cmd = FfmpegCommand::new(
            format!("testsrc=size={}x{}:rate=10", width, height),
            &path,
        )
        .input_arg("-f")
        .input_arg("lavfi")
        .output_args(["-frames:v".to_string(), frames.to_string()])
        .output_args(["-pix_fmt", "yuv420p"]);
        FfmpegRunner::new().with_timeout(60).run(&cmd).await.unwrap();
        path
    }

    #[test]
    fn test_default_timeouts() {
        let timeouts = ToolkitTimeouts::default();
        assert_eq!(timeouts.probe_secs, 30);
        assert_eq!(timeouts.render_secs, 1800);
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_probe_generated_video() {
        let dir = TempDir::new().unwrap();
        let video = make_video(&dir, 320, 240, 10).await;

        let info = FfmpegToolkit::default().probe(&video).await.unwrap();
        assert_eq!((info.width, info.height), (320, 240));
        assert_eq!(info.frame_count, 10);
        assert!((info.fps - 10.0).abs() < 0.01);
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_extract_frame_has_source_dimensions() {
        let dir = TempDir::new().unwrap();
        let video = make_video(&dir, 320, 240, 10).await;
        let toolkit = FfmpegToolkit::default();

        for index in [0, 5, 9] {
            let png = toolkit.extract_frame(&video, index, 10.0).await.unwrap();
            let img = image::load_from_memory(&png).unwrap();
            assert_eq!((img.width(), img.height()), (320, 240));
        }
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_render_crop_dimensions() {
        let dir = TempDir::new().unwrap();
        let video = make_video(&dir, 320, 240, 10).await;
        let output = dir.path().join("out.mp4");
        let toolkit = FfmpegToolkit::default();

        let crop = ClampedCrop {
            x: 10,
            y: 10,
            width: 100,
            height: 100,
        };
        let rendered = toolkit
            .render(&video, &output, &crop, OutputLayout::Crop)
            .await
            .unwrap();
        assert_eq!((rendered.width, rendered.height), (100, 100));

        let info = toolkit.probe(&output).await.unwrap();
        assert_eq!((info.width, info.height), (100, 100));
        assert_eq!(info.frame_count, 10);
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_render_panel_layout() {
        let dir = TempDir::new().unwrap();
        let video = make_video(&dir, 640, 480, 5).await;
        let output = dir.path().join("panel.mp4");
        let toolkit = FfmpegToolkit::default();

        let crop = ClampedCrop {
            x: 0,
            y: 0,
            width: 512,
            height: 256,
        };
        toolkit
            .render(&video, &output, &crop, OutputLayout::Panel384)
            .await
            .unwrap();

        let info = toolkit.probe(&output).await.unwrap();
        assert_eq!((info.width, info.height), (384, 256));
    }
}
